//! Build structMap views of the entry tree.
//!
//! Two views exist: the physical structMap describes the package as laid
//! out on disk, with `fptr` links into the fileSec; the normative logical
//! structMap documents the intended directory structure, including empty
//! directories that have no fileSec presence. The logical map is emitted
//! only when it would differ from the physical one.

use crate::constants::{METS_NS, NORMATIVE_STRUCTMAP_LABEL, PHYSICAL_STRUCTMAP_LABEL};
use crate::document::MetsDocument;
use crate::entry::{EntryId, EntryKind};
use crate::xml::Element;

/// A directory is empty when nothing under it ever reaches the fileSec.
pub(crate) fn is_empty_directory(doc: &MetsDocument, id: EntryId) -> bool {
    match doc.entry_ref(id) {
        Some(entry) if entry.kind() == EntryKind::Directory => entry
            .children()
            .iter()
            .all(|&child| is_empty_directory(doc, child)),
        _ => false,
    }
}

fn has_empty_directory_under(doc: &MetsDocument, id: EntryId) -> bool {
    let Some(entry) = doc.entry_ref(id) else {
        return false;
    };
    is_empty_directory(doc, id)
        || entry
            .children()
            .iter()
            .any(|&child| has_empty_directory_under(doc, child))
}

/// Whether any directory in the document is empty, which is what makes the
/// normative structMap worth emitting.
pub(crate) fn has_empty_directory(doc: &MetsDocument) -> bool {
    doc.roots()
        .iter()
        .any(|&root| has_empty_directory_under(doc, root))
}

/// The `div` for one entry and its subtree, or `None` when the entry
/// contributes nothing to this view (no label, or an empty directory in
/// the physical view).
pub(crate) fn entry_div(doc: &MetsDocument, id: EntryId, normative: bool) -> Option<Element> {
    let entry = doc.entry_ref(id)?;
    let label = entry.label()?;
    if !normative && is_empty_directory(doc, id) {
        return None;
    }

    let mut div = Element::in_ns(METS_NS, "div");
    div.set_attr("TYPE", entry.kind().div_type());
    div.set_attr("LABEL", label);
    let dmdids = entry.dmdids();
    if !dmdids.is_empty() {
        div.set_attr("DMDID", dmdids.join(" "));
    }
    if !normative
        && let Some(file_id) = entry.file_id()
    {
        let mut fptr = Element::in_ns(METS_NS, "fptr");
        fptr.set_attr("FILEID", file_id);
        div.append(fptr);
    }
    for &child in entry.children() {
        if let Some(child_div) = entry_div(doc, child, normative) {
            div.append(child_div);
        }
    }
    Some(div)
}

fn structmap(
    doc: &MetsDocument,
    id: &str,
    map_type: &str,
    label: &str,
    normative: bool,
) -> Element {
    let mut el = Element::in_ns(METS_NS, "structMap");
    el.set_attr("ID", id);
    el.set_attr("TYPE", map_type);
    el.set_attr("LABEL", label);
    for &root in doc.roots() {
        if let Some(div) = entry_div(doc, root, normative) {
            el.append(div);
        }
    }
    el
}

/// The physical structMap, always emitted.
pub(crate) fn physical_structmap(doc: &MetsDocument, id: &str) -> Element {
    structmap(doc, id, "physical", PHYSICAL_STRUCTMAP_LABEL, false)
}

/// The normative logical structMap, emitted only when some directory is
/// empty and the logical view therefore differs from the physical one.
pub(crate) fn normative_structmap(doc: &MetsDocument, id: &str) -> Option<Element> {
    has_empty_directory(doc).then(|| {
        structmap(doc, id, "logical", NORMATIVE_STRUCTMAP_LABEL, true)
    })
}
