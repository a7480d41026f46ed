//! The METS document model: an arena of filesystem entries plus header
//! state, with parse and serialize passes that keep the fileSec, structMap
//! and metadata sections cross-referenced.
//!
//! Serialization is two-pass: the first pass assigns every missing
//! identifier (file UUIDs, section and structMap ids) and stores them, the
//! second pass emits elements. Because assigned identifiers are stored,
//! re-serializing an unmutated document allocates nothing and produces
//! identical bytes apart from the timestamp.

use crate::constants::{
    FILE_ID_PREFIX, GROUP_ID_PREFIX, METS_NS, NORMATIVE_STRUCTMAP_LABEL, SCHEMA_LOCATION, XLINK_NS,
    XSI_NS, percent_decode_path, percent_encode_path,
};
use crate::entry::{EntryId, EntryKind, FsEntry, TransformFile};
use crate::error::{MetsError, Result};
use crate::id::{IdAllocator, generate_uuid};
use crate::metadata::{
    Agent, AltRecordId, AmdSec, MdContents, MdSectionKind, MdWrap, SubSection, current_of,
    replace_in,
};
use crate::premis::{PremisAgent, PremisEvent, PremisObject, PremisRights};
use crate::structmap;
use crate::xml::{Element, WriteOptions, parse as parse_xml, write_document};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

/// Output shaping for [`MetsDocument::to_bytes`] and [`MetsDocument::write`].
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Indent the output.
    pub pretty_print: bool,
    /// Emit `mets:`-prefixed element names instead of binding the METS
    /// namespace as the default.
    pub fully_qualified: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { pretty_print: true, fully_qualified: true }
    }
}

/// Where a subsection lives within its owning entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SectionSlot {
    Amd { section: usize, sub: usize },
    Dmd(usize),
}

/// Handle to one metadata subsection of one entry.
///
/// Slots are append-only, so a handle stays valid for the life of the
/// entry, including across [`MetsDocument::replace_metadata`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubSectionId {
    pub entry: EntryId,
    pub(crate) slot: SectionSlot,
}

/// A METS document: header state plus the tree of entries and everything
/// attached to them.
#[derive(Debug, Default)]
pub struct MetsDocument {
    arena: Vec<Option<FsEntry>>,
    roots: Vec<EntryId>,
    allocator: IdAllocator,
    /// Root `OBJID` attribute.
    pub objid: Option<String>,
    /// Header agents, emitted in order.
    pub agents: Vec<Agent>,
    /// Header alternative record identifiers, emitted in order.
    pub alternate_ids: Vec<AltRecordId>,
    createdate: Option<String>,
    physical_structmap_id: Option<String>,
    normative_structmap_id: Option<String>,
}

fn now_string() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

impl MetsDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a METS file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a METS document from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let root = parse_xml(bytes)?;
        Self::from_tree(&root)
    }

    /// The `CREATEDATE` recorded in the header, kept verbatim from parse.
    /// `None` until first serialization of a freshly built document.
    pub fn createdate(&self) -> Option<&str> {
        self.createdate.as_deref()
    }

    // TREE

    fn insert(&mut self, entry: FsEntry) -> EntryId {
        let id = EntryId(self.arena.len());
        self.arena.push(Some(entry));
        id
    }

    pub(crate) fn entry_ref(&self, id: EntryId) -> Option<&FsEntry> {
        self.arena.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Mutably borrow an entry.
    pub fn entry_mut(&mut self, id: EntryId) -> Result<&mut FsEntry> {
        self.arena
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| MetsError::NotFound(format!("no entry for handle {}", id.0)))
    }

    /// Borrow an entry.
    pub fn entry(&self, id: EntryId) -> Result<&FsEntry> {
        self.entry_ref(id)
            .ok_or_else(|| MetsError::NotFound(format!("no entry for handle {}", id.0)))
    }

    /// Top-level entries in insertion order.
    #[inline]
    pub fn roots(&self) -> &[EntryId] {
        &self.roots
    }

    /// Add a top-level entry.
    pub fn append_root(&mut self, entry: FsEntry) -> EntryId {
        let id = self.insert(entry);
        self.roots.push(id);
        id
    }

    /// Add `entry` as the last child of `parent`.
    ///
    /// # Errors
    /// `NotFound` if `parent` is gone; `InvalidEntryType` if `parent` is not
    /// a directory.
    pub fn append_child(&mut self, parent: EntryId, entry: FsEntry) -> Result<EntryId> {
        if !self.entry(parent)?.kind().can_have_children() {
            return Err(MetsError::InvalidEntryType(
                "only directories can have children".to_string(),
            ));
        }
        let child = self.insert(entry);
        self.link_child(parent, child);
        Ok(child)
    }

    fn link_child(&mut self, parent: EntryId, child: EntryId) {
        if let Some(entry) = self.arena[child.0].as_mut() {
            entry.parent = Some(parent);
        }
        if let Some(entry) = self.arena[parent.0].as_mut() {
            entry.children.push(child);
        }
    }

    fn is_ancestor(&self, ancestor: EntryId, of: EntryId) -> bool {
        let mut cursor = self.entry_ref(of).and_then(FsEntry::parent);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.entry_ref(id).and_then(FsEntry::parent);
        }
        false
    }

    /// Move an existing entry (root or child) under a new parent.
    ///
    /// All checks happen before any mutation; on error the tree is
    /// untouched.
    ///
    /// # Errors
    /// `NotFound` for stale handles, `InvalidEntryType` if `parent` is not
    /// a directory, `Cycle` if `child` is `parent` or one of its ancestors.
    pub fn attach_child(&mut self, parent: EntryId, child: EntryId) -> Result<()> {
        self.entry(child)?;
        if !self.entry(parent)?.kind().can_have_children() {
            return Err(MetsError::InvalidEntryType(
                "only directories can have children".to_string(),
            ));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(MetsError::Cycle(
                "entry cannot become a child of its own subtree".to_string(),
            ));
        }
        self.detach(child);
        self.link_child(parent, child);
        Ok(())
    }

    fn detach(&mut self, id: EntryId) {
        let parent = self.entry_ref(id).and_then(FsEntry::parent);
        match parent {
            Some(parent) => {
                if let Some(entry) = self.arena[parent.0].as_mut() {
                    entry.children.retain(|&child| child != id);
                }
            }
            None => self.roots.retain(|&root| root != id),
        }
        if let Some(entry) = self.arena[id.0].as_mut() {
            entry.parent = None;
        }
    }

    /// Remove an entry and its whole subtree.
    ///
    /// Entries elsewhere in the document whose `derived_from` pointed into
    /// the removed subtree are left dangling; they are returned (and logged
    /// at warn level) so the caller can repair them. Their lookups resolve
    /// to `NotFound` from here on.
    pub fn remove(&mut self, id: EntryId) -> Result<Vec<EntryId>> {
        self.entry(id)?;
        self.detach(id);
        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);
        let removed_set: HashSet<EntryId> = removed.iter().copied().collect();
        for &gone in &removed {
            self.arena[gone.0] = None;
        }

        let mut dangling = Vec::new();
        for (index, slot) in self.arena.iter().enumerate() {
            if let Some(entry) = slot
                && let Some(source) = entry.derived_from()
                && removed_set.contains(&source)
            {
                warn!(
                    path = entry.path().unwrap_or(""),
                    "derivation source removed, derived_from left dangling"
                );
                dangling.push(EntryId(index));
            }
        }
        Ok(dangling)
    }

    fn collect_subtree(&self, id: EntryId, out: &mut Vec<EntryId>) {
        if let Some(entry) = self.entry_ref(id) {
            out.push(id);
            for &child in entry.children() {
                self.collect_subtree(child, out);
            }
        }
    }

    /// Record that `entry` was derived from `source` (or clear the link).
    ///
    /// # Errors
    /// `NotFound` if either handle is stale, `InvalidArgument` on
    /// self-derivation.
    pub fn set_derived_from(&mut self, entry: EntryId, source: Option<EntryId>) -> Result<()> {
        if let Some(source) = source {
            if source == entry {
                return Err(MetsError::InvalidArgument(
                    "an entry cannot be derived from itself".to_string(),
                ));
            }
            self.entry(source)?;
        }
        self.entry_mut(entry)?.derived_from = source;
        Ok(())
    }

    /// Every entry in document order: preorder depth-first from the roots.
    /// Recomputed on each call; this order is the authority for lookups and
    /// for emission order on serialization.
    pub fn all_entries(&self) -> Vec<EntryId> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.collect_subtree(root, &mut out);
        }
        out
    }

    /// Entries matching a predicate, in document order.
    pub fn find<P>(&self, predicate: P) -> Vec<EntryId>
    where
        P: Fn(&FsEntry) -> bool,
    {
        self.all_entries()
            .into_iter()
            .filter(|&id| self.entry_ref(id).is_some_and(&predicate))
            .collect()
    }

    /// Look up the entry with the given file UUID.
    ///
    /// # Errors
    /// `NotFound` when nothing matches, `AmbiguousIdentifier` when more
    /// than one entry does.
    pub fn get_file(&self, file_uuid: &str) -> Result<EntryId> {
        let matches = self.find(|entry| entry.file_uuid() == Some(file_uuid));
        match matches.as_slice() {
            [] => Err(MetsError::NotFound(format!("no file with UUID {file_uuid}"))),
            [id] => Ok(*id),
            _ => Err(MetsError::AmbiguousIdentifier(format!(
                "{} files share UUID {file_uuid}",
                matches.len()
            ))),
        }
    }

    /// All entries with the given path. Paths are not unique in METS, so
    /// every match is returned.
    pub fn files_by_path(&self, path: &str) -> Vec<EntryId> {
        self.find(|entry| entry.path() == Some(path))
    }

    /// The `GROUPID` value for an entry: the UUID of the root of its
    /// derivation chain. When the chain dangles (the source was removed)
    /// the entry's own UUID is used so the output stays schema-valid.
    pub fn group_id(&self, id: EntryId) -> Option<String> {
        let mut visited = HashSet::from([id]);
        let mut current = id;
        while let Some(source) = self.entry_ref(current)?.derived_from() {
            if !visited.insert(source) {
                warn!("derivation chain contains a cycle, stopping the walk");
                break;
            }
            if self.entry_ref(source).is_none() {
                warn!("derivation source is gone, falling back to the entry's own group");
                break;
            }
            current = source;
        }
        self.entry_ref(current)?
            .file_uuid()
            .map(|uuid| format!("{GROUP_ID_PREFIX}{uuid}"))
    }

    // METADATA

    /// Attach a new current subsection of `kind` to an entry.
    ///
    /// dmdSec subsections are stored per entry; the amdSec kinds are
    /// appended to the entry's administrative section, created on first
    /// use.
    pub fn add_metadata(
        &mut self,
        entry: EntryId,
        kind: MdSectionKind,
        contents: MdContents,
    ) -> Result<SubSectionId> {
        let target = self.entry_mut(entry)?;
        let slot = if kind == MdSectionKind::DmdSec {
            target.dmdsecs.push(SubSection::new(kind, contents));
            SectionSlot::Dmd(target.dmdsecs.len() - 1)
        } else {
            if target.amdsecs.is_empty() {
                target.amdsecs.push(AmdSec::new());
            }
            let subsections = &mut target.amdsecs[0].subsections;
            subsections.push(SubSection::new(kind, contents));
            SectionSlot::Amd { section: 0, sub: subsections.len() - 1 }
        };
        Ok(SubSectionId { entry, slot })
    }

    pub fn add_techmd(&mut self, entry: EntryId, contents: MdContents) -> Result<SubSectionId> {
        self.add_metadata(entry, MdSectionKind::TechMd, contents)
    }

    pub fn add_rightsmd(&mut self, entry: EntryId, contents: MdContents) -> Result<SubSectionId> {
        self.add_metadata(entry, MdSectionKind::RightsMd, contents)
    }

    pub fn add_sourcemd(&mut self, entry: EntryId, contents: MdContents) -> Result<SubSectionId> {
        self.add_metadata(entry, MdSectionKind::SourceMd, contents)
    }

    pub fn add_digiprovmd(&mut self, entry: EntryId, contents: MdContents) -> Result<SubSectionId> {
        self.add_metadata(entry, MdSectionKind::DigiprovMd, contents)
    }

    pub fn add_dmdsec(&mut self, entry: EntryId, contents: MdContents) -> Result<SubSectionId> {
        self.add_metadata(entry, MdSectionKind::DmdSec, contents)
    }

    /// Attach a Dublin Core fragment as a descriptive section.
    pub fn add_dublin_core(&mut self, entry: EntryId, fragment: Element) -> Result<SubSectionId> {
        self.add_dmdsec(entry, MdContents::Wrap(MdWrap::new(fragment, "DC")))
    }

    /// Borrow a subsection by handle.
    pub fn subsection(&self, id: SubSectionId) -> Result<&SubSection> {
        let entry = self.entry(id.entry)?;
        let sub = match id.slot {
            SectionSlot::Dmd(index) => entry.dmdsecs().get(index),
            SectionSlot::Amd { section, sub } => entry
                .amdsecs()
                .get(section)
                .and_then(|amdsec| amdsec.subsections().get(sub)),
        };
        sub.ok_or_else(|| MetsError::NotFound("no such subsection".to_string()))
    }

    /// Replace a subsection with new contents, appending a revision to its
    /// chain. The old revision is kept, linked as `older` of the new one.
    ///
    /// # Errors
    /// `InvalidState` when `old` is not the chain tip (or is deleted);
    /// the chain is never rewritten.
    pub fn replace_metadata(
        &mut self,
        old: SubSectionId,
        contents: MdContents,
    ) -> Result<SubSectionId> {
        let kind = self.subsection(old)?.kind();
        let target = self.entry_mut(old.entry)?;
        let slot = match old.slot {
            SectionSlot::Dmd(index) => {
                let new_index =
                    replace_in(&mut target.dmdsecs, index, SubSection::new(kind, contents))?;
                SectionSlot::Dmd(new_index)
            }
            SectionSlot::Amd { section, sub } => {
                let amdsec = target
                    .amdsecs
                    .get_mut(section)
                    .ok_or_else(|| MetsError::NotFound("no such amdSec".to_string()))?;
                let new_index =
                    replace_in(&mut amdsec.subsections, sub, SubSection::new(kind, contents))?;
                SectionSlot::Amd { section, sub: new_index }
            }
        };
        Ok(SubSectionId { entry: old.entry, slot })
    }

    /// Tombstone a subsection. It drops out of current queries but stays in
    /// the document, serialized with `STATUS="deleted"`.
    pub fn mark_deleted(&mut self, id: SubSectionId) -> Result<()> {
        self.subsection(id)?;
        let target = self.entry_mut(id.entry)?;
        match id.slot {
            SectionSlot::Dmd(index) => target.dmdsecs[index].mark_deleted(),
            SectionSlot::Amd { section, sub } => {
                target.amdsecs[section].subsections[sub].mark_deleted();
            }
        }
        Ok(())
    }

    /// Current (chain-tip, non-deleted) subsections of `kind` on an entry.
    pub fn current_metadata(&self, entry: EntryId, kind: MdSectionKind) -> Result<Vec<&SubSection>> {
        let entry = self.entry(entry)?;
        let mut out = Vec::new();
        if kind == MdSectionKind::DmdSec {
            out.extend(current_of(entry.dmdsecs(), kind).map(|(_, sub)| sub));
        } else {
            for amdsec in entry.amdsecs() {
                out.extend(amdsec.current(kind));
            }
        }
        Ok(out)
    }

    // PREMIS

    /// Attach a PREMIS object record. Objects describing empty directories
    /// have no fileSec element to hang a techMD off, so they go into a
    /// descriptive section instead.
    pub fn add_premis_object(
        &mut self,
        entry: EntryId,
        object: &PremisObject,
    ) -> Result<SubSectionId> {
        let contents = MdContents::Wrap(MdWrap::new(object.fragment().clone(), "PREMIS:OBJECT"));
        if structmap::is_empty_directory(self, entry) {
            self.add_dmdsec(entry, contents)
        } else {
            self.add_techmd(entry, contents)
        }
    }

    pub fn add_premis_event(&mut self, entry: EntryId, event: &PremisEvent) -> Result<SubSectionId> {
        let contents = MdContents::Wrap(MdWrap::new(event.fragment().clone(), "PREMIS:EVENT"));
        self.add_digiprovmd(entry, contents)
    }

    pub fn add_premis_agent(&mut self, entry: EntryId, agent: &PremisAgent) -> Result<SubSectionId> {
        let contents = MdContents::Wrap(MdWrap::new(agent.fragment().clone(), "PREMIS:AGENT"));
        self.add_digiprovmd(entry, contents)
    }

    pub fn add_premis_rights(
        &mut self,
        entry: EntryId,
        rights: &PremisRights,
    ) -> Result<SubSectionId> {
        let contents = MdContents::Wrap(MdWrap::new(rights.fragment().clone(), "PREMIS:RIGHTS"));
        self.add_rightsmd(entry, contents)
    }

    fn premis_fragments(
        &self,
        entry: EntryId,
        kinds: &[MdSectionKind],
        mdtype: &str,
    ) -> Result<Vec<&Element>> {
        let mut out = Vec::new();
        for &kind in kinds {
            for sub in self.current_metadata(entry, kind)? {
                if let MdContents::Wrap(wrap) = sub.contents()
                    && wrap.mdtype() == mdtype
                {
                    out.extend(wrap.fragments());
                }
            }
        }
        Ok(out)
    }

    /// Current PREMIS object records of an entry, decoded.
    ///
    /// # Errors
    /// `MalformedRecord` when a fragment claims to be a PREMIS object but
    /// cannot be decoded; the subsection itself is left untouched.
    pub fn get_premis_objects(&self, entry: EntryId) -> Result<Vec<PremisObject>> {
        self.premis_fragments(
            entry,
            &[MdSectionKind::TechMd, MdSectionKind::DmdSec],
            "PREMIS:OBJECT",
        )?
        .into_iter()
        .map(PremisObject::from_fragment)
        .collect()
    }

    /// Current PREMIS event records of an entry, decoded.
    pub fn get_premis_events(&self, entry: EntryId) -> Result<Vec<PremisEvent>> {
        self.premis_fragments(entry, &[MdSectionKind::DigiprovMd], "PREMIS:EVENT")?
            .into_iter()
            .map(PremisEvent::from_fragment)
            .collect()
    }

    /// Current PREMIS agent records of an entry, decoded.
    pub fn get_premis_agents(&self, entry: EntryId) -> Result<Vec<PremisAgent>> {
        self.premis_fragments(entry, &[MdSectionKind::DigiprovMd], "PREMIS:AGENT")?
            .into_iter()
            .map(PremisAgent::from_fragment)
            .collect()
    }

    /// Current PREMIS rights records of an entry, decoded.
    pub fn get_premis_rights(&self, entry: EntryId) -> Result<Vec<PremisRights>> {
        self.premis_fragments(entry, &[MdSectionKind::RightsMd], "PREMIS:RIGHTS")?
            .into_iter()
            .map(PremisRights::from_fragment)
            .collect()
    }

    // SERIALIZE

    fn assign_identifiers(&mut self) -> Result<()> {
        for id in self.all_entries() {
            let Some(entry) = self.arena.get_mut(id.0).and_then(|slot| slot.as_mut()) else {
                continue;
            };
            if entry.kind().in_file_sec() && entry.use_().is_some() && entry.file_uuid().is_none() {
                entry.file_uuid = Some(generate_uuid());
            }
            for sub in &mut entry.dmdsecs {
                if sub.id().is_none() {
                    sub.id = Some(self.allocator.allocate("dmdSec")?);
                }
            }
            for amdsec in &mut entry.amdsecs {
                if amdsec.id().is_none() {
                    amdsec.id = Some(self.allocator.allocate("amdSec")?);
                }
                for sub in &mut amdsec.subsections {
                    if sub.id().is_none() {
                        sub.id = Some(self.allocator.allocate(sub.kind().tag())?);
                    }
                }
            }
        }
        if self.physical_structmap_id.is_none() {
            self.physical_structmap_id = Some(self.allocator.allocate("structMap")?);
        }
        if self.normative_structmap_id.is_none() {
            self.normative_structmap_id = Some(self.allocator.allocate("structMap")?);
        }
        Ok(())
    }

    fn header_element(&self, now: &str) -> Element {
        let mut header = Element::in_ns(METS_NS, "metsHdr");
        match &self.createdate {
            None => header.set_attr("CREATEDATE", now),
            Some(createdate) => {
                header.set_attr("CREATEDATE", createdate);
                header.set_attr("LASTMODDATE", now);
            }
        }
        for agent in &self.agents {
            header.append(agent.serialize());
        }
        for alternate_id in &self.alternate_ids {
            header.append(alternate_id.serialize());
        }
        header
    }

    /// The `file` element for an entry; `None` when the entry has no
    /// fileSec presence (wrong kind, or purely structural).
    fn file_element(&self, id: EntryId) -> Option<Element> {
        let entry = self.entry_ref(id)?;
        let file_id = entry.file_id()?;
        let mut el = Element::in_ns(METS_NS, "file");
        el.set_attr("ID", file_id);
        if let Some(group_id) = self.group_id(id) {
            el.set_attr("GROUPID", group_id);
        }
        let admids = entry.admids();
        if !admids.is_empty() {
            el.set_attr("ADMID", admids.join(" "));
        }
        if let Some((checksum, checksum_type)) = entry.checksum() {
            el.set_attr("CHECKSUM", checksum);
            el.set_attr("CHECKSUMTYPE", checksum_type);
        }
        if let Some(path) = entry.path() {
            let mut flocat = Element::in_ns(METS_NS, "FLocat");
            flocat.set_attr_in(XLINK_NS, "href", percent_encode_path(path));
            flocat.set_attr("LOCTYPE", "OTHER");
            flocat.set_attr("OTHERLOCTYPE", "SYSTEM");
            el.append(flocat);
        }
        for transform in entry.transform_files() {
            el.append(transform.serialize());
        }
        Some(el)
    }

    fn filesec_element(&self, order: &[EntryId]) -> Element {
        let mut filesec = Element::in_ns(METS_NS, "fileSec");
        let mut group_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Element>> = HashMap::new();
        for &id in order {
            let Some(entry) = self.entry_ref(id) else {
                continue;
            };
            if !entry.kind().in_file_sec() {
                continue;
            }
            let Some(use_) = entry.use_() else {
                continue;
            };
            if let Some(file_el) = self.file_element(id) {
                let bucket = groups.entry(use_.to_string()).or_insert_with(|| {
                    group_order.push(use_.to_string());
                    Vec::new()
                });
                bucket.push(file_el);
            }
        }
        for use_ in group_order {
            let mut filegrp = Element::in_ns(METS_NS, "fileGrp");
            filegrp.set_attr("USE", &use_);
            if let Some(files) = groups.remove(&use_) {
                for file_el in files {
                    filegrp.append(file_el);
                }
            }
            filesec.append(filegrp);
        }
        filesec
    }

    /// Serialize to an element tree with an explicit timestamp. Everything
    /// but the timestamp is a pure function of document state, which is
    /// what the byte-idempotence tests lean on.
    pub(crate) fn serialize_with_now(&mut self, now: &str) -> Result<Element> {
        self.assign_identifiers()?;

        let mut root = Element::in_ns(METS_NS, "mets");
        root.set_attr_in(XSI_NS, "schemaLocation", SCHEMA_LOCATION);
        if let Some(objid) = &self.objid {
            root.set_attr("OBJID", objid);
        }
        root.append(self.header_element(now));

        let order = self.all_entries();

        // dmdSecs first, then amdSecs, each block sorted by id.
        let mut dmd: Vec<(String, Element)> = Vec::new();
        let mut amd: Vec<(String, Element)> = Vec::new();
        for &id in &order {
            let Some(entry) = self.entry_ref(id) else {
                continue;
            };
            for sub in entry.dmdsecs() {
                dmd.push((sub.id().unwrap_or_default().to_string(), sub.serialize(now)?));
            }
            for amdsec in entry.amdsecs() {
                amd.push((
                    amdsec.id().unwrap_or_default().to_string(),
                    amdsec.serialize(now)?,
                ));
            }
        }
        dmd.sort_by(|a, b| a.0.cmp(&b.0));
        amd.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, el) in dmd.into_iter().chain(amd) {
            root.append(el);
        }

        root.append(self.filesec_element(&order));

        let physical_id = self.physical_structmap_id.as_deref().ok_or_else(|| {
            MetsError::InvalidState("structMap identifier was not assigned".to_string())
        })?;
        root.append(structmap::physical_structmap(self, physical_id));
        if let Some(normative_id) = self.normative_structmap_id.as_deref()
            && let Some(normative) = structmap::normative_structmap(self, normative_id)
        {
            root.append(normative);
        }
        Ok(root)
    }

    /// Serialize to an element tree, stamping the current UTC time.
    pub fn serialize(&mut self) -> Result<Element> {
        let now = now_string();
        self.serialize_with_now(&now)
    }

    pub(crate) fn to_bytes_with_now(
        &mut self,
        options: &SerializeOptions,
        now: &str,
    ) -> Result<Vec<u8>> {
        let root = self.serialize_with_now(now)?;
        let write_options = WriteOptions {
            pretty: options.pretty_print,
            fully_qualified: options.fully_qualified,
            declaration: true,
        };
        Ok(write_document(&root, &write_options).into_bytes())
    }

    /// Serialize to XML bytes.
    pub fn to_bytes(&mut self, options: &SerializeOptions) -> Result<Vec<u8>> {
        let now = now_string();
        self.to_bytes_with_now(options, &now)
    }

    /// Serialize and write to a file.
    pub fn write(&mut self, path: impl AsRef<Path>, options: &SerializeOptions) -> Result<()> {
        let bytes = self.to_bytes(options)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    // PARSE

    /// Build a document from a parsed element tree.
    ///
    /// # Errors
    /// `SchemaMismatch` when the root is not a METS `mets` element;
    /// `MalformedDocument` when the physical structMap is missing, a
    /// structural pointer references a file absent from the fileSec, a
    /// metadata reference cannot be resolved, or the header claims a
    /// creation date in the future.
    pub fn from_tree(root: &Element) -> Result<Self> {
        if !root.is(METS_NS, "mets") {
            return Err(MetsError::SchemaMismatch(format!(
                "expected a mets root element in {METS_NS}, got {}",
                root.name()
            )));
        }
        let mut doc = MetsDocument::new();
        doc.objid = root.attr("OBJID").map(str::to_string);
        doc.parse_header(root)?;

        let ctx = ParseCtx::build(root, &mut doc.allocator)?;

        let physical = root
            .find_all(METS_NS, "structMap")
            .find(|el| el.attr("TYPE") == Some("physical"))
            .ok_or_else(|| {
                MetsError::MalformedDocument("no physical structMap found".to_string())
            })?;
        let normative = root.find_all(METS_NS, "structMap").find(|el| {
            el.attr("TYPE") == Some("logical")
                && el.attr("LABEL") == Some(NORMATIVE_STRUCTMAP_LABEL)
        });
        if let Some(id) = physical.attr("ID") {
            doc.allocator.reserve(id);
            doc.physical_structmap_id = Some(id.to_string());
        }
        if let Some(normative) = normative
            && let Some(id) = normative.attr("ID")
        {
            doc.allocator.reserve(id);
            doc.normative_structmap_id = Some(id.to_string());
        }

        let mut pending: Vec<(EntryId, String)> = Vec::new();
        let roots = parse_div_children(&mut doc, &ctx, Some(physical), normative, &mut pending)?;
        doc.roots = roots;

        // GROUPID correlation: a file whose group differs from its own UUID
        // was derived from the file owning that group.
        for (entry, group_uuid) in pending {
            match doc.get_file(&group_uuid) {
                Ok(source) => doc.set_derived_from(entry, Some(source))?,
                Err(_) => {
                    warn!(group = %group_uuid, "GROUPID does not match any file, derivation dropped");
                }
            }
        }
        Ok(doc)
    }

    fn parse_header(&mut self, root: &Element) -> Result<()> {
        let Some(header) = root.find(METS_NS, "metsHdr") else {
            return Ok(());
        };
        if let Some(createdate) = header.attr("CREATEDATE") {
            let now = now_string();
            if *createdate > *now {
                return Err(MetsError::MalformedDocument(format!(
                    "CREATEDATE more recent than now ({now})"
                )));
            }
            self.createdate = Some(createdate.to_string());
        }
        for agent in header.find_all(METS_NS, "agent") {
            self.agents.push(Agent::parse(agent)?);
        }
        for alternate_id in header.find_all(METS_NS, "altRecordID") {
            self.alternate_ids.push(AltRecordId::parse(alternate_id)?);
        }
        Ok(())
    }
}

/// Everything a structMap walk needs to resolve references: the fileSec
/// index plus the top-level metadata sections by id.
struct ParseCtx<'a> {
    files: HashMap<String, FileInfo>,
    amdsec_els: HashMap<&'a str, &'a Element>,
    dmdsec_els: HashMap<&'a str, &'a Element>,
}

struct FileInfo {
    file_uuid: String,
    use_: Option<String>,
    path: Option<String>,
    admids: Vec<String>,
    checksum: Option<String>,
    checksum_type: Option<String>,
    group_uuid: Option<String>,
    transform_files: Vec<TransformFile>,
}

impl<'a> ParseCtx<'a> {
    fn build(root: &'a Element, allocator: &mut IdAllocator) -> Result<Self> {
        let mut files = HashMap::new();
        if let Some(filesec) = root.find(METS_NS, "fileSec") {
            for filegrp in filesec.find_all(METS_NS, "fileGrp") {
                let use_ = filegrp.attr("USE").map(str::to_string);
                for file in filegrp.find_all(METS_NS, "file") {
                    let id = file.attr("ID").ok_or_else(|| {
                        MetsError::MalformedDocument("file element has no ID".to_string())
                    })?;
                    let path = file
                        .find(METS_NS, "FLocat")
                        .and_then(|flocat| flocat.attr_in(XLINK_NS, "href"))
                        .map(percent_decode_path)
                        .transpose()?;
                    let file_uuid = id.strip_prefix(FILE_ID_PREFIX).unwrap_or(id).to_string();
                    let group_uuid = file.attr("GROUPID").map(|group| {
                        group.strip_prefix(GROUP_ID_PREFIX).unwrap_or(group).to_string()
                    });
                    files.insert(
                        id.to_string(),
                        FileInfo {
                            file_uuid,
                            use_: use_.clone(),
                            path,
                            admids: file
                                .attr("ADMID")
                                .map(|admids| {
                                    admids.split_whitespace().map(str::to_string).collect()
                                })
                                .unwrap_or_default(),
                            checksum: file.attr("CHECKSUM").map(str::to_string),
                            checksum_type: file.attr("CHECKSUMTYPE").map(str::to_string),
                            group_uuid,
                            transform_files: file
                                .find_all(METS_NS, "transformFile")
                                .map(TransformFile::parse)
                                .collect(),
                        },
                    );
                }
            }
        }

        let mut amdsec_els = HashMap::new();
        for amdsec in root.find_all(METS_NS, "amdSec") {
            if let Some(id) = amdsec.attr("ID") {
                allocator.reserve(id);
                amdsec_els.insert(id, amdsec);
            }
            for sub in amdsec.children() {
                if let Some(id) = sub.attr("ID") {
                    allocator.reserve(id);
                }
            }
        }
        let mut dmdsec_els = HashMap::new();
        for dmdsec in root.find_all(METS_NS, "dmdSec") {
            if let Some(id) = dmdsec.attr("ID") {
                allocator.reserve(id);
                dmdsec_els.insert(id, dmdsec);
            }
        }
        Ok(Self { files, amdsec_els, dmdsec_els })
    }

    fn file_info(&self, fptr: &Element) -> Result<&FileInfo> {
        let file_id = fptr.attr("FILEID").ok_or_else(|| {
            MetsError::MalformedDocument("fptr element has no FILEID".to_string())
        })?;
        self.files.get(file_id).ok_or_else(|| {
            MetsError::MalformedDocument(format!(
                "{file_id} exists in structMap but not fileSec"
            ))
        })
    }
}

fn entry_from_file_info(info: &FileInfo, label: Option<&str>, kind: EntryKind) -> FsEntry {
    FsEntry {
        path: info.path.clone(),
        label: label.map(str::to_string),
        use_: info.use_.clone(),
        kind,
        file_uuid: Some(info.file_uuid.clone()),
        checksum: info.checksum.clone(),
        checksum_type: info.checksum_type.clone(),
        transform_files: info.transform_files.clone(),
        derived_from: None,
        parent: None,
        children: Vec::new(),
        amdsecs: Vec::new(),
        dmdsecs: Vec::new(),
    }
}

/// Pair the children of a physical div with their normative counterparts
/// (matched on TYPE + LABEL) and parse each pair. Normative-only divs are
/// empty directories documented solely in the logical structMap; they are
/// parsed as if physical.
fn parse_div_children(
    doc: &mut MetsDocument,
    ctx: &ParseCtx,
    physical: Option<&Element>,
    normative: Option<&Element>,
    pending: &mut Vec<(EntryId, String)>,
) -> Result<Vec<EntryId>> {
    let physical_divs: Vec<&Element> = physical
        .map(|el| el.find_all(METS_NS, "div").collect())
        .unwrap_or_default();
    let mut pairs: Vec<(&Element, Option<&Element>)> = Vec::new();
    match normative {
        None => {
            for &div in &physical_divs {
                pairs.push((div, None));
            }
        }
        Some(normative) => {
            // Each physical div is claimed at most once, so siblings that
            // share a TYPE and LABEL pair up positionally instead of all
            // matching the first one.
            let mut claimed = vec![false; physical_divs.len()];
            for norm_div in normative.find_all(METS_NS, "div") {
                let matched = physical_divs.iter().enumerate().find(|(index, div)| {
                    !claimed[*index]
                        && div.attr("TYPE") == norm_div.attr("TYPE")
                        && div.attr("LABEL") == norm_div.attr("LABEL")
                });
                match matched {
                    Some((index, &div)) => {
                        claimed[index] = true;
                        pairs.push((div, Some(norm_div)));
                    }
                    None => pairs.push((norm_div, None)),
                }
            }
            for (index, &div) in physical_divs.iter().enumerate() {
                if !claimed[index] {
                    pairs.push((div, None));
                }
            }
        }
    }

    let mut siblings = Vec::new();
    for (div, norm_div) in pairs {
        if let Some(id) = parse_div(doc, ctx, div, norm_div, pending)? {
            siblings.push(id);
        }
    }
    Ok(siblings)
}

fn parse_div(
    doc: &mut MetsDocument,
    ctx: &ParseCtx,
    div: &Element,
    norm_div: Option<&Element>,
    pending: &mut Vec<(EntryId, String)>,
) -> Result<Option<EntryId>> {
    let entry_type = div.attr("TYPE").unwrap_or("Item");
    let label = div.attr("LABEL");
    let fptrs: Vec<&Element> = div.find_all(METS_NS, "fptr").collect();
    let has_child_divs = div.find(METS_NS, "div").is_some();

    if entry_type.eq_ignore_ascii_case("directory") {
        // A directory div with exactly one fptr and no subdivisions is a
        // packed directory presented as a single file.
        if fptrs.len() == 1 && !has_child_divs {
            let info = ctx.file_info(fptrs[0])?;
            let entry = entry_from_file_info(info, label, EntryKind::DirectoryAsItem);
            let id = doc.insert(entry);
            attach_parsed_metadata(doc, ctx, id, div.attr("DMDID"), Some(&info.admids))?;
            note_derivation(info, id, pending);
            return Ok(Some(id));
        }

        let mut entry = FsEntry::directory("");
        entry.label = label.map(str::to_string);
        entry.use_ = None;
        let id = doc.insert(entry);
        let children = parse_div_children(doc, ctx, Some(div), norm_div, pending)?;
        for child in children {
            doc.link_child(id, child);
        }
        attach_parsed_metadata(
            doc,
            ctx,
            id,
            div.attr("DMDID"),
            div.attr("ADMID")
                .map(|admids| admids.split_whitespace().map(str::to_string).collect::<Vec<_>>())
                .as_deref(),
        )?;
        // Directories may carry direct fptrs with no intermediate item div.
        for fptr in fptrs {
            let info = ctx.file_info(fptr)?;
            let child = doc.insert(entry_from_file_info(info, None, EntryKind::Item));
            doc.link_child(id, child);
            attach_parsed_metadata(doc, ctx, child, None, Some(&info.admids))?;
            note_derivation(info, child, pending);
        }
        return Ok(Some(id));
    }

    // Items and other leaf types need a file pointer to mean anything.
    let Some(fptr) = fptrs.first() else {
        return Ok(None);
    };
    let info = ctx.file_info(fptr)?;
    let entry = entry_from_file_info(info, label, EntryKind::Item);
    let id = doc.insert(entry);
    attach_parsed_metadata(doc, ctx, id, div.attr("DMDID"), Some(&info.admids))?;
    note_derivation(info, id, pending);
    Ok(Some(id))
}

fn note_derivation(info: &FileInfo, id: EntryId, pending: &mut Vec<(EntryId, String)>) {
    if let Some(group_uuid) = &info.group_uuid
        && *group_uuid != info.file_uuid
    {
        pending.push((id, group_uuid.clone()));
    }
}

fn attach_parsed_metadata(
    doc: &mut MetsDocument,
    ctx: &ParseCtx,
    id: EntryId,
    dmdids: Option<&str>,
    admids: Option<&[String]>,
) -> Result<()> {
    let entry = doc.entry_mut(id)?;
    if let Some(dmdids) = dmdids {
        for dmdid in dmdids.split_whitespace() {
            let el = ctx.dmdsec_els.get(dmdid).ok_or_else(|| {
                MetsError::MalformedDocument(format!("DMDID {dmdid} references no dmdSec"))
            })?;
            entry.dmdsecs.push(SubSection::parse(el)?);
        }
        link_dmdsec_chains(&mut entry.dmdsecs);
    }
    if let Some(admids) = admids {
        for admid in admids {
            let el = ctx.amdsec_els.get(admid.as_str()).ok_or_else(|| {
                MetsError::MalformedDocument(format!("ADMID {admid} references no amdSec"))
            })?;
            entry.amdsecs.push(AmdSec::parse(el)?);
        }
    }
    Ok(())
}

/// Reconstruct revision chains among parsed dmdSec subsections: order by
/// creation time, then link each update to its predecessor. A parsed
/// status is dropped once the computed status agrees with it, so later
/// replacements keep the statuses consistent.
fn link_dmdsec_chains(dmdsecs: &mut [SubSection]) {
    dmdsecs.sort_by(|a, b| a.created().cmp(&b.created()));
    for index in 1..dmdsecs.len() {
        let is_update = dmdsecs[index]
            .status_override
            .as_deref()
            .is_some_and(|status| status.starts_with("update"));
        if is_update {
            dmdsecs[index - 1].newer = Some(index);
            dmdsecs[index].older = Some(index - 1);
        }
    }
    for sub in dmdsecs.iter_mut() {
        let computed_matches = match (&sub.status_override, sub.older, sub.newer) {
            (Some(status), _, _) => {
                let expected = if sub.older.is_none() { "original" } else { "update" };
                let expected = if sub.newer.is_some() {
                    format!("{expected}-superseded")
                } else {
                    expected.to_string()
                };
                *status == expected
            }
            (None, _, _) => false,
        };
        if computed_matches {
            sub.status_override = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MdRef;
    use crate::premis::PremisRecord;

    const NOW: &str = "2024-05-01T10:00:00";

    fn to_bytes_fixed(doc: &mut MetsDocument) -> Vec<u8> {
        doc.to_bytes_with_now(&SerializeOptions::default(), NOW)
            .unwrap()
    }

    #[test]
    fn test_scenario_single_file() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("hello.pdf"));
        assert_eq!(doc.all_entries(), vec![file]);

        let root = doc.serialize_with_now(NOW).unwrap();
        let filesec = root.find(METS_NS, "fileSec").unwrap();
        let filegrp = filesec.find(METS_NS, "fileGrp").unwrap();
        assert_eq!(filegrp.attr("USE"), Some("original"));
        let file_el = filegrp.find(METS_NS, "file").unwrap();
        let file_id = file_el.attr("ID").unwrap().to_string();
        assert!(file_id.starts_with(FILE_ID_PREFIX));
        let flocat = file_el.find(METS_NS, "FLocat").unwrap();
        assert_eq!(flocat.attr_in(XLINK_NS, "href"), Some("hello.pdf"));

        let map = root
            .find_all(METS_NS, "structMap")
            .find(|el| el.attr("TYPE") == Some("physical"))
            .unwrap();
        let div = map.find(METS_NS, "div").unwrap();
        let fptr = div.find(METS_NS, "fptr").unwrap();
        assert_eq!(fptr.attr("FILEID"), Some(file_id.as_str()));
    }

    #[test]
    fn test_scenario_derivation_round_trip() {
        let mut doc = MetsDocument::new();
        let objects = doc.append_root(FsEntry::directory("objects"));
        let original = doc
            .append_child(objects, FsEntry::file("objects/cat.png"))
            .unwrap();
        let derivative = doc
            .append_child(
                objects,
                FsEntry::file("objects/cat-preservation.tiff").with_use("preservation"),
            )
            .unwrap();
        doc.set_derived_from(derivative, Some(original)).unwrap();

        let bytes = to_bytes_fixed(&mut doc);
        let reparsed = MetsDocument::from_bytes(&bytes).unwrap();

        let found = reparsed.files_by_path("objects/cat-preservation.tiff");
        assert_eq!(found.len(), 1);
        let source = reparsed
            .entry(found[0])
            .unwrap()
            .derived_from()
            .expect("derivation must survive the round trip");
        assert_eq!(
            reparsed.entry(source).unwrap().path(),
            Some("objects/cat.png")
        );
    }

    #[test]
    fn test_scenario_premis_rights_replacement() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("hello.pdf"));

        doc.add_premis_object(file, &PremisObject::new("UUID", "obj-1"))
            .unwrap();
        doc.add_premis_event(
            file,
            &PremisEvent::new("UUID", "evt-1", "ingestion", NOW),
        )
        .unwrap();
        let rights = doc
            .add_premis_rights(file, &PremisRights::new("UUID", "r-1", "copyright"))
            .unwrap();

        let newer = PremisRights::new("UUID", "r-2", "license");
        let newer_id = doc
            .replace_metadata(
                rights,
                MdContents::Wrap(MdWrap::new(newer.fragment().clone(), "PREMIS:RIGHTS")),
            )
            .unwrap();

        let current = doc.get_premis_rights(file).unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(
            current[0].identifier(),
            Some(("UUID".to_string(), "r-2".to_string()))
        );

        // The superseded record is only reachable through the chain
        let old_index = doc.subsection(newer_id).unwrap().older().unwrap();
        let SectionSlot::Amd { section, sub } = rights.slot else {
            panic!("rights must live in an amdSec");
        };
        assert_eq!(old_index, sub);
        let old = &doc.entry(file).unwrap().amdsecs()[section].subsections()[old_index];
        assert!(!old.is_current());
    }

    #[test]
    fn test_scenario_unknown_fileid_fails() {
        let xml = format!(
            r#"<mets:mets xmlns:mets="{METS_NS}" xmlns:xlink="{XLINK_NS}">
  <mets:fileSec>
    <mets:fileGrp USE="original">
      <mets:file ID="file-1111"><mets:FLocat xlink:href="a.txt" LOCTYPE="OTHER"/></mets:file>
    </mets:fileGrp>
  </mets:fileSec>
  <mets:structMap ID="structMap_1" TYPE="physical" LABEL="Archivematica default">
    <mets:div TYPE="Item" LABEL="a.txt"><mets:fptr FILEID="file-9999"/></mets:div>
  </mets:structMap>
</mets:mets>"#
        );
        let err = MetsDocument::from_bytes(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, MetsError::MalformedDocument(_)));
    }

    #[test]
    fn test_serialization_is_idempotent() {
        let mut doc = MetsDocument::new();
        // A stored creation date makes LASTMODDATE appear on every
        // serialization, not just after the first parse.
        doc.createdate = Some("2024-04-30T00:00:00".to_string());
        let objects = doc.append_root(FsEntry::directory("objects"));
        let file = doc
            .append_child(objects, FsEntry::file("objects/with space.png"))
            .unwrap();
        doc.append_child(objects, FsEntry::directory("empty"))
            .unwrap();
        doc.add_premis_object(file, &PremisObject::new("UUID", "obj-1"))
            .unwrap();
        doc.agents.push({
            let mut agent = Agent::new("CREATOR");
            agent.name = Some("test suite".to_string());
            agent
        });

        let first = to_bytes_fixed(&mut doc);
        // Unmutated re-serialization allocates nothing and changes nothing
        assert_eq!(to_bytes_fixed(&mut doc), first);

        let mut reparsed = MetsDocument::from_bytes(&first).unwrap();
        assert_eq!(to_bytes_fixed(&mut reparsed), first);
    }

    #[test]
    fn test_cycle_rejected_without_mutation() {
        let mut doc = MetsDocument::new();
        let outer = doc.append_root(FsEntry::directory("outer"));
        let inner = doc.append_child(outer, FsEntry::directory("inner")).unwrap();

        let err = doc.attach_child(inner, outer).unwrap_err();
        assert!(matches!(err, MetsError::Cycle(_)));
        let err = doc.attach_child(inner, inner).unwrap_err();
        assert!(matches!(err, MetsError::Cycle(_)));

        assert_eq!(doc.roots(), &[outer]);
        assert_eq!(doc.entry(outer).unwrap().children(), &[inner]);
        assert_eq!(doc.entry(inner).unwrap().parent(), Some(outer));
    }

    #[test]
    fn test_append_child_to_item_rejected() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("a.txt"));
        let err = doc.append_child(file, FsEntry::file("b.txt")).unwrap_err();
        assert!(matches!(err, MetsError::InvalidEntryType(_)));
    }

    #[test]
    fn test_remove_reports_dangling_derivation() {
        let mut doc = MetsDocument::new();
        let objects = doc.append_root(FsEntry::directory("objects"));
        let original = doc
            .append_child(
                objects,
                FsEntry::file("objects/cat.png").with_uuid("11111111-2222-4333-8444-555555555555"),
            )
            .unwrap();
        let derivative = doc
            .append_child(
                objects,
                FsEntry::file("objects/cat.tiff")
                    .with_uuid("66666666-7777-4888-9999-000000000000"),
            )
            .unwrap();
        doc.set_derived_from(derivative, Some(original)).unwrap();

        let dangling = doc.remove(original).unwrap();
        assert_eq!(dangling, vec![derivative]);
        assert!(matches!(doc.entry(original), Err(MetsError::NotFound(_))));

        // Serialization falls back to the derivative's own group
        assert_eq!(
            doc.group_id(derivative).as_deref(),
            Some("Group-66666666-7777-4888-9999-000000000000")
        );
    }

    #[test]
    fn test_entry_mut_is_checked() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("a.txt"));
        doc.entry_mut(file).unwrap().set_label("renamed");
        assert_eq!(doc.entry(file).unwrap().label(), Some("renamed"));

        doc.remove(file).unwrap();
        assert!(matches!(doc.entry_mut(file), Err(MetsError::NotFound(_))));
    }

    #[test]
    fn test_get_file_ambiguity() {
        let mut doc = MetsDocument::new();
        let uuid = "11111111-2222-4333-8444-555555555555";
        doc.append_root(FsEntry::file("a.txt").with_uuid(uuid));
        assert!(doc.get_file(uuid).is_ok());
        assert!(matches!(
            doc.get_file("99999999-2222-4333-8444-555555555555"),
            Err(MetsError::NotFound(_))
        ));

        doc.append_root(FsEntry::file("b.txt").with_uuid(uuid));
        assert!(matches!(
            doc.get_file(uuid),
            Err(MetsError::AmbiguousIdentifier(_))
        ));
    }

    #[test]
    fn test_premis_object_routed_to_dmdsec_for_empty_directory() {
        let mut doc = MetsDocument::new();
        let empty = doc.append_root(FsEntry::directory("empty"));
        let id = doc
            .add_premis_object(empty, &PremisObject::new("UUID", "dir-1"))
            .unwrap();
        assert!(matches!(id.slot, SectionSlot::Dmd(0)));
        assert_eq!(doc.get_premis_objects(empty).unwrap().len(), 1);
    }

    #[test]
    fn test_dmdsec_chain_survives_round_trip() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("hello.pdf"));
        let first = doc
            .add_dublin_core(file, crate::xml::text_element(crate::constants::DC_NS, "title", "one"))
            .unwrap();
        // CREATED values must differ for the chain to be ordered on parse,
        // so stamp the first revision before replacing it.
        if let SectionSlot::Dmd(index) = first.slot {
            doc.entry_mut(file).unwrap().dmdsecs[index].created =
                Some("2024-04-01T00:00:00".to_string());
        }
        doc.replace_metadata(
            first,
            MdContents::Wrap(MdWrap::new(
                crate::xml::text_element(crate::constants::DC_NS, "title", "two"),
                "DC",
            )),
        )
        .unwrap();

        let bytes = to_bytes_fixed(&mut doc);
        let reparsed = MetsDocument::from_bytes(&bytes).unwrap();
        let entry_id = reparsed.files_by_path("hello.pdf")[0];
        let current = reparsed
            .current_metadata(entry_id, MdSectionKind::DmdSec)
            .unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].status().as_deref(), Some("update"));
        let older = current[0].older().unwrap();
        let chain_root = &reparsed.entry(entry_id).unwrap().dmdsecs()[older];
        assert_eq!(chain_root.status().as_deref(), Some("original-superseded"));
    }

    #[test]
    fn test_future_createdate_rejected() {
        let xml = format!(
            r#"<mets:mets xmlns:mets="{METS_NS}">
  <mets:metsHdr CREATEDATE="9999-01-01T00:00:00"/>
  <mets:structMap TYPE="physical"/>
</mets:mets>"#
        );
        let err = MetsDocument::from_bytes(xml.as_bytes()).unwrap_err();
        assert!(matches!(err, MetsError::MalformedDocument(_)));
    }

    #[test]
    fn test_non_mets_root_is_schema_mismatch() {
        let err = MetsDocument::from_bytes(b"<not-mets/>").unwrap_err();
        assert!(matches!(err, MetsError::SchemaMismatch(_)));
    }

    #[test]
    fn test_mdref_subsection_round_trip() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("hello.pdf"));
        let mdref = MdRef::new("metadata/rights.xml", "OTHER", "OTHER")
            .unwrap()
            .with_otherloctype("SYSTEM");
        doc.add_rightsmd(file, MdContents::Ref(mdref.clone())).unwrap();

        let bytes = to_bytes_fixed(&mut doc);
        let reparsed = MetsDocument::from_bytes(&bytes).unwrap();
        let entry_id = reparsed.files_by_path("hello.pdf")[0];
        let current = reparsed
            .current_metadata(entry_id, MdSectionKind::RightsMd)
            .unwrap();
        assert_eq!(current.len(), 1);
        assert!(matches!(current[0].contents(), MdContents::Ref(parsed) if *parsed == mdref));
    }

    #[test]
    fn test_empty_directories_survive_round_trip() {
        let mut doc = MetsDocument::new();
        let objects = doc.append_root(FsEntry::directory("objects"));
        doc.append_child(objects, FsEntry::file("objects/cat.png"))
            .unwrap();
        doc.append_child(objects, FsEntry::directory("empty"))
            .unwrap();

        let bytes = to_bytes_fixed(&mut doc);
        let reparsed = MetsDocument::from_bytes(&bytes).unwrap();
        let objects_id = reparsed.roots()[0];
        let labels: Vec<_> = reparsed
            .entry(objects_id)
            .unwrap()
            .children()
            .iter()
            .filter_map(|&child| reparsed.entry(child).unwrap().label().map(str::to_string))
            .collect();
        assert!(labels.contains(&"empty".to_string()));
    }

    #[test]
    fn test_sibling_items_with_same_label_survive_round_trip() {
        let mut doc = MetsDocument::new();
        let objects = doc.append_root(FsEntry::directory("objects"));
        // Sibling files whose basenames collide get identical div labels
        doc.append_child(objects, FsEntry::file("objects/a/cat.png"))
            .unwrap();
        doc.append_child(objects, FsEntry::file("objects/b/cat.png"))
            .unwrap();
        // An empty directory forces the normative structMap to be emitted
        doc.append_child(objects, FsEntry::directory("empty"))
            .unwrap();

        let bytes = to_bytes_fixed(&mut doc);
        let reparsed = MetsDocument::from_bytes(&bytes).unwrap();
        let paths: Vec<_> = reparsed
            .all_entries()
            .into_iter()
            .filter_map(|id| reparsed.entry(id).unwrap().path().map(str::to_string))
            .collect();
        assert_eq!(paths, vec!["objects/a/cat.png", "objects/b/cat.png"]);

        for id in reparsed.files_by_path("objects/b/cat.png") {
            let uuid = reparsed.entry(id).unwrap().file_uuid().unwrap().to_string();
            assert_eq!(reparsed.get_file(&uuid).unwrap(), id);
        }
    }

    #[test]
    fn test_write_and_open_round_trip() {
        let mut doc = MetsDocument::new();
        doc.append_root(FsEntry::file("hello.pdf"));
        let file = tempfile::NamedTempFile::new().unwrap();
        doc.write(file.path(), &SerializeOptions::default()).unwrap();

        let reparsed = MetsDocument::open(file.path()).unwrap();
        assert_eq!(reparsed.files_by_path("hello.pdf").len(), 1);
    }

    #[test]
    fn test_premis_classification_of_parsed_records() {
        let mut doc = MetsDocument::new();
        let file = doc.append_root(FsEntry::file("hello.pdf"));
        doc.add_premis_agent(
            file,
            &PremisAgent::new("UUID", "a-1").with_name("archivematica"),
        )
        .unwrap();

        let bytes = to_bytes_fixed(&mut doc);
        let reparsed = MetsDocument::from_bytes(&bytes).unwrap();
        let entry_id = reparsed.files_by_path("hello.pdf")[0];
        let agents = reparsed.get_premis_agents(entry_id).unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name().as_deref(), Some("archivematica"));

        // Round-tripped fragments classify the same way
        let record = PremisRecord::from_fragment(agents[0].fragment()).unwrap();
        assert_eq!(record.mdtype(), "PREMIS:AGENT");
    }
}
