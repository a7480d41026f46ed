//! Metadata sections of a METS document: amdSec, dmdSec, their versioned
//! subsections (techMD, rightsMD, sourceMD, digiprovMD), the mdWrap/mdRef
//! payload carriers, and the metsHdr agent and altRecordID records.
//!
//! Subsection revisions form append-only chains: replacing a subsection
//! appends a new one and links it to the old via `older`/`newer` indices
//! into the owning section's subsection vector. History is never rewritten
//! in place, and deletion only sets a tombstone.

use crate::constants::{METS_NS, XLINK_NS, percent_decode_path, percent_encode_path};
use crate::error::{MetsError, Result};
use crate::xml::{Element, text_element};

/// Tag of a metadata subsection.
///
/// The first four live inside an `amdSec`; `DmdSec` subsections are
/// emitted as top-level `dmdSec` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MdSectionKind {
    TechMd,
    RightsMd,
    SourceMd,
    DigiprovMd,
    DmdSec,
}

impl MdSectionKind {
    /// The METS element name for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            MdSectionKind::TechMd => "techMD",
            MdSectionKind::RightsMd => "rightsMD",
            MdSectionKind::SourceMd => "sourceMD",
            MdSectionKind::DigiprovMd => "digiprovMD",
            MdSectionKind::DmdSec => "dmdSec",
        }
    }

    /// Inverse of [`MdSectionKind::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "techMD" => Some(MdSectionKind::TechMd),
            "rightsMD" => Some(MdSectionKind::RightsMd),
            "sourceMD" => Some(MdSectionKind::SourceMd),
            "digiprovMD" => Some(MdSectionKind::DigiprovMd),
            "dmdSec" => Some(MdSectionKind::DmdSec),
            _ => None,
        }
    }

    // Schema-mandated child order inside an amdSec:
    // techMD, rightsMD, sourceMD, digiprovMD.
    fn rank(&self) -> usize {
        match self {
            MdSectionKind::TechMd => 0,
            MdSectionKind::RightsMd => 1,
            MdSectionKind::SourceMd => 2,
            MdSectionKind::DigiprovMd => 3,
            MdSectionKind::DmdSec => 4,
        }
    }
}

/// An XML document enclosed verbatim in the METS document.
///
/// The payload is opaque to the core; only the PREMIS adapter interprets it.
#[derive(Debug, Clone, PartialEq)]
pub struct MdWrap {
    mdtype: String,
    othermdtype: Option<String>,
    fragments: Vec<Element>,
}

impl MdWrap {
    /// Wrap a single fragment with the given `MDTYPE` (e.g. `PREMIS:OBJECT`,
    /// `DC`, `OTHER`).
    pub fn new(fragment: Element, mdtype: impl Into<String>) -> Self {
        Self { mdtype: mdtype.into(), othermdtype: None, fragments: vec![fragment] }
    }

    /// Set `OTHERMDTYPE`; meaningful when mdtype is `OTHER`.
    pub fn with_othermdtype(mut self, othermdtype: impl Into<String>) -> Self {
        self.othermdtype = Some(othermdtype.into());
        self
    }

    #[inline]
    pub fn mdtype(&self) -> &str {
        &self.mdtype
    }

    #[inline]
    pub fn othermdtype(&self) -> Option<&str> {
        self.othermdtype.as_deref()
    }

    /// The enclosed fragments (children of `xmlData`).
    #[inline]
    pub fn fragments(&self) -> &[Element] {
        &self.fragments
    }

    pub(crate) fn parse(el: &Element) -> Result<Self> {
        if !el.is(METS_NS, "mdWrap") {
            return Err(MetsError::MalformedDocument(
                "MdWrap can only parse mdWrap elements with METS namespace".to_string(),
            ));
        }
        let mdtype = el
            .attr("MDTYPE")
            .ok_or_else(|| MetsError::MalformedDocument("mdWrap must have a MDTYPE".to_string()))?
            .to_string();
        let othermdtype = el.attr("OTHERMDTYPE").map(str::to_string);
        let fragments: Vec<Element> = el
            .find(METS_NS, "xmlData")
            .map(|xmldata| xmldata.children().cloned().collect())
            .unwrap_or_default();
        if fragments.is_empty() {
            return Err(MetsError::MalformedDocument(
                "mdWrap/xmlData must have at least one child".to_string(),
            ));
        }
        Ok(Self { mdtype, othermdtype, fragments })
    }

    pub(crate) fn serialize(&self) -> Element {
        let mut el = Element::in_ns(METS_NS, "mdWrap");
        el.set_attr("MDTYPE", &self.mdtype);
        if let Some(other) = &self.othermdtype {
            el.set_attr("OTHERMDTYPE", other);
        }
        let mut xmldata = Element::in_ns(METS_NS, "xmlData");
        for fragment in &self.fragments {
            xmldata.append(fragment.clone());
        }
        el.append(xmldata);
        el
    }
}

/// Valid `mdRef/@LOCTYPE` values.
pub const VALID_LOCTYPE: &[&str] = &["ARK", "URN", "URL", "PURL", "HANDLE", "DOI", "OTHER"];

/// A reference to an external metadata document.
///
/// The existence of the target is not validated.
#[derive(Debug, Clone, PartialEq)]
pub struct MdRef {
    target: String,
    mdtype: String,
    loctype: String,
    label: Option<String>,
    otherloctype: Option<String>,
    xptr: Option<String>,
    othermdtype: Option<String>,
}

impl MdRef {
    /// Create a reference to `target` of the given `MDTYPE` and `LOCTYPE`.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `loctype` is not in [`VALID_LOCTYPE`].
    pub fn new(
        target: impl Into<String>,
        mdtype: impl Into<String>,
        loctype: &str,
    ) -> Result<Self> {
        if !VALID_LOCTYPE.contains(&loctype) {
            return Err(MetsError::InvalidArgument(format!(
                "loctype must be one of {}",
                VALID_LOCTYPE.join(", ")
            )));
        }
        Ok(Self {
            target: target.into(),
            mdtype: mdtype.into(),
            loctype: loctype.to_string(),
            label: None,
            otherloctype: None,
            xptr: None,
            othermdtype: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_otherloctype(mut self, otherloctype: impl Into<String>) -> Self {
        self.otherloctype = Some(otherloctype.into());
        self
    }

    pub fn with_xptr(mut self, xptr: impl Into<String>) -> Self {
        self.xptr = Some(xptr.into());
        self
    }

    pub fn with_othermdtype(mut self, othermdtype: impl Into<String>) -> Self {
        self.othermdtype = Some(othermdtype.into());
        self
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    pub fn mdtype(&self) -> &str {
        &self.mdtype
    }

    #[inline]
    pub fn loctype(&self) -> &str {
        &self.loctype
    }

    pub(crate) fn parse(el: &Element) -> Result<Self> {
        if !el.is(METS_NS, "mdRef") {
            return Err(MetsError::MalformedDocument(
                "MdRef can only parse mdRef elements with METS namespace".to_string(),
            ));
        }
        let mdtype = el
            .attr("MDTYPE")
            .ok_or_else(|| MetsError::MalformedDocument("mdRef must have a MDTYPE".to_string()))?
            .to_string();
        let target = el.attr_in(XLINK_NS, "href").ok_or_else(|| {
            MetsError::MalformedDocument("mdRef must have an xlink:href".to_string())
        })?;
        let target = percent_decode_path(target)?;
        let loctype = el
            .attr("LOCTYPE")
            .ok_or_else(|| MetsError::MalformedDocument("mdRef must have a LOCTYPE".to_string()))?
            .to_string();
        Ok(Self {
            target,
            mdtype,
            loctype,
            label: el.attr("LABEL").map(str::to_string),
            otherloctype: el.attr("OTHERLOCTYPE").map(str::to_string),
            xptr: el.attr("XPTR").map(str::to_string),
            othermdtype: el.attr("OTHERMDTYPE").map(str::to_string),
        })
    }

    pub(crate) fn serialize(&self) -> Element {
        let mut el = Element::in_ns(METS_NS, "mdRef");
        if let Some(label) = &self.label {
            el.set_attr("LABEL", label);
        }
        el.set_attr_in(XLINK_NS, "href", percent_encode_path(&self.target));
        el.set_attr("MDTYPE", &self.mdtype);
        el.set_attr("LOCTYPE", &self.loctype);
        if let Some(otherloctype) = &self.otherloctype {
            el.set_attr("OTHERLOCTYPE", otherloctype);
        }
        if let Some(xptr) = &self.xptr {
            el.set_attr("XPTR", xptr);
        }
        if let Some(othermdtype) = &self.othermdtype {
            el.set_attr("OTHERMDTYPE", othermdtype);
        }
        el
    }
}

/// The payload of a subsection: a wrapped copy or an external reference.
#[derive(Debug, Clone, PartialEq)]
pub enum MdContents {
    Wrap(MdWrap),
    Ref(MdRef),
}

impl MdContents {
    /// `MDTYPE` of the payload, whichever carrier holds it.
    pub fn mdtype(&self) -> &str {
        match self {
            MdContents::Wrap(wrap) => wrap.mdtype(),
            MdContents::Ref(r) => r.mdtype(),
        }
    }

    fn serialize(&self) -> Element {
        match self {
            MdContents::Wrap(wrap) => wrap.serialize(),
            MdContents::Ref(r) => r.serialize(),
        }
    }
}

/// One revision of a metadata payload.
#[derive(Debug, Clone)]
pub struct SubSection {
    pub(crate) kind: MdSectionKind,
    pub(crate) contents: MdContents,
    pub(crate) id: Option<String>,
    pub(crate) created: Option<String>,
    pub(crate) status_override: Option<String>,
    pub(crate) group_id: Option<String>,
    pub(crate) deleted: bool,
    pub(crate) older: Option<usize>,
    pub(crate) newer: Option<usize>,
}

impl SubSection {
    /// Create a fresh, current subsection. The identifier and creation
    /// timestamp are assigned at serialization time.
    pub fn new(kind: MdSectionKind, contents: MdContents) -> Self {
        Self {
            kind,
            contents,
            id: None,
            created: None,
            status_override: None,
            group_id: None,
            deleted: false,
            older: None,
            newer: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> MdSectionKind {
        self.kind
    }

    #[inline]
    pub fn contents(&self) -> &MdContents {
        &self.contents
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    #[inline]
    pub fn created(&self) -> Option<&str> {
        self.created.as_deref()
    }

    #[inline]
    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    /// Index of the revision this one replaced, within the owning section.
    #[inline]
    pub fn older(&self) -> Option<usize> {
        self.older
    }

    /// Index of the revision that replaced this one.
    #[inline]
    pub fn newer(&self) -> Option<usize> {
        self.newer
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// A subsection is current when it is the tip of its revision chain and
    /// has not been tombstoned. Parsed subsections whose STATUS marks them
    /// superseded are not current even when their chain was not relinked.
    pub fn is_current(&self) -> bool {
        if self.newer.is_some() || self.deleted {
            return false;
        }
        !self
            .status_override
            .as_deref()
            .is_some_and(|status| status.ends_with("superseded"))
    }

    /// The `STATUS` attribute value for serialization.
    ///
    /// Computed from the revision links unless the subsection was parsed
    /// with an explicit status or tombstoned.
    pub fn status(&self) -> Option<String> {
        if self.deleted {
            return Some("deleted".to_string());
        }
        if let Some(status) = &self.status_override {
            return Some(status.clone());
        }
        match self.kind {
            MdSectionKind::DmdSec => {
                let mut status =
                    if self.older.is_none() { "original" } else { "update" }.to_string();
                if self.newer.is_some() {
                    status.push_str("-superseded");
                }
                Some(status)
            }
            MdSectionKind::TechMd | MdSectionKind::RightsMd => Some(
                if self.newer.is_none() { "current" } else { "superseded" }.to_string(),
            ),
            _ => None,
        }
    }

    /// Mark this subsection deleted without removing it from the chain.
    ///
    /// Deleted subsections are excluded from current queries but retained
    /// for serialization so history stays inspectable.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    pub(crate) fn parse(el: &Element) -> Result<Self> {
        let kind = el
            .ns()
            .filter(|ns| *ns == METS_NS)
            .and_then(|_| MdSectionKind::from_tag(el.name()))
            .ok_or_else(|| {
                MetsError::MalformedDocument(format!(
                    "cannot parse {} as a metadata subsection",
                    el.name()
                ))
            })?;
        let contents = match el.children().next() {
            Some(child) if child.is(METS_NS, "mdWrap") => MdContents::Wrap(MdWrap::parse(child)?),
            Some(child) if child.is(METS_NS, "mdRef") => MdContents::Ref(MdRef::parse(child)?),
            _ => {
                return Err(MetsError::MalformedDocument(format!(
                    "child of {} must be mdWrap or mdRef",
                    kind.tag()
                )));
            }
        };
        let mut sub = SubSection::new(kind, contents);
        sub.id = el.attr("ID").map(str::to_string);
        sub.created = el.attr("CREATED").map(str::to_string);
        sub.group_id = el.attr("GROUPID").map(str::to_string);
        match el.attr("STATUS") {
            Some("deleted") => sub.deleted = true,
            Some(status) if !status.is_empty() => sub.status_override = Some(status.to_string()),
            _ => {}
        }
        Ok(sub)
    }

    /// Serialize this subsection, using `now` as CREATED when none was set.
    pub(crate) fn serialize(&self, now: &str) -> Result<Element> {
        let id = self.id.as_deref().ok_or_else(|| {
            MetsError::InvalidState(format!("{} has no identifier assigned", self.kind.tag()))
        })?;
        let mut el = Element::in_ns(METS_NS, self.kind.tag());
        el.set_attr("ID", id);
        el.set_attr("CREATED", self.created.as_deref().unwrap_or(now));
        if let Some(status) = self.status() {
            el.set_attr("STATUS", status);
        }
        if let Some(group_id) = &self.group_id {
            el.set_attr("GROUPID", group_id);
        }
        el.append(self.contents.serialize());
        Ok(el)
    }
}

/// Append `new_sub` to `subsections` as the replacement of the revision at
/// `old`, linking the chain.
///
/// # Errors
/// - `NotFound` if `old` is out of bounds.
/// - `InvalidArgument` if the kinds differ (a techMD can only replace a
///   techMD, etc.).
/// - `InvalidState` if the old revision is not the chain tip, or deleted:
///   the chain is append-only from the tip only.
pub(crate) fn replace_in(
    subsections: &mut Vec<SubSection>,
    old: usize,
    mut new_sub: SubSection,
) -> Result<usize> {
    let old_sub = subsections
        .get(old)
        .ok_or_else(|| MetsError::NotFound("no such subsection".to_string()))?;
    if old_sub.kind != new_sub.kind {
        return Err(MetsError::InvalidArgument(
            "must replace a subsection with one of the same kind".to_string(),
        ));
    }
    if old_sub.deleted {
        return Err(MetsError::InvalidState(
            "cannot replace a deleted subsection".to_string(),
        ));
    }
    if !old_sub.is_current() {
        return Err(MetsError::InvalidState(
            "subsection is already superseded".to_string(),
        ));
    }
    new_sub.older = Some(old);
    new_sub.newer = None;
    let new_index = subsections.len();
    subsections.push(new_sub);
    subsections[old].newer = Some(new_index);
    subsections[old].status_override = None;
    Ok(new_index)
}

/// Current (chain-tip, non-deleted) subsections of `kind`, in storage order.
pub(crate) fn current_of(
    subsections: &[SubSection],
    kind: MdSectionKind,
) -> impl Iterator<Item = (usize, &SubSection)> {
    subsections
        .iter()
        .enumerate()
        .filter(move |(_, sub)| sub.kind == kind && sub.is_current())
}

/// Length of the `older`-linked chain ending at `tip`, including the tip.
pub(crate) fn chain_len(subsections: &[SubSection], tip: usize) -> usize {
    let mut len = 0;
    let mut cursor = Some(tip);
    while let Some(index) = cursor {
        len += 1;
        cursor = subsections.get(index).and_then(|sub| sub.older);
        if len > subsections.len() {
            break; // defends against a corrupted chain
        }
    }
    len
}

/// A section of administrative metadata: an identified group of techMD,
/// rightsMD, sourceMD and digiprovMD subsections owned by one entry.
#[derive(Debug, Clone, Default)]
pub struct AmdSec {
    pub(crate) id: Option<String>,
    pub(crate) subsections: Vec<SubSection>,
}

impl AmdSec {
    /// Create an empty section; its identifier is assigned lazily.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// All subsections, including superseded and deleted revisions.
    #[inline]
    pub fn subsections(&self) -> &[SubSection] {
        &self.subsections
    }

    /// Current subsections of `kind`.
    pub fn current(&self, kind: MdSectionKind) -> impl Iterator<Item = &SubSection> {
        current_of(&self.subsections, kind).map(|(_, sub)| sub)
    }

    pub(crate) fn parse(el: &Element) -> Result<Self> {
        if !el.is(METS_NS, "amdSec") {
            return Err(MetsError::MalformedDocument(
                "AmdSec can only parse amdSec elements with METS namespace".to_string(),
            ));
        }
        let mut amdsec = AmdSec::new();
        amdsec.id = el.attr("ID").map(str::to_string);
        for child in el.children() {
            amdsec.subsections.push(SubSection::parse(child)?);
        }
        Ok(amdsec)
    }

    /// Serialize this amdSec and all its subsections, ordered by kind as
    /// the schema requires (stable within a kind).
    pub(crate) fn serialize(&self, now: &str) -> Result<Element> {
        let id = self.id.as_deref().ok_or_else(|| {
            MetsError::InvalidState("amdSec has no identifier assigned".to_string())
        })?;
        let mut el = Element::in_ns(METS_NS, "amdSec");
        el.set_attr("ID", id);
        let mut ordered: Vec<&SubSection> = self.subsections.iter().collect();
        ordered.sort_by_key(|sub| sub.kind.rank());
        for sub in ordered {
            el.append(sub.serialize(now)?);
        }
        Ok(el)
    }
}

/// Roles the METS schema defines for header agents; anything else is
/// serialized as `OTHER` with an `OTHERROLE`.
pub const AGENT_ROLES: &[&str] = &[
    "CREATOR",
    "EDITOR",
    "ARCHIVIST",
    "PRESERVATION",
    "DISSEMINATOR",
    "CUSTODIAN",
    "IPOWNER",
];

/// Agent types the METS schema defines.
pub const AGENT_TYPES: &[&str] = &["INDIVIDUAL", "ORGANIZATION"];

/// An agent with a relationship to the METS record, recorded in the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub role: String,
    pub id: Option<String>,
    pub agent_type: Option<String>,
    pub name: Option<String>,
    pub notes: Vec<String>,
}

impl Agent {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into(), id: None, agent_type: None, name: None, notes: Vec::new() }
    }

    pub(crate) fn parse(el: &Element) -> Result<Self> {
        if !el.is(METS_NS, "agent") {
            return Err(MetsError::MalformedDocument(
                "Agent can only parse agent elements with METS namespace".to_string(),
            ));
        }
        let mut role = el
            .attr("ROLE")
            .ok_or_else(|| {
                MetsError::MalformedDocument("agent must have a ROLE attribute".to_string())
            })?
            .to_string();
        if role == "OTHER"
            && let Some(other) = el.attr("OTHERROLE")
        {
            role = other.to_string();
        }
        let mut agent_type = el.attr("TYPE").map(str::to_string);
        if agent_type.as_deref() == Some("OTHER")
            && let Some(other) = el.attr("OTHERTYPE")
        {
            agent_type = Some(other.to_string());
        }
        Ok(Self {
            role,
            id: el.attr("ID").map(str::to_string),
            agent_type,
            name: el.find(METS_NS, "name").and_then(|name| name.text()),
            notes: el
                .find_all(METS_NS, "note")
                .filter_map(|note| note.text())
                .collect(),
        })
    }

    pub(crate) fn serialize(&self) -> Element {
        let mut el = Element::in_ns(METS_NS, "agent");
        if let Some(id) = &self.id {
            el.set_attr("ID", id);
        }
        if AGENT_ROLES.contains(&self.role.as_str()) {
            el.set_attr("ROLE", &self.role);
        } else {
            el.set_attr("ROLE", "OTHER");
            el.set_attr("OTHERROLE", &self.role);
        }
        if let Some(agent_type) = &self.agent_type {
            if AGENT_TYPES.contains(&agent_type.as_str()) {
                el.set_attr("TYPE", agent_type);
            } else {
                el.set_attr("TYPE", "OTHER");
                el.set_attr("OTHERTYPE", agent_type);
            }
        }
        if let Some(name) = &self.name {
            el.append(text_element(METS_NS, "name", name));
        }
        for note in &self.notes {
            el.append(text_element(METS_NS, "note", note));
        }
        el
    }
}

/// An alternative record identifier in the header (alternatives to OBJID).
#[derive(Debug, Clone, PartialEq)]
pub struct AltRecordId {
    pub text: String,
    pub id: Option<String>,
    pub record_type: Option<String>,
}

impl AltRecordId {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), id: None, record_type: None }
    }

    pub(crate) fn parse(el: &Element) -> Result<Self> {
        if !el.is(METS_NS, "altRecordID") {
            return Err(MetsError::MalformedDocument(
                "AltRecordId can only parse altRecordID elements with METS namespace".to_string(),
            ));
        }
        Ok(Self {
            text: el.text().unwrap_or_default(),
            id: el.attr("ID").map(str::to_string),
            record_type: el.attr("TYPE").map(str::to_string),
        })
    }

    pub(crate) fn serialize(&self) -> Element {
        let mut el = Element::in_ns(METS_NS, "altRecordID");
        if let Some(id) = &self.id {
            el.set_attr("ID", id);
        }
        if let Some(record_type) = &self.record_type {
            el.set_attr("TYPE", record_type);
        }
        el.append_text(&self.text);
        el
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PREMIS_NS;

    fn wrap(mdtype: &str) -> MdContents {
        MdContents::Wrap(MdWrap::new(Element::in_ns(PREMIS_NS, "object"), mdtype))
    }

    fn with_id(mut sub: SubSection, id: &str) -> SubSection {
        sub.id = Some(id.to_string());
        sub
    }

    #[test]
    fn test_replace_links_chain() {
        let mut subsections = vec![SubSection::new(MdSectionKind::RightsMd, wrap("PREMIS:RIGHTS"))];
        let new_index = replace_in(
            &mut subsections,
            0,
            SubSection::new(MdSectionKind::RightsMd, wrap("PREMIS:RIGHTS")),
        )
        .unwrap();
        assert_eq!(new_index, 1);
        assert_eq!(subsections[0].newer(), Some(1));
        assert_eq!(subsections[1].older(), Some(0));
        assert!(!subsections[0].is_current());
        assert!(subsections[1].is_current());
    }

    #[test]
    fn test_replace_chain_invariant_after_n_replacements() {
        let n = 5;
        let mut subsections = vec![SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT"))];
        let mut tip = 0;
        for _ in 0..n {
            tip = replace_in(
                &mut subsections,
                tip,
                SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT")),
            )
            .unwrap();
        }
        let current: Vec<_> = current_of(&subsections, MdSectionKind::TechMd).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].0, tip);
        assert_eq!(chain_len(&subsections, tip), n + 1);
    }

    #[test]
    fn test_replace_rejects_non_tip_and_wrong_kind() {
        let mut subsections = vec![SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT"))];
        replace_in(
            &mut subsections,
            0,
            SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT")),
        )
        .unwrap();

        // Replacing from anywhere but the tip is rejected, state unchanged
        let err = replace_in(
            &mut subsections,
            0,
            SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT")),
        )
        .unwrap_err();
        assert!(matches!(err, MetsError::InvalidState(_)));
        assert_eq!(subsections.len(), 2);

        let err = replace_in(
            &mut subsections,
            1,
            SubSection::new(MdSectionKind::RightsMd, wrap("PREMIS:RIGHTS")),
        )
        .unwrap_err();
        assert!(matches!(err, MetsError::InvalidArgument(_)));
    }

    #[test]
    fn test_mark_deleted_excluded_from_current() {
        let mut subsections = vec![SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT"))];
        subsections[0].mark_deleted();
        assert_eq!(current_of(&subsections, MdSectionKind::TechMd).count(), 0);
        assert_eq!(subsections[0].status().as_deref(), Some("deleted"));
        // Still present for history inspection
        assert_eq!(subsections.len(), 1);
    }

    #[test]
    fn test_dmdsec_status_strings() {
        let mut subsections = vec![SubSection::new(MdSectionKind::DmdSec, wrap("DC"))];
        assert_eq!(subsections[0].status().as_deref(), Some("original"));
        let tip =
            replace_in(&mut subsections, 0, SubSection::new(MdSectionKind::DmdSec, wrap("DC")))
                .unwrap();
        assert_eq!(subsections[0].status().as_deref(), Some("original-superseded"));
        assert_eq!(subsections[tip].status().as_deref(), Some("update"));
    }

    #[test]
    fn test_subsection_serialize_and_parse() {
        let sub = with_id(
            SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT")),
            "techMD_1",
        );
        let el = sub.serialize("2024-05-01T10:00:00").unwrap();
        assert_eq!(el.attr("ID"), Some("techMD_1"));
        assert_eq!(el.attr("CREATED"), Some("2024-05-01T10:00:00"));
        assert_eq!(el.attr("STATUS"), Some("current"));

        let parsed = SubSection::parse(&el).unwrap();
        assert_eq!(parsed.kind(), MdSectionKind::TechMd);
        assert_eq!(parsed.id(), Some("techMD_1"));
        assert_eq!(parsed.contents().mdtype(), "PREMIS:OBJECT");
    }

    #[test]
    fn test_subsection_parse_rejects_missing_payload() {
        let mut el = Element::in_ns(METS_NS, "techMD");
        el.set_attr("ID", "techMD_1");
        assert!(matches!(
            SubSection::parse(&el).unwrap_err(),
            MetsError::MalformedDocument(_)
        ));
    }

    #[test]
    fn test_amdsec_orders_subsections_by_kind() {
        let mut amdsec = AmdSec::new();
        amdsec.id = Some("amdSec_1".to_string());
        amdsec.subsections.push(with_id(
            SubSection::new(MdSectionKind::DigiprovMd, wrap("PREMIS:EVENT")),
            "digiprovMD_1",
        ));
        amdsec.subsections.push(with_id(
            SubSection::new(MdSectionKind::TechMd, wrap("PREMIS:OBJECT")),
            "techMD_1",
        ));
        let el = amdsec.serialize("2024-05-01T10:00:00").unwrap();
        let tags: Vec<_> = el.children().map(|child| child.name().to_string()).collect();
        assert_eq!(tags, vec!["techMD", "digiprovMD"]);
    }

    #[test]
    fn test_mdref_validation_and_round_trip() {
        assert!(MdRef::new("meta.xml", "OTHER", "NOPE").is_err());
        let mdref = MdRef::new("docs/meta data.xml", "OTHER", "OTHER")
            .unwrap()
            .with_otherloctype("SYSTEM")
            .with_label("metadata");
        let el = mdref.serialize();
        assert_eq!(el.attr_in(XLINK_NS, "href"), Some("docs/meta%20data.xml"));
        assert_eq!(MdRef::parse(&el).unwrap(), mdref);
    }

    #[test]
    fn test_agent_other_role_round_trip() {
        let mut agent = Agent::new("BUILD SYSTEM");
        agent.agent_type = Some("software".to_string());
        agent.name = Some("archivematica".to_string());
        agent.notes.push("note one".to_string());
        let el = agent.serialize();
        assert_eq!(el.attr("ROLE"), Some("OTHER"));
        assert_eq!(el.attr("OTHERROLE"), Some("BUILD SYSTEM"));
        assert_eq!(el.attr("TYPE"), Some("OTHER"));
        assert_eq!(Agent::parse(&el).unwrap(), agent);
    }
}
