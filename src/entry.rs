//! Filesystem entries: the files and directories a METS document describes.
//!
//! An [`FsEntry`] is a value type; ownership and linkage (children, parent,
//! derivation) live in the document's entry arena and are addressed through
//! [`EntryId`] handles. Building the `fileSec` and `structMap` views of an
//! entry therefore happens in [`crate::document`] and [`crate::structmap`],
//! which can resolve those handles.

use crate::error::{MetsError, Result};
use crate::metadata::{AmdSec, SubSection};
use crate::xml::Element;

/// Checksum types the METS schema accepts on a `file` element.
pub const ALLOWED_CHECKSUMS: &[&str] = &[
    "Adler-32",
    "CRC32",
    "HAVAL",
    "MD5",
    "MNP",
    "SHA-1",
    "SHA-256",
    "SHA-384",
    "SHA-512",
    "TIGER WHIRLPOOL",
];

/// Handle to an entry inside a [`crate::MetsDocument`].
///
/// Handles are never reused; after the entry is removed the handle resolves
/// to `NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub(crate) usize);

/// What an entry is, which controls where it appears on serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A file: listed in the fileSec, a leaf in the structMap.
    Item,
    /// A directory: a structMap division that may contain children.
    Directory,
    /// A file that stands for a packed directory (e.g. a disk image):
    /// listed in the fileSec but presented as a `Directory` division.
    DirectoryAsItem,
}

impl EntryKind {
    /// TYPE attribute emitted on this entry's structMap division.
    pub fn div_type(&self) -> &'static str {
        match self {
            EntryKind::Item => "Item",
            EntryKind::Directory | EntryKind::DirectoryAsItem => "Directory",
        }
    }

    /// Whether entries of this kind belong in the fileSec.
    #[inline]
    pub fn in_file_sec(&self) -> bool {
        matches!(self, EntryKind::Item | EntryKind::DirectoryAsItem)
    }

    /// Whether entries of this kind may own children.
    #[inline]
    pub fn can_have_children(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// A `transformFile` element: the steps required to unpack or transform the
/// subsidiary files of a `file` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformFile {
    pub transform_type: Option<String>,
    pub algorithm: Option<String>,
    pub order: Option<String>,
    pub key: Option<String>,
    pub behavior: Option<String>,
}

impl TransformFile {
    const ATTRS: &'static [&'static str] = &[
        "TRANSFORMTYPE",
        "TRANSFORMALGORITHM",
        "TRANSFORMORDER",
        "TRANSFORMKEY",
        "TRANSFORMBEHAVIOR",
    ];

    pub(crate) fn parse(el: &Element) -> Self {
        let get = |name: &str| el.attr(name).map(str::to_string);
        Self {
            transform_type: get("TRANSFORMTYPE"),
            algorithm: get("TRANSFORMALGORITHM"),
            order: get("TRANSFORMORDER"),
            key: get("TRANSFORMKEY"),
            behavior: get("TRANSFORMBEHAVIOR"),
        }
    }

    pub(crate) fn serialize(&self) -> Element {
        let mut el = Element::in_ns(crate::constants::METS_NS, "transformFile");
        let values = [
            self.transform_type.as_deref(),
            self.algorithm.as_deref(),
            self.order.as_deref(),
            self.key.as_deref(),
            self.behavior.as_deref(),
        ];
        for (name, value) in Self::ATTRS.iter().zip(values) {
            if let Some(value) = value {
                el.set_attr(*name, value);
            }
        }
        el
    }
}

/// One file or directory in the document.
///
/// The tree of entries is used to construct the `fileSec` and `structMap`
/// elements on serialization; metadata attached to an entry becomes
/// `amdSec`/`dmdSec` elements cross-referenced from it.
#[derive(Debug, Clone)]
pub struct FsEntry {
    pub(crate) path: Option<String>,
    pub(crate) label: Option<String>,
    pub(crate) use_: Option<String>,
    pub(crate) kind: EntryKind,
    pub(crate) file_uuid: Option<String>,
    pub(crate) checksum: Option<String>,
    pub(crate) checksum_type: Option<String>,
    pub(crate) transform_files: Vec<TransformFile>,
    pub(crate) derived_from: Option<EntryId>,
    pub(crate) parent: Option<EntryId>,
    pub(crate) children: Vec<EntryId>,
    pub(crate) amdsecs: Vec<AmdSec>,
    pub(crate) dmdsecs: Vec<SubSection>,
}

impl FsEntry {
    fn bare(kind: EntryKind) -> Self {
        Self {
            path: None,
            label: None,
            use_: Some("original".to_string()),
            kind,
            file_uuid: None,
            checksum: None,
            checksum_type: None,
            transform_files: Vec::new(),
            derived_from: None,
            parent: None,
            children: Vec::new(),
            amdsecs: Vec::new(),
            dmdsecs: Vec::new(),
        }
    }

    /// Create a file entry. The label defaults to the path's basename and
    /// the use to `"original"`.
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        let label = path.rsplit('/').next().map(str::to_string);
        let mut entry = Self::bare(EntryKind::Item);
        entry.path = Some(path);
        entry.label = label;
        entry
    }

    /// Create a directory entry with the given structMap label.
    pub fn directory(label: impl Into<String>) -> Self {
        let mut entry = Self::bare(EntryKind::Directory);
        entry.label = Some(label.into());
        entry
    }

    /// Create a purely structural item: no path, so it appears in the
    /// structMap but not in the fileSec.
    pub fn structural(label: impl Into<String>) -> Self {
        let mut entry = Self::bare(EntryKind::Item);
        entry.label = Some(label.into());
        entry.use_ = None;
        entry
    }

    /// Override the entry kind.
    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }

    /// Override the structMap label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Change the structMap label in place.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Set the fileGrp use; entries with identical uses are grouped together.
    pub fn with_use(mut self, use_: impl Into<String>) -> Self {
        self.use_ = Some(use_.into());
        self
    }

    /// Assign the file identifier explicitly instead of letting the document
    /// generate one at serialization time.
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.file_uuid = Some(uuid.into());
        self
    }

    /// Record the file's checksum.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `checksum_type` is not one of
    /// [`ALLOWED_CHECKSUMS`].
    pub fn with_checksum(
        mut self,
        checksum: impl Into<String>,
        checksum_type: &str,
    ) -> Result<Self> {
        if !ALLOWED_CHECKSUMS.contains(&checksum_type) {
            return Err(MetsError::InvalidArgument(format!(
                "{checksum_type} must be one of {ALLOWED_CHECKSUMS:?}"
            )));
        }
        self.checksum = Some(checksum.into());
        self.checksum_type = Some(checksum_type.to_string());
        Ok(self)
    }

    /// Attach a `transformFile` description.
    pub fn with_transform_file(mut self, transform: TransformFile) -> Self {
        self.transform_files.push(transform);
        self
    }

    // ACCESSORS

    #[inline]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[inline]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[inline]
    pub fn use_(&self) -> Option<&str> {
        self.use_.as_deref()
    }

    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The assigned identifier, `None` until first serialization or an
    /// explicit [`FsEntry::with_uuid`]. Immutable once assigned.
    #[inline]
    pub fn file_uuid(&self) -> Option<&str> {
        self.file_uuid.as_deref()
    }

    #[inline]
    pub fn checksum(&self) -> Option<(&str, &str)> {
        match (self.checksum.as_deref(), self.checksum_type.as_deref()) {
            (Some(sum), Some(kind)) => Some((sum, kind)),
            _ => None,
        }
    }

    #[inline]
    pub fn transform_files(&self) -> &[TransformFile] {
        &self.transform_files
    }

    /// Entry this one was derived from, if any.
    #[inline]
    pub fn derived_from(&self) -> Option<EntryId> {
        self.derived_from
    }

    #[inline]
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    /// Ordered children of this entry.
    #[inline]
    pub fn children(&self) -> &[EntryId] {
        &self.children
    }

    /// Administrative metadata sections attached to this entry.
    #[inline]
    pub fn amdsecs(&self) -> &[AmdSec] {
        &self.amdsecs
    }

    /// Descriptive metadata subsections attached to this entry.
    #[inline]
    pub fn dmdsecs(&self) -> &[SubSection] {
        &self.dmdsecs
    }

    /// The `fptr/@FILEID` for this entry, present once the entry both
    /// belongs in the fileSec and has an identifier.
    pub fn file_id(&self) -> Option<String> {
        if !self.kind.in_file_sec() {
            return None;
        }
        self.file_uuid
            .as_deref()
            .map(|uuid| format!("{}{uuid}", crate::constants::FILE_ID_PREFIX))
    }

    /// IDs of the administrative metadata sections, for `file/@ADMID`.
    pub fn admids(&self) -> Vec<&str> {
        self.amdsecs.iter().filter_map(|a| a.id()).collect()
    }

    /// IDs of the descriptive metadata sections, for `div/@DMDID`.
    pub fn dmdids(&self) -> Vec<&str> {
        self.dmdsecs.iter().filter_map(|d| d.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_defaults() {
        let entry = FsEntry::file("objects/cat.png");
        assert_eq!(entry.kind(), EntryKind::Item);
        assert_eq!(entry.label(), Some("cat.png"));
        assert_eq!(entry.use_(), Some("original"));
        assert_eq!(entry.file_uuid(), None);
    }

    #[test]
    fn test_checksum_validation() {
        assert!(FsEntry::file("a.txt").with_checksum("d41d8", "MD5").is_ok());
        assert!(FsEntry::file("a.txt").with_checksum("d41d8", "md5").is_err());
    }

    #[test]
    fn test_file_id_requires_filesec_kind_and_uuid() {
        let dir = FsEntry::directory("objects");
        assert_eq!(dir.file_id(), None);

        let item = FsEntry::file("a.txt");
        assert_eq!(item.file_id(), None);

        let item = item.with_uuid("123e4567-e89b-42d3-a456-426614174000");
        assert_eq!(
            item.file_id().as_deref(),
            Some("file-123e4567-e89b-42d3-a456-426614174000")
        );
    }

    #[test]
    fn test_transform_file_round_trip() {
        let tf = TransformFile {
            transform_type: Some("decompression".to_string()),
            algorithm: Some("bzip2".to_string()),
            order: Some("1".to_string()),
            key: None,
            behavior: None,
        };
        let el = tf.serialize();
        assert_eq!(el.attr("TRANSFORMTYPE"), Some("decompression"));
        assert_eq!(el.attr("TRANSFORMKEY"), None);
        assert_eq!(TransformFile::parse(&el), tf);
    }
}
