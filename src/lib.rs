//! Read and write METS documents.
//!
//! [METS] (Metadata Encoding and Transmission Standard) is the XML schema
//! digital-preservation systems use to describe a package of files: a
//! `fileSec` listing the files, one or more `structMap`s giving their
//! hierarchy, and `amdSec`/`dmdSec` sections carrying administrative and
//! descriptive metadata, typically [PREMIS] records.
//!
//! This crate maps a METS document to an object graph and back: a
//! [`MetsDocument`] owns a tree of [`FsEntry`] values (files, directories,
//! derivation links) with versioned metadata sections attached, and
//! serialization rebuilds the cross-referenced XML sections from the tree.
//! Output is deterministic: an unmutated document serializes to identical
//! bytes apart from the header timestamp.
//!
//! # Building a document
//!
//! ```
//! use metsrw::{FsEntry, MetsDocument, SerializeOptions};
//!
//! # fn main() -> metsrw::Result<()> {
//! let mut mets = MetsDocument::new();
//! let objects = mets.append_root(FsEntry::directory("objects"));
//! mets.append_child(objects, FsEntry::file("objects/report.pdf"))?;
//!
//! let xml = mets.to_bytes(&SerializeOptions::default())?;
//! # assert!(!xml.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! # Parsing and attaching metadata
//!
//! ```
//! use metsrw::{FsEntry, MetsDocument, PremisEvent, SerializeOptions};
//!
//! # fn main() -> metsrw::Result<()> {
//! let mut mets = MetsDocument::new();
//! let file = mets.append_root(FsEntry::file("objects/report.pdf"));
//! let event = PremisEvent::new("UUID", "3a6e...", "ingestion", "2024-05-01T10:00:00");
//! mets.add_premis_event(file, &event)?;
//!
//! let bytes = mets.to_bytes(&SerializeOptions::default())?;
//! let reparsed = MetsDocument::from_bytes(&bytes)?;
//! let entry = reparsed.files_by_path("objects/report.pdf")[0];
//! assert_eq!(reparsed.get_premis_events(entry)?.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! [METS]: http://www.loc.gov/standards/mets/
//! [PREMIS]: https://www.loc.gov/standards/premis/

pub mod constants;
pub mod document;
pub mod entry;
pub mod error;
pub mod id;
pub mod metadata;
pub mod premis;
mod structmap;
pub mod validate;
pub mod xml;

pub use document::{MetsDocument, SerializeOptions, SubSectionId};
pub use entry::{ALLOWED_CHECKSUMS, EntryId, EntryKind, FsEntry, TransformFile};
pub use error::{MetsError, Result};
pub use metadata::{
    AGENT_ROLES, AGENT_TYPES, Agent, AltRecordId, AmdSec, MdContents, MdRef, MdSectionKind,
    MdWrap, SubSection, VALID_LOCTYPE,
};
pub use premis::{PremisAgent, PremisEvent, PremisObject, PremisRecord, PremisRights};
pub use validate::{SchemaValidator, ValidationVerdict};
