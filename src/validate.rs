//! Advisory schema validation.
//!
//! Validation is never part of the write path: serialization always
//! succeeds for a well-formed model, and an external validator (XSD,
//! Schematron, a remote service) can be invoked on demand to judge the
//! output. The verdict is reported, not enforced.

use crate::document::{MetsDocument, SerializeOptions};
use crate::error::Result;

/// Outcome of a validation run.
#[derive(Debug, Clone)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub messages: Vec<String>,
}

impl ValidationVerdict {
    /// A passing verdict with no messages.
    pub fn ok() -> Self {
        Self { valid: true, messages: Vec::new() }
    }

    /// A failing verdict carrying the validator's messages.
    pub fn failed(messages: Vec<String>) -> Self {
        Self { valid: false, messages }
    }
}

/// An external validator judging serialized METS bytes.
pub trait SchemaValidator {
    /// Validate a serialized document.
    ///
    /// # Errors
    /// Implementations may fail for reasons unrelated to the document
    /// (missing schema file, unreachable service); a document that merely
    /// violates the schema is a `Ok` verdict with `valid: false`.
    fn validate(&self, document: &[u8]) -> Result<ValidationVerdict>;
}

impl MetsDocument {
    /// Serialize this document and hand the bytes to a validator.
    pub fn validate(&mut self, validator: &dyn SchemaValidator) -> Result<ValidationVerdict> {
        let bytes = self.to_bytes(&SerializeOptions::default())?;
        validator.validate(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::FsEntry;

    struct RequireFileSec;

    impl SchemaValidator for RequireFileSec {
        fn validate(&self, document: &[u8]) -> Result<ValidationVerdict> {
            let text = String::from_utf8_lossy(document);
            if text.contains("fileSec") {
                Ok(ValidationVerdict::ok())
            } else {
                Ok(ValidationVerdict::failed(vec![
                    "no fileSec present".to_string(),
                ]))
            }
        }
    }

    #[test]
    fn test_validate_delegates_serialized_bytes() {
        let mut doc = MetsDocument::new();
        doc.append_root(FsEntry::file("hello.pdf"));
        let verdict = doc.validate(&RequireFileSec).unwrap();
        assert!(verdict.valid);
        assert!(verdict.messages.is_empty());
    }
}
