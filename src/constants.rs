//! Namespace URIs, identifier prefixes and other METS constants.

use crate::error::{MetsError, Result};

/// METS namespace, the namespace of every structural element this crate emits.
pub const METS_NS: &str = "http://www.loc.gov/METS/";

/// XLink namespace, used for `FLocat/@xlink:href` and `mdRef/@xlink:href`.
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// XML Schema instance namespace, used for `@xsi:schemaLocation`.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// PREMIS version 2 namespace, used by embedded preservation metadata.
pub const PREMIS_NS: &str = "info:lc/xmlns/premis-v2";

/// Dublin Core elements namespace.
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Dublin Core terms namespace.
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";

/// FITS output namespace, seen inside PREMIS object characteristics.
pub const FITS_NS: &str = "http://hul.harvard.edu/ois/xml/ns/fits/fits_output";

/// Value emitted for `@xsi:schemaLocation` on the document root.
pub const SCHEMA_LOCATION: &str =
    "http://www.loc.gov/METS/ http://www.loc.gov/standards/mets/version111/mets.xsd";

/// Prefix of `file/@ID` values in the fileSec.
pub const FILE_ID_PREFIX: &str = "file-";

/// Prefix of `file/@GROUPID` values linking originals to derivatives.
pub const GROUP_ID_PREFIX: &str = "Group-";

/// Label of the physical structMap.
pub const PHYSICAL_STRUCTMAP_LABEL: &str = "Archivematica default";

/// Label of the logical structMap documenting empty directories.
pub const NORMATIVE_STRUCTMAP_LABEL: &str = "Normative Directory Structure";

/// Canonical prefix for a known namespace URI, used when serializing.
///
/// Unknown namespaces get generated `ns0`, `ns1`, ... prefixes instead.
pub fn canonical_prefix(ns: &str) -> Option<&'static str> {
    match ns {
        METS_NS => Some("mets"),
        XLINK_NS => Some("xlink"),
        XSI_NS => Some("xsi"),
        PREMIS_NS => Some("premis"),
        DC_NS => Some("dc"),
        DCTERMS_NS => Some("dcterms"),
        FITS_NS => Some("fits"),
        _ => None,
    }
}

/// Percent-encode a relative path for use in an `xlink:href` attribute.
///
/// Segments are encoded individually so the `/` separators survive.
pub(crate) fn percent_encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`percent_encode_path`].
pub(crate) fn percent_decode_path(path: &str) -> Result<String> {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| MetsError::MalformedDocument(format!("invalid percent-encoding in {path}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_encoding_round_trip() {
        let path = "objects/with space/naïve.txt";
        let encoded = percent_encode_path(path);
        assert_eq!(encoded, "objects/with%20space/na%C3%AFve.txt");
        assert_eq!(percent_decode_path(&encoded).unwrap(), path);
    }

    #[test]
    fn test_canonical_prefixes() {
        assert_eq!(canonical_prefix(METS_NS), Some("mets"));
        assert_eq!(canonical_prefix(XLINK_NS), Some("xlink"));
        assert_eq!(canonical_prefix("urn:example:unknown"), None);
    }
}
