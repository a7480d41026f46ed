//! Entity escaping for attribute values and character data.
//!
//! METS attribute values routinely carry quotes and ampersands (percent
//! encodings aside, agent notes and event details are free text), so both
//! directions run over prebuilt multi-pattern automata instead of repeated
//! single-character scans.

use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

const ENTITIES: [&str; 5] = ["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"];
const CHARS: [&str; 5] = ["&", "<", ">", "\"", "'"];

static ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(CHARS)
        .unwrap_or_else(|e| panic!("escape automaton: {e}"))
});

// LeftmostLongest so "&amp;" never decodes as a bare "&" followed by "amp;".
static UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(ENTITIES)
        .unwrap_or_else(|e| panic!("unescape automaton: {e}"))
});

/// Replace the five XML-reserved characters with entity references.
///
/// ```
/// use metsrw::xml::escape_xml;
/// assert_eq!(escape_xml("program=\"7-Zip\""), "program=&quot;7-Zip&quot;");
/// assert_eq!(escape_xml("fonds & series"), "fonds &amp; series");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    ESCAPER.replace_all(s, &ENTITIES)
}

/// Replace the five standard entity references with their characters.
///
/// Anything that is not one of the five standard entities passes through
/// untouched; numeric character references are handled by the reader.
///
/// ```
/// use metsrw::xml::unescape_xml;
/// assert_eq!(unescape_xml("fonds &amp; series"), "fonds & series");
/// assert_eq!(unescape_xml("&#xA9;"), "&#xA9;");
/// ```
#[inline]
pub fn unescape_xml(s: &str) -> String {
    UNESCAPER.replace_all(s, &CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_reserved_characters() {
        assert_eq!(escape_xml("a < b > c"), "a &lt; b &gt; c");
        assert_eq!(escape_xml("it's \"quoted\""), "it&apos;s &quot;quoted&quot;");
        assert_eq!(escape_xml("plain text"), "plain text");
    }

    #[test]
    fn test_unescape_is_longest_match() {
        // "&amp;lt;" is an escaped "&lt;", not a "<"
        assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
        assert_eq!(unescape_xml("&unknown;"), "&unknown;");
    }

    proptest! {
        #[test]
        fn prop_unescape_inverts_escape(s in ".*") {
            prop_assert_eq!(unescape_xml(&escape_xml(&s)), s);
        }
    }
}
