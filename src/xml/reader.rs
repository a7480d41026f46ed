//! Build an [`Element`] tree from XML bytes.
//!
//! Namespaces are resolved while reading, so downstream code matches on
//! `(namespace URI, local name)` pairs and never sees the input's prefix
//! choices. Whitespace-only text nodes are dropped, the same way the
//! reference METS tooling parses with blank text removal.

use crate::error::{MetsError, Result};
use crate::xml::{Attribute, Element, Node, unescape_xml};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;

/// Parse a complete XML document into its root element.
///
/// # Errors
/// Returns `Xml` on syntax errors, unpaired tags or a missing root element.
pub fn parse(bytes: &[u8]) -> Result<Element> {
    let mut reader = NsReader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    // Adjacent text, CDATA and entity-reference events are merged into one
    // text node; a run that is pure whitespace is dropped.
    let mut pending = String::new();

    loop {
        buf.clear();
        let (resolve, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| MetsError::Xml(format!("XML parsing error: {e}")))?;
        // The namespace is decoded to an owned value up front; the resolver
        // result must not outlive this iteration's read.
        let ns = resolved_ns(resolve)?;
        match event {
            Event::Start(ref e) => {
                flush_text(&mut pending, &mut stack);
                let el = open_element(&reader, ns, e)?;
                stack.push(el);
            }
            Event::Empty(ref e) => {
                flush_text(&mut pending, &mut stack);
                let el = open_element(&reader, ns, e)?;
                close_element(el, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                flush_text(&mut pending, &mut stack);
                let el = stack.pop().ok_or_else(|| {
                    MetsError::Xml("closing tag without matching opening tag".to_string())
                })?;
                close_element(el, &mut stack, &mut root)?;
            }
            Event::Text(ref t) => {
                pending.push_str(&unescape_xml(&decode(t.as_ref())?));
            }
            Event::CData(ref t) => {
                pending.push_str(&decode(t.as_ref())?);
            }
            Event::GeneralRef(ref r) => {
                let resolved = r
                    .resolve_char_ref()
                    .map_err(|e| MetsError::Xml(format!("invalid character reference: {e}")))?;
                match resolved {
                    Some(ch) => pending.push(ch),
                    None => match r.as_ref() {
                        b"amp" => pending.push('&'),
                        b"lt" => pending.push('<'),
                        b"gt" => pending.push('>'),
                        b"quot" => pending.push('"'),
                        b"apos" => pending.push('\''),
                        other => {
                            return Err(MetsError::Xml(format!(
                                "unknown entity reference: &{};",
                                String::from_utf8_lossy(other)
                            )));
                        }
                    },
                }
            }
            Event::Eof => break,
            _ => {} // declaration, comments, PIs, doctype
        }
    }

    if !stack.is_empty() {
        return Err(MetsError::Xml("unclosed element at end of input".to_string()));
    }
    root.ok_or_else(|| MetsError::Xml("document has no root element".to_string()))
}

/// Turn a resolver verdict into an owned namespace URI, so the result can
/// outlive the reader borrow it came from.
fn resolved_ns(resolve: ResolveResult) -> Result<Option<String>> {
    match resolve {
        ResolveResult::Bound(ns) => Ok(Some(decode(ns.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(MetsError::Xml(format!(
            "undeclared namespace prefix: {}",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    ns: Option<String>,
    e: &BytesStart,
) -> Result<Element> {
    let name = decode(e.local_name().as_ref())?;
    let mut el = Element { ns, name, attrs: Vec::new(), children: Vec::new() };
    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| MetsError::Xml(format!("invalid attribute: {e}")))?;
        let key = attr.key.as_ref();
        // Namespace declarations are consumed by the resolver; the writer
        // re-derives its own declarations on output.
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let (attr_resolve, local) = reader.resolve_attribute(attr.key);
        let attr_ns = resolved_ns(attr_resolve)?;
        el.attrs.push(Attribute {
            ns: attr_ns,
            name: decode(local.as_ref())?,
            value: unescape_xml(&decode(&attr.value)?),
        });
    }
    Ok(el)
}

fn close_element(
    el: Element,
    stack: &mut Vec<Element>,
    root: &mut Option<Element>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => {
            if root.is_some() {
                return Err(MetsError::Xml(
                    "document has more than one root element".to_string(),
                ));
            }
            *root = Some(el);
        }
    }
    Ok(())
}

fn flush_text(pending: &mut String, stack: &mut [Element]) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    if text.trim().is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Text(text));
    }
}

fn decode(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| MetsError::Xml("invalid UTF-8 in document".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{METS_NS, XLINK_NS};

    #[test]
    fn test_parse_resolves_default_namespace() {
        let doc = br#"<mets xmlns="http://www.loc.gov/METS/"><fileSec/></mets>"#;
        let root = parse(doc).unwrap();
        assert!(root.is(METS_NS, "mets"));
        assert!(root.find(METS_NS, "fileSec").is_some());
    }

    #[test]
    fn test_parse_resolves_prefixed_attributes() {
        let doc = br#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"
                                 xmlns:xlink="http://www.w3.org/1999/xlink">
            <mets:FLocat xlink:href="objects/a%20b.txt" LOCTYPE="OTHER"/>
        </mets:mets>"#;
        let root = parse(doc).unwrap();
        let flocat = root.find(METS_NS, "FLocat").unwrap();
        assert_eq!(flocat.attr_in(XLINK_NS, "href"), Some("objects/a%20b.txt"));
        assert_eq!(flocat.attr("LOCTYPE"), Some("OTHER"));
    }

    #[test]
    fn test_parse_drops_blank_text_keeps_content() {
        let doc = b"<a>\n  <b>hello &amp; goodbye</b>\n</a>";
        let root = parse(doc).unwrap();
        assert_eq!(root.nodes().len(), 1);
        let b = root.children().next().unwrap();
        assert_eq!(b.text(), Some("hello & goodbye".to_string()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse(b"<a><b></a>").is_err());
        assert!(parse(b"no xml here").is_err());
        assert!(parse(b"").is_err());
    }
}
