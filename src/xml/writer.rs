//! Serialize an [`Element`] tree to XML text.
//!
//! The writer is deterministic: namespace declarations are derived from the
//! tree in first-encounter order, attributes and children are emitted in
//! stored order, and nothing is re-sorted. Serializing the same tree twice
//! yields identical bytes.

use crate::constants::{METS_NS, canonical_prefix};
use crate::xml::{Element, Node, escape_xml};
use std::collections::HashMap;

/// Output shaping options.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Indent nested elements with two spaces per level.
    pub pretty: bool,
    /// Emit METS elements with a `mets:` prefix rather than binding the
    /// METS namespace as the default.
    pub fully_qualified: bool,
    /// Emit the leading `<?xml ...?>` declaration.
    pub declaration: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { pretty: true, fully_qualified: true, declaration: true }
    }
}

/// Serialize `root` as a complete document.
pub fn write_document(root: &Element, options: &WriteOptions) -> String {
    let prefixes = assign_prefixes(root, options.fully_qualified);
    let mut out = String::with_capacity(1024);
    if options.declaration {
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        out.push('\n');
    }
    write_element(root, &prefixes, options.pretty, 0, true, &mut out);
    if options.pretty {
        out.push('\n');
    }
    out
}

/// Namespace URI to prefix table; the METS namespace may map to the empty
/// prefix (default namespace).
struct Prefixes {
    by_ns: HashMap<String, String>,
    declarations: Vec<(String, String)>, // (prefix, uri) in first-encounter order
}

impl Prefixes {
    fn qualify(&self, ns: Option<&str>, name: &str) -> String {
        match ns.and_then(|uri| self.by_ns.get(uri)) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}:{name}"),
            _ => name.to_string(),
        }
    }
}

fn assign_prefixes(root: &Element, fully_qualified: bool) -> Prefixes {
    let mut uris: Vec<String> = Vec::new();
    collect_namespaces(root, &mut uris);

    let mut by_ns = HashMap::new();
    let mut declarations = Vec::new();
    let mut generated = 0usize;
    for uri in uris {
        let prefix = if uri == METS_NS && !fully_qualified {
            String::new()
        } else if let Some(known) = canonical_prefix(&uri) {
            known.to_string()
        } else {
            let p = format!("ns{generated}");
            generated += 1;
            p
        };
        declarations.push((prefix.clone(), uri.clone()));
        by_ns.insert(uri, prefix);
    }
    Prefixes { by_ns, declarations }
}

fn collect_namespaces(el: &Element, uris: &mut Vec<String>) {
    if let Some(ns) = el.ns.as_ref()
        && !uris.contains(ns)
    {
        uris.push(ns.clone());
    }
    for attr in &el.attrs {
        if let Some(ns) = attr.ns.as_ref()
            && !uris.contains(ns)
        {
            uris.push(ns.clone());
        }
    }
    for child in el.children() {
        collect_namespaces(child, uris);
    }
}

fn write_element(
    el: &Element,
    prefixes: &Prefixes,
    pretty: bool,
    depth: usize,
    is_root: bool,
    out: &mut String,
) {
    if pretty && depth > 0 {
        for _ in 0..depth {
            out.push_str("  ");
        }
    }
    write_open_tag(el, prefixes, is_root, out);
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let has_text = el.children.iter().any(|n| matches!(n, Node::Text(_)));
    if !pretty || has_text {
        // Mixed or text content is always written compact; injected
        // indentation would change the character data.
        for node in &el.children {
            match node {
                Node::Element(child) => {
                    write_element(child, prefixes, false, 0, false, out);
                }
                Node::Text(text) => out.push_str(&escape_xml(text)),
            }
        }
    } else {
        for node in &el.children {
            if let Node::Element(child) = node {
                out.push('\n');
                write_element(child, prefixes, true, depth + 1, false, out);
            }
        }
        out.push('\n');
        for _ in 0..depth {
            out.push_str("  ");
        }
    }
    out.push_str("</");
    out.push_str(&prefixes.qualify(el.ns.as_deref(), &el.name));
    out.push('>');
}

fn write_open_tag(el: &Element, prefixes: &Prefixes, is_root: bool, out: &mut String) {
    out.push('<');
    out.push_str(&prefixes.qualify(el.ns.as_deref(), &el.name));
    if is_root {
        for (prefix, uri) in &prefixes.declarations {
            if prefix.is_empty() {
                out.push_str(" xmlns=\"");
            } else {
                out.push_str(" xmlns:");
                out.push_str(prefix);
                out.push_str("=\"");
            }
            out.push_str(&escape_xml(uri));
            out.push('"');
        }
    }
    for attr in &el.attrs {
        out.push(' ');
        out.push_str(&prefixes.qualify(attr.ns.as_deref(), &attr.name));
        out.push_str("=\"");
        out.push_str(&escape_xml(&attr.value));
        out.push('"');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{METS_NS, XLINK_NS};
    use crate::xml::{parse, text_element};

    fn sample() -> Element {
        let mut root = Element::in_ns(METS_NS, "mets");
        let mut filesec = Element::in_ns(METS_NS, "fileSec");
        let mut file = Element::in_ns(METS_NS, "file");
        file.set_attr("ID", "file-1");
        let mut flocat = Element::in_ns(METS_NS, "FLocat");
        flocat.set_attr_in(XLINK_NS, "href", "objects/a.txt");
        file.append(flocat);
        filesec.append(file);
        root.append(filesec);
        root
    }

    #[test]
    fn test_fully_qualified_output() {
        let out = write_document(&sample(), &WriteOptions::default());
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(out.contains("<mets:mets xmlns:mets=\"http://www.loc.gov/METS/\""));
        assert!(out.contains("xmlns:xlink=\"http://www.w3.org/1999/xlink\""));
        assert!(out.contains("<mets:FLocat xlink:href=\"objects/a.txt\"/>"));
    }

    #[test]
    fn test_default_namespace_output() {
        let options = WriteOptions { fully_qualified: false, ..Default::default() };
        let out = write_document(&sample(), &options);
        assert!(out.contains("<mets xmlns=\"http://www.loc.gov/METS/\""));
        assert!(out.contains("<FLocat xlink:href=\"objects/a.txt\"/>"));
        assert!(!out.contains("mets:"));
    }

    #[test]
    fn test_pretty_indents_and_compact_does_not() {
        let pretty = write_document(&sample(), &WriteOptions::default());
        assert!(pretty.contains("\n  <mets:fileSec>\n    <mets:file ID=\"file-1\">"));

        let compact = write_document(
            &sample(),
            &WriteOptions { pretty: false, ..Default::default() },
        );
        assert!(!compact.contains('\n') || compact.matches('\n').count() == 1);
    }

    #[test]
    fn test_text_content_is_escaped_and_inline() {
        let mut root = Element::in_ns(METS_NS, "mets");
        root.append(text_element(METS_NS, "name", "a < b & c"));
        let out = write_document(&root, &WriteOptions::default());
        assert!(out.contains("<mets:name>a &lt; b &amp; c</mets:name>"));
    }

    #[test]
    fn test_unknown_namespace_gets_generated_prefix() {
        let mut root = Element::in_ns(METS_NS, "mets");
        root.append(Element::in_ns("urn:example:custom", "thing"));
        let out = write_document(&root, &WriteOptions::default());
        assert!(out.contains("xmlns:ns0=\"urn:example:custom\""));
        assert!(out.contains("<ns0:thing/>"));
    }

    #[test]
    fn test_write_parse_round_trip() {
        let original = sample();
        let out = write_document(&original, &WriteOptions::default());
        let reparsed = parse(out.as_bytes()).unwrap();
        assert_eq!(reparsed, original);

        // Idempotent: writing the reparsed tree gives the same bytes
        let out2 = write_document(&reparsed, &WriteOptions::default());
        assert_eq!(out, out2);
    }
}
