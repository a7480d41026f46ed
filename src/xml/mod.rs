//! A small owned XML element tree.
//!
//! METS documents interleave structural elements with opaque embedded
//! metadata payloads (PREMIS, Dublin Core, FITS output, ...), so the core
//! works on a namespace-resolved element tree rather than on raw events:
//! [`reader`] builds the tree from bytes with quick-xml, [`writer`] emits
//! deterministic bytes from it. Namespace prefixes from the input are not
//! preserved; elements carry resolved namespace URIs and the writer picks
//! canonical prefixes, which keeps repeated serializations byte-identical.

mod escape;
pub mod reader;
pub mod writer;

pub use escape::{escape_xml, unescape_xml};
pub use reader::parse;
pub use writer::{WriteOptions, write_document};

/// One attribute of an [`Element`], with a resolved namespace URI.
///
/// Most METS attributes are in no namespace; `xlink:href` and
/// `xsi:schemaLocation` are the notable exceptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub(crate) ns: Option<String>,
    pub(crate) name: String,
    pub(crate) value: String,
}

/// A child node: nested element or character data.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with resolved namespace, ordered attributes and children.
///
/// Attribute and child order is preserved exactly as built or parsed;
/// serialization never re-sorts, so emission order is a stable function of
/// construction order.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub(crate) ns: Option<String>,
    pub(crate) name: String,
    pub(crate) attrs: Vec<Attribute>,
    pub(crate) children: Vec<Node>,
}

impl Element {
    /// Create an element in no namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            ns: None,
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element in the given namespace.
    pub fn in_ns(ns: &str, name: impl Into<String>) -> Self {
        Self {
            ns: Some(ns.to_string()),
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Namespace URI of this element, if any.
    #[inline]
    pub fn ns(&self) -> Option<&str> {
        self.ns.as_deref()
    }

    /// Local name of this element.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the element against a namespace URI and local name.
    #[inline]
    pub fn is(&self, ns: &str, name: &str) -> bool {
        self.ns.as_deref() == Some(ns) && self.name == name
    }

    /// Set (or replace) an attribute in no namespace.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_attr_full(None, name.into(), value.into());
    }

    /// Set (or replace) a namespaced attribute.
    pub fn set_attr_in(&mut self, ns: &str, name: impl Into<String>, value: impl Into<String>) {
        self.set_attr_full(Some(ns.to_string()), name.into(), value.into());
    }

    fn set_attr_full(&mut self, ns: Option<String>, name: String, value: String) {
        if let Some(attr) = self
            .attrs
            .iter_mut()
            .find(|a| a.ns == ns && a.name == name)
        {
            attr.value = value;
        } else {
            self.attrs.push(Attribute { ns, name, value });
        }
    }

    /// Value of an attribute in no namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespaced attribute.
    pub fn attr_in(&self, ns: &str, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns.as_deref() == Some(ns) && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// All attributes in document order.
    #[inline]
    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Append a child element.
    pub fn append(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append character data.
    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// All child nodes, elements and text interleaved.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child element matching namespace and local name.
    pub fn find(&self, ns: &str, name: &str) -> Option<&Element> {
        self.children().find(|el| el.is(ns, name))
    }

    /// All child elements matching namespace and local name.
    pub fn find_all<'a>(&'a self, ns: &'a str, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children().filter(move |el| el.is(ns, name))
    }

    /// Recursive first match in document order, including this element.
    pub fn descendant(&self, ns: &str, name: &str) -> Option<&Element> {
        if self.is(ns, name) {
            return Some(self);
        }
        self.children().find_map(|el| el.descendant(ns, name))
    }

    /// Concatenated direct character data, or `None` when there is none.
    pub fn text(&self) -> Option<String> {
        let mut out = String::new();
        let mut found = false;
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
                found = true;
            }
        }
        found.then_some(out)
    }

    /// True when the element has neither attributes nor children.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.children.is_empty()
    }
}

/// Build a namespaced element holding a single text node.
///
/// Convenience for the leaf-heavy PREMIS and metsHdr markup.
pub fn text_element(ns: &str, name: &str, text: &str) -> Element {
    let mut el = Element::in_ns(ns, name);
    el.append_text(text);
    el
}
