#![forbid(unsafe_code)]

//! Owned XML tree.
//!
//! Child elements are held behind [`Arc`] so that a fragment produced once
//! (by parsing or by marshalling) can be placed into any number of parent
//! trees without copying.

use ropsten_core::{ns, QName};
use std::ops::Range;
use std::sync::Arc;

/// A namespace declaration (`xmlns` or `xmlns:prefix`) written on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// `None` for the default namespace.
    pub prefix: Option<String>,
    /// The bound URI; empty undeclares the default namespace.
    pub uri: String,
}

impl NamespaceDecl {
    pub fn new(prefix: Option<&str>, uri: &str) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()).map(str::to_owned),
            uri: uri.to_owned(),
        }
    }
}

/// An attribute with its qualified name and normalized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// A processing instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingInstruction {
    pub target: String,
    pub data: Option<String>,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Arc<Element>),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(ProcessingInstruction),
}

impl Node {
    pub fn as_element(&self) -> Option<&Arc<Element>> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) | Node::CData(t) => Some(t),
            _ => None,
        }
    }
}

/// The exact markup an element was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    text: Arc<str>,
    range: Range<usize>,
}

impl SourceSpan {
    pub fn new(text: Arc<str>, range: Range<usize>) -> Self {
        Self { text, range }
    }

    pub fn markup(&self) -> &str {
        self.text.get(self.range.clone()).unwrap_or_default()
    }
}

/// An element with its declarations, attributes and content.
///
/// A parsed element remembers its source markup and serializes as exactly
/// those bytes. The mutating helpers forget it; code that edits the public
/// fields directly must call [`Element::clear_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QName,
    /// Declarations written on this element, in source order.
    pub namespaces: Vec<NamespaceDecl>,
    /// Attributes in source order, excluding namespace declarations.
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Write `<a></a>` rather than `<a/>` when there is no content.
    pub expanded_empty: bool,
    source: Option<SourceSpan>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            expanded_empty: false,
            source: None,
        }
    }

    /// The markup this element was parsed from, while it is unedited.
    pub fn source_markup(&self) -> Option<&str> {
        self.source.as_ref().map(SourceSpan::markup)
    }

    pub fn set_source(&mut self, span: SourceSpan) {
        self.source = Some(span);
    }

    /// Forget the source markup so the element is written from its fields.
    pub fn clear_source(&mut self) {
        self.source = None;
    }

    /// Get an attribute value by namespace and local name.
    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.matches(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// Get an unqualified attribute value.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attribute(None, local)
    }

    /// Set an attribute, replacing any existing one with the same name.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        self.source = None;
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => {
                existing.name = name;
                existing.value = value;
            }
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    /// Add a namespace declaration unless the same prefix is already declared here.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        let decl = NamespaceDecl::new(prefix, uri);
        self.source = None;
        if !self.namespaces.iter().any(|d| d.prefix == decl.prefix) {
            self.namespaces.push(decl);
        }
    }

    /// The URI this element itself binds to `prefix`, if any.
    pub fn declared_namespace(&self, prefix: Option<&str>) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.as_str())
    }

    /// The raw `xsi:type` attribute value, if present.
    pub fn schema_type_value(&self) -> Option<&str> {
        self.attribute(Some(ns::XSI), ns::attr::TYPE)
    }

    pub fn push_element(&mut self, child: impl Into<Arc<Element>>) {
        self.source = None;
        self.children.push(Node::Element(child.into()));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.source = None;
        self.children.push(Node::Text(text.into()));
    }

    /// Iterator over child elements.
    pub fn child_elements(&self) -> impl Iterator<Item = &Arc<Element>> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element with the given namespace and local name.
    pub fn find_child(&self, namespace: Option<&str>, local: &str) -> Option<&Arc<Element>> {
        self.child_elements()
            .find(|e| e.name.matches(namespace, local))
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.children.iter().filter_map(Node::as_text).collect()
    }

    /// `true` if any direct text child contains non-whitespace.
    pub fn has_significant_text(&self) -> bool {
        self.children
            .iter()
            .filter_map(Node::as_text)
            .any(|t| !t.trim().is_empty())
    }

    /// Copy the whole subtree so that no fragment is shared with `self`.
    pub fn deep_clone(&self) -> Element {
        Element {
            name: self.name.clone(),
            namespaces: self.namespaces.clone(),
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .map(|c| match c {
                    Node::Element(e) => Node::Element(Arc::new(e.deep_clone())),
                    other => other.clone(),
                })
                .collect(),
            expanded_empty: self.expanded_empty,
            source: self.source.clone(),
        }
    }

    /// Serialize this element to a string.
    pub fn to_xml(&self) -> String {
        crate::writer::write_element(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_access() {
        let mut e = Element::new(QName::local("a"));
        e.set_attribute(QName::local("x"), "1");
        e.set_attribute(QName::new(Some("urn:n"), "y", Some("n")), "2");
        e.set_attribute(QName::local("x"), "3");
        assert_eq!(e.attributes.len(), 2);
        assert_eq!(e.attr("x"), Some("3"));
        assert_eq!(e.attribute(Some("urn:n"), "y"), Some("2"));
        assert_eq!(e.attr("y"), None);
    }

    #[test]
    fn test_declare_namespace_once() {
        let mut e = Element::new(QName::local("a"));
        e.declare_namespace(Some("p"), "urn:p");
        e.declare_namespace(Some("p"), "urn:other");
        e.declare_namespace(None, "urn:d");
        assert_eq!(e.namespaces.len(), 2);
        assert_eq!(e.declared_namespace(Some("p")), Some("urn:p"));
        assert_eq!(e.declared_namespace(None), Some("urn:d"));
    }

    #[test]
    fn test_deep_clone_does_not_share() {
        let mut parent = Element::new(QName::local("p"));
        parent.push_element(Element::new(QName::local("c")));
        let copy = parent.deep_clone();
        assert_eq!(copy, parent);
        let (a, b) = (
            parent.child_elements().next().unwrap(),
            copy.child_elements().next().unwrap(),
        );
        assert!(!Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_edits_forget_source() {
        let text: Arc<str> = Arc::from("<x><a b='1'/></x>");
        let mut e = Element::new(QName::local("a"));
        e.set_attribute(QName::local("b"), "1");
        e.set_source(SourceSpan::new(text, 3..13));
        assert_eq!(e.source_markup(), Some("<a b='1'/>"));
        assert_eq!(e.to_xml(), "<a b='1'/>");

        e.set_attribute(QName::local("b"), "2");
        assert_eq!(e.source_markup(), None);
        assert_eq!(e.to_xml(), r#"<a b="2"/>"#);
    }

    #[test]
    fn test_text_helpers() {
        let mut e = Element::new(QName::local("a"));
        e.push_text("  ");
        assert!(!e.has_significant_text());
        e.push_text("hi");
        assert!(e.has_significant_text());
        e.children.push(Node::CData("<x>".into()));
        assert_eq!(e.text(), "  hi<x>");
    }
}
