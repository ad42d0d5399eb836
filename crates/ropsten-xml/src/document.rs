#![forbid(unsafe_code)]

//! Owned XML document.
//!
//! `roxmltree` checks well-formedness under the caller's limits and reports
//! where every element sits in the input. The tree itself is copied out of
//! the `uppsala` DOM, which keeps element and attribute prefixes, the
//! declarations written on each element, and CDATA sections.

use crate::tree::{Attribute, Element, NamespaceDecl, Node, ProcessingInstruction, SourceSpan};
use ropsten_core::{ns, Error, QName};
use std::sync::Arc;
use uppsala::{Document, NodeId, NodeKind};

/// An owned XML document: the source text and its root element.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    text: Arc<str>,
    root: Arc<Element>,
}

impl XmlDocument {
    /// Parse and build a namespace-aware tree, taking ownership of the text.
    pub fn parse(text: String) -> Result<Self, Error> {
        Self::parse_with_options(text, crate::parsing_options(), true)
    }

    /// Parse and build a tree from bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::XmlParse(format!("invalid UTF-8: {e}")))?
            .to_owned();
        Self::parse(text)
    }

    /// Parse with explicit `roxmltree` options.
    ///
    /// With `namespace_aware` off, names are kept literally (`p:x` is a
    /// local name) and `xmlns` declarations become ordinary attributes.
    pub fn parse_with_options(
        text: String,
        options: roxmltree::ParsingOptions,
        namespace_aware: bool,
    ) -> Result<Self, Error> {
        let text: Arc<str> = Arc::from(text);
        let checked = roxmltree::Document::parse_with_options(&text, options)
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        let dom = uppsala::parse(&text).map_err(|e| Error::XmlParse(e.to_string()))?;

        let root = dom
            .children(dom.root())
            .into_iter()
            .find_map(|id| dom.element(id).map(|e| (id, e)))
            .ok_or_else(|| Error::XmlParse("document has no root element".into()))?;

        let builder = TreeBuilder {
            dom: &dom,
            text: &text,
            namespace_aware,
        };
        let root = builder.element(root.0, root.1, Some(checked.root_element()));
        Ok(Self {
            text: text.clone(),
            root: Arc::new(root),
        })
    }

    /// Get the raw XML text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The document element.
    pub fn root(&self) -> &Arc<Element> {
        &self.root
    }

    pub fn into_root(self) -> Arc<Element> {
        self.root
    }

    /// Find the first element, in document order, with the given name.
    pub fn find_element(&self, namespace: Option<&str>, local: &str) -> Option<&Arc<Element>> {
        find_in(&self.root, namespace, local)
    }
}

fn find_in<'a>(e: &'a Arc<Element>, namespace: Option<&str>, local: &str) -> Option<&'a Arc<Element>> {
    if e.name.matches(namespace, local) {
        return Some(e);
    }
    e.child_elements().find_map(|c| find_in(c, namespace, local))
}

struct TreeBuilder<'a, 'input> {
    dom: &'a Document<'input>,
    text: &'a Arc<str>,
    namespace_aware: bool,
}

impl TreeBuilder<'_, '_> {
    /// Copy the element `id` out of the DOM.
    ///
    /// `checked` is the same element in the `roxmltree` parse; its byte range
    /// becomes the element's source span.
    fn element(
        &self,
        id: NodeId,
        source: &uppsala::Element<'_>,
        checked: Option<roxmltree::Node<'_, '_>>,
    ) -> Element {
        let mut element = if self.namespace_aware {
            aware(source)
        } else {
            unaware(source)
        };

        let mut checked_children = checked
            .into_iter()
            .flat_map(|n| n.children().filter(|c| c.is_element()));
        for child in self.dom.children(id) {
            match self.dom.node_kind(child) {
                Some(NodeKind::Element(_)) => {
                    let pair = checked_children.next();
                    if let Some(e) = self.dom.element(child) {
                        element
                            .children
                            .push(Node::Element(Arc::new(self.element(child, e, pair))));
                    }
                }
                Some(NodeKind::Text(text)) => element.children.push(Node::Text(text.to_string())),
                Some(NodeKind::CData(text)) => element.children.push(Node::CData(text.to_string())),
                Some(NodeKind::Comment(text)) => {
                    element.children.push(Node::Comment(text.to_string()))
                }
                Some(NodeKind::ProcessingInstruction(pi)) => {
                    element.children.push(Node::ProcessingInstruction(ProcessingInstruction {
                        target: pi.target.to_string(),
                        data: pi.data.as_ref().map(|d| d.to_string()),
                    }));
                }
                _ => {}
            }
        }

        if let Some(node) = checked.filter(|n| n.tag_name().name() == local_name(&element.name)) {
            let range = node.range();
            let markup = self.text.get(range.clone()).unwrap_or_default();
            element.expanded_empty = element.children.is_empty() && !markup.ends_with("/>");
            element.set_source(SourceSpan::new(self.text.clone(), range));
        }
        element
    }
}

/// The local part as `roxmltree` reports it.
fn local_name(name: &QName) -> &str {
    let local = name.local_name();
    local.split_once(':').map_or(local, |(_, l)| l)
}

fn aware(e: &uppsala::Element<'_>) -> Element {
    let mut element = Element::new(QName::new(
        e.name.namespace_uri.as_deref(),
        &e.name.local_name,
        e.name.prefix.as_deref(),
    ));
    for (prefix, uri) in &e.namespace_declarations {
        let prefix = prefix.to_string();
        element
            .namespaces
            .push(NamespaceDecl::new(Some(prefix.as_str()), &uri.to_string()));
    }
    for attr in &e.attributes {
        let namespace = attr.name.namespace_uri.as_deref();
        let prefix = match namespace {
            Some(ns::XML) => Some(ns::prefix::XML),
            Some(_) => attr.name.prefix.as_deref(),
            None => None,
        };
        element.attributes.push(Attribute::new(
            QName::new(namespace, &attr.name.local_name, prefix),
            attr.value.to_string(),
        ));
    }
    element
}

fn unaware(e: &uppsala::Element<'_>) -> Element {
    let mut element = Element::new(QName::local(&literal(
        e.name.prefix.as_deref(),
        &e.name.local_name,
    )));
    for (prefix, uri) in &e.namespace_declarations {
        let prefix = prefix.to_string();
        let name = if prefix.is_empty() {
            ns::prefix::XMLNS.to_owned()
        } else {
            format!("{}:{prefix}", ns::prefix::XMLNS)
        };
        element
            .attributes
            .push(Attribute::new(QName::local(&name), uri.to_string()));
    }
    for attr in &e.attributes {
        let prefix = match attr.name.namespace_uri.as_deref() {
            Some(ns::XML) => Some(ns::prefix::XML),
            _ => attr.name.prefix.as_deref(),
        };
        element.attributes.push(Attribute::new(
            QName::local(&literal(prefix, &attr.name.local_name)),
            attr.value.to_string(),
        ));
    }
    element
}

fn literal(prefix: Option<&str>, local: &str) -> String {
    match prefix.filter(|p| !p.is_empty()) {
        Some(p) => format!("{p}:{local}"),
        None => local.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_byte_identical() {
        let xml = r#"<p:root xmlns:p="urn:p" xmlns="urn:d" id="1"><child a="x &amp; y"/>
  <p:other></p:other><!-- note --><?pi data?>text &lt; more</p:root>"#;
        let doc = XmlDocument::parse(xml.to_owned()).unwrap();
        assert_eq!(doc.root().to_xml(), xml);
    }

    #[test]
    fn test_round_trip_outside_writer_form() {
        for xml in [
            "<a>x > y</a>",
            "<a b='1'/>",
            "<a><![CDATA[<x>]]></a>",
            r#"<a b="1" />"#,
            "<a\n  b = \"1\"\n  xmlns:q='urn:q'><q:c q:d=\"&#x41;\"></q:c ></a>",
        ] {
            let doc = XmlDocument::parse(xml.to_owned()).unwrap();
            assert_eq!(doc.root().to_xml(), xml);
        }
    }

    #[test]
    fn test_child_markup_is_its_own_span() {
        let doc = XmlDocument::parse("<r><c  x='1'/>tail</r>".to_owned()).unwrap();
        let c = doc.root().child_elements().next().unwrap();
        assert_eq!(c.source_markup(), Some("<c  x='1'/>"));
        assert!(!c.expanded_empty);
    }

    #[test]
    fn test_cdata_is_kept_apart_from_text() {
        let doc = XmlDocument::parse("<a>t<![CDATA[<x>]]></a>".to_owned()).unwrap();
        let root = doc.root();
        assert_eq!(root.children[1], Node::CData("<x>".into()));
        assert_eq!(root.text(), "t<x>");
    }

    #[test]
    fn test_names_and_declarations() {
        let xml = r#"<p:root xmlns:p="urn:p" xmlns:q="urn:q" q:attr="v"><plain/></p:root>"#;
        let doc = XmlDocument::parse(xml.to_owned()).unwrap();
        let root = doc.root();
        assert_eq!(root.name, QName::ns("urn:p", "root"));
        assert_eq!(root.name.prefix(), Some("p"));
        assert_eq!(
            root.namespaces,
            vec![NamespaceDecl::new(Some("p"), "urn:p"), NamespaceDecl::new(Some("q"), "urn:q")]
        );
        assert_eq!(root.attributes[0].name.prefix(), Some("q"));
        assert_eq!(root.attribute(Some("urn:q"), "attr"), Some("v"));
        let plain = root.child_elements().next().unwrap();
        assert_eq!(plain.name.namespace(), None);
        assert!(plain.namespaces.is_empty());
    }

    #[test]
    fn test_namespace_unaware_keeps_literal_names() {
        let xml = r#"<p:root xmlns:p="urn:p" p:a="1"/>"#;
        let doc = XmlDocument::parse_with_options(xml.to_owned(), crate::parsing_options(), false)
            .unwrap();
        let root = doc.root();
        assert_eq!(root.name, QName::local("p:root"));
        assert!(root.namespaces.is_empty());
        assert_eq!(root.attr("xmlns:p"), Some("urn:p"));
        assert_eq!(root.attr("p:a"), Some("1"));
        assert_eq!(root.to_xml(), xml);
    }

    #[test]
    fn test_find_element() {
        let xml = r#"<a xmlns:x="urn:x"><b><x:c id="1"/></b><x:c id="2"/></a>"#;
        let doc = XmlDocument::parse(xml.to_owned()).unwrap();
        let c = doc.find_element(Some("urn:x"), "c").unwrap();
        assert_eq!(c.attr("id"), Some("1"));
        assert!(doc.find_element(None, "zz").is_none());
    }

    #[test]
    fn test_parse_error() {
        let err = XmlDocument::parse("<a><b></a>".to_owned()).unwrap_err();
        assert!(matches!(err, Error::XmlParse(_)));
    }
}
