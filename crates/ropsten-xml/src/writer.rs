#![forbid(unsafe_code)]

//! Serializer for the owned tree, on top of uppsala's `XmlWriter`.
//!
//! An element that still carries its source markup is written as exactly
//! that markup. Anything else is written with namespace declarations before
//! attributes and `<a/>` for empty elements unless the element asks for the
//! expanded form.

use crate::tree::{Element, Node};

/// Accumulates serialized XML.
pub struct XmlWriter {
    writer: uppsala::XmlWriter,
    out: String,
}

impl XmlWriter {
    /// Create a new XML writer.
    pub fn new() -> Self {
        Self {
            writer: uppsala::XmlWriter::new(),
            out: String::new(),
        }
    }

    /// Write the XML declaration.
    pub fn write_declaration(&mut self) {
        self.writer.write_declaration();
    }

    /// Write an element and its subtree.
    pub fn write_element(&mut self, element: &Element) {
        if let Some(markup) = element.source_markup() {
            self.write_raw(markup);
            return;
        }

        let name = element.name.to_prefixed();
        let mut attrs: Vec<(String, &str)> = Vec::with_capacity(
            element.namespaces.len() + element.attributes.len(),
        );
        for decl in &element.namespaces {
            let qname = match &decl.prefix {
                Some(p) => format!("xmlns:{p}"),
                None => "xmlns".to_owned(),
            };
            attrs.push((qname, decl.uri.as_str()));
        }
        for attr in &element.attributes {
            attrs.push((attr.name.to_prefixed(), attr.value.as_str()));
        }
        let attrs: Vec<(&str, &str)> = attrs.iter().map(|(n, v)| (n.as_str(), *v)).collect();

        if element.children.is_empty() && !element.expanded_empty {
            self.writer.empty_element(&name, &attrs);
            return;
        }
        self.writer.start_element(&name, &attrs);
        for child in &element.children {
            self.write_node(child);
        }
        self.writer.end_element(&name);
    }

    fn write_node(&mut self, node: &Node) {
        match node {
            Node::Element(e) => self.write_element(e),
            Node::Text(t) => self.writer.text(t),
            Node::CData(t) => {
                let mut markup = String::from("<![CDATA[");
                markup.push_str(&t.replace("]]>", "]]]]><![CDATA[>"));
                markup.push_str("]]>");
                self.write_raw(&markup);
            }
            Node::Comment(c) => self.write_raw(&format!("<!--{c}-->")),
            Node::ProcessingInstruction(pi) => {
                let markup = match &pi.data {
                    Some(data) => format!("<?{} {}?>", pi.target, data),
                    None => format!("<?{}?>", pi.target),
                };
                self.write_raw(&markup);
            }
        }
    }

    /// Append markup verbatim after everything written so far.
    fn write_raw(&mut self, markup: &str) {
        self.flush();
        self.out.push_str(markup);
    }

    fn flush(&mut self) {
        let written = std::mem::replace(&mut self.writer, uppsala::XmlWriter::new());
        self.out.push_str(&written.into_string());
    }

    /// Finish writing and return the XML bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.into_string().into_bytes()
    }

    /// Finish writing and return the XML as a string.
    pub fn into_string(mut self) -> String {
        self.flush();
        self.out
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize one element to a string.
pub fn write_element(element: &Element) -> String {
    let mut w = XmlWriter::new();
    w.write_element(element);
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ProcessingInstruction;
    use ropsten_core::QName;

    #[test]
    fn test_write_nested() {
        let mut root = Element::new(QName::new(Some("urn:a"), "root", Some("a")));
        root.declare_namespace(Some("a"), "urn:a");
        root.set_attribute(QName::local("id"), "x&y");
        let mut child = Element::new(QName::local("c"));
        child.push_text("1 < 2");
        root.push_element(child);
        root.push_element(Element::new(QName::local("e")));
        assert_eq!(
            write_element(&root),
            r#"<a:root xmlns:a="urn:a" id="x&amp;y"><c>1 &lt; 2</c><e/></a:root>"#
        );
    }

    #[test]
    fn test_write_expanded_empty_and_misc() {
        let mut e = Element::new(QName::local("e"));
        e.expanded_empty = true;
        assert_eq!(write_element(&e), "<e></e>");
        e.children.push(Node::Comment(" c ".into()));
        e.children.push(Node::ProcessingInstruction(ProcessingInstruction {
            target: "pi".into(),
            data: Some("x".into()),
        }));
        e.children.push(Node::CData("a]]>b".into()));
        assert_eq!(
            write_element(&e),
            "<e><!-- c --><?pi x?><![CDATA[a]]]]><![CDATA[>b]]></e>"
        );
    }

    #[test]
    fn test_rebuilt_parent_keeps_parsed_child_markup() {
        let doc = crate::XmlDocument::parse("<r><c  x='1'>a > b</c></r>".to_owned()).unwrap();
        let parsed = doc.root().child_elements().next().unwrap().clone();
        let mut parent = Element::new(QName::local("p"));
        parent.push_element(parsed);
        assert_eq!(write_element(&parent), "<p><c  x='1'>a > b</c></p>");
    }

    #[test]
    fn test_declaration() {
        let mut w = XmlWriter::new();
        w.write_declaration();
        w.write_element(&Element::new(QName::local("r")));
        let out = w.into_string();
        assert!(out.starts_with("<?xml"));
        assert!(out.ends_with("<r/>"));
    }
}
