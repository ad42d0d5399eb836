#![forbid(unsafe_code)]

//! Text-only elements.

use crate::builder::Builder;
use crate::marshall::Marshaller;
use crate::object::{ObjectCore, XmlObject};
use crate::unmarshall::Unmarshaller;
use ropsten_core::{Error, Message, QName};

/// An element whose content is a single text value.
#[derive(Debug, Clone)]
pub struct SimpleElement {
    core: ObjectCore,
}

crate::impl_xml_object!(SimpleElement);

impl SimpleElement {
    pub fn new(element: QName) -> Self {
        Self {
            core: ObjectCore::new(element),
        }
    }

    pub fn with_value(element: QName, value: impl Into<String>) -> Self {
        let mut s = Self::new(element);
        s.set_value(Some(value.into()));
        s
    }

    pub fn value(&self) -> Option<&str> {
        self.core.text()
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.core.set_text(value);
    }
}

pub struct SimpleElementBuilder;

impl Builder for SimpleElementBuilder {
    fn build(&self, element: &QName, schema_type: Option<&QName>) -> Box<dyn XmlObject> {
        let mut simple = SimpleElement::new(element.clone());
        simple.core.set_schema_type(schema_type.cloned());
        Box::new(simple)
    }
}

pub struct SimpleElementMarshaller;

impl Marshaller for SimpleElementMarshaller {}

pub struct SimpleElementUnmarshaller;

impl Unmarshaller for SimpleElementUnmarshaller {
    fn process_child(&self, parent: &mut dyn XmlObject, child: Box<dyn XmlObject>) -> Result<(), Error> {
        Err(Error::unmarshalling(
            Message::new("$element has simple content but contains child element $child")
                .param("element", parent.element_name())
                .param("child", child.element_name()),
        ))
    }

    fn process_text(&self, object: &mut dyn XmlObject, text: &str) -> Result<(), Error> {
        object.core_mut().set_text(Some(text.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BindingContext;
    use ropsten_xml::XmlDocument;

    #[test]
    fn test_simple_value_round_trip() {
        let mut ctx = BindingContext::new();
        ctx.register_simple(QName::ns("urn:s", "Value"));
        let doc = XmlDocument::parse(r#"<s:Value xmlns:s="urn:s"> 42 </s:Value>"#.to_owned()).unwrap();

        let mut obj = ctx.unmarshall(doc.root(), true).unwrap();
        let simple = obj.downcast_mut::<SimpleElement>().unwrap();
        assert_eq!(simple.value(), Some(" 42 "));
        simple.set_value(Some("43".into()));

        let tree = ctx.marshall(obj.as_mut()).unwrap();
        assert_eq!(tree.to_xml(), r#"<s:Value xmlns:s="urn:s">43</s:Value>"#);
    }

    #[test]
    fn test_child_element_rejected() {
        let mut ctx = BindingContext::new();
        ctx.register_simple(QName::local("v"));
        ctx.install_unknown_defaults();
        let doc = XmlDocument::parse("<v>1<extra/></v>".to_owned()).unwrap();
        let err = ctx.unmarshall(doc.root(), true).unwrap_err();
        assert!(matches!(err, ropsten_core::Error::Unmarshalling(_)));
        assert_eq!(err.message().and_then(|m| m.get("child")), Some("extra"));
    }
}
