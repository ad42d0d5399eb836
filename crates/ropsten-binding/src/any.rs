#![forbid(unsafe_code)]

//! A generic element open to any attributes, children and text.

use crate::builder::Builder;
use crate::marshall::Marshaller;
use crate::object::{ObjectCore, XmlObject};
use crate::unmarshall::Unmarshaller;
use ropsten_core::{Error, QName};

/// An element with no dedicated type: every attribute is an extension
/// attribute, every child is whatever its own registration yields, and
/// significant text is kept as the text value.
#[derive(Debug, Clone)]
pub struct AnyElement {
    core: ObjectCore,
}

crate::impl_xml_object!(AnyElement);

impl AnyElement {
    pub fn new(element: QName) -> Self {
        Self {
            core: ObjectCore::new(element),
        }
    }

    pub fn with_schema_type(element: QName, schema_type: Option<QName>) -> Self {
        Self {
            core: ObjectCore::with_schema_type(element, schema_type),
        }
    }
}

pub struct AnyElementBuilder;

impl Builder for AnyElementBuilder {
    fn build(&self, element: &QName, schema_type: Option<&QName>) -> Box<dyn XmlObject> {
        Box::new(AnyElement::with_schema_type(element.clone(), schema_type.cloned()))
    }
}

pub struct AnyElementMarshaller;

impl Marshaller for AnyElementMarshaller {}

pub struct AnyElementUnmarshaller;

impl Unmarshaller for AnyElementUnmarshaller {
    fn process_text(&self, object: &mut dyn XmlObject, text: &str) -> Result<(), Error> {
        if !text.trim().is_empty() {
            object.core_mut().set_text(Some(text.to_owned()));
        }
        Ok(())
    }

    fn process_tail_text(&self, object: &mut dyn XmlObject, index: usize, text: &str) -> Result<(), Error> {
        if !text.trim().is_empty() {
            object.core_mut().set_tail_text(index, Some(text.to_owned()));
        }
        Ok(())
    }
}
