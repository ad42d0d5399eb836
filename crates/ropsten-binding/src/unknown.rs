#![forbid(unsafe_code)]

//! Opaque passthrough for elements with no registration.

use crate::marshall::{Marshaller, Marshalling};
use crate::object::{ObjectCore, XmlObject};
use crate::unmarshall::{Unmarshaller, Unmarshalling};
use ropsten_core::{Error, Message};
use ropsten_xml::Element;
use std::sync::Arc;

/// An element kept verbatim.
///
/// The content tree is the object's cached tree, so an unknown element
/// marshalls back to exactly what was read. The core is read-only: an
/// unknown element whose core was given children, text, attributes or
/// schema-instance values fails to marshall.
#[derive(Debug)]
pub struct UnknownElement {
    core: ObjectCore,
    content: Arc<Element>,
}

crate::impl_xml_object!(UnknownElement);

impl UnknownElement {
    pub fn new(content: Arc<Element>) -> Self {
        let mut core = ObjectCore::new(content.name.clone());
        core.set_dom(content.clone());
        Self { core, content }
    }

    pub fn content(&self) -> &Arc<Element> {
        &self.content
    }
}

impl Clone for UnknownElement {
    fn clone(&self) -> Self {
        Self::new(Arc::new(self.content.deep_clone()))
    }
}

pub struct UnknownElementMarshaller;

impl Marshaller for UnknownElementMarshaller {
    fn marshall(&self, object: &mut dyn XmlObject, _ctx: &mut Marshalling<'_>) -> Result<Arc<Element>, Error> {
        match object.downcast_ref::<UnknownElement>() {
            Some(unknown) if is_edited(&unknown.core) => Err(Error::marshalling(
                Message::new("unknown element $element was modified and cannot be marshalled")
                    .param("element", object.element_name()),
            )),
            Some(unknown) => Ok(unknown.content.clone()),
            None => Err(Error::marshalling(
                Message::new("no marshaller registered for $element").param("element", object.element_name()),
            )),
        }
    }
}

fn is_edited(core: &ObjectCore) -> bool {
    !core.children().is_empty()
        || core.text().is_some()
        || !core.attributes().is_empty()
        || core.schema_type().is_some()
        || core.schema_location().is_some()
        || core.no_namespace_schema_location().is_some()
        || core.nil().is_some()
}

pub struct UnknownElementUnmarshaller;

impl Unmarshaller for UnknownElementUnmarshaller {
    fn unmarshall(
        &self,
        element: &Arc<Element>,
        _ctx: &mut Unmarshalling<'_>,
        _bind: bool,
    ) -> Result<Box<dyn XmlObject>, Error> {
        Ok(Box::new(UnknownElement::new(element.clone())))
    }
}
