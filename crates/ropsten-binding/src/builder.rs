#![forbid(unsafe_code)]

use crate::object::XmlObject;
use ropsten_core::QName;

/// Creates empty objects for an element name and optional schema type.
pub trait Builder: Send + Sync {
    fn build(&self, element: &QName, schema_type: Option<&QName>) -> Box<dyn XmlObject>;
}

impl<F> Builder for F
where
    F: Fn(&QName, Option<&QName>) -> Box<dyn XmlObject> + Send + Sync,
{
    fn build(&self, element: &QName, schema_type: Option<&QName>) -> Box<dyn XmlObject> {
        self(element, schema_type)
    }
}
