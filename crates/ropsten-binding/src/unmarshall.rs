#![forbid(unsafe_code)]

//! Tree → object.

use crate::builder::Builder;
use crate::marshall::classify;
use crate::object::{Namespace, NamespaceUsage, XmlObject};
use crate::registry::Registry;
use ropsten_core::{ns, Error, Message, QName};
use ropsten_xml::{Attribute, Element, NamespaceScope, Node};
use std::sync::Arc;

/// Populates one kind of object from a tree.
pub trait Unmarshaller: Send + Sync {
    /// Handle one attribute. The default keeps it as an extension attribute.
    fn process_attribute(
        &self,
        object: &mut dyn XmlObject,
        attribute: &Attribute,
        scope: &NamespaceScope,
    ) -> Result<(), Error> {
        store_extension_attribute(object, attribute, scope);
        Ok(())
    }

    /// Attach an unmarshalled child. The default appends it in order.
    fn process_child(&self, parent: &mut dyn XmlObject, child: Box<dyn XmlObject>) -> Result<(), Error> {
        parent.core_mut().push_child(child);
        Ok(())
    }

    /// Handle the element's text. The default rejects anything but
    /// whitespace.
    fn process_text(&self, object: &mut dyn XmlObject, text: &str) -> Result<(), Error> {
        if text.trim().is_empty() {
            return Ok(());
        }
        Err(Error::unmarshalling(
            Message::new("unexpected text content in $element").param("element", object.element_name()),
        ))
    }

    /// Handle text that follows the child at `index`. The default rejects
    /// anything but whitespace.
    fn process_tail_text(&self, object: &mut dyn XmlObject, _index: usize, text: &str) -> Result<(), Error> {
        self.process_text(object, text)
    }

    fn unmarshall(
        &self,
        element: &Arc<Element>,
        ctx: &mut Unmarshalling<'_>,
        bind: bool,
    ) -> Result<Box<dyn XmlObject>, Error> {
        unmarshall_generic(self, element, ctx, bind)
    }
}

/// One unmarshalling pass over a tree.
pub struct Unmarshalling<'a> {
    builders: &'a Registry<dyn Builder>,
    unmarshallers: &'a Registry<dyn Unmarshaller>,
    scope: NamespaceScope,
}

impl<'a> Unmarshalling<'a> {
    pub fn new(builders: &'a Registry<dyn Builder>, unmarshallers: &'a Registry<dyn Unmarshaller>) -> Self {
        Self {
            builders,
            unmarshallers,
            scope: NamespaceScope::new(),
        }
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }

    /// Unmarshall `element` with the strategy registered for its schema type
    /// or name, falling back to the default.
    pub fn unmarshall(&mut self, element: &Arc<Element>, bind: bool) -> Result<Box<dyn XmlObject>, Error> {
        let schema_type = schema_type_of(element, &self.scope);
        let unmarshallers = self.unmarshallers;
        let Some(unmarshaller) = unmarshallers.lookup_with_type(schema_type.as_ref(), &element.name) else {
            return Err(Error::unmarshalling(
                Message::new("no unmarshaller registered for $element").param("element", &element.name),
            ));
        };
        unmarshaller.unmarshall(element, self, bind)
    }

    /// Build an empty object for `element`.
    pub fn build(&self, element: &Element, schema_type: Option<&QName>) -> Result<Box<dyn XmlObject>, Error> {
        match self.builders.lookup_with_type(schema_type, &element.name) {
            Some(builder) => Ok(builder.build(&element.name, schema_type)),
            None => Err(Error::unmarshalling(
                Message::new("no builder registered for $element").param("element", &element.name),
            )),
        }
    }
}

/// The unmarshalling algorithm shared by every unmarshaller.
///
/// Builds the object, records the element's namespace declarations, handles
/// the schema-instance attributes, hands every other attribute, child and the
/// text to the unmarshaller's hooks, then classifies namespace usage. With
/// `bind` set the object keeps `element` as its cached tree.
pub fn unmarshall_generic<U: Unmarshaller + ?Sized>(
    unmarshaller: &U,
    element: &Arc<Element>,
    ctx: &mut Unmarshalling<'_>,
    bind: bool,
) -> Result<Box<dyn XmlObject>, Error> {
    ctx.scope.push_element(element);
    let result = populate(unmarshaller, element, ctx, bind);
    ctx.scope.pop();

    let mut object = result?;
    if bind {
        object.core_mut().set_dom(element.clone());
    }
    Ok(object)
}

fn populate<U: Unmarshaller + ?Sized>(
    unmarshaller: &U,
    element: &Arc<Element>,
    ctx: &mut Unmarshalling<'_>,
    bind: bool,
) -> Result<Box<dyn XmlObject>, Error> {
    let schema_type = schema_type_of(element, &ctx.scope);
    let mut object = ctx.build(element, schema_type.as_ref())?;
    let core = object.core_mut();
    if core.schema_type() != schema_type.as_ref() {
        core.set_schema_type(schema_type.clone());
    }
    for decl in &element.namespaces {
        core.add_namespace(Namespace::new(
            decl.prefix.as_deref(),
            &decl.uri,
            NamespaceUsage::Indeterminate,
        ));
    }

    for attr in &element.attributes {
        if attr.name.namespace() == Some(ns::XSI) {
            let core = object.core_mut();
            match attr.name.local_name() {
                ns::attr::TYPE => continue,
                ns::attr::SCHEMA_LOCATION => {
                    core.set_schema_location(Some(attr.value.clone()));
                    continue;
                }
                ns::attr::NO_NAMESPACE_SCHEMA_LOCATION => {
                    core.set_no_namespace_schema_location(Some(attr.value.clone()));
                    continue;
                }
                ns::attr::NIL => {
                    core.set_nil(Some(matches!(attr.value.trim(), "true" | "1")));
                    continue;
                }
                _ => {}
            }
        }
        unmarshaller.process_attribute(object.as_mut(), attr, &ctx.scope)?;
    }

    // Text runs are split by child elements only.
    let mut text = String::new();
    let mut last_child: Option<usize> = None;
    let flush = |object: &mut dyn XmlObject, at: Option<usize>, text: &mut String| -> Result<(), Error> {
        if text.is_empty() {
            return Ok(());
        }
        let run = std::mem::take(text);
        match at {
            None => unmarshaller.process_text(object, &run),
            Some(index) => unmarshaller.process_tail_text(object, index, &run),
        }
    };
    for node in &element.children {
        match node {
            Node::Element(child) => {
                flush(object.as_mut(), last_child, &mut text)?;
                let child = ctx.unmarshall(child, bind)?;
                unmarshaller.process_child(object.as_mut(), child)?;
                last_child = Some(last_child.map_or(0, |i| i + 1));
            }
            Node::Text(t) | Node::CData(t) => text.push_str(t),
            Node::Comment(_) | Node::ProcessingInstruction(_) => {}
        }
    }
    flush(object.as_mut(), last_child, &mut text)?;

    let mut qname_values: Vec<QName> = schema_type.into_iter().collect();
    qname_values.extend(
        object
            .core()
            .attributes()
            .iter()
            .filter_map(|a| a.qname_value.clone()),
    );
    let core = object.core_mut();
    for namespace in classify(element, &qname_values) {
        core.add_namespace(namespace);
    }
    Ok(object)
}

/// Keep an attribute in the object's extension attributes.
///
/// A value of the form `prefix:local` whose prefix is in scope is kept as a
/// qualified-name value, so its namespace is tracked as non-visibly used.
pub fn store_extension_attribute(object: &mut dyn XmlObject, attribute: &Attribute, scope: &NamespaceScope) {
    let qname = attribute
        .value
        .contains(':')
        .then(|| QName::parse_prefixed(&attribute.value, |p| scope.resolve(p)))
        .flatten()
        .filter(|q| q.to_prefixed() == attribute.value);
    let map = object.core_mut().attributes_mut();
    match qname {
        Some(q) => map.insert_qname(attribute.name.clone(), q),
        None => map.insert(attribute.name.clone(), attribute.value.clone()),
    }
}

/// The element's `xsi:type`, resolved against `scope`.
///
/// `scope` must already include the element's own declarations.
fn schema_type_of(element: &Element, scope: &NamespaceScope) -> Option<QName> {
    let value = element.schema_type_value()?;
    let resolve = |prefix: Option<&str>| {
        element
            .declared_namespace(prefix)
            .filter(|uri| !uri.is_empty())
            .or_else(|| scope.resolve(prefix))
    };
    QName::parse_prefixed(value, resolve)
}
