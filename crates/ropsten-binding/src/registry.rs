#![forbid(unsafe_code)]

//! Strategy registries keyed by qualified name.

use crate::builder::Builder;
use crate::marshall::{Marshaller, Marshalling};
use crate::object::XmlObject;
use crate::unmarshall::{Unmarshaller, Unmarshalling};
use crate::{any, simple, unknown};
use ropsten_core::{Error, QName};
use ropsten_xml::{Element, NamespaceScope};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Owned strategies keyed by qualified name, plus one optional default.
///
/// Lookups never mutate the registry. Registering over an existing key drops
/// the previous strategy.
pub struct Registry<S: ?Sized> {
    entries: HashMap<QName, Box<S>>,
    default: Option<Box<S>>,
}

impl<S: ?Sized> Registry<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            default: None,
        }
    }

    /// Register `strategy` under `key`, dropping any previous one.
    pub fn register(&mut self, key: QName, strategy: Box<S>) {
        tracing::debug!(key = %key, "registering strategy");
        self.entries.insert(key, strategy);
    }

    /// Replace the fallback strategy.
    pub fn register_default(&mut self, strategy: Box<S>) {
        tracing::debug!("registering default strategy");
        self.default = Some(strategy);
    }

    /// Remove and drop the strategy for `key`.
    pub fn deregister(&mut self, key: &QName) {
        if self.entries.remove(key).is_some() {
            tracing::debug!(key = %key, "deregistered strategy");
        }
    }

    pub fn deregister_default(&mut self) {
        self.default = None;
    }

    /// Drop every strategy, the default included.
    pub fn destroy_all(&mut self) {
        self.entries.clear();
        self.default = None;
    }

    /// Exact lookup.
    pub fn lookup(&self, key: &QName) -> Option<&S> {
        self.entries.get(key).map(|s| &**s)
    }

    pub fn default_strategy(&self) -> Option<&S> {
        self.default.as_deref()
    }

    /// Dispatch lookup: schema type first, then element name, then the
    /// default.
    pub fn lookup_with_type(&self, schema_type: Option<&QName>, element: &QName) -> Option<&S> {
        schema_type
            .and_then(|t| self.lookup(t))
            .or_else(|| self.lookup(element))
            .or_else(|| self.default_strategy())
    }

    /// Dispatch lookup for an object.
    pub fn lookup_object(&self, object: &dyn XmlObject) -> Option<&S> {
        let core = object.core();
        self.lookup_with_type(core.schema_type(), core.element_name())
    }

    pub fn contains(&self, key: &QName) -> bool {
        self.entries.contains_key(key)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.default.is_none()
    }
}

impl<S: ?Sized> Default for Registry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("Registry")
            .field("keys", &keys)
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// The three binding registries.
///
/// Registration needs `&mut self`; lookups, marshalling and unmarshalling
/// only need `&self`, so a context behind a read/write lock can be shared by
/// many readers once configured.
#[derive(Debug, Default)]
pub struct BindingContext {
    pub builders: Registry<dyn Builder>,
    pub marshallers: Registry<dyn Marshaller>,
    pub unmarshallers: Registry<dyn Unmarshaller>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all three strategies for one element or type name.
    pub fn register(
        &mut self,
        key: QName,
        builder: Box<dyn Builder>,
        marshaller: Box<dyn Marshaller>,
        unmarshaller: Box<dyn Unmarshaller>,
    ) {
        self.builders.register(key.clone(), builder);
        self.marshallers.register(key.clone(), marshaller);
        self.unmarshallers.register(key, unmarshaller);
    }

    pub fn deregister(&mut self, key: &QName) {
        self.builders.deregister(key);
        self.marshallers.deregister(key);
        self.unmarshallers.deregister(key);
    }

    /// Install the opaque passthrough strategies as defaults, so elements
    /// with no registration are kept verbatim.
    pub fn install_unknown_defaults(&mut self) {
        self.marshallers
            .register_default(Box::new(unknown::UnknownElementMarshaller));
        self.unmarshallers
            .register_default(Box::new(unknown::UnknownElementUnmarshaller));
    }

    /// Register the generic extensible element under `key`.
    pub fn register_any(&mut self, key: QName) {
        self.register(
            key,
            Box::new(any::AnyElementBuilder),
            Box::new(any::AnyElementMarshaller),
            Box::new(any::AnyElementUnmarshaller),
        );
    }

    /// Register the text-only element under `key`.
    pub fn register_simple(&mut self, key: QName) {
        self.register(
            key,
            Box::new(simple::SimpleElementBuilder),
            Box::new(simple::SimpleElementMarshaller),
            Box::new(simple::SimpleElementUnmarshaller),
        );
    }

    pub fn destroy_all(&mut self) {
        self.builders.destroy_all();
        self.marshallers.destroy_all();
        self.unmarshallers.destroy_all();
    }

    /// Build an empty object for an element name and optional schema type.
    pub fn build(&self, element: &QName, schema_type: Option<&QName>) -> Option<Box<dyn XmlObject>> {
        self.builders
            .lookup_with_type(schema_type, element)
            .map(|b| b.build(element, schema_type))
    }

    /// Bind a tree to a typed object.
    ///
    /// With `bind` set, the object caches `element` so an unmodified object
    /// marshalls back to the same tree.
    pub fn unmarshall(&self, element: &Arc<Element>, bind: bool) -> Result<Box<dyn XmlObject>, Error> {
        Unmarshalling::new(&self.builders, &self.unmarshallers).unmarshall(element, bind)
    }

    /// Serialize an object to a tree, reusing valid cached fragments.
    pub fn marshall(&self, object: &mut dyn XmlObject) -> Result<Arc<Element>, Error> {
        Marshalling::new(&self.marshallers).marshall(object)
    }

    /// Marshall an object for placement under an existing tree whose
    /// in-scope declarations are `scope`.
    pub fn marshall_in(
        &self,
        object: &mut dyn XmlObject,
        scope: NamespaceScope,
    ) -> Result<Arc<Element>, Error> {
        Marshalling::with_scope(&self.marshallers, scope).marshall(object)
    }
}
