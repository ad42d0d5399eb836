#![forbid(unsafe_code)]

//! Named factories for pluggable services.

use crate::config;
use ropsten_core::{Error, Message};
use ropsten_xml::Element;
use std::collections::HashMap;
use std::fmt;

/// Builds one service instance from a configuration fragment.
///
/// The manager is passed along so container plugins can build their nested
/// plugins from the same set of factories.
pub type Factory<T> = Box<dyn Fn(&Element, &PluginManager<T>) -> Result<Box<T>, Error> + Send + Sync>;

/// Factories for one service category, keyed by plugin type name.
///
/// Every [`new_plugin`](Self::new_plugin) call produces an independent
/// instance owned by the caller.
pub struct PluginManager<T: ?Sized> {
    category: &'static str,
    factories: HashMap<String, Factory<T>>,
}

impl<T: ?Sized> PluginManager<T> {
    /// Create an empty manager; `category` only labels diagnostics.
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            factories: HashMap::new(),
        }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Register a factory, dropping any previous one for `type_id`.
    pub fn register_factory<F>(&mut self, type_id: &str, factory: F)
    where
        F: Fn(&Element, &PluginManager<T>) -> Result<Box<T>, Error> + Send + Sync + 'static,
    {
        tracing::debug!(category = self.category, type_id, "registering plugin factory");
        self.factories.insert(type_id.to_owned(), Box::new(factory));
    }

    pub fn deregister_factory(&mut self, type_id: &str) {
        if self.factories.remove(type_id).is_some() {
            tracing::debug!(category = self.category, type_id, "deregistered plugin factory");
        }
    }

    pub fn deregister_factories(&mut self) {
        self.factories.clear();
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.factories.contains_key(type_id)
    }

    /// Registered plugin type names, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build a plugin of type `type_id` from `config`.
    pub fn new_plugin(&self, type_id: &str, config: &Element) -> Result<Box<T>, Error> {
        let Some(factory) = self.factories.get(type_id) else {
            return Err(Error::configuration(
                Message::new("unknown $category plugin type: $type")
                    .param("category", self.category)
                    .param("type", type_id),
            ));
        };
        tracing::debug!(category = self.category, type_id, "building plugin");
        factory(config, self)
    }

    /// Build a plugin whose type is named by the fragment's `type` attribute.
    pub fn new_plugin_from(&self, config: &Element) -> Result<Box<T>, Error> {
        let type_id = config::plugin_type(config)?;
        self.new_plugin(type_id, config)
    }
}

impl<T: ?Sized> fmt::Debug for PluginManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("category", &self.category)
            .field("types", &self.types())
            .finish()
    }
}
