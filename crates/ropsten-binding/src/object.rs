#![forbid(unsafe_code)]

//! The bindable object model.

use ropsten_core::QName;
use ropsten_xml::Element;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A typed object bound to one XML element.
///
/// Every implementation embeds an [`ObjectCore`] holding the state the
/// generic marshalling code needs. Implement it with [`impl_xml_object!`].
pub trait XmlObject: fmt::Debug + Send + Sync + Any {
    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Deep copy; the copy never shares a cached tree with `self`.
    fn clone_object(&self) -> Box<dyn XmlObject>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implement [`XmlObject`] for a `Clone` type with a `core: ObjectCore` field.
#[macro_export]
macro_rules! impl_xml_object {
    ($ty:ty) => {
        impl $crate::XmlObject for $ty {
            fn core(&self) -> &$crate::ObjectCore {
                &self.core
            }

            fn core_mut(&mut self) -> &mut $crate::ObjectCore {
                &mut self.core
            }

            fn clone_object(&self) -> ::std::boxed::Box<dyn $crate::XmlObject> {
                ::std::boxed::Box::new(::std::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
}

impl dyn XmlObject {
    pub fn downcast_ref<T: XmlObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: XmlObject>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    pub fn is<T: XmlObject>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn element_name(&self) -> &QName {
        self.core().element_name()
    }

    /// Find this object or a descendant whose registered ID attribute has
    /// the value `id`.
    pub fn resolve_id(&self, id: &str) -> Option<&dyn XmlObject> {
        if self.core().attributes().id_value() == Some(id) {
            return Some(self);
        }
        self.core()
            .children()
            .iter()
            .find_map(|child| child.resolve_id(id))
    }
}

impl Clone for Box<dyn XmlObject> {
    fn clone(&self) -> Self {
        self.clone_object()
    }
}

// ── Namespaces ───────────────────────────────────────────────────────

/// How a namespace declaration is used by the element carrying it.
///
/// Ordered by strength: a stronger classification always wins a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NamespaceUsage {
    /// Declared here, no use seen yet.
    Indeterminate,
    /// Only referenced from inside an attribute value (a QName value).
    NonVisiblyUsed,
    /// Referenced by the element name or an attribute name.
    VisiblyUsed,
}

/// A namespace binding recorded on an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
    pub usage: NamespaceUsage,
}

impl Namespace {
    pub fn new(prefix: Option<&str>, uri: &str, usage: NamespaceUsage) -> Self {
        Self {
            prefix: prefix.map(str::to_owned),
            uri: uri.to_owned(),
            usage,
        }
    }
}

// ── Attributes ───────────────────────────────────────────────────────

/// One attribute kept in an [`AttributeMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionAttribute {
    pub name: QName,
    pub value: String,
    /// Set when the value is itself a qualified name.
    pub qname_value: Option<QName>,
}

/// Attributes with no dedicated field on their object, in document order.
///
/// One attribute name may be registered as the object's ID attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<ExtensionAttribute>,
    id_attribute: Option<QName>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &QName) -> Option<&str> {
        self.entry(name).map(|a| a.value.as_str())
    }

    pub fn entry(&self, name: &QName) -> Option<&ExtensionAttribute> {
        self.entries.iter().find(|a| &a.name == name)
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn insert(&mut self, name: QName, value: impl Into<String>) {
        self.put(ExtensionAttribute {
            name,
            value: value.into(),
            qname_value: None,
        });
    }

    /// Set an attribute whose value is a qualified name.
    pub fn insert_qname(&mut self, name: QName, value: QName) {
        self.put(ExtensionAttribute {
            name,
            value: value.to_prefixed(),
            qname_value: Some(value),
        });
    }

    fn put(&mut self, attr: ExtensionAttribute) {
        match self.entries.iter_mut().find(|a| a.name == attr.name) {
            Some(existing) => *existing = attr,
            None => self.entries.push(attr),
        }
    }

    pub fn remove(&mut self, name: &QName) -> Option<ExtensionAttribute> {
        let pos = self.entries.iter().position(|a| &a.name == name)?;
        if self.id_attribute.as_ref() == Some(name) {
            self.id_attribute = None;
        }
        Some(self.entries.remove(pos))
    }

    /// Mark `name` as the ID attribute.
    pub fn register_id(&mut self, name: QName) {
        self.id_attribute = Some(name);
    }

    pub fn deregister_id(&mut self) {
        self.id_attribute = None;
    }

    pub fn id_attribute(&self) -> Option<&QName> {
        self.id_attribute.as_ref()
    }

    /// Value of the registered ID attribute.
    pub fn id_value(&self) -> Option<&str> {
        self.id_attribute.as_ref().and_then(|n| self.get(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionAttribute> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.id_attribute = None;
    }
}

// ── Object core ──────────────────────────────────────────────────────

/// State shared by every bindable object.
///
/// Mutating accessors drop the cached tree of this object only. A parent
/// notices a stale descendant when it is marshalled, because its own cache
/// only counts as valid while every descendant's cache is.
#[derive(Debug)]
pub struct ObjectCore {
    element: QName,
    schema_type: Option<QName>,
    namespaces: Vec<Namespace>,
    children: Vec<Box<dyn XmlObject>>,
    text: Option<String>,
    /// Text following a child, keyed by the child's index.
    tails: Vec<(usize, String)>,
    attributes: AttributeMap,
    schema_location: Option<String>,
    no_namespace_schema_location: Option<String>,
    nil: Option<bool>,
    dom: Option<Arc<Element>>,
}

impl ObjectCore {
    pub fn new(element: QName) -> Self {
        Self {
            element,
            schema_type: None,
            namespaces: Vec::new(),
            children: Vec::new(),
            text: None,
            tails: Vec::new(),
            attributes: AttributeMap::new(),
            schema_location: None,
            no_namespace_schema_location: None,
            nil: None,
            dom: None,
        }
    }

    pub fn with_schema_type(element: QName, schema_type: Option<QName>) -> Self {
        let mut core = Self::new(element);
        core.schema_type = schema_type;
        core
    }

    pub fn element_name(&self) -> &QName {
        &self.element
    }

    pub fn schema_type(&self) -> Option<&QName> {
        self.schema_type.as_ref()
    }

    pub fn set_schema_type(&mut self, schema_type: Option<QName>) {
        self.schema_type = schema_type;
        self.release_dom();
    }

    pub fn children(&self) -> &[Box<dyn XmlObject>] {
        &self.children
    }

    /// Mutable access to the child list.
    pub fn children_mut(&mut self) -> &mut Vec<Box<dyn XmlObject>> {
        self.release_dom();
        &mut self.children
    }

    pub fn push_child(&mut self, child: Box<dyn XmlObject>) {
        self.children_mut().push(child);
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text;
        self.release_dom();
    }

    /// Text written right after the child at `index`.
    pub fn tail_text(&self, index: usize) -> Option<&str> {
        self.tails
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, t)| t.as_str())
    }

    pub fn set_tail_text(&mut self, index: usize, text: Option<String>) {
        self.tails.retain(|(i, _)| *i != index);
        if let Some(text) = text {
            let at = self.tails.partition_point(|(i, _)| *i < index);
            self.tails.insert(at, (index, text));
        }
        self.release_dom();
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeMap {
        self.release_dom();
        &mut self.attributes
    }

    pub fn schema_location(&self) -> Option<&str> {
        self.schema_location.as_deref()
    }

    pub fn set_schema_location(&mut self, location: Option<String>) {
        self.schema_location = location;
        self.release_dom();
    }

    pub fn no_namespace_schema_location(&self) -> Option<&str> {
        self.no_namespace_schema_location.as_deref()
    }

    pub fn set_no_namespace_schema_location(&mut self, location: Option<String>) {
        self.no_namespace_schema_location = location;
        self.release_dom();
    }

    pub fn nil(&self) -> Option<bool> {
        self.nil
    }

    pub fn set_nil(&mut self, nil: Option<bool>) {
        self.nil = nil;
        self.release_dom();
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Record a namespace, merging with an existing record for the same
    /// binding. Does not touch the cached tree.
    pub fn add_namespace(&mut self, namespace: Namespace) {
        match self
            .namespaces
            .iter_mut()
            .find(|n| n.prefix == namespace.prefix && n.uri == namespace.uri)
        {
            Some(existing) => existing.usage = existing.usage.max(namespace.usage),
            None => self.namespaces.push(namespace),
        }
    }

    pub fn remove_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        self.namespaces
            .retain(|n| !(n.prefix.as_deref() == prefix && n.uri == uri));
        self.release_dom();
    }

    /// Strongest recorded usage of `prefix`.
    pub fn namespace_usage(&self, prefix: Option<&str>) -> Option<NamespaceUsage> {
        self.namespaces
            .iter()
            .filter(|n| n.prefix.as_deref() == prefix)
            .map(|n| n.usage)
            .max()
    }

    /// Prefixes only used inside attribute values, `#default` standing for
    /// the default namespace. This is the inclusive prefix list exclusive
    /// canonicalization needs.
    pub fn non_visibly_used_prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<String> = Vec::new();
        for n in &self.namespaces {
            if self.namespace_usage(n.prefix.as_deref()) != Some(NamespaceUsage::NonVisiblyUsed) {
                continue;
            }
            let p = n.prefix.clone().unwrap_or_else(|| "#default".to_owned());
            if !prefixes.contains(&p) {
                prefixes.push(p);
            }
        }
        prefixes
    }

    /// The cached tree, whether or not it is still valid.
    pub fn dom(&self) -> Option<&Arc<Element>> {
        self.dom.as_ref()
    }

    pub fn set_dom(&mut self, dom: Arc<Element>) {
        self.dom = Some(dom);
    }

    /// Drop the cached tree of this object.
    pub fn release_dom(&mut self) {
        self.dom = None;
    }

    /// Drop cached trees of this object and every descendant.
    pub fn release_subtree_dom(&mut self) {
        self.dom = None;
        for child in &mut self.children {
            child.core_mut().release_subtree_dom();
        }
    }

    /// `true` if this object and all its descendants hold a cached tree.
    pub fn is_cache_valid(&self) -> bool {
        self.dom.is_some() && self.children.iter().all(|c| c.core().is_cache_valid())
    }

    /// The cached tree if it may be reused as is.
    pub fn cached_dom(&self) -> Option<&Arc<Element>> {
        if self.is_cache_valid() {
            self.dom.as_ref()
        } else {
            None
        }
    }
}

impl Clone for ObjectCore {
    fn clone(&self) -> Self {
        Self {
            element: self.element.clone(),
            schema_type: self.schema_type.clone(),
            namespaces: self.namespaces.clone(),
            children: self.children.iter().map(|c| c.clone_object()).collect(),
            text: self.text.clone(),
            tails: self.tails.clone(),
            attributes: self.attributes.clone(),
            schema_location: self.schema_location.clone(),
            no_namespace_schema_location: self.no_namespace_schema_location.clone(),
            nil: self.nil,
            dom: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Plain {
        core: ObjectCore,
    }

    impl_xml_object!(Plain);

    fn plain(local: &str) -> Box<dyn XmlObject> {
        Box::new(Plain {
            core: ObjectCore::new(QName::ns("urn:t", local)),
        })
    }

    #[test]
    fn test_setters_release_dom() {
        let mut core = ObjectCore::new(QName::local("a"));
        let dom = Arc::new(Element::new(QName::local("a")));

        core.set_dom(dom.clone());
        assert!(core.is_cache_valid());
        core.set_text(Some("x".into()));
        assert!(core.dom().is_none());

        core.set_dom(dom.clone());
        core.attributes_mut().insert(QName::local("k"), "v");
        assert!(core.dom().is_none());

        core.set_dom(dom.clone());
        core.add_namespace(Namespace::new(Some("p"), "urn:p", NamespaceUsage::Indeterminate));
        assert!(core.dom().is_some());
    }

    #[test]
    fn test_stale_child_invalidates_parent_cache() {
        let mut parent = plain("p");
        parent.core_mut().push_child(plain("c"));
        parent.core_mut().children_mut()[0]
            .core_mut()
            .set_dom(Arc::new(Element::new(QName::local("c"))));
        parent
            .core_mut()
            .set_dom(Arc::new(Element::new(QName::local("p"))));
        assert!(parent.core().cached_dom().is_some());

        let child = &mut parent.core_mut().children_mut()[0];
        child.core_mut().set_text(Some("changed".into()));
        parent
            .core_mut()
            .set_dom(Arc::new(Element::new(QName::local("p"))));
        assert!(parent.core().dom().is_some());
        assert!(parent.core().cached_dom().is_none());
    }

    #[test]
    fn test_clone_is_deep_and_unbound() {
        let mut obj = plain("p");
        obj.core_mut().push_child(plain("c"));
        obj.core_mut()
            .set_dom(Arc::new(Element::new(QName::local("p"))));
        let copy = obj.clone();
        assert!(copy.core().dom().is_none());
        assert_eq!(copy.core().children().len(), 1);
        assert!(copy.is::<Plain>());
        assert!(copy.downcast_ref::<Plain>().is_some());
    }

    #[test]
    fn test_namespace_usage_merge() {
        let mut core = ObjectCore::new(QName::local("a"));
        core.add_namespace(Namespace::new(Some("q"), "urn:q", NamespaceUsage::Indeterminate));
        core.add_namespace(Namespace::new(Some("q"), "urn:q", NamespaceUsage::NonVisiblyUsed));
        core.add_namespace(Namespace::new(Some("p"), "urn:p", NamespaceUsage::NonVisiblyUsed));
        core.add_namespace(Namespace::new(Some("p"), "urn:p", NamespaceUsage::VisiblyUsed));
        core.add_namespace(Namespace::new(Some("p"), "urn:p", NamespaceUsage::Indeterminate));
        assert_eq!(core.namespaces().len(), 2);
        assert_eq!(core.namespace_usage(Some("p")), Some(NamespaceUsage::VisiblyUsed));
        assert_eq!(core.namespace_usage(Some("q")), Some(NamespaceUsage::NonVisiblyUsed));
        assert_eq!(core.non_visibly_used_prefixes(), vec!["q".to_owned()]);
    }

    #[test]
    fn test_attribute_map_id() {
        let mut map = AttributeMap::new();
        map.insert(QName::local("a"), "1");
        map.insert(QName::local("ID"), "_abc");
        map.insert(QName::local("a"), "2");
        map.register_id(QName::local("ID"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().next().map(|a| a.value.as_str()), Some("2"));
        assert_eq!(map.id_value(), Some("_abc"));
        map.remove(&QName::local("ID"));
        assert_eq!(map.id_attribute(), None);
    }

    #[test]
    fn test_resolve_id() {
        let mut root = plain("root");
        let mut child = plain("child");
        child.core_mut().attributes_mut().insert(QName::local("ID"), "target");
        child.core_mut().attributes_mut().register_id(QName::local("ID"));
        root.core_mut().push_child(child);

        let found = root.resolve_id("target").map(|o| o.element_name().clone());
        assert_eq!(found, Some(QName::ns("urn:t", "child")));
        assert!(root.resolve_id("other").is_none());
    }
}
