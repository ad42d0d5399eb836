#![forbid(unsafe_code)]

//! Object → tree.
//!
//! An object whose cached tree is still valid (its own and every
//! descendant's) is not rebuilt. Its fragment is returned as is, or as a
//! shallow copy of the top element carrying the namespace declarations the
//! fragment needs but the target position does not provide. Such copies are
//! never cached.

use crate::object::{Namespace, NamespaceUsage, XmlObject};
use crate::registry::Registry;
use ropsten_core::{ns, Error, Message, QName};
use ropsten_xml::scope::undeclared;
use ropsten_xml::{Element, NamespaceDecl, NamespaceScope};
use std::sync::Arc;

/// Turns one kind of object into a tree.
pub trait Marshaller: Send + Sync {
    /// Write type-specific attributes onto `element`.
    fn marshall_attributes(&self, _object: &dyn XmlObject, _element: &mut Element) -> Result<(), Error> {
        Ok(())
    }

    /// Write type-specific content. The default writes the text value.
    fn marshall_content(&self, object: &dyn XmlObject, element: &mut Element) -> Result<(), Error> {
        if let Some(text) = object.core().text() {
            element.push_text(text);
        }
        Ok(())
    }

    fn marshall(&self, object: &mut dyn XmlObject, ctx: &mut Marshalling<'_>) -> Result<Arc<Element>, Error> {
        marshall_generic(self, object, ctx)
    }
}

/// One marshalling pass over an object graph.
pub struct Marshalling<'a> {
    marshallers: &'a Registry<dyn Marshaller>,
    scope: NamespaceScope,
}

impl<'a> Marshalling<'a> {
    pub fn new(marshallers: &'a Registry<dyn Marshaller>) -> Self {
        Self::with_scope(marshallers, NamespaceScope::new())
    }

    /// Marshall for placement under a tree whose in-scope declarations are
    /// `scope`.
    pub fn with_scope(marshallers: &'a Registry<dyn Marshaller>, scope: NamespaceScope) -> Self {
        Self { marshallers, scope }
    }

    pub fn scope(&self) -> &NamespaceScope {
        &self.scope
    }

    /// Marshall `object`, reusing its cached tree when valid.
    pub fn marshall(&mut self, object: &mut dyn XmlObject) -> Result<Arc<Element>, Error> {
        if let Some(cached) = object.core().cached_dom() {
            return Ok(self.reroot(cached.clone()));
        }

        let marshallers = self.marshallers;
        let Some(marshaller) = marshallers.lookup_object(object) else {
            return Err(Error::marshalling(
                Message::new("no marshaller registered for $element")
                    .param("element", object.element_name()),
            ));
        };
        let element = marshaller.marshall(object, self)?;
        object.core_mut().set_dom(element.clone());
        Ok(self.reroot(element))
    }

    fn reroot(&self, element: Arc<Element>) -> Arc<Element> {
        let missing = undeclared(&element, &self.scope);
        if missing.is_empty() {
            return element;
        }
        let mut copy = Element::clone(&element);
        for decl in missing {
            copy.declare_namespace(decl.prefix.as_deref(), &decl.uri);
        }
        Arc::new(copy)
    }
}

/// The marshalling algorithm shared by every marshaller.
///
/// Writes the element name, the schema-instance attributes, the marshaller's
/// own attributes and the extension attributes, declares every namespace
/// they need that is not already in scope, then writes content followed by
/// the children in order.
pub fn marshall_generic<M: Marshaller + ?Sized>(
    marshaller: &M,
    object: &mut dyn XmlObject,
    ctx: &mut Marshalling<'_>,
) -> Result<Arc<Element>, Error> {
    ctx.scope.push(&[]);
    let result = build_element(marshaller, object, ctx);
    ctx.scope.pop();
    result.map(Arc::new)
}

fn build_element<M: Marshaller + ?Sized>(
    marshaller: &M,
    object: &mut dyn XmlObject,
    ctx: &mut Marshalling<'_>,
) -> Result<Element, Error> {
    let core = object.core();
    let mut element = Element::new(core.element_name().clone());

    for namespace in core.namespaces() {
        declare(&mut element, &mut ctx.scope, namespace.prefix.as_deref(), Some(namespace.uri.as_str()));
    }

    let mut qname_attrs: Vec<(QName, QName)> = Vec::new();
    let xsi = xsi_prefix(object, &ctx.scope);
    let xsi_attr = |local: &str| QName::new(Some(ns::XSI), local, Some(xsi.as_str()));
    if let Some(schema_type) = core.schema_type() {
        let name = xsi_attr(ns::attr::TYPE);
        element.set_attribute(name.clone(), schema_type.to_prefixed());
        qname_attrs.push((name, schema_type.clone()));
    }
    if let Some(location) = core.schema_location() {
        element.set_attribute(xsi_attr(ns::attr::SCHEMA_LOCATION), location);
    }
    if let Some(location) = core.no_namespace_schema_location() {
        element.set_attribute(xsi_attr(ns::attr::NO_NAMESPACE_SCHEMA_LOCATION), location);
    }
    if let Some(nil) = core.nil() {
        element.set_attribute(xsi_attr(ns::attr::NIL), if nil { "true" } else { "false" });
    }

    marshaller.marshall_attributes(&*object, &mut element)?;

    for attr in object.core().attributes().iter() {
        element.set_attribute(attr.name.clone(), attr.value.clone());
        if let Some(q) = &attr.qname_value {
            qname_attrs.push((attr.name.clone(), q.clone()));
        }
    }

    let mut usage = classify(&element, &[]);
    for namespace in &usage {
        declare(&mut element, &mut ctx.scope, namespace.prefix.as_deref(), Some(namespace.uri.as_str()));
    }
    if element.name.namespace().is_none() {
        declare(&mut element, &mut ctx.scope, None, None);
    }
    let mut qname_values = Vec::with_capacity(qname_attrs.len());
    for (name, value) in qname_attrs {
        let bound = bind_qname(&mut element, &mut ctx.scope, &value);
        if bound.prefix() != value.prefix() {
            element.set_attribute(name, bound.to_prefixed());
        }
        qname_values.push(bound);
    }
    for q in &qname_values {
        let Some(uri) = q.namespace() else { continue };
        if usage.iter().any(|n| n.prefix.as_deref() == q.prefix() && n.uri == uri) {
            continue;
        }
        usage.push(Namespace::new(q.prefix(), uri, NamespaceUsage::NonVisiblyUsed));
    }

    marshaller.marshall_content(&*object, &mut element)?;

    let core = object.core_mut();
    let tails: Vec<Option<String>> = (0..core.children().len())
        .map(|i| core.tail_text(i).map(str::to_owned))
        .collect();
    for (child, tail) in core.children_mut().iter_mut().zip(tails) {
        let fragment = ctx.marshall(child.as_mut())?;
        element.push_element(fragment);
        if let Some(tail) = tail {
            element.push_text(tail);
        }
    }

    let core = object.core_mut();
    for namespace in usage {
        core.add_namespace(namespace);
    }
    Ok(element)
}

/// Declare `prefix` → `uri` on `element` unless the scope already binds it.
fn declare(element: &mut Element, scope: &mut NamespaceScope, prefix: Option<&str>, uri: Option<&str>) {
    if prefix == Some(ns::prefix::XML) || scope.is_bound(prefix, uri) {
        return;
    }
    if element.declared_namespace(prefix).is_some() {
        return;
    }
    let decl = NamespaceDecl::new(prefix, uri.unwrap_or(""));
    element.namespaces.push(decl.clone());
    scope.declare(decl);
}

/// Make `value` resolvable on `element`, returning it with the prefix it
/// must be written with.
///
/// An unbound prefix is declared as is. A prefix, or the default namespace,
/// already bound to another URI is replaced by a prefix that is bound to the
/// right URI, or by a fresh `nsN` prefix.
fn bind_qname(element: &mut Element, scope: &mut NamespaceScope, value: &QName) -> QName {
    let Some(uri) = value.namespace() else {
        return value.clone();
    };
    let prefix = value.prefix();
    if scope.resolve(prefix) == Some(uri) {
        return value.clone();
    }
    if let Some(p) = prefix {
        if p != ns::prefix::XML && scope.resolve(Some(p)).is_none() {
            declare(element, scope, Some(p), Some(uri));
            return value.clone();
        }
    }

    let existing = scope.prefix_for(uri).flatten().map(str::to_owned);
    let prefix = existing.unwrap_or_else(|| {
        let fresh = (1..)
            .map(|i| format!("ns{i}"))
            .find(|p| scope.resolve(Some(p)).is_none())
            .unwrap_or_default();
        declare(element, scope, Some(&fresh), Some(uri));
        fresh
    });
    QName::new(Some(uri), value.local_name(), Some(&prefix))
}

/// The prefix to write schema-instance attributes with.
fn xsi_prefix(object: &dyn XmlObject, scope: &NamespaceScope) -> String {
    object
        .core()
        .namespaces()
        .iter()
        .find(|n| n.uri == ns::XSI && n.prefix.is_some())
        .and_then(|n| n.prefix.clone())
        .or_else(|| scope.prefix_for(ns::XSI).flatten().map(str::to_owned))
        .unwrap_or_else(|| ns::prefix::XSI.to_owned())
}

/// Namespace usage of one element.
///
/// The element name and attribute names use their namespaces visibly;
/// qualified names inside attribute values use theirs non-visibly.
pub(crate) fn classify(element: &Element, qname_values: &[QName]) -> Vec<Namespace> {
    let mut usage: Vec<Namespace> = Vec::new();
    let mut record = |prefix: Option<&str>, uri: Option<&str>, kind: NamespaceUsage| {
        let Some(uri) = uri else { return };
        if prefix == Some(ns::prefix::XML) {
            return;
        }
        match usage
            .iter_mut()
            .find(|n: &&mut Namespace| n.prefix.as_deref() == prefix && n.uri == uri)
        {
            Some(existing) => existing.usage = existing.usage.max(kind),
            None => usage.push(Namespace::new(prefix, uri, kind)),
        }
    };

    record(element.name.prefix(), element.name.namespace(), NamespaceUsage::VisiblyUsed);
    for attr in &element.attributes {
        if attr.name.prefix().is_some() {
            record(attr.name.prefix(), attr.name.namespace(), NamespaceUsage::VisiblyUsed);
        }
    }
    for q in qname_values {
        record(q.prefix(), q.namespace(), NamespaceUsage::NonVisiblyUsed);
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::{AnyElement, AnyElementMarshaller};
    use crate::registry::BindingContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often it actually builds a tree.
    struct CountingMarshaller {
        calls: Arc<AtomicUsize>,
    }

    impl Marshaller for CountingMarshaller {
        fn marshall(&self, object: &mut dyn XmlObject, ctx: &mut Marshalling<'_>) -> Result<Arc<Element>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            marshall_generic(self, object, ctx)
        }
    }

    fn any(ns: &str, local: &str, prefix: Option<&str>) -> Box<dyn XmlObject> {
        Box::new(AnyElement::new(QName::new(Some(ns), local, prefix)))
    }

    #[test]
    fn test_marshall_builds_declarations() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));

        let mut root = any("urn:r", "Root", Some("r"));
        let mut child = any("urn:r", "Child", Some("r"));
        child.core_mut().set_text(Some("a < b".into()));
        root.core_mut().push_child(child);
        root.core_mut().push_child(any("urn:d", "Other", None));

        let tree = ctx.marshall(root.as_mut()).unwrap();
        assert_eq!(
            tree.to_xml(),
            r#"<r:Root xmlns:r="urn:r"><r:Child>a &lt; b</r:Child><Other xmlns="urn:d"/></r:Root>"#
        );
    }

    #[test]
    fn test_second_marshall_returns_cache() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));
        let mut root = any("urn:r", "Root", None);
        let first = ctx.marshall(root.as_mut()).unwrap();
        let second = ctx.marshall(root.as_mut()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_mutation_rebuilds_only_dirty_child() {
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));
        ctx.marshallers.register(
            QName::ns("urn:t", "A"),
            Box::new(CountingMarshaller { calls: a_calls.clone() }),
        );
        ctx.marshallers.register(
            QName::ns("urn:t", "B"),
            Box::new(CountingMarshaller { calls: b_calls.clone() }),
        );

        let mut root = any("urn:t", "Root", Some("t"));
        let mut a = any("urn:t", "A", Some("t"));
        a.core_mut().set_text(Some("a".into()));
        let mut b = any("urn:t", "B", Some("t"));
        b.core_mut().set_text(Some("old".into()));
        root.core_mut().push_child(a);
        root.core_mut().push_child(b);

        let first = ctx.marshall(root.as_mut()).unwrap();
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        let first_a = first.child_elements().next().unwrap().clone();

        root.core_mut().children_mut()[1]
            .core_mut()
            .set_text(Some("new".into()));
        let second = ctx.marshall(root.as_mut()).unwrap();

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&first_a, second.child_elements().next().unwrap()));
        assert_eq!(
            second.to_xml(),
            r#"<t:Root xmlns:t="urn:t"><t:A>a</t:A><t:B>new</t:B></t:Root>"#
        );
    }

    #[test]
    fn test_namespace_visibility() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));

        let mut obj = any("urn:u1", "E", Some("p"));
        obj.core_mut()
            .attributes_mut()
            .insert_qname(QName::local("ref"), QName::new(Some("urn:u2"), "v", Some("q")));
        let tree = ctx.marshall(obj.as_mut()).unwrap();

        assert_eq!(
            tree.to_xml(),
            r#"<p:E xmlns:p="urn:u1" xmlns:q="urn:u2" ref="q:v"/>"#
        );
        assert_eq!(obj.core().namespace_usage(Some("p")), Some(NamespaceUsage::VisiblyUsed));
        assert_eq!(obj.core().namespace_usage(Some("q")), Some(NamespaceUsage::NonVisiblyUsed));
        assert_eq!(obj.core().non_visibly_used_prefixes(), vec!["q".to_owned()]);
    }

    #[test]
    fn test_schema_instance_attributes() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));

        let mut obj = any("urn:t", "E", Some("t"));
        obj.core_mut()
            .set_schema_type(Some(QName::new(Some("urn:t"), "SubType", Some("t"))));
        obj.core_mut().set_nil(Some(true));
        let tree = ctx.marshall(obj.as_mut()).unwrap();
        assert_eq!(
            tree.to_xml(),
            concat!(
                r#"<t:E xmlns:t="urn:t" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
                r#"xsi:type="t:SubType" xsi:nil="true"/>"#
            )
        );
    }

    #[test]
    fn test_unprefixed_type_in_other_namespace_gets_prefix() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));

        let mut obj = any("urn:e", "E", None);
        obj.core_mut().set_schema_type(Some(QName::ns("urn:x", "T")));
        obj.core_mut()
            .attributes_mut()
            .insert_qname(QName::local("ref"), QName::new(Some("urn:x"), "v", None));
        let tree = ctx.marshall(obj.as_mut()).unwrap();
        assert_eq!(
            tree.to_xml(),
            concat!(
                r#"<E xmlns="urn:e" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
                r#"xmlns:ns1="urn:x" xsi:type="ns1:T" ref="ns1:v"/>"#
            )
        );
        assert_eq!(obj.core().namespace_usage(Some("ns1")), Some(NamespaceUsage::NonVisiblyUsed));
    }

    #[test]
    fn test_type_reuses_in_scope_prefix() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));

        let mut root = any("urn:x", "Root", Some("x"));
        let mut child = any("urn:e", "E", None);
        child.core_mut().set_schema_type(Some(QName::ns("urn:x", "T")));
        root.core_mut().push_child(child);
        let tree = ctx.marshall(root.as_mut()).unwrap();
        let e = tree.child_elements().next().unwrap();
        assert_eq!(e.schema_type_value(), Some("x:T"));
        assert_eq!(e.declared_namespace(Some("ns1")), None);
    }

    #[test]
    fn test_detached_cached_child_is_rerooted() {
        let mut ctx = BindingContext::new();
        ctx.marshallers.register_default(Box::new(AnyElementMarshaller));

        let mut root = any("urn:t", "Root", Some("t"));
        root.core_mut().push_child(any("urn:t", "Child", Some("t")));
        ctx.marshall(root.as_mut()).unwrap();

        let mut child = root.core_mut().children_mut().remove(0);
        let cached = child.core().dom().unwrap().clone();
        assert_eq!(cached.to_xml(), "<t:Child/>");

        let standalone = ctx.marshall(child.as_mut()).unwrap();
        assert_eq!(standalone.to_xml(), r#"<t:Child xmlns:t="urn:t"/>"#);
        assert!(Arc::ptr_eq(child.core().dom().unwrap(), &cached));
    }

    #[test]
    fn test_missing_marshaller() {
        let ctx = BindingContext::new();
        let mut obj = any("urn:t", "E", None);
        let err = ctx.marshall(obj.as_mut()).unwrap_err();
        assert!(matches!(err, Error::Marshalling(_)));
        assert_eq!(err.message().and_then(|m| m.get("element")), Some("{urn:t}E"));
    }
}
