#![forbid(unsafe_code)]

//! In-scope namespace tracking.

use crate::tree::{Element, NamespaceDecl};
use ropsten_core::ns;

/// A stack of namespace declaration frames, innermost last.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    frames: Vec<Vec<NamespaceDecl>>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame of declarations.
    pub fn push(&mut self, decls: &[NamespaceDecl]) {
        self.frames.push(decls.to_vec());
    }

    /// Push the declarations written on `element`.
    pub fn push_element(&mut self, element: &Element) {
        self.push(&element.namespaces);
    }

    /// Add a declaration to the innermost frame.
    pub fn declare(&mut self, decl: NamespaceDecl) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(decl),
            None => self.frames.push(vec![decl]),
        }
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Resolve a prefix (`None` for the default namespace) to its URI.
    ///
    /// The `xml` prefix is always bound. An undeclared default namespace
    /// (`xmlns=""`) resolves to `None`.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some(ns::prefix::XML) {
            return Some(ns::XML);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.iter().rev())
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// `true` if `prefix` currently resolves to `uri` (`None` meaning unbound).
    pub fn is_bound(&self, prefix: Option<&str>, uri: Option<&str>) -> bool {
        self.resolve(prefix) == uri.filter(|u| !u.is_empty())
    }

    /// Find an in-scope prefix bound to `uri`, innermost first.
    ///
    /// A prefix that has been re-bound further in is skipped.
    pub fn prefix_for(&self, uri: &str) -> Option<Option<&str>> {
        if uri == ns::XML {
            return Some(Some(ns::prefix::XML));
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.iter().rev())
            .filter(|d| d.uri == uri)
            .map(|d| d.prefix.as_deref())
            .find(|p| self.resolve(*p) == Some(uri))
    }
}

/// Declarations `element` needs from its context to be namespace-well-formed.
///
/// Walks the subtree and reports every prefix used by an element or
/// attribute name whose binding is neither declared inside the subtree nor
/// already present in `scope`. The first binding seen for a prefix wins.
pub fn undeclared(element: &Element, scope: &NamespaceScope) -> Vec<NamespaceDecl> {
    let mut scope = scope.clone();
    let mut needed = Vec::new();
    collect_undeclared(element, &mut scope, &mut needed);
    needed
}

fn collect_undeclared(element: &Element, scope: &mut NamespaceScope, needed: &mut Vec<NamespaceDecl>) {
    scope.push_element(element);

    let mut require = |prefix: Option<&str>, uri: Option<&str>, scope: &NamespaceScope| {
        if prefix == Some(ns::prefix::XML) || scope.is_bound(prefix, uri) {
            return;
        }
        if needed.iter().any(|d: &NamespaceDecl| d.prefix.as_deref() == prefix) {
            return;
        }
        needed.push(NamespaceDecl::new(prefix, uri.unwrap_or("")));
    };

    let name = &element.name;
    match name.prefix() {
        Some(p) => require(Some(p), name.namespace(), scope),
        None => require(None, name.namespace(), scope),
    }
    for attr in &element.attributes {
        if let Some(p) = attr.name.prefix() {
            require(Some(p), attr.name.namespace(), scope);
        }
    }

    for child in element.child_elements() {
        collect_undeclared(child, scope, needed);
    }
    scope.pop();
}
