#![forbid(unsafe_code)]

//! Qualified names.
//!
//! A [`QName`] identifies an element, an attribute or a schema type. The
//! prefix is a presentation alias only: equality, ordering and hashing look
//! at the namespace URI and the local name.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An immutable `(namespace URI, local name, prefix)` triple.
#[derive(Debug, Clone)]
pub struct QName {
    namespace: Option<String>,
    local: String,
    prefix: Option<String>,
}

impl QName {
    /// Create a name. Empty namespace and prefix strings are treated as absent.
    pub fn new(namespace: Option<&str>, local: &str, prefix: Option<&str>) -> Self {
        Self {
            namespace: namespace.filter(|s| !s.is_empty()).map(str::to_owned),
            local: local.to_owned(),
            prefix: prefix.filter(|s| !s.is_empty()).map(str::to_owned),
        }
    }

    /// A name in a namespace, without a prefix.
    pub fn ns(namespace: &str, local: &str) -> Self {
        Self::new(Some(namespace), local, None)
    }

    /// A name in no namespace.
    pub fn local(local: &str) -> Self {
        Self::new(None, local, None)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Same identity, different presentation prefix.
    pub fn with_prefix(&self, prefix: Option<&str>) -> Self {
        Self::new(self.namespace(), &self.local, prefix)
    }

    /// `true` if namespace and local name match.
    pub fn matches(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace.filter(|s| !s.is_empty()) && self.local == local
    }

    /// The lexical form, `prefix:local` or just `local`.
    pub fn to_prefixed(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }

    /// Parse a lexical QName such as an `xsi:type` value.
    ///
    /// `resolve` maps a prefix (`None` for the default namespace) to its
    /// namespace URI. Returns `None` if the value is empty or uses an
    /// unbound prefix.
    pub fn parse_prefixed<'a, F>(value: &str, resolve: F) -> Option<Self>
    where
        F: Fn(Option<&str>) -> Option<&'a str>,
    {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match value.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
                let ns = resolve(Some(prefix))?;
                Some(Self::new(Some(ns), local, Some(prefix)))
            }
            Some(_) => None,
            None => Some(Self::new(resolve(None), value, None)),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace
            .cmp(&other.namespace)
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Clark notation: `{namespace}local`, or `local` when unqualified.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}
