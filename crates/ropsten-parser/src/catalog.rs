#![forbid(unsafe_code)]

//! Schema-location catalog.
//!
//! Maps a namespace URI or system identifier to a local file. Only the
//! `<system systemId=".." uri=".."/>` subset of the OASIS catalog format is
//! understood; anything else in a catalog document is ignored.

use ropsten_core::{ns, Error, Message};
use ropsten_xml::XmlDocument;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Namespace/system identifier → local file mapping.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, PathBuf>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog document.
    ///
    /// Relative `uri` values are resolved against `base_dir`, normally the
    /// directory holding the catalog file.
    pub fn parse(xml: &str, base_dir: Option<&Path>) -> Result<Self, Error> {
        let doc = XmlDocument::parse(xml.to_owned())?;
        let root = doc.root();
        if root.name.local_name() != ns::node::CATALOG
            || !matches!(root.name.namespace(), None | Some(ns::CATALOG))
        {
            return Err(Error::configuration(
                Message::new("unknown catalog root element: $name").param("name", &root.name),
            ));
        }

        let mut catalog = Catalog::new();
        for entry in root.child_elements() {
            if entry.name.local_name() != ns::node::SYSTEM {
                continue;
            }
            let (Some(system_id), Some(uri)) =
                (entry.attr(ns::attr::SYSTEM_ID), entry.attr(ns::attr::URI))
            else {
                continue;
            };
            catalog.insert(system_id, local_path(uri, base_dir));
        }
        Ok(catalog)
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, key: &str, path: impl Into<PathBuf>) {
        self.entries.insert(key.to_owned(), path.into());
    }

    /// Merge another catalog into this one; its entries win.
    pub fn merge(&mut self, other: Catalog) {
        self.entries.extend(other.entries);
    }

    /// Exact lookup.
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// First entry whose target path ends with `system_id`.
    ///
    /// This is a textual suffix test, so `b.xsd` also matches `/x/ab.xsd`.
    pub fn suffix_match(&self, system_id: &str) -> Option<&Path> {
        if system_id.is_empty() {
            return None;
        }
        self.entries
            .values()
            .find(|p| p.to_string_lossy().ends_with(system_id))
            .map(PathBuf::as_path)
    }

    /// The external schema location hint: `ns1 path1 ns2 path2 ...`.
    pub fn schema_location_hint(&self) -> String {
        self.entries
            .iter()
            .map(|(k, p)| format!("{k} {}", p.display()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, p)| (k.as_str(), p.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turn a catalog `uri` into a local path.
fn local_path(uri: &str, base_dir: Option<&Path>) -> PathBuf {
    let stripped = uri
        .strip_prefix("file://localhost")
        .or_else(|| uri.strip_prefix("file://"))
        .or_else(|| uri.strip_prefix("file:"))
        .unwrap_or(uri);
    let path = PathBuf::from(stripped);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Look up a namespace in a schema location hint string.
pub(crate) fn hint_location<'a>(hint: &'a str, namespace: &str) -> Option<&'a str> {
    let mut parts = hint.split_whitespace();
    while let (Some(ns), Some(loc)) = (parts.next(), parts.next()) {
        if ns == namespace {
            return Some(loc);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <system systemId="urn:example:one" uri="one.xsd"/>
  <system systemId="urn:example:two" uri="file:///opt/schemas/two.xsd"/>
  <public publicId="-//X//EN" uri="ignored.dtd"/>
  <system uri="missing-id.xsd"/>
</catalog>"#;

    #[test]
    fn test_parse_catalog() {
        let cat = Catalog::parse(CATALOG, Some(Path::new("/etc/schemas"))).unwrap();
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.get("urn:example:one"), Some(Path::new("/etc/schemas/one.xsd")));
        assert_eq!(cat.get("urn:example:two"), Some(Path::new("/opt/schemas/two.xsd")));
        assert_eq!(cat.get("-//X//EN"), None);
    }

    #[test]
    fn test_unknown_root_rejected() {
        let err = Catalog::parse("<catalogue/>", None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_suffix_match_and_hint() {
        let mut cat = Catalog::new();
        cat.insert("urn:a", "/s/a.xsd");
        cat.insert("urn:b", "/s/b.xsd");
        assert_eq!(cat.suffix_match("b.xsd"), Some(Path::new("/s/b.xsd")));
        assert_eq!(cat.suffix_match("s/a.xsd"), Some(Path::new("/s/a.xsd")));
        assert_eq!(cat.suffix_match("c.xsd"), None);
        assert_eq!(cat.suffix_match(""), None);

        let hint = cat.schema_location_hint();
        assert_eq!(hint, "urn:a /s/a.xsd urn:b /s/b.xsd");
        assert_eq!(hint_location(&hint, "urn:b"), Some("/s/b.xsd"));
        assert_eq!(hint_location(&hint, "urn:c"), None);
    }
}
