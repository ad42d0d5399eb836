#![forbid(unsafe_code)]

//! A configured tree parser handed out by a [`ParserPool`](crate::ParserPool).

use crate::catalog::hint_location;
use crate::dtd;
use crate::pool::PoolInner;
use crate::resolver::Resource;
use ropsten_core::{ns, Error};
use ropsten_xml::{Element, XmlDocument};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Weak;

/// Resource bounds applied to every parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityLimits {
    /// Largest accepted document, in bytes.
    pub max_document_size: usize,
    /// Upper bound on tree nodes, entity expansion included.
    pub max_nodes: u32,
    /// Accept a DOCTYPE at all.
    pub allow_dtd: bool,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_document_size: 16 * 1024 * 1024,
            max_nodes: 1_000_000,
            allow_dtd: true,
        }
    }
}

/// A tree parser configured by its pool.
///
/// External references (a DOCTYPE external subset, grammars for
/// schema-aware parsing) are only ever obtained through the owning pool's
/// restrictive resolver.
#[derive(Debug)]
pub struct Parser {
    id: u64,
    namespace_aware: bool,
    schema_aware: bool,
    limits: SecurityLimits,
    /// External schema location hint, `ns path ns path ...`.
    schema_location: String,
    /// Namespaces whose grammar was loaded and checked under the current hint.
    grammars: HashSet<String>,
    base_dir: Option<PathBuf>,
    resolver: Weak<PoolInner>,
    /// Diagnostics from the last parse.
    errors: Vec<String>,
}

impl Parser {
    pub(crate) fn new(
        id: u64,
        namespace_aware: bool,
        schema_aware: bool,
        limits: SecurityLimits,
        resolver: Weak<PoolInner>,
    ) -> Self {
        Self {
            id,
            namespace_aware,
            schema_aware,
            limits,
            schema_location: String::new(),
            grammars: HashSet::new(),
            base_dir: None,
            resolver,
            errors: Vec::new(),
        }
    }

    /// Identity of this parser instance within its pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_namespace_aware(&self) -> bool {
        self.namespace_aware
    }

    pub fn is_schema_aware(&self) -> bool {
        self.schema_aware
    }

    pub fn schema_location(&self) -> &str {
        &self.schema_location
    }

    /// Directory bare file names are resolved against.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = Some(dir.into());
    }

    /// Diagnostics recorded by the last failed parse.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub(crate) fn set_schema_location(&mut self, hint: &str) {
        if self.schema_location != hint {
            self.schema_location = hint.to_owned();
            self.grammars.clear();
        }
    }

    /// Drop per-use state before the parser goes back to the pool.
    pub(crate) fn reset(&mut self) {
        self.errors.clear();
        self.base_dir = None;
    }

    /// Parse a document held in memory.
    pub fn parse(&mut self, text: &str) -> Result<XmlDocument, Error> {
        self.errors.clear();
        let result = self.parse_inner(text);
        if let Err(e) = &result {
            tracing::debug!(parser = self.id, error = %e, "parse failed");
        }
        result
    }

    /// Parse a file; bare-name references resolve next to it unless a base
    /// directory was set.
    pub fn parse_file(&mut self, path: &Path) -> Result<XmlDocument, Error> {
        let text = std::fs::read_to_string(path)?;
        if self.base_dir.is_none() {
            if let Some(dir) = path.parent() {
                self.base_dir = Some(dir.to_path_buf());
            }
        }
        self.parse(&text)
    }

    fn parse_inner(&mut self, text: &str) -> Result<XmlDocument, Error> {
        if text.len() > self.limits.max_document_size {
            return Err(self.fatal(format!(
                "document of {} bytes exceeds the limit of {} bytes",
                text.len(),
                self.limits.max_document_size
            )));
        }

        let mut source = text.to_owned();
        if let Some(doctype) = dtd::find_doctype(text) {
            if !self.limits.allow_dtd {
                return Err(self.fatal("DOCTYPE is not allowed".to_owned()));
            }
            if let Some(system_id) = &doctype.system_id {
                let resource = self.resolve(system_id);
                if let Some(external) = resource.text().filter(|t| !t.trim().is_empty()) {
                    source = doctype.inline_external(text, external);
                }
            }
        }

        let options = roxmltree::ParsingOptions {
            allow_dtd: self.limits.allow_dtd,
            nodes_limit: self.limits.max_nodes,
            ..roxmltree::ParsingOptions::default()
        };
        let doc = match XmlDocument::parse_with_options(source, options, self.namespace_aware) {
            Ok(doc) => doc,
            Err(Error::XmlParse(msg)) => return Err(self.fatal(msg)),
            Err(e) => return Err(e),
        };

        if self.schema_aware {
            self.check_grammar(doc.root())?;
        }
        Ok(doc)
    }

    /// Require a catalog grammar for the document element's namespace.
    ///
    /// The grammar must be an XML Schema whose target namespace matches and
    /// which declares the document element globally.
    fn check_grammar(&mut self, root: &Element) -> Result<(), Error> {
        let Some(namespace) = root.name.namespace() else {
            return Err(self.fatal(format!(
                "no grammar available for unqualified element '{}'",
                root.name.local_name()
            )));
        };
        if self.grammars.contains(namespace) {
            return Ok(());
        }
        let Some(location) = hint_location(&self.schema_location, namespace).map(str::to_owned)
        else {
            return Err(self.fatal(format!("no grammar available for namespace '{namespace}'")));
        };

        let resource = self.resolve(&location);
        let Some(text) = resource.text().filter(|t| !t.trim().is_empty()) else {
            return Err(self.fatal(format!("unable to load grammar for namespace '{namespace}'")));
        };
        let schema = match XmlDocument::parse(text.to_owned()) {
            Ok(s) => s,
            Err(e) => {
                return Err(self.fatal(format!("grammar for namespace '{namespace}' is not usable: {e}")))
            }
        };

        let schema_root = schema.root();
        if !schema_root.name.matches(Some(ns::XSD), ns::node::SCHEMA)
            || schema_root.attr(ns::attr::TARGET_NAMESPACE) != Some(namespace)
        {
            return Err(self.fatal(format!(
                "grammar for namespace '{namespace}' is not a schema for that namespace"
            )));
        }
        let declared = schema_root.child_elements().any(|e| {
            e.name.matches(Some(ns::XSD), ns::node::ELEMENT)
                && e.attr(ns::attr::NAME) == Some(root.name.local_name())
        });
        if !declared {
            return Err(self.fatal(format!("element '{}' is not declared by its grammar", root.name)));
        }

        self.grammars.insert(namespace.to_owned());
        Ok(())
    }

    fn resolve(&self, system_id: &str) -> Resource {
        match self.resolver.upgrade() {
            Some(pool) => pool.resolve_entity(system_id, self.base_dir.as_deref()),
            None => crate::resolver::Resolution::Refused.load(system_id),
        }
    }

    /// Record a diagnostic and turn it into the surfaced error.
    fn fatal(&mut self, message: String) -> Error {
        self.errors.push(message.clone());
        Error::Parser(message)
    }
}
