#![forbid(unsafe_code)]

//! A thread-safe pool of configured parsers.

use crate::catalog::Catalog;
use crate::parser::{Parser, SecurityLimits};
use crate::resolver::{Resolution, Resource};
use parking_lot::Mutex;
use ropsten_core::{Error, Message};
use ropsten_xml::XmlDocument;
use std::ffi::OsStr;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A pool of reusable parsers sharing one catalog.
///
/// Cloning a pool is cheap and yields a handle to the same pool.
#[derive(Debug, Clone)]
pub struct ParserPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
pub(crate) struct PoolInner {
    namespace_aware: bool,
    schema_aware: bool,
    limits: SecurityLimits,
    state: Mutex<PoolState>,
    created: AtomicU64,
}

#[derive(Debug, Default)]
struct PoolState {
    catalog: Catalog,
    /// Rebuilt whenever the catalog changes.
    schema_location: String,
    idle: Vec<Parser>,
}

impl ParserPool {
    /// Create a pool with default security limits.
    pub fn new(namespace_aware: bool, schema_aware: bool) -> Self {
        Self::with_limits(namespace_aware, schema_aware, SecurityLimits::default())
    }

    pub fn with_limits(namespace_aware: bool, schema_aware: bool, limits: SecurityLimits) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                namespace_aware,
                schema_aware,
                limits,
                state: Mutex::new(PoolState::default()),
                created: AtomicU64::new(0),
            }),
        }
    }

    pub fn is_namespace_aware(&self) -> bool {
        self.inner.namespace_aware
    }

    pub fn is_schema_aware(&self) -> bool {
        self.inner.schema_aware
    }

    /// Take a parser out of the pool, creating one if none is idle.
    ///
    /// The parser goes back to the pool when the guard is dropped.
    pub fn checkout(&self) -> PooledParser<'_> {
        let mut state = self.inner.state.lock();
        let parser = match state.idle.pop() {
            Some(mut parser) => {
                parser.set_schema_location(&state.schema_location);
                parser
            }
            None => {
                let id = self.inner.created.fetch_add(1, Ordering::SeqCst);
                let mut parser = Parser::new(
                    id,
                    self.inner.namespace_aware,
                    self.inner.schema_aware,
                    self.inner.limits.clone(),
                    Arc::downgrade(&self.inner),
                );
                parser.set_schema_location(&state.schema_location);
                tracing::debug!(parser = id, "created pooled parser");
                parser
            }
        };
        PooledParser {
            pool: self,
            parser: Some(parser),
        }
    }

    /// Return a parser to the idle stack.
    pub fn checkin(&self, mut parser: Parser) {
        parser.reset();
        self.inner.state.lock().idle.push(parser);
    }

    /// Parse a document with a pooled parser.
    pub fn parse(&self, text: &str) -> Result<XmlDocument, Error> {
        self.checkout().parse(text)
    }

    /// Parse a file with a pooled parser.
    pub fn parse_file(&self, path: &Path) -> Result<XmlDocument, Error> {
        self.checkout().parse_file(path)
    }

    /// Load a catalog file and merge its entries.
    ///
    /// Relative `uri` values resolve against the catalog's own directory.
    pub fn load_catalog(&self, path: &Path) -> Result<(), Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(
                Message::new("unable to read catalog $path: $error")
                    .param("path", path.display())
                    .param("error", e),
            )
        })?;
        let catalog = Catalog::parse(&text, path.parent())?;
        let count = catalog.len();
        self.merge_catalog(catalog);
        tracing::info!(path = %path.display(), entries = count, "loaded schema catalog");
        Ok(())
    }

    /// Merge catalog entries from an in-memory catalog document.
    pub fn load_catalog_str(&self, xml: &str, base_dir: Option<&Path>) -> Result<(), Error> {
        let catalog = Catalog::parse(xml, base_dir)?;
        self.merge_catalog(catalog);
        Ok(())
    }

    /// Load every catalog in a platform path list (`:`-separated on Unix).
    ///
    /// Each entry is attempted; returns `false` if any of them failed.
    pub fn load_catalogs(&self, path_list: &OsStr) -> bool {
        let mut ok = true;
        for path in std::env::split_paths(path_list) {
            if path.as_os_str().is_empty() {
                continue;
            }
            if let Err(e) = self.load_catalog(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to load catalog");
                ok = false;
            }
        }
        ok
    }

    /// Map a namespace directly to a local grammar file.
    ///
    /// The file must exist.
    pub fn load_schema(&self, namespace: &str, path: &Path) -> Result<(), Error> {
        let mut state = self.inner.state.lock();
        if !path.exists() {
            tracing::warn!(namespace, path = %path.display(), "schema file does not exist");
            return Err(Error::configuration(
                Message::new("schema file $path for namespace $namespace does not exist")
                    .param("path", path.display())
                    .param("namespace", namespace),
            ));
        }
        state.catalog.insert(namespace, path);
        state.schema_location = state.catalog.schema_location_hint();
        Ok(())
    }

    /// Forget every catalog entry and schema mapping.
    pub fn clear_catalog(&self) {
        let mut state = self.inner.state.lock();
        state.catalog = Catalog::default();
        state.schema_location = state.catalog.schema_location_hint();
    }

    /// Resolve an external reference under the pool's restrictive policy.
    pub fn resolve_entity(&self, system_id: &str, base_dir: Option<&Path>) -> Resource {
        self.inner.resolve_entity(system_id, base_dir)
    }

    /// The current external schema location hint.
    pub fn schema_location(&self) -> String {
        self.inner.state.lock().schema_location.clone()
    }

    /// A snapshot of the catalog.
    pub fn catalog(&self) -> Catalog {
        self.inner.state.lock().catalog.clone()
    }

    /// Parsers currently idle in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Parsers ever created by this pool.
    pub fn created_count(&self) -> u64 {
        self.inner.created.load(Ordering::SeqCst)
    }

    fn merge_catalog(&self, catalog: Catalog) {
        let mut state = self.inner.state.lock();
        state.catalog.merge(catalog);
        state.schema_location = state.catalog.schema_location_hint();
    }
}

impl PoolInner {
    pub(crate) fn resolve_entity(&self, system_id: &str, base_dir: Option<&Path>) -> Resource {
        let resolution = {
            let state = self.state.lock();
            Resolution::locate(&state.catalog, system_id, base_dir)
        };
        tracing::debug!(system_id, ?resolution, "resolving external entity");
        resolution.load(system_id)
    }
}

/// A parser checked out of a [`ParserPool`].
#[derive(Debug)]
pub struct PooledParser<'a> {
    pool: &'a ParserPool,
    parser: Option<Parser>,
}

impl PooledParser<'_> {
    /// Detach the parser from the pool; it will not be returned on drop.
    pub fn into_inner(mut self) -> Parser {
        self.parser.take().expect("pooled parser already taken")
    }
}

impl Deref for PooledParser<'_> {
    type Target = Parser;

    fn deref(&self) -> &Parser {
        self.parser.as_ref().expect("pooled parser already taken")
    }
}

impl DerefMut for PooledParser<'_> {
    fn deref_mut(&mut self) -> &mut Parser {
        self.parser.as_mut().expect("pooled parser already taken")
    }
}

impl Drop for PooledParser<'_> {
    fn drop(&mut self) {
        if let Some(parser) = self.parser.take() {
            self.pool.checkin(parser);
        }
    }
}
