#![forbid(unsafe_code)]

//! Restrictive resolution of external references.
//!
//! Order of precedence for a requested system identifier:
//! 1. exact catalog key
//! 2. suffix of some catalog target
//! 3. bare file name (no `/` or `\`), read relative to the base directory
//! 4. anything else is refused and served as an empty resource
//!
//! A refusal is not an error. The caller's parser sees zero bytes and fails
//! (or not) on its own terms, which gives no distinguishable signal back.

use crate::catalog::Catalog;
use std::path::{Path, PathBuf};

/// Where a reference will be served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Catalog entry (exact or suffix match).
    Catalog(PathBuf),
    /// Bare file name relative to the base directory.
    Local(PathBuf),
    /// Not approved; served empty.
    Refused,
}

impl Resolution {
    /// Decide how to serve `system_id`. Performs no I/O.
    pub fn locate(catalog: &Catalog, system_id: &str, base_dir: Option<&Path>) -> Self {
        if let Some(path) = catalog.get(system_id) {
            return Self::Catalog(path.to_path_buf());
        }
        if let Some(path) = catalog.suffix_match(system_id) {
            return Self::Catalog(path.to_path_buf());
        }
        if !system_id.is_empty() && !system_id.contains(['/', '\\']) {
            let path = match base_dir {
                Some(base) => base.join(system_id),
                None => PathBuf::from(system_id),
            };
            return Self::Local(path);
        }
        Self::Refused
    }

    /// Read the resource.
    pub fn load(self, system_id: &str) -> Resource {
        let content = match &self {
            Self::Catalog(path) | Self::Local(path) => match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        system_id,
                        path = %path.display(),
                        error = %e,
                        "unable to read resolved entity, returning empty resource"
                    );
                    Vec::new()
                }
            },
            Self::Refused => {
                tracing::warn!(system_id, "unauthorized entity request, returning empty resource");
                Vec::new()
            }
        };
        Resource {
            system_id: system_id.to_owned(),
            content,
        }
    }
}

/// The outcome of resolving an external reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// The identifier that was requested.
    pub system_id: String,
    /// The bytes served; empty when the request was refused.
    pub content: Vec<u8>,
}

impl Resource {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The content as UTF-8 text.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}
