#![forbid(unsafe_code)]

//! Pooled XML parsers for the Ropsten XML tooling.
//!
//! Parsers are handed out by a [`ParserPool`] and never reach outside the
//! local machine: external DTD subsets and schema grammars are served only
//! from the pool's catalog or as bare local file names.

pub mod catalog;
pub mod dtd;
pub mod parser;
pub mod pool;
pub mod resolver;

pub use catalog::Catalog;
pub use parser::{Parser, SecurityLimits};
pub use pool::{ParserPool, PooledParser};
pub use resolver::{Resolution, Resource};
