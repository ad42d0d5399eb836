#![forbid(unsafe_code)]

//! Ropsten XML tooling.
//!
//! Untrusted XML enters through a [`ParserPool`](parser::ParserPool), is
//! bound to typed objects through the registries of a
//! [`BindingContext`](binding::BindingContext), and is serialized back with
//! unmodified subtrees reproduced exactly. Pluggable services are built from
//! configuration by [`PluginManager`](plugin::PluginManager)s. A [`Library`]
//! ties these together with an `init`/`term` lifecycle.

pub use ropsten_binding as binding;
pub use ropsten_parser as parser;
pub use ropsten_plugin as plugin;
pub use ropsten_xml as xml;

pub mod library;
pub mod services;

pub use library::{Library, LibraryConfig, Services};
pub use ropsten_core::{ns, Error, Message, QName, Result};
