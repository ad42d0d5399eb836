#![forbid(unsafe_code)]

//! Generic plugin registry for the Ropsten XML tooling.
//!
//! Services such as credential resolvers, trust engines and transports are
//! built from XML configuration fragments by named factories, so an
//! implementation can be chosen by configuration alone.

pub mod config;
pub mod manager;

pub use manager::{Factory, PluginManager};
