#![forbid(unsafe_code)]

//! Core types for the Ropsten XML tooling: errors, qualified names and
//! namespace constants.

pub mod error;
pub mod ns;
pub mod qname;

pub use error::{Error, Message, Result};
pub use qname::QName;
