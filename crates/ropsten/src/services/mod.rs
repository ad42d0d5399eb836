#![forbid(unsafe_code)]

//! Service categories built through plugin managers.
//!
//! Only the interfaces and the container plugins live here; concrete key
//! handling, storage and transports are supplied by applications.

pub mod credential;
pub mod trust;

pub use credential::{
    ChainingCredentialResolver, Credential, CredentialResolver, InlineCredentialResolver,
};
pub use trust::{ChainingTrustEngine, ExplicitKeyTrustEngine, TrustEngine};

use ropsten_core::Error;
use ropsten_xml::Element;
use std::time::SystemTime;

/// Extracts credentials from a key information element.
pub trait KeyInfoResolver: Send + Sync {
    fn resolve(&self, key_info: &Element) -> Result<Vec<Credential>, Error>;
}

/// Keyed, expiring storage partitioned by context.
pub trait StorageService: Send + Sync {
    /// Store a value; `false` if the key already exists.
    fn create(&self, context: &str, key: &str, value: &str, expiration: SystemTime) -> Result<bool, Error>;

    fn read(&self, context: &str, key: &str) -> Result<Option<String>, Error>;

    /// `false` if there was nothing to delete.
    fn delete(&self, context: &str, key: &str) -> Result<bool, Error>;
}

/// Sends a message and returns the peer's response.
pub trait Transport: Send + Sync {
    fn send(&self, address: &str, body: &[u8]) -> Result<Vec<u8>, Error>;
}
