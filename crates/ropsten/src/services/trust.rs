#![forbid(unsafe_code)]

//! Trust engines.

use super::credential::{Credential, CredentialResolver};
use parking_lot::RwLock;
use ropsten_core::{Error, Message};
use ropsten_plugin::{config, PluginManager};
use std::sync::Arc;

pub const EXPLICIT_KEY: &str = "ExplicitKey";
pub const CHAINING: &str = "Chaining";

/// Decides whether a presented credential is trusted.
pub trait TrustEngine: Send + Sync {
    /// `peer` names the entity the credential claims to belong to.
    fn validate(&self, credential: &Credential, peer: Option<&str>) -> bool;
}

/// Trusts a credential only if its key material equals one supplied by a
/// configured resolver for the same peer.
pub struct ExplicitKeyTrustEngine {
    resolver: Box<dyn CredentialResolver>,
}

impl ExplicitKeyTrustEngine {
    pub fn new(resolver: Box<dyn CredentialResolver>) -> Self {
        Self { resolver }
    }
}

impl TrustEngine for ExplicitKeyTrustEngine {
    fn validate(&self, credential: &Credential, peer: Option<&str>) -> bool {
        let trusted = self
            .resolver
            .resolve(peer)
            .iter()
            .any(|c| c.key == credential.key);
        if !trusted {
            tracing::debug!(peer, "credential did not match any trusted key");
        }
        trusted
    }
}

/// Trusts a credential if any nested engine does.
pub struct ChainingTrustEngine {
    engines: Vec<Box<dyn TrustEngine>>,
}

impl ChainingTrustEngine {
    pub fn new(engines: Vec<Box<dyn TrustEngine>>) -> Self {
        Self { engines }
    }
}

impl TrustEngine for ChainingTrustEngine {
    fn validate(&self, credential: &Credential, peer: Option<&str>) -> bool {
        self.engines.iter().any(|e| e.validate(credential, peer))
    }
}

/// Register the built-in trust engine factories.
///
/// `ExplicitKey` builds its nested `<CredentialResolver>` from
/// `credentials`.
pub fn register_builtins(
    manager: &mut PluginManager<dyn TrustEngine>,
    credentials: Arc<RwLock<PluginManager<dyn CredentialResolver>>>,
) {
    manager.register_factory(EXPLICIT_KEY, move |config, _| {
        let Some(resolver_config) = config::children_named(config, "CredentialResolver").next() else {
            return Err(Error::configuration(Message::new(
                "ExplicitKey trust engine requires a CredentialResolver",
            )));
        };
        let resolver = credentials.read().new_plugin_from(resolver_config)?;
        Ok(Box::new(ExplicitKeyTrustEngine::new(resolver)) as Box<dyn TrustEngine>)
    });
    manager.register_factory(CHAINING, |config, manager| {
        let engines = config::children_named(config, "TrustEngine")
            .map(|c| manager.new_plugin_from(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(ChainingTrustEngine::new(engines)) as Box<dyn TrustEngine>)
    });
}
