#![forbid(unsafe_code)]

//! Credential resolvers.

use ropsten_core::{Error, Message};
use ropsten_plugin::{config, PluginManager};
use ropsten_xml::Element;

pub const INLINE: &str = "Inline";
pub const CHAINING: &str = "Chaining";

/// Named key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: Option<String>,
    pub key: Vec<u8>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("key_len", &self.key.len())
            .finish()
    }
}

/// Supplies credentials, optionally filtered by name.
pub trait CredentialResolver: Send + Sync {
    /// Every credential matching `name`, or all of them for `None`.
    fn resolve(&self, name: Option<&str>) -> Vec<Credential>;

    fn resolve_single(&self, name: Option<&str>) -> Option<Credential> {
        self.resolve(name).into_iter().next()
    }
}

/// Credentials written into the configuration as base64
/// `<Key name="...">` children.
#[derive(Debug, Clone, Default)]
pub struct InlineCredentialResolver {
    credentials: Vec<Credential>,
}

impl InlineCredentialResolver {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    pub fn from_config(config: &Element) -> Result<Self, Error> {
        let mut credentials = Vec::new();
        for key in config::children_named(config, "Key") {
            let name = key.attr("name").map(str::to_owned);
            let context = name.as_deref().unwrap_or("unnamed key");
            credentials.push(Credential {
                key: decode_b64(&key.text(), context)?,
                name,
            });
        }
        Ok(Self { credentials })
    }
}

impl CredentialResolver for InlineCredentialResolver {
    fn resolve(&self, name: Option<&str>) -> Vec<Credential> {
        self.credentials
            .iter()
            .filter(|c| name.is_none() || c.name.as_deref() == name)
            .cloned()
            .collect()
    }
}

/// Asks each nested resolver in turn and concatenates the answers.
pub struct ChainingCredentialResolver {
    resolvers: Vec<Box<dyn CredentialResolver>>,
}

impl ChainingCredentialResolver {
    pub fn new(resolvers: Vec<Box<dyn CredentialResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn from_config(
        config: &Element,
        manager: &PluginManager<dyn CredentialResolver>,
    ) -> Result<Self, Error> {
        let resolvers = config::children_named(config, "CredentialResolver")
            .map(|c| manager.new_plugin_from(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { resolvers })
    }
}

impl CredentialResolver for ChainingCredentialResolver {
    fn resolve(&self, name: Option<&str>) -> Vec<Credential> {
        self.resolvers.iter().flat_map(|r| r.resolve(name)).collect()
    }
}

/// Register the built-in credential resolver factories.
pub fn register_builtins(manager: &mut PluginManager<dyn CredentialResolver>) {
    manager.register_factory(INLINE, |config, _| {
        Ok(Box::new(InlineCredentialResolver::from_config(config)?) as Box<dyn CredentialResolver>)
    });
    manager.register_factory(CHAINING, |config, manager| {
        Ok(Box::new(ChainingCredentialResolver::from_config(config, manager)?) as Box<dyn CredentialResolver>)
    });
}

fn decode_b64(b64: &str, context: &str) -> Result<Vec<u8>, Error> {
    use base64::Engine;
    let clean: String = b64.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| {
            Error::configuration(
                Message::new("invalid base64 key material for $key: $error")
                    .param("key", context)
                    .param("error", e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropsten_xml::XmlDocument;

    fn manager() -> PluginManager<dyn CredentialResolver> {
        let mut m: PluginManager<dyn CredentialResolver> = PluginManager::new("CredentialResolver");
        register_builtins(&mut m);
        m
    }

    #[test]
    fn test_inline_and_chaining() {
        let doc = XmlDocument::parse(
            concat!(
                r#"<CredentialResolver type="Chaining">"#,
                r#"<CredentialResolver type="Inline"><Key name="alice">c2Vj
                cmV0</Key></CredentialResolver>"#,
                r#"<CredentialResolver type="Inline"><Key name="bob">Ym9i</Key><Key>eA==</Key></CredentialResolver>"#,
                r#"</CredentialResolver>"#
            )
            .to_owned(),
        )
        .unwrap();
        let resolver = manager().new_plugin_from(doc.root()).ok().unwrap();

        assert_eq!(resolver.resolve(None).len(), 3);
        let alice = resolver.resolve_single(Some("alice")).unwrap();
        assert_eq!(alice.key, b"secret");
        assert_eq!(resolver.resolve(Some("bob"))[0].key, b"bob");
        assert!(resolver.resolve(Some("carol")).is_empty());
    }

    #[test]
    fn test_bad_base64_is_configuration_error() {
        let doc = XmlDocument::parse(
            r#"<CredentialResolver type="Inline"><Key name="k">!!!</Key></CredentialResolver>"#.to_owned(),
        )
        .unwrap();
        let err = manager().new_plugin_from(doc.root()).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(err.message().and_then(|m| m.get("key")), Some("k"));
    }
}
