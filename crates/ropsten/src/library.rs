#![forbid(unsafe_code)]

//! The process-wide context that brackets all use of the tooling.

use crate::services::{
    credential, trust, CredentialResolver, KeyInfoResolver, StorageService, Transport, TrustEngine,
};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use ropsten_binding::{BindingContext, XmlObject};
use ropsten_core::{Error, Message};
use ropsten_parser::{ParserPool, SecurityLimits};
use ropsten_plugin::PluginManager;
use std::ffi::OsString;
use std::sync::Arc;

/// Library configuration.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Catalog files to load into both parser pools, as a platform path
    /// list (`:`-separated on Unix).
    pub catalog_path: Option<OsString>,
    /// Limits applied by every pooled parser.
    pub limits: SecurityLimits,
    /// Keep elements with no registration as opaque passthrough objects
    /// instead of failing to unmarshall them.
    pub install_unknown_defaults: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            limits: SecurityLimits::default(),
            install_unknown_defaults: true,
        }
    }
}

/// Plugin managers, one per service category.
pub struct Services {
    pub credential_resolvers: Arc<RwLock<PluginManager<dyn CredentialResolver>>>,
    pub trust_engines: RwLock<PluginManager<dyn TrustEngine>>,
    pub key_info_resolvers: RwLock<PluginManager<dyn KeyInfoResolver>>,
    pub storage_services: RwLock<PluginManager<dyn StorageService>>,
    pub transports: RwLock<PluginManager<dyn Transport>>,
}

impl Services {
    fn new() -> Self {
        Self {
            credential_resolvers: Arc::new(RwLock::new(PluginManager::new("CredentialResolver"))),
            trust_engines: RwLock::new(PluginManager::new("TrustEngine")),
            key_info_resolvers: RwLock::new(PluginManager::new("KeyInfoResolver")),
            storage_services: RwLock::new(PluginManager::new("StorageService")),
            transports: RwLock::new(PluginManager::new("Transport")),
        }
    }

    fn register_builtins(&self) {
        credential::register_builtins(&mut self.credential_resolvers.write());
        trust::register_builtins(&mut self.trust_engines.write(), self.credential_resolvers.clone());
    }

    fn deregister_all(&self) {
        self.credential_resolvers.write().deregister_factories();
        self.trust_engines.write().deregister_factories();
        self.key_info_resolvers.write().deregister_factories();
        self.storage_services.write().deregister_factories();
        self.transports.write().deregister_factories();
    }
}

/// Binding registries, parser pools and plugin managers.
///
/// [`init`](Self::init) and [`term`](Self::term) may each be called any
/// number of times. Registering strategies needs the write handle from
/// [`binding_mut`](Self::binding_mut) and should happen before steady-state
/// use; everything else works through read handles.
pub struct Library {
    config: LibraryConfig,
    initialized: Mutex<bool>,
    binding: RwLock<BindingContext>,
    parser_pool: ParserPool,
    validating_parser_pool: ParserPool,
    services: Services,
}

impl Library {
    pub fn new(config: LibraryConfig) -> Self {
        let parser_pool = ParserPool::with_limits(true, false, config.limits.clone());
        let validating_parser_pool = ParserPool::with_limits(true, true, config.limits.clone());
        Self {
            config,
            initialized: Mutex::new(false),
            binding: RwLock::new(BindingContext::new()),
            parser_pool,
            validating_parser_pool,
            services: Services::new(),
        }
    }

    /// Install default strategies and built-in plugins, and load catalogs.
    ///
    /// Does nothing if already initialized. On failure everything installed
    /// so far is removed again.
    pub fn init(&self) -> Result<(), Error> {
        let mut initialized = self.initialized.lock();
        if *initialized {
            return Ok(());
        }

        if self.config.install_unknown_defaults {
            self.binding.write().install_unknown_defaults();
        }
        self.services.register_builtins();

        if let Some(path_list) = &self.config.catalog_path {
            let loaded = self.parser_pool.load_catalogs(path_list)
                & self.validating_parser_pool.load_catalogs(path_list);
            if !loaded {
                tracing::error!(catalogs = ?path_list, "failed to load schema catalogs");
                self.teardown();
                return Err(Error::configuration(
                    Message::new("unable to load schema catalogs from $path")
                        .param("path", path_list.to_string_lossy()),
                ));
            }
        }

        *initialized = true;
        tracing::info!("library initialized");
        Ok(())
    }

    /// Drop every registered strategy and plugin factory, and the loaded
    /// catalogs.
    pub fn term(&self) {
        let mut initialized = self.initialized.lock();
        if !*initialized {
            return;
        }
        self.teardown();
        *initialized = false;
        tracing::info!("library terminated");
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }

    fn teardown(&self) {
        self.binding.write().destroy_all();
        self.services.deregister_all();
        self.parser_pool.clear_catalog();
        self.validating_parser_pool.clear_catalog();
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Read handle on the binding registries.
    pub fn binding(&self) -> RwLockReadGuard<'_, BindingContext> {
        self.binding.read()
    }

    /// Write handle for registering binding strategies.
    pub fn binding_mut(&self) -> RwLockWriteGuard<'_, BindingContext> {
        self.binding.write()
    }

    /// The namespace-aware, non-validating pool.
    pub fn parser_pool(&self) -> &ParserPool {
        &self.parser_pool
    }

    /// The namespace-aware, schema-aware pool.
    pub fn validating_parser_pool(&self) -> &ParserPool {
        &self.validating_parser_pool
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Parse untrusted input and bind it to an object.
    pub fn unmarshall_str(&self, xml: &str) -> Result<Box<dyn XmlObject>, Error> {
        let doc = self.parser_pool.parse(xml)?;
        self.binding().unmarshall(doc.root(), true)
    }

    /// Marshall an object and serialize it.
    pub fn marshall_to_string(&self, object: &mut dyn XmlObject) -> Result<String, Error> {
        Ok(self.binding().marshall(object)?.to_xml())
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(LibraryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Credential;
    use ropsten_core::QName;
    use ropsten_xml::XmlDocument;
    use std::fs;

    #[test]
    fn test_init_and_term_are_idempotent() {
        let lib = Library::default();
        lib.term();
        assert!(!lib.is_initialized());

        lib.init().unwrap();
        lib.init().unwrap();
        assert!(lib.is_initialized());
        assert!(lib.binding().unmarshallers.has_default());
        assert!(lib.services().trust_engines.read().contains(trust::EXPLICIT_KEY));

        lib.term();
        lib.term();
        assert!(!lib.is_initialized());
        assert!(!lib.binding().unmarshallers.has_default());
        assert!(lib.services().credential_resolvers.read().types().is_empty());

        lib.init().unwrap();
        assert!(lib.binding().marshallers.has_default());
    }

    #[test]
    fn test_without_unknown_defaults() {
        let lib = Library::new(LibraryConfig {
            install_unknown_defaults: false,
            ..LibraryConfig::default()
        });
        lib.init().unwrap();
        let err = lib.unmarshall_str("<a/>").err().unwrap();
        assert!(matches!(err, Error::Unmarshalling(_)));
    }

    #[test]
    fn test_parse_bind_and_serialize() {
        let lib = Library::default();
        lib.init().unwrap();
        lib.binding_mut().register_any(QName::ns("urn:m", "Message"));

        let xml = r#"<m:Message xmlns:m="urn:m" ID="_1"><m:Body>hi</m:Body><ext:Sig xmlns:ext="urn:ext"/></m:Message>"#;
        let mut obj = lib.unmarshall_str(xml).unwrap();
        assert_eq!(obj.core().children().len(), 2);
        assert_eq!(lib.marshall_to_string(obj.as_mut()).unwrap(), xml);

        obj.core_mut().attributes_mut().insert(QName::local("ID"), "_2");
        assert_eq!(
            lib.marshall_to_string(obj.as_mut()).unwrap(),
            xml.replace("_1", "_2")
        );
    }

    #[test]
    fn test_catalogs_loaded_at_init() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("m.xsd"),
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:m"><xs:element name="Message"/></xs:schema>"#,
        )
        .unwrap();
        let catalog = dir.path().join("catalog.xml");
        fs::write(&catalog, r#"<catalog><system systemId="urn:m" uri="m.xsd"/></catalog>"#).unwrap();

        let lib = Library::new(LibraryConfig {
            catalog_path: Some(catalog.into_os_string()),
            ..LibraryConfig::default()
        });
        lib.init().unwrap();
        assert_eq!(lib.parser_pool().catalog().len(), 1);
        lib.validating_parser_pool()
            .parse(r#"<Message xmlns="urn:m"/>"#)
            .unwrap();
        assert!(lib.validating_parser_pool().parse(r#"<Other xmlns="urn:o"/>"#).is_err());
    }

    #[test]
    fn test_failed_init_can_be_terminated() {
        let lib = Library::new(LibraryConfig {
            catalog_path: Some(OsString::from("/nonexistent/ropsten/catalog.xml")),
            ..LibraryConfig::default()
        });
        assert!(matches!(lib.init(), Err(Error::Configuration(_))));
        assert!(!lib.is_initialized());
        assert!(!lib.binding().unmarshallers.has_default());
        lib.term();
        lib.term();
    }

    #[test]
    fn test_failed_init_leaves_no_catalog_entries() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.xml");
        fs::write(&good, r#"<catalog><system systemId="urn:g" uri="g.xsd"/></catalog>"#).unwrap();
        let list = std::env::join_paths([good, dir.path().join("missing.xml")]).unwrap();

        let lib = Library::new(LibraryConfig {
            catalog_path: Some(list),
            ..LibraryConfig::default()
        });
        assert!(lib.init().is_err());
        assert!(lib.parser_pool().catalog().is_empty());
        assert!(lib.validating_parser_pool().catalog().is_empty());
        assert!(lib.parser_pool().schema_location().is_empty());
    }

    #[test]
    fn test_trust_engine_from_configuration() {
        let lib = Library::default();
        lib.init().unwrap();
        let config = XmlDocument::parse(
            concat!(
                r#"<TrustEngine type="ExplicitKey"><CredentialResolver type="Chaining">"#,
                r#"<CredentialResolver type="Inline"><Key name="idp">a2V5</Key></CredentialResolver>"#,
                r#"</CredentialResolver></TrustEngine>"#
            )
            .to_owned(),
        )
        .unwrap();
        let engine = lib
            .services()
            .trust_engines
            .read()
            .new_plugin_from(config.root())
            .ok()
            .unwrap();
        let presented = Credential {
            name: None,
            key: b"key".to_vec(),
        };
        assert!(engine.validate(&presented, Some("idp")));
    }

    #[test]
    fn test_application_plugin_category() {
        struct Echo;
        impl Transport for Echo {
            fn send(&self, _address: &str, body: &[u8]) -> Result<Vec<u8>, Error> {
                Ok(body.to_vec())
            }
        }

        let lib = Library::default();
        lib.init().unwrap();
        lib.services()
            .transports
            .write()
            .register_factory("Echo", |_, _| Ok(Box::new(Echo) as Box<dyn Transport>));
        let config = XmlDocument::parse(r#"<Transport type="Echo"/>"#.to_owned()).unwrap();
        let transport = lib
            .services()
            .transports
            .read()
            .new_plugin_from(config.root())
            .ok()
            .unwrap();
        assert_eq!(transport.send("local", b"ping").unwrap(), b"ping");

        let unknown = XmlDocument::parse(r#"<Transport type="Carrier"/>"#.to_owned()).unwrap();
        assert!(matches!(
            lib.services().transports.read().new_plugin_from(unknown.root()),
            Err(Error::Configuration(_))
        ));
    }
}
