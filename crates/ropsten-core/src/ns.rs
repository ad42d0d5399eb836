#![forbid(unsafe_code)]

//! XML namespace constants used across the library.

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

/// XML Schema namespace
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema";

/// XML Schema instance namespace
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// OASIS XML Catalogs namespace
pub const CATALOG: &str = "urn:oasis:names:tc:entity:xmlns:xml:catalog";

/// Conventional prefixes.
pub mod prefix {
    pub const XML: &str = "xml";
    pub const XMLNS: &str = "xmlns";
    pub const XSI: &str = "xsi";
    pub const XSD: &str = "xs";
}

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // Catalog elements
    pub const CATALOG: &str = "catalog";
    pub const SYSTEM: &str = "system";

    // XML Schema elements
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    // Schema instance attributes
    pub const TYPE: &str = "type";
    pub const NIL: &str = "nil";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const NO_NAMESPACE_SCHEMA_LOCATION: &str = "noNamespaceSchemaLocation";

    // Catalog attributes
    pub const SYSTEM_ID: &str = "systemId";
    pub const URI: &str = "uri";

    // XML Schema attributes
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const NAME: &str = "name";

    // Plugin declarations
    pub const PLUGIN_TYPE: &str = "type";
}
