#![forbid(unsafe_code)]

//! XML object binding for the Ropsten XML tooling.
//!
//! Trees are turned into typed objects and back through three registries of
//! strategies keyed by qualified name:
//!
//! - [`Builder`]: creates an empty object
//! - [`Unmarshaller`]: populates it from a tree
//! - [`Marshaller`]: serializes it back
//!
//! Lookups try the element's `xsi:type` first, then its name, then the
//! registry default. Marshalled trees are cached per object so an untouched
//! object serializes to exactly the tree it was read from.

pub mod any;
pub mod builder;
pub mod marshall;
pub mod object;
pub mod registry;
pub mod simple;
pub mod unknown;
pub mod unmarshall;

pub use any::AnyElement;
pub use builder::Builder;
pub use marshall::{marshall_generic, Marshaller, Marshalling};
pub use object::{AttributeMap, ExtensionAttribute, Namespace, NamespaceUsage, ObjectCore, XmlObject};
pub use registry::{BindingContext, Registry};
pub use simple::SimpleElement;
pub use unknown::UnknownElement;
pub use unmarshall::{unmarshall_generic, Unmarshaller, Unmarshalling};
