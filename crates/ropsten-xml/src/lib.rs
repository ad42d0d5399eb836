#![forbid(unsafe_code)]

//! XML tree for the Ropsten XML tooling.
//!
//! Provides an owned, shareable element tree copied out of the `uppsala` DOM
//! after `roxmltree` has checked the input, plus namespace scope tracking and
//! a serializer that reproduces untouched input.

pub mod document;
pub mod scope;
pub mod tree;
pub mod writer;

pub use document::XmlDocument;
pub use scope::NamespaceScope;
pub use tree::{Attribute, Element, NamespaceDecl, Node, ProcessingInstruction, SourceSpan};
pub use writer::XmlWriter;

/// Return roxmltree parsing options that allow DTD.
///
/// DTD is allowed because roxmltree does not expand external entities or
/// perform entity substitution beyond the internal subset, so it is safe.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}
