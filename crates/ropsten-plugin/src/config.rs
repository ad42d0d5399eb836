#![forbid(unsafe_code)]

//! Helpers for reading plugin configuration fragments.

use ropsten_core::{ns, Error, Message};
use ropsten_xml::Element;
use std::sync::Arc;

/// The plugin type named by the fragment's `type` attribute.
pub fn plugin_type(config: &Element) -> Result<&str, Error> {
    required_attribute(config, ns::attr::PLUGIN_TYPE)
}

/// An unqualified attribute that must be present.
pub fn required_attribute<'a>(config: &'a Element, name: &str) -> Result<&'a str, Error> {
    config.attr(name).ok_or_else(|| {
        Error::configuration(
            Message::new("missing required attribute $name on <$element>")
                .param("name", name)
                .param("element", config.name.local_name()),
        )
    })
}

/// A boolean attribute (`true`/`1` or `false`/`0`), `default` when absent.
pub fn bool_attribute(config: &Element, name: &str, default: bool) -> Result<bool, Error> {
    match config.attr(name).map(str::trim) {
        None => Ok(default),
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(other) => Err(Error::configuration(
            Message::new("attribute $name must be a boolean, not '$value'")
                .param("name", name)
                .param("value", other),
        )),
    }
}

/// Child elements with the given local name, in document order.
pub fn children_named<'a>(config: &'a Element, local: &'a str) -> impl Iterator<Item = &'a Arc<Element>> + 'a {
    config
        .child_elements()
        .filter(move |e| e.name.local_name() == local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropsten_xml::XmlDocument;

    #[test]
    fn test_attributes() {
        let doc = XmlDocument::parse(r#"<R type="Chain" strict="1" lax="no"/>"#.to_owned()).unwrap();
        let e = doc.root();
        assert_eq!(plugin_type(e).unwrap(), "Chain");
        assert!(bool_attribute(e, "strict", false).unwrap());
        assert!(bool_attribute(e, "absent", true).unwrap());
        assert!(matches!(bool_attribute(e, "lax", false), Err(Error::Configuration(_))));
        let err = required_attribute(e, "path").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(err.message().and_then(|m| m.get("name")), Some("path"));
        assert_eq!(
            err.to_string(),
            "configuration error: missing required attribute path on <R>"
        );
    }

    #[test]
    fn test_children_named() {
        let doc = XmlDocument::parse("<R><A n=\"1\"/><B/><A n=\"2\"/></R>".to_owned()).unwrap();
        let values: Vec<_> = children_named(doc.root(), "A").filter_map(|a| a.attr("n")).collect();
        assert_eq!(values, vec!["1", "2"]);
    }
}
