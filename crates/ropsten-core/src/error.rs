#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::fmt;

/// Errors produced by the Ropsten XML tooling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("configuration error: {0}")]
    Configuration(Message),

    #[error("unmarshalling error: {0}")]
    Unmarshalling(Message),

    #[error("marshalling error: {0}")]
    Marshalling(Message),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn configuration(message: impl Into<Message>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unmarshalling(message: impl Into<Message>) -> Self {
        Self::Unmarshalling(message.into())
    }

    pub fn marshalling(message: impl Into<Message>) -> Self {
        Self::Marshalling(message.into())
    }

    /// The structured message, for the kinds that carry one.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Configuration(m) | Self::Unmarshalling(m) | Self::Marshalling(m) => Some(m),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Error text kept as a template plus named substitution values.
///
/// Placeholders are written `$name` and replaced at render time, so the same
/// error can be logged verbatim or handed to a localizer that only needs the
/// template and the parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    template: Cow<'static, str>,
    params: Vec<(Cow<'static, str>, String)>,
}

impl Message {
    pub fn new(template: impl Into<Cow<'static, str>>) -> Self {
        Self {
            template: template.into(),
            params: Vec::new(),
        }
    }

    /// Add a named substitution value.
    pub fn param(mut self, name: impl Into<Cow<'static, str>>, value: impl fmt::Display) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn params(&self) -> &[(Cow<'static, str>, String)] {
        &self.params
    }

    /// Look up a substitution value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Render the template, replacing every `$name` with its value.
    ///
    /// Unknown placeholders are left as written. The longest parameter name
    /// wins when one name is a prefix of another (`$id` vs `$idref`).
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest: &str = &self.template;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let name_len = after
                .char_indices()
                .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
                .map_or(after.len(), |(i, _)| i);
            let candidate = &after[..name_len];
            let matched = self
                .params
                .iter()
                .filter(|(n, _)| candidate.starts_with(n.as_ref()) && !n.is_empty())
                .max_by_key(|(n, _)| n.len());
            match matched {
                Some((n, v)) => {
                    out.push_str(v);
                    rest = &after[n.len()..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&'static str> for Message {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_params() {
        let m = Message::new("no unmarshaller for $name in $ctx").param("name", "{urn:x}a").param("ctx", "root");
        assert_eq!(m.render(), "no unmarshaller for {urn:x}a in root");
        assert_eq!(m.template(), "no unmarshaller for $name in $ctx");
        assert_eq!(m.get("ctx"), Some("root"));
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let m = Message::new("cost $5 for $who").param("who", "me");
        assert_eq!(m.render(), "cost $5 for me");
    }

    #[test]
    fn test_render_prefers_longest_name() {
        let m = Message::new("$idref/$id").param("id", "a").param("idref", "b");
        assert_eq!(m.render(), "b/a");
    }

    #[test]
    fn test_error_display() {
        let e = Error::unmarshalling(Message::new("bad $x").param("x", 1));
        assert_eq!(e.to_string(), "unmarshalling error: bad 1");
        assert_eq!(e.message().and_then(|m| m.get("x")), Some("1"));
        assert!(Error::Other("o".into()).message().is_none());
    }
}
