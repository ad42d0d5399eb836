#![forbid(unsafe_code)]

//! DOCTYPE external subset handling.
//!
//! The tree parser never fetches anything itself. An external subset named
//! by the DOCTYPE is fetched through the pool's resolver and, when something
//! was served, placed after the internal subset so internal declarations
//! still take precedence.

/// The location of a DOCTYPE declaration in the prolog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doctype {
    /// Byte offset of `<!DOCTYPE`.
    pub start: usize,
    /// Byte offset just past the closing `>`.
    pub end: usize,
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    /// Internal subset text, without the brackets.
    pub internal_subset: Option<String>,
}

impl Doctype {
    /// Rewrite `text` so the DOCTYPE carries `external` inline.
    pub fn inline_external(&self, text: &str, external: &str) -> String {
        let external = strip_text_declaration(external);
        let mut out = String::with_capacity(text.len() + external.len() + 16);
        out.push_str(&text[..self.start]);
        out.push_str("<!DOCTYPE ");
        out.push_str(&self.name);
        out.push_str(" [");
        if let Some(internal) = &self.internal_subset {
            out.push_str(internal);
            out.push('\n');
        }
        out.push_str(external);
        out.push_str("]>");
        out.push_str(&text[self.end..]);
        out
    }
}

/// Find the DOCTYPE in the prolog, if any.
pub fn find_doctype(text: &str) -> Option<Doctype> {
    let b = text.as_bytes();
    let mut i = 0;
    if text.starts_with('\u{feff}') {
        i = '\u{feff}'.len_utf8();
    }
    loop {
        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }
        let rest = &text[i..];
        if rest.starts_with("<?") {
            i += rest.find("?>")? + 2;
        } else if rest.starts_with("<!--") {
            i += rest.find("-->")? + 3;
        } else if rest.starts_with("<!DOCTYPE") {
            return parse_doctype(text, i);
        } else {
            return None;
        }
    }
}

fn parse_doctype(text: &str, start: usize) -> Option<Doctype> {
    let b = text.as_bytes();
    let mut i = start + "<!DOCTYPE".len();
    let skip_ws = |i: &mut usize| {
        while *i < b.len() && b[*i].is_ascii_whitespace() {
            *i += 1;
        }
    };
    let read_quoted = |i: &mut usize| -> Option<String> {
        let quote = *b.get(*i)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let from = *i + 1;
        let len = text[from..].find(quote as char)?;
        *i = from + len + 1;
        Some(text[from..from + len].to_owned())
    };

    skip_ws(&mut i);
    let name_start = i;
    while i < b.len() && !b[i].is_ascii_whitespace() && b[i] != b'[' && b[i] != b'>' {
        i += 1;
    }
    let name = text[name_start..i].to_owned();
    skip_ws(&mut i);

    let mut public_id = None;
    let mut system_id = None;
    if text[i..].starts_with("SYSTEM") {
        i += "SYSTEM".len();
        skip_ws(&mut i);
        system_id = Some(read_quoted(&mut i)?);
    } else if text[i..].starts_with("PUBLIC") {
        i += "PUBLIC".len();
        skip_ws(&mut i);
        public_id = Some(read_quoted(&mut i)?);
        skip_ws(&mut i);
        system_id = Some(read_quoted(&mut i)?);
    }
    skip_ws(&mut i);

    let mut internal_subset = None;
    if b.get(i) == Some(&b'[') {
        let from = i + 1;
        i = from;
        loop {
            let rest = &text[i..];
            match *b.get(i)? {
                b']' => break,
                b'"' | b'\'' => {
                    read_quoted(&mut i)?;
                }
                b'<' if rest.starts_with("<!--") => i += rest.find("-->")? + 3,
                _ => i += rest.chars().next()?.len_utf8(),
            }
        }
        internal_subset = Some(text[from..i].to_owned());
        i += 1;
        skip_ws(&mut i);
    }

    if b.get(i) != Some(&b'>') {
        return None;
    }
    Some(Doctype {
        start,
        end: i + 1,
        name,
        public_id,
        system_id,
        internal_subset,
    })
}

/// Drop a leading `<?xml ...?>` text declaration from an external subset.
fn strip_text_declaration(s: &str) -> &str {
    let trimmed = s.trim_start_matches('\u{feff}');
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    trimmed
}
