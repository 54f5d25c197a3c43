//! A small, strict XML reader.
//!
//! Produces an [`Element`] tree for the subset of XML that inbound documents
//! use: a prolog, comments, processing instructions, a DOCTYPE without an
//! internal subset, elements, attributes, character data, CDATA sections,
//! the five predefined entities and numeric character references.
//!
//! Line endings are normalized as XML 1.0 requires: `\r\n` and a lone `\r`
//! become `\n` in character data, CDATA and attribute values. A `&#13;`
//! reference still yields a carriage return.
//!
//! Namespace prefixes are stripped from element and attribute names, and
//! `xmlns` declarations are dropped. Matching is done on local names only.
//!
//! The reader keeps an explicit stack instead of recursing, so nesting depth
//! is bounded by [`MAX_DEPTH`] rather than by the thread stack.

use crate::error::ParseError;

/// Deepest element nesting accepted before the document is rejected.
pub const MAX_DEPTH: usize = 128;

const FRAGMENT_CHARS: usize = 24;

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name (namespace prefix removed).
    pub name: String,
    /// Attributes in document order, keyed by local name.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element.
    pub text: String,
}

impl Element {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Parse `input` into its root element.
pub fn parse_document(input: &str) -> Result<Element, ParseError> {
    let mut reader = Reader { src: input, pos: 0 };
    reader.read_document()
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

struct OpenElement {
    qualified_name: String,
    element: Element,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        self.error_at(self.pos, reason)
    }

    fn error_at(&self, offset: usize, reason: impl Into<String>) -> ParseError {
        let offset = offset.min(self.src.len());
        let before = &self.src[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(idx) => before[idx + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        ParseError::Malformed {
            line,
            column,
            offset,
            fragment: self.src[offset..].chars().take(FRAGMENT_CHARS).collect(),
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
        self.pos += rest.len() - trimmed.len();
    }

    fn expect(&mut self, token: &str) -> Result<(), ParseError> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(format!("expected `{token}`")))
        }
    }

    /// Advance past the next occurrence of `terminator`, returning the text before it.
    fn take_until(&mut self, terminator: &str, what: &str) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        match rest.find(terminator) {
            Some(idx) => {
                self.pos += idx + terminator.len();
                Ok(&rest[..idx])
            }
            None => Err(self.error(format!("unterminated {what}"))),
        }
    }

    fn read_document(&mut self) -> Result<Element, ParseError> {
        if self.rest().starts_with('\u{feff}') {
            self.pos += '\u{feff}'.len_utf8();
        }
        self.skip_misc(true)?;
        if self.at_end() {
            return Err(self.error("document has no root element"));
        }
        if !self.rest().starts_with('<') {
            return Err(self.error("expected root element"));
        }
        let root = self.read_root()?;
        self.skip_misc(false)?;
        if !self.at_end() {
            return Err(self.error("content after root element"));
        }
        Ok(root)
    }

    /// Skip whitespace, comments and processing instructions outside the root.
    fn skip_misc(&mut self, allow_doctype: bool) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_processing_instruction()?;
            } else if rest.starts_with("<!--") {
                self.skip_comment()?;
            } else if allow_doctype && rest.starts_with("<!DOCTYPE") {
                self.skip_doctype()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_processing_instruction(&mut self) -> Result<(), ParseError> {
        self.expect("<?")?;
        self.take_until("?>", "processing instruction")?;
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.expect("<!--")?;
        let body = self.take_until("-->", "comment")?;
        if body.contains("--") {
            return Err(self.error_at(start, "`--` inside comment"));
        }
        Ok(())
    }

    fn skip_doctype(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.expect("<!DOCTYPE")?;
        let body = self.take_until(">", "DOCTYPE declaration")?;
        if body.contains('[') {
            return Err(self.error_at(start, "DOCTYPE internal subsets are not supported"));
        }
        Ok(())
    }

    fn read_cdata(&mut self) -> Result<&'a str, ParseError> {
        self.expect("<![CDATA[")?;
        self.take_until("]]>", "CDATA section")
    }

    fn read_root(&mut self) -> Result<Element, ParseError> {
        let (qualified_name, root, self_closing) = self.read_start_tag()?;
        if self_closing {
            return Ok(root);
        }
        let mut stack = vec![OpenElement {
            qualified_name,
            element: root,
        }];

        loop {
            if self.at_end() {
                let open = stack
                    .last()
                    .map(|o| o.qualified_name.as_str())
                    .unwrap_or_default();
                return Err(self.error(format!("unexpected end of input inside `<{open}>`")));
            }
            let rest = self.rest();
            if rest.starts_with("</") {
                let close_at = self.pos;
                let name = self.read_end_tag()?;
                let Some(open) = stack.pop() else {
                    return Err(self.error_at(close_at, "closing tag without an open element"));
                };
                if open.qualified_name != name {
                    return Err(self.error_at(
                        close_at,
                        format!(
                            "closing tag `</{name}>` does not match `<{}>`",
                            open.qualified_name
                        ),
                    ));
                }
                match stack.last_mut() {
                    Some(parent) => parent.element.children.push(open.element),
                    None => return Ok(open.element),
                }
            } else if rest.starts_with("<!--") {
                self.skip_comment()?;
            } else if rest.starts_with("<![CDATA[") {
                let data = self.read_cdata()?;
                if let Some(top) = stack.last_mut() {
                    push_normalized(&mut top.element.text, data);
                }
            } else if rest.starts_with("<?") {
                self.skip_processing_instruction()?;
            } else if rest.starts_with("<!") {
                return Err(self.error("markup declarations are not allowed inside elements"));
            } else if rest.starts_with('<') {
                let open_at = self.pos;
                let (qualified_name, element, self_closing) = self.read_start_tag()?;
                if self_closing {
                    if let Some(top) = stack.last_mut() {
                        top.element.children.push(element);
                    }
                } else {
                    if stack.len() >= MAX_DEPTH {
                        return Err(self.error_at(
                            open_at,
                            format!("element nesting exceeds {MAX_DEPTH} levels"),
                        ));
                    }
                    stack.push(OpenElement {
                        qualified_name,
                        element,
                    });
                }
            } else {
                let text = self.read_text()?;
                if let Some(top) = stack.last_mut() {
                    top.element.text.push_str(&text);
                }
            }
        }
    }

    /// Reads `<name attr="v" ...>` or `<name ... />`.
    fn read_start_tag(&mut self) -> Result<(String, Element, bool), ParseError> {
        self.expect("<")?;
        let qualified_name = self.read_name()?;
        let mut element = Element {
            name: local_name(&qualified_name).to_string(),
            ..Element::default()
        };

        loop {
            let before_ws = self.pos;
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok((qualified_name, element, true));
            }
            if rest.starts_with('>') {
                self.pos += 1;
                return Ok((qualified_name, element, false));
            }
            if self.at_end() {
                return Err(self.error(format!("unterminated start tag `<{qualified_name}`")));
            }
            if self.pos == before_ws {
                return Err(self.error("expected whitespace before attribute"));
            }

            let attr_at = self.pos;
            let attr_name = self.read_name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let value = self.read_attribute_value()?;

            if attr_name == "xmlns" || attr_name.starts_with("xmlns:") {
                continue;
            }
            let local = local_name(&attr_name).to_string();
            if element.attribute(&local).is_some() {
                return Err(self.error_at(attr_at, format!("duplicate attribute `{attr_name}`")));
            }
            element.attributes.push((local, value));
        }
    }

    fn read_end_tag(&mut self) -> Result<String, ParseError> {
        self.expect("</")?;
        let name = self.read_name()?;
        self.skip_whitespace();
        self.expect(">")?;
        Ok(name)
    }

    fn read_name(&mut self) -> Result<String, ParseError> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !is_name_char(*c))
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let name = &rest[..end];
        match name.chars().next() {
            Some(first) if is_name_start(first) => {
                self.pos += end;
                Ok(name.to_string())
            }
            _ => Err(self.error("expected a name")),
        }
    }

    fn read_attribute_value(&mut self) -> Result<String, ParseError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("attribute value must be quoted")),
        };
        self.pos += 1;
        let start = self.pos;
        let rest = self.rest();
        let Some(end) = rest.find(quote) else {
            return Err(self.error("unterminated attribute value"));
        };
        let raw = &rest[..end];
        if let Some(idx) = raw.find('<') {
            return Err(self.error_at(start + idx, "`<` is not allowed in attribute values"));
        }
        self.pos += end + 1;
        self.decode_entities(raw, start)
    }

    fn read_text(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let rest = self.rest();
        let end = rest.find('<').unwrap_or(rest.len());
        self.pos += end;
        self.decode_entities(&rest[..end], start)
    }

    fn decode_entities(&self, raw: &str, base: usize) -> Result<String, ParseError> {
        if !raw.contains(['&', '\r']) {
            return Ok(raw.to_string());
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(amp) = rest.find('&') {
            push_normalized(&mut out, &rest[..amp]);
            let after = &rest[amp + 1..];
            let at = base + (raw.len() - rest.len()) + amp;
            let Some(semi) = after.find(';') else {
                return Err(self.error_at(at, "unterminated entity reference"));
            };
            let entity = &after[..semi];
            let decoded = match entity {
                "lt" => '<',
                "gt" => '>',
                "amp" => '&',
                "quot" => '"',
                "apos" => '\'',
                _ => decode_char_reference(entity)
                    .ok_or_else(|| self.error_at(at, format!("unknown entity `&{entity};`")))?,
            };
            out.push(decoded);
            rest = &after[semi + 1..];
        }
        push_normalized(&mut out, rest);
        Ok(out)
    }
}

/// Append `literal` with `\r\n` and lone `\r` folded to `\n`.
fn push_normalized(out: &mut String, literal: &str) {
    let mut chars = literal.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            chars.next_if_eq(&'\n');
            out.push('\n');
        } else {
            out.push(c);
        }
    }
}

fn decode_char_reference(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u32>().ok()?,
    };
    char::from_u32(code).filter(|c| *c != '\0')
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

fn local_name(qualified: &str) -> &str {
    match qualified.rfind(':') {
        Some(idx) => &qualified[idx + 1..],
        None => qualified,
    }
}
