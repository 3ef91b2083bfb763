#![forbid(unsafe_code)]

//! CSS-subset selectors.
//!
//! Supported grammar:
//!
//! ```text
//! list      := complex ( "," complex )*
//! complex   := compound ( WS+ compound )*          (descendant combinator)
//! compound  := ( ident | "*" )? ( "." ident | "[" ident ( "=" value )? "]" )*
//! value     := ident | '"' .. '"' | "'" .. "'"
//! ```
//!
//! Tag names compare case-insensitively; classes and attribute names and
//! values compare exactly.
//!
//! # Example
//!
//! ```
//! use dependson_core::dom::Document;
//! use dependson_core::selector::Selector;
//!
//! let mut doc = Document::new();
//! let input = doc.create_element("input");
//! doc.set_attr(input, "type", "checkbox");
//! let root = doc.root();
//! doc.append_child(root, input);
//!
//! let selector = Selector::parse(r#"input[type="radio"], input[type="checkbox"]"#).unwrap();
//! assert!(doc.matches(input, &selector));
//! ```

use std::fmt;
use std::str::FromStr;

use crate::dom::{Document, ElementId};
use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttributeMatcher {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatcher>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches(&self, doc: &Document, el: ElementId) -> bool {
        let Some(tag) = doc.tag(el) else {
            return false;
        };
        if let Some(expected) = &self.tag
            && expected != "*"
            && expected != tag
        {
            return false;
        }
        self.classes.iter().all(|class| doc.has_class(el, class))
            && self.attributes.iter().all(|matcher| {
                match (doc.attr(el, &matcher.name), &matcher.value) {
                    (Some(_), None) => true,
                    (Some(actual), Some(expected)) => actual == expected,
                    (None, _) => false,
                }
            })
    }
}

/// A chain of compounds joined by descendant combinators, stored left to
/// right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
}

impl Complex {
    fn matches(&self, doc: &Document, el: ElementId) -> bool {
        let Some((subject, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !subject.matches(doc, el) {
            return false;
        }
        // Nearest-ancestor matching is exact for descendant-only chains.
        let mut ancestors = doc.ancestors(el);
        rest.iter()
            .rev()
            .all(|compound| ancestors.any(|a| compound.matches(doc, a)))
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse()
    }

    /// Selector matching elements that carry attribute `name`.
    #[must_use]
    pub fn attribute(name: &str) -> Self {
        Self {
            source: format!("[{name}]"),
            alternatives: vec![Complex {
                compounds: vec![Compound {
                    attributes: vec![AttributeMatcher {
                        name: name.to_string(),
                        value: None,
                    }],
                    ..Compound::default()
                }],
            }],
        }
    }

    /// The text this selector was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `el` matches any alternative of the list.
    #[must_use]
    pub fn matches(&self, doc: &Document, el: ElementId) -> bool {
        self.alternatives.iter().any(|c| c.matches(doc, el))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.source.len(), |&(offset, _)| offset)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::UnexpectedChar {
            source_text: self.source.to_string(),
            offset: self.offset(),
            found,
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(SelectorError::MissingIdent {
                source_text: self.source.to_string(),
                offset: self.offset(),
            });
        }
        Ok(self.chars[start..self.pos].iter().map(|&(_, c)| c).collect())
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        if self.source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut alternatives = Vec::new();
        loop {
            self.skip_ws();
            alternatives.push(self.complex()?);
            match self.peek() {
                Some(',') => self.pos += 1,
                None => break,
                Some(other) => return Err(self.unexpected(other)),
            }
        }
        Ok(Selector {
            source: self.source.trim().to_string(),
            alternatives,
        })
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.compound()?];
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some(_) if had_ws => compounds.push(self.compound()?),
                Some(other) => return Err(self.unexpected(other)),
            }
        }
        Ok(Complex { compounds })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".to_string());
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => compound.attributes.push(self.attribute()?),
                _ => break,
            }
        }
        if compound.is_empty() {
            return match self.peek() {
                Some(other) => Err(self.unexpected(other)),
                None => Err(SelectorError::MissingIdent {
                    source_text: self.source.to_string(),
                    offset: self.offset(),
                }),
            };
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttributeMatcher, SelectorError> {
        let start = self.offset();
        self.pos += 1; // '['
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let value = match self.peek() {
            Some('=') => {
                self.pos += 1;
                self.skip_ws();
                let value = match self.peek() {
                    Some(quote @ ('"' | '\'')) => self.quoted(quote)?,
                    _ => self.ident()?,
                };
                self.skip_ws();
                Some(value)
            }
            _ => None,
        };
        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(AttributeMatcher { name, value })
            }
            Some(other) => Err(self.unexpected(other)),
            None => Err(SelectorError::UnterminatedAttribute {
                source_text: self.source.to_string(),
                offset: start,
            }),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let start = self.offset();
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => {
                    return Err(SelectorError::UnterminatedString {
                        source_text: self.source.to_string(),
                        offset: start,
                    });
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
