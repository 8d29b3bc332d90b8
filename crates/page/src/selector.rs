//! A small CSS selector engine.
//!
//! Supports the subset interactive automation actually sends: tag, `#id`,
//! `.class`, `[attr]`, `[attr=value]` (optionally quoted), `*`, compound
//! selectors, descendant and child combinators, and comma lists.

use crate::error::{Error, Result};

/// One simple-selector bundle, e.g. `input.field[type=text]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// `(name, None)` for presence, `(name, Some(value))` for equality.
    pub attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// A complex selector: compounds joined right-to-left by combinators.
#[derive(Debug, Clone, PartialEq)]
pub struct Complex {
    /// Leftmost first; the last entry is the subject compound.
    pub parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    pub fn subject(&self) -> &Compound {
        // parts is never empty: parse() rejects empty selectors.
        &self.parts[self.parts.len() - 1].1
    }
}

/// A comma-separated selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList {
    pub complexes: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let mut complexes = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::InvalidSelector(input.to_string()));
            }
            complexes.push(parse_complex(part, input)?);
        }
        if complexes.is_empty() {
            return Err(Error::InvalidSelector(input.to_string()));
        }
        Ok(Self { complexes })
    }
}

fn parse_complex(part: &str, original: &str) -> Result<Complex> {
    let mut parts = Vec::new();
    let mut pending = Combinator::Descendant;
    for token in tokenize_combinators(part) {
        match token {
            ">" => {
                if parts.is_empty() && pending == Combinator::Child {
                    return Err(Error::InvalidSelector(original.to_string()));
                }
                pending = Combinator::Child;
            },
            compound_text => {
                let compound = parse_compound(compound_text, original)?;
                parts.push((pending, compound));
                pending = Combinator::Descendant;
            },
        }
    }
    if parts.is_empty() {
        return Err(Error::InvalidSelector(original.to_string()));
    }
    Ok(Complex { parts })
}

/// Split on whitespace while keeping `>` as its own token, even when not
/// surrounded by spaces.
fn tokenize_combinators(input: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        if let Some(stripped) = rest.strip_prefix('>') {
            tokens.push(">");
            rest = stripped;
            continue;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(rest.len());
        tokens.push(&rest[..end]);
        rest = &rest[end..];
    }
    tokens
}

fn parse_compound(input: &str, original: &str) -> Result<Compound> {
    let mut compound = Compound::default();
    let mut universal = false;
    let mut chars = input.char_indices().peekable();

    // Leading tag or universal.
    if let Some(&(_, c)) = chars.peek()
        && (c.is_ascii_alphanumeric() || c == '*')
    {
        let start = 0;
        let mut end = 0;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*' {
                end = i + c.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let tag = &input[start..end];
        if tag == "*" {
            universal = true;
        } else {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
    }

    while let Some((i, c)) = chars.next() {
        match c {
            '#' | '.' => {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, nc)) = chars.peek() {
                    if nc.is_ascii_alphanumeric() || nc == '-' || nc == '_' {
                        end = j + nc.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end == start {
                    return Err(Error::InvalidSelector(original.to_string()));
                }
                let name = input[start..end].to_string();
                if c == '#' {
                    compound.id = Some(name);
                } else {
                    compound.classes.push(name);
                }
            },
            '[' => {
                let start = i + 1;
                let mut end = None;
                for (j, nc) in chars.by_ref() {
                    if nc == ']' {
                        end = Some(j);
                        break;
                    }
                }
                let Some(end) = end else {
                    return Err(Error::InvalidSelector(original.to_string()));
                };
                let body = &input[start..end];
                match body.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        compound
                            .attrs
                            .push((name.trim().to_string(), Some(value.to_string())));
                    },
                    None => {
                        if body.trim().is_empty() {
                            return Err(Error::InvalidSelector(original.to_string()));
                        }
                        compound.attrs.push((body.trim().to_string(), None));
                    },
                }
            },
            _ => return Err(Error::InvalidSelector(original.to_string())),
        }
    }

    if compound.is_empty() && !universal {
        return Err(Error::InvalidSelector(original.to_string()));
    }
    Ok(compound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_pieces() {
        let list = SelectorList::parse("input.field[type=text]#main").unwrap();
        let compound = list.complexes[0].subject();
        assert_eq!(compound.tag.as_deref(), Some("input"));
        assert_eq!(compound.id.as_deref(), Some("main"));
        assert_eq!(compound.classes, vec!["field".to_string()]);
        assert_eq!(
            compound.attrs,
            vec![("type".to_string(), Some("text".to_string()))]
        );
    }

    #[test]
    fn parses_combinators() {
        let list = SelectorList::parse("form > .row input").unwrap();
        let parts = &list.complexes[0].parts;
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].0, Combinator::Child);
        assert_eq!(parts[2].0, Combinator::Descendant);
    }

    #[test]
    fn parses_comma_lists_and_quoted_attrs() {
        let list = SelectorList::parse("a[href], button, [data-role='menu item']").unwrap();
        assert_eq!(list.complexes.len(), 3);
        assert_eq!(
            list.complexes[2].subject().attrs[0],
            ("data-role".to_string(), Some("menu item".to_string()))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("div,,a").is_err());
        assert!(SelectorList::parse("#").is_err());
        assert!(SelectorList::parse("[unclosed").is_err());
        assert!(SelectorList::parse("a ~ b").is_err());
    }

    #[test]
    fn universal_selector_matches_everything() {
        let list = SelectorList::parse("*").unwrap();
        let compound = list.complexes[0].subject();
        assert!(compound.tag.is_none());
        assert!(compound.id.is_none());
    }
}
