//! Search filters and scopes.
//!
//! The AST covers the filter shapes the core evaluates: presence,
//! equality, substring, and the boolean connectives. The parser accepts
//! the standard parenthesized string form, e.g. `(&(cn=J*)(sn=*))`.

use std::fmt;

use oxidir_error::{DirectoryError, Result};
use serde::{Deserialize, Serialize};

/// How far below the base a search reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Present {
        attr: String,
    },
    Equality {
        attr: String,
        value: String,
    },
    Substring {
        attr: String,
        initial: Option<String>,
        any: Vec<String>,
        final_: Option<String>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn present(attr: &str) -> Filter {
        Filter::Present {
            attr: attr.to_string(),
        }
    }

    pub fn equality(attr: &str, value: &str) -> Filter {
        Filter::Equality {
            attr: attr.to_string(),
            value: value.to_string(),
        }
    }

    /// Parse the parenthesized string form.
    pub fn parse(input: &str) -> Result<Filter> {
        let mut parser = Parser {
            input: input.trim(),
            pos: 0,
        };
        let filter = parser.parse_filter()?;
        parser.skip_ws();
        if parser.pos != parser.input.len() {
            return Err(parser.error("trailing characters after filter"));
        }
        Ok(filter)
    }

    /// The attribute a leaf constrains; `None` for connectives.
    pub fn leaf_attr(&self) -> Option<&str> {
        match self {
            Filter::Present { attr }
            | Filter::Equality { attr, .. }
            | Filter::Substring { attr, .. } => Some(attr),
            _ => None,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Present { attr } => write!(f, "({attr}=*)"),
            Filter::Equality { attr, value } => write!(f, "({attr}={value})"),
            Filter::Substring {
                attr,
                initial,
                any,
                final_,
            } => {
                write!(f, "({attr}=")?;
                if let Some(i) = initial {
                    write!(f, "{i}")?;
                }
                write!(f, "*")?;
                for a in any {
                    write!(f, "{a}*")?;
                }
                if let Some(fin) = final_ {
                    write!(f, "{fin}")?;
                }
                write!(f, ")")
            }
            Filter::And(children) => {
                write!(f, "(&")?;
                for c in children {
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Filter::Or(children) => {
                write!(f, "(|")?;
                for c in children {
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Filter::Not(child) => write!(f, "(!{child})"),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, detail: &str) -> DirectoryError {
        DirectoryError::naming_violation(format!(
            "invalid filter at offset {}: {detail}",
            self.pos
        ))
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.rest().chars().next() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        if self.rest().starts_with(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{ch}'")))
        }
    }

    fn parse_filter(&mut self) -> Result<Filter> {
        self.skip_ws();
        self.expect('(')?;
        let filter = match self.rest().chars().next() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_children()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_children()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_leaf()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_children(&mut self) -> Result<Vec<Filter>> {
        let mut children = Vec::new();
        loop {
            self.skip_ws();
            if self.rest().starts_with(')') {
                break;
            }
            children.push(self.parse_filter()?);
        }
        if children.is_empty() {
            return Err(self.error("connective with no operands"));
        }
        Ok(children)
    }

    fn parse_leaf(&mut self) -> Result<Filter> {
        let rest = self.rest();
        let eq = rest
            .find('=')
            .ok_or_else(|| self.error("leaf without '='"))?;
        let attr = rest[..eq].trim();
        if attr.is_empty() {
            return Err(self.error("leaf with empty attribute"));
        }
        let close = rest[eq..]
            .find(')')
            .ok_or_else(|| self.error("unterminated leaf"))?;
        let value = &rest[eq + 1..eq + close];
        self.pos += eq + close;

        if value == "*" {
            return Ok(Filter::present(attr));
        }
        if !value.contains('*') {
            return Ok(Filter::equality(attr, value));
        }

        // Substring: split on '*', the first and last pieces may be empty.
        let pieces: Vec<&str> = value.split('*').collect();
        let initial = (!pieces[0].is_empty()).then(|| pieces[0].to_string());
        let final_piece = pieces[pieces.len() - 1];
        let final_ = (!final_piece.is_empty()).then(|| final_piece.to_string());
        let any = pieces[1..pieces.len() - 1]
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect();

        Ok(Filter::Substring {
            attr: attr.to_string(),
            initial,
            any,
            final_,
        })
    }
}
