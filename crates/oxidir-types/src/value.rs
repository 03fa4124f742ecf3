use std::fmt;

use serde::{Deserialize, Serialize};

/// A directory attribute value.
///
/// Most directory values are UTF-8 text; binary values show up for
/// certificates, passwords and photos. Whether two text values compare
/// case-sensitively depends on the attribute's syntax, so the comparison
/// mode is a parameter here rather than a property of the value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Binary(_) => None,
        }
    }

    /// Equality under the given matching mode. Binary values always
    /// compare exactly.
    pub fn matches(&self, other: &Value, case_ignore: bool) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => {
                if case_ignore {
                    crate::dn::default_normalize(a) == crate::dn::default_normalize(b)
                } else {
                    a == b
                }
            }
            (Value::Binary(a), Value::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}
