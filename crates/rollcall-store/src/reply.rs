//! Untyped reply model shared by all store adapters.
//!
//! Adapters translate their wire values into [`Reply`] without interpreting
//! them; shape checking belongs to the membership layer's decoder.

use std::fmt::{Display, Formatter};

/// A store reply before schema decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Integer(i64),
    Text(String),
    Array(Vec<Reply>),
    /// Any other wire type, carried as a description
    Other(String),
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Reply::Text(value.into())
    }

    /// Short name of the reply type, used in protocol violation messages
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Integer(_) => "integer",
            Reply::Text(_) => "text",
            Reply::Array(_) => "array",
            Reply::Other(_) => "unsupported",
        }
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Nil => write!(f, "nil"),
            Reply::Integer(value) => write!(f, "{}", value),
            Reply::Text(value) => write!(f, "{:?}", value),
            Reply::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Reply::Other(description) => write!(f, "<{}>", description),
        }
    }
}
