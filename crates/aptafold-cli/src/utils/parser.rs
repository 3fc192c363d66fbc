use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE (e.g., 'md.sampling-ns=20').")]
    InvalidAssignment(String),

    #[error("Component '{component}' cannot be empty in assignment '{assignment}'.")]
    EmptyComponent {
        component: &'static str,
        assignment: String,
    },

    #[error("Invalid {expected} value for '{key}': '{value}'.")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// A `section.key=value` override from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

pub fn parse_assignment(s: &str) -> Result<Assignment<'_>, ParseError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidAssignment(s.to_string()))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "key",
            assignment: s.to_string(),
        });
    }
    if value.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "value",
            assignment: s.to_string(),
        });
    }
    Ok(Assignment { key, value })
}

impl Assignment<'_> {
    /// Parses the value as `T`, naming `expected` in the error.
    pub fn parse<T: FromStr>(&self, expected: &'static str) -> Result<T, ParseError> {
        self.value.parse().map_err(|_| ParseError::InvalidValue {
            key: self.key.to_string(),
            value: self.value.to_string(),
            expected,
        })
    }
}
