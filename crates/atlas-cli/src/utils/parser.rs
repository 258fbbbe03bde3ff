use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    MissingSeparator(String),

    #[error("Component '{component}' cannot be empty in '{pair}'.")]
    EmptyComponent { component: &'static str, pair: String },

    #[error("Invalid {expected} value for {key}: {value}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unsupported configuration key for --set: '{0}'")]
    UnknownKey(String),
}

/// A parsed `-S key=value` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetValue<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> SetValue<'a> {
    /// Parses the value, naming `expected` in the error (e.g. "float").
    pub fn parse<T: FromStr>(&self, expected: &'static str) -> Result<T, ParseError> {
        self.value.parse().map_err(|_| ParseError::InvalidValue {
            key: self.key.to_string(),
            value: self.value.to_string(),
            expected,
        })
    }

    /// Comma-separated list of floats, e.g. `2,5,10`.
    pub fn parse_list(&self) -> Result<Vec<f64>, ParseError> {
        self.value
            .split(',')
            .map(|part| {
                part.trim().parse().map_err(|_| ParseError::InvalidValue {
                    key: self.key.to_string(),
                    value: self.value.to_string(),
                    expected: "float list",
                })
            })
            .collect()
    }
}

pub fn parse_set_value(pair: &str) -> Result<SetValue<'_>, ParseError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ParseError::MissingSeparator(pair.to_string()))?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "key",
            pair: pair.to_string(),
        });
    }
    if value.is_empty() {
        return Err(ParseError::EmptyComponent {
            component: "value",
            pair: pair.to_string(),
        });
    }
    Ok(SetValue { key, value })
}
