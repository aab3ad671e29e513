// ABOUTME: Validated identifier for a configured deployment target.
// ABOUTME: Follows RFC 1123 label rules so ids are safe in file names and logs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetIdError {
    #[error("target id cannot be empty")]
    Empty,

    #[error("target id exceeds maximum length of 63 characters")]
    TooLong,

    #[error("target id cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("target id cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("target id must be lowercase")]
    NotLowercase,

    #[error("invalid character in target id: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(value: &str) -> Result<Self, TargetIdError> {
        if value.is_empty() {
            return Err(TargetIdError::Empty);
        }

        if value.len() > 63 {
            return Err(TargetIdError::TooLong);
        }

        if value.starts_with('-') {
            return Err(TargetIdError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(TargetIdError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(TargetIdError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(TargetIdError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TargetId {
    type Err = TargetIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for TargetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TargetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
