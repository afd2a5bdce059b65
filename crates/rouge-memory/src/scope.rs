use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MemoryError;
use crate::payload;
use crate::vector_store::{FieldCondition, FieldValue, VectorFilter};

const DOMAIN_PREFIX: &str = "domain:";

/// A retrieval scope narrower than the whole collection.
///
/// Textual form: `domain:<name>` selects a crawled domain; anything else names a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKey {
    File(String),
    Domain(String),
}

impl ScopeKey {
    /// Payload field the scope matches against.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::File(_) => payload::FILE_NAME,
            Self::Domain(_) => payload::DOMAIN,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::File(name) | Self::Domain(name) => name,
        }
    }

    #[must_use]
    pub fn to_filter(&self) -> VectorFilter {
        VectorFilter {
            must: vec![FieldCondition {
                field: self.field().to_owned(),
                value: FieldValue::Text(self.name().to_owned()),
            }],
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(name) => f.write_str(name),
            Self::Domain(name) => write!(f, "{DOMAIN_PREFIX}{name}"),
        }
    }
}

impl FromStr for ScopeKey {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(domain) = s.strip_prefix(DOMAIN_PREFIX) {
            let domain = domain.trim();
            if domain.is_empty() {
                return Err(MemoryError::InvalidScope(s.to_owned()));
            }
            return Ok(Self::Domain(domain.to_owned()));
        }
        if s.is_empty() {
            return Err(MemoryError::InvalidScope(s.to_owned()));
        }
        Ok(Self::File(s.to_owned()))
    }
}

impl Serialize for ScopeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScopeKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
