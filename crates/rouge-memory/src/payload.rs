//! Field names and parsing of the payload stored with every chunk point.

use std::collections::HashMap;

use serde_json::Value;

pub const TEXT: &str = "text";
pub const FILE_NAME: &str = "file_name";
pub const DOMAIN: &str = "domain";
pub const URL: &str = "url";
pub const PAGE_TITLE: &str = "page_title";
pub const CHUNK_INDEX: &str = "chunk_index";
pub const TOKEN_COUNT: &str = "token_count";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed payload field `{field}`: {reason}")]
pub struct MalformedPayload {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Typed view of a stored chunk payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkPayload {
    pub text: String,
    pub file_name: Option<String>,
    pub domain: Option<String>,
    pub url: Option<String>,
    pub page_title: Option<String>,
    pub chunk_index: Option<u64>,
    pub token_count: Option<u64>,
}

impl ChunkPayload {
    /// # Errors
    ///
    /// Returns [`MalformedPayload`] when `text` is missing or not a string, or when
    /// `token_count` is present but not a non-negative integer.
    pub fn from_map(payload: &HashMap<String, Value>) -> Result<Self, MalformedPayload> {
        let text = match payload.get(TEXT) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(MalformedPayload {
                    field: TEXT,
                    reason: "not a string",
                });
            }
            None => {
                return Err(MalformedPayload {
                    field: TEXT,
                    reason: "missing",
                });
            }
        };

        let token_count = match payload.get(TOKEN_COUNT) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or(MalformedPayload {
                field: TOKEN_COUNT,
                reason: "not a non-negative integer",
            })?),
        };

        Ok(Self {
            text,
            file_name: string_field(payload, FILE_NAME),
            domain: string_field(payload, DOMAIN),
            url: string_field(payload, URL),
            page_title: string_field(payload, PAGE_TITLE),
            chunk_index: payload.get(CHUNK_INDEX).and_then(Value::as_u64),
            token_count,
        })
    }

    /// Citation identity: file name, else URL, else the point id.
    #[must_use]
    pub fn source_id(&self, point_id: &str) -> String {
        self.file_name
            .as_deref()
            .or(self.url.as_deref())
            .unwrap_or(point_id)
            .to_owned()
    }
}

fn string_field(payload: &HashMap<String, Value>, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
