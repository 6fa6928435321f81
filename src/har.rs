//! HTTP Archive (HAR) input model
//!
//! Deserializes the subset of the HAR 1.2 schema the replay engine reads:
//! the entry sequence, request method/URL/headers, response status/headers,
//! and response content. Everything else in a capture is ignored, so real
//! browser and proxy exports parse without modification.

use std::path::Path;

use serde::Deserialize;

use crate::{ReplayError, Result};

/// Top-level archive document
#[derive(Debug, Clone, Deserialize)]
pub struct Har {
    /// The archive log
    pub log: Log,
}

/// Archive log: an ordered sequence of captured exchanges
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    /// Captured request/response pairs, in capture order
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// One captured request/response pair
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// The captured request
    pub request: ArchivedRequest,
    /// The captured response
    pub response: ArchivedResponse,
}

/// Captured request fields the engine exposes to key policies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedRequest {
    /// HTTP method
    pub method: String,
    /// Full request URL
    pub url: String,
    /// Request headers as captured
    #[serde(default)]
    pub headers: Vec<Header>,
}

/// Captured response fields
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers as captured
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Response body content
    #[serde(default)]
    pub content: Content,
}

/// A single name/value header pair
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,
    /// Header value
    pub value: String,
}

/// Captured response body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// Body text; base64-encoded when `encoding` says so
    #[serde(default)]
    pub text: Option<String>,
    /// Text encoding, `"base64"` for binary bodies
    #[serde(default)]
    pub encoding: Option<String>,
    /// Bytes saved by compression on the wire; positive means the
    /// original response was served compressed
    #[serde(default)]
    pub compression: Option<i64>,
    /// MIME type of the body
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Har {
    /// Load an archive from a JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid HAR JSON.
    /// A load failure is fatal for the whole archive; it is never
    /// silently skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|source| ReplayError::Archive {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse an archive from in-memory JSON
    ///
    /// # Errors
    ///
    /// Returns error if the bytes are not valid HAR JSON
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data).map_err(|source| ReplayError::Archive {
            path: "<memory>".into(),
            source,
        })
    }
}
