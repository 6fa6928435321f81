//! Compilation of archive entries into servable responses

use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::har::Entry;
use crate::policy::ReplayPolicy;
use crate::{ReplayError, Result};

use super::store::ReplayResponse;

/// Compile one archive entry into a servable response
///
/// Success (2xx) entries are compiled from their captured content; other
/// statuses are served only when the policy's `response_for` hook supplies
/// a response. The `finalize_response` hook, when present, gets the last
/// word either way.
///
/// Returns `Ok(None)` when the entry yields no response and is dropped.
///
/// # Errors
///
/// Returns error if the entry's content cannot be decoded or compressed.
/// The failure is scoped to this entry; callers keep indexing the rest.
pub(crate) fn compile_entry(
    entry: &Entry,
    key: &str,
    policy: &ReplayPolicy,
) -> Result<Option<ReplayResponse>> {
    let status = entry.response.status;

    let candidate = if (200..300).contains(&status) {
        Some(compile_success(entry, key, policy)?)
    } else if let Some(hook) = &policy.response_for {
        hook(entry, key)
    } else {
        None
    };

    let Some(response) = candidate else {
        return Ok(None);
    };

    let response = match &policy.finalize_response {
        Some(hook) => hook(entry, key, response),
        None => response,
    };

    Ok(Some(response))
}

/// Build the response for a 2xx entry from its captured content
fn compile_success(entry: &Entry, key: &str, policy: &ReplayPolicy) -> Result<ReplayResponse> {
    let content = &entry.response.content;

    let body = if content.encoding.as_deref() == Some("base64") {
        // Binary bodies bypass the text hook entirely
        BASE64.decode(content.text.as_deref().unwrap_or_default()).map_err(|e| {
            ReplayError::InvalidContent(format!("base64 body for key '{key}': {e}"))
        })?
    } else {
        let mut text = content.text.clone().unwrap_or_default();
        if let Some(hook) = &policy.text_for {
            text = hook(entry, key, text);
        }
        text.into_bytes()
    };

    let recompress = content.compression.unwrap_or(0) > 0;
    let body = if recompress { gzip(&body)? } else { body };

    // Default-minimal headers: nothing else (cookies, cache-control,
    // auth) is carried over from the capture.
    let mut headers = Vec::with_capacity(3);
    if recompress {
        headers.push(("Content-Encoding".to_string(), "gzip".to_string()));
    }
    headers.push(("Content-Length".to_string(), body.len().to_string()));
    if let Some(mime) = content.mime_type.as_deref().filter(|m| !m.is_empty()) {
        headers.push(("Content-Type".to_string(), mime.to_string()));
    }

    Ok(ReplayResponse {
        status: entry.response.status,
        headers,
        body,
    })
}

/// Gzip-compress at the maximum, deterministic setting
fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
