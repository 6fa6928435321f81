//! Replay engine: archive indexing and request dispatch

use std::path::Path;

use tracing::{debug, info, warn};

use crate::har::{Entry, Har};
use crate::policy::{LiveRequest, ReplayPolicy};
use crate::Result;

use super::compile::compile_entry;
use super::store::{ReplayResponse, ResponseStore, StoreStats};

/// Replay engine backed by a keyed response store
///
/// Index archives once at startup with [`load_archive`](Self::load_archive)
/// or [`add_archive`](Self::add_archive), then serve live traffic through
/// [`dispatch`](Self::dispatch).
pub struct ReplayEngine {
    store: ResponseStore,
    policy: ReplayPolicy,
}

impl ReplayEngine {
    /// Create an engine with the given policy and an empty store
    #[must_use]
    pub fn new(policy: ReplayPolicy) -> Self {
        Self {
            store: ResponseStore::new(),
            policy,
        }
    }

    /// Load a HAR file and index its entries
    ///
    /// Returns the number of responses indexed.
    ///
    /// # Errors
    ///
    /// Returns error if the archive cannot be read or parsed. Per-entry
    /// compile failures are logged and skipped, not propagated.
    pub fn load_archive(&self, path: &Path) -> Result<usize> {
        let har = Har::from_file(path)?;
        let indexed = self.add_archive(&har);

        info!(
            "Loaded archive {}: {} of {} entries indexed",
            path.display(),
            indexed,
            har.log.entries.len()
        );

        Ok(indexed)
    }

    /// Index every entry of an already-parsed archive, in archive order
    ///
    /// May be called repeatedly to merge archives; queue order across
    /// merges is call order. Returns the number of responses indexed.
    pub fn add_archive(&self, har: &Har) -> usize {
        har.log
            .entries
            .iter()
            .filter(|entry| self.add_entry(entry))
            .count()
    }

    /// Index a single archive entry
    ///
    /// Returns whether the entry produced a stored response. Entries with
    /// no derivable key, entries the compiler drops, and entries whose
    /// content fails to decode all return `false`; the last case is also
    /// logged so a broken capture is visible.
    pub fn add_entry(&self, entry: &Entry) -> bool {
        let Some(key) = (self.policy.key_for_entry)(entry).filter(|k| !k.is_empty()) else {
            return false;
        };

        match compile_entry(entry, &key, &self.policy) {
            Ok(Some(response)) => {
                debug!("Indexed {} {} under '{}'", entry.request.method, entry.request.url, key);
                self.store.append(&key, response);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(
                    "Skipping entry {} {}: {}",
                    entry.request.method, entry.request.url, e
                );
                false
            }
        }
    }

    /// Serve one live request
    ///
    /// Derives the request key, consumes the oldest matching response, and
    /// falls back to the `missing_response` hook and then a bare 404.
    /// Always produces exactly one response.
    pub fn dispatch(&self, request: &LiveRequest) -> ReplayResponse {
        let mut served = (self.policy.key_for_request)(request)
            .filter(|k| !k.is_empty())
            .and_then(|key| {
                debug!("Request {} {} keyed as '{}'", request.method, request.uri, key);
                self.store.consume_one(&key)
            });

        if served.is_none() {
            if let Some(hook) = &self.policy.missing_response {
                served = hook(request);
            }
        }

        let response = served.unwrap_or_else(ReplayResponse::not_found);

        info!("{} {} -> {}", request.method, request.uri, response.status);

        response
    }

    /// Responses still queued under a key
    #[must_use]
    pub fn remaining(&self, key: &str) -> usize {
        self.store.remaining(key)
    }

    /// Snapshot of store statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{ArchivedRequest, ArchivedResponse, Content};

    fn entry(method: &str, url: &str, status: u16, text: &str) -> Entry {
        Entry {
            request: ArchivedRequest {
                method: method.to_string(),
                url: url.to_string(),
                headers: vec![],
            },
            response: ArchivedResponse {
                status,
                headers: vec![],
                content: Content {
                    text: Some(text.to_string()),
                    mime_type: Some("text/plain".to_string()),
                    ..Content::default()
                },
            },
        }
    }

    fn har(entries: Vec<Entry>) -> Har {
        Har {
            log: crate::har::Log { entries },
        }
    }

    fn get(uri: &str) -> LiveRequest {
        LiveRequest {
            method: "GET".to_string(),
            uri: uri.to_string(),
            headers: vec![],
        }
    }

    #[test]
    fn test_index_success_entries_in_order() {
        let engine = ReplayEngine::new(ReplayPolicy::method_and_url());

        let indexed = engine.add_archive(&har(vec![
            entry("GET", "http://example.com/a", 200, "first"),
            entry("GET", "http://example.com/a", 200, "second"),
            entry("GET", "http://example.com/b", 200, "other"),
        ]));

        assert_eq!(indexed, 3);
        assert_eq!(engine.remaining("GET /a"), 2);
        assert_eq!(engine.remaining("GET /b"), 1);
    }

    #[test]
    fn test_repeated_requests_drain_in_capture_order() {
        let engine = ReplayEngine::new(ReplayPolicy::method_and_url());
        engine.add_archive(&har(vec![
            entry("GET", "http://example.com/a", 200, "first"),
            entry("GET", "http://example.com/a", 200, "second"),
        ]));

        assert_eq!(engine.dispatch(&get("/a")).body, b"first");
        assert_eq!(engine.dispatch(&get("/a")).body, b"second");

        let third = engine.dispatch(&get("/a"));
        assert_eq!(third.status, 404);
        assert!(third.body.is_empty());
    }

    #[test]
    fn test_non_success_entry_not_indexed() {
        let engine = ReplayEngine::new(ReplayPolicy::method_and_url());
        let indexed = engine.add_archive(&har(vec![entry(
            "GET",
            "http://example.com/a",
            404,
            "gone",
        )]));

        assert_eq!(indexed, 0);
        assert_eq!(engine.dispatch(&get("/a")).status, 404);
    }

    #[test]
    fn test_keyless_entry_skipped() {
        let policy = ReplayPolicy::new(|_| None, |_| Some("k".to_string()));
        let engine = ReplayEngine::new(policy);

        let indexed = engine.add_archive(&har(vec![entry(
            "GET",
            "http://example.com/a",
            200,
            "body",
        )]));
        assert_eq!(indexed, 0);
    }

    #[test]
    fn test_empty_key_counts_as_no_key() {
        let policy = ReplayPolicy::new(
            |_| Some(String::new()),
            |_| Some(String::new()),
        );
        let engine = ReplayEngine::new(policy);

        assert_eq!(
            engine.add_archive(&har(vec![entry("GET", "http://example.com/a", 200, "x")])),
            0
        );
        // An empty request key skips the lookup too; store stays untouched
        assert_eq!(engine.dispatch(&get("/a")).status, 404);
        assert_eq!(engine.stats().misses, 0);
    }

    #[test]
    fn test_keyless_request_skips_lookup() {
        let policy = ReplayPolicy::new(
            |entry| Some(format!("{} {}", entry.request.method, entry.request.url)),
            |_| None,
        );
        let engine = ReplayEngine::new(policy);
        engine.add_archive(&har(vec![entry("GET", "http://example.com/a", 200, "x")]));

        assert_eq!(engine.dispatch(&get("/a")).status, 404);
        assert_eq!(engine.stats().misses, 0);
    }

    #[test]
    fn test_missing_hook_runs_before_fallback() {
        let policy = ReplayPolicy::method_and_url().with_missing_response(|request| {
            Some(ReplayResponse {
                status: 503,
                headers: vec![],
                body: request.uri.clone().into_bytes(),
            })
        });
        let engine = ReplayEngine::new(policy);

        let response = engine.dispatch(&get("/nope"));
        assert_eq!(response.status, 503);
        assert_eq!(response.body, b"/nope");
    }

    #[test]
    fn test_missing_hook_declining_falls_back_to_404() {
        let policy = ReplayPolicy::method_and_url().with_missing_response(|_| None);
        let engine = ReplayEngine::new(policy);

        assert_eq!(engine.dispatch(&get("/nope")).status, 404);
    }

    #[test]
    fn test_bad_entry_does_not_abort_indexing() {
        let engine = ReplayEngine::new(ReplayPolicy::method_and_url());

        let mut bad = entry("GET", "http://example.com/a", 200, "!!! not base64");
        bad.response.content.encoding = Some("base64".to_string());

        let indexed = engine.add_archive(&har(vec![
            bad,
            entry("GET", "http://example.com/b", 200, "survivor"),
        ]));

        assert_eq!(indexed, 1);
        assert_eq!(engine.dispatch(&get("/b")).body, b"survivor");
    }

    #[test]
    fn test_merged_archives_index_in_call_order() {
        let engine = ReplayEngine::new(ReplayPolicy::method_and_url());

        engine.add_archive(&har(vec![entry("GET", "http://example.com/a", 200, "one")]));
        engine.add_archive(&har(vec![entry("GET", "http://example.com/a", 200, "two")]));

        assert_eq!(engine.dispatch(&get("/a")).body, b"one");
        assert_eq!(engine.dispatch(&get("/a")).body, b"two");
    }

    #[test]
    fn test_load_archive_propagates_parse_failure() {
        use std::io::Write;

        let engine = ReplayEngine::new(ReplayPolicy::method_and_url());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not json").unwrap();

        assert!(engine.load_archive(file.path()).is_err());
    }
}
