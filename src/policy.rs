//! Caller-supplied replay policy
//!
//! Key derivation and the optional compile/dispatch hooks are policy owned
//! by the caller, not by the engine. The engine only defines the contract:
//! archive-side and request-side key functions must produce equal strings
//! for a live request to be served a captured response.

use std::borrow::Cow;

use crate::har::Entry;
use crate::replay::ReplayResponse;

/// Incoming request fields exposed to request-side policy
#[derive(Debug, Clone)]
pub struct LiveRequest {
    /// HTTP method
    pub method: String,
    /// Request target as received (origin-form path and query)
    pub uri: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
}

/// Derives a match key from an archive entry; `None` skips the entry
pub type EntryKeyFn = dyn Fn(&Entry) -> Option<String> + Send + Sync;

/// Derives a match key from a live request; `None` skips the lookup
pub type RequestKeyFn = dyn Fn(&LiveRequest) -> Option<String> + Send + Sync;

/// Rewrites entry body text before it is encoded into a response
pub type TextFn = dyn Fn(&Entry, &str, String) -> String + Send + Sync;

/// Supplies a response for a non-2xx entry that would otherwise be dropped
pub type ResponseFn = dyn Fn(&Entry, &str) -> Option<ReplayResponse> + Send + Sync;

/// Replaces or augments a compiled response as the last compile step
pub type FinalizeFn = dyn Fn(&Entry, &str, ReplayResponse) -> ReplayResponse + Send + Sync;

/// Produces a response for a request with no match left in the store
pub type MissingFn = dyn Fn(&LiveRequest) -> Option<ReplayResponse> + Send + Sync;

/// Capability set of policy functions
///
/// The two key functions are required; the four hooks are independent and
/// optional. All functions must be `Send + Sync` so the engine can be
/// shared across server tasks.
pub struct ReplayPolicy {
    pub(crate) key_for_entry: Box<EntryKeyFn>,
    pub(crate) key_for_request: Box<RequestKeyFn>,
    pub(crate) text_for: Option<Box<TextFn>>,
    pub(crate) response_for: Option<Box<ResponseFn>>,
    pub(crate) finalize_response: Option<Box<FinalizeFn>>,
    pub(crate) missing_response: Option<Box<MissingFn>>,
}

impl ReplayPolicy {
    /// Create a policy from the two required key functions
    pub fn new<E, R>(key_for_entry: E, key_for_request: R) -> Self
    where
        E: Fn(&Entry) -> Option<String> + Send + Sync + 'static,
        R: Fn(&LiveRequest) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            key_for_entry: Box::new(key_for_entry),
            key_for_request: Box::new(key_for_request),
            text_for: None,
            response_for: None,
            finalize_response: None,
            missing_response: None,
        }
    }

    /// Stock policy: key on `"METHOD path?query"`, 2xx entries only
    ///
    /// This is what the bundled server binary uses. Archive URLs are
    /// reduced to origin-form so they line up with the request target a
    /// local client actually sends. Proxy-style absolute request targets
    /// are reduced the same way, so they key identically to origin-form.
    #[must_use]
    pub fn method_and_url() -> Self {
        Self::new(
            |entry| {
                if !(200..300).contains(&entry.response.status) {
                    return None;
                }
                Some(format!(
                    "{} {}",
                    entry.request.method,
                    origin_form(&entry.request.url)
                ))
            },
            |request| Some(format!("{} {}", request.method, origin_form(&request.uri))),
        )
    }

    /// Set the body text rewrite hook
    #[must_use]
    pub fn with_text_for<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entry, &str, String) -> String + Send + Sync + 'static,
    {
        self.text_for = Some(Box::new(f));
        self
    }

    /// Set the non-2xx response hook
    #[must_use]
    pub fn with_response_for<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entry, &str) -> Option<ReplayResponse> + Send + Sync + 'static,
    {
        self.response_for = Some(Box::new(f));
        self
    }

    /// Set the compile finalizer hook
    #[must_use]
    pub fn with_finalize_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Entry, &str, ReplayResponse) -> ReplayResponse + Send + Sync + 'static,
    {
        self.finalize_response = Some(Box::new(f));
        self
    }

    /// Set the missing-response hook
    #[must_use]
    pub fn with_missing_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&LiveRequest) -> Option<ReplayResponse> + Send + Sync + 'static,
    {
        self.missing_response = Some(Box::new(f));
        self
    }
}

/// Reduce an absolute URL to its origin-form request target
///
/// `http://example.com/a/b?x=1` becomes `/a/b?x=1`. URLs without a path
/// component map to `/`; a query with no path keeps its query, as
/// `/?x=1`. Already-relative targets pass through.
#[must_use]
pub fn origin_form(url: &str) -> Cow<'_, str> {
    let Some(scheme_end) = url.find("://") else {
        return Cow::Borrowed(url);
    };
    let rest = &url[scheme_end + 3..];
    match rest.find(['/', '?']) {
        Some(i) if rest.as_bytes()[i] == b'/' => Cow::Borrowed(&rest[i..]),
        Some(i) => Cow::Owned(format!("/{}", &rest[i..])),
        None => Cow::Borrowed("/"),
    }
}
