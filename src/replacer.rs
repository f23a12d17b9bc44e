//! `{placeholder}` substitution.
//!
//! Keys are dotted names such as `http.request.uri.path`. Values come from the
//! replacer's own map; `env.*` keys fall back to the process environment.
//! Configuration shorthands such as `{path}` resolve to their full keys.

use std::borrow::Cow;
use std::collections::HashMap;

use http::{Request, Uri};

pub const REQUEST_URI: &str = "http.request.uri";
pub const REQUEST_URI_PATH: &str = "http.request.uri.path";
pub const REQUEST_URI_QUERY: &str = "http.request.uri.query";
pub const REQUEST_METHOD: &str = "http.request.method";
pub const REQUEST_HOST: &str = "http.request.host";
pub const ORIGINAL_URI: &str = "http.request.orig_uri";
pub const ORIGINAL_URI_PATH: &str = "http.request.orig_uri.path";
/// Site root set by the host, referenced as `{http.vars.root}`.
pub const VARS_ROOT: &str = "http.vars.root";
pub const FILE_MATCH_RELATIVE: &str = "http.matchers.file.relative";
pub const FILE_MATCH_ABSOLUTE: &str = "http.matchers.file.absolute";

const ENV_PREFIX: &str = "env.";

const SHORTHANDS: &[(&str, &str)] = &[
    ("uri", REQUEST_URI),
    ("path", REQUEST_URI_PATH),
    ("query", REQUEST_URI_QUERY),
    ("method", REQUEST_METHOD),
    ("host", REQUEST_HOST),
    ("orig_uri", ORIGINAL_URI),
    ("orig_path", ORIGINAL_URI_PATH),
    ("vars.root", VARS_ROOT),
    ("file_match.relative", FILE_MATCH_RELATIVE),
    ("file_match.absolute", FILE_MATCH_ABSOLUTE),
];

/// Full key for a configuration shorthand, or `key` itself.
pub fn expand_shorthand(key: &str) -> &str {
    SHORTHANDS
        .iter()
        .find(|(short, _)| *short == key)
        .map_or(key, |(_, full)| full)
}

#[derive(Debug, Clone, Default)]
pub struct Replacer {
    values: HashMap<String, String>,
}

impl Replacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.values
            .insert(key.into(), value.into());
        self
    }

    pub fn delete(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<Cow<'_, str>> {
        let key = expand_shorthand(key);

        if let Some(value) = self.values.get(key) {
            return Some(Cow::Borrowed(value.as_str()));
        }

        key.strip_prefix(ENV_PREFIX)
            .and_then(|name| std::env::var(name).ok())
            .map(Cow::Owned)
    }

    /// Publishes the placeholders describing the request as it currently is.
    pub fn set_request<B>(&mut self, req: &Request<B>) -> &mut Self {
        let uri = req.uri();

        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| uri.host())
            .unwrap_or_default()
            .to_string();

        self.set(REQUEST_URI, request_uri(uri))
            .set(REQUEST_URI_PATH, uri.path())
            .set(REQUEST_URI_QUERY, uri.query().unwrap_or_default())
            .set(REQUEST_METHOD, req.method().as_str())
            .set(REQUEST_HOST, host)
    }

    /// Publishes the placeholders describing the request before rewrites.
    pub fn set_original_uri(&mut self, uri: &Uri) -> &mut Self {
        self.set(ORIGINAL_URI, request_uri(uri))
            .set(ORIGINAL_URI_PATH, uri.path())
    }

    /// Replaces placeholders with known values, leaving unknown ones as-is.
    ///
    /// A known placeholder whose value is empty is replaced by `empty`.
    pub fn replace_known(&self, input: &str, empty: &str) -> String {
        self.replace(input, empty, true)
    }

    /// Replaces every placeholder; unknown ones become `empty`.
    pub fn replace_all(&self, input: &str, empty: &str) -> String {
        self.replace(input, empty, false)
    }

    fn replace(&self, input: &str, empty: &str, keep_unknown: bool) -> String {
        let bytes = input.as_bytes();
        let mut out = String::with_capacity(input.len());
        let mut pos = 0;

        while let Some(offset) = memchr::memchr(b'{', &bytes[pos..]) {
            let open = pos + offset;

            if open > 0 && bytes[open - 1] == b'\\' {
                out.push_str(&input[pos..open - 1]);
                out.push('{');
                pos = open + 1;
                continue;
            }

            let Some(len) = memchr::memchr(b'}', &bytes[open + 1..]) else {
                break;
            };
            let close = open + 1 + len;
            let key = &input[open + 1..close];

            // "{{a}" keeps the first brace literally
            if key.is_empty() || key.contains('{') {
                out.push_str(&input[pos..=open]);
                pos = open + 1;
                continue;
            }

            out.push_str(&input[pos..open]);

            match self.get(key) {
                Some(value) if value.is_empty() => out.push_str(empty),
                Some(value) => out.push_str(&value),
                None if keep_unknown => out.push_str(&input[open..=close]),
                None => out.push_str(empty),
            }

            pos = close + 1;
        }

        out.push_str(&input[pos..]);
        out
    }
}

/// Path plus query, the way a request line carries it.
pub fn request_uri(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}
