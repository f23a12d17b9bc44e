use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use http::uri::Scheme;
use http::{Method, Request, Uri};
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::config::ModuleConfig;
use crate::execution::{
    split_pos, ExecutionContext, ExecutionError, ExecutionResult, ServerVars,
};
use crate::interpreter::Engine;
use crate::replacer::{self, request_uri, Replacer};
use crate::routing::{clean_path, join_root};

/// Per-request failure. Scoped to one request; never affects the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RequestError {
    #[error("Cannot resolve document root {}: {source}", .path.display())]
    DocumentRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid rewritten URI '{uri}': {reason}")]
    InvalidRewrite { uri: String, reason: String },

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// State carried along one request while routes are evaluated.
///
/// Holds the URI as it was received, which rewrites never touch, and the
/// replacer matchers publish into.
#[derive(Debug, Clone)]
pub struct RequestScope {
    original_uri: Uri,
    replacer: Replacer,
}

impl RequestScope {
    pub fn new<B>(req: &Request<B>) -> Self {
        let mut replacer = Replacer::new();
        replacer
            .set_request(req)
            .set_original_uri(req.uri());

        Self {
            original_uri: req.uri().clone(),
            replacer,
        }
    }

    /// Sets the site root the host resolves `{http.vars.root}` to.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.replacer
            .set(replacer::VARS_ROOT, root);
        self
    }

    pub fn original_uri(&self) -> &Uri {
        &self.original_uri
    }

    pub fn replacer(&self) -> &Replacer {
        &self.replacer
    }

    pub fn replacer_mut(&mut self) -> &mut Replacer {
        &mut self.replacer
    }
}

/// Builder for the engine-facing side of one request.
#[derive(Debug, Clone)]
pub struct WebRequest {
    https: bool,
    body: Vec<u8>,
    uri: String,
    method: Method,
    server_port: Option<u16>,
    server_name: String,
    server_protocol: String,
    headers: Vec<(String, String)>,
    document_root: Option<PathBuf>,
    resolve_root_symlink: bool,
    split_path: Vec<String>,
    env_vars: BTreeMap<String, String>,
}

impl Default for WebRequest {
    fn default() -> Self {
        Self {
            https: false,
            body: Vec::new(),
            uri: "/".to_string(),
            method: Method::GET,
            server_port: None,
            server_name: "localhost".to_string(),
            server_protocol: "HTTP/1.1".to_string(),
            headers: Vec::new(),
            document_root: None,
            resolve_root_symlink: false,
            split_path: Vec::new(),
            env_vars: BTreeMap::new(),
        }
    }
}

impl WebRequest {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    #[must_use]
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers
            .push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = bytes.into();
        self
    }

    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    #[must_use]
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = Some(port);
        self
    }

    #[must_use]
    pub fn with_server_protocol(mut self, proto: impl Into<String>) -> Self {
        self.server_protocol = proto.into();
        self
    }

    #[must_use]
    pub fn with_https(mut self, enabled: bool) -> Self {
        self.https = enabled;
        self
    }

    #[must_use]
    pub fn with_document_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_root = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_resolve_root_symlink(mut self, enabled: bool) -> Self {
        self.resolve_root_symlink = enabled;
        self
    }

    #[must_use]
    pub fn with_split_path<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.split_path = markers
            .into_iter()
            .map(Into::into)
            .collect();
        self
    }

    #[must_use]
    pub fn with_env(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.env_vars
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_envs<I, K, V>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars.extend(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
        self
    }

    pub fn build(self) -> Result<ExecutionContext, RequestError> {
        let document_root = resolve_document_root(
            self.document_root
                .as_deref()
                .unwrap_or_else(|| Path::new(".")),
            self.resolve_root_symlink,
        )?;

        let (path, query_string) = parse_uri(&self.uri);

        let (script_name, path_info) = match split_pos(path, &self.split_path) {
            Some(pos) => (clean_path(&path[..pos]), path[pos..].to_string()),
            None => (clean_path(path), String::new()),
        };

        let script_filename = join_root(&document_root, &script_name);

        let server_port = self
            .server_port
            .unwrap_or(if self.https { 443 } else { 80 });

        let mut vars = ServerVars::web_defaults();

        vars.request_method(self.method.as_str())
            .request_uri(&self.uri)
            .query_string(query_string.unwrap_or_default())
            .script_filename(&script_filename)
            .script_name(&script_name)
            .document_root(&document_root)
            .server_name(&self.server_name)
            .server_port(server_port)
            .server_protocol(&self.server_protocol)
            .https(self.https);

        if !path_info.is_empty() {
            vars.path_info(&path_info, &document_root);
        }

        let mut has_content_length = false;
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("Content-Length") {
                has_content_length = true;
            }
            vars.http_header(name, value);
        }

        if !has_content_length && !self.body.is_empty() {
            vars.content_length(self.body.len());
        }

        Ok(ExecutionContext {
            input: self.body,
            script_path: script_filename,
            document_root,
            script_name,
            path_info,
            server_vars: vars,
            env_vars: self.env_vars,
        })
    }
}

/// Makes `root` absolute and, if asked, resolves symbolic links in it.
fn resolve_document_root(
    root: &Path,
    resolve_symlink: bool,
) -> Result<PathBuf, RequestError> {
    let failed = |source| RequestError::DocumentRoot {
        path: root.to_path_buf(),
        source,
    };

    let absolute = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(failed)?
            .join(root)
    };

    if resolve_symlink {
        return std::fs::canonicalize(&absolute).map_err(failed);
    }

    Ok(absolute)
}

fn parse_uri(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

fn split_host(host: &str) -> (&str, Option<u16>) {
    match host.rsplit_once(':') {
        Some((name, port)) => match port.parse() {
            Ok(port) => (name, Some(port)),
            Err(_) => (host, None),
        },
        None => (host, None),
    }
}

/// Builds the engine-facing request for `req` as seen by a dispatch route.
///
/// The document root and the configured env values are expanded with the
/// scope's replacer; `REQUEST_URI` in the env comes from the original URI.
pub fn from_http_request<B: AsRef<[u8]>>(
    module: &ModuleConfig,
    req: &Request<B>,
    scope: &RequestScope,
) -> Result<ExecutionContext, RequestError> {
    let replacer = scope.replacer();

    let mut root = replacer.replace_known(&module.root, "");
    if root.is_empty() {
        root.push('.');
    }

    let env = module.build_env(&request_uri(scope.original_uri()), replacer);

    let https = req.uri().scheme() == Some(&Scheme::HTTPS);

    let mut builder = WebRequest::new(req.method().clone())
        .with_uri(request_uri(req.uri()))
        .with_server_protocol(format!("{:?}", req.version()))
        .with_https(https)
        .with_document_root(root)
        .with_resolve_root_symlink(module.resolve_root_symlink)
        .with_split_path(module.split_path.iter().cloned())
        .with_envs(env)
        .with_body(req.body().as_ref().to_vec());

    let host = req
        .headers()
        .get(http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()));

    if let Some(host) = host {
        let (name, port) = split_host(host);
        builder = builder.with_server_name(name);
        if let Some(port) = port {
            builder = builder.with_server_port(port);
        }
    }

    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            builder = builder.with_header(name.as_str(), value);
        }
    }

    builder.build()
}

/// Runs `req` through `engine` with the settings of a dispatch route.
pub fn serve<B, E>(
    module: &ModuleConfig,
    req: &Request<B>,
    scope: &RequestScope,
    engine: &E,
) -> Result<ExecutionResult, RequestError>
where
    B: AsRef<[u8]>,
    E: Engine + ?Sized,
{
    let ctx = from_http_request(module, req, scope)?;

    #[cfg(feature = "tracing")]
    let script = ctx.script_path.clone();

    let result = engine.execute(ctx)?;

    #[cfg(feature = "tracing")]
    debug!(
        script = %script.display(),
        status = result.status,
        "Request dispatched"
    );

    Ok(result)
}
