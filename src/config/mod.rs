//! Typed configuration for the PHP app and the per-route PHP handler.
//!
//! Configuration text is read into a [`Directive`] tree, then each directive
//! is unmarshaled into its typed config. Everything here runs once per load,
//! before any request is served with the result.

mod app;
mod module;

pub use app::{AppConfig, WorkerConfig};
pub use module::{ModuleConfig, DEFAULT_SPLIT_PATH, ROOT_PLACEHOLDER};

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::directive::Directive;
use crate::php_server;
use crate::routing::{Handler, MatcherSet, PathMatcher, Route};

/// Default public directory of an embedded app.
pub const DEFAULT_DOCUMENT_ROOT: &str = "public";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("line {line}: wrong argument count or unexpected line ending after '{directive}'")]
    ArgumentCount { directive: String, line: usize },

    #[error("line {line}: invalid value '{value}' for '{directive}': {reason}")]
    InvalidValue {
        directive: String,
        value: String,
        reason: String,
        line: usize,
    },

    #[error("line {line}: unrecognized subdirective '{name}' in '{parent}'")]
    UnknownSubdirective {
        parent: String,
        name: String,
        line: usize,
    },

    #[error("line {line}: unrecognized directive '{name}'")]
    UnknownDirective { name: String, line: usize },

    #[error("line {line}: the \"file\" argument must be specified for 'worker'")]
    MissingWorkerFile { line: usize },

    #[error("line {line}: undefined matcher '{name}'")]
    UndefinedMatcher { name: String, line: usize },

    #[error("line {line}: duplicate matcher definition '{name}'")]
    DuplicateMatcher { name: String, line: usize },

    #[error("line {line}: 'frankenphp' global option specified more than once")]
    DuplicateGlobalOption { line: usize },

    #[error("line {line}: unterminated quoted string")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: unexpected '}}'")]
    UnexpectedBlockClose { line: usize },

    #[error("line {line}: block opened here is never closed")]
    UnclosedBlock { line: usize },

    #[error("line {line}: block opened without a directive")]
    BlockWithoutDirective { line: usize },
}

impl ConfigError {
    pub fn argument_count(directive: &Directive) -> Self {
        Self::ArgumentCount {
            directive: directive.name.clone(),
            line: directive.line,
        }
    }

    pub fn invalid_value(
        directive: &Directive,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            directive: directive.name.clone(),
            value: value.into(),
            reason: reason.into(),
            line: directive.line,
        }
    }

    pub fn unknown_subdirective(parent: &Directive, child: &Directive) -> Self {
        Self::UnknownSubdirective {
            parent: parent.name.clone(),
            name: child.name.clone(),
            line: child.line,
        }
    }
}

/// Load-time inputs that used to live in process globals.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    embedded_app_path: Option<PathBuf>,
    matchers: HashMap<String, MatcherSet>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory an embedded application was extracted to.
    #[must_use]
    pub fn with_embedded_app(mut self, path: impl Into<PathBuf>) -> Self {
        self.embedded_app_path = Some(path.into());
        self
    }

    /// Registers a named matcher that directives can reference as `@name`.
    #[must_use]
    pub fn with_matcher(
        mut self,
        name: impl Into<String>,
        matcher: MatcherSet,
    ) -> Self {
        self.matchers.insert(name.into(), matcher);
        self
    }

    pub fn embedded_app_path(&self) -> Option<&Path> {
        self.embedded_app_path.as_deref()
    }

    pub fn matcher(&self, name: &str) -> Option<&MatcherSet> {
        self.matchers.get(name)
    }

    /// Joins a local relative path under the embedded app, if there is one.
    pub(crate) fn resolve_local(&self, path: &str) -> String {
        match self.embedded_app_path() {
            Some(base) if is_local(path) => join_local(base, path),
            _ => path.to_string(),
        }
    }

    /// Document root used when none was configured, if an embedded app exists.
    pub(crate) fn embedded_document_root(&self) -> Option<String> {
        self.embedded_app_path().map(|base| {
            base.join(DEFAULT_DOCUMENT_ROOT)
                .to_string_lossy()
                .into_owned()
        })
    }

    /// Reads an optional leading matcher token from a directive's arguments.
    ///
    /// `@name` refers to a named matcher, a token starting with `/` is a path
    /// matcher and `*` matches everything. Returns the matcher (if any) and
    /// the number of arguments it consumed.
    pub(crate) fn extract_matcher(
        &self,
        directive: &Directive,
    ) -> Result<(Option<MatcherSet>, usize), ConfigError> {
        let Some(first) = directive.args.first() else {
            return Ok((None, 0));
        };

        if first == "*" {
            return Ok((None, 1));
        }

        if let Some(name) = first.strip_prefix('@') {
            let matcher = self
                .matcher(name)
                .cloned()
                .ok_or_else(|| ConfigError::UndefinedMatcher {
                    name: name.to_string(),
                    line: directive.line,
                })?;
            return Ok((Some(matcher), 1));
        }

        if first.starts_with('/') {
            return Ok((
                Some(MatcherSet::path(PathMatcher::new([first.as_str()]))),
                1,
            ));
        }

        Ok((None, 0))
    }
}

/// Reports whether `path` is relative and stays inside its base directory.
pub fn is_local(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }

    let path = Path::new(path);
    if path.has_root() {
        return false;
    }

    let mut depth: usize = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }

    true
}

/// Joins a path already known to be local, folding `.` and `..` lexically.
fn join_local(base: &Path, path: &str) -> String {
    let mut joined = base.to_path_buf();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::ParentDir => {
                joined.pop();
            }
            _ => {}
        }
    }
    joined.to_string_lossy().into_owned()
}

/// A fully loaded configuration file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<AppConfig>,
    pub routes: Vec<Route>,
}

impl ServerConfig {
    /// Parses configuration text.
    ///
    /// Recognized top-level directives are the `frankenphp` global option,
    /// `@name` matcher definitions, `php_server` and `php`.
    pub fn parse(source: &str, ctx: &ParseContext) -> Result<Self, ConfigError> {
        let directives = Directive::parse_str(source)?;
        Self::from_directives(&directives, ctx)
    }

    pub fn from_directives(
        directives: &[Directive],
        ctx: &ParseContext,
    ) -> Result<Self, ConfigError> {
        let mut ctx = ctx.clone();
        let mut config = ServerConfig::default();

        for directive in directives {
            match directive.name.as_str() {
                "frankenphp" => {
                    if config.app.is_some() {
                        return Err(ConfigError::DuplicateGlobalOption {
                            line: directive.line,
                        });
                    }
                    config.app = Some(AppConfig::from_directive(directive, &ctx)?);
                }

                "php_server" => {
                    let routes = php_server::compile(directive, &ctx)?;
                    config.routes.extend(routes);
                }

                "php" => {
                    let (matcher, consumed) = ctx.extract_matcher(directive)?;
                    if directive.args.len() > consumed {
                        return Err(ConfigError::argument_count(directive));
                    }

                    let mut module = ModuleConfig::from_directive(directive)?;
                    module.provision(&ctx);

                    config.routes.push(Route {
                        matcher,
                        handler: Handler::Dispatch(module),
                    });
                }

                name if name.starts_with('@') => {
                    let name = &name[1..];
                    if ctx.matcher(name).is_some() {
                        return Err(ConfigError::DuplicateMatcher {
                            name: name.to_string(),
                            line: directive.line,
                        });
                    }
                    let matcher = MatcherSet::from_definition(directive)?;
                    ctx = ctx.with_matcher(name, matcher);
                }

                name => {
                    return Err(ConfigError::UnknownDirective {
                        name: name.to_string(),
                        line: directive.line,
                    })
                }
            }
        }

        Ok(config)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
