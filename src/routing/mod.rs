//! Routes produced by the directive compiler.
//!
//! # Evaluation
//! ```text
//! routes, in order
//!     → matcher set (absent = always matches)
//!     → Rewrite:        mutate the request, keep going
//!     → Redirect:       respond, stop
//!     → Dispatch:       hand the request to the PHP engine, stop
//!     → StaticFallback: serve a file from the root, stop
//!     → Subroute:       evaluate the inner routes the same way
//! ```
//!
//! The host owns route execution; [`Router`] is the minimal evaluator the
//! crate uses for its own tests and that hosts may reuse.

mod matcher;
mod router;

pub use matcher::{clean_path, join_root, FileMatcher, MatcherSet, PathMatcher};
pub use router::{Outcome, Router};

use serde::Serialize;

use crate::config::ModuleConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matcher: Option<MatcherSet>,

    #[serde(rename = "handle")]
    pub handler: Handler,
}

impl Route {
    pub fn new(matcher: Option<MatcherSet>, handler: Handler) -> Self {
        Self { matcher, handler }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "handler", rename_all = "snake_case")]
pub enum Handler {
    #[serde(rename = "static_response")]
    Redirect(Redirect),

    Rewrite(Rewrite),

    #[serde(rename = "php")]
    Dispatch(ModuleConfig),

    #[serde(rename = "file_server")]
    StaticFallback(FileServer),

    Subroute(Subroute),
}

impl Handler {
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Redirect(_) => "redirect",
            Handler::Rewrite(_) => "rewrite",
            Handler::Dispatch(_) => "dispatch",
            Handler::StaticFallback(_) => "static_fallback",
            Handler::Subroute(_) => "subroute",
        }
    }
}

/// Static redirect response. `location` may hold placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub status_code: u16,
    pub location: String,
}

/// Internal rewrite of the request URI. `uri` may hold placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rewrite {
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileServer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// Ordered routes evaluated as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Subroute {
    pub routes: Vec<Route>,
}
