//! Serve PHP applications from a short `php_server` directive.
//!
//! This crate compiles configuration directives into an ordered list of
//! routes (trailing-slash redirect, index rewrite, PHP dispatch, static file
//! fallback) and manages the lifecycle of the single PHP interpreter those
//! routes dispatch to, including reinitialization across configuration
//! reloads.
//!
//! # Execution Model
//!
//! Configuration is parsed and compiled once per load, before any request is
//! served with it. The interpreter is process-wide: every load starts a
//! [`PhpApp`] against the same [`InterpreterRegistry`], and a load that finds
//! the interpreter already running shuts it down and initializes it again
//! with its own options.
//!
//! # Example
//!
//! ```no_run
//! use ripht_php_server::{ParseContext, Router, RequestScope, ServerConfig};
//! # use ripht_php_server::{Engine, EngineError, EngineOptions};
//! # use ripht_php_server::{ExecutionContext, ExecutionError, ExecutionResult};
//! # struct Php;
//! # impl Engine for Php {
//! #     fn init(&self, _: &EngineOptions) -> Result<(), EngineError> { Ok(()) }
//! #     fn shutdown(&self) {}
//! #     fn execute(&self, _: ExecutionContext) -> Result<ExecutionResult, ExecutionError> {
//! #         Ok(ExecutionResult::default())
//! #     }
//! # }
//!
//! let config = ServerConfig::parse(
//!     "php_server {\n root /var/www/public\n}",
//!     &ParseContext::new(),
//! )
//! .expect("valid config");
//!
//! let router = Router::new(config.routes);
//!
//! let mut req = http::Request::get("/blog/").body(Vec::new()).expect("request");
//! let mut scope = RequestScope::new(&req);
//!
//! let outcome = router.handle(&mut req, &mut scope, &Php).expect("handled");
//! println!("{:?}", outcome);
//! ```

pub mod adapters;
pub mod config;
pub mod directive;
pub mod execution;
pub mod interpreter;
pub mod php_server;
pub mod replacer;
pub mod routing;

use thiserror::Error;

/// Value of `SERVER_SOFTWARE` handed to scripts.
pub const SERVER_SOFTWARE: &str = concat!("Ripht/", env!("CARGO_PKG_VERSION"));

pub use adapters::{RequestError, RequestScope, WebRequest};

pub use config::{
    AppConfig, ConfigError, ModuleConfig, ParseContext, ServerConfig,
    WorkerConfig,
};

pub use directive::Directive;

pub use execution::{
    ExecutionContext, ExecutionError, ExecutionResult, ServerVars,
};

pub use interpreter::{
    Engine, EngineError, EngineOptions, InterpreterHandle, InterpreterKey,
    InterpreterRegistry, PhpApp, WorkerOptions,
};

pub use replacer::Replacer;

pub use routing::{Handler, MatcherSet, Outcome, Route, Router};

/// Any failure this crate reports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    EngineInit(#[from] EngineError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

pub mod prelude {
    pub use crate::{
        AppConfig, ConfigError, Engine, EngineError, EngineOptions, Error,
        ExecutionContext, ExecutionError, ExecutionResult, Handler,
        InterpreterRegistry, ModuleConfig, Outcome, ParseContext, PhpApp,
        Replacer, RequestError, RequestScope, Route, Router, ServerConfig,
    };
}
