//! Lifecycle of the process-wide PHP interpreter.
//!
//! # Data Flow
//! ```text
//! AppConfig
//!     → EngineOptions (threads resolved, worker paths expanded)
//!     → PhpApp::start
//!         → registry.acquire_or_init(MAIN)
//!             absent:  engine.init(options)
//!             present: engine.shutdown(); engine.init(options)   (reload)
//!     → handle held by the app until it is dropped
//!     → last handle released: engine.shutdown()
//! ```

mod app;
mod registry;

pub use app::PhpApp;
pub use registry::{InterpreterHandle, InterpreterKey, InterpreterRegistry};

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::AppConfig;
use crate::execution::{ExecutionContext, ExecutionError, ExecutionResult};
use crate::replacer::Replacer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("PHP initialization failed: {0}")]
    InitializationFailed(String),

    #[error("PHP engine not initialized")]
    NotInitialized,
}

/// The script execution engine the interpreter manager drives.
///
/// There is one logical engine per process. `init` may be called again after
/// `shutdown`; implementations must not hold two live generations at once.
pub trait Engine: Send + Sync {
    fn init(&self, options: &EngineOptions) -> Result<(), EngineError>;

    fn shutdown(&self);

    fn execute(
        &self,
        ctx: ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    pub file_name: PathBuf,
    pub num: usize,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub num_threads: usize,
    pub workers: Vec<WorkerOptions>,
}

impl EngineOptions {
    /// Resolves the thread count and expands placeholders in worker paths.
    pub fn from_config(config: &AppConfig, replacer: &Replacer) -> Self {
        let num_threads = match usize::try_from(config.num_threads) {
            Ok(n) if n > 0 => n,
            _ => default_num_threads(),
        };

        let workers = config
            .workers
            .iter()
            .map(|w| WorkerOptions {
                file_name: PathBuf::from(replacer.replace_known(&w.file_name, "")),
                num: w.num,
                env: w.env.clone(),
            })
            .collect();

        Self {
            num_threads,
            workers,
        }
    }
}

/// Twice the number of available CPUs.
pub fn default_num_threads() -> usize {
    num_cpus::get() * 2
}
