mod context;
mod result;
mod server_vars;

pub use context::ExecutionContext;
pub use result::ExecutionResult;
pub use server_vars::ServerVars;

use thiserror::Error;

/// Errors the engine reports while executing one request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    #[error("PHP engine not initialized")]
    NotInitialized,

    #[error("Script not found: {0}")]
    ScriptNotFound(std::path::PathBuf),

    #[error("Script execution failed: {0}")]
    Failed(String),
}

/// Byte offset right after the first split marker found in `path`.
///
/// Markers are tried in order and compared ASCII case-insensitively.
pub fn split_pos(path: &str, markers: &[String]) -> Option<usize> {
    let lower = path.to_ascii_lowercase();

    markers.iter().find_map(|marker| {
        let marker = marker.to_ascii_lowercase();
        if marker.is_empty() {
            return None;
        }
        lower
            .find(&marker)
            .map(|idx| idx + marker.len())
    })
}
