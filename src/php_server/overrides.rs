use crate::config::ConfigError;
use crate::directive::Directive;

/// Subdirectives `php_server` handles itself instead of passing them through
/// to the `php` handler.
pub const OVERRIDE_NAMES: [&str; 5] =
    ["root", "split", "index", "try_files", "file_server"];

pub const DEFAULT_INDEX_FILE: &str = "index.php";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexFile {
    Name(String),
    Off,
}

/// Overrides read from a `php_server` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOverrides {
    pub root: Option<String>,
    pub extensions: Vec<String>,
    pub index: IndexFile,
    pub try_files: Vec<String>,
    pub file_server: bool,
}

impl Default for ServerOverrides {
    fn default() -> Self {
        Self {
            root: None,
            extensions: vec![".php".to_string()],
            index: IndexFile::Name(DEFAULT_INDEX_FILE.to_string()),
            try_files: Vec::new(),
            file_server: true,
        }
    }
}

impl ServerOverrides {
    /// Reads the overrides of a `php_server` directive without touching it.
    pub fn extract(directive: &Directive) -> Result<Self, ConfigError> {
        Self::scan(&directive.block, directive.nesting + 1)
    }

    /// Reads overrides among `entries`, considering only those at `nesting`.
    ///
    /// Deeper entries belong to passthrough subdirectives and are never
    /// taken for overrides, even if their names collide.
    pub fn scan(entries: &[Directive], nesting: usize) -> Result<Self, ConfigError> {
        let mut overrides = ServerOverrides::default();

        for entry in entries {
            if !is_override(entry, nesting) {
                continue;
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(
                subdirective = %entry.name,
                args = ?entry.args,
                "php_server override"
            );

            match entry.name.as_str() {
                "root" => {
                    overrides.root = Some(entry.single_arg()?.to_string());
                }

                "split" => {
                    overrides.extensions = entry.required_args()?.to_vec();
                }

                "index" => {
                    overrides.index = match entry.single_arg()? {
                        "off" => IndexFile::Off,
                        name => IndexFile::Name(name.to_string()),
                    };
                }

                "try_files" => {
                    overrides.try_files = entry.required_args()?.to_vec();
                }

                "file_server" => match entry.single_arg()? {
                    "off" => overrides.file_server = false,
                    other => {
                        return Err(ConfigError::invalid_value(
                            entry,
                            other,
                            "only 'off' is accepted",
                        ))
                    }
                },

                _ => {}
            }
        }

        Ok(overrides)
    }
}

/// Whether `entry` is a `php_server` override at the given depth.
pub fn is_override(entry: &Directive, nesting: usize) -> bool {
    entry.nesting == nesting && OVERRIDE_NAMES.contains(&entry.name.as_str())
}
