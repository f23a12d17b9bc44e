use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::ServerVars;

/// Everything the engine needs to run one request.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub input: Vec<u8>,
    pub script_path: PathBuf,
    pub document_root: PathBuf,
    pub script_name: String,
    pub path_info: String,
    pub server_vars: ServerVars,
    pub env_vars: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn script(path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: path.into(),
            ..Default::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars
            .insert(key.into(), value.into());
        self
    }

    pub fn input(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.input = bytes.into();
        self
    }

    /// Variable as the script sees it: env entries shadow server variables.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.env_vars
            .get(key)
            .map(String::as_str)
            .or_else(|| self.server_vars.get(key))
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ExecutionContext {{")?;
        writeln!(f, "  script: {}", self.script_path.display())?;
        writeln!(f, "  document_root: {}", self.document_root.display())?;

        if !self.path_info.is_empty() {
            writeln!(f, "  path_info: {}", self.path_info)?;
        }

        let var_count = self.server_vars.len();
        if var_count == 0 {
            writeln!(f, "  server_vars: []")?;
        } else {
            writeln!(f, "  server_vars: [")?;

            let display_count = var_count.min(15);
            for (key, value) in self.server_vars.iter().take(display_count) {
                let escaped_value = escape_control(value);
                let truncated = if escaped_value.chars().count() > 60 {
                    let head: String = escaped_value.chars().take(57).collect();
                    format!("{}...", head)
                } else {
                    escaped_value
                };
                writeln!(f, "    {} = \"{}\"", key, truncated)?;
            }

            if var_count > display_count {
                writeln!(f, "    ... ({} more)", var_count - display_count)?;
            }
            writeln!(f, "  ]")?;
        }

        writeln!(f, "  env: {} entries", self.env_vars.len())?;
        writeln!(f, "  input: {} bytes", self.input.len())?;
        write!(f, "}}")
    }
}

fn escape_control(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_control() && c != '\t' && c != '\n' {
            result.push_str(&format!("\\x{:02x}", c as u32));
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_shadows_server_vars() {
        let mut ctx = ExecutionContext::script("/srv/index.php")
            .env("REQUEST_URI", "/original?x=1");
        ctx.server_vars
            .request_uri("/index.php")
            .query_string("x=1");

        assert_eq!(ctx.var("REQUEST_URI"), Some("/original?x=1"));
        assert_eq!(ctx.var("QUERY_STRING"), Some("x=1"));
        assert_eq!(ctx.var("MISSING"), None);
    }

    #[test]
    fn test_display_truncates_long_values() {
        let mut ctx = ExecutionContext::script("/srv/index.php").input(b"body".to_vec());
        ctx.server_vars
            .set("LONG", "x".repeat(100))
            .set("CTRL", "a\u{1}b");

        let shown = ctx.to_string();

        assert!(shown.contains("script: /srv/index.php"));
        assert!(shown.contains(&format!("LONG = \"{}...\"", "x".repeat(57))));
        assert!(shown.contains("CTRL = \"a\\x01b\""));
        assert!(shown.contains("input: 4 bytes"));
    }
}
