use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ParseContext};
use crate::directive::Directive;
use crate::replacer::Replacer;

/// Placeholder the host fills with the site's `root` directive.
pub const ROOT_PLACEHOLDER: &str = "{http.vars.root}";

/// Default marker splitting the script name from `PATH_INFO`.
pub const DEFAULT_SPLIT_PATH: &str = ".php";

/// Settings of one PHP dispatch route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Site root. May hold placeholders resolved per request.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root: String,

    /// Substrings splitting the URI into the script name and `PATH_INFO`.
    /// The first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub split_path: Vec<String>,

    /// Resolve `root` through a symbolic link, if it is one.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resolve_root_symlink: bool,

    /// Extra environment variables. Values may hold placeholders.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ModuleConfig {
    /// Unmarshals the block of a `php` directive.
    ///
    /// Only the first level of the block is read; the directive's own
    /// arguments (a matcher, if any) are left to the caller.
    pub fn from_directive(directive: &Directive) -> Result<Self, ConfigError> {
        let mut config = ModuleConfig::default();
        config.apply(directive)?;
        Ok(config)
    }

    /// Applies the subdirectives of `directive` on top of this config.
    pub fn apply(&mut self, directive: &Directive) -> Result<(), ConfigError> {
        for entry in directive.entries_at(directive.nesting + 1) {
            match entry.name.as_str() {
                "root" => {
                    self.root = entry.single_arg()?.to_string();
                }

                "split" => {
                    self.split_path = entry.required_args()?.to_vec();
                }

                "env" => {
                    let (key, value) = entry.pair_args()?;
                    self.env
                        .insert(key.to_string(), value.to_string());
                }

                "resolve_root_symlink" => {
                    entry.no_args()?;
                    self.resolve_root_symlink = true;
                }

                _ => {
                    return Err(ConfigError::unknown_subdirective(
                        directive, entry,
                    ))
                }
            }
        }

        Ok(())
    }

    /// Fills in defaults once parsing is done.
    pub fn provision(&mut self, ctx: &ParseContext) {
        if self.root.is_empty() {
            match ctx.embedded_document_root() {
                Some(root) => {
                    self.root = root;
                    self.resolve_root_symlink = false;
                }
                None => self.root = ROOT_PLACEHOLDER.to_string(),
            }
        } else {
            self.root = ctx.resolve_local(&self.root);
        }

        if self.split_path.is_empty() {
            self.split_path = vec![DEFAULT_SPLIT_PATH.to_string()];
        }
    }

    /// Environment handed to the engine for one request.
    ///
    /// `REQUEST_URI` comes from the request as it was received, before any
    /// rewrite; configured values have their placeholders substituted.
    pub fn build_env(
        &self,
        original_uri: &str,
        replacer: &Replacer,
    ) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("REQUEST_URI".to_string(), original_uri.to_string());

        for (key, value) in &self.env {
            env.insert(key.clone(), replacer.replace_known(value, ""));
        }

        env
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<ModuleConfig, ConfigError> {
        let parsed = Directive::parse_str(input).unwrap();
        ModuleConfig::from_directive(&parsed[0])
    }

    #[test]
    fn test_parse_all_subdirectives() {
        let config = parse(
            "php {\n\
                 root /srv/app/public\n\
                 split .php .phtml\n\
                 env APP_ENV prod\n\
                 resolve_root_symlink\n\
             }",
        )
        .unwrap();

        assert_eq!(config.root, "/srv/app/public");
        assert_eq!(config.split_path, [".php", ".phtml"]);
        assert_eq!(config.env.get("APP_ENV").map(String::as_str), Some("prod"));
        assert!(config.resolve_root_symlink);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("php {\n split\n}").unwrap_err(),
            ConfigError::ArgumentCount { ref directive, .. } if directive == "split"
        ));
        assert!(matches!(
            parse("php {\n root\n}").unwrap_err(),
            ConfigError::ArgumentCount { ref directive, .. } if directive == "root"
        ));
        assert!(matches!(
            parse("php {\n resolve_root_symlink yes\n}").unwrap_err(),
            ConfigError::ArgumentCount { ref directive, .. } if directive == "resolve_root_symlink"
        ));
        assert!(matches!(
            parse("php {\n index off\n}").unwrap_err(),
            ConfigError::UnknownSubdirective { ref name, .. } if name == "index"
        ));
    }

    #[test]
    fn test_provision_defaults() {
        let mut config = ModuleConfig::default();
        config.provision(&ParseContext::new());

        assert_eq!(config.root, ROOT_PLACEHOLDER);
        assert_eq!(config.split_path, [".php"]);
    }

    #[test]
    fn test_provision_embedded_app() {
        let ctx = ParseContext::new().with_embedded_app("/tmp/embed");

        let mut config = ModuleConfig {
            resolve_root_symlink: true,
            ..Default::default()
        };
        config.provision(&ctx);
        assert_eq!(config.root, "/tmp/embed/public");
        assert!(!config.resolve_root_symlink);

        let mut config = ModuleConfig {
            root: "web".to_string(),
            ..Default::default()
        };
        config.provision(&ctx);
        assert_eq!(config.root, "/tmp/embed/web");
    }

    #[test]
    fn test_build_env() {
        let mut config = ModuleConfig::default();
        config
            .env
            .insert("SITE".to_string(), "{http.request.host}".to_string());
        config
            .env
            .insert("UNKNOWN".to_string(), "{nope}".to_string());

        let mut replacer = Replacer::new();
        replacer.set("http.request.host", "example.com");

        let env = config.build_env("/blog/?page=2", &replacer);

        assert_eq!(env["REQUEST_URI"], "/blog/?page=2");
        assert_eq!(env["SITE"], "example.com");
        assert_eq!(env["UNKNOWN"], "{nope}");
    }

    #[test]
    fn test_json_shape() {
        let config = ModuleConfig {
            root: "/srv".to_string(),
            split_path: vec![".php".to_string()],
            resolve_root_symlink: true,
            env: BTreeMap::new(),
        };

        assert_eq!(
            config.to_json().unwrap(),
            r#"{"root":"/srv","split_path":[".php"],"resolve_root_symlink":true}"#
        );
    }
}
