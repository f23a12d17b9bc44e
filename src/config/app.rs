use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ParseContext};
use crate::directive::Directive;

/// One pool of long-lived worker scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Path to the worker script.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,

    /// Number of workers to start. Zero lets the engine pick.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub num: usize,

    /// Extra environment variables exposed to the worker.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Process-wide settings of the PHP interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Number of PHP threads. Zero or less means twice the available CPUs.
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub num_threads: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workers: Vec<WorkerConfig>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

fn is_zero_i32(n: &i32) -> bool {
    *n == 0
}

impl AppConfig {
    /// Unmarshals the `frankenphp` global option block.
    pub fn from_directive(
        directive: &Directive,
        ctx: &ParseContext,
    ) -> Result<Self, ConfigError> {
        directive.no_args()?;

        let mut config = AppConfig::default();

        for entry in &directive.block {
            match entry.name.as_str() {
                "num_threads" => {
                    let value = entry.single_arg()?;
                    config.num_threads = parse_int(entry, value)?;
                }

                "worker" => {
                    config
                        .workers
                        .push(WorkerConfig::from_directive(entry, ctx)?);
                }

                _ => {
                    return Err(ConfigError::unknown_subdirective(
                        directive, entry,
                    ))
                }
            }
        }

        Ok(config)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl WorkerConfig {
    /// Unmarshals `worker [<file>] [<num>] { file <path>; num <n>; env <k> <v> }`.
    pub fn from_directive(
        directive: &Directive,
        ctx: &ParseContext,
    ) -> Result<Self, ConfigError> {
        let mut worker = WorkerConfig::default();

        match directive.args.as_slice() {
            [] => {}
            [file] => worker.file_name = file.clone(),
            [file, num] => {
                worker.file_name = file.clone();
                worker.num = parse_count(directive, num)?;
            }
            _ => return Err(ConfigError::argument_count(directive)),
        }

        for entry in &directive.block {
            match entry.name.as_str() {
                "file" => {
                    worker.file_name = entry.single_arg()?.to_string();
                }
                "num" => {
                    worker.num = parse_count(entry, entry.single_arg()?)?;
                }
                "env" => {
                    let (key, value) = entry.pair_args()?;
                    worker
                        .env
                        .insert(key.to_string(), value.to_string());
                }
                _ => {
                    return Err(ConfigError::unknown_subdirective(
                        directive, entry,
                    ))
                }
            }
        }

        if worker.file_name.is_empty() {
            return Err(ConfigError::MissingWorkerFile {
                line: directive.line,
            });
        }

        worker.file_name = ctx.resolve_local(&worker.file_name);

        Ok(worker)
    }
}

fn parse_int(directive: &Directive, value: &str) -> Result<i32, ConfigError> {
    value
        .parse::<i32>()
        .map_err(|e| ConfigError::invalid_value(directive, value, e.to_string()))
}

fn parse_count(directive: &Directive, value: &str) -> Result<usize, ConfigError> {
    value
        .parse::<usize>()
        .map_err(|e| ConfigError::invalid_value(directive, value, e.to_string()))
}
