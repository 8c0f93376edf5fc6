use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graphql_client::types::ClientConfig;

pub const SCHEMA_FILE_NAME: &str = "graphql-dispatch.schema.json";
const BUNDLED_SCHEMA: &str = include_str!("../graphql-dispatch.schema.json");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info,graphql_client=debug".to_string()
}

fn default_logging_retention_days() -> usize {
    7
}

fn default_stderr_warn_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    #[default]
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Relative paths resolve against the config file's directory.
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default)]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_stderr_warn_enabled")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: LoggingRotation::default(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: default_stderr_warn_enabled(),
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema = load_schema(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema)?;

        let mut config: Config =
            serde_json::from_value(config_value).context("failed to deserialize config")?;
        if !config.logging.dir.is_absolute() {
            config.logging.dir = config_base.join(&config.logging.dir);
        }

        Ok(config)
    }
}

/// `$schema` from the config, then a schema file next to it, then the copy
/// compiled into the binary.
fn load_schema(config_base: &Path, config_value: &Value) -> Result<Value> {
    let schema_path = match config_value.get("$schema").and_then(Value::as_str) {
        Some(path_text) => Some(config_base.join(path_text)),
        None => Some(config_base.join(SCHEMA_FILE_NAME)).filter(|path| path.exists()),
    };

    let (schema_content, origin) = match schema_path {
        Some(path) => (
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read schema {}", path.display()))?,
            path.display().to_string(),
        ),
        None => (BUNDLED_SCHEMA.to_string(), "bundled schema".to_string()),
    };

    serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", origin))
}

fn validate_against_schema(config_value: &Value, schema: &Value) -> Result<()> {
    let compiled =
        JSONSchema::compile(schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages = validation_errors
                .into_iter()
                .map(|error| format!("{} at '{}'", error, error.instance_path))
                .collect::<Vec<_>>();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
