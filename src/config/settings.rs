use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::template::{UnknownChannelPolicy, UnresolvedPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderConfig {
    /// What an unresolved `{{path}}` renders as
    #[serde(default)]
    pub unresolved: UnresolvedPolicy,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// How stored records with an unrecognised `type` are loaded
    #[serde(default)]
    pub unknown_channel: UnknownChannelPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Recipients compiled per blocking task
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Chunks compiled at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_chunk_size() -> usize {
    256
}

fn default_max_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("render.unresolved", "empty")?
            .set_default("templates.unknown_channel", "reject")?
            .set_default("batch.chunk_size", default_chunk_size() as i64)?
            .set_default("batch.max_concurrency", default_max_concurrency() as i64)?
            .set_default("logging.format", "pretty")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // RENDER__UNRESOLVED, TEMPLATES__UNKNOWN_CHANNEL, BATCH__CHUNK_SIZE, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}
