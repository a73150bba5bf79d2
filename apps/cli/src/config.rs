//! CLI settings
//!
//! Settings are read from an optional TOML file (`sq2cql.toml` in the working directory unless a
//! path is given) and overridden by `SQ2CQL__`-prefixed environment variables, e.g.
//! `SQ2CQL__LOGGING__LEVEL=debug` or `SQ2CQL__LIBRARY__NAME=Cohort`.

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use sq2cql::LibraryHeader;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "sq2cql.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Header of the generated library
    pub library: LibraryHeader,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the sq2cql crates, overridden by `RUST_LOG`
    pub level: String,
    /// Emit log lines as JSON
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("SQ2CQL")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
