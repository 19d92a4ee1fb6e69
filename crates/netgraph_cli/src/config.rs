use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// netgraph harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the generated model class
    pub class_name: String,

    /// Log level
    pub log_level: String,

    /// Log output format
    pub log_format: LogFormat,

    /// Wrap compile results in the HTTP-style response envelope
    pub envelope: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            class_name: "CustomModel".to_string(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            envelope: false,
        }
    }
}

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "netgraph")]
#[command(about = "Compile node-editor network graphs into PyTorch model source")]
#[command(version)]
pub struct Cli {
    /// Configuration file path (JSON or TOML)
    #[arg(short, long, global = true, env = "NETGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, env = "NETGRAPH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Name of the generated model class
    #[arg(long, global = true, env = "NETGRAPH_CLASS_NAME")]
    pub class_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Compile a graph payload into model source
    Compile {
        /// Payload file, or `-` for stdin
        input: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit the `{statusCode, headers, body}` response envelope
        #[arg(long)]
        envelope: bool,
    },
    /// Compile a payload and report statistics and warnings only
    Check {
        /// Payload file, or `-` for stdin
        input: PathBuf,
    },
    /// Print the JSON Schema of the accepted payload
    Schema,
}

impl Config {
    /// Layer configuration: defaults, then the config file, then CLI flags
    /// and environment variables.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(log_level) = &cli.log_level {
            config.log_level = log_level.clone();
        }
        if let Some(log_format) = cli.log_format {
            config.log_format = log_format;
        }
        if let Some(class_name) = &cli.class_name {
            config.class_name = class_name.clone();
        }
        if let Command::Compile { envelope: true, .. } = cli.command {
            config.envelope = true;
        }

        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_str)
            .or_else(|_| toml::from_str(&config_str))
            .context("Failed to parse config file")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut chars = self.class_name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            anyhow::bail!(
                "class_name '{}' is not a valid Python identifier",
                self.class_name
            );
        }

        if self.log_level.trim().is_empty() {
            anyhow::bail!("log_level must not be empty");
        }

        Ok(())
    }
}
