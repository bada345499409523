use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AuditError, Result};
use crate::models::{Window, DEFAULT_KEY_PREFIX};

/// Lines past the window end tolerated per run before a source is abandoned.
pub const DEFAULT_BEYOND_LIMIT: usize = 5000;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Reconcile received and saved crash reports from collector logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "crash-audit",
    about = "Reconcile received and saved crash reports from collector logs",
    version
)]
pub struct Settings {
    /// Logging level
    #[arg(
        long,
        global = true,
        default_value = "INFO",
        env = "CRASH_AUDIT_LOG_LEVEL",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    pub log_level: String,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, global = true, env = "CRASH_AUDIT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Report rendering.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compare received and saved crashes in a time window
    Logs {
        /// Window start: YYYY-MM-DD[ HH:MM[:SS]]
        start: String,

        /// Window end: YYYY-MM-DD[ HH:MM[:SS]]
        end: String,

        /// Log files or directories (plain or gzip)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Past-the-end lines tolerated before a file is abandoned
        #[arg(long, default_value_t = DEFAULT_BEYOND_LIMIT)]
        beyond_limit: usize,

        /// Also list hosts whose counts match but whose crash ids differ
        #[arg(long)]
        strict_hosts: bool,
    },

    /// Check that crash ids exist in a local mirror of the crash bucket
    Verify {
        /// File with one crash id per line
        #[arg(long)]
        ids: PathBuf,

        /// Root directory of the bucket mirror
        #[arg(long)]
        store_root: PathBuf,

        /// Key prefix inside the bucket
        #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
        key_prefix: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

// ── Validated configuration ────────────────────────────────────────────────────

/// Everything one reconciliation run needs, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub window: Window,
    pub inputs: Vec<PathBuf>,
    pub beyond_limit: usize,
    pub strict_hosts: bool,
    pub format: OutputFormat,
}

impl AuditConfig {
    /// Config with default limits for `window` over `inputs`.
    pub fn new(window: Window, inputs: Vec<PathBuf>) -> Self {
        Self {
            window,
            inputs,
            beyond_limit: DEFAULT_BEYOND_LIMIT,
            strict_hosts: false,
            format: OutputFormat::Text,
        }
    }
}

/// Everything one verification run needs, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyConfig {
    pub ids_file: PathBuf,
    pub store_root: PathBuf,
    pub key_prefix: String,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandConfig {
    Logs(AuditConfig),
    Verify(VerifyConfig),
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Log level after applying `--debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }

    /// Validate the selected subcommand into its typed configuration.
    ///
    /// Runs before any file is read so that a bad window or a missing input
    /// fails the whole run up front.
    pub fn command_config(&self) -> Result<CommandConfig> {
        match &self.command {
            Command::Logs {
                start,
                end,
                paths,
                format,
                beyond_limit,
                strict_hosts,
            } => {
                let window = Window::new(start, end)?;
                if paths.is_empty() {
                    return Err(AuditError::Config("no log files given".to_string()));
                }
                for path in paths {
                    if !path.exists() {
                        return Err(AuditError::PathNotFound(path.clone()));
                    }
                }
                Ok(CommandConfig::Logs(AuditConfig {
                    window,
                    inputs: paths.clone(),
                    beyond_limit: *beyond_limit,
                    strict_hosts: *strict_hosts,
                    format: *format,
                }))
            }

            Command::Verify {
                ids,
                store_root,
                key_prefix,
                format,
            } => {
                if !ids.is_file() {
                    return Err(AuditError::PathNotFound(ids.clone()));
                }
                if !store_root.is_dir() {
                    return Err(AuditError::Config(format!(
                        "store root {} is not a directory",
                        store_root.display()
                    )));
                }
                Ok(CommandConfig::Verify(VerifyConfig {
                    ids_file: ids.clone(),
                    store_root: store_root.clone(),
                    key_prefix: key_prefix.clone(),
                    format: *format,
                }))
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
