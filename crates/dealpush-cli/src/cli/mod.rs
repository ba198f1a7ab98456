//! CLI for dealpush.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dealpush_core::config;
use std::path::PathBuf;

use commands::{run_check, run_config, run_derive_id, run_push, PushOverrides};

/// Top-level CLI for dealpush.
#[derive(Debug, Parser)]
#[command(name = "dealpush")]
#[command(about = "dealpush: concurrent, rate-limited bulk upserts of deal records", long_about = None)]
pub struct Cli {
    /// Log to stderr instead of the log file.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Upsert every record in a JSON array file.
    Push {
        /// Path to the records file (JSON array).
        file: PathBuf,

        /// API base URL; records are POSTed to <URL>/deals.
        #[arg(long, env = "GOLDMINE_API_URL", value_name = "URL")]
        api: Option<String>,

        /// API key sent as X-API-Key.
        #[arg(long, env = "API_KEY", hide_env_values = true, value_name = "KEY")]
        api_key: Option<String>,

        /// Per-request HTTP timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Parallel requests.
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Requests per second (0 = unlimited).
        #[arg(long, value_name = "N")]
        rps: Option<u32>,

        /// Keep id=0 records as-is instead of deriving ids from sku/name.
        #[arg(long)]
        no_derive_id: bool,

        /// Cancel the remaining records after this many seconds.
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,
    },

    /// Load and validate a records file without sending anything.
    Check {
        /// Path to the records file (JSON array).
        file: PathBuf,

        /// Do not derive ids for id=0 records before checking duplicates.
        #[arg(long)]
        no_derive_id: bool,
    },

    /// Print the id that would be derived for a sku or name.
    DeriveId {
        /// Stock-keeping code (preferred when non-empty).
        #[arg(long)]
        sku: Option<String>,

        /// Display name.
        #[arg(long, default_value = "")]
        name: String,
    },

    /// Show the config file location and effective values.
    Config,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg.dispatch_options());

        match self.command {
            CliCommand::Push {
                file,
                api,
                api_key,
                timeout,
                concurrency,
                rps,
                no_derive_id,
                deadline,
            } => {
                let overrides = PushOverrides {
                    api,
                    api_key,
                    timeout,
                    concurrency,
                    rps,
                    no_derive_id,
                    deadline,
                };
                run_push(&cfg, &file, overrides).await?;
            }
            CliCommand::Check { file, no_derive_id } => {
                run_check(&file, cfg.derive_ids && !no_derive_id)?
            }
            CliCommand::DeriveId { sku, name } => run_derive_id(sku.as_deref(), &name),
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
