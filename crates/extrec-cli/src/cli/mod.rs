//! CLI for inspecting the extraction status store.
//!
//! Read-only over the durable snapshot plus the retention sweep. Job
//! creation and error reporting belong to the ingestion pipeline; deletion
//! only happens through the purge sweep.

mod commands;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use extrec_core::config;
use extrec_core::status::StatusStore;
use extrec_core::sync::NullSync;

use commands::{run_purge, run_show, run_status};

/// Top-level CLI for the extrec status store.
#[derive(Debug, Parser)]
#[command(name = "extrec")]
#[command(about = "Inspect the catalog-extraction recovery status store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Show all tracked extraction jobs.
    Status,

    /// Show full detail for one job, including its error list.
    Show {
        /// Catalog identifier of the job.
        catalog_id: String,
    },

    /// Remove completed records older than the retention window.
    Purge {
        /// Retention window in days (defaults to the configured value).
        #[arg(long, value_name = "N")]
        days: Option<u64>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = StatusStore::open_default(Arc::new(NullSync))?;

        match cli.command {
            CliCommand::Status => run_status(&store).await?,
            CliCommand::Show { catalog_id } => run_show(&store, &catalog_id).await?,
            CliCommand::Purge { days } => {
                run_purge(&store, days.unwrap_or(cfg.retention_days)).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status() {
        let cli = Cli::try_parse_from(["extrec", "status"]).unwrap();
        assert!(matches!(cli.command, CliCommand::Status));
    }

    #[test]
    fn parses_show_with_id() {
        let cli = Cli::try_parse_from(["extrec", "show", "cat-42"]).unwrap();
        match cli.command {
            CliCommand::Show { catalog_id } => assert_eq!(catalog_id, "cat-42"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_purge_days() {
        let cli = Cli::try_parse_from(["extrec", "purge", "--days", "7"]).unwrap();
        match cli.command {
            CliCommand::Purge { days } => assert_eq!(days, Some(7)),
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["extrec", "purge"]).unwrap();
        assert!(matches!(cli.command, CliCommand::Purge { days: None }));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["extrec", "bogus"]).is_err());
    }
}
