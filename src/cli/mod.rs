//! Command-line interface for the curator engine.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Enrich research documents and search them semantically.
#[derive(Debug, Parser)]
#[command(name = "curator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check embedding and vector store status
    Status,

    /// Create the collection and its payload indexes
    Setup {
        #[arg(long, help = "Drop and rebuild the collection (deletes all points)")]
        recreate: bool,
    },

    /// Check the collection against the configured schema
    Verify,

    /// Semantic search over stored records
    Search(commands::SearchArgs),

    /// Find records similar to an existing one
    Similar(commands::SimilarArgs),

    /// Show a stored record
    Get {
        #[arg(required = true, help = "Vector id")]
        vector_id: String,
    },

    /// Delete stored records
    Delete {
        #[arg(required = true, num_args = 1.., help = "Vector ids")]
        vector_ids: Vec<String>,
    },

    /// Count stored records
    Count,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "curator", "search", "llm agents", "-n", "5", "--source", "paper", "-f", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "llm agents");
                assert_eq!(args.filter.limit, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_config_init_force_alongside_format() {
        let cli =
            Cli::try_parse_from(["curator", "config", "init", "--force", "-f", "json"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Commands::Config(commands::ConfigCommand::Init { force: true })
        ));
    }

    #[test]
    fn test_similar_requires_one_reference() {
        assert!(Cli::try_parse_from(["curator", "similar"]).is_err());
        assert!(
            Cli::try_parse_from(["curator", "similar", "--vector-id", "a", "--source-id", "b"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["curator", "similar", "--source-id", "b"]).is_ok());
    }
}
