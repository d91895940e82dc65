//! CLI argument parser for filekeeper
//!
//! Provides type-safe argument parsing using clap derive.

use crate::gatekeeper::DeletionMode;
use clap::{Parser, Subcommand};

/// CLI arguments for filekeeper
#[derive(Parser, Debug)]
#[command(
    name = "filekeeper",
    version,
    about = "Filesystem statistics and guarded deletion tools for AI agents",
    long_about = "An MCP server exposing directory statistics, time-based file queries,\n\
                  rename/move, and a deletion gatekeeper that requires explicit confirmation\n\
                  and can move targets to the trash instead of erasing them."
)]
pub struct CliArgs {
    /// Subcommand (default: serve)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server on stdio
    Serve,
    /// Initialize configuration file (~/.config/filekeeper/config.toml)
    Init,
    /// Delete one path through the gatekeeper
    Delete {
        /// File or directory to delete
        #[arg(value_name = "PATH")]
        path: String,

        /// Deletion mode
        #[arg(short, long, value_enum, default_value_t = DeletionMode::Recoverable)]
        mode: DeletionMode,

        /// Confirm the deletion (nothing is deleted without it)
        #[arg(short = 'y', long)]
        yes: bool,

        /// Copy the target to the backup directory before deleting it
        #[arg(long)]
        backup: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

impl CliArgs {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("filekeeper").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let args = parse(&[]);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_init_subcommand() {
        assert!(matches!(parse(&["init"]).command, Some(Commands::Init)));
        assert!(matches!(parse(&["serve"]).command, Some(Commands::Serve)));
    }

    #[test]
    fn test_delete_defaults_to_recoverable_unconfirmed() {
        match parse(&["delete", "file.txt"]).command {
            Some(Commands::Delete {
                path,
                mode,
                yes,
                backup,
                json,
            }) => {
                assert_eq!(path, "file.txt");
                assert_eq!(mode, DeletionMode::Recoverable);
                assert!(!yes);
                assert!(!backup);
                assert!(!json);
            }
            other => panic!("Expected Delete, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_all_flags() {
        match parse(&["delete", "-m", "permanent", "-y", "--backup", "--json", "dir"]).command {
            Some(Commands::Delete {
                path,
                mode,
                yes,
                backup,
                json,
            }) => {
                assert_eq!(path, "dir");
                assert_eq!(mode, DeletionMode::Permanent);
                assert!(yes);
                assert!(backup);
                assert!(json);
            }
            other => panic!("Expected Delete, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_rejects_unknown_mode() {
        let result =
            CliArgs::try_parse_from(["filekeeper", "delete", "--mode", "shred", "file.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_delete_requires_path() {
        assert!(CliArgs::try_parse_from(["filekeeper", "delete"]).is_err());
    }
}
