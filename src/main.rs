//! filekeeper: filesystem statistics and guarded deletion for AI agents
//!
//! Runs the MCP server on stdio by default. Logs go to stderr.

use std::process::ExitCode;

use filekeeper::cli::{CliArgs, Commands};
use filekeeper::config::Config;
use filekeeper::gatekeeper::{DeletionRequest, DeletionResult, Gatekeeper};
use filekeeper::init::{config_path_display, run_init};
use filekeeper::server::run_server;
use filekeeper::stats::format_file_size;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    init_logging();
    let args = CliArgs::parse_args();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => match serve() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("filekeeper: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Init => match run_init() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("filekeeper: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Delete {
            path,
            mode,
            yes,
            backup,
            json,
        } => delete(DeletionRequest::new(path, mode, yes).with_backup(backup), json),
    }
}

/// stdout carries the MCP stream, so logs must stay on stderr
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("filekeeper=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn serve() -> anyhow::Result<()> {
    tracing::info!(config = %config_path_display(), "loading configuration");
    let config = Config::load();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_server(config))
}

/// One-shot deletion from the command line
fn delete(request: DeletionRequest, json: bool) -> ExitCode {
    let gatekeeper = Gatekeeper::new(Config::load());

    match gatekeeper.delete(&request) {
        Ok(outcome) => {
            if json {
                let result = DeletionResult::from_outcome(&request, Ok(outcome.clone()));
                print_json(&result);
            } else if let Some(trash) = &outcome.trash_path {
                println!(
                    "trashed: {} -> {}",
                    outcome.resolved_path.display(),
                    trash.display()
                );
            } else {
                println!(
                    "removed: {} ({} item(s), {} freed)",
                    outcome.resolved_path.display(),
                    outcome.item_count,
                    format_file_size(outcome.space_freed)
                );
            }
            if let Some(backup) = &outcome.backup_path {
                println!("backup: {}", backup.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            if json {
                let result = DeletionResult::from_outcome(&request, Err(e));
                print_json(&result);
            } else {
                eprintln!("filekeeper: {}", e.user_message());
            }
            code.into()
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("filekeeper: cannot serialize result: {}", e),
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_version_available() {
        let version = env!("CARGO_PKG_VERSION");
        assert!(version.contains('.'), "Version should be in semver format");
    }
}
