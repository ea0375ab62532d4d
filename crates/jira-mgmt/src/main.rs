//! jira-mgmt
//!
//! Agent-facing command-line interface to a Jira instance. Query results are
//! printed to stdout as JSON; diagnostics and logs go to stderr.

use anyhow::Result;
use clap::Parser;
use jira_mgmt::cli::{Cli, Commands, ConfigCommands};
use jira_mgmt::config::{resolve_config_path, TOKEN_ENV};
use jira_mgmt::config_manager::{client_config_from, scope_from, ConfigManager};
use jira_mgmt::errors::{instance_unreachable, ActionableError, BackendError, QueryError};
use jira_mgmt::jira::{JiraClient, OfflineBackend};
use jira_mgmt::output::{serialize_results, write_stdout, ErrorCode, ExitCode, JsonError};
use jira_mgmt::query::{Executor, QuerySchema, ScopeDefaults};
use jira_mgmt::schema::SchemaDocument;
use std::env;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "JIRA_MGMT_LOG";

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Determine exit code from the error's concrete type
fn error_to_exit_code(error: &anyhow::Error) -> ExitCode {
    if let Some(query_error) = error.downcast_ref::<QueryError>() {
        return ErrorCode::to_exit_code(ErrorCode::for_query_error(query_error));
    }
    if let Some(backend_error) = error.downcast_ref::<BackendError>() {
        return match backend_error {
            BackendError::NotFound { .. } => ExitCode::NotFound,
            BackendError::Configuration(_) => ExitCode::GenericError,
            _ => ExitCode::ExternalError,
        };
    }
    ExitCode::GenericError
}

fn error_to_json(error: &anyhow::Error, command: &str) -> JsonError {
    if let Some(query_error) = error.downcast_ref::<QueryError>() {
        JsonError::from_query_error(query_error, command)
    } else if let Some(actionable) = error.downcast_ref::<ActionableError>() {
        JsonError::from_actionable(actionable, command)
    } else {
        let code = match error_to_exit_code(error) {
            ExitCode::ExternalError => ErrorCode::NETWORK_ERROR,
            _ => ErrorCode::INTERNAL_ERROR,
        };
        JsonError::new(code, format!("{:#}", error), command)
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Q { .. } => "q",
        Commands::Schema { .. } => "schema",
        Commands::Config(_) => "config",
        Commands::Version => "version",
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_errors = cli.json_errors;
    let command = command_name(&cli.command);

    let exit_code = match run(cli) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            let json = json_errors
                .then(|| error_to_json(&e, command).to_json_string().ok())
                .flatten();
            match json {
                Some(json) => eprintln!("{}", json),
                None => eprintln!("Error: {:#}", e),
            }
            error_to_exit_code(&e)
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Q { query } => {
            // Parse before touching config so syntax errors need no setup.
            let schema = QuerySchema::new();
            let parsed = schema.parse(&query)?;

            if !schema.needs_backend(&parsed) {
                let executor = Executor::new(&schema, &OfflineBackend, ScopeDefaults::default());
                write_stdout(&serialize_results(&executor.execute(&parsed)?)?)?;
                return Ok(());
            }

            let manager = ConfigManager::new(resolve_config_path(cli.config.as_deref())?);
            let config = manager.load()?;
            let client_config = client_config_from(&config, env::var(TOKEN_ENV).ok())?;
            let base_url = client_config.base_url.clone();
            let mut client = JiraClient::new(client_config)?;
            if config.instance_type.is_none() {
                client.detect_instance_type();
            }

            let scope = scope_from(&config, cli.project.as_deref(), cli.board);
            debug!(?scope, "resolved scope defaults");
            let executor = Executor::new(&schema, &client, scope);

            let results = match executor.execute(&parsed) {
                Ok(results) => results,
                Err(e) => {
                    if let QueryError::Backend(BackendError::Transport(detail)) = e.root() {
                        if !cli.json_errors {
                            eprint!("{}", instance_unreachable(&base_url, detail));
                        }
                    }
                    return Err(e.into());
                }
            };
            write_stdout(&serialize_results(&results)?)?;
        }

        Commands::Schema { json_schema } => {
            let json = if json_schema {
                serde_json::to_string_pretty(&SchemaDocument::json_schema())?
            } else {
                serde_json::to_string_pretty(&SchemaDocument::build(&QuerySchema::new()))?
            };
            write_stdout(format!("{}\n", json).as_bytes())?;
        }

        Commands::Config(config_command) => {
            let manager = ConfigManager::new(resolve_config_path(cli.config.as_deref())?);
            let config = match config_command {
                ConfigCommands::Show => manager.load()?,
                ConfigCommands::SetProject { key } => manager.set_active_project(&key)?,
                ConfigCommands::SetBoard { id } => manager.set_active_board(id)?,
                ConfigCommands::SetInstance {
                    url,
                    email,
                    instance_type,
                    auth_type,
                } => manager.set_instance(
                    &url,
                    email,
                    instance_type.map(Into::into),
                    auth_type.map(Into::into),
                )?,
            };

            let json = serde_json::json!({
                "path": manager.path().display().to_string(),
                "config": config,
                "token_set": env::var(TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()),
            });
            write_stdout(format!("{}\n", serde_json::to_string_pretty(&json)?).as_bytes())?;
        }

        Commands::Version => {
            write_stdout(format!("jira-mgmt {}\n", env!("CARGO_PKG_VERSION")).as_bytes())?;
        }
    }

    Ok(())
}
