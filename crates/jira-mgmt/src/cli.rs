//! Command-line interface definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::jira::{AuthType, InstanceType};

/// Agent-facing query interface to a Jira instance
///
/// Reads issues through a compact query language and prints JSON.
///
/// Exit Codes:
///   0  - Command succeeded
///   1  - Generic error occurred
///   2  - Query syntax error or invalid usage
///   3  - Issue, project or board not found
///   4  - Invalid or missing operation argument
///  10  - Tracking service unreachable or returned an error
#[derive(Parser, Debug)]
#[command(name = "jira-mgmt")]
#[command(about = "Agent-facing Jira query tool", long_about = None)]
pub struct Cli {
    /// Project to use when a query names none (overrides config)
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Board ID to use when a query names none (overrides config)
    #[arg(long, global = true)]
    pub board: Option<u64>,

    /// Path to the config file
    #[arg(long, global = true, env = "JIRA_MGMT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print errors as a JSON envelope on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a query
    ///
    /// Operations:
    ///   get(ISSUE-KEY) { fields }             single issue lookup
    ///   list(project=X, type=epic) { fields } filtered listing
    ///   count(status=done)                    number of matching issues
    ///   summary()                             project/board overview
    ///   search(jql="...") { fields }          JQL search
    ///   schema()                              language description
    ///
    /// Field presets: minimal, default, overview, full.
    /// Batch: separate statements with semicolons.
    ///
    /// Examples:
    ///   jira-mgmt q 'get(PROJ-123) { overview }'
    ///   jira-mgmt q 'list(project=PROJ, sort_key=desc, take=5) { minimal }'
    ///   jira-mgmt q 'get(PROJ-1) { minimal }; get(PROJ-2) { minimal }'
    Q {
        /// Query text
        query: String,
    },

    /// Print the query language description
    Schema {
        /// Print the JSON Schema of the description instead
        #[arg(long)]
        json_schema: bool,
    },

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Print version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the active configuration
    Show,

    /// Set the default project
    SetProject {
        /// Project key
        key: String,
    },

    /// Set the default board
    SetBoard {
        /// Board ID
        id: u64,
    },

    /// Set the instance URL and authentication
    SetInstance {
        /// Base URL, e.g. https://example.atlassian.net
        url: String,

        /// Account email (enables basic auth)
        #[arg(long)]
        email: Option<String>,

        /// Deployment type (detected when omitted)
        #[arg(long, value_enum)]
        instance_type: Option<InstanceTypeArg>,

        /// Authentication scheme (inferred from --email when omitted)
        #[arg(long, value_enum)]
        auth_type: Option<AuthTypeArg>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceTypeArg {
    Cloud,
    Server,
}

impl From<InstanceTypeArg> for InstanceType {
    fn from(arg: InstanceTypeArg) -> Self {
        match arg {
            InstanceTypeArg::Cloud => InstanceType::Cloud,
            InstanceTypeArg::Server => InstanceType::Server,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthTypeArg {
    Basic,
    Bearer,
}

impl From<AuthTypeArg> for AuthType {
    fn from(arg: AuthTypeArg) -> Self {
        match arg {
            AuthTypeArg::Basic => AuthType::Basic,
            AuthTypeArg::Bearer => AuthType::Bearer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_with_global_flags() {
        let cli = Cli::try_parse_from([
            "jira-mgmt",
            "q",
            "list()",
            "--project",
            "PROJ",
            "--board",
            "4",
            "--json-errors",
        ])
        .unwrap();

        assert_eq!(cli.project.as_deref(), Some("PROJ"));
        assert_eq!(cli.board, Some(4));
        assert!(cli.json_errors);
        assert!(matches!(cli.command, Commands::Q { ref query } if query == "list()"));
    }

    #[test]
    fn test_parse_set_instance() {
        let cli = Cli::try_parse_from([
            "jira-mgmt",
            "config",
            "set-instance",
            "https://jira.example.com",
            "--instance-type",
            "server",
            "--auth-type",
            "bearer",
        ])
        .unwrap();

        match cli.command {
            Commands::Config(ConfigCommands::SetInstance {
                instance_type,
                auth_type,
                ..
            }) => {
                assert_eq!(instance_type, Some(InstanceTypeArg::Server));
                assert_eq!(auth_type, Some(AuthTypeArg::Bearer));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
