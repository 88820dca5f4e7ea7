use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lid")]
#[command(about = "lid - run, watch and stop a catalog of services")]
#[command(version)]
pub struct Cli {
    /// Service file (defaults to lid.yaml next to the executable)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Lists the status of all services
    #[command(alias = "ls")]
    List,
    /// Starts services in the background (all when none are named)
    Start {
        /// Services to start
        services: Vec<String>,
    },
    /// Stops services (all when none are named)
    Stop {
        /// Services to stop
        services: Vec<String>,
    },
    /// Stops then starts services (all when none are named)
    Restart {
        /// Services to restart
        services: Vec<String>,
    },
    /// Follows the aggregate log
    Logs {
        /// Only show lines from these services
        services: Vec<String>,
    },
    /// Runs one service in the foreground. Used by `start`; handy for debugging
    Spawn {
        /// Service to run
        service: String,
        /// Set by `start`: stdout is a scratch file only read for the readiness verdict
        #[arg(long, hide = true)]
        detached: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ls_alias() {
        let cli = Cli::try_parse_from(["lid", "ls"]).unwrap();
        assert_eq!(cli.command, Commands::List);
    }

    #[test]
    fn test_start_names_and_global_config() {
        let cli = Cli::try_parse_from(["lid", "start", "api", "web", "--config", "x.yaml"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Start {
                services: vec!["api".to_string(), "web".to_string()]
            }
        );
        assert_eq!(cli.config, Some(PathBuf::from("x.yaml")));
    }

    #[test]
    fn test_spawn_requires_exactly_one_name() {
        assert!(Cli::try_parse_from(["lid", "spawn"]).is_err());
        assert!(Cli::try_parse_from(["lid", "spawn", "a", "b"]).is_err());
    }

    #[test]
    fn test_spawn_detached_flag() {
        let cli = Cli::try_parse_from(["lid", "spawn", "--detached", "api"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Spawn {
                service: "api".to_string(),
                detached: true
            }
        );

        let cli = Cli::try_parse_from(["lid", "spawn", "api"]).unwrap();
        assert!(matches!(cli.command, Commands::Spawn { detached: false, .. }));
    }

    #[test]
    fn test_command_is_required_and_case_sensitive() {
        assert!(Cli::try_parse_from(["lid"]).is_err());
        assert!(Cli::try_parse_from(["lid", "LIST"]).is_err());
    }
}
