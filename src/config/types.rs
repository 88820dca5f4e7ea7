use super::duration::duration_or;
use super::service::{ServiceConfig, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use nix::sys::signal::Signal;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Root of `lid.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Aggregate log file, relative to the executable's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Directory for the per-service process records. Defaults to the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceDecl>,
}

/// One service as declared in `lid.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Format: duration string like "5s", "500ms", "1m"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_shutdown_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_check_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_when: Option<ReadyWhen>,

    /// Signal name such as `SIGINT`, `INT` or `int`. Defaults to SIGTERM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_signal: Option<String>,
}

/// Declarative readiness check on the child's output lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyWhen {
    Contains(String),
    Regex(String),
}

impl ServiceDecl {
    /// Build the runtime configuration, validating every field.
    pub fn to_service_config(&self, name: &str) -> Result<ServiceConfig> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(Error::Config(format!(
                "service '{}': command must name a program",
                name
            )));
        }

        let mut config = ServiceConfig::new(self.command.iter().cloned())
            .graceful_shutdown_timeout(duration_or(
                name,
                "graceful_shutdown_timeout",
                self.graceful_shutdown_timeout.as_deref(),
                DEFAULT_TIMEOUT,
            )?)
            .readiness_check_timeout(duration_or(
                name,
                "readiness_check_timeout",
                self.readiness_check_timeout.as_deref(),
                DEFAULT_TIMEOUT,
            )?);

        config.cwd = self.cwd.clone();
        config.env_file = self.env_file.clone();
        config.env = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if let Some(signal) = &self.exit_signal {
            config.exit_signal = parse_signal(signal).ok_or_else(|| {
                Error::Config(format!(
                    "service '{}': unknown exit_signal '{}'",
                    name, signal
                ))
            })?;
        }

        match &self.ready_when {
            None => {}
            Some(ReadyWhen::Contains(needle)) => {
                config = config.ready_when_contains(needle.clone());
            }
            Some(ReadyWhen::Regex(pattern)) => {
                let re = Regex::new(pattern).map_err(|e| {
                    Error::Config(format!(
                        "service '{}': invalid ready_when regex: {}",
                        name, e
                    ))
                })?;
                config = config.ready_when(move |line| re.is_match(line));
            }
        }

        Ok(config)
    }
}

/// Accepts `SIGTERM`, `TERM` and `term` spellings.
pub fn parse_signal(name: &str) -> Option<Signal> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{}", upper)
    };
    Signal::from_str(&full).ok()
}
