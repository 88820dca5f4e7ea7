//! Environment composition for supervised children.
//!
//! A child's environment is built from three layers, later layers winning:
//!
//! 1. the snapshot of the supervisor's own environment ([`Environment`]),
//! 2. the service's dotenv file, if it has one,
//! 3. the service's extra `env` pairs.
//!
//! The dotenv reader is deliberately forgiving: one `KEY=VALUE` per line,
//! surrounding double quotes stripped, anything it cannot make sense of is
//! skipped. Only a file that cannot be read at all is an error.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Immutable snapshot of environment variables.
///
/// Captured once when the registry is built and handed to every service, so
/// nothing inside the supervision engine reads ambient process state.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Arc<BTreeMap<String, String>>,
}

impl Environment {
    /// Snapshot the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self {
            vars: Arc::new(vars),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            vars: Arc::new(vars),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

/// Parse dotenv text. Never fails; malformed lines are dropped.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut vars = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!("Skipping malformed env line: {:?}", line);
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }

        vars.push((key.to_string(), value.to_string()));
    }

    vars
}

/// Read and parse a dotenv file. A missing or unreadable file is an error.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| Error::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_dotenv(&content))
}

/// Merge environment variables with priority.
///
/// Priority order (highest to lowest):
/// 1. inline - the service's extra env pairs
/// 2. from_file - values loaded from the dotenv file
/// 3. base - the environment snapshot
pub fn merge_environment(
    base: &Environment,
    from_file: Vec<(String, String)>,
    inline: &[(String, String)],
) -> BTreeMap<String, String> {
    let mut merged = base.vars().clone();
    merged.extend(from_file);
    merged.extend(inline.iter().cloned());
    merged
}
