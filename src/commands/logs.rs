use super::select_services;
use crate::app::Lid;
use crate::error::Result;
use crate::output::UserOutput;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Lines of history shown before following.
const TAIL_LINES: &str = "20";

/// Follow the aggregate log with `tail -f`, optionally keeping only the lines
/// of the named services.
pub async fn run_logs(lid: &Lid, names: &[String], out: &dyn UserOutput) -> Result<()> {
    let filter: Vec<String> = if names.is_empty() {
        Vec::new()
    } else {
        select_services(lid, names, out)?
            .iter()
            .map(|s| format!("[{}] ", s.name()))
            .collect()
    };

    let path = lid.log_file();
    if !path.exists() {
        out.warning(&format!("No log file at {} yet", path.display()));
        return Ok(());
    }

    let mut cmd = Command::new("tail");
    cmd.args(["-n", TAIL_LINES, "-f"]).arg(path).stdin(Stdio::null());

    if filter.is_empty() {
        cmd.status().await?;
        return Ok(());
    }

    let mut child = cmd.stdout(Stdio::piped()).spawn()?;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if matches_any(&line, &filter) {
                out.block(&format!("{}\n", line));
            }
        }
    }
    child.wait().await?;
    Ok(())
}

fn matches_any(line: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| line.starts_with(p.as_str()))
}
