use crate::app::Lid;
use crate::error::Result;
use crate::output::UserOutput;
use crate::service::{process_uptime_secs, ResourceUsage};
use crate::state::ServiceStatus;

/// One line of `lid list`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub name: String,
    pub status: ServiceStatus,
    pub uptime_secs: Option<u64>,
    pub pid: Option<u32>,
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<u64>,
}

/// Snapshot every service, sorted by name. Stale records show as `Stopped`.
pub async fn collect_rows(lid: &Lid) -> Vec<StatusRow> {
    let mut rows = Vec::with_capacity(lid.registry().len());

    for service in lid.registry().iter() {
        let status = service.status();
        let mut row = StatusRow {
            name: service.name().to_string(),
            status,
            uptime_secs: None,
            pid: None,
            cpu_percent: None,
            memory_mb: None,
        };

        if status.is_active() {
            let pid = service.pid();
            let usage = ResourceUsage::query(pid).await;
            row.pid = Some(pid);
            row.uptime_secs = process_uptime_secs(pid);
            row.cpu_percent = usage.cpu_percent;
            row.memory_mb = usage.memory_mb();
        }

        rows.push(row);
    }

    rows
}

/// Render rows as an aligned table with a header line.
pub fn render_table(rows: &[StatusRow]) -> String {
    const HEADERS: [&str; 6] = ["Name", "Status", "Uptime", "PID", "CPU", "Memory"];

    let dash = || "-".to_string();
    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|row| {
            [
                row.name.clone(),
                row.status.to_string(),
                row.uptime_secs.map(|s| format!("{}s", s)).unwrap_or_else(dash),
                row.pid.map(|p| p.to_string()).unwrap_or_else(dash),
                row.cpu_percent
                    .map(|c| format!("{:.1}%", c))
                    .unwrap_or_else(dash),
                row.memory_mb.map(|m| format!("{}MB", m)).unwrap_or_else(dash),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let format_line = |values: &[&str]| {
        let padded: Vec<String> = values
            .iter()
            .zip(widths)
            .map(|(v, w)| format!("{:<w$}", v, w = w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut table = format_line(&HEADERS);
    for row in &cells {
        let values: Vec<&str> = row.iter().map(String::as_str).collect();
        table.push_str(&format_line(&values));
    }
    table
}

pub async fn run_list(lid: &Lid, out: &dyn UserOutput) -> Result<()> {
    if lid.registry().is_empty() {
        out.status("No services registered");
        return Ok(());
    }

    let rows = collect_rows(lid).await;
    out.block(&render_table(&rows));
    Ok(())
}
