//! Controller commands. Each takes the [`Lid`] it runs against and a
//! [`UserOutput`] for everything the user should see.

mod list;
mod logs;
mod restart;
mod spawn;
mod start;
mod stop;

pub use list::{collect_rows, render_table, run_list, StatusRow};
pub use logs::run_logs;
pub use restart::run_restart;
pub use spawn::run_spawn;
pub use start::run_start;
pub use stop::run_stop;

use crate::app::Lid;
use crate::error::{Error, Result};
use crate::output::UserOutput;
use crate::service::Service;
use std::sync::Arc;

/// Resolve the named services (all when `names` is empty). Unknown names are
/// a usage error and nothing runs.
fn select_services(lid: &Lid, names: &[String], out: &dyn UserOutput) -> Result<Vec<Arc<Service>>> {
    let (services, unknown) = lid.registry().select(names);
    if let Some(first) = unknown.first() {
        for name in &unknown {
            out.error(&format!("Unknown service: {}", name));
        }
        return Err(Error::ServiceNotFound(first.clone()));
    }
    Ok(services)
}

/// Print a supervisor output preview, indented under the service line.
fn print_preview(lines: &[String], out: &dyn UserOutput) {
    if lines.is_empty() {
        return;
    }
    let mut block = String::new();
    for line in lines {
        block.push_str("    ");
        block.push_str(line);
        block.push('\n');
    }
    out.block(&block);
}
