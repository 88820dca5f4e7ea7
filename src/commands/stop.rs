use super::select_services;
use crate::app::Lid;
use crate::error::{Error, Result};
use crate::output::UserOutput;
use crate::service::StopOutcome;
use tokio::task::JoinSet;

/// Stop the named services (all when empty) concurrently.
pub async fn run_stop(lid: &Lid, names: &[String], out: &dyn UserOutput) -> Result<()> {
    let services = select_services(lid, names, out)?;

    let mut tasks = JoinSet::new();
    for service in services {
        tasks.spawn(async move {
            let outcome = service.stop().await;
            (service.name().to_string(), outcome)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(StopOutcome::Stopped))) => out.success(&format!("{}: Stopped", name)),
            Ok((name, Ok(StopOutcome::AlreadyDown))) => {
                out.status(&format!("{}: service already down", name))
            }
            Ok((name, Err(e @ Error::ShutdownTimeout { .. }))) => {
                out.warning(&format!("{}: {}", name, e));
                failed.push(name);
            }
            Ok((name, Err(e))) => {
                out.error(&format!("{}: {}", name, e));
                failed.push(name);
            }
            Err(e) => {
                out.error(&format!("Stop task failed: {}", e));
                failed.push("<task>".to_string());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        failed.sort();
        Err(Error::CommandFailed(failed))
    }
}
