use super::{print_preview, select_services};
use crate::app::Lid;
use crate::detach::{detach, DetachOutcome, Detached};
use crate::error::{Error, Result};
use crate::output::UserOutput;
use crate::service::Service;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;

enum StartReport {
    AlreadyRunning(u32),
    Detached(Detached),
}

/// Start the named services (all when empty) concurrently, each as a
/// detached supervisor child.
pub async fn run_start(lid: &Lid, names: &[String], out: &dyn UserOutput) -> Result<()> {
    let services = select_services(lid, names, out)?;

    let mut tasks = JoinSet::new();
    for service in services {
        let exe = lid.exe().to_path_buf();
        let forward_args = lid.forward_args().to_vec();
        tasks.spawn(async move {
            let report = start_one(&service, &exe, &forward_args).await;
            (service, report)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (service, report) = match joined {
            Ok(result) => result,
            Err(e) => {
                out.error(&format!("Start task failed: {}", e));
                failed.push("<task>".to_string());
                continue;
            }
        };
        let name = service.name();

        match report {
            Ok(StartReport::AlreadyRunning(pid)) => {
                out.status(&format!("{}: Running with PID {}", name, pid));
            }
            Ok(StartReport::Detached(detached)) => match detached.outcome {
                DetachOutcome::Ready => {
                    out.success(&format!("{}: Running with PID {}", name, service.pid()));
                }
                DetachOutcome::TimedOut => {
                    out.warning(&format!(
                        "{}: no readiness verdict after {:?}, left starting in the background",
                        name,
                        service.config().readiness_check_timeout
                    ));
                    print_preview(&detached.preview, out);
                }
                DetachOutcome::NotReady => {
                    out.error(&format!("{}: readiness check failed", name));
                    print_preview(&detached.preview, out);
                    failed.push(name.to_string());
                }
                DetachOutcome::Exited(code) => {
                    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    out.error(&format!("{}: supervisor exited ({})", name, code));
                    print_preview(&detached.preview, out);
                    failed.push(name.to_string());
                }
            },
            Err(e) => {
                out.error(&format!("{}: {}", name, e));
                failed.push(name.to_string());
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

async fn start_one(service: &Arc<Service>, exe: &Path, forward_args: &[OsString]) -> Result<StartReport> {
    if let Some(pid) = service.running_pid() {
        return Ok(StartReport::AlreadyRunning(pid));
    }

    // Surface command and env-file problems here instead of in the child.
    service.prepare()?;

    detach(service, exe, forward_args)
        .await
        .map(StartReport::Detached)
}
