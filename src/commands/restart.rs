use super::{run_start, run_stop};
use crate::app::Lid;
use crate::error::{Error, Result};
use crate::output::UserOutput;

/// `stop` then `start` for the same names. A forced kill during the stop
/// still counts as stopped, so the start runs either way.
pub async fn run_restart(lid: &Lid, names: &[String], out: &dyn UserOutput) -> Result<()> {
    let stopped = run_stop(lid, names, out).await;
    if let Err(e @ Error::ServiceNotFound(_)) = stopped {
        return Err(e);
    }

    let started = run_start(lid, names, out).await;
    stopped.and(started)
}
