use crate::app::Lid;
use crate::error::Result;

/// Supervisor-child entry point: run one service in the foreground until it
/// exits. Interrupting it stops the service first.
pub async fn run_spawn(lid: &Lid, name: &str) -> Result<()> {
    let service = lid.registry().lookup(name)?.clone();
    tracing::debug!(
        "Supervising '{}' as PID {}, record at {:?}",
        name,
        std::process::id(),
        service.record_location()
    );

    tokio::select! {
        result = service.start() => result,
        _ = tokio::signal::ctrl_c() => {
            service.logger().log("Interrupted");
            service.stop().await.map(|_| ())
        }
    }
}
