use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the defaults.
///
/// Controller commands log to stderr. A supervisor child's stdout and stderr
/// end up in a scratch file nobody reads once `start` returns, so it logs to
/// the aggregate log file instead.
pub fn init_tracing(supervisor: bool, log_file: &Path) {
    if supervisor {
        match OpenOptions::new().create(true).append(true).open(log_file) {
            Ok(file) => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(
                        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                    )
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .try_init();
                return;
            }
            Err(e) => eprintln!("Cannot open {}: {}", log_file.display(), e),
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}
