use super::Service;
use crate::state::ServiceStatus;
use std::fmt::Display;
use std::sync::atomic::Ordering;

/// What a lifecycle hook may do with the service that called it.
///
/// Hooks get this narrow view instead of the service itself. `restart` only
/// records the request; the supervisor acts on it after `on_exit` returns and
/// `Exited` has been committed.
pub struct ServiceHandle<'a> {
    service: &'a Service,
}

impl<'a> ServiceHandle<'a> {
    pub(crate) fn new(service: &'a Service) -> Self {
        Self { service }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// Write a line through the service logger.
    pub fn log(&self, message: impl Display) {
        self.service.logger().log(message);
    }

    pub fn pid(&self) -> u32 {
        self.service.pid()
    }

    pub fn status(&self) -> ServiceStatus {
        self.service.cached_status()
    }

    /// Ask for a fresh start once the current run has finished.
    pub fn restart(&self) {
        self.service.restart_requested.store(true, Ordering::SeqCst);
    }
}
