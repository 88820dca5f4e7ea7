//! Service configuration.
//!
//! - `service` - the runtime [`ServiceConfig`] with hooks and readiness check
//! - `types` - the `lid.yaml` document ([`Config`], [`ServiceDecl`])
//! - `parser` - locating and loading `lid.yaml`
//! - `duration` - "5s" style durations
//! - `env_loader` - dotenv reading and environment composition

pub mod env_loader;

mod duration;
mod parser;
mod service;
mod types;

pub use duration::*;
pub use env_loader::Environment;
pub use parser::*;
pub use service::*;
pub use types::*;
