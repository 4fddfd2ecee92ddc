use crate::manager::{ControlSignal, ServiceState};
use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures surfaced by registration and control operations.
///
/// Everything here is fatal for the CLI invocation that produced it. Errors
/// raised inside a running service are logged through the sink instead and
/// never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
  #[error("service {0} already exists")]
  AlreadyExists(String),

  #[error("service {0} is not installed")]
  NotInstalled(String),

  #[error("cannot resolve executable path {path}: {reason}")]
  ExecutablePath { path: PathBuf, reason: String },

  #[error("could not connect to service manager")]
  Connect(#[source] BoxError),

  #[error("could not access service {name}")]
  Open {
    name: String,
    #[source]
    source: BoxError,
  },

  #[error("could not create service {name}")]
  Create {
    name: String,
    #[source]
    source: BoxError,
  },

  #[error("could not delete service {name}")]
  Delete {
    name: String,
    #[source]
    source: BoxError,
  },

  #[error("could not start service")]
  Start(#[source] BoxError),

  #[error("could not send control={signal}")]
  Control {
    signal: ControlSignal,
    #[source]
    source: BoxError,
  },

  #[error("could not retrieve service status")]
  Query(#[source] BoxError),

  #[error("timeout waiting for service to go to state={target} (last observed state={last})")]
  Timeout {
    target: ServiceState,
    last: ServiceState,
  },

  #[error("event log source {op} failed for {name}")]
  LogSource {
    op: &'static str,
    name: String,
    #[source]
    source: BoxError,
  },

  #[error("service manager is only supported on Windows")]
  Unsupported,
}
