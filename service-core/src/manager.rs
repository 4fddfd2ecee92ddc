//! Seam between the lifecycle logic and the host's service manager.
//!
//! Registration and control code is written against these traits; the
//! Windows SCM implementation lives in `platform`, and tests drive the same
//! code through in-memory models.

use crate::error::ServiceError;
use crate::identity::{ServiceIdentity, INSTALL_LAUNCH_ARGS};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
  Stopped,
  StartPending,
  StopPending,
  Running,
  ContinuePending,
  PausePending,
  Paused,
}

impl fmt::Display for ServiceState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Stopped => "Stopped",
      Self::StartPending => "StartPending",
      Self::StopPending => "StopPending",
      Self::Running => "Running",
      Self::ContinuePending => "ContinuePending",
      Self::PausePending => "PausePending",
      Self::Paused => "Paused",
    };
    f.write_str(s)
  }
}

/// Signals an administrative client may send to an installed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
  Stop,
  Pause,
  Continue,
}

impl fmt::Display for ControlSignal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::Stop => "stop",
      Self::Pause => "pause",
      Self::Continue => "continue",
    };
    f.write_str(s)
  }
}

/// Everything the service manager records for a new registry entry. Entries
/// are always created auto-start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
  pub name: String,
  pub display_name: String,
  pub description: String,
  pub binary_path: PathBuf,
  pub launch_arguments: Vec<String>,
}

impl ServiceSpec {
  pub fn auto_start(identity: &ServiceIdentity, binary_path: PathBuf) -> Self {
    Self {
      name: identity.system_name.to_string(),
      display_name: identity.display_name.to_string(),
      description: identity.description.to_string(),
      binary_path,
      launch_arguments: INSTALL_LAUNCH_ARGS.iter().map(|a| a.to_string()).collect(),
    }
  }
}

pub trait ServiceManager {
  type Service: ManagedService;

  /// Opens an existing entry. A missing entry must be reported as
  /// `ServiceError::NotInstalled` so callers can tell it apart from access
  /// failures.
  fn open(&self, name: &str) -> Result<Self::Service, ServiceError>;

  fn create(&self, spec: &ServiceSpec) -> Result<Self::Service, ServiceError>;
}

pub trait ManagedService {
  fn start(&self, args: &[&str]) -> Result<(), ServiceError>;

  /// Sends `signal` and returns the state the manager acknowledged with.
  fn control(&self, signal: ControlSignal) -> Result<ServiceState, ServiceError>;

  fn query(&self) -> Result<ServiceState, ServiceError>;

  fn delete(&self) -> Result<(), ServiceError>;
}

/// Event-log source registrations paired with the service entry.
pub trait LogSourceRegistry {
  fn install(&self, source: &str) -> Result<(), ServiceError>;

  fn remove(&self, source: &str) -> Result<(), ServiceError>;
}
