//! Host service-manager adapters.
//!
//! On Windows these drive the SCM through `windows-service`, the event log
//! through the registry and `ReportEventW`. Elsewhere every manager
//! operation fails with `ServiceError::Unsupported`.

#[cfg(windows)]
mod event_log;
#[cfg(windows)]
mod scm;
#[cfg(windows)]
mod service;

#[cfg(windows)]
pub use event_log::{EventLogSink, EventLogSources};
#[cfg(windows)]
pub use scm::{Scm, ScmService};
#[cfg(windows)]
pub use service::{run_managed, start_dispatcher};

#[cfg(not(windows))]
mod unsupported;

#[cfg(not(windows))]
pub use unsupported::{EventLogSources, Scm, ScmService};

use crate::error::ServiceError;

/// Connects to the local service manager.
pub fn connect() -> Result<Scm, ServiceError> {
  Scm::connect()
}
