use crate::identity::ServiceIdentity;
use std::sync::Arc;

pub const LIFECYCLE_EVENT_ID: u32 = 1;
pub const TASK_EVENT_ID: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  Info,
  Error,
}

/// Append-only, leveled log destination owned by the running service.
pub trait LogSink: Send + Sync {
  fn write(&self, level: LogLevel, event_id: u32, message: &str);

  fn info(&self, event_id: u32, message: &str) {
    self.write(LogLevel::Info, event_id, message);
  }

  fn error(&self, event_id: u32, message: &str) {
    self.write(LogLevel::Error, event_id, message);
  }
}

/// Sink that only writes through `tracing`. Used by the debug harness and on
/// hosts without an event log.
pub struct TracingSink {
  source: String,
}

impl TracingSink {
  pub fn new(source: &str) -> Self {
    Self {
      source: source.to_string(),
    }
  }
}

impl LogSink for TracingSink {
  fn write(&self, level: LogLevel, event_id: u32, message: &str) {
    match level {
      LogLevel::Info => tracing::info!(source = %self.source, event_id, "{message}"),
      LogLevel::Error => tracing::error!(source = %self.source, event_id, "{message}"),
    }
  }
}

/// Per-run state handed to everything that logs on behalf of the service.
#[derive(Clone)]
pub struct ServiceContext {
  pub identity: ServiceIdentity,
  pub sink: Arc<dyn LogSink>,
}

impl ServiceContext {
  pub fn new(identity: ServiceIdentity, sink: Arc<dyn LogSink>) -> Self {
    Self { identity, sink }
  }

  pub fn name(&self) -> &'static str {
    self.identity.system_name
  }

  pub fn info(&self, message: &str) {
    self.sink.info(LIFECYCLE_EVENT_ID, message);
  }

  pub fn error(&self, message: &str) {
    self.sink.error(LIFECYCLE_EVENT_ID, message);
  }
}
