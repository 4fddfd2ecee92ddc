use crate::error::ServiceError;
use crate::manager::LogSourceRegistry;
use crate::sink::{LogLevel, LogSink};
use anyhow::Context;
use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{HANDLE, PSID};
use windows::Win32::System::EventLog::{
  DeregisterEventSource, RegisterEventSourceW, ReportEventW, EVENTLOG_ERROR_TYPE,
  EVENTLOG_INFORMATION_TYPE,
};
use windows_registry::{Key, LOCAL_MACHINE};

const APPLICATION_LOG_KEY: &str = r"SYSTEM\CurrentControlSet\Services\EventLog\Application";

// Error | Warning | Information
const TYPES_SUPPORTED: u32 = 0x1 | 0x2 | 0x4;

fn source_key(source: &str) -> String {
  format!(r"{APPLICATION_LOG_KEY}\{source}")
}

/// EventCreate.exe carries a generic message table, so any event id renders
/// as its raw string.
fn message_file() -> String {
  let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
  format!(r"{root}\System32\EventCreate.exe")
}

fn source_error<'a, E>(op: &'static str, name: &'a str) -> impl FnOnce(E) -> ServiceError + 'a
where
  E: std::error::Error + Send + Sync + 'static,
{
  move |e| ServiceError::LogSource {
    op,
    name: name.to_string(),
    source: Box::new(e),
  }
}

fn write_source_values(key: &Key, source: &str) -> Result<(), ServiceError> {
  key
    .set_string("EventMessageFile", message_file())
    .map_err(source_error("install", source))?;
  key
    .set_u32("TypesSupported", TYPES_SUPPORTED)
    .map_err(source_error("install", source))?;
  key
    .set_u32("CustomSource", 1)
    .map_err(source_error("install", source))
}

/// Creates `path` under `root` and fills it with `write`. A key that cannot
/// be fully written is removed again, so a later install starts clean.
fn install_source<F>(root: &Key, path: &str, source: &str, write: F) -> Result<(), ServiceError>
where
  F: FnOnce(&Key, &str) -> Result<(), ServiceError>,
{
  if root.open(path).is_ok() {
    return Err(ServiceError::LogSource {
      op: "install",
      name: source.to_string(),
      source: format!("event source {source} already exists").into(),
    });
  }

  let key = root.create(path).map_err(source_error("install", source))?;
  if let Err(e) = write(&key, source) {
    drop(key);
    if let Err(cleanup) = root.remove_tree(path) {
      tracing::error!(source, error = %cleanup, "could not remove partial event source key");
    }
    return Err(e);
  }
  Ok(())
}

fn remove_source(root: &Key, path: &str, source: &str) -> Result<(), ServiceError> {
  root.remove_tree(path).map_err(source_error("remove", source))
}

/// Application event-log sources, registered under HKLM.
pub struct EventLogSources;

impl LogSourceRegistry for EventLogSources {
  fn install(&self, source: &str) -> Result<(), ServiceError> {
    install_source(LOCAL_MACHINE, &source_key(source), source, write_source_values)?;
    tracing::debug!(source, "event log source registered");
    Ok(())
  }

  fn remove(&self, source: &str) -> Result<(), ServiceError> {
    remove_source(LOCAL_MACHINE, &source_key(source), source)?;
    tracing::debug!(source, "event log source removed");
    Ok(())
  }
}

/// Writes to the Application event log under the service's source and
/// mirrors every record to the file log.
pub struct EventLogSink {
  source: String,
  handle: HANDLE,
}

impl EventLogSink {
  pub fn open(source: &str) -> anyhow::Result<Self> {
    let name = HSTRING::from(source);
    let handle = unsafe { RegisterEventSourceW(PCWSTR::null(), &name) }
      .with_context(|| format!("open event log source {source}"))?;
    Ok(Self {
      source: source.to_string(),
      handle,
    })
  }
}

impl LogSink for EventLogSink {
  fn write(&self, level: LogLevel, event_id: u32, message: &str) {
    let kind = match level {
      LogLevel::Info => {
        tracing::info!(source = %self.source, event_id, "{message}");
        EVENTLOG_INFORMATION_TYPE
      }
      LogLevel::Error => {
        tracing::error!(source = %self.source, event_id, "{message}");
        EVENTLOG_ERROR_TYPE
      }
    };

    let text = HSTRING::from(message);
    let strings = [PCWSTR(text.as_ptr())];
    let res = unsafe {
      ReportEventW(
        self.handle,
        kind,
        0,
        event_id,
        PSID::default(),
        0,
        Some(&strings),
        None,
      )
    };
    if let Err(e) = res {
      tracing::warn!(source = %self.source, event_id, error = %e, "event log write failed");
    }
  }
}

impl Drop for EventLogSink {
  fn drop(&mut self) {
    let _ = unsafe { DeregisterEventSource(self.handle) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use windows_registry::CURRENT_USER;

  fn scratch_path(tag: &str) -> String {
    format!(r"Software\svc-rnd-qt-tests\{tag}-{}", std::process::id())
  }

  #[test]
  fn failed_value_write_removes_the_partial_key() {
    let path = scratch_path("rollback");
    let err = install_source(CURRENT_USER, &path, "TestSource", |key, source| {
      key.set_u32("TypesSupported", 1).map_err(source_error("install", source))?;
      Err(ServiceError::LogSource {
        op: "install",
        name: source.to_string(),
        source: "access denied".into(),
      })
    })
    .unwrap_err();

    assert!(matches!(err, ServiceError::LogSource { op: "install", .. }));
    assert!(CURRENT_USER.open(&path).is_err());

    install_source(CURRENT_USER, &path, "TestSource", write_source_values).unwrap();
    let key = CURRENT_USER.open(&path).unwrap();
    assert_eq!(key.get_u32("TypesSupported").unwrap(), TYPES_SUPPORTED);
    assert_eq!(key.get_u32("CustomSource").unwrap(), 1);
    assert!(key.get_string("EventMessageFile").unwrap().ends_with("EventCreate.exe"));
    drop(key);

    remove_source(CURRENT_USER, &path, "TestSource").unwrap();
    assert!(CURRENT_USER.open(&path).is_err());
  }

  #[test]
  fn existing_source_is_rejected_untouched() {
    let path = scratch_path("existing");
    install_source(CURRENT_USER, &path, "TestSource", write_source_values).unwrap();

    let err = install_source(CURRENT_USER, &path, "TestSource", write_source_values).unwrap_err();
    assert!(err.to_string().contains("TestSource"));
    assert!(CURRENT_USER.open(&path).is_ok());

    remove_source(CURRENT_USER, &path, "TestSource").unwrap();
  }

  #[test]
  fn removing_a_missing_source_fails() {
    let path = scratch_path("missing");
    assert!(matches!(
      remove_source(CURRENT_USER, &path, "TestSource"),
      Err(ServiceError::LogSource { op: "remove", .. })
    ));
  }
}
