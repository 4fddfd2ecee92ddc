//! In-memory stand-ins for the OS seams, shared by the unit tests.

use crate::error::ServiceError;
use crate::manager::{
  ControlSignal, LogSourceRegistry, ManagedService, ServiceManager, ServiceSpec, ServiceState,
};
use crate::runtime::{ServiceStatus, StatusReporter};
use crate::sink::{LogLevel, LogSink};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct HostState {
  entries: RefCell<HashMap<String, ServiceSpec>>,
  log_sources: RefCell<HashSet<String>>,
  fail_log_install: Cell<bool>,
  fail_log_remove: Cell<bool>,
}

/// A service manager plus event-log registry backed by hash maps.
#[derive(Clone, Default)]
pub struct ModelHost {
  state: Rc<HostState>,
}

impl ModelHost {
  pub fn entries(&self) -> HashMap<String, ServiceSpec> {
    self.state.entries.borrow().clone()
  }

  pub fn has_log_source(&self, name: &str) -> bool {
    self.state.log_sources.borrow().contains(name)
  }

  pub fn fail_log_install(&self, fail: bool) {
    self.state.fail_log_install.set(fail);
  }

  pub fn fail_log_remove(&self, fail: bool) {
    self.state.fail_log_remove.set(fail);
  }
}

pub struct ModelEntry {
  name: String,
  state: Rc<HostState>,
}

impl ServiceManager for ModelHost {
  type Service = ModelEntry;

  fn open(&self, name: &str) -> Result<ModelEntry, ServiceError> {
    if !self.state.entries.borrow().contains_key(name) {
      return Err(ServiceError::NotInstalled(name.to_string()));
    }
    Ok(ModelEntry {
      name: name.to_string(),
      state: self.state.clone(),
    })
  }

  fn create(&self, spec: &ServiceSpec) -> Result<ModelEntry, ServiceError> {
    let mut entries = self.state.entries.borrow_mut();
    if entries.contains_key(&spec.name) {
      return Err(ServiceError::Create {
        name: spec.name.clone(),
        source: "duplicate service name".into(),
      });
    }
    entries.insert(spec.name.clone(), spec.clone());
    Ok(ModelEntry {
      name: spec.name.clone(),
      state: self.state.clone(),
    })
  }
}

impl ManagedService for ModelEntry {
  fn start(&self, _args: &[&str]) -> Result<(), ServiceError> {
    Ok(())
  }

  fn control(&self, _signal: ControlSignal) -> Result<ServiceState, ServiceError> {
    Ok(ServiceState::Stopped)
  }

  fn query(&self) -> Result<ServiceState, ServiceError> {
    Ok(ServiceState::Stopped)
  }

  fn delete(&self) -> Result<(), ServiceError> {
    match self.state.entries.borrow_mut().remove(&self.name) {
      Some(_) => Ok(()),
      None => Err(ServiceError::Delete {
        name: self.name.clone(),
        source: "entry already deleted".into(),
      }),
    }
  }
}

impl LogSourceRegistry for ModelHost {
  fn install(&self, source: &str) -> Result<(), ServiceError> {
    if self.state.fail_log_install.get() {
      return Err(ServiceError::LogSource {
        op: "install",
        name: source.to_string(),
        source: "registry write denied".into(),
      });
    }
    if !self.state.log_sources.borrow_mut().insert(source.to_string()) {
      return Err(ServiceError::LogSource {
        op: "install",
        name: source.to_string(),
        source: "source already exists".into(),
      });
    }
    Ok(())
  }

  fn remove(&self, source: &str) -> Result<(), ServiceError> {
    if self.state.fail_log_remove.get() {
      return Err(ServiceError::LogSource {
        op: "remove",
        name: source.to_string(),
        source: "registry delete denied".into(),
      });
    }
    self.state.log_sources.borrow_mut().remove(source);
    Ok(())
  }
}

/// A service whose status walks through a fixed script of states.
///
/// `control` acknowledges with `acknowledged`; each `query` pops the next
/// scripted state and repeats the last one once the script runs dry.
pub struct ScriptedService {
  acknowledged: ServiceState,
  script: RefCell<VecDeque<ServiceState>>,
  last: Cell<ServiceState>,
  queries: Cell<usize>,
  fail_query_at: Option<usize>,
  pub sent: RefCell<Vec<ControlSignal>>,
  pub started_with: RefCell<Option<Vec<String>>>,
}

impl ScriptedService {
  pub fn new(acknowledged: ServiceState, script: Vec<ServiceState>) -> Self {
    Self {
      acknowledged,
      script: RefCell::new(script.into()),
      last: Cell::new(acknowledged),
      queries: Cell::new(0),
      fail_query_at: None,
      sent: RefCell::new(Vec::new()),
      started_with: RefCell::new(None),
    }
  }

  pub fn failing_query_at(mut self, n: usize) -> Self {
    self.fail_query_at = Some(n);
    self
  }

  pub fn queries(&self) -> usize {
    self.queries.get()
  }
}

impl ManagedService for ScriptedService {
  fn start(&self, args: &[&str]) -> Result<(), ServiceError> {
    *self.started_with.borrow_mut() = Some(args.iter().map(|a| a.to_string()).collect());
    Ok(())
  }

  fn control(&self, signal: ControlSignal) -> Result<ServiceState, ServiceError> {
    self.sent.borrow_mut().push(signal);
    Ok(self.acknowledged)
  }

  fn query(&self) -> Result<ServiceState, ServiceError> {
    let n = self.queries.get() + 1;
    self.queries.set(n);
    if self.fail_query_at == Some(n) {
      return Err(ServiceError::Query("RPC server unavailable".into()));
    }
    if let Some(next) = self.script.borrow_mut().pop_front() {
      self.last.set(next);
    }
    Ok(self.last.get())
  }

  fn delete(&self) -> Result<(), ServiceError> {
    Ok(())
  }
}

/// Collects every status the runtime reports.
#[derive(Clone, Default)]
pub struct RecordingReporter {
  pub reports: Arc<Mutex<Vec<ServiceStatus>>>,
  fail_on: Option<ServiceState>,
}

impl RecordingReporter {
  pub fn failing_on(state: ServiceState) -> Self {
    Self {
      reports: Arc::default(),
      fail_on: Some(state),
    }
  }

  pub fn states(&self) -> Vec<ServiceState> {
    self.reports.lock().unwrap().iter().map(|s| s.state).collect()
  }
}

impl StatusReporter for RecordingReporter {
  fn report(&mut self, status: ServiceStatus) -> anyhow::Result<()> {
    if self.fail_on == Some(status.state) {
      anyhow::bail!("SetServiceStatus rejected {}", status.state);
    }
    self.reports.lock().unwrap().push(status);
    Ok(())
  }
}

/// A sink that keeps entries in memory.
#[derive(Default)]
pub struct RecordingSink {
  pub entries: Mutex<Vec<(LogLevel, u32, String)>>,
}

impl RecordingSink {
  pub fn messages(&self, level: LogLevel) -> Vec<String> {
    self
      .entries
      .lock()
      .unwrap()
      .iter()
      .filter(|(l, _, _)| *l == level)
      .map(|(_, _, m)| m.clone())
      .collect()
  }
}

impl LogSink for RecordingSink {
  fn write(&self, level: LogLevel, event_id: u32, message: &str) {
    self
      .entries
      .lock()
      .unwrap()
      .push((level, event_id, message.to_string()));
  }
}
