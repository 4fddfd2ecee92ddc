use crate::error::ServiceError;
use crate::manager::{
  ControlSignal, LogSourceRegistry, ManagedService, ServiceManager, ServiceSpec, ServiceState,
};

/// Stand-in for the SCM on hosts that have none. It cannot be constructed.
pub enum Scm {}

impl Scm {
  pub fn connect() -> Result<Self, ServiceError> {
    Err(ServiceError::Unsupported)
  }
}

pub enum ScmService {}

impl ServiceManager for Scm {
  type Service = ScmService;

  fn open(&self, _name: &str) -> Result<ScmService, ServiceError> {
    match *self {}
  }

  fn create(&self, _spec: &ServiceSpec) -> Result<ScmService, ServiceError> {
    match *self {}
  }
}

impl ManagedService for ScmService {
  fn start(&self, _args: &[&str]) -> Result<(), ServiceError> {
    match *self {}
  }

  fn control(&self, _signal: ControlSignal) -> Result<ServiceState, ServiceError> {
    match *self {}
  }

  fn query(&self) -> Result<ServiceState, ServiceError> {
    match *self {}
  }

  fn delete(&self) -> Result<(), ServiceError> {
    match *self {}
  }
}

pub struct EventLogSources;

impl LogSourceRegistry for EventLogSources {
  fn install(&self, _source: &str) -> Result<(), ServiceError> {
    Err(ServiceError::Unsupported)
  }

  fn remove(&self, _source: &str) -> Result<(), ServiceError> {
    Err(ServiceError::Unsupported)
  }
}
