use crate::error::ServiceError;
use crate::manager::{
  ControlSignal, ManagedService, ServiceManager, ServiceSpec, ServiceState,
};
use std::ffi::OsString;
use windows::Win32::Foundation::ERROR_SERVICE_DOES_NOT_EXIST;
use windows_service::service::{
  Service, ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType,
  ServiceState as ScmState, ServiceType,
};
use windows_service::service_manager::{ServiceManager as ScmManager, ServiceManagerAccess};

/// Connection to the local Service Control Manager.
pub struct Scm {
  manager: ScmManager,
}

impl Scm {
  pub fn connect() -> Result<Self, ServiceError> {
    let access = ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE;
    let manager = ScmManager::local_computer(None::<&str>, access)
      .map_err(|e| ServiceError::Connect(Box::new(e)))?;
    Ok(Self { manager })
  }
}

fn service_access() -> ServiceAccess {
  ServiceAccess::QUERY_STATUS
    | ServiceAccess::START
    | ServiceAccess::STOP
    | ServiceAccess::PAUSE_CONTINUE
    | ServiceAccess::CHANGE_CONFIG
    | ServiceAccess::DELETE
}

fn is_missing_service(err: &windows_service::Error) -> bool {
  match err {
    windows_service::Error::Winapi(e) => {
      e.raw_os_error() == Some(ERROR_SERVICE_DOES_NOT_EXIST.0 as i32)
    }
    _ => false,
  }
}

impl ServiceManager for Scm {
  type Service = ScmService;

  fn open(&self, name: &str) -> Result<ScmService, ServiceError> {
    match self.manager.open_service(name, service_access()) {
      Ok(service) => Ok(ScmService {
        name: name.to_string(),
        service,
      }),
      Err(e) if is_missing_service(&e) => Err(ServiceError::NotInstalled(name.to_string())),
      Err(e) => Err(ServiceError::Open {
        name: name.to_string(),
        source: Box::new(e),
      }),
    }
  }

  fn create(&self, spec: &ServiceSpec) -> Result<ScmService, ServiceError> {
    let info = ServiceInfo {
      name: OsString::from(&spec.name),
      display_name: OsString::from(&spec.display_name),
      service_type: ServiceType::OWN_PROCESS,
      start_type: ServiceStartType::AutoStart,
      error_control: ServiceErrorControl::Normal,
      executable_path: spec.binary_path.clone(),
      launch_arguments: spec.launch_arguments.iter().map(OsString::from).collect(),
      dependencies: vec![],
      account_name: None, // LocalSystem
      account_password: None,
    };

    let service = self
      .manager
      .create_service(&info, service_access())
      .map_err(|e| ServiceError::Create {
        name: spec.name.clone(),
        source: Box::new(e),
      })?;

    if let Err(e) = service.set_description(&spec.description) {
      let _ = service.delete();
      return Err(ServiceError::Create {
        name: spec.name.clone(),
        source: Box::new(e),
      });
    }

    Ok(ScmService {
      name: spec.name.clone(),
      service,
    })
  }
}

pub struct ScmService {
  name: String,
  service: Service,
}

impl ManagedService for ScmService {
  fn start(&self, args: &[&str]) -> Result<(), ServiceError> {
    self
      .service
      .start(args)
      .map_err(|e| ServiceError::Start(Box::new(e)))
  }

  fn control(&self, signal: ControlSignal) -> Result<ServiceState, ServiceError> {
    let status = match signal {
      ControlSignal::Stop => self.service.stop(),
      ControlSignal::Pause => self.service.pause(),
      ControlSignal::Continue => self.service.resume(),
    }
    .map_err(|e| ServiceError::Control {
      signal,
      source: Box::new(e),
    })?;
    Ok(status.current_state.into())
  }

  fn query(&self) -> Result<ServiceState, ServiceError> {
    self
      .service
      .query_status()
      .map(|status| status.current_state.into())
      .map_err(|e| ServiceError::Query(Box::new(e)))
  }

  fn delete(&self) -> Result<(), ServiceError> {
    self.service.delete().map_err(|e| ServiceError::Delete {
      name: self.name.clone(),
      source: Box::new(e),
    })
  }
}

impl From<ScmState> for ServiceState {
  fn from(state: ScmState) -> Self {
    match state {
      ScmState::Stopped => Self::Stopped,
      ScmState::StartPending => Self::StartPending,
      ScmState::StopPending => Self::StopPending,
      ScmState::Running => Self::Running,
      ScmState::ContinuePending => Self::ContinuePending,
      ScmState::PausePending => Self::PausePending,
      ScmState::Paused => Self::Paused,
    }
  }
}

impl From<ServiceState> for ScmState {
  fn from(state: ServiceState) -> Self {
    match state {
      ServiceState::Stopped => Self::Stopped,
      ServiceState::StartPending => Self::StartPending,
      ServiceState::StopPending => Self::StopPending,
      ServiceState::Running => Self::Running,
      ServiceState::ContinuePending => Self::ContinuePending,
      ServiceState::PausePending => Self::PausePending,
      ServiceState::Paused => Self::Paused,
    }
  }
}
