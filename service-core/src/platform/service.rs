use super::event_log::EventLogSink;
use crate::config::{self, Config};
use crate::identity::ServiceIdentity;
use crate::runtime::{AcceptedControls, ControlCommand, ServiceRuntime, ServiceStatus, StatusReporter};
use crate::sink::{LogSink, ServiceContext};
use crate::task::BackgroundTask;
use crate::{logging, paths};
use anyhow::Context;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use windows::Win32::Foundation::ERROR_FAILED_SERVICE_CONTROLLER_CONNECT;
use windows_service::service::{
  ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus as ScmStatus,
  ServiceType,
};
use windows_service::service_control_handler::{
  self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::service_dispatcher;

const PENDING_WAIT_HINT: Duration = Duration::from_secs(10);

/// Hands the process to the service dispatcher.
///
/// Returns `Ok(true)` once the service has run to completion and `Ok(false)`
/// when the process was not launched by the SCM (a console run).
pub fn start_dispatcher(
  name: &str,
  service_main: extern "system" fn(u32, *mut *mut u16),
) -> anyhow::Result<bool> {
  match service_dispatcher::start(name, service_main) {
    Ok(()) => Ok(true),
    Err(windows_service::Error::Winapi(e))
      if e.raw_os_error() == Some(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT.0 as i32) =>
    {
      Ok(false)
    }
    Err(e) => Err(e).context("failed to determine if we are running in service"),
  }
}

fn command_for(control: ServiceControl) -> ControlCommand {
  match control {
    ServiceControl::Stop => ControlCommand::Stop,
    ServiceControl::Shutdown => ControlCommand::Shutdown,
    ServiceControl::Pause => ControlCommand::Pause,
    ServiceControl::Continue => ControlCommand::Continue,
    ServiceControl::Interrogate => ControlCommand::Interrogate,
    other => ControlCommand::Unrecognized(format!("{other:?}")),
  }
}

fn controls_accepted(accepts: AcceptedControls) -> ServiceControlAccept {
  let mut out = ServiceControlAccept::empty();
  if accepts.stop {
    out |= ServiceControlAccept::STOP;
  }
  if accepts.shutdown {
    out |= ServiceControlAccept::SHUTDOWN;
  }
  if accepts.pause_continue {
    out |= ServiceControlAccept::PAUSE_CONTINUE;
  }
  out
}

/// Builds the status handed to the SCM. Pending states advance `checkpoint`
/// and carry a wait hint; settled states reset it.
fn next_status(
  checkpoint: &mut u32,
  state: ServiceState,
  accepts: ServiceControlAccept,
  exit_code: u32,
) -> ScmStatus {
  let pending = matches!(
    state,
    ServiceState::StartPending
      | ServiceState::StopPending
      | ServiceState::PausePending
      | ServiceState::ContinuePending
  );
  *checkpoint = if pending { *checkpoint + 1 } else { 0 };

  ScmStatus {
    service_type: ServiceType::OWN_PROCESS,
    current_state: state,
    controls_accepted: accepts,
    exit_code: ServiceExitCode::Win32(exit_code),
    checkpoint: *checkpoint,
    wait_hint: if pending { PENDING_WAIT_HINT } else { Duration::default() },
    process_id: None,
  }
}

fn exit_code_for(result: &anyhow::Result<()>) -> u32 {
  if result.is_ok() {
    0
  } else {
    1
  }
}

struct ScmReporter {
  handle: ServiceStatusHandle,
  checkpoint: u32,
}

impl ScmReporter {
  fn set(&mut self, state: ServiceState, accepts: ServiceControlAccept, exit_code: u32) -> anyhow::Result<()> {
    let status = next_status(&mut self.checkpoint, state, accepts, exit_code);
    self
      .handle
      .set_service_status(status)
      .with_context(|| format!("set service status {state:?}"))
  }

  fn stopped(&mut self, exit_code: u32) -> anyhow::Result<()> {
    self.set(ServiceState::Stopped, ServiceControlAccept::empty(), exit_code)
  }
}

impl StatusReporter for ScmReporter {
  fn report(&mut self, status: ServiceStatus) -> anyhow::Result<()> {
    self.set(status.state.into(), controls_accepted(status.accepts), 0)
  }
}

/// Body of the service main function. The control handler is registered
/// first so that any later failure, including config or event log setup, is
/// reported to the SCM as Stopped with a non-zero exit code.
pub fn run_managed(
  identity: ServiceIdentity,
  make_task: impl FnOnce(&Config) -> Box<dyn BackgroundTask>,
) -> anyhow::Result<()> {
  let (tx, rx) = mpsc::channel::<ControlCommand>();
  let handle = service_control_handler::register(identity.system_name, move |control| {
    let command = command_for(control);
    let result = match command {
      ControlCommand::Unrecognized(_) => ServiceControlHandlerResult::NotImplemented,
      _ => ServiceControlHandlerResult::NoError,
    };
    let _ = tx.send(command);
    result
  })
  .context("register service control handler")?;

  let mut reporter = ScmReporter {
    handle,
    checkpoint: 0,
  };
  let result = supervise(identity, &rx, &mut reporter, make_task);
  if let Err(e) = &result {
    tracing::error!(error = ?e, "service exited with error");
  }

  reporter.stopped(exit_code_for(&result))?;
  result
}

fn supervise(
  identity: ServiceIdentity,
  commands: &mpsc::Receiver<ControlCommand>,
  reporter: &mut ScmReporter,
  make_task: impl FnOnce(&Config) -> Box<dyn BackgroundTask>,
) -> anyhow::Result<()> {
  let base = paths::base_dir(&identity);
  let cfg = config::load_or_create_default(&paths::config_path(&base))?;

  logging::init_file_only(
    &paths::logs_dir(&base),
    &cfg.logging.level,
    cfg.logging.retention_days,
  )?;

  let sink: Arc<dyn LogSink> = Arc::new(EventLogSink::open(identity.system_name)?);
  let ctx = ServiceContext::new(identity, sink);

  let task = make_task(&cfg);
  ServiceRuntime::new(ctx, reporter, cfg.runtime.options()).run(commands, task)
}
