//! State machine run by a service instance while it is supervised.
//!
//! The runtime reports every state it enters to a [`StatusReporter`] and
//! answers control commands one at a time, in arrival order. The background
//! task runs on its own thread and only shares the log sink with the loop.

use crate::manager::ServiceState;
use crate::sink::ServiceContext;
use crate::task::{BackgroundTask, TaskHandle};
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

/// Requests delivered to a running service by the service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
  Stop,
  Pause,
  Continue,
  Shutdown,
  Interrogate,
  Unrecognized(String),
}

/// What the loop does in response to one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  /// Re-report the current status without changing it.
  Echo,
  Report(ServiceStatus),
  Terminate,
  Ignore,
}

impl ControlCommand {
  pub fn transition(&self) -> Transition {
    match self {
      Self::Interrogate => Transition::Echo,
      Self::Pause => Transition::Report(ServiceStatus::accepting(ServiceState::Paused)),
      Self::Continue => Transition::Report(ServiceStatus::accepting(ServiceState::Running)),
      Self::Stop | Self::Shutdown => Transition::Terminate,
      Self::Unrecognized(_) => Transition::Ignore,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptedControls {
  pub stop: bool,
  pub shutdown: bool,
  pub pause_continue: bool,
}

impl AcceptedControls {
  pub const NONE: Self = Self {
    stop: false,
    shutdown: false,
    pause_continue: false,
  };

  pub const LIFECYCLE: Self = Self {
    stop: true,
    shutdown: true,
    pause_continue: true,
  };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
  pub state: ServiceState,
  pub accepts: AcceptedControls,
}

impl ServiceStatus {
  pub fn pending(state: ServiceState) -> Self {
    Self {
      state,
      accepts: AcceptedControls::NONE,
    }
  }

  pub fn accepting(state: ServiceState) -> Self {
    Self {
      state,
      accepts: AcceptedControls::LIFECYCLE,
    }
  }
}

/// Where status transitions are reported: the SCM status handle for a real
/// service, the console for the debug harness.
pub trait StatusReporter {
  fn report(&mut self, status: ServiceStatus) -> anyhow::Result<()>;
}

impl<R: StatusReporter + ?Sized> StatusReporter for &mut R {
  fn report(&mut self, status: ServiceStatus) -> anyhow::Result<()> {
    (**self).report(status)
  }
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
  pub interrogate_echo_delay: Duration,
  pub task_shutdown_grace: Duration,
}

impl Default for RuntimeOptions {
  fn default() -> Self {
    Self {
      interrogate_echo_delay: Duration::from_millis(100),
      task_shutdown_grace: Duration::from_secs(5),
    }
  }
}

pub struct ServiceRuntime<R: StatusReporter> {
  ctx: ServiceContext,
  reporter: R,
  options: RuntimeOptions,
  current: ServiceStatus,
}

impl<R: StatusReporter> ServiceRuntime<R> {
  pub fn new(ctx: ServiceContext, reporter: R, options: RuntimeOptions) -> Self {
    Self {
      ctx,
      reporter,
      options,
      current: ServiceStatus::pending(ServiceState::Stopped),
    }
  }

  /// Drives the service from StartPending to the final StopPending report.
  ///
  /// Returns after Stop or Shutdown is received (or the command stream
  /// closes). The background task is cancelled before StopPending is
  /// reported and given `task_shutdown_grace` to finish.
  pub fn run(mut self, commands: &Receiver<ControlCommand>, task: Box<dyn BackgroundTask>) -> anyhow::Result<()> {
    let name = self.ctx.name();
    self.ctx.info(&format!("starting {name} service"));

    let result = self.run_inner(commands, task);
    match &result {
      Ok(()) => self.ctx.info(&format!("{name} service stopped")),
      Err(e) => self.ctx.error(&format!("{name} service failed: {e:#}")),
    }
    result
  }

  fn run_inner(&mut self, commands: &Receiver<ControlCommand>, task: Box<dyn BackgroundTask>) -> anyhow::Result<()> {
    self.report(ServiceStatus::pending(ServiceState::StartPending))?;
    self.report(ServiceStatus::accepting(ServiceState::Running))?;
    self.ctx.info("Service running...");

    let handle = match TaskHandle::spawn(task, self.ctx.sink.clone()) {
      Ok(h) => Some(h),
      Err(e) => {
        self.ctx.error(&format!("could not launch background task: {e:#}"));
        None
      }
    };

    let loop_result = self.control_loop(commands);

    let pending = handle.map(TaskHandle::cancel);
    let stop_result = self.report(ServiceStatus::pending(ServiceState::StopPending));
    if let Some(pending) = pending {
      pending.join_timeout(self.options.task_shutdown_grace);
    }

    loop_result.and(stop_result)
  }

  fn control_loop(&mut self, commands: &Receiver<ControlCommand>) -> anyhow::Result<()> {
    for command in commands.iter() {
      tracing::debug!(?command, state = %self.current.state, "control request");
      match command.transition() {
        Transition::Echo => {
          let status = self.current;
          self.report(status)?;
          thread::sleep(self.options.interrogate_echo_delay);
          self.report(status)?;
        }
        Transition::Report(status) => self.report(status)?,
        Transition::Terminate => {
          tracing::info!(?command, "stop requested");
          return Ok(());
        }
        Transition::Ignore => {
          self.ctx.error(&format!("unexpected control request {command:?}"));
        }
      }
    }

    tracing::warn!("control request channel closed; stopping");
    Ok(())
  }

  fn report(&mut self, status: ServiceStatus) -> anyhow::Result<()> {
    self.reporter.report(status)?;
    self.current = status;
    tracing::debug!(state = %status.state, "status reported");
    Ok(())
  }
}
