use crate::error::ServiceError;
use crate::identity::MANUAL_START_ARGS;
use crate::manager::{ControlSignal, ManagedService, ServiceState};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// A control signal together with the state that proves it took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTarget {
  pub signal: ControlSignal,
  pub state: ServiceState,
  pub timeout: Duration,
}

impl ControlTarget {
  pub fn for_signal(signal: ControlSignal, timeout: Duration) -> Self {
    let state = match signal {
      ControlSignal::Stop => ServiceState::Stopped,
      ControlSignal::Pause => ServiceState::Paused,
      ControlSignal::Continue => ServiceState::Running,
    };
    Self {
      signal,
      state,
      timeout,
    }
  }
}

/// Asks the manager to start the service. Returns once the request is
/// accepted; the service may still be in StartPending.
pub fn start<S: ManagedService>(service: &S) -> Result<(), ServiceError> {
  service.start(&MANUAL_START_ARGS)
}

/// Sends `target.signal` and polls every `poll_interval` until the service
/// reports `target.state` or `target.timeout` elapses.
pub fn control_and_wait<S: ManagedService>(
  service: &S,
  target: &ControlTarget,
  poll_interval: Duration,
) -> Result<ServiceState, ServiceError> {
  let deadline = Instant::now() + target.timeout;
  let mut state = service.control(target.signal)?;
  tracing::debug!(signal = %target.signal, state = %state, "control signal accepted");

  while state != target.state {
    if Instant::now() >= deadline {
      return Err(ServiceError::Timeout {
        target: target.state,
        last: state,
      });
    }
    thread::sleep(poll_interval);
    state = service.query()?;
  }

  Ok(state)
}
