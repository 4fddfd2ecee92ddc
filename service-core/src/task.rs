//! Extension point for the work a running service carries out.

use crate::sink::{LogSink, TASK_EVENT_ID};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Recurring work hosted by the service runtime. `run` is called once on a
/// dedicated thread when the service enters Running and should return soon
/// after `ctx.shutdown` fires.
pub trait BackgroundTask: Send + 'static {
  fn name(&self) -> &str;

  fn run(self: Box<Self>, ctx: TaskContext) -> anyhow::Result<()>;
}

pub struct TaskContext {
  pub sink: Arc<dyn LogSink>,
  pub shutdown: ShutdownSignal,
}

/// Receiving half of a one-shot cancellation. Dropping the trigger counts as
/// a shutdown request too.
pub struct ShutdownSignal {
  rx: mpsc::Receiver<()>,
}

pub struct ShutdownTrigger {
  tx: mpsc::Sender<()>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
  let (tx, rx) = mpsc::channel();
  (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
  pub fn fire(self) {
    let _ = self.tx.send(());
  }
}

impl ShutdownSignal {
  /// Blocks for up to `timeout`; true when shutdown was requested.
  pub fn wait(&self, timeout: Duration) -> bool {
    match self.rx.recv_timeout(timeout) {
      Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
      Err(RecvTimeoutError::Timeout) => false,
    }
  }
}

/// A launched background task.
pub struct TaskHandle {
  name: String,
  trigger: ShutdownTrigger,
  done_rx: mpsc::Receiver<()>,
}

impl TaskHandle {
  pub fn spawn(task: Box<dyn BackgroundTask>, sink: Arc<dyn LogSink>) -> anyhow::Result<Self> {
    let name = task.name().to_string();
    let (trigger, shutdown) = shutdown_channel();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let ctx = TaskContext {
      sink: sink.clone(),
      shutdown,
    };
    let task_name = name.clone();
    thread::Builder::new()
      .name(format!("task-{name}"))
      .spawn(move || {
        if let Err(e) = task.run(ctx) {
          sink.error(TASK_EVENT_ID, &format!("{task_name} failed: {e:#}"));
        }
        let _ = done_tx.send(());
      })?;

    tracing::info!(task = %name, "background task launched");
    Ok(Self {
      name,
      trigger,
      done_rx,
    })
  }

  /// Fires the shutdown signal without waiting.
  pub fn cancel(self) -> PendingTask {
    self.trigger.fire();
    PendingTask {
      name: self.name,
      done_rx: self.done_rx,
    }
  }
}

/// A task that has been asked to stop.
pub struct PendingTask {
  name: String,
  done_rx: mpsc::Receiver<()>,
}

impl PendingTask {
  /// Waits up to `grace` for the task thread to finish. A panicking task
  /// counts as finished.
  pub fn join_timeout(self, grace: Duration) -> bool {
    match self.done_rx.recv_timeout(grace) {
      Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
      Err(RecvTimeoutError::Timeout) => {
        tracing::warn!(task = %self.name, grace_ms = grace.as_millis() as u64, "background task did not stop in time");
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sink::LogLevel;
  use crate::testing::RecordingSink;

  struct Sleeper;

  impl BackgroundTask for Sleeper {
    fn name(&self) -> &str {
      "sleeper"
    }

    fn run(self: Box<Self>, ctx: TaskContext) -> anyhow::Result<()> {
      while !ctx.shutdown.wait(Duration::from_millis(10)) {}
      ctx.sink.info(TASK_EVENT_ID, "sleeper done");
      Ok(())
    }
  }

  struct Failing;

  impl BackgroundTask for Failing {
    fn name(&self) -> &str {
      "failing"
    }

    fn run(self: Box<Self>, _ctx: TaskContext) -> anyhow::Result<()> {
      anyhow::bail!("upstream unreachable")
    }
  }

  struct Stubborn;

  impl BackgroundTask for Stubborn {
    fn name(&self) -> &str {
      "stubborn"
    }

    fn run(self: Box<Self>, _ctx: TaskContext) -> anyhow::Result<()> {
      thread::sleep(Duration::from_millis(500));
      Ok(())
    }
  }

  #[test]
  fn shutdown_signal_reports_dropped_trigger() {
    let (trigger, signal) = shutdown_channel();
    assert!(!signal.wait(Duration::from_millis(1)));
    drop(trigger);
    assert!(signal.wait(Duration::from_millis(1)));
  }

  #[test]
  fn cancelled_task_acknowledges() {
    let sink = Arc::new(RecordingSink::default());
    let handle = TaskHandle::spawn(Box::new(Sleeper), sink.clone()).unwrap();
    assert!(handle.cancel().join_timeout(Duration::from_secs(2)));
    assert_eq!(sink.messages(LogLevel::Info), vec!["sleeper done".to_string()]);
  }

  #[test]
  fn task_error_goes_to_sink() {
    let sink = Arc::new(RecordingSink::default());
    let handle = TaskHandle::spawn(Box::new(Failing), sink.clone()).unwrap();
    assert!(handle.cancel().join_timeout(Duration::from_secs(2)));
    let errors = sink.messages(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("upstream unreachable"));
  }

  #[test]
  fn join_gives_up_after_grace() {
    let sink = Arc::new(RecordingSink::default());
    let handle = TaskHandle::spawn(Box::new(Stubborn), sink).unwrap();
    assert!(!handle.cancel().join_timeout(Duration::from_millis(20)));
  }
}
