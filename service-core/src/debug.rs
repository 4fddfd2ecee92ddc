//! Runs the service state machine in the foreground, without the SCM.
//!
//! Ctrl+C sends Stop. Control requests can also be typed on stdin, one per
//! line: stop, shutdown, pause, continue, interrogate.

use crate::identity::ServiceIdentity;
use crate::runtime::{ControlCommand, RuntimeOptions, ServiceRuntime, ServiceStatus, StatusReporter};
use crate::sink::{LogSink, ServiceContext, TracingSink};
use crate::task::BackgroundTask;
use anyhow::Context;
use std::io::BufRead;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

/// Reports status transitions to the log instead of a service manager.
pub struct ConsoleReporter;

impl StatusReporter for ConsoleReporter {
  fn report(&mut self, status: ServiceStatus) -> anyhow::Result<()> {
    tracing::info!(state = %status.state, accepts = ?status.accepts, "status");
    Ok(())
  }
}

/// Maps a console line to a control request. Blank lines are skipped.
pub fn parse_console_command(line: &str) -> Option<ControlCommand> {
  let word = line.trim();
  if word.is_empty() {
    return None;
  }
  let cmd = match word.to_ascii_lowercase().as_str() {
    "stop" => ControlCommand::Stop,
    "shutdown" => ControlCommand::Shutdown,
    "pause" => ControlCommand::Pause,
    "continue" => ControlCommand::Continue,
    "interrogate" => ControlCommand::Interrogate,
    _ => ControlCommand::Unrecognized(word.to_string()),
  };
  Some(cmd)
}

pub fn run(
  identity: ServiceIdentity,
  options: RuntimeOptions,
  task: Box<dyn BackgroundTask>,
) -> anyhow::Result<()> {
  let sink: Arc<dyn LogSink> = Arc::new(TracingSink::new(identity.system_name));
  let ctx = ServiceContext::new(identity, sink);

  let (tx, rx) = mpsc::channel::<ControlCommand>();

  let ctrlc_tx = tx.clone();
  ctrlc::set_handler(move || {
    let _ = ctrlc_tx.send(ControlCommand::Stop);
  })
  .context("install Ctrl+C handler")?;

  thread::Builder::new()
    .name("debug-stdin".to_string())
    .spawn(move || {
      let stdin = std::io::stdin();
      for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if let Some(cmd) = parse_console_command(&line) {
          if tx.send(cmd).is_err() {
            break;
          }
        }
      }
    })
    .context("spawn stdin reader")?;

  tracing::info!(service = identity.system_name, "debug run; press Ctrl+C to stop");
  ServiceRuntime::new(ctx, ConsoleReporter, options).run(&rx, task)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn console_words_map_to_commands() {
    assert_eq!(parse_console_command("stop"), Some(ControlCommand::Stop));
    assert_eq!(parse_console_command("  PAUSE \n"), Some(ControlCommand::Pause));
    assert_eq!(parse_console_command("Continue"), Some(ControlCommand::Continue));
    assert_eq!(parse_console_command("interrogate"), Some(ControlCommand::Interrogate));
    assert_eq!(parse_console_command("shutdown"), Some(ControlCommand::Shutdown));
    assert_eq!(parse_console_command("   "), None);
    assert_eq!(
      parse_console_command("reload"),
      Some(ControlCommand::Unrecognized("reload".to_string()))
    );
  }

  #[test]
  fn console_reporter_accepts_every_status() {
    let mut reporter = ConsoleReporter;
    reporter
      .report(ServiceStatus::pending(crate::manager::ServiceState::StartPending))
      .unwrap();
  }
}
