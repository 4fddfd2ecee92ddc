//! Command-line dispatch for console invocations.

use crate::config::{self, ControlConfig};
use crate::control::{self, ControlTarget};
use crate::identity::ServiceIdentity;
use crate::manager::{ControlSignal, ServiceManager};
use crate::platform::{self, EventLogSources};
use crate::quote::QuoteTask;
use crate::{debug, logging, paths, registration};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Install,
  Remove,
  Debug,
  Start,
  Stop,
  Pause,
  Continue,
}

impl Command {
  pub const ALL: [Command; 7] = [
    Self::Install,
    Self::Remove,
    Self::Debug,
    Self::Start,
    Self::Stop,
    Self::Pause,
    Self::Continue,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Install => "install",
      Self::Remove => "remove",
      Self::Debug => "debug",
      Self::Start => "start",
      Self::Stop => "stop",
      Self::Pause => "pause",
      Self::Continue => "continue",
    }
  }

  /// The control signal and expected end state for commands that wait on
  /// the service; `None` for the rest.
  pub fn control_target(self, cfg: &ControlConfig) -> Option<ControlTarget> {
    let signal = match self {
      Self::Stop => ControlSignal::Stop,
      Self::Pause => ControlSignal::Pause,
      Self::Continue => ControlSignal::Continue,
      _ => return None,
    };
    Some(ControlTarget::for_signal(signal, cfg.timeout()))
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
  #[error("no command specified")]
  Missing,

  #[error("invalid command {0}")]
  Invalid(String),
}

impl FromStr for Command {
  type Err = UsageError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.to_lowercase();
    Self::ALL
      .into_iter()
      .find(|c| c.as_str() == lower)
      .ok_or(UsageError::Invalid(lower))
  }
}

/// Picks the command from `args[1]`. Anything after it is ignored.
pub fn parse_args(args: &[String]) -> Result<Command, UsageError> {
  args.get(1).ok_or(UsageError::Missing)?.parse()
}

pub fn usage(err: &UsageError, program: &str) -> String {
  let commands: Vec<&str> = Command::ALL.iter().map(|c| c.as_str()).collect();
  let (head, last) = commands.split_at(commands.len() - 1);
  format!(
    "{err}\n\nusage: {program} <command>\n       where <command> is one of\n       {} or {}.\n",
    head.join(", "),
    last[0]
  )
}

/// Runs one console command to completion.
pub fn execute(command: Command, identity: &ServiceIdentity) -> anyhow::Result<()> {
  match command {
    Command::Debug => run_debug(identity),
    _ => run_admin(command, identity),
  }
}

fn run_debug(identity: &ServiceIdentity) -> anyhow::Result<()> {
  let base = paths::base_dir(identity);
  let cfg = config::load_or_create_default(&paths::config_path(&base))?;

  logging::init_file_and_stderr(
    &paths::logs_dir(&base),
    &cfg.logging.level,
    cfg.logging.retention_days,
  )?;

  let task = Box::new(QuoteTask::new(cfg.quote.clone()));
  debug::run(*identity, cfg.runtime.options(), task)
}

fn run_admin(command: Command, identity: &ServiceIdentity) -> anyhow::Result<()> {
  logging::init_stderr("warn")?;
  let base = paths::base_dir(identity);
  let cfg = config::load_or_default_readonly(&paths::config_path(&base))?;
  let name = identity.system_name;
  let scm = platform::connect()?;

  match command {
    Command::Install => {
      let exe = registration::current_executable_path()?;
      registration::install(&scm, &EventLogSources, identity, exe)?;
    }
    Command::Remove => registration::remove(&scm, &EventLogSources, name)?,
    Command::Start => control::start(&scm.open(name)?)?,
    _ => {
      let Some(target) = command.control_target(&cfg.control) else {
        anyhow::bail!("{command} does not control an installed service");
      };
      let service = scm.open(name)?;
      let state = control::control_and_wait(&service, &target, cfg.control.poll_interval())?;
      tracing::info!(service = name, %state, "{command} complete");
    }
  }
  Ok(())
}
