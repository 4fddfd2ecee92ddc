use crate::runtime::RuntimeOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub logging: LoggingConfig,
  pub control: ControlConfig,
  pub runtime: RuntimeConfig,
  pub quote: QuoteConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
  #[serde(default = "default_control_timeout_seconds")]
  pub timeout_seconds: u64,

  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
}

impl Default for ControlConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: default_control_timeout_seconds(),
      poll_interval_ms: default_poll_interval_ms(),
    }
  }
}

impl ControlConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
  #[serde(default = "default_interrogate_echo_delay_ms")]
  pub interrogate_echo_delay_ms: u64,

  #[serde(default = "default_task_shutdown_grace_seconds")]
  pub task_shutdown_grace_seconds: u64,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      interrogate_echo_delay_ms: default_interrogate_echo_delay_ms(),
      task_shutdown_grace_seconds: default_task_shutdown_grace_seconds(),
    }
  }
}

impl RuntimeConfig {
  pub fn options(&self) -> RuntimeOptions {
    RuntimeOptions {
      interrogate_echo_delay: Duration::from_millis(self.interrogate_echo_delay_ms),
      task_shutdown_grace: Duration::from_secs(self.task_shutdown_grace_seconds),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteConfig {
  #[serde(default = "default_quote_endpoint")]
  pub endpoint: String,

  #[serde(default = "default_quote_interval_minutes")]
  pub interval_minutes: u64,

  #[serde(default = "default_quote_timeout_seconds")]
  pub timeout_seconds: u64,
}

impl Default for QuoteConfig {
  fn default() -> Self {
    Self {
      endpoint: default_quote_endpoint(),
      interval_minutes: default_quote_interval_minutes(),
      timeout_seconds: default_quote_timeout_seconds(),
    }
  }
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

fn default_control_timeout_seconds() -> u64 {
  10
}

fn default_poll_interval_ms() -> u64 {
  300
}

fn default_interrogate_echo_delay_ms() -> u64 {
  100
}

fn default_task_shutdown_grace_seconds() -> u64 {
  5
}

fn default_quote_endpoint() -> String {
  "https://api.quotable.io/quotes/random".to_string()
}

fn default_quote_interval_minutes() -> u64 {
  60
}

fn default_quote_timeout_seconds() -> u64 {
  10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub control: Option<ControlConfig>,

  #[serde(default)]
  pub runtime: Option<RuntimeConfig>,

  #[serde(default)]
  pub quote: Option<QuoteConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(c) = self.control {
      cfg.control = c;
    }
    if let Some(r) = self.runtime {
      cfg.runtime = r;
    }
    if let Some(q) = self.quote {
      cfg.quote = q;
    }

    if let Some(reason) = validate_control_config(&cfg.control) {
      tracing::warn!(reason = %reason, "control config invalid; using defaults");
      cfg.control = ControlConfig::default();
    }
    if let Some(reason) = validate_quote_config(&cfg.quote) {
      tracing::warn!(reason = %reason, "quote config invalid; using defaults");
      cfg.quote = QuoteConfig::default();
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.logging.is_none() || self.control.is_none() || self.runtime.is_none() || self.quote.is_none()
  }
}

/// Loads the config, creating it (or filling in missing sections) on disk.
pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

/// Loads the config without ever writing; missing or broken files yield
/// defaults.
pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
      tracing::info!(path = %path.display(), "default config written");
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let cfg = file.clone().normalize();
      if allow_writes && file.needs_upgrade() {
        let backup = parent.join(format!("config.toml.bak-{}", unix_seconds()));
        let _ = fs::copy(path, &backup);
        let _ = write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?);
        tracing::info!(
          path = %path.display(),
          backup = %backup.display(),
          "config upgraded with missing defaults"
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let backup = parent.join(format!("config.toml.bad-{}", unix_seconds()));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        tracing::warn!(
          path = %path.display(),
          backup = %backup.display(),
          error = %e,
          "invalid config replaced with defaults"
        );
      } else {
        tracing::warn!(path = %path.display(), error = %e, "invalid config; using defaults");
      }
      Ok(cfg)
    }
  }
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    logging: Some(cfg.logging.clone()),
    control: Some(cfg.control.clone()),
    runtime: Some(cfg.runtime.clone()),
    quote: Some(cfg.quote.clone()),
  }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

fn unix_seconds() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

fn validate_control_config(cfg: &ControlConfig) -> Option<String> {
  if cfg.timeout_seconds == 0 {
    return Some("timeout_seconds must be > 0".to_string());
  }
  if cfg.poll_interval_ms == 0 {
    return Some("poll_interval_ms must be > 0".to_string());
  }
  if cfg.poll_interval_ms > cfg.timeout_seconds.saturating_mul(1000) {
    return Some("poll_interval_ms must not exceed timeout_seconds".to_string());
  }
  None
}

fn validate_quote_config(cfg: &QuoteConfig) -> Option<String> {
  if cfg.interval_minutes == 0 {
    return Some("interval_minutes must be > 0".to_string());
  }
  if cfg.timeout_seconds == 0 {
    return Some("timeout_seconds must be > 0".to_string());
  }
  let Ok(url) = reqwest::Url::parse(&cfg.endpoint) else {
    return Some(format!("invalid endpoint URL: {}", cfg.endpoint));
  };
  if url.scheme() != "https" && url.scheme() != "http" {
    return Some(format!("endpoint must use HTTP(S): {}", cfg.endpoint));
  }
  if url.host_str().is_none() {
    return Some(format!("endpoint has no host: {}", cfg.endpoint));
  }
  None
}
