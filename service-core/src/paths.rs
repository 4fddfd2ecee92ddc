use crate::identity::ServiceIdentity;
use std::path::{Path, PathBuf};

pub fn base_dir(identity: &ServiceIdentity) -> PathBuf {
  data_root().join(identity.system_name)
}

#[cfg(windows)]
fn data_root() -> PathBuf {
  let program_data = std::env::var("ProgramData").unwrap_or_else(|_| "C:\\ProgramData".into());
  PathBuf::from(program_data)
}

#[cfg(not(windows))]
fn data_root() -> PathBuf {
  std::env::temp_dir()
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}
