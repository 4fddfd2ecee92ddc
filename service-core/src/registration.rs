use crate::error::ServiceError;
use crate::identity::ServiceIdentity;
use crate::manager::{LogSourceRegistry, ManagedService, ServiceManager, ServiceSpec};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolves the binary the registry entry should launch, starting from the
/// path of the running executable.
pub fn current_executable_path() -> Result<PathBuf, ServiceError> {
  let exe = std::env::current_exe().map_err(|e| ServiceError::ExecutablePath {
    path: PathBuf::from(std::env::args().next().unwrap_or_default()),
    reason: e.to_string(),
  })?;
  resolve_executable_path(&exe, std::env::consts::EXE_EXTENSION)
}

/// Makes `candidate` absolute and confirms it names a file. When it has no
/// extension and `default_ext` is non-empty, `candidate.<default_ext>` is
/// probed as well.
pub fn resolve_executable_path(candidate: &Path, default_ext: &str) -> Result<PathBuf, ServiceError> {
  let path = std::path::absolute(candidate).map_err(|e| ServiceError::ExecutablePath {
    path: candidate.to_path_buf(),
    reason: e.to_string(),
  })?;

  let first_err = match fs::metadata(&path) {
    Ok(md) if !md.is_dir() => return Ok(path),
    Ok(_) => format!("{} is directory", path.display()),
    Err(e) => e.to_string(),
  };

  if path.extension().is_none() && !default_ext.is_empty() {
    let probed = path.with_extension(default_ext);
    match fs::metadata(&probed) {
      Ok(md) if !md.is_dir() => return Ok(probed),
      Ok(_) => {
        return Err(ServiceError::ExecutablePath {
          reason: format!("{} is directory", probed.display()),
          path: probed,
        })
      }
      Err(_) => {}
    }
  }

  Err(ServiceError::ExecutablePath {
    path,
    reason: first_err,
  })
}

/// Creates the registry entry for `identity` (auto-start) and its event-log
/// source. Refuses to touch an existing entry. If the log source cannot be
/// registered the new entry is deleted again before the error is returned.
pub fn install<M, L>(
  manager: &M,
  log_sources: &L,
  identity: &ServiceIdentity,
  binary_path: PathBuf,
) -> Result<(), ServiceError>
where
  M: ServiceManager,
  L: LogSourceRegistry,
{
  let name = identity.system_name;
  match manager.open(name) {
    Ok(_) => return Err(ServiceError::AlreadyExists(name.to_string())),
    Err(ServiceError::NotInstalled(_)) => {}
    Err(e) => return Err(e),
  }

  let spec = ServiceSpec::auto_start(identity, binary_path);
  let service = manager.create(&spec)?;
  tracing::info!(service = name, binary = %spec.binary_path.display(), "service entry created");

  if let Err(e) = log_sources.install(name) {
    if let Err(rollback) = service.delete() {
      tracing::error!(service = name, error = %rollback, "rollback of service entry failed");
    } else {
      tracing::warn!(service = name, "service entry rolled back after log source failure");
    }
    return Err(e);
  }

  tracing::info!(service = name, "event log source registered");
  Ok(())
}

/// Deletes the registry entry, then the event-log source. A log-source
/// failure is still reported even though the entry is already gone.
pub fn remove<M, L>(manager: &M, log_sources: &L, name: &str) -> Result<(), ServiceError>
where
  M: ServiceManager,
  L: LogSourceRegistry,
{
  let service = manager.open(name)?;
  service.delete()?;
  tracing::info!(service = name, "service entry deleted");

  log_sources.remove(name)?;
  tracing::info!(service = name, "event log source removed");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identity::{INSTALL_LAUNCH_ARGS, SERVICE_IDENTITY};
  use crate::testing::ModelHost;

  fn exe() -> PathBuf {
    PathBuf::from("C:\\Program Files\\SyxSvcRndQt\\svc-rnd-qt.exe")
  }

  #[test]
  fn install_creates_auto_start_entry_and_log_source() {
    let host = ModelHost::default();
    install(&host, &host, &SERVICE_IDENTITY, exe()).unwrap();

    let entries = host.entries();
    let spec = &entries["SyxSvcRndQt"];
    assert_eq!(spec.binary_path, exe());
    assert_eq!(spec.description, SERVICE_IDENTITY.description);
    assert_eq!(spec.launch_arguments, INSTALL_LAUNCH_ARGS.to_vec());
    assert!(host.has_log_source("SyxSvcRndQt"));
  }

  #[test]
  fn second_install_is_rejected_and_leaves_registry_unchanged() {
    let host = ModelHost::default();
    install(&host, &host, &SERVICE_IDENTITY, exe()).unwrap();
    let before = host.entries();

    let err = install(&host, &host, &SERVICE_IDENTITY, PathBuf::from("C:\\other.exe")).unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists(ref n) if n == "SyxSvcRndQt"));
    assert_eq!(host.entries(), before);
  }

  #[test]
  fn log_source_failure_rolls_back_entry() {
    let host = ModelHost::default();
    host.fail_log_install(true);

    let err = install(&host, &host, &SERVICE_IDENTITY, exe()).unwrap_err();
    assert!(matches!(err, ServiceError::LogSource { op: "install", .. }));
    assert!(host.entries().is_empty());

    host.fail_log_install(false);
    install(&host, &host, &SERVICE_IDENTITY, exe()).unwrap();
    assert_eq!(host.entries().len(), 1);
  }

  #[test]
  fn remove_missing_service_fails_without_side_effects() {
    let host = ModelHost::default();
    let err = remove(&host, &host, "SyxSvcRndQt").unwrap_err();
    assert!(matches!(err, ServiceError::NotInstalled(_)));
    assert!(host.entries().is_empty());
  }

  #[test]
  fn remove_deletes_entry_even_when_log_source_cleanup_fails() {
    let host = ModelHost::default();
    install(&host, &host, &SERVICE_IDENTITY, exe()).unwrap();
    host.fail_log_remove(true);

    let err = remove(&host, &host, "SyxSvcRndQt").unwrap_err();
    assert!(matches!(err, ServiceError::LogSource { op: "remove", .. }));
    assert!(host.entries().is_empty());
  }

  #[test]
  fn remove_clears_entry_and_log_source() {
    let host = ModelHost::default();
    install(&host, &host, &SERVICE_IDENTITY, exe()).unwrap();
    remove(&host, &host, "SyxSvcRndQt").unwrap();
    assert!(host.entries().is_empty());
    assert!(!host.has_log_source("SyxSvcRndQt"));
  }

  #[test]
  fn resolves_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("svc-rnd-qt");
    fs::write(&bin, b"").unwrap();
    assert_eq!(resolve_executable_path(&bin, "exe").unwrap(), bin);
  }

  #[test]
  fn rejects_directory() {
    let dir = tempfile::tempdir().unwrap();
    let err = resolve_executable_path(dir.path(), "").unwrap_err();
    match err {
      ServiceError::ExecutablePath { reason, .. } => assert!(reason.ends_with("is directory")),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn probes_default_extension_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("svc-rnd-qt.exe"), b"").unwrap();
    let resolved = resolve_executable_path(&dir.path().join("svc-rnd-qt"), "exe").unwrap();
    assert_eq!(resolved, dir.path().join("svc-rnd-qt.exe"));
  }

  #[test]
  fn missing_file_without_probe_candidate_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = resolve_executable_path(&dir.path().join("absent"), "exe").unwrap_err();
    assert!(matches!(err, ServiceError::ExecutablePath { .. }));
  }
}
