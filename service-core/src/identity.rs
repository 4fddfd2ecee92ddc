/// Names under which the service is known to the OS service manager and its
/// event log. The system name is the registry key and must stay stable across
/// releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceIdentity {
  pub system_name: &'static str,
  pub display_name: &'static str,
  pub description: &'static str,
}

pub const SERVICE_IDENTITY: ServiceIdentity = ServiceIdentity {
  system_name: "SyxSvcRndQt",
  display_name: "SyxSvcRndQt",
  description: "Svc to put random quotes in the Windows Event log!",
};

/// Arguments recorded in the registry entry at install time.
pub const INSTALL_LAUNCH_ARGS: [&str; 2] = ["is", "auto-started"];

/// Arguments passed along with a manual start request.
pub const MANUAL_START_ARGS: [&str; 2] = ["is", "manual-started"];
