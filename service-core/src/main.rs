use service_core::cli;
use service_core::identity::SERVICE_IDENTITY;
use std::process::ExitCode;

#[cfg(windows)]
windows_service::define_windows_service!(ffi_service_main, service_main);

#[cfg(windows)]
fn service_main(_arguments: Vec<std::ffi::OsString>) {
  let res = service_core::platform::run_managed(SERVICE_IDENTITY, |cfg| {
    Box::new(service_core::quote::QuoteTask::new(cfg.quote.clone()))
  });
  if let Err(e) = res {
    // Logging may not be initialized yet.
    eprintln!("{} fatal error: {e:?}", SERVICE_IDENTITY.system_name);
  }
}

#[cfg(windows)]
fn run_as_service() -> anyhow::Result<bool> {
  service_core::platform::start_dispatcher(SERVICE_IDENTITY.system_name, ffi_service_main)
}

#[cfg(not(windows))]
fn run_as_service() -> anyhow::Result<bool> {
  Ok(false)
}

fn main() -> ExitCode {
  match run_as_service() {
    Ok(true) => return ExitCode::SUCCESS,
    Ok(false) => {}
    Err(e) => {
      eprintln!("{e:#}");
      return ExitCode::FAILURE;
    }
  }

  let args: Vec<String> = std::env::args().collect();

  if args.iter().any(|a| a == "--version") {
    println!("{}", env!("CARGO_PKG_VERSION"));
    return ExitCode::SUCCESS;
  }

  let command = match cli::parse_args(&args) {
    Ok(c) => c,
    Err(e) => {
      let program = args.first().map(String::as_str).unwrap_or("svc-rnd-qt");
      eprint!("{}", cli::usage(&e, program));
      return ExitCode::from(2);
    }
  };

  match cli::execute(command, &SERVICE_IDENTITY) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("failed to {command} {}: {e:#}", SERVICE_IDENTITY.system_name);
      ExitCode::FAILURE
    }
  }
}
