//! One-shot, process-wide interceptor installation.
//!
//! The first caller of [`ensure_installed`] registers the interceptor inside
//! `OnceLock::get_or_init`; concurrent callers block until registration has
//! finished, and every later caller reads the stored outcome. A thread that
//! observes "installed" therefore also observes the completed `sigaction`
//! calls before it arms a recovery point. Registration is never undone.

use std::io;
use std::sync::OnceLock;

use crate::config::Config;
use crate::error::Error;
use crate::fault::FaultKind;
use crate::platform;

/// Configuration used for installation. Fixed by [`configure`] or, failing
/// that, read from the environment on first installation.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Installation outcome: `Ok`, or the OS error code of the failed call.
static INSTALLED: OnceLock<Result<(), i32>> = OnceLock::new();

/// Fix the configuration used by the interceptor.
///
/// Must run before the first guarded region (or explicit
/// [`ensure_installed`]) in the process.
///
/// # Errors
///
/// [`Error::AlreadyConfigured`] if a configuration is already in effect.
pub fn configure(config: Config) -> Result<(), Error> {
    CONFIG.set(config).map_err(|_| Error::AlreadyConfigured)
}

/// The configuration in effect, reading the environment if none was set.
pub(crate) fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Register the fault interceptor with the operating system, exactly once
/// per process. Cheap after the first call.
///
/// # Errors
///
/// [`Error::Install`] if the operating system rejected the registration.
/// The failure is sticky: every later call reports it again.
pub fn ensure_installed() -> Result<(), Error> {
    let outcome = INSTALLED.get_or_init(|| {
        let faults = config().faults();
        match platform::install(faults) {
            Ok(()) => {
                log::debug!("fault interceptor installed for {}", describe(faults));
                Ok(())
            }
            Err(e) => {
                log::warn!("fault interceptor installation failed: {e}");
                Err(e.raw_os_error().unwrap_or(libc::EINVAL))
            }
        }
    });
    outcome.map_err(|code| Error::Install(io::Error::from_raw_os_error(code)))
}

/// Whether the interceptor has been registered successfully.
#[must_use]
pub fn is_installed() -> bool {
    matches!(INSTALLED.get(), Some(Ok(())))
}

/// Fault kinds the interceptor was registered for, once installed.
#[must_use]
pub fn monitored() -> Option<&'static [FaultKind]> {
    is_installed().then(|| config().faults())
}

fn describe(faults: &[FaultKind]) -> String {
    let names: Vec<&str> = faults.iter().map(|kind| kind.name()).collect();
    format!("[{}]", names.join(", "))
}
