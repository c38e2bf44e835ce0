//! Interceptor configuration.
//!
//! Read once, before the interceptor is installed. Callers either pass a
//! [`Config`] to [`configure`](crate::configure) or let the installer build
//! one from the environment:
//!
//! - `SIGGUARD_FAULTS` — comma-separated fault kinds to monitor
//!   (`segv,bus,fpe,ill,trap`). Default: all of them.
//! - `SIGGUARD_ALT_STACK` — per-thread alternate signal stack size in KiB.
//!   `0` disables it. Default: 128.

use crate::fault::FaultKind;

/// Default alternate signal stack size. Room for the handler, `siglongjmp`
/// and kernel-injected frames when the main stack is exhausted.
pub const DEFAULT_ALT_STACK_SIZE: usize = 128 * 1024;

/// Which faults the interceptor handles and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    faults: Vec<FaultKind>,
    alt_stack_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            faults: FaultKind::HARDWARE.to_vec(),
            alt_stack_size: DEFAULT_ALT_STACK_SIZE,
        }
    }
}

impl Config {
    /// Build a configuration from `SIGGUARD_*` environment variables.
    ///
    /// Invalid values are reported with `log::warn!` and replaced by the
    /// default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SIGGUARD_FAULTS") {
            match parse_faults(&val) {
                Some(faults) => config.faults = faults,
                None => log::warn!("SIGGUARD_FAULTS={val} is invalid, monitoring all faults"),
            }
        }

        if let Ok(val) = std::env::var("SIGGUARD_ALT_STACK") {
            match val.trim().parse::<usize>() {
                Ok(kib) => config.alt_stack_size = kib.saturating_mul(1024),
                Err(_) => log::warn!("SIGGUARD_ALT_STACK={val} is invalid, using default"),
            }
        }

        config
    }

    /// Monitor only `faults`. Duplicates and [`FaultKind::Unknown`] are
    /// dropped since no signal delivers the catch-all kind.
    #[must_use]
    pub fn with_faults(mut self, faults: impl IntoIterator<Item = FaultKind>) -> Self {
        self.faults = normalize(faults);
        self
    }

    /// Set the alternate signal stack size in bytes. `0` disables it.
    #[must_use]
    pub fn with_alt_stack_size(mut self, bytes: usize) -> Self {
        self.alt_stack_size = bytes;
        self
    }

    /// Fault kinds the interceptor is registered for.
    #[must_use]
    pub fn faults(&self) -> &[FaultKind] {
        &self.faults
    }

    /// Alternate signal stack size in bytes.
    #[must_use]
    pub fn alt_stack_size(&self) -> usize {
        self.alt_stack_size
    }
}

fn normalize(faults: impl IntoIterator<Item = FaultKind>) -> Vec<FaultKind> {
    let mut out: Vec<FaultKind> = faults
        .into_iter()
        .filter(|kind| *kind != FaultKind::Unknown)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Parse a comma-separated fault list. Empty entries are ignored; any
/// unrecognized entry rejects the whole list.
fn parse_faults(val: &str) -> Option<Vec<FaultKind>> {
    let kinds = val
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse::<FaultKind>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let kinds = normalize(kinds);
    (!kinds.is_empty()).then_some(kinds)
}
