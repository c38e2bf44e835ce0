//! Platform fault-interception strategies.
//!
//! One strategy per target, picked at build time:
//!
//! - unix: `sigaction` handler plus `sigsetjmp`/`siglongjmp`.
//! - everything else: no interceptor. Work runs unguarded and faults keep
//!   their default, process-terminating behavior.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::{call_guarded, ensure_alt_stack, install, JmpBuf};

#[cfg(not(unix))]
mod fallback;
#[cfg(not(unix))]
pub(crate) use fallback::{call_guarded, ensure_alt_stack, install, JmpBuf};
