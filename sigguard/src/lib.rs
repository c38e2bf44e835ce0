//! Recoverable hardware faults.
//!
//! `sigguard` runs a unit of work under a guard that turns synchronous
//! hardware faults (invalid memory access, bus error, arithmetic exception,
//! illegal instruction, trap) into a typed [`Error`] instead of a crash. It
//! is meant for memory operations over memory that can disappear mid-access,
//! such as a memory-mapped file truncated by another process.
//!
//! ```
//! let value = sigguard::run(|| 6 * 7).unwrap();
//! assert_eq!(value, 42);
//! ```
//!
//! # Architecture
//!
//! ```text
//! fault     — raw platform code → FaultKind, names, the Fault error value
//! registry  — per-thread recovery-point slot (pthread key), scoped release
//! platform  — sigaction interceptor + sigsetjmp capture (unix), no-op elsewhere
//! install   — one-shot, process-wide interceptor registration
//! guard     — run(): arm, execute, resume on fault, release
//! copy      — bulk (src, dst, len) copy under one guarded region
//! cabi      — extern "C" surface
//! ```
//!
//! Faults outside a guarded region are not recovered: the interceptor
//! restores the default disposition and re-raises, so they crash (and dump
//! core) as if this crate were absent. Nested regions on one thread are
//! rejected with [`Error::NestedRegion`].
//!
//! Only unix targets intercept faults. Elsewhere work runs unguarded.

macro_rules! cabi_guard {
    ($cond:expr, $default:expr) => {
        if $cond {
            return $default;
        }
    };
}

pub mod cabi;
pub mod config;
pub mod copy;
pub mod error;
pub mod fault;
mod guard;
mod install;
mod platform;
mod registry;

pub use config::Config;
pub use copy::{copy, CopyOp};
pub use error::Error;
pub use fault::{signal_name, Fault, FaultKind};
pub use guard::{in_guarded_region, run};
pub use install::{configure, ensure_installed, is_installed, monitored};
