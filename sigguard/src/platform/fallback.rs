//! Targets without POSIX signals.
//!
//! Nothing is registered with the operating system. The taxonomy still maps
//! structured-exception codes, but a fault inside `run` terminates the
//! process exactly as it would outside one.

use std::io;

use crate::fault::FaultKind;
use crate::registry::RecoveryPoint;

/// Placeholder capture buffer; nothing ever jumps to it.
pub(crate) struct JmpBuf;

impl JmpBuf {
    pub(crate) const fn zeroed() -> Self {
        Self
    }
}

pub(crate) fn install(_faults: &[FaultKind]) -> io::Result<()> {
    Ok(())
}

pub(crate) fn ensure_alt_stack(_size: usize) {}

/// Run `work` directly. Always reports a fresh entry.
///
/// # Safety
///
/// No preconditions on this target; the signature matches the unix
/// strategy.
pub(crate) unsafe fn call_guarded(point: &RecoveryPoint, work: &mut dyn FnMut()) -> i32 {
    point.arm();
    work();
    point.disarm();
    0
}
