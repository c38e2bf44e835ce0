//! C ABI for non-Rust callers.
//!
//! # C ABI
//!
//! - [`sigguard_copy`] — fault-tolerant bulk copy.
//! - [`sigguard_fault_kind`] — map a raw signal to a `FaultKind` value.
//! - [`sigguard_fault_name`] — static name of the mapped kind.
//! - [`sigguard_signal_name`] — static name of any POSIX signal.
//!
//! Returned strings are static and must not be freed.

use std::ffi::{c_char, c_int};
use std::slice;

use crate::copy::{copy, CopyOp};
use crate::error::Error;
use crate::fault::{signal_c_name, FaultKind};

/// Returned by [`sigguard_copy`] for failures that are not faults.
pub const SIGGUARD_ERROR: c_int = -1;

/// Copy `count` operations from `ops` under one guarded region.
///
/// Returns 0 on success, the raw signal number if a fault aborted the copy,
/// or [`SIGGUARD_ERROR`] if `ops` is null with a non-zero `count`, the call
/// is nested inside another guarded region, or the interceptor could not
/// be installed.
///
/// # Safety
///
/// `ops` must point to `count` valid [`CopyOp`] values (or be null when
/// `count` is 0), each satisfying the contract of [`copy`].
#[no_mangle]
pub unsafe extern "C" fn sigguard_copy(ops: *const CopyOp, count: usize) -> c_int {
    cabi_guard!(ops.is_null() && count > 0, SIGGUARD_ERROR);

    // Zero operations still go through `copy`, so nesting is reported the
    // same way as for a non-empty call.
    let ops: &[CopyOp] = if count == 0 {
        &[]
    } else {
        // SAFETY: caller guarantees ops points to count valid CopyOp values.
        unsafe { slice::from_raw_parts(ops, count) }
    };
    // SAFETY: caller guarantees each op satisfies copy's contract.
    match unsafe { copy(ops) } {
        Ok(()) => 0,
        Err(Error::Fault(fault)) => fault.code(),
        Err(e) => {
            log::debug!("sigguard_copy failed: {e}");
            SIGGUARD_ERROR
        }
    }
}

/// Map a raw signal number to its `FaultKind` discriminant
/// (0 = unknown, 1 = segmentation, 2 = bus, 3 = arithmetic,
/// 4 = illegal instruction, 5 = trap).
#[no_mangle]
pub extern "C" fn sigguard_fault_kind(code: c_int) -> c_int {
    FaultKind::from_signal(code) as c_int
}

/// Static NUL-terminated name of the kind `code` maps to.
#[no_mangle]
pub extern "C" fn sigguard_fault_name(code: c_int) -> *const c_char {
    FaultKind::from_signal(code).c_name().as_ptr()
}

/// Static NUL-terminated name of any POSIX signal number.
#[no_mangle]
pub extern "C" fn sigguard_signal_name(code: c_int) -> *const c_char {
    signal_c_name(code).as_ptr()
}
