//! Fault-tolerant bulk memory copy.
//!
//! Copies a sequence of `(src, dst, len)` triples under a single guarded
//! region. Typical use is reading from a memory-mapped file that may be
//! truncated by another process while the copy runs.

use crate::error::Error;
use crate::guard;

/// One copy operation.
///
/// Layout-compatible with the C struct `{ const void *src; void *dst;
/// size_t len; }` used by [`sigguard_copy`](crate::cabi::sigguard_copy).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOp {
    /// Source address.
    pub src: *const u8,
    /// Destination address.
    pub dst: *mut u8,
    /// Number of bytes to copy.
    pub len: usize,
}

impl CopyOp {
    /// Build an operation copying the common prefix of `src` into `dst`.
    #[must_use]
    pub fn new(src: &[u8], dst: &mut [u8]) -> Self {
        Self {
            src: src.as_ptr(),
            dst: dst.as_mut_ptr(),
            len: src.len().min(dst.len()),
        }
    }
}

/// Copy every operation in order, under one guarded region.
///
/// If a monitored fault hits while copying operation `i`, operations before
/// `i` keep their copied bytes, operation `i` leaves its destination with
/// unspecified content, and operations after `i` are not attempted.
///
/// # Errors
///
/// See [`run`](crate::run): [`Error::Fault`] on a fault,
/// [`Error::NestedRegion`] when called inside another guarded region,
/// [`Error::Install`] if the interceptor could not be registered.
///
/// # Safety
///
/// For every operation with `len > 0`, `dst` must be valid for writes of
/// `len` bytes and must not overlap `src`. `src` may be null or point at
/// memory that faults on access; any other `src` must be readable for `len`
/// bytes.
pub unsafe fn copy(ops: &[CopyOp]) -> Result<(), Error> {
    guard::run(|| {
        for op in ops.iter().filter(|op| op.len > 0) {
            // SAFETY: caller guarantees dst is writable and disjoint from
            // src. memcpy carries no non-null precondition of its own, so a
            // null or unmapped src faults inside it under the guard.
            unsafe { libc::memcpy(op.dst.cast(), op.src.cast(), op.len) };
        }
    })
}
