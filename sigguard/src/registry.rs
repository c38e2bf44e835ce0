//! Per-thread recovery-point registry.
//!
//! Each thread has one slot holding a pointer to the [`RecoveryPoint`] of
//! the guarded region it is currently running, or null. The slot is written
//! by the owning thread on region entry and exit, and read by the fault
//! interceptor running on that same thread.
//!
//! # Safety Design
//!
//! On unix the slot is a `pthread_key_t` value rather than a Rust
//! `thread_local!`: `pthread_getspecific` is async-signal-safe, so
//! [`current`] can be called from the signal handler without allocation or
//! locking. The key itself is created once and read with a single atomic
//! load afterwards.

use std::cell::UnsafeCell;
use std::io;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use crate::error::Error;
use crate::platform::JmpBuf;

// ── Recovery point ──────────────────────────────────────────────────────

/// Where control resumes if a fault arrives during a guarded region.
///
/// Lives in the guarded call's stack frame. All fields besides the jump
/// buffer are atomics: they are written by the normal code path and by the
/// interceptor on the same thread, never across threads.
pub(crate) struct RecoveryPoint {
    jmp_buf: UnsafeCell<JmpBuf>,
    /// Set once the jump buffer holds a valid capture.
    armed: AtomicBool,
    /// Raw fault code recorded by the interceptor (0 = none).
    signal: AtomicI32,
    /// Faulting address recorded by the interceptor (0 = not reported).
    address: AtomicUsize,
}

impl RecoveryPoint {
    pub(crate) fn new() -> Self {
        Self {
            jmp_buf: UnsafeCell::new(JmpBuf::zeroed()),
            armed: AtomicBool::new(false),
            signal: AtomicI32::new(0),
            address: AtomicUsize::new(0),
        }
    }

    /// Raw pointer to the jump buffer, for `sigsetjmp`/`siglongjmp`.
    #[cfg_attr(not(unix), allow(dead_code))]
    pub(crate) fn jmp_buf(&self) -> *mut JmpBuf {
        self.jmp_buf.get()
    }

    /// Mark the jump buffer valid. Called after the capture returns 0.
    pub(crate) fn arm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    /// Invalidate the jump buffer. Returns whether it was armed.
    ///
    /// Async-signal-safe. The interceptor jumps only when this returns
    /// `true`, so a second fault during recovery falls through to default
    /// handling instead of reusing a dead capture.
    pub(crate) fn disarm(&self) -> bool {
        self.armed.swap(false, Ordering::AcqRel)
    }

    /// Record fault metadata. Async-signal-safe.
    pub(crate) fn record(&self, signal: i32, address: usize) {
        self.signal.store(signal, Ordering::Relaxed);
        self.address.store(address, Ordering::Release);
    }

    /// The recorded `(signal, address)`, if a fault was delivered.
    pub(crate) fn fault(&self) -> Option<(i32, usize)> {
        let address = self.address.load(Ordering::Acquire);
        match self.signal.load(Ordering::Relaxed) {
            0 => None,
            signal => Some((signal, address)),
        }
    }
}

// ── Thread slot ─────────────────────────────────────────────────────────

#[cfg(unix)]
mod slot {
    use std::ffi::c_void;
    use std::io;
    use std::sync::OnceLock;

    use super::RecoveryPoint;

    /// Key for the per-thread slot, or the `pthread_key_create` error.
    static KEY: OnceLock<Result<libc::pthread_key_t, i32>> = OnceLock::new();

    fn key() -> io::Result<libc::pthread_key_t> {
        let key = KEY.get_or_init(|| {
            let mut key: libc::pthread_key_t = 0;
            // SAFETY: key is a valid out-pointer. No destructor: the slot
            // only borrows stack frames and holds nothing to free.
            match unsafe { libc::pthread_key_create(&raw mut key, None) } {
                0 => Ok(key),
                err => Err(err),
            }
        });
        (*key).map_err(io::Error::from_raw_os_error)
    }

    pub(super) fn store(point: *const RecoveryPoint) -> io::Result<()> {
        let key = key()?;
        // SAFETY: key is valid (created above). The stored value is an
        // opaque pointer; pthreads never dereferences it.
        match unsafe { libc::pthread_setspecific(key, point.cast::<c_void>()) } {
            0 => Ok(()),
            err => Err(io::Error::from_raw_os_error(err)),
        }
    }

    /// Async-signal-safe: one atomic load plus `pthread_getspecific`.
    pub(super) fn load() -> *const RecoveryPoint {
        let Some(Ok(key)) = KEY.get() else {
            return std::ptr::null();
        };
        // SAFETY: key is valid. pthread_getspecific is async-signal-safe.
        unsafe { libc::pthread_getspecific(*key) }
            .cast_const()
            .cast::<RecoveryPoint>()
    }
}

#[cfg(not(unix))]
mod slot {
    use std::cell::Cell;
    use std::io;

    use super::RecoveryPoint;

    thread_local! {
        static ACTIVE: Cell<*const RecoveryPoint> = const { Cell::new(std::ptr::null()) };
    }

    pub(super) fn store(point: *const RecoveryPoint) -> io::Result<()> {
        ACTIVE.with(|slot| slot.set(point));
        Ok(())
    }

    pub(super) fn load() -> *const RecoveryPoint {
        ACTIVE.with(Cell::get)
    }
}

/// Install `point` as the calling thread's active recovery point.
///
/// Returns the previously active point (null if none).
///
/// # Safety
///
/// `point` must stay valid until it is replaced with [`clear_to`]; the
/// interceptor dereferences it whenever a fault arrives on this thread.
pub(crate) unsafe fn set(point: *const RecoveryPoint) -> io::Result<*const RecoveryPoint> {
    let previous = slot::load();
    slot::store(point)?;
    Ok(previous)
}

/// Restore the point that was active before the matching [`set`].
pub(crate) fn clear_to(previous: *const RecoveryPoint) {
    // The key exists and this thread's slot was already written by `set`,
    // so the store cannot fail.
    let _ = slot::store(previous);
}

/// The calling thread's active recovery point, or null.
///
/// Async-signal-safe on unix.
pub(crate) fn current() -> *const RecoveryPoint {
    slot::load()
}

// ── Scoped region ───────────────────────────────────────────────────────

/// Keeps a recovery point active for the lifetime of the guard.
///
/// Dropping the guard restores the previous slot value, on normal return,
/// after fault-triggered resumption, and during panic unwinding alike.
pub(crate) struct ActiveRegion<'a> {
    previous: *const RecoveryPoint,
    _point: PhantomData<&'a RecoveryPoint>,
}

impl<'a> ActiveRegion<'a> {
    /// Activate `point` for the calling thread.
    ///
    /// # Errors
    ///
    /// [`Error::NestedRegion`] if another point is already active; the slot
    /// is left untouched. [`Error::Install`] if the slot cannot be written.
    pub(crate) fn enter(point: &'a RecoveryPoint) -> Result<Self, Error> {
        if !current().is_null() {
            return Err(Error::NestedRegion);
        }
        // SAFETY: the PhantomData borrow keeps `point` alive for as long as
        // this guard, and Drop clears the slot before the borrow ends.
        let previous = unsafe { set(ptr::from_ref(point)) }?;
        Ok(Self {
            previous,
            _point: PhantomData,
        })
    }
}

impl Drop for ActiveRegion<'_> {
    fn drop(&mut self) {
        clear_to(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_starts_empty() {
        std::thread::spawn(|| assert!(current().is_null()))
            .join()
            .unwrap();
    }

    #[test]
    fn set_returns_previous_and_clear_restores_it() {
        std::thread::spawn(|| {
            let outer = RecoveryPoint::new();
            let inner = RecoveryPoint::new();
            // SAFETY: both points outlive the slot writes below.
            unsafe {
                let prev = set(&outer).unwrap();
                assert!(prev.is_null());
                assert_eq!(current(), ptr::from_ref(&outer));

                let prev = set(&inner).unwrap();
                assert_eq!(prev, ptr::from_ref(&outer));
                assert_eq!(current(), ptr::from_ref(&inner));

                clear_to(prev);
                assert_eq!(current(), ptr::from_ref(&outer));
            }
            clear_to(ptr::null());
            assert!(current().is_null());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn threads_never_see_each_others_point() {
        let point = RecoveryPoint::new();
        let _region = ActiveRegion::enter(&point).unwrap();
        assert_eq!(current(), ptr::from_ref(&point));
        std::thread::spawn(|| assert!(current().is_null()))
            .join()
            .unwrap();
    }

    #[test]
    fn region_rejects_nesting_without_touching_slot() {
        let outer = RecoveryPoint::new();
        let inner = RecoveryPoint::new();
        let region = ActiveRegion::enter(&outer).unwrap();
        assert!(matches!(ActiveRegion::enter(&inner), Err(Error::NestedRegion)));
        assert_eq!(current(), ptr::from_ref(&outer));
        drop(region);
        assert!(current().is_null());
    }

    #[test]
    fn region_restores_slot_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let point = RecoveryPoint::new();
            let _region = ActiveRegion::enter(&point).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(current().is_null());
    }

    #[test]
    fn disarm_only_succeeds_once() {
        let point = RecoveryPoint::new();
        assert!(!point.disarm());
        point.arm();
        assert!(point.disarm());
        assert!(!point.disarm());
    }

    #[test]
    fn fault_metadata_round_trips() {
        let point = RecoveryPoint::new();
        assert_eq!(point.fault(), None);
        point.record(11, 0xdead_0000);
        assert_eq!(point.fault(), Some((11, 0xdead_0000)));
    }
}
