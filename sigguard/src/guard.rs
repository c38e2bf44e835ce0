//! Guarded execution: run a closure and turn monitored faults into errors.
//!
//! Per call, a region moves `idle → armed → {completed | faulted} → idle`.
//! The recovery point is released on every path, including panics in the
//! work. There is no retry in place; call [`run`] again.
//!
//! # Limitation
//!
//! Resuming after a fault abandons the frames of the work between the
//! faulting instruction and the capture point. Their destructors never run:
//! heap allocations, locks and file descriptors acquired there are leaked.
//! Keep guarded work to plain memory access.

use crate::error::Error;
use crate::fault::Fault;
use crate::install;
use crate::platform;
use crate::registry::{self, ActiveRegion, RecoveryPoint};

/// Run `work`, converting a monitored hardware fault into
/// [`Error::Fault`].
///
/// ```
/// let value = sigguard::run(|| 42).unwrap();
/// assert_eq!(value, 42);
/// ```
///
/// # Errors
///
/// - [`Error::Fault`] if a monitored fault aborted `work`.
/// - [`Error::NestedRegion`] if this thread is already inside `run` or
///   [`copy`](crate::copy); `work` is not started.
/// - [`Error::Install`] if the interceptor could not be registered.
pub fn run<F, R>(work: F) -> Result<R, Error>
where
    F: FnOnce() -> R,
{
    install::ensure_installed()?;

    let point = RecoveryPoint::new();
    let region = ActiveRegion::enter(&point)?;
    platform::ensure_alt_stack(install::config().alt_stack_size());

    let mut work = Some(work);
    let mut output = None;
    let mut thunk = || {
        if let Some(f) = work.take() {
            output = Some(f());
        }
    };

    // SAFETY: `point` is this thread's active recovery point for as long as
    // `region` lives, which covers the whole call.
    let code = unsafe { platform::call_guarded(&point, &mut thunk) };
    drop(region);

    match output {
        Some(value) if code == 0 => Ok(value),
        _ => {
            let fault = match point.fault() {
                Some((signal, address)) => Fault::from_signal(signal).with_address(address),
                None => Fault::from_signal(code),
            };
            log::debug!("guarded region recovered from {fault}");
            Err(Error::Fault(fault))
        }
    }
}

/// Whether the calling thread is currently inside a guarded region.
#[must_use]
pub fn in_guarded_region() -> bool {
    !registry::current().is_null()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fault::FaultKind;

    #[test]
    fn returns_work_value() {
        assert_eq!(run(|| 42).unwrap(), 42);
        assert_eq!(run(|| String::from("ok")).unwrap(), "ok");
    }

    #[test]
    fn raised_segv_becomes_error() {
        let err = run(|| {
            // SAFETY: raise has no memory-safety preconditions.
            unsafe { libc::raise(libc::SIGSEGV) };
            unreachable!("the interceptor resumes in run");
        })
        .unwrap_err();
        assert_eq!(err, FaultKind::Segmentation);
        assert_eq!(err.as_fault().unwrap().name(), "segmentation fault");
        assert_eq!(err.as_fault().unwrap().address(), None);
    }

    #[test]
    fn region_cleared_after_success_and_fault() {
        assert!(!in_guarded_region());
        assert!(run(in_guarded_region).unwrap());
        assert!(!in_guarded_region());

        // SAFETY: raise has no memory-safety preconditions.
        let _ = run(|| unsafe { libc::raise(libc::SIGBUS) });
        assert!(!in_guarded_region());
        assert_eq!(run(|| 7).unwrap(), 7);
    }

    #[test]
    fn nesting_is_rejected_before_inner_work_runs() {
        let mut inner_ran = false;
        let inner = run(|| run(|| inner_ran = true)).unwrap();
        assert!(matches!(inner, Err(Error::NestedRegion)));
        assert!(!inner_ran);
    }

    #[test]
    fn panic_in_work_releases_region() {
        let result = std::panic::catch_unwind(|| run(|| panic!("inside")));
        assert!(result.is_err());
        assert!(!in_guarded_region());
        assert_eq!(run(|| 1).unwrap(), 1);
    }
}
