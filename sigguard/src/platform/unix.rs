//! POSIX fault interception.
//!
//! A process-wide `sigaction` handler for the monitored fault signals. When
//! a fault arrives on a thread with an armed recovery point, the handler
//! `siglongjmp`s back into [`call_guarded`]; otherwise it restores the
//! default disposition and re-raises, so unguarded faults crash exactly as
//! they would without this crate.
//!
//! # Safety Design
//!
//! The handler is async-signal-safe. It only calls:
//! - [`registry::current`] (an atomic load plus `pthread_getspecific`)
//! - atomic loads/stores on the recovery point
//! - `siglongjmp`, `sigaction` and `raise`
//!
//! No allocation, locking, logging or panicking happens in signal context.
//! `sigsetjmp` is called with `savemask = 1`, so resuming also restores the
//! signal mask the kernel blocked on handler entry.

use std::cell::RefCell;
use std::ffi::{c_int, c_void};
use std::io;
use std::mem;
use std::ptr;

use crate::fault::FaultKind;
use crate::registry::{self, RecoveryPoint};

/// Smallest alternate stack worth registering.
const MIN_ALT_STACK_SIZE: usize = 32 * 1024;

// ── FFI bindings ────────────────────────────────────────────────────────

/// On `x86_64` glibc `sigjmp_buf` is 200 bytes. Other ABIs save more
/// registers (and a larger mask on some), so they get a conservative 512.
const JMP_BUF_LEN: usize = if cfg!(target_arch = "x86_64") { 256 } else { 512 };

/// `sigjmp_buf`, opaque and over-allocated. The `libc` crate does not
/// expose it.
#[repr(C, align(16))]
pub(crate) struct JmpBuf {
    _buf: [u8; JMP_BUF_LEN],
}

impl JmpBuf {
    pub(crate) const fn zeroed() -> Self {
        Self {
            _buf: [0u8; JMP_BUF_LEN],
        }
    }
}

extern "C" {
    // On glibc, sigsetjmp is a macro that expands to __sigsetjmp.
    #[cfg_attr(all(target_os = "linux", target_env = "gnu"), link_name = "__sigsetjmp")]
    fn sigsetjmp(env: *mut JmpBuf, savemask: c_int) -> c_int;
    fn siglongjmp(env: *mut JmpBuf, val: c_int) -> !;
}

// ── Signal handler ──────────────────────────────────────────────────────

/// Handler registered for every monitored fault signal.
extern "C" fn intercept(signo: c_int, info: *mut libc::siginfo_t, _ucontext: *mut c_void) {
    // SAFETY: a non-null slot always points at the RecoveryPoint of a live
    // frame on this thread; ActiveRegion clears it before that frame ends.
    if let Some(point) = unsafe { registry::current().as_ref() } {
        if point.disarm() {
            // SAFETY: info comes from the kernel for an SA_SIGINFO handler.
            point.record(signo, unsafe { fault_address(info) });
            // SAFETY: the buffer was filled by sigsetjmp in call_guarded,
            // whose frame is still on this thread's stack: the point was
            // armed, and call_guarded disarms it before returning.
            unsafe { siglongjmp(point.jmp_buf(), signo) };
        }
    }

    // Not inside a guarded region (or the recovery point was already
    // consumed): restore default handling and re-raise. The signal stays
    // blocked until this handler returns, then the default action runs.
    //
    // SAFETY: sigaction and raise are async-signal-safe; sa is fully
    // initialized.
    unsafe {
        let mut sa: libc::sigaction = mem::zeroed();
        sa.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(signo, &raw const sa, ptr::null_mut());
        libc::raise(signo);
    }
}

/// Faulting address from `siginfo_t`, or 0 when the signal was sent by
/// `kill`/`raise`/`sigqueue`, where `si_addr` overlays the sender's pid.
///
/// # Safety
///
/// `info` must be null or the pointer passed to an `SA_SIGINFO` handler.
#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fault_address(info: *const libc::siginfo_t) -> usize {
    // SAFETY: caller guarantees info is null or valid.
    match unsafe { info.as_ref() } {
        Some(info) if info.si_code > 0 => {
            // SAFETY: kernel-generated fault codes carry si_addr.
            unsafe { info.si_addr() as usize }
        }
        _ => 0,
    }
}

/// # Safety
///
/// `info` must be null or the pointer passed to an `SA_SIGINFO` handler.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn fault_address(info: *const libc::siginfo_t) -> usize {
    // SAFETY: caller guarantees info is null or valid.
    unsafe { info.as_ref() }.map_or(0, |info| info.si_addr as usize)
}

// ── Registration ────────────────────────────────────────────────────────

/// Register [`intercept`] for the signal of every kind in `faults`.
///
/// Called once per process by the installer. Never undone.
pub(crate) fn install(faults: &[FaultKind]) -> io::Result<()> {
    for signo in faults.iter().filter_map(|kind| kind.signal()) {
        // SAFETY: sa is fully initialized; signo is a valid fault signal.
        unsafe {
            let mut sa: libc::sigaction = mem::zeroed();
            sa.sa_flags = libc::SA_SIGINFO | libc::SA_ONSTACK;
            // Block everything while the handler runs; siglongjmp restores
            // the mask saved by sigsetjmp.
            libc::sigfillset(&raw mut sa.sa_mask);
            sa.sa_sigaction = intercept
                as extern "C" fn(c_int, *mut libc::siginfo_t, *mut c_void)
                as libc::sighandler_t;

            if libc::sigaction(signo, &raw const sa, ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
    }
    Ok(())
}

// ── Capture point ───────────────────────────────────────────────────────

/// Capture a resume point in `point`, then run `work`.
///
/// Returns 0 once `work` completes, or the raw signal number when the
/// interceptor resumed here after a fault. Kept out of line so the frame
/// that `sigsetjmp` returns into twice holds nothing but `code`.
///
/// # Safety
///
/// `point` must be the calling thread's active recovery point. Frames of
/// `work` between the fault and this call are abandoned without running
/// destructors.
#[inline(never)]
pub(crate) unsafe fn call_guarded(point: &RecoveryPoint, work: &mut dyn FnMut()) -> i32 {
    // SAFETY: the buffer belongs to `point`, which outlives this frame; the
    // interceptor only jumps to it while it is armed below.
    let code = unsafe { sigsetjmp(point.jmp_buf(), 1) };
    if code == 0 {
        point.arm();
        work();
        point.disarm();
    }
    code
}

// ── Alternate signal stack ──────────────────────────────────────────────

/// An `mmap`ed alternate signal stack with a guard page below it.
struct AltStack {
    mapping: *mut c_void,
    mapping_len: usize,
}

impl AltStack {
    fn map(size: usize) -> io::Result<Self> {
        // SAFETY: sysconf has no preconditions.
        let page = usize::try_from(unsafe { libc::sysconf(libc::_SC_PAGESIZE) }).unwrap_or(4096);
        let size = size.max(MIN_ALT_STACK_SIZE).next_multiple_of(page);
        let mapping_len = size + page;

        // SAFETY: a fresh private anonymous mapping; MAP_FAILED is checked.
        let mapping = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapping_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if mapping == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let stack = Self {
            mapping,
            mapping_len,
        };

        // SAFETY: the first page lies inside the mapping created above.
        if unsafe { libc::mprotect(mapping, page, libc::PROT_NONE) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let ss = libc::stack_t {
            // SAFETY: page < mapping_len, so the offset stays in bounds.
            ss_sp: unsafe { mapping.cast::<u8>().add(page) }.cast::<c_void>(),
            ss_flags: 0,
            ss_size: size,
        };
        // SAFETY: ss describes memory owned by `stack`.
        if unsafe { libc::sigaltstack(&raw const ss, ptr::null_mut()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(stack)
    }
}

impl Drop for AltStack {
    fn drop(&mut self) {
        let disable = libc::stack_t {
            ss_sp: ptr::null_mut(),
            ss_flags: libc::SS_DISABLE,
            ss_size: 0,
        };
        // SAFETY: disabling the alternate stack before unmapping it; the
        // thread is exiting, so no handler is running on it.
        unsafe {
            libc::sigaltstack(&raw const disable, ptr::null_mut());
            libc::munmap(self.mapping, self.mapping_len);
        }
    }
}

thread_local! {
    static ALT_STACK: RefCell<Option<AltStack>> = const { RefCell::new(None) };
}

/// Give the calling thread an alternate signal stack if it has none, so a
/// stack-overflow fault can still reach the handler. `size == 0` disables
/// this.
pub(crate) fn ensure_alt_stack(size: usize) {
    if size == 0 {
        return;
    }
    ALT_STACK.with(|slot| {
        if slot.borrow().is_some() {
            return;
        }

        // SAFETY: stack_t is plain data; all-zero is a valid out-value.
        let mut current: libc::stack_t = unsafe { mem::zeroed() };
        // SAFETY: querying only; current is a valid out-pointer.
        let ret = unsafe { libc::sigaltstack(ptr::null(), &raw mut current) };
        if ret == 0 && current.ss_flags & libc::SS_DISABLE == 0 {
            // Already provided, e.g. by std for threads it spawned.
            return;
        }

        match AltStack::map(size) {
            Ok(stack) => *slot.borrow_mut() = Some(stack),
            Err(e) => log::warn!(
                "failed to set up alternate signal stack, stack overflows will not be recovered: {e}"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jmp_buf_covers_platform_sigjmp_buf() {
        assert!(mem::size_of::<JmpBuf>() >= 200);
        assert_eq!(mem::align_of::<JmpBuf>(), 16);
    }

    #[test]
    fn alt_stack_installed_on_bare_thread() {
        std::thread::spawn(|| {
            ensure_alt_stack(64 * 1024);
            // SAFETY: stack_t is plain data.
            let mut current: libc::stack_t = unsafe { mem::zeroed() };
            // SAFETY: querying only; current is a valid out-pointer.
            let ret = unsafe { libc::sigaltstack(ptr::null(), &raw mut current) };
            assert_eq!(ret, 0);
            // Either ours or the one std set up for this thread.
            assert_eq!(current.ss_flags & libc::SS_DISABLE, 0);
            assert!(current.ss_size > 0);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn zero_size_leaves_thread_untouched() {
        std::thread::spawn(|| {
            ensure_alt_stack(0);
            ALT_STACK.with(|slot| assert!(slot.borrow().is_none()));
        })
        .join()
        .unwrap();
    }
}
