//! Shared fixtures for the sigguard integration tests.

#![allow(dead_code)]

use std::env;
use std::process::{Command, ExitStatus, Stdio};
use std::ptr;

/// Environment variable naming the test a child process should act out.
pub const CHILD_ENV: &str = "SIGGUARD_TEST_CHILD";

/// One anonymous page mapped with no access rights. Any read or write of
/// it faults.
pub struct NoAccessPage {
    ptr: *mut u8,
    len: usize,
}

impl NoAccessPage {
    pub fn new() -> Self {
        let len = usize::try_from(unsafe { libc::sysconf(libc::_SC_PAGESIZE) }).unwrap();
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        assert_ne!(ptr, libc::MAP_FAILED, "mmap of no-access page failed");
        Self {
            ptr: ptr.cast(),
            len,
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn addr(&self) -> usize {
        self.ptr as usize
    }
}

impl Drop for NoAccessPage {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.ptr.cast(), self.len) };
    }
}

/// The fault kind a no-access page read produces on this platform.
pub fn no_access_kind() -> sigguard::FaultKind {
    if cfg!(target_vendor = "apple") {
        sigguard::FaultKind::Bus
    } else {
        sigguard::FaultKind::Segmentation
    }
}

/// Whether this process is the child spawned for `test`.
pub fn is_child(test: &str) -> bool {
    env::var(CHILD_ENV).is_ok_and(|name| name == test)
}

/// Re-run only `test` from the current test binary in a child process.
pub fn spawn_child(test: &str) -> ExitStatus {
    Command::new(env::current_exe().unwrap())
        .args(["--exact", test, "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, test)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap()
}

/// Keep a child that is about to crash from writing a core file.
pub fn disable_core_dumps() {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) };
}
