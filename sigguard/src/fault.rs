//! Fault taxonomy: raw platform fault codes mapped to portable kinds.
//!
//! Every raw code the interceptor can receive maps to exactly one
//! [`FaultKind`]. Codes with no closer category fall into
//! [`FaultKind::Unknown`]. The Windows structured-exception mapping is
//! compiled on every target so it stays testable, even though only the
//! unix strategy registers an interceptor.

use std::ffi::CStr;
use std::fmt;
use std::str::FromStr;

// ── POSIX signal numbers ────────────────────────────────────────────────

#[cfg(unix)]
mod posix {
    pub(super) use libc::{SIGBUS, SIGFPE, SIGILL, SIGSEGV, SIGTRAP};
}

// Non-unix targets have no SIGBUS/SIGTRAP in libc. Use the Linux numbers so
// `from_signal` keeps one table.
#[cfg(not(unix))]
mod posix {
    pub(super) const SIGILL: i32 = 4;
    pub(super) const SIGTRAP: i32 = 5;
    pub(super) const SIGBUS: i32 = 7;
    pub(super) const SIGFPE: i32 = 8;
    pub(super) const SIGSEGV: i32 = 11;
}

// ── Windows exception codes ─────────────────────────────────────────────

const EXCEPTION_GUARD_PAGE: u32 = 0x8000_0001;
const EXCEPTION_DATATYPE_MISALIGNMENT: u32 = 0x8000_0002;
const EXCEPTION_BREAKPOINT: u32 = 0x8000_0003;
const EXCEPTION_SINGLE_STEP: u32 = 0x8000_0004;
const EXCEPTION_ACCESS_VIOLATION: u32 = 0xC000_0005;
const EXCEPTION_IN_PAGE_ERROR: u32 = 0xC000_0006;
const EXCEPTION_ILLEGAL_INSTRUCTION: u32 = 0xC000_001D;
const EXCEPTION_ARRAY_BOUNDS_EXCEEDED: u32 = 0xC000_008C;
const EXCEPTION_FLT_DENORMAL_OPERAND: u32 = 0xC000_008D;
const EXCEPTION_FLT_DIVIDE_BY_ZERO: u32 = 0xC000_008E;
const EXCEPTION_FLT_INEXACT_RESULT: u32 = 0xC000_008F;
const EXCEPTION_FLT_INVALID_OPERATION: u32 = 0xC000_0090;
const EXCEPTION_FLT_OVERFLOW: u32 = 0xC000_0091;
const EXCEPTION_FLT_STACK_CHECK: u32 = 0xC000_0092;
const EXCEPTION_FLT_UNDERFLOW: u32 = 0xC000_0093;
const EXCEPTION_INT_DIVIDE_BY_ZERO: u32 = 0xC000_0094;
const EXCEPTION_INT_OVERFLOW: u32 = 0xC000_0095;
const EXCEPTION_PRIV_INSTRUCTION: u32 = 0xC000_0096;
const EXCEPTION_STACK_OVERFLOW: u32 = 0xC000_00FD;

// ── FaultKind ───────────────────────────────────────────────────────────

/// Portable classification of a synchronous hardware fault.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaultKind {
    /// Invalid memory access (`SIGSEGV`, access violation, guard page,
    /// stack overflow).
    Segmentation = 1,
    /// Bus error (`SIGBUS`, misaligned access, truncated mapping).
    Bus = 2,
    /// Arithmetic exception (`SIGFPE`, integer divide-by-zero, float traps).
    Arithmetic = 3,
    /// Illegal or privileged instruction (`SIGILL`).
    IllegalInstruction = 4,
    /// Trap or breakpoint (`SIGTRAP`).
    Trap = 5,
    /// Illegal operation with no closer category.
    Unknown = 0,
}

impl FaultKind {
    /// Kinds the interceptor can be registered for, in registration order.
    pub const HARDWARE: [FaultKind; 5] = [
        FaultKind::Segmentation,
        FaultKind::Bus,
        FaultKind::Arithmetic,
        FaultKind::IllegalInstruction,
        FaultKind::Trap,
    ];

    /// Map a POSIX signal number to its kind.
    #[must_use]
    pub fn from_signal(signal: i32) -> Self {
        match signal {
            posix::SIGSEGV => Self::Segmentation,
            posix::SIGBUS => Self::Bus,
            posix::SIGFPE => Self::Arithmetic,
            posix::SIGILL => Self::IllegalInstruction,
            posix::SIGTRAP => Self::Trap,
            _ => Self::Unknown,
        }
    }

    /// Map a Windows structured-exception code to its kind.
    ///
    /// Finer distinctions (guard page vs. stack overflow, the individual
    /// floating-point conditions) collapse into the nearest kind.
    #[must_use]
    pub fn from_exception_code(code: u32) -> Self {
        match code {
            EXCEPTION_ACCESS_VIOLATION
            | EXCEPTION_GUARD_PAGE
            | EXCEPTION_STACK_OVERFLOW
            | EXCEPTION_IN_PAGE_ERROR
            | EXCEPTION_ARRAY_BOUNDS_EXCEEDED => Self::Segmentation,
            EXCEPTION_DATATYPE_MISALIGNMENT => Self::Bus,
            EXCEPTION_FLT_DENORMAL_OPERAND
            | EXCEPTION_FLT_DIVIDE_BY_ZERO
            | EXCEPTION_FLT_INEXACT_RESULT
            | EXCEPTION_FLT_INVALID_OPERATION
            | EXCEPTION_FLT_OVERFLOW
            | EXCEPTION_FLT_STACK_CHECK
            | EXCEPTION_FLT_UNDERFLOW
            | EXCEPTION_INT_DIVIDE_BY_ZERO
            | EXCEPTION_INT_OVERFLOW => Self::Arithmetic,
            EXCEPTION_ILLEGAL_INSTRUCTION | EXCEPTION_PRIV_INSTRUCTION => {
                Self::IllegalInstruction
            }
            EXCEPTION_BREAKPOINT | EXCEPTION_SINGLE_STEP => Self::Trap,
            _ => Self::Unknown,
        }
    }

    /// The POSIX signal that delivers this kind, if any.
    #[must_use]
    pub fn signal(self) -> Option<i32> {
        match self {
            Self::Segmentation => Some(posix::SIGSEGV),
            Self::Bus => Some(posix::SIGBUS),
            Self::Arithmetic => Some(posix::SIGFPE),
            Self::IllegalInstruction => Some(posix::SIGILL),
            Self::Trap => Some(posix::SIGTRAP),
            Self::Unknown => None,
        }
    }

    /// Stable symbolic name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Segmentation => "segmentation fault",
            Self::Bus => "bus",
            Self::Arithmetic => "arithmetic_exception",
            Self::IllegalInstruction => "illegal",
            Self::Trap => "trap",
            Self::Unknown => "unknown",
        }
    }

    /// [`name`](Self::name) as a static NUL-terminated string for C callers.
    #[must_use]
    pub fn c_name(self) -> &'static CStr {
        match self {
            Self::Segmentation => c"segmentation fault",
            Self::Bus => c"bus",
            Self::Arithmetic => c"arithmetic_exception",
            Self::IllegalInstruction => c"illegal",
            Self::Trap => c"trap",
            Self::Unknown => c"unknown",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a fault kind name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFaultKindError(String);

impl fmt::Display for ParseFaultKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized fault kind `{}`", self.0)
    }
}

impl std::error::Error for ParseFaultKindError {}

impl FromStr for FaultKind {
    type Err = ParseFaultKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "segv" | "sigsegv" | "segmentation" | "segmentation fault" => Ok(Self::Segmentation),
            "bus" | "sigbus" => Ok(Self::Bus),
            "fpe" | "sigfpe" | "arithmetic" | "arithmetic_exception" => Ok(Self::Arithmetic),
            "ill" | "sigill" | "illegal" => Ok(Self::IllegalInstruction),
            "trap" | "sigtrap" => Ok(Self::Trap),
            _ => Err(ParseFaultKindError(s.to_owned())),
        }
    }
}

// ── Signal names ────────────────────────────────────────────────────────

/// Descriptive name for any standard POSIX signal number, `"unknown"`
/// otherwise.
///
/// Covers the asynchronous signals too, so a raw code that reached a
/// caller through some other path still renders readably.
#[must_use]
pub fn signal_name(signal: i32) -> &'static str {
    signal_c_name(signal).to_str().unwrap_or("unknown")
}

/// [`signal_name`] as a static NUL-terminated string for C callers.
#[cfg(unix)]
#[must_use]
pub fn signal_c_name(signal: i32) -> &'static CStr {
    match signal {
        libc::SIGABRT => c"abort",
        libc::SIGALRM => c"alarm",
        libc::SIGFPE => c"floating_point_exception",
        libc::SIGHUP => c"hangup",
        libc::SIGILL => c"illegal",
        libc::SIGINT => c"interrupt",
        libc::SIGKILL => c"kill",
        libc::SIGPIPE => c"pipe",
        libc::SIGQUIT => c"quit",
        libc::SIGSEGV => c"segmentation fault",
        libc::SIGTERM => c"terminate",
        libc::SIGUSR1 => c"user1",
        libc::SIGUSR2 => c"user2",
        libc::SIGCHLD => c"child",
        libc::SIGCONT => c"cont",
        libc::SIGSTOP => c"stop",
        libc::SIGTSTP => c"terminal_stop",
        libc::SIGTTIN => c"terminal_in",
        libc::SIGTTOU => c"terminal_out",
        libc::SIGBUS => c"bus",
        #[cfg(any(target_os = "linux", target_os = "android"))]
        libc::SIGPOLL => c"poll",
        libc::SIGPROF => c"profiler",
        libc::SIGSYS => c"system_call",
        libc::SIGTRAP => c"trap",
        libc::SIGURG => c"urgent_data",
        libc::SIGVTALRM => c"virtual_timer",
        libc::SIGXCPU => c"cpu_limit",
        libc::SIGXFSZ => c"file_size_limit",
        _ => c"unknown",
    }
}

/// [`signal_name`] as a static NUL-terminated string. Only the fault
/// signals are known off unix.
#[cfg(not(unix))]
#[must_use]
pub fn signal_c_name(signal: i32) -> &'static CStr {
    match signal {
        posix::SIGFPE => c"floating_point_exception",
        _ => FaultKind::from_signal(signal).c_name(),
    }
}

// ── Fault ───────────────────────────────────────────────────────────────

/// An intercepted fault: the portable error value handed back to callers.
///
/// Compares equal to its [`FaultKind`] so callers can branch directly:
///
/// ```
/// use sigguard::{Fault, FaultKind};
///
/// let fault = Fault::from(FaultKind::Bus);
/// assert_eq!(fault, FaultKind::Bus);
/// assert_ne!(fault, FaultKind::Segmentation);
/// assert_eq!(fault.category(), "signal");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fault {
    kind: FaultKind,
    code: i32,
    address: Option<usize>,
}

impl Fault {
    /// Category name shared by every fault value.
    pub const CATEGORY: &'static str = "signal";

    /// Build a fault from a raw signal number.
    #[must_use]
    pub fn from_signal(signal: i32) -> Self {
        Self {
            kind: FaultKind::from_signal(signal),
            code: signal,
            address: None,
        }
    }

    /// Build a fault from a Windows structured-exception code.
    #[must_use]
    pub fn from_exception_code(code: u32) -> Self {
        Self {
            kind: FaultKind::from_exception_code(code),
            code: i32::from_ne_bytes(code.to_ne_bytes()),
            address: None,
        }
    }

    /// Attach the faulting address. Zero means "not reported".
    #[must_use]
    pub fn with_address(mut self, address: usize) -> Self {
        self.address = (address != 0).then_some(address);
        self
    }

    /// The portable kind.
    #[must_use]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// The raw platform code that produced this fault.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Faulting memory address, when the kernel reported one.
    #[must_use]
    pub fn address(&self) -> Option<usize> {
        self.address
    }

    /// Always `"signal"`.
    #[must_use]
    pub fn category(&self) -> &'static str {
        Self::CATEGORY
    }

    /// Symbolic name of the kind, e.g. `"segmentation fault"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

impl From<FaultKind> for Fault {
    fn from(kind: FaultKind) -> Self {
        Self {
            kind,
            code: kind.signal().unwrap_or(0),
            address: None,
        }
    }
}

impl PartialEq<FaultKind> for Fault {
    fn eq(&self, other: &FaultKind) -> bool {
        self.kind == *other
    }
}

impl PartialEq<Fault> for FaultKind {
    fn eq(&self, other: &Fault) -> bool {
        *self == other.kind
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.kind, Self::CATEGORY, self.code)?;
        if let Some(addr) = self.address {
            write!(f, " at {addr:#x}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}
