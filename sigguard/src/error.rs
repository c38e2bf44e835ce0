//! Error type returned by guarded execution.

use std::fmt;
use std::io;

use crate::fault::{Fault, FaultKind};

/// Errors from [`run`](crate::run), [`copy`](crate::copy) and installation.
#[derive(Debug)]
pub enum Error {
    /// A monitored fault aborted the guarded work.
    Fault(Fault),
    /// A guarded region was already active on this thread. The work was not
    /// started and the active region is untouched.
    NestedRegion,
    /// Registering the interceptor with the operating system failed.
    Install(io::Error),
    /// [`configure`](crate::configure) was called after the configuration
    /// was already fixed.
    AlreadyConfigured,
}

impl Error {
    /// The fault kind, if this error is an intercepted fault.
    #[must_use]
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Fault(fault) => Some(fault.kind()),
            _ => None,
        }
    }

    /// The intercepted fault, if any.
    #[must_use]
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "guarded work aborted by {fault}"),
            Self::NestedRegion => {
                write!(f, "a guarded region is already active on this thread")
            }
            Self::Install(e) => write!(f, "failed to install fault interceptor: {e}"),
            Self::AlreadyConfigured => {
                write!(f, "fault interceptor configuration is already fixed")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fault(fault) => Some(fault),
            Self::Install(e) => Some(e),
            Self::NestedRegion | Self::AlreadyConfigured => None,
        }
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Install(e)
    }
}

impl PartialEq<FaultKind> for Error {
    fn eq(&self, other: &FaultKind) -> bool {
        self.fault_kind() == Some(*other)
    }
}
