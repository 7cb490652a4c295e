//! # Helper Module
//!
//! Client for the privileged helper process that performs operations the
//! unprivileged app cannot, such as writing fan control keys to the SMC.
//!
//! The helper is a remote, fallible collaborator: every call is bounded by a
//! timeout and its failures map onto the same taxonomy as the metric sources.
//! An `unauthorized` answer becomes [`Error::PermissionDenied`], a missing
//! helper socket becomes [`Error::SourceUnavailable`].
//!
//! [`Error::PermissionDenied`]: crate::Error::PermissionDenied
//! [`Error::SourceUnavailable`]: crate::Error::SourceUnavailable

mod client;
mod protocol;
#[cfg(unix)]
mod socket;

pub use client::{HelperClient, DEFAULT_TIMEOUT};
#[cfg(test)]
pub use protocol::MockHelperTransport;
pub use protocol::{FanMode, HelperRequest, HelperResponse, HelperTransport};
#[cfg(unix)]
pub use socket::{UnixSocketTransport, DEFAULT_SOCKET_PATH};
