// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Foreign status objects.

use std::ffi::CString;
use std::fmt;
use std::os::raw::c_int;

use crate::handle::{RawHandle, take_heap_string};
use crate::{Error, Result};

/// Status codes reported by the engine (absl-compatible code space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl StatusCode {
    pub(crate) fn from_raw(code: c_int) -> Self {
        match code {
            mediagraph_sys::MG_STATUS_OK => Self::Ok,
            mediagraph_sys::MG_STATUS_CANCELLED => Self::Cancelled,
            mediagraph_sys::MG_STATUS_INVALID_ARGUMENT => Self::InvalidArgument,
            mediagraph_sys::MG_STATUS_DEADLINE_EXCEEDED => Self::DeadlineExceeded,
            mediagraph_sys::MG_STATUS_NOT_FOUND => Self::NotFound,
            mediagraph_sys::MG_STATUS_ALREADY_EXISTS => Self::AlreadyExists,
            mediagraph_sys::MG_STATUS_PERMISSION_DENIED => Self::PermissionDenied,
            mediagraph_sys::MG_STATUS_RESOURCE_EXHAUSTED => Self::ResourceExhausted,
            mediagraph_sys::MG_STATUS_FAILED_PRECONDITION => Self::FailedPrecondition,
            mediagraph_sys::MG_STATUS_ABORTED => Self::Aborted,
            mediagraph_sys::MG_STATUS_OUT_OF_RANGE => Self::OutOfRange,
            mediagraph_sys::MG_STATUS_UNIMPLEMENTED => Self::Unimplemented,
            mediagraph_sys::MG_STATUS_INTERNAL => Self::Internal,
            mediagraph_sys::MG_STATUS_UNAVAILABLE => Self::Unavailable,
            mediagraph_sys::MG_STATUS_DATA_LOSS => Self::DataLoss,
            mediagraph_sys::MG_STATUS_UNAUTHENTICATED => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn raw(self) -> c_int {
        match self {
            Self::Ok => mediagraph_sys::MG_STATUS_OK,
            Self::Cancelled => mediagraph_sys::MG_STATUS_CANCELLED,
            Self::Unknown => mediagraph_sys::MG_STATUS_UNKNOWN,
            Self::InvalidArgument => mediagraph_sys::MG_STATUS_INVALID_ARGUMENT,
            Self::DeadlineExceeded => mediagraph_sys::MG_STATUS_DEADLINE_EXCEEDED,
            Self::NotFound => mediagraph_sys::MG_STATUS_NOT_FOUND,
            Self::AlreadyExists => mediagraph_sys::MG_STATUS_ALREADY_EXISTS,
            Self::PermissionDenied => mediagraph_sys::MG_STATUS_PERMISSION_DENIED,
            Self::ResourceExhausted => mediagraph_sys::MG_STATUS_RESOURCE_EXHAUSTED,
            Self::FailedPrecondition => mediagraph_sys::MG_STATUS_FAILED_PRECONDITION,
            Self::Aborted => mediagraph_sys::MG_STATUS_ABORTED,
            Self::OutOfRange => mediagraph_sys::MG_STATUS_OUT_OF_RANGE,
            Self::Unimplemented => mediagraph_sys::MG_STATUS_UNIMPLEMENTED,
            Self::Internal => mediagraph_sys::MG_STATUS_INTERNAL,
            Self::Unavailable => mediagraph_sys::MG_STATUS_UNAVAILABLE,
            Self::DataLoss => mediagraph_sys::MG_STATUS_DATA_LOSS,
            Self::Unauthenticated => mediagraph_sys::MG_STATUS_UNAUTHENTICATED,
        }
    }
}

/// A foreign-heap status object: an integer code plus message.
///
/// Wraps a pointer owned by (or borrowed from) the engine; released
/// deterministically via [`Status::dispose`] or on drop.
pub struct Status {
    handle: RawHandle,
}

// Safety: status objects are immutable after creation; the engine never
// touches them concurrently.
unsafe impl Send for Status {}

impl Status {
    /// Wraps an owned status pointer returned by the engine.
    pub(crate) unsafe fn from_raw(ptr: *mut mediagraph_sys::MgStatus) -> Self {
        Self {
            handle: RawHandle::owned("Status", ptr.cast()),
        }
    }

    /// Builds a new status object with the given code and message.
    pub fn new(code: StatusCode, message: &str) -> Result<Self> {
        let message = CString::new(message)?;
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusCreate(code.raw(), message.as_ptr(), &mut ptr)
        })?;
        if ptr.is_null() {
            return Err(Error::Other("failed to create status".to_string()));
        }
        Ok(unsafe { Self::from_raw(ptr) })
    }

    /// An ok status.
    pub fn ok() -> Result<Self> {
        Self::new(StatusCode::Ok, "")
    }

    /// A `FailedPrecondition` status, the conventional answer from observer
    /// callbacks that could not process a delivery.
    pub fn failed_precondition(message: &str) -> Result<Self> {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    fn raw(&self) -> Result<*mut mediagraph_sys::MgStatus> {
        Ok(self.handle.get()?.cast())
    }

    /// Whether the status is ok.
    pub fn is_ok(&self) -> Result<bool> {
        Ok(unsafe { mediagraph_sys::mgStatusOk(self.raw()?) })
    }

    /// The typed status code.
    pub fn code(&self) -> Result<StatusCode> {
        Ok(StatusCode::from_raw(self.raw_code()?))
    }

    /// The raw integer status code.
    pub fn raw_code(&self) -> Result<c_int> {
        Ok(unsafe { mediagraph_sys::mgStatusRawCode(self.raw()?) })
    }

    /// The status message (empty for ok statuses).
    pub fn message(&self) -> Result<String> {
        let ptr = self.raw()?;
        let mut text = std::ptr::null_mut();
        Error::from_return_code(unsafe { mediagraph_sys::mgStatusMessage(ptr, &mut text) })?;
        Ok(unsafe { take_heap_string(text) })
    }

    /// Converts the status into a [`Result`], mapping any non-ok code to
    /// [`Error::BadStatus`].
    pub fn to_result(&self) -> Result<()> {
        if self.is_ok()? {
            return Ok(());
        }
        Err(Error::BadStatus {
            code: self.code()?,
            message: self.message()?,
        })
    }

    /// Hands the owned foreign pointer back to the engine (used when a
    /// callback returns a status through the engine's own channel).
    pub(crate) fn into_raw(self) -> Result<*mut mediagraph_sys::MgStatus> {
        Ok(self.handle.release()?.cast())
    }

    /// Releases the foreign status object. Idempotent.
    pub fn dispose(&self) {
        self.handle
            .dispose_with(|ptr| unsafe { mediagraph_sys::mgStatusDelete(ptr.cast()) });
    }
}

impl Drop for Status {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raw() {
            Ok(ptr) => {
                let mut text = std::ptr::null_mut();
                let rc = unsafe { mediagraph_sys::mgStatusToString(ptr, &mut text) };
                if rc == mediagraph_sys::MG_RETURN_SUCCESS {
                    write!(f, "Status({})", unsafe { take_heap_string(text) })
                } else {
                    write!(f, "Status(<unreadable>)")
                }
            }
            Err(_) => write!(f, "Status(<disposed>)"),
        }
    }
}

/// Takes ownership of a status out-parameter and converts it to a
/// [`Result`]. The foreign object is always released.
pub(crate) unsafe fn consume_status(ptr: *mut mediagraph_sys::MgStatus) -> Result<()> {
    if ptr.is_null() {
        return Err(Error::Other(
            "foreign call returned no status object".to_string(),
        ));
    }
    unsafe { Status::from_raw(ptr) }.to_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_converts_to_ok() {
        let status = Status::ok().unwrap();
        assert!(status.is_ok().unwrap());
        assert!(status.to_result().is_ok());
    }

    #[test]
    fn error_status_carries_code_and_message() {
        let status = Status::failed_precondition("not ready").unwrap();
        assert_eq!(status.code().unwrap(), StatusCode::FailedPrecondition);
        assert_eq!(status.message().unwrap(), "not ready");
        match status.to_result() {
            Err(Error::BadStatus { code, message }) => {
                assert_eq!(code, StatusCode::FailedPrecondition);
                assert_eq!(message, "not ready");
            }
            other => panic!("expected BadStatus, got {other:?}"),
        }
    }

    #[test]
    fn disposed_status_fails_with_disposed_access() {
        let status = Status::ok().unwrap();
        status.dispose();
        status.dispose();
        assert!(matches!(
            status.is_ok(),
            Err(Error::DisposedAccess("Status"))
        ));
    }
}
