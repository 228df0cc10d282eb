// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for MediaGraph operations.
//!
//! This module defines the error types returned by the binding layer,
//! mapping foreign return codes and status objects to idiomatic Rust error
//! enums.

use crate::status::StatusCode;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when using the MediaGraph API.
///
/// Foreign return codes are checked at the binding boundary and converted
/// immediately; a non-ok engine status surfaces as [`Error::BadStatus`]
/// carrying the foreign code so callers can branch on specific conditions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was attempted on a handle that has been disposed.
    ///
    /// Always a programming error; never recovered.
    #[error("{0} was accessed after disposal")]
    DisposedAccess(&'static str),

    /// A foreign call completed but reported a non-ok status.
    #[error("bad status {code:?}: {message}")]
    BadStatus {
        /// The foreign status code.
        code: StatusCode,
        /// The foreign status message.
        message: String,
    },

    /// A structurally invalid operation (e.g. consuming a packet whose
    /// content type does not support move extraction).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A stream or tag name failed grammar validation. Caught before any
    /// foreign call is attempted.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A packet carrying no payload was read. Benign and expected; callers
    /// check for it rather than treating it as exceptional.
    #[error("packet is empty")]
    EmptyPacket,

    /// A one-shot object was used a second time.
    #[error("{0} was already consumed")]
    UseAfterConsume(&'static str),

    /// The engine aborted the call.
    #[error("foreign call aborted")]
    Aborted,

    /// An unrecognized foreign return code.
    #[error("unknown foreign return code {0}")]
    Unknown(mediagraph_sys::ReturnCode),

    /// A generic error for Rust-level failures not directly mapped to a
    /// foreign code (e.g. unexpected null out-parameters).
    #[error("other error: {0}")]
    Other(String),

    /// Failed to convert a Rust string to a C-compatible null-terminated
    /// string.
    #[error("null string: {0}")]
    NulString(#[from] std::ffi::NulError),
}

impl Error {
    /// Converts a foreign return code to a Rust [`Result`].
    ///
    /// The return code describes the call machinery only; domain failures
    /// travel as status objects and are converted separately.
    pub(crate) fn from_return_code(code: mediagraph_sys::ReturnCode) -> Result<()> {
        match code {
            mediagraph_sys::MG_RETURN_SUCCESS => Ok(()),
            mediagraph_sys::MG_RETURN_STANDARD_ERROR => {
                Err(Error::Other("foreign call failed".to_string()))
            }
            mediagraph_sys::MG_RETURN_ABORTED => Err(Error::Aborted),
            other => Err(Error::Unknown(other)),
        }
    }
}
