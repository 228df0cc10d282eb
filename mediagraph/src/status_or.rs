// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! One-shot foreign result cells.
//!
//! The engine hands back union-like cells that are either an error status or
//! a single owned value. Extracting the value — or hitting the error —
//! destroys the foreign cell, so each cell yields at most once; a second
//! extraction fails with [`Error::UseAfterConsume`].

use std::marker::PhantomData;
use std::sync::Arc;

use crate::graph::GraphContext;
use crate::handle::RawHandle;
use crate::packet::PacketValue;
use crate::status::Status;
use crate::stream::OutputStreamPoller;
use crate::{Error, Result, StatusCode};

/// A foreign cell holding either an error status or one value of type `T`.
pub struct StatusOr<T: PacketValue> {
    handle: RawHandle,
    _marker: PhantomData<T>,
}

// Safety: the cell is exclusively owned plain data.
unsafe impl<T: PacketValue> Send for StatusOr<T> {}

impl<T: PacketValue> StatusOr<T> {
    pub(crate) unsafe fn from_raw(ptr: *mut mediagraph_sys::MgStatusOrValue) -> Self {
        Self {
            handle: RawHandle::owned("StatusOr", ptr.cast()),
            _marker: PhantomData,
        }
    }

    fn raw(&self) -> Result<*mut mediagraph_sys::MgStatusOrValue> {
        Ok(self.handle.get()?.cast())
    }

    /// Copy of the cell's status.
    pub fn status(&self) -> Result<Status> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrValueStatus(self.raw()?, &mut ptr)
        })?;
        if ptr.is_null() {
            return Err(Error::Other("cell returned no status".to_string()));
        }
        Ok(unsafe { Status::from_raw(ptr) })
    }

    /// Extracts the value, destroying the foreign cell.
    ///
    /// # Errors
    ///
    /// - [`Error::UseAfterConsume`] on a second extraction
    /// - [`Error::UnsupportedOperation`] when the cell reports that the
    ///   payload kind cannot be moved
    /// - [`Error::BadStatus`] for any other non-ok status
    ///
    /// The foreign cell is released on every path, success or failure.
    pub fn take(&mut self) -> Result<T> {
        let ptr = match self.raw() {
            Ok(ptr) => ptr,
            Err(Error::DisposedAccess(_)) => return Err(Error::UseAfterConsume("StatusOr")),
            Err(other) => return Err(other),
        };
        let outcome = (|| {
            let status = self.status()?;
            if !status.is_ok()? {
                let code = status.code()?;
                let message = status.message()?;
                return Err(match code {
                    StatusCode::Unimplemented => Error::UnsupportedOperation(message),
                    code => Error::BadStatus { code, message },
                });
            }
            unsafe { T::take_raw(ptr) }
        })();
        self.dispose();
        outcome
    }

    /// Releases the foreign cell. Idempotent.
    pub fn dispose(&self) {
        self.handle
            .dispose_with(|ptr| unsafe { mediagraph_sys::mgStatusOrValueDelete(ptr.cast()) });
    }
}

impl<T: PacketValue> Drop for StatusOr<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A foreign cell holding either an error status or an output stream
/// poller.
pub struct StatusOrPoller<T: PacketValue> {
    context: Arc<GraphContext>,
    handle: RawHandle,
    _marker: PhantomData<T>,
}

unsafe impl<T: PacketValue> Send for StatusOrPoller<T> {}

impl<T: PacketValue> StatusOrPoller<T> {
    pub(crate) unsafe fn from_raw(
        context: Arc<GraphContext>,
        ptr: *mut mediagraph_sys::MgStatusOrPoller,
    ) -> Self {
        Self {
            context,
            handle: RawHandle::owned("StatusOrPoller", ptr.cast()),
            _marker: PhantomData,
        }
    }

    fn raw(&self) -> Result<*mut mediagraph_sys::MgStatusOrPoller> {
        Ok(self.handle.get()?.cast())
    }

    /// Copy of the cell's status.
    pub fn status(&self) -> Result<Status> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrPollerStatus(self.raw()?, &mut ptr)
        })?;
        if ptr.is_null() {
            return Err(Error::Other("cell returned no status".to_string()));
        }
        Ok(unsafe { Status::from_raw(ptr) })
    }

    /// Extracts the poller, destroying the foreign cell.
    ///
    /// # Errors
    ///
    /// - [`Error::UseAfterConsume`] on a second extraction
    /// - [`Error::BadStatus`] when the binding failed (e.g. the stream name
    ///   is not declared by the graph)
    pub fn take(&mut self) -> Result<OutputStreamPoller<T>> {
        let ptr = match self.raw() {
            Ok(ptr) => ptr,
            Err(Error::DisposedAccess(_)) => return Err(Error::UseAfterConsume("StatusOrPoller")),
            Err(other) => return Err(other),
        };
        let outcome = (|| {
            self.status()?.to_result()?;
            let mut poller = std::ptr::null_mut();
            Error::from_return_code(unsafe {
                mediagraph_sys::mgStatusOrPollerValue(ptr, &mut poller)
            })?;
            if poller.is_null() {
                return Err(Error::Other("cell returned no poller".to_string()));
            }
            Ok(unsafe { OutputStreamPoller::from_raw(self.context.clone(), poller) })
        })();
        self.dispose();
        outcome
    }

    /// Releases the foreign cell. Idempotent.
    pub fn dispose(&self) {
        self.handle
            .dispose_with(|ptr| unsafe { mediagraph_sys::mgStatusOrPollerDelete(ptr.cast()) });
    }
}

impl<T: PacketValue> Drop for StatusOrPoller<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;

    #[test]
    fn take_yields_exactly_once() {
        let packet = Packet::new("one shot".to_string()).unwrap();
        let raw = packet.raw().unwrap();
        let mut cell = std::ptr::null_mut();
        let rc = unsafe { mediagraph_sys::mgPacketConsume(raw, &mut cell) };
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);

        let mut status_or = unsafe { StatusOr::<String>::from_raw(cell) };
        assert_eq!(status_or.take().unwrap(), "one shot");
        assert!(matches!(
            status_or.take(),
            Err(Error::UseAfterConsume("StatusOr"))
        ));
    }

    #[test]
    fn take_surfaces_the_error_status_and_disposes() {
        let packet = Packet::new(5_i32).unwrap();
        let raw = packet.raw().unwrap();
        let mut cell = std::ptr::null_mut();
        let rc = unsafe { mediagraph_sys::mgPacketConsume(raw, &mut cell) };
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);

        let mut status_or = unsafe { StatusOr::<i32>::from_raw(cell) };
        assert!(matches!(
            status_or.take(),
            Err(Error::UnsupportedOperation(_))
        ));
        // The failed extraction destroyed the cell too.
        assert!(matches!(
            status_or.take(),
            Err(Error::UseAfterConsume("StatusOr"))
        ));
    }
}
