// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! GPU buffer hand-off and the one-shot fence.
//!
//! A GPU-backed buffer produced inside the engine must not be read by the
//! host's rendering context before the producing context's commands retire.
//! A host mutex cannot order GPU pipelines, so retrieval hands out a
//! [`SyncPoint`]: a one-shot fence token that [`SyncPoint::wait`] blocks on
//! and then consumes.

use std::os::raw::c_int;

use crate::handle::RawHandle;
use crate::packet::{PacketValue, check_debug_type_name};
use crate::status::consume_status;
use crate::{Error, Result};

/// One-shot cross-context GPU fence token.
///
/// Created at buffer hand-off, consumed exactly once by [`SyncPoint::wait`];
/// re-waiting on a consumed token fails with [`Error::UseAfterConsume`].
pub struct SyncPoint {
    handle: RawHandle,
}

// Safety: the token is an exclusively owned handle to an engine fence.
unsafe impl Send for SyncPoint {}

impl SyncPoint {
    pub(crate) unsafe fn from_raw(ptr: *mut mediagraph_sys::MgSyncToken) -> Self {
        Self {
            handle: RawHandle::owned("SyncPoint", ptr.cast()),
        }
    }

    /// Blocks the calling thread until the producing context signals, then
    /// consumes the token.
    pub fn wait(&mut self) -> Result<()> {
        let ptr = match self.handle.get() {
            Ok(ptr) => ptr.cast(),
            Err(Error::DisposedAccess(_)) => return Err(Error::UseAfterConsume("SyncPoint")),
            Err(other) => return Err(other),
        };
        let mut status = std::ptr::null_mut();
        let outcome = Error::from_return_code(unsafe {
            mediagraph_sys::mgSyncTokenWait(ptr, &mut status)
        })
        .and_then(|_| unsafe { consume_status(status) });
        self.dispose();
        outcome
    }

    /// Releases the fence token without waiting. Idempotent.
    pub fn dispose(&self) {
        self.handle
            .dispose_with(|ptr| unsafe { mediagraph_sys::mgSyncTokenDelete(ptr.cast()) });
    }
}

impl Drop for SyncPoint {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A GPU-backed image buffer payload.
///
/// Retrieval from a packet copies the pixel data and attaches the producing
/// cycle's [`SyncPoint`]; wait on it before treating the contents as
/// complete.
pub struct GpuBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    sync: Option<SyncPoint>,
}

impl GpuBuffer {
    /// Builds a host-side buffer whose upload already completed (no fence).
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            sync: None,
        }
    }

    /// Takes the fence guarding the producing context, if any.
    ///
    /// Buffers created host-side carry none.
    pub fn take_sync_point(&mut self) -> Option<SyncPoint> {
        self.sync.take()
    }
}

impl PacketValue for GpuBuffer {
    const KIND: c_int = mediagraph_sys::MG_VALUE_GPU_BUFFER;

    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCreateGpuBuffer(
                self.width,
                self.height,
                self.data.as_ptr(),
                self.data.len(),
                timestamp,
                &mut ptr,
            )
        })?;
        Ok(ptr)
    }

    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self> {
        unsafe { check_debug_type_name(packet, "mg::GpuBuffer") }?;
        let mut info = mediagraph_sys::MgGpuBufferInfo::default();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketGetGpuBufferInfo(packet, &mut info)
        })?;
        let mut data = vec![0_u8; info.len];
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCopyGpuBuffer(packet, data.as_mut_ptr(), data.len())
        })?;
        let mut token = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketAcquireGpuFence(packet, &mut token)
        })?;
        if token.is_null() {
            return Err(Error::Other("packet returned no fence token".to_string()));
        }
        Ok(Self {
            width: info.width,
            height: info.height,
            data,
            sync: Some(unsafe { SyncPoint::from_raw(token) }),
        })
    }

    unsafe fn take_raw(cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self> {
        let mut info = mediagraph_sys::MgGpuBufferInfo::default();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrValueGpuBufferInfo(cell, &mut info)
        })?;
        let mut data = vec![0_u8; info.len];
        let mut token = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrValueTakeGpuBuffer(
                cell,
                data.as_mut_ptr(),
                data.len(),
                &mut token,
            )
        })?;
        if token.is_null() {
            return Err(Error::Other("cell returned no fence token".to_string()));
        }
        Ok(Self {
            width: info.width,
            height: info.height,
            data,
            sync: Some(unsafe { SyncPoint::from_raw(token) }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;

    #[test]
    fn host_buffer_round_trip_yields_a_signaled_fence() {
        let buffer = GpuBuffer::new(2, 2, vec![1, 2, 3, 4]);
        let packet = Packet::new(buffer).unwrap();

        let mut retrieved = packet.get().unwrap();
        assert_eq!(retrieved.width, 2);
        assert_eq!(retrieved.height, 2);
        assert_eq!(retrieved.data, vec![1, 2, 3, 4]);

        // Host-created buffers carry a pre-signaled fence: wait returns
        // immediately.
        let mut sync = retrieved.take_sync_point().expect("fence expected");
        sync.wait().unwrap();
    }

    #[test]
    fn sync_point_is_one_shot() {
        let packet = Packet::new(GpuBuffer::new(1, 1, vec![0])).unwrap();
        let mut buffer = packet.get().unwrap();
        let mut sync = buffer.take_sync_point().unwrap();

        sync.wait().unwrap();
        assert!(matches!(
            sync.wait(),
            Err(Error::UseAfterConsume("SyncPoint"))
        ));
    }

    #[test]
    fn consume_transfers_the_buffer_and_fence() {
        let mut packet =
            Packet::new(GpuBuffer::new(1, 1, vec![7])).unwrap();
        let mut buffer = packet.consume().unwrap();
        assert_eq!(buffer.data, vec![7]);
        buffer.take_sync_point().unwrap().wait().unwrap();
        assert!(packet.is_empty().unwrap());
    }
}
