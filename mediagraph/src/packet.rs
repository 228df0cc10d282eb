// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Typed packets.
//!
//! A [`Packet`] wraps the engine's type-erased container; the generic
//! parameter is a host-side tag that picks the marshalling routines and is
//! validated against the engine's value kind at retrieval time. Reads come
//! in two flavors: [`Packet::get`] copies the payload and can be called
//! repeatedly, [`Packet::consume`] moves it out exactly once and leaves the
//! packet empty.

use std::marker::PhantomData;
use std::os::raw::c_int;

use crate::handle::{RawHandle, take_heap_string};
use crate::status::consume_status;
use crate::status_or::StatusOr;
use crate::{Error, Result, Timestamp};

/// Payload types that can travel through the graph in a [`Packet`].
///
/// Implemented for `bool`, `i32`, `f32`, `String`, `Vec<f32>` and
/// [`crate::GpuBuffer`]. The raw methods are binding plumbing; use the
/// [`Packet`] API instead of calling them directly.
pub trait PacketValue: Sized + Send + 'static {
    /// Engine value kind tag for this payload type.
    const KIND: c_int;

    /// Builds an engine packet owning this value at the given timestamp.
    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket>;

    /// Copies the payload out of a packet already validated to carry this
    /// kind.
    ///
    /// # Safety
    ///
    /// `packet` must point to a live engine packet.
    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self>;

    /// Moves the payload out of a consume cell whose status was ok.
    ///
    /// # Safety
    ///
    /// `cell` must point to a live consume cell.
    unsafe fn take_raw(cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self>;
}

/// One typed, timestamped unit of data flowing through the graph.
///
/// # Examples
///
/// ```no_run
/// use mediagraph::{Packet, Timestamp};
///
/// # fn main() -> Result<(), mediagraph::Error> {
/// let packet = Packet::new_at(42_i32, Timestamp::from_micros(1000))?;
/// assert_eq!(packet.get()?, 42);
/// assert_eq!(packet.timestamp()?, Timestamp::from_micros(1000));
/// # Ok(())
/// # }
/// ```
pub struct Packet<T: PacketValue> {
    handle: RawHandle,
    _marker: PhantomData<T>,
}

// Safety: engine packets are plain owned data; nothing ties them to the
// creating thread.
unsafe impl<T: PacketValue> Send for Packet<T> {}

impl<T: PacketValue> Packet<T> {
    /// Wraps an owned packet pointer returned by the engine.
    pub(crate) unsafe fn from_raw(ptr: *mut mediagraph_sys::MgPacket) -> Self {
        Self {
            handle: RawHandle::owned("Packet", ptr.cast()),
            _marker: PhantomData,
        }
    }

    /// Wraps a packet pointer the engine retains ownership of (observer
    /// callback deliveries).
    pub(crate) unsafe fn borrowed(ptr: *mut mediagraph_sys::MgPacket) -> Self {
        Self {
            handle: RawHandle::borrowed("Packet", ptr.cast()),
            _marker: PhantomData,
        }
    }

    /// Creates an empty packet with no payload and an unset timestamp.
    pub fn empty() -> Result<Self> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketCreate(&mut ptr) })?;
        if ptr.is_null() {
            return Err(Error::Other("failed to create packet".to_string()));
        }
        Ok(unsafe { Self::from_raw(ptr) })
    }

    /// Creates a packet carrying `value` with an unset timestamp.
    pub fn new(value: T) -> Result<Self> {
        Self::new_at(value, Timestamp::UNSET)
    }

    /// Creates a packet carrying `value` at the given timestamp.
    pub fn new_at(value: T, timestamp: Timestamp) -> Result<Self> {
        let ptr = value.create_raw(timestamp.micros())?;
        if ptr.is_null() {
            return Err(Error::Other("failed to create packet".to_string()));
        }
        Ok(unsafe { Self::from_raw(ptr) })
    }

    pub(crate) fn raw(&self) -> Result<*mut mediagraph_sys::MgPacket> {
        Ok(self.handle.get()?.cast())
    }

    /// Whether the packet carries no payload.
    ///
    /// Empty packets are a valid state: the engine delivers them as
    /// timestamp-bound notifications when a cycle produced no output.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(unsafe { mediagraph_sys::mgPacketIsEmpty(self.raw()?) })
    }

    /// The packet's timestamp.
    pub fn timestamp(&self) -> Result<Timestamp> {
        Ok(Timestamp::from_micros(unsafe {
            mediagraph_sys::mgPacketTimestamp(self.raw()?)
        }))
    }

    /// Copy of this packet carrying the given timestamp.
    pub fn at(&self, timestamp: Timestamp) -> Result<Self> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketAt(self.raw()?, timestamp.micros(), &mut ptr)
        })?;
        if ptr.is_null() {
            return Err(Error::Other("failed to copy packet".to_string()));
        }
        Ok(unsafe { Self::from_raw(ptr) })
    }

    /// The engine's debug name for the payload type.
    pub fn debug_type_name(&self) -> Result<String> {
        let ptr = self.raw()?;
        let mut text = std::ptr::null_mut();
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketDebugTypeName(ptr, &mut text) })?;
        Ok(unsafe { take_heap_string(text) })
    }

    /// Reads the payload without transferring ownership.
    ///
    /// Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyPacket`] if the packet carries no payload
    /// - [`Error::BadStatus`] if the payload kind does not match `T`
    pub fn get(&self) -> Result<T> {
        let ptr = self.raw()?;
        if unsafe { mediagraph_sys::mgPacketIsEmpty(ptr) } {
            return Err(Error::EmptyPacket);
        }
        let mut status = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketValidateKind(ptr, T::KIND, &mut status)
        })?;
        unsafe { consume_status(status) }?;
        unsafe { T::read_raw(ptr) }
    }

    /// Destructively reads the payload, leaving the packet empty.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyPacket`] if the packet carries no payload (including
    ///   a packet that was already consumed)
    /// - [`Error::UnsupportedOperation`] if the payload kind does not
    ///   support move extraction (scalars are copy-only)
    pub fn consume(&mut self) -> Result<T> {
        let ptr = self.raw()?;
        if unsafe { mediagraph_sys::mgPacketIsEmpty(ptr) } {
            return Err(Error::EmptyPacket);
        }
        let mut cell = std::ptr::null_mut();
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketConsume(ptr, &mut cell) })?;
        if cell.is_null() {
            return Err(Error::Other("consume returned no result cell".to_string()));
        }
        unsafe { StatusOr::<T>::from_raw(cell) }.take()
    }

    /// Relinquishes ownership of the engine packet, handing the pointer to
    /// its new owner (used when a packet is moved into the graph).
    pub(crate) fn release(&self) -> Result<*mut mediagraph_sys::MgPacket> {
        Ok(self.handle.release()?.cast())
    }

    /// Releases the engine packet. Idempotent.
    pub fn dispose(&self) {
        self.handle
            .dispose_with(|ptr| unsafe { mediagraph_sys::mgPacketDelete(ptr.cast()) });
    }
}

impl<T: PacketValue> Drop for Packet<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl PacketValue for bool {
    const KIND: c_int = mediagraph_sys::MG_VALUE_BOOL;

    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCreateBool(self, timestamp, &mut ptr)
        })?;
        Ok(ptr)
    }

    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self> {
        let mut value = false;
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketGetBool(packet, &mut value) })?;
        Ok(value)
    }

    unsafe fn take_raw(_cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self> {
        Err(Error::UnsupportedOperation(
            "bool packets do not support move extraction".to_string(),
        ))
    }
}

impl PacketValue for i32 {
    const KIND: c_int = mediagraph_sys::MG_VALUE_INT;

    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCreateInt(self, timestamp, &mut ptr)
        })?;
        Ok(ptr)
    }

    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self> {
        let mut value = 0;
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketGetInt(packet, &mut value) })?;
        Ok(value)
    }

    unsafe fn take_raw(_cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self> {
        Err(Error::UnsupportedOperation(
            "int packets do not support move extraction".to_string(),
        ))
    }
}

impl PacketValue for f32 {
    const KIND: c_int = mediagraph_sys::MG_VALUE_FLOAT;

    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCreateFloat(self, timestamp, &mut ptr)
        })?;
        Ok(ptr)
    }

    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self> {
        let mut value = 0.0;
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketGetFloat(packet, &mut value) })?;
        Ok(value)
    }

    unsafe fn take_raw(_cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self> {
        Err(Error::UnsupportedOperation(
            "float packets do not support move extraction".to_string(),
        ))
    }
}

impl PacketValue for String {
    const KIND: c_int = mediagraph_sys::MG_VALUE_STRING;

    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket> {
        let text = std::ffi::CString::new(self)?;
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCreateString(text.as_ptr(), timestamp, &mut ptr)
        })?;
        Ok(ptr)
    }

    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self> {
        // Structural validation cannot tell strings from other buffers on
        // every engine build, so double-check the debug type name.
        unsafe { check_debug_type_name(packet, "std::string") }?;
        let mut text = std::ptr::null_mut();
        Error::from_return_code(unsafe { mediagraph_sys::mgPacketGetString(packet, &mut text) })?;
        Ok(unsafe { take_heap_string(text) })
    }

    unsafe fn take_raw(cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self> {
        let mut text = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrValueTakeString(cell, &mut text)
        })?;
        Ok(unsafe { take_heap_string(text) })
    }
}

impl PacketValue for Vec<f32> {
    const KIND: c_int = mediagraph_sys::MG_VALUE_FLOAT_VECTOR;

    fn create_raw(self, timestamp: i64) -> Result<*mut mediagraph_sys::MgPacket> {
        let mut ptr = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCreateFloatVector(self.as_ptr(), self.len(), timestamp, &mut ptr)
        })?;
        Ok(ptr)
    }

    unsafe fn read_raw(packet: *mut mediagraph_sys::MgPacket) -> Result<Self> {
        unsafe { check_debug_type_name(packet, "std::vector<float>") }?;
        let mut len = 0;
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketGetFloatVectorLen(packet, &mut len)
        })?;
        let mut values = vec![0.0; len];
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPacketCopyFloatVector(packet, values.as_mut_ptr(), values.len())
        })?;
        Ok(values)
    }

    unsafe fn take_raw(cell: *mut mediagraph_sys::MgStatusOrValue) -> Result<Self> {
        let mut len = 0;
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrValueFloatVectorLen(cell, &mut len)
        })?;
        let mut values = vec![0.0; len];
        Error::from_return_code(unsafe {
            mediagraph_sys::mgStatusOrValueTakeFloatVector(cell, values.as_mut_ptr(), values.len())
        })?;
        Ok(values)
    }
}

/// Verifies the engine's debug type name for payloads whose structure alone
/// is ambiguous.
pub(crate) unsafe fn check_debug_type_name(
    packet: *mut mediagraph_sys::MgPacket,
    expected: &str,
) -> Result<()> {
    let mut text = std::ptr::null_mut();
    Error::from_return_code(unsafe { mediagraph_sys::mgPacketDebugTypeName(packet, &mut text) })?;
    let actual = unsafe { take_heap_string(text) };
    if actual != expected {
        return Err(Error::UnsupportedOperation(format!(
            "packet carries {actual}, expected {expected}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    #[test]
    fn empty_packet_reports_emptiness() {
        let packet = Packet::<i32>::empty().unwrap();
        assert!(packet.is_empty().unwrap());
        assert_eq!(packet.timestamp().unwrap(), Timestamp::UNSET);
        assert!(matches!(packet.get(), Err(Error::EmptyPacket)));
    }

    #[test]
    fn empty_packet_consume_is_a_typed_error() {
        let mut packet = Packet::<String>::empty().unwrap();
        assert!(matches!(packet.consume(), Err(Error::EmptyPacket)));
    }

    #[test]
    fn get_is_repeatable() {
        let packet = Packet::new(7_i32).unwrap();
        assert_eq!(packet.get().unwrap(), 7);
        assert_eq!(packet.get().unwrap(), 7);
        assert!(!packet.is_empty().unwrap());
    }

    #[test]
    fn get_rejects_kind_mismatch() {
        let packet = Packet::new(1.5_f32).unwrap();
        // Reinterpret the same engine packet under a different tag.
        let raw = packet.raw().unwrap();
        let alias = unsafe { Packet::<i32>::borrowed(raw) };
        match alias.get() {
            Err(Error::BadStatus { code, .. }) => {
                assert_eq!(code, StatusCode::InvalidArgument);
            }
            other => panic!("expected BadStatus, got {other:?}"),
        }
    }

    #[test]
    fn consume_moves_out_once() {
        let mut packet = Packet::new("payload".to_string()).unwrap();
        assert_eq!(packet.consume().unwrap(), "payload");
        assert!(packet.is_empty().unwrap());
        assert!(matches!(packet.consume(), Err(Error::EmptyPacket)));
    }

    #[test]
    fn consume_rejects_copy_only_kinds() {
        let mut packet = Packet::new(true).unwrap();
        assert!(matches!(
            packet.consume(),
            Err(Error::UnsupportedOperation(_))
        ));
        // The payload is still there: consume must not have destroyed it.
        assert!(packet.get().unwrap());
    }

    #[test]
    fn float_vector_round_trip() {
        let packet = Packet::new_at(vec![1.0_f32, 2.0, 3.0], Timestamp::from_micros(5)).unwrap();
        assert_eq!(packet.get().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(packet.debug_type_name().unwrap(), "std::vector<float>");
    }

    #[test]
    fn disposed_packet_fails_with_disposed_access() {
        let packet = Packet::new(1_i32).unwrap();
        packet.dispose();
        packet.dispose();
        assert!(matches!(packet.get(), Err(Error::DisposedAccess("Packet"))));
    }

    #[test]
    fn packet_at_copies_with_new_timestamp() {
        let packet = Packet::new(3_i32).unwrap();
        let copy = packet.at(Timestamp::from_micros(99)).unwrap();
        assert_eq!(copy.timestamp().unwrap(), Timestamp::from_micros(99));
        assert_eq!(copy.get().unwrap(), 3);
        assert_eq!(packet.timestamp().unwrap(), Timestamp::UNSET);
    }
}
