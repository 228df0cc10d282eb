// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Synchronous, blocking output retrieval.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::graph::GraphContext;
use crate::handle::RawHandle;
use crate::packet::{Packet, PacketValue};
use crate::{Error, Result};

/// Blocking pull handle bound to one named output stream.
///
/// Obtained through [`crate::Graph::add_output_stream_poller`]. `next`
/// blocks the calling thread inside the engine until a packet arrives or
/// the stream is closed; there is no per-call timeout. Access is serialized
/// by `&mut self` — a poller cannot be polled from two threads at once, and
/// it cannot be disposed while a `next` call is in flight.
///
/// # Examples
///
/// ```no_run
/// # use mediagraph::{Graph, Packet};
/// # fn example(graph: Graph) -> Result<(), mediagraph::Error> {
/// let mut poller = graph.add_output_stream_poller::<i32>("output", false)?.take()?;
/// let mut packet = Packet::<i32>::empty()?;
/// while poller.next(&mut packet)? {
///     println!("output: {}", packet.get()?);
/// }
/// // false: the stream is closed and drained.
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OutputStreamPoller<T: PacketValue> {
    /// Keeps the engine graph alive for as long as the poller exists.
    _context: Arc<GraphContext>,
    handle: RawHandle,
    _marker: PhantomData<T>,
}

// Safety: pollers are not thread-safe (no Sync) but can be transferred
// across threads.
unsafe impl<T: PacketValue> Send for OutputStreamPoller<T> {}

impl<T: PacketValue> OutputStreamPoller<T> {
    pub(crate) unsafe fn from_raw(
        context: Arc<GraphContext>,
        ptr: *mut mediagraph_sys::MgPoller,
    ) -> Self {
        Self {
            _context: context,
            handle: RawHandle::owned("OutputStreamPoller", ptr.cast()),
            _marker: PhantomData,
        }
    }

    fn raw(&self) -> Result<*mut mediagraph_sys::MgPoller> {
        Ok(self.handle.get()?.cast())
    }

    /// Blocks until the next packet is available and stores it in
    /// `packet`.
    ///
    /// Returns `Ok(false)` — never an error, never an indefinite block —
    /// once the stream is closed and drained, including calls made after
    /// closure.
    pub fn next(&mut self, packet: &mut Packet<T>) -> Result<bool> {
        let poller = self.raw()?;
        let raw_packet = packet.raw()?;
        let mut ok = false;
        Error::from_return_code(unsafe {
            mediagraph_sys::mgPollerNext(poller, raw_packet, &mut ok)
        })?;
        Ok(ok)
    }

    /// Number of packets queued and not yet retrieved.
    pub fn queue_size(&self) -> Result<usize> {
        Ok(unsafe { mediagraph_sys::mgPollerQueueSize(self.raw()?) }.max(0) as usize)
    }

    /// Releases the engine poller. Idempotent.
    pub fn dispose(&self) {
        self.handle
            .dispose_with(|ptr| unsafe { mediagraph_sys::mgPollerDelete(ptr.cast()) });
    }
}

impl<T: PacketValue> Drop for OutputStreamPoller<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
