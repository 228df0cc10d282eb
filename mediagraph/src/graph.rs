// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Graph lifecycle management.
//!
//! This module provides [`Graph`], the entry point for running a processing
//! graph: configure, bind output streams, start the run, push input packets
//! and wait for completion.

use std::ffi::CString;
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::name::parse_tag_index_name;
use crate::packet::{Packet, PacketValue};
use crate::status::consume_status;
use crate::status_or::StatusOrPoller;
use crate::{Error, Result};

/// Internal shared context for a graph.
///
/// Stores the raw engine pointer, separated from [`Graph`] so pollers and
/// output streams can keep the engine instance alive independently of the
/// handle they were created from.
#[derive(Debug)]
pub(crate) struct GraphContext {
    graph: *mut mediagraph_sys::MgGraph,
}

// Safety: the engine synchronizes all graph-level operations internally;
// multiple threads can safely drive one graph concurrently.
unsafe impl Send for GraphContext {}
unsafe impl Sync for GraphContext {}

impl GraphContext {
    pub(crate) fn raw(&self) -> *mut mediagraph_sys::MgGraph {
        self.graph
    }
}

impl Drop for GraphContext {
    /// Deletes the engine graph when the last reference is dropped,
    /// cancelling and joining a still-running worker.
    fn drop(&mut self) {
        if !self.graph.is_null() {
            unsafe { mediagraph_sys::mgGraphDelete(self.graph) };
        }
    }
}

/// A configured processing graph and its run lifecycle.
///
/// The graph executes on an engine-owned worker thread. Output is retrieved
/// either by blocking pull ([`Graph::add_output_stream_poller`]) or by an
/// asynchronous [`crate::OutputStream`]; both must be bound before
/// [`Graph::start_run`].
///
/// `Graph` is cheaply cloneable (`Send + Sync`); all clones drive the same
/// engine instance.
///
/// # Examples
///
/// ```no_run
/// use mediagraph::{Graph, GraphConfig, Packet, Timestamp};
///
/// # fn main() -> Result<(), mediagraph::Error> {
/// let config = GraphConfig::new()
///     .input_stream("input")
///     .output_stream("output")
///     .node("PassThroughCalculator", "input", "output");
///
/// let graph = Graph::from_config(&config)?;
/// let mut cell = graph.add_output_stream_poller::<i32>("output", false)?;
/// let mut poller = cell.take()?;
///
/// graph.start_run()?;
/// graph.add_packet_to_input_stream("input", Packet::new_at(1, Timestamp::from_micros(0))?)?;
/// graph.close_input_stream("input")?;
///
/// let mut packet = Packet::<i32>::empty()?;
/// while poller.next(&mut packet)? {
///     println!("got {}", packet.get()?);
/// }
/// graph.wait_until_done()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Graph {
    context: Arc<GraphContext>,
}

impl Graph {
    /// Creates a graph from a config in the engine's text grammar.
    ///
    /// # Errors
    ///
    /// [`Error::BadStatus`] with `InvalidArgument` when the config does not
    /// parse or is not a valid topology.
    pub fn new(config: &str) -> Result<Self> {
        let config = CString::new(config)?;
        let mut graph = std::ptr::null_mut();
        let mut status = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgGraphCreate(config.as_ptr(), &mut graph, &mut status)
        })?;
        unsafe { consume_status(status) }?;
        if graph.is_null() {
            return Err(Error::Other("failed to create graph".to_string()));
        }
        Ok(Self {
            context: Arc::new(GraphContext { graph }),
        })
    }

    /// Creates a graph from a typed [`GraphConfig`], validating stream
    /// names host-side first.
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        config.validate()?;
        Self::new(&config.to_text())
    }

    pub(crate) fn context(&self) -> &Arc<GraphContext> {
        &self.context
    }

    /// Runs an engine call that reports through a status out-parameter.
    fn status_call(
        &self,
        call: impl FnOnce(
            *mut mediagraph_sys::MgGraph,
            *mut *mut mediagraph_sys::MgStatus,
        ) -> mediagraph_sys::ReturnCode,
    ) -> Result<()> {
        let mut status = std::ptr::null_mut();
        Error::from_return_code(call(self.context.raw(), &mut status))?;
        unsafe { consume_status(status) }
    }

    /// Starts the graph run, spawning the engine worker thread.
    ///
    /// Output streams and pollers must be bound before this call.
    pub fn start_run(&self) -> Result<()> {
        self.status_call(|graph, status| unsafe {
            mediagraph_sys::mgGraphStartRun(graph, status)
        })
    }

    /// Binds a blocking poller to a named output stream.
    ///
    /// The stream spec is validated host-side
    /// ([`Error::InvalidName`] on grammar violations) before the engine is
    /// asked. The returned cell is one-shot: extract the poller with
    /// [`StatusOrPoller::take`].
    ///
    /// When `observe_timestamp_bounds` is set, cycles that produced no
    /// output deliver an empty packet instead of nothing.
    pub fn add_output_stream_poller<T: PacketValue>(
        &self,
        stream: &str,
        observe_timestamp_bounds: bool,
    ) -> Result<StatusOrPoller<T>> {
        let name = CString::new(parse_tag_index_name(stream)?.name)?;
        let mut cell = std::ptr::null_mut();
        Error::from_return_code(unsafe {
            mediagraph_sys::mgGraphAddOutputStreamPoller(
                self.context.raw(),
                name.as_ptr(),
                observe_timestamp_bounds,
                &mut cell,
            )
        })?;
        if cell.is_null() {
            return Err(Error::Other("failed to add output stream poller".to_string()));
        }
        Ok(unsafe { StatusOrPoller::from_raw(self.context.clone(), cell) })
    }

    /// Moves a packet into a named input stream.
    ///
    /// Ownership of the packet transfers to the engine whether or not the
    /// call succeeds; the engine requires strictly increasing timestamps
    /// per input stream.
    pub fn add_packet_to_input_stream<T: PacketValue>(
        &self,
        stream: &str,
        packet: Packet<T>,
    ) -> Result<()> {
        let name = CString::new(parse_tag_index_name(stream)?.name)?;
        let raw = packet.release()?;
        self.status_call(|graph, status| unsafe {
            mediagraph_sys::mgGraphAddPacketToInputStream(graph, name.as_ptr(), raw, status)
        })
    }

    /// Closes a named input stream; no further packets can be added.
    pub fn close_input_stream(&self, stream: &str) -> Result<()> {
        let name = CString::new(parse_tag_index_name(stream)?.name)?;
        self.status_call(|graph, status| unsafe {
            mediagraph_sys::mgGraphCloseInputStream(graph, name.as_ptr(), status)
        })
    }

    /// Closes every input stream at once.
    pub fn close_all_packet_sources(&self) -> Result<()> {
        self.status_call(|graph, status| unsafe {
            mediagraph_sys::mgGraphCloseAllPacketSources(graph, status)
        })
    }

    /// Blocks until every queued packet has been processed.
    ///
    /// Returns the graph error if an observer callback reported one.
    pub fn wait_until_idle(&self) -> Result<()> {
        self.status_call(|graph, status| unsafe {
            mediagraph_sys::mgGraphWaitUntilIdle(graph, status)
        })
    }

    /// Blocks until the run has finished (all inputs closed and drained, or
    /// the run was cancelled).
    pub fn wait_until_done(&self) -> Result<()> {
        self.status_call(|graph, status| unsafe {
            mediagraph_sys::mgGraphWaitUntilDone(graph, status)
        })
    }

    /// Whether the graph has recorded an error.
    pub fn has_error(&self) -> bool {
        unsafe { mediagraph_sys::mgGraphHasError(self.context.raw()) }
    }

    /// Requests cancellation of the running graph. Queued packets are
    /// dropped; `wait_until_done` returns once the worker has stopped.
    pub fn cancel(&self) -> Result<()> {
        self.status_call(|graph, status| unsafe { mediagraph_sys::mgGraphCancel(graph, status) })
    }

    /// Forces immediate destruction of the engine graph.
    ///
    /// Normally destruction happens when the last clone (and every bound
    /// poller and stream) is dropped; this method makes cleanup explicit.
    ///
    /// # Errors
    ///
    /// Returns an error if pollers, streams or clones still reference the
    /// graph.
    pub fn destroy(self) -> Result<()> {
        let context = Arc::into_inner(self.context)
            .ok_or_else(|| Error::Other("graph is still in use".to_string()))?;
        drop(context);
        Ok(())
    }
}
