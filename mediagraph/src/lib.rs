// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! # MediaGraph — safe bindings for the graph-based streaming engine
//!
//! Safe, idiomatic Rust bindings over the MediaGraph engine core
//! ([`mediagraph_sys`]), a directed pipeline of processing nodes exchanging
//! typed, timestamped packets on its own worker thread. This crate wraps the
//! raw C surface with RAII resource management, typed packets and two output
//! retrieval protocols.
//!
//! ## Key Concepts
//!
//! - **Graph**: a configured pipeline driven through [`Graph`]
//!   (start, push input, wait, cancel)
//! - **Packet**: one typed, timestamped unit of data ([`Packet`]), with
//!   non-destructive ([`Packet::get`]) and move-once ([`Packet::consume`])
//!   reads
//! - **Poller**: synchronous, blocking pull from a named output stream
//!   ([`OutputStreamPoller`])
//! - **OutputStream**: asynchronous push with strictly increasing delivery
//!   timestamps and a host-side listener fan-out ([`OutputStream`])
//! - **Status / StatusOr**: the foreign error convention at every call
//!   boundary ([`Status`], [`StatusOr`], [`StatusOrPoller`])
//! - **SyncPoint**: one-shot GPU fence for cross-context buffer hand-off
//!   ([`SyncPoint`])
//!
//! ## Architecture
//!
//! ```text
//! ┌───────┐ add_packet_to_input_stream
//! │ Graph ├──────────────► engine worker thread
//! └───┬───┘                      │
//!     │                          │ named output streams
//!     ├─► OutputStreamPoller ◄───┤   (blocking pull)
//!     │                          │
//!     └─► OutputStream ◄─────────┘   (callback → bounded queue →
//!              │                      dispatcher thread → listeners)
//!              └─► listeners
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mediagraph::{Graph, GraphConfig, Packet, Timestamp};
//!
//! # fn main() -> Result<(), mediagraph::Error> {
//! let config = GraphConfig::new()
//!     .input_stream("input")
//!     .output_stream("output")
//!     .node("PassThroughCalculator", "input", "output");
//!
//! let graph = Graph::from_config(&config)?;
//! let mut poller = graph.add_output_stream_poller::<i32>("output", false)?.take()?;
//! graph.start_run()?;
//!
//! for i in 0..10 {
//!     let packet = Packet::new_at(i, Timestamp::from_micros(i64::from(i)))?;
//!     graph.add_packet_to_input_stream("input", packet)?;
//! }
//! graph.close_input_stream("input")?;
//!
//! let mut packet = Packet::<i32>::empty()?;
//! while poller.next(&mut packet)? {
//!     println!("output: {}", packet.get()?);
//! }
//! graph.wait_until_done()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - [`Graph`] is `Send + Sync` and cheaply cloneable; all clones drive the
//!   same engine instance
//! - Pollers and packets are `Send` but not `Sync`; `&mut self` serializes
//!   polling
//! - [`OutputStream`] listeners run on a host-owned dispatcher thread,
//!   never on the engine thread; registration and removal are safe while
//!   deliveries are in flight
//!
//! ## Ownership
//!
//! Every foreign pointer has exactly one logical owner. Wrappers release
//! their resource deterministically on `dispose()` (idempotent) or on drop;
//! transferring ownership to the engine (e.g.
//! [`Graph::add_packet_to_input_stream`]) clears the local handle so the
//! resource can never be freed twice. Access after disposal fails with
//! [`Error::DisposedAccess`].

mod error;
mod gpu;
mod graph;
mod handle;
mod packet;
mod status;
mod status_or;
mod stream;
mod timestamp;

pub mod config;
pub mod name;

pub use config::{GraphConfig, NodeConfig};
pub use error::{Error, Result};
pub use gpu::{GpuBuffer, SyncPoint};
pub use graph::Graph;
pub use mediagraph_sys::ReturnCode;
pub use packet::{Packet, PacketValue};
pub use status::{Status, StatusCode};
pub use status_or::{StatusOr, StatusOrPoller};
pub use stream::{
    DuplicatePolicy, Output, OutputStream, OutputStreamOptions, OutputStreamPoller,
};
pub use timestamp::Timestamp;
