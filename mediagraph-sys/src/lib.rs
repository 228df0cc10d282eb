// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! # mediagraph-sys: the MediaGraph engine core and its raw C ABI
//!
//! This crate contains the MediaGraph processing engine (graph execution on a
//! dedicated worker thread, packet routing, blocking output queues, observer
//! callbacks, GPU fences) together with the C-compatible API surface through
//! which every consumer — the safe [`mediagraph`] wrapper or a foreign
//! runtime — drives it.
//!
//! ## Overview
//!
//! `mediagraph-sys` exposes:
//! - Opaque handle types ([`MgGraph`], [`MgPacket`], [`MgStatus`],
//!   [`MgPoller`], [`MgSyncToken`], …) that are only ever manipulated through
//!   raw pointers
//! - `extern "C"` entry points (prefixed `mg` in the C convention)
//! - Constants for return codes, status codes, value kinds and timestamp
//!   sentinels
//!
//! ## Calling convention
//!
//! Every fallible entry point returns a [`ReturnCode`] describing the call
//! machinery itself (`MG_RETURN_SUCCESS`, argument misuse, a caught panic)
//! and delivers results through out-parameters. Operations that can fail for
//! domain reasons additionally write an owned status object to a
//! `status_out` parameter; the caller must release it with
//! [`mgStatusDelete`]. Out-parameters are only valid when the return code is
//! `MG_RETURN_SUCCESS` and the delivered status (if any) is ok.
//!
//! Heap strings handed to the caller are released with [`mgStringDelete`].
//! Variable-size payloads use a size query followed by a copy into a
//! caller-provided buffer.
//!
//! ## Usage
//!
//! **Most users should NOT use this crate directly.** Use the safe
//! [`mediagraph`] wrapper crate instead, which provides:
//! - Memory safety via RAII handle types
//! - Rust-idiomatic error handling with `Result`
//! - Strong typing for packets, pollers and streams
//!
//! ## Safety
//!
//! All pointer-taking functions require the caller to uphold the engine's
//! invariants:
//! - Handles must not be used after they have been deleted
//! - A packet passed to `mgGraphAddPacketToInputStream` is moved into the
//!   engine; the caller must not touch it afterwards
//! - Observer callbacks run on the engine's worker thread; they receive a
//!   borrowed packet pointer valid only for the duration of the call and
//!   must return an owned status pointer (or null for ok)
//! - Null checks beyond the documented ones are the caller's responsibility
//!
//! [`mediagraph`]: https://docs.rs/mediagraph

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

mod abi;
mod engine;
mod types;

pub use abi::*;
pub use engine::fence::MgSyncToken;
pub use engine::graph::{MgGraph, MgPoller, MgStatusOrPoller};
pub use engine::packet::{MgPacket, MgStatusOrValue};
pub use engine::status::MgStatus;
pub use types::*;
