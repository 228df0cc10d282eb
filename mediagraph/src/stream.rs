// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Output stream bindings.
//!
//! Two retrieval protocols are offered for a named output stream:
//! - [`OutputStreamPoller`]: synchronous, blocking pull ([`poller`])
//! - [`OutputStream`]: asynchronous push with a host-side listener fan-out
//!   ([`output`])

pub mod output;
pub mod poller;

pub use output::{DuplicatePolicy, Output, OutputStream, OutputStreamOptions};
pub use poller::OutputStreamPoller;
