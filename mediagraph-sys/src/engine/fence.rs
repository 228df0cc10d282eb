// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! GPU fence simulation for cross-context buffer hand-off.
//!
//! A [`Fence`] marks completion of the producing context's work on a
//! GPU-backed buffer. The worker thread signals the fence after the cycle
//! that produced the buffer has been fully delivered; consumers block in
//! `mgSyncTokenWait` until then.

use std::sync::{Arc, Condvar, Mutex};

use super::lock;

/// One signalable completion marker shared by every token minted for it.
pub(crate) struct Fence {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Fence {
    /// Creates an unsignaled fence.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
        })
    }

    /// Creates a fence that is already signaled.
    ///
    /// Used for host-created buffers whose upload completed synchronously
    /// before the packet was built.
    pub(crate) fn signaled() -> Arc<Self> {
        Arc::new(Self {
            signaled: Mutex::new(true),
            cond: Condvar::new(),
        })
    }

    pub(crate) fn signal(&self) {
        let mut signaled = lock(&self.signaled);
        *signaled = true;
        self.cond.notify_all();
    }

    /// Blocks the calling thread until the fence signals.
    pub(crate) fn wait(&self) {
        let mut signaled = lock(&self.signaled);
        while !*signaled {
            signaled = match self.cond.wait(signaled) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }
}

/// One-shot sync token handed across the ABI.
///
/// Opaque pointee; released with `mgSyncTokenDelete`. Exactly-once use is
/// enforced by the safe wrapper, not the engine: waiting merely observes the
/// shared fence.
pub struct MgSyncToken {
    pub(crate) fence: Arc<Fence>,
}
