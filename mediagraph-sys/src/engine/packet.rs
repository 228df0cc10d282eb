// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Engine packet representation and the consume cell.

use std::os::raw::c_int;

use super::status::MgStatus;
use super::value::Value;
use crate::types::{
    MG_STATUS_FAILED_PRECONDITION, MG_STATUS_UNIMPLEMENTED, MG_TIMESTAMP_UNSET, MG_VALUE_NONE,
};

/// A type-erased payload tagged with a timestamp.
///
/// Opaque at the ABI; released with `mgPacketDelete`. An empty packet (no
/// payload) is a valid state used for timestamp-bound notifications.
pub struct MgPacket {
    pub(crate) value: Option<Value>,
    pub(crate) timestamp: i64,
}

impl MgPacket {
    pub(crate) fn empty() -> Self {
        Self {
            value: None,
            timestamp: MG_TIMESTAMP_UNSET,
        }
    }

    pub(crate) fn new(value: Value, timestamp: i64) -> Self {
        Self {
            value: Some(value),
            timestamp,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub(crate) fn kind(&self) -> c_int {
        self.value.as_ref().map_or(MG_VALUE_NONE, Value::kind)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.value.as_ref().map_or("{empty}", Value::type_name)
    }

    /// Copy of this packet carrying the given timestamp.
    pub(crate) fn at(&self, timestamp: i64) -> Self {
        Self {
            value: self.value.clone(),
            timestamp,
        }
    }

    /// Moves the payload out, leaving the packet empty.
    ///
    /// Only payload kinds that support move extraction can be consumed; the
    /// resulting cell otherwise carries `UNIMPLEMENTED`.
    pub(crate) fn consume(&mut self) -> MgStatusOrValue {
        match &self.value {
            None => MgStatusOrValue::error(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "packet is empty",
            )),
            Some(value) if !value.is_movable() => MgStatusOrValue::error(MgStatus::new(
                MG_STATUS_UNIMPLEMENTED,
                format!(
                    "packet content of type {} does not support move extraction",
                    value.type_name()
                ),
            )),
            Some(_) => {
                let value = self.value.take();
                MgStatusOrValue {
                    status: MgStatus::ok(),
                    value,
                }
            }
        }
    }
}

/// Union-like result cell: either an error status or one moved-out payload.
///
/// Opaque at the ABI; released with `mgStatusOrValueDelete`. The payload can
/// be taken at most once.
pub struct MgStatusOrValue {
    pub(crate) status: MgStatus,
    pub(crate) value: Option<Value>,
}

impl MgStatusOrValue {
    pub(crate) fn error(status: MgStatus) -> Self {
        Self {
            status,
            value: None,
        }
    }
}
