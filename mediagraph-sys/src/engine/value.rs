// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Type-erased packet payloads.

use std::os::raw::c_int;
use std::sync::Arc;

use super::fence::Fence;
use crate::types::{
    MG_VALUE_BOOL, MG_VALUE_FLOAT, MG_VALUE_FLOAT_VECTOR, MG_VALUE_GPU_BUFFER, MG_VALUE_INT,
    MG_VALUE_STRING,
};

/// A GPU-backed image buffer plus the fence guarding its producing context.
#[derive(Clone)]
pub(crate) struct GpuBufferValue {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) data: Vec<u8>,
    pub(crate) fence: Arc<Fence>,
}

/// The payload kinds a packet can carry through the graph.
#[derive(Clone)]
pub(crate) enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    FloatVector(Vec<f32>),
    GpuBuffer(GpuBufferValue),
}

impl Value {
    pub(crate) fn kind(&self) -> c_int {
        match self {
            Value::Bool(_) => MG_VALUE_BOOL,
            Value::Int(_) => MG_VALUE_INT,
            Value::Float(_) => MG_VALUE_FLOAT,
            Value::Str(_) => MG_VALUE_STRING,
            Value::FloatVector(_) => MG_VALUE_FLOAT_VECTOR,
            Value::GpuBuffer(_) => MG_VALUE_GPU_BUFFER,
        }
    }

    /// Debug type name reported through `mgPacketDebugTypeName`.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "std::string",
            Value::FloatVector(_) => "std::vector<float>",
            Value::GpuBuffer(_) => "mg::GpuBuffer",
        }
    }

    /// Whether the payload supports move extraction (`mgPacketConsume`).
    ///
    /// Scalars are copy-only; owned buffers can be moved out.
    pub(crate) fn is_movable(&self) -> bool {
        matches!(
            self,
            Value::Str(_) | Value::FloatVector(_) | Value::GpuBuffer(_)
        )
    }
}
