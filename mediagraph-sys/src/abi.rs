// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! The C entry points.
//!
//! Naming follows the C convention (`mg<Type><Operation>`). Every fallible
//! call returns a [`ReturnCode`]; rich domain failures are delivered as
//! owned [`MgStatus`] objects through `status_out` parameters. Panics are
//! caught at this boundary and reported as `MG_RETURN_UNKNOWN_ERROR` —
//! they never unwind into a foreign frame.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::engine::fence;
use crate::engine::fence::MgSyncToken;
use crate::engine::graph::{MgGraph, MgPoller, MgStatusOrPoller};
use crate::engine::packet::{MgPacket, MgStatusOrValue};
use crate::engine::status::MgStatus;
use crate::engine::value::{GpuBufferValue, Value};
use crate::types::{
    MG_RETURN_STANDARD_ERROR, MG_RETURN_SUCCESS, MG_RETURN_UNKNOWN_ERROR,
    MG_STATUS_FAILED_PRECONDITION, MG_STATUS_INVALID_ARGUMENT, MG_TIMESTAMP_UNSET, MG_VALUE_NONE,
    MgGpuBufferInfo, PacketCallback, ReturnCode,
};

/// Runs an ABI body under `catch_unwind`, mapping a panic to
/// `MG_RETURN_UNKNOWN_ERROR` so it never crosses the boundary.
fn guarded(body: impl FnOnce() -> ReturnCode) -> ReturnCode {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(code) => code,
        Err(_) => MG_RETURN_UNKNOWN_ERROR,
    }
}

/// Writes an owned status object to `status_out` (ignored when null).
unsafe fn set_status(status_out: *mut *mut MgStatus, status: MgStatus) {
    if !status_out.is_null() {
        unsafe { *status_out = Box::into_raw(Box::new(status)) };
    }
}

unsafe fn set_result(status_out: *mut *mut MgStatus, result: Result<(), MgStatus>) -> ReturnCode {
    let status = match result {
        Ok(()) => MgStatus::ok(),
        Err(status) => status,
    };
    unsafe { set_status(status_out, status) };
    MG_RETURN_SUCCESS
}

/// Copies a Rust string to the heap as a C string released via
/// [`mgStringDelete`].
fn heap_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => match CString::new(s.replace('\0', "?")) {
            Ok(cs) => cs.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
    }
}

unsafe fn cstr_arg<'a>(ptr: *const c_char) -> Result<&'a str, MgStatus> {
    if ptr.is_null() {
        return Err(MgStatus::new(
            MG_STATUS_INVALID_ARGUMENT,
            "null string argument",
        ));
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().map_err(|_| {
        MgStatus::new(MG_STATUS_INVALID_ARGUMENT, "string argument is not UTF-8")
    })
}

/* ---------------------------------------------------------------------- *
 * MgStatus
 * ---------------------------------------------------------------------- */

pub unsafe extern "C" fn mgStatusCreate(
    code: c_int,
    message: *const c_char,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if status_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let message = if message.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(message) }
                .to_string_lossy()
                .into_owned()
        };
        unsafe { *status_out = Box::into_raw(Box::new(MgStatus::new(code, message))) };
        MG_RETURN_SUCCESS
    })
}

pub unsafe extern "C" fn mgStatusDelete(status: *mut MgStatus) {
    if !status.is_null() {
        drop(unsafe { Box::from_raw(status) });
    }
}

pub unsafe extern "C" fn mgStatusOk(status: *const MgStatus) -> bool {
    !status.is_null() && unsafe { &*status }.is_ok()
}

pub unsafe extern "C" fn mgStatusRawCode(status: *const MgStatus) -> c_int {
    if status.is_null() {
        return MG_STATUS_INVALID_ARGUMENT;
    }
    unsafe { &*status }.code
}

pub unsafe extern "C" fn mgStatusMessage(
    status: *const MgStatus,
    str_out: *mut *mut c_char,
) -> ReturnCode {
    guarded(|| {
        if status.is_null() || str_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { *str_out = heap_c_string(&(*status).message) };
        MG_RETURN_SUCCESS
    })
}

pub unsafe extern "C" fn mgStatusToString(
    status: *const MgStatus,
    str_out: *mut *mut c_char,
) -> ReturnCode {
    guarded(|| {
        if status.is_null() || str_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { *str_out = heap_c_string(&(*status).to_display_string()) };
        MG_RETURN_SUCCESS
    })
}

/// Releases a heap C string produced by this ABI.
pub unsafe extern "C" fn mgStringDelete(string: *mut c_char) {
    if !string.is_null() {
        drop(unsafe { CString::from_raw(string) });
    }
}

/* ---------------------------------------------------------------------- *
 * MgPacket: constructors and accessors
 * ---------------------------------------------------------------------- */

unsafe fn emit_packet(packet_out: *mut *mut MgPacket, packet: MgPacket) -> ReturnCode {
    if packet_out.is_null() {
        return MG_RETURN_STANDARD_ERROR;
    }
    unsafe { *packet_out = Box::into_raw(Box::new(packet)) };
    MG_RETURN_SUCCESS
}

pub unsafe extern "C" fn mgPacketCreate(packet_out: *mut *mut MgPacket) -> ReturnCode {
    guarded(|| unsafe { emit_packet(packet_out, MgPacket::empty()) })
}

pub unsafe extern "C" fn mgPacketDelete(packet: *mut MgPacket) {
    if !packet.is_null() {
        drop(unsafe { Box::from_raw(packet) });
    }
}

pub unsafe extern "C" fn mgPacketCreateBool(
    value: bool,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| unsafe { emit_packet(packet_out, MgPacket::new(Value::Bool(value), timestamp)) })
}

pub unsafe extern "C" fn mgPacketCreateInt(
    value: c_int,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| unsafe { emit_packet(packet_out, MgPacket::new(Value::Int(value), timestamp)) })
}

pub unsafe extern "C" fn mgPacketCreateFloat(
    value: f32,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| unsafe { emit_packet(packet_out, MgPacket::new(Value::Float(value), timestamp)) })
}

pub unsafe extern "C" fn mgPacketCreateString(
    value: *const c_char,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| {
        let text = match unsafe { cstr_arg(value) } {
            Ok(text) => text.to_string(),
            Err(_) => return MG_RETURN_STANDARD_ERROR,
        };
        unsafe { emit_packet(packet_out, MgPacket::new(Value::Str(text), timestamp)) }
    })
}

pub unsafe extern "C" fn mgPacketCreateFloatVector(
    data: *const f32,
    len: usize,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| {
        if data.is_null() && len > 0 {
            return MG_RETURN_STANDARD_ERROR;
        }
        let values = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
        };
        unsafe { emit_packet(packet_out, MgPacket::new(Value::FloatVector(values), timestamp)) }
    })
}

pub unsafe extern "C" fn mgPacketCreateGpuBuffer(
    width: u32,
    height: u32,
    data: *const u8,
    len: usize,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| {
        if data.is_null() && len > 0 {
            return MG_RETURN_STANDARD_ERROR;
        }
        let bytes = if len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }.to_vec()
        };
        // Host uploads complete synchronously, so the producing fence is
        // already signaled when the packet enters the graph.
        let buffer = GpuBufferValue {
            width,
            height,
            data: bytes,
            fence: fence::Fence::signaled(),
        };
        unsafe { emit_packet(packet_out, MgPacket::new(Value::GpuBuffer(buffer), timestamp)) }
    })
}

/// Copy of `packet` carrying the given timestamp.
pub unsafe extern "C" fn mgPacketAt(
    packet: *const MgPacket,
    timestamp: i64,
    packet_out: *mut *mut MgPacket,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { emit_packet(packet_out, (*packet).at(timestamp)) }
    })
}

pub unsafe extern "C" fn mgPacketIsEmpty(packet: *const MgPacket) -> bool {
    packet.is_null() || unsafe { &*packet }.is_empty()
}

pub unsafe extern "C" fn mgPacketTimestamp(packet: *const MgPacket) -> i64 {
    if packet.is_null() {
        return MG_TIMESTAMP_UNSET;
    }
    unsafe { &*packet }.timestamp
}

pub unsafe extern "C" fn mgPacketValueKind(packet: *const MgPacket) -> c_int {
    if packet.is_null() {
        return MG_VALUE_NONE;
    }
    unsafe { &*packet }.kind()
}

pub unsafe extern "C" fn mgPacketDebugTypeName(
    packet: *const MgPacket,
    str_out: *mut *mut c_char,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || str_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { *str_out = heap_c_string((*packet).type_name()) };
        MG_RETURN_SUCCESS
    })
}

/// Checks that the packet carries a payload of the given kind, reporting the
/// outcome as a status object.
pub unsafe extern "C" fn mgPacketValidateKind(
    packet: *const MgPacket,
    kind: c_int,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let packet = unsafe { &*packet };
        let result = if packet.is_empty() {
            Err(MgStatus::new(
                MG_STATUS_FAILED_PRECONDITION,
                "packet is empty",
            ))
        } else if packet.kind() != kind {
            Err(MgStatus::new(
                MG_STATUS_INVALID_ARGUMENT,
                format!(
                    "packet carries {} (kind {}), not kind {}",
                    packet.type_name(),
                    packet.kind(),
                    kind
                ),
            ))
        } else {
            Ok(())
        };
        unsafe { set_result(status_out, result) }
    })
}

pub unsafe extern "C" fn mgPacketGetBool(
    packet: *const MgPacket,
    value_out: *mut bool,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || value_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match unsafe { &*packet }.value {
            Some(Value::Bool(value)) => {
                unsafe { *value_out = value };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketGetInt(
    packet: *const MgPacket,
    value_out: *mut c_int,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || value_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match unsafe { &*packet }.value {
            Some(Value::Int(value)) => {
                unsafe { *value_out = value };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketGetFloat(
    packet: *const MgPacket,
    value_out: *mut f32,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || value_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match unsafe { &*packet }.value {
            Some(Value::Float(value)) => {
                unsafe { *value_out = value };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketGetString(
    packet: *const MgPacket,
    str_out: *mut *mut c_char,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || str_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*packet }.value {
            Some(Value::Str(text)) => {
                unsafe { *str_out = heap_c_string(text) };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketGetFloatVectorLen(
    packet: *const MgPacket,
    len_out: *mut usize,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || len_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*packet }.value {
            Some(Value::FloatVector(values)) => {
                unsafe { *len_out = values.len() };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketCopyFloatVector(
    packet: *const MgPacket,
    dst: *mut f32,
    cap: usize,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || dst.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*packet }.value {
            Some(Value::FloatVector(values)) if values.len() <= cap => {
                unsafe {
                    std::ptr::copy_nonoverlapping(values.as_ptr(), dst, values.len());
                }
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketGetGpuBufferInfo(
    packet: *const MgPacket,
    info_out: *mut MgGpuBufferInfo,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || info_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*packet }.value {
            Some(Value::GpuBuffer(buffer)) => {
                unsafe {
                    *info_out = MgGpuBufferInfo {
                        width: buffer.width,
                        height: buffer.height,
                        len: buffer.data.len(),
                    };
                }
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgPacketCopyGpuBuffer(
    packet: *const MgPacket,
    dst: *mut u8,
    cap: usize,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || dst.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*packet }.value {
            Some(Value::GpuBuffer(buffer)) if buffer.data.len() <= cap => {
                unsafe {
                    std::ptr::copy_nonoverlapping(buffer.data.as_ptr(), dst, buffer.data.len());
                }
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

/// Mints a sync token tied to the producing cycle of the packet's GPU
/// buffer. The caller owns the token and must wait on it before reading the
/// buffer contents.
pub unsafe extern "C" fn mgPacketAcquireGpuFence(
    packet: *const MgPacket,
    token_out: *mut *mut MgSyncToken,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || token_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*packet }.value {
            Some(Value::GpuBuffer(buffer)) => {
                let token = MgSyncToken {
                    fence: buffer.fence.clone(),
                };
                unsafe { *token_out = Box::into_raw(Box::new(token)) };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

/// Moves the payload out of the packet into a one-shot result cell, leaving
/// the packet empty.
pub unsafe extern "C" fn mgPacketConsume(
    packet: *mut MgPacket,
    cell_out: *mut *mut MgStatusOrValue,
) -> ReturnCode {
    guarded(|| {
        if packet.is_null() || cell_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let cell = unsafe { &mut *packet }.consume();
        unsafe { *cell_out = Box::into_raw(Box::new(cell)) };
        MG_RETURN_SUCCESS
    })
}

/* ---------------------------------------------------------------------- *
 * MgStatusOrValue
 * ---------------------------------------------------------------------- */

pub unsafe extern "C" fn mgStatusOrValueStatus(
    cell: *const MgStatusOrValue,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || status_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_status(status_out, (*cell).status.clone()) };
        MG_RETURN_SUCCESS
    })
}

pub unsafe extern "C" fn mgStatusOrValueValueKind(cell: *const MgStatusOrValue) -> c_int {
    if cell.is_null() {
        return MG_VALUE_NONE;
    }
    unsafe { &*cell }
        .value
        .as_ref()
        .map_or(MG_VALUE_NONE, Value::kind)
}

pub unsafe extern "C" fn mgStatusOrValueTakeString(
    cell: *mut MgStatusOrValue,
    str_out: *mut *mut c_char,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || str_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let cell = unsafe { &mut *cell };
        match cell.value.take() {
            Some(Value::Str(text)) => {
                unsafe { *str_out = heap_c_string(&text) };
                MG_RETURN_SUCCESS
            }
            other => {
                cell.value = other;
                MG_RETURN_STANDARD_ERROR
            }
        }
    })
}

pub unsafe extern "C" fn mgStatusOrValueFloatVectorLen(
    cell: *const MgStatusOrValue,
    len_out: *mut usize,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || len_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*cell }.value {
            Some(Value::FloatVector(values)) => {
                unsafe { *len_out = values.len() };
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgStatusOrValueTakeFloatVector(
    cell: *mut MgStatusOrValue,
    dst: *mut f32,
    cap: usize,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || dst.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let cell = unsafe { &mut *cell };
        match cell.value.take() {
            Some(Value::FloatVector(values)) if values.len() <= cap => {
                unsafe {
                    std::ptr::copy_nonoverlapping(values.as_ptr(), dst, values.len());
                }
                MG_RETURN_SUCCESS
            }
            other => {
                cell.value = other;
                MG_RETURN_STANDARD_ERROR
            }
        }
    })
}

pub unsafe extern "C" fn mgStatusOrValueGpuBufferInfo(
    cell: *const MgStatusOrValue,
    info_out: *mut MgGpuBufferInfo,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || info_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match &unsafe { &*cell }.value {
            Some(Value::GpuBuffer(buffer)) => {
                unsafe {
                    *info_out = MgGpuBufferInfo {
                        width: buffer.width,
                        height: buffer.height,
                        len: buffer.data.len(),
                    };
                }
                MG_RETURN_SUCCESS
            }
            _ => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgStatusOrValueTakeGpuBuffer(
    cell: *mut MgStatusOrValue,
    dst: *mut u8,
    cap: usize,
    token_out: *mut *mut MgSyncToken,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || dst.is_null() || token_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let cell = unsafe { &mut *cell };
        match cell.value.take() {
            Some(Value::GpuBuffer(buffer)) if buffer.data.len() <= cap => {
                unsafe {
                    std::ptr::copy_nonoverlapping(buffer.data.as_ptr(), dst, buffer.data.len());
                    *token_out = Box::into_raw(Box::new(MgSyncToken {
                        fence: buffer.fence,
                    }));
                }
                MG_RETURN_SUCCESS
            }
            other => {
                cell.value = other;
                MG_RETURN_STANDARD_ERROR
            }
        }
    })
}

pub unsafe extern "C" fn mgStatusOrValueDelete(cell: *mut MgStatusOrValue) {
    if !cell.is_null() {
        drop(unsafe { Box::from_raw(cell) });
    }
}

/* ---------------------------------------------------------------------- *
 * MgGraph
 * ---------------------------------------------------------------------- */

pub unsafe extern "C" fn mgGraphCreate(
    config: *const c_char,
    graph_out: *mut *mut MgGraph,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let text = match unsafe { cstr_arg(config) } {
            Ok(text) => text,
            Err(status) => {
                unsafe {
                    *graph_out = std::ptr::null_mut();
                    set_status(status_out, status);
                }
                return MG_RETURN_SUCCESS;
            }
        };
        match MgGraph::from_config(text) {
            Ok(graph) => unsafe {
                *graph_out = Box::into_raw(Box::new(graph));
                set_status(status_out, MgStatus::ok());
                MG_RETURN_SUCCESS
            },
            Err(status) => unsafe {
                *graph_out = std::ptr::null_mut();
                set_status(status_out, status);
                MG_RETURN_SUCCESS
            },
        }
    })
}

pub unsafe extern "C" fn mgGraphDelete(graph: *mut MgGraph) {
    if !graph.is_null() {
        let mut graph = unsafe { Box::from_raw(graph) };
        graph.shutdown();
    }
}

pub unsafe extern "C" fn mgGraphStartRun(
    graph: *mut MgGraph,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_result(status_out, (*graph).start_run()) }
    })
}

pub unsafe extern "C" fn mgGraphObserveOutputStream(
    graph: *mut MgGraph,
    name: *const c_char,
    token: u64,
    callback: PacketCallback,
    observe_timestamp_bounds: bool,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let result = unsafe { cstr_arg(name) }.and_then(|name| {
            unsafe { &*graph }.observe_output_stream(
                name,
                token,
                callback,
                observe_timestamp_bounds,
            )
        });
        unsafe { set_result(status_out, result) }
    })
}

pub unsafe extern "C" fn mgGraphAddOutputStreamPoller(
    graph: *mut MgGraph,
    name: *const c_char,
    observe_timestamp_bounds: bool,
    cell_out: *mut *mut MgStatusOrPoller,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() || cell_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let result = unsafe { cstr_arg(name) }.and_then(|name| {
            unsafe { &*graph }.add_output_stream_poller(name, observe_timestamp_bounds)
        });
        let cell = match result {
            Ok(poller) => MgStatusOrPoller {
                status: MgStatus::ok(),
                poller: Some(poller),
            },
            Err(status) => MgStatusOrPoller {
                status,
                poller: None,
            },
        };
        unsafe { *cell_out = Box::into_raw(Box::new(cell)) };
        MG_RETURN_SUCCESS
    })
}

/// Moves `packet` into the named input stream. The engine takes ownership of
/// the packet object whether or not the call succeeds.
pub unsafe extern "C" fn mgGraphAddPacketToInputStream(
    graph: *mut MgGraph,
    name: *const c_char,
    packet: *mut MgPacket,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() || packet.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let packet = unsafe { *Box::from_raw(packet) };
        let result = unsafe { cstr_arg(name) }
            .and_then(|name| unsafe { &*graph }.add_packet(name, packet));
        unsafe { set_result(status_out, result) }
    })
}

pub unsafe extern "C" fn mgGraphCloseInputStream(
    graph: *mut MgGraph,
    name: *const c_char,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        let result =
            unsafe { cstr_arg(name) }.and_then(|name| unsafe { &*graph }.close_input_stream(name));
        unsafe { set_result(status_out, result) }
    })
}

pub unsafe extern "C" fn mgGraphCloseAllPacketSources(
    graph: *mut MgGraph,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_result(status_out, (*graph).close_all_packet_sources()) }
    })
}

pub unsafe extern "C" fn mgGraphWaitUntilIdle(
    graph: *mut MgGraph,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_result(status_out, (*graph).wait_until_idle()) }
    })
}

pub unsafe extern "C" fn mgGraphWaitUntilDone(
    graph: *mut MgGraph,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_result(status_out, (*graph).wait_until_done()) }
    })
}

pub unsafe extern "C" fn mgGraphHasError(graph: *const MgGraph) -> bool {
    !graph.is_null() && unsafe { &*graph }.has_error()
}

pub unsafe extern "C" fn mgGraphCancel(
    graph: *mut MgGraph,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if graph.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_result(status_out, (*graph).cancel()) }
    })
}

/* ---------------------------------------------------------------------- *
 * MgStatusOrPoller / MgPoller
 * ---------------------------------------------------------------------- */

pub unsafe extern "C" fn mgStatusOrPollerStatus(
    cell: *const MgStatusOrPoller,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || status_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { set_status(status_out, (*cell).status.clone()) };
        MG_RETURN_SUCCESS
    })
}

/// Moves the poller out of the cell; fails once the value has been taken.
pub unsafe extern "C" fn mgStatusOrPollerValue(
    cell: *mut MgStatusOrPoller,
    poller_out: *mut *mut MgPoller,
) -> ReturnCode {
    guarded(|| {
        if cell.is_null() || poller_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match unsafe { &mut *cell }.poller.take() {
            Some(poller) => {
                unsafe { *poller_out = Box::into_raw(poller) };
                MG_RETURN_SUCCESS
            }
            None => MG_RETURN_STANDARD_ERROR,
        }
    })
}

pub unsafe extern "C" fn mgStatusOrPollerDelete(cell: *mut MgStatusOrPoller) {
    if !cell.is_null() {
        drop(unsafe { Box::from_raw(cell) });
    }
}

/// Blocks until the next packet arrives on the poller's stream. Writes
/// `true` and fills `packet` when a packet was delivered; writes `false`
/// once the stream is closed and drained.
pub unsafe extern "C" fn mgPollerNext(
    poller: *mut MgPoller,
    packet: *mut MgPacket,
    ok_out: *mut bool,
) -> ReturnCode {
    guarded(|| {
        if poller.is_null() || packet.is_null() || ok_out.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        match unsafe { &*poller }.queue.next() {
            Some(next) => unsafe {
                *packet = next;
                *ok_out = true;
                MG_RETURN_SUCCESS
            },
            None => unsafe {
                *packet = MgPacket::empty();
                *ok_out = false;
                MG_RETURN_SUCCESS
            },
        }
    })
}

pub unsafe extern "C" fn mgPollerQueueSize(poller: *const MgPoller) -> c_int {
    if poller.is_null() {
        return 0;
    }
    unsafe { &*poller }.queue.len() as c_int
}

pub unsafe extern "C" fn mgPollerDelete(poller: *mut MgPoller) {
    if !poller.is_null() {
        drop(unsafe { Box::from_raw(poller) });
    }
}

/* ---------------------------------------------------------------------- *
 * MgSyncToken
 * ---------------------------------------------------------------------- */

/// Blocks the calling thread until the producing context's fence signals.
pub unsafe extern "C" fn mgSyncTokenWait(
    token: *mut MgSyncToken,
    status_out: *mut *mut MgStatus,
) -> ReturnCode {
    guarded(|| {
        if token.is_null() {
            return MG_RETURN_STANDARD_ERROR;
        }
        unsafe { &*token }.fence.wait();
        unsafe { set_result(status_out, Ok(())) }
    })
}

pub unsafe extern "C" fn mgSyncTokenDelete(token: *mut MgSyncToken) {
    if !token.is_null() {
        drop(unsafe { Box::from_raw(token) });
    }
}
