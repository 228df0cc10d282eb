// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Simple smoke test driving the raw ABI directly.

use std::ffi::CStr;

/// Round-trips a bool packet and a status object through the C surface.
///
/// The safe wrapper crate has the real coverage; this only proves the raw
/// calling convention (return codes, out-parameters, heap strings) works.
#[test]
fn raw_abi_round_trip() {
    unsafe {
        let mut packet = std::ptr::null_mut();
        let rc = mediagraph_sys::mgPacketCreateBool(true, 42, &mut packet);
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        assert!(!packet.is_null());
        assert!(!mediagraph_sys::mgPacketIsEmpty(packet));
        assert_eq!(mediagraph_sys::mgPacketTimestamp(packet), 42);
        assert_eq!(
            mediagraph_sys::mgPacketValueKind(packet),
            mediagraph_sys::MG_VALUE_BOOL
        );

        let mut value = false;
        let rc = mediagraph_sys::mgPacketGetBool(packet, &mut value);
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        assert!(value);

        let mut name = std::ptr::null_mut();
        let rc = mediagraph_sys::mgPacketDebugTypeName(packet, &mut name);
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        assert_eq!(CStr::from_ptr(name).to_str().unwrap(), "bool");
        mediagraph_sys::mgStringDelete(name);

        mediagraph_sys::mgPacketDelete(packet);

        let mut status = std::ptr::null_mut();
        let rc = mediagraph_sys::mgStatusCreate(
            mediagraph_sys::MG_STATUS_FAILED_PRECONDITION,
            c"something was not ready".as_ptr(),
            &mut status,
        );
        assert_eq!(rc, mediagraph_sys::MG_RETURN_SUCCESS);
        assert!(!mediagraph_sys::mgStatusOk(status));
        assert_eq!(
            mediagraph_sys::mgStatusRawCode(status),
            mediagraph_sys::MG_STATUS_FAILED_PRECONDITION
        );
        mediagraph_sys::mgStatusDelete(status);
    }
}
