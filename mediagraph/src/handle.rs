// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Foreign-pointer ownership discipline.
//!
//! Every wrapper around an engine-owned pointer is built on [`RawHandle`]:
//! a cell holding the raw pointer plus an ownership flag. The cell
//! guarantees deterministic, idempotent release — disposing twice is a
//! no-op, never a double-free — and turns any access after disposal into a
//! typed [`Error::DisposedAccess`] failure instead of undefined behavior.

use std::ffi::c_void;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::{Error, Result};

/// Ownership-tagged cell for a single foreign pointer.
///
/// The null pointer is the disposed/empty sentinel. Disposal and ownership
/// transfer both swap the pointer to null atomically, so exactly one party
/// ever frees the resource even when `dispose` races with itself or with a
/// transfer from another thread.
#[derive(Debug)]
pub(crate) struct RawHandle {
    ptr: AtomicPtr<c_void>,
    /// Non-owning handles never release the foreign pointer.
    owner: bool,
    /// Type label used in `DisposedAccess` / `UseAfterConsume` errors.
    label: &'static str,
}

impl RawHandle {
    /// Wraps a pointer whose ownership was transferred to us by the engine.
    pub(crate) fn owned(label: &'static str, ptr: *mut c_void) -> Self {
        Self {
            ptr: AtomicPtr::new(ptr),
            owner: true,
            label,
        }
    }

    /// Wraps a pointer the engine retains ownership of (e.g. the packet
    /// lent to an observer callback for the duration of the call).
    pub(crate) fn borrowed(label: &'static str, ptr: *mut c_void) -> Self {
        Self {
            ptr: AtomicPtr::new(ptr),
            owner: false,
            label,
        }
    }

    /// Returns the pointer while the handle is live.
    ///
    /// # Errors
    ///
    /// [`Error::DisposedAccess`] once the handle has been disposed or its
    /// ownership transferred away.
    pub(crate) fn get(&self) -> Result<*mut c_void> {
        let ptr = self.ptr.load(Ordering::Acquire);
        if ptr.is_null() {
            return Err(Error::DisposedAccess(self.label));
        }
        Ok(ptr)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.ptr.load(Ordering::Acquire).is_null()
    }

    /// Relinquishes ownership and hands the pointer to the caller, who is
    /// responsible for passing it to its new owner.
    ///
    /// The pointer and the ownership claim are cleared together in one
    /// atomic swap, so a concurrent `dispose` can never free a transferred
    /// resource.
    pub(crate) fn release(&self) -> Result<*mut c_void> {
        let ptr = self.ptr.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            return Err(Error::DisposedAccess(self.label));
        }
        Ok(ptr)
    }

    /// Releases the foreign resource through `deleter` if this handle owns
    /// it. Idempotent and safe to call from any thread; the swap decides a
    /// single winner.
    pub(crate) fn dispose_with(&self, deleter: impl FnOnce(*mut c_void)) {
        let ptr = self.ptr.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !ptr.is_null() && self.owner {
            deleter(ptr);
        }
    }
}

/// Takes ownership of a heap C string produced by the engine and releases
/// the foreign allocation.
pub(crate) unsafe fn take_heap_string(ptr: *mut c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let text = unsafe { std::ffi::CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned();
    unsafe { mediagraph_sys::mgStringDelete(ptr) };
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn deleter_counter(counter: &AtomicUsize) -> impl FnOnce(*mut c_void) + '_ {
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dispose_is_idempotent() {
        let target = Box::into_raw(Box::new(17_u32)) as *mut c_void;
        let handle = RawHandle::owned("test", target);
        let released = AtomicUsize::new(0);

        handle.dispose_with(deleter_counter(&released));
        handle.dispose_with(deleter_counter(&released));

        assert_eq!(released.load(Ordering::SeqCst), 1);
        drop(unsafe { Box::from_raw(target as *mut u32) });
    }

    #[test]
    fn access_after_dispose_fails() {
        let mut value = 17_u32;
        let handle = RawHandle::owned("test", &mut value as *mut u32 as *mut c_void);
        assert!(handle.get().is_ok());

        handle.dispose_with(|_| {});
        assert!(handle.is_disposed());
        assert!(matches!(handle.get(), Err(Error::DisposedAccess("test"))));
        assert!(matches!(
            handle.release(),
            Err(Error::DisposedAccess("test"))
        ));
    }

    #[test]
    fn non_owning_handle_never_releases() {
        let mut value = 17_u32;
        let handle = RawHandle::borrowed("test", &mut value as *mut u32 as *mut c_void);
        let released = AtomicUsize::new(0);

        handle.dispose_with(deleter_counter(&released));

        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert!(handle.is_disposed());
    }

    #[test]
    fn release_transfers_exactly_once() {
        let mut value = 17_u32;
        let target = &mut value as *mut u32 as *mut c_void;
        let handle = RawHandle::owned("test", target);
        let released = AtomicUsize::new(0);

        assert_eq!(handle.release().unwrap(), target);
        handle.dispose_with(deleter_counter(&released));

        // The transferred pointer must not be freed by the old owner.
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }
}
