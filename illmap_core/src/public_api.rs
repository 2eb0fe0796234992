use crate::{
    errors::{map_error, set_last_error, ErrorCode},
    IntMap,
};
use std::ops::ControlFlow;
use std::os::raw::c_void;

/// Opaque handle – **always** treated as owned by the caller.
pub type IllmapHandle = *mut IntMap;

/// Per-entry callback for `illmap_for_each`; return `false` to stop.
pub type IllmapVisit = extern "C" fn(key: u64, value: u64, ctx: *mut c_void) -> bool;

// ───────────────────────── lifetime ──────────────────────────────────── //

/// Create a map pre-sized for `capacity` insertions (`0` = lazy).
/// Returns `Success` **and** stores the handle in `*out`
/// -- or an error code otherwise.
#[no_mangle]
pub extern "C" fn illmap_create(capacity: usize, out: *mut IllmapHandle) -> ErrorCode {
    if out.is_null() {
        return ErrorCode::InvalidHandle;
    }
    match IntMap::with_capacity(capacity) {
        Ok(map) => unsafe {
            *out = Box::into_raw(Box::new(map));
            ErrorCode::Success
        },
        Err(e) => map_error(&e),
    }
}

#[no_mangle]
pub extern "C" fn illmap_destroy(h: IllmapHandle) {
    if !h.is_null() {
        let map = unsafe { Box::from_raw(h) };
        (*map).destroy();
    }
}

// ───────────────────────── CRUD ──────────────────────────────────────── //

/// `false` only when the map could not grow (see `illmap_last_error`).
#[no_mangle]
pub extern "C" fn illmap_set(h: IllmapHandle, key: u64, value: u64) -> bool {
    let Some(map) = (unsafe { h.as_mut() }) else {
        set_last_error(ErrorCode::InvalidHandle);
        return false;
    };
    match map.set(key, value) {
        Ok(()) => true,
        Err(e) => {
            set_last_error(map_error(&e));
            false
        }
    }
}

/// Stores the value in `*out` when `out` is non-null.
#[no_mangle]
pub extern "C" fn illmap_get(h: IllmapHandle, key: u64, out: *mut u64) -> bool {
    let Some(map) = (unsafe { h.as_ref() }) else {
        set_last_error(ErrorCode::InvalidHandle);
        return false;
    };
    match map.get(key) {
        Some(v) => {
            if !out.is_null() {
                unsafe { *out = v };
            }
            true
        }
        None => false,
    }
}

#[no_mangle]
pub extern "C" fn illmap_has(h: IllmapHandle, key: u64) -> bool {
    unsafe { h.as_ref() }.is_some_and(|m| m.has(key))
}

#[no_mangle]
pub extern "C" fn illmap_del(h: IllmapHandle, key: u64) -> bool {
    unsafe { h.as_mut() }.is_some_and(|m| m.delete(key))
}

#[no_mangle]
pub extern "C" fn illmap_len(h: IllmapHandle) -> usize {
    unsafe { h.as_ref() }.map_or(0, IntMap::len)
}

#[no_mangle]
pub extern "C" fn illmap_clear(h: IllmapHandle) -> ErrorCode {
    match unsafe { h.as_mut() } {
        Some(m) => {
            m.clear();
            ErrorCode::Success
        }
        None => ErrorCode::InvalidHandle,
    }
}

/// Visits entries until `visit` returns `false`.
#[no_mangle]
pub extern "C" fn illmap_for_each(h: IllmapHandle, visit: IllmapVisit, ctx: *mut c_void) -> ErrorCode {
    let Some(map) = (unsafe { h.as_ref() }) else {
        return ErrorCode::InvalidHandle;
    };
    let _ = map.for_each(|k, v| {
        if visit(k, v, ctx) {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    });
    ErrorCode::Success
}
