//! Error handling and C-ABI error codes for illmap

use std::cell::RefCell;
use std::os::raw::c_char;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    CapacityExceeded = 1,
    AllocFailed = 2,
    Corrupted = 3,
    InvalidHandle = 4,
    NotFound = 5,
    Unknown = 255,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        let s = self.as_cstr();
        &s[..s.len() - 1]
    }

    fn as_cstr(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success\0",
            ErrorCode::CapacityExceeded => "Capacity exceeded\0",
            ErrorCode::AllocFailed => "Allocation failed\0",
            ErrorCode::Corrupted => "Corrupted map\0",
            ErrorCode::InvalidHandle => "Invalid handle\0",
            ErrorCode::NotFound => "Not found\0",
            ErrorCode::Unknown => "Unknown error\0",
        }
    }
}

// Thread-local last error for C-ABI
thread_local! {
    static LAST_ERROR: RefCell<ErrorCode> = const { RefCell::new(ErrorCode::Success) };
}

pub fn set_last_error(code: ErrorCode) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = code);
}

pub fn get_last_error() -> ErrorCode {
    LAST_ERROR.with(|cell| *cell.borrow())
}

#[no_mangle]
pub extern "C" fn illmap_last_error() -> ErrorCode {
    get_last_error()
}

/// Static, NUL-terminated description of `code`.
#[no_mangle]
pub extern "C" fn illmap_strerror(code: ErrorCode) -> *const c_char {
    code.as_cstr().as_ptr() as *const c_char
}

// Map internal Error to ErrorCode
pub fn map_error(e: &crate::types::Error) -> ErrorCode {
    use crate::types::Error::*;
    match e {
        CapacityExceeded => ErrorCode::CapacityExceeded,
        AllocFailed => ErrorCode::AllocFailed,
        Corrupted(_) => ErrorCode::Corrupted,
    }
}
