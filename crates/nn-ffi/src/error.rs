use std::cell::RefCell;
use std::ffi::CString;

use nn_runtime::NnError;

use crate::types::NNStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `nn_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record `err` as the last error and map it to its status code.
pub fn report(err: NnError) -> NNStatus {
    let status = NNStatus::from(err.kind());
    set_last_error(err.to_string());
    status
}
