//! Exclusive ownership of the native `sqlite3` connection pointer.

use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use std::ptr;

use libsqlite3_sys as ffi;

use crate::error::{Error, Result};

/// Sole owner of a native `sqlite3*`. Closes it exactly once on drop.
pub(crate) struct Handle {
    raw: *mut ffi::sqlite3,
}

// A connection opened with SQLITE_OPEN_NOMUTEX is safe for use from multiple
// threads as long as no two threads drive the same prepared statement at
// once. Statement access is guarded by `Statement` being Send but not Sync.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    const OPEN_FLAGS: c_int = ffi::SQLITE_OPEN_READWRITE
        | ffi::SQLITE_OPEN_CREATE
        | ffi::SQLITE_OPEN_NOMUTEX
        | ffi::SQLITE_OPEN_PRIVATECACHE;

    /// Open or create a file-backed connection (`":memory:"` for a private
    /// in-memory database).
    pub(crate) fn open(path: &str) -> Result<Self> {
        let c_path = CString::new(path)
            .map_err(|_| Error::Open("database path contains a nul byte".into()))?;

        let mut raw: *mut ffi::sqlite3 = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_path.as_ptr(), &mut raw, Self::OPEN_FLAGS, ptr::null())
        };
        // sqlite allocates a handle even when the open fails; wrapping it
        // before the status check guarantees it is closed on the error path.
        let handle = Handle { raw };
        if rc != ffi::SQLITE_OK {
            return Err(Error::Open(error_string(rc)));
        }
        Ok(handle)
    }

    /// Adopt a connection the caller opened and configured by other means.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid open `sqlite3*` that no other owner will close.
    pub(crate) unsafe fn from_raw(raw: *mut ffi::sqlite3) -> Self {
        Handle { raw }
    }

    pub(crate) fn as_ptr(&self) -> *mut ffi::sqlite3 {
        self.raw
    }

    /// Diagnostic text for the most recent failed call on this connection.
    pub(crate) fn errmsg(&self) -> String {
        unsafe {
            CStr::from_ptr(ffi::sqlite3_errmsg(self.raw))
                .to_string_lossy()
                .into_owned()
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        // close_v2 defers teardown until outstanding statements are
        // finalized, so dropping with live statements cannot corrupt the
        // connection. A null pointer (failed open under OOM) is a no-op.
        unsafe {
            ffi::sqlite3_close_v2(self.raw);
        }
    }
}

/// Engine diagnostic text for a result code.
pub(crate) fn error_string(rc: c_int) -> String {
    unsafe {
        CStr::from_ptr(ffi::sqlite3_errstr(rc))
            .to_string_lossy()
            .into_owned()
    }
}
