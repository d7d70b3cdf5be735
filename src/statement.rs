//! Minimal prepared-statement wrapper.
//!
//! A [`Statement`] is created only by [`Session::prepare`] and holds its own
//! clone of the session, so the connection stays open for as long as the
//! statement exists; dropping the caller's last `Session` clone first is
//! fine. The bind/column convenience layer lives outside this crate; only
//! stepping, resetting, and raw access are provided here.

use std::fmt;

use libsqlite3_sys as ffi;

use crate::error::Result;
use crate::session::{step_error, Session};

/// Outcome of one [`Statement::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A result row is available.
    Row,
    /// Execution finished; no further rows.
    Done,
}

/// A compiled SQL statement bound to one [`Session`].
pub struct Statement {
    raw: *mut ffi::sqlite3_stmt,
    session: Session,
}

// The statement may move across threads, but must not be stepped from two
// threads at once; &mut receivers enforce that.
unsafe impl Send for Statement {}

impl Statement {
    /// # Safety
    ///
    /// `raw` must be a valid statement prepared on `session`'s connection,
    /// owned exclusively by the new wrapper.
    pub(crate) unsafe fn from_raw(raw: *mut ffi::sqlite3_stmt, session: Session) -> Self {
        Statement { raw, session }
    }

    /// Advance execution by one step.
    pub fn step(&mut self) -> Result<StepResult> {
        match unsafe { ffi::sqlite3_step(self.raw) } {
            ffi::SQLITE_ROW => Ok(StepResult::Row),
            ffi::SQLITE_DONE => Ok(StepResult::Done),
            _ => Err(step_error(&self.session)),
        }
    }

    /// Rewind the statement so it can be executed again. Bindings are kept.
    pub fn reset(&mut self) -> Result<()> {
        let rc = unsafe { ffi::sqlite3_reset(self.raw) };
        if rc != ffi::SQLITE_OK {
            return Err(step_error(&self.session));
        }
        Ok(())
    }

    /// The session this statement was prepared on.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The raw statement pointer, for engine calls this wrapper does not
    /// cover. The statement retains finalize ownership.
    pub fn as_raw(&self) -> *mut ffi::sqlite3_stmt {
        self.raw
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("statement", &self.raw)
            .field("session", &self.session)
            .finish()
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}
