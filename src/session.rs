//! Shared database session: factories, one-shot execution, statement
//! preparation, and row-change/commit/rollback hooks.
//!
//! A [`Session`] is a cheap clone over a reference-counted inner object that
//! owns the connection. Every [`Statement`](crate::Statement) produced by
//! [`Session::prepare`] holds its own clone, so the connection stays open
//! until the last session clone and the last statement are gone.
//!
//! Hooks are delivered through one C trampoline per hook kind, installed
//! lazily on the first registration of that kind and never un-registered.
//! The trampoline receives the inner object's address as its context and
//! reads the *current* callback at fire time, so swapping or clearing a
//! callback never touches the engine again.

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;
use std::sync::{Arc, Mutex, Once};

use libsqlite3_sys as ffi;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::statement::Statement;

/// Reserved path token for a private, connection-scoped in-memory database.
const MEMORY_PATH: &str = ":memory:";

/// The kind of row mutation reported by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-change notification, delivered synchronously while the mutating
/// statement is still executing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Name of the database/schema the change happened in (e.g. `"main"`).
    pub database: String,
    pub table: String,
    pub rowid: i64,
}

type UpdateHook = Arc<dyn Fn(ChangeEvent) + Send + Sync>;
type CommitHook = Arc<dyn Fn() -> bool + Send + Sync>;
type RollbackHook = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct SessionInner {
    handle: Handle,
    update: Mutex<Option<UpdateHook>>,
    commit: Mutex<Option<CommitHook>>,
    rollback: Mutex<Option<RollbackHook>>,
    update_installed: Once,
    commit_installed: Once,
    rollback_installed: Once,
}

/// A shared handle to one open database connection.
///
/// Cloning is cheap and shares the connection; the connection closes when
/// the last clone (and the last [`Statement`] prepared from it) is dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Open or create a file-backed database at `path`.
    ///
    /// The connection is opened read-write-create, in multi-thread mode
    /// (no per-connection mutex), with a private statement cache. Fails
    /// with [`Error::Open`] carrying the engine diagnostic; a partially
    /// opened native handle is still closed before the error propagates.
    pub fn open(path: &str) -> Result<Session> {
        let session = Self::wrap(Handle::open(path)?);
        debug!(path, "opened database");
        Ok(session)
    }

    /// Open a private in-memory database. Two calls produce two fully
    /// independent databases.
    pub fn open_memory() -> Result<Session> {
        Self::open(MEMORY_PATH)
    }

    /// Adopt a connection the caller already opened and configured by
    /// whatever means; close ownership transfers to the session.
    ///
    /// # Safety
    ///
    /// `raw` must be a valid open `sqlite3*` that no other owner will close.
    /// No validation of the pointer's state is performed.
    pub unsafe fn inherit(raw: *mut ffi::sqlite3) -> Session {
        let session = Self::wrap(Handle::from_raw(raw));
        debug!("inherited caller-opened connection");
        session
    }

    fn wrap(handle: Handle) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                handle,
                update: Mutex::new(None),
                commit: Mutex::new(None),
                rollback: Mutex::new(None),
                update_installed: Once::new(),
                commit_installed: Once::new(),
                rollback_installed: Once::new(),
            }),
        }
    }

    /// Compile `sql` into an executable [`Statement`] bound to this session.
    ///
    /// The returned statement keeps the session (and its connection) alive
    /// until the statement itself is dropped. SQL text containing an
    /// embedded nul byte is rejected; the engine sees nul-terminated text
    /// only. SQL consisting only of whitespace or comments also fails,
    /// since it compiles to no statement.
    pub fn prepare(&self, sql: &str) -> Result<Statement> {
        trace!(sql, "prepare");
        let c_sql = CString::new(sql)
            .map_err(|_| Error::Prepare("SQL text contains a nul byte".into()))?;

        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                self.inner.handle.as_ptr(),
                c_sql.as_ptr(),
                -1,
                &mut raw,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            // On failure the out-pointer is documented to be null, but a
            // finalize here keeps the error path leak-free regardless.
            unsafe {
                ffi::sqlite3_finalize(raw);
            }
            return Err(Error::Prepare(self.inner.handle.errmsg()));
        }
        // Whitespace or comment-only SQL compiles "successfully" to a null
        // statement, which must never escape as a Statement.
        if raw.is_null() {
            return Err(Error::Prepare("SQL text contains no statement".into()));
        }
        Ok(unsafe { Statement::from_raw(raw, self.clone()) })
    }

    /// Compile, execute, and discard results for `sql` in one call.
    ///
    /// Intended for statements with no parameters and no row results
    /// (schema DDL, pragmas, simple DML). `sql` may contain several
    /// semicolon-separated statements; execution stops at the first
    /// failure. SQL text containing an embedded nul byte is rejected.
    pub fn exec(&self, sql: &str) -> Result<()> {
        trace!(sql, "exec");
        let c_sql =
            CString::new(sql).map_err(|_| Error::Exec("SQL text contains a nul byte".into()))?;

        let mut errmsg: *mut c_char = ptr::null_mut();
        let rc = unsafe {
            ffi::sqlite3_exec(
                self.inner.handle.as_ptr(),
                c_sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut errmsg,
            )
        };
        if rc != ffi::SQLITE_OK {
            let message = if errmsg.is_null() {
                "unknown error".to_string()
            } else {
                unsafe {
                    let message = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg as *mut c_void);
                    message
                }
            };
            return Err(Error::Exec(message));
        }
        Ok(())
    }

    /// Row identifier generated by the most recent successful insert on
    /// this connection. Repeated calls without an intervening insert return
    /// the same value.
    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.inner.handle.as_ptr()) }
    }

    /// Register `hook` to run once per inserted, updated, or deleted row
    /// during subsequent data-modifying statements, replacing any previous
    /// row-change callback.
    ///
    /// Events are delivered synchronously, in row-touch order, before the
    /// mutating call returns. If the engine ever reports a change kind
    /// outside insert/update/delete, the hook trampoline panics (which
    /// aborts the process inside the C callback): that is an engine
    /// contract violation, not a recoverable error.
    pub fn update_hook<F>(&self, hook: F)
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        *self.inner.update.lock().unwrap() = Some(Arc::new(hook));
        self.inner.update_installed.call_once(|| unsafe {
            ffi::sqlite3_update_hook(
                self.inner.handle.as_ptr(),
                Some(update_trampoline),
                self.context(),
            );
        });
    }

    /// Discard the current row-change callback. The engine-level trampoline
    /// stays installed; it simply finds no callback to call.
    pub fn clear_update_hook(&self) {
        *self.inner.update.lock().unwrap() = None;
    }

    /// Register `hook` to run immediately before a transaction commits,
    /// replacing any previous commit callback. Returning `true` allows the
    /// commit; returning `false` converts it into a rollback (and the
    /// statement that attempted the commit fails with a constraint error).
    pub fn commit_hook<F>(&self, hook: F)
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        *self.inner.commit.lock().unwrap() = Some(Arc::new(hook));
        self.inner.commit_installed.call_once(|| unsafe {
            ffi::sqlite3_commit_hook(
                self.inner.handle.as_ptr(),
                Some(commit_trampoline),
                self.context(),
            );
        });
    }

    /// Discard the current commit callback; commits proceed unconditionally.
    pub fn clear_commit_hook(&self) {
        *self.inner.commit.lock().unwrap() = None;
    }

    /// Register `hook` to run whenever a transaction rolls back, whether
    /// explicitly, because a commit hook vetoed it, or due to a
    /// constraint/conflict failure. Replaces any previous rollback callback.
    pub fn rollback_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.inner.rollback.lock().unwrap() = Some(Arc::new(hook));
        self.inner.rollback_installed.call_once(|| unsafe {
            ffi::sqlite3_rollback_hook(
                self.inner.handle.as_ptr(),
                Some(rollback_trampoline),
                self.context(),
            );
        });
    }

    /// Discard the current rollback callback.
    pub fn clear_rollback_hook(&self) {
        *self.inner.rollback.lock().unwrap() = None;
    }

    /// The raw connection pointer, for engine calls this façade does not
    /// wrap. The session retains close ownership; callers must not close or
    /// outlive it.
    pub fn as_raw(&self) -> *mut ffi::sqlite3 {
        self.inner.handle.as_ptr()
    }

    /// Stable context pointer handed to the engine: the address of the
    /// reference-counted inner object, which outlives every statement and
    /// therefore every possible hook invocation.
    fn context(&self) -> *mut c_void {
        Arc::as_ptr(&self.inner) as *mut c_void
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connection", &self.inner.handle.as_ptr())
            .finish()
    }
}

/// Forwards engine row-change notifications to the current callback.
///
/// SAFETY: `ctx` is the address of the `SessionInner` that installed this
/// trampoline. Hooks only fire while an engine call runs on this
/// connection, and every path into the engine (session or statement) holds
/// a strong reference to that inner object, so the dereference is valid.
unsafe extern "C" fn update_trampoline(
    ctx: *mut c_void,
    op: c_int,
    database: *const c_char,
    table: *const c_char,
    rowid: ffi::sqlite3_int64,
) {
    let inner = &*(ctx as *const SessionInner);
    // Clone the callback out of the lock so it may re-register hooks.
    let hook = inner.update.lock().unwrap().clone();
    let Some(hook) = hook else { return };

    let kind = match op {
        ffi::SQLITE_INSERT => ChangeKind::Insert,
        ffi::SQLITE_UPDATE => ChangeKind::Update,
        ffi::SQLITE_DELETE => ChangeKind::Delete,
        other => panic!("sqlite reported change kind {other}, expected insert/update/delete"),
    };
    hook(ChangeEvent {
        kind,
        database: CStr::from_ptr(database).to_string_lossy().into_owned(),
        table: CStr::from_ptr(table).to_string_lossy().into_owned(),
        rowid,
    });
}

/// SAFETY: see `update_trampoline`.
unsafe extern "C" fn commit_trampoline(ctx: *mut c_void) -> c_int {
    let inner = &*(ctx as *const SessionInner);
    let hook = inner.commit.lock().unwrap().clone();
    match hook {
        // Zero tells the engine to proceed; non-zero turns the commit into
        // a rollback.
        Some(hook) if !hook() => 1,
        _ => 0,
    }
}

/// SAFETY: see `update_trampoline`.
unsafe extern "C" fn rollback_trampoline(ctx: *mut c_void) {
    let inner = &*(ctx as *const SessionInner);
    let hook = inner.rollback.lock().unwrap().clone();
    if let Some(hook) = hook {
        hook();
    }
}

pub(crate) fn step_error(session: &Session) -> Error {
    Error::Step(session.inner.handle.errmsg())
}
