//! Ownership-safe session, statement, and hook wrappers over the SQLite C API.
//!
//! # Intention
//!
//! - Own the native connection and prepared-statement handles so each is
//!   closed/finalized exactly once, in any drop order.
//! - Translate the engine's row-change, commit, and rollback notifications
//!   into typed callbacks.
//! - Convert engine error codes into typed errors carrying the engine's
//!   diagnostic text.
//!
//! # Architectural Boundaries
//!
//! - SQL semantics, query planning, transactions, and storage belong to the
//!   engine; this crate only consumes its C-level API.
//! - The statement bind/column convenience layer is a peer component; a
//!   [`Statement`] here is executable (`step`) and nothing more.
//!
//! # Example
//!
//! ```no_run
//! use sqlite_session::Session;
//!
//! # fn main() -> sqlite_session::Result<()> {
//! let db = Session::open_memory()?;
//! db.exec("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)")?;
//! db.update_hook(|event| println!("{event:?}"));
//! db.exec("INSERT INTO t(v) VALUES ('a')")?;
//! assert_eq!(db.last_insert_rowid(), 1);
//! # Ok(())
//! # }
//! ```

/// Raw bindings to the engine, re-exported for [`Session::inherit`] and
/// `as_raw` callers.
pub use libsqlite3_sys as ffi;

mod error;
mod handle;
mod session;
mod statement;

pub use error::{Error, Result};
pub use session::{ChangeEvent, ChangeKind, Session};
pub use statement::{Statement, StepResult};
