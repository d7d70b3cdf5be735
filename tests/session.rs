use sqlite_session::{Session, StepResult};
use tempfile::tempdir;

// Helper to create the schema used across these tests.
fn init_schema(db: &Session) -> anyhow::Result<()> {
    db.exec("CREATE TABLE t(id INTEGER PRIMARY KEY, v TEXT)")?;
    Ok(())
}

// Count result rows by stepping, since column extraction lives outside this
// crate.
fn count_rows(db: &Session, sql: &str) -> anyhow::Result<usize> {
    let mut stmt = db.prepare(sql)?;
    let mut rows = 0;
    while stmt.step()? == StepResult::Row {
        rows += 1;
    }
    Ok(rows)
}

#[test]
fn file_database_persists_across_sessions() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path_buf = dir.path().join("events.db");
    let path = path_buf.to_str().unwrap();

    {
        let db = Session::open(path)?;
        init_schema(&db)?;
        db.exec("INSERT INTO t(v) VALUES ('persisted')")?;
        // Dropping the session here must close the file cleanly.
    }

    let db = Session::open(path)?;
    assert_eq!(count_rows(&db, "SELECT v FROM t")?, 1);
    Ok(())
}

#[test]
fn memory_databases_are_independent() -> anyhow::Result<()> {
    let first = Session::open_memory()?;
    let second = Session::open_memory()?;
    init_schema(&first)?;
    first.exec("INSERT INTO t(v) VALUES ('only here')")?;

    // The second connection has its own private database with no schema.
    assert!(second.exec("INSERT INTO t(v) VALUES ('x')").is_err());
    assert_eq!(count_rows(&first, "SELECT v FROM t")?, 1);
    Ok(())
}

#[test]
fn failed_prepare_leaves_session_usable() -> anyhow::Result<()> {
    let db = Session::open_memory()?;
    assert!(db.prepare("SELECT FROM WHERE").is_err());

    let mut stmt = db.prepare("SELECT 1")?;
    assert_eq!(stmt.step()?, StepResult::Row);
    assert_eq!(stmt.step()?, StepResult::Done);
    Ok(())
}

#[test]
fn last_insert_rowid_is_stable_between_inserts() -> anyhow::Result<()> {
    let db = Session::open_memory()?;
    init_schema(&db)?;

    db.exec("INSERT INTO t(v) VALUES ('a')")?;
    assert_eq!(db.last_insert_rowid(), 1);
    assert_eq!(db.last_insert_rowid(), 1);

    db.exec("INSERT INTO t(v) VALUES ('b')")?;
    assert_eq!(db.last_insert_rowid(), 2);
    Ok(())
}

#[test]
fn statement_keeps_session_alive() -> anyhow::Result<()> {
    let db = Session::open_memory()?;
    init_schema(&db)?;
    db.exec("INSERT INTO t(v) VALUES ('a')")?;

    let mut insert = db.prepare("INSERT INTO t(v) VALUES ('b')")?;
    let mut select = db.prepare("SELECT v FROM t")?;
    drop(db);

    // Both statements stay executable; the connection closes only after
    // the last of them is dropped.
    assert_eq!(insert.step()?, StepResult::Done);
    assert_eq!(select.step()?, StepResult::Row);
    assert_eq!(select.step()?, StepResult::Row);
    assert_eq!(select.step()?, StepResult::Done);
    Ok(())
}

#[test]
fn reset_allows_re_execution() -> anyhow::Result<()> {
    let db = Session::open_memory()?;
    init_schema(&db)?;
    db.exec("INSERT INTO t(v) VALUES ('a')")?;

    let mut select = db.prepare("SELECT v FROM t")?;
    assert_eq!(select.step()?, StepResult::Row);
    assert_eq!(select.step()?, StepResult::Done);

    select.reset()?;
    assert_eq!(select.step()?, StepResult::Row);
    Ok(())
}

#[test]
fn raw_escape_hatches_expose_live_handles() -> anyhow::Result<()> {
    let db = Session::open_memory()?;
    init_schema(&db)?;
    db.exec("INSERT INTO t(v) VALUES ('a')")?;

    let stmt = db.prepare("SELECT v FROM t")?;
    // The statement's session accessor reaches the same connection.
    assert_eq!(stmt.session().last_insert_rowid(), 1);
    assert_eq!(stmt.session().as_raw(), db.as_raw());
    assert!(!stmt.as_raw().is_null());
    assert!(format!("{stmt:?}").contains("Statement"));
    Ok(())
}

#[test]
fn inherit_adopts_caller_opened_connection() -> anyhow::Result<()> {
    use sqlite_session::ffi;

    let mut raw: *mut ffi::sqlite3 = std::ptr::null_mut();
    let rc = unsafe {
        ffi::sqlite3_open_v2(
            c":memory:".as_ptr(),
            &mut raw,
            ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
            std::ptr::null(),
        )
    };
    assert_eq!(rc, ffi::SQLITE_OK);

    // SAFETY: `raw` was just opened and nothing else will close it.
    let db = unsafe { Session::inherit(raw) };
    init_schema(&db)?;
    db.exec("INSERT INTO t(v) VALUES ('a')")?;
    assert_eq!(db.last_insert_rowid(), 1);
    Ok(())
}
