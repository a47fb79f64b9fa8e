use std::sync::Arc;

use sql_bindery::prelude::*;
use sql_bindery::test_utils::FakeConnection;

#[test]
fn throw_mode_returns_backend_errors() {
    let registry = Registry::new();
    let fake = FakeConnection::new();
    fake.fail_on("missing_table");
    registry.add_connection_instance("main", Arc::new(fake), true);

    let mut s = registry.session();
    let err = s.select("SELECT * FROM missing_table").unwrap_err();
    assert!(err.is_backend());
    assert!(s.has_failed());
    assert!(registry.take_error_reports().is_empty());
}

#[test]
fn wrap_mode_stores_the_callback_output() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    let fake = FakeConnection::new();
    fake.fail_on("missing_table");
    registry.add_connection_instance("main", Arc::new(fake), true);
    registry.set_error_mode(ErrorMode::wrap(|failure: &BackendFailure| {
        format!("[{}] {}", failure.verb, failure.sql)
    }));

    let mut s = registry.session();
    assert!(s.select("SELECT * FROM missing_table")?.is_none());
    assert!(s.delete("DELETE FROM missing_table")?.is_none());
    assert_eq!(
        registry.take_error_reports(),
        [
            "[select] SELECT * FROM missing_table",
            "[delete] DELETE FROM missing_table",
        ]
    );

    // the next verb still works once the caller resets
    s.reset();
    assert_eq!(s.update("UPDATE t_video SET video_stock = 0")?, Some(1));
    Ok(())
}

#[test]
fn wrap_mode_does_not_swallow_validation_or_lookup_errors() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    registry.set_error_mode(ErrorMode::wrap(|f| f.to_string()));
    assert!(registry.error_mode().is_wrap());

    let mut s = registry.session();
    let err = s.select("SELECT 1").unwrap_err();
    assert!(matches!(err, BinderyError::UnknownConnection(_)));

    let err = s.use_connection("reporting").unwrap_err();
    assert!(matches!(err, BinderyError::UnknownConnection(id) if id == "reporting"));

    let err = s
        .lit(serde_json::json!(["a", "b"]), BindOpts::default())
        .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue(_)));
    assert!(registry.take_error_reports().is_empty());
    Ok(())
}

#[test]
fn sessions_can_switch_connections() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    let main = FakeConnection::new();
    let archive = FakeConnection::new();
    registry.add_connection_instance("main", Arc::new(main.clone()), true);
    registry.add_connection_instance("archive", Arc::new(archive.clone()), false);

    let mut s = registry.session();
    s.execute("DELETE FROM t_video")?;
    s.use_connection("archive")?;
    assert_eq!(s.connection_id(), Some("archive"));
    s.execute("DELETE FROM t_video_archive")?;

    assert_eq!(main.statements(), ["DELETE FROM t_video"]);
    assert_eq!(archive.statements(), ["DELETE FROM t_video_archive"]);
    Ok(())
}

#[cfg(feature = "sqlite")]
#[test]
fn wrap_mode_reports_sqlite_failures() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    registry.add_sqlite("main", SqliteOptions::in_memory(), true);
    registry.set_error_mode(ErrorMode::wrap(|f| f.error.to_string()));

    let mut s = registry.session();
    assert!(s.select("SELECT * FROM t_nothing")?.is_none());
    let reports = registry.take_error_reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("no such table"));
    Ok(())
}
