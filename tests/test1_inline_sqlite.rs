#![cfg(feature = "sqlite")]
use std::sync::Arc;

use sql_bindery::prelude::*;

const DDL: &str = "CREATE TABLE t_video (
    video_id INTEGER PRIMARY KEY AUTOINCREMENT,
    video_title TEXT NOT NULL,
    video_support TEXT,
    video_multilingual INTEGER,
    video_chapter INTEGER,
    video_year INTEGER,
    video_summary TEXT,
    video_stock INTEGER
)";

fn registry() -> Arc<Registry> {
    let registry = Registry::new();
    registry.add_sqlite("main", SqliteOptions::in_memory(), true);
    registry
}

#[test]
fn inline_insert_then_select() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry();
    let mut s = registry.session();
    s.execute(DDL)?;

    let title = s.lit("Movie", SemanticType::Str)?;
    let stock = s.lit(10, SemanticType::Int)?;
    let id = s.insert(&format!(
        "INSERT INTO t_video (video_title, video_stock) VALUES ({title}, {stock})"
    ))?;
    assert_eq!(id.as_deref(), Some("1"));
    assert_eq!(s.token_count(), 0);

    let rows = s.select("SELECT * FROM t_video")?.ok_or("no result")?;
    assert_eq!(rows.len(), 1);
    let row = rows.first().ok_or("no row")?;
    assert_eq!(row.get("video_stock"), Some(&SqlValue::Int(10)));
    assert_eq!(row.get("video_title"), Some(&SqlValue::Text("Movie".into())));
    assert_eq!(row.get("video_id"), Some(&SqlValue::Int(1)));
    Ok(())
}

#[test]
fn literals_are_quoted_by_the_backend() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry();
    let mut s = registry.session();
    s.execute(DDL)?;

    let title = s.lit("Lock, Stock and Two 'Smoking' Barrels", SemanticType::Str)?;
    let support = s.lit(None::<String>, BindOpts::typed(SemanticType::Str).nullable())?;
    let multilingual = s.lit(true, SemanticType::Bool)?;
    let year = s.lit("1998 (UK)", SemanticType::Int)?;
    s.insert(&format!(
        "INSERT INTO t_video (video_title, video_support, video_multilingual, video_year) \
         VALUES ({title}, {support}, {multilingual}, {year})"
    ))?;

    let rows = s
        .select("SELECT video_title, video_support, video_multilingual, video_year FROM t_video")?
        .ok_or("no result")?;
    let row = rows.first().ok_or("no row")?;
    assert_eq!(
        row.get("video_title").and_then(SqlValue::as_text),
        Some("Lock, Stock and Two 'Smoking' Barrels")
    );
    assert_eq!(row.get("video_support"), Some(&SqlValue::Null));
    assert_eq!(row.get("video_multilingual"), Some(&SqlValue::Int(1)));
    assert_eq!(row.get("video_year"), Some(&SqlValue::Int(1998)));
    Ok(())
}

#[test]
fn stale_tags_fail_after_auto_reset() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry();
    let mut s = registry.session();
    s.execute(DDL)?;
    s.execute("INSERT INTO t_video (video_title, video_stock) VALUES ('Movie', 10)")?;

    let stock = s.lit(10, SemanticType::Int)?;
    let sql = format!("SELECT video_id FROM t_video WHERE video_stock = {stock}");
    assert_eq!(s.select(&sql)?.map(|rows| rows.len()), Some(1));

    // the bag was cleared, so the tag reaches the backend unresolved
    assert!(s.select(&sql).is_err());
    assert!(s.has_failed());
    Ok(())
}

#[test]
fn null_without_nullable_is_rejected_before_any_sql() {
    let registry = registry();
    let s = registry.session();
    let err = s.lit(None::<i64>, SemanticType::Int).unwrap_err();
    assert_eq!(err, ValidationError::NotNullable);
    assert_eq!(s.token_count(), 0);
}

#[test]
fn execute_reports_rows_changed_by_that_statement() -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry();
    let mut s = registry.session();
    s.execute("CREATE TABLE t (a INTEGER)")?;
    assert_eq!(s.execute("INSERT INTO t VALUES (1), (2), (3)")?, Some(3));
    assert_eq!(s.execute("CREATE TABLE u (b INTEGER)")?, Some(0));
    assert_eq!(s.update("UPDATE t SET a = a + 1 WHERE a > 1")?, Some(2));
    assert_eq!(s.delete("DELETE FROM u")?, Some(0));
    Ok(())
}
