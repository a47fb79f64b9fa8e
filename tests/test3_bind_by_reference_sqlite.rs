#![cfg(feature = "sqlite")]
use sql_bindery::prelude::*;

#[test]
fn live_cells_are_read_at_each_execution() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    registry.add_sqlite("main", SqliteOptions::in_memory(), true);
    let mut s = registry.session();
    s.execute(
        "CREATE TABLE t_video (video_id INTEGER PRIMARY KEY, video_title TEXT NOT NULL, \
         video_support TEXT, video_stock INTEGER)",
    )?;

    let title = ValueCell::default();
    let support = ValueCell::default();
    let stock = ValueCell::default();
    let by_ref = s.injector_in(BindMode::ByReference);
    let t = by_ref.inject(Param::from(&title), SemanticType::Str.into())?;
    let su = by_ref.inject(Param::from(&support), BindOpts::typed(SemanticType::Str).nullable())?;
    let st = by_ref.inject(Param::from(&stock), SemanticType::Int.into())?;
    let sql = format!(
        "INSERT INTO t_video (video_title, video_support, video_stock) VALUES ({t}, {su}, {st})"
    );

    let films = [
        ("Gladiator", None, 3),
        ("Amelie", Some("DVD"), 7),
        ("Heat", None, 2),
    ];
    for (n, (name, media, count)) in films.iter().enumerate() {
        title.set(*name);
        support.set(*media);
        stock.set(*count);
        assert_eq!(s.insert(&sql)?, Some((n + 1).to_string()));
        // live cells keep the statement context alive
        assert_eq!(s.token_count(), 3);
    }

    let rows = s
        .select("SELECT video_title, video_support, video_stock FROM t_video ORDER BY video_id")?
        .ok_or("no result")?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows.results[1].get("video_support"), Some(&SqlValue::Text("DVD".into())));
    assert_eq!(rows.results[2].get("video_support"), Some(&SqlValue::Null));
    assert_eq!(rows.results[2].get("video_stock"), Some(&SqlValue::Int(2)));

    s.reset();
    assert_eq!(s.token_count(), 0);
    Ok(())
}

#[test]
fn null_in_a_non_nullable_cell_fails_at_execution() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::new();
    registry.add_sqlite("main", SqliteOptions::in_memory(), true);
    registry.set_error_mode(ErrorMode::wrap(|f| f.to_string()));
    let mut s = registry.session();
    s.execute("CREATE TABLE t (n INTEGER)")?;

    let cell = ValueCell::default();
    let tag = s
        .injector_in(BindMode::ByReference)
        .inject(Param::from(&cell), SemanticType::Int.into())?;

    // validation failures propagate even in wrap mode
    let err = s.insert(&format!("INSERT INTO t (n) VALUES ({tag})")).unwrap_err();
    assert_eq!(err.as_validation(), Some(&ValidationError::NotNullable));
    assert!(registry.take_error_reports().is_empty());
    Ok(())
}

#[test]
fn aggregates_cannot_be_bound() {
    let registry = Registry::new();
    let s = registry.session();
    let cell = ValueCell::new(serde_json::json!({"title": "Movie"}));
    let err = s
        .injector_in(BindMode::ByReference)
        .inject(Param::from(&cell), BindOpts::default())
        .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue(_)));

    let err = s
        .injector_in(BindMode::ByReference)
        .inject(Param::from(5), BindOpts::default())
        .unwrap_err();
    assert!(matches!(err, ValidationError::InvalidValue(_)));
}
