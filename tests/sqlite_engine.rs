use anyhow::Result;
use rust_sql::{
    Conditions, Error, Order, Outcome, QueryEngine, ReadOperation, Row, SqliteSession,
    TransactionState, Value,
};
use std::time::Duration;
use tempfile::NamedTempFile;

type Engine = QueryEngine<SqliteSession>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Helper function to create an in-memory database for testing
fn create_test_db() -> Result<Engine> {
    init_logging();
    let engine = QueryEngine::open_in_memory()?;
    initialize_schema(&engine)?;
    Ok(engine)
}

// Helper function to create a temporary file-based database
fn create_temp_db() -> Result<(Engine, NamedTempFile)> {
    init_logging();
    let temp_file = NamedTempFile::new()?;
    let engine = QueryEngine::open_sqlite(temp_file.path())?;
    initialize_schema(&engine)?;
    Ok((engine, temp_file))
}

// Initialize the database schema
fn initialize_schema(engine: &Engine) -> Result<()> {
    engine.session().execute_batch(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            age INTEGER
        );
        CREATE INDEX idx_users_email ON users(email);
        "#,
    )?;
    Ok(())
}

fn user(name: &str, email: &str, age: Option<i64>) -> Conditions {
    Conditions::new()
        .with_value("name", name)
        .with_value("email", email)
        .with_value("age", age)
}

fn count(engine: &mut Engine, table: &str) -> Result<usize> {
    Ok(engine.filter(table, &Conditions::new())?.len())
}

#[test]
fn test_basic_operations() -> Result<()> {
    let mut engine = create_test_db()?;

    assert_eq!(engine.insert("users", &user("John Doe", "john@example.com", Some(30)))?, 1);
    let id = engine.last_insert_id();
    assert_eq!(id, 1);

    let found = engine
        .find("users", &Conditions::new().with_value("id", id as i64))?
        .expect("inserted user");
    assert_eq!(found.get("name"), Some(&Value::Text("John Doe".into())));
    assert_eq!(found.get("email"), Some(&Value::Text("john@example.com".into())));
    assert_eq!(found.get("age"), Some(&Value::Integer(30)));

    engine.update(
        "users",
        &Conditions::new().with_value("age", 31),
        &Conditions::new().with_value("id", id as i64),
    )?;
    let updated = engine.find("users", &Conditions::new().with_value("id", 1))?;
    assert_eq!(updated.and_then(|r| r.get("age").cloned()), Some(Value::Integer(31)));

    assert_eq!(engine.delete("users", &Conditions::new().with_value("id", 1))?, 1);
    assert!(engine.find("users", &Conditions::new().with_value("id", 1))?.is_none());

    Ok(())
}

#[test]
fn test_apostrophe_name_and_null_age() -> Result<()> {
    let mut engine = create_test_db()?;
    engine.insert(
        "users",
        &Conditions::new().with_value("name", "O'Brien").with_null("age"),
    )?;

    let found = engine
        .find("users", &Conditions::new().with_value("name", "O'Brien"))?
        .expect("O'Brien is stored");
    assert_eq!(found.get("name"), Some(&Value::Text("O'Brien".into())));
    assert_eq!(found.get("age"), Some(&Value::Null));
    Ok(())
}

#[test]
fn test_hostile_strings_round_trip() -> Result<()> {
    let mut engine = create_test_db()?;
    let samples = [
        "it's",
        "''",
        "back\\slash\\",
        "\\'",
        "line\nbreak\r\ttab",
        "' OR '1'='1",
        "x'); DROP TABLE users; --",
        "100% %s %d %%",
        "ünïcødé ✓",
        "nul\0byte",
        "trailing nul\0",
    ];
    for (i, s) in samples.iter().enumerate() {
        engine.insert(
            "users",
            &Conditions::new().with_value("id", i as i64 + 1).with_value("name", *s),
        )?;
    }

    // Read back through the driver's own parameter binding, not our escaping.
    let conn = engine.session().connection();
    for (i, s) in samples.iter().enumerate() {
        let stored: String = conn.query_row(
            "SELECT name FROM users WHERE id = ?1",
            [i as i64 + 1],
            |row| row.get(0),
        )?;
        assert_eq!(&stored, s);
    }

    // And match through our escaping as well.
    for s in samples {
        let rows = engine.filter("users", &Conditions::new().with_value("name", s))?;
        assert_eq!(rows.len(), 1, "filter on {:?}", s);
    }
    assert_eq!(count(&mut engine, "users")?, samples.len());
    Ok(())
}

#[test]
fn test_select_null_versus_string_null() -> Result<()> {
    let mut engine = create_test_db()?;
    engine.insert("users", &user("a", "NULL", None))?;
    engine.insert("users", &Conditions::new().with_value("name", "b").with_null("email"))?;
    engine.insert("users", &user("c", "c@example.com", None))?;

    let all = engine.select(&ReadOperation::new("users"))?;
    assert_eq!(all.len(), 3);

    let null_email = engine.filter("users", &Conditions::new().with_null("email"))?;
    assert_eq!(names(&null_email), vec!["b"]);

    let text_null = engine.filter("users", &Conditions::new().with_value("email", "NULL"))?;
    assert_eq!(names(&text_null), vec!["a"]);
    Ok(())
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.get("name").and_then(Value::as_str).map(String::from))
        .collect()
}

#[test]
fn test_select_fields_order_and_limit() -> Result<()> {
    let mut engine = create_test_db()?;
    for (name, age) in [("a", 20), ("b", 40), ("c", 30)] {
        engine.insert("users", &user(name, "x@example.com", Some(age)))?;
    }

    let rows = engine.select(
        &ReadOperation::new("users")
            .with_fields(&["name", "age"])
            .with_order("age", Order::Desc)
            .with_limit(2),
    )?;
    assert_eq!(names(&rows), vec!["b", "c"]);
    assert_eq!(rows[0].columns(), &["name".to_string(), "age".to_string()]);

    let ascending = engine.select(&ReadOperation::new("users").with_order("age", Order::Asc))?;
    assert_eq!(names(&ascending), vec!["a", "c", "b"]);
    Ok(())
}

#[test]
fn test_zero_rows_is_not_an_error() -> Result<()> {
    let mut engine = create_test_db()?;
    let rows = engine.filter("users", &Conditions::new().with_value("name", "nobody"))?;
    assert!(rows.is_empty());
    assert!(engine.find("users", &Conditions::new())?.is_none());

    let err = engine.filter("missing_table", &Conditions::new()).unwrap_err();
    assert!(matches!(err, Error::Execution { .. }));
    assert!(engine.last_error().contains("missing_table"));
    Ok(())
}

#[test]
fn test_rollback_discards_insert() -> Result<()> {
    let mut engine = create_test_db()?;
    engine.insert("users", &user("kept", "k@example.com", None))?;

    engine.begin()?;
    engine.insert("users", &user("temp", "t@example.com", None))?;
    assert_eq!(count(&mut engine, "users")?, 2);
    engine.rollback()?;

    assert_eq!(count(&mut engine, "users")?, 1);
    assert!(engine.find("users", &Conditions::new().with_value("name", "temp"))?.is_none());
    Ok(())
}

#[test]
fn test_commit_persists_insert() -> Result<()> {
    let (mut engine, temp_file) = create_temp_db()?;
    engine.begin()?;
    engine.insert("users", &user("durable", "d@example.com", Some(50)))?;
    engine.commit()?;
    engine.close()?;

    let mut reopened = QueryEngine::open_sqlite(temp_file.path())?;
    let found = reopened.find("users", &Conditions::new().with_value("name", "durable"))?;
    assert_eq!(found.and_then(|r| r.get("age").cloned()), Some(Value::Integer(50)));
    Ok(())
}

#[test]
fn test_busy_commit_keeps_transaction_open() -> Result<()> {
    let (mut writer, temp_file) = create_temp_db()?;
    let mut reader = QueryEngine::open_sqlite(temp_file.path())?;
    writer.session().connection().busy_timeout(Duration::ZERO)?;
    reader.session().connection().busy_timeout(Duration::ZERO)?;

    // The reader's open read transaction holds a shared lock on the file.
    reader.begin()?;
    assert_eq!(count(&mut reader, "users")?, 0);

    writer.begin()?;
    writer.insert("users", &user("pending", "p@example.com", None))?;
    assert!(writer.commit().is_err());
    assert!(writer.last_error().contains("locked"));
    assert_eq!(writer.transaction_state(), TransactionState::InTransaction);
    assert_eq!(writer.begin(), Err(Error::TransactionActive));

    reader.rollback()?;
    writer.commit()?;
    assert_eq!(writer.transaction_state(), TransactionState::Idle);
    assert_eq!(count(&mut reader, "users")?, 1);
    Ok(())
}

#[test]
fn test_transaction_closure() -> Result<()> {
    let mut engine = create_test_db()?;
    let failed: rust_sql::Result<()> = engine.transaction(|db| {
        db.insert("users", &user("first", "f@example.com", None))?;
        // NOT NULL violation aborts the unit of work
        db.insert("users", &Conditions::new().with_null("name"))?;
        Ok(())
    });
    assert!(failed.is_err());
    assert_eq!(count(&mut engine, "users")?, 0);
    assert!(engine.last_error().contains("NOT NULL"));

    engine.transaction(|db| db.insert("users", &user("second", "s@example.com", None)))?;
    assert_eq!(count(&mut engine, "users")?, 1);
    Ok(())
}

#[test]
fn test_update_to_null_touches_one_row() -> Result<()> {
    let mut engine = create_test_db()?;
    for id in 1..=6 {
        engine.insert(
            "users",
            &Conditions::new()
                .with_value("id", id)
                .with_value("name", format!("user{}", id))
                .with_value("age", 20 + id),
        )?;
    }

    let affected = engine.update(
        "users",
        &Conditions::new().with_null("age"),
        &Conditions::new().with_value("id", 5),
    )?;
    assert_eq!(affected, 1);

    let nulls = engine.filter("users", &Conditions::new().with_null("age"))?;
    assert_eq!(names(&nulls), vec!["user5"]);
    let others = engine.select(&ReadOperation::new("users").with_order("id", Order::Asc))?;
    for row in others.iter().filter(|r| r.get("id") != Some(&Value::Integer(5))) {
        assert!(!row.get("age").map_or(true, Value::is_null));
    }
    Ok(())
}

#[test]
fn test_update_where_null_matches_null_rows() -> Result<()> {
    let mut engine = create_test_db()?;
    engine.insert("users", &user("a", "a@example.com", None))?;
    engine.insert("users", &user("b", "b@example.com", Some(9)))?;

    let affected = engine.update(
        "users",
        &Conditions::new().with_value("age", 1),
        &Conditions::new().with_null("age"),
    )?;
    assert_eq!(affected, 1);
    let a = engine.find("users", &Conditions::new().with_value("name", "a"))?;
    assert_eq!(a.and_then(|r| r.get("age").cloned()), Some(Value::Integer(1)));
    Ok(())
}

#[test]
fn test_unfiltered_update_and_delete_are_opt_in() -> Result<()> {
    let mut engine = create_test_db()?;
    for name in ["a", "b", "c"] {
        engine.insert("users", &user(name, "x@example.com", Some(1)))?;
    }

    let err = engine.delete("users", &Conditions::new()).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation(_)));
    assert!(engine
        .update("users", &Conditions::new().with_value("age", 2), &Conditions::new())
        .is_err());
    assert_eq!(count(&mut engine, "users")?, 3);

    assert_eq!(engine.update_all("users", &Conditions::new().with_value("age", 2))?, 3);
    assert_eq!(engine.filter("users", &Conditions::new().with_value("age", 2))?.len(), 3);

    assert_eq!(engine.delete_all("users")?, 3);
    assert_eq!(count(&mut engine, "users")?, 0);
    Ok(())
}

#[test]
fn test_delete_with_null_filter() -> Result<()> {
    let mut engine = create_test_db()?;
    engine.insert("users", &user("a", "a@example.com", None))?;
    engine.insert("users", &user("b", "b@example.com", Some(3)))?;

    assert_eq!(engine.delete("users", &Conditions::new().with_null("age"))?, 1);
    assert_eq!(names(&engine.filter("users", &Conditions::new())?), vec!["b"]);
    Ok(())
}

#[test]
fn test_bulk_insert() -> Result<()> {
    let mut engine = create_test_db()?;
    let rows: Vec<Vec<Value>> = (0..4)
        .map(|i| {
            vec![
                Value::from(format!("bulk{}", i)),
                Value::from(format!("bulk{}@example.com", i)),
                Value::from(i as i64 * 10),
            ]
        })
        .collect();

    assert_eq!(engine.bulk_insert("users", &["name", "email", "age"], &rows)?, 4);

    let stored = engine.select(&ReadOperation::new("users").with_order("id", Order::Asc))?;
    assert_eq!(stored.len(), 4);
    for (i, row) in stored.iter().enumerate() {
        assert_eq!(row.get("name"), Some(&Value::Text(format!("bulk{}", i))));
        assert_eq!(row.get("email"), Some(&Value::Text(format!("bulk{}@example.com", i))));
        assert_eq!(row.get("age"), Some(&Value::Integer(i as i64 * 10)));
    }
    Ok(())
}

#[test]
fn test_bulk_insert_fails_as_a_whole() -> Result<()> {
    let mut engine = create_test_db()?;
    let rows = vec![
        vec![Value::from("ok"), Value::from(1)],
        vec![Value::Null, Value::from(2)],
    ];
    assert!(engine.bulk_insert("users", &["name", "age"], &rows).is_err());
    assert_eq!(count(&mut engine, "users")?, 0);
    Ok(())
}

#[test]
fn test_free_form_query() -> Result<()> {
    let mut engine = create_test_db()?;
    let outcome = engine.query(
        "INSERT INTO users (name, email, age) VALUES ('%s', '%s', %d)",
        &["Ann O'Neil".into(), "50% off".into(), 28.into()],
    )?;
    assert_eq!(outcome, Outcome::Affected(1));

    let outcome = engine.query(
        "SELECT name, email FROM users WHERE name = '%1$s' AND email LIKE '50%%'",
        &["Ann O'Neil".into()],
    )?;
    let rows = outcome.into_rows().expect("select yields rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("email"), Some(&Value::Text("50% off".into())));

    assert!(matches!(engine.query("", &[]), Err(Error::EmptyStatement)));
    Ok(())
}

#[test]
fn test_escape_is_dialect_specific() -> Result<()> {
    let engine = create_test_db()?;
    assert_eq!(engine.escape("O'Brien"), "O''Brien");
    assert_eq!(engine.escape("a\\b"), "a\\b");
    Ok(())
}
