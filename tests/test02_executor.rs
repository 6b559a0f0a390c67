use sql_registry::prelude::*;

mod common;

fn items_table() -> Result<Session, Box<dyn std::error::Error>> {
    let session = common::memory_session()?;
    session.execute_batch(
        "CREATE TABLE `items` (
            `id` INTEGER PRIMARY KEY AUTOINCREMENT,
            `sku` TEXT NOT NULL UNIQUE,
            `qty` INTEGER NOT NULL DEFAULT 0
        )",
        BatchMode::Transaction,
    )?;
    Ok(session)
}

#[test]
fn inserts_report_ids_and_updates_report_rows() -> Result<(), Box<dyn std::error::Error>> {
    let session = items_table()?;

    let first = session.execute_dml("INSERT INTO `items` (`sku`, `qty`) VALUES (?, ?)", &[Arg::from("a"), Arg::from(1)])?;
    let second = session.execute_dml("INSERT INTO `items` (`sku`, `qty`) VALUES (?, ?)", &[Arg::from("b"), Arg::from(1)])?;
    let third = session.execute_dml("INSERT INTO `items` (`sku`, `qty`) VALUES (?, ?)", &[Arg::from("c"), Arg::from(5)])?;
    assert_eq!((first, second, third), (1, 2, 3));
    assert_eq!(session.last_insert_id(), 3);

    // the sticky insert id must not leak into later counts
    let updated = session.execute_dml("UPDATE `items` SET `qty` = `qty` + 1 WHERE `qty` = ?", &[Arg::from(1)])?;
    assert_eq!(updated, 2);
    let none = session.execute_dml("UPDATE `items` SET `qty` = 0 WHERE `sku` = ?", &[Arg::from("missing")])?;
    assert_eq!(none, 0);
    let deleted = session.execute_dml("DELETE FROM `items` WHERE `sku` IN ('??')", &[Arg::list(["a", "c"])])?;
    assert_eq!(deleted, 2);
    Ok(())
}

#[test]
fn upserts_report_new_id_changed_rows_or_zero() -> Result<(), Box<dyn std::error::Error>> {
    let session = items_table()?;
    let upsert = "INSERT INTO `items` (`sku`, `qty`) VALUES (?, ?) \
                  ON CONFLICT(`sku`) DO UPDATE SET `qty` = excluded.`qty`";
    let noop = "INSERT INTO `items` (`sku`, `qty`) VALUES (?, ?) ON CONFLICT(`sku`) DO NOTHING";

    assert_eq!(session.execute_dml(upsert, &[Arg::from("a"), Arg::from(1)])?, 1);
    assert_eq!(session.execute_dml(upsert, &[Arg::from("b"), Arg::from(1)])?, 2);
    // existing row updated: affected rows, not the row id
    assert_eq!(session.execute_dml(upsert, &[Arg::from("b"), Arg::from(9)])?, 1);
    assert_eq!(session.execute_dml(noop, &[Arg::from("a"), Arg::from(7)])?, 0);
    Ok(())
}

#[test]
fn row_producing_statements_yield_cursors() -> Result<(), Box<dyn std::error::Error>> {
    let session = items_table()?;
    session.execute_dml("INSERT INTO `items` (`sku`) VALUES (?)", &[Arg::from("a")])?;

    match session.execute("SELECT `id`, `sku`, `qty` FROM `items`", &[])? {
        ExecutionOutcome::Rows(cursor) => {
            assert_eq!(cursor.row_count(), 1);
            assert_eq!(cursor.column_count(), 3);
            assert_eq!(cursor.last_insert_id(), 1);
        }
        ExecutionOutcome::Count(count) => panic!("expected rows, got count {count}"),
    }

    // RETURNING turns a mutation into a row-set
    let mut cursor = session.query(
        "INSERT INTO `items` (`sku`, `qty`) VALUES (?, ?) RETURNING `id`, `qty`",
        &[Arg::from("b"), Arg::from(4)],
    )?;
    assert_eq!(cursor.get("id")?, &SqlValue::Int(2));
    assert_eq!(cursor.get("qty")?, &SqlValue::Int(4));
    assert!(cursor.fetch_all().len() == 1);

    let err = session.execute_dml("SELECT 1", &[]).unwrap_err();
    assert!(matches!(err, SqlRegistryError::OperationNotSupported(_)), "{err}");
    let err = session
        .query("UPDATE `items` SET `qty` = 1", &[])
        .unwrap_err();
    assert!(matches!(err, SqlRegistryError::OperationNotSupported(_)), "{err}");
    Ok(())
}

#[test]
fn typed_inputs_are_coerced_before_binding() -> Result<(), Box<dyn std::error::Error>> {
    let session = common::memory_session()?;
    session.execute_batch(
        "CREATE TABLE `v` (`b` INTEGER, `f` REAL, `n` TEXT, `d` TEXT, `e` TEXT, `raw` BLOB)",
        BatchMode::Transaction,
    )?;

    enum Level {
        Warn,
    }
    impl SqlEnum for Level {
        fn variant_name(&self) -> &str {
            match self {
                Level::Warn => "Warn",
            }
        }
    }

    let when = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .ok_or("bad date")?;
    session.execute_dml(
        "INSERT INTO `v` (`??`) VALUES ('??')",
        &[
            Arg::list(["b", "f", "n", "d", "e", "raw"]),
            Arg::List(vec![
                Param::from(true),
                Param::from(0.5),
                Param::from(None::<&str>),
                Param::from(when),
                Param::from_enum(&Level::Warn),
                Param::from(vec![0xde_u8, 0xad]),
            ]),
        ],
    )?;

    let row = session
        .query_row("SELECT * FROM `v`", &[])?
        .ok_or("no row")?;
    assert_eq!(row.get("b"), Some(&SqlValue::Int(1)));
    assert_eq!(row.get("f"), Some(&SqlValue::Float(0.5)));
    assert_eq!(row.get("n"), Some(&SqlValue::Null));
    assert_eq!(row.get("d"), Some(&SqlValue::Text("2024-01-02 03:04:05".into())));
    assert_eq!(row.get("e"), Some(&SqlValue::Text("Warn".into())));
    assert_eq!(row.get("raw"), Some(&SqlValue::Blob(vec![0xde, 0xad])));
    Ok(())
}

#[test]
fn prepare_failures_carry_the_sql() -> Result<(), Box<dyn std::error::Error>> {
    let session = common::memory_session()?;
    let err = session.execute("SELEC `nothing` FROM nowhere", &[]).unwrap_err();
    match err {
        SqlRegistryError::PrepareError { sql, .. } => assert!(sql.contains("SELEC")),
        other => panic!("expected PrepareError, got {other}"),
    }

    let err = session.execute("SELECT * FROM `missing_table`", &[]).unwrap_err();
    assert!(matches!(err, SqlRegistryError::PrepareError { .. }), "{err}");
    Ok(())
}

#[test]
fn constraint_violations_are_execution_errors() -> Result<(), Box<dyn std::error::Error>> {
    let session = items_table()?;
    session.execute_dml("INSERT INTO `items` (`sku`) VALUES (?)", &[Arg::from("dup")])?;
    let err = session
        .execute_dml("INSERT INTO `items` (`sku`) VALUES (?)", &[Arg::from("dup")])
        .unwrap_err();
    match err {
        SqlRegistryError::ExecutionError { sql, source } => {
            assert!(sql.starts_with("INSERT INTO `items`"));
            assert!(source.to_string().contains("UNIQUE"), "{source}");
        }
        other => panic!("expected ExecutionError, got {other}"),
    }

    // the session stays usable after a failed statement
    assert_eq!(common::count_rows(&session, "items")?, 1);
    Ok(())
}

#[test]
fn long_sql_is_truncated_in_errors() -> Result<(), Box<dyn std::error::Error>> {
    let session = common::memory_session()?;
    let long = format!("SELECT {} FROM nowhere", "1 + ".repeat(200) + "1");
    let err = session.execute(&long, &[]).unwrap_err();
    match err {
        SqlRegistryError::PrepareError { sql, .. } => {
            assert!(sql.chars().count() <= 257, "{}", sql.len());
            assert!(sql.ends_with('…'));
        }
        other => panic!("expected PrepareError, got {other}"),
    }
    Ok(())
}
