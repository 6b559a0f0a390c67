use std::fs;

use serde_json::json;
use sql_registry::prelude::*;

mod common;

#[test]
fn install_is_idempotent_and_keeps_the_id() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session = db.open()?;
    let installer = Installer::new(&session);

    let first = installer.install_schema()?;
    let second = installer.install_schema()?;
    assert_eq!(first, second);
    assert_eq!(common::count_rows(&session, "registry")?, 1);

    let parsed = uuid::Uuid::parse_str(&first)?;
    assert_eq!(parsed.get_version_num(), 4);
    assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
    assert_eq!(parsed.hyphenated().to_string(), first);

    drop(session);
    let reopened = db.open()?;
    assert_eq!(Registry::new(&reopened).installation_id()?, first);
    Ok(())
}

#[test]
fn separate_installs_get_separate_ids() -> Result<(), Box<dyn std::error::Error>> {
    let a = common::memory_session()?;
    let b = common::memory_session()?;
    assert_ne!(
        Installer::new(&a).install_schema()?,
        Installer::new(&b).install_schema()?
    );
    Ok(())
}

#[test]
fn scripts_report_success_and_failure() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session = db.installed()?;
    let installer = Installer::new(&session);

    let good = db.dir.path().join("001_settings.sql");
    fs::write(
        &good,
        "CREATE TABLE `settings` (`k` TEXT PRIMARY KEY, `v` TEXT);
         INSERT INTO `settings` VALUES ('theme', 'dark');",
    )?;
    let report = installer.run_script(&good, BatchMode::Transaction);
    assert!(report.ok, "{:?}", report.error);
    assert_eq!(report.script, good);
    assert_eq!(common::count_rows(&session, "settings")?, 1);

    let bad = db.dir.path().join("002_broken.sql");
    fs::write(
        &bad,
        "INSERT INTO `settings` VALUES ('lang', 'en');
         INSERT INTO `settings` VALUES ('theme', 'light');",
    )?;
    let report = installer.run_script(&bad, BatchMode::Transaction);
    assert!(!report.ok);
    assert!(report.error.as_deref().unwrap_or("").contains("UNIQUE"), "{report:?}");
    assert_eq!(common::count_rows(&session, "settings")?, 1);

    let missing = installer.run_script(db.dir.path().join("nope.sql"), BatchMode::Transaction);
    assert!(!missing.ok);
    assert!(missing.error.is_some());
    Ok(())
}

#[test]
fn installed_schema_backs_the_registry() -> Result<(), Box<dyn std::error::Error>> {
    let session = common::memory_session()?;
    Installer::new(&session).install_schema()?;
    let registry = Registry::new(&session);
    registry.set("k", json!([1]))?;

    // hash column enforces the digest width
    let err = session
        .execute_dml(
            "INSERT INTO `registry` (`hash`, `name`, `json`) VALUES (?, ?, ?)",
            &[Arg::from(vec![1u8, 2, 3]), Arg::from("short"), Arg::from("1")],
        )
        .unwrap_err();
    assert!(matches!(err, SqlRegistryError::ExecutionError { .. }), "{err}");
    Ok(())
}
