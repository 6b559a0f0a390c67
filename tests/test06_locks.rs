use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use sql_registry::prelude::*;

mod common;

#[test]
fn second_session_contends_until_release() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session_a = db.installed()?;
    let session_b = db.open()?;
    let a = Registry::new(&session_a);
    let b = Registry::new(&session_b);

    assert_eq!(a.lock("r", 0u32)?, LockAttempt::Acquired);
    assert_eq!(b.lock("r", 0u32)?, LockAttempt::NotAcquired);
    assert!(!b.is_free("r")?);
    // releasing someone else's lock is refused
    assert!(!b.unlock("r")?);

    assert!(a.unlock("r")?);
    assert!(b.is_free("r")?);
    assert_eq!(b.lock("r", 0u32)?, LockAttempt::Acquired);
    assert_eq!(a.lock("r", 0u32)?, LockAttempt::NotAcquired);
    Ok(())
}

#[test]
fn same_session_reenters_without_blocking() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session_a = db.installed()?;
    let session_b = db.open()?;
    let a = Registry::new(&session_a);
    let b = Registry::new(&session_b);

    let started = Instant::now();
    assert_eq!(a.lock("r", 5u32)?, LockAttempt::Acquired);
    assert_eq!(a.lock("r", 5u32)?, LockAttempt::Reentered);
    assert!(started.elapsed() < Duration::from_secs(2));

    // every hold needs its own release
    assert!(a.unlock("r")?);
    assert_eq!(b.lock("r", 0u32)?, LockAttempt::NotAcquired);
    assert!(a.unlock("r")?);
    assert!(!a.unlock("r")?);
    assert_eq!(b.lock("r", 0u32)?, LockAttempt::Acquired);
    Ok(())
}

#[test]
fn positive_timeout_blocks_then_gives_up() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session_a = db.installed()?;
    let session_b = db.open()?;
    let a = Registry::new(&session_a);
    let b = Registry::new(&session_b);

    assert!(a.lock("slow", 0u32)?.is_acquired());
    let started = Instant::now();
    assert_eq!(b.lock("slow", "+300ms")?, LockAttempt::NotAcquired);
    assert!(started.elapsed() >= Duration::from_millis(250), "{:?}", started.elapsed());
    Ok(())
}

#[test]
fn waiter_gets_the_lock_when_the_holder_goes_away() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    drop(db.installed()?);

    let (held_tx, held_rx) = mpsc::channel();
    let options = db.options.clone();
    let holder = thread::spawn(move || -> Result<(), SqlRegistryError> {
        let session = Session::open(&options)?;
        let registry = Registry::new(&session);
        let attempt = registry.lock("job", 0u32)?;
        let _ = held_tx.send(attempt);
        thread::sleep(Duration::from_millis(300));
        // no unlock: closing the connection frees the lock
        drop(registry);
        drop(session);
        Ok(())
    });

    assert_eq!(held_rx.recv()?, LockAttempt::Acquired);
    let session = db.open()?;
    let registry = Registry::new(&session);
    let attempt = registry.lock("job", Duration::from_secs(10))?;
    assert_eq!(attempt, LockAttempt::Acquired);
    holder.join().map_err(|_| "holder thread panicked")??;
    Ok(())
}

#[test]
fn installations_do_not_share_lock_names() -> Result<(), Box<dyn std::error::Error>> {
    let first_db = common::TestDb::new()?;
    let second_db = common::TestDb::new()?;
    let shared_locks = first_db.dir.path().join("locks");

    let first = first_db.installed()?;
    let second_options = SessionOptions::builder(second_db.options.database.clone())
        .lock_dir(&shared_locks)
        .finish();
    let second = Session::open(&second_options)?;
    Installer::new(&second).install_schema()?;

    let a = Registry::new(&first);
    let b = Registry::new(&second);
    assert_ne!(a.installation_id()?, b.installation_id()?);
    assert_eq!(a.lock("cron", 0u32)?, LockAttempt::Acquired);
    assert_eq!(b.lock("cron", 0u32)?, LockAttempt::Acquired);
    Ok(())
}

#[test]
fn release_all_drops_every_hold() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session_a = db.installed()?;
    let session_b = db.open()?;
    let a = Registry::new(&session_a);
    let b = Registry::new(&session_b);

    a.lock("one", 0u32)?;
    a.lock("one", 0u32)?;
    a.lock("two", 0u32)?;
    assert_eq!(a.release_all()?, 3);
    assert_eq!(b.lock("one", 0u32)?, LockAttempt::Acquired);
    assert_eq!(b.lock("two", 0u32)?, LockAttempt::Acquired);
    Ok(())
}

#[test]
fn bad_timeouts_fail_before_touching_the_lock() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session = db.installed()?;
    let registry = Registry::new(&session);
    assert!(matches!(
        registry.lock("r", "whenever"),
        Err(SqlRegistryError::ArgumentError(_))
    ));
    assert!(matches!(
        registry.lock("r", -1.0),
        Err(SqlRegistryError::ArgumentError(_))
    ));
    assert!(registry.is_free("r")?);
    Ok(())
}

#[test]
fn locks_need_an_installation() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session = db.open()?;
    session.execute_batch(sql_registry::installer::REGISTRY_SCHEMA, BatchMode::Transaction)?;
    let registry = Registry::new(&session);
    assert!(matches!(
        registry.lock("r", 0u32),
        Err(SqlRegistryError::ValidationError(_))
    ));
    Ok(())
}

#[test]
fn registries_on_one_session_share_holds() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session_a = db.installed()?;
    let session_b = db.open()?;
    let first = Registry::new(&session_a);
    let second = Registry::new(&session_a);
    let other = Registry::new(&session_b);

    assert_eq!(first.lock("r", 0u32)?, LockAttempt::Acquired);
    assert_eq!(second.lock("r", 0u32)?, LockAttempt::Reentered);

    assert!(first.unlock("r")?);
    assert_eq!(other.lock("r", 0u32)?, LockAttempt::NotAcquired);
    assert!(second.unlock("r")?);
    assert_eq!(other.lock("r", 0u32)?, LockAttempt::Acquired);
    Ok(())
}

#[test]
fn polling_is_free_does_not_block_acquirers() -> Result<(), Box<dyn std::error::Error>> {
    let db = common::TestDb::new()?;
    let session = db.installed()?;
    let registry = Registry::new(&session);

    let options = db.options.clone();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let poller = thread::spawn(move || -> Result<(), SqlRegistryError> {
        let session = Session::open(&options)?;
        let registry = Registry::new(&session);
        while stop_rx.try_recv().is_err() {
            registry.is_free("busy")?;
        }
        Ok(())
    });

    for _ in 0..50 {
        assert_eq!(registry.lock("busy", 0u32)?, LockAttempt::Acquired);
        assert!(registry.unlock("busy")?);
    }
    let _ = stop_tx.send(());
    poller.join().map_err(|_| "poller thread panicked")??;
    Ok(())
}
