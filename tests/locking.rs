use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use lumen::lock::{with_lock, FsLock, Lock, WRITE_LOCK_NAME};
use lumen::{Document, Error, IndexBuilder, IndexConfig};

#[test]
fn lock_handles_exclude_each_other() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(WRITE_LOCK_NAME);
    let inside = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            let inside = inside.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                let lock = FsLock::new(path).with_poll_interval(Duration::from_millis(1));
                for _ in 0..25 {
                    with_lock(&lock, Duration::from_secs(30), || {
                        assert_eq!(0, inside.fetch_add(1, Ordering::SeqCst));
                        entered.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_micros(200));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(100, entered.load(Ordering::SeqCst));
    assert!(!path.exists());
}

#[test]
fn timeout_names_the_holder() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(WRITE_LOCK_NAME);
    let holder = FsLock::new(&path);
    assert!(holder.obtain().unwrap());
    let waiter = FsLock::new(&path).with_poll_interval(Duration::from_millis(5));
    match waiter.obtain_within(Duration::from_millis(20)) {
        Err(Error::LockTimeout(timeout)) => {
            assert_eq!(Some(std::process::id()), timeout.holder);
            assert!(timeout.attempts >= 2);
            assert!(timeout.to_string().contains("running"));
        }
        other => panic!("unexpected {:?}", other),
    }
    holder.release().unwrap();
    assert!(waiter.obtain().unwrap());
    waiter.release().unwrap();
}

#[test]
fn concurrent_writers_serialize_commits() {
    let dir = TempDir::new().unwrap();
    let config = IndexConfig {
        lock_poll_interval_ms: 2,
        write_lock_timeout_ms: 30_000,
        auto_commit: false,
        ..IndexConfig::default()
    };
    let index = IndexBuilder::with_config(config).create(dir.path()).unwrap();
    let handles: Vec<_> = (0..3)
        .map(|t| {
            let index = index.clone();
            thread::spawn(move || {
                let writer = index.writer();
                for i in 0..10 {
                    writer
                        .add_document(Document::new(format!("{}-{}", t, i)).text("text", "shared"))
                        .unwrap();
                    writer.commit().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let searcher = index.searcher().unwrap();
    assert_eq!(30, searcher.search_str("shared").unwrap().total());
    assert!(!dir.path().join(WRITE_LOCK_NAME).exists());
}
