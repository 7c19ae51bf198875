//! Concurrency guard behaviour with real threads against one SQLite file.

mod common;

use axum::http::StatusCode;
use cafe_backend::catalog::{Category, CatalogStore, Product};
use cafe_backend::concurrency::{ConcurrencyGuard, GuardError, Mutation};
use common::TestApp;
use serde_json::json;
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

fn setup(lock_wait: Duration) -> (Arc<ConcurrencyGuard>, CatalogStore, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let store = CatalogStore::new(file.path(), lock_wait).unwrap();
    let guard = Arc::new(ConcurrencyGuard::new(file.path(), lock_wait));
    (guard, store, file)
}

#[test]
fn test_racing_optimistic_writers_exactly_one_wins() {
    let (guard, store, _file) = setup(Duration::from_secs(5));
    let coffee = store.add_category("Coffee").unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["Writer A", "Writer B"]
        .into_iter()
        .map(|name| {
            let guard = guard.clone();
            let barrier = barrier.clone();
            let mut edit = coffee.clone();
            thread::spawn(move || {
                edit.name = name.to_string();
                barrier.wait();
                guard.commit_versioned(&edit, 0).map(|c| c.name)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&String> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(GuardError::Conflict { expected: 0, actual: 1, .. }))));

    let stored = store.category(coffee.id).unwrap().unwrap();
    assert_eq!(&stored.name, winners[0]);
    assert_eq!(stored.version, 1);
}

#[test]
fn test_second_locker_waits_for_first() {
    let (guard, store, _file) = setup(Duration::from_secs(5));
    let coffee = store.add_category("Coffee").unwrap();
    let (acquired_tx, acquired_rx) = mpsc::channel();
    let hold = Duration::from_millis(300);

    let first = {
        let guard = guard.clone();
        thread::spawn(move || {
            let mut conn = guard.connect().unwrap();
            let mut locked = guard.find_for_update::<Category>(&mut conn, coffee.id).unwrap();
            acquired_tx.send(()).unwrap();
            thread::sleep(hold);
            locked.record_mut().name = "First".to_string();
            locked.commit().unwrap();
        })
    };

    acquired_rx.recv().unwrap();
    let started = Instant::now();
    let second: Category = guard
        .update_exclusive(coffee.id, |c: &mut Category| {
            // Sees the first holder's committed write, never a partial one.
            assert_eq!(c.name, "First");
            c.name = "First, then Second".to_string();
            Ok(())
        })
        .unwrap();
    let waited = started.elapsed();
    first.join().unwrap();

    assert!(waited >= hold - Duration::from_millis(50), "waited {:?}", waited);
    assert_eq!(second.name, "First, then Second");
    assert_eq!(second.version, 2);
}

#[test]
fn test_parallel_product_status_flips_serialise() {
    let (guard, store, _file) = setup(Duration::from_secs(10));
    let coffee = store.add_category("Coffee").unwrap();
    let latte = store.add_product("Latte", "", 180, coffee.id, true).unwrap();
    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));

    let handles: Vec<_> = (0..workers)
        .map(|i| {
            let guard = guard.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                guard
                    .update_exclusive(latte.id, |p: &mut Product| {
                        p.price += 10;
                        p.status = i % 2 == 0;
                        Ok(())
                    })
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stored = store.product(latte.id).unwrap().unwrap();
    assert_eq!(stored.price, 180 + 10 * workers as i64);
}

#[test]
fn test_apply_reports_not_found() {
    let (guard, _store, _file) = setup(Duration::from_secs(1));
    for mutation in [
        Mutation::Pessimistic,
        Mutation::Optimistic {
            expected_version: 0,
        },
    ] {
        let err = guard
            .apply::<Category, _>(77, mutation, |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, GuardError::NotFound { table: "category", id: 77 }));
    }
}

#[tokio::test]
async fn test_held_lock_surfaces_as_503() {
    let t = TestApp::with_settings(200, 100);
    let admin = t.admin_token().await;
    t.post("/category/add", Some(&admin), json!({ "name": "Coffee" }))
        .await;
    let coffee = t.state.catalog.categories(false).unwrap()[0].id;
    let latte = t
        .state
        .catalog
        .add_product("Latte", "", 180, coffee, true)
        .unwrap();

    let mut conn = t.state.guard.connect().unwrap();
    let held = t
        .state
        .guard
        .find_for_update::<Product>(&mut conn, latte.id)
        .unwrap();

    let (status, body) = t
        .post(
            "/product/updateStatus",
            Some(&admin),
            json!({ "id": latte.id, "status": false }),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Record is busy, please retry");

    held.release();
    let (status, _) = t
        .post(
            "/product/updateStatus",
            Some(&admin),
            json!({ "id": latte.id, "status": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
