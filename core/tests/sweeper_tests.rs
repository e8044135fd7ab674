//! Expiration sweeper task.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use chrono::Duration;
use popupmoah_reservation_core::prelude::*;
use popupmoah_reservation_testing::{TestHarness, fixtures};
use tokio::sync::broadcast;

#[tokio::test]
async fn run_once_expires_overdue_reservations() {
    let harness = TestHarness::new();
    let id = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper = ExpirationSweeper::new(
        harness.service.clone(),
        std::time::Duration::from_secs(60),
        shutdown_rx,
    );

    assert!(sweeper.run_once().await.unwrap().cancelled.is_empty());

    harness.clock.set(fixtures::evening_slot() + Duration::seconds(1));
    let outcome = sweeper.run_once().await.unwrap();

    assert_eq!(outcome.cancelled.len(), 1);
    assert_eq!(
        harness.repository.stored(id).unwrap().status,
        ReservationStatus::Cancelled
    );
}

#[tokio::test]
async fn spawned_sweeper_runs_immediately_and_stops_on_shutdown() {
    let harness = TestHarness::new();
    let id = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    harness.clock.set(fixtures::evening_slot() + Duration::hours(1));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = ExpirationSweeper::new(
        harness.service.clone(),
        std::time::Duration::from_millis(10),
        shutdown_rx,
    )
    .spawn();

    // First tick fires right away.
    for _ in 0..50 {
        if harness.repository.stored(id).unwrap().is_cancelled() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(harness.repository.stored(id).unwrap().is_cancelled());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn failed_run_does_not_stop_the_sweeper() {
    let harness = TestHarness::new();
    harness.repository.set_unavailable(true);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = ExpirationSweeper::new(
        harness.service.clone(),
        std::time::Duration::from_millis(5),
        shutdown_rx,
    )
    .spawn();

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(!handle.is_finished());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}
