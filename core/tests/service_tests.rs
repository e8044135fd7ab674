//! Application service: caching, eviction and notifications.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use chrono::Duration;
use popupmoah_reservation_core::prelude::*;
use popupmoah_reservation_testing::{
    FailingCache, RecordingNotifier, TestHarness, fixtures, init_tracing,
};

#[tokio::test]
async fn booking_lifecycle_reads_reflect_every_mutation() {
    init_tracing();
    let harness = TestHarness::new();
    let service = &harness.service;

    let created = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();
    let id = created.id.unwrap();
    assert_eq!(created.status, ReservationStatus::Pending);

    // Warm the cache, then mutate.
    service.get_reservation(id).await.unwrap();
    assert!(harness.cache.contains(&CacheKey::Reservation(id)));

    service.confirm_reservation(id).await.unwrap();
    assert!(!harness.cache.contains(&CacheKey::Reservation(id)));
    let read = service.get_reservation(id).await.unwrap().unwrap();
    assert_eq!(read.status, ReservationStatus::Confirmed);
    assert!(read.confirmed_at.is_some());

    service.cancel_reservation(id, "member request").await.unwrap();
    let read = service.get_reservation(id).await.unwrap().unwrap();
    assert_eq!(read.status, ReservationStatus::Cancelled);
    assert_eq!(read.cancellation_reason.as_deref(), Some("member request"));

    // Slot was released by the cancel.
    assert!(
        service
            .create_reservation(fixtures::create_request(8, 42))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn conflicting_create_is_reported_unchanged() {
    let harness = TestHarness::new();
    harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();

    let err = harness
        .service
        .create_reservation(fixtures::create_request(8, 42))
        .await
        .unwrap_err();

    assert!(matches!(err, ReservationError::SlotConflict { .. }));
    assert_eq!(ErrorResponse::from(&err).status, 409);
    assert_eq!(harness.repository.len(), 1);
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let harness = TestHarness::new();
    let id = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();

    harness.service.get_reservation(id).await.unwrap();
    // Poison the source of truth; a cached read must not notice.
    harness.repository.set_unavailable(true);
    let cached = harness.service.get_reservation(id).await.unwrap().unwrap();

    assert_eq!(cached.id, Some(id));
    assert_eq!(harness.cache.hits(), 1);
}

#[tokio::test]
async fn missing_reservation_is_not_cached() {
    let harness = TestHarness::new();
    let missing = ReservationId::new(404);

    assert_eq!(harness.service.get_reservation(missing).await.unwrap(), None);
    assert!(!harness.cache.contains(&CacheKey::Reservation(missing)));
}

#[tokio::test]
async fn list_reads_are_evicted_by_create() {
    let harness = TestHarness::new();
    let service = &harness.service;
    let member = MemberId::new(7);

    assert!(service.get_reservations_by_member(member).await.unwrap().is_empty());
    assert!(harness.cache.contains(&CacheKey::Member(member)));

    service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();

    assert!(!harness.cache.contains(&CacheKey::Member(member)));
    assert!(!harness.cache.contains(&CacheKey::PopupStore(PopupStoreId::new(42))));
    assert_eq!(service.get_reservations_by_member(member).await.unwrap().len(), 1);
}

#[tokio::test]
async fn member_listing_is_latest_slot_first() {
    let harness = TestHarness::new();
    let early = fixtures::evening_slot();
    let late = early + Duration::days(3);
    harness
        .service
        .create_reservation(fixtures::create_request_at(7, 42, early))
        .await
        .unwrap();
    harness
        .service
        .create_reservation(fixtures::create_request_at(7, 43, late))
        .await
        .unwrap();

    let listed = harness
        .service
        .get_reservations_by_member(MemberId::new(7))
        .await
        .unwrap();

    let times: Vec<_> = listed.iter().map(|r| r.reservation_date_time).collect();
    assert_eq!(times, vec![late, early]);
}

#[tokio::test]
async fn update_evicts_old_and_new_owners() {
    let harness = TestHarness::new();
    let service = &harness.service;
    let created = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();
    let id = created.id.unwrap();

    for key in [
        CacheKey::Member(MemberId::new(7)),
        CacheKey::Member(MemberId::new(8)),
        CacheKey::PopupStore(PopupStoreId::new(42)),
        CacheKey::PopupStore(PopupStoreId::new(43)),
    ] {
        harness.cache.seed(key, CachedValue::Reservations(Vec::new()));
    }

    let mut request = fixtures::update_request_from(&created);
    request.member_id = Some(MemberId::new(8));
    request.popup_store_id = Some(PopupStoreId::new(43));
    let updated = service.update_reservation(id, request).await.unwrap();

    assert_eq!(updated.member_id, MemberId::new(8));
    assert!(harness.cache.is_empty());
    assert!(service.is_reservation_available(PopupStoreId::new(42), created.reservation_date_time).await.unwrap());
}

#[tokio::test]
async fn update_validates_request_limits() {
    let harness = TestHarness::new();
    let created = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();

    let mut request = fixtures::update_request_from(&created);
    request.number_of_people = Some(21);
    let err = harness
        .service
        .update_reservation(created.id.unwrap(), request)
        .await
        .unwrap_err();

    assert!(matches!(err, ReservationError::Validation { field: "number_of_people", .. }));
}

#[tokio::test]
async fn delete_evicts_and_reports_missing() {
    let harness = TestHarness::new();
    let id = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    harness.service.get_reservation(id).await.unwrap();

    harness.service.delete_reservation(id).await.unwrap();

    assert!(!harness.cache.contains(&CacheKey::Reservation(id)));
    assert_eq!(harness.service.get_reservation(id).await.unwrap(), None);
    assert_eq!(
        harness.service.delete_reservation(id).await.unwrap_err(),
        ReservationError::NotFound(id)
    );
}

#[tokio::test]
async fn cancel_requires_a_reason() {
    let harness = TestHarness::new();
    let id = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();

    let err = harness.service.cancel_reservation(id, "  ").await.unwrap_err();

    assert!(matches!(err, ReservationError::Validation { field: "reason", .. }));
    assert_eq!(
        harness.repository.stored(id).unwrap().status,
        ReservationStatus::Pending
    );
}

#[tokio::test]
async fn filtered_listing() {
    let harness = TestHarness::new();
    let service = &harness.service;
    let first = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();
    service
        .create_reservation(fixtures::create_request_at(
            7,
            43,
            fixtures::evening_slot() + Duration::hours(2),
        ))
        .await
        .unwrap();
    service.confirm_reservation(first.id.unwrap()).await.unwrap();

    let all = service
        .get_reservations(Some(MemberId::new(7)), None, None)
        .await
        .unwrap();
    let confirmed = service
        .get_reservations(Some(MemberId::new(7)), None, Some(ReservationStatus::Confirmed))
        .await
        .unwrap();
    let store_pending = service
        .get_reservations(None, Some(PopupStoreId::new(43)), Some(ReservationStatus::Pending))
        .await
        .unwrap();

    assert_eq!(all.len(), 2);
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, first.id);
    assert_eq!(store_pending.len(), 1);

    let err = service.get_reservations(None, None, None).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn notifications_follow_successful_mutations() {
    let harness = TestHarness::new();
    let service = &harness.service;
    let id = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    service.confirm_reservation(id).await.unwrap();
    service.complete_reservation(id).await.unwrap();

    // Rejected transition sends nothing.
    assert!(service.confirm_reservation(id).await.is_err());

    assert_eq!(
        harness.notifier.types(),
        vec![
            NotificationType::Created,
            NotificationType::Confirmed,
            NotificationType::Completed,
        ]
    );
}

#[tokio::test]
async fn failing_notifier_never_fails_the_mutation() {
    let harness = TestHarness::with(
        popupmoah_reservation_testing::InMemoryReservationCache::new(),
        RecordingNotifier::failing(),
        AggregateOptions::default(),
    );

    let created = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap();

    assert_eq!(harness.notifier.sent().len(), 1);
    assert_eq!(harness.repository.len(), 1);
    assert_eq!(created.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn service_is_correct_with_a_failing_cache() {
    let harness = TestHarness::with(FailingCache, RecordingNotifier::new(), AggregateOptions::default());
    let service = &harness.service;

    let id = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    service.confirm_reservation(id).await.unwrap();

    let read = service.get_reservation(id).await.unwrap().unwrap();
    assert_eq!(read.status, ReservationStatus::Confirmed);
    assert_eq!(
        service
            .get_reservations_by_popup_store(PopupStoreId::new(42))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn service_is_correct_with_caching_disabled() {
    let harness = TestHarness::with(DisabledCache, RecordingNotifier::new(), AggregateOptions::default());
    let service = &harness.service;

    let id = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    service.cancel_reservation(id, "changed plans").await.unwrap();

    let read = service.get_reservation(id).await.unwrap().unwrap();
    assert_eq!(read.status, ReservationStatus::Cancelled);
}

#[tokio::test]
async fn repository_failure_is_fatal_for_the_request() {
    let harness = TestHarness::new();
    harness.repository.set_unavailable(true);

    let err = harness
        .service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap_err();

    assert!(matches!(err, ReservationError::Repository(_)));
    assert_eq!(ErrorResponse::from(&err).status, 500);
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn cleanup_expires_and_evicts() {
    let harness = TestHarness::new();
    let service = &harness.service;
    let id = service
        .create_reservation(fixtures::create_request(7, 42))
        .await
        .unwrap()
        .id
        .unwrap();
    service.get_reservation(id).await.unwrap();

    harness.clock.set(fixtures::evening_slot() + Duration::minutes(30));
    let outcome = service.cleanup_expired_reservations().await.unwrap();

    assert_eq!(outcome.cancelled.len(), 1);
    let read = service.get_reservation(id).await.unwrap().unwrap();
    assert_eq!(read.status, ReservationStatus::Cancelled);
    assert_eq!(read.cancellation_reason.as_deref(), Some(EXPIRED_REASON));
    assert_eq!(harness.notifier.types().last(), Some(&NotificationType::Expired));
}
