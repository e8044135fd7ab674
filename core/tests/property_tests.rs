//! Property tests for validation and the status state machine.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use chrono::{DateTime, TimeZone, Utc};
use popupmoah_reservation_core::prelude::*;
use popupmoah_reservation_testing::{fixtures, properties, test_instant};
use proptest::prelude::*;

fn reservation_in(status: ReservationStatus) -> Reservation {
    Reservation {
        id: Some(ReservationId::new(1)),
        member_id: MemberId::new(7),
        popup_store_id: PopupStoreId::new(42),
        member_name: "Member 7".to_string(),
        member_email: "member7@example.com".to_string(),
        member_phone: None,
        reservation_date_time: fixtures::evening_slot(),
        number_of_people: 2,
        status,
        special_requests: None,
        notes: None,
        confirmed_at: None,
        cancelled_at: None,
        cancellation_reason: None,
        created_at: None,
        updated_at: None,
        version: 1,
    }
}

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn non_positive_party_size_is_rejected(size in properties::invalid_party_size()) {
        let mut candidate = fixtures::candidate(7, 42);
        candidate.number_of_people = Some(size);

        let err = candidate.validate(test_instant()).unwrap_err();
        let is_party_size_error =
            matches!(err, ReservationError::Validation { field: "number_of_people", .. });
        prop_assert!(is_party_size_error);
    }

    #[test]
    fn positive_party_size_is_accepted(size in properties::valid_party_size()) {
        let mut candidate = fixtures::candidate(7, 42);
        candidate.number_of_people = Some(size);

        prop_assert!(candidate.validate(test_instant()).is_ok());
    }

    #[test]
    fn slot_not_after_now_is_rejected(when in properties::past_or_present(test_instant())) {
        let candidate = fixtures::candidate_at(7, 42, when);

        let err = candidate.validate(test_instant()).unwrap_err();
        let is_slot_error =
            matches!(err, ReservationError::Validation { field: "reservation_date_time", .. });
        prop_assert!(is_slot_error);
    }

    #[test]
    fn slot_after_now_is_accepted(when in properties::future(test_instant())) {
        prop_assert!(fixtures::candidate_at(7, 42, when).validate(test_instant()).is_ok());
    }

    #[test]
    fn blank_email_is_rejected(email in properties::blank()) {
        let mut candidate = fixtures::candidate(7, 42);
        candidate.member_email = Some(email);

        let err = candidate.validate(test_instant()).unwrap_err();
        let is_email_error =
            matches!(err, ReservationError::Validation { field: "member_email", .. });
        prop_assert!(is_email_error);
    }

    #[test]
    fn transitions_follow_the_state_machine(status in properties::any_status()) {
        let mut confirming = reservation_in(status);
        prop_assert_eq!(confirming.confirm(at()).is_ok(), status == ReservationStatus::Pending);

        let mut completing = reservation_in(status);
        prop_assert_eq!(completing.complete().is_ok(), status == ReservationStatus::Confirmed);

        let mut cancelling = reservation_in(status);
        prop_assert_eq!(cancelling.cancel("reason", at()).is_ok(), !status.is_terminal());
    }

    #[test]
    fn rejected_transitions_leave_the_record_untouched(status in properties::any_status()) {
        let original = reservation_in(status);

        let mut confirming = original.clone();
        if confirming.confirm(at()).is_err() {
            prop_assert_eq!(&confirming, &original);
        }

        let mut cancelling = original.clone();
        if cancelling.cancel("reason", at()).is_err() {
            prop_assert_eq!(&cancelling, &original);
        }
    }
}
