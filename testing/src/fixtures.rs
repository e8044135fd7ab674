//! Test data.

use chrono::{DateTime, TimeZone, Utc};
use popupmoah_reservation_core::aggregate::ReservationCandidate;
use popupmoah_reservation_core::dto::{
    ReservationCreateRequest, ReservationResponse, ReservationUpdateRequest,
};
use popupmoah_reservation_core::types::{MemberId, PopupStoreId};

/// 2025-06-01 19:00 UTC, the slot used throughout the booking scenarios
#[must_use]
pub fn evening_slot() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 19, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Valid candidate for `member_id` at `popup_store_id`, party of two, at
/// [`evening_slot`]
#[must_use]
pub fn candidate(member_id: i64, popup_store_id: i64) -> ReservationCandidate {
    candidate_at(member_id, popup_store_id, evening_slot())
}

/// Valid candidate for an explicit slot
#[must_use]
pub fn candidate_at(
    member_id: i64,
    popup_store_id: i64,
    at: DateTime<Utc>,
) -> ReservationCandidate {
    ReservationCandidate {
        member_id: Some(MemberId::new(member_id)),
        popup_store_id: Some(PopupStoreId::new(popup_store_id)),
        member_name: Some(format!("Member {member_id}")),
        member_email: Some(format!("member{member_id}@example.com")),
        member_phone: Some("010-1234-5678".to_string()),
        reservation_date_time: Some(at),
        number_of_people: Some(2),
        special_requests: None,
        notes: None,
    }
}

/// Valid create request at [`evening_slot`]
#[must_use]
pub fn create_request(member_id: i64, popup_store_id: i64) -> ReservationCreateRequest {
    create_request_at(member_id, popup_store_id, evening_slot())
}

/// Valid create request for an explicit slot
#[must_use]
pub fn create_request_at(
    member_id: i64,
    popup_store_id: i64,
    at: DateTime<Utc>,
) -> ReservationCreateRequest {
    let c = candidate_at(member_id, popup_store_id, at);
    ReservationCreateRequest {
        member_id: c.member_id,
        popup_store_id: c.popup_store_id,
        member_name: c.member_name,
        member_email: c.member_email,
        member_phone: c.member_phone,
        reservation_date_time: c.reservation_date_time,
        number_of_people: c.number_of_people,
        special_requests: c.special_requests,
        notes: c.notes,
    }
}

/// Update request that keeps every field of `current`
#[must_use]
pub fn update_request_from(current: &ReservationResponse) -> ReservationUpdateRequest {
    ReservationUpdateRequest {
        member_id: Some(current.member_id),
        popup_store_id: Some(current.popup_store_id),
        member_name: Some(current.member_name.clone()),
        member_email: Some(current.member_email.clone()),
        member_phone: current.member_phone.clone(),
        reservation_date_time: Some(current.reservation_date_time),
        number_of_people: i32::try_from(current.number_of_people).ok(),
        special_requests: current.special_requests.clone(),
        notes: current.notes.clone(),
    }
}
