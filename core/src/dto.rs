//! Transport DTOs.
//!
//! Serde shapes a transport adapter exchanges with the application service.
//! Request types enforce the request-level limits (lengths, formats, maximum
//! party size) before anything reaches the aggregate; the aggregate still owns
//! the domain rules.

use crate::aggregate::ReservationCandidate;
use crate::error::{ReservationError, Result};
use crate::types::{MemberId, PopupStoreId, Reservation, ReservationId, ReservationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted member name, in characters.
pub const MAX_NAME_LEN: usize = 100;
/// Longest accepted email address, in characters.
pub const MAX_EMAIL_LEN: usize = 255;
/// Longest accepted phone number, in characters.
pub const MAX_PHONE_LEN: usize = 20;
/// Largest accepted party.
pub const MAX_PARTY_SIZE: i32 = 20;
/// Longest accepted special request, in characters.
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 500;
/// Longest accepted notes, in characters.
pub const MAX_NOTES_LEN: usize = 1000;
/// Longest accepted cancellation reason, in characters.
pub const MAX_CANCEL_REASON_LEN: usize = 500;

/// Body of a create call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCreateRequest {
    /// Booking member
    pub member_id: Option<MemberId>,
    /// Booked store
    pub popup_store_id: Option<PopupStoreId>,
    /// Contact name
    pub member_name: Option<String>,
    /// Contact email
    pub member_email: Option<String>,
    /// Contact phone
    pub member_phone: Option<String>,
    /// Requested slot
    pub reservation_date_time: Option<DateTime<Utc>>,
    /// Party size
    pub number_of_people: Option<i32>,
    /// Free-text requests
    pub special_requests: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

/// Body of an update call. Replaces every editable field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationUpdateRequest {
    /// Booking member
    pub member_id: Option<MemberId>,
    /// Booked store
    pub popup_store_id: Option<PopupStoreId>,
    /// Contact name
    pub member_name: Option<String>,
    /// Contact email
    pub member_email: Option<String>,
    /// Contact phone
    pub member_phone: Option<String>,
    /// Requested slot
    pub reservation_date_time: Option<DateTime<Utc>>,
    /// Party size
    pub number_of_people: Option<i32>,
    /// Free-text requests
    pub special_requests: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
}

impl ReservationCreateRequest {
    /// Check request limits and convert into an aggregate candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Validation`] naming the offending field.
    pub fn into_candidate(self) -> Result<ReservationCandidate> {
        let candidate = ReservationCandidate {
            member_id: self.member_id,
            popup_store_id: self.popup_store_id,
            member_name: self.member_name,
            member_email: self.member_email,
            member_phone: self.member_phone,
            reservation_date_time: self.reservation_date_time,
            number_of_people: self.number_of_people,
            special_requests: self.special_requests,
            notes: self.notes,
        };
        check_request_limits(&candidate)?;
        Ok(candidate)
    }
}

impl ReservationUpdateRequest {
    /// Check request limits and convert into an aggregate candidate.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Validation`] naming the offending field.
    pub fn into_candidate(self) -> Result<ReservationCandidate> {
        let candidate = ReservationCandidate {
            member_id: self.member_id,
            popup_store_id: self.popup_store_id,
            member_name: self.member_name,
            member_email: self.member_email,
            member_phone: self.member_phone,
            reservation_date_time: self.reservation_date_time,
            number_of_people: self.number_of_people,
            special_requests: self.special_requests,
            notes: self.notes,
        };
        check_request_limits(&candidate)?;
        Ok(candidate)
    }
}

fn check_request_limits(candidate: &ReservationCandidate) -> Result<()> {
    check_len("member_name", candidate.member_name.as_deref(), MAX_NAME_LEN)?;
    check_len("member_email", candidate.member_email.as_deref(), MAX_EMAIL_LEN)?;
    if let Some(email) = candidate.member_email.as_deref() {
        if !email.trim().is_empty() && !is_valid_email(email) {
            return Err(ReservationError::validation(
                "member_email",
                "is not a valid email address",
            ));
        }
    }

    check_len("member_phone", candidate.member_phone.as_deref(), MAX_PHONE_LEN)?;
    if let Some(phone) = candidate.member_phone.as_deref() {
        if !is_valid_phone(phone) {
            return Err(ReservationError::validation(
                "member_phone",
                "may only contain digits, spaces and - + ( )",
            ));
        }
    }

    if candidate
        .number_of_people
        .is_some_and(|people| people > MAX_PARTY_SIZE)
    {
        return Err(ReservationError::validation(
            "number_of_people",
            format!("must be at most {MAX_PARTY_SIZE}"),
        ));
    }

    check_len(
        "special_requests",
        candidate.special_requests.as_deref(),
        MAX_SPECIAL_REQUESTS_LEN,
    )?;
    check_len("notes", candidate.notes.as_deref(), MAX_NOTES_LEN)
}

fn check_len(field: &'static str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(text) if text.chars().count() > max => Err(ReservationError::validation(
            field,
            format!("must be at most {max} characters"),
        )),
        _ => Ok(()),
    }
}

/// Basic address check: one `@`, non-empty local part, dotted domain.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return false;
    }

    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '+' | '_'));
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-'));

    local_ok && domain_ok
}

/// Digits, whitespace and `- + ( )` only; at least one character.
#[must_use]
pub fn is_valid_phone(phone: &str) -> bool {
    !phone.is_empty()
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '+' | '(' | ')'))
}

/// Body of a cancel call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationCancelRequest {
    /// Why the reservation is cancelled
    pub reason: Option<String>,
}

impl ReservationCancelRequest {
    /// Creates a cancel request with a reason
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Validate and extract the reason.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Validation`] if the reason is blank or too long.
    pub fn into_reason(self) -> Result<String> {
        match self.reason {
            Some(reason) if !reason.trim().is_empty() => {
                check_len("reason", Some(&reason), MAX_CANCEL_REASON_LEN)?;
                Ok(reason)
            }
            _ => Err(ReservationError::validation("reason", "is required")),
        }
    }
}

/// Every attribute of a reservation, as returned to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationResponse {
    /// Reservation id
    pub id: Option<ReservationId>,
    /// Booking member
    pub member_id: MemberId,
    /// Booked store
    pub popup_store_id: PopupStoreId,
    /// Contact name
    pub member_name: String,
    /// Contact email
    pub member_email: String,
    /// Contact phone
    pub member_phone: Option<String>,
    /// Reserved slot
    pub reservation_date_time: DateTime<Utc>,
    /// Party size
    pub number_of_people: u32,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Free-text requests
    pub special_requests: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// When confirmed
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why cancelled
    pub cancellation_reason: Option<String>,
    /// When created
    pub created_at: Option<DateTime<Utc>>,
    /// When last updated
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            id: reservation.id,
            member_id: reservation.member_id,
            popup_store_id: reservation.popup_store_id,
            member_name: reservation.member_name,
            member_email: reservation.member_email,
            member_phone: reservation.member_phone,
            reservation_date_time: reservation.reservation_date_time,
            number_of_people: reservation.number_of_people,
            status: reservation.status,
            special_requests: reservation.special_requests,
            notes: reservation.notes,
            confirmed_at: reservation.confirmed_at,
            cancelled_at: reservation.cancelled_at,
            cancellation_reason: reservation.cancellation_reason,
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}

/// Error body a transport adapter would serialize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-equivalent status
    pub status: u16,
    /// Stable error code
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Offending field for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&ReservationError> for ErrorResponse {
    fn from(error: &ReservationError) -> Self {
        let field = match error {
            ReservationError::Validation { field, .. } => Some((*field).to_string()),
            _ => None,
        };
        // Storage details stay in the logs.
        let message = match error {
            ReservationError::Repository(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        Self {
            status: error.status_code(),
            code: error.code().to_string(),
            message,
            field,
        }
    }
}
