//! Notifier double.

use popupmoah_reservation_core::notifier::{NotificationType, NotifyError, ReservationNotifier};
use popupmoah_reservation_core::types::{Reservation, ReservationId};
use std::sync::{Arc, Mutex};

/// Records every notification it is asked to send.
///
/// A failing recorder still records the attempt before reporting an error.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(Option<ReservationId>, NotificationType)>>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Create a notifier that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier whose deliveries all fail
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Notifications attempted so far, oldest first
    #[must_use]
    pub fn sent(&self) -> Vec<(Option<ReservationId>, NotificationType)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Notification types attempted so far
    #[must_use]
    pub fn types(&self) -> Vec<NotificationType> {
        self.sent().into_iter().map(|(_, kind)| kind).collect()
    }
}

impl ReservationNotifier for RecordingNotifier {
    async fn send(
        &self,
        reservation: &Reservation,
        notification_type: NotificationType,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError("Mutex lock failed".to_string()))?
            .push((reservation.id, notification_type));

        if self.fail {
            return Err(NotifyError("smtp relay refused connection".to_string()));
        }
        Ok(())
    }
}
