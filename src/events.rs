use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Domain events emitted after a state change commits. Delivery is
/// best-effort; the booking/payment records remain the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingCreated(Uuid),
    BookingStatusChanged {
        booking_id: Uuid,
        old_status: String,
        new_status: String,
    },
    BookingRescheduled(Uuid),
    BookingCancelled {
        booking_id: Uuid,
        refund_amount: Option<Decimal>,
    },
    PaymentInitiated(Uuid),
    PaymentCaptured(Uuid),
    PaymentFailed(Uuid),
    PaymentRefunded {
        payment_id: Uuid,
        amount: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes the event channel for the lifetime of the process.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::BookingCreated(id) => info!(booking_id = %id, "booking created"),
            Event::BookingStatusChanged {
                booking_id,
                old_status,
                new_status,
            } => info!(
                booking_id = %booking_id,
                old_status,
                new_status,
                "booking status changed"
            ),
            Event::BookingRescheduled(id) => info!(booking_id = %id, "booking rescheduled"),
            Event::BookingCancelled {
                booking_id,
                refund_amount,
            } => info!(
                booking_id = %booking_id,
                refund_amount = ?refund_amount,
                "booking cancelled"
            ),
            Event::PaymentInitiated(id) => info!(payment_id = %id, "payment initiated"),
            Event::PaymentCaptured(id) => info!(payment_id = %id, "payment captured"),
            Event::PaymentFailed(id) => info!(payment_id = %id, "payment failed"),
            Event::PaymentRefunded { payment_id, amount } => {
                info!(payment_id = %payment_id, %amount, "payment refunded")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_round_trip_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::BookingCreated(id)).await.unwrap();

        match rx.recv().await {
            Some(Event::BookingCreated(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
