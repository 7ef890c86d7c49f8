use thiserror::Error;

use crate::{
    domain::value_objects::payment_events::{
        CheckoutCompleted, CheckoutPaymentStatus, InvoiceCorrelation, PaymentCaptured,
        PaymentEvent,
    },
    payments::stripe_client::{StripeCheckoutSession, StripeEvent, StripePaymentIntent},
};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// A recognised event type whose `data.object` could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed {event_type} payload: {reason}")]
pub struct MalformedStripeEvent {
    pub event_type: String,
    pub reason: String,
}

impl TryFrom<&StripeEvent> for PaymentEvent {
    type Error = MalformedStripeEvent;

    fn try_from(event: &StripeEvent) -> Result<Self, Self::Error> {
        let malformed = |err: serde_json::Error| MalformedStripeEvent {
            event_type: event.type_.clone(),
            reason: err.to_string(),
        };

        match event.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => {
                let session: StripeCheckoutSession =
                    serde_json::from_value(event.data.object.clone()).map_err(malformed)?;

                let correlation = session
                    .metadata
                    .as_ref()
                    .and_then(InvoiceCorrelation::from_metadata)
                    .or_else(|| {
                        session
                            .client_reference_id
                            .as_deref()
                            .and_then(InvoiceCorrelation::parse)
                    });

                Ok(PaymentEvent::CheckoutCompleted(CheckoutCompleted {
                    event_id: event.id.clone(),
                    session_id: session.id,
                    correlation,
                    payment_status: CheckoutPaymentStatus::from_str(
                        session.payment_status.as_deref().unwrap_or_default(),
                    ),
                    payment_intent_id: session.payment_intent,
                }))
            }
            PAYMENT_INTENT_SUCCEEDED => {
                let intent: StripePaymentIntent =
                    serde_json::from_value(event.data.object.clone()).map_err(malformed)?;

                Ok(PaymentEvent::PaymentCaptured(PaymentCaptured {
                    event_id: event.id.clone(),
                    correlation: intent
                        .metadata
                        .as_ref()
                        .and_then(InvoiceCorrelation::from_metadata),
                    payment_intent_id: intent.id,
                }))
            }
            other => Ok(PaymentEvent::Unrecognized {
                event_type: other.to_string(),
            }),
        }
    }
}
