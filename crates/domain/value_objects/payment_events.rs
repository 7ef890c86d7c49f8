use std::{collections::HashMap, fmt::Display};

use uuid::Uuid;

/// Key of the checkout/payment-intent metadata entry that carries the invoice id.
pub const INVOICE_ID_METADATA_KEY: &str = "invoice_id";

/// Typed correlation key tying a provider event back to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvoiceCorrelation(Uuid);

impl InvoiceCorrelation {
    pub fn new(invoice_id: Uuid) -> Self {
        Self(invoice_id)
    }

    pub fn invoice_id(&self) -> Uuid {
        self.0
    }

    /// Returns `None` when the key is absent or is not a valid invoice id.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Option<Self> {
        metadata
            .get(INVOICE_ID_METADATA_KEY)
            .and_then(|raw| Self::parse(raw))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    pub fn to_metadata(&self) -> HashMap<String, String> {
        HashMap::from([(INVOICE_ID_METADATA_KEY.to_string(), self.0.to_string())])
    }
}

impl Display for InvoiceCorrelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment status reported on a completed checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    Other(String),
}

impl CheckoutPaymentStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "paid" => CheckoutPaymentStatus::Paid,
            "unpaid" => CheckoutPaymentStatus::Unpaid,
            "no_payment_required" => CheckoutPaymentStatus::NoPaymentRequired,
            other => CheckoutPaymentStatus::Other(other.to_string()),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, CheckoutPaymentStatus::Paid)
    }
}

impl Display for CheckoutPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckoutPaymentStatus::Paid => f.write_str("paid"),
            CheckoutPaymentStatus::Unpaid => f.write_str("unpaid"),
            CheckoutPaymentStatus::NoPaymentRequired => f.write_str("no_payment_required"),
            CheckoutPaymentStatus::Other(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub event_id: Option<String>,
    pub session_id: Option<String>,
    pub correlation: Option<InvoiceCorrelation>,
    pub payment_status: CheckoutPaymentStatus,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCaptured {
    pub event_id: Option<String>,
    pub payment_intent_id: String,
    pub correlation: Option<InvoiceCorrelation>,
}

/// Provider events the reconciler understands. Anything else is acknowledged and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted(CheckoutCompleted),
    PaymentCaptured(PaymentCaptured),
    Unrecognized { event_type: String },
}

impl PaymentEvent {
    pub fn kind(&self) -> &str {
        match self {
            PaymentEvent::CheckoutCompleted(_) => "checkout_completed",
            PaymentEvent::PaymentCaptured(_) => "payment_captured",
            PaymentEvent::Unrecognized { event_type } => event_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_round_trips_through_metadata() {
        let invoice_id = Uuid::new_v4();
        let correlation = InvoiceCorrelation::new(invoice_id);
        let metadata = correlation.to_metadata();
        assert_eq!(
            InvoiceCorrelation::from_metadata(&metadata).map(|c| c.invoice_id()),
            Some(invoice_id)
        );
    }

    #[test]
    fn garbage_metadata_yields_no_correlation() {
        let metadata = HashMap::from([(
            INVOICE_ID_METADATA_KEY.to_string(),
            "not-a-uuid".to_string(),
        )]);
        assert_eq!(InvoiceCorrelation::from_metadata(&metadata), None);
        assert_eq!(InvoiceCorrelation::from_metadata(&HashMap::new()), None);
    }

    #[test]
    fn only_paid_checkout_status_is_settled() {
        assert!(CheckoutPaymentStatus::from_str("paid").is_settled());
        assert!(!CheckoutPaymentStatus::from_str("unpaid").is_settled());
        assert!(!CheckoutPaymentStatus::from_str("no_payment_required").is_settled());
        assert_eq!(
            CheckoutPaymentStatus::from_str("processing"),
            CheckoutPaymentStatus::Other("processing".to_string())
        );
    }
}
