use std::sync::Arc;

use anyhow::anyhow;
use crates::{
    domain::{
        repositories::invoices::InvoiceRepository,
        value_objects::payment_events::{CheckoutCompleted, PaymentCaptured, PaymentEvent},
    },
    payments::stripe_client::StripeEvent,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
    #[error(transparent)]
    Transient(#[from] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            WebhookError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type WebhookResult<T> = std::result::Result<T, WebhookError>;

/// What a verified event did to the ledger. Every variant except an error is acknowledged
/// to the provider with a 2xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    MarkedPaid { invoice_id: Uuid },
    AlreadyPaid { invoice_id: Uuid },
    PaymentNotSettled,
    Unmatched,
    Ignored,
}

pub struct PaymentWebhookUseCase<I, S>
where
    I: InvoiceRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    invoice_repo: Arc<I>,
    stripe_client: Arc<S>,
}

impl<I, S> PaymentWebhookUseCase<I, S>
where
    I: InvoiceRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    pub fn new(invoice_repo: Arc<I>, stripe_client: Arc<S>) -> Self {
        Self {
            invoice_repo,
            stripe_client,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> WebhookResult<ReconcileOutcome> {
        info!(
            payload_bytes = payload.len(),
            "payment_webhook: stripe webhook payload received"
        );

        let signature = signature.filter(|value| !value.trim().is_empty()).ok_or_else(|| {
            let err = WebhookError::InvalidSignature("missing Stripe-Signature header".into());
            warn!(
                status = err.status_code().as_u16(),
                "payment_webhook: stripe signature header missing"
            );
            err
        })?;

        self.stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                let reason = err.to_string();
                let err = WebhookError::InvalidSignature(reason);
                warn!(
                    error = %err,
                    status = err.status_code().as_u16(),
                    "payment_webhook: stripe webhook verification failed"
                );
                err
            })?;

        let stripe_event = match StripeEvent::from_payload(payload) {
            Ok(stripe_event) => stripe_event,
            Err(err) => {
                warn!(
                    error = %err,
                    "payment_webhook: acknowledging signed payload that is not a stripe event"
                );
                return Ok(ReconcileOutcome::Ignored);
            }
        };

        info!(
            event_id = ?stripe_event.id,
            event_type = %stripe_event.type_,
            "payment_webhook: stripe webhook verified"
        );

        let event = match PaymentEvent::try_from(&stripe_event) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    event_id = ?stripe_event.id,
                    error = %err,
                    "payment_webhook: acknowledging malformed event without changes"
                );
                return Ok(ReconcileOutcome::Ignored);
            }
        };

        self.reconcile(event).await
    }

    /// Applies one verified event. Safe to call any number of times with the same event.
    pub async fn reconcile(&self, event: PaymentEvent) -> WebhookResult<ReconcileOutcome> {
        match event {
            PaymentEvent::CheckoutCompleted(completed) => {
                self.handle_checkout_completed(completed).await
            }
            PaymentEvent::PaymentCaptured(captured) => self.handle_payment_captured(captured).await,
            PaymentEvent::Unrecognized { event_type } => {
                debug!(%event_type, "payment_webhook: unhandled stripe event type");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        completed: CheckoutCompleted,
    ) -> WebhookResult<ReconcileOutcome> {
        let Some(correlation) = completed.correlation else {
            warn!(
                event_id = ?completed.event_id,
                session_id = ?completed.session_id,
                "payment_webhook: checkout session carries no invoice id"
            );
            return Ok(ReconcileOutcome::Unmatched);
        };
        let invoice_id = correlation.invoice_id();

        if !completed.payment_status.is_settled() {
            info!(
                %invoice_id,
                payment_status = %completed.payment_status,
                "payment_webhook: checkout completed before payment settled"
            );
            return Ok(ReconcileOutcome::PaymentNotSettled);
        }

        self.settle(invoice_id, completed.payment_intent_id).await
    }

    async fn handle_payment_captured(
        &self,
        captured: PaymentCaptured,
    ) -> WebhookResult<ReconcileOutcome> {
        let payment_intent_id = captured.payment_intent_id;

        let by_token = self
            .invoice_repo
            .find_by_payment_intent_id(&payment_intent_id)
            .await
            .map_err(|err| {
                error!(
                    %payment_intent_id,
                    db_error = ?err,
                    "payment_webhook: failed to look up invoice by payment intent"
                );
                WebhookError::Transient(err)
            })?;

        let invoice_id = match (by_token, captured.correlation) {
            (Some(invoice), _) => invoice.id,
            (None, Some(correlation)) => correlation.invoice_id(),
            (None, None) => {
                info!(
                    %payment_intent_id,
                    "payment_webhook: payment intent matches no invoice"
                );
                return Ok(ReconcileOutcome::Unmatched);
            }
        };

        self.settle(invoice_id, Some(payment_intent_id)).await
    }

    async fn settle(
        &self,
        invoice_id: Uuid,
        payment_intent_id: Option<String>,
    ) -> WebhookResult<ReconcileOutcome> {
        let transitioned = self
            .invoice_repo
            .mark_paid_if_pending(invoice_id, payment_intent_id)
            .await
            .map_err(|err| {
                error!(
                    %invoice_id,
                    db_error = ?err,
                    "payment_webhook: failed to mark invoice paid"
                );
                WebhookError::Transient(err)
            })?;

        if transitioned {
            info!(%invoice_id, "payment_webhook: invoice marked paid");
            return Ok(ReconcileOutcome::MarkedPaid { invoice_id });
        }

        let current = self
            .invoice_repo
            .find_by_id(invoice_id)
            .await
            .map_err(|err| {
                error!(
                    %invoice_id,
                    db_error = ?err,
                    "payment_webhook: failed to reload invoice"
                );
                WebhookError::Transient(err)
            })?;

        match current {
            Some(invoice) if invoice.is_paid() => {
                info!(%invoice_id, "payment_webhook: invoice already paid");
                Ok(ReconcileOutcome::AlreadyPaid { invoice_id })
            }
            Some(_) => {
                error!(
                    %invoice_id,
                    "payment_webhook: invoice still pending after conditional update"
                );
                Err(WebhookError::Transient(anyhow!(
                    "invoice {invoice_id} could not be marked paid"
                )))
            }
            None => {
                warn!(%invoice_id, "payment_webhook: correlated invoice does not exist");
                Ok(ReconcileOutcome::Unmatched)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::stripe_gateway::MockStripeGateway;
    use chrono::{NaiveDate, Utc};
    use crates::{
        domain::{
            entities::invoices::InvoiceEntity,
            repositories::invoices::MockInvoiceRepository,
            value_objects::payment_events::{CheckoutPaymentStatus, InvoiceCorrelation},
        },
        payments::stripe_client::SignatureError,
    };
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample_invoice(id: Uuid, status: &str) -> InvoiceEntity {
        let now = Utc::now();
        InvoiceEntity {
            id,
            invoice_number: "INV-2024-000123".to_string(),
            client_id: Uuid::new_v4(),
            amount: dec!(150.00),
            currency: "USD".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            description: "Consulting".to_string(),
            status: status.to_string(),
            payment_intent_id: Some("pi_1".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn checkout_completed(invoice_id: Option<Uuid>, payment_status: &str) -> PaymentEvent {
        PaymentEvent::CheckoutCompleted(CheckoutCompleted {
            event_id: Some("evt_1".to_string()),
            session_id: Some("cs_1".to_string()),
            correlation: invoice_id.map(InvoiceCorrelation::new),
            payment_status: CheckoutPaymentStatus::from_str(payment_status),
            payment_intent_id: Some("pi_1".to_string()),
        })
    }

    fn usecase(
        invoice_repo: MockInvoiceRepository,
        stripe: MockStripeGateway,
    ) -> PaymentWebhookUseCase<MockInvoiceRepository, MockStripeGateway> {
        PaymentWebhookUseCase::new(Arc::new(invoice_repo), Arc::new(stripe))
    }

    #[tokio::test]
    async fn paid_checkout_marks_pending_invoice_paid() {
        let invoice_id = Uuid::new_v4();
        let mut invoice_repo = MockInvoiceRepository::new();

        invoice_repo
            .expect_mark_paid_if_pending()
            .with(eq(invoice_id), eq(Some("pi_1".to_string())))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(true) }));
        invoice_repo.expect_find_by_id().never();

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(checkout_completed(Some(invoice_id), "paid"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::MarkedPaid { invoice_id });
    }

    #[tokio::test]
    async fn redelivery_after_paid_is_a_no_op() {
        let invoice_id = Uuid::new_v4();
        let paid = sample_invoice(invoice_id, "paid");
        let mut invoice_repo = MockInvoiceRepository::new();

        invoice_repo
            .expect_mark_paid_if_pending()
            .returning(|_, _| Box::pin(async { Ok(false) }));
        invoice_repo
            .expect_find_by_id()
            .with(eq(invoice_id))
            .returning(move |_| {
                let paid = paid.clone();
                Box::pin(async move { Ok(Some(paid)) })
            });

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(checkout_completed(Some(invoice_id), "paid"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyPaid { invoice_id });
    }

    #[tokio::test]
    async fn unsettled_checkout_leaves_invoice_untouched() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo.expect_mark_paid_if_pending().never();

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(checkout_completed(Some(Uuid::new_v4()), "unpaid"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::PaymentNotSettled);
    }

    #[tokio::test]
    async fn checkout_without_invoice_id_is_unmatched() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo.expect_mark_paid_if_pending().never();

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(checkout_completed(None, "paid"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unmatched);
    }

    #[tokio::test]
    async fn payment_captured_matches_stored_intent_first() {
        let invoice_id = Uuid::new_v4();
        let stored = sample_invoice(invoice_id, "pending");
        let mut invoice_repo = MockInvoiceRepository::new();

        invoice_repo
            .expect_find_by_payment_intent_id()
            .withf(|intent| intent == "pi_1")
            .returning(move |_| {
                let stored = stored.clone();
                Box::pin(async move { Ok(Some(stored)) })
            });
        invoice_repo
            .expect_mark_paid_if_pending()
            .with(eq(invoice_id), eq(Some("pi_1".to_string())))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(true) }));

        let event = PaymentEvent::PaymentCaptured(PaymentCaptured {
            event_id: Some("evt_2".to_string()),
            payment_intent_id: "pi_1".to_string(),
            correlation: None,
        });

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(event)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::MarkedPaid { invoice_id });
    }

    #[tokio::test]
    async fn payment_captured_falls_back_to_intent_metadata() {
        let invoice_id = Uuid::new_v4();
        let mut invoice_repo = MockInvoiceRepository::new();

        invoice_repo
            .expect_find_by_payment_intent_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        invoice_repo
            .expect_mark_paid_if_pending()
            .with(eq(invoice_id), eq(Some("pi_9".to_string())))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(true) }));

        let event = PaymentEvent::PaymentCaptured(PaymentCaptured {
            event_id: None,
            payment_intent_id: "pi_9".to_string(),
            correlation: Some(InvoiceCorrelation::new(invoice_id)),
        });

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(event)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::MarkedPaid { invoice_id });
    }

    #[tokio::test]
    async fn uncorrelated_payment_captured_is_unmatched() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_by_payment_intent_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        invoice_repo.expect_mark_paid_if_pending().never();

        let event = PaymentEvent::PaymentCaptured(PaymentCaptured {
            event_id: None,
            payment_intent_id: "pi_unknown".to_string(),
            correlation: None,
        });

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(event)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unmatched);
    }

    #[tokio::test]
    async fn ledger_failure_is_transient() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_mark_paid_if_pending()
            .returning(|_, _| Box::pin(async { Err(anyhow!("connection refused")) }));

        let err = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(checkout_completed(Some(Uuid::new_v4()), "paid"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::Transient(_)));
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn bad_signature_never_reaches_the_ledger() {
        let mut invoice_repo = MockInvoiceRepository::new();
        let mut stripe = MockStripeGateway::new();

        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(SignatureError::Mismatch));
        invoice_repo.expect_mark_paid_if_pending().never();
        invoice_repo.expect_find_by_payment_intent_id().never();

        let err = usecase(invoice_repo, stripe)
            .handle_stripe_webhook(b"{}", Some("t=1,v1=deadbeef"))
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let err = usecase(MockInvoiceRepository::new(), stripe)
            .handle_stripe_webhook(b"{}", None)
            .await
            .unwrap_err();
        assert!(matches!(err, WebhookError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn malformed_event_is_acknowledged_and_ignored() {
        let mut invoice_repo = MockInvoiceRepository::new();
        let mut stripe = MockStripeGateway::new();

        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| Ok(()));
        invoice_repo.expect_mark_paid_if_pending().never();

        let payload = serde_json::to_vec(&json!({
            "id": "evt_bad",
            "type": "payment_intent.succeeded",
            "data": { "object": { "status": "succeeded" } }
        }))
        .unwrap();

        let outcome = usecase(invoice_repo, stripe)
            .handle_stripe_webhook(&payload, Some("t=1,v1=ok"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);
    }

    #[tokio::test]
    async fn signed_payload_that_is_not_an_event_is_acknowledged() {
        let mut invoice_repo = MockInvoiceRepository::new();
        let mut stripe = MockStripeGateway::new();

        stripe
            .expect_verify_webhook_signature()
            .withf(|payload, _| payload == br#"{"hello":"world"}"#)
            .times(1)
            .returning(|_, _| Ok(()));
        invoice_repo.expect_mark_paid_if_pending().never();
        invoice_repo.expect_find_by_payment_intent_id().never();

        let outcome = usecase(invoice_repo, stripe)
            .handle_stripe_webhook(br#"{"hello":"world"}"#, Some("t=1,v1=ok"))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);
    }

    #[tokio::test]
    async fn new_intent_on_paid_invoice_keeps_it_paid() {
        let invoice_id = Uuid::new_v4();
        let paid = sample_invoice(invoice_id, "paid");
        let mut invoice_repo = MockInvoiceRepository::new();

        invoice_repo
            .expect_find_by_payment_intent_id()
            .withf(|intent| intent == "pi_other")
            .returning(|_| Box::pin(async { Ok(None) }));
        invoice_repo
            .expect_mark_paid_if_pending()
            .with(eq(invoice_id), eq(Some("pi_other".to_string())))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(false) }));
        invoice_repo
            .expect_find_by_id()
            .with(eq(invoice_id))
            .returning(move |_| {
                let paid = paid.clone();
                Box::pin(async move { Ok(Some(paid)) })
            });

        let event = PaymentEvent::PaymentCaptured(PaymentCaptured {
            event_id: Some("evt_3".to_string()),
            payment_intent_id: "pi_other".to_string(),
            correlation: Some(InvoiceCorrelation::new(invoice_id)),
        });

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(event)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::AlreadyPaid { invoice_id });
    }

    #[tokio::test]
    async fn unrecognized_event_is_ignored() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo.expect_mark_paid_if_pending().never();

        let outcome = usecase(invoice_repo, MockStripeGateway::new())
            .reconcile(PaymentEvent::Unrecognized {
                event_type: "customer.created".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ignored);
    }
}
