use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use crates::{
    domain::repositories::invoices::InvoiceRepository,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::invoices::InvoicePostgres,
    },
    payments::stripe_client::StripeClient,
};
use serde_json::json;

use crate::{
    axum_http::error_responses::AppError,
    usecases::{payment_webhook::PaymentWebhookUseCase, stripe_gateway::StripeGateway},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Provider callbacks, mounted under `/api/v1/stripe`. The body is taken as raw bytes
/// because the signature covers the exact payload.
pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let invoice_repository = InvoicePostgres::new(Arc::clone(&db_pool));
    let webhook_usecase = PaymentWebhookUseCase::new(Arc::new(invoice_repository), stripe_client);

    router(Arc::new(webhook_usecase))
}

pub fn router<I, S>(webhook_usecase: Arc<PaymentWebhookUseCase<I, S>>) -> Router
where
    I: InvoiceRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/webhook", post(stripe_webhook))
        .with_state(webhook_usecase)
}

pub async fn stripe_webhook<I, S>(
    State(webhook_usecase): State<Arc<PaymentWebhookUseCase<I, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    webhook_usecase
        .handle_stripe_webhook(&body, signature)
        .await?;

    Ok(Json(json!({ "received": true })))
}
