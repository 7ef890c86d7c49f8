use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use crates::{
    domain::{
        repositories::{clients::ClientRepository, invoices::InvoiceRepository},
        value_objects::invoices::CreateCheckoutSessionRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{clients::ClientPostgres, invoices::InvoicePostgres},
    },
    payments::stripe_client::StripeClient,
};
use url::Url;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{
        checkout::{CheckoutUseCase, parse_invoice_id},
        stripe_gateway::StripeGateway,
    },
};

pub type PostgresCheckoutUseCase = CheckoutUseCase<InvoicePostgres, ClientPostgres, StripeClient>;

pub fn build_usecase(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    frontend_base_url: Url,
) -> Arc<PostgresCheckoutUseCase> {
    let invoice_repository = InvoicePostgres::new(Arc::clone(&db_pool));
    let client_repository = ClientPostgres::new(Arc::clone(&db_pool));

    Arc::new(CheckoutUseCase::new(
        Arc::new(invoice_repository),
        Arc::new(client_repository),
        stripe_client,
        frontend_base_url,
    ))
}

/// Staff-side session creation, mounted under `/api/v1/stripe`.
pub fn router<I, C, S>(checkout_usecase: Arc<CheckoutUseCase<I, C, S>>) -> Router
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/checkout-session", post(create_checkout_session))
        .with_state(checkout_usecase)
}

pub async fn create_checkout_session<I, C, S>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<I, C, S>>>,
    _auth: AuthUser,
    Json(request): Json<CreateCheckoutSessionRequest>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let invoice_id = parse_invoice_id(request.invoice_id.as_deref())?;
    let session = checkout_usecase.create_checkout_session(invoice_id).await?;
    Ok(Json(session))
}
