use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{clients::ClientRepository, invoices::InvoiceRepository},
        value_objects::invoice_numbers::{InvoiceNumberAllocator, RandomInvoiceNumberAllocator},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{clients::ClientPostgres, invoices::InvoicePostgres},
    },
};

use crate::{
    axum_http::{error_responses::AppError, routers::checkout::PostgresCheckoutUseCase},
    usecases::{
        checkout::{self, CheckoutUseCase},
        invoices::{self, InvoiceUseCase},
        stripe_gateway::StripeGateway,
    },
};

/// Unauthenticated payer pages, mounted under `/pay`.
pub fn routes(db_pool: Arc<PgPoolSquad>, checkout_usecase: Arc<PostgresCheckoutUseCase>) -> Router {
    let invoice_usecase = InvoiceUseCase::new(
        Arc::new(InvoicePostgres::new(Arc::clone(&db_pool))),
        Arc::new(ClientPostgres::new(Arc::clone(&db_pool))),
        Arc::new(RandomInvoiceNumberAllocator),
    );

    invoice_router(Arc::new(invoice_usecase)).merge(pay_router(checkout_usecase))
}

pub fn invoice_router<I, C, N>(invoice_usecase: Arc<InvoiceUseCase<I, C, N>>) -> Router
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    Router::new()
        .route("/invoice/:invoice_id", get(get_public_invoice))
        .with_state(invoice_usecase)
}

pub fn pay_router<I, C, S>(checkout_usecase: Arc<CheckoutUseCase<I, C, S>>) -> Router
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/invoice/:invoice_id/pay", post(pay))
        .with_state(checkout_usecase)
}

pub async fn get_public_invoice<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    Path(invoice_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    let invoice_id = invoices::parse_invoice_id(&invoice_id)?;
    let invoice = invoice_usecase.get_public_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

pub async fn pay<I, C, S>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<I, C, S>>>,
    Path(invoice_id): Path<String>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    let invoice_id = checkout::parse_invoice_id(Some(&invoice_id))?;
    let session = checkout_usecase.create_checkout_session(invoice_id).await?;
    Ok(Json(session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use crates::domain::{
        repositories::{clients::MockClientRepository, invoices::MockInvoiceRepository},
        value_objects::invoice_numbers::MockInvoiceNumberAllocator,
    };
    use tower::ServiceExt;

    fn app(invoice_repo: MockInvoiceRepository) -> Router {
        invoice_router(Arc::new(InvoiceUseCase::new(
            Arc::new(invoice_repo),
            Arc::new(MockClientRepository::new()),
            Arc::new(MockInvoiceNumberAllocator::new()),
        )))
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn non_uuid_invoice_is_not_found_without_a_lookup() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo.expect_find_with_client().never();

        let (status, body) = fetch(app(invoice_repo), "/invoice/%20").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Invoice not found");

        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo.expect_find_with_client().never();
        let (status, _) = fetch(app(invoice_repo), "/invoice/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_invoice_is_not_found() {
        let mut invoice_repo = MockInvoiceRepository::new();
        invoice_repo
            .expect_find_with_client()
            .times(1)
            .returning(|_| Box::pin(async { Ok(None) }));

        let uri = format!("/invoice/{}", uuid::Uuid::new_v4());
        let (status, body) = fetch(app(invoice_repo), &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
    }
}
