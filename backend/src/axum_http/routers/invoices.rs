use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::{
        repositories::{clients::ClientRepository, invoices::InvoiceRepository},
        value_objects::{
            invoice_numbers::{InvoiceNumberAllocator, RandomInvoiceNumberAllocator},
            invoices::{EditInvoiceModel, InsertInvoiceModel},
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{clients::ClientPostgres, invoices::InvoicePostgres},
    },
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::invoices::InvoiceUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let invoice_repository = InvoicePostgres::new(Arc::clone(&db_pool));
    let client_repository = ClientPostgres::new(Arc::clone(&db_pool));
    let invoice_usecase = InvoiceUseCase::new(
        Arc::new(invoice_repository),
        Arc::new(client_repository),
        Arc::new(RandomInvoiceNumberAllocator),
    );

    router(Arc::new(invoice_usecase))
}

pub fn router<I, C, N>(invoice_usecase: Arc<InvoiceUseCase<I, C, N>>) -> Router
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats", get(stats))
        .route("/:invoice_id", get(get_by_id).put(update).delete(remove))
        .with_state(invoice_usecase)
}

pub async fn list<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    let invoices = invoice_usecase.list_invoices().await?;
    Ok(Json(invoices))
}

pub async fn stats<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    let stats = invoice_usecase.dashboard_stats().await?;
    Ok(Json(stats))
}

pub async fn get_by_id<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    _auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    let invoice = invoice_usecase.get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

pub async fn create<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    _auth: AuthUser,
    Json(insert_invoice_model): Json<InsertInvoiceModel>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    let invoice = invoice_usecase.create_invoice(insert_invoice_model).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn update<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(edit_invoice_model): Json<EditInvoiceModel>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    auth.require_admin()?;
    let invoice = invoice_usecase
        .update_invoice(invoice_id, edit_invoice_model)
        .await?;
    Ok(Json(invoice))
}

pub async fn remove<I, C, N>(
    State(invoice_usecase): State<Arc<InvoiceUseCase<I, C, N>>>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    auth.require_admin()?;
    invoice_usecase.delete_invoice(invoice_id).await?;
    Ok(Json(json!({ "message": "Invoice deleted successfully" })))
}
