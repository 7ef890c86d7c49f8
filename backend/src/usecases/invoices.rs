use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use crates::domain::{
    entities::{
        clients::ClientEntity,
        invoices::{EditInvoiceEntity, InsertInvoiceEntity, InvoiceEntity},
    },
    repositories::{
        clients::ClientRepository,
        invoices::{InsertInvoiceOutcome, InvoiceRepository},
    },
    value_objects::{
        enums::invoice_statuses::InvoiceStatus,
        invoice_numbers::InvoiceNumberAllocator,
        invoices::{
            EditInvoiceModel, InsertInvoiceModel, InvoiceDto, InvoiceStatsDto, PublicInvoiceDto,
        },
        money::{DEFAULT_CURRENCY, normalize_currency},
    },
};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_NUMBER_ATTEMPTS: usize = 5;
const AMOUNT_SCALE: u32 = 2;
const AMOUNT_CEILING: i64 = 100_000_000;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("{0}")]
    Validation(String),
    #[error("Invoice not found")]
    InvoiceNotFound,
    #[error("Client not found")]
    ClientNotFound,
    #[error("Amount and currency of a paid invoice cannot change")]
    InvoiceAlreadyPaid,
    #[error("could not allocate a unique invoice number")]
    NumberAllocationExhausted,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl InvoiceError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            InvoiceError::Validation(_) | InvoiceError::InvoiceAlreadyPaid => {
                StatusCode::BAD_REQUEST
            }
            InvoiceError::InvoiceNotFound | InvoiceError::ClientNotFound => StatusCode::NOT_FOUND,
            InvoiceError::NumberAllocationExhausted | InvoiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type InvoiceResult<T> = std::result::Result<T, InvoiceError>;

/// Parses an invoice id taken from a path. Blank or non-UUID ids cannot name an invoice.
pub fn parse_invoice_id(raw: &str) -> InvoiceResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| InvoiceError::InvoiceNotFound)
}

pub struct InvoiceUseCase<I, C, N>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    invoice_repo: Arc<I>,
    client_repo: Arc<C>,
    number_allocator: Arc<N>,
}

impl<I, C, N> InvoiceUseCase<I, C, N>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    N: InvoiceNumberAllocator + 'static,
{
    pub fn new(invoice_repo: Arc<I>, client_repo: Arc<C>, number_allocator: Arc<N>) -> Self {
        Self {
            invoice_repo,
            client_repo,
            number_allocator,
        }
    }

    pub async fn create_invoice(&self, model: InsertInvoiceModel) -> InvoiceResult<InvoiceDto> {
        let (client_id, amount, issue_date, due_date, description) = match (
            model.client_id,
            model.amount,
            model.issue_date,
            model.due_date,
            model.description.filter(|value| !value.trim().is_empty()),
        ) {
            (Some(client_id), Some(amount), Some(issue_date), Some(due_date), Some(description)) => {
                (client_id, amount, issue_date, due_date, description)
            }
            _ => {
                return Err(InvoiceError::Validation(
                    "Client ID, amount, issue date, due date, and description are required"
                        .to_string(),
                ));
            }
        };

        validate_amount(amount)?;
        validate_dates(issue_date, due_date)?;
        let currency = validate_currency(model.currency.as_deref().unwrap_or(DEFAULT_CURRENCY))?;

        let client = self
            .client_repo
            .find_by_id(client_id)
            .await
            .map_err(|err| {
                error!(%client_id, db_error = ?err, "invoices: failed to load client");
                InvoiceError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(%client_id, "invoices: client not found for new invoice");
                InvoiceError::ClientNotFound
            })?;

        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let invoice_number = self.number_allocator.allocate();
            let insert = InsertInvoiceEntity {
                invoice_number: invoice_number.to_string(),
                client_id,
                amount,
                currency: currency.clone(),
                issue_date,
                due_date,
                description: description.clone(),
                status: InvoiceStatus::Pending.to_string(),
            };

            let outcome = self.invoice_repo.insert_invoice(insert).await.map_err(|err| {
                error!(%client_id, db_error = ?err, "invoices: failed to insert invoice");
                InvoiceError::Internal(err)
            })?;

            match outcome {
                InsertInvoiceOutcome::Inserted(invoice) => {
                    info!(
                        invoice_id = %invoice.id,
                        invoice_number = %invoice.invoice_number,
                        %client_id,
                        "invoices: invoice created"
                    );
                    return Ok(InvoiceDto::from_entity(invoice, Some(&client), today()));
                }
                InsertInvoiceOutcome::DuplicateNumber => {
                    warn!(
                        %invoice_number,
                        attempt,
                        "invoices: invoice number collision, retrying"
                    );
                }
            }
        }

        error!(
            attempts = MAX_NUMBER_ATTEMPTS,
            "invoices: gave up allocating an invoice number"
        );
        Err(InvoiceError::NumberAllocationExhausted)
    }

    pub async fn list_invoices(&self) -> InvoiceResult<Vec<InvoiceDto>> {
        let rows = self.invoice_repo.list_with_clients().await.map_err(|err| {
            error!(db_error = ?err, "invoices: failed to list invoices");
            InvoiceError::Internal(err)
        })?;

        let today = today();
        Ok(rows
            .into_iter()
            .map(|(invoice, client)| InvoiceDto::from_entity(invoice, Some(&client), today))
            .collect())
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> InvoiceResult<InvoiceDto> {
        let (invoice, client) = self.load_with_client(invoice_id).await?;
        Ok(InvoiceDto::from_entity(invoice, Some(&client), today()))
    }

    /// Payer-facing view of an invoice.
    pub async fn get_public_invoice(&self, invoice_id: Uuid) -> InvoiceResult<PublicInvoiceDto> {
        let (invoice, client) = self.load_with_client(invoice_id).await?;
        Ok(PublicInvoiceDto::from_entities(invoice, client, today()))
    }

    pub async fn update_invoice(
        &self,
        invoice_id: Uuid,
        model: EditInvoiceModel,
    ) -> InvoiceResult<InvoiceDto> {
        let current = self
            .invoice_repo
            .find_by_id(invoice_id)
            .await
            .map_err(|err| {
                error!(%invoice_id, db_error = ?err, "invoices: failed to load invoice");
                InvoiceError::Internal(err)
            })?
            .ok_or(InvoiceError::InvoiceNotFound)?;

        if let Some(amount) = model.amount {
            validate_amount(amount)?;
        }
        let currency = model
            .currency
            .as_deref()
            .map(validate_currency)
            .transpose()?;
        validate_dates(
            model.issue_date.unwrap_or(current.issue_date),
            model.due_date.unwrap_or(current.due_date),
        )?;
        if model
            .description
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(InvoiceError::Validation(
                "description must not be empty".to_string(),
            ));
        }

        let new_client = match model.client_id {
            Some(client_id) => Some(
                self.find_client(client_id)
                    .await?
                    .ok_or(InvoiceError::ClientNotFound)?,
            ),
            None => None,
        };

        let changes = EditInvoiceEntity {
            client_id: model.client_id,
            amount: model.amount,
            currency,
            issue_date: model.issue_date,
            due_date: model.due_date,
            description: model.description,
            updated_at: Some(Utc::now()),
        };

        let only_if_pending = changes.touches_money();
        if only_if_pending && current.is_paid() {
            warn!(%invoice_id, "invoices: rejected monetary change on paid invoice");
            return Err(InvoiceError::InvoiceAlreadyPaid);
        }

        let updated = self
            .invoice_repo
            .update_invoice(invoice_id, changes, only_if_pending)
            .await
            .map_err(|err| {
                error!(%invoice_id, db_error = ?err, "invoices: failed to update invoice");
                InvoiceError::Internal(err)
            })?;

        let Some(updated) = updated else {
            // The row was paid (or removed) between the read and the conditional write.
            let err = if only_if_pending {
                InvoiceError::InvoiceAlreadyPaid
            } else {
                InvoiceError::InvoiceNotFound
            };
            warn!(%invoice_id, error = %err, "invoices: update matched no row");
            return Err(err);
        };

        info!(%invoice_id, "invoices: invoice updated");
        let client = match new_client {
            Some(client) => Some(client),
            None => self.find_client(updated.client_id).await?,
        };
        Ok(InvoiceDto::from_entity(updated, client.as_ref(), today()))
    }

    pub async fn delete_invoice(&self, invoice_id: Uuid) -> InvoiceResult<()> {
        let deleted = self
            .invoice_repo
            .delete_invoice(invoice_id)
            .await
            .map_err(|err| {
                error!(%invoice_id, db_error = ?err, "invoices: failed to delete invoice");
                InvoiceError::Internal(err)
            })?;

        if !deleted {
            return Err(InvoiceError::InvoiceNotFound);
        }

        info!(%invoice_id, "invoices: invoice deleted");
        Ok(())
    }

    pub async fn dashboard_stats(&self) -> InvoiceResult<InvoiceStatsDto> {
        let stats = self.invoice_repo.stats(today()).await.map_err(|err| {
            error!(db_error = ?err, "invoices: failed to compute stats");
            InvoiceError::Internal(err)
        })?;
        Ok(stats.into())
    }

    async fn find_client(&self, client_id: Uuid) -> InvoiceResult<Option<ClientEntity>> {
        self.client_repo.find_by_id(client_id).await.map_err(|err| {
            error!(%client_id, db_error = ?err, "invoices: failed to load client");
            InvoiceError::Internal(err)
        })
    }

    async fn load_with_client(
        &self,
        invoice_id: Uuid,
    ) -> InvoiceResult<(InvoiceEntity, ClientEntity)> {
        self.invoice_repo
            .find_with_client(invoice_id)
            .await
            .map_err(|err| {
                error!(%invoice_id, db_error = ?err, "invoices: failed to load invoice");
                InvoiceError::Internal(err)
            })?
            .ok_or(InvoiceError::InvoiceNotFound)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `invoices.amount` is `NUMERIC(10, 2)`: at most two decimals, below 10^8.
fn validate_amount(amount: Decimal) -> InvoiceResult<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(InvoiceError::Validation(
            "amount must not be negative".to_string(),
        ));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(InvoiceError::Validation(format!(
            "amount must have at most {AMOUNT_SCALE} decimal places"
        )));
    }
    if amount >= Decimal::new(AMOUNT_CEILING, 0) {
        return Err(InvoiceError::Validation(format!(
            "amount must be less than {AMOUNT_CEILING}"
        )));
    }
    Ok(())
}

fn validate_currency(raw: &str) -> InvoiceResult<String> {
    normalize_currency(raw).map_err(|err| InvoiceError::Validation(err.to_string()))
}

fn validate_dates(issue_date: NaiveDate, due_date: NaiveDate) -> InvoiceResult<()> {
    if due_date < issue_date {
        return Err(InvoiceError::Validation(
            "due date must not be before issue date".to_string(),
        ));
    }
    Ok(())
}
