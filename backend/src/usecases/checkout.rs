use std::sync::Arc;

use crates::{
    domain::{
        entities::invoices::InvoiceEntity,
        repositories::{clients::ClientRepository, invoices::InvoiceRepository},
        value_objects::{
            invoices::CheckoutSessionDto, money::to_minor_units,
            payment_events::InvoiceCorrelation,
        },
    },
    payments::stripe_client::CheckoutSessionRequest,
};
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Invoice ID is required")]
    MissingInvoiceId,
    #[error("Invoice not found")]
    InvoiceNotFound,
    #[error("Invoice is already paid")]
    AlreadyPaid,
    #[error("invalid invoice amount: {0}")]
    InvalidAmount(String),
    #[error("{0}")]
    PaymentProvider(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::MissingInvoiceId
            | CheckoutError::AlreadyPaid
            | CheckoutError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            CheckoutError::InvoiceNotFound => StatusCode::NOT_FOUND,
            CheckoutError::PaymentProvider(_) | CheckoutError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type CheckoutResult<T> = std::result::Result<T, CheckoutError>;

/// Parses a caller-supplied invoice id. Blank is a missing id; anything that is not a
/// UUID cannot name an existing invoice.
pub fn parse_invoice_id(raw: Option<&str>) -> CheckoutResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(CheckoutError::MissingInvoiceId)?;
    Uuid::parse_str(raw).map_err(|_| CheckoutError::InvoiceNotFound)
}

pub struct CheckoutUseCase<I, C, S>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    invoice_repo: Arc<I>,
    client_repo: Arc<C>,
    stripe_client: Arc<S>,
    frontend_base_url: Url,
}

impl<I, C, S> CheckoutUseCase<I, C, S>
where
    I: InvoiceRepository + Send + Sync + 'static,
    C: ClientRepository + Send + Sync + 'static,
    S: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        invoice_repo: Arc<I>,
        client_repo: Arc<C>,
        stripe_client: Arc<S>,
        frontend_base_url: Url,
    ) -> Self {
        Self {
            invoice_repo,
            client_repo,
            stripe_client,
            frontend_base_url,
        }
    }

    /// Opens a hosted checkout session for a pending invoice. Never touches invoice status.
    pub async fn create_checkout_session(
        &self,
        invoice_id: Uuid,
    ) -> CheckoutResult<CheckoutSessionDto> {
        info!(%invoice_id, "checkout: create checkout session requested");

        let invoice = self
            .invoice_repo
            .find_by_id(invoice_id)
            .await
            .map_err(|err| {
                error!(%invoice_id, db_error = ?err, "checkout: failed to load invoice");
                CheckoutError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = CheckoutError::InvoiceNotFound;
                warn!(
                    %invoice_id,
                    status = err.status_code().as_u16(),
                    "checkout: invoice not found"
                );
                err
            })?;

        if invoice.is_paid() {
            let err = CheckoutError::AlreadyPaid;
            warn!(
                %invoice_id,
                invoice_number = %invoice.invoice_number,
                status = err.status_code().as_u16(),
                "checkout: invoice is already paid"
            );
            return Err(err);
        }

        let client_name = self
            .client_repo
            .find_by_id(invoice.client_id)
            .await
            .map_err(|err| {
                error!(
                    %invoice_id,
                    client_id = %invoice.client_id,
                    db_error = ?err,
                    "checkout: failed to load client"
                );
                CheckoutError::Internal(err)
            })?
            .map(|client| client.name);

        let request = self.build_request(&invoice, client_name)?;

        info!(
            %invoice_id,
            invoice_number = %invoice.invoice_number,
            currency = %request.currency,
            unit_amount = request.unit_amount,
            "checkout: creating stripe checkout session"
        );

        let session = self
            .stripe_client
            .create_checkout_session(&request)
            .await
            .map_err(|err| {
                error!(
                    %invoice_id,
                    error = %err,
                    "checkout: stripe checkout session creation failed"
                );
                CheckoutError::PaymentProvider(err.to_string())
            })?;

        info!(
            %invoice_id,
            session_id = %session.id,
            "checkout: checkout session created successfully"
        );

        Ok(CheckoutSessionDto {
            session_id: session.id,
            redirect_url: session.url,
        })
    }

    fn build_request(
        &self,
        invoice: &InvoiceEntity,
        client_name: Option<String>,
    ) -> CheckoutResult<CheckoutSessionRequest> {
        let unit_amount = to_minor_units(invoice.amount, &invoice.currency).map_err(|err| {
            let err = CheckoutError::InvalidAmount(err.to_string());
            warn!(
                invoice_id = %invoice.id,
                status = err.status_code().as_u16(),
                error = %err,
                "checkout: invoice amount cannot be charged"
            );
            err
        })?;

        let correlation = InvoiceCorrelation::new(invoice.id);

        Ok(CheckoutSessionRequest {
            currency: invoice.currency.to_ascii_lowercase(),
            unit_amount,
            product_name: format!("Invoice {}", invoice.invoice_number),
            product_description: match client_name {
                Some(name) => format!("Invoice for {}", name),
                None => invoice.description.clone(),
            },
            success_url: self.redirect_url(invoice.id, "success")?,
            cancel_url: self.redirect_url(invoice.id, "cancelled")?,
            client_reference_id: invoice.id.to_string(),
            metadata: correlation.to_metadata(),
        })
    }

    fn redirect_url(&self, invoice_id: Uuid, outcome: &str) -> CheckoutResult<String> {
        let mut url = self
            .frontend_base_url
            .join(&format!("pay/invoice/{}", invoice_id))
            .map_err(|err| CheckoutError::Internal(err.into()))?;
        url.query_pairs_mut().append_pair("payment", outcome);
        Ok(url.to_string())
    }
}
