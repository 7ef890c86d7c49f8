use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    checkout::CheckoutError, invoices::InvoiceError, payment_webhook::WebhookError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The payment provider refused the request. Its message is safe to show the payer.
    #[error("{0}")]
    PaymentProvider(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PaymentProvider(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Internal(err) => {
                // Don't leak internal error detail to client
                error!(error = ?err, "http: internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

/// Rejections produced by the `AuthUser` extractor and `require_admin`.
impl From<(StatusCode, String)> for AppError {
    fn from((status, message): (StatusCode, String)) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
            StatusCode::FORBIDDEN => AppError::Forbidden(message),
            StatusCode::BAD_REQUEST => AppError::BadRequest(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            _ => AppError::Internal(anyhow::anyhow!(message)),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::MissingInvoiceId
            | CheckoutError::AlreadyPaid
            | CheckoutError::InvalidAmount(_) => AppError::BadRequest(err.to_string()),
            CheckoutError::InvoiceNotFound => AppError::NotFound(err.to_string()),
            CheckoutError::PaymentProvider(message) => AppError::PaymentProvider(message),
            CheckoutError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<InvoiceError> for AppError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::Validation(_) | InvoiceError::InvoiceAlreadyPaid => {
                AppError::BadRequest(err.to_string())
            }
            InvoiceError::InvoiceNotFound | InvoiceError::ClientNotFound => {
                AppError::NotFound(err.to_string())
            }
            InvoiceError::NumberAllocationExhausted => {
                AppError::Internal(anyhow::anyhow!(err.to_string()))
            }
            InvoiceError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidSignature(_) => AppError::BadRequest(err.to_string()),
            WebhookError::Transient(err) => AppError::Internal(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_case_errors_keep_their_status() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (CheckoutError::MissingInvoiceId.into(), StatusCode::BAD_REQUEST),
            (CheckoutError::AlreadyPaid.into(), StatusCode::BAD_REQUEST),
            (CheckoutError::InvoiceNotFound.into(), StatusCode::NOT_FOUND),
            (
                CheckoutError::PaymentProvider("card declined".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                InvoiceError::InvoiceAlreadyPaid.into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                InvoiceError::NumberAllocationExhausted.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                WebhookError::InvalidSignature("mismatch".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                (StatusCode::FORBIDDEN, "Admin role required".to_string()).into(),
                StatusCode::FORBIDDEN,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err:?}");
        }
    }

    #[test]
    fn provider_message_is_shown_but_internal_detail_is_not() {
        assert_eq!(
            AppError::from(CheckoutError::PaymentProvider("card declined".into())).to_string(),
            "card declined"
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("password=hunter2")).to_string(),
            "Internal server error"
        );
    }
}
