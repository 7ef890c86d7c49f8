use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{
        clients::ClientEntity,
        invoices::{InvoiceEntity, InvoiceStatsEntity},
    },
    value_objects::enums::invoice_statuses::InvoiceStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company_name: Option<String>,
}

impl From<&ClientEntity> for ClientSummaryDto {
    fn from(value: &ClientEntity) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            email: value.email.clone(),
            company_name: value.company_name.clone(),
        }
    }
}

/// Staff view of an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvoiceDto {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub description: String,
    pub status: InvoiceStatus,
    pub payment_intent_id: Option<String>,
    pub client: Option<ClientSummaryDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceDto {
    pub fn from_entity(
        invoice: InvoiceEntity,
        client: Option<&ClientEntity>,
        today: NaiveDate,
    ) -> Self {
        let status = invoice.effective_status(today);
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            client_id: invoice.client_id,
            amount: invoice.amount,
            currency: invoice.currency,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            description: invoice.description,
            status,
            payment_intent_id: invoice.payment_intent_id,
            client: client.map(ClientSummaryDto::from),
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicClientDto {
    pub name: String,
    pub email: String,
    pub company_name: Option<String>,
}

/// What an unauthenticated payer may see. Carries neither the client id nor the payment token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicInvoiceDto {
    pub id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub description: String,
    pub status: InvoiceStatus,
    pub client: PublicClientDto,
}

impl PublicInvoiceDto {
    pub fn from_entities(invoice: InvoiceEntity, client: ClientEntity, today: NaiveDate) -> Self {
        let status = invoice.effective_status(today);
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number,
            amount: invoice.amount,
            currency: invoice.currency,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            description: invoice.description,
            status,
            client: PublicClientDto {
                name: client.name,
                email: client.email,
                company_name: client.company_name,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertInvoiceModel {
    pub client_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// Partial update. Unknown fields such as `status` are rejected at deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditInvoiceModel {
    pub client_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InvoiceStatsDto {
    pub total_invoices: i64,
    pub paid_invoices: i64,
    pub pending_invoices: i64,
    pub overdue_invoices: i64,
    pub total_paid_amount: Decimal,
}

impl From<InvoiceStatsEntity> for InvoiceStatsDto {
    fn from(value: InvoiceStatsEntity) -> Self {
        Self {
            total_invoices: value.total,
            paid_invoices: value.paid,
            pending_invoices: value.pending,
            overdue_invoices: value.overdue,
            total_paid_amount: value.total_paid_amount,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub redirect_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixtures() -> (InvoiceEntity, ClientEntity) {
        let now = Utc::now();
        let client = ClientEntity {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            email: "billing@acme.test".to_string(),
            phone: "555-0100".to_string(),
            address: "1 Main St".to_string(),
            company_name: None,
            created_at: now,
            updated_at: now,
        };
        let invoice = InvoiceEntity {
            id: Uuid::new_v4(),
            invoice_number: "INV-2024-000123".to_string(),
            client_id: client.id,
            amount: dec!(150.00),
            currency: "USD".to_string(),
            issue_date: date(2024, 1, 1),
            due_date: date(2024, 1, 31),
            description: "Consulting".to_string(),
            status: "pending".to_string(),
            payment_intent_id: Some("pi_123".to_string()),
            created_at: now,
            updated_at: now,
        };
        (invoice, client)
    }

    #[test]
    fn public_view_omits_payment_token_and_client_id() {
        let (invoice, client) = fixtures();
        let dto = PublicInvoiceDto::from_entities(invoice, client, date(2024, 1, 15));

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("payment_intent_id").is_none());
        assert!(json.get("client_id").is_none());
        assert!(json["client"].get("id").is_none());
        assert!(json["client"].get("phone").is_none());
        assert_eq!(json["amount"], "150.00");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn staff_view_reports_overdue_after_due_date() {
        let (invoice, client) = fixtures();
        let dto = InvoiceDto::from_entity(invoice, Some(&client), date(2024, 2, 1));
        assert_eq!(dto.status, InvoiceStatus::Overdue);
        assert_eq!(dto.client.unwrap().name, "Acme");
    }

    #[test]
    fn edit_model_rejects_status_field() {
        let result: Result<EditInvoiceModel, _> =
            serde_json::from_str(r#"{"status":"paid"}"#);
        assert!(result.is_err());
    }
}
