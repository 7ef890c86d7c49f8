use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::invoice_statuses::InvoiceStatus,
    infra::db::postgres::schema::invoices,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = invoices)]
pub struct InvoiceEntity {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub description: String,
    pub status: String,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceEntity {
    pub fn stored_status(&self) -> InvoiceStatus {
        InvoiceStatus::from_stored(&self.status)
    }

    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        self.stored_status().effective(self.due_date, today)
    }

    pub fn is_paid(&self) -> bool {
        self.stored_status().is_paid()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = invoices)]
pub struct InsertInvoiceEntity {
    pub invoice_number: String,
    pub client_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub description: String,
    pub status: String,
}

/// Staff-editable fields. Status and the payment token only change through
/// `InvoiceRepository::mark_paid_if_pending`.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = invoices)]
pub struct EditInvoiceEntity {
    pub client_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EditInvoiceEntity {
    pub fn touches_money(&self) -> bool {
        self.amount.is_some() || self.currency.is_some()
    }
}

/// Aggregate counters for the staff dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceStatsEntity {
    pub total: i64,
    pub paid: i64,
    pub pending: i64,
    pub overdue: i64,
    pub total_paid_amount: Decimal,
}
