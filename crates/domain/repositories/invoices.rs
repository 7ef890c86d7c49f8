use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    clients::ClientEntity,
    invoices::{EditInvoiceEntity, InsertInvoiceEntity, InvoiceEntity, InvoiceStatsEntity},
};

#[derive(Debug, Clone, PartialEq)]
pub enum InsertInvoiceOutcome {
    Inserted(InvoiceEntity),
    /// The invoice number collided with the unique index; nothing was written.
    DuplicateNumber,
}

#[async_trait]
#[automock]
pub trait InvoiceRepository {
    async fn insert_invoice(&self, invoice: InsertInvoiceEntity) -> Result<InsertInvoiceOutcome>;

    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>>;

    async fn find_with_client(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<(InvoiceEntity, ClientEntity)>>;

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<InvoiceEntity>>;

    async fn list_with_clients(&self) -> Result<Vec<(InvoiceEntity, ClientEntity)>>;

    /// Applies `changes` and returns the updated row, or `None` when no row matched.
    /// With `only_if_pending` the update is conditional on the invoice still being pending.
    async fn update_invoice(
        &self,
        invoice_id: Uuid,
        changes: EditInvoiceEntity,
        only_if_pending: bool,
    ) -> Result<Option<InvoiceEntity>>;

    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool>;

    /// Conditional `pending -> paid` transition. Records `payment_intent_id` only when no
    /// token is stored yet. Returns `true` when this call performed the transition.
    async fn mark_paid_if_pending(
        &self,
        invoice_id: Uuid,
        payment_intent_id: Option<String>,
    ) -> Result<bool>;

    async fn stats(&self, today: NaiveDate) -> Result<InvoiceStatsEntity>;
}
