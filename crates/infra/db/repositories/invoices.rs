use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use diesel::{
    OptionalExtension, RunQueryDsl,
    dsl::{count_star, sum},
    insert_into,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::{Nullable, Text},
    update,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{clients, invoices},
    },
};
use domain::{
    entities::{
        clients::ClientEntity,
        invoices::{EditInvoiceEntity, InsertInvoiceEntity, InvoiceEntity, InvoiceStatsEntity},
    },
    repositories::invoices::{InsertInvoiceOutcome, InvoiceRepository},
    value_objects::enums::invoice_statuses::InvoiceStatus,
};

/// Unique index backing invoice number allocation (see migrations).
const INVOICE_NUMBER_UNIQUE_INDEX: &str = "invoices_invoice_number_key";

diesel::define_sql_function! {
    fn coalesce(x: Nullable<Text>, y: Nullable<Text>) -> Nullable<Text>;
}

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn insert_invoice(&self, invoice: InsertInvoiceEntity) -> Result<InsertInvoiceOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(invoices::table)
            .values(&invoice)
            .returning(InvoiceEntity::as_returning())
            .get_result::<InvoiceEntity>(&mut conn);

        match inserted {
            Ok(entity) => Ok(InsertInvoiceOutcome::Inserted(entity)),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info))
                if info.constraint_name() == Some(INVOICE_NUMBER_UNIQUE_INDEX) =>
            {
                Ok(InsertInvoiceOutcome::DuplicateNumber)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, invoice_id: Uuid) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::id.eq(invoice_id))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn find_with_client(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<(InvoiceEntity, ClientEntity)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = invoices::table
            .inner_join(clients::table)
            .filter(invoices::id.eq(invoice_id))
            .select((InvoiceEntity::as_select(), ClientEntity::as_select()))
            .first::<(InvoiceEntity, ClientEntity)>(&mut conn)
            .optional()?;

        Ok(row)
    }

    async fn find_by_payment_intent_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let invoice = invoices::table
            .filter(invoices::payment_intent_id.eq(payment_intent_id))
            .select(InvoiceEntity::as_select())
            .first::<InvoiceEntity>(&mut conn)
            .optional()?;

        Ok(invoice)
    }

    async fn list_with_clients(&self) -> Result<Vec<(InvoiceEntity, ClientEntity)>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = invoices::table
            .inner_join(clients::table)
            .order(invoices::created_at.desc())
            .select((InvoiceEntity::as_select(), ClientEntity::as_select()))
            .load::<(InvoiceEntity, ClientEntity)>(&mut conn)?;

        Ok(rows)
    }

    async fn update_invoice(
        &self,
        invoice_id: Uuid,
        changes: EditInvoiceEntity,
        only_if_pending: bool,
    ) -> Result<Option<InvoiceEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = if only_if_pending {
            update(
                invoices::table
                    .filter(invoices::id.eq(invoice_id))
                    .filter(invoices::status.eq(InvoiceStatus::Pending.as_str())),
            )
            .set(&changes)
            .returning(InvoiceEntity::as_returning())
            .get_result::<InvoiceEntity>(&mut conn)
            .optional()?
        } else {
            update(invoices::table.filter(invoices::id.eq(invoice_id)))
                .set(&changes)
                .returning(InvoiceEntity::as_returning())
                .get_result::<InvoiceEntity>(&mut conn)
                .optional()?
        };

        Ok(updated)
    }

    async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = diesel::delete(invoices::table.filter(invoices::id.eq(invoice_id)))
            .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn mark_paid_if_pending(
        &self,
        invoice_id: Uuid,
        payment_intent_id: Option<String>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Single statement: concurrent deliveries race on the row lock and only the first
        // one still sees `pending`.
        let affected = update(
            invoices::table
                .filter(invoices::id.eq(invoice_id))
                .filter(invoices::status.eq(InvoiceStatus::Pending.as_str())),
        )
        .set((
            invoices::status.eq(InvoiceStatus::Paid.as_str()),
            invoices::payment_intent_id.eq(coalesce(invoices::payment_intent_id, payment_intent_id)),
            invoices::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(affected == 1)
    }

    async fn stats(&self, today: NaiveDate) -> Result<InvoiceStatsEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let paid = InvoiceStatus::Paid.as_str();
        let pending = InvoiceStatus::Pending.as_str();

        let total = invoices::table
            .select(count_star())
            .get_result::<i64>(&mut conn)?;
        let paid_count = invoices::table
            .filter(invoices::status.eq(paid))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;
        let overdue = invoices::table
            .filter(invoices::status.eq(pending))
            .filter(invoices::due_date.lt(today))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;
        let pending_count = invoices::table
            .filter(invoices::status.eq(pending))
            .filter(invoices::due_date.ge(today))
            .select(count_star())
            .get_result::<i64>(&mut conn)?;
        let total_paid_amount = invoices::table
            .filter(invoices::status.eq(paid))
            .select(sum(invoices::amount))
            .get_result::<Option<Decimal>>(&mut conn)?
            .unwrap_or_default();

        Ok(InvoiceStatsEntity {
            total,
            paid: paid_count,
            pending: pending_count,
            overdue,
            total_paid_amount,
        })
    }
}
