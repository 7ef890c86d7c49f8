use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Payment status of an invoice.
///
/// Only `Pending` and `Paid` are ever written to the `invoices.status` column.
/// `Overdue` is a read-time label over pending invoices whose due date has passed.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    /// Parses a stored status. Anything that is not `paid` is treated as pending so an
    /// unexpected value can never make an invoice look settled.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "paid" => InvoiceStatus::Paid,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Status as shown to callers on `today`.
    pub fn effective(self, due_date: NaiveDate, today: NaiveDate) -> Self {
        match self {
            InvoiceStatus::Pending if due_date < today => InvoiceStatus::Overdue,
            other => other,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unknown_stored_values_read_as_pending() {
        assert_eq!(InvoiceStatus::from_stored("paid"), InvoiceStatus::Paid);
        assert_eq!(InvoiceStatus::from_stored("pending"), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::from_stored("overdue"), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::from_stored("PAID"), InvoiceStatus::Pending);
    }

    #[test]
    fn pending_past_due_reads_as_overdue() {
        let due = date(2024, 3, 1);
        assert_eq!(
            InvoiceStatus::Pending.effective(due, date(2024, 3, 2)),
            InvoiceStatus::Overdue
        );
        assert_eq!(
            InvoiceStatus::Pending.effective(due, date(2024, 3, 1)),
            InvoiceStatus::Pending
        );
    }

    #[test]
    fn paid_is_never_overdue() {
        let due = date(2024, 3, 1);
        assert_eq!(
            InvoiceStatus::Paid.effective(due, date(2025, 1, 1)),
            InvoiceStatus::Paid
        );
    }
}
