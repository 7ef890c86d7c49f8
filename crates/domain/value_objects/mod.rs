pub mod enums;
pub mod invoice_numbers;
pub mod invoices;
pub mod money;
pub mod payment_events;
