pub mod checkout;
pub mod invoices;
pub mod public_invoices;
pub mod webhooks;
