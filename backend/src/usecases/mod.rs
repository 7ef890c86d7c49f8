pub mod checkout;
pub mod invoices;
pub mod payment_webhook;
pub mod stripe_gateway;
