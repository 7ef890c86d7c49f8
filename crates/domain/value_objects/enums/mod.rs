pub mod invoice_statuses;
pub mod staff_roles;
