pub mod excel_read;
pub mod ntfy;
pub mod service_account;
pub mod sheets;
