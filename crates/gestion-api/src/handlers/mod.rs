//! HTTP handlers for gestion-api.

pub mod analyze;
pub mod health;

pub use analyze::get_total_amount;
pub use health::health_check;
