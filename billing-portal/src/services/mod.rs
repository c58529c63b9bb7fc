//! Services for the billing portal.

pub mod database;
pub mod metrics;
pub mod reconciliation;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
