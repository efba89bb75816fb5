pub mod aggregate;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod ratios;
pub mod report;
pub mod source;

pub use aggregate::{build_snapshot, query};
pub use error::{DashboardError, Result};
pub use models::{GroupingKey, QueryResult, Snapshot};
