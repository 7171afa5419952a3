//! # Spending Explorer
//!
//! A library for aggregating reported federal obligations by spending category and
//! reconciling them against the authoritative government-wide control totals.
//!
//! ## Core Concepts
//!
//! - **Fiscal Window**: A fiscal year and quarter. Quarters are hidden until agency
//!   submissions for them are revealed (45 days after the quarter closes)
//! - **Cumulative Set**: Award-level obligations from the start of the fiscal year through the quarter
//! - **Period Set**: Program activity / object class obligations for the final period of the quarter
//! - **Control Total**: What the government as a whole reports it obligated for the period
//! - **Unreported Data**: The residual between the control total and the reported entries,
//!   added for agency, budget function and object class requests without extra filters
//!
//! ## Example
//!
//! ```rust,ignore
//! use spending_explorer::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let source = InMemorySource::from_path("spending.json")?;
//! let explorer = SpendingExplorer::new(ExplorerConfig::default(), Arc::new(source))?;
//!
//! let request = ExplorerRequest::new("object_class", json!({ "fy": "2020", "quarter": 2 }));
//! let response = explorer.explore(&request).await?;
//!
//! for entry in response.results() {
//!     println!("{:>20} {:?}", entry.name, entry.amount);
//! }
//! ```

pub mod aggregator;
pub mod assembler;
pub mod calendar;
pub mod config;
pub mod engine;
pub mod error;
pub mod filters;
pub mod reconciliation;
pub mod schema;
pub mod source;
pub mod utils;

pub use aggregator::{apply_filters_and_group, sum_amounts, AggregatedSets, CategoryAggregator};
pub use assembler::ResultAssembler;
pub use calendar::{resolve_fiscal_window, FiscalCalendar, RevealSchedule, SubmissionWindow};
pub use config::{ExplorerConfig, RECONCILING_CATEGORIES, UNREPORTED_DATA_NAME};
pub use engine::SpendingExplorer;
pub use error::{Result, SpendingExplorerError};
pub use filters::{has_only_base_filters, NarrowingFilter, SpendingFilters};
pub use reconciliation::{ControlTotalLookup, Reconciliation, ReconciliationEngine};
pub use schema::*;
pub use source::*;
pub use utils::*;

use std::sync::Arc;

/// Runs a single request with the default configuration.
pub async fn explore_spending(
    source: Arc<dyn AggregateSource>,
    request: &ExplorerRequest,
) -> Result<ExplorerResponse> {
    SpendingExplorer::new(ExplorerConfig::default(), source)?
        .explore(request)
        .await
}
