use crate::aggregator::{sum_amounts, CategoryAggregator};
use crate::assembler::ResultAssembler;
use crate::calendar::resolve_fiscal_window;
use crate::config::ExplorerConfig;
use crate::error::{Result, SpendingExplorerError};
use crate::filters::SpendingFilters;
use crate::reconciliation::{ReconciliationEngine, ReconciliationInput};
use crate::schema::{ExplorerRequest, ExplorerResponse, SourceSet};
use crate::source::AggregateSource;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Runs explorer requests against a shared data source. Holds no per-request
/// state, so one instance can serve concurrent requests.
#[derive(Clone)]
pub struct SpendingExplorer {
    config: Arc<ExplorerConfig>,
    source: Arc<dyn AggregateSource>,
}

impl SpendingExplorer {
    pub fn new(config: ExplorerConfig, source: Arc<dyn AggregateSource>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub async fn explore(&self, request: &ExplorerRequest) -> Result<ExplorerResponse> {
        self.explore_at(request, Utc::now()).await
    }

    /// Same as [`explore`](Self::explore), evaluated as of `now`.
    pub async fn explore_at(
        &self,
        request: &ExplorerRequest,
        now: DateTime<Utc>,
    ) -> Result<ExplorerResponse> {
        let category = self.config.parse_category(request.category_type.as_deref())?;
        let filters = SpendingFilters::parse(request.filters.as_ref())?;
        validate_limit(request.limit)?;

        info!(
            "Exploring {} spending for FY{} Q{}",
            category, filters.fiscal_year, filters.fiscal_quarter
        );

        let Some(window) = resolve_fiscal_window(
            &self.config.reveal_schedule,
            filters.fiscal_year,
            filters.fiscal_quarter,
            now,
        ) else {
            info!(
                "FY{} Q{} has not been revealed as of {}",
                filters.fiscal_year, filters.fiscal_quarter, now
            );
            return Ok(ResultAssembler::unrevealed());
        };

        let sets = CategoryAggregator::new(self.source.as_ref())
            .aggregate(category, &filters, window.fiscal_year, window.fiscal_quarter)
            .await?;

        match category.source_set() {
            SourceSet::Cumulative => {
                let mut results = sets.into_selected(category);
                let total = sum_amounts(&results).unwrap_or(Decimal::ZERO);
                ResultAssembler::apply_limit(category, &mut results, request.limit);

                debug!("{} total {} across {} results", category, total, results.len());
                Ok(ResultAssembler::assemble(&window, Some(total), results))
            }
            SourceSet::Period => {
                let results = sets.into_selected(category);
                let actual_total = sum_amounts(&results);

                let reconciliation = ReconciliationEngine::new(&self.config, self.source.as_ref())
                    .reconcile(ReconciliationInput {
                        category,
                        results,
                        filters: &filters,
                        actual_total,
                        fiscal_year: window.fiscal_year,
                        fiscal_period: window.final_period,
                    })
                    .await?;

                debug!(
                    "{} total {:?} across {} results",
                    category,
                    reconciliation.total,
                    reconciliation.results.len()
                );
                Ok(ResultAssembler::assemble(
                    &window,
                    reconciliation.total,
                    reconciliation.results,
                ))
            }
        }
    }
}

/// A limit must be positive for every category, although only `award`
/// results are ever truncated by it.
fn validate_limit(limit: Option<usize>) -> Result<()> {
    match limit {
        Some(0) => Err(SpendingExplorerError::invalid_parameter(
            "limit",
            "Limit must be a positive integer",
        )),
        _ => Ok(()),
    }
}
