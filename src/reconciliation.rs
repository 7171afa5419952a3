use crate::aggregator::rank_entries;
use crate::config::ExplorerConfig;
use crate::error::Result;
use crate::filters::{has_only_base_filters, SpendingFilters};
use crate::schema::{CategoryEntry, CategoryType};
use crate::source::AggregateSource;
use log::debug;
use rust_decimal::Decimal;

/// Authoritative government-wide obligations for a fiscal period.
pub struct ControlTotalLookup<'a> {
    source: &'a dyn AggregateSource,
}

impl<'a> ControlTotalLookup<'a> {
    pub fn new(source: &'a dyn AggregateSource) -> Self {
        Self { source }
    }

    /// `None` when no control total was reported, which is not the same as a
    /// reported total of zero.
    pub async fn lookup(&self, fiscal_year: i32, fiscal_period: u32) -> Result<Option<Decimal>> {
        let total = self.source.control_total(fiscal_year, fiscal_period).await?;
        debug!(
            "Control total for FY{} P{:02}: {:?}",
            fiscal_year, fiscal_period, total
        );
        Ok(total)
    }
}

/// Grouped period set plus the request context reconciliation depends on.
#[derive(Debug, Clone)]
pub struct ReconciliationInput<'f> {
    pub category: CategoryType,
    pub results: Vec<CategoryEntry>,
    pub filters: &'f SpendingFilters,
    /// Sum of the result amounts; `None` when the set is empty.
    pub actual_total: Option<Decimal>,
    pub fiscal_year: i32,
    pub fiscal_period: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub results: Vec<CategoryEntry>,
    /// The envelope total: the control total when the unreported entry was
    /// added, otherwise the reported total.
    pub total: Option<Decimal>,
}

pub struct ReconciliationEngine<'a> {
    config: &'a ExplorerConfig,
    control_totals: ControlTotalLookup<'a>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(config: &'a ExplorerConfig, source: &'a dyn AggregateSource) -> Self {
        Self {
            config,
            control_totals: ControlTotalLookup::new(source),
        }
    }

    /// A control total describes the whole government, so it can only be
    /// compared against an un-narrowed request for a reconciling category.
    pub fn is_eligible(&self, category: CategoryType, filters: &SpendingFilters) -> bool {
        self.config.is_reconciling(category)
            && has_only_base_filters(filters.keys(), &self.config.base_filter_keys)
    }

    pub async fn reconcile(&self, input: ReconciliationInput<'_>) -> Result<Reconciliation> {
        let ReconciliationInput {
            category,
            mut results,
            filters,
            actual_total,
            fiscal_year,
            fiscal_period,
        } = input;

        if !self.is_eligible(category, filters) {
            debug!("{} request is not eligible for reconciliation", category);
            return Ok(Reconciliation {
                results,
                total: actual_total,
            });
        }

        let expected_total = self.control_totals.lookup(fiscal_year, fiscal_period).await?;

        match (expected_total, actual_total) {
            (Some(expected), Some(actual)) => {
                let unreported = expected - actual;
                debug!(
                    "Reconciled {}: expected {}, reported {}, unreported {}",
                    category, expected, actual, unreported
                );

                results.push(CategoryEntry::unreported(
                    category,
                    &self.config.unreported_data_name,
                    Some(unreported),
                ));
                rank_entries(&mut results);

                Ok(Reconciliation {
                    results,
                    total: Some(expected),
                })
            }
            _ => {
                debug!(
                    "Skipping unreported data for {}: expected {:?}, reported {:?}",
                    category, expected_total, actual_total
                );
                Ok(Reconciliation {
                    results,
                    total: actual_total,
                })
            }
        }
    }
}
