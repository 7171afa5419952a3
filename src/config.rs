use crate::calendar::{RevealSchedule, FIRST_SUBMISSION_FISCAL_YEAR};
use crate::error::{Result, SpendingExplorerError};
use crate::filters::{FISCAL_YEAR_KEY, QUARTER_KEY};
use crate::schema::CategoryType;
use crate::utils::generate_fiscal_year;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

pub const UNREPORTED_DATA_NAME: &str = "Unreported Data";

/// Categories whose reported obligations are compared against the control
/// total.
pub const RECONCILING_CATEGORIES: [CategoryType; 3] = [
    CategoryType::Agency,
    CategoryType::BudgetFunction,
    CategoryType::ObjectClass,
];

/// Immutable engine configuration, resolved once and handed to the explorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Categories a request may ask for.
    pub categories: Vec<CategoryType>,
    /// Categories eligible for an unreported data entry.
    pub reconciling_categories: Vec<CategoryType>,
    /// Filter keys that, when they are the only keys present, make a request
    /// government-wide.
    pub base_filter_keys: BTreeSet<String>,
    pub unreported_data_name: String,
    pub reveal_schedule: RevealSchedule,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        let current_fiscal_year = generate_fiscal_year(Utc::now().date_naive());

        Self {
            categories: CategoryType::ALL.to_vec(),
            reconciling_categories: RECONCILING_CATEGORIES.to_vec(),
            base_filter_keys: [FISCAL_YEAR_KEY, QUARTER_KEY]
                .into_iter()
                .map(String::from)
                .collect(),
            unreported_data_name: UNREPORTED_DATA_NAME.to_string(),
            reveal_schedule: RevealSchedule::standard(
                FIRST_SUBMISSION_FISCAL_YEAR,
                current_fiscal_year + 1,
            ),
        }
    }
}

impl ExplorerConfig {
    pub fn with_reveal_schedule(mut self, reveal_schedule: RevealSchedule) -> Self {
        self.reveal_schedule = reveal_schedule;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(SpendingExplorerError::Config(
                "At least one category must be enabled".to_string(),
            ));
        }

        if let Some(category) = self
            .reconciling_categories
            .iter()
            .find(|category| !self.categories.contains(category))
        {
            return Err(SpendingExplorerError::Config(format!(
                "Reconciling category \"{}\" is not an enabled category",
                category
            )));
        }

        for required in [FISCAL_YEAR_KEY, QUARTER_KEY] {
            if !self.base_filter_keys.contains(required) {
                return Err(SpendingExplorerError::Config(format!(
                    "Base filter keys must include \"{}\"",
                    required
                )));
            }
        }

        if self.unreported_data_name.trim().is_empty() {
            return Err(SpendingExplorerError::Config(
                "Unreported data name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Maps the requested type onto an enabled category.
    pub fn parse_category(&self, raw: Option<&str>) -> Result<CategoryType> {
        let raw = raw.ok_or_else(|| {
            SpendingExplorerError::InvalidCategory("Missing required request parameter \"type\"".to_string())
        })?;

        let category: CategoryType = raw.parse()?;
        if !self.categories.contains(&category) {
            return Err(SpendingExplorerError::InvalidCategory(format!(
                "\"{}\" is not enabled",
                category
            )));
        }

        Ok(category)
    }

    pub fn is_reconciling(&self, category: CategoryType) -> bool {
        self.reconciling_categories.contains(&category)
    }
}
