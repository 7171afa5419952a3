use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SpendingExplorerError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CategoryType {
    #[schemars(description = "Budget functions (e.g. National Defense), from program activity obligations")]
    BudgetFunction,

    #[schemars(description = "Budget subfunctions, from program activity obligations")]
    BudgetSubfunction,

    #[schemars(description = "Federal accounts, reported with their account number")]
    FederalAccount,

    #[schemars(description = "Program activities within federal accounts")]
    ProgramActivity,

    #[schemars(description = "Object classes (e.g. Personnel compensation)")]
    ObjectClass,

    #[schemars(description = "Award recipients, from award-level obligations")]
    Recipient,

    #[schemars(description = "Individual awards, identified by PIID, FAIN or URI")]
    Award,

    #[schemars(description = "Awards that carry an award category (contracts, grants, loans, ...)")]
    AwardCategory,

    #[schemars(description = "Toptier (reporting) agencies")]
    Agency,

    #[schemars(description = "Awarding toptier agencies, from award-level obligations")]
    AgencyType,

    #[schemars(description = "Subtier agencies")]
    AgencySub,
}

/// Where a category's grouped rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSet {
    /// Award-level obligations summed from the start of the fiscal year
    /// through the requested quarter.
    Cumulative,
    /// Program activity / object class obligations for the final period of the
    /// requested quarter.
    Period,
}

impl CategoryType {
    pub const ALL: [CategoryType; 11] = [
        CategoryType::BudgetFunction,
        CategoryType::BudgetSubfunction,
        CategoryType::FederalAccount,
        CategoryType::ProgramActivity,
        CategoryType::ObjectClass,
        CategoryType::Recipient,
        CategoryType::Award,
        CategoryType::AwardCategory,
        CategoryType::Agency,
        CategoryType::AgencyType,
        CategoryType::AgencySub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::BudgetFunction => "budget_function",
            CategoryType::BudgetSubfunction => "budget_subfunction",
            CategoryType::FederalAccount => "federal_account",
            CategoryType::ProgramActivity => "program_activity",
            CategoryType::ObjectClass => "object_class",
            CategoryType::Recipient => "recipient",
            CategoryType::Award => "award",
            CategoryType::AwardCategory => "award_category",
            CategoryType::Agency => "agency",
            CategoryType::AgencyType => "agency_type",
            CategoryType::AgencySub => "agency_sub",
        }
    }

    pub fn source_set(&self) -> SourceSet {
        match self {
            CategoryType::Recipient
            | CategoryType::Award
            | CategoryType::AwardCategory
            | CategoryType::AgencyType => SourceSet::Cumulative,
            _ => SourceSet::Period,
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryType {
    type Err = SpendingExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryType::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| {
                SpendingExplorerError::InvalidCategory(format!(
                    "\"{}\" is not a valid type. Valid types: {}",
                    s,
                    CategoryType::ALL
                        .iter()
                        .map(CategoryType::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// A spending explorer request after HTTP decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExplorerRequest {
    #[serde(rename = "type")]
    #[schemars(description = "The spending category to aggregate by, e.g. 'agency' or 'object_class'")]
    pub category_type: Option<String>,

    #[schemars(
        description = "Filter mapping. Must contain 'fy' (fiscal year, YYYY) and 'quarter' (1-4). Any other key whose name is a category type narrows results to that entity, e.g. {\"agency\": \"012\"}."
    )]
    pub filters: Option<BTreeMap<String, serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Maximum number of award rows to return. Only applies to the 'award' type.")]
    pub limit: Option<usize>,
}

impl ExplorerRequest {
    pub fn new(category_type: impl Into<String>, filters: serde_json::Value) -> Self {
        let filters = match filters {
            serde_json::Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        };

        Self {
            category_type: Some(category_type.into()),
            filters,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExplorerRequest)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// One row of an aggregated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    /// Stringified entity id; `None` only for the unreported data entry.
    pub id: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub category_type: CategoryType,
    pub name: String,
    /// `None` only for an unreported data entry whose totals were incomplete.
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

impl CategoryEntry {
    pub fn unreported(category_type: CategoryType, name: &str, amount: Option<Decimal>) -> Self {
        Self {
            id: None,
            code: None,
            category_type,
            name: name.to_string(),
            amount,
            account_number: None,
        }
    }

    pub fn is_unreported(&self) -> bool {
        self.id.is_none()
    }
}

/// The fiscal window a request resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalWindow {
    pub fiscal_year: i32,
    pub fiscal_quarter: u32,
    pub period_end_date: NaiveDate,
    /// Last fiscal month of the quarter (`3 * fiscal_quarter`).
    pub final_period: u32,
    pub revealed: bool,
}

/// Output envelope. An unrevealed window serializes to `{"total": null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerResponse {
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<CategoryEntry>>,
}

impl ExplorerResponse {
    pub fn unrevealed() -> Self {
        Self {
            total: None,
            end_date: None,
            results: None,
        }
    }

    pub fn results(&self) -> &[CategoryEntry] {
        self.results.as_deref().unwrap_or_default()
    }

    pub fn unreported_entry(&self) -> Option<&CategoryEntry> {
        self.results().iter().find(|entry| entry.is_unreported())
    }
}
