use crate::error::{Result, SpendingExplorerError};
use crate::schema::CategoryType;
use log::warn;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const FISCAL_YEAR_KEY: &str = "fy";
pub const QUARTER_KEY: &str = "quarter";

pub const MIN_FISCAL_YEAR: i64 = 1000;
pub const MAX_FISCAL_YEAR: i64 = 9999;

/// Restricts both row sets to one entity of a category dimension, matched by
/// entity id or code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrowingFilter {
    pub category: CategoryType,
    pub value: String,
}

/// Validated request filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendingFilters {
    pub fiscal_year: i32,
    pub fiscal_quarter: u32,
    keys: BTreeSet<String>,
    narrowing: Vec<NarrowingFilter>,
}

impl SpendingFilters {
    pub fn new(fiscal_year: i32, fiscal_quarter: u32) -> Self {
        Self {
            fiscal_year,
            fiscal_quarter,
            keys: [FISCAL_YEAR_KEY, QUARTER_KEY]
                .into_iter()
                .map(String::from)
                .collect(),
            narrowing: Vec::new(),
        }
    }

    pub fn with_narrowing(mut self, category: CategoryType, value: impl Into<String>) -> Self {
        self.keys.insert(category.as_str().to_string());
        self.narrowing.push(NarrowingFilter {
            category,
            value: value.into(),
        });
        self
    }

    /// Validates the raw filter mapping. Checks run in a fixed order so the
    /// first missing or malformed field is the one reported.
    pub fn parse(filters: Option<&BTreeMap<String, Value>>) -> Result<Self> {
        let filters = filters.ok_or_else(|| {
            SpendingExplorerError::invalid_parameter(
                "filters",
                "Missing required request parameter \"filters\"",
            )
        })?;

        let raw_year = filters.get(FISCAL_YEAR_KEY).ok_or_else(|| {
            SpendingExplorerError::invalid_parameter(FISCAL_YEAR_KEY, "Missing required parameter \"fy\"")
        })?;
        let raw_quarter = filters.get(QUARTER_KEY).ok_or_else(|| {
            SpendingExplorerError::invalid_parameter(QUARTER_KEY, "Missing required parameter \"quarter\"")
        })?;

        let fiscal_year = parse_fiscal_year(raw_year)?;
        let fiscal_quarter = parse_quarter(raw_quarter)?;

        let mut narrowing = Vec::new();
        for (key, value) in filters {
            if key == FISCAL_YEAR_KEY || key == QUARTER_KEY {
                continue;
            }

            match key.parse::<CategoryType>() {
                Ok(category) => narrowing.push(NarrowingFilter {
                    category,
                    value: filter_value(key, value)?,
                }),
                Err(_) => warn!("Ignoring unrecognized spending filter \"{}\"", key),
            }
        }

        Ok(Self {
            fiscal_year,
            fiscal_quarter,
            keys: filters.keys().cloned().collect(),
            narrowing,
        })
    }

    /// Every key the request supplied, recognized or not.
    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn narrowing(&self) -> &[NarrowingFilter] {
        &self.narrowing
    }
}

/// True when the request supplied exactly the base filter keys and nothing
/// else. Only such requests describe the whole government, which is what a
/// control total measures.
pub fn has_only_base_filters(keys: &BTreeSet<String>, base_keys: &BTreeSet<String>) -> bool {
    keys == base_keys
}

fn parse_fiscal_year(value: &Value) -> Result<i32> {
    let year = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        SpendingExplorerError::invalid_parameter(
            FISCAL_YEAR_KEY,
            "Incorrect or missing fiscal year parameter, expected \"fy\": \"YYYY\"",
        )
    })?;

    if !(MIN_FISCAL_YEAR..=MAX_FISCAL_YEAR).contains(&year) {
        return Err(SpendingExplorerError::invalid_parameter(
            FISCAL_YEAR_KEY,
            format!("Incorrect fiscal year parameter {}, expected \"fy\": \"YYYY\"", year),
        ));
    }

    i32::try_from(year).map_err(|_| {
        SpendingExplorerError::invalid_parameter(FISCAL_YEAR_KEY, "Fiscal year out of range")
    })
}

fn parse_quarter(value: &Value) -> Result<u32> {
    let quarter = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => match text.as_str() {
            "1" | "2" | "3" | "4" => text.parse::<u64>().ok(),
            _ => None,
        },
        _ => None,
    };

    match quarter {
        Some(quarter @ 1..=4) => Ok(quarter as u32),
        _ => Err(SpendingExplorerError::invalid_parameter(
            QUARTER_KEY,
            "Incorrect value provided for quarter parameter. Must be between 1 and 4",
        )),
    }
}

fn filter_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(SpendingExplorerError::invalid_parameter(
            key,
            "Filter value must be a string or a number",
        )),
    }
}
