use crate::error::{Result, SpendingExplorerError};
use crate::filters::{NarrowingFilter, SpendingFilters, QUARTER_KEY};
use crate::schema::{CategoryEntry, CategoryType, SourceSet};
use crate::source::{AggregateSource, ReportedRow, SourceQuery};
use crate::utils::get_final_period_of_quarter;
use log::debug;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Identity of the group a row contributes to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupKey {
    id: String,
    code: Option<String>,
    name: String,
    account_number: Option<String>,
}

impl GroupKey {
    fn new(id: impl ToString, code: Option<&str>, name: &str) -> Self {
        Self {
            id: id.to_string(),
            code: code.map(str::to_string),
            name: name.to_string(),
            account_number: None,
        }
    }
}

/// Group a row belongs to for `category`, or `None` when the row does not
/// carry that dimension.
fn group_key<R: ReportedRow>(row: &R, category: CategoryType) -> Option<GroupKey> {
    let classification = row.classification();

    match category {
        CategoryType::BudgetFunction => classification
            .budget_function
            .as_ref()
            .map(|function| GroupKey::new(&function.code, Some(function.code.as_str()), &function.title)),
        CategoryType::BudgetSubfunction => classification
            .budget_subfunction
            .as_ref()
            .map(|subfunction| {
                GroupKey::new(&subfunction.code, Some(subfunction.code.as_str()), &subfunction.title)
            }),
        CategoryType::FederalAccount => classification.federal_account.as_ref().map(|account| {
            GroupKey {
                account_number: Some(account.account_number()),
                ..GroupKey::new(account.id, Some(account.main_account_code.as_str()), &account.account_title)
            }
        }),
        CategoryType::ProgramActivity => classification
            .program_activity
            .as_ref()
            .map(|activity| GroupKey::new(activity.id, Some(activity.code.as_str()), &activity.name)),
        CategoryType::ObjectClass => classification
            .object_class
            .as_ref()
            .map(|object_class| GroupKey::new(object_class.id, Some(object_class.code.as_str()), &object_class.name)),
        CategoryType::Agency => classification
            .toptier_agency
            .as_ref()
            .map(|agency| GroupKey::new(agency.id, Some(agency.code.as_str()), &agency.name)),
        CategoryType::AgencySub => classification
            .subtier_agency
            .as_ref()
            .map(|agency| GroupKey::new(agency.id, Some(agency.code.as_str()), &agency.name)),
        CategoryType::AgencyType => row
            .award()
            .and_then(|award| award.awarding_agency.as_ref())
            .map(|agency| GroupKey::new(agency.id, Some(agency.code.as_str()), &agency.name)),
        CategoryType::Recipient => row
            .award()
            .and_then(|award| award.recipient.as_ref())
            .map(|recipient| {
                GroupKey::new(recipient.id, recipient.unique_id.as_deref(), &recipient.name)
            }),
        CategoryType::Award => row.award().map(|award| {
            let code = award.display_code();
            let id = award.id.to_string();
            GroupKey::new(&id, code, code.unwrap_or(&id))
        }),
        CategoryType::AwardCategory => row
            .award()
            .filter(|award| award.category.is_some())
            .map(|award| {
                let name = award
                    .recipient
                    .as_ref()
                    .map(|recipient| recipient.name.as_str())
                    .or(award.category.as_deref())
                    .unwrap_or_default();
                GroupKey::new(award.id, award.display_code(), name)
            }),
    }
}

fn matches_filter<R: ReportedRow>(row: &R, filter: &NarrowingFilter) -> bool {
    group_key(row, filter.category).is_some_and(|key| {
        key.id == filter.value || key.code.as_deref() == Some(filter.value.as_str())
    })
}

/// Applies the request's narrowing filters to `rows` and sums the survivors
/// per `category` group. Output is ranked by amount, largest first, ties by id.
pub fn apply_filters_and_group<R: ReportedRow>(
    rows: &[R],
    filters: &SpendingFilters,
    category: CategoryType,
) -> Vec<CategoryEntry> {
    let mut groups: BTreeMap<String, (GroupKey, Decimal)> = BTreeMap::new();

    for row in rows {
        if !filters
            .narrowing()
            .iter()
            .all(|filter| matches_filter(row, filter))
        {
            continue;
        }

        let Some(key) = group_key(row, category) else {
            continue;
        };

        groups
            .entry(key.id.clone())
            .and_modify(|(_, total)| *total += row.amount())
            .or_insert((key, row.amount()));
    }

    let mut entries: Vec<CategoryEntry> = groups
        .into_values()
        .map(|(key, amount)| CategoryEntry {
            id: Some(key.id),
            code: key.code,
            category_type: category,
            name: key.name,
            amount: Some(amount),
            account_number: key.account_number,
        })
        .collect();

    rank_entries(&mut entries);
    entries
}

/// Sorts by amount descending, ties broken by id ascending. Numeric ids
/// compare as numbers; the unreported entry (no id) leads its tie.
pub fn rank_entries(entries: &mut [CategoryEntry]) {
    entries.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| tie_key(a.id.as_deref()).cmp(&tie_key(b.id.as_deref())))
    });
}

fn tie_key(id: Option<&str>) -> (u8, u64, &str) {
    match id {
        None => (0, 0, ""),
        Some(id) => match id.parse::<u64>() {
            Ok(number) => (1, number, id),
            Err(_) => (2, 0, id),
        },
    }
}

/// Sum of entry amounts, or `None` for an empty set.
pub fn sum_amounts(entries: &[CategoryEntry]) -> Option<Decimal> {
    entries
        .iter()
        .filter_map(|entry| entry.amount)
        .fold(None, |total, amount| Some(total.unwrap_or(Decimal::ZERO) + amount))
}

/// Both grouped sets for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSets {
    /// Award-level obligations from the start of the year through the quarter.
    pub cumulative: Vec<CategoryEntry>,
    /// Program activity obligations for the final period of the quarter.
    pub period: Vec<CategoryEntry>,
}

impl AggregatedSets {
    /// The set a category's results are drawn from.
    pub fn into_selected(self, category: CategoryType) -> Vec<CategoryEntry> {
        match category.source_set() {
            SourceSet::Cumulative => self.cumulative,
            SourceSet::Period => self.period,
        }
    }
}

pub struct CategoryAggregator<'a> {
    source: &'a dyn AggregateSource,
}

impl<'a> CategoryAggregator<'a> {
    pub fn new(source: &'a dyn AggregateSource) -> Self {
        Self { source }
    }

    pub async fn aggregate(
        &self,
        category: CategoryType,
        filters: &SpendingFilters,
        fiscal_year: i32,
        fiscal_quarter: u32,
    ) -> Result<AggregatedSets> {
        let final_period = get_final_period_of_quarter(fiscal_quarter).ok_or_else(|| {
            SpendingExplorerError::invalid_parameter(
                QUARTER_KEY,
                format!("Quarter {} has no final period", fiscal_quarter),
            )
        })?;

        let cumulative_query = SourceQuery::cumulative(fiscal_year, fiscal_quarter);
        let period_query = SourceQuery::period(fiscal_year, final_period);

        let (award_rows, program_rows) = futures::try_join!(
            self.source.award_financial_rows(&cumulative_query),
            self.source.program_activity_rows(&period_query),
        )?;

        debug!(
            "Fetched {} award financial rows and {} program activity rows for FY{} Q{}",
            award_rows.len(),
            program_rows.len(),
            fiscal_year,
            fiscal_quarter
        );

        let cumulative = apply_filters_and_group(&award_rows, filters, category);
        let period = apply_filters_and_group(&program_rows, filters, category);

        debug!(
            "Grouped by {}: {} cumulative entries, {} period entries",
            category,
            cumulative.len(),
            period.len()
        );

        Ok(AggregatedSets { cumulative, period })
    }
}
