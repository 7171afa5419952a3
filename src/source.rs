use crate::error::{Result, SpendingExplorerError};
use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Reporting period of the submission a row was filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPeriod {
    pub reporting_fiscal_year: i32,
    pub reporting_fiscal_quarter: u32,
    pub reporting_fiscal_period: u32,
}

impl SubmissionPeriod {
    pub fn new(fiscal_year: i32, fiscal_period: u32) -> Self {
        Self {
            reporting_fiscal_year: fiscal_year,
            reporting_fiscal_quarter: (fiscal_period + 2) / 3,
            reporting_fiscal_period: fiscal_period,
        }
    }
}

/// An entity with a numeric id, a short code and a display name
/// (agencies, program activities, object classes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: u64,
    pub code: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: u64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Budget functions and subfunctions are identified by code alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedLabel {
    pub code: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederalAccountRef {
    pub id: u64,
    pub agency_identifier: String,
    pub main_account_code: String,
    pub account_title: String,
}

impl FederalAccountRef {
    pub fn account_number(&self) -> String {
        format!("{}-{}", self.agency_identifier, self.main_account_code)
    }
}

/// Dimensions shared by both row sets, so narrowing filters apply to each
/// the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub toptier_agency: Option<EntityRef>,
    pub subtier_agency: Option<EntityRef>,
    pub federal_account: Option<FederalAccountRef>,
    pub budget_function: Option<CodedLabel>,
    pub budget_subfunction: Option<CodedLabel>,
    pub program_activity: Option<EntityRef>,
    pub object_class: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRef {
    pub id: u64,
    #[serde(default)]
    pub unique_id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRef {
    pub id: u64,
    #[serde(default)]
    pub piid: Option<String>,
    #[serde(default)]
    pub fain: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub recipient: Option<RecipientRef>,
    #[serde(default)]
    pub awarding_agency: Option<EntityRef>,
}

impl AwardRef {
    /// First non-empty identifier among PIID, FAIN and URI, in that order.
    pub fn display_code(&self) -> Option<&str> {
        [&self.piid, &self.fain, &self.uri]
            .into_iter()
            .filter_map(|code| code.as_deref())
            .find(|code| !code.is_empty())
    }
}

/// Award-level financial account row; summed cumulatively through a quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardFinancialRow {
    pub submission: SubmissionPeriod,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub award: Option<AwardRef>,
    pub transaction_obligated_amount: Decimal,
}

/// Program activity / object class row; read for a single period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramActivityRow {
    pub submission: SubmissionPeriod,
    #[serde(default)]
    pub classification: Classification,
    pub obligations_incurred_by_program_object_class_cpe: Decimal,
}

/// One row of the authoritative control totals. Several rows may share a
/// fiscal year and period; the control total is their sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlTotalRow {
    pub fiscal_year: i32,
    pub fiscal_period: u32,
    pub obligations_incurred_total_cpe: Decimal,
}

/// Common view over both row kinds for filtering and grouping.
pub trait ReportedRow {
    fn submission(&self) -> &SubmissionPeriod;

    fn classification(&self) -> &Classification;

    fn award(&self) -> Option<&AwardRef> {
        None
    }

    fn amount(&self) -> Decimal;
}

impl ReportedRow for AwardFinancialRow {
    fn submission(&self) -> &SubmissionPeriod {
        &self.submission
    }

    fn classification(&self) -> &Classification {
        &self.classification
    }

    fn award(&self) -> Option<&AwardRef> {
        self.award.as_ref()
    }

    fn amount(&self) -> Decimal {
        self.transaction_obligated_amount
    }
}

impl ReportedRow for ProgramActivityRow {
    fn submission(&self) -> &SubmissionPeriod {
        &self.submission
    }

    fn classification(&self) -> &Classification {
        &self.classification
    }

    fn amount(&self) -> Decimal {
        self.obligations_incurred_by_program_object_class_cpe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportingScope {
    /// Every period from the start of the fiscal year through the quarter.
    ThroughQuarter(u32),
    /// Exactly one fiscal period.
    Period(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuery {
    pub fiscal_year: i32,
    pub scope: ReportingScope,
}

impl SourceQuery {
    pub fn cumulative(fiscal_year: i32, fiscal_quarter: u32) -> Self {
        Self {
            fiscal_year,
            scope: ReportingScope::ThroughQuarter(fiscal_quarter),
        }
    }

    pub fn period(fiscal_year: i32, fiscal_period: u32) -> Self {
        Self {
            fiscal_year,
            scope: ReportingScope::Period(fiscal_period),
        }
    }

    pub fn matches(&self, submission: &SubmissionPeriod) -> bool {
        if submission.reporting_fiscal_year != self.fiscal_year {
            return false;
        }

        match self.scope {
            ReportingScope::ThroughQuarter(quarter) => submission.reporting_fiscal_quarter <= quarter,
            ReportingScope::Period(period) => submission.reporting_fiscal_period == period,
        }
    }
}

/// Read-only access to the reported spending data. Implementations own
/// timeouts and retries; the engine never retries a failed query.
#[async_trait]
pub trait AggregateSource: Send + Sync {
    /// Award-level rows within the query's fiscal window.
    async fn award_financial_rows(&self, query: &SourceQuery) -> Result<Vec<AwardFinancialRow>>;

    /// Program activity / object class rows within the query's fiscal window.
    async fn program_activity_rows(&self, query: &SourceQuery) -> Result<Vec<ProgramActivityRow>>;

    /// Sum of the control totals for a fiscal year and period, or `None` when
    /// no control total row exists (distinct from a zero total).
    async fn control_total(&self, fiscal_year: i32, fiscal_period: u32) -> Result<Option<Decimal>>;
}

/// Source backed by rows held in memory, loadable from JSON. Counts every
/// query it serves.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InMemorySource {
    #[serde(default)]
    award_financial: Vec<AwardFinancialRow>,
    #[serde(default)]
    program_activity: Vec<ProgramActivityRow>,
    #[serde(default)]
    control_totals: Vec<ControlTotalRow>,
    #[serde(skip)]
    failure: Option<String>,
    #[serde(skip)]
    calls: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn with_award_financial(mut self, rows: impl IntoIterator<Item = AwardFinancialRow>) -> Self {
        self.award_financial.extend(rows);
        self
    }

    pub fn with_program_activity(mut self, rows: impl IntoIterator<Item = ProgramActivityRow>) -> Self {
        self.program_activity.extend(rows);
        self
    }

    pub fn with_control_total(mut self, fiscal_year: i32, fiscal_period: u32, amount: Decimal) -> Self {
        self.control_totals.push(ControlTotalRow {
            fiscal_year,
            fiscal_period,
            obligations_incurred_total_cpe: amount,
        });
        self
    }

    /// Makes every query fail with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of queries served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self, query: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(SpendingExplorerError::DataSource(format!(
                "{}: {}",
                query, message
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AggregateSource for InMemorySource {
    async fn award_financial_rows(&self, query: &SourceQuery) -> Result<Vec<AwardFinancialRow>> {
        self.record_call("award_financial_rows")?;

        let rows: Vec<AwardFinancialRow> = self
            .award_financial
            .iter()
            .filter(|row| query.matches(row.submission()))
            .cloned()
            .collect();
        debug!("In-memory award financial query {:?} matched {} rows", query, rows.len());
        Ok(rows)
    }

    async fn program_activity_rows(&self, query: &SourceQuery) -> Result<Vec<ProgramActivityRow>> {
        self.record_call("program_activity_rows")?;

        let rows: Vec<ProgramActivityRow> = self
            .program_activity
            .iter()
            .filter(|row| query.matches(row.submission()))
            .cloned()
            .collect();
        debug!("In-memory program activity query {:?} matched {} rows", query, rows.len());
        Ok(rows)
    }

    async fn control_total(&self, fiscal_year: i32, fiscal_period: u32) -> Result<Option<Decimal>> {
        self.record_call("control_total")?;

        Ok(self
            .control_totals
            .iter()
            .filter(|row| row.fiscal_year == fiscal_year && row.fiscal_period == fiscal_period)
            .map(|row| row.obligations_incurred_total_cpe)
            .fold(None, |total, amount| Some(total.unwrap_or(Decimal::ZERO) + amount)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_award_display_code_precedence() {
        let mut award = AwardRef {
            id: 1,
            piid: Some(String::new()),
            fain: Some("FAIN-1".to_string()),
            uri: Some("URI-1".to_string()),
            category: None,
            recipient: None,
            awarding_agency: None,
        };
        assert_eq!(award.display_code(), Some("FAIN-1"));

        award.piid = Some("PIID-1".to_string());
        assert_eq!(award.display_code(), Some("PIID-1"));

        award.piid = None;
        award.fain = None;
        assert_eq!(award.display_code(), Some("URI-1"));

        award.uri = None;
        assert_eq!(award.display_code(), None);
    }

    #[test]
    fn test_source_query_scopes() {
        let q1 = SubmissionPeriod::new(2020, 3);
        let q2 = SubmissionPeriod::new(2020, 6);
        let q3 = SubmissionPeriod::new(2020, 9);
        let other_year = SubmissionPeriod::new(2019, 6);

        let cumulative = SourceQuery::cumulative(2020, 2);
        assert!(cumulative.matches(&q1));
        assert!(cumulative.matches(&q2));
        assert!(!cumulative.matches(&q3));
        assert!(!cumulative.matches(&other_year));

        let period = SourceQuery::period(2020, 6);
        assert!(!period.matches(&q1));
        assert!(period.matches(&q2));
        assert!(!period.matches(&other_year));
    }

    #[tokio::test]
    async fn test_control_total_absent_is_distinct_from_zero() {
        let source = InMemorySource::new()
            .with_control_total(2020, 6, dec!(100))
            .with_control_total(2020, 6, dec!(40.5))
            .with_control_total(2020, 9, dec!(0));

        assert_eq!(source.control_total(2020, 6).await.unwrap(), Some(dec!(140.5)));
        assert_eq!(source.control_total(2020, 9).await.unwrap(), Some(dec!(0)));
        assert_eq!(source.control_total(2020, 3).await.unwrap(), None);
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_source_reports_data_source_error() {
        let source = InMemorySource::new().failing("connection reset");
        let err = source
            .program_activity_rows(&SourceQuery::period(2020, 6))
            .await
            .unwrap_err();

        assert!(matches!(err, SpendingExplorerError::DataSource(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "program_activity": [
                {
                    "submission": {
                        "reporting_fiscal_year": 2020,
                        "reporting_fiscal_quarter": 2,
                        "reporting_fiscal_period": 6
                    },
                    "classification": {
                        "object_class": { "id": 1, "code": "110", "name": "Personnel compensation" }
                    },
                    "obligations_incurred_by_program_object_class_cpe": 25.5
                }
            ],
            "control_totals": [
                { "fiscal_year": 2020, "fiscal_period": 6, "obligations_incurred_total_cpe": 30 }
            ]
        }"#;

        let source = InMemorySource::from_json_str(json).unwrap();
        assert_eq!(source.program_activity.len(), 1);
        assert_eq!(source.program_activity[0].amount(), dec!(25.5));
        assert!(source.award_financial.is_empty());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let source = InMemorySource::new()
            .with_program_activity(vec![ProgramActivityRow {
                submission: SubmissionPeriod::new(2020, 6),
                classification: Classification::default(),
                obligations_incurred_by_program_object_class_cpe: dec!(12.5),
            }])
            .with_control_total(2020, 6, dec!(20));

        let path = std::env::temp_dir().join(format!("spending_source_{}.json", std::process::id()));
        fs::write(&path, serde_json::to_string(&source).unwrap()).unwrap();
        let loaded = InMemorySource::from_path(&path);
        fs::remove_file(&path).unwrap();

        let loaded = loaded.unwrap();
        let rows = loaded.program_activity_rows(&SourceQuery::period(2020, 6)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].submission().reporting_fiscal_quarter, 2);
        assert_eq!(loaded.control_total(2020, 6).await.unwrap(), Some(dec!(20)));

        let missing = InMemorySource::from_path(path.with_extension("missing"));
        assert!(matches!(missing, Err(SpendingExplorerError::Io(_))));
    }
}
