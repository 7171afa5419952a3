use crate::error::{Result, SpendingExplorerError};
use crate::schema::FiscalWindow;
use crate::utils::{get_final_period_of_quarter, is_valid_quarter, quarter_end_date};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Agencies have 45 days after a quarter closes to submit; the quarter's data
/// is published the day after that deadline.
pub const SUBMISSION_DEADLINE_DAYS: u64 = 45;

/// First fiscal year with quarterly agency submissions.
pub const FIRST_SUBMISSION_FISCAL_YEAR: i32 = 2017;

/// One row of the reveal schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionWindow {
    pub fiscal_year: i32,
    pub fiscal_quarter: u32,
    pub period_end_date: NaiveDate,
    /// Earliest instant at which the quarter's submissions may be compared
    /// publicly.
    pub reveal_date: DateTime<Utc>,
}

/// Fiscal calendar capability the engine depends on.
pub trait FiscalCalendar: Send + Sync {
    fn is_window_revealed(&self, fiscal_year: i32, fiscal_quarter: u32, now: DateTime<Utc>) -> bool;

    fn period_end_date(&self, fiscal_year: i32, fiscal_quarter: u32) -> Option<NaiveDate>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<SubmissionWindow>",
    into = "Vec<SubmissionWindow>"
)]
pub struct RevealSchedule {
    windows: BTreeMap<(i32, u32), SubmissionWindow>,
}

impl RevealSchedule {
    pub fn new(windows: Vec<SubmissionWindow>) -> Result<Self> {
        let mut schedule = BTreeMap::new();

        for window in windows {
            if !is_valid_quarter(window.fiscal_quarter) {
                return Err(SpendingExplorerError::Config(format!(
                    "Submission window for FY{} has quarter {}; must be between 1 and 4",
                    window.fiscal_year, window.fiscal_quarter
                )));
            }

            let key = (window.fiscal_year, window.fiscal_quarter);
            if schedule.insert(key, window).is_some() {
                return Err(SpendingExplorerError::Config(format!(
                    "Duplicate submission window for FY{} Q{}",
                    key.0, key.1
                )));
            }
        }

        Ok(Self { windows: schedule })
    }

    /// Builds the schedule implied by the standard 45-day submission deadline
    /// for every quarter of `first_fiscal_year..=last_fiscal_year`.
    pub fn standard(first_fiscal_year: i32, last_fiscal_year: i32) -> Self {
        let mut windows = BTreeMap::new();

        for fiscal_year in first_fiscal_year..=last_fiscal_year {
            for fiscal_quarter in 1..=4 {
                let Some(period_end_date) = quarter_end_date(fiscal_year, fiscal_quarter) else {
                    continue;
                };
                let Some(reveal_day) =
                    period_end_date.checked_add_days(Days::new(SUBMISSION_DEADLINE_DAYS + 1))
                else {
                    continue;
                };
                let Some(reveal_date) = reveal_day.and_hms_opt(0, 0, 0) else {
                    continue;
                };

                windows.insert(
                    (fiscal_year, fiscal_quarter),
                    SubmissionWindow {
                        fiscal_year,
                        fiscal_quarter,
                        period_end_date,
                        reveal_date: reveal_date.and_utc(),
                    },
                );
            }
        }

        Self { windows }
    }

    pub fn window(&self, fiscal_year: i32, fiscal_quarter: u32) -> Option<&SubmissionWindow> {
        self.windows.get(&(fiscal_year, fiscal_quarter))
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Latest quarter of `fiscal_year` whose data has been revealed as of `now`.
    pub fn last_completed_fiscal_quarter(&self, fiscal_year: i32, now: DateTime<Utc>) -> Option<u32> {
        self.windows
            .range((fiscal_year, 1)..=(fiscal_year, 4))
            .filter(|(_, window)| window.reveal_date <= now)
            .map(|(&(_, quarter), _)| quarter)
            .max()
    }
}

impl TryFrom<Vec<SubmissionWindow>> for RevealSchedule {
    type Error = SpendingExplorerError;

    fn try_from(windows: Vec<SubmissionWindow>) -> Result<Self> {
        Self::new(windows)
    }
}

impl From<RevealSchedule> for Vec<SubmissionWindow> {
    fn from(schedule: RevealSchedule) -> Self {
        schedule.windows.into_values().collect()
    }
}

impl FiscalCalendar for RevealSchedule {
    fn is_window_revealed(&self, fiscal_year: i32, fiscal_quarter: u32, now: DateTime<Utc>) -> bool {
        self.window(fiscal_year, fiscal_quarter)
            .is_some_and(|window| window.reveal_date <= now)
    }

    fn period_end_date(&self, fiscal_year: i32, fiscal_quarter: u32) -> Option<NaiveDate> {
        self.window(fiscal_year, fiscal_quarter)
            .map(|window| window.period_end_date)
    }
}

/// Resolves the fiscal window for a year and quarter. Returns `None` when the
/// quarter has no schedule entry or has not been revealed yet; callers treat
/// that as "no comparison possible" rather than an error.
pub fn resolve_fiscal_window(
    calendar: &dyn FiscalCalendar,
    fiscal_year: i32,
    fiscal_quarter: u32,
    now: DateTime<Utc>,
) -> Option<FiscalWindow> {
    if !calendar.is_window_revealed(fiscal_year, fiscal_quarter, now) {
        return None;
    }

    Some(FiscalWindow {
        fiscal_year,
        fiscal_quarter,
        period_end_date: calendar.period_end_date(fiscal_year, fiscal_quarter)?,
        final_period: get_final_period_of_quarter(fiscal_quarter)?,
        revealed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_standard_schedule_reveal_boundaries() {
        let schedule = RevealSchedule::standard(2000, 2000);
        assert_eq!(schedule.len(), 4);

        let last = |now| schedule.last_completed_fiscal_quarter(2000, now);
        assert_eq!(last(at(1999, 10, 1)), None);
        assert_eq!(last(at(2000, 2, 14)), None);
        assert_eq!(last(at(2000, 2, 15)), Some(1));
        assert_eq!(last(at(2000, 5, 15)), Some(1));
        assert_eq!(last(at(2000, 5, 16)), Some(2));
        assert_eq!(last(at(2000, 8, 1)), Some(2));
        assert_eq!(last(at(2000, 9, 1)), Some(3));
        assert_eq!(last(at(2000, 11, 1)), Some(3));
        assert_eq!(last(at(2000, 12, 1)), Some(4));
        assert_eq!(last(at(2001, 3, 1)), Some(4));

        assert_eq!(schedule.last_completed_fiscal_quarter(2010, at(2001, 3, 1)), None);
    }

    #[test]
    fn test_resolve_revealed_window() {
        let schedule = RevealSchedule::standard(2020, 2020);

        for quarter in 1..=4 {
            let window = resolve_fiscal_window(&schedule, 2020, quarter, at(2021, 1, 1)).unwrap();
            assert_eq!(window.final_period, 3 * quarter);
            assert!(window.revealed);
        }

        let window = resolve_fiscal_window(&schedule, 2020, 2, at(2021, 1, 1)).unwrap();
        assert_eq!(window.period_end_date, NaiveDate::from_ymd_opt(2020, 3, 31).unwrap());
    }

    #[test]
    fn test_resolve_unrevealed_or_missing_window() {
        let schedule = RevealSchedule::standard(2020, 2020);

        assert!(resolve_fiscal_window(&schedule, 2020, 4, at(2020, 11, 14)).is_none());
        assert!(resolve_fiscal_window(&schedule, 2021, 1, at(2030, 1, 1)).is_none());
    }

    #[test]
    fn test_schedule_rejects_duplicates_and_bad_quarters() {
        let window = SubmissionWindow {
            fiscal_year: 2020,
            fiscal_quarter: 2,
            period_end_date: NaiveDate::from_ymd_opt(2020, 3, 31).unwrap(),
            reveal_date: at(2020, 5, 16),
        };

        let duplicate = RevealSchedule::new(vec![window.clone(), window.clone()]);
        assert!(matches!(duplicate, Err(SpendingExplorerError::Config(_))));

        let bad_quarter = RevealSchedule::new(vec![SubmissionWindow {
            fiscal_quarter: 5,
            ..window
        }]);
        assert!(matches!(bad_quarter, Err(SpendingExplorerError::Config(_))));
    }

    #[test]
    fn test_schedule_serializes_as_window_list() {
        let schedule = RevealSchedule::standard(2021, 2021);
        let json = serde_json::to_string(&schedule).unwrap();
        assert!(json.starts_with('['));

        let restored: RevealSchedule = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, schedule);
    }
}
