use chrono::{Datelike, NaiveDate};

/// Calendar month in which the federal fiscal year starts (October).
pub const FISCAL_YEAR_START_MONTH: u32 = 10;

pub const MIN_CALENDAR_YEAR: i32 = 1;
pub const MAX_CALENDAR_YEAR: i32 = 9999;

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Federal fiscal year a date belongs to. October through December roll into
/// the following fiscal year.
pub fn generate_fiscal_year(date: NaiveDate) -> i32 {
    if date.month() >= FISCAL_YEAR_START_MONTH {
        date.year() + 1
    } else {
        date.year()
    }
}

/// Fiscal month of a date, October = 1 through September = 12.
pub fn generate_fiscal_month(date: NaiveDate) -> u32 {
    (date.month() + 12 - FISCAL_YEAR_START_MONTH) % 12 + 1
}

pub fn generate_fiscal_quarter(date: NaiveDate) -> u32 {
    (generate_fiscal_month(date) + 2) / 3
}

/// Formats a date's fiscal year and quarter, e.g. `2020-Q2`.
pub fn generate_fiscal_year_and_quarter(date: NaiveDate) -> String {
    format!(
        "{}-Q{}",
        generate_fiscal_year(date),
        generate_fiscal_quarter(date)
    )
}

/// First and last calendar day of a fiscal year.
pub fn fiscal_year_bounds(fiscal_year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(fiscal_year - 1, FISCAL_YEAR_START_MONTH, 1)?;
    let end = NaiveDate::from_ymd_opt(fiscal_year, FISCAL_YEAR_START_MONTH - 1, 30)?;
    Some((start, end))
}

pub fn dates_are_fiscal_year_bookends(start: NaiveDate, end: NaiveDate) -> bool {
    start.month() == FISCAL_YEAR_START_MONTH
        && start.day() == 1
        && end.month() == FISCAL_YEAR_START_MONTH - 1
        && end.day() == 30
        && generate_fiscal_year(start) <= generate_fiscal_year(end)
}

pub fn is_valid_quarter(quarter: u32) -> bool {
    (1..=4).contains(&quarter)
}

/// Reportable fiscal periods. Period 1 is never submitted on its own; it is
/// rolled into period 2.
pub fn is_valid_period(period: u32) -> bool {
    (2..=12).contains(&period)
}

pub fn is_valid_year(year: i32) -> bool {
    (MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&year)
}

pub fn get_final_period_of_quarter(quarter: u32) -> Option<u32> {
    is_valid_quarter(quarter).then_some(quarter * 3)
}

pub fn is_final_period_of_quarter(period: u32, quarter: u32) -> bool {
    is_valid_period(period) && get_final_period_of_quarter(quarter) == Some(period)
}

pub fn get_periods_in_quarter(quarter: u32) -> Option<Vec<u32>> {
    let last = get_final_period_of_quarter(quarter)?;
    let first = (last - 2).max(2);
    Some((first..=last).collect())
}

pub fn get_quarter_from_period(period: u32) -> Option<u32> {
    is_valid_period(period).then_some((period + 2) / 3)
}

/// Calendar date on which a fiscal quarter ends.
pub fn quarter_end_date(fiscal_year: i32, fiscal_quarter: u32) -> Option<NaiveDate> {
    let final_period = get_final_period_of_quarter(fiscal_quarter)?;
    let calendar_month = (final_period + FISCAL_YEAR_START_MONTH - 2) % 12 + 1;
    let calendar_year = if calendar_month >= FISCAL_YEAR_START_MONTH {
        fiscal_year - 1
    } else {
        fiscal_year
    };
    last_day_of_month(calendar_year, calendar_month)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2023, 2), Some(date(2023, 2, 28)));
        assert_eq!(last_day_of_month(2024, 2), Some(date(2024, 2, 29)));
        assert_eq!(last_day_of_month(2023, 12), Some(date(2023, 12, 31)));
        assert_eq!(last_day_of_month(2023, 13), None);
    }

    #[test]
    fn test_generate_fiscal_year() {
        assert_eq!(generate_fiscal_year(date(2000, 9, 30)), 2000);
        assert_eq!(generate_fiscal_year(date(2001, 10, 1)), 2002);
        assert_eq!(generate_fiscal_year(date(2020, 3, 2)), 2020);
        assert_eq!(generate_fiscal_year(date(2019, 10, 30)), 2020);
    }

    #[test]
    fn test_generate_fiscal_month_and_quarter() {
        assert_eq!(generate_fiscal_month(date(2000, 9, 30)), 12);
        assert_eq!(generate_fiscal_month(date(2001, 10, 1)), 1);
        assert_eq!(generate_fiscal_month(date(2020, 3, 2)), 6);
        assert_eq!(generate_fiscal_month(date(2017, 5, 30)), 8);

        assert_eq!(generate_fiscal_quarter(date(2000, 9, 30)), 4);
        assert_eq!(generate_fiscal_quarter(date(2001, 10, 1)), 1);
        assert_eq!(generate_fiscal_quarter(date(2020, 3, 2)), 2);
        assert_eq!(generate_fiscal_quarter(date(2017, 5, 30)), 3);

        assert_eq!(generate_fiscal_year_and_quarter(date(2019, 10, 30)), "2020-Q1");
        assert_eq!(generate_fiscal_year_and_quarter(date(2000, 9, 30)), "2000-Q4");
    }

    #[test]
    fn test_fiscal_year_bookends() {
        let (start, end) = fiscal_year_bounds(2000).unwrap();
        assert_eq!(start, date(1999, 10, 1));
        assert_eq!(end, date(2000, 9, 30));

        assert!(dates_are_fiscal_year_bookends(date(1998, 10, 1), date(2000, 9, 30)));
        assert!(!dates_are_fiscal_year_bookends(date(2000, 9, 30), date(2001, 10, 1)));
        assert!(!dates_are_fiscal_year_bookends(date(2001, 10, 1), date(2017, 5, 30)));
    }

    #[test]
    fn test_period_and_quarter_validation() {
        assert!(is_valid_period(2));
        assert!(is_valid_period(12));
        assert!(!is_valid_period(1));
        assert!(!is_valid_period(13));

        assert!(is_valid_quarter(1));
        assert!(is_valid_quarter(4));
        assert!(!is_valid_quarter(0));
        assert!(!is_valid_quarter(5));

        assert!(is_valid_year(1999));
        assert!(!is_valid_year(0));
        assert!(!is_valid_year(10000));
    }

    #[test]
    fn test_final_period_of_quarter() {
        assert_eq!(get_final_period_of_quarter(1), Some(3));
        assert_eq!(get_final_period_of_quarter(4), Some(12));
        assert_eq!(get_final_period_of_quarter(5), None);

        assert!(is_final_period_of_quarter(6, 2));
        assert!(!is_final_period_of_quarter(2, 1));
        assert!(!is_final_period_of_quarter(3, 0));
    }

    #[test]
    fn test_periods_in_quarter() {
        assert_eq!(get_periods_in_quarter(1), Some(vec![2, 3]));
        assert_eq!(get_periods_in_quarter(2), Some(vec![4, 5, 6]));
        assert_eq!(get_periods_in_quarter(4), Some(vec![10, 11, 12]));
        assert_eq!(get_periods_in_quarter(0), None);

        assert_eq!(get_quarter_from_period(2), Some(1));
        assert_eq!(get_quarter_from_period(7), Some(3));
        assert_eq!(get_quarter_from_period(1), None);
        assert_eq!(get_quarter_from_period(13), None);
    }

    #[test]
    fn test_quarter_end_date() {
        assert_eq!(quarter_end_date(2020, 1), Some(date(2019, 12, 31)));
        assert_eq!(quarter_end_date(2020, 2), Some(date(2020, 3, 31)));
        assert_eq!(quarter_end_date(2020, 3), Some(date(2020, 6, 30)));
        assert_eq!(quarter_end_date(2020, 4), Some(date(2020, 9, 30)));
        assert_eq!(quarter_end_date(2020, 5), None);
    }
}
