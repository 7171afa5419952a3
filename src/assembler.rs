use crate::schema::{CategoryEntry, CategoryType, ExplorerResponse, FiscalWindow};
use log::debug;
use rust_decimal::Decimal;

/// Shapes aggregated results into the response envelope.
pub struct ResultAssembler;

impl ResultAssembler {
    /// Truncates award results to `limit`. Every other category is returned
    /// whole so that its entries still add up to the envelope total.
    pub fn apply_limit(category: CategoryType, results: &mut Vec<CategoryEntry>, limit: Option<usize>) {
        if category != CategoryType::Award {
            return;
        }

        if let Some(limit) = limit {
            if results.len() > limit {
                debug!("Truncating {} award results to {}", results.len(), limit);
                results.truncate(limit);
            }
        }
    }

    pub fn assemble(
        window: &FiscalWindow,
        total: Option<Decimal>,
        results: Vec<CategoryEntry>,
    ) -> ExplorerResponse {
        ExplorerResponse {
            total,
            end_date: Some(window.period_end_date),
            results: Some(results),
        }
    }

    pub fn unrevealed() -> ExplorerResponse {
        ExplorerResponse::unrevealed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn entries(category: CategoryType, count: usize) -> Vec<CategoryEntry> {
        (0..count)
            .map(|i| CategoryEntry {
                id: Some(i.to_string()),
                code: None,
                category_type: category,
                name: format!("Entry {}", i),
                amount: Some(Decimal::from(100 - i as i64)),
                account_number: None,
            })
            .collect()
    }

    #[test]
    fn test_limit_only_truncates_awards() {
        let mut awards = entries(CategoryType::Award, 5);
        ResultAssembler::apply_limit(CategoryType::Award, &mut awards, Some(2));
        assert_eq!(awards.len(), 2);
        assert_eq!(awards[0].id.as_deref(), Some("0"));

        let mut agencies = entries(CategoryType::Agency, 5);
        ResultAssembler::apply_limit(CategoryType::Agency, &mut agencies, Some(2));
        assert_eq!(agencies.len(), 5);

        let mut recipients = entries(CategoryType::Recipient, 5);
        ResultAssembler::apply_limit(CategoryType::Recipient, &mut recipients, Some(1));
        assert_eq!(recipients.len(), 5);

        let mut unlimited = entries(CategoryType::Award, 3);
        ResultAssembler::apply_limit(CategoryType::Award, &mut unlimited, None);
        assert_eq!(unlimited.len(), 3);
    }

    #[test]
    fn test_assemble_envelope() {
        let window = FiscalWindow {
            fiscal_year: 2020,
            fiscal_quarter: 2,
            period_end_date: NaiveDate::from_ymd_opt(2020, 3, 31).unwrap(),
            final_period: 6,
            revealed: true,
        };

        let response = ResultAssembler::assemble(&window, Some(dec!(199)), entries(CategoryType::Agency, 2));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["total"], json!(199.0));
        assert_eq!(value["end_date"], json!("2020-03-31"));
        assert_eq!(value["results"].as_array().unwrap().len(), 2);

        let empty = ResultAssembler::assemble(&window, None, Vec::new());
        let value = serde_json::to_value(&empty).unwrap();
        assert_eq!(value["total"], json!(null));
        assert_eq!(value["results"], json!([]));
    }

    #[test]
    fn test_unrevealed_envelope() {
        let value = serde_json::to_value(ResultAssembler::unrevealed()).unwrap();
        assert_eq!(value, json!({ "total": null }));
    }
}
