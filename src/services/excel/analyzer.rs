use std::collections::HashSet;

use indexmap::IndexMap;

use super::types::*;
use super::utils::coerce_number;

/// Structural checks over a sheet's rows. Never fails; ragged or empty
/// input is reported through the flags.
pub fn validate(rows: &[Record]) -> ValidationResult {
    let Some(first) = rows.first() else {
        return ValidationResult {
            has_data: false,
            has_headers: false,
            is_consistent: true,
        };
    };

    let expected = first.len();
    ValidationResult {
        has_data: true,
        has_headers: expected > 0,
        is_consistent: rows.iter().all(|row| row.len() == expected),
    }
}

/// Descriptive statistics for `header`, or `None` when the column holds no
/// values in any row.
///
/// A single value that does not coerce to a number puts the whole column on
/// the categorical branch.
pub fn column_statistics(rows: &[Record], header: &str) -> Option<ColumnStatistics> {
    let values: Vec<&CellValue> = rows
        .iter()
        .map(|row| row.value(header))
        .filter(|value| !value.is_missing())
        .collect();

    if values.is_empty() {
        return None;
    }

    let numbers: Option<Vec<f64>> = values.iter().map(|value| coerce_number(value)).collect();
    let stats = match numbers {
        Some(numbers) => ColumnStatistics::Numeric(summarize_numbers(&numbers)),
        None => ColumnStatistics::Categorical(summarize_categories(&values)),
    };
    Some(stats)
}

/// Statistics for every header of `sheet`, keyed by header.
pub fn describe_sheet(sheet: &NormalizedSheet) -> IndexMap<String, Option<ColumnStatistics>> {
    let start = std::time::Instant::now();
    let described: IndexMap<_, _> = sheet
        .headers()
        .iter()
        .map(|header| (header.clone(), column_statistics(sheet.data(), header)))
        .collect();
    tracing::debug!(
        "Described {} columns of sheet {} in {:?}",
        described.len(),
        sheet.sheet_name(),
        start.elapsed()
    );
    described
}

fn summarize_numbers(numbers: &[f64]) -> NumericSummary {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &n in numbers {
        min = min.min(n);
        max = max.max(n);
        sum += n;
    }

    NumericSummary {
        min,
        max,
        average: sum / numbers.len() as f64,
        sum,
        count: numbers.len(),
    }
}

fn summarize_categories(values: &[&CellValue]) -> CategoricalSummary {
    let mut seen: HashSet<&CellValue> = HashSet::new();
    let mut unique_values = Vec::new();
    for &value in values {
        if seen.insert(value) {
            unique_values.push(value.clone());
        }
    }

    CategoricalSummary {
        unique_values,
        count: values.len(),
        kind: SummaryKind::Categorical,
    }
}
