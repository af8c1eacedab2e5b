//! Row-level value transforms shared by the plan executor and the fallback rules.

use chrono::{Datelike, NaiveDate};

use crate::table::{CellValue, ColumnId, Table};

/// July through December belong to the next fiscal year.
pub fn fiscal_year_july_june(date: NaiveDate) -> i32 {
    if date.month() >= 7 {
        date.year() + 1
    } else {
        date.year()
    }
}

/// Round half away from zero. Negative precision rounds to tens, hundreds, ...
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    if factor == 0.0 {
        // precision coarser than any finite f64
        return 0.0;
    }
    let rounded = (value * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        value
    }
}

/// Join trimmed parts, re-trimming after every join. Blank results are `Null`.
pub fn join_trimmed<'a>(parts: impl IntoIterator<Item = &'a CellValue>, separator: &str) -> CellValue {
    let mut parts = parts.into_iter().map(|v| v.to_text().trim().to_string());
    let Some(mut joined) = parts.next() else {
        return CellValue::Null;
    };
    for part in parts {
        joined = format!("{joined}{separator}{part}").trim().to_string();
    }
    if joined.trim().is_empty() {
        CellValue::Null
    } else {
        CellValue::Text(joined)
    }
}

/// Verbatim copy of a source column at the given row count.
pub fn copied(raw: &Table, source: ColumnId, rows: usize) -> Vec<CellValue> {
    raw.aligned(source, rows).cloned().collect()
}

/// Row-wise join of several source columns.
pub fn concatenated(raw: &Table, sources: &[ColumnId], separator: &str, rows: usize) -> Vec<CellValue> {
    (0..rows)
        .map(|r| join_trimmed(sources.iter().map(|&id| raw.get(r, id)), separator))
        .collect()
}

/// Parsed dates of a source column; unparseable cells are `None`.
pub fn parsed_dates(raw: &Table, source: ColumnId, rows: usize) -> Vec<Option<NaiveDate>> {
    raw.aligned(source, rows).map(CellValue::to_date).collect()
}

pub fn date_cells(dates: &[Option<NaiveDate>]) -> Vec<CellValue> {
    dates.iter().map(|d| CellValue::from(*d)).collect()
}

pub fn calendar_year_cells(dates: &[Option<NaiveDate>]) -> Vec<CellValue> {
    dates
        .iter()
        .map(|d| CellValue::from(d.map(|d| i64::from(d.year()))))
        .collect()
}

pub fn fiscal_year_cells(dates: &[Option<NaiveDate>]) -> Vec<CellValue> {
    dates
        .iter()
        .map(|d| CellValue::from(d.map(|d| i64::from(fiscal_year_july_june(d)))))
        .collect()
}

/// Numeric parse plus rounding; unparseable cells become `Null`.
pub fn rounded_numbers(raw: &Table, source: ColumnId, decimals: i32, rows: usize) -> Vec<CellValue> {
    raw.aligned(source, rows)
        .map(|v| CellValue::from(v.to_number().map(|n| round_to(n, decimals))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fiscal_year_boundary() {
        assert_eq!(fiscal_year_july_june(date(2023, 7, 15)), 2024);
        assert_eq!(fiscal_year_july_june(date(2023, 6, 15)), 2023);
        assert_eq!(fiscal_year_july_june(date(2023, 7, 1)), 2024);
        assert_eq!(fiscal_year_july_june(date(2023, 12, 31)), 2024);
        assert_eq!(fiscal_year_july_june(date(2024, 1, 1)), 2024);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(12.344, 2), 12.34);
        assert_eq!(round_to(12.346, 2), 12.35);
        assert_eq!(round_to(1234.5, 0), 1235.0);
        assert_eq!(round_to(1234.0, -2), 1200.0);
        assert_eq!(round_to(1234.5, -400), 0.0);
        assert_eq!(round_to(1234.5, 400), 1234.5);
    }

    #[test]
    fn test_join_trimmed() {
        let jane = CellValue::from("Jane");
        assert_eq!(join_trimmed([&jane, &CellValue::Null], " "), CellValue::from("Jane"));
        assert_eq!(
            join_trimmed([&CellValue::from(" Jane "), &CellValue::from(" Doe")], " "),
            CellValue::from("Jane Doe")
        );
        assert_eq!(join_trimmed([&CellValue::Null, &CellValue::from("  ")], " "), CellValue::Null);
        assert_eq!(
            join_trimmed([&CellValue::Null, &CellValue::from("Doe")], ", "),
            CellValue::from(", Doe")
        );
    }

    #[test]
    fn test_year_cells_propagate_null() {
        let dates = vec![Some(date(2023, 7, 15)), None, Some(date(2023, 6, 15))];
        assert_eq!(
            fiscal_year_cells(&dates),
            vec![CellValue::Integer(2024), CellValue::Null, CellValue::Integer(2023)]
        );
        assert_eq!(
            calendar_year_cells(&dates),
            vec![CellValue::Integer(2023), CellValue::Null, CellValue::Integer(2023)]
        );
    }
}
