//! Excel workbook codec.
//!
//! Reads the first worksheet of a workbook into a [`Table`] (first row is the
//! header) and writes a [`Table`] back out as a single-sheet xlsx file.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};

use crate::error::{CoreError, CoreResult};
use crate::table::{parse_datetime_str, CellValue, Table};

/// Name of the sheet written by [`write_workbook`].
pub const OUTPUT_SHEET: &str = "Sheet1";

/// Excel's column limit.
const MAX_COLUMNS: usize = 16_384;

/// Excel's per-cell text limit, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Decode the first worksheet of an xlsx/xls/ods file.
pub fn read_workbook(bytes: &[u8]) -> CoreResult<Table> {
    let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = sheets
        .worksheet_range_at(0)
        .ok_or_else(|| CoreError::WorkbookRead("workbook has no worksheets".to_string()))??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::new(Vec::<String>::new()));
    };

    let names: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, cell)| header_name(i, cell))
        .collect();

    let mut data: Vec<Vec<CellValue>> = rows
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    while data
        .last()
        .is_some_and(|row| row.iter().all(CellValue::is_null))
    {
        data.pop();
    }

    Ok(Table::from_rows(names, data))
}

fn header_name(index: usize, cell: &Data) -> String {
    let name = match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => cell_value(other).to_text(),
    };
    if name.is_empty() {
        format!("Unnamed: {}", index)
    } else {
        name
    }
}

/// Map a calamine cell onto the table's value model.
pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Integer(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_datetime_str(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Encode a table as a single-sheet xlsx file with a bold header row.
pub fn write_workbook(table: &Table) -> CoreResult<Vec<u8>> {
    if table.column_count() > MAX_COLUMNS {
        return Err(CoreError::WorkbookWrite(format!(
            "{} columns exceed the worksheet limit of {}",
            table.column_count(),
            MAX_COLUMNS
        )));
    }

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let sheet = workbook.add_worksheet();
    sheet.set_name(OUTPUT_SHEET)?;

    for (col, name) in table.column_names().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, cell_text(name), &header_format)?;
    }

    for r in 0..table.row_count() {
        let row = u32::try_from(r + 1)
            .map_err(|_| CoreError::WorkbookWrite(format!("row {} is out of range", r + 1)))?;
        for (col, value) in table.row(r).enumerate() {
            let col = col as u16;
            match value {
                CellValue::Null => {}
                CellValue::Text(s) => {
                    sheet.write_string(row, col, cell_text(s))?;
                }
                CellValue::Number(v) => {
                    sheet.write_number(row, col, *v)?;
                }
                CellValue::Integer(i) => {
                    sheet.write_number(row, col, *i as f64)?;
                }
                CellValue::Bool(b) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                CellValue::Date(d) => {
                    sheet.write_datetime_with_format(row, col, d, &date_format)?;
                }
                CellValue::DateTime(dt) => {
                    sheet.write_datetime_with_format(row, col, dt, &datetime_format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Text cut to [`MAX_CELL_CHARS`]; longer cells cannot be stored.
fn cell_text(s: &str) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => {
            tracing::warn!(chars = s.chars().count(), limit = MAX_CELL_CHARS, "Truncating oversized cell text");
            &s[..idx]
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_written_workbook_reads_back() {
        let table = Table::from_rows(
            ["Title", "APC", "Year", "Published", "Empty"],
            vec![
                vec![
                    "On Things".into(),
                    CellValue::Number(12.35),
                    CellValue::Integer(2024),
                    NaiveDate::from_ymd_opt(2023, 7, 15).into(),
                    CellValue::Null,
                ],
                vec![
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                ],
                vec![
                    "Last".into(),
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                    CellValue::Null,
                ],
            ],
        );

        let bytes = write_workbook(&table).unwrap();
        let back = read_workbook(&bytes).unwrap();

        assert_eq!(back.column_names(), table.column_names());
        assert_eq!(back.row_count(), 3);

        let published = back.column("Published").unwrap();
        assert_eq!(
            back.get(0, published).to_date(),
            NaiveDate::from_ymd_opt(2023, 7, 15)
        );
        let apc = back.column("APC").unwrap();
        assert_eq!(back.get(0, apc).to_number(), Some(12.35));
        assert!(back.get(1, apc).is_null());
    }

    #[test]
    fn test_oversized_text_is_truncated() {
        let long = "é".repeat(MAX_CELL_CHARS + 5_000);
        let table = Table::from_rows(["Name"], vec![vec![long.as_str().into()]]);

        let bytes = write_workbook(&table).unwrap();
        let back = read_workbook(&bytes).unwrap();
        let name = back.column("Name").unwrap();
        assert_eq!(back.get(0, name).to_text().chars().count(), MAX_CELL_CHARS);
    }

    #[test]
    fn test_header_only_workbook() {
        let bytes = write_workbook(&Table::new(["A", "B"])).unwrap();
        let back = read_workbook(&bytes).unwrap();
        assert_eq!(back.column_names(), &["A".to_string(), "B".to_string()]);
        assert_eq!(back.row_count(), 0);
    }

    #[test]
    fn test_unreadable_bytes() {
        assert!(matches!(
            read_workbook(b"definitely not a spreadsheet"),
            Err(CoreError::WorkbookRead(_))
        ));
    }

    #[test]
    fn test_blank_headers_get_placeholder_names() {
        assert_eq!(header_name(3, &Data::Empty), "Unnamed: 3");
        assert_eq!(header_name(0, &Data::String(" DOI ".into())), "DOI");
    }
}
