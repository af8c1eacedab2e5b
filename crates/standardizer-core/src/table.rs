//! Column-oriented table model.
//!
//! A [`Table`] is an ordered list of named columns of equal length. Column
//! lookups go through [`Table::column`], which answers with a [`ColumnId`]
//! handle when the schema has the column and `None` otherwise.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

static NULL_CELL: CellValue = CellValue::Null;

/// Datetime layouts accepted for text cells, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date layouts accepted for text cells, tried after [`DATETIME_FORMATS`].
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

/// Years outside this range in text are misreads (`0023-07-15`), not dates.
const TEXT_YEARS: std::ops::RangeInclusive<i32> = 1000..=9999;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Integer(i64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render the cell as text; `Null` renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(v) => format_number(*v),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Lenient date conversion. Anything that does not look like a date is `None`.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(dt) => Some(dt.date()),
            CellValue::Text(s) => parse_datetime_str(s).map(|dt| dt.date()),
            _ => None,
        }
    }

    /// Lenient numeric conversion. Non-numeric text and non-finite values are `None`.
    pub fn to_number(&self) -> Option<f64> {
        let value = match self {
            CellValue::Number(v) => *v,
            CellValue::Integer(i) => *i as f64,
            CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Parse a date or datetime string in one of the accepted layouts.
pub fn parse_datetime_str(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .or_else(|| partial_date(s))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .filter(|dt| TEXT_YEARS.contains(&dt.year()))
}

/// `YYYY-MM` (first of the month) or a bare `YYYY` (first of January).
fn partial_date(s: &str) -> Option<NaiveDate> {
    let digits = |part: &str, len: std::ops::RangeInclusive<usize>| {
        len.contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
    };
    let (year, month) = match s.split_once('-') {
        Some((y, m)) if digits(y, 4..=4) && digits(m, 1..=2) => (y, m.parse().ok()?),
        None if digits(s, 4..=4) => (s, 1),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year.parse().ok()?, month, 1)
}

/// Handle to a column of a specific [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(usize);

/// Ordered, named columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Vec<CellValue>>,
    index: HashMap<String, ColumnId>,
    rows: usize,
}

impl Table {
    /// Create an empty table with the given header.
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::with_rows(names, 0)
    }

    /// Create a table with `rows` all-null rows.
    pub fn with_rows<S: Into<String>>(names: impl IntoIterator<Item = S>, rows: usize) -> Self {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let columns = vec![vec![CellValue::Null; rows]; names.len()];
        let index = build_index(&names);
        Self {
            names,
            columns,
            index,
            rows,
        }
    }

    /// Create a table from row-major data. Short rows are padded with nulls,
    /// cells beyond the header are dropped.
    pub fn from_rows<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
        rows: Vec<Vec<CellValue>>,
    ) -> Self {
        let mut table = Self::with_rows(names, rows.len());
        for (r, row) in rows.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate().take(table.names.len()) {
                table.columns[c][r] = value;
            }
        }
        table
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Look up a column by name. With duplicate headers the first one wins.
    pub fn column(&self, name: &str) -> Option<ColumnId> {
        self.index.get(name).copied()
    }


    pub fn name(&self, id: ColumnId) -> &str {
        &self.names[id.0]
    }

    pub fn values(&self, id: ColumnId) -> &[CellValue] {
        &self.columns[id.0]
    }

    /// Cell at `row`, or `Null` past the end of the table.
    pub fn get(&self, row: usize, id: ColumnId) -> &CellValue {
        self.columns[id.0].get(row).unwrap_or(&NULL_CELL)
    }

    /// The first `rows` cells of a column, padded with nulls.
    pub fn aligned(&self, id: ColumnId, rows: usize) -> impl Iterator<Item = &CellValue> + '_ {
        (0..rows).map(move |r| self.get(r, id))
    }

    /// Iterate the cells of one row in column order.
    pub fn row(&self, row: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.columns.iter().map(move |col| col.get(row).unwrap_or(&NULL_CELL))
    }

    /// Replace a column's values, resized to the table's row count.
    pub fn set_column(&mut self, id: ColumnId, values: impl IntoIterator<Item = CellValue>) {
        let mut values: Vec<CellValue> = values.into_iter().take(self.rows).collect();
        values.resize(self.rows, CellValue::Null);
        self.columns[id.0] = values;
    }

    /// Set every row of a column to the same value.
    pub fn fill_column(&mut self, id: ColumnId, value: &CellValue) {
        self.columns[id.0] = vec![value.clone(); self.rows];
    }

    /// Non-null cell count per column name.
    pub fn non_null_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (name, column) in self.names.iter().zip(&self.columns) {
            counts
                .entry(name.clone())
                .or_insert_with(|| column.iter().filter(|v| !v.is_null()).count());
        }
        counts
    }

    /// A zero-row target grows to the source's row count (all null) so that
    /// column assignments have rows to land in. Otherwise unchanged.
    pub fn expanded_to(self, source: &Table) -> Table {
        if self.rows == 0 && source.rows > 0 {
            Table::with_rows(self.names, source.rows)
        } else {
            self
        }
    }
}

fn build_index(names: &[String]) -> HashMap<String, ColumnId> {
    let mut index = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        index.entry(name.clone()).or_insert(ColumnId(i));
    }
    index
}
