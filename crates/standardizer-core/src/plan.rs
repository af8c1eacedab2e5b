//! Mapping plan types.
//!
//! A plan is the structured document a language model returns:
//!
//! ```json
//! {
//!   "mappings": [
//!     {"op": "copy", "source": "Manuscript DOI", "target": "Article DOI"},
//!     {"op": "numeric_copy", "source": "Retail Price", "target": "APC", "decimals": 2}
//!   ],
//!   "notes": ["assumed APC is the retail price"]
//! }
//! ```
//!
//! Every entry of `mappings` is decoded on its own, so one malformed or unknown
//! entry never takes the rest of the plan down with it.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::table::CellValue;

/// Source and target column of a single-column operation.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ColumnMap {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Join several source columns into one target column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConcatSpec {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub target: Option<String>,
}

/// Parse a column as a number and round it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NumericSpec {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimals")]
    pub decimals: Option<i32>,
}

impl NumericSpec {
    pub const DEFAULT_DECIMALS: i32 = 2;

    pub fn decimals(&self) -> i32 {
        self.decimals.unwrap_or(Self::DEFAULT_DECIMALS)
    }
}

/// Write a literal into every row of the target column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConstFill {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub target: Option<String>,
}

impl ConstFill {
    /// The literal as a cell. Strings stay text, integral numbers become integers.
    pub fn cell(&self) -> CellValue {
        match &self.value {
            Value::Null => CellValue::Null,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(CellValue::Integer)
                .or_else(|| n.as_f64().map(CellValue::Number))
                .unwrap_or(CellValue::Null),
            Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }
}

fn default_separator() -> String {
    " ".to_string()
}

/// Accepts `2`, `2.0` and `"2"` for the rounding precision.
fn lenient_decimals<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|d| i32::try_from(d).ok())
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid decimals: {}", value)))
}

/// One mapping operation of the fixed vocabulary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Copy(ColumnMap),
    Concat(ConcatSpec),
    DateCopy(ColumnMap),
    CalendarYear(ColumnMap),
    FiscalYearJulyJune(ColumnMap),
    NumericCopy(NumericSpec),
    FillConst(ConstFill),
}

impl Operation {
    /// Every `op` tag the executor understands.
    pub const KINDS: &'static [&'static str] = &[
        "copy",
        "concat",
        "date_copy",
        "calendar_year",
        "fiscal_year_july_june",
        "numeric_copy",
        "fill_const",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Copy(_) => "copy",
            Operation::Concat(_) => "concat",
            Operation::DateCopy(_) => "date_copy",
            Operation::CalendarYear(_) => "calendar_year",
            Operation::FiscalYearJulyJune(_) => "fiscal_year_july_june",
            Operation::NumericCopy(_) => "numeric_copy",
            Operation::FillConst(_) => "fill_const",
        }
    }

    /// The ideal column the operation writes, if one was given.
    pub fn target(&self) -> Option<&str> {
        match self {
            Operation::Copy(m)
            | Operation::DateCopy(m)
            | Operation::CalendarYear(m)
            | Operation::FiscalYearJulyJune(m) => m.target.as_deref(),
            Operation::Concat(c) => c.target.as_deref(),
            Operation::NumericCopy(n) => n.target.as_deref(),
            Operation::FillConst(f) => f.target.as_deref(),
        }
    }
}

/// A decoded `mappings` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanEntry {
    /// A well-formed operation.
    Op(Operation),
    /// An `op` tag outside the vocabulary (or none at all).
    Unknown { op: Option<String> },
    /// A known `op` whose fields could not be decoded, or a non-object entry.
    Malformed { op: Option<String>, error: String },
}

impl PlanEntry {
    fn decode(value: Value) -> Self {
        if !value.is_object() {
            return PlanEntry::Malformed {
                op: None,
                error: format!("mapping entry must be an object, got {}", json_type(&value)),
            };
        }

        let op = match value.get("op") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        match op.as_deref() {
            Some(kind) if Operation::KINDS.contains(&kind) => {
                match serde_json::from_value::<Operation>(value) {
                    Ok(operation) => PlanEntry::Op(operation),
                    Err(e) => PlanEntry::Malformed {
                        op,
                        error: e.to_string(),
                    },
                }
            }
            _ => PlanEntry::Unknown { op },
        }
    }
}

/// An ordered list of mapping operations plus free-text notes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Plan {
    pub mappings: Vec<PlanEntry>,
    pub notes: Vec<String>,
}

impl Plan {
    /// Parse a plan from JSON text.
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CoreError::PlanParse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a plan from an already parsed JSON document. Anything other than
    /// an object is an empty plan.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        let Value::Object(mut doc) = value else {
            return Ok(Self::default());
        };

        let mappings = match doc.remove("mappings") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.into_iter().map(PlanEntry::decode).collect(),
            Some(other) => {
                return Err(CoreError::PlanParse(format!(
                    "\"mappings\" must be a list, got {}",
                    json_type(&other)
                )))
            }
        };

        let notes = match doc.remove("notes") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|note| match note {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self { mappings, notes })
    }

    /// Number of mapping entries, decodable or not.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
