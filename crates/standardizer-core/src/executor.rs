//! Deterministic plan executor.
//!
//! Interprets a [`Plan`] against a raw table and the ideal (target) table.
//! The executor never fails as a whole: every entry yields exactly one step
//! line, in plan order, whether it was applied, skipped or rejected.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::plan::{ColumnMap, ConcatSpec, ConstFill, NumericSpec, Operation, Plan, PlanEntry};
use crate::table::{CellValue, ColumnId, Table};
use crate::transforms;

/// Output of a plan or rule-set run.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// The populated target table. Same columns as the input target.
    pub table: Table,
    /// One human-readable line per attempted step.
    pub steps: Vec<String>,
}

/// A column reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Missing {
    Raw(Option<String>),
    Ideal(Option<String>),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (side, name) = match self {
            Missing::Raw(name) => ("raw", name),
            Missing::Ideal(name) => ("ideal", name),
        };
        match name {
            Some(name) => write!(f, "missing {} column \"{}\"", side, name),
            None => write!(f, "missing {} column (none given)", side),
        }
    }
}

fn raw_column(raw: &Table, name: &Option<String>) -> Result<ColumnId, Missing> {
    name.as_deref()
        .and_then(|n| raw.column(n))
        .ok_or_else(|| Missing::Raw(name.clone()))
}

fn ideal_column(ideal: &Table, name: &Option<String>) -> Result<ColumnId, Missing> {
    name.as_deref()
        .and_then(|n| ideal.column(n))
        .ok_or_else(|| Missing::Ideal(name.clone()))
}

fn quoted(name: &Option<String>) -> String {
    match name {
        Some(name) => format!("\"{}\"", name),
        None => "None".to_string(),
    }
}

/// Execute `plan`, returning the populated table and the step log.
///
/// A zero-row ideal table is first expanded to the raw table's row count.
pub fn execute_plan(plan: &Plan, raw: &Table, ideal: &Table) -> Execution {
    let mut table = ideal.clone().expanded_to(raw);
    let mut steps = Vec::with_capacity(plan.len());

    for entry in &plan.mappings {
        let line = match entry {
            PlanEntry::Op(op) => match apply_operation(op, raw, &mut table) {
                Ok(line) => line,
                Err(e) => {
                    warn!(op = op.kind(), target = ?op.target(), error = %e, "Plan operation failed");
                    format!("[PLAN_APPLY_ERROR] {}", e.detail())
                }
            },
            PlanEntry::Unknown { op } => {
                let op = op.as_deref().unwrap_or("None");
                debug!(op, "Unknown plan operation");
                format!("Unknown op '{}' skipped", op)
            }
            PlanEntry::Malformed { op, error } => {
                warn!(op = ?op, error = %error, "Malformed plan entry");
                format!("[PLAN_APPLY_ERROR] {}", error)
            }
        };
        steps.push(line);
    }

    Execution { table, steps }
}

/// Apply one operation. `Ok` carries the step line for both applied and
/// skipped operations; `Err` is reserved for operations that cannot run at all.
fn apply_operation(op: &Operation, raw: &Table, table: &mut Table) -> CoreResult<String> {
    let kind = op.kind();
    let line = match op {
        Operation::Copy(map) => map_single(map, kind, raw, table, transforms::copied, |s, t| {
            format!("Mapped {} → {}", s, t)
        }),
        Operation::DateCopy(map) => map_single(
            map,
            kind,
            raw,
            table,
            |raw, src, rows| transforms::date_cells(&transforms::parsed_dates(raw, src, rows)),
            |s, t| format!("Date copy {} → {}", s, t),
        ),
        Operation::CalendarYear(map) => map_single(
            map,
            kind,
            raw,
            table,
            |raw, src, rows| transforms::calendar_year_cells(&transforms::parsed_dates(raw, src, rows)),
            |s, t| format!("Calendar Year from {} → {}", s, t),
        ),
        Operation::FiscalYearJulyJune(map) => map_single(
            map,
            kind,
            raw,
            table,
            |raw, src, rows| transforms::fiscal_year_cells(&transforms::parsed_dates(raw, src, rows)),
            |s, t| format!("Fiscal Year (July–June) from {} → {}", s, t),
        ),
        Operation::NumericCopy(spec) => numeric_copy(spec, raw, table),
        Operation::Concat(spec) => concat(spec, raw, table)?,
        Operation::FillConst(fill) => fill_const(fill, table),
    };
    debug!(op = kind, step = %line, "Plan step");
    Ok(line)
}

/// Resolve a source/target pair and write `derive(raw, source, rows)` into the target.
fn map_single(
    map: &ColumnMap,
    kind: &str,
    raw: &Table,
    table: &mut Table,
    derive: impl FnOnce(&Table, ColumnId, usize) -> Vec<CellValue>,
    applied: impl FnOnce(&str, &str) -> String,
) -> String {
    let source = quoted(&map.source);
    let target = quoted(&map.target);
    let resolved = raw_column(raw, &map.source)
        .and_then(|src| ideal_column(table, &map.target).map(|tgt| (src, tgt)));

    match resolved {
        Ok((src, tgt)) => {
            let values = derive(raw, src, table.row_count());
            table.set_column(tgt, values);
            applied(&source, &target)
        }
        Err(missing) => format!("Skipped {} {}→{} ({})", kind, source, target, missing),
    }
}

fn numeric_copy(spec: &NumericSpec, raw: &Table, table: &mut Table) -> String {
    let decimals = spec.decimals();
    let resolved = raw_column(raw, &spec.source)
        .and_then(|src| ideal_column(table, &spec.target).map(|tgt| (src, tgt)));

    match resolved {
        Ok((source, target)) => {
            let values = transforms::rounded_numbers(raw, source, decimals, table.row_count());
            table.set_column(target, values);
            format!(
                "Numeric copy {} → {} (round {})",
                quoted(&spec.source),
                quoted(&spec.target),
                decimals
            )
        }
        Err(missing) => format!(
            "Skipped numeric_copy {}→{} ({})",
            quoted(&spec.source),
            quoted(&spec.target),
            missing
        ),
    }
}

fn concat(spec: &ConcatSpec, raw: &Table, table: &mut Table) -> CoreResult<String> {
    let listed = format!(
        "[{}]",
        spec.sources
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let sources: Result<Vec<ColumnId>, Missing> = spec
        .sources
        .iter()
        .map(|name| raw.column(name).ok_or_else(|| Missing::Raw(Some(name.clone()))))
        .collect();
    let resolved = sources.and_then(|s| ideal_column(table, &spec.target).map(|t| (s, t)));

    let (sources, target) = match resolved {
        Ok(pair) => pair,
        Err(missing) => {
            return Ok(format!(
                "Skipped concat {}→{} ({})",
                listed,
                quoted(&spec.target),
                missing
            ))
        }
    };

    if sources.is_empty() {
        return Err(CoreError::InvalidOperation(
            "concat requires at least one source column".to_string(),
        ));
    }

    let values = transforms::concatenated(raw, &sources, &spec.separator, table.row_count());
    table.set_column(target, values);
    Ok(format!("Concatenated {} → {}", listed, quoted(&spec.target)))
}

fn fill_const(fill: &ConstFill, table: &mut Table) -> String {
    let value = fill.cell();
    match ideal_column(table, &fill.target) {
        Ok(target) => {
            table.fill_column(target, &value);
            format!("Filled constant \"{}\" → {}", value, quoted(&fill.target))
        }
        Err(missing) => format!(
            "Skipped fill_const \"{}\"→{} ({})",
            value,
            quoted(&fill.target),
            missing
        ),
    }
}
