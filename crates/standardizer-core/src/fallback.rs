//! Fallback rule engine for the ACS raw export.
//!
//! A fixed, plan-independent rule set. Each rule checks its own columns and
//! applies on its own; a rule whose columns are absent is silently passed over.

use tracing::debug;

use crate::executor::Execution;
use crate::table::{CellValue, Table};
use crate::transforms;

/// Name of the raw export dialect these rules understand.
pub const DIALECT: &str = "ACS";

/// One hard-coded mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Write a literal into every row of `target`.
    Constant {
        target: &'static str,
        value: &'static str,
    },
    /// Verbatim column copy.
    Copy {
        source: &'static str,
        target: &'static str,
    },
    /// `first + " " + last`, trimmed, blank → null.
    JoinNames {
        first: &'static str,
        last: &'static str,
        target: &'static str,
    },
    /// Publication date, calendar year and July–June fiscal year from one date column.
    Dates {
        source: &'static str,
        publication_date: &'static str,
        calendar_year: &'static str,
        fiscal_year: &'static str,
    },
    /// Numeric copy rounded to `decimals`.
    Money {
        source: &'static str,
        target: &'static str,
        decimals: i32,
    },
}

/// Rules for the ACS export, in application order.
pub const ACS_RULES: &[Rule] = &[
    Rule::Constant {
        target: "Agreement",
        value: DIALECT,
    },
    Rule::Copy {
        source: "Manuscript DOI",
        target: "Article DOI",
    },
    Rule::JoinNames {
        first: "Corresponding Author First Name",
        last: "Corresponding Author Last Name",
        target: "Author Name",
    },
    Rule::Copy {
        source: "Manuscript Title Text",
        target: "Article Title",
    },
    Rule::Copy {
        source: "Journal Title Name",
        target: "Journal Title",
    },
    Rule::Dates {
        source: "ASAP Pub Date",
        publication_date: "Publication Date",
        calendar_year: "Calendar Year",
        fiscal_year: "Fiscal Year",
    },
    Rule::Copy {
        source: "Transacting Profile Name",
        target: "Author Affiliation",
    },
    Rule::Money {
        source: "Retail Price",
        target: "APC",
        decimals: 2,
    },
    Rule::Copy {
        source: "Purchase License Summary",
        target: "License",
    },
    Rule::Copy {
        source: "Journal Type Code",
        target: "Gold or Hybrid OA",
    },
];

/// Apply [`ACS_RULES`] to `ideal`, expanding a zero-row ideal table first.
pub fn apply_fallback(raw: &Table, ideal: &Table) -> Execution {
    apply_rules(ACS_RULES, raw, ideal)
}

/// Apply an arbitrary rule list.
pub fn apply_rules(rules: &[Rule], raw: &Table, ideal: &Table) -> Execution {
    let mut table = ideal.clone().expanded_to(raw);
    let mut steps = Vec::new();
    for rule in rules {
        let before = steps.len();
        apply_rule(rule, raw, &mut table, &mut steps);
        if steps.len() == before {
            debug!(rule = ?rule, "Fallback rule not applicable");
        }
    }
    Execution { table, steps }
}

fn apply_rule(rule: &Rule, raw: &Table, table: &mut Table, steps: &mut Vec<String>) {
    let rows = table.row_count();
    match *rule {
        Rule::Constant { target, value } => {
            if let Some(tgt) = table.column(target) {
                table.fill_column(tgt, &CellValue::from(value));
                steps.push(format!("Set {} = \"{}\"", target, value));
            }
        }
        Rule::Copy { source, target } => {
            if let (Some(src), Some(tgt)) = (raw.column(source), table.column(target)) {
                table.set_column(tgt, transforms::copied(raw, src, rows));
                steps.push(format!("{} → {}", source, target));
            }
        }
        Rule::JoinNames {
            first,
            last,
            target,
        } => {
            if let (Some(f), Some(l), Some(tgt)) =
                (raw.column(first), raw.column(last), table.column(target))
            {
                table.set_column(tgt, transforms::concatenated(raw, &[f, l], " ", rows));
                steps.push(format!("{} + {} → {}", first, last, target));
            }
        }
        Rule::Dates {
            source,
            publication_date,
            calendar_year,
            fiscal_year,
        } => {
            let Some(src) = raw.column(source) else {
                return;
            };
            let dates = transforms::parsed_dates(raw, src, rows);
            if let Some(tgt) = table.column(publication_date) {
                table.set_column(tgt, transforms::date_cells(&dates));
                steps.push(format!("{} → {}", source, publication_date));
            }
            if let Some(tgt) = table.column(calendar_year) {
                table.set_column(tgt, transforms::calendar_year_cells(&dates));
                steps.push(format!("{} from {}", calendar_year, source));
            }
            if let Some(tgt) = table.column(fiscal_year) {
                table.set_column(tgt, transforms::fiscal_year_cells(&dates));
                steps.push(format!("{} (July–June) from {}", fiscal_year, source));
            }
        }
        Rule::Money {
            source,
            target,
            decimals,
        } => {
            if let (Some(src), Some(tgt)) = (raw.column(source), table.column(target)) {
                table.set_column(tgt, transforms::rounded_numbers(raw, src, decimals, rows));
                steps.push(format!("{} → {} ({} decimals)", source, target, decimals));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn acs_raw() -> Table {
        Table::from_rows(
            [
                "Manuscript DOI",
                "Corresponding Author First Name",
                "Corresponding Author Last Name",
                "Manuscript Title Text",
                "Journal Title Name",
                "ASAP Pub Date",
                "Transacting Profile Name",
                "Retail Price",
                "Purchase License Summary",
                "Journal Type Code",
            ],
            vec![
                vec![
                    "10.1021/a".into(),
                    "Jane".into(),
                    CellValue::Null,
                    "On Things".into(),
                    "JACS".into(),
                    "2023-07-15".into(),
                    "Univ A".into(),
                    "3000.456".into(),
                    "CC-BY".into(),
                    "Hybrid".into(),
                ],
                vec![
                    "10.1021/b".into(),
                    CellValue::Null,
                    CellValue::Null,
                    "On Stuff".into(),
                    "ACS Nano".into(),
                    "2024-03-01".into(),
                    "Univ B".into(),
                    "n/a".into(),
                    "CC-BY-NC".into(),
                    "Gold".into(),
                ],
            ],
        )
    }

    fn full_ideal() -> Table {
        Table::new([
            "Agreement",
            "Article DOI",
            "Author Name",
            "Article Title",
            "Journal Title",
            "Publication Date",
            "Calendar Year",
            "Fiscal Year",
            "Author Affiliation",
            "APC",
            "License",
            "Gold or Hybrid OA",
        ])
    }

    fn column(table: &Table, name: &str) -> Vec<CellValue> {
        table.values(table.column(name).unwrap()).to_vec()
    }

    #[test]
    fn test_full_dialect() {
        let out = apply_fallback(&acs_raw(), &full_ideal());

        assert_eq!(out.table.row_count(), 2);
        assert_eq!(out.steps.len(), 12);
        assert_eq!(out.steps[0], "Set Agreement = \"ACS\"");
        assert_eq!(column(&out.table, "Agreement"), vec![CellValue::from("ACS"); 2]);
        assert_eq!(
            column(&out.table, "Author Name"),
            vec![CellValue::from("Jane"), CellValue::Null]
        );
        assert_eq!(
            column(&out.table, "Publication Date"),
            vec![
                NaiveDate::from_ymd_opt(2023, 7, 15).into(),
                NaiveDate::from_ymd_opt(2024, 3, 1).into(),
            ]
        );
        assert_eq!(
            column(&out.table, "Fiscal Year"),
            vec![CellValue::Integer(2024), CellValue::Integer(2024)]
        );
        assert_eq!(
            column(&out.table, "Calendar Year"),
            vec![CellValue::Integer(2023), CellValue::Integer(2024)]
        );
        assert_eq!(
            column(&out.table, "APC"),
            vec![CellValue::Number(3000.46), CellValue::Null]
        );
        assert_eq!(
            column(&out.table, "Gold or Hybrid OA"),
            vec![CellValue::from("Hybrid"), CellValue::from("Gold")]
        );
    }

    #[test]
    fn test_partial_application() {
        let raw = Table::from_rows(
            ["ASAP Pub Date", "Unrelated"],
            vec![vec!["2023-06-30".into(), "x".into()]],
        );
        let ideal = Table::new(["Fiscal Year", "Article DOI", "Notes"]);
        let out = apply_fallback(&raw, &ideal);

        assert_eq!(out.steps, vec!["Fiscal Year (July–June) from ASAP Pub Date"]);
        assert_eq!(column(&out.table, "Fiscal Year"), vec![CellValue::Integer(2023)]);
        assert_eq!(column(&out.table, "Article DOI"), vec![CellValue::Null]);
        assert_eq!(out.table.column_names(), ideal.column_names());
    }

    #[test]
    fn test_agreement_fills_without_raw_columns() {
        let raw = Table::from_rows(["Other"], vec![vec!["a".into()], vec!["b".into()]]);
        let out = apply_fallback(&raw, &Table::new(["Agreement"]));
        assert_eq!(column(&out.table, "Agreement"), vec![CellValue::from("ACS"); 2]);
    }

    #[test]
    fn test_deterministic() {
        let first = apply_fallback(&acs_raw(), &full_ideal());
        let second = apply_fallback(&acs_raw(), &full_ideal());
        assert_eq!(first, second);
    }
}
