//! Improvement judge.
//!
//! A run counts as an improvement when at least one column gained non-null
//! cells. Losses in other columns do not cancel that out.

use std::collections::BTreeMap;

use crate::table::Table;

/// True iff some column of `after` has more non-null cells than in `before`.
pub fn improved(before: &Table, after: &Table) -> bool {
    improved_counts(&before.non_null_counts(), &after.non_null_counts())
}

/// Count-level form of [`improved`]. Columns absent from `before` count as zero.
pub fn improved_counts(before: &BTreeMap<String, usize>, after: &BTreeMap<String, usize>) -> bool {
    after
        .iter()
        .any(|(column, &count)| count > before.get(column).copied().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CellValue;

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_any_increase_wins_despite_decrease() {
        let before = counts(&[("A", 0), ("B", 5)]);
        let after = counts(&[("A", 3), ("B", 4)]);
        assert!(improved_counts(&before, &after));
    }

    #[test]
    fn test_no_increase() {
        let before = counts(&[("A", 2), ("B", 5)]);
        assert!(!improved_counts(&before, &before.clone()));
        assert!(!improved_counts(&before, &counts(&[("A", 1), ("B", 5)])));
    }

    #[test]
    fn test_tables() {
        let before = Table::with_rows(["A"], 2);
        let mut after = before.clone();
        assert!(!improved(&before, &after));

        let id = after.column("A").unwrap();
        after.fill_column(id, &CellValue::from("x"));
        assert!(improved(&before, &after));
    }
}
