use std::collections::{BTreeMap, BTreeSet};

use super::model::{Column, ColumnData, ColumnKind, Table, Value};

// ---------------------------------------------------------------------------
// Filter specifications
// ---------------------------------------------------------------------------

/// One predicate on one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// Inclusive numeric bounds. Ignored on text columns.
    Range { low: f64, high: f64 },
    /// Case-insensitive substring of the cell's string form. An empty keyword
    /// is inactive.
    Keyword(String),
    /// Cell must be one of these values. An empty set matches nothing.
    OneOf(BTreeSet<Value>),
}

/// Active filters keyed by column name. Inserting twice for the same column
/// replaces the earlier spec.
pub type FilterState = BTreeMap<String, FilterSpec>;

/// Drop rows whose `column` reads exactly `value` (e.g. `-` marking ETFs in a
/// sector column). Missing cells are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeRule {
    pub column: String,
    pub value: String,
}

/// Spec a fresh filter widget starts from: the observed range for numeric
/// columns, an empty keyword for text. `None` for a numeric column with no
/// values.
pub fn default_filter(column: &Column) -> Option<FilterSpec> {
    match column.kind() {
        ColumnKind::Numeric => column
            .numeric_range()
            .map(|(low, high)| FilterSpec::Range { low, high }),
        ColumnKind::Text => Some(FilterSpec::Keyword(String::new())),
    }
}

/// Default specs for each named column present in `table`, in order.
pub fn default_filters(table: &Table, columns: &[String]) -> Vec<(String, FilterSpec)> {
    columns
        .iter()
        .filter_map(|name| {
            let spec = default_filter(table.column(name)?)?;
            Some((name.clone(), spec))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Compiled predicates
// ---------------------------------------------------------------------------

enum Predicate<'a> {
    Range {
        values: &'a [Option<f64>],
        low: f64,
        high: f64,
    },
    Keyword {
        column: &'a Column,
        needle: String,
    },
    OneOf {
        column: &'a Column,
        allowed: &'a BTreeSet<Value>,
    },
    Exclude {
        column: &'a Column,
        value: &'a str,
    },
}

impl<'a> Predicate<'a> {
    /// `None` when the filter does not apply to this column and is skipped.
    fn compile(spec: &'a FilterSpec, column: &'a Column) -> Option<Self> {
        match spec {
            FilterSpec::Range { low, high } => match &column.data {
                ColumnData::Numeric(values) if !low.is_nan() && !high.is_nan() => {
                    Some(Predicate::Range {
                        values,
                        low: *low,
                        high: *high,
                    })
                }
                _ => None,
            },
            FilterSpec::Keyword(keyword) if keyword.is_empty() => None,
            FilterSpec::Keyword(keyword) => Some(Predicate::Keyword {
                column,
                needle: keyword.to_lowercase(),
            }),
            FilterSpec::OneOf(allowed) => Some(Predicate::OneOf { column, allowed }),
        }
    }

    fn matches(&self, row: usize) -> bool {
        match self {
            Predicate::Range { values, low, high } => match values.get(row).copied().flatten() {
                Some(v) => v >= *low && v <= *high,
                None => false,
            },
            Predicate::Keyword { column, needle } => column
                .text_at(row)
                .is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
            Predicate::OneOf { column, allowed } => {
                column.value(row).is_some_and(|v| allowed.contains(&v))
            }
            Predicate::Exclude { column, value } => {
                column.text_at(row).map_or(true, |s| s != *value)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filtered view
// ---------------------------------------------------------------------------

/// Selected columns of the rows that pass every active filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView {
    pub table: Table,
    pub matched: usize,
    pub total: usize,
}

impl FilteredView {
    pub fn counts(&self) -> (usize, usize) {
        (self.matched, self.total)
    }
}

/// Return indices of rows that pass the exclude rule and all filters.
///
/// Filters naming columns absent from `table`, and specs that do not apply to
/// their column's type, are ignored rather than reported.
pub fn filtered_indices(
    table: &Table,
    filters: &FilterState,
    exclude: Option<&ExcludeRule>,
) -> Vec<usize> {
    let mut predicates: Vec<Predicate<'_>> = Vec::with_capacity(filters.len() + 1);

    if let Some(rule) = exclude {
        if let Some(column) = table.column(&rule.column) {
            predicates.push(Predicate::Exclude {
                column,
                value: &rule.value,
            });
        }
    }

    for (name, spec) in filters {
        match table.column(name) {
            Some(column) => predicates.extend(Predicate::compile(spec, column)),
            None => log::debug!("Ignoring filter on unknown column '{name}'"),
        }
    }

    (0..table.row_count())
        .filter(|&row| predicates.iter().all(|p| p.matches(row)))
        .collect()
}

/// Filter rows, then project onto `selected` columns.
pub fn apply(
    table: &Table,
    selected: &[String],
    filters: &FilterState,
    exclude: Option<&ExcludeRule>,
) -> FilteredView {
    let rows = filtered_indices(table, filters, exclude);
    FilteredView {
        table: table.select(selected, &rows),
        matched: rows.len(),
        total: table.row_count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn prices() -> Table {
        Table::from_columns(vec![
            Column::text("code", vec![Some("A"), Some("B"), Some("C")]),
            Column::numeric("price", vec![Some(100.0), Some(200.0), None]),
        ])
        .unwrap()
    }

    fn listing() -> Table {
        Table::from_columns(vec![
            Column::text(
                "name",
                vec![Some("Alpha"), Some("beta"), Some("Gamma"), Some("Delta ETF"), None],
            ),
            Column::text("sector", vec![Some("Tech"), Some("Food"), Some("Tech"), Some("-"), None]),
            Column::numeric("per", vec![Some(10.0), Some(25.5), Some(-3.0), Some(12.0), Some(8.0)]),
        ])
        .unwrap()
    }

    fn only(column: &str, spec: FilterSpec) -> FilterState {
        FilterState::from([(column.to_string(), spec)])
    }

    #[test]
    fn range_filter_end_to_end() {
        let table = prices();
        let view = apply(
            &table,
            &names(&["code", "price"]),
            &only("price", FilterSpec::Range { low: 100.0, high: 150.0 }),
            None,
        );
        assert_eq!(view.counts(), (1, 3));
        assert_eq!(view.table.column("code").unwrap().value(0), Some(Value::Text("A".into())));
        assert_eq!(view.table.column("price").unwrap().value(0), Some(Value::Number(100.0)));
    }

    #[test]
    fn keyword_is_case_insensitive_substring() {
        let table = listing();
        let rows = filtered_indices(&table, &only("name", FilterSpec::Keyword("a".into())), None);
        // "Alpha", "beta", "Gamma" and "Delta ETF" all contain an "a"; the missing cell never matches
        assert_eq!(rows, vec![0, 1, 2, 3]);

        let upper = filtered_indices(&table, &only("name", FilterSpec::Keyword("ALP".into())), None);
        assert_eq!(upper, vec![0]);
    }

    #[test]
    fn keyword_matches_number_string_form() {
        let table = prices();
        let rows = filtered_indices(&table, &only("price", FilterSpec::Keyword("20".into())), None);
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn empty_keyword_is_inactive() {
        let table = listing();
        let rows = filtered_indices(&table, &only("name", FilterSpec::Keyword(String::new())), None);
        assert_eq!(rows.len(), table.row_count());
    }

    #[test]
    fn range_at_observed_bounds_keeps_all_non_missing_rows() {
        let table = prices();
        let spec = default_filter(table.column("price").unwrap()).unwrap();
        assert_eq!(spec, FilterSpec::Range { low: 100.0, high: 200.0 });
        assert_eq!(filtered_indices(&table, &only("price", spec), None), vec![0, 1]);
    }

    #[test]
    fn disjoint_or_inverted_range_yields_nothing() {
        let table = prices();
        let far = only("price", FilterSpec::Range { low: 1e6, high: 2e6 });
        assert!(filtered_indices(&table, &far, None).is_empty());
        let inverted = only("price", FilterSpec::Range { low: 200.0, high: 100.0 });
        assert!(filtered_indices(&table, &inverted, None).is_empty());
    }

    #[test]
    fn range_on_text_column_is_ignored() {
        let table = prices();
        let rows = filtered_indices(&table, &only("code", FilterSpec::Range { low: 0.0, high: 1.0 }), None);
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn one_of_empty_and_full_sets() {
        let table = listing();
        let per = table.column("per").unwrap();

        let none = only("per", FilterSpec::OneOf(BTreeSet::new()));
        assert!(filtered_indices(&table, &none, None).is_empty());

        let all = only("per", FilterSpec::OneOf(per.unique_values()));
        assert_eq!(filtered_indices(&table, &all, None).len(), table.row_count());

        let tech = only(
            "sector",
            FilterSpec::OneOf(BTreeSet::from([Value::Text("Tech".into())])),
        );
        assert_eq!(filtered_indices(&table, &tech, None), vec![0, 2]);
    }

    #[test]
    fn one_of_treats_negative_zero_as_zero() {
        let table = crate::data::loader::parse_csv("chg\n-0\n0\n5\n").unwrap();
        let zero = only("chg", FilterSpec::OneOf(BTreeSet::from([Value::Number(0.0)])));
        assert_eq!(filtered_indices(&table, &zero, None), vec![0, 1]);
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let table = prices();
        let mut filters = only("volume", FilterSpec::Range { low: 0.0, high: 1.0 });
        filters.insert("price".into(), FilterSpec::Range { low: 150.0, high: 250.0 });
        let view = apply(&table, &names(&["code", "nope"]), &filters, None);
        assert_eq!(view.counts(), (1, 3));
        assert_eq!(view.table.column_names(), vec!["code"]);
    }

    #[test]
    fn later_spec_for_same_column_wins() {
        let table = prices();
        let mut filters = FilterState::new();
        filters.insert("price".into(), FilterSpec::Range { low: 0.0, high: 150.0 });
        filters.insert("price".into(), FilterSpec::Range { low: 150.0, high: 250.0 });
        assert_eq!(filtered_indices(&table, &filters, None), vec![1]);
    }

    #[test]
    fn exclude_rule_drops_sentinel_rows_but_keeps_missing() {
        let table = listing();
        let rule = ExcludeRule {
            column: "sector".into(),
            value: "-".into(),
        };
        let rows = filtered_indices(&table, &FilterState::new(), Some(&rule));
        assert_eq!(rows, vec![0, 1, 2, 4]);

        let absent = ExcludeRule {
            column: "category".into(),
            value: "-".into(),
        };
        assert_eq!(filtered_indices(&table, &FilterState::new(), Some(&absent)).len(), 5);
    }

    #[test]
    fn adding_filters_never_adds_rows() {
        let table = listing();
        let rule = ExcludeRule {
            column: "sector".into(),
            value: "-".into(),
        };
        let steps = [
            ("per", FilterSpec::Range { low: 0.0, high: 20.0 }),
            ("name", FilterSpec::Keyword("a".into())),
            ("sector", FilterSpec::OneOf(BTreeSet::from([Value::Text("Tech".into())]))),
        ];

        let mut filters = FilterState::new();
        let mut previous = apply(&table, &[], &filters, Some(&rule)).matched;
        assert!(previous <= table.row_count());
        for (col, spec) in steps {
            filters.insert(col.to_string(), spec);
            let view = apply(&table, &names(&["name"]), &filters, Some(&rule));
            assert!(view.matched <= previous);
            assert!(view.matched <= view.total);
            previous = view.matched;
        }
        assert_eq!(previous, 1);
    }

    #[test]
    fn empty_selection_still_reports_counts() {
        let table = prices();
        let view = apply(&table, &[], &FilterState::new(), None);
        assert!(view.table.columns().is_empty());
        assert_eq!(view.counts(), (3, 3));
    }

    #[test]
    fn default_filters_follow_column_types() {
        let table = listing();
        let specs = default_filters(&table, &names(&["name", "per", "ghost"]));
        assert_eq!(
            specs,
            vec![
                ("name".to_string(), FilterSpec::Keyword(String::new())),
                ("per".to_string(), FilterSpec::Range { low: -3.0, high: 25.5 }),
            ]
        );
    }
}
