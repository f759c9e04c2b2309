use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Value – a single non-missing cell
// ---------------------------------------------------------------------------

/// A non-missing cell value. Missing cells are `None` at the column level.
/// Using `BTreeSet` downstream so `Value` must be `Ord`.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Number(_), Value::Text(_)) => std::cmp::Ordering::Less,
            (Value::Text(_), Value::Number(_)) => std::cmp::Ordering::Greater,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Number(v) => v.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => f.write_str(&format_number(*v)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// String representation of a numeric cell. Integral values print without a
/// fractional part so that `100` in the CSV reads back as `100`.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// ---------------------------------------------------------------------------
// Column – named, typed sequence of cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// Column name plus inferred scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Numeric(
                values.into_iter().map(|v| v.map(positive_zero)).collect(),
            ),
        }
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Column {
            name: name.into(),
            data: ColumnData::Text(values.into_iter().map(|v| v.map(Into::into)).collect()),
        }
    }

    /// Infer the column type from raw cells: numeric when every non-missing
    /// cell parses as a number, text otherwise. An all-missing column is text.
    pub fn infer(name: impl Into<String>, raw: Vec<Option<String>>) -> Self {
        let parsed: Option<Vec<Option<f64>>> = raw
            .iter()
            .map(|cell| match cell {
                None => Some(None),
                Some(s) => parse_number(s).map(Some),
            })
            .collect();

        let any_present = raw.iter().any(Option::is_some);
        match parsed {
            Some(values) if any_present => Column::numeric(name, values),
            _ => Column {
                name: name.into(),
                data: ColumnData::Text(raw),
            },
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    pub fn descriptor(&self) -> ColumnDescriptor {
        ColumnDescriptor {
            name: self.name.clone(),
            kind: self.kind(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell at `row`, `None` when missing or out of range.
    pub fn value(&self, row: usize) -> Option<Value> {
        match &self.data {
            ColumnData::Numeric(v) => v.get(row).copied().flatten().map(Value::Number),
            ColumnData::Text(v) => v.get(row).cloned().flatten().map(Value::Text),
        }
    }

    /// String representation of the cell at `row`.
    pub fn text_at(&self, row: usize) -> Option<Cow<'_, str>> {
        match &self.data {
            ColumnData::Numeric(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|n| Cow::Owned(format_number(n))),
            ColumnData::Text(v) => v.get(row).and_then(|s| s.as_deref()).map(Cow::Borrowed),
        }
    }

    /// Observed `(min, max)` over non-missing values of a numeric column.
    pub fn numeric_range(&self) -> Option<(f64, f64)> {
        let ColumnData::Numeric(values) = &self.data else {
            return None;
        };
        values
            .iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }

    /// Sorted set of distinct non-missing values.
    pub fn unique_values(&self) -> BTreeSet<Value> {
        (0..self.len()).filter_map(|row| self.value(row)).collect()
    }

    /// New column holding the cells at `rows`, in that order.
    pub fn take(&self, rows: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Numeric(v) => {
                ColumnData::Numeric(rows.iter().map(|&r| v.get(r).copied().flatten()).collect())
            }
            ColumnData::Text(v) => {
                ColumnData::Text(rows.iter().map(|&r| v.get(r).cloned().flatten()).collect())
            }
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }
}

/// Numeric parse used by type inference. Accepts plain decimal and exponent
/// notation; rejects `inf`/`nan` and literals that overflow to infinity so
/// they stay text.
fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() || t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `-0` and `0` are the same cell value.
fn positive_zero(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

// ---------------------------------------------------------------------------
// Table – the complete parsed dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("column '{name}' has {len} rows, expected {expected}")]
    RaggedColumn {
        name: String,
        len: usize,
        expected: usize,
    },
}

/// Ordered, uniquely named columns of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map_or(0, Column::len);
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(TableError::DuplicateColumn(col.name.clone()));
            }
            if col.len() != row_count {
                return Err(TableError::RaggedColumn {
                    name: col.name.clone(),
                    len: col.len(),
                    expected: row_count,
                });
            }
        }
        Ok(Table { columns, row_count })
    }

    /// Build from a header row and untyped rows, inferring each column's type.
    /// Short rows are padded with missing cells; duplicate header names are
    /// renamed `name.1`, `name.2`, ...
    pub fn from_raw(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let names = dedupe_names(headers);
        let row_count = rows.len();

        let mut cells: Vec<Vec<Option<String>>> =
            names.iter().map(|_| Vec::with_capacity(row_count)).collect();
        for row in rows {
            let mut row = row.into_iter();
            for col in cells.iter_mut() {
                col.push(row.next().flatten());
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::infer(name, raw))
            .collect();
        Table { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn descriptors(&self) -> Vec<ColumnDescriptor> {
        self.columns.iter().map(Column::descriptor).collect()
    }

    /// Projection onto `columns` (unknown names skipped) restricted to `rows`.
    pub fn select(&self, columns: &[String], rows: &[usize]) -> Table {
        let mut picked: Vec<Column> = Vec::with_capacity(columns.len());
        for name in columns {
            if picked.iter().any(|c| &c.name == name) {
                continue;
            }
            if let Some(col) = self.column(name) {
                picked.push(col.take(rows));
            }
        }
        let row_count = if picked.is_empty() { 0 } else { rows.len() };
        Table {
            columns: picked,
            row_count,
        }
    }
}

fn dedupe_names(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());
    for name in headers {
        let mut candidate = name.clone();
        let mut n = 0;
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        seen.insert(candidate.clone());
        out.push(candidate);
    }
    out
}
