//! Tabular records with header-keyed, type-coerced cells.
//!
//! Content tables are authored as a header row (`columns`) followed by rows of
//! raw string cells. Each cell is coerced once when records are built: empty
//! cells stay empty, `true`/`false` (any case) become booleans, numeric text
//! becomes a number, and everything else stays text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single coerced table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Coerce a raw cell into its typed representation.
    ///
    /// ```
    /// use jirai_data::CellValue;
    ///
    /// assert_eq!(CellValue::coerce(""), CellValue::Empty);
    /// assert_eq!(CellValue::coerce("TRUE"), CellValue::Bool(true));
    /// assert_eq!(CellValue::coerce("12"), CellValue::Number(12.0));
    /// assert_eq!(CellValue::coerce("easy"), CellValue::Text("easy".into()));
    /// ```
    pub fn coerce(raw: &str) -> Self {
        if raw.is_empty() {
            return CellValue::Empty;
        }
        if raw.eq_ignore_ascii_case("true") {
            return CellValue::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return CellValue::Bool(false);
        }
        let trimmed = raw.trim();
        if !trimmed.is_empty()
            && let Ok(number) = trimmed.parse::<f64>()
            && number.is_finite()
        {
            return CellValue::Number(number);
        }
        CellValue::Text(raw.to_string())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Render the cell back to text. Integral numbers drop their fractional part.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }

    /// Interpret the cell as a non-negative integer index.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            CellValue::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64 => Some(*n as usize),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            CellValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One row of a table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: BTreeMap<String, CellValue>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.get(column)
    }

    /// Text of a column, or an empty string if the column is absent or empty.
    pub fn text(&self, column: &str) -> String {
        self.get(column).map(CellValue::as_text).unwrap_or_default()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.fields.insert(column.into(), value);
    }
}

/// A header row plus raw string rows, as authored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<C, R>(columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<String>>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows.into_iter().collect(),
        }
    }

    /// Indices of rows whose cell count does not match the header.
    pub fn malformed_rows(&self) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.len() != self.columns.len())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Build coerced records. Rows with the wrong number of cells are skipped.
    pub fn records(&self) -> Vec<Record> {
        let headers: Vec<&str> = self.columns.iter().map(|c| c.trim()).collect();
        self.rows
            .iter()
            .filter(|row| row.len() == headers.len())
            .map(|row| {
                let mut record = Record::default();
                for (header, raw) in headers.iter().zip(row) {
                    record.insert(*header, CellValue::coerce(raw));
                }
                record
            })
            .collect()
    }
}
