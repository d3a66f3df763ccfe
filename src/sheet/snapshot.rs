use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::CellRef;
use super::ColumnMap;
use crate::ROW_INDEX_FIELD;

/// Raw table as returned by the data source: rows of JSON cell values,
/// header first. Rows may be ragged.
pub type Table = Vec<Vec<Value>>;

/// Renders one raw cell as text.
///
/// Strings, numbers and booleans are accepted; `null` is empty. Arrays and
/// objects are not valid cell values and yield `None`.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => Some(String::new()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Immutable view of one data row, keyed by column name.
///
/// Every named column of the header is present; cells missing from a short
/// physical row or holding a malformed value read as empty. The synthetic
/// [`ROW_INDEX_FIELD`] resolves to the row index and shadows a real column
/// of the same name.
#[derive(Debug, Clone)]
pub struct RowSnapshot {
    row_index: usize,
    row_index_text: String,
    columns: Arc<ColumnMap>,
    /// Indexed by column position, always `columns.len()` long
    values: Vec<String>,
}

impl RowSnapshot {
    pub fn build(
        row_index: usize,
        columns: Arc<ColumnMap>,
        raw: &[Value],
    ) -> Self {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            let text = match raw.get(idx) {
                None => String::new(),
                Some(v) => cell_text(v).unwrap_or_else(|| {
                    warn!(row = row_index, column = idx, "malformed cell value, treated as empty: {:?}", v);
                    String::new()
                }),
            };
            values.push(text);
        }

        Self {
            row_index,
            row_index_text: row_index.to_string(),
            columns,
            values,
        }
    }

    /// Zero-based table row (header is 0)
    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Value of a named column; `None` only if the header has no such column
    pub fn get(
        &self,
        name: &str,
    ) -> Option<&str> {
        if name == ROW_INDEX_FIELD {
            return Some(&self.row_index_text);
        }
        self.columns
            .index_of(name)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }

    /// Whether the named column holds a non-empty value
    pub fn has_value(
        &self,
        name: &str,
    ) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Physical cell of a named column in this row
    pub fn cell(
        &self,
        name: &str,
    ) -> Option<CellRef> {
        self.columns.index_of(name).map(|col| CellRef::new(self.row_index, col))
    }

    /// `(name, value)` pairs in header order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .named_columns()
            .filter_map(|(idx, name)| self.values.get(idx).map(|v| (name, v.as_str())))
    }
}

/// One fetched table split into its header map and row snapshots.
#[derive(Debug, Clone, Default)]
pub struct TableSnapshot {
    pub columns: Arc<ColumnMap>,
    pub rows: Vec<RowSnapshot>,
}

impl TableSnapshot {
    pub fn from_table(table: &Table) -> Self {
        let Some((header, data)) = table.split_first() else {
            return Self::default();
        };

        let columns = Arc::new(ColumnMap::from_header(header));
        let rows = data
            .iter()
            .enumerate()
            .map(|(offset, raw)| RowSnapshot::build(offset + 1, columns.clone(), raw))
            .collect();

        Self { columns, rows }
    }

    /// Number of physical rows including the header
    pub fn row_count(&self) -> usize {
        if self.columns.is_empty() && self.rows.is_empty() {
            0
        } else {
            self.rows.len() + 1
        }
    }
}
