use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

/// Converts a one-based column number to its letter name using bijective
/// base-26 numbering: 1 → "A", 26 → "Z", 27 → "AA", 703 → "AAA".
///
/// Returns an empty string for 0.
pub fn column_letter(mut column_number: usize) -> String {
    let mut letters = Vec::new();
    while column_number > 0 {
        column_number -= 1;
        letters.push(b'A' + (column_number % 26) as u8);
        column_number /= 26;
    }
    letters.reverse();
    // only ASCII uppercase bytes were pushed
    String::from_utf8(letters).unwrap_or_default()
}

/// Inverse of [`column_letter`]. Case-insensitive; `None` on empty input,
/// non-alphabetic characters or overflow.
pub fn column_number(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    letters.bytes().try_fold(0usize, |acc, b| {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        let digit = (b.to_ascii_uppercase() - b'A') as usize + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Bidirectional column name ↔ zero-based index ↔ letter map, built from the
/// header row of the fetched table.
///
/// Rebuilt on every poll so inserted or reordered columns are picked up.
/// When two header cells carry the same name the rightmost one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    /// Header names by position; `None` for cells that are not usable names
    names: Vec<Option<String>>,
    by_name: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn from_header(header: &[Value]) -> Self {
        let mut names = Vec::with_capacity(header.len());
        let mut by_name = HashMap::with_capacity(header.len());

        for (idx, cell) in header.iter().enumerate() {
            match cell {
                Value::String(name) if !name.is_empty() => {
                    by_name.insert(name.clone(), idx);
                    names.push(Some(name.clone()));
                }
                Value::String(_) | Value::Null => names.push(None),
                other => {
                    warn!(column = idx, "header cell is not a string: {:?}", other);
                    names.push(None);
                }
            }
        }

        Self { names, by_name }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name_at(
        &self,
        index: usize,
    ) -> Option<&str> {
        self.names.get(index).and_then(|n| n.as_deref())
    }

    pub fn letter_of(
        &self,
        name: &str,
    ) -> Option<String> {
        self.index_of(name).map(|idx| column_letter(idx + 1))
    }

    /// Named columns in header order as `(index, name)`
    pub fn named_columns(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(idx, n)| n.as_deref().map(|n| (idx, n)))
    }
}
