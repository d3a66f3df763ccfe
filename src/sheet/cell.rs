use std::fmt;
use std::str::FromStr;

use super::column_letter;
use super::column_number;
use crate::SourceError;

/// Zero-based physical cell position within the polled table.
///
/// Row 0 is the header row, so data rows start at 1 and the A1 row number is
/// always `row + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub const fn new(
        row: usize,
        col: usize,
    ) -> Self {
        Self { row, col }
    }

    /// A1 notation without sheet name, e.g. `E6` for row 5, col 4
    pub fn a1(&self) -> String {
        format!("{}{}", column_letter(self.col + 1), self.row + 1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// Single-cell range on a named sheet, e.g. `Summary!E6`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeRef {
    pub sheet: String,
    pub cell: CellRef,
}

impl RangeRef {
    pub fn new(
        sheet: impl Into<String>,
        cell: CellRef,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            cell,
        }
    }
}

impl fmt::Display for RangeRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}!{}", sheet_range(&self.sheet), self.cell.a1())
    }
}

impl FromStr for RangeRef {
    type Err = SourceError;

    /// Parses `Sheet!B7` or `'My Sheet'!B7` into a zero-based cell position.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SourceError::MalformedRange(s.to_string());

        let (sheet, a1) = s.rsplit_once('!').ok_or_else(malformed)?;
        let sheet = match sheet.strip_prefix('\'').and_then(|x| x.strip_suffix('\'')) {
            Some(quoted) => quoted.replace("''", "'"),
            None => sheet.to_string(),
        };
        if sheet.is_empty() {
            return Err(malformed());
        }

        let split = a1.find(|c: char| c.is_ascii_digit()).ok_or_else(malformed)?;
        let (letters, digits) = a1.split_at(split);
        let col = column_number(letters).ok_or_else(malformed)?;
        let row: usize = digits.parse().map_err(|_| malformed())?;
        if row == 0 {
            return Err(malformed());
        }

        Ok(Self {
            sheet,
            cell: CellRef::new(row - 1, col - 1),
        })
    }
}

/// Range covering a whole sheet, quoted when the name requires it
pub fn sheet_range(sheet: &str) -> String {
    if needs_quoting(sheet) {
        format!("'{}'", sheet.replace('\'', "''"))
    } else {
        sheet.to_string()
    }
}

fn needs_quoting(sheet: &str) -> bool {
    !sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
