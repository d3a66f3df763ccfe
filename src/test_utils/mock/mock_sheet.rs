use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::CellRef;
use crate::DataSource;
use crate::RangeRef;
use crate::Result;
use crate::SettingsSource;
use crate::SourceError;
use crate::Table;

/// Spreadsheet double backed by string grids, one per sheet.
///
/// Records every cell write in order and the peak number of concurrent
/// writes per cell, and can be told to fail upcoming reads or writes.
#[derive(Debug)]
pub struct InMemorySheet {
    primary: String,
    state: Mutex<SheetState>,
}

#[derive(Debug, Default)]
struct SheetState {
    sheets: HashMap<String, Vec<Vec<String>>>,
    settings: Table,
    failing_reads: (usize, u16),
    failing_writes: (usize, u16),
    failing_settings: (usize, u16),
    write_delay: Duration,
    reads: usize,
    /// `(sheet, cell, value)` in commit order
    writes: Vec<(String, CellRef, String)>,
    block_writes: HashMap<String, usize>,
    created: Vec<String>,
    writing: HashMap<CellRef, usize>,
    max_writing: HashMap<CellRef, usize>,
}

impl InMemorySheet {
    pub fn new(
        sheet: &str,
        rows: &[&[&str]],
    ) -> Self {
        let grid = rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();
        let mut state = SheetState::default();
        state.sheets.insert(sheet.to_string(), grid);
        Self {
            primary: sheet.to_string(),
            state: Mutex::new(state),
        }
    }

    pub fn add_sheet(
        &self,
        name: &str,
    ) {
        self.state.lock().sheets.entry(name.to_string()).or_default();
    }

    /// Replaces the rule-definition table served by [`SettingsSource`]
    pub fn set_settings(
        &self,
        settings: Table,
    ) {
        self.state.lock().settings = settings;
    }

    /// Edits a cell of the polled sheet as a user would
    pub fn set_cell(
        &self,
        row: usize,
        col: usize,
        value: &str,
    ) {
        let mut state = self.state.lock();
        if let Some(grid) = state.sheets.get_mut(&self.primary) {
            put(grid, CellRef::new(row, col), value);
        }
    }

    /// Sets a cell of any existing sheet without recording a write
    pub fn write_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
        value: &str,
    ) {
        if let Some(grid) = self.state.lock().sheets.get_mut(sheet) {
            put(grid, CellRef::new(row, col), value);
        }
    }

    pub fn fail_next_reads(
        &self,
        count: usize,
        status: u16,
    ) {
        self.state.lock().failing_reads = (count, status);
    }

    pub fn fail_next_writes(
        &self,
        count: usize,
        status: u16,
    ) {
        self.state.lock().failing_writes = (count, status);
    }

    pub fn fail_next_settings_reads(
        &self,
        count: usize,
        status: u16,
    ) {
        self.state.lock().failing_settings = (count, status);
    }

    pub fn set_write_delay(
        &self,
        delay: Duration,
    ) {
        self.state.lock().write_delay = delay;
    }

    pub fn cell(
        &self,
        row: usize,
        col: usize,
    ) -> String {
        self.sheet_cell(&self.primary, row, col)
    }

    pub fn sheet_cell(
        &self,
        sheet: &str,
        row: usize,
        col: usize,
    ) -> String {
        self.state
            .lock()
            .sheets
            .get(sheet)
            .and_then(|grid| grid.get(row))
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// Values written to a cell of the polled sheet, oldest first
    pub fn writes_to(
        &self,
        cell: CellRef,
    ) -> Vec<String> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(sheet, c, _)| *sheet == self.primary && *c == cell)
            .map(|(_, _, v)| v.clone())
            .collect()
    }

    pub fn total_writes(&self) -> usize {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(sheet, _, _)| *sheet == self.primary)
            .count()
    }

    pub fn max_concurrent_writes(
        &self,
        cell: CellRef,
    ) -> usize {
        self.state.lock().max_writing.get(&cell).copied().unwrap_or(0)
    }

    /// Number of `update_range` calls that reached `sheet`
    pub fn block_writes(
        &self,
        sheet: &str,
    ) -> usize {
        self.state.lock().block_writes.get(sheet).copied().unwrap_or(0)
    }

    /// Sheets added through [`DataSource::ensure_sheet`]
    pub fn created_sheets(&self) -> Vec<String> {
        self.state.lock().created.clone()
    }

    pub fn has_sheet(
        &self,
        sheet: &str,
    ) -> bool {
        self.state.lock().sheets.contains_key(sheet)
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    fn injected(
        failing: &mut (usize, u16),
        op: &str,
    ) -> Option<SourceError> {
        if failing.0 == 0 {
            return None;
        }
        failing.0 -= 1;
        Some(SourceError::Http {
            status: failing.1,
            body: format!("injected {op} failure"),
        })
    }
}

fn put(
    grid: &mut Vec<Vec<String>>,
    cell: CellRef,
    value: &str,
) {
    if grid.len() <= cell.row {
        grid.resize_with(cell.row + 1, Vec::new);
    }
    let row = &mut grid[cell.row];
    if row.len() <= cell.col {
        row.resize(cell.col + 1, String::new());
    }
    row[cell.col] = value.to_string();
}

fn unknown_sheet(sheet: &str) -> SourceError {
    SourceError::Http {
        status: 400,
        body: format!("Unable to parse range: {sheet}"),
    }
}

#[async_trait]
impl DataSource for InMemorySheet {
    async fn get_table(
        &self,
        sheet: &str,
    ) -> Result<Table> {
        let mut state = self.state.lock();
        state.reads += 1;
        if let Some(e) = Self::injected(&mut state.failing_reads, "read") {
            return Err(e.into());
        }
        let grid = state.sheets.get(sheet).ok_or_else(|| unknown_sheet(sheet))?;
        Ok(grid
            .iter()
            .map(|row| row.iter().map(|v| Value::String(v.clone())).collect())
            .collect())
    }

    async fn update_range(
        &self,
        range: &RangeRef,
        values: Vec<Vec<String>>,
    ) -> Result<()> {
        let delay = {
            let mut state = self.state.lock();
            if !state.sheets.contains_key(&range.sheet) {
                return Err(unknown_sheet(&range.sheet).into());
            }
            if let Some(e) = Self::injected(&mut state.failing_writes, "write") {
                return Err(e.into());
            }
            let writing = state.writing.entry(range.cell).or_default();
            *writing += 1;
            let now = *writing;
            let peak = state.max_writing.entry(range.cell).or_default();
            *peak = (*peak).max(now);
            state.write_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(writing) = state.writing.get_mut(&range.cell) {
            *writing = writing.saturating_sub(1);
        }
        *state.block_writes.entry(range.sheet.clone()).or_default() += 1;
        for (dr, row) in values.iter().enumerate() {
            for (dc, value) in row.iter().enumerate() {
                let cell = CellRef::new(range.cell.row + dr, range.cell.col + dc);
                if let Some(grid) = state.sheets.get_mut(&range.sheet) {
                    put(grid, cell, value);
                }
                state.writes.push((range.sheet.clone(), cell, value.clone()));
            }
        }
        Ok(())
    }

    async fn ensure_sheet(
        &self,
        sheet: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.sheets.contains_key(sheet) {
            state.sheets.insert(sheet.to_string(), Vec::new());
            state.created.push(sheet.to_string());
        }
        Ok(())
    }

    async fn clear_columns(
        &self,
        sheet: &str,
        first: usize,
        last: usize,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(e) = Self::injected(&mut state.failing_writes, "clear") {
            return Err(e.into());
        }
        let grid = state.sheets.get_mut(sheet).ok_or_else(|| unknown_sheet(sheet))?;
        for row in grid.iter_mut() {
            for value in row.iter_mut().skip(first).take((last + 1).saturating_sub(first)) {
                value.clear();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsSource for InMemorySheet {
    async fn fetch_settings(&self) -> Result<Table> {
        let mut state = self.state.lock();
        if let Some(e) = Self::injected(&mut state.failing_settings, "settings") {
            return Err(e.into());
        }
        Ok(state.settings.clone())
    }
}
