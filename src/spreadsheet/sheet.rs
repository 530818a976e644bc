use crate::spreadsheet::cell::{Cell, CellValue};
use std::collections::{BTreeSet, HashMap};

/// A worksheet as a sparse grid of non-empty cells addressed by zero-based (row, col).
#[derive(Clone, Debug, Default)]
pub struct Sheet {
    /// Sheet name
    pub name: String,
    /// All non-empty cells in the sheet
    pub cells: Vec<Cell>,
    /// Index mapping from (row, col) to cell vector position
    indexes: HashMap<(usize, usize), usize>,
    /// Occupied rows, ascending
    occupied_rows: BTreeSet<usize>,
    /// Actual data range (determined from cell data)
    pub row_upper_bound: Option<usize>,
    pub col_upper_bound: Option<usize>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Builds a sheet from dense rows, `None` marking an empty cell.
    pub fn from_rows(name: &str, rows: Vec<Vec<Option<CellValue>>>) -> Self {
        let mut sheet = Self::new(name);
        for (row, values) in rows.into_iter().enumerate() {
            for (col, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    sheet.push(Cell { row, col, value });
                }
            }
        }
        sheet
    }

    /// Returns true if the sheet contains no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell, replacing any earlier cell at the same position.
    pub fn push(&mut self, cell: Cell) {
        let key = (cell.row, cell.col);
        self.update_bound(cell.row, cell.col);
        self.occupied_rows.insert(cell.row);
        if let Some(index) = self.indexes.get(&key) {
            self.cells[*index] = cell;
        } else {
            self.indexes.insert(key, self.cells.len());
            self.cells.push(cell);
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.indexes
            .get(&(row, col))
            .map(|index| &self.cells[*index].value)
    }

    /// Rows holding at least one cell, in ascending order. Blank rows are never yielded.
    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.occupied_rows.iter().copied()
    }

    /// Updates the data range boundaries based on cell positions.
    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn text(value: &str) -> Option<CellValue> {
        Some(CellValue::from(value))
    }

    pub(crate) fn number(value: f64) -> Option<CellValue> {
        Some(CellValue::Number(value))
    }

    /// Builds a sheet where every non-empty string becomes a text cell.
    pub(crate) fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet::from_rows(
            "Sheet1",
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|value| (!value.is_empty()).then(|| CellValue::from(*value)))
                        .collect()
                })
                .collect(),
        )
    }
}
