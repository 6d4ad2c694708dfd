//! Logical print-grid positions and per-position storage.

use serde::{Deserialize, Serialize};

/// Zero-based `(row, col)` cell of the printed spot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: usize,
    pub col: usize,
}

impl GridPosition {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<[usize; 2]> for GridPosition {
    fn from(rc: [usize; 2]) -> Self {
        Self::new(rc[0], rc[1])
    }
}

/// Dense `rows x cols` grid of optional cells, stored row-major.
///
/// Absent cells are `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "GridArrayRepr<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct GridArray<T> {
    rows: usize,
    cols: usize,
    cells: Vec<Option<T>>,
}

#[derive(Deserialize)]
struct GridArrayRepr<T> {
    rows: usize,
    cols: usize,
    cells: Vec<Option<T>>,
}

impl<T> TryFrom<GridArrayRepr<T>> for GridArray<T> {
    type Error = String;

    fn try_from(repr: GridArrayRepr<T>) -> Result<Self, Self::Error> {
        let expected = repr.rows.checked_mul(repr.cols);
        if expected != Some(repr.cells.len()) {
            return Err(format!(
                "grid of {}x{} cannot hold {} cells",
                repr.rows,
                repr.cols,
                repr.cells.len()
            ));
        }
        Ok(Self {
            rows: repr.rows,
            cols: repr.cols,
            cells: repr.cells,
        })
    }
}

impl<T> GridArray<T> {
    /// Create an all-empty grid.
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut cells = Vec::with_capacity(rows * cols);
        cells.resize_with(rows * cols, || None);
        Self { rows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether `pos` lies inside the grid.
    pub fn contains(&self, pos: GridPosition) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    fn index(&self, pos: GridPosition) -> Option<usize> {
        self.contains(pos).then(|| pos.row * self.cols + pos.col)
    }

    pub fn get(&self, pos: GridPosition) -> Option<&T> {
        self.index(pos).and_then(|i| self.cells[i].as_ref())
    }

    /// Store `value` at an empty cell.
    ///
    /// Returns the rejected value when the cell is occupied or out of bounds;
    /// an occupied cell is never overwritten.
    pub fn try_insert(&mut self, pos: GridPosition, value: T) -> Result<(), T> {
        match self.index(pos) {
            Some(i) if self.cells[i].is_none() => {
                self.cells[i] = Some(value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Number of occupied cells.
    pub fn n_occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Iterate over every position in row-major order with its cell.
    pub fn cells(&self) -> impl Iterator<Item = (GridPosition, Option<&T>)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (GridPosition::new(i / cols, i % cols), c.as_ref()))
    }

    /// Iterate over occupied cells only.
    pub fn occupied(&self) -> impl Iterator<Item = (GridPosition, &T)> + '_ {
        self.cells().filter_map(|(pos, c)| c.map(|v| (pos, v)))
    }

    /// Map every occupied cell, keeping positions.
    pub fn map<U>(&self, mut f: impl FnMut(GridPosition, &T) -> Option<U>) -> GridArray<U> {
        let mut out = GridArray::new(self.rows, self.cols);
        for (i, (pos, cell)) in self.cells().enumerate() {
            out.cells[i] = cell.and_then(|v| f(pos, v));
        }
        out
    }

    /// Row-major nested vectors, convenient for report serialization.
    pub fn to_rows(&self) -> Vec<Vec<Option<T>>>
    where
        T: Clone,
    {
        self.cells
            .chunks(self.cols.max(1))
            .map(|row| row.to_vec())
            .collect()
    }
}
