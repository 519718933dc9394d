//! Well grid: rows of cells, row 0 at the top.

use crate::piece::ShapeClass;
use std::collections::VecDeque;

/// Well width in cells.
pub const BOARD_WIDTH: usize = 10;
/// Well height in cells.
pub const BOARD_HEIGHT: usize = 20;

/// Display character of garbage cells.
pub const GARBAGE_GLYPH: char = '#';
/// Display character written over infected cells.
pub const INFECTION_GLYPH: char = '?';

/// Where a filled cell came from. Only used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOrigin {
    Command(ShapeClass),
    Garbage,
}

/// Contents of a filled cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub glyph: char,
    pub origin: CellOrigin,
    pub infected: bool,
}

/// Single cell. Occupancy is the only thing physics looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(Block),
}

impl Cell {
    pub fn command(glyph: char, class: ShapeClass) -> Self {
        Self::Filled(Block {
            glyph,
            origin: CellOrigin::Command(class),
            infected: false,
        })
    }

    pub fn garbage() -> Self {
        Self::Filled(Block {
            glyph: GARBAGE_GLYPH,
            origin: CellOrigin::Garbage,
            infected: false,
        })
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }

    pub fn glyph(&self) -> Option<char> {
        match self {
            Self::Empty => None,
            Self::Filled(block) => Some(block.glyph),
        }
    }
}

/// Playfield: grid of cells. rows[0] is the top row.
#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    rows: VecDeque<Vec<Cell>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BOARD_WIDTH, BOARD_HEIGHT)
    }
}

impl Board {
    pub fn new(width: usize, height: usize) -> Self {
        let rows = (0..height).map(|_| vec![Cell::Empty; width]).collect();
        Self {
            width,
            height,
            rows,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    }

    /// True if (x, y) is inside the well and empty. Signed so callers can probe
    /// positions left of / above the well.
    pub fn is_open(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        matches!(self.get(x as usize, y as usize), Some(Cell::Empty))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn row_is_complete(&self, y: usize) -> bool {
        self.rows
            .get(y)
            .is_some_and(|row| row.iter().all(Cell::is_filled))
    }

    pub fn row_has_filled(&self, y: usize) -> bool {
        self.rows
            .get(y)
            .is_some_and(|row| row.iter().any(Cell::is_filled))
    }

    /// Indices of every complete row, top to bottom.
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.height).filter(|&y| self.row_is_complete(y)).collect()
    }

    /// Removes the given rows at once; rows above drop down and empty rows are
    /// inserted at the top. Returns how many rows were removed.
    pub fn remove_rows(&mut self, rows: &[usize]) -> usize {
        let before = self.rows.len();
        let mut y = 0;
        self.rows.retain(|_| {
            let keep = !rows.contains(&y);
            y += 1;
            keep
        });
        let removed = before - self.rows.len();
        for _ in 0..removed {
            self.rows.push_front(vec![Cell::Empty; self.width]);
        }
        removed
    }

    /// Pushes `row` in at the bottom and shifts everything up by one. Refuses
    /// (board untouched) when the top row holds filled cells, since they would
    /// leave the well.
    pub fn push_bottom_row(&mut self, row: Vec<Cell>) -> bool {
        debug_assert_eq!(row.len(), self.width);
        if self.row_has_filled(0) {
            return false;
        }
        self.rows.pop_front();
        self.rows.push_back(row);
        true
    }

    /// Coordinates of all filled cells, row-major.
    pub fn filled_cells(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (y, row) in self.rows.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if cell.is_filled() {
                    out.push((x, y));
                }
            }
        }
        out
    }

    pub fn filled_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|c| c.is_filled()).count())
            .sum()
    }
}
