//! Read-only copy of everything the renderer needs, taken between ticks.

use crate::board::Cell;
use crate::mode::RunMode;
use crate::piece::{Piece, Shape};
use crate::runs::{CommandRun, RunPhase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceView {
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
    pub rotation: u8,
    pub is_bomb: bool,
    /// Occupied cells with the glyph each one shows.
    pub cells: Vec<(i32, i32, char)>,
}

impl From<&Piece> for PieceView {
    fn from(piece: &Piece) -> Self {
        Self {
            shape: piece.shape,
            x: piece.x,
            y: piece.y,
            rotation: piece.rotation,
            is_bomb: piece.is_bomb,
            cells: piece.cells_with_glyphs(),
        }
    }
}

/// One tracked command run, as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunView {
    pub id: u64,
    pub identity: String,
    pub phase: RunPhase,
    pub cycle: u64,
    pub emitted: u64,
}

impl From<&CommandRun> for RunView {
    fn from(run: &CommandRun) -> Self {
        Self {
            id: run.id(),
            identity: run.identity().to_string(),
            phase: run.phase(),
            cycle: run.cycle(),
            emitted: run.emitted(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: usize,
    pub height: usize,
    /// rows[y][x], row 0 at the top.
    pub rows: Vec<Vec<Cell>>,
    pub piece: Option<PieceView>,
    /// Where the active piece would land.
    pub ghost: Option<PieceView>,
    /// Next piece to spawn: a queued bomb, else the next run chunk.
    pub next: Option<PieceView>,
    pub score: u64,
    pub lines_cleared: u64,
    pub mode: RunMode,
    pub bombs: u32,
    pub bomb_cap: u32,
    pub tracked_runs: usize,
    pub runs: Vec<RunView>,
    /// Identity the next completed command is compared against.
    pub last_identity: Option<String>,
    /// Variety meter level; a bomb is paid out at [`crate::effects::VARIETY_THRESHOLD`].
    pub variety_meter: u32,
    pub game_over: bool,
}

impl Snapshot {
    /// Active piece glyph at (x, y), if the piece covers it.
    pub fn piece_glyph_at(&self, x: usize, y: usize) -> Option<char> {
        let piece = self.piece.as_ref()?;
        piece
            .cells
            .iter()
            .find(|&&(px, py, _)| px == x as i32 && py == y as i32)
            .map(|&(_, _, glyph)| glyph)
    }

    pub fn ghost_covers(&self, x: usize, y: usize) -> bool {
        self.ghost.as_ref().is_some_and(|g| {
            g.cells
                .iter()
                .any(|&(gx, gy, _)| gx == x as i32 && gy == y as i32)
        })
    }
}
