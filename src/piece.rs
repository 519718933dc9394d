//! Shapes, rotation states and payload placement.

use rand::Rng;

/// Glyph used for the cells of a success bomb (never written to the board).
pub const BOMB_GLYPH: char = '*';

/// Tetromino kinds (I, O, T, S, Z, J, L).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetrominoKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl TetrominoKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::T, Self::S, Self::Z, Self::J, Self::L];

    /// 4 cells relative to origin (0,0); each (dx, dy).
    fn cells(self) -> &'static [(i8, i8)] {
        match self {
            Self::I => &[(0, 0), (1, 0), (2, 0), (3, 0)],
            Self::O => &[(0, 0), (1, 0), (0, 1), (1, 1)],
            Self::T => &[(0, 0), (1, 0), (2, 0), (1, 1)],
            Self::S => &[(1, 0), (2, 0), (0, 1), (1, 1)],
            Self::Z => &[(0, 0), (1, 0), (1, 1), (2, 1)],
            Self::J => &[(0, 0), (0, 1), (1, 1), (2, 1)],
            Self::L => &[(2, 0), (0, 1), (1, 1), (2, 1)],
        }
    }
}

/// Triomino kinds: straight and corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriominoKind {
    I,
    L,
}

impl TriominoKind {
    pub const ALL: [Self; 2] = [Self::I, Self::L];
}

/// Size class of a shape. Decided by chunk length; the concrete shape inside
/// the class is picked at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeClass {
    Monomino,
    Domino,
    Triomino,
    Tetromino,
}

impl ShapeClass {
    /// Class for a chunk of `len` characters (1..=4).
    pub fn for_chunk_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(Self::Monomino),
            2 => Some(Self::Domino),
            3 => Some(Self::Triomino),
            4 => Some(Self::Tetromino),
            _ => None,
        }
    }

    pub fn cell_count(self) -> usize {
        match self {
            Self::Monomino => 1,
            Self::Domino => 2,
            Self::Triomino => 3,
            Self::Tetromino => 4,
        }
    }

    /// Pick a concrete shape of this class.
    pub fn pick<R: Rng>(self, rng: &mut R) -> Shape {
        match self {
            Self::Monomino => Shape::Monomino,
            Self::Domino => Shape::Domino,
            Self::Triomino => {
                Shape::Triomino(TriominoKind::ALL[rng.gen_range(0..TriominoKind::ALL.len())])
            }
            Self::Tetromino => {
                Shape::Tetromino(TetrominoKind::ALL[rng.gen_range(0..TetrominoKind::ALL.len())])
            }
        }
    }
}

/// Concrete shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Monomino,
    Domino,
    Triomino(TriominoKind),
    Tetromino(TetrominoKind),
}

impl Shape {
    pub fn class(self) -> ShapeClass {
        match self {
            Self::Monomino => ShapeClass::Monomino,
            Self::Domino => ShapeClass::Domino,
            Self::Triomino(_) => ShapeClass::Triomino,
            Self::Tetromino(_) => ShapeClass::Tetromino,
        }
    }

    fn base_cells(self) -> &'static [(i8, i8)] {
        match self {
            Self::Monomino => &[(0, 0)],
            Self::Domino => &[(0, 0), (1, 0)],
            Self::Triomino(TriominoKind::I) => &[(0, 0), (1, 0), (2, 0)],
            Self::Triomino(TriominoKind::L) => &[(0, 0), (0, 1), (1, 1)],
            Self::Tetromino(kind) => kind.cells(),
        }
    }

    /// Rotation pivot in base-cell coordinates.
    fn pivot(self) -> (i8, i8) {
        match self {
            Self::Monomino | Self::Domino => (0, 0),
            Self::Triomino(TriominoKind::I) | Self::Tetromino(TetrominoKind::I) => (1, 0),
            Self::Triomino(TriominoKind::L) => (0, 1),
            Self::Tetromino(_) => (1, 1),
        }
    }

    /// Number of distinct rotation states; rotating a shape with one state is a no-op.
    pub fn rotation_states(self) -> u8 {
        match self {
            Self::Monomino | Self::Tetromino(TetrominoKind::O) => 1,
            Self::Domino | Self::Triomino(TriominoKind::I) => 2,
            Self::Triomino(TriominoKind::L) | Self::Tetromino(_) => 4,
        }
    }

    /// Cells relative to the anchor for `rotation`, in row-major order
    /// (top-left to bottom-right). Payload characters follow this order.
    pub fn cells(self, rotation: u8) -> Vec<(i32, i32)> {
        let r = rotation % self.rotation_states();
        let (cx, cy) = self.pivot();
        let mut out: Vec<(i32, i32)> = self
            .base_cells()
            .iter()
            .map(|&(dx, dy)| rotate_cell(dx, dy, r, cx, cy))
            .collect();
        out.sort_by_key(|&(x, y)| (y, x));
        out
    }
}

fn rotate_cell(dx: i8, dy: i8, r: u8, cx: i8, cy: i8) -> (i32, i32) {
    let dx = dx - cx;
    let dy = dy - cy;
    let (dx, dy) = match r {
        0 => (dx, dy),
        1 => (-dy, dx),
        2 => (-dx, -dy),
        3 => (dy, -dx),
        _ => (dx, dy),
    };
    (i32::from(dx + cx), i32::from(dy + cy))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDir {
    Clockwise,
    CounterClockwise,
}

impl RotationDir {
    fn apply(self, rotation: u8, states: u8) -> u8 {
        match self {
            Self::Clockwise => (rotation + 1) % states,
            Self::CounterClockwise => (rotation + states - 1) % states,
        }
    }
}

/// Falling piece: shape, anchor, rotation and the characters it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
    pub rotation: u8,
    pub payload: Vec<char>,
    pub is_bomb: bool,
}

impl Piece {
    pub fn new(shape: Shape, payload: impl IntoIterator<Item = char>) -> Self {
        Self {
            shape,
            x: 0,
            y: 0,
            rotation: 0,
            payload: payload.into_iter().take(4).collect(),
            is_bomb: false,
        }
    }

    /// Success bomb: a single cell that blasts its surroundings when it locks.
    pub fn bomb() -> Self {
        Self {
            is_bomb: true,
            ..Self::new(Shape::Monomino, [BOMB_GLYPH])
        }
    }

    /// Absolute board coordinates of the occupied cells, row-major.
    pub fn cells(&self) -> Vec<(i32, i32)> {
        self.shape
            .cells(self.rotation)
            .into_iter()
            .map(|(dx, dy)| (self.x + dx, self.y + dy))
            .collect()
    }

    /// Character for the `index`-th occupied cell: the last payload character
    /// repeats when the shape has more cells than characters.
    pub fn glyph_for(&self, index: usize) -> char {
        match self.payload.len() {
            0 => BOMB_GLYPH,
            len => self.payload[index.min(len - 1)],
        }
    }

    pub fn cells_with_glyphs(&self) -> Vec<(i32, i32, char)> {
        self.cells()
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| (x, y, self.glyph_for(i)))
            .collect()
    }

    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self.clone()
        }
    }

    pub fn rotated(&self, dir: RotationDir) -> Self {
        Self {
            rotation: dir.apply(self.rotation, self.shape.rotation_states()),
            ..self.clone()
        }
    }
}
