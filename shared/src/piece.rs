//! Tetromino shapes, rotation and spawning.
//!
//! Each of the seven piece identities has exactly one canonical occupancy
//! matrix; the cell values double as the identity (1..=7) so a locked board
//! still knows which piece a cell came from. Rotation is the plain
//! transpose-and-reverse clockwise turn with a single-cell horizontal wall
//! kick - no SRS kick tables.

use crate::board::Board;
use crate::BOARD_WIDTH;
use rand::Rng;

/// One of the seven piece identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceId {
    I,
    O,
    T,
    J,
    L,
    S,
    Z,
}

impl PieceId {
    pub const ALL: [PieceId; 7] = [
        PieceId::I,
        PieceId::O,
        PieceId::T,
        PieceId::J,
        PieceId::L,
        PieceId::S,
        PieceId::Z,
    ];

    /// The cell value written into the board for this identity.
    pub fn cell_value(self) -> u8 {
        match self {
            PieceId::I => 1,
            PieceId::O => 2,
            PieceId::T => 3,
            PieceId::J => 4,
            PieceId::L => 5,
            PieceId::S => 6,
            PieceId::Z => 7,
        }
    }
}

/// A square occupancy matrix for one piece in one rotation state.
///
/// Sizes in play are 2x2 (O), 3x3 (T, J, L, S, Z) and 4x4 (I).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    cells: Vec<Vec<u8>>,
}

impl Shape {
    /// The canonical (spawn-orientation) matrix for an identity.
    pub fn of(id: PieceId) -> Self {
        let v = id.cell_value();
        let cells = match id {
            PieceId::I => vec![
                vec![0, 0, 0, 0],
                vec![v, v, v, v],
                vec![0, 0, 0, 0],
                vec![0, 0, 0, 0],
            ],
            PieceId::O => vec![vec![v, v], vec![v, v]],
            PieceId::T => vec![vec![0, v, 0], vec![v, v, v], vec![0, 0, 0]],
            PieceId::J => vec![vec![v, 0, 0], vec![v, v, v], vec![0, 0, 0]],
            PieceId::L => vec![vec![0, 0, v], vec![v, v, v], vec![0, 0, 0]],
            PieceId::S => vec![vec![0, v, v], vec![v, v, 0], vec![0, 0, 0]],
            PieceId::Z => vec![vec![v, v, 0], vec![0, v, v], vec![0, 0, 0]],
        };
        Self { cells }
    }

    /// The matrix rotated 90 degrees clockwise: transpose, then reverse each
    /// resulting row. Symmetric shapes (O) come back unchanged in effect.
    pub fn rotated(&self) -> Self {
        let size = self.cells.len();
        let mut cells = vec![vec![0u8; size]; size];
        for (row, row_cells) in self.cells.iter().enumerate() {
            for (col, &cell) in row_cells.iter().enumerate() {
                cells[col][size - 1 - row] = cell;
            }
        }
        Self { cells }
    }

    /// Matrix side length.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.cells
    }
}

/// The one falling piece a player controls: a shape plus the board offset of
/// its top-left corner. Replaced wholesale on rotation and lock-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// Spawns a piece horizontally centered at the top of the board.
    ///
    /// The caller is responsible for the spawn-collision check; a freshly
    /// spawned piece that already collides is an immediate game-over.
    pub fn spawn(shape: Shape) -> Self {
        let x = (BOARD_WIDTH / 2) as i32 - (shape.size() / 2) as i32;
        Self { shape, x, y: 0 }
    }
}

/// Draws a uniformly random shape. Independent draws, no bag fairness.
pub fn random_shape(rng: &mut impl Rng) -> Shape {
    Shape::of(PieceId::ALL[rng.gen_range(0..PieceId::ALL.len())])
}

/// Attempts to rotate `piece` clockwise in place.
///
/// The rotation is tried at the current x, then one cell left, then one cell
/// right. If all three collide the rotation is rejected and the piece keeps
/// its original shape and position. Returns whether the rotation stuck.
pub fn try_rotate(piece: &mut Piece, board: &Board) -> bool {
    let rotated = piece.shape.rotated();

    for dx in [0, -1, 1] {
        if !board.collides(&rotated, piece.x + dx, piece.y) {
            piece.x += dx;
            piece.shape = rotated;
            return true;
        }
    }
    false
}

/// Re-validates the active piece after garbage rows pushed the stack up.
///
/// While the piece collides it is shifted up one cell at a time; once it has
/// moved more than 2 cells above its pre-penalty position and still collides,
/// the player has lost. Returns `true` on game-over.
pub fn resolve_penalty_collision(piece: &mut Piece, board: &Board) -> bool {
    let start_y = piece.y;
    while board.collides(&piece.shape, piece.x, piece.y) {
        if start_y - piece.y > 2 {
            return true;
        }
        piece.y -= 1;
    }
    false
}
