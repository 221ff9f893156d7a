//! The playfield grid and the pure operations the game rules are built on.
//!
//! Coordinates are (x, y) with x growing rightwards and y growing downwards;
//! row 0 is the top of the visible board. A piece may extend above the board
//! (negative y) while it spawns or rotates, which several operations have to
//! account for explicitly.

use crate::piece::Shape;
use crate::{BOARD_HEIGHT, BOARD_WIDTH, GARBAGE_CELL};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The 10x20 playfield. Cell values are 0 (empty) or 1..=7 (piece identity).
///
/// The grid never changes size; it is created empty and only ever mutated in
/// place by lock-in, line clearing, garbage injection and reset.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Board {
    pub cells: [[u8; BOARD_WIDTH]; BOARD_HEIGHT],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [[0; BOARD_WIDTH]; BOARD_HEIGHT],
        }
    }

    /// Tests whether `shape` placed with its top-left corner at (x, y)
    /// collides with the board bounds or settled cells.
    ///
    /// Cells above the visible board (board y < 0) only collide against the
    /// horizontal bounds, never against board contents, so a piece can hang
    /// partially above the board while spawning or rotating.
    pub fn collides(&self, shape: &Shape, x: i32, y: i32) -> bool {
        for (row, cells) in shape.rows().iter().enumerate() {
            for (col, &cell) in cells.iter().enumerate() {
                if cell == 0 {
                    continue;
                }

                let board_x = x + col as i32;
                let board_y = y + row as i32;

                if board_x < 0 || board_x >= BOARD_WIDTH as i32 || board_y >= BOARD_HEIGHT as i32 {
                    return true;
                }
                if board_y >= 0 && self.cells[board_y as usize][board_x as usize] != 0 {
                    return true;
                }
            }
        }
        false
    }

    /// Writes the occupied cells of `shape` into the board at (x, y).
    ///
    /// Returns `true` if the piece was forced to lock while any occupied cell
    /// was still above the visible board - an immediate loss for the owning
    /// player. Cells already visited before the offending one keep their
    /// writes, matching the incremental lock-in behavior of the game rules.
    pub fn merge(&mut self, shape: &Shape, x: i32, y: i32) -> bool {
        for (row, cells) in shape.rows().iter().enumerate() {
            for (col, &cell) in cells.iter().enumerate() {
                if cell == 0 {
                    continue;
                }

                let board_y = y + row as i32;
                if board_y < 0 {
                    return true;
                }
                self.cells[board_y as usize][(x + col as i32) as usize] = cell;
            }
        }
        false
    }

    /// Removes every complete row, shifting the rows above it down and
    /// inserting an empty row at the top. Returns the number of rows removed.
    ///
    /// Rows are scanned bottom-to-top and the same index is re-checked after
    /// a removal, since the rows above shift down into it. Callers that want
    /// a per-row side effect (the original fires a sound per cleared line)
    /// trigger it once per counted row.
    pub fn clear_lines(&mut self) -> u32 {
        let mut cleared = 0;
        let mut y = BOARD_HEIGHT;

        while y > 0 {
            let row = y - 1;
            if self.cells[row].iter().all(|&cell| cell != 0) {
                for shift in (1..=row).rev() {
                    self.cells[shift] = self.cells[shift - 1];
                }
                self.cells[0] = [0; BOARD_WIDTH];
                cleared += 1;
                // Re-check the same row index next iteration.
            } else {
                y -= 1;
            }
        }
        cleared
    }

    /// Injects `count` garbage rows from the bottom.
    ///
    /// Each injection discards the top row entirely, shifts everything up and
    /// appends a bottom row that is fully filled except for one uniformly
    /// random gap column, chosen fresh per row.
    pub fn apply_penalty(&mut self, count: u32, rng: &mut impl Rng) {
        for _ in 0..count {
            for row in 0..BOARD_HEIGHT - 1 {
                self.cells[row] = self.cells[row + 1];
            }

            let gap = rng.gen_range(0..BOARD_WIDTH);
            let mut garbage = [GARBAGE_CELL; BOARD_WIDTH];
            garbage[gap] = 0;
            self.cells[BOARD_HEIGHT - 1] = garbage;
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::PieceId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn filled_row() -> [u8; BOARD_WIDTH] {
        [3; BOARD_WIDTH]
    }

    #[test]
    fn new_board_is_empty() {
        let board = Board::new();
        assert!(board
            .cells
            .iter()
            .all(|row| row.iter().all(|&cell| cell == 0)));
    }

    #[test]
    fn collides_with_left_and_right_bounds() {
        let board = Board::new();
        let shape = Shape::of(PieceId::O);

        assert!(board.collides(&shape, -1, 0));
        assert!(!board.collides(&shape, 0, 0));
        assert!(!board.collides(&shape, (BOARD_WIDTH - 2) as i32, 0));
        assert!(board.collides(&shape, (BOARD_WIDTH - 1) as i32, 0));
    }

    #[test]
    fn collides_with_floor_but_not_above_board() {
        let board = Board::new();
        let shape = Shape::of(PieceId::O);

        // Above the visible board only the width bounds apply.
        assert!(!board.collides(&shape, 4, -2));
        assert!(board.collides(&shape, -1, -2));

        assert!(!board.collides(&shape, 4, (BOARD_HEIGHT - 2) as i32));
        assert!(board.collides(&shape, 4, (BOARD_HEIGHT - 1) as i32));
    }

    #[test]
    fn collides_with_settled_cells_only_below_row_zero() {
        let mut board = Board::new();
        board.cells[5][4] = 7;
        let shape = Shape::of(PieceId::O);

        assert!(board.collides(&shape, 4, 4));
        assert!(board.collides(&shape, 4, 5));
        assert!(!board.collides(&shape, 4, 7));
    }

    #[test]
    fn merge_writes_piece_identity() {
        let mut board = Board::new();
        let shape = Shape::of(PieceId::O);

        let game_over = board.merge(&shape, 4, 18);
        assert!(!game_over);
        assert_eq!(board.cells[18][4], 2);
        assert_eq!(board.cells[18][5], 2);
        assert_eq!(board.cells[19][4], 2);
        assert_eq!(board.cells[19][5], 2);
    }

    #[test]
    fn merge_above_board_is_game_over() {
        let mut board = Board::new();
        let shape = Shape::of(PieceId::O);

        assert!(board.merge(&shape, 4, -1));
    }

    #[test]
    fn merge_i_piece_at_minus_one_is_game_over() {
        // The I matrix has its occupied row at index 1, so y = -1 puts those
        // cells exactly at board row 0; y = -2 puts them above it.
        let mut board = Board::new();
        let shape = Shape::of(PieceId::I);

        assert!(!board.clone().merge(&shape, 3, -1));
        assert!(board.merge(&shape, 3, -2));
    }

    #[test]
    fn clear_lines_noop_on_incomplete_rows() {
        let mut board = Board::new();
        board.cells[19] = filled_row();
        board.cells[19][0] = 0;

        let before = board.clone();
        assert_eq!(board.clear_lines(), 0);
        assert_eq!(board, before);
    }

    #[test]
    fn clear_lines_removes_single_complete_row() {
        let mut board = Board::new();
        board.cells[18][3] = 5;
        board.cells[19] = filled_row();

        assert_eq!(board.clear_lines(), 1);
        assert!(board.cells[0].iter().all(|&cell| cell == 0));
        // The stack above the cleared row shifted down by one.
        assert_eq!(board.cells[19][3], 5);
        assert_eq!(board.cells[18][3], 0);
    }

    #[test]
    fn clear_lines_rechecks_row_index_for_stacked_clears() {
        let mut board = Board::new();
        board.cells[17] = filled_row();
        board.cells[18][2] = 4;
        board.cells[19] = filled_row();

        assert_eq!(board.clear_lines(), 2);
        assert_eq!(board.cells[19][2], 4);
        assert!(board.cells[18].iter().all(|&cell| cell == 0));
    }

    #[test]
    fn apply_penalty_keeps_dimensions_and_gap() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut board = Board::new();
        board.cells[0][0] = 9; // sentinel in the discarded top row
        board.cells[10][5] = 3;

        board.apply_penalty(2, &mut rng);

        for row in &board.cells[BOARD_HEIGHT - 2..] {
            let filled = row.iter().filter(|&&cell| cell != 0).count();
            assert_eq!(filled, BOARD_WIDTH - 1);
            assert!(row
                .iter()
                .all(|&cell| cell == 0 || cell == GARBAGE_CELL));
        }
        // Rows shifted up by two; the sentinel fell off the top.
        assert_eq!(board.cells[8][5], 3);
        assert!(!board.cells.iter().flatten().any(|&cell| cell == 9));
    }

    #[test]
    fn apply_penalty_gaps_are_chosen_per_row() {
        // With enough rows a fixed gap column would be vanishingly unlikely.
        let mut rng = StdRng::seed_from_u64(42);
        let mut board = Board::new();
        board.apply_penalty(12, &mut rng);

        let gaps: Vec<usize> = board.cells[BOARD_HEIGHT - 12..]
            .iter()
            .map(|row| row.iter().position(|&cell| cell == 0).unwrap())
            .collect();
        assert!(gaps.windows(2).any(|pair| pair[0] != pair[1]));
    }
}
