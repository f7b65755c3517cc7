/// Playfield
///
/// A 20x10 board stored as one `u16` bitmask per row, row 0 on top and bit `c`
/// for column `c`. Boards are `Copy` and every operation returns a new value, so a
/// search never shares a board with another request.

use super::piece::Piece;

pub const BOARD_WIDTH: i8 = 10;
pub const BOARD_HEIGHT: usize = 20;
pub const BOARD_CELLS: usize = BOARD_WIDTH as usize * BOARD_HEIGHT;
pub const FULL_ROW: u16 = (1 << BOARD_WIDTH) - 1;

/// Board string errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardParseError {
    #[error("board must have {expected} cells, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("invalid cell '{ch}' at index {index} (expected 0-3)")]
    InvalidCell { index: usize, ch: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    rows: [u16; BOARD_HEIGHT],
}

impl Board {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: [u16; BOARD_HEIGHT]) -> Self {
        let mut rows = rows;
        for row in rows.iter_mut() {
            *row &= FULL_ROW;
        }
        Self { rows }
    }

    /// Parses a row-major board string of 200 cells, top row first.
    ///
    /// `0` is empty; `1`, `2` and `3` (the colour variants sent by clients) are
    /// all treated as filled.
    pub fn parse(encoded: &str) -> Result<Self, BoardParseError> {
        let actual = encoded.chars().count();
        if actual != BOARD_CELLS {
            return Err(BoardParseError::WrongLength {
                expected: BOARD_CELLS,
                actual,
            });
        }

        let mut rows = [0u16; BOARD_HEIGHT];
        for (index, ch) in encoded.chars().enumerate() {
            let filled = match ch {
                '0' => false,
                '1' | '2' | '3' => true,
                _ => return Err(BoardParseError::InvalidCell { index, ch }),
            };
            if filled {
                let row = index / BOARD_WIDTH as usize;
                let col = index % BOARD_WIDTH as usize;
                rows[row] |= 1 << col;
            }
        }
        Ok(Self { rows })
    }

    /// Inverse of [`Board::parse`], using `0`/`1`
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(BOARD_CELLS);
        for row in &self.rows {
            for col in 0..BOARD_WIDTH {
                out.push(if row & (1 << col) != 0 { '1' } else { '0' });
            }
        }
        out
    }

    pub fn rows(&self) -> &[u16; BOARD_HEIGHT] {
        &self.rows
    }

    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        row < BOARD_HEIGHT && col < BOARD_WIDTH as usize && self.rows[row] & (1 << col) != 0
    }

    /// True if the piece box at `(x, y)` leaves the board sideways or through the
    /// floor, or overlaps a filled cell. Rows above the board never collide.
    pub fn collides(&self, piece: Piece, rotation: usize, x: i8, y: i8) -> bool {
        let shape = piece.shape(rotation);
        let (min_x, max_x) = shape.x_range(BOARD_WIDTH);
        if x < min_x || x > max_x {
            return true;
        }
        if y as i32 + shape.max_row as i32 >= BOARD_HEIGHT as i32 {
            return true;
        }

        for r in shape.min_row..=shape.max_row {
            let board_row = y as i32 + r as i32;
            if board_row < 0 {
                continue;
            }
            if self.rows[board_row as usize] & shape.board_mask(r as usize, x) != 0 {
                return true;
            }
        }
        false
    }

    /// Locks the piece at `(x, y)` and clears completed rows.
    ///
    /// Returns `None` when part of the piece would lock above the top row.
    pub fn lock(&self, piece: Piece, rotation: usize, x: i8, y: i8) -> Option<(Board, u32)> {
        let shape = piece.shape(rotation);
        let mut rows = self.rows;
        for r in shape.min_row..=shape.max_row {
            let mask = shape.board_mask(r as usize, x);
            if mask == 0 {
                continue;
            }
            let board_row = y as i32 + r as i32;
            if board_row < 0 || board_row >= BOARD_HEIGHT as i32 {
                return None;
            }
            rows[board_row as usize] |= mask;
        }

        let mut cleared = 0u32;
        let mut compacted = [0u16; BOARD_HEIGHT];
        let mut write = BOARD_HEIGHT;
        for row in rows.iter().rev() {
            if *row == FULL_ROW {
                cleared += 1;
                continue;
            }
            write -= 1;
            compacted[write] = *row;
        }
        Some((Board { rows: compacted }, cleared))
    }

    /// Height of each column, 0 for an empty column
    pub fn column_heights(&self) -> [u8; BOARD_WIDTH as usize] {
        let mut heights = [0u8; BOARD_WIDTH as usize];
        for (col, height) in heights.iter_mut().enumerate() {
            if let Some(top) = self.rows.iter().position(|row| row & (1 << col) != 0) {
                *height = (BOARD_HEIGHT - top) as u8;
            }
        }
        heights
    }

    /// Empty cells with at least one filled cell above them in the same column
    pub fn hole_count(&self) -> u32 {
        let mut covered = 0u16;
        let mut holes = 0;
        for row in &self.rows {
            holes += (covered & !row & FULL_ROW).count_ones();
            covered |= row;
        }
        holes
    }

    pub fn filled_cells(&self) -> u32 {
        self.rows.iter().map(|row| row.count_ones()).sum()
    }

    /// Stable 64-bit fingerprint, used to seed playouts
    pub fn fingerprint(&self) -> u64 {
        self.rows.iter().fold(0xcbf2_9ce4_8422_2325u64, |acc, row| {
            (acc ^ *row as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_bottom_rows(rows: &[u16]) -> Board {
        let mut all = [0u16; BOARD_HEIGHT];
        let start = BOARD_HEIGHT - rows.len();
        all[start..].copy_from_slice(rows);
        Board::from_rows(all)
    }

    #[test]
    fn test_parse_and_encode() {
        let mut encoded = "0".repeat(190);
        encoded.push_str("1111111110");
        let board = Board::parse(&encoded).unwrap();
        assert_eq!(board.rows()[19], 0b01_1111_1111);
        assert_eq!(board.encode(), encoded);
    }

    #[test]
    fn test_parse_colour_digits_are_filled() {
        let mut encoded = "0".repeat(190);
        encoded.push_str("2300000000");
        let board = Board::parse(&encoded).unwrap();
        assert!(board.is_filled(19, 0));
        assert!(board.is_filled(19, 1));
        assert!(!board.is_filled(19, 2));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            Board::parse("0101"),
            Err(BoardParseError::WrongLength {
                expected: 200,
                actual: 4
            })
        );

        let mut encoded = "0".repeat(199);
        encoded.push('x');
        assert_eq!(
            Board::parse(&encoded),
            Err(BoardParseError::InvalidCell { index: 199, ch: 'x' })
        );
    }

    #[test]
    fn test_collision_with_walls_and_floor() {
        let board = Board::empty();
        // 平放的 I 占据盒子第2行
        assert!(!board.collides(Piece::I, 0, 0, 17));
        assert!(board.collides(Piece::I, 0, 0, 18));
        assert!(board.collides(Piece::I, 0, -1, 0));
        assert!(board.collides(Piece::I, 0, 7, 0));
        assert!(!board.collides(Piece::I, 0, 6, 0));
    }

    #[test]
    fn test_lock_clears_lines() {
        let board = board_with_bottom_rows(&[0b01_1111_1111]);
        // 竖直 I 放在第9列（盒子列2），落到底部
        let (after, cleared) = board.lock(Piece::I, 1, 7, 16).unwrap();
        assert_eq!(cleared, 1);
        assert_eq!(after.column_heights()[9], 3);
        assert_eq!(after.filled_cells(), 3);
    }

    #[test]
    fn test_lock_above_top_is_topout() {
        let board = Board::empty();
        assert!(board.lock(Piece::T, 1, 3, -1).is_none());
    }

    #[test]
    fn test_heights_and_holes() {
        let board = board_with_bottom_rows(&[0b00_0000_0001, 0b00_0000_0000, 0b00_0000_0011]);
        let heights = board.column_heights();
        assert_eq!(heights[0], 3);
        assert_eq!(heights[1], 1);
        assert_eq!(heights[2], 0);
        assert_eq!(board.hole_count(), 1);
    }
}
