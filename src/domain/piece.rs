/// Tetromino definitions
///
/// Rotation states use the NES orientation matrices: each state is a set of four
/// `(row, col)` cells inside a 4x4 box that is translated over the board. The
/// tables are built once and never mutated afterwards, so every search thread can
/// read them without synchronization.

use lazy_static::lazy_static;
use std::fmt;
use std::str::FromStr;

/// Board column at which every piece box spawns
pub const SPAWN_X: i8 = 3;

/// The seven tetrominoes, in the numeric order used on the wire (`0..=6`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Piece {
    I,
    O,
    L,
    J,
    T,
    S,
    Z,
}

impl Piece {
    pub const ALL: [Piece; 7] = [
        Piece::I,
        Piece::O,
        Piece::L,
        Piece::J,
        Piece::T,
        Piece::S,
        Piece::Z,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Piece> {
        Self::ALL.get(index).copied()
    }

    pub fn as_char(self) -> char {
        match self {
            Piece::I => 'I',
            Piece::O => 'O',
            Piece::L => 'L',
            Piece::J => 'J',
            Piece::T => 'T',
            Piece::S => 'S',
            Piece::Z => 'Z',
        }
    }

    /// Row of the box at spawn. The I box sits one row higher so its flat state
    /// lands on the top row.
    pub fn spawn_y(self) -> i8 {
        match self {
            Piece::I => -2,
            _ => -1,
        }
    }

    pub fn rotation_count(self) -> usize {
        PIECE_TABLE[self.index()].len()
    }

    pub fn shape(self, rotation: usize) -> &'static Shape {
        let states = &PIECE_TABLE[self.index()];
        &states[rotation % states.len()]
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Error returned when a piece token is neither a letter nor an index
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown piece '{0}' (expected one of I O L J T S Z or 0-6)")]
pub struct UnknownPiece(pub String);

impl FromStr for Piece {
    type Err = UnknownPiece;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        if let Ok(index) = token.parse::<usize>() {
            return Piece::from_index(index).ok_or_else(|| UnknownPiece(s.to_string()));
        }
        match token.to_ascii_uppercase().as_str() {
            "I" => Ok(Piece::I),
            "O" => Ok(Piece::O),
            "L" => Ok(Piece::L),
            "J" => Ok(Piece::J),
            "T" => Ok(Piece::T),
            "S" => Ok(Piece::S),
            "Z" => Ok(Piece::Z),
            _ => Err(UnknownPiece(s.to_string())),
        }
    }
}

/// One rotation state of a piece
#[derive(Debug, Clone)]
pub struct Shape {
    /// Column bitmask for each of the four box rows (bit `c` = box column `c`)
    pub row_masks: [u16; 4],
    pub min_row: i8,
    pub max_row: i8,
    pub min_col: i8,
    pub max_col: i8,
}

impl Shape {
    fn from_cells(cells: [(i8, i8); 4]) -> Self {
        let mut row_masks = [0u16; 4];
        for &(r, c) in &cells {
            row_masks[r as usize] |= 1 << c;
        }
        Self {
            row_masks,
            min_row: cells.iter().map(|c| c.0).min().unwrap_or(0),
            max_row: cells.iter().map(|c| c.0).max().unwrap_or(0),
            min_col: cells.iter().map(|c| c.1).min().unwrap_or(0),
            max_col: cells.iter().map(|c| c.1).max().unwrap_or(0),
        }
    }

    /// Box row `r` shifted to board columns for a box placed at column `x`
    #[inline]
    pub fn board_mask(&self, r: usize, x: i8) -> u16 {
        let mask = self.row_masks[r];
        if x >= 0 {
            mask << x
        } else {
            mask >> (-x)
        }
    }

    /// Leftmost and rightmost box column that keeps the piece on the board
    pub fn x_range(&self, width: i8) -> (i8, i8) {
        (-self.min_col, width - 1 - self.max_col)
    }
}

lazy_static! {
    static ref PIECE_TABLE: [Vec<Shape>; 7] = [
        // I
        vec![
            Shape::from_cells([(2, 0), (2, 1), (2, 2), (2, 3)]),
            Shape::from_cells([(0, 2), (1, 2), (2, 2), (3, 2)]),
        ],
        // O
        vec![Shape::from_cells([(1, 1), (1, 2), (2, 1), (2, 2)])],
        // L
        vec![
            Shape::from_cells([(1, 1), (1, 2), (1, 3), (2, 1)]),
            Shape::from_cells([(0, 1), (0, 2), (1, 2), (2, 2)]),
            Shape::from_cells([(0, 3), (1, 1), (1, 2), (1, 3)]),
            Shape::from_cells([(0, 2), (1, 2), (2, 2), (2, 3)]),
        ],
        // J
        vec![
            Shape::from_cells([(1, 1), (1, 2), (1, 3), (2, 3)]),
            Shape::from_cells([(0, 2), (1, 2), (2, 1), (2, 2)]),
            Shape::from_cells([(0, 1), (1, 1), (1, 2), (1, 3)]),
            Shape::from_cells([(0, 2), (0, 3), (1, 2), (2, 2)]),
        ],
        // T
        vec![
            Shape::from_cells([(1, 1), (1, 2), (1, 3), (2, 2)]),
            Shape::from_cells([(0, 2), (1, 1), (1, 2), (2, 2)]),
            Shape::from_cells([(0, 2), (1, 1), (1, 2), (1, 3)]),
            Shape::from_cells([(0, 2), (1, 2), (1, 3), (2, 2)]),
        ],
        // S
        vec![
            Shape::from_cells([(1, 2), (1, 3), (2, 1), (2, 2)]),
            Shape::from_cells([(0, 2), (1, 2), (1, 3), (2, 3)]),
        ],
        // Z
        vec![
            Shape::from_cells([(1, 1), (1, 2), (2, 2), (2, 3)]),
            Shape::from_cells([(0, 3), (1, 2), (1, 3), (2, 2)]),
        ],
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_letters_and_indices() {
        assert_eq!("T".parse::<Piece>().unwrap(), Piece::T);
        assert_eq!("z".parse::<Piece>().unwrap(), Piece::Z);
        assert_eq!("0".parse::<Piece>().unwrap(), Piece::I);
        assert_eq!("6".parse::<Piece>().unwrap(), Piece::Z);
        assert!("7".parse::<Piece>().is_err());
        assert!("Q".parse::<Piece>().is_err());
        assert!("".parse::<Piece>().is_err());
    }

    #[test]
    fn test_every_shape_has_four_cells() {
        for piece in Piece::ALL {
            for r in 0..piece.rotation_count() {
                let cells: u32 = piece
                    .shape(r)
                    .row_masks
                    .iter()
                    .map(|m| m.count_ones())
                    .sum();
                assert_eq!(cells, 4, "{} rotation {}", piece, r);
            }
        }
    }

    #[test]
    fn test_rotation_counts() {
        assert_eq!(Piece::O.rotation_count(), 1);
        assert_eq!(Piece::I.rotation_count(), 2);
        assert_eq!(Piece::S.rotation_count(), 2);
        assert_eq!(Piece::T.rotation_count(), 4);
    }

    #[test]
    fn test_board_mask_negative_offset() {
        // T 竖直状态最左列为1，可以放在 x = -1
        let shape = Piece::T.shape(1);
        let (min_x, max_x) = shape.x_range(10);
        assert_eq!(min_x, -1);
        assert_eq!(max_x, 7);
        assert_eq!(shape.board_mask(1, -1), 0b11);
    }
}
