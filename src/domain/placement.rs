/// Placement generation
///
/// Enumerates the final resting positions a piece can reach from spawn under the
/// NES movement model:
/// - inputs (one rotation step and one shift step) only happen on frames marked
///   `X` in the repeating input timeline
/// - gravity moves the piece down one row every `frames_per_row(level)` frames
/// - once the target rotation and column are reached the piece is hard-dropped
///
/// Tucks and spins are not explored.

use super::board::{Board, BOARD_WIDTH};
use super::piece::{Piece, SPAWN_X};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// Upper bound on simulated frames for a single placement
const MAX_FRAMES: usize = 2_000;

/// Most pieces have well under 40 placements on an open board
pub type Placements = SmallVec<[Placement; 40]>;

/// Input timeline errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("input frame timeline is empty")]
    Empty,

    #[error("invalid timeline character '{ch}' at index {index} (expected 'X' or '.')")]
    InvalidChar { index: usize, ch: char },

    #[error("input frame timeline has no input frames")]
    NoInputFrames,
}

/// Repeating pattern of input (`X`) and idle (`.`) frames
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputTimeline {
    frames: Vec<bool>,
}

impl InputTimeline {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn is_input_frame(&self, frame: usize) -> bool {
        self.frames[frame % self.frames.len()]
    }
}

impl Default for InputTimeline {
    /// 30Hz tapping, the default of every caller
    fn default() -> Self {
        Self {
            frames: vec![true, false],
        }
    }
}

impl FromStr for InputTimeline {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TimelineError::Empty);
        }
        let frames = s
            .chars()
            .enumerate()
            .map(|(index, ch)| match ch {
                'X' | 'x' => Ok(true),
                '.' => Ok(false),
                _ => Err(TimelineError::InvalidChar { index, ch }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if !frames.iter().any(|f| *f) {
            return Err(TimelineError::NoInputFrames);
        }
        Ok(Self { frames })
    }
}

impl fmt::Display for InputTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            f.write_str(if *frame { "X" } else { "." })?;
        }
        Ok(())
    }
}

/// NES gravity: frames needed to fall one row at `level`
pub fn frames_per_row(level: u8) -> usize {
    match level {
        0 => 48,
        1 => 43,
        2 => 38,
        3 => 33,
        4 => 28,
        5 => 23,
        6 => 18,
        7 => 13,
        8 => 8,
        9 => 6,
        10..=12 => 5,
        13..=15 => 4,
        16..=18 => 3,
        19..=28 => 2,
        _ => 1,
    }
}

/// Lines at which a game started on `level` first levels up
pub fn transition_lines(level: u8) -> u32 {
    let level = level as u32;
    match level {
        0..=9 => (level + 1) * 10,
        10..=15 => 100,
        16..=19 => (level - 5) * 10,
        _ => 200,
    }
}

/// Level and line count of the game being searched.
///
/// The request only carries the current level, so it is treated as the start
/// level: until `transition_lines(level)` is reached the level stays put, after
/// that it rises every ten lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameProgress {
    pub level: u8,
    pub lines: u32,
    transitioned: bool,
}

impl GameProgress {
    pub fn new(level: u8, lines: u32) -> Self {
        Self {
            level,
            lines,
            transitioned: lines >= transition_lines(level),
        }
    }

    /// State after clearing `cleared` lines
    pub fn after_clear(self, cleared: u32) -> Self {
        if cleared == 0 {
            return self;
        }
        let lines = self.lines.saturating_add(cleared);
        let crossed_ten = lines / 10 > self.lines / 10;
        let reached = self.transitioned || lines >= transition_lines(self.level);

        if crossed_ten && reached {
            Self {
                level: self.level.saturating_add(1),
                lines,
                transitioned: true,
            }
        } else {
            Self {
                level: self.level,
                lines,
                transitioned: reached,
            }
        }
    }
}

/// Client-facing placement coordinate: rotation index, column shift and row
/// offset relative to the spawn pose `[0, 0, 0]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pose {
    pub rotation: u8,
    pub x: i8,
    pub y: i8,
}

impl Pose {
    pub fn to_array(self) -> [i32; 3] {
        [self.rotation as i32, self.x as i32, self.y as i32]
    }
}

/// A reachable resting position of a piece box on a board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub piece: Piece,
    pub rotation: u8,
    pub x: i8,
    pub y: i8,
}

impl Placement {
    pub fn pose(&self) -> Pose {
        Pose {
            rotation: self.rotation,
            x: self.x - SPAWN_X,
            y: self.y - self.piece.spawn_y(),
        }
    }

    /// Locks this placement onto `board`; `None` on topout
    pub fn apply(&self, board: &Board) -> Option<(Board, u32)> {
        board.lock(self.piece, self.rotation as usize, self.x, self.y)
    }
}

/// Movement rules for one request (timeline + gravity of the starting level)
#[derive(Debug, Clone)]
pub struct MovementModel {
    timeline: InputTimeline,
    level: u8,
}

impl MovementModel {
    pub fn new(timeline: InputTimeline, level: u8) -> Self {
        Self { timeline, level }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// All reachable placements of `piece`, in rotation-then-column order.
    ///
    /// Empty if the piece cannot spawn.
    pub fn placements(&self, board: &Board, piece: Piece) -> Placements {
        self.placements_at(board, piece, self.level)
    }

    /// Same as [`placements`](Self::placements) under the gravity of `level`
    pub fn placements_at(&self, board: &Board, piece: Piece, level: u8) -> Placements {
        let gravity = frames_per_row(level);
        let mut out = Placements::new();
        if board.collides(piece, 0, SPAWN_X, piece.spawn_y()) {
            return out;
        }

        for rotation in 0..piece.rotation_count() {
            let (min_x, max_x) = piece.shape(rotation).x_range(BOARD_WIDTH);
            for x in min_x..=max_x {
                let Some(y) = self.reach(board, piece, rotation, x, gravity) else {
                    continue;
                };
                let placement = Placement {
                    piece,
                    rotation: rotation as u8,
                    x,
                    y,
                };
                if placement.apply(board).is_some() {
                    out.push(placement);
                }
            }
        }
        out
    }

    /// Simulates inputs towards `(target_rotation, target_x)` and returns the row
    /// the piece rests on after the hard drop.
    fn reach(
        &self,
        board: &Board,
        piece: Piece,
        target_rotation: usize,
        target_x: i8,
        gravity: usize,
    ) -> Option<i8> {
        let count = piece.rotation_count();
        let clockwise = target_rotation;
        let counter = (count - target_rotation) % count;
        let step = if clockwise <= counter { 1 } else { count - 1 };

        let mut rotation = 0usize;
        let mut x = SPAWN_X;
        let mut y = piece.spawn_y();
        let mut frame = 0usize;

        while rotation != target_rotation || x != target_x {
            if frame > MAX_FRAMES {
                return None;
            }
            if self.timeline.is_input_frame(frame) {
                if rotation != target_rotation {
                    let next = (rotation + step) % count;
                    if board.collides(piece, next, x, y) {
                        return None;
                    }
                    rotation = next;
                }
                if x != target_x {
                    let next = x + (target_x - x).signum();
                    if board.collides(piece, rotation, next, y) {
                        return None;
                    }
                    x = next;
                }
            }

            frame += 1;
            if frame % gravity == 0 {
                if board.collides(piece, rotation, x, y + 1) {
                    // 在到达目标之前已经落地
                    return None;
                }
                y += 1;
            }
        }

        while !board.collides(piece, rotation, x, y + 1) {
            y += 1;
        }
        Some(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_parse() {
        let timeline: InputTimeline = "X..".parse().unwrap();
        assert_eq!(timeline.len(), 3);
        assert!(timeline.is_input_frame(0));
        assert!(!timeline.is_input_frame(1));
        assert!(timeline.is_input_frame(3));
        assert_eq!(timeline.to_string(), "X..");

        assert_eq!("".parse::<InputTimeline>(), Err(TimelineError::Empty));
        assert_eq!("...".parse::<InputTimeline>(), Err(TimelineError::NoInputFrames));
        assert_eq!(
            "X.a".parse::<InputTimeline>(),
            Err(TimelineError::InvalidChar { index: 2, ch: 'a' })
        );
    }

    #[test]
    fn test_gravity_table() {
        assert_eq!(frames_per_row(0), 48);
        assert_eq!(frames_per_row(18), 3);
        assert_eq!(frames_per_row(19), 2);
        assert_eq!(frames_per_row(29), 1);
        assert_eq!(frames_per_row(200), 1);
    }

    #[test]
    fn test_transition_lines() {
        assert_eq!(transition_lines(0), 10);
        assert_eq!(transition_lines(9), 100);
        assert_eq!(transition_lines(12), 100);
        assert_eq!(transition_lines(18), 130);
        assert_eq!(transition_lines(19), 140);
        assert_eq!(transition_lines(29), 200);
    }

    #[test]
    fn test_level_waits_for_transition() {
        // 18级开局，120行清3行还没到130
        let progress = GameProgress::new(18, 120).after_clear(3);
        assert_eq!(progress.level, 18);
        assert_eq!(progress.lines, 123);

        // 128行清一个四消跨过130，进入19级
        let progress = GameProgress::new(18, 128).after_clear(4);
        assert_eq!(progress.level, 19);
        assert_eq!(progress.lines, 132);

        // 转换之后每10行升一级
        let progress = progress.after_clear(4).after_clear(4);
        assert_eq!(progress.level, 20);
        assert_eq!(progress.lines, 140);
        let progress = progress.after_clear(2);
        assert_eq!(progress.level, 20);
        assert_eq!(progress.after_clear(0), progress);
    }

    #[test]
    fn test_game_past_transition_levels_every_ten_lines() {
        let progress = GameProgress::new(19, 158).after_clear(2);
        assert_eq!(progress.level, 20);
        // 跨越一次十位只升一级
        assert_eq!(GameProgress::new(18, 139).after_clear(1).level, 19);
        assert_eq!(GameProgress::new(255, 300).after_clear(4).level, 255);
    }

    #[test]
    fn test_placements_at_uses_given_gravity() {
        let slow: InputTimeline = "X.....".parse().unwrap();
        let model = MovementModel::new(slow.clone(), 18);
        let board = Board::empty();
        assert_eq!(model.level(), 18);
        assert_eq!(
            model.placements_at(&board, Piece::I, 29),
            MovementModel::new(slow, 29).placements(&board, Piece::I)
        );
    }

    #[test]
    fn test_empty_board_placement_counts() {
        let model = MovementModel::new(InputTimeline::default(), 18);
        let board = Board::empty();
        // 平放 I 有7列，竖放 I 有10列
        assert_eq!(model.placements(&board, Piece::I).len(), 17);
        assert_eq!(model.placements(&board, Piece::O).len(), 9);
        assert_eq!(model.placements(&board, Piece::T).len(), 34);
    }

    #[test]
    fn test_spawn_pose_drops_to_floor() {
        let model = MovementModel::new(InputTimeline::default(), 18);
        let board = Board::empty();
        let placements = model.placements(&board, Piece::T);
        let spawn_column = placements
            .iter()
            .find(|p| p.rotation == 0 && p.x == SPAWN_X)
            .unwrap();
        assert_eq!(spawn_column.pose(), Pose { rotation: 0, x: 0, y: 18 });
    }

    #[test]
    fn test_fast_gravity_limits_reach() {
        // 29级每帧下落一行，很慢的输入节奏无法把棋子移到最边缘
        let slow: InputTimeline = "X.....".parse().unwrap();
        let model = MovementModel::new(slow, 29);
        let board = Board::empty();
        let placements = model.placements(&board, Piece::I);
        assert!(placements.len() < 17);
        assert!(!placements.is_empty());
    }

    #[test]
    fn test_placements_rest_on_stack_without_overlap() {
        let mut rows = [0u16; 20];
        rows[19] = 0b11_1101_1110;
        rows[18] = 0b01_1100_1110;
        rows[17] = 0b00_1100_0100;
        rows[16] = 0b00_0100_0000;
        let board = Board::from_rows(rows);
        let model = MovementModel::new(InputTimeline::default(), 18);

        for piece in Piece::ALL {
            let placements = model.placements(&board, piece);
            assert!(!placements.is_empty());
            for p in placements.iter() {
                let rotation = p.rotation as usize;
                assert!(!board.collides(piece, rotation, p.x, p.y));
                assert!(board.collides(piece, rotation, p.x, p.y + 1));
            }
        }
    }

    #[test]
    fn test_blocked_spawn_has_no_placements() {
        let mut rows = [0u16; 20];
        for row in rows.iter_mut() {
            *row = 0b01_1111_1110;
        }
        let board = Board::from_rows(rows);
        let model = MovementModel::new(InputTimeline::default(), 18);
        assert!(model.placements(&board, Piece::T).is_empty());
    }
}
