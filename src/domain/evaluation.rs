/// Static board evaluation
///
/// A linear surface heuristic tuned for right-well stacking: holes, bumpiness and
/// height are penalised, an open well in the rightmost column is rewarded, and
/// line clears are scored separately so tetrises beat burns.

use super::board::{Board, BOARD_WIDTH};

const WELL_COLUMN: usize = BOARD_WIDTH as usize - 1;

/// Heuristic weights
#[derive(Debug, Clone, PartialEq)]
pub struct EvalWeights {
    pub hole: f64,
    pub bumpiness: f64,
    pub average_height: f64,
    /// Column height above which the stack is considered dangerous
    pub danger_height: u8,
    pub danger: f64,
    pub well_depth: f64,
    pub tetris: f64,
    pub burn_per_line: f64,
    /// Value of a position where the next piece cannot be placed
    pub topout: f64,
}

impl Default for EvalWeights {
    fn default() -> Self {
        Self {
            hole: -10.0,
            bumpiness: -1.0,
            average_height: -0.5,
            danger_height: 10,
            danger: -1.5,
            well_depth: 2.0,
            tetris: 30.0,
            burn_per_line: -6.0,
            topout: -200.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    weights: EvalWeights,
}

impl Evaluator {
    pub fn new(weights: EvalWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &EvalWeights {
        &self.weights
    }

    /// Scores the resting surface of `board`; higher is better
    pub fn evaluate(&self, board: &Board) -> f64 {
        let w = &self.weights;
        let heights = board.column_heights();

        let mut bumpiness = 0u32;
        for pair in heights[..WELL_COLUMN].windows(2) {
            bumpiness += pair[0].abs_diff(pair[1]) as u32;
        }
        let stack_edge = heights[WELL_COLUMN - 1];
        let well = heights[WELL_COLUMN];
        if well > stack_edge {
            bumpiness += (well - stack_edge) as u32;
        }
        let well_depth = stack_edge.saturating_sub(well).min(4);

        let total: u32 = heights.iter().map(|h| *h as u32).sum();
        let average = total as f64 / heights.len() as f64;
        let max = heights.iter().copied().max().unwrap_or(0);
        let excess = max.saturating_sub(w.danger_height) as f64;

        w.hole * board.hole_count() as f64
            + w.bumpiness * bumpiness as f64
            + w.average_height * average
            + w.danger * excess * excess
            + w.well_depth * well_depth as f64
    }

    /// Score contribution of clearing `lines` rows with one piece
    pub fn line_clear_reward(&self, lines: u32) -> f64 {
        match lines {
            0 => 0.0,
            4 => self.weights.tetris,
            n => self.weights.burn_per_line * n as f64,
        }
    }

    pub fn topout(&self) -> f64 {
        self.weights.topout
    }
}
