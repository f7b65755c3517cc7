/// Hybrid placement search
///
/// Two result lists are produced for every request:
/// - `next_box`: the current piece and the known next piece are placed together
///   (best second placement per first placement), then the resulting board is
///   valued with random playouts
/// - `no_next_box`: the current piece alone, valued with playouts
///
/// Every candidate is first ranked by a cheap static score; only the top
/// `refine_width` candidates get the expensive playout valuation.
///
/// Playouts draw `depth` random pieces and place each one greedily. The RNG for
/// a candidate is seeded from the request and the candidate's board, so results
/// are reproducible and independent of evaluation order.
///
/// Line clears advance the request's level and lines as in NES; every piece is
/// placed under the gravity of the level it spawns on.

use super::{Cancellation, HybridMove, MoveSearch, SearchError, SearchRequest, SingleMove, TopMoves};
use crate::domain::board::Board;
use crate::domain::evaluation::Evaluator;
use crate::domain::piece::Piece;
use crate::domain::placement::{GameProgress, MovementModel, Placement};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Cancellation is polled once per this many playouts
const CANCEL_POLL_INTERVAL: u32 = 16;

/// Search tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridConfig {
    /// Length of each result list
    pub max_results: usize,
    /// Candidates that receive playout refinement
    pub refine_width: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            refine_width: 8,
        }
    }
}

/// A candidate position waiting for playout valuation
struct Candidate {
    first: Placement,
    second: Option<Placement>,
    board: Board,
    /// Level and lines once `board` is reached
    progress: GameProgress,
    /// Line clear rewards collected on the way to `board`
    reward: f64,
    /// `reward` plus the static evaluation of `board`
    shallow: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HybridSearch {
    evaluator: Evaluator,
    config: HybridConfig,
}

impl HybridSearch {
    pub fn new(evaluator: Evaluator, config: HybridConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    fn single_candidates(
        &self,
        model: &MovementModel,
        board: &Board,
        progress: GameProgress,
        piece: Piece,
    ) -> Vec<Candidate> {
        model
            .placements_at(board, piece, progress.level)
            .into_iter()
            .filter_map(|first| {
                let (after, lines) = first.apply(board)?;
                let reward = self.evaluator.line_clear_reward(lines);
                Some(Candidate {
                    first,
                    second: None,
                    board: after,
                    progress: progress.after_clear(lines),
                    reward,
                    shallow: reward + self.evaluator.evaluate(&after),
                })
            })
            .collect()
    }

    /// Best second placement for every first placement
    fn pair_candidates(
        &self,
        model: &MovementModel,
        firsts: &[Candidate],
        next: Piece,
        cancel: &Cancellation,
    ) -> Result<Vec<Candidate>, SearchError> {
        let mut pairs = Vec::with_capacity(firsts.len());
        for first in firsts {
            cancel.check()?;
            let best = self
                .single_candidates(model, &first.board, first.progress, next)
                .into_iter()
                .max_by(|a, b| a.shallow.total_cmp(&b.shallow));
            if let Some(second) = best {
                pairs.push(Candidate {
                    first: first.first,
                    second: Some(second.first),
                    board: second.board,
                    progress: second.progress,
                    reward: first.reward + second.reward,
                    shallow: first.reward + second.shallow,
                });
            }
        }
        Ok(pairs)
    }

    /// Replaces the shallow score of the best candidates with a playout value and
    /// returns them ranked, best first.
    fn refine(
        &self,
        model: &MovementModel,
        request: &SearchRequest,
        mut candidates: Vec<Candidate>,
        cancel: &Cancellation,
    ) -> Result<Vec<(Candidate, f64)>, SearchError> {
        candidates.sort_by(|a, b| rank(a.shallow, b.shallow, a, b));
        candidates.truncate(self.config.refine_width);

        let mut refined = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            cancel.check()?;
            let value = candidate.reward
                + self.playout_value(model, request, &candidate.board, candidate.progress, cancel)?;
            refined.push((candidate, value));
        }
        refined.sort_by(|(a, va), (b, vb)| rank(*va, *vb, a, b));
        refined.truncate(self.config.max_results);
        Ok(refined)
    }

    /// Mean value of `playout_count` random continuations of `board`
    fn playout_value(
        &self,
        model: &MovementModel,
        request: &SearchRequest,
        board: &Board,
        progress: GameProgress,
        cancel: &Cancellation,
    ) -> Result<f64, SearchError> {
        if request.depth == 0 || request.playout_count == 0 {
            return Ok(self.evaluator.evaluate(board));
        }

        let mut rng = StdRng::seed_from_u64(request.seed() ^ board.fingerprint());
        let mut total = 0.0;
        for i in 0..request.playout_count {
            if i % CANCEL_POLL_INTERVAL == 0 {
                cancel.check()?;
            }
            total += self.playout(model, board, progress, request.depth, &mut rng);
        }
        Ok(total / request.playout_count as f64)
    }

    fn playout(
        &self,
        model: &MovementModel,
        board: &Board,
        mut progress: GameProgress,
        depth: u8,
        rng: &mut StdRng,
    ) -> f64 {
        let mut board = *board;
        let mut reward = 0.0;
        for _ in 0..depth {
            let piece = Piece::ALL[rng.gen_range(0..Piece::ALL.len())];
            let best = self
                .single_candidates(model, &board, progress, piece)
                .into_iter()
                .max_by(|a, b| a.shallow.total_cmp(&b.shallow));
            match best {
                Some(candidate) => {
                    reward += candidate.reward;
                    board = candidate.board;
                    progress = candidate.progress;
                }
                None => return reward + self.evaluator.topout(),
            }
        }
        reward + self.evaluator.evaluate(&board)
    }
}

/// Descending by score, ties broken by pose so the order is total
fn rank(score_a: f64, score_b: f64, a: &Candidate, b: &Candidate) -> Ordering {
    score_b
        .total_cmp(&score_a)
        .then_with(|| a.first.pose().cmp(&b.first.pose()))
        .then_with(|| a.second.map(|p| p.pose()).cmp(&b.second.map(|p| p.pose())))
}

impl MoveSearch for HybridSearch {
    fn search(&self, request: &SearchRequest, cancel: &Cancellation) -> Result<TopMoves, SearchError> {
        let model = MovementModel::new(request.timeline.clone(), request.level);
        let start = GameProgress::new(request.level, request.lines);
        let firsts = self.single_candidates(&model, &request.board, start, request.current);

        let next_box = match request.next {
            Some(next) => {
                let pairs = self.pair_candidates(&model, &firsts, next, cancel)?;
                self.refine(&model, request, pairs, cancel)?
                    .into_iter()
                    .filter_map(|(candidate, score)| {
                        Some(HybridMove {
                            first: candidate.first.pose(),
                            second: candidate.second?.pose(),
                            score,
                        })
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let no_next_box = self
            .refine(&model, request, firsts, cancel)?
            .into_iter()
            .map(|(candidate, score)| SingleMove {
                first: candidate.first.pose(),
                score,
            })
            .collect();

        Ok(TopMoves {
            next_box,
            no_next_box,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::BOARD_HEIGHT;
    use crate::domain::placement::InputTimeline;

    fn request(board: Board, next: Option<Piece>) -> SearchRequest {
        SearchRequest {
            board,
            current: Piece::I,
            next,
            level: 18,
            lines: 0,
            timeline: InputTimeline::default(),
            depth: 1,
            playout_count: 7,
        }
    }

    /// 底部4行只留最右列
    fn tetris_ready() -> Board {
        let mut rows = [0u16; BOARD_HEIGHT];
        for row in rows[BOARD_HEIGHT - 4..].iter_mut() {
            *row = 0b01_1111_1111;
        }
        Board::from_rows(rows)
    }

    #[test]
    fn test_takes_the_tetris() {
        let engine = HybridSearch::default();
        let moves = engine
            .search(&request(tetris_ready(), Some(Piece::T)), &Cancellation::new())
            .unwrap();

        let best = &moves.no_next_box[0];
        // 竖直 I 放入右侧井：旋转1，右移4列
        assert_eq!(best.first.rotation, 1);
        assert_eq!(best.first.x, 4);
        assert_eq!(moves.next_box[0].first, best.first);
    }

    #[test]
    fn test_results_sorted_and_capped() {
        let engine = HybridSearch::default();
        let moves = engine
            .search(&request(Board::empty(), Some(Piece::O)), &Cancellation::new())
            .unwrap();

        assert!(moves.no_next_box.len() <= 5);
        assert!(moves.next_box.len() <= 5);
        assert!(!moves.next_box.is_empty());
        for pair in moves.no_next_box.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for pair in moves.next_box.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_deterministic() {
        let engine = HybridSearch::default();
        let req = request(tetris_ready(), Some(Piece::L));
        let a = engine.search(&req, &Cancellation::new()).unwrap();
        let b = engine.search(&req, &Cancellation::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_lines_away_from_transition_do_not_change_results() {
        let engine = HybridSearch::default();
        let early = request(tetris_ready(), Some(Piece::L));
        let mut later = early.clone();
        later.lines = 50;

        let a = engine.search(&early, &Cancellation::new()).unwrap();
        let b = engine.search(&later, &Cancellation::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tetris_across_transition_raises_level() {
        let engine = HybridSearch::default();
        let model = MovementModel::new(InputTimeline::default(), 28);
        let board = tetris_ready();
        let is_tetris = |c: &Candidate| c.first.rotation == 1 && c.first.pose().x == 4;

        let before = GameProgress::new(28, 196);
        let candidates = engine.single_candidates(&model, &board, before, Piece::I);
        let tetris = candidates.iter().find(|c| is_tetris(c)).unwrap();
        assert_eq!(tetris.progress.level, 29);
        assert_eq!(tetris.progress.lines, 200);

        let early = GameProgress::new(28, 0);
        let candidates = engine.single_candidates(&model, &board, early, Piece::I);
        let tetris = candidates.iter().find(|c| is_tetris(c)).unwrap();
        assert_eq!(tetris.progress.level, 28);
    }

    #[test]
    fn test_without_next_piece() {
        let engine = HybridSearch::default();
        let moves = engine
            .search(&request(Board::empty(), None), &Cancellation::new())
            .unwrap();
        assert!(moves.next_box.is_empty());
        assert!(!moves.no_next_box.is_empty());
    }

    #[test]
    fn test_cancelled_search() {
        let engine = HybridSearch::default();
        let cancel = Cancellation::new();
        cancel.cancel();
        let result = engine.search(&request(Board::empty(), Some(Piece::T)), &cancel);
        assert_eq!(result, Err(SearchError::Cancelled));
    }

    #[test]
    fn test_topped_out_board_yields_empty_lists() {
        let mut rows = [0u16; BOARD_HEIGHT];
        for row in rows.iter_mut() {
            *row = 0b01_1111_1110;
        }
        let engine = HybridSearch::default();
        let moves = engine
            .search(&request(Board::from_rows(rows), Some(Piece::T)), &Cancellation::new())
            .unwrap();
        assert_eq!(moves, TopMoves::default());
    }
}
