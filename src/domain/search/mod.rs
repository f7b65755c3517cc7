/// MoveSearch Trait - Computation Boundary
///
/// The front door only knows this trait. A search is a pure function of its
/// `SearchRequest`: implementations must be callable from many blocking workers at
/// once (`Send + Sync`) and must not let one call observe another's data.
///
/// ## Cancellation
/// Searches are CPU-bound and run on blocking threads, so they cannot be aborted
/// from outside. Callers hand in a [`Cancellation`] flag instead; long-running
/// implementations poll it and return [`SearchError::Cancelled`] once it is set.
/// Polling is best effort; a search that never polls simply runs to completion.
///
/// ## Implementations
/// - `HybridSearch`: placement search with random playouts (the default engine)
///
/// ## Example
/// ```rust,ignore
/// use topmoves_service::domain::search::{Cancellation, HybridSearch, MoveSearch};
///
/// let engine = HybridSearch::default();
/// let moves = engine.search(&request, &Cancellation::new())?;
/// println!("best: {:?}", moves.no_next_box.first());
/// ```

pub mod hybrid;

pub use hybrid::{HybridConfig, HybridSearch};

use super::board::Board;
use super::piece::Piece;
use super::placement::{InputTimeline, Pose};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A validated search request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRequest {
    pub board: Board,
    pub current: Piece,
    /// Piece shown in the next box, if known
    pub next: Option<Piece>,
    pub level: u8,
    pub lines: u32,
    pub timeline: InputTimeline,
    /// Number of random pieces simulated after the known ones
    pub depth: u8,
    /// Number of random sequences averaged per candidate
    pub playout_count: u32,
}

impl SearchRequest {
    /// Seed for the playout RNG; identical requests always get the same seed.
    ///
    /// `lines` is left out: it only matters through level transitions, which the
    /// search applies itself.
    pub fn seed(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.board.hash(&mut hasher);
        self.current.hash(&mut hasher);
        self.next.hash(&mut hasher);
        self.level.hash(&mut hasher);
        self.timeline.hash(&mut hasher);
        self.depth.hash(&mut hasher);
        self.playout_count.hash(&mut hasher);
        hasher.finish()
    }
}

/// Best continuation when both the current and the next piece are known
#[derive(Debug, Clone, PartialEq)]
pub struct HybridMove {
    pub first: Pose,
    pub second: Pose,
    pub score: f64,
}

/// Best placement of the current piece alone
#[derive(Debug, Clone, PartialEq)]
pub struct SingleMove {
    pub first: Pose,
    pub score: f64,
}

/// Ranked search results, best first
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopMoves {
    pub next_box: Vec<HybridMove>,
    pub no_next_box: Vec<SingleMove>,
}

/// Search errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,

    #[error("search failed: {0}")]
    Internal(String),
}

/// Cooperative cancellation flag shared between a caller and a running search
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(SearchError::Cancelled)` once the flag is set
    #[inline]
    pub fn check(&self) -> Result<(), SearchError> {
        if self.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Core search trait
pub trait MoveSearch: Send + Sync + 'static {
    /// Computes the ranked moves for `request`
    fn search(&self, request: &SearchRequest, cancel: &Cancellation) -> Result<TopMoves, SearchError>;
}

impl<S: MoveSearch + ?Sized> MoveSearch for Arc<S> {
    fn search(&self, request: &SearchRequest, cancel: &Cancellation) -> Result<TopMoves, SearchError> {
        (**self).search(request, cancel)
    }
}

impl<S: MoveSearch + ?Sized> MoveSearch for Box<S> {
    fn search(&self, request: &SearchRequest, cancel: &Cancellation) -> Result<TopMoves, SearchError> {
        (**self).search(request, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(depth: u8) -> SearchRequest {
        SearchRequest {
            board: Board::empty(),
            current: Piece::T,
            next: Some(Piece::I),
            level: 18,
            lines: 0,
            timeline: InputTimeline::default(),
            depth,
            playout_count: 7,
        }
    }

    #[test]
    fn test_seed_is_stable_and_input_dependent() {
        assert_eq!(request(1).seed(), request(1).seed());
        assert_ne!(request(1).seed(), request(2).seed());

        let mut later = request(1);
        later.lines = 57;
        assert_eq!(later.seed(), request(1).seed());
        assert_ne!(later, request(1));
    }

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let cancel = Cancellation::new();
        let observer = cancel.clone();
        assert!(observer.check().is_ok());
        cancel.cancel();
        assert!(observer.is_cancelled());
        assert_eq!(observer.check(), Err(SearchError::Cancelled));
    }
}
