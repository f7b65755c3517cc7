/// Top Moves Use Case
///
/// This use case runs one search and shapes its result for the wire. It is the
/// synchronous body that the compute service executes on a blocking worker.
///
/// ## Workflow
/// 1. Run the engine on an already validated `SearchRequest`
/// 2. Convert poses to `[rotation, x, y]` arrays
/// 3. Return the `TopMovesResponse`
///
/// ## Example
/// ```rust,ignore
/// use topmoves_service::application::use_cases::TopMovesUseCase;
/// use topmoves_service::domain::search::{Cancellation, HybridSearch};
///
/// let use_case = TopMovesUseCase::new(HybridSearch::default());
/// let response = use_case.execute(&request, &Cancellation::new())?;
/// ```

use crate::domain::search::{Cancellation, MoveSearch, SearchError, SearchRequest, TopMoves};
use crate::shared::protocol::{NextBoxMove, NoNextBoxMove, TopMovesResponse};

impl From<TopMoves> for TopMovesResponse {
    fn from(moves: TopMoves) -> Self {
        TopMovesResponse {
            next_box: moves
                .next_box
                .into_iter()
                .map(|m| NextBoxMove {
                    first_placement: m.first.to_array(),
                    second_placement: m.second.to_array(),
                    playout_score: m.score,
                })
                .collect(),
            no_next_box: moves
                .no_next_box
                .into_iter()
                .map(|m| NoNextBoxMove {
                    first_placement: m.first.to_array(),
                    playout_score: m.score,
                })
                .collect(),
        }
    }
}

/// Top Moves Use Case
///
/// Generic over the search engine to support dependency injection.
///
/// # Type Parameters
/// * `S` - Search implementation (must implement `MoveSearch`)
pub struct TopMovesUseCase<S: MoveSearch> {
    engine: S,
}

impl<S: MoveSearch> TopMovesUseCase<S> {
    pub fn new(engine: S) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &S {
        &self.engine
    }

    /// Executes the search
    ///
    /// # Returns
    /// * `Ok(TopMovesResponse)` - ranked moves, best first
    /// * `Err(SearchError)` - the engine failed or was cancelled
    pub fn execute(
        &self,
        request: &SearchRequest,
        cancel: &Cancellation,
    ) -> Result<TopMovesResponse, SearchError> {
        let moves = self.engine.search(request, cancel)?;
        Ok(moves.into())
    }
}
