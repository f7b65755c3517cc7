/// Domain Layer - Core Computation
///
/// This layer contains the pure computation behind the service: the playfield,
/// the tetrominoes, placement generation, board evaluation, the move search and
/// request validation. It has no dependency on networking or async runtimes.
///
/// ## Modules
/// - `board`: 20x10 bitboard with locking and line clears
/// - `piece`: tetromino rotation tables
/// - `placement`: reachable placements under the NES movement model
/// - `evaluation`: static surface heuristic
/// - `search`: `MoveSearch` trait and the hybrid playout engine
/// - `validation`: query validation rules

pub mod board;
pub mod evaluation;
pub mod piece;
pub mod placement;
pub mod search;
pub mod validation;

// Re-export key types
pub use board::Board;
pub use piece::Piece;
pub use search::{Cancellation, HybridSearch, MoveSearch, SearchError, SearchRequest, TopMoves};
pub use validation::{QueryValidator, ValidationConfig, ValidationError};
