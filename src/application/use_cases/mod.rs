/// Use Cases - Application Business Logic
///
/// Each use case represents a single operation the service performs. Use cases
/// are synchronous and free of I/O so they can run on blocking worker threads.
///
/// ## Use Cases
/// - `TopMovesUseCase`: run a move search and shape the result for clients

pub mod top_moves;

pub use top_moves::TopMovesUseCase;
