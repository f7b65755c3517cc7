/// Query Validator - Request Admission Rules
///
/// This module turns a raw `TopMovesQuery` from the wire into a `SearchRequest`.
/// Nothing reaches the search engine without passing through here, so malformed
/// or oversized requests are rejected before any CPU is spent on them.
///
/// ## Validation Rules
/// - Board must be exactly 200 cells of `0`-`3`
/// - Pieces must be a letter (`IOLJTSZ`) or an index `0`-`6`
/// - Input timeline must be non-empty, only `X`/`.`, contain an `X`, and be short
/// - Level, depth and playout count must be within configured limits
///
/// Omitted optional fields take the defaults used by the game server
/// (level 18, 0 lines, `X.`, depth 3, 343 playouts).
///
/// ## Usage
/// ```rust,ignore
/// use topmoves_service::domain::validation::QueryValidator;
///
/// let validator = QueryValidator::new();
/// match validator.validate(&query) {
///     Ok(request) => println!("valid: {:?}", request.current),
///     Err(e) => println!("Validation error: {}", e),
/// }
/// ```

use crate::domain::board::Board;
use crate::domain::piece::Piece;
use crate::domain::placement::InputTimeline;
use crate::domain::search::SearchRequest;
use crate::shared::protocol::{PieceToken, TopMovesQuery};

pub const DEFAULT_LEVEL: u8 = 18;
pub const DEFAULT_DEPTH: u8 = 3;
pub const DEFAULT_PLAYOUT_COUNT: u32 = 343;
pub const DEFAULT_TIMELINE: &str = "X.";

/// Validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Board string has the wrong size or characters
    InvalidBoard(String),

    /// Current or next piece is not a tetromino
    InvalidPiece(String),

    /// Input frame timeline is malformed or too long
    InvalidTimeline(String),

    /// Level exceeds the supported range
    LevelOutOfRange(String),

    /// Search depth exceeds the maximum
    DepthOutOfRange(String),

    /// Playout count exceeds the maximum
    PlayoutCountOutOfRange(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBoard(msg) => write!(f, "Invalid board: {}", msg),
            ValidationError::InvalidPiece(msg) => write!(f, "Invalid piece: {}", msg),
            ValidationError::InvalidTimeline(msg) => write!(f, "Invalid input timeline: {}", msg),
            ValidationError::LevelOutOfRange(msg) => write!(f, "Level out of range: {}", msg),
            ValidationError::DepthOutOfRange(msg) => write!(f, "Depth out of range: {}", msg),
            ValidationError::PlayoutCountOutOfRange(msg) => {
                write!(f, "Playout count out of range: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Query validation limits
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum level (inclusive); NES levels wrap at 255
    pub max_level: u32,

    /// Maximum playout depth (inclusive)
    pub max_depth: u32,

    /// Maximum playouts per candidate (inclusive)
    pub max_playout_count: u32,

    /// Maximum input timeline length in frames
    pub max_timeline_len: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_level: 255,
            max_depth: 4,
            max_playout_count: 2401,
            max_timeline_len: 64,
        }
    }
}

/// Query validator
///
/// Validates queries according to the configured limits.
#[derive(Debug, Clone, Default)]
pub struct QueryValidator {
    config: ValidationConfig,
}

impl QueryValidator {
    /// Creates a new validator with default limits
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    /// Creates a new validator with custom limits
    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates a query and builds the search request
    ///
    /// # Returns
    /// * `Ok(SearchRequest)` if every field is acceptable
    /// * `Err(ValidationError)` for the first field that is not
    pub fn validate(&self, query: &TopMovesQuery) -> Result<SearchRequest, ValidationError> {
        let board = Board::parse(&query.board)
            .map_err(|e| ValidationError::InvalidBoard(e.to_string()))?;

        let current = self.validate_piece(&query.current_piece)?;
        let next = query
            .next_piece
            .as_ref()
            .map(|token| self.validate_piece(token))
            .transpose()?;

        let level = self.validate_level(query.level)?;
        let timeline = self.validate_timeline(query.input_frame_timeline.as_deref())?;
        let depth = self.validate_depth(query.depth)?;
        let playout_count = self.validate_playout_count(query.playout_count)?;

        Ok(SearchRequest {
            board,
            current,
            next,
            level,
            lines: query.lines.unwrap_or(0),
            timeline,
            depth,
            playout_count,
        })
    }

    fn validate_piece(&self, token: &PieceToken) -> Result<Piece, ValidationError> {
        let parsed = match token {
            PieceToken::Index(index) => Piece::from_index(*index as usize)
                .ok_or_else(|| format!("piece index {} is not in 0-6", index)),
            PieceToken::Name(name) => name.parse::<Piece>().map_err(|e| e.to_string()),
        };
        parsed.map_err(ValidationError::InvalidPiece)
    }

    fn validate_level(&self, level: Option<u32>) -> Result<u8, ValidationError> {
        let Some(level) = level else {
            return Ok(DEFAULT_LEVEL);
        };
        if level > self.config.max_level {
            return Err(ValidationError::LevelOutOfRange(format!(
                "Level {} exceeds maximum {}",
                level, self.config.max_level
            )));
        }
        u8::try_from(level)
            .map_err(|_| ValidationError::LevelOutOfRange(format!("Level {} exceeds 255", level)))
    }

    fn validate_timeline(&self, timeline: Option<&str>) -> Result<InputTimeline, ValidationError> {
        let timeline = timeline.unwrap_or(DEFAULT_TIMELINE);
        if timeline.len() > self.config.max_timeline_len {
            return Err(ValidationError::InvalidTimeline(format!(
                "Timeline has {} frames (max: {})",
                timeline.len(),
                self.config.max_timeline_len
            )));
        }
        timeline
            .parse::<InputTimeline>()
            .map_err(|e| ValidationError::InvalidTimeline(e.to_string()))
    }

    fn validate_depth(&self, depth: Option<u32>) -> Result<u8, ValidationError> {
        let depth = depth.unwrap_or(DEFAULT_DEPTH as u32);
        if depth > self.config.max_depth {
            return Err(ValidationError::DepthOutOfRange(format!(
                "Depth {} exceeds maximum {}",
                depth, self.config.max_depth
            )));
        }
        u8::try_from(depth)
            .map_err(|_| ValidationError::DepthOutOfRange(format!("Depth {} exceeds 255", depth)))
    }

    fn validate_playout_count(&self, count: Option<u32>) -> Result<u32, ValidationError> {
        let count = count.unwrap_or(DEFAULT_PLAYOUT_COUNT);
        if count > self.config.max_playout_count {
            return Err(ValidationError::PlayoutCountOutOfRange(format!(
                "Playout count {} exceeds maximum {}",
                count, self.config.max_playout_count
            )));
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_query() -> TopMovesQuery {
        TopMovesQuery {
            board: "0".repeat(200),
            current_piece: PieceToken::Name("T".to_string()),
            next_piece: Some(PieceToken::Index(0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_query_with_defaults() {
        let validator = QueryValidator::new();
        let request = validator.validate(&valid_query()).unwrap();

        assert_eq!(request.current, Piece::T);
        assert_eq!(request.next, Some(Piece::I));
        assert_eq!(request.level, DEFAULT_LEVEL);
        assert_eq!(request.lines, 0);
        assert_eq!(request.depth, DEFAULT_DEPTH);
        assert_eq!(request.playout_count, DEFAULT_PLAYOUT_COUNT);
        assert_eq!(request.timeline.to_string(), DEFAULT_TIMELINE);
    }

    #[test]
    fn test_numeric_piece_name() {
        let validator = QueryValidator::new();
        let mut query = valid_query();
        query.current_piece = PieceToken::Name("4".to_string());
        assert_eq!(validator.validate(&query).unwrap().current, Piece::T);
    }

    #[test]
    fn test_invalid_board() {
        let validator = QueryValidator::new();
        let mut query = valid_query();
        query.board = "01".to_string();

        let result = validator.validate(&query);
        assert!(matches!(result, Err(ValidationError::InvalidBoard(_))));
    }

    #[test]
    fn test_invalid_pieces() {
        let validator = QueryValidator::new();

        let mut query = valid_query();
        query.current_piece = PieceToken::Index(7);
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::InvalidPiece(_))
        ));

        let mut query = valid_query();
        query.next_piece = Some(PieceToken::Name("X".to_string()));
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::InvalidPiece(_))
        ));
    }

    #[test]
    fn test_limits() {
        let validator = QueryValidator::with_config(ValidationConfig {
            max_level: 29,
            max_depth: 2,
            max_playout_count: 49,
            max_timeline_len: 4,
        });

        let mut query = valid_query();
        query.depth = Some(2);
        query.playout_count = Some(49);
        query.level = Some(29);
        assert!(validator.validate(&query).is_ok());

        let mut query = valid_query();
        query.depth = Some(3);
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::DepthOutOfRange(_))
        ));

        let mut query = valid_query();
        query.depth = Some(1);
        query.playout_count = Some(50);
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::PlayoutCountOutOfRange(_))
        ));

        let mut query = valid_query();
        query.depth = Some(1);
        query.playout_count = Some(7);
        query.level = Some(30);
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::LevelOutOfRange(_))
        ));

        let mut query = valid_query();
        query.depth = Some(1);
        query.playout_count = Some(7);
        query.input_frame_timeline = Some("X....".to_string());
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::InvalidTimeline(_))
        ));
    }

    #[test]
    fn test_bad_timeline() {
        let validator = QueryValidator::new();
        let mut query = valid_query();
        query.input_frame_timeline = Some("....".to_string());
        assert!(matches!(
            validator.validate(&query),
            Err(ValidationError::InvalidTimeline(_))
        ));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::DepthOutOfRange("Depth 9 exceeds maximum 4".to_string());
        assert_eq!(err.to_string(), "Depth out of range: Depth 9 exceeds maximum 4");
    }
}
