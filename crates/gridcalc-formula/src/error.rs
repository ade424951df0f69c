//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula tokenizing, parsing or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    // === Lexical ===
    /// A `"` string literal was not closed
    #[error("Unterminated string")]
    UnterminatedString,

    /// A `#...#` date literal was not closed
    #[error("Unterminated date")]
    UnterminatedDate,

    /// A date literal or date argument could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// An unexpected character where an identifier was expected
    #[error("Identifier expected at position {0}")]
    IdentifierExpected(usize),

    /// A string literal used as a sheet prefix (`"Sheet"!A1`)
    #[error("Illegal cross-sheet reference")]
    IllegalCrossSheetReference,

    // === Syntactic ===
    /// Missing `(` or `)`
    #[error("Unbalanced parenthesis")]
    UnbalancedParenthesis,

    /// An operand is missing
    #[error("Expression expected")]
    ExpressionExpected,

    /// Malformed formula (e.g. missing comma between arguments)
    #[error("Syntax error: {0}")]
    SyntaxError(String),

    /// Fewer arguments than the function accepts
    #[error("Too few parameters for {0}")]
    TooFewParameters(String),

    /// More arguments than the function accepts
    #[error("Too many parameters for {0}")]
    TooManyParameters(String),

    /// Unknown function and no substitute from the unknown-function handler
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),

    // === Semantic / runtime ===
    /// Reference to a malformed address or an unknown sheet
    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),

    /// Criteria text that cannot be compiled
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Argument of the wrong type or outside the function's domain
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Index argument outside the referenced range
    #[error("Index out of range")]
    IndexOutOfRange,

    /// Lookup target not present
    #[error("Value not found")]
    ValueNotFound,

    /// A range was re-entered while it was being evaluated
    #[error("Circular reference: {0}")]
    CircularReference(String),

    /// RATE did not converge
    #[error("Rate does not converge")]
    RateNotConvergent,

    /// An arithmetic operation produced NaN
    #[error("Operation produces NaN")]
    DivisionProducesNaN,

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(err: gridcalc_core::Error) -> Self {
        FormulaError::InvalidCellReference(err.to_string())
    }
}
