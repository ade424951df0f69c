//! # gridcalc
//!
//! A spreadsheet formula engine: parse formula text, evaluate it against an in-memory workbook
//! and format the result for display.
//!
//! ## Features
//!
//! - Tokenizer and precedence-climbing parser producing expression trees
//! - Built-in math, statistical, lookup, text, date, logical, financial and database functions
//! - Custom functions and an unknown-function hook
//! - Bounded cache of parsed formulas
//! - Circular reference detection
//! - Number and date display formats
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! // Create a new workbook
//! let mut workbook = Workbook::new();
//!
//! // Get the first worksheet
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! // Set cell values
//! sheet.set_cell_value("A1", 1500.0).unwrap();
//! sheet.set_cell_value("A2", 2500.0).unwrap();
//!
//! // Set a formula
//! sheet.set_cell_formula("A3", "=SUM(A1:A2)").unwrap();
//!
//! let engine = Engine::new();
//! assert_eq!(
//!     workbook.evaluate_cell(&engine, "Sheet1", "A3").unwrap(),
//!     Value::Number(4000.0)
//! );
//! assert_eq!(
//!     engine.evaluate("=A3", Some("#,##0.00"), Some(&workbook), None, 0, 1),
//!     Value::String("4,000.00".into())
//! );
//! ```

pub mod evaluation;
pub mod prelude;

// Re-export evaluation types
pub use evaluation::{CalculatedCell, CalculationStats, SheetCalculation, WorkbookEvaluationExt};

// Re-export core types
pub use gridcalc_core::{
    CellAddress,
    CellRange,
    // Cell types
    CellValue,
    // Error types
    Error,
    Result,
    // Main types
    Workbook,
    Worksheet,

    MAX_COLS,
    // Constants
    MAX_ROWS,
    MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use gridcalc_formula::{
    format_value, Engine, EngineOptions, EvaluationContext, Expr, FormulaError, FormulaResult,
    FunctionDef, Grid, Value, DEFAULT_CACHE_CAPACITY,
};
