//! # gridcalc-formula
//!
//! Formula engine for gridcalc.
//!
//! This crate provides:
//! - Tokenizing and parsing formula text into expression trees
//! - Evaluation against a host [`Grid`] (any [`gridcalc_core::Workbook`] works)
//! - Built-in spreadsheet functions and registration of custom ones
//! - A bounded cache of parsed formulas and circular-reference detection
//! - Number/date display formatting
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::Workbook;
//! use gridcalc_formula::{Engine, Value};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 2.0).unwrap();
//! sheet.set_cell_value("A2", 3.0).unwrap();
//!
//! let engine = Engine::new();
//! let value = engine.try_evaluate("=SUM(A1:A2)*2", Some(&workbook), None, 0, 1);
//! assert_eq!(value, Ok(Value::Number(10.0)));
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod expr;
pub mod format;
pub mod functions;
pub mod grid;
pub mod parser;
pub mod token;
pub mod tokenizer;
pub mod value;

pub use context::EvaluationContext;
pub use engine::{Engine, EngineOptions, UnknownFunctionHandler, DEFAULT_CACHE_CAPACITY};
pub use error::{FormulaError, FormulaResult};
pub use expr::{BinaryOp, Expr, RangeRef, UnaryOp};
pub use format::format_value;
pub use functions::{FunctionDef, FunctionTable};
pub use grid::Grid;
pub use token::{Token, TokenId, TokenType, TokenValue};
pub use tokenizer::Tokenizer;
pub use value::Value;
