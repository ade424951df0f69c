//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Evaluation types
    CalculationStats,
    CellAddress,
    CellRange,
    // Cell types
    CellValue,
    // Engine types
    Engine,
    EngineOptions,
    // Error types
    Error,
    FormulaError,
    FormulaResult,
    Result,
    SheetCalculation,
    Value,
    // Main types
    Workbook,
    // Extension traits
    WorkbookEvaluationExt,
    Worksheet,
};
