//! Workbook evaluation helpers
//!
//! Evaluates formula cells of a [`Workbook`] through a shared [`Engine`]. Formula cells that
//! reference other formula cells are evaluated on demand, so no calculation order is needed.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 20.0).unwrap();
//! sheet.set_cell_formula("A3", "=A1+A2").unwrap();
//!
//! let engine = Engine::new();
//! let value = workbook.evaluate_cell(&engine, "Sheet1", "A3").unwrap();
//! assert_eq!(value, Value::Number(30.0));
//!
//! let sheet = workbook.calculate_sheet(&engine, "Sheet1").unwrap();
//! assert_eq!(sheet.stats.formula_count, 1);
//! ```

use crate::{CellAddress, Engine, FormulaError, FormulaResult, Value, Workbook};
use gridcalc_formula::Grid;
use log::{debug, warn};

/// Statistics from a sheet calculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Number of formula cells on the sheet
    pub formula_count: usize,
    /// Number of formula cells evaluated successfully
    pub cells_calculated: usize,
    /// Number of formula cells that failed
    pub errors: usize,
}

/// Result of evaluating one formula cell
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatedCell {
    pub address: CellAddress,
    pub formula: String,
    pub result: FormulaResult<Value>,
}

/// Evaluated formula cells of a sheet, in row-major order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetCalculation {
    pub cells: Vec<CalculatedCell>,
    pub stats: CalculationStats,
}

impl SheetCalculation {
    /// Result for a cell address, if it holds a formula
    pub fn get(&self, address: &str) -> Option<&FormulaResult<Value>> {
        let address = CellAddress::parse(address).ok()?;
        self.cells
            .iter()
            .find(|cell| cell.address == address)
            .map(|cell| &cell.result)
    }
}

/// Extension trait for Workbook to evaluate its cells
pub trait WorkbookEvaluationExt {
    /// Evaluated value of a cell (formula cells are evaluated, literals converted)
    fn evaluate_cell(&self, engine: &Engine, sheet: &str, address: &str) -> FormulaResult<Value>;

    /// Display text of a cell using the engine's formatting options
    fn display_cell(&self, engine: &Engine, sheet: &str, address: &str) -> FormulaResult<String>;

    /// Evaluate every formula cell of a sheet
    ///
    /// Per-cell failures are recorded in the result rather than aborting the sheet.
    fn calculate_sheet(&self, engine: &Engine, sheet: &str) -> FormulaResult<SheetCalculation>;
}

impl WorkbookEvaluationExt for Workbook {
    fn evaluate_cell(&self, engine: &Engine, sheet: &str, address: &str) -> FormulaResult<Value> {
        if !self.has_sheet(sheet) {
            return Err(FormulaError::InvalidCellReference(format!(
                "unknown sheet '{}'",
                sheet
            )));
        }
        let address = CellAddress::parse(address)?;
        let value = self.cell_value(engine, Some(sheet), address.row, address.col)?;
        Ok(value)
    }

    fn display_cell(&self, engine: &Engine, sheet: &str, address: &str) -> FormulaResult<String> {
        let value = self.evaluate_cell(engine, sheet, address)?;
        Ok(engine.display_text(&value))
    }

    fn calculate_sheet(&self, engine: &Engine, sheet: &str) -> FormulaResult<SheetCalculation> {
        let worksheet = self.worksheet_by_name(sheet).ok_or_else(|| {
            FormulaError::InvalidCellReference(format!("unknown sheet '{}'", sheet))
        })?;

        let mut formulas: Vec<(CellAddress, &str)> = worksheet
            .formula_cells()
            .map(|((row, col), text)| (CellAddress::new(row, col), text))
            .collect();
        formulas.sort_by_key(|(address, _)| *address);

        let mut calculation = SheetCalculation::default();
        calculation.stats.formula_count = formulas.len();

        for (address, formula) in formulas {
            let result =
                engine.try_evaluate(formula, Some(self), Some(sheet), address.row, address.col);
            match &result {
                Ok(_) => calculation.stats.cells_calculated += 1,
                Err(e) => {
                    warn!("Evaluation error at {}!{}: {}", sheet, address, e);
                    calculation.stats.errors += 1;
                }
            }
            calculation.cells.push(CalculatedCell {
                address,
                formula: formula.to_string(),
                result,
            });
        }

        debug!(
            "calculated sheet {}: {} formulas, {} errors",
            sheet, calculation.stats.formula_count, calculation.stats.errors
        );
        Ok(calculation)
    }
}
