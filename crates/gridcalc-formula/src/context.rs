//! Evaluation context

use crate::engine::Engine;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{Expr, RangeRef};
use crate::grid::Grid;
use crate::value::Value;

/// Context for formula evaluation
///
/// Carries the engine, the host grid and the sheet/cell the formula is evaluated for.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub engine: &'a Engine,
    /// Host grid for cell lookups (ranges evaluate to `Empty` without one)
    pub grid: Option<&'a dyn Grid>,
    /// Current sheet (`None` means the grid's first sheet)
    pub sheet: Option<&'a str>,
    /// Current cell row (0-based)
    pub row: u32,
    /// Current cell column (0-based)
    pub col: u16,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        engine: &'a Engine,
        grid: Option<&'a dyn Grid>,
        sheet: Option<&'a str>,
        row: u32,
        col: u16,
    ) -> Self {
        Self {
            engine,
            grid,
            sheet,
            row,
            col,
        }
    }

    /// Evaluate an argument, resolving a returned [`Value::Reference`]
    pub fn evaluate_arg(&self, expr: &Expr) -> FormulaResult<Value> {
        let value = expr.evaluate(self)?;
        self.resolve(value)
    }

    /// Resolve a [`Value::Reference`] to the referenced cell values
    pub fn resolve(&self, value: Value) -> FormulaResult<Value> {
        match value {
            Value::Reference(range) => self.resolve_range(&range),
            other => Ok(other),
        }
    }

    /// Sheet a range refers to: its own, else the current one
    pub fn sheet_of<'r>(&self, range: &'r RangeRef) -> Option<&'r str>
    where
        'a: 'r,
    {
        range.sheet.as_deref().or(self.sheet)
    }

    /// Evaluate a range: a single cell yields its value, larger ranges a row-major list
    pub fn resolve_range(&self, range: &RangeRef) -> FormulaResult<Value> {
        let grid = match self.grid {
            Some(grid) => grid,
            None => return Ok(Value::Empty),
        };

        if let Some(name) = range.sheet.as_deref() {
            if !grid.has_sheet(name) {
                return Err(FormulaError::InvalidCellReference(format!(
                    "unknown sheet '{}'",
                    name
                )));
            }
        }

        let sheet = self.sheet_of(range);
        // Key by the resolved sheet so re-entry from a formula cell sees the same range
        let key_sheet = sheet.or_else(|| grid.default_sheet());
        let _guard = self
            .engine
            .enter_range(range.guard_key(key_sheet), || range.to_string())?;

        if range.range.is_single_cell() {
            let cell = range.range.start;
            return grid.cell_value(self.engine, sheet, cell.row, cell.col);
        }

        range
            .range
            .cells()
            .map(|cell| grid.cell_value(self.engine, sheet, cell.row, cell.col))
            .collect::<FormulaResult<Vec<_>>>()
            .map(Value::List)
    }

    /// Evaluate a range as rows of values, whatever its size
    pub fn range_rows(&self, range: &RangeRef) -> FormulaResult<Vec<Vec<Value>>> {
        let cols = range.col_count();
        let values = match self.resolve_range(range)? {
            Value::List(items) => items,
            single => vec![single],
        };

        if values.len() != range.row_count() * cols {
            // No grid: every cell is blank
            return Ok(vec![vec![Value::Empty; cols]; range.row_count()]);
        }

        Ok(values.chunks(cols).map(<[Value]>::to_vec).collect())
    }

    /// Evaluate a range as a flat row-major list, optionally skipping hidden rows/columns
    pub fn range_values(&self, range: &RangeRef, skip_hidden: bool) -> FormulaResult<Vec<Value>> {
        let rows = self.range_rows(range)?;
        if !skip_hidden {
            return Ok(rows.into_iter().flatten().collect());
        }

        let sheet = self.sheet_of(range);
        let start = range.range.start;
        let mut values = Vec::new();
        for (r, row) in rows.into_iter().enumerate() {
            let row_index = start.row + r as u32;
            if self.is_row_hidden(sheet, row_index) {
                continue;
            }
            for (c, value) in row.into_iter().enumerate() {
                if !self.is_column_hidden(sheet, start.col + c as u16) {
                    values.push(value);
                }
            }
        }
        Ok(values)
    }

    /// Check whether a row is hidden in the host grid
    pub fn is_row_hidden(&self, sheet: Option<&str>, row: u32) -> bool {
        self.grid.map_or(false, |grid| grid.is_row_hidden(sheet, row))
    }

    /// Check whether a column is hidden in the host grid
    pub fn is_column_hidden(&self, sheet: Option<&str>, col: u16) -> bool {
        self.grid.map_or(false, |grid| grid.is_column_hidden(sheet, col))
    }
}
