//! Host grid abstraction
//!
//! The engine resolves cell ranges through [`Grid`]. [`Workbook`] implements it so formulas can
//! be evaluated directly against an in-memory workbook.

use crate::engine::Engine;
use crate::error::{FormulaError, FormulaResult};
use crate::value::Value;
use gridcalc_core::{CellValue, Workbook, Worksheet};

/// Value resolver consulted for cell-range and cross-sheet lookups
pub trait Grid {
    /// Evaluated value of a cell
    ///
    /// Formula cells re-enter the engine with [`Engine::try_evaluate`] so failures (including
    /// circular references) propagate to the caller. `sheet` is `None` for the first sheet.
    fn cell_value(
        &self,
        engine: &Engine,
        sheet: Option<&str>,
        row: u32,
        col: u16,
    ) -> FormulaResult<Value>;

    /// Check whether a sheet exists (case-sensitive)
    fn has_sheet(&self, name: &str) -> bool;

    /// Name of the sheet a `None` sheet refers to
    fn default_sheet(&self) -> Option<&str> {
        None
    }

    /// Check whether a row is hidden
    fn is_row_hidden(&self, _sheet: Option<&str>, _row: u32) -> bool {
        false
    }

    /// Check whether a column is hidden
    fn is_column_hidden(&self, _sheet: Option<&str>, _col: u16) -> bool {
        false
    }
}

fn sheet_of<'w>(workbook: &'w Workbook, sheet: Option<&str>) -> FormulaResult<&'w Worksheet> {
    match sheet {
        Some(name) => workbook
            .worksheet_by_name(name)
            .ok_or_else(|| FormulaError::InvalidCellReference(format!("unknown sheet '{}'", name))),
        None => workbook
            .worksheet(0)
            .ok_or_else(|| FormulaError::InvalidCellReference("workbook has no sheets".into())),
    }
}

impl Grid for Workbook {
    fn cell_value(
        &self,
        engine: &Engine,
        sheet: Option<&str>,
        row: u32,
        col: u16,
    ) -> FormulaResult<Value> {
        let worksheet = sheet_of(self, sheet)?;
        match worksheet.value_ref_at(row, col) {
            None => Ok(Value::Empty),
            Some(CellValue::Formula(text)) => {
                engine.try_evaluate(text, Some(self), Some(worksheet.name()), row, col)
            }
            Some(value) => Ok(Value::from(value)),
        }
    }

    fn has_sheet(&self, name: &str) -> bool {
        self.worksheet_by_name(name).is_some()
    }

    fn default_sheet(&self) -> Option<&str> {
        self.worksheet(0).map(Worksheet::name)
    }

    fn is_row_hidden(&self, sheet: Option<&str>, row: u32) -> bool {
        sheet_of(self, sheet).map_or(false, |ws| ws.is_row_hidden(row))
    }

    fn is_column_hidden(&self, sheet: Option<&str>, col: u16) -> bool {
        sheet_of(self, sheet).map_or(false, |ws| ws.is_column_hidden(col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();

        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", 10.0).unwrap();
        sheet.set_cell_formula("A2", "=A1*2").unwrap();
        sheet.set_row_hidden(2, true);

        let data = wb.worksheet_by_name_mut("Data").unwrap();
        data.set_cell_value("B2", "text").unwrap();
        wb
    }

    #[test]
    fn test_cell_values() {
        let wb = workbook();
        let engine = Engine::new();

        assert_eq!(wb.cell_value(&engine, None, 0, 0), Ok(Value::Number(10.0)));
        assert_eq!(wb.cell_value(&engine, None, 1, 0), Ok(Value::Number(20.0)));
        assert_eq!(wb.cell_value(&engine, None, 5, 5), Ok(Value::Empty));
        assert_eq!(
            wb.cell_value(&engine, Some("Data"), 1, 1),
            Ok(Value::String("text".into()))
        );
        assert!(wb.cell_value(&engine, Some("Missing"), 0, 0).is_err());
    }

    #[test]
    fn test_sheets_and_visibility() {
        let wb = workbook();

        assert!(wb.has_sheet("Data"));
        assert!(!wb.has_sheet("data"));
        assert!(wb.is_row_hidden(None, 2));
        assert!(wb.is_row_hidden(Some("Sheet1"), 2));
        assert!(!wb.is_row_hidden(Some("Data"), 2));
        assert!(!wb.is_column_hidden(None, 0));
    }

    #[test]
    fn test_default_sheet() {
        assert_eq!(workbook().default_sheet(), Some("Sheet1"));
        assert_eq!(Workbook::empty().default_sheet(), None);
    }
}
