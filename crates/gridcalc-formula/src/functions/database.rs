//! Database functions
//!
//! A database is a range whose first row holds field names and whose remaining rows are
//! records. A criteria block has a header row naming fields and one or more condition rows:
//! conditions in the same row must all hold, any row may match.

use super::criteria::Criteria;
use super::{eval_arg, has_arg, numeric_cell, range_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::value::Value;
use log::trace;

/// A condition on one database column
struct FieldCondition {
    column: usize,
    criteria: Criteria,
}

/// Index of the column named by `field`, either a 1-based offset or a header text
fn field_column(headers: &[Value], field: &Value) -> FormulaResult<usize> {
    match field.unformatted() {
        Value::Number(n) => {
            let offset = n.trunc();
            if offset < 1.0 || offset as usize > headers.len() {
                return Err(FormulaError::InvalidParameters(format!(
                    "field {} is outside the database",
                    n
                )));
            }
            Ok(offset as usize - 1)
        }
        other => header_column(headers, &other.to_text()).ok_or_else(|| {
            FormulaError::InvalidParameters(format!("unknown field '{}'", other.to_text()))
        }),
    }
}

fn header_column(headers: &[Value], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.to_text().eq_ignore_ascii_case(name.trim()))
}

/// Compile the criteria block into alternatives of AND-ed conditions
fn criteria_rows(
    headers: &[Value],
    block: &[Vec<Value>],
) -> FormulaResult<Vec<Vec<FieldCondition>>> {
    let (criteria_headers, rows) = match block.split_first() {
        Some(split) => split,
        None => return Ok(Vec::new()),
    };

    let mut columns = Vec::with_capacity(criteria_headers.len());
    for header in criteria_headers {
        if header.is_empty() {
            columns.push(None);
            continue;
        }
        let name = header.to_text();
        let column = header_column(headers, &name)
            .ok_or_else(|| FormulaError::InvalidCriteria(format!("unknown field '{}'", name)))?;
        columns.push(Some(column));
    }

    let mut alternatives = Vec::with_capacity(rows.len());
    for row in rows {
        let mut conditions = Vec::new();
        for (cell, column) in row.iter().zip(&columns) {
            if let (Some(column), false) = (column, cell.is_empty()) {
                conditions.push(FieldCondition {
                    column: *column,
                    criteria: Criteria::parse(cell)?,
                });
            }
        }
        alternatives.push(conditions);
    }

    Ok(alternatives)
}

fn record_matches(record: &[Value], alternatives: &[Vec<FieldCondition>]) -> bool {
    // A header-only block selects every record
    if alternatives.is_empty() {
        return true;
    }

    alternatives.iter().any(|conditions| {
        conditions.iter().all(|condition| {
            let value = record.get(condition.column).unwrap_or(&Value::Empty);
            condition.criteria.matches(value)
        })
    })
}

/// DCOUNT(database, [field], criteria)
///
/// With a field, counts matching records whose field holds a number; without one, counts the
/// matching records.
pub fn fn_dcount(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let database = ctx.range_rows(&range_arg(args, 0, ctx)?)?;
    let (headers, records) = match database.split_first() {
        Some(split) => split,
        None => return Ok(Value::Number(0.0)),
    };

    // DCOUNT(database, criteria) leaves out the field
    let (field_index, criteria_index) = if args.len() == 2 { (None, 1) } else { (Some(1), 2) };

    let field = match field_index {
        Some(index) if has_arg(args, index) => {
            let field = eval_arg(args, index, ctx)?;
            if field.is_empty() {
                None
            } else {
                Some(field_column(headers, &field)?)
            }
        }
        _ => None,
    };

    let block = ctx.range_rows(&range_arg(args, criteria_index, ctx)?)?;
    let alternatives = criteria_rows(headers, &block)?;

    let count = records
        .iter()
        .filter(|record| record_matches(record, &alternatives))
        .filter(|record| match field {
            Some(column) => record.get(column).and_then(numeric_cell).is_some(),
            None => true,
        })
        .count();

    trace!("DCOUNT matched {} of {} records", count, records.len());
    Ok(Value::Number(count as f64))
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::{FormulaError, FormulaResult};
    use crate::value::Value;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    /// Database in A1:C6, criteria blocks from column E
    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();

        let rows: [(&str, &str, Option<f64>); 6] = [
            ("Tree", "Height", None),
            ("Apple", "18", Some(105.0)),
            ("Pear", "12", Some(96.0)),
            ("Cherry", "13", Some(105.0)),
            ("Apple", "14", None),
            ("Pear", "9", Some(45.0)),
        ];
        for (i, (tree, height, profit)) in rows.iter().enumerate() {
            let row = i as u32;
            sheet.set_cell_value_at(row, 0, *tree).unwrap();
            match height.parse::<f64>() {
                Ok(n) => sheet.set_cell_value_at(row, 1, n).unwrap(),
                Err(_) => sheet.set_cell_value_at(row, 1, *height).unwrap(),
            }
            match profit {
                Some(n) => sheet.set_cell_value_at(row, 2, *n).unwrap(),
                None if row == 0 => sheet.set_cell_value_at(row, 2, "Profit").unwrap(),
                None => sheet.set_cell_value_at(row, 2, "n/a").unwrap(),
            }
        }

        // E1:F3: (Tree = Apple AND Height > 10) OR Tree = Pear
        sheet.set_cell_value("E1", "Tree").unwrap();
        sheet.set_cell_value("F1", "Height").unwrap();
        sheet.set_cell_value("E2", "Apple").unwrap();
        sheet.set_cell_value("F2", ">10").unwrap();
        sheet.set_cell_value("E3", "Pear").unwrap();

        // H1:H2: Height >= 13
        sheet.set_cell_value("H1", "height").unwrap();
        sheet.set_cell_value("H2", ">=13").unwrap();

        // J1:J2: unknown field
        sheet.set_cell_value("J1", "Age").unwrap();
        sheet.set_cell_value("J2", ">1").unwrap();

        wb
    }

    fn eval(wb: &Workbook, formula: &str) -> FormulaResult<Value> {
        Engine::new().try_evaluate(formula, Some(wb), None, 10, 10)
    }

    #[test]
    fn test_dcount_by_header() {
        let wb = workbook();
        assert_eq!(
            eval(&wb, "=DCOUNT(A1:C6, \"Profit\", E1:F3)"),
            Ok(Value::Number(3.0))
        );
        assert_eq!(
            eval(&wb, "=DCOUNT(A1:C6, \"profit\", H1:H2)"),
            Ok(Value::Number(2.0))
        );
    }

    #[test]
    fn test_dcount_by_offset() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=DCOUNT(A1:C6, 2, E1:F3)"), Ok(Value::Number(4.0)));
        assert_eq!(eval(&wb, "=DCOUNT(A1:C6, 1, E1:F3)"), Ok(Value::Number(0.0)));
        assert!(matches!(
            eval(&wb, "=DCOUNT(A1:C6, 4, E1:F3)"),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_dcount_without_field_counts_records() {
        let wb = workbook();
        assert_eq!(eval(&wb, "=DCOUNT(A1:C6, , E1:F3)"), Ok(Value::Number(4.0)));
        assert_eq!(eval(&wb, "=DCOUNT(A1:C6, H1:H2)"), Ok(Value::Number(3.0)));
        // Header-only block selects everything
        assert_eq!(eval(&wb, "=DCOUNT(A1:C6, , H1)"), Ok(Value::Number(5.0)));
    }

    #[test]
    fn test_dcount_errors() {
        let wb = workbook();
        assert!(matches!(
            eval(&wb, "=DCOUNT(A1:C6, \"Age\", E1:F3)"),
            Err(FormulaError::InvalidParameters(_))
        ));
        assert!(matches!(
            eval(&wb, "=DCOUNT(A1:C6, 3, J1:J2)"),
            Err(FormulaError::InvalidCriteria(_))
        ));
    }
}
