//! Tests for formula evaluation against workbooks

use gridcalc::prelude::*;
use gridcalc::DEFAULT_CACHE_CAPACITY;
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;

fn eval(engine: &Engine, wb: &Workbook, formula: &str) -> FormulaResult<Value> {
    engine.try_evaluate(formula, Some(wb), None, 20, 20)
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    let engine = Engine::new();
    let wb = Workbook::new();

    assert_eq!(eval(&engine, &wb, "=1+2*3"), Ok(Value::Number(7.0)));
    assert_eq!(eval(&engine, &wb, "=(1+2)*3"), Ok(Value::Number(9.0)));
    assert_eq!(eval(&engine, &wb, "=2^3^2"), Ok(Value::Number(64.0)));
    assert_eq!(eval(&engine, &wb, "=\"5\"+1"), Ok(Value::Number(6.0)));
    assert_eq!(eval(&engine, &wb, "=1&2"), Ok(Value::String("12".into())));
    assert_eq!(eval(&engine, &wb, "=5>3"), Ok(Value::Boolean(true)));
}

/// Test that the entry point returns non-formulas unchanged and errors as text
#[test]
fn test_evaluate_entry_point() {
    let engine = Engine::new();
    let wb = Workbook::new();

    assert_eq!(
        engine.evaluate("plain text", None, Some(&wb), None, 0, 0),
        Value::String("plain text".into())
    );
    assert_eq!(
        engine.evaluate("=NOSUCH(1)", None, Some(&wb), None, 0, 0),
        Value::String("Error: Unsupported function: NOSUCH".into())
    );
    assert_eq!(
        engine.evaluate("=0.256", Some("0.0%"), Some(&wb), None, 0, 0),
        Value::String("25.6%".into())
    );
}

/// Test formula evaluation with cell and range references
#[test]
fn test_evaluate_with_references() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();
    sheet.set_cell_value("B1", 5.0).unwrap();
    sheet.set_cell_formula("C1", "=A1+B1").unwrap();
    sheet.set_cell_formula("C2", "=C1*2").unwrap();

    let engine = Engine::new();
    assert_eq!(eval(&engine, &wb, "=A1+B1"), Ok(Value::Number(15.0)));
    assert_eq!(eval(&engine, &wb, "=SUM(A1:A3)"), Ok(Value::Number(60.0)));
    assert_eq!(eval(&engine, &wb, "=AVERAGE(A1:A3)"), Ok(Value::Number(20.0)));
    assert_eq!(eval(&engine, &wb, "=A1+A9"), Ok(Value::Number(10.0)));
    assert_eq!(eval(&engine, &wb, "=C2"), Ok(Value::Number(30.0)));
    assert_eq!(
        wb.evaluate_cell(&engine, "Sheet1", "C2"),
        Ok(Value::Number(30.0))
    );
}

/// Test references into other sheets
#[test]
fn test_cross_sheet_references() {
    let mut wb = Workbook::new();
    wb.add_worksheet_with_name("Data").unwrap();
    wb.add_worksheet_with_name("My Data").unwrap();

    wb.worksheet_by_name_mut("Data")
        .unwrap()
        .set_cell_value("B2", 7.0)
        .unwrap();
    let my_data = wb.worksheet_by_name_mut("My Data").unwrap();
    my_data.set_cell_value("A1", 1.0).unwrap();
    my_data.set_cell_value("A2", 2.0).unwrap();
    my_data.set_cell_formula("A3", "=Data!B2*10").unwrap();

    let engine = Engine::new();
    assert_eq!(eval(&engine, &wb, "=Data!B2+1"), Ok(Value::Number(8.0)));
    assert_eq!(
        eval(&engine, &wb, "=SUM('My Data'!A1:A3)"),
        Ok(Value::Number(73.0))
    );
    assert!(matches!(
        eval(&engine, &wb, "=Missing!A1"),
        Err(FormulaError::InvalidCellReference(_))
    ));
    // Sheet names are case-sensitive
    assert!(matches!(
        eval(&engine, &wb, "=data!B2"),
        Err(FormulaError::InvalidCellReference(_))
    ));
}

/// Test circular reference detection
#[test]
fn test_circular_reference() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=B1").unwrap();
    sheet.set_cell_formula("B1", "=A1").unwrap();
    sheet.set_cell_formula("C1", "=SUM(C1:C2)").unwrap();

    let engine = Engine::new();
    assert!(matches!(
        wb.evaluate_cell(&engine, "Sheet1", "A1"),
        Err(FormulaError::CircularReference(_))
    ));
    assert!(matches!(
        wb.evaluate_cell(&engine, "Sheet1", "B1"),
        Err(FormulaError::CircularReference(_))
    ));
    assert!(matches!(
        wb.evaluate_cell(&engine, "Sheet1", "C1"),
        Err(FormulaError::CircularReference(_))
    ));

    // The guard is released after a failure
    assert_eq!(eval(&engine, &wb, "=1+1"), Ok(Value::Number(2.0)));
    let calculation = wb.calculate_sheet(&engine, "Sheet1").unwrap();
    assert_eq!(calculation.stats.errors, 3);
}

/// Test that a cycle through the first sheet is caught on the first re-entry
#[test]
fn test_circular_reference_through_default_sheet() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_formula("A1", "=HITS()+A1")
        .unwrap();

    let hits = Rc::new(Cell::new(0));
    let counter = Rc::clone(&hits);
    let engine = Engine::new();
    engine.add_custom_function(
        "HITS",
        move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::Number(0.0))
        },
        Some(0),
        Some(0),
        false,
    );

    // No sheet given: A1 must be keyed the same as when A1 reads itself on "Sheet1"
    assert!(matches!(
        eval(&engine, &wb, "=A1"),
        Err(FormulaError::CircularReference(_))
    ));
    assert_eq!(hits.get(), 1);
}

/// Test that the same range may appear twice in one formula
#[test]
fn test_repeated_range_is_not_circular() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 2.0).unwrap();
    sheet.set_cell_formula("B1", "=A1*A1+SUM(A1:A1)").unwrap();

    let engine = Engine::new();
    assert_eq!(
        wb.evaluate_cell(&engine, "Sheet1", "B1"),
        Ok(Value::Number(6.0))
    );
}

/// Test that the formula cache flushes and stays correct
#[test]
fn test_cache_bound() {
    let engine = Engine::new();
    let wb = Workbook::new();

    for i in 0..=DEFAULT_CACHE_CAPACITY {
        let formula = format!("={}+1", i);
        assert_eq!(
            eval(&engine, &wb, &formula),
            Ok(Value::Number(i as f64 + 1.0))
        );
    }
    assert_eq!(engine.cache_len(), 1);
    assert_eq!(eval(&engine, &wb, "=0+1"), Ok(Value::Number(1.0)));
    assert_eq!(
        eval(&engine, &wb, &format!("={}+1", DEFAULT_CACHE_CAPACITY)),
        Ok(Value::Number(DEFAULT_CACHE_CAPACITY as f64 + 1.0))
    );
}

/// Test that cached formulas see changed cell values
#[test]
fn test_cached_formula_sees_cell_changes() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_value("A1", 3.0)
        .unwrap();

    let engine = Engine::new();
    assert_eq!(eval(&engine, &wb, "=A1*2"), Ok(Value::Number(6.0)));

    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_value("A1", 5.0)
        .unwrap();
    assert_eq!(eval(&engine, &wb, "=A1*2"), Ok(Value::Number(10.0)));
    assert_eq!(engine.cache_len(), 1);
}

/// Test that repeated evaluation is idempotent
#[test]
fn test_same_formula_twice() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 0.1).unwrap();
    sheet.set_cell_value("A2", 0.2).unwrap();

    let engine = Engine::new();
    let formula = "=SQRT(A1+A2)/PI()*RATE(12, -888.49, 10000)";
    let first = eval(&engine, &wb, formula).unwrap();
    let second = eval(&engine, &wb, formula).unwrap();
    assert_eq!(first.to_number().to_bits(), second.to_number().to_bits());
}

/// Test wildcard criteria
#[test]
fn test_countif_wildcard() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", "apple").unwrap();
    sheet.set_cell_value("A2", "banana").unwrap();
    sheet.set_cell_value("A3", "avocado").unwrap();

    let engine = Engine::new();
    assert_eq!(
        eval(&engine, &wb, "=COUNTIF(A1:A3, \"a*\")"),
        Ok(Value::Number(2.0))
    );
    assert_eq!(
        eval(&engine, &wb, "=COUNTIF(A1:A3, \"?anana\")"),
        Ok(Value::Number(1.0))
    );
}

/// Test hidden-aware SUBTOTAL
#[test]
fn test_subtotal_hidden_rows() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    for row in 0..4 {
        sheet.set_cell_value_at(row, 0, (row + 1) as f64).unwrap();
    }
    sheet.set_row_hidden(1, true);

    let engine = Engine::new();
    assert_eq!(
        eval(&engine, &wb, "=SUBTOTAL(9, A1:A4)"),
        Ok(Value::Number(10.0))
    );
    assert_eq!(
        eval(&engine, &wb, "=SUBTOTAL(109, A1:A4)"),
        Ok(Value::Number(8.0))
    );
    assert_eq!(
        eval(&engine, &wb, "=SUBTOTAL(102, A1:A4)"),
        Ok(Value::Number(3.0))
    );
}

/// Test DATEDIF month boundary
#[test]
fn test_datedif_month_boundary() {
    let engine = Engine::new();
    let wb = Workbook::new();
    assert_eq!(
        eval(&engine, &wb, "=DATEDIF(DATE(2015,1,31), DATE(2015,3,1), \"M\")"),
        Ok(Value::Number(1.0))
    );
}

/// Test the unknown-function hook and custom functions
#[test]
fn test_unknown_function_hook() {
    let engine = Engine::new();
    let wb = Workbook::new();

    assert_eq!(
        eval(&engine, &wb, "=FOO(1)"),
        Err(FormulaError::UnsupportedFunction("FOO".into()))
    );

    engine.on_unknown_function(|name, args| match name.to_uppercase().as_str() {
        "FOO" => Some(Value::Number(args[0].to_number() * 100.0)),
        _ => None,
    });
    assert_eq!(eval(&engine, &wb, "=FOO(1)"), Ok(Value::Number(100.0)));
    assert_eq!(
        eval(&engine, &wb, "=BAR(1)"),
        Err(FormulaError::UnsupportedFunction("BAR".into()))
    );
}

#[test]
fn test_custom_function() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_value("A1", 21.0)
        .unwrap();

    let engine = Engine::new();
    assert!(engine.add_custom_function(
        "TWICE",
        |args, ctx| Ok(Value::Number(ctx.evaluate_arg(&args[0])?.to_number() * 2.0)),
        Some(1),
        Some(1),
        false,
    ));
    assert_eq!(eval(&engine, &wb, "=TWICE(A1)"), Ok(Value::Number(42.0)));
    assert!(!engine.add_custom_function("TWICE", |_, _| Ok(Value::Empty), None, None, false));
    assert_eq!(
        eval(&engine, &wb, "=TWICE(1, 2)"),
        Err(FormulaError::TooManyParameters("TWICE".into()))
    );
}

/// Test display formatting of cells
#[test]
fn test_display_cell() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=DATE(2021, 3, 4)").unwrap();
    sheet.set_cell_formula("A2", "=TEXT(1234.5, \"#,##0.00\")").unwrap();
    sheet.set_cell_formula("A3", "=1=1").unwrap();

    let engine = Engine::new();
    assert_eq!(
        wb.display_cell(&engine, "Sheet1", "A1"),
        Ok("2021-03-04".to_string())
    );
    assert_eq!(
        wb.display_cell(&engine, "Sheet1", "A2"),
        Ok("1,234.50".to_string())
    );
    assert_eq!(
        wb.display_cell(&engine, "Sheet1", "A3"),
        Ok("TRUE".to_string())
    );
}
