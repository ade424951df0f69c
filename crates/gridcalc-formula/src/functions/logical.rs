//! Logical functions

use super::{bool_arg, flatten_args, ArgValue};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::value::Value;
use log::trace;

/// IF function
///
/// Only the selected branch is evaluated. A missing branch yields the condition itself.
pub fn fn_if(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let condition = bool_arg(args, 0, ctx)?;
    let branch = if condition { 1 } else { 2 };

    match args.get(branch) {
        Some(expr) => expr.evaluate(ctx),
        None => Ok(Value::Boolean(condition)),
    }
}

/// Truth values of AND/OR arguments
///
/// Range cells contribute booleans and numbers only; direct arguments must convert.
fn truth_values(values: Vec<ArgValue>, function: &str) -> FormulaResult<Vec<bool>> {
    let mut truths = Vec::with_capacity(values.len());

    for arg in values {
        let truth = match (arg.value.unformatted(), arg.from_range) {
            (Value::Boolean(b), _) => Some(*b),
            (Value::Number(n), _) => Some(*n != 0.0),
            (_, true) => None,
            (value, false) if value.is_empty() => None,
            (value, false) => Some(value.to_bool()?),
        };
        truths.extend(truth);
    }

    if truths.is_empty() {
        return Err(FormulaError::InvalidParameters(format!(
            "{} has no logical values",
            function
        )));
    }
    Ok(truths)
}

/// AND function
pub fn fn_and(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let truths = truth_values(flatten_args(args, ctx, false)?, "AND")?;
    Ok(Value::Boolean(truths.iter().all(|t| *t)))
}

/// OR function
pub fn fn_or(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let truths = truth_values(flatten_args(args, ctx, false)?, "OR")?;
    Ok(Value::Boolean(truths.iter().any(|t| *t)))
}

/// NOT function
pub fn fn_not(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Boolean(!bool_arg(args, 0, ctx)?))
}

/// IFERROR function
///
/// The fallback is evaluated only when the value fails.
pub fn fn_iferror(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    match ctx.evaluate_arg(&args[0]) {
        Ok(value) => Ok(value),
        Err(err) => {
            trace!("IFERROR caught: {}", err);
            args[1].evaluate(ctx)
        }
    }
}

/// TRUE function
pub fn fn_true(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Boolean(true))
}

/// FALSE function
pub fn fn_false(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Boolean(false))
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::{FormulaError, FormulaResult};
    use crate::value::Value;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaResult<Value> {
        Engine::new().try_evaluate(formula, None, None, 0, 0)
    }

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(1 > 0, \"yes\", \"no\")"), Ok(Value::from("yes")));
        assert_eq!(eval("=IF(0, \"yes\", \"no\")"), Ok(Value::from("no")));
        assert_eq!(eval("=IF(\"TRUE\", 1, 2)"), Ok(Value::Number(1.0)));
        assert_eq!(eval("=IF(1 < 0, 1)"), Ok(Value::Boolean(false)));
        assert_eq!(eval("=IF(1 > 0)"), Ok(Value::Boolean(true)));
        assert!(matches!(
            eval("=IF(\"maybe\", 1, 2)"),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_if_is_lazy() {
        assert_eq!(eval("=IF(TRUE, 1, 1/0)"), Ok(Value::Number(1.0)));
        assert_eq!(eval("=IF(FALSE, 1/0, 2)"), Ok(Value::Number(2.0)));
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(eval("=AND(TRUE, 1, \"true\")"), Ok(Value::Boolean(true)));
        assert_eq!(eval("=AND(TRUE, 0)"), Ok(Value::Boolean(false)));
        assert_eq!(eval("=OR(FALSE, 0, 2)"), Ok(Value::Boolean(true)));
        assert_eq!(eval("=OR(FALSE, FALSE)"), Ok(Value::Boolean(false)));
        assert_eq!(eval("=NOT(TRUE)"), Ok(Value::Boolean(false)));
        assert_eq!(eval("=TRUE()"), Ok(Value::Boolean(true)));
        assert_eq!(eval("=FALSE()"), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_and_over_range() {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        sheet.set_cell_value("A1", true).unwrap();
        sheet.set_cell_value("A2", "text").unwrap();
        sheet.set_cell_value("A3", 1.0).unwrap();

        let engine = Engine::new();
        let eval = |formula: &str| engine.try_evaluate(formula, Some(&wb), None, 5, 5);
        assert_eq!(eval("=AND(A1:A4)"), Ok(Value::Boolean(true)));
        assert!(matches!(
            eval("=AND(A2)"),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_iferror() {
        assert_eq!(eval("=IFERROR(1/0, \"div\")"), Ok(Value::from("div")));
        assert_eq!(eval("=IFERROR(5, \"div\")"), Ok(Value::Number(5.0)));
        assert_eq!(eval("=IFERROR(SQRT(-1), -1)"), Ok(Value::Number(-1.0)));
    }
}
