//! Aggregate and conditional statistical functions

use super::criteria::Criteria;
use super::{eval_arg, flatten_args, has_arg, number_arg, numbers, numeric_cell, range_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{compare_values, BinaryOp, Expr, RangeRef};
use crate::value::Value;

/// Aggregations shared by the plain functions and SUBTOTAL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Average,
    Count,
    CountA,
    Max,
    Min,
    Product,
    Stdev,
    StdevP,
    Sum,
    Var,
    VarP,
}

impl Aggregate {
    /// SUBTOTAL function codes 1-11 (101-111 skip hidden cells)
    fn from_code(code: i64) -> Option<Self> {
        let kind = match code % 100 {
            1 => Aggregate::Average,
            2 => Aggregate::Count,
            3 => Aggregate::CountA,
            4 => Aggregate::Max,
            5 => Aggregate::Min,
            6 => Aggregate::Product,
            7 => Aggregate::Stdev,
            8 => Aggregate::StdevP,
            9 => Aggregate::Sum,
            10 => Aggregate::Var,
            11 => Aggregate::VarP,
            _ => return None,
        };
        Some(kind)
    }
}

fn aggregate(
    kind: Aggregate,
    args: &[Expr],
    ctx: &EvaluationContext,
    skip_hidden: bool,
) -> FormulaResult<Value> {
    let values = flatten_args(args, ctx, skip_hidden)?;

    match kind {
        Aggregate::Count => {
            let count = values
                .iter()
                .filter(|arg| {
                    if arg.from_range {
                        numeric_cell(&arg.value).is_some()
                    } else {
                        !arg.value.is_empty() && !arg.value.to_number().is_nan()
                    }
                })
                .count();
            return Ok(Value::Number(count as f64));
        }
        Aggregate::CountA => {
            let count = values.iter().filter(|arg| !arg.value.is_empty()).count();
            return Ok(Value::Number(count as f64));
        }
        _ => {}
    }

    let numbers = numbers(&values)?;
    let n = numbers.len() as f64;

    let result = match kind {
        Aggregate::Sum => numbers.iter().sum(),
        Aggregate::Product => {
            if numbers.is_empty() {
                0.0
            } else {
                numbers.iter().product()
            }
        }
        Aggregate::Average => {
            if numbers.is_empty() {
                return Err(FormulaError::DivisionByZero);
            }
            numbers.iter().sum::<f64>() / n
        }
        Aggregate::Max => numbers.iter().copied().reduce(f64::max).unwrap_or(0.0),
        Aggregate::Min => numbers.iter().copied().reduce(f64::min).unwrap_or(0.0),
        Aggregate::Var => variance(&numbers, true)?,
        Aggregate::VarP => variance(&numbers, false)?,
        Aggregate::Stdev => variance(&numbers, true)?.sqrt(),
        Aggregate::StdevP => variance(&numbers, false)?.sqrt(),
        Aggregate::Count | Aggregate::CountA => 0.0,
    };

    Ok(Value::Number(result))
}

/// Sample (n - 1) or population (n) variance
fn variance(numbers: &[f64], sample: bool) -> FormulaResult<f64> {
    let n = numbers.len() as f64;
    let divisor = if sample { n - 1.0 } else { n };
    if divisor <= 0.0 {
        return Err(FormulaError::DivisionByZero);
    }

    let mean = numbers.iter().sum::<f64>() / n;
    let squares: f64 = numbers.iter().map(|x| (x - mean).powi(2)).sum();
    Ok(squares / divisor)
}

/// SUM function
pub fn fn_sum(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Sum, args, ctx, false)
}

/// AVERAGE function
pub fn fn_average(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Average, args, ctx, false)
}

/// MAX function
pub fn fn_max(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Max, args, ctx, false)
}

/// MIN function
pub fn fn_min(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Min, args, ctx, false)
}

/// VAR function (sample variance)
pub fn fn_var(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Var, args, ctx, false)
}

/// VARP function (population variance)
pub fn fn_varp(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::VarP, args, ctx, false)
}

/// STDEV function (sample standard deviation)
pub fn fn_stdev(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Stdev, args, ctx, false)
}

/// STDEVP function (population standard deviation)
pub fn fn_stdevp(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::StdevP, args, ctx, false)
}

/// COUNT function
pub fn fn_count(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Count, args, ctx, false)
}

/// COUNTA function
pub fn fn_counta(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::CountA, args, ctx, false)
}

/// COUNTBLANK function
pub fn fn_countblank(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let count = flatten_args(args, ctx, false)?
        .iter()
        .filter(|arg| arg.value.is_empty())
        .count();
    Ok(Value::Number(count as f64))
}

/// PRODUCT function
pub fn fn_product(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    aggregate(Aggregate::Product, args, ctx, false)
}

/// MEDIAN function
pub fn fn_median(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut numbers = numbers(&flatten_args(args, ctx, false)?)?;
    if numbers.is_empty() {
        return Err(FormulaError::InvalidParameters(
            "MEDIAN requires at least one number".into(),
        ));
    }

    numbers.sort_by(|a, b| a.total_cmp(b));
    let mid = numbers.len() / 2;
    let median = if numbers.len() % 2 == 0 {
        (numbers[mid - 1] + numbers[mid]) / 2.0
    } else {
        numbers[mid]
    };
    Ok(Value::Number(median))
}

/// SUBTOTAL function
pub fn fn_subtotal(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let code = number_arg(args, 0, ctx)?.trunc() as i64;
    let kind = match code {
        1..=11 | 101..=111 => Aggregate::from_code(code),
        _ => None,
    }
    .ok_or_else(|| {
        FormulaError::InvalidParameters(format!("unknown SUBTOTAL function code {}", code))
    })?;

    aggregate(kind, &args[1..], ctx, code > 100)
}

// === Conditional aggregates ===

/// Values of a criteria range argument (a reference or a list)
fn criteria_values(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<Vec<Value>> {
    Ok(flatten_args(&args[index..=index], ctx, false)?
        .into_iter()
        .map(|arg| arg.value)
        .collect())
}

/// Ranges of a multi-criteria call must all have the same shape
fn check_same_shape(first: &RangeRef, other: &RangeRef) -> FormulaResult<()> {
    if first.row_count() != other.row_count() || first.col_count() != other.col_count() {
        return Err(FormulaError::InvalidParameters(format!(
            "range {} does not match the size of {}",
            other, first
        )));
    }
    Ok(())
}

/// Cells matching every (range, criteria) pair
fn matching_mask(
    pairs: &[Expr],
    shape: &RangeRef,
    ctx: &EvaluationContext,
) -> FormulaResult<Vec<bool>> {
    let mut mask = vec![true; shape.row_count() * shape.col_count()];

    for pair in pairs.chunks(2) {
        let range = range_arg(pair, 0, ctx)?;
        check_same_shape(shape, &range)?;
        let criteria = Criteria::parse(&eval_arg(pair, 1, ctx)?)?;

        for (keep, value) in mask.iter_mut().zip(ctx.range_values(&range, false)?) {
            *keep = *keep && criteria.matches(&value);
        }
    }

    Ok(mask)
}

/// COUNTIF function
pub fn fn_countif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let criteria = Criteria::parse(&eval_arg(args, 1, ctx)?)?;
    let count = criteria_values(args, 0, ctx)?
        .iter()
        .filter(|value| criteria.matches(value))
        .count();
    Ok(Value::Number(count as f64))
}

/// COUNTIFS function
pub fn fn_countifs(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    if args.len() % 2 != 0 {
        return Err(FormulaError::InvalidParameters(
            "COUNTIFS expects range/criteria pairs".into(),
        ));
    }

    let shape = range_arg(args, 0, ctx)?;
    let mask = matching_mask(args, &shape, ctx)?;
    let count = mask.iter().filter(|keep| **keep).count();
    Ok(Value::Number(count as f64))
}

/// Numbers of the sum range for cells whose criteria cell matches
fn conditional_numbers(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Vec<f64>> {
    let range = range_arg(args, 0, ctx)?;
    let criteria = Criteria::parse(&eval_arg(args, 1, ctx)?)?;
    let target = if has_arg(args, 2) {
        range_arg(args, 2, ctx)?.resized(range.row_count(), range.col_count())
    } else {
        range.clone()
    };

    let tested = ctx.range_values(&range, false)?;
    let summed = ctx.range_values(&target, false)?;
    Ok(tested
        .iter()
        .zip(summed.iter())
        .filter(|(value, _)| criteria.matches(value))
        .filter_map(|(_, value)| numeric_cell(value))
        .collect())
}

/// SUMIF function
pub fn fn_sumif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(conditional_numbers(args, ctx)?.iter().sum()))
}

/// SUMIFS function
pub fn fn_sumifs(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    if args.len() % 2 != 1 {
        return Err(FormulaError::InvalidParameters(
            "SUMIFS expects a sum range followed by range/criteria pairs".into(),
        ));
    }

    let sum_range = range_arg(args, 0, ctx)?;
    let mask = matching_mask(&args[1..], &sum_range, ctx)?;
    let sum = ctx
        .range_values(&sum_range, false)?
        .iter()
        .zip(mask)
        .filter(|(_, keep)| *keep)
        .filter_map(|(value, _)| numeric_cell(value))
        .sum();
    Ok(Value::Number(sum))
}

/// AVERAGEIF function
pub fn fn_averageif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let numbers = conditional_numbers(args, ctx)?;
    if numbers.is_empty() {
        return Err(FormulaError::DivisionByZero);
    }
    Ok(Value::Number(numbers.iter().sum::<f64>() / numbers.len() as f64))
}

/// RANK function
pub fn fn_rank(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let target = Value::Number(number_arg(args, 0, ctx)?);
    let ascending = has_arg(args, 2) && number_arg(args, 2, ctx)? != 0.0;

    let values: Vec<Value> = criteria_values(args, 1, ctx)?
        .iter()
        .filter_map(numeric_cell)
        .map(Value::Number)
        .collect();

    if !values.iter().any(|v| compare_values(BinaryOp::Eq, v, &target)) {
        return Err(FormulaError::ValueNotFound);
    }

    let ahead = if ascending { BinaryOp::Lt } else { BinaryOp::Gt };
    let rank = 1 + values
        .iter()
        .filter(|v| compare_values(ahead, v, &target))
        .count();
    Ok(Value::Number(rank as f64))
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::{FormulaError, FormulaResult};
    use crate::value::Value;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    /// A1:A5 = 1..5, B1:B5 = fruit names, C1 = "text", row 3 hidden
    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let sheet = wb.worksheet_mut(0).unwrap();
        let fruit = ["apple", "banana", "avocado", "cherry", "apricot"];
        for (i, name) in fruit.iter().enumerate() {
            sheet.set_cell_value_at(i as u32, 0, (i + 1) as f64).unwrap();
            sheet.set_cell_value_at(i as u32, 1, *name).unwrap();
        }
        sheet.set_cell_value("C1", "text").unwrap();
        sheet.set_row_hidden(2, true);
        wb
    }

    fn eval(formula: &str) -> FormulaResult<Value> {
        let wb = workbook();
        Engine::new().try_evaluate(formula, Some(&wb), None, 10, 10)
    }

    fn number(formula: &str) -> f64 {
        match eval(formula) {
            Ok(value) => value.to_number(),
            Err(e) => panic!("{} failed: {}", formula, e),
        }
    }

    #[test]
    fn test_sum_and_average() {
        assert_eq!(number("=SUM(A1:A5)"), 15.0);
        assert_eq!(number("=SUM(A1:A5, 10, \"5\")"), 30.0);
        assert_eq!(number("=SUM(A1:C5)"), 15.0);
        assert_eq!(number("=AVERAGE(A1:A5)"), 3.0);
        assert_eq!(eval("=AVERAGE(D1:D3)"), Err(FormulaError::DivisionByZero));
        assert!(matches!(
            eval("=SUM(1, \"abc\")"),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_min_max_product_median() {
        assert_eq!(number("=MAX(A1:A5)"), 5.0);
        assert_eq!(number("=MIN(A1:A5, -2)"), -2.0);
        assert_eq!(number("=MAX(D1:D3)"), 0.0);
        assert_eq!(number("=PRODUCT(A1:A4)"), 24.0);
        assert_eq!(number("=MEDIAN(A1:A4)"), 2.5);
        assert_eq!(number("=MEDIAN(3, 1, 2)"), 2.0);
    }

    #[test]
    fn test_variance() {
        assert_eq!(number("=VAR(A1:A5)"), 2.5);
        assert_eq!(number("=VARP(A1:A5)"), 2.0);
        assert!((number("=STDEV(A1:A5)") - 2.5f64.sqrt()).abs() < 1e-12);
        assert!((number("=STDEVP(A1:A5)") - 2.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(eval("=VAR(1)"), Err(FormulaError::DivisionByZero));
    }

    #[test]
    fn test_counts() {
        assert_eq!(number("=COUNT(A1:C5)"), 5.0);
        assert_eq!(number("=COUNTA(A1:C5)"), 11.0);
        assert_eq!(number("=COUNTBLANK(A1:C5)"), 4.0);
        assert_eq!(number("=COUNT(1, \"2\", \"x\")"), 2.0);
    }

    #[test]
    fn test_subtotal() {
        assert_eq!(number("=SUBTOTAL(9, A1:A5)"), 15.0);
        assert_eq!(number("=SUBTOTAL(109, A1:A5)"), 12.0);
        assert_eq!(number("=SUBTOTAL(2, A1:A5)"), 5.0);
        assert_eq!(number("=SUBTOTAL(102, A1:A5)"), 4.0);
        assert_eq!(number("=SUBTOTAL(104, A1:A5)"), 5.0);
        assert!(matches!(
            eval("=SUBTOTAL(12, A1:A5)"),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_countif() {
        assert_eq!(number("=COUNTIF(B1:B5, \"a*\")"), 3.0);
        assert_eq!(number("=COUNTIF(A1:A5, \">2\")"), 3.0);
        assert_eq!(number("=COUNTIF(A1:A5, 3)"), 1.0);
        assert_eq!(number("=COUNTIF(B1:B5, \"BANANA\")"), 1.0);
    }

    #[test]
    fn test_countifs_and_sumifs() {
        assert_eq!(number("=COUNTIFS(B1:B5, \"a*\", A1:A5, \">1\")"), 2.0);
        assert_eq!(number("=SUMIFS(A1:A5, B1:B5, \"a*\", A1:A5, \"<5\")"), 4.0);
        assert!(matches!(
            eval("=COUNTIFS(B1:B5, \"a*\", A1:A4, \">1\")"),
            Err(FormulaError::InvalidParameters(_))
        ));
        assert!(matches!(
            eval("=SUMIFS(A1:A5, B1:B3, \"a*\")"),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_sumif_and_averageif() {
        assert_eq!(number("=SUMIF(A1:A5, \">3\")"), 9.0);
        assert_eq!(number("=SUMIF(B1:B5, \"a*\", A1:A5)"), 9.0);
        // Sum range is resized to the criteria range
        assert_eq!(number("=SUMIF(B1:B5, \"a*\", A1)"), 9.0);
        assert_eq!(number("=AVERAGEIF(B1:B5, \"a*\", A1:A5)"), 3.0);
        assert_eq!(
            eval("=AVERAGEIF(A1:A5, \">10\")"),
            Err(FormulaError::DivisionByZero)
        );
    }

    #[test]
    fn test_rank() {
        assert_eq!(number("=RANK(4, A1:A5)"), 2.0);
        assert_eq!(number("=RANK(4, A1:A5, 1)"), 4.0);
        assert_eq!(eval("=RANK(9, A1:A5)"), Err(FormulaError::ValueNotFound));
    }
}
