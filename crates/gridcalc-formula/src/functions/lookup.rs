//! Lookup and reference functions

use super::criteria::{has_wildcards, wildcard_regex};
use super::{eval_arg, flatten_args, has_arg, int_arg, opt_number_arg, range_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{compare_values, BinaryOp, Expr};
use crate::value::Value;
use std::cmp::Ordering;

/// ROW function
pub fn fn_row(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    if !has_arg(args, 0) {
        return Ok(Value::Number(ctx.row as f64 + 1.0));
    }
    let range = range_arg(args, 0, ctx)?;
    Ok(Value::Number(range.range.start.row as f64 + 1.0))
}

/// COLUMN function
pub fn fn_column(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    if !has_arg(args, 0) {
        return Ok(Value::Number(ctx.col as f64 + 1.0));
    }
    let range = range_arg(args, 0, ctx)?;
    Ok(Value::Number(range.range.start.col as f64 + 1.0))
}

/// ROWS function
pub fn fn_rows(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(range_arg(args, 0, ctx)?.row_count() as f64))
}

/// COLUMNS function
pub fn fn_columns(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(range_arg(args, 0, ctx)?.col_count() as f64))
}

/// INDEX function
///
/// Returns a reference: a cell, a whole row (column 0) or a whole column (row 0). A single-row
/// range indexed with one number selects a column.
pub fn fn_index(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let range = range_arg(args, 0, ctx)?;
    let mut row = if has_arg(args, 1) { int_arg(args, 1, ctx)? } else { 0 };
    let mut col = if has_arg(args, 2) { int_arg(args, 2, ctx)? } else { 0 };

    if args.len() < 3 && range.row_count() == 1 && range.col_count() > 1 {
        col = row;
        row = 0;
    }

    if row < 0 || col < 0 {
        return Err(FormulaError::InvalidParameters(
            "INDEX row and column must not be negative".into(),
        ));
    }
    if row as usize > range.row_count() || col as usize > range.col_count() {
        return Err(FormulaError::IndexOutOfRange);
    }

    let reference = match (row, col) {
        (0, 0) => range,
        (row, 0) => range.row(row as u32 - 1),
        (0, col) => range.column(col as u16 - 1),
        (row, col) => range.row(row as u32 - 1).column(col as u16 - 1),
    };
    Ok(Value::Reference(reference))
}

/// HLOOKUP function
pub fn fn_hlookup(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let target = eval_arg(args, 0, ctx)?;
    let rows = ctx.range_rows(&range_arg(args, 1, ctx)?)?;
    let index = result_index(args, ctx, rows.len())?;
    let approximate = !has_arg(args, 3) || eval_arg(args, 3, ctx)?.to_bool()?;

    let keys = rows.first().map(Vec::as_slice).unwrap_or_default();
    let col = find_key(keys, &target, approximate)?;
    Ok(rows[index][col].clone())
}

/// VLOOKUP function
pub fn fn_vlookup(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let target = eval_arg(args, 0, ctx)?;
    let rows = ctx.range_rows(&range_arg(args, 1, ctx)?)?;
    let width = rows.first().map_or(0, Vec::len);
    let index = result_index(args, ctx, width)?;
    let approximate = !has_arg(args, 3) || eval_arg(args, 3, ctx)?.to_bool()?;

    let keys: Vec<Value> = rows.iter().map(|row| row[0].clone()).collect();
    let row = find_key(&keys, &target, approximate)?;
    Ok(rows[row][index].clone())
}

/// 0-based result row/column of a lookup from its 1-based argument
fn result_index(args: &[Expr], ctx: &EvaluationContext, available: usize) -> FormulaResult<usize> {
    let index = int_arg(args, 2, ctx)?;
    if index < 1 {
        return Err(FormulaError::InvalidParameters(format!(
            "lookup index {} must be at least 1",
            index
        )));
    }
    if index as usize > available {
        return Err(FormulaError::IndexOutOfRange);
    }
    Ok(index as usize - 1)
}

/// Position of the lookup key
///
/// Exact lookups match case-insensitively, with wildcards for text targets. Approximate lookups
/// take the largest key not greater than the target, whatever the key order; equal keys resolve
/// to the higher position.
fn find_key(keys: &[Value], target: &Value, approximate: bool) -> FormulaResult<usize> {
    let found = if approximate {
        keys.iter()
            .enumerate()
            .filter(|(_, key)| {
                matches!(lookup_cmp(key, target), Some(Ordering::Less | Ordering::Equal))
            })
            .max_by(|(i, a), (j, b)| {
                lookup_cmp(a, b)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| i.cmp(j))
            })
            .map(|(i, _)| i)
    } else {
        let matcher = exact_matcher(target)?;
        keys.iter().position(|key| matcher(key))
    };
    found.ok_or(FormulaError::ValueNotFound)
}

/// Equality test for exact lookups
fn exact_matcher(target: &Value) -> FormulaResult<Box<dyn Fn(&Value) -> bool + '_>> {
    if let Value::String(text) = target.unformatted() {
        if has_wildcards(text) {
            let regex = wildcard_regex(text, true)?;
            return Ok(Box::new(move |key: &Value| {
                matches!(key.unformatted(), Value::String(_)) && regex.is_match(&key.to_text())
            }));
        }
    }
    Ok(Box::new(move |key: &Value| {
        !key.is_empty() && compare_values(BinaryOp::Eq, key, target)
    }))
}

/// Ordering between lookup values of the same kind (numbers with numbers, text with text)
fn lookup_cmp(key: &Value, target: &Value) -> Option<Ordering> {
    match (key.unformatted(), target.unformatted()) {
        (Value::Empty, _) => None,
        (Value::String(a), Value::String(b)) => Some(a.to_lowercase().cmp(&b.to_lowercase())),
        (Value::String(_), _) | (_, Value::String(_)) => None,
        (a, b) => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// MATCH function
///
/// Match type 1 (default) finds the largest value not greater than the target in ascending data,
/// -1 the smallest value not less than the target in descending data, 0 an exact match.
pub fn fn_match(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let target = eval_arg(args, 0, ctx)?;
    let values: Vec<Value> = flatten_args(&args[1..2], ctx, false)?
        .into_iter()
        .map(|arg| arg.value)
        .collect();
    let match_type = opt_number_arg(args, 2, ctx, 1.0)?;

    let found = if match_type == 0.0 {
        let matcher = exact_matcher(&target)?;
        values.iter().position(|value| matcher(value))
    } else {
        let (stop, keep) = if match_type > 0.0 {
            (Ordering::Greater, Ordering::Less)
        } else {
            (Ordering::Less, Ordering::Greater)
        };

        let mut found = None;
        for (i, value) in values.iter().enumerate() {
            match lookup_cmp(value, &target) {
                Some(Ordering::Equal) => found = Some(i),
                Some(ordering) if ordering == keep => found = Some(i),
                Some(ordering) if ordering == stop => break,
                _ => {}
            }
        }
        found
    };

    found
        .map(|i| Value::Number(i as f64 + 1.0))
        .ok_or(FormulaError::ValueNotFound)
}

/// CHOOSE function (only the chosen argument is evaluated)
pub fn fn_choose(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let index = int_arg(args, 0, ctx)?;
    if index < 1 || index as usize >= args.len() {
        return Err(FormulaError::IndexOutOfRange);
    }
    args[index as usize].evaluate(ctx)
}
