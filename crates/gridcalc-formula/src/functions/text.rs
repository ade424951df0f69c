//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use super::criteria::wildcard_regex;
use super::{eval_arg, flatten_args, has_arg, int_arg, text_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::format::format_value;
use crate::value::{date_to_serial, parse_date, parse_number, Value};

/// Non-negative count argument with a default
fn count_arg(args: &[Expr], index: usize, ctx: &EvaluationContext, default: i64) -> FormulaResult<usize> {
    let n = if has_arg(args, index) {
        int_arg(args, index, ctx)?
    } else {
        default
    };
    if n < 0 {
        return Err(FormulaError::InvalidParameters(format!(
            "count {} must not be negative",
            n
        )));
    }
    Ok(n as usize)
}

/// 1-based start position argument
fn start_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<usize> {
    let start = if has_arg(args, index) {
        int_arg(args, index, ctx)?
    } else {
        1
    };
    if start < 1 {
        return Err(FormulaError::InvalidParameters(format!(
            "start position {} must be at least 1",
            start
        )));
    }
    Ok(start as usize)
}

/// LEFT function
pub fn fn_left(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let n = count_arg(args, 1, ctx, 1)?;
    Ok(Value::String(text.chars().take(n).collect()))
}

/// RIGHT function
pub fn fn_right(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let n = count_arg(args, 1, ctx, 1)?;
    let len = text.chars().count();
    Ok(Value::String(text.chars().skip(len.saturating_sub(n)).collect()))
}

/// MID function
pub fn fn_mid(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let start = start_arg(args, 1, ctx)?;
    let n = count_arg(args, 2, ctx, 0)?;
    Ok(Value::String(text.chars().skip(start - 1).take(n).collect()))
}

/// FIND function (case-sensitive)
pub fn fn_find(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let needle = text_arg(args, 0, ctx)?;
    let haystack = text_arg(args, 1, ctx)?;
    let start = start_arg(args, 2, ctx)?;

    let (offset, tail) = char_tail(&haystack, start)?;
    tail.find(&needle)
        .map(|byte| Value::Number((offset + tail[..byte].chars().count() + 1) as f64))
        .ok_or(FormulaError::ValueNotFound)
}

/// SEARCH function (case-insensitive, `*`/`?` wildcards)
pub fn fn_search(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let needle = text_arg(args, 0, ctx)?;
    let haystack = text_arg(args, 1, ctx)?;
    let start = start_arg(args, 2, ctx)?;

    let (offset, tail) = char_tail(&haystack, start)?;
    let regex = wildcard_regex(&needle, false)?;
    regex
        .find(tail)
        .map(|m| Value::Number((offset + tail[..m.start()].chars().count() + 1) as f64))
        .ok_or(FormulaError::ValueNotFound)
}

/// The text from 1-based character `start`, with the number of characters skipped
fn char_tail(text: &str, start: usize) -> FormulaResult<(usize, &str)> {
    let len = text.chars().count();
    if start > len + 1 {
        return Err(FormulaError::InvalidParameters(format!(
            "start position {} is past the end of the text",
            start
        )));
    }
    let byte = text
        .char_indices()
        .nth(start - 1)
        .map_or(text.len(), |(idx, _)| idx);
    Ok((start - 1, &text[byte..]))
}

/// REPLACE function
pub fn fn_replace(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let start = start_arg(args, 1, ctx)?;
    let n = count_arg(args, 2, ctx, 0)?;
    let replacement = text_arg(args, 3, ctx)?;

    let mut result: String = text.chars().take(start - 1).collect();
    result.push_str(&replacement);
    result.extend(text.chars().skip(start - 1 + n));
    Ok(Value::String(result))
}

/// SUBSTITUTE function
pub fn fn_substitute(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let old = text_arg(args, 1, ctx)?;
    let new = text_arg(args, 2, ctx)?;

    if old.is_empty() {
        return Ok(Value::String(text));
    }
    if !has_arg(args, 3) {
        return Ok(Value::String(text.replace(&old, &new)));
    }

    let instance = int_arg(args, 3, ctx)?;
    if instance < 1 {
        return Err(FormulaError::InvalidParameters(format!(
            "instance {} must be at least 1",
            instance
        )));
    }

    match text.match_indices(&old).nth(instance as usize - 1) {
        Some((idx, _)) => {
            let mut result = String::with_capacity(text.len());
            result.push_str(&text[..idx]);
            result.push_str(&new);
            result.push_str(&text[idx + old.len()..]);
            Ok(Value::String(result))
        }
        None => Ok(Value::String(text)),
    }
}

/// REPT function
pub fn fn_rept(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let n = count_arg(args, 1, ctx, 0)?;
    Ok(Value::String(text.repeat(n)))
}

/// TRIM function (strips and collapses spaces)
pub fn fn_trim(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let words: Vec<&str> = text.split(' ').filter(|word| !word.is_empty()).collect();
    Ok(Value::String(words.join(" ")))
}

/// UPPER function
pub fn fn_upper(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::String(text_arg(args, 0, ctx)?.to_uppercase()))
}

/// LOWER function
pub fn fn_lower(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::String(text_arg(args, 0, ctx)?.to_lowercase()))
}

/// PROPER function (capitalizes the first letter of each word)
pub fn fn_proper(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    let mut result = String::with_capacity(text.len());
    let mut after_letter = false;

    for ch in text.chars() {
        if after_letter {
            result.extend(ch.to_lowercase());
        } else {
            result.extend(ch.to_uppercase());
        }
        after_letter = ch.is_alphabetic();
    }
    Ok(Value::String(result))
}

/// CONCATENATE function
pub fn fn_concatenate(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text: String = flatten_args(args, ctx, false)?
        .iter()
        .map(|arg| arg.value.to_text())
        .collect();
    Ok(Value::String(text))
}

/// CHAR function
pub fn fn_char(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let code = int_arg(args, 0, ctx)?;
    (1..=255)
        .contains(&code)
        .then(|| char::from_u32(code as u32))
        .flatten()
        .map(|ch| Value::String(ch.to_string()))
        .ok_or_else(|| FormulaError::InvalidParameters(format!("invalid character code {}", code)))
}

/// CODE function
pub fn fn_code(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let text = text_arg(args, 0, ctx)?;
    text.chars()
        .next()
        .map(|ch| Value::Number(ch as u32 as f64))
        .ok_or_else(|| FormulaError::InvalidParameters("CODE of empty text".into()))
}

/// LEN function
pub fn fn_len(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(text_arg(args, 0, ctx)?.chars().count() as f64))
}

/// VALUE function (numbers, percentages and dates)
pub fn fn_value(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let value = eval_arg(args, 0, ctx)?;
    if let Some(n) = value.as_number() {
        return Ok(Value::Number(n));
    }

    let text = value.to_text();
    let trimmed = text.trim();
    if let Some(n) = parse_number(trimmed) {
        return Ok(Value::Number(n));
    }
    if let Some(n) = trimmed.strip_suffix('%').and_then(parse_number) {
        return Ok(Value::Number(n / 100.0));
    }
    if let Some(date) = parse_date(trimmed) {
        return Ok(Value::Number(date_to_serial(date)));
    }
    Err(FormulaError::InvalidParameters(format!(
        "'{}' is not a number",
        text
    )))
}

/// TEXT function
pub fn fn_text(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let value = eval_arg(args, 0, ctx)?;
    let pattern = text_arg(args, 1, ctx)?;

    // Numeric text formats as a number
    let value = match value.unformatted() {
        Value::String(s) => parse_number(s)
            .filter(|_| !s.trim().is_empty())
            .map_or(value.clone(), Value::Number),
        _ => value.clone(),
    };
    Ok(Value::String(format_value(&value, &pattern)?))
}

/// EXACT function (case-sensitive comparison)
pub fn fn_exact(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Boolean(text_arg(args, 0, ctx)? == text_arg(args, 1, ctx)?))
}
