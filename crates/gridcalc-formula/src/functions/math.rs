//! Math functions

use super::{number_arg, opt_number_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::value::Value;

fn checked(n: f64) -> FormulaResult<Value> {
    if n.is_nan() {
        Err(FormulaError::DivisionProducesNaN)
    } else {
        Ok(Value::Number(n))
    }
}

fn positive_arg(args: &[Expr], ctx: &EvaluationContext, function: &str) -> FormulaResult<f64> {
    let n = number_arg(args, 0, ctx)?;
    if n <= 0.0 {
        return Err(FormulaError::InvalidParameters(format!(
            "{} requires a positive number, got {}",
            function, n
        )));
    }
    Ok(n)
}

/// Round `n` to `digits` decimals with `round` applied to the scaled value
///
/// The scaled value is cleaned of binary representation noise first (2.675 * 100 is
/// 267.49999...).
fn round_digits(n: f64, digits: i32, round: fn(f64) -> f64) -> f64 {
    let factor = 10f64.powi(digits.abs());
    let scaled = if digits >= 0 { n * factor } else { n / factor };
    let cleaned = (scaled * 1e9).round() / 1e9;
    let scaled = if cleaned.is_finite() { cleaned } else { scaled };

    if digits >= 0 {
        round(scaled) / factor
    } else {
        round(scaled) * factor
    }
}

/// Digits argument of the rounding functions (defaults to 0)
fn digits_arg(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<i32> {
    let digits = opt_number_arg(args, 1, ctx, 0.0)?.trunc();
    Ok(digits.clamp(-308.0, 308.0) as i32)
}

/// ABS function
pub fn fn_abs(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, ctx)?.abs()))
}

/// INT function (rounds down toward negative infinity)
pub fn fn_int(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, ctx)?.floor()))
}

/// ROUND function (half away from zero)
pub fn fn_round(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = number_arg(args, 0, ctx)?;
    checked(round_digits(n, digits_arg(args, ctx)?, f64::round))
}

/// ROUNDUP function (away from zero)
pub fn fn_roundup(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = number_arg(args, 0, ctx)?;
    checked(round_digits(n, digits_arg(args, ctx)?, |x| x.abs().ceil().copysign(x)))
}

/// ROUNDDOWN function (toward zero)
pub fn fn_rounddown(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = number_arg(args, 0, ctx)?;
    checked(round_digits(n, digits_arg(args, ctx)?, f64::trunc))
}

/// MOD function (result has the sign of the divisor)
pub fn fn_mod(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = number_arg(args, 0, ctx)?;
    let divisor = number_arg(args, 1, ctx)?;
    if divisor == 0.0 {
        return Err(FormulaError::DivisionByZero);
    }
    checked(n - divisor * (n / divisor).floor())
}

/// POWER function
pub fn fn_power(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let base = number_arg(args, 0, ctx)?;
    let exponent = number_arg(args, 1, ctx)?;
    checked(base.powf(exponent))
}

/// SQRT function
pub fn fn_sqrt(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = number_arg(args, 0, ctx)?;
    if n < 0.0 {
        return Err(FormulaError::InvalidParameters(format!(
            "SQRT of negative number {}",
            n
        )));
    }
    Ok(Value::Number(n.sqrt()))
}

/// PI function
pub fn fn_pi(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(std::f64::consts::PI))
}

/// SIGN function
pub fn fn_sign(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = number_arg(args, 0, ctx)?;
    let sign = if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(Value::Number(sign))
}

/// EXP function
pub fn fn_exp(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    checked(number_arg(args, 0, ctx)?.exp())
}

/// LN function
pub fn fn_ln(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(positive_arg(args, ctx, "LN")?.ln()))
}

/// LOG10 function
pub fn fn_log10(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(positive_arg(args, ctx, "LOG10")?.log10()))
}
