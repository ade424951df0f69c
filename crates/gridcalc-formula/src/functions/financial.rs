//! Financial functions
//!
//! Cash paid out is negative, cash received positive. `type` 0 (default) means payments at the
//! end of each period, 1 at the beginning.

use super::{number_arg, opt_number_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::value::Value;
use log::trace;

const RATE_PRECISION: f64 = 1e-7;
const RATE_MAX_ITERATIONS: usize = 20;

fn checked(n: f64) -> FormulaResult<Value> {
    if n.is_nan() {
        Err(FormulaError::DivisionProducesNaN)
    } else {
        Ok(Value::Number(n))
    }
}

/// Payment timing argument: 0 (end of period) or 1 (beginning)
fn type_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<f64> {
    let kind = opt_number_arg(args, index, ctx, 0.0)?;
    Ok(if kind != 0.0 { 1.0 } else { 0.0 })
}

/// PMT(rate, nper, pv, [fv], [type])
pub fn fn_pmt(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = number_arg(args, 0, ctx)?;
    let nper = number_arg(args, 1, ctx)?;
    let pv = number_arg(args, 2, ctx)?;
    let fv = opt_number_arg(args, 3, ctx, 0.0)?;
    let kind = type_arg(args, 4, ctx)?;

    if nper == 0.0 {
        return Err(FormulaError::DivisionByZero);
    }
    if rate == 0.0 {
        return checked(-(pv + fv) / nper);
    }

    let growth = (1.0 + rate).powf(nper);
    checked(-(rate * (pv * growth + fv)) / ((1.0 + rate * kind) * (growth - 1.0)))
}

/// PV(rate, nper, pmt, [fv], [type])
pub fn fn_pv(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = number_arg(args, 0, ctx)?;
    let nper = number_arg(args, 1, ctx)?;
    let pmt = number_arg(args, 2, ctx)?;
    let fv = opt_number_arg(args, 3, ctx, 0.0)?;
    let kind = type_arg(args, 4, ctx)?;

    if rate == 0.0 {
        return checked(-(fv + pmt * nper));
    }

    let growth = (1.0 + rate).powf(nper);
    checked(-(fv + pmt * (1.0 + rate * kind) * (growth - 1.0) / rate) / growth)
}

/// FV(rate, nper, pmt, [pv], [type])
pub fn fn_fv(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = number_arg(args, 0, ctx)?;
    let nper = number_arg(args, 1, ctx)?;
    let pmt = number_arg(args, 2, ctx)?;
    let pv = opt_number_arg(args, 3, ctx, 0.0)?;
    let kind = type_arg(args, 4, ctx)?;

    if rate == 0.0 {
        return checked(-(pv + pmt * nper));
    }

    let growth = (1.0 + rate).powf(nper);
    checked(-(pv * growth + pmt * (1.0 + rate * kind) * (growth - 1.0) / rate))
}

/// NPER(rate, pmt, pv, [fv], [type])
pub fn fn_nper(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let rate = number_arg(args, 0, ctx)?;
    let pmt = number_arg(args, 1, ctx)?;
    let pv = number_arg(args, 2, ctx)?;
    let fv = opt_number_arg(args, 3, ctx, 0.0)?;
    let kind = type_arg(args, 4, ctx)?;

    if rate == 0.0 {
        if pmt == 0.0 {
            return Err(FormulaError::DivisionByZero);
        }
        return checked(-(pv + fv) / pmt);
    }

    let z = pmt * (1.0 + rate * kind) / rate;
    checked(((z - fv) / (pv + z)).ln() / (1.0 + rate).ln())
}

/// RATE(nper, pmt, pv, [fv], [type], [guess])
///
/// Solved with the secant method from `guess` (default 10%). Returns the rate with a
/// percentage display format.
pub fn fn_rate(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let nper = number_arg(args, 0, ctx)?;
    let pmt = number_arg(args, 1, ctx)?;
    let pv = number_arg(args, 2, ctx)?;
    let fv = opt_number_arg(args, 3, ctx, 0.0)?;
    let kind = type_arg(args, 4, ctx)?;
    let guess = opt_number_arg(args, 5, ctx, 0.1)?;

    let balance = |rate: f64| {
        if rate.abs() < RATE_PRECISION {
            pv * (1.0 + nper * rate) + pmt * (1.0 + rate * kind) * nper + fv
        } else {
            let growth = (nper * (1.0 + rate).ln()).exp();
            pv * growth + pmt * (1.0 / rate + kind) * (growth - 1.0) + fv
        }
    };

    let mut rate = guess;
    let (mut x0, mut x1) = (0.0, rate);
    let (mut y0, mut y1) = (pv + pmt * nper + fv, balance(rate));
    let mut iterations = 0;

    while (y0 - y1).abs() > RATE_PRECISION && iterations < RATE_MAX_ITERATIONS {
        rate = (y1 * x0 - y0 * x1) / (y1 - y0);
        x0 = x1;
        x1 = rate;
        y0 = y1;
        y1 = balance(rate);
        iterations += 1;
    }

    trace!("RATE settled on {} after {} iterations", rate, iterations);
    let converged = (y0 - y1).abs() <= RATE_PRECISION;
    if !converged || !rate.is_finite() || !y1.is_finite() {
        return Err(FormulaError::RateNotConvergent);
    }
    Ok(Value::formatted(Value::Number(rate), "0.00%"))
}
