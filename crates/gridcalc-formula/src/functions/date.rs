//! Date and time functions
//!
//! Dates are serial day numbers counted from 1899-12-30; the fractional part is the time of day.

use super::{date_arg, has_arg, int_arg, number_arg, text_arg};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::value::Value;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Timelike};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// NOW function
pub fn fn_now(_args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let now = Local::now().naive_local();
    let now = now.with_nanosecond(0).unwrap_or(now);
    Ok(Value::formatted(
        Value::Date(now),
        ctx.engine.options().datetime_display_format.clone(),
    ))
}

/// TODAY function
pub fn fn_today(_args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let today = Local::now().date_naive().and_time(NaiveTime::MIN);
    Ok(Value::formatted(
        Value::Date(today),
        ctx.engine.options().date_display_format.clone(),
    ))
}

/// YEAR function
pub fn fn_year(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(date_arg(args, 0, ctx)?.year() as f64))
}

/// MONTH function
pub fn fn_month(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(date_arg(args, 0, ctx)?.month() as f64))
}

/// DAY function
pub fn fn_day(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(date_arg(args, 0, ctx)?.day() as f64))
}

/// HOUR function
pub fn fn_hour(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(date_arg(args, 0, ctx)?.hour() as f64))
}

/// MINUTE function
pub fn fn_minute(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(date_arg(args, 0, ctx)?.minute() as f64))
}

/// SECOND function
pub fn fn_second(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(date_arg(args, 0, ctx)?.second() as f64))
}

/// TIME function
///
/// Returns the fraction of a day, wrapping past midnight.
pub fn fn_time(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let hours = number_arg(args, 0, ctx)?.trunc();
    let minutes = number_arg(args, 1, ctx)?.trunc();
    let seconds = number_arg(args, 2, ctx)?.trunc();

    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    if total < 0.0 {
        return Err(FormulaError::InvalidParameters(
            "TIME must not be negative".into(),
        ));
    }

    let fraction = (total % SECONDS_PER_DAY) / SECONDS_PER_DAY;
    Ok(Value::formatted(Value::Number(fraction), "hh:mm:ss"))
}

/// DATE function
///
/// Years 0-1899 are offset by 1900; months and days outside their range roll over into the
/// neighbouring years and months.
pub fn fn_date(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut year = int_arg(args, 0, ctx)?;
    let month = int_arg(args, 1, ctx)?;
    let day = int_arg(args, 2, ctx)?;

    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) || month.abs() > 120_000 || day.abs() > 3_000_000 {
        return Err(FormulaError::InvalidParameters(format!(
            "date {}-{}-{} is out of range",
            year, month, day
        )));
    }

    let months = year * 12 + month - 1;
    let first = i32::try_from(months.div_euclid(12))
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, months.rem_euclid(12) as u32 + 1, 1));
    let date = first
        .and_then(|first| first.checked_add_signed(Duration::days(day - 1)))
        .ok_or_else(|| FormulaError::InvalidDate(format!("{}-{}-{}", year, month, day)))?;

    Ok(Value::formatted(
        Value::Date(date.and_time(NaiveTime::MIN)),
        ctx.engine.options().date_display_format.clone(),
    ))
}

/// WEEKDAY function
///
/// Return type 1 (default): Sunday = 1 .. Saturday = 7; 2: Monday = 1 .. Sunday = 7;
/// 3: Monday = 0 .. Sunday = 6.
pub fn fn_weekday(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let date = date_arg(args, 0, ctx)?;
    let return_type = if has_arg(args, 1) {
        int_arg(args, 1, ctx)?
    } else {
        1
    };

    let weekday = date.weekday();
    let n = match return_type {
        1 => weekday.number_from_sunday(),
        2 => weekday.number_from_monday(),
        3 => weekday.num_days_from_monday(),
        other => {
            return Err(FormulaError::InvalidParameters(format!(
                "unknown WEEKDAY return type {}",
                other
            )))
        }
    };
    Ok(Value::Number(n as f64))
}

/// DATEDIF function
pub fn fn_datedif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let start = date_arg(args, 0, ctx)?.date();
    let end = date_arg(args, 1, ctx)?.date();
    let unit = text_arg(args, 2, ctx)?.to_uppercase();

    if start > end {
        return Err(FormulaError::InvalidParameters(
            "DATEDIF start date is after the end date".into(),
        ));
    }

    let n = match unit.as_str() {
        "Y" => whole_months(start, end) / 12,
        "M" => whole_months(start, end),
        "D" => (end - start).num_days(),
        "YM" => whole_months(start, end) % 12,
        "YD" => year_days(start, end),
        "MD" => month_days(start, end),
        other => {
            return Err(FormulaError::InvalidParameters(format!(
                "unknown DATEDIF unit '{}'",
                other
            )))
        }
    };
    Ok(Value::Number(n as f64))
}

/// Completed months between two dates
fn whole_months(start: NaiveDate, end: NaiveDate) -> i64 {
    let months = (end.year() - start.year()) as i64 * 12 + end.month() as i64 - start.month() as i64;
    if end.day() < start.day() {
        months - 1
    } else {
        months
    }
}

/// Days between the start's anniversary (on or before the end) and the end
fn year_days(start: NaiveDate, end: NaiveDate) -> i64 {
    let anniversary = |year: i32| {
        NaiveDate::from_ymd_opt(year, start.month(), start.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, start.month(), 28))
            .unwrap_or(end)
    };

    let mut from = anniversary(end.year());
    if from > end {
        from = anniversary(end.year() - 1);
    }
    (end - from).num_days()
}

/// Day difference ignoring months and years
fn month_days(start: NaiveDate, end: NaiveDate) -> i64 {
    let days = end.day() as i64 - start.day() as i64;
    if days >= 0 {
        return days;
    }
    days + days_in_previous_month(end)
}

fn days_in_previous_month(date: NaiveDate) -> i64 {
    date.with_day(1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day() as i64)
}
