//! Runtime values and coercions

use crate::error::{FormulaError, FormulaResult};
use crate::expr::RangeRef;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use gridcalc_core::CellValue;
use lazy_regex::regex_captures;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Blank cell or omitted argument
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    Date(NaiveDateTime),
    /// A value with a suggested display format (e.g. `0.00%` for RATE)
    Formatted { value: Box<Value>, format: String },
    /// Row-major expansion of a multi-cell range
    List(Vec<Value>),
    /// An unevaluated range, resolved by the caller
    Reference(RangeRef),
}

impl Value {
    /// Wrap a value with a suggested display format
    pub fn formatted(value: Value, format: impl Into<String>) -> Self {
        Value::Formatted {
            value: Box::new(value),
            format: format.into(),
        }
    }

    /// Blank cell, omitted argument or empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::String(s) => s.is_empty(),
            Value::Formatted { value, .. } => value.is_empty(),
            _ => false,
        }
    }

    /// Strip a display-format suggestion
    pub fn unformatted(&self) -> &Value {
        match self {
            Value::Formatted { value, .. } => value.unformatted(),
            other => other,
        }
    }

    /// Strip a display-format suggestion, by value
    pub fn into_unformatted(self) -> Value {
        match self {
            Value::Formatted { value, .. } => (*value).into_unformatted(),
            other => other,
        }
    }

    /// The numeric payload of a number or date cell, without text coercion
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Date(d) => Some(date_to_serial(*d)),
            Value::Formatted { value, .. } => value.as_number(),
            _ => None,
        }
    }

    /// Convert to number; text that is not numeric yields `NaN`
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Empty => 0.0,
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Date(d) => date_to_serial(*d),
            Value::String(s) => parse_number(s).unwrap_or(f64::NAN),
            Value::Formatted { value, .. } => value.to_number(),
            Value::List(items) if items.len() == 1 => items[0].to_number(),
            Value::List(_) | Value::Reference(_) => f64::NAN,
        }
    }

    /// Convert to boolean
    pub fn to_bool(&self) -> FormulaResult<bool> {
        match self {
            Value::Empty => Ok(false),
            Value::Boolean(b) => Ok(*b),
            Value::Number(n) => Ok(*n != 0.0),
            Value::Date(d) => Ok(date_to_serial(*d) != 0.0),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Ok(false)
                } else if trimmed.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if trimmed.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else if let Some(n) = parse_number(trimmed) {
                    Ok(n != 0.0)
                } else {
                    Err(FormulaError::InvalidParameters(format!(
                        "cannot convert '{}' to a boolean",
                        s
                    )))
                }
            }
            Value::Formatted { value, .. } => value.to_bool(),
            Value::List(items) if items.len() == 1 => items[0].to_bool(),
            Value::List(_) | Value::Reference(_) => Err(FormulaError::InvalidParameters(
                "cannot convert a range to a boolean".into(),
            )),
        }
    }

    /// Convert to text
    pub fn to_text(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => number_to_text(*n),
            Value::String(s) => s.clone(),
            Value::Boolean(true) => "TRUE".to_string(),
            Value::Boolean(false) => "FALSE".to_string(),
            Value::Date(d) => date_to_text(*d),
            Value::Formatted { value, .. } => value.to_text(),
            Value::List(items) => items.first().map(Value::to_text).unwrap_or_default(),
            Value::Reference(r) => r.to_string(),
        }
    }

    /// Convert to a date; numbers are serial days since 1899-12-30
    pub fn to_date(&self) -> FormulaResult<NaiveDateTime> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Empty | Value::Number(_) => serial_to_date(self.to_number())
                .ok_or_else(|| FormulaError::InvalidDate(self.to_text())),
            Value::String(s) => {
                if let Some(n) = parse_number(s) {
                    return serial_to_date(n).ok_or_else(|| FormulaError::InvalidDate(s.clone()));
                }
                parse_date(s).ok_or_else(|| FormulaError::InvalidDate(s.clone()))
            }
            Value::Formatted { value, .. } => value.to_date(),
            Value::List(items) if items.len() == 1 => items[0].to_date(),
            other => Err(FormulaError::InvalidDate(other.to_text())),
        }
    }
}

impl From<&CellValue> for Value {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Empty,
            CellValue::Number(n) => Value::Number(*n),
            CellValue::String(s) => Value::String(s.clone()),
            CellValue::Boolean(b) => Value::Boolean(*b),
            CellValue::Date(d) => Value::Date(*d),
            CellValue::Formula(text) => Value::String(text.clone()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

/// Parse trimmed text as a finite number
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    // Reject "inf"/"nan" spellings that f64::from_str accepts
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number the way cells show it without an explicit format
pub fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn date_to_text(d: NaiveDateTime) -> String {
    if d.time() == NaiveTime::MIN {
        d.format("%Y-%m-%d").to_string()
    } else {
        d.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Day zero of the serial date system
pub fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN)
}

/// Serial day number (fractional part is the time of day)
pub fn date_to_serial(date: NaiveDateTime) -> f64 {
    (date - epoch()).num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Date for a serial day number
pub fn serial_to_date(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial.abs() > 2_958_465.0 {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    epoch().checked_add_signed(Duration::milliseconds(millis))
}

/// Parse the date formats accepted in `#...#` literals and date arguments
///
/// Accepts `yyyy-mm-dd`, `yyyy/mm/dd` and `mm/dd/yyyy`, each optionally followed by
/// `hh:mm[:ss]`, plus a bare `hh:mm[:ss]` time of day.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Some((_, y, m, d, rest)) =
        regex_captures!(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})(?:[ T]+(.*))?$", text)
    {
        return build_date(y, m, d, rest);
    }

    if let Some((_, m, d, y, rest)) =
        regex_captures!(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\s+(.*))?$", text)
    {
        return build_date(y, m, d, rest);
    }

    parse_time(text).map(|time| epoch().date().and_time(time))
}

fn build_date(year: &str, month: &str, day: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    let time = if time.trim().is_empty() {
        NaiveTime::MIN
    } else {
        parse_time(time)?
    };
    Some(date.and_time(time))
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    let (_, h, m, s) = regex_captures!(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?$", text.trim())?;
    let seconds = if s.is_empty() { 0 } else { s.parse().ok()? };
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, seconds)
}

/// Seconds since midnight of a date's time part
pub fn seconds_of_day(date: &NaiveDateTime) -> u32 {
    date.time().num_seconds_from_midnight()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::Empty.to_number(), 0.0);
        assert_eq!(Value::Boolean(true).to_number(), 1.0);
        assert_eq!(Value::from(" 5 ").to_number(), 5.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert!(Value::from("inf").to_number().is_nan());
        assert_eq!(Value::List(vec![Value::Number(3.0)]).to_number(), 3.0);
        assert!(Value::List(vec![Value::Number(3.0), Value::Number(4.0)])
            .to_number()
            .is_nan());
    }

    #[test]
    fn test_date_serials() {
        assert_eq!(date_to_serial(ymd(1899, 12, 31)), 1.0);
        assert_eq!(date_to_serial(ymd(1900, 3, 1)), 61.0);
        assert_eq!(date_to_serial(ymd(2024, 1, 1)), 45292.0);
        assert_eq!(serial_to_date(45292.5).unwrap(), ymd(2024, 1, 1) + Duration::hours(12));
        assert!(serial_to_date(f64::NAN).is_none());
    }

    #[test]
    fn test_to_bool() {
        assert_eq!(Value::from("true").to_bool(), Ok(true));
        assert_eq!(Value::from("FALSE").to_bool(), Ok(false));
        assert_eq!(Value::from("2").to_bool(), Ok(true));
        assert_eq!(Value::Number(0.0).to_bool(), Ok(false));
        assert_eq!(Value::Empty.to_bool(), Ok(false));
        assert!(matches!(
            Value::from("maybe").to_bool(),
            Err(FormulaError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Number(3.0).to_text(), "3");
        assert_eq!(Value::Number(-2.5).to_text(), "-2.5");
        assert_eq!(Value::Number(0.1 + 0.2).to_text(), "0.30000000000000004");
        assert_eq!(Value::Boolean(true).to_text(), "TRUE");
        assert_eq!(Value::Date(ymd(2020, 2, 29)).to_text(), "2020-02-29");
        assert_eq!(
            Value::Date(ymd(2020, 2, 29) + Duration::minutes(90)).to_text(),
            "2020-02-29 01:30:00"
        );
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2015-01-31"), Some(ymd(2015, 1, 31)));
        assert_eq!(parse_date("2015/1/31"), Some(ymd(2015, 1, 31)));
        assert_eq!(parse_date("01/31/2015"), Some(ymd(2015, 1, 31)));
        assert_eq!(
            parse_date("2015-01-31 10:30"),
            Some(ymd(2015, 1, 31) + Duration::minutes(630))
        );
        assert_eq!(parse_date("2015-02-30"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_to_date() {
        assert_eq!(Value::Number(45292.0).to_date(), Ok(ymd(2024, 1, 1)));
        assert_eq!(Value::from("2024-01-01").to_date(), Ok(ymd(2024, 1, 1)));
        assert!(matches!(
            Value::from("soon").to_date(),
            Err(FormulaError::InvalidDate(_))
        ));
    }
}
