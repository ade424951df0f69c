//! Display formats
//!
//! Applies spreadsheet-style format patterns (`#,##0.00`, `0.0%`, `0.00E+00`, `yyyy-mm-dd`,
//! `h:mm AM/PM`) to values. Patterns may carry up to three `;`-separated sections for positive,
//! negative and zero numbers.

use crate::error::{FormulaError, FormulaResult};
use crate::value::{serial_to_date, Value};
use chrono::{Datelike, NaiveDateTime, Timelike};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Format a value with a display pattern
///
/// Strings are returned unchanged (with `@` substituted when the pattern has one) and booleans
/// render as `TRUE`/`FALSE`. Numbers and dates are formatted as numbers or dates depending on the
/// pattern.
pub fn format_value(value: &Value, pattern: &str) -> FormulaResult<String> {
    let n = match value.unformatted() {
        Value::Empty => return Ok(String::new()),
        Value::Boolean(b) => return Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::String(s) => {
            return Ok(if pattern.contains('@') {
                pattern.replace('@', s)
            } else {
                s.clone()
            })
        }
        Value::List(_) | Value::Reference(_) => return Ok(value.to_text()),
        other => other.to_number(),
    };

    if pattern.trim().is_empty() || pattern.trim().eq_ignore_ascii_case("general") {
        return Ok(value.to_text());
    }

    let sections = split_sections(pattern);
    let (section, n, auto_sign) = match sections.as_slice() {
        [_, negative, ..] if n < 0.0 => (*negative, n.abs(), false),
        [_, _, zero, ..] if n == 0.0 => (*zero, n, false),
        [first, ..] => (*first, n, true),
        [] => return Ok(value.to_text()),
    };

    if is_date_pattern(section) {
        let date = serial_to_date(n).ok_or_else(|| FormulaError::InvalidDate(value.to_text()))?;
        Ok(format_date(&date, section))
    } else {
        Ok(format_number(n, section, auto_sign))
    }
}

// === Pattern scanning ===

/// Split a pattern at `;` outside quotes
fn split_sections(pattern: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escape = false;

    for (idx, ch) in pattern.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if !in_quotes => escape = true,
            ';' if !in_quotes => {
                sections.push(&pattern[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    sections.push(&pattern[start..]);
    sections
}

/// Characters of a pattern outside quotes, escapes and `[...]` blocks, with their byte offsets
fn unquoted_chars(pattern: &str) -> Vec<(usize, char)> {
    let mut chars = Vec::new();
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut skip_next = false;

    for (idx, ch) in pattern.char_indices() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if in_quotes {
            in_quotes = ch != '"';
            continue;
        }
        if in_brackets {
            in_brackets = ch != ']';
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            '[' => in_brackets = true,
            '\\' | '_' | '*' => skip_next = true,
            _ => chars.push((idx, ch)),
        }
    }
    chars
}

fn is_date_pattern(section: &str) -> bool {
    let chars = unquoted_chars(section);
    let has_digits = chars.iter().any(|(_, c)| matches!(c, '0' | '#' | '?'));
    let has_date = chars
        .iter()
        .any(|(_, c)| matches!(c.to_ascii_lowercase(), 'y' | 'm' | 'd' | 'h' | 's'));
    has_date && !has_digits
}

/// Render the literal parts of a pattern (quotes, escapes, padding)
fn render_literal(segment: &str) -> String {
    let mut out = String::new();
    let mut chars = segment.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                    out.push(inner);
                }
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '_' => {
                chars.next();
                out.push(' ');
            }
            '*' => {
                chars.next();
            }
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

// === Numbers ===

fn format_number(value: f64, section: &str, auto_sign: bool) -> String {
    let chars = unquoted_chars(section);
    let percent = chars.iter().filter(|(_, c)| *c == '%').count();

    let first = chars.iter().find(|(_, c)| matches!(c, '0' | '#' | '?' | '.'));
    let last = chars.iter().rev().find(|(_, c)| matches!(c, '0' | '#' | '?'));
    let (start, end) = match (first, last) {
        (Some((start, _)), Some((end, _))) => (*start, *end + 1),
        _ => return render_literal(section),
    };

    let mut v = value.abs();
    for _ in 0..percent {
        v *= 100.0;
    }

    let body = &section[start..end];
    let digits = match body.find(|c: char| c == 'E' || c == 'e') {
        Some(split) => format_scientific(v, &body[..split], &body[split + 1..]),
        None => format_fixed(v, body),
    };

    let mut out = format!(
        "{}{}{}",
        render_literal(&section[..start]),
        digits,
        render_literal(&section[end..])
    );
    if value < 0.0 && auto_sign && digits.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.insert(0, '-');
    }
    out
}

/// Format with digit placeholders, grouping and a fixed number of decimals
fn format_fixed(value: f64, body: &str) -> String {
    let (int_pattern, frac_pattern) = match body.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (body, None),
    };

    let min_int = int_pattern.chars().filter(|c| *c == '0').count();
    let grouping = int_pattern.contains(',');
    let (min_frac, max_frac) = frac_pattern.map_or((0, 0), |frac| {
        (
            frac.chars().filter(|c| *c == '0').count(),
            frac.chars().filter(|c| matches!(c, '0' | '#' | '?')).count(),
        )
    });

    let rounded = format!("{:.*}", max_frac, round_half_away(value, max_frac as i32));
    let (int_digits, frac_digits) = match rounded.split_once('.') {
        Some((int, frac)) => (int.to_string(), frac.to_string()),
        None => (rounded, String::new()),
    };

    let mut int_digits = if int_digits == "0" && min_int == 0 {
        String::new()
    } else {
        int_digits
    };
    while int_digits.len() < min_int {
        int_digits.insert(0, '0');
    }
    if grouping {
        int_digits = group_thousands(&int_digits);
    }

    let mut frac_digits = frac_digits;
    while frac_digits.len() > min_frac && frac_digits.ends_with('0') {
        frac_digits.pop();
    }

    match frac_pattern {
        Some(_) => format!("{}.{}", int_digits, frac_digits),
        None => int_digits,
    }
}

/// Format as `mantissa E±exponent`
fn format_scientific(value: f64, mantissa_pattern: &str, exponent_pattern: &str) -> String {
    let always_sign = exponent_pattern.starts_with('+');
    let exp_digits = exponent_pattern
        .chars()
        .filter(|c| matches!(c, '0' | '#'))
        .count()
        .max(1);
    let frac_digits = mantissa_pattern
        .split_once('.')
        .map_or(0, |(_, frac)| frac.chars().filter(|c| matches!(c, '0' | '#')).count());

    let mut exponent = if value == 0.0 {
        0
    } else {
        value.log10().floor() as i32
    };
    let mut mantissa = round_half_away(value / 10f64.powi(exponent), frac_digits as i32);
    if mantissa >= 10.0 {
        mantissa /= 10.0;
        exponent += 1;
    }

    let sign = if exponent < 0 {
        "-"
    } else if always_sign {
        "+"
    } else {
        ""
    };
    format!(
        "{}E{}{:0width$}",
        format_fixed(mantissa, mantissa_pattern),
        sign,
        exponent.abs(),
        width = exp_digits
    )
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn round_half_away(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    let scaled = value * factor;
    if scaled.is_finite() {
        scaled.round() / factor
    } else {
        value
    }
}

// === Dates ===

#[derive(Debug, Clone, Copy, PartialEq)]
enum DatePart {
    Year(usize),
    /// Month or minute, resolved from the neighbouring parts
    M(usize),
    Month(usize),
    Minute(usize),
    Day(usize),
    Hour(usize),
    Second(usize),
    AmPm,
}

enum DateToken {
    Part(DatePart),
    Literal(String),
}

fn format_date(date: &NaiveDateTime, section: &str) -> String {
    let mut tokens = tokenize_date(section);
    resolve_minutes(&mut tokens);
    let twelve_hour = tokens
        .iter()
        .any(|t| matches!(t, DateToken::Part(DatePart::AmPm)));

    let mut out = String::new();
    for token in &tokens {
        match token {
            DateToken::Literal(text) => out.push_str(text),
            DateToken::Part(part) => out.push_str(&render_date_part(date, *part, twelve_hour)),
        }
    }
    out
}

fn tokenize_date(section: &str) -> Vec<DateToken> {
    let chars: Vec<char> = section.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let lower = ch.to_ascii_lowercase();

        if matches!(lower, 'y' | 'm' | 'd' | 'h' | 's') {
            let run = chars[i..]
                .iter()
                .take_while(|c| c.to_ascii_lowercase() == lower)
                .count();
            if !literal.is_empty() {
                tokens.push(DateToken::Literal(std::mem::take(&mut literal)));
            }
            let part = match lower {
                'y' => DatePart::Year(run),
                'm' => DatePart::M(run),
                'd' => DatePart::Day(run),
                'h' => DatePart::Hour(run),
                _ => DatePart::Second(run),
            };
            tokens.push(DateToken::Part(part));
            i += run;
            continue;
        }

        let rest: String = chars[i..].iter().take(5).collect();
        if rest.eq_ignore_ascii_case("AM/PM") {
            if !literal.is_empty() {
                tokens.push(DateToken::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(DateToken::Part(DatePart::AmPm));
            i += 5;
            continue;
        }

        match ch {
            '"' => {
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    literal.push(chars[i]);
                    i += 1;
                }
            }
            '\\' => {
                i += 1;
                if let Some(next) = chars.get(i) {
                    literal.push(*next);
                }
            }
            '[' => {
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
            }
            _ => literal.push(ch),
        }
        i += 1;
    }

    if !literal.is_empty() {
        tokens.push(DateToken::Literal(literal));
    }
    tokens
}

/// `m`/`mm` means minutes right after an hour or right before a second
fn resolve_minutes(tokens: &mut [DateToken]) {
    let parts: Vec<(usize, DatePart)> = tokens
        .iter()
        .enumerate()
        .filter_map(|(idx, t)| match t {
            DateToken::Part(part) => Some((idx, *part)),
            DateToken::Literal(_) => None,
        })
        .collect();

    for (pos, (idx, part)) in parts.iter().enumerate() {
        if let DatePart::M(run) = part {
            let after_hour = pos > 0 && matches!(parts[pos - 1].1, DatePart::Hour(_));
            let before_second = matches!(parts.get(pos + 1), Some((_, DatePart::Second(_))));
            tokens[*idx] = DateToken::Part(if *run <= 2 && (after_hour || before_second) {
                DatePart::Minute(*run)
            } else {
                DatePart::Month(*run)
            });
        }
    }
}

fn render_date_part(date: &NaiveDateTime, part: DatePart, twelve_hour: bool) -> String {
    match part {
        DatePart::Year(run) if run <= 2 => format!("{:02}", date.year().rem_euclid(100)),
        DatePart::Year(_) => format!("{:04}", date.year()),
        DatePart::Month(run) | DatePart::M(run) => {
            let month = date.month0() as usize;
            match run {
                1 => (month + 1).to_string(),
                2 => format!("{:02}", month + 1),
                3 => MONTHS[month][..3].to_string(),
                _ => MONTHS[month].to_string(),
            }
        }
        DatePart::Minute(1) => date.minute().to_string(),
        DatePart::Minute(_) => format!("{:02}", date.minute()),
        DatePart::Day(run) => {
            let weekday = date.weekday().num_days_from_sunday() as usize;
            match run {
                1 => date.day().to_string(),
                2 => format!("{:02}", date.day()),
                3 => WEEKDAYS[weekday][..3].to_string(),
                _ => WEEKDAYS[weekday].to_string(),
            }
        }
        DatePart::Hour(run) => {
            let hour = if twelve_hour {
                match date.hour() % 12 {
                    0 => 12,
                    h => h,
                }
            } else {
                date.hour()
            };
            if run == 1 {
                hour.to_string()
            } else {
                format!("{:02}", hour)
            }
        }
        DatePart::Second(1) => date.second().to_string(),
        DatePart::Second(_) => format!("{:02}", date.second()),
        DatePart::AmPm => (if date.hour() < 12 { "AM" } else { "PM" }).to_string(),
    }
}
