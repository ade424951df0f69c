//! Criteria matching for COUNTIF, SUMIF, AVERAGEIF, DCOUNT and related functions
//!
//! Criteria can be:
//! - A number or boolean: equality (e.g., 5)
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=apple"
//! - Text without an operator: case-insensitive equality
//! - Wildcards with `=`/`<>`: "*" matches any characters, "?" a single character, "~" escapes
//! - Empty text: matches blank cells ("<>" matches non-blank cells)

use crate::error::{FormulaError, FormulaResult};
use crate::expr::{compare_values, BinaryOp};
use crate::value::{parse_number, Value};
use regex::Regex;

/// A compiled criterion
#[derive(Debug, Clone)]
pub enum Criteria {
    /// Comparison against a value using the binary-operator comparison
    Compare { op: BinaryOp, operand: Value },
    /// Case-insensitive anchored wildcard pattern
    Pattern { regex: Regex, negate: bool },
    /// Blank (or, negated, non-blank) cells
    Blank { negate: bool },
}

impl Criteria {
    /// Compile a criterion from an evaluated argument
    pub fn parse(criteria: &Value) -> FormulaResult<Self> {
        match criteria.unformatted() {
            Value::String(text) => Self::parse_text(text),
            Value::Empty => Ok(Criteria::Blank { negate: false }),
            other => Ok(Criteria::Compare {
                op: BinaryOp::Eq,
                operand: other.clone(),
            }),
        }
    }

    fn parse_text(text: &str) -> FormulaResult<Self> {
        let (op, rest) = split_operator(text);

        if rest.is_empty() {
            return match op {
                BinaryOp::Eq => Ok(Criteria::Blank { negate: false }),
                BinaryOp::Ne => Ok(Criteria::Blank { negate: true }),
                _ => Err(FormulaError::InvalidCriteria(text.to_string())),
            };
        }

        if matches!(op, BinaryOp::Eq | BinaryOp::Ne) && has_wildcards(rest) {
            let regex = wildcard_regex(rest, true)?;
            return Ok(Criteria::Pattern {
                regex,
                negate: op == BinaryOp::Ne,
            });
        }

        let operand = match parse_number(rest) {
            Some(n) => Value::Number(n),
            None => match rest.to_ascii_uppercase().as_str() {
                "TRUE" => Value::Boolean(true),
                "FALSE" => Value::Boolean(false),
                _ => Value::String(rest.to_string()),
            },
        };
        Ok(Criteria::Compare { op, operand })
    }

    /// Check if a value matches the criterion
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Criteria::Blank { negate } => value.is_empty() != *negate,
            Criteria::Pattern { regex, negate } => regex.is_match(&value.to_text()) != *negate,
            Criteria::Compare { op, operand } => {
                // Blank cells only satisfy "not equal"
                if value.is_empty() {
                    return *op == BinaryOp::Ne;
                }
                compare_values(*op, value, operand)
            }
        }
    }
}

fn split_operator(text: &str) -> (BinaryOp, &str) {
    const OPERATORS: [(&str, BinaryOp); 6] = [
        (">=", BinaryOp::Ge),
        ("<=", BinaryOp::Le),
        ("<>", BinaryOp::Ne),
        (">", BinaryOp::Gt),
        ("<", BinaryOp::Lt),
        ("=", BinaryOp::Eq),
    ];

    for (symbol, op) in OPERATORS {
        if let Some(rest) = text.strip_prefix(symbol) {
            return (op, rest.trim());
        }
    }
    (BinaryOp::Eq, text.trim())
}

/// Check for `*` or `?` wildcards
pub fn has_wildcards(text: &str) -> bool {
    text.contains(|c: char| c == '*' || c == '?')
}

/// Compile wildcard text into a case-insensitive regex
///
/// `*` matches any run of characters, `?` one character and `~` escapes the next character.
/// An anchored regex must match the whole text.
pub fn wildcard_regex(text: &str, anchored: bool) -> FormulaResult<Regex> {
    let mut pattern = String::from("(?i)");
    if anchored {
        pattern.push('^');
    }

    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '~' => match chars.next() {
                Some(escaped) => pattern.push_str(&regex::escape(&escaped.to_string())),
                None => pattern.push('~'),
            },
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }

    if anchored {
        pattern.push('$');
    }
    Regex::new(&pattern).map_err(|e| FormulaError::InvalidCriteria(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(text: &str) -> Criteria {
        Criteria::parse(&Value::from(text)).unwrap()
    }

    #[test]
    fn test_number_criteria() {
        let c = Criteria::parse(&Value::Number(5.0)).unwrap();
        assert!(c.matches(&Value::Number(5.0)));
        assert!(!c.matches(&Value::Number(4.0)));
        assert!(!c.matches(&Value::Empty));
    }

    #[test]
    fn test_comparison_criteria() {
        let c = criteria(">5");
        assert!(c.matches(&Value::Number(6.0)));
        assert!(!c.matches(&Value::Number(5.0)));

        let c = criteria(">=5");
        assert!(c.matches(&Value::Number(5.0)));
        assert!(!c.matches(&Value::Number(4.0)));

        let c = criteria("<5");
        assert!(c.matches(&Value::Number(4.0)));
        assert!(!c.matches(&Value::Number(5.0)));

        let c = criteria("<=5");
        assert!(c.matches(&Value::Number(5.0)));
        assert!(!c.matches(&Value::Number(6.0)));

        let c = criteria("<>5");
        assert!(c.matches(&Value::Number(6.0)));
        assert!(!c.matches(&Value::Number(5.0)));
        assert!(c.matches(&Value::Empty));

        let c = criteria("=5");
        assert!(c.matches(&Value::Number(5.0)));
        assert!(!c.matches(&Value::Number(6.0)));
    }

    #[test]
    fn test_text_criteria() {
        let c = criteria("apple");
        assert!(c.matches(&Value::from("apple")));
        assert!(c.matches(&Value::from("APPLE")));
        assert!(!c.matches(&Value::from("banana")));
        assert!(!c.matches(&Value::Number(1.0)));
    }

    #[test]
    fn test_wildcard_criteria() {
        let c = criteria("a*");
        assert!(c.matches(&Value::from("apple")));
        assert!(c.matches(&Value::from("Avocado")));
        assert!(!c.matches(&Value::from("banana")));

        let c = criteria("a?ple");
        assert!(c.matches(&Value::from("apple")));
        assert!(!c.matches(&Value::from("aple")));

        let c = criteria("<>a*");
        assert!(!c.matches(&Value::from("apple")));
        assert!(c.matches(&Value::from("banana")));

        let c = criteria("what~?");
        assert!(c.matches(&Value::from("what?")));
        assert!(!c.matches(&Value::from("whatx")));
    }

    #[test]
    fn test_blank_criteria() {
        let c = criteria("");
        assert!(c.matches(&Value::Empty));
        assert!(c.matches(&Value::from("")));
        assert!(!c.matches(&Value::Number(0.0)));

        let c = criteria("<>");
        assert!(c.matches(&Value::Number(0.0)));
        assert!(!c.matches(&Value::Empty));
    }

    #[test]
    fn test_invalid_criteria() {
        assert!(matches!(
            Criteria::parse(&Value::from(">")),
            Err(FormulaError::InvalidCriteria(_))
        ));
    }
}
