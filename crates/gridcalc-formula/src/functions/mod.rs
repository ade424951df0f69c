//! Built-in spreadsheet functions

pub mod criteria;
pub mod database;
pub mod date;
pub mod financial;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{Expr, RangeRef};
use crate::value::Value;
use ahash::AHashMap;
use chrono::NaiveDateTime;
use std::fmt;
use std::rc::Rc;

/// Function implementation signature
///
/// Functions receive their unevaluated argument nodes so they can evaluate lazily (`IF`,
/// `IFERROR`, `CHOOSE`) or inspect references without reading them (`ROW`, `INDEX`).
pub type FunctionBody = dyn Fn(&[Expr], &EvaluationContext) -> FormulaResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: String,
    /// Minimum arguments (None = no lower bound)
    pub min_args: Option<usize>,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub body: Box<FunctionBody>,
}

impl FunctionDef {
    pub fn new<F>(name: &str, min_args: Option<usize>, max_args: Option<usize>, body: F) -> Self
    where
        F: Fn(&[Expr], &EvaluationContext) -> FormulaResult<Value> + 'static,
    {
        Self {
            name: name.to_uppercase(),
            min_args,
            max_args,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

/// Function table keyed by case-insensitive name
pub struct FunctionTable {
    functions: AHashMap<String, Rc<FunctionDef>>,
}

impl FunctionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Create a table with all built-in functions
    pub fn with_builtins() -> Self {
        let mut table = Self::new();

        table.register_math_functions();
        table.register_statistical_functions();
        table.register_lookup_functions();
        table.register_text_functions();
        table.register_date_functions();
        table.register_logical_functions();
        table.register_financial_functions();

        table
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    /// Insert a function, replacing any definition with the same name
    pub fn insert(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_lowercase(), Rc::new(def));
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register<F>(&mut self, name: &str, min_args: usize, max_args: Option<usize>, body: F)
    where
        F: Fn(&[Expr], &EvaluationContext) -> FormulaResult<Value> + 'static,
    {
        self.insert(FunctionDef::new(name, Some(min_args), max_args, body));
    }

    fn register_math_functions(&mut self) {
        self.register("ABS", 1, Some(1), math::fn_abs);
        self.register("INT", 1, Some(1), math::fn_int);
        self.register("ROUND", 1, Some(2), math::fn_round);
        self.register("ROUNDUP", 1, Some(2), math::fn_roundup);
        self.register("ROUNDDOWN", 1, Some(2), math::fn_rounddown);
        self.register("MOD", 2, Some(2), math::fn_mod);
        self.register("POWER", 2, Some(2), math::fn_power);
        self.register("SQRT", 1, Some(1), math::fn_sqrt);
        self.register("PI", 0, Some(0), math::fn_pi);
        self.register("SIGN", 1, Some(1), math::fn_sign);
        self.register("EXP", 1, Some(1), math::fn_exp);
        self.register("LN", 1, Some(1), math::fn_ln);
        self.register("LOG10", 1, Some(1), math::fn_log10);
    }

    fn register_statistical_functions(&mut self) {
        self.register("SUM", 1, None, statistical::fn_sum);
        self.register("AVERAGE", 1, None, statistical::fn_average);
        self.register("MAX", 1, None, statistical::fn_max);
        self.register("MIN", 1, None, statistical::fn_min);
        self.register("VAR", 1, None, statistical::fn_var);
        self.register("VARP", 1, None, statistical::fn_varp);
        self.register("STDEV", 1, None, statistical::fn_stdev);
        self.register("STDEVP", 1, None, statistical::fn_stdevp);
        self.register("COUNT", 1, None, statistical::fn_count);
        self.register("COUNTA", 1, None, statistical::fn_counta);
        self.register("COUNTBLANK", 1, None, statistical::fn_countblank);
        self.register("PRODUCT", 1, None, statistical::fn_product);
        self.register("MEDIAN", 1, None, statistical::fn_median);
        self.register("SUBTOTAL", 2, None, statistical::fn_subtotal);

        self.register("COUNTIF", 2, Some(2), statistical::fn_countif);
        self.register("COUNTIFS", 2, None, statistical::fn_countifs);
        self.register("SUMIF", 2, Some(3), statistical::fn_sumif);
        self.register("SUMIFS", 3, None, statistical::fn_sumifs);
        self.register("AVERAGEIF", 2, Some(3), statistical::fn_averageif);
        self.register("RANK", 2, Some(3), statistical::fn_rank);

        self.register("DCOUNT", 2, Some(3), database::fn_dcount);
    }

    fn register_lookup_functions(&mut self) {
        self.register("ROW", 0, Some(1), lookup::fn_row);
        self.register("COLUMN", 0, Some(1), lookup::fn_column);
        self.register("ROWS", 1, Some(1), lookup::fn_rows);
        self.register("COLUMNS", 1, Some(1), lookup::fn_columns);
        self.register("INDEX", 2, Some(3), lookup::fn_index);
        self.register("HLOOKUP", 3, Some(4), lookup::fn_hlookup);
        self.register("VLOOKUP", 3, Some(4), lookup::fn_vlookup);
        self.register("MATCH", 2, Some(3), lookup::fn_match);
        self.register("CHOOSE", 2, None, lookup::fn_choose);
    }

    fn register_text_functions(&mut self) {
        self.register("LEFT", 1, Some(2), text::fn_left);
        self.register("RIGHT", 1, Some(2), text::fn_right);
        self.register("MID", 3, Some(3), text::fn_mid);
        self.register("FIND", 2, Some(3), text::fn_find);
        self.register("SEARCH", 2, Some(3), text::fn_search);
        self.register("REPLACE", 4, Some(4), text::fn_replace);
        self.register("SUBSTITUTE", 3, Some(4), text::fn_substitute);
        self.register("REPT", 2, Some(2), text::fn_rept);
        self.register("TRIM", 1, Some(1), text::fn_trim);
        self.register("UPPER", 1, Some(1), text::fn_upper);
        self.register("LOWER", 1, Some(1), text::fn_lower);
        self.register("PROPER", 1, Some(1), text::fn_proper);
        self.register("CONCATENATE", 1, None, text::fn_concatenate);
        self.register("CHAR", 1, Some(1), text::fn_char);
        self.register("CODE", 1, Some(1), text::fn_code);
        self.register("LEN", 1, Some(1), text::fn_len);
        self.register("VALUE", 1, Some(1), text::fn_value);
        self.register("TEXT", 2, Some(2), text::fn_text);
        self.register("EXACT", 2, Some(2), text::fn_exact);
    }

    fn register_date_functions(&mut self) {
        self.register("NOW", 0, Some(0), date::fn_now);
        self.register("TODAY", 0, Some(0), date::fn_today);
        self.register("YEAR", 1, Some(1), date::fn_year);
        self.register("MONTH", 1, Some(1), date::fn_month);
        self.register("DAY", 1, Some(1), date::fn_day);
        self.register("HOUR", 1, Some(1), date::fn_hour);
        self.register("MINUTE", 1, Some(1), date::fn_minute);
        self.register("SECOND", 1, Some(1), date::fn_second);
        self.register("TIME", 3, Some(3), date::fn_time);
        self.register("DATE", 3, Some(3), date::fn_date);
        self.register("WEEKDAY", 1, Some(2), date::fn_weekday);
        self.register("DATEDIF", 3, Some(3), date::fn_datedif);
    }

    fn register_logical_functions(&mut self) {
        self.register("IF", 1, Some(3), logical::fn_if);
        self.register("AND", 1, None, logical::fn_and);
        self.register("OR", 1, None, logical::fn_or);
        self.register("NOT", 1, Some(1), logical::fn_not);
        self.register("IFERROR", 2, Some(2), logical::fn_iferror);
        self.register("TRUE", 0, Some(0), logical::fn_true);
        self.register("FALSE", 0, Some(0), logical::fn_false);
    }

    fn register_financial_functions(&mut self) {
        self.register("PMT", 3, Some(5), financial::fn_pmt);
        self.register("PV", 3, Some(5), financial::fn_pv);
        self.register("FV", 3, Some(5), financial::fn_fv);
        self.register("NPER", 3, Some(5), financial::fn_nper);
        self.register("RATE", 3, Some(6), financial::fn_rate);
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// === Argument helpers ===

/// Evaluate argument `index`; a missing argument is `Empty`
pub(crate) fn eval_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<Value> {
    match args.get(index) {
        Some(arg) => ctx.evaluate_arg(arg),
        None => Ok(Value::Empty),
    }
}

/// Check whether argument `index` is present and not omitted
pub(crate) fn has_arg(args: &[Expr], index: usize) -> bool {
    args.get(index).map_or(false, |arg| !arg.is_omitted())
}

pub(crate) fn number_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<f64> {
    let value = eval_arg(args, index, ctx)?;
    let n = value.to_number();
    if n.is_nan() {
        return Err(FormulaError::InvalidParameters(format!(
            "'{}' is not a number",
            value.to_text()
        )));
    }
    Ok(n)
}

/// Numeric argument with a default when missing or omitted
pub(crate) fn opt_number_arg(
    args: &[Expr],
    index: usize,
    ctx: &EvaluationContext,
    default: f64,
) -> FormulaResult<f64> {
    if has_arg(args, index) {
        number_arg(args, index, ctx)
    } else {
        Ok(default)
    }
}

/// Numeric argument truncated toward zero
pub(crate) fn int_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<i64> {
    Ok(number_arg(args, index, ctx)?.trunc() as i64)
}

pub(crate) fn text_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<String> {
    Ok(eval_arg(args, index, ctx)?.to_text())
}

pub(crate) fn bool_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<bool> {
    eval_arg(args, index, ctx)?.to_bool()
}

pub(crate) fn date_arg(
    args: &[Expr],
    index: usize,
    ctx: &EvaluationContext,
) -> FormulaResult<NaiveDateTime> {
    eval_arg(args, index, ctx)?.to_date()
}

/// The reference an argument denotes, without reading the referenced cells
pub(crate) fn range_arg(args: &[Expr], index: usize, ctx: &EvaluationContext) -> FormulaResult<RangeRef> {
    match args.get(index) {
        Some(Expr::CellRange(range)) => Ok(range.clone()),
        Some(arg) => match arg.evaluate(ctx)? {
            Value::Reference(range) => Ok(range),
            other => Err(FormulaError::InvalidParameters(format!(
                "expected a cell reference, got '{}'",
                other.to_text()
            ))),
        },
        None => Err(FormulaError::InvalidParameters(
            "missing cell reference".into(),
        )),
    }
}

/// A flattened argument value
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArgValue {
    pub value: Value,
    /// True for values read from a range (or a list), false for direct scalars
    pub from_range: bool,
}

/// Evaluate arguments, expanding ranges and lists into their elements
pub(crate) fn flatten_args(
    args: &[Expr],
    ctx: &EvaluationContext,
    skip_hidden: bool,
) -> FormulaResult<Vec<ArgValue>> {
    let mut values = Vec::new();

    for arg in args {
        let value = match arg {
            Expr::CellRange(range) => Value::Reference(range.clone()),
            other => other.evaluate(ctx)?,
        };

        match value {
            Value::Reference(range) => {
                for value in ctx.range_values(&range, skip_hidden)? {
                    values.push(ArgValue {
                        value,
                        from_range: true,
                    });
                }
            }
            Value::List(items) => {
                values.extend(items.into_iter().map(|value| ArgValue {
                    value,
                    from_range: true,
                }));
            }
            value => values.push(ArgValue {
                value,
                from_range: false,
            }),
        }
    }

    Ok(values)
}

/// The numbers among flattened values
///
/// Range cells contribute only numbers and dates; direct arguments are coerced and must be
/// numeric. Omitted arguments are skipped.
pub(crate) fn numbers(values: &[ArgValue]) -> FormulaResult<Vec<f64>> {
    let mut numbers = Vec::with_capacity(values.len());

    for arg in values {
        if arg.from_range {
            if let Some(n) = numeric_cell(&arg.value) {
                numbers.push(n);
            }
            continue;
        }

        if arg.value.is_empty() {
            continue;
        }
        let n = arg.value.to_number();
        if n.is_nan() {
            return Err(FormulaError::InvalidParameters(format!(
                "'{}' is not a number",
                arg.value.to_text()
            )));
        }
        numbers.push(n);
    }

    Ok(numbers)
}

/// Numeric payload of a cell value (text and booleans in cells are not numbers)
pub(crate) fn numeric_cell(value: &Value) -> Option<f64> {
    value.as_number()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_lookup_is_case_insensitive() {
        let table = FunctionTable::with_builtins();
        assert!(table.contains("sum"));
        assert!(table.contains("Sum"));
        assert_eq!(table.get("vlookup").map(|def| def.name.clone()), Some("VLOOKUP".into()));
        assert!(table.get("nosuch").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = FunctionTable::new();
        assert!(table.is_empty());
        table.insert(FunctionDef::new("one", Some(0), Some(0), |_, _| Ok(Value::Number(1.0))));
        table.insert(FunctionDef::new("ONE", Some(0), Some(0), |_, _| Ok(Value::Number(2.0))));
        assert_eq!(table.len(), 1);

        let engine = Engine::new();
        let ctx = EvaluationContext::new(&engine, None, None, 0, 0);
        let def = table.get("One").unwrap();
        assert_eq!((def.body)(&[], &ctx), Ok(Value::Number(2.0)));
    }

    #[test]
    fn test_numbers_skip_range_text() {
        let values = vec![
            ArgValue {
                value: Value::from("text"),
                from_range: true,
            },
            ArgValue {
                value: Value::Number(2.0),
                from_range: true,
            },
            ArgValue {
                value: Value::from("3"),
                from_range: false,
            },
            ArgValue {
                value: Value::Boolean(true),
                from_range: false,
            },
        ];
        assert_eq!(numbers(&values), Ok(vec![2.0, 3.0, 1.0]));

        let bad = vec![ArgValue {
            value: Value::from("abc"),
            from_range: false,
        }];
        assert!(numbers(&bad).is_err());
    }
}
