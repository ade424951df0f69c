//! Formula engine: function table, formula cache and evaluation entry points

use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::Expr;
use crate::format;
use crate::functions::{FunctionDef, FunctionTable};
use crate::grid::Grid;
use crate::parser;
use crate::value::Value;
use ahash::{AHashMap, AHashSet};
use log::{debug, trace};
use std::cell::RefCell;
use std::rc::Rc;

/// Default bound of the formula cache
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Handler consulted for functions missing from the function table
pub type UnknownFunctionHandler = dyn Fn(&str, &[Value]) -> Option<Value>;

/// Options for the formula engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Parsed formulas kept before the cache is flushed (default: 10,000)
    pub cache_capacity: usize,
    /// Display format for dates without a time part (default: `yyyy-mm-dd`)
    pub date_display_format: String,
    /// Display format for dates with a time part (default: `yyyy-mm-dd hh:mm:ss`)
    pub datetime_display_format: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            date_display_format: "yyyy-mm-dd".to_string(),
            datetime_display_format: "yyyy-mm-dd hh:mm:ss".to_string(),
        }
    }
}

/// Parsed formulas keyed by formula text
///
/// Bulk-evicted: once the insertion counter reaches capacity the whole map is cleared before the
/// next insert.
struct FormulaCache {
    entries: AHashMap<String, Rc<Expr>>,
    inserted: usize,
    capacity: usize,
}

impl FormulaCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            inserted: 0,
            capacity,
        }
    }

    fn get(&self, formula: &str) -> Option<Rc<Expr>> {
        self.entries.get(formula).cloned()
    }

    fn insert(&mut self, formula: String, expr: Rc<Expr>) {
        if self.inserted >= self.capacity {
            debug!("flushing formula cache ({} entries)", self.entries.len());
            self.entries.clear();
            self.inserted = 0;
        }
        self.entries.insert(formula, expr);
        self.inserted += 1;
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.inserted = 0;
    }
}

/// The formula engine
///
/// Single-threaded and re-entrant: grids call back into [`Engine::try_evaluate`] for formula
/// cells while an outer evaluation is running. No `RefCell` borrow is held across evaluation.
pub struct Engine {
    options: EngineOptions,
    functions: RefCell<FunctionTable>,
    cache: RefCell<FormulaCache>,
    unknown_function: RefCell<Option<Rc<UnknownFunctionHandler>>>,
    in_flight: RefCell<AHashSet<String>>,
}

impl Engine {
    /// Create an engine with the built-in functions and default options
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Create an engine with custom options
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            cache: RefCell::new(FormulaCache::new(options.cache_capacity)),
            options,
            functions: RefCell::new(FunctionTable::with_builtins()),
            unknown_function: RefCell::new(None),
            in_flight: RefCell::new(AHashSet::new()),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Look up a function by name (case-insensitive)
    pub fn function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.borrow().get(name)
    }

    /// Register a function
    ///
    /// Returns `false` (and leaves the table unchanged) when the name is taken and
    /// `override_existing` is not set. Registration clears the formula cache so cached trees
    /// never keep a replaced definition.
    pub fn add_custom_function<F>(
        &self,
        name: &str,
        body: F,
        min_args: Option<usize>,
        max_args: Option<usize>,
        override_existing: bool,
    ) -> bool
    where
        F: Fn(&[Expr], &EvaluationContext) -> FormulaResult<Value> + 'static,
    {
        let mut functions = self.functions.borrow_mut();
        if functions.contains(name) && !override_existing {
            debug!("refusing to replace function {}", name);
            return false;
        }

        functions.insert(FunctionDef::new(name, min_args, max_args, body));
        drop(functions);
        self.clear_cache();
        debug!("registered custom function {}", name);
        true
    }

    /// Install the handler for unknown functions
    ///
    /// The handler receives the function name and its evaluated arguments and may return a
    /// substitute value. Formulas that use a substitute are not cached.
    pub fn on_unknown_function<F>(&self, handler: F)
    where
        F: Fn(&str, &[Value]) -> Option<Value> + 'static,
    {
        *self.unknown_function.borrow_mut() = Some(Rc::new(handler));
    }

    pub(crate) fn call_unknown_function(&self, name: &str, args: &[Value]) -> Option<Value> {
        let handler = self.unknown_function.borrow().clone()?;
        trace!("dispatching unknown function {} to handler", name);
        handler(name, args)
    }

    /// Number of cached formulas
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().entries.len()
    }

    /// Drop every cached formula
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Parse a formula through the cache, without a grid
    pub fn parse(&self, formula: &str) -> FormulaResult<Rc<Expr>> {
        let ctx = EvaluationContext::new(self, None, None, 0, 0);
        self.parse_cached(formula, &ctx)
    }

    fn parse_cached(&self, formula: &str, ctx: &EvaluationContext) -> FormulaResult<Rc<Expr>> {
        let cached = self.cache.borrow().get(formula);
        if let Some(expr) = cached {
            return Ok(expr);
        }

        trace!("parsing formula {:?}", formula);
        let parsed = parser::parse_formula(formula, ctx)?;
        let root = Rc::new(parsed.root);
        if parsed.cacheable {
            self.cache
                .borrow_mut()
                .insert(formula.to_string(), Rc::clone(&root));
        }
        Ok(root)
    }

    /// Evaluate a formula, returning engine failures as errors
    ///
    /// Input that does not start with `=` is returned as a string. A [`Value::Reference`] result
    /// is resolved; a [`Value::Formatted`] result is returned as is.
    pub fn try_evaluate(
        &self,
        formula: &str,
        grid: Option<&dyn Grid>,
        sheet: Option<&str>,
        row: u32,
        col: u16,
    ) -> FormulaResult<Value> {
        if !formula.starts_with('=') {
            return Ok(Value::String(formula.to_string()));
        }

        let ctx = EvaluationContext::new(self, grid, sheet, row, col);
        let expr = self.parse_cached(formula, &ctx)?;
        let value = expr.evaluate(&ctx)?;
        ctx.resolve(value)
    }

    /// Evaluate a formula for display
    ///
    /// Applies `format` (or the format suggested by a [`Value::Formatted`] result) to number,
    /// date and boolean results. Failures become `Value::String("Error: <message>")`.
    pub fn evaluate(
        &self,
        formula: &str,
        format: Option<&str>,
        grid: Option<&dyn Grid>,
        sheet: Option<&str>,
        row: u32,
        col: u16,
    ) -> Value {
        self.try_evaluate(formula, grid, sheet, row, col)
            .and_then(|value| present(value, format))
            .unwrap_or_else(|err| Value::String(format!("Error: {}", err)))
    }

    /// Render a value as text using the engine's display options
    pub fn display_text(&self, value: &Value) -> String {
        match value {
            Value::Formatted { value: inner, format: pattern } => {
                format::format_value(inner, pattern).unwrap_or_else(|_| inner.to_text())
            }
            Value::Date(date) => {
                let pattern = if crate::value::seconds_of_day(date) == 0 {
                    &self.options.date_display_format
                } else {
                    &self.options.datetime_display_format
                };
                format::format_value(value, pattern).unwrap_or_else(|_| value.to_text())
            }
            other => other.to_text(),
        }
    }

    /// Mark a range as being evaluated; the guard unmarks it when dropped
    pub(crate) fn enter_range(
        &self,
        key: String,
        describe: impl FnOnce() -> String,
    ) -> FormulaResult<InFlightGuard<'_>> {
        if !self.in_flight.borrow_mut().insert(key.clone()) {
            return Err(FormulaError::CircularReference(describe()));
        }
        Ok(InFlightGuard { engine: self, key })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn present(value: Value, format: Option<&str>) -> FormulaResult<Value> {
    let (value, suggested) = match value {
        Value::Formatted {
            value,
            format: suggestion,
        } => ((*value).into_unformatted(), Some(suggestion)),
        other => (other, None),
    };

    let pattern = format.map(str::to_string).or(suggested);
    match (pattern, &value) {
        (Some(pattern), Value::Number(_) | Value::Date(_) | Value::Boolean(_)) => {
            format::format_value(&value, &pattern).map(Value::String)
        }
        _ => Ok(value),
    }
}

/// Scope guard removing a range key from the in-flight set
pub(crate) struct InFlightGuard<'e> {
    engine: &'e Engine,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.engine.in_flight.borrow_mut().remove(&self.key);
    }
}
