//! Expression tree and evaluation

use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionDef;
use crate::value::Value;
use gridcalc_core::{CellAddress, CellRange};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::rc::Rc;

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `\`: floored integer division
    DivInt,
    Power,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A rectangular range of cells, optionally on another sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub range: CellRange,
}

impl RangeRef {
    pub fn new(sheet: Option<String>, range: CellRange) -> Self {
        Self { sheet, range }
    }

    /// Parse `A1`, `$A$1:B2` with an optional sheet name
    pub fn parse(sheet: Option<&str>, text: &str) -> FormulaResult<Self> {
        let range = CellRange::parse(text)?;
        Ok(Self::new(sheet.map(str::to_string), range))
    }

    /// A single cell
    pub fn cell(sheet: Option<String>, row: u32, col: u16) -> Self {
        Self::new(sheet, CellRange::single(CellAddress::new(row, col)))
    }

    pub fn row_count(&self) -> usize {
        self.range.row_count() as usize
    }

    pub fn col_count(&self) -> usize {
        self.range.col_count() as usize
    }

    /// The sub-range covering one row (0-based offset)
    pub fn row(&self, offset: u32) -> Self {
        let row = self.range.start.row + offset;
        Self::new(
            self.sheet.clone(),
            CellRange::from_indices(row, self.range.start.col, row, self.range.end.col),
        )
    }

    /// The sub-range covering one column (0-based offset)
    pub fn column(&self, offset: u16) -> Self {
        let col = self.range.start.col + offset;
        Self::new(
            self.sheet.clone(),
            CellRange::from_indices(self.range.start.row, col, self.range.end.row, col),
        )
    }

    /// A range of `rows` x `cols` anchored at this range's top-left cell
    pub fn resized(&self, rows: usize, cols: usize) -> Self {
        let start = self.range.start;
        Self::new(
            self.sheet.clone(),
            CellRange::from_indices(
                start.row,
                start.col,
                start.row + rows.saturating_sub(1) as u32,
                start.col + cols.saturating_sub(1) as u16,
            ),
        )
    }

    /// In-flight key: `sheet:row,col-row2,col2`
    pub(crate) fn guard_key(&self, sheet: Option<&str>) -> String {
        let (start, end) = (self.range.start, self.range.end);
        format!(
            "{}:{},{}-{},{}",
            sheet.unwrap_or(""),
            start.row,
            start.col,
            end.row,
            end.col
        )
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) => write!(f, "{}!{}", sheet, self.range),
            None => write!(f, "{}", self.range),
        }
    }
}

/// A call to a function bound at parse time
pub struct FunctionCall {
    /// Name as written in the formula
    pub name: String,
    pub def: Rc<FunctionDef>,
    pub args: Vec<Expr>,
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// Expression tree node
///
/// `memo` is only present on constant subtrees (no range or function call below), so a tree
/// shared through the formula cache never replays a result computed against old cell contents.
#[derive(Debug)]
pub enum Expr {
    Literal(Value),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        memo: Option<OnceCell<Value>>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        memo: Option<OnceCell<Value>>,
    },
    CellRange(RangeRef),
    FunctionCall(FunctionCall),
}

impl Expr {
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let memo = operand.is_constant().then(OnceCell::new);
        Expr::Unary {
            op,
            operand: Box::new(operand),
            memo,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        let memo = (left.is_constant() && right.is_constant()).then(OnceCell::new);
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            memo,
        }
    }

    /// True when the value cannot depend on the grid or on function side effects
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Unary { memo, .. } | Expr::Binary { memo, .. } => memo.is_some(),
            Expr::CellRange(_) | Expr::FunctionCall(_) => false,
        }
    }

    /// An omitted argument (`INDEX(A1:B2,,1)`)
    pub fn is_omitted(&self) -> bool {
        matches!(self, Expr::Literal(Value::Empty))
    }

    /// Evaluate the node
    pub fn evaluate(&self, ctx: &EvaluationContext) -> FormulaResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Unary { op, operand, memo } => {
                memoized(memo, || evaluate_unary(*op, operand, ctx))
            }
            Expr::Binary {
                op,
                left,
                right,
                memo,
            } => memoized(memo, || evaluate_binary(*op, left, right, ctx)),
            Expr::CellRange(range) => ctx.resolve_range(range),
            Expr::FunctionCall(call) => (call.def.body)(&call.args, ctx),
        }
    }
}

fn memoized(
    memo: &Option<OnceCell<Value>>,
    compute: impl FnOnce() -> FormulaResult<Value>,
) -> FormulaResult<Value> {
    match memo {
        Some(cell) => cell.get_or_try_init(compute).cloned(),
        None => compute(),
    }
}

fn evaluate_unary(op: UnaryOp, operand: &Expr, ctx: &EvaluationContext) -> FormulaResult<Value> {
    let n = ctx.evaluate_arg(operand)?.to_number();
    let result = match op {
        UnaryOp::Plus => n,
        UnaryOp::Minus => -n,
    };
    checked(result)
}

fn evaluate_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    ctx: &EvaluationContext,
) -> FormulaResult<Value> {
    let left = ctx.evaluate_arg(left)?;
    let right = ctx.evaluate_arg(right)?;

    match op {
        BinaryOp::Add => checked(left.to_number() + right.to_number()),
        BinaryOp::Sub => checked(left.to_number() - right.to_number()),
        BinaryOp::Mul => checked(left.to_number() * right.to_number()),
        BinaryOp::Div => {
            let divisor = right.to_number();
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            checked(left.to_number() / divisor)
        }
        BinaryOp::DivInt => {
            let divisor = right.to_number();
            if divisor == 0.0 {
                return Err(FormulaError::DivisionByZero);
            }
            checked((left.to_number() / divisor).floor())
        }
        BinaryOp::Power => checked(left.to_number().powf(right.to_number())),
        BinaryOp::Concat => Ok(Value::String(left.to_text() + &right.to_text())),
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::Le
        | BinaryOp::Ge => Ok(Value::Boolean(compare_values(op, &left, &right))),
    }
}

fn checked(n: f64) -> FormulaResult<Value> {
    if n.is_nan() {
        Err(FormulaError::DivisionProducesNaN)
    } else {
        Ok(Value::Number(n))
    }
}

/// Compare two values with a comparison operator
///
/// Ordering uses the numeric difference; `=`/`<>` fall back to case-insensitive text when the
/// difference is `NaN`. Non-comparison operators yield false.
pub fn compare_values(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let diff = left.to_number() - right.to_number();
    match op {
        BinaryOp::Lt => diff < 0.0,
        BinaryOp::Gt => diff > 0.0,
        BinaryOp::Le => diff <= 0.0,
        BinaryOp::Ge => diff >= 0.0,
        BinaryOp::Eq if diff.is_nan() => text_equal(left, right),
        BinaryOp::Eq => diff == 0.0,
        BinaryOp::Ne if diff.is_nan() => !text_equal(left, right),
        BinaryOp::Ne => diff != 0.0,
        _ => false,
    }
}

fn text_equal(left: &Value, right: &Value) -> bool {
    left.to_text().to_lowercase() == right.to_text().to_lowercase()
}
