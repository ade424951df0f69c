//! Formula parser
//!
//! A recursive descent parser over the [`Tokenizer`] with the precedence levels
//! (high to low) atom, unary sign, `^`, `* / \`, `+ -`, comparison and `&`. Every binary level is
//! left-associative, so `2^3^2` is `(2^3)^2`.

use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{BinaryOp, Expr, FunctionCall, RangeRef, UnaryOp};
use crate::token::{Token, TokenId, TokenType, TokenValue};
use crate::tokenizer::Tokenizer;
use crate::value::Value;

/// Result of parsing a formula
#[derive(Debug)]
pub struct ParsedFormula {
    pub root: Expr,
    /// False when the tree holds a value substituted by the unknown-function handler
    pub cacheable: bool,
}

/// Parse a formula (with or without the leading `=`)
///
/// The context supplies the function table and, for unknown functions, the grid their
/// arguments are evaluated against.
pub fn parse_formula(formula: &str, ctx: &EvaluationContext) -> FormulaResult<ParsedFormula> {
    let body = formula.strip_prefix('=').unwrap_or(formula);

    let mut parser = FormulaParser::new(body, ctx)?;
    let root = parser.parse_expression()?;

    match parser.current.id {
        TokenId::End => Ok(ParsedFormula {
            root,
            cacheable: parser.cacheable,
        }),
        TokenId::RightParen => Err(FormulaError::UnbalancedParenthesis),
        _ => Err(FormulaError::SyntaxError(format!(
            "unexpected token at position {}",
            parser.current.position
        ))),
    }
}

struct FormulaParser<'s, 'c> {
    tokenizer: Tokenizer<'s>,
    current: Token,
    ctx: &'c EvaluationContext<'c>,
    cacheable: bool,
}

impl<'s, 'c> FormulaParser<'s, 'c> {
    fn new(input: &'s str, ctx: &'c EvaluationContext<'c>) -> FormulaResult<Self> {
        let mut tokenizer = Tokenizer::new(input);
        let current = tokenizer.next_token()?;
        Ok(Self {
            tokenizer,
            current,
            ctx,
            cacheable: true,
        })
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let next = self.tokenizer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    // === Expression parsing with precedence ===

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.parse_compare_concat()
    }

    fn parse_compare_concat(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_add_sub()?;

        while matches!(self.current.kind, TokenType::Compare | TokenType::Concat) {
            let op = binary_op(self.consume()?.id);
            let right = self.parse_add_sub()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_add_sub(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_mul_div()?;

        while self.current.kind == TokenType::AddSub {
            let op = binary_op(self.consume()?.id);
            let right = self.parse_mul_div()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_mul_div(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_power()?;

        while self.current.kind == TokenType::MulDiv {
            let op = binary_op(self.consume()?.id);
            let right = self.parse_power()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_unary()?;

        while self.current.kind == TokenType::Power {
            self.consume()?;
            let right = self.parse_unary()?;
            left = Expr::binary(BinaryOp::Power, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current.id {
            TokenId::Add => UnaryOp::Plus,
            TokenId::Sub => UnaryOp::Minus,
            _ => return self.parse_atom(),
        };
        self.consume()?;
        let operand = self.parse_atom()?;
        Ok(Expr::unary(op, operand))
    }

    fn parse_atom(&mut self) -> FormulaResult<Expr> {
        match self.current.id {
            TokenId::Number | TokenId::String | TokenId::Date | TokenId::Boolean => {
                let token = self.consume()?;
                Ok(Expr::Literal(literal_value(token.value)))
            }
            TokenId::LeftParen => {
                self.consume()?;
                let expr = self.parse_expression()?;
                if self.current.id != TokenId::RightParen {
                    return Err(FormulaError::UnbalancedParenthesis);
                }
                self.consume()?;
                Ok(expr)
            }
            TokenId::Identifier => {
                let token = self.consume()?;
                match token.value {
                    TokenValue::Identifier { sheet, name } => self.parse_identifier(sheet, name),
                    _ => Err(FormulaError::IdentifierExpected(token.position)),
                }
            }
            _ => Err(FormulaError::ExpressionExpected),
        }
    }

    /// Function call, cell reference or unknown function
    fn parse_identifier(&mut self, sheet: Option<String>, name: String) -> FormulaResult<Expr> {
        let is_call = self.current.id == TokenId::LeftParen;

        if is_call && sheet.is_none() {
            return match self.ctx.engine.function(&name) {
                Some(def) => {
                    let args = self.parse_arguments()?;
                    check_arity(&name, def.min_args, def.max_args, args.len())?;
                    Ok(Expr::FunctionCall(FunctionCall { name, def, args }))
                }
                None => {
                    let args = self.parse_arguments()?;
                    self.unknown_function(name, &args)
                }
            };
        }

        match RangeRef::parse(sheet.as_deref(), &name) {
            Ok(range) if !is_call => Ok(Expr::CellRange(range)),
            _ if sheet.is_some() || name.contains(':') || name.contains('!') => {
                let text = match &sheet {
                    Some(sheet) => format!("{}!{}", sheet, name),
                    None => name,
                };
                Err(FormulaError::InvalidCellReference(text))
            }
            _ => self.unknown_function(name, &[]),
        }
    }

    /// Parse `( arg, arg, ... )`; an empty argument becomes an `Empty` literal
    fn parse_arguments(&mut self) -> FormulaResult<Vec<Expr>> {
        self.consume()?; // Skip '('

        let mut args = Vec::new();
        if self.current.id == TokenId::RightParen {
            self.consume()?;
            return Ok(args);
        }

        loop {
            let arg = match self.current.id {
                TokenId::Comma | TokenId::RightParen => Expr::Literal(Value::Empty),
                _ => self.parse_expression()?,
            };
            args.push(arg);

            match self.current.id {
                TokenId::Comma => {
                    self.consume()?;
                }
                TokenId::RightParen => {
                    self.consume()?;
                    return Ok(args);
                }
                TokenId::End => return Err(FormulaError::UnbalancedParenthesis),
                _ => {
                    return Err(FormulaError::SyntaxError(format!(
                        "expected ',' or ')' at position {}",
                        self.current.position
                    )))
                }
            }
        }
    }

    /// Ask the engine's unknown-function handler for a substitute value
    fn unknown_function(&mut self, name: String, args: &[Expr]) -> FormulaResult<Expr> {
        let values = args
            .iter()
            .map(|arg| self.ctx.evaluate_arg(arg))
            .collect::<FormulaResult<Vec<_>>>()?;

        match self.ctx.engine.call_unknown_function(&name, &values) {
            Some(value) => {
                self.cacheable = false;
                Ok(Expr::Literal(value))
            }
            None => Err(FormulaError::UnsupportedFunction(name)),
        }
    }
}

fn check_arity(name: &str, min: Option<usize>, max: Option<usize>, count: usize) -> FormulaResult<()> {
    if min.map_or(false, |min| count < min) {
        return Err(FormulaError::TooFewParameters(name.to_uppercase()));
    }
    if max.map_or(false, |max| count > max) {
        return Err(FormulaError::TooManyParameters(name.to_uppercase()));
    }
    Ok(())
}

fn binary_op(id: TokenId) -> BinaryOp {
    match id {
        TokenId::Add => BinaryOp::Add,
        TokenId::Sub => BinaryOp::Sub,
        TokenId::Mul => BinaryOp::Mul,
        TokenId::Div => BinaryOp::Div,
        TokenId::DivInt => BinaryOp::DivInt,
        TokenId::Power => BinaryOp::Power,
        TokenId::Concat => BinaryOp::Concat,
        TokenId::Eq => BinaryOp::Eq,
        TokenId::Ne => BinaryOp::Ne,
        TokenId::Lt => BinaryOp::Lt,
        TokenId::Gt => BinaryOp::Gt,
        TokenId::Le => BinaryOp::Le,
        _ => BinaryOp::Ge,
    }
}

fn literal_value(value: TokenValue) -> Value {
    match value {
        TokenValue::Number(n) => Value::Number(n),
        TokenValue::Text(s) => Value::String(s),
        TokenValue::Date(d) => Value::Date(d),
        TokenValue::Boolean(b) => Value::Boolean(b),
        TokenValue::None | TokenValue::Identifier { .. } => Value::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use gridcalc_core::CellRange;

    fn parse(formula: &str) -> FormulaResult<Expr> {
        let engine = Engine::new();
        let ctx = EvaluationContext::new(&engine, None, None, 0, 0);
        parse_formula(formula, &ctx).map(|parsed| parsed.root)
    }

    #[test]
    fn test_parse_literals() {
        assert!(matches!(parse("=42"), Ok(Expr::Literal(Value::Number(n))) if n == 42.0));
        assert!(matches!(parse("=\"hi\""), Ok(Expr::Literal(Value::String(s))) if s == "hi"));
        assert!(matches!(parse("=TRUE"), Ok(Expr::Literal(Value::Boolean(true)))));
        assert!(matches!(parse("42"), Ok(Expr::Literal(Value::Number(_)))));
    }

    #[test]
    fn test_parse_left_associative_power() {
        match parse("=2^3^2").unwrap() {
            Expr::Binary {
                op: BinaryOp::Power,
                left,
                right,
                ..
            } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Power, .. }));
                assert!(matches!(*right, Expr::Literal(Value::Number(n)) if n == 2.0));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_parse_unary_binds_tighter_than_power() {
        match parse("=-2^2").unwrap() {
            Expr::Binary {
                op: BinaryOp::Power,
                left,
                ..
            } => assert!(matches!(*left, Expr::Unary { op: UnaryOp::Minus, .. })),
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_parse_references() {
        match parse("=$A$1:B2").unwrap() {
            Expr::CellRange(range) => {
                assert_eq!(range.sheet, None);
                assert_eq!(range.range, CellRange::from_indices(0, 0, 1, 1));
            }
            other => panic!("unexpected tree {:?}", other),
        }

        match parse("='My Sheet'!C3").unwrap() {
            Expr::CellRange(range) => {
                assert_eq!(range.sheet.as_deref(), Some("My Sheet"));
                assert_eq!(range.range, CellRange::from_indices(2, 2, 2, 2));
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_call() {
        match parse("=SUM(A1:A3, 2)").unwrap() {
            Expr::FunctionCall(call) => {
                assert_eq!(call.name, "SUM");
                assert_eq!(call.args.len(), 2);
            }
            other => panic!("unexpected tree {:?}", other),
        }

        // LOG10 looks like a cell reference but is called
        assert!(matches!(parse("=LOG10(100)"), Ok(Expr::FunctionCall(_))));
    }

    #[test]
    fn test_parse_empty_arguments() {
        match parse("=INDEX(A1:C3,,2)").unwrap() {
            Expr::FunctionCall(call) => {
                assert_eq!(call.args.len(), 3);
                assert!(call.args[1].is_omitted());
            }
            other => panic!("unexpected tree {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("=(1+2").unwrap_err(), FormulaError::UnbalancedParenthesis);
        assert_eq!(parse("=1+2)").unwrap_err(), FormulaError::UnbalancedParenthesis);
        assert_eq!(parse("=SUM(1,2").unwrap_err(), FormulaError::UnbalancedParenthesis);
        assert_eq!(parse("=1+").unwrap_err(), FormulaError::ExpressionExpected);
        assert_eq!(parse("=").unwrap_err(), FormulaError::ExpressionExpected);
        assert!(matches!(
            parse("=SUM(1 2)").unwrap_err(),
            FormulaError::SyntaxError(_)
        ));
        assert!(matches!(parse("=1 2").unwrap_err(), FormulaError::SyntaxError(_)));
    }

    #[test]
    fn test_parse_arity() {
        assert_eq!(
            parse("=ABS()").unwrap_err(),
            FormulaError::TooFewParameters("ABS".into())
        );
        assert_eq!(
            parse("=abs(1,2)").unwrap_err(),
            FormulaError::TooManyParameters("ABS".into())
        );
    }

    #[test]
    fn test_parse_invalid_references() {
        assert!(matches!(
            parse("=A1:B").unwrap_err(),
            FormulaError::InvalidCellReference(_)
        ));
        assert!(matches!(
            parse("=Sheet1!Total").unwrap_err(),
            FormulaError::InvalidCellReference(_)
        ));
    }

    #[test]
    fn test_parse_unknown_function() {
        assert_eq!(
            parse("=FOO(1)").unwrap_err(),
            FormulaError::UnsupportedFunction("FOO".into())
        );
        assert_eq!(
            parse("=total").unwrap_err(),
            FormulaError::UnsupportedFunction("total".into())
        );
    }
}
