//! Formula tokenizer
//!
//! Turns the body of a formula (without the leading `=`) into a stream of [`Token`]s.

use crate::error::{FormulaError, FormulaResult};
use crate::token::{Token, TokenId, TokenValue};
use crate::value::parse_date;

/// Longest mantissa that accumulates exactly in an `f64`
const MAX_EXACT_DIGITS: u32 = 15;

/// Single-character operator table
const SYMBOLS: &[(char, TokenId)] = &[
    ('+', TokenId::Add),
    ('-', TokenId::Sub),
    ('*', TokenId::Mul),
    ('/', TokenId::Div),
    ('\\', TokenId::DivInt),
    ('^', TokenId::Power),
    ('&', TokenId::Concat),
    ('=', TokenId::Eq),
    ('(', TokenId::LeftParen),
    (')', TokenId::RightParen),
    (',', TokenId::Comma),
];

/// Formula tokenizer
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenize a whole input, including the trailing `End` token
    pub fn tokenize(input: &'a str) -> FormulaResult<Vec<Token>> {
        let mut tokenizer = Self::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.next_token()?;
            let done = token.is(TokenId::End);
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Produce the next token, or `End` once the input is exhausted
    pub fn next_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::symbol(TokenId::End, start)),
        };

        if let Some(&(_, id)) = SYMBOLS.iter().find(|(symbol, _)| *symbol == c) {
            self.advance();
            return Ok(Token::symbol(id, start));
        }

        match c {
            '<' => {
                self.advance();
                let id = match self.peek_char() {
                    Some('=') => TokenId::Le,
                    Some('>') => TokenId::Ne,
                    _ => return Ok(Token::symbol(TokenId::Lt, start)),
                };
                self.advance();
                Ok(Token::symbol(id, start))
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::symbol(TokenId::Ge, start));
                }
                Ok(Token::symbol(TokenId::Gt, start))
            }
            '"' => self.scan_string(),
            '#' => self.scan_date(),
            '\'' => self.scan_quoted_sheet(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if is_identifier_start(c) => self.scan_identifier(None, start),
            _ => Err(FormulaError::IdentifierExpected(start)),
        }
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let text = self.scan_delimited('"', FormulaError::UnterminatedString)?;

        if self.peek_char() == Some('!') {
            return Err(FormulaError::IllegalCrossSheetReference);
        }

        Ok(Token::new(TokenValue::Text(text), TokenId::String, start))
    }

    fn scan_date(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening '#'

        let body_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '#' {
                let body = &self.input[body_start..self.pos];
                self.advance();
                let date =
                    parse_date(body).ok_or_else(|| FormulaError::InvalidDate(body.to_string()))?;
                return Ok(Token::new(TokenValue::Date(date), TokenId::Date, start));
            }
            self.advance();
        }

        Err(FormulaError::UnterminatedDate)
    }

    fn scan_quoted_sheet(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let sheet = self.scan_delimited(
            '\'',
            FormulaError::InvalidCellReference("unterminated sheet name".into()),
        )?;

        if self.peek_char() != Some('!') {
            return Err(FormulaError::InvalidCellReference(format!(
                "'{}' must be followed by '!'",
                sheet
            )));
        }
        self.advance();

        match self.peek_char() {
            Some(c) if is_identifier_start(c) => self.scan_identifier(Some(sheet), start),
            _ => Err(FormulaError::IdentifierExpected(self.pos)),
        }
    }

    /// Scan text between `delimiter`s; a doubled delimiter escapes itself
    fn scan_delimited(&mut self, delimiter: char, unterminated: FormulaError) -> FormulaResult<String> {
        self.advance(); // Skip opening delimiter

        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == delimiter {
                if self.peek_char() == Some(delimiter) {
                    text.push(delimiter);
                    self.advance();
                } else {
                    return Ok(text);
                }
            } else {
                text.push(c);
            }
        }

        Err(unterminated)
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let mut mantissa: u64 = 0;
        let mut digits = 0u32;
        let mut decimals = 0i32;
        let mut seen_point = false;
        let mut exact = true;

        while let Some(c) = self.peek_char() {
            if let Some(d) = c.to_digit(10) {
                if mantissa == 0 && d == 0 && !seen_point {
                    // Leading zeros carry no precision
                } else if digits < MAX_EXACT_DIGITS {
                    mantissa = mantissa * 10 + d as u64;
                    digits += 1;
                } else {
                    exact = false;
                }
                if seen_point {
                    decimals += 1;
                }
            } else if c == '.' && !seen_point {
                seen_point = true;
            } else {
                break;
            }
            self.advance();
        }

        let scientific = self.peek_char().map_or(false, |c| c == 'e' || c == 'E')
            && match self.peek_char_at(1) {
                Some('+') | Some('-') => self.peek_char_at(2).map_or(false, |c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
        if scientific {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let mut value = if scientific || !exact || decimals > 22 {
            let text = &self.input[start..self.pos];
            text.parse::<f64>()
                .map_err(|_| FormulaError::SyntaxError(format!("invalid number '{}'", text)))?
        } else {
            mantissa as f64 / 10f64.powi(decimals)
        };

        if self.peek_char() == Some('%') {
            self.advance();
            value /= 100.0;
        }

        Ok(Token::new(TokenValue::Number(value), TokenId::Number, start))
    }

    fn scan_identifier(&mut self, quoted_sheet: Option<String>, start: usize) -> FormulaResult<Token> {
        let text_start = self.pos;
        while self.peek_char().map_or(false, is_identifier_char) {
            self.advance();
        }
        let text = &self.input[text_start..self.pos];

        if quoted_sheet.is_none()
            && (text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE"))
            && self.peek_non_space() != Some('(')
        {
            let value = text.eq_ignore_ascii_case("TRUE");
            return Ok(Token::new(TokenValue::Boolean(value), TokenId::Boolean, start));
        }

        let (sheet, name) = match quoted_sheet {
            Some(sheet) => (Some(sheet), text.to_string()),
            None => match text.split_once('!') {
                Some((sheet, name)) => (Some(sheet.to_string()), name.to_string()),
                None => (None, text.to_string()),
            },
        };

        Ok(Token::new(
            TokenValue::Identifier { sheet, name },
            TokenId::Identifier,
            start,
        ))
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_non_space(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}

fn is_letter(c: char) -> bool {
    c.is_alphabetic()
        || ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3400}'..='\u{4DBF}').contains(&c)
        || ('\u{F900}'..='\u{FAFF}').contains(&c)
}

fn is_identifier_start(c: char) -> bool {
    is_letter(c) || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    is_letter(c) || c.is_ascii_digit() || matches!(c, '_' | '.' | '$' | ':' | '!')
}
