//! Token types produced by the tokenizer

use chrono::NaiveDateTime;

/// Fine-grained token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenId {
    Add,
    Sub,
    Mul,
    Div,
    DivInt,
    Power,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LeftParen,
    RightParen,
    Comma,
    Number,
    String,
    Date,
    Boolean,
    Identifier,
    End,
}

/// Coarse precedence class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Compare,
    AddSub,
    MulDiv,
    Power,
    Concat,
    Group,
    Literal,
    Identifier,
    End,
}

impl TokenId {
    /// Precedence class for this kind
    pub fn kind(self) -> TokenType {
        match self {
            TokenId::Add | TokenId::Sub => TokenType::AddSub,
            TokenId::Mul | TokenId::Div | TokenId::DivInt => TokenType::MulDiv,
            TokenId::Power => TokenType::Power,
            TokenId::Concat => TokenType::Concat,
            TokenId::Eq | TokenId::Ne | TokenId::Lt | TokenId::Gt | TokenId::Le | TokenId::Ge => {
                TokenType::Compare
            }
            TokenId::LeftParen | TokenId::RightParen | TokenId::Comma => TokenType::Group,
            TokenId::Number | TokenId::String | TokenId::Date | TokenId::Boolean => {
                TokenType::Literal
            }
            TokenId::Identifier => TokenType::Identifier,
            TokenId::End => TokenType::End,
        }
    }
}

/// Token payload
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    None,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
    Boolean(bool),
    /// Identifier text with an optional sheet prefix (`Sheet1!A1`, `'My Sheet'!A1`)
    Identifier {
        sheet: Option<String>,
        name: String,
    },
}

/// A single token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: TokenValue,
    pub id: TokenId,
    pub kind: TokenType,
    /// Byte offset of the token in the formula body
    pub position: usize,
}

impl Token {
    /// Create a token without a payload
    pub fn symbol(id: TokenId, position: usize) -> Self {
        Self::new(TokenValue::None, id, position)
    }

    /// Create a token
    pub fn new(value: TokenValue, id: TokenId, position: usize) -> Self {
        Self {
            value,
            id,
            kind: id.kind(),
            position,
        }
    }

    /// Check the token kind
    pub fn is(&self, id: TokenId) -> bool {
        self.id == id
    }
}
