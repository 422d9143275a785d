//! Token types for the expression lexer

/// Token types for the expression lexer
#[derive(Debug, PartialEq, Clone, Eq)]
pub enum TokenType {
    // Literals
    StringLiteral,
    NumberLiteral,

    // Identifiers
    Identifier,

    // Keywords
    True,
    False,
    Null,
    And, // `and` or `&&`
    Or,  // `or` or `||`

    // Operators
    Dot,                // .
    OpenBracket,        // [
    CloseBracket,       // ]
    Plus,               // +
    Minus,              // -
    Multiply,           // *
    Divide,             // /
    Modulo,             // %
    Not,                // !
    LessThanOrEqual,    // <=
    LessThan,           // <
    GreaterThanOrEqual, // >=
    GreaterThan,        // >
    Equal,              // ==
    NotEqual,           // !=
    Question,           // ?
    Coalesce,           // ??
    Colon,              // :

    // Delimiters
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Comma,      // ,

    // End of input
    Eof,

    // Error
    Error,
}

/// A token in an expression
#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub value: String,
    pub position: usize,
}

impl Token {
    pub fn new(token_type: TokenType, value: impl Into<String>, position: usize) -> Self {
        Self {
            token_type,
            value: value.into(),
            position,
        }
    }

    pub fn eof(position: usize) -> Self {
        Self::new(TokenType::Eof, String::new(), position)
    }

    pub fn error(message: String, position: usize) -> Self {
        Self::new(TokenType::Error, message, position)
    }
}
