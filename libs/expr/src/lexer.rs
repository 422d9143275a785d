//! Expression lexer - tokenizes input strings
//!
//! Positions are character offsets into the input; the template scanner relies
//! on them to find where an embedded `${ ... }` expression ends.

use crate::token::{Token, TokenType};

/// The expression lexer
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.advance();
            } else {
                break;
            }
        }
        self.chars[start..self.position].iter().collect()
    }

    fn read_number(&mut self) -> String {
        let start = self.position;
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        // Only treat '.' as a decimal point when a digit follows, so `1.toString()` still lexes
        if self.current() == Some('.') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current(), Some('e' | 'E')) && self.exponent_follows() {
            self.advance();
            if matches!(self.current(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        self.chars[start..self.position].iter().collect()
    }

    /// `e` starts an exponent only when digits (optionally signed) follow it
    fn exponent_follows(&self) -> bool {
        match self.chars.get(self.position + 1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => {
                matches!(self.chars.get(self.position + 2), Some(c) if c.is_ascii_digit())
            }
            _ => false,
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, String> {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.current() {
                None => return Err("Unterminated string literal".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(value);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some('$') => '$',
                        Some(other) => {
                            return Err(format!("Invalid escape sequence '\\{}'", other));
                        }
                        None => return Err("Unterminated string literal".to_string()),
                    };
                    value.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn single(&mut self, token_type: TokenType, text: &str, position: usize) -> Token {
        self.advance();
        Token::new(token_type, text, position)
    }

    fn double(&mut self, token_type: TokenType, text: &str, position: usize) -> Token {
        self.advance();
        self.advance();
        Token::new(token_type, text, position)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let position = self.position;
        let c = match self.current() {
            Some(c) => c,
            None => return Token::eof(position),
        };
        let next = self.peek();

        match c {
            '.' => self.single(TokenType::Dot, ".", position),
            '[' => self.single(TokenType::OpenBracket, "[", position),
            ']' => self.single(TokenType::CloseBracket, "]", position),
            '(' => self.single(TokenType::OpenParen, "(", position),
            ')' => self.single(TokenType::CloseParen, ")", position),
            '{' => self.single(TokenType::OpenBrace, "{", position),
            '}' => self.single(TokenType::CloseBrace, "}", position),
            ',' => self.single(TokenType::Comma, ",", position),
            ':' => self.single(TokenType::Colon, ":", position),
            '+' => self.single(TokenType::Plus, "+", position),
            '-' => self.single(TokenType::Minus, "-", position),
            '*' => self.single(TokenType::Multiply, "*", position),
            '/' => self.single(TokenType::Divide, "/", position),
            '%' => self.single(TokenType::Modulo, "%", position),
            '?' if next == Some('?') => self.double(TokenType::Coalesce, "??", position),
            '?' => self.single(TokenType::Question, "?", position),
            '!' if next == Some('=') => self.double(TokenType::NotEqual, "!=", position),
            '!' => self.single(TokenType::Not, "!", position),
            '=' if next == Some('=') => self.double(TokenType::Equal, "==", position),
            '=' => self.single(TokenType::Equal, "=", position),
            '<' if next == Some('=') => self.double(TokenType::LessThanOrEqual, "<=", position),
            '<' => self.single(TokenType::LessThan, "<", position),
            '>' if next == Some('=') => {
                self.double(TokenType::GreaterThanOrEqual, ">=", position)
            }
            '>' => self.single(TokenType::GreaterThan, ">", position),
            '&' if next == Some('&') => self.double(TokenType::And, "&&", position),
            '|' if next == Some('|') => self.double(TokenType::Or, "||", position),
            '\'' | '"' => match self.read_string(c) {
                Ok(value) => Token::new(TokenType::StringLiteral, value, position),
                Err(message) => Token::error(message, position),
            },
            c if c.is_ascii_digit() => {
                let value = self.read_number();
                Token::new(TokenType::NumberLiteral, value, position)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let ident = self.read_identifier();
                let token_type = match ident.as_str() {
                    "true" => TokenType::True,
                    "false" => TokenType::False,
                    "null" => TokenType::Null,
                    "and" => TokenType::And,
                    "or" => TokenType::Or,
                    _ => TokenType::Identifier,
                };
                Token::new(token_type, ident, position)
            }
            other => {
                self.advance();
                Token::error(format!("Unexpected character '{}'", other), position)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    #[test]
    fn test_identifiers() {
        let tokens = tokenize("name _test $x");
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].value, "name");
        assert_eq!(tokens[1].value, "_test");
        assert_eq!(tokens[2].value, "$x");
    }

    #[test]
    fn test_string_escape() {
        let tokens = tokenize(r#"'it\'s' "a\"b""#);
        assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
        assert_eq!(tokens[0].value, "it's");
        assert_eq!(tokens[1].value, "a\"b");
    }

    #[test]
    fn test_number_followed_by_method() {
        let tokens = tokenize("1.toString()");
        assert_eq!(tokens[0].token_type, TokenType::NumberLiteral);
        assert_eq!(tokens[0].value, "1");
        assert_eq!(tokens[1].token_type, TokenType::Dot);
    }

    #[test]
    fn test_positions_are_char_offsets() {
        let tokens = tokenize("ä + b }");
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 2);
        assert_eq!(tokens[3].token_type, TokenType::CloseBrace);
        assert_eq!(tokens[3].position, 6);
    }
}
