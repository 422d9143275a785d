//! Expression parser - converts string expressions to AST
//!
//! Recursive descent parser. Precedence (lowest to highest):
//! 1. conditional (`? :`)
//! 2. coalesce (`??`)
//! 3. or (`||`, `or`)
//! 4. and (`&&`, `and`)
//! 5. equality (`==`, `!=`)
//! 6. comparison (`<`, `<=`, `>`, `>=`)
//! 7. additive (`+`, `-`)
//! 8. multiplicative (`*`, `/`, `%`)
//! 9. unary (`!`, `-`)
//! 10. postfix (`.name`, `.fn()`, `[index]`)
//! 11. primary (literal, identifier, call, parenthesized, list, object)

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{Token, TokenType};
use serde_json::{Number, Value};

/// Parser for value expressions
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    recursion_depth: usize,
}

const MAX_RECURSION_DEPTH: usize = 200;

impl Parser {
    /// Create a new parser for the given input string
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Self {
            lexer,
            current_token,
            recursion_depth: 0,
        }
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current_token, next)
    }

    fn current_is(&self, token_type: &TokenType) -> bool {
        &self.current_token.token_type == token_type
    }

    fn unexpected(&self) -> Error {
        let token = &self.current_token;
        match token.token_type {
            TokenType::Error => Error::ParseError(format!(
                "{} at position {}",
                token.value, token.position
            )),
            TokenType::Eof => Error::ParseError("Unexpected end of expression".to_string()),
            _ => Error::ParseError(format!(
                "Unexpected token '{}' at position {}",
                token.value, token.position
            )),
        }
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token> {
        if self.current_token.token_type == token_type {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    /// Parse the entire input as one expression
    pub fn parse(&mut self) -> Result<AstNode> {
        if self.current_is(&TokenType::Eof) {
            return Err(Error::ParseError("Empty expression".to_string()));
        }
        let expr = self.parse_expression()?;
        if !self.current_is(&TokenType::Eof) {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    /// Parse an expression terminated by `}` (the body of a `${ ... }` placeholder).
    ///
    /// Returns the AST and the character offset just past the closing brace.
    pub fn parse_embedded(&mut self) -> Result<(AstNode, usize)> {
        if self.current_is(&TokenType::CloseBrace) {
            return Err(Error::ParseError("Empty placeholder '${}'".to_string()));
        }
        let expr = self.parse_expression()?;
        if self.current_is(&TokenType::Eof) {
            return Err(Error::ParseError("Unterminated placeholder, expected '}'".to_string()));
        }
        let close = self.expect(TokenType::CloseBrace)?;
        Ok((expr, close.position + 1))
    }

    fn enter(&mut self) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(Error::ParseError(format!(
                "Expression too deeply nested (max depth: {})",
                MAX_RECURSION_DEPTH
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.recursion_depth -= 1;
    }

    fn parse_expression(&mut self) -> Result<AstNode> {
        self.enter()?;
        let expr = self.parse_conditional();
        self.leave();
        expr
    }

    fn parse_conditional(&mut self) -> Result<AstNode> {
        let condition = self.parse_coalesce()?;
        if !self.current_is(&TokenType::Question) {
            return Ok(condition);
        }
        self.advance();
        let then = self.parse_expression()?;
        self.expect(TokenType::Colon)?;
        let otherwise = self.parse_expression()?;
        Ok(AstNode::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_coalesce(&mut self) -> Result<AstNode> {
        let mut left = self.parse_or()?;
        while self.current_is(&TokenType::Coalesce) {
            self.advance();
            let right = self.parse_or()?;
            left = AstNode::Coalesce {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<AstNode> {
        let mut left = self.parse_and()?;
        while self.current_is(&TokenType::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = AstNode::Logical {
                left: Box::new(left),
                operator: LogicalOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<AstNode> {
        let mut left = self.parse_equality()?;
        while self.current_is(&TokenType::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = AstNode::Logical {
                left: Box::new(left),
                operator: LogicalOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn binary_loop(
        &mut self,
        operators: &[(TokenType, BinaryOperator)],
        next: fn(&mut Self) -> Result<AstNode>,
    ) -> Result<AstNode> {
        let mut left = next(self)?;
        loop {
            let operator = operators
                .iter()
                .find(|(token_type, _)| self.current_is(token_type))
                .map(|(_, op)| *op);
            let Some(operator) = operator else {
                return Ok(left);
            };
            self.advance();
            let right = next(self)?;
            left = AstNode::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            };
        }
    }

    fn parse_equality(&mut self) -> Result<AstNode> {
        self.binary_loop(
            &[
                (TokenType::Equal, BinaryOperator::Equal),
                (TokenType::NotEqual, BinaryOperator::NotEqual),
            ],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<AstNode> {
        self.binary_loop(
            &[
                (TokenType::LessThan, BinaryOperator::LessThan),
                (TokenType::LessThanOrEqual, BinaryOperator::LessThanOrEqual),
                (TokenType::GreaterThan, BinaryOperator::GreaterThan),
                (TokenType::GreaterThanOrEqual, BinaryOperator::GreaterThanOrEqual),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<AstNode> {
        self.binary_loop(
            &[
                (TokenType::Plus, BinaryOperator::Add),
                (TokenType::Minus, BinaryOperator::Subtract),
            ],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<AstNode> {
        self.binary_loop(
            &[
                (TokenType::Multiply, BinaryOperator::Multiply),
                (TokenType::Divide, BinaryOperator::Divide),
                (TokenType::Modulo, BinaryOperator::Modulo),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<AstNode> {
        let operator = match self.current_token.token_type {
            TokenType::Not => UnaryOperator::Not,
            TokenType::Minus => UnaryOperator::Negate,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        Ok(AstNode::Unary {
            operator,
            operand: Box::new(operand?),
        })
    }

    fn parse_postfix(&mut self) -> Result<AstNode> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current_token.token_type {
                TokenType::Dot => {
                    self.advance();
                    let name = self.expect(TokenType::Identifier)?.value;
                    if self.current_is(&TokenType::OpenParen) {
                        let mut args = vec![expr];
                        args.extend(self.parse_arguments()?);
                        expr = AstNode::Call { name, args };
                    } else {
                        expr = AstNode::Member {
                            target: Box::new(expr),
                            name,
                        };
                    }
                }
                TokenType::OpenBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenType::CloseBracket)?;
                    expr = AstNode::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<AstNode>> {
        self.expect(TokenType::OpenParen)?;
        let mut args = Vec::new();
        if self.current_is(&TokenType::CloseParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.current_is(&TokenType::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenType::CloseParen)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> Result<AstNode> {
        match self.current_token.token_type {
            TokenType::NumberLiteral => {
                let token = self.advance();
                parse_number(&token.value).map(AstNode::Literal)
            }
            TokenType::StringLiteral => {
                let token = self.advance();
                Ok(AstNode::Literal(Value::String(token.value)))
            }
            TokenType::True => {
                self.advance();
                Ok(AstNode::Literal(Value::Bool(true)))
            }
            TokenType::False => {
                self.advance();
                Ok(AstNode::Literal(Value::Bool(false)))
            }
            TokenType::Null => {
                self.advance();
                Ok(AstNode::Literal(Value::Null))
            }
            TokenType::Identifier => {
                let name = self.advance().value;
                if self.current_is(&TokenType::OpenParen) {
                    let args = self.parse_arguments()?;
                    Ok(AstNode::Call { name, args })
                } else {
                    Ok(AstNode::Identifier(name))
                }
            }
            TokenType::OpenParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::CloseParen)?;
                Ok(expr)
            }
            TokenType::OpenBracket => self.parse_list(),
            TokenType::OpenBrace => self.parse_object(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_list(&mut self) -> Result<AstNode> {
        self.expect(TokenType::OpenBracket)?;
        let mut items = Vec::new();
        if self.current_is(&TokenType::CloseBracket) {
            self.advance();
            return Ok(AstNode::List(items));
        }
        loop {
            items.push(self.parse_expression()?);
            if self.current_is(&TokenType::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenType::CloseBracket)?;
            return Ok(AstNode::List(items));
        }
    }

    fn parse_object(&mut self) -> Result<AstNode> {
        self.expect(TokenType::OpenBrace)?;
        let mut entries = Vec::new();
        if self.current_is(&TokenType::CloseBrace) {
            self.advance();
            return Ok(AstNode::Object(entries));
        }
        loop {
            let key = match self.current_token.token_type {
                TokenType::StringLiteral | TokenType::Identifier => self.advance().value,
                _ => return Err(self.unexpected()),
            };
            self.expect(TokenType::Colon)?;
            entries.push((key, self.parse_expression()?));
            if self.current_is(&TokenType::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenType::CloseBrace)?;
            return Ok(AstNode::Object(entries));
        }
    }
}

fn parse_number(text: &str) -> Result<Value> {
    if !text.contains('.') {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| Error::ParseError(format!("Invalid number literal '{}'", text)))
}
