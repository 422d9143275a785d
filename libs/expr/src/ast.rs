//! Abstract Syntax Tree (AST) for value expressions
//!
//! Nodes are immutable once parsed and are shared between evaluations through
//! the engine's compiled-expression cache.

use serde_json::Value;

/// AST node representing a value expression
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// Literal JSON value: number, string, boolean, null
    Literal(Value),

    /// Variable reference resolved through the scope
    Identifier(String),

    /// Member access: `target.name`
    Member { target: Box<AstNode>, name: String },

    /// Index access: `target[index]`
    Index {
        target: Box<AstNode>,
        index: Box<AstNode>,
    },

    /// Function call: `name(args)` or `receiver.name(args)` (receiver is the first argument)
    Call { name: String, args: Vec<AstNode> },

    /// Unary operation: `!expr`, `-expr`
    Unary {
        operator: UnaryOperator,
        operand: Box<AstNode>,
    },

    /// Binary operation
    Binary {
        left: Box<AstNode>,
        operator: BinaryOperator,
        right: Box<AstNode>,
    },

    /// Short-circuit logical operation
    Logical {
        left: Box<AstNode>,
        operator: LogicalOperator,
        right: Box<AstNode>,
    },

    /// `left ?? right`
    Coalesce { left: Box<AstNode>, right: Box<AstNode> },

    /// `condition ? then : otherwise`
    Conditional {
        condition: Box<AstNode>,
        then: Box<AstNode>,
        otherwise: Box<AstNode>,
    },

    /// List literal: `[a, b]`
    List(Vec<AstNode>),

    /// Object literal: `{ "k": v }`
    Object(Vec<(String, AstNode)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
        }
    }
}
