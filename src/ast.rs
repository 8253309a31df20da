//! Abstract Syntax Tree definitions for chromebot scripts
//!
//! Two closed node families: [`Statement`] and [`Expression`]. Every node
//! carries the [`SourceSpan`] of the tokens it was parsed from so that
//! diagnostics can point back at the script.

use serde::{Deserialize, Serialize};

use crate::lexer::Span;

/// Source location information
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

impl From<&Span> for SourceSpan {
    fn from(span: &Span) -> Self {
        SourceSpan {
            line: span.start.line,
            column: span.start.column,
            offset: span.start.offset,
            length: span.text.len(),
        }
    }
}

/// A parsed script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A braced statement list; executes in its own child scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub span: SourceSpan,
}

/// One `case a, b:` clause of a switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub values: Vec<Expression>,
    pub body: Block,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// `var name [type] [= value]`
    VarDecl {
        name: String,
        type_name: Option<String>,
        value: Option<Expression>,
        span: SourceSpan,
    },

    /// `name = value`, with write-through scoping
    Assign {
        name: String,
        value: Expression,
        span: SourceSpan,
    },

    /// `target[index] = value`
    IndexAssign {
        target: Expression,
        index: Expression,
        value: Expression,
        span: SourceSpan,
    },

    Expression {
        expr: Expression,
        span: SourceSpan,
    },

    Block(Block),

    /// `if cond { } else ...`; the else branch is a Block or another If
    If {
        condition: Expression,
        then_branch: Block,
        else_branch: Option<Box<Statement>>,
        span: SourceSpan,
    },

    Switch {
        subject: Expression,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
        span: SourceSpan,
    },

    While {
        condition: Expression,
        body: Block,
        span: SourceSpan,
    },

    /// `for init; cond; post { }`, each clause optional
    For {
        init: Option<Box<Statement>>,
        condition: Option<Expression>,
        post: Option<Box<Statement>>,
        body: Block,
        span: SourceSpan,
    },

    Return {
        value: Option<Expression>,
        span: SourceSpan,
    },

    Break {
        span: SourceSpan,
    },

    Continue {
        span: SourceSpan,
    },

    /// `chrome ...` with its line-scoped arguments
    Chrome {
        args: Vec<Expression>,
        span: SourceSpan,
    },

    /// `http ...` with its line-scoped arguments
    Http {
        args: Vec<Expression>,
        span: SourceSpan,
    },
}

impl Statement {
    pub fn span(&self) -> SourceSpan {
        match self {
            Statement::VarDecl { span, .. }
            | Statement::Assign { span, .. }
            | Statement::IndexAssign { span, .. }
            | Statement::Expression { span, .. }
            | Statement::If { span, .. }
            | Statement::Switch { span, .. }
            | Statement::While { span, .. }
            | Statement::For { span, .. }
            | Statement::Return { span, .. }
            | Statement::Break { span }
            | Statement::Continue { span }
            | Statement::Chrome { span, .. }
            | Statement::Http { span, .. } => *span,
            Statement::Block(block) => block.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Integer {
        value: i64,
        span: SourceSpan,
    },

    Float {
        value: f64,
        span: SourceSpan,
    },

    String {
        value: String,
        span: SourceSpan,
    },

    Boolean {
        value: bool,
        span: SourceSpan,
    },

    Null {
        span: SourceSpan,
    },

    Identifier {
        name: String,
        span: SourceSpan,
    },

    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        span: SourceSpan,
    },

    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
        span: SourceSpan,
    },

    /// `x++` / `x--`; yields the value before the update
    Postfix {
        op: PostfixOperator,
        target: Box<Expression>,
        span: SourceSpan,
    },

    Call {
        name: String,
        args: Vec<Expression>,
        span: SourceSpan,
    },

    List {
        elements: Vec<Expression>,
        span: SourceSpan,
    },

    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        span: SourceSpan,
    },

    Dict {
        entries: Vec<(Expression, Expression)>,
        span: SourceSpan,
    },

    /// `head -> f -> g(x)`: each result becomes the first argument of the next link
    ChainCall {
        head: ChainHead,
        links: Vec<ChainLink>,
        span: SourceSpan,
    },
}

impl Expression {
    pub fn span(&self) -> SourceSpan {
        match self {
            Expression::Integer { span, .. }
            | Expression::Float { span, .. }
            | Expression::String { span, .. }
            | Expression::Boolean { span, .. }
            | Expression::Null { span }
            | Expression::Identifier { span, .. }
            | Expression::BinaryOp { span, .. }
            | Expression::UnaryOp { span, .. }
            | Expression::Postfix { span, .. }
            | Expression::Call { span, .. }
            | Expression::List { span, .. }
            | Expression::Index { span, .. }
            | Expression::Dict { span, .. }
            | Expression::ChainCall { span, .. } => *span,
        }
    }
}

/// First segment of a chain call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainHead {
    /// A literal or other expression piped in as-is (`_value(x)` or `"ab" -> ...`)
    Value(Box<Expression>),
    /// A bare name: a variable unless a callable of that name is registered
    Name { name: String, span: SourceSpan },
    /// An explicit call `f(args) -> ...`
    Call(ChainLink),
}

/// One `name(args)` segment of a chain call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub name: String,
    pub args: Vec<Expression>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
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
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostfixOperator {
    Increment,
    Decrement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_span() {
        let span = SourceSpan {
            line: 3,
            column: 5,
            offset: 20,
            length: 5,
        };
        let stmt = Statement::Break { span };
        assert_eq!(stmt.span().line, 3);
        assert_eq!(stmt.span().column, 5);
    }

    #[test]
    fn test_operator_symbols() {
        assert_eq!(BinaryOperator::LessThanOrEqual.symbol(), "<=");
        assert_eq!(BinaryOperator::Modulo.symbol(), "%");
    }

    #[test]
    fn test_program_serializes_to_json() {
        let program = Program {
            statements: vec![Statement::Expression {
                expr: Expression::Integer {
                    value: 1,
                    span: SourceSpan::default(),
                },
                span: SourceSpan::default(),
            }],
        };
        let json = serde_json::to_string(&program).unwrap();
        assert!(json.contains("Integer"));
    }
}
