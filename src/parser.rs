//! Recursive-descent parser: Token stream → AST
//!
//! Parsing is best effort. A failing statement records a [`ParseError`],
//! the parser skips to the next line, `;` or `}` and carries on, so one
//! pass reports every error it can find.
//!
//! `chrome` and `http` statements do not use the expression grammar. Their
//! arguments are read by [`Parser::read_line_args`], which splits the rest
//! of the source line into `key=value` and bare-word strings.

use crate::ast::*;
use crate::error::{ParseError, ParseErrors};
use crate::lexer::{Token, TokenKind};

type PResult<T> = std::result::Result<T, ParseError>;

/// Deepest nesting of expressions and blocks accepted before giving up
const MAX_NESTING: usize = 128;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    errors: Vec<ParseError>,
    loop_depth: usize,
    switch_depth: usize,
    block_depth: usize,
    nesting: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            errors: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            block_depth: 0,
            nesting: 0,
        }
    }

    /// Parse the whole token stream. Errors are available from
    /// [`Parser::errors`] afterwards.
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        loop {
            self.skip_semicolons();
            if self.is_at_end() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        Program { statements }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        match &self.current().kind {
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return Err(self.error_here("'break' outside of a loop or switch"));
                }
                let span = self.current_span();
                self.advance();
                Ok(Statement::Break { span })
            }
            TokenKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(self.error_here("'continue' outside of a loop"));
                }
                let span = self.current_span();
                self.advance();
                Ok(Statement::Continue { span })
            }
            TokenKind::Chrome | TokenKind::Http => self.parse_domain_statement(),
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block()?)),
            _ => self.parse_simple_statement(),
        }
    }

    /// `var name [type] [= value]`
    fn parse_var_decl(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        let line = self.current().line();
        self.advance(); // var

        let name = self.parse_identifier()?;

        let type_name = if self.check_identifier() && self.current().line() == line {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        let value = if self.check(&TokenKind::Equal) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Statement::VarDecl {
            name,
            type_name,
            value,
            span: self.span_from(start),
        })
    }

    /// Assignment, index assignment, or a bare expression
    fn parse_simple_statement(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        let expr = self.parse_expression()?;

        if self.check(&TokenKind::Equal) {
            self.advance();
            let value = self.parse_expression()?;
            let span = self.span_from(start);
            return match expr {
                Expression::Identifier { name, .. } => Ok(Statement::Assign { name, value, span }),
                Expression::Index { object, index, .. } => Ok(Statement::IndexAssign {
                    target: *object,
                    index: *index,
                    value,
                    span,
                }),
                other => {
                    let at = other.span();
                    Err(ParseError::new(
                        "invalid assignment target",
                        at.line,
                        at.column,
                    ))
                }
            };
        }

        Ok(Statement::Expression {
            expr,
            span: self.span_from(start),
        })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.mark_position();
        self.expect(&TokenKind::LeftBrace, "'{'")?;
        self.enter("block")?;
        self.block_depth += 1;

        let mut statements = Vec::new();
        loop {
            self.skip_semicolons();
            if self.check(&TokenKind::RightBrace) || self.is_at_end() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        self.block_depth -= 1;
        self.nesting -= 1;
        self.expect(&TokenKind::RightBrace, "'}'")?;

        Ok(Block {
            statements,
            span: self.span_from(start),
        })
    }

    fn parse_if(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        self.advance(); // if

        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            if self.check(&TokenKind::If) {
                self.enter("else-if chain")?;
                let chained = self.parse_if();
                self.nesting -= 1;
                Some(Box::new(chained?))
            } else {
                Some(Box::new(Statement::Block(self.parse_block()?)))
            }
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
            span: self.span_from(start),
        })
    }

    fn parse_while(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        self.advance(); // while

        let condition = self.parse_expression()?;
        let body = self.parse_loop_body()?;

        Ok(Statement::While {
            condition,
            body,
            span: self.span_from(start),
        })
    }

    /// `for init; cond; post { }` with an optionally parenthesised header
    fn parse_for(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        self.advance(); // for

        let parenthesized = self.check(&TokenKind::LeftParen) && self.paren_header_ahead();
        if parenthesized {
            self.advance();
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) {
            Some(Box::new(self.parse_var_decl()?))
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.expect(&TokenKind::Semicolon, "';' after for-loop initializer")?;

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after for-loop condition")?;

        let header_end = if parenthesized {
            TokenKind::RightParen
        } else {
            TokenKind::LeftBrace
        };
        let post = if self.check(&header_end) {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        if parenthesized {
            self.expect(&TokenKind::RightParen, "')'")?;
        }

        let body = self.parse_loop_body()?;

        Ok(Statement::For {
            init,
            condition,
            post,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_loop_body(&mut self) -> PResult<Block> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    /// True when the `(` at the cursor opens a `for (a; b; c)` header
    /// rather than a parenthesised expression.
    fn paren_header_ahead(&self) -> bool {
        let mut depth = 0usize;
        for token in &self.tokens[self.position..] {
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        return false;
                    }
                }
                TokenKind::Semicolon if depth == 1 => return true,
                TokenKind::LeftBrace | TokenKind::Eof => return false,
                _ => {}
            }
        }
        false
    }

    /// `switch expr { case a, b: ... default: ... }`
    fn parse_switch(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        self.advance(); // switch

        let subject = self.parse_expression()?;
        self.expect(&TokenKind::LeftBrace, "'{' after switch subject")?;

        let mut cases = Vec::new();
        let mut default = None;

        self.switch_depth += 1;
        self.block_depth += 1;
        let result = self.parse_switch_clauses(&mut cases, &mut default);
        self.block_depth -= 1;
        self.switch_depth -= 1;
        result?;

        self.expect(&TokenKind::RightBrace, "'}' to close switch")?;

        Ok(Statement::Switch {
            subject,
            cases,
            default,
            span: self.span_from(start),
        })
    }

    fn parse_switch_clauses(
        &mut self,
        cases: &mut Vec<SwitchCase>,
        default: &mut Option<Block>,
    ) -> PResult<()> {
        loop {
            self.skip_semicolons();
            if self.check(&TokenKind::RightBrace) || self.is_at_end() {
                return Ok(());
            }

            let clause_start = self.mark_position();
            if self.check(&TokenKind::Case) {
                self.advance();
                let mut values = vec![self.parse_expression()?];
                while self.check(&TokenKind::Comma) {
                    self.advance();
                    values.push(self.parse_expression()?);
                }
                self.expect(&TokenKind::Colon, "':' after case values")?;
                let body = self.parse_clause_body(clause_start);
                cases.push(SwitchCase {
                    values,
                    body,
                    span: self.span_from(clause_start),
                });
            } else if self.check(&TokenKind::Default) {
                if default.is_some() {
                    return Err(self.error_here("duplicate 'default' clause in switch"));
                }
                self.advance();
                self.expect(&TokenKind::Colon, "':' after default")?;
                *default = Some(self.parse_clause_body(clause_start));
            } else {
                return Err(self.error_here("expected 'case' or 'default' in switch"));
            }
        }
    }

    /// Statements of one case clause, up to the next `case`, `default` or `}`
    fn parse_clause_body(&mut self, clause_start: usize) -> Block {
        let mut statements = Vec::new();
        loop {
            self.skip_semicolons();
            if self.is_at_end()
                || self.check(&TokenKind::Case)
                || self.check(&TokenKind::Default)
                || self.check(&TokenKind::RightBrace)
            {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        Block {
            statements,
            span: self.span_from(clause_start),
        }
    }

    fn parse_return(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        let line = self.current().line();
        self.advance(); // return

        let ends_here = self.is_at_end()
            || self.current().line() != line
            || self.check(&TokenKind::RightBrace)
            || self.check(&TokenKind::Semicolon);

        let value = if ends_here {
            None
        } else {
            Some(self.parse_expression()?)
        };

        Ok(Statement::Return {
            value,
            span: self.span_from(start),
        })
    }

    /// `chrome ...` / `http ...`
    fn parse_domain_statement(&mut self) -> PResult<Statement> {
        let start = self.mark_position();
        let keyword = self.current().clone();
        self.advance();

        let args = self.read_line_args(&keyword);
        let span = self.span_from(start);

        Ok(match keyword.kind {
            TokenKind::Chrome => Statement::Chrome { args, span },
            _ => Statement::Http { args, span },
        })
    }

    /// Split the remaining tokens of the keyword's line into argument strings.
    ///
    /// - `,` closes the current argument.
    /// - `=` is appended and the next token is glued on after it.
    /// - A token that touches the previous one (no whitespace between)
    ///   continues the current argument.
    /// - Anything else starts a new argument.
    ///
    /// String tokens contribute their unquoted content as one opaque piece.
    fn read_line_args(&mut self, keyword: &Token) -> Vec<Expression> {
        let line = keyword.line();
        let mut args = Vec::new();
        let mut current = String::new();
        let mut current_span = SourceSpan::default();
        let mut in_key_value = false;
        let mut prev_end = keyword.span.end.offset;

        while !self.is_at_end() && self.current().line() == line {
            let token = self.current().clone();
            self.advance();
            let adjacent = token.span.start.offset == prev_end;
            prev_end = token.span.end.offset;

            match token.kind {
                TokenKind::Comma => {
                    flush(&mut current, current_span, &mut args);
                    in_key_value = false;
                }
                TokenKind::Equal => {
                    if current.is_empty() {
                        current_span = SourceSpan::from(&token.span);
                    }
                    current.push('=');
                    in_key_value = true;
                }
                _ => {
                    if current.is_empty() {
                        current_span = SourceSpan::from(&token.span);
                        current.push_str(&token.literal());
                    } else if in_key_value || adjacent {
                        current.push_str(&token.literal());
                        in_key_value = false;
                    } else {
                        flush(&mut current, current_span, &mut args);
                        current_span = SourceSpan::from(&token.span);
                        current.push_str(&token.literal());
                    }
                }
            }
        }
        flush(&mut current, current_span, &mut args);

        args
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn parse_expression(&mut self) -> PResult<Expression> {
        self.enter("expression")?;
        let expr = self.parse_or();
        self.nesting -= 1;
        expr
    }

    fn parse_or(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_and()?;

        while self.check(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::BinaryOp {
                op: BinaryOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expression::BinaryOp {
                op: BinaryOperator::And,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_comparison()?;

        loop {
            let op = match self.current().kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expression::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_addition()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Less => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessThanOrEqual,
                TokenKind::Greater => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_addition()?;
            left = Expression::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_addition(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_multiplication()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplication()?;
            left = Expression::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_multiplication(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let op = match self.current().kind {
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Minus => UnaryOperator::Negate,
            _ => return self.parse_postfix(),
        };
        self.advance();
        self.enter("expression")?;
        let operand = self.parse_unary();
        self.nesting -= 1;
        let operand = operand?;

        Ok(Expression::UnaryOp {
            op,
            operand: Box::new(operand),
            span: self.span_from(start),
        })
    }

    /// Index access, `++`/`--` and `->` chains. Postfix operators must
    /// start on the line where the operand ends.
    fn parse_postfix(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::LeftBracket) && self.on_previous_line() {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(&TokenKind::RightBracket, "']'")?;
                expr = Expression::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span: self.span_from(start),
                };
            } else if (self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus))
                && self.on_previous_line()
            {
                if !matches!(
                    expr,
                    Expression::Identifier { .. } | Expression::Index { .. }
                ) {
                    return Err(self.error_here("'++'/'--' needs a variable or index target"));
                }
                let op = if self.check(&TokenKind::PlusPlus) {
                    PostfixOperator::Increment
                } else {
                    PostfixOperator::Decrement
                };
                self.advance();
                expr = Expression::Postfix {
                    op,
                    target: Box::new(expr),
                    span: self.span_from(start),
                };
            } else if self.check(&TokenKind::Arrow) {
                expr = self.parse_chain(expr, start)?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// `head -> name -> name(args) ...`
    fn parse_chain(&mut self, head: Expression, start: usize) -> PResult<Expression> {
        let head = match head {
            Expression::Call { name, args, span } => ChainHead::Call(ChainLink { name, args, span }),
            Expression::Identifier { name, span } => ChainHead::Name { name, span },
            other => ChainHead::Value(Box::new(other)),
        };

        let mut links = Vec::new();
        while self.check(&TokenKind::Arrow) {
            self.advance();
            let link_start = self.mark_position();
            let name = self.parse_identifier()?;
            let args = if self.check(&TokenKind::LeftParen) && self.on_previous_line() {
                self.advance();
                self.parse_argument_list(&TokenKind::RightParen, "')'")?
            } else {
                Vec::new()
            };
            links.push(ChainLink {
                name,
                args,
                span: self.span_from(link_start),
            });
        }

        Ok(Expression::ChainCall {
            head,
            links,
            span: self.span_from(start),
        })
    }

    /// Comma-separated expressions up to `closing`, trailing comma allowed.
    /// The opening delimiter has already been consumed.
    fn parse_argument_list(&mut self, closing: &TokenKind, what: &str) -> PResult<Vec<Expression>> {
        let mut args = Vec::new();

        while !self.check(closing) {
            args.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(closing, what)?;

        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        let token = self.current().clone();
        let span = SourceSpan::from(&token.span);

        match token.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Expression::Integer { value, span })
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expression::Float { value, span })
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Expression::String { value, span })
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Expression::Boolean {
                    value: token.kind == TokenKind::True,
                    span,
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expression::Null { span })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) && self.on_previous_line() {
                    self.advance();
                    let args = self.parse_argument_list(&TokenKind::RightParen, "')'")?;
                    Ok(Expression::Call {
                        name,
                        args,
                        span: self.span_from(start),
                    })
                } else {
                    Ok(Expression::Identifier { name, span })
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let elements = self.parse_argument_list(&TokenKind::RightBracket, "']'")?;
                Ok(Expression::List {
                    elements,
                    span: self.span_from(start),
                })
            }
            TokenKind::LeftBrace => self.parse_dict(),
            TokenKind::Unknown(c) => Err(self.error_here(&format!("unexpected character '{}'", c))),
            TokenKind::Eof => Err(self.error_here("unexpected end of input")),
            _ => Err(self.error_here(&format!("unexpected token '{}'", token.span.text))),
        }
    }

    /// `{key: value, ...}`; a bare identifier key is taken as a string
    fn parse_dict(&mut self) -> PResult<Expression> {
        let start = self.mark_position();
        self.advance(); // {

        let mut entries = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key = match &self.current().kind {
                TokenKind::Identifier(name) => {
                    let key = Expression::String {
                        value: name.clone(),
                        span: self.current_span(),
                    };
                    self.advance();
                    key
                }
                _ => self.parse_expression()?,
            };
            self.expect(&TokenKind::Colon, "':' after dict key")?;
            let value = self.parse_expression()?;
            entries.push((key, value));

            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RightBrace, "'}' to close dict")?;

        Ok(Expression::Dict {
            entries,
            span: self.span_from(start),
        })
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn parse_identifier(&mut self) -> PResult<String> {
        if let TokenKind::Identifier(name) = &self.current().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_here(&format!(
                "expected identifier, found {}",
                describe(self.current())
            )))
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.position += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current().kind, TokenKind::Identifier(_))
    }

    /// Whether the current token starts on the line the previous token ended
    fn on_previous_line(&self) -> bool {
        self.position == 0
            || self.tokens[self.position - 1].span.end.line == self.current().line()
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(&format!(
                "expected {}, found {}",
                what,
                describe(self.current())
            )))
        }
    }

    fn skip_semicolons(&mut self) {
        while self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// Skip the rest of the failing statement: everything up to the end of
    /// its line, a `;`, or a `}` that closes an enclosing block.
    fn synchronize(&mut self) {
        let line = self.current().line();
        if !(self.check(&TokenKind::RightBrace) && self.block_depth > 0) {
            self.advance();
        }
        while !self.is_at_end()
            && self.current().line() == line
            && !self.check(&TokenKind::Semicolon)
            && !self.check(&TokenKind::RightBrace)
        {
            self.advance();
        }
    }

    /// Count one more level of nesting; callers undo it with `nesting -= 1`
    fn enter(&mut self, what: &str) -> PResult<()> {
        if self.nesting >= MAX_NESTING {
            return Err(self.error_here(&format!("{} nested too deeply", what)));
        }
        self.nesting += 1;
        Ok(())
    }

    fn error_here(&self, message: &str) -> ParseError {
        let token = self.current();
        ParseError::new(message, token.span.start.line, token.span.start.column)
    }

    /// Mark the current position to start tracking a span
    fn mark_position(&self) -> usize {
        self.position
    }

    /// Create a SourceSpan from a marked position to the last consumed token
    fn span_from(&self, start_pos: usize) -> SourceSpan {
        let start_token = &self.tokens[start_pos.min(self.tokens.len() - 1)];
        let end_pos = self.position.saturating_sub(1).max(start_pos);
        let end_token = &self.tokens[end_pos.min(self.tokens.len() - 1)];

        SourceSpan {
            line: start_token.span.start.line,
            column: start_token.span.start.column,
            offset: start_token.span.start.offset,
            length: end_token
                .span
                .end
                .offset
                .saturating_sub(start_token.span.start.offset),
        }
    }

    /// Get the span of the current token
    fn current_span(&self) -> SourceSpan {
        SourceSpan::from(&self.current().span)
    }
}

fn flush(current: &mut String, span: SourceSpan, args: &mut Vec<Expression>) {
    if !current.is_empty() {
        args.push(Expression::String {
            value: std::mem::take(current),
            span,
        });
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of input".to_string(),
        _ => format!("'{}'", token.span.text),
    }
}

/// Tokenize and parse `source`, returning every error found
pub fn parse(source: &str) -> std::result::Result<Program, ParseErrors> {
    let tokens = crate::lexer::tokenize(source).map_err(|e| {
        let error = match e.downcast::<ParseError>() {
            Ok(parse_error) => parse_error,
            Err(other) => ParseError::new(other.to_string(), 1, 1),
        };
        ParseErrors(vec![error])
    })?;

    let mut parser = Parser::new(tokens);
    let program = parser.parse_program();
    let errors = parser.into_errors();

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(ParseErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn string_args(args: &[Expression]) -> Vec<String> {
        args.iter()
            .map(|a| match a {
                Expression::String { value, .. } => value.clone(),
                other => panic!("Expected string argument, got {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_parse_var_decl() {
        let program = parse("var count int = 5\nvar name string").unwrap();
        assert_eq!(program.statements.len(), 2);
        if let Statement::VarDecl {
            name,
            type_name,
            value,
            ..
        } = &program.statements[0]
        {
            assert_eq!(name, "count");
            assert_eq!(type_name.as_deref(), Some("int"));
            assert!(value.is_some());
        } else {
            panic!("Expected var declaration");
        }
        if let Statement::VarDecl { value, .. } = &program.statements[1] {
            assert!(value.is_none());
        } else {
            panic!("Expected var declaration");
        }
    }

    #[test]
    fn test_var_type_must_be_on_the_same_line() {
        let program = parse("var x\ny = 2").unwrap();
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(
            &program.statements[0],
            Statement::VarDecl { type_name: None, .. }
        ));
    }

    #[test]
    fn test_parse_precedence() {
        let program = parse("x = 1 + 2 * 3").unwrap();
        if let Statement::Assign { value, .. } = &program.statements[0] {
            if let Expression::BinaryOp { op, right, .. } = value {
                assert_eq!(*op, BinaryOperator::Add);
                assert!(matches!(
                    right.as_ref(),
                    Expression::BinaryOp {
                        op: BinaryOperator::Multiply,
                        ..
                    }
                ));
            } else {
                panic!("Expected binary op");
            }
        } else {
            panic!("Expected assignment");
        }
    }

    #[test]
    fn test_parse_index_assignment() {
        let program = parse(r#"m["a"][0] = 1"#).unwrap();
        if let Statement::IndexAssign { target, index, .. } = &program.statements[0] {
            assert!(matches!(target, Expression::Index { .. }));
            assert!(matches!(index, Expression::Integer { value: 0, .. }));
        } else {
            panic!("Expected index assignment");
        }
    }

    #[test]
    fn test_parse_control_flow() {
        let input = r#"
i = 0
while (i < 3) {
    i = i + 1
}
for var j = 0; j < 10; j++ {
    if j == 2 { continue } else if j > 5 { break } else { print(j) }
}
for (k = 0; k < 2; k++) {
    print(k)
}
"#;
        let result = parse(input);
        if let Err(e) = &result {
            println!("Error: {}", e);
        }
        let program = result.unwrap();
        assert_eq!(program.statements.len(), 4);
        assert!(matches!(program.statements[1], Statement::While { .. }));
        if let Statement::For {
            init,
            condition,
            post,
            ..
        } = &program.statements[2]
        {
            assert!(matches!(init.as_deref(), Some(Statement::VarDecl { .. })));
            assert!(condition.is_some());
            assert!(matches!(
                post.as_deref(),
                Some(Statement::Expression {
                    expr: Expression::Postfix { .. },
                    ..
                })
            ));
        } else {
            panic!("Expected for loop");
        }
        assert!(matches!(program.statements[3], Statement::For { .. }));
    }

    #[test]
    fn test_parse_switch() {
        let input = r#"
switch x {
case 1, 2:
    y = "low"
case 3:
    y = "three"
    break
default:
    y = "other"
}
"#;
        let program = parse(input).unwrap();
        if let Statement::Switch { cases, default, .. } = &program.statements[0] {
            assert_eq!(cases.len(), 2);
            assert_eq!(cases[0].values.len(), 2);
            assert_eq!(cases[1].body.statements.len(), 2);
            assert!(default.is_some());
        } else {
            panic!("Expected switch");
        }
    }

    #[test]
    fn test_break_outside_loop_is_an_error() {
        let err = parse("break").unwrap_err();
        assert!(err.0[0].message.contains("outside"));
        assert!(parse("while true { continue }").is_ok());
        assert!(parse("switch 1 { case 1: break }").is_ok());
        assert!(parse("switch 1 { case 1: continue }").is_err());
    }

    #[test]
    fn test_parse_chain_call() {
        let program = parse(r#"r = "ab" -> upper -> repeat(2)"#).unwrap();
        if let Statement::Assign {
            value: Expression::ChainCall { head, links, .. },
            ..
        } = &program.statements[0]
        {
            assert!(matches!(head, ChainHead::Value(_)));
            assert_eq!(links.len(), 2);
            assert_eq!(links[0].name, "upper");
            assert!(links[0].args.is_empty());
            assert_eq!(links[1].name, "repeat");
            assert_eq!(links[1].args.len(), 1);
        } else {
            panic!("Expected chain call");
        }
    }

    #[test]
    fn test_chain_heads() {
        let program = parse("a = x -> f\nb = g(1) -> f\nc = _value(3) -> f").unwrap();
        let heads: Vec<&ChainHead> = program
            .statements
            .iter()
            .map(|s| match s {
                Statement::Assign {
                    value: Expression::ChainCall { head, .. },
                    ..
                } => head,
                _ => panic!("Expected chain assignment"),
            })
            .collect();
        assert!(matches!(heads[0], ChainHead::Name { name, .. } if name == "x"));
        assert!(matches!(heads[1], ChainHead::Call(link) if link.name == "g"));
        assert!(matches!(heads[2], ChainHead::Call(link) if link.name == "_value"));
    }

    #[test]
    fn test_parse_dict_literal() {
        let program = parse(r#"d = {name: "bot", "age": 3, 1: true}"#).unwrap();
        if let Statement::Assign {
            value: Expression::Dict { entries, .. },
            ..
        } = &program.statements[0]
        {
            assert_eq!(entries.len(), 3);
            assert!(matches!(&entries[0].0, Expression::String { value, .. } if value == "name"));
            assert!(matches!(&entries[2].0, Expression::Integer { value: 1, .. }));
        } else {
            panic!("Expected dict literal");
        }
    }

    #[test]
    fn test_chrome_statement_arguments() {
        let program = parse(r#"chrome init userpath="X""#).unwrap();
        if let Statement::Chrome { args, .. } = &program.statements[0] {
            assert_eq!(string_args(args), vec!["init", "userpath=X"]);
        } else {
            panic!("Expected chrome statement");
        }
    }

    #[test]
    fn test_chrome_arguments_ignore_whitespace_around_equals() {
        let program = parse("chrome   init   userpath = `X`  ").unwrap();
        if let Statement::Chrome { args, .. } = &program.statements[0] {
            assert_eq!(string_args(args), vec!["init", "userpath=X"]);
        } else {
            panic!("Expected chrome statement");
        }
    }

    #[test]
    fn test_equals_inside_quoted_value_is_opaque() {
        let program =
            parse(r#"chrome click=`//*[@id="chat-submit-button"]` input="a=b""#).unwrap();
        if let Statement::Chrome { args, .. } = &program.statements[0] {
            assert_eq!(
                string_args(args),
                vec![r#"click=//*[@id="chat-submit-button"]"#, "input=a=b"]
            );
        } else {
            panic!("Expected chrome statement");
        }
    }

    #[test]
    fn test_domain_arguments_stop_at_end_of_line() {
        let program = parse("http get url=target to=res\nx = 1").unwrap();
        assert_eq!(program.statements.len(), 2);
        if let Statement::Http { args, .. } = &program.statements[0] {
            assert_eq!(string_args(args), vec!["get", "url=target", "to=res"]);
        } else {
            panic!("Expected http statement");
        }
    }

    #[test]
    fn test_domain_arguments_commas_and_adjacency() {
        let program = parse("chrome init size=900*600, proxy=\"http://127.0.0.1:8888\"").unwrap();
        if let Statement::Chrome { args, .. } = &program.statements[0] {
            assert_eq!(
                string_args(args),
                vec!["init", "size=900*600", "proxy=http://127.0.0.1:8888"]
            );
        } else {
            panic!("Expected chrome statement");
        }
    }

    #[test]
    fn test_multiple_errors_are_collected() {
        let err = parse("x = )\ny = ]\nz = 3").unwrap_err();
        assert_eq!(err.0.len(), 2);
        assert_eq!(err.0[0].line, 1);
        assert_eq!(err.0[1].line, 2);
    }

    #[test]
    fn test_error_positions() {
        let err = parse("a = 1\nb = [1, 2").unwrap_err();
        assert_eq!(err.0[0].line, 2);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 + 2 = 3").unwrap_err();
        assert!(err.0[0].message.contains("assignment target"));
    }

    #[test]
    fn test_unknown_character_in_expression() {
        let err = parse("x = 1 @ 2").unwrap_err();
        assert!(err.0[0].message.contains("'@'"));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let source = format!("x = {}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.0.len(), 1);
        assert!(err.0[0].message.contains("expression nested too deeply"));

        let err = parse(&format!("y = {}1", "-".repeat(100_000))).unwrap_err();
        assert!(err.0[0].message.contains("nested too deeply"));

        let source = format!("{}{}", "{".repeat(10_000), "}".repeat(10_000));
        let err = parse(&source).unwrap_err();
        assert!(err.0.iter().any(|e| e.message.contains("block nested too deeply")));
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let source = format!("x = {}1{}", "(".repeat(50), ")".repeat(50));
        assert!(parse(&source).is_ok());
        let source = format!("{}x = 1{}", "{".repeat(50), "}".repeat(50));
        assert!(parse(&source).is_ok());
    }

    #[test]
    fn test_lexer_error_becomes_parse_error() {
        let err = parse("x = 1\ny = \"open").unwrap_err();
        assert_eq!(err.0[0].line, 2);
        assert!(err.0[0].message.contains("unterminated"));
    }
}
