use crate::language::{
    ast::{Ast, BinaryOp, Function, NodeId, NodeKind},
    binder::{Binder, Resolution},
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};
use std::rc::Rc;

/// Result of parsing one source unit: the node arena shared by every
/// function defined in it, and the functions themselves, already bound.
#[derive(Debug)]
pub struct ParsedProgram {
    pub ast: Rc<Ast>,
    pub functions: Vec<Rc<Function>>,
}

pub fn parse_source(source: &str) -> Result<ParsedProgram, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
    ast: Ast,
    functions: Vec<Rc<Function>>,
    binder: Binder,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            ast: Ast::new(),
            functions: Vec::new(),
            binder: Binder::new(),
        }
    }

    fn parse(mut self) -> Result<ParsedProgram, SyntaxErrors> {
        while !self.is_eof() {
            match self.parse_function() {
                Ok(function) => self.functions.push(Rc::new(function)),
                Err(err) => {
                    self.report(err);
                    self.synchronize_function();
                }
            }
        }

        if self.errors.is_empty() {
            Ok(ParsedProgram {
                ast: Rc::new(self.ast),
                functions: self.functions,
            })
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    /// `function name(a, b) { ... }`. A failure anywhere below abandons
    /// this function only; the caller resynchronizes at the next
    /// `function` keyword.
    fn parse_function(&mut self) -> Result<Function, SyntaxError> {
        let start = self.expect(TokenKind::Function)?.span;
        let name = self.expect_identifier("Expected function name")?;

        self.expect(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                parameters.push(self.expect_identifier("Expected parameter name")?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.binder = Binder::new();
        self.binder.enter_block(false);

        // Parameters become ordinary locals: each is bound to a slot and
        // assigned from its positional argument at the top of the body.
        let mut prefix = Vec::with_capacity(parameters.len());
        for (index, (param, span)) in parameters.iter().enumerate() {
            let slot = self.binder.bind_parameter(param, index);
            let read = self
                .ast
                .push(NodeKind::ReadArgument { index }, Some(*span));
            let write = self
                .ast
                .push(NodeKind::WriteLocal { slot, value: read }, Some(*span));
            prefix.push(write);
        }

        let block = self.parse_block_raw(prefix);
        self.binder.leave_block();
        let block = block?;

        let end = self
            .ast
            .span(block)
            .map(|span| span.end)
            .unwrap_or(start.end);
        let span = Span::new(start.start, end);
        let body = self.ast.push(
            NodeKind::FunctionBody {
                name: name.0.clone(),
                block,
            },
            Some(span),
        );

        let binder = std::mem::take(&mut self.binder);
        log::debug!(
            "bound function `{}` ({} parameters, {} slots)",
            name.0,
            parameters.len(),
            binder.slot_count()
        );
        Ok(Function {
            name: name.0,
            parameter_count: parameters.len(),
            body,
            slots: binder.finish(),
            span,
        })
    }

    /// Parses `{ ... }` into a block node without touching the binder's
    /// scope stack; `prefix` statements come first (parameter writes).
    fn parse_block_raw(&mut self, prefix: Vec<NodeId>) -> Result<NodeId, SyntaxError> {
        let open = self.expect(TokenKind::LBrace)?.span;
        let mut statements = prefix;
        while !self.check(TokenKind::RBrace) && !self.is_eof() {
            statements.push(self.parse_statement()?);
        }
        let close = self.expect(TokenKind::RBrace)?.span;
        Ok(self.ast.push(
            NodeKind::Block { statements },
            Some(open.merge(close)),
        ))
    }

    /// A nested block with its own binder scope.
    fn parse_scoped_block(&mut self, loop_body: bool) -> Result<NodeId, SyntaxError> {
        self.binder.enter_block(loop_body);
        let block = self.parse_block_raw(Vec::new());
        self.binder.leave_block();
        block
    }

    fn parse_statement(&mut self) -> Result<NodeId, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::LBrace) => self.parse_scoped_block(false),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::Break) => {
                let span = self.advance_span();
                if !self.binder.in_loop() {
                    return Err(SyntaxError::new("`break` used outside of a loop", span));
                }
                self.expect(TokenKind::Semi)?;
                Ok(self.ast.push(NodeKind::Break, Some(span)))
            }
            Some(TokenKind::Continue) => {
                let span = self.advance_span();
                if !self.binder.in_loop() {
                    return Err(SyntaxError::new("`continue` used outside of a loop", span));
                }
                self.expect(TokenKind::Semi)?;
                Ok(self.ast.push(NodeKind::Continue, Some(span)))
            }
            Some(TokenKind::Return) => {
                let span = self.advance_span();
                let value = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let end = self.expect(TokenKind::Semi)?.span;
                Ok(self
                    .ast
                    .push(NodeKind::Return { value }, Some(span.merge(end))))
            }
            Some(TokenKind::Debugger) => {
                let span = self.advance_span();
                self.expect(TokenKind::Semi)?;
                Ok(self.ast.push(NodeKind::Debugger, Some(span)))
            }
            _ => {
                let expression = self.parse_expression()?;
                self.expect(TokenKind::Semi)?;
                Ok(expression)
            }
        }
    }

    fn parse_if(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.expect(TokenKind::If)?.span;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let then_block = self.parse_scoped_block(false)?;
        let else_block = if self.matches(TokenKind::Else) {
            Some(self.parse_scoped_block(false)?)
        } else {
            None
        };
        let end = else_block
            .or(Some(then_block))
            .and_then(|id| self.ast.span(id))
            .map(|span| span.end)
            .unwrap_or(start.end);
        Ok(self.ast.push(
            NodeKind::If {
                condition,
                then_block,
                else_block,
            },
            Some(Span::new(start.start, end)),
        ))
    }

    fn parse_while(&mut self) -> Result<NodeId, SyntaxError> {
        let start = self.expect(TokenKind::While)?.span;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_scoped_block(true)?;
        let end = self
            .ast
            .span(body)
            .map(|span| span.end)
            .unwrap_or(start.end);
        Ok(self.ast.push(
            NodeKind::While { condition, body },
            Some(Span::new(start.start, end)),
        ))
    }

    fn parse_expression(&mut self) -> Result<NodeId, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<NodeId, SyntaxError> {
        let mut lhs = self.parse_and()?;
        while self.matches(TokenKind::PipePipe) {
            let rhs = self.parse_and()?;
            let span = self.merge_spans(lhs, rhs);
            lhs = self.ast.push(NodeKind::LogicalOr { lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<NodeId, SyntaxError> {
        let mut lhs = self.parse_comparison()?;
        while self.matches(TokenKind::AmpersandAmpersand) {
            let rhs = self.parse_comparison()?;
            let span = self.merge_spans(lhs, rhs);
            lhs = self.ast.push(NodeKind::LogicalAnd { lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<NodeId, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::LtEq) => BinaryOp::LtEq,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::GtEq) => BinaryOp::GtEq,
                Some(TokenKind::EqEq) => BinaryOp::Eq,
                Some(TokenKind::BangEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            let span = self.merge_spans(lhs, rhs);
            lhs = self.ast.push(NodeKind::Binary { op, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<NodeId, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let span = self.merge_spans(lhs, rhs);
            lhs = self.ast.push(NodeKind::Binary { op, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, SyntaxError> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_factor()?;
            let span = self.merge_spans(lhs, rhs);
            lhs = self.ast.push(NodeKind::Binary { op, lhs, rhs }, span);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<NodeId, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Integer(value)) => {
                let span = self.advance_span();
                Ok(self.ast.push(NodeKind::Long(value), Some(span)))
            }
            Some(TokenKind::String(value)) => {
                let span = self.advance_span();
                Ok(self.ast.push(NodeKind::Str(value), Some(span)))
            }
            Some(TokenKind::LParen) => {
                let open = self.advance_span();
                let inner = self.parse_expression()?;
                let close = self.expect(TokenKind::RParen)?.span;
                Ok(self
                    .ast
                    .push(NodeKind::Paren { inner }, Some(open.merge(close))))
            }
            Some(TokenKind::Identifier(name)) => {
                let span = self.advance_span();
                if self.matches(TokenKind::Eq) {
                    // Local assignment; the slot is created here if this is
                    // the identifier's first write in the function.
                    let slot = self.binder.bind_write(&name);
                    let value = self.parse_expression()?;
                    let end = self
                        .ast
                        .span(value)
                        .map(|s| s.end)
                        .unwrap_or(span.end);
                    return Ok(self.ast.push(
                        NodeKind::WriteLocal { slot, value },
                        Some(Span::new(span.start, end)),
                    ));
                }
                let base = self.create_read(&name, span);
                self.parse_member_chain(base)
            }
            _ => Err(self.error_here("Expected expression")),
        }
    }

    /// Local read when the name is visible in the current scope, global
    /// function reference otherwise.
    fn create_read(&mut self, name: &str, span: Span) -> NodeId {
        match self.binder.resolve_read(name) {
            Resolution::Local(slot) => self.ast.push(NodeKind::ReadLocal { slot }, Some(span)),
            Resolution::Global => self.ast.push(
                NodeKind::FunctionRef {
                    name: name.to_string(),
                },
                Some(span),
            ),
        }
    }

    /// Calls, property reads/writes, and index accesses chained off an
    /// identifier: `f(x).field`, `o["k"] = v`, ...
    fn parse_member_chain(&mut self, mut base: NodeId) -> Result<NodeId, SyntaxError> {
        loop {
            match self.peek_kind() {
                Some(TokenKind::LParen) => {
                    self.advance();
                    let mut arguments = Vec::new();
                    if !self.check(TokenKind::RParen) {
                        loop {
                            arguments.push(self.parse_expression()?);
                            if !self.matches(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.expect(TokenKind::RParen)?.span;
                    let span = self
                        .ast
                        .span(base)
                        .map(|s| Span::new(s.start, close.end));
                    base = self.ast.push(
                        NodeKind::Call {
                            callee: base,
                            arguments,
                        },
                        span,
                    );
                }
                Some(TokenKind::Dot) => {
                    self.advance();
                    let (property, prop_span) =
                        self.expect_identifier("Expected property name after `.`")?;
                    let name = self.ast.push(NodeKind::Str(property), Some(prop_span));
                    base = self.finish_property_access(base, name, prop_span.end)?;
                }
                Some(TokenKind::LBracket) => {
                    self.advance();
                    let name = self.parse_expression()?;
                    let close = self.expect(TokenKind::RBracket)?.span;
                    base = self.finish_property_access(base, name, close.end)?;
                }
                _ => return Ok(base),
            }
        }
    }

    fn finish_property_access(
        &mut self,
        receiver: NodeId,
        name: NodeId,
        end: usize,
    ) -> Result<NodeId, SyntaxError> {
        let start = self
            .ast
            .span(receiver)
            .map(|s| s.start)
            .unwrap_or(end);
        if self.matches(TokenKind::Eq) {
            let value = self.parse_expression()?;
            let end = self.ast.span(value).map(|s| s.end).unwrap_or(end);
            Ok(self.ast.push(
                NodeKind::WriteProperty {
                    receiver,
                    name,
                    value,
                },
                Some(Span::new(start, end)),
            ))
        } else {
            Ok(self.ast.push(
                NodeKind::ReadProperty { receiver, name },
                Some(Span::new(start, end)),
            ))
        }
    }

    fn merge_spans(&self, a: NodeId, b: NodeId) -> Option<Span> {
        match (self.ast.span(a), self.ast.span(b)) {
            (Some(left), Some(right)) => Some(left.merge(right)),
            (Some(span), None) | (None, Some(span)) => Some(span),
            (None, None) => None,
        }
    }

    fn expect_identifier(&mut self, msg: &str) -> Result<(String, Span), SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Identifier(name)) => {
                let span = self.advance_span();
                Ok((name, span))
            }
            _ => Err(self.error_here(msg)),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token, SyntaxError> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("Expected {}", kind.describe())))
        }
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        matches!(self.peek_kind(), Some(tk) if tk == kind)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind.clone())
    }

    fn advance(&mut self) -> &Token {
        let token = self
            .tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"));
        self.pos = (self.pos + 1).min(self.tokens.len());
        token
    }

    fn advance_span(&mut self) -> Span {
        self.advance().span
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        let span = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(0, 0));
        SyntaxError::new(message.to_string(), span)
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    fn synchronize_function(&mut self) {
        if !self.is_eof() {
            self.advance();
        }
        while !self.is_eof() && !self.check(TokenKind::Function) {
            self.advance();
        }
    }
}
