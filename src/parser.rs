use crate::{
    ast::{
        Expression, FunctionKind, FunctionStatement, InfixOp, MatchCase, Parameter, PrefixOp,
        Program, Statement,
    },
    error::{parser_error, Result},
    stack::ensure_sufficient_stack,
    tokenizer::{Lexer, Token, TokenKind},
};
use log::debug;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Lowest,
    Pipeline,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn get_precedence(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Pipeline => Precedence::Pipeline,
        TokenKind::EqualEqual | TokenKind::BangEqual => Precedence::Equals,
        TokenKind::Less | TokenKind::Greater | TokenKind::LessEqual | TokenKind::GreaterEqual => {
            Precedence::LessGreater
        }
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => Precedence::Product,
        TokenKind::LeftParen => Precedence::Call,
        TokenKind::LeftSquare => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

fn infix_operator(kind: TokenKind) -> Option<InfixOp> {
    let operator = match kind {
        TokenKind::Plus => InfixOp::Add,
        TokenKind::Minus => InfixOp::Subtract,
        TokenKind::Asterisk => InfixOp::Multiply,
        TokenKind::Slash => InfixOp::Divide,
        TokenKind::Percent => InfixOp::Modulo,
        TokenKind::EqualEqual => InfixOp::Equal,
        TokenKind::BangEqual => InfixOp::NotEqual,
        TokenKind::Less => InfixOp::Less,
        TokenKind::LessEqual => InfixOp::LessEqual,
        TokenKind::Greater => InfixOp::Greater,
        TokenKind::GreaterEqual => InfixOp::GreaterEqual,
        TokenKind::Pipeline => InfixOp::Pipeline,
        _ => return None,
    };
    Some(operator)
}

/// Precedence-climbing parser. Errors are collected rather than returned so
/// that one pass reports as many problems as possible; a subtree that failed
/// to parse is simply absent (`None`).
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    peek: Token,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> Self {
        let current = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            current,
            peek,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while self.current.kind != TokenKind::EOF {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.next_token();
        }

        debug!(
            "parsed {} statements with {} errors",
            statements.len(),
            self.errors.len()
        );
        Program { statements }
    }

    fn next_token(&mut self) {
        let next = self.lexer.next_token();
        self.current = std::mem::replace(&mut self.peek, next);
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    fn expect_peek(&mut self, kind: TokenKind) -> Option<()> {
        if self.peek_is(kind) {
            self.next_token();
            Some(())
        } else {
            self.peek_error(kind);
            None
        }
    }

    fn peek_error(&mut self, kind: TokenKind) {
        self.error(format!(
            "expected next token to be {}, got {} instead",
            kind, self.peek.kind
        ));
    }

    fn error(&mut self, message: String) {
        debug!("parse error: {}", message);
        self.errors.push(message);
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        let kind = match self.current.kind {
            TokenKind::Proc => FunctionKind::Proc,
            TokenKind::Cons => FunctionKind::Cons,
            TokenKind::Supp => FunctionKind::Supp,
            TokenKind::ESupp => FunctionKind::ESupp,
            _ => {
                return self
                    .parse_expression(Precedence::Lowest)
                    .map(Statement::Expression)
            }
        };

        self.parse_function_statement(kind)
            .map(|function| Statement::Function(Rc::new(function)))
    }

    // proc add(a: int, b: int): int -> a + b
    // cons greet(name: str) -> print(name)
    // supp answer: int -> 42
    fn parse_function_statement(&mut self, kind: FunctionKind) -> Option<FunctionStatement> {
        self.expect_peek(TokenKind::Identifier)?;
        let name = self.current.literal.clone();

        let parameters = if kind.takes_parameters() {
            self.expect_peek(TokenKind::LeftParen)?;
            self.parse_function_parameters()?
        } else {
            Vec::new()
        };

        let return_type = if kind.requires_return_type() {
            self.expect_peek(TokenKind::Colon)?;
            Some(self.parse_type_name()?)
        } else {
            None
        };

        self.expect_peek(TokenKind::Arrow)?;
        self.next_token();
        let body = self.parse_expression(Precedence::Lowest)?;

        Some(FunctionStatement {
            kind,
            name,
            parameters,
            return_type,
            body,
        })
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<Parameter>> {
        let mut parameters = Vec::new();

        if self.peek_is(TokenKind::RightParen) {
            self.next_token();
            return Some(parameters);
        }

        loop {
            self.expect_peek(TokenKind::Identifier)?;
            let name = self.current.literal.clone();
            self.expect_peek(TokenKind::Colon)?;
            let type_name = self.parse_type_name()?;
            parameters.push(Parameter { name, type_name });

            if !self.peek_is(TokenKind::Comma) {
                break;
            }
            self.next_token();
        }

        self.expect_peek(TokenKind::RightParen)?;
        Some(parameters)
    }

    /// A type identifier, keeping a trailing `?` as part of the name.
    fn parse_type_name(&mut self) -> Option<String> {
        self.expect_peek(TokenKind::Identifier)?;
        let mut type_name = self.current.literal.clone();

        if self.peek_is(TokenKind::Question) {
            self.next_token();
            type_name.push('?');
        }

        Some(type_name)
    }

    pub fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        ensure_sufficient_stack(|| self.parse_expression_inner(precedence))
    }

    fn parse_expression_inner(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while precedence < get_precedence(self.peek.kind) {
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match self.current.kind {
            TokenKind::Identifier => Some(Expression::Identifier(self.current.literal.clone())),
            TokenKind::Int => self.parse_integer_literal(),
            TokenKind::Float => self.parse_float_literal(),
            TokenKind::String => Some(Expression::String(self.current.literal.clone())),
            TokenKind::True => Some(Expression::Boolean(true)),
            TokenKind::False => Some(Expression::Boolean(false)),
            TokenKind::Nil => Some(Expression::Nil),
            TokenKind::LeftParen => self.parse_grouped_expression(),
            TokenKind::LeftSquare => self
                .parse_expression_list(TokenKind::RightSquare)
                .map(Expression::List),
            TokenKind::LeftBrace => self.parse_map_literal(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::For => self.parse_for_expression(),
            TokenKind::Match => self.parse_match_expression(),
            TokenKind::Bang | TokenKind::Minus => self.parse_prefix_expression(),
            TokenKind::Fail => self.parse_fail_expression(),
            kind => {
                self.error(format!("no prefix parse function for {} found", kind));
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        match self.current.kind {
            TokenKind::LeftParen => {
                let arguments = self.parse_expression_list(TokenKind::RightParen)?;
                Some(Expression::Call {
                    function: Box::new(left),
                    arguments,
                })
            }
            TokenKind::LeftSquare => {
                self.next_token();
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(TokenKind::RightSquare)?;
                Some(Expression::Index {
                    left: Box::new(left),
                    index: Box::new(index),
                })
            }
            kind => {
                let operator = infix_operator(kind)?;
                let precedence = get_precedence(kind);
                self.next_token();
                let right = self.parse_expression(precedence)?;
                Some(Expression::Infix {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                })
            }
        }
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        match self.current.literal.parse::<i64>() {
            Ok(value) => Some(Expression::Integer(value)),
            Err(_) => {
                let message = format!("could not parse {:?} as integer", self.current.literal);
                self.error(message);
                None
            }
        }
    }

    fn parse_float_literal(&mut self) -> Option<Expression> {
        match self.current.literal.parse::<f64>() {
            Ok(value) => Some(Expression::Float(value)),
            Err(_) => {
                let message = format!("could not parse {:?} as float", self.current.literal);
                self.error(message);
                None
            }
        }
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(TokenKind::RightParen)?;
        Some(expression)
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let operator = match self.current.kind {
            TokenKind::Bang => PrefixOp::Not,
            _ => PrefixOp::Negate,
        };
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;

        Some(Expression::Prefix {
            operator,
            right: Box::new(right),
        })
    }

    fn parse_fail_expression(&mut self) -> Option<Expression> {
        self.expect_peek(TokenKind::String)?;
        Some(Expression::Fail(self.current.literal.clone()))
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(TokenKind::Then)?;
        self.next_token();
        let consequence = self.parse_expression(Precedence::Lowest)?;

        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            self.next_token();
            Some(Box::new(self.parse_expression(Precedence::Lowest)?))
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence: Box::new(consequence),
            alternative,
        })
    }

    fn parse_for_expression(&mut self) -> Option<Expression> {
        self.expect_peek(TokenKind::Identifier)?;
        let variable = self.current.literal.clone();

        self.expect_peek(TokenKind::In)?;
        self.next_token();
        let collection = self.parse_expression(Precedence::Lowest)?;

        self.expect_peek(TokenKind::Then)?;
        self.next_token();
        let body = self.parse_expression(Precedence::Lowest)?;

        Some(Expression::For {
            variable,
            collection: Box::new(collection),
            body: Box::new(body),
        })
    }

    // match n is n < 0 then "negative" is n == 0 then "zero" default "positive"
    fn parse_match_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let subject = self.parse_expression(Precedence::Lowest)?;

        let mut cases = Vec::new();
        while self.peek_is(TokenKind::Is) {
            self.next_token();
            self.next_token();
            let condition = self.parse_expression(Precedence::Lowest)?;

            self.expect_peek(TokenKind::Then)?;
            self.next_token();
            let consequence = self.parse_expression(Precedence::Lowest)?;

            cases.push(MatchCase {
                condition,
                consequence,
            });
        }

        let default = if self.peek_is(TokenKind::Default) {
            self.next_token();
            self.next_token();
            Some(Box::new(self.parse_expression(Precedence::Lowest)?))
        } else {
            None
        };

        Some(Expression::Match {
            subject: Box::new(subject),
            cases,
            default,
        })
    }

    fn parse_map_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();

        while !self.peek_is(TokenKind::RightBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;

            self.expect_peek(TokenKind::Colon)?;
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(TokenKind::RightBrace) {
                self.expect_peek(TokenKind::Comma)?;
            }
        }

        self.expect_peek(TokenKind::RightBrace)?;
        Some(Expression::Map(pairs))
    }

    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.peek_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        self.expect_peek(end)?;
        Some(list)
    }
}

/// Parses a whole program, failing with every collected message if any.
pub fn parse(source: &str) -> Result<Program> {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();

    if parser.errors().is_empty() {
        Ok(program)
    } else {
        parser_error(parser.into_errors())
    }
}
