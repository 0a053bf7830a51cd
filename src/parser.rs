//! Recursive-descent parser for declaration files.
//!
//! Grammar:
//!
//! ```text
//! program   := item*
//! item      := IDENTIFIER '=' expr | expr
//! expr      := STRING | list | rule_call | IDENTIFIER
//! list      := '[' (expr (',' expr)*)? ']'
//! rule_call := IDENTIFIER '(' (arg (',' arg)*)? ')'
//! arg       := IDENTIFIER '=' expr
//! ```
//!
//! One token of lookahead is enough everywhere except after an identifier,
//! where the parser peeks one token further to tell a variable reference
//! from a rule call (or, at the top level, from a binding). Parsing stops
//! at the first error; there is no recovery.

use std::fmt;

use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use crate::ast::{Item, Node, Program};
use crate::lexer::{self, LexError, Position, Token, TokenKind};

/// What the parser was looking for when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// A specific token kind.
    Token(TokenKind),
    /// The start of any expression.
    Expression,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(kind) => fmt::Display::fmt(kind, f),
            Self::Expression => f.write_str("expression"),
        }
    }
}

/// A token that does not fit the grammar at its position.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("expected {expected}, found {found} at {position}")]
#[diagnostic(code(kiln::parse::unexpected_token))]
pub struct ParseError {
    /// What the grammar required.
    pub expected: Expected,
    /// The kind of token actually present.
    pub found: TokenKind,
    /// Position of the offending token.
    pub position: Position,
}

/// Errors from lexing and parsing a whole source text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SyntaxError {
    /// The text could not be tokenised.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),
    /// The tokens do not match the grammar.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    /// Source position the error refers to.
    #[must_use]
    pub const fn position(&self) -> Position {
        match self {
            Self::Lex(err) => err.position(),
            Self::Parse(err) => err.position,
        }
    }
}

/// Token-stream parser.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
}

impl Parser {
    /// Prepare a parser over `tokens`.
    ///
    /// The stream is expected to end with [`TokenKind::Eof`], as produced by
    /// [`lexer::tokenize`]; reading past the end yields that token again.
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_position = tokens
            .last()
            .map_or_else(Position::default, |t| t.position);
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", eof_position),
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: Expected) -> ParseError {
        let token = self.current();
        ParseError {
            expected,
            found: token.kind,
            position: token.position,
        }
    }

    fn eat(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(Expected::Token(kind)))
        }
    }

    /// Parse every item up to end of input.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] at the first token that breaks the grammar.
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while !self.at(TokenKind::Eof) {
            items.push(self.item()?);
        }
        Ok(Program { items })
    }

    fn item(&mut self) -> Result<Item, ParseError> {
        if self.at(TokenKind::Identifier) && self.peek_kind() == TokenKind::Equals {
            let name = self.advance().text;
            self.eat(TokenKind::Equals)?;
            let value = self.expr()?;
            return Ok(Item::Binding { name, value });
        }
        self.expr().map(Item::Expr)
    }

    /// Parse a single expression.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the current token cannot start an
    /// expression or the expression is malformed.
    pub fn expr(&mut self) -> Result<Node, ParseError> {
        match self.current().kind {
            TokenKind::String => Ok(Node::String(self.advance().text)),
            TokenKind::LBracket => self.list(),
            TokenKind::Identifier if self.peek_kind() == TokenKind::LParen => self.rule_call(),
            TokenKind::Identifier => Ok(Node::Variable(self.advance().text)),
            _ => Err(self.unexpected(Expected::Expression)),
        }
    }

    fn list(&mut self) -> Result<Node, ParseError> {
        self.eat(TokenKind::LBracket)?;
        let mut items = Vec::new();
        if !self.at(TokenKind::RBracket) {
            items.push(self.expr()?);
            while self.at(TokenKind::Comma) {
                self.advance();
                items.push(self.expr()?);
            }
        }
        self.eat(TokenKind::RBracket)?;
        Ok(Node::List(items))
    }

    fn rule_call(&mut self) -> Result<Node, ParseError> {
        let name = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::LParen)?;
        let mut args = IndexMap::new();
        if !self.at(TokenKind::RParen) {
            self.argument(&mut args)?;
            while self.at(TokenKind::Comma) {
                self.advance();
                self.argument(&mut args)?;
            }
        }
        self.eat(TokenKind::RParen)?;
        Ok(Node::RuleCall { name, args })
    }

    fn argument(&mut self, args: &mut IndexMap<String, Node>) -> Result<(), ParseError> {
        let key = self.eat(TokenKind::Identifier)?.text;
        self.eat(TokenKind::Equals)?;
        let value = self.expr()?;
        args.insert(key, value);
        Ok(())
    }
}

/// Lex and parse `source` into a [`Program`].
///
/// # Errors
///
/// Returns [`SyntaxError`] for the first lexical or grammatical problem.
///
/// ```rust
/// use kiln::ast::{Item, Node};
/// use kiln::parser::parse;
///
/// let program = parse(r#"cc_binary(name = "app")"#).expect("parse");
/// assert!(matches!(
///     program.items.as_slice(),
///     [Item::Expr(Node::RuleCall { .. })]
/// ));
/// ```
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = lexer::tokenize(source)?;
    Ok(Parser::new(tokens).parse_program()?)
}
