//! Tokeniser for `BUILD` declaration files.
//!
//! The lexer makes a single eager pass over the source text and produces
//! the complete token sequence, terminated by an explicit
//! [`TokenKind::Eof`] token. It does not recover from errors: the first
//! character it cannot classify aborts the scan.
//!
//! ```rust
//! use kiln::lexer::{tokenize, TokenKind};
//!
//! let tokens = tokenize(r#"cc_binary(name = "app")"#).expect("lex");
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::Identifier,
//!         TokenKind::LParen,
//!         TokenKind::Identifier,
//!         TokenKind::Equals,
//!         TokenKind::String,
//!         TokenKind::RParen,
//!         TokenKind::Eof,
//!     ]
//! );
//! ```

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use miette::Diagnostic;
use thiserror::Error;

/// Location of a character in the source text.
///
/// `line` and `column` are 1-based and count characters; `offset` is the
/// byte offset used to build source spans for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line number, starting at 1.
    pub line: usize,
    /// Column number within the line, starting at 1.
    pub column: usize,
    /// Byte offset from the start of the source.
    pub offset: usize,
}

impl Position {
    /// Construct a position from its parts.
    #[must_use]
    pub const fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Classification of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Bare name: a variable, a rule name, or an argument name.
    Identifier,
    /// Double-quoted string literal with escapes already resolved.
    String,
    /// `=`
    Equals,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Identifier => "identifier",
            Self::String => "string",
            Self::Equals => "'='",
            Self::Comma => "','",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A lexical token with its source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What kind of token this is.
    pub kind: TokenKind,
    /// Literal text. For strings this is the unescaped value without quotes.
    pub text: String,
    /// Position of the token's first character.
    pub position: Position,
}

impl Token {
    /// Construct a token.
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }
}

/// Errors raised while tokenising a declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum LexError {
    /// A character that cannot start any token.
    #[error("invalid character {ch:?} at {position}")]
    #[diagnostic(code(kiln::lex::invalid_character))]
    InvalidCharacter {
        /// The offending character.
        ch: char,
        /// Where it appeared.
        position: Position,
    },
    /// A string literal that reaches end of input before its closing quote.
    #[error("unterminated string literal starting at {position}")]
    #[diagnostic(
        code(kiln::lex::unterminated_string),
        help("close the string with a matching '\"'")
    )]
    UnterminatedString {
        /// Position of the opening quote.
        position: Position,
    },
}

impl LexError {
    /// Source position the error refers to.
    #[must_use]
    pub const fn position(&self) -> Position {
        match self {
            Self::InvalidCharacter { position, .. } | Self::UnterminatedString { position } => {
                *position
            }
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || matches!(ch, '_' | '@' | '/')
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | ':' | '@' | '/' | '.' | '-')
}

/// Character-level scanner over a declaration file.
#[derive(Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Prepare a lexer over `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Scan the whole input.
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] on the first invalid character or unterminated
    /// string literal.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn position(&mut self) -> Position {
        let offset = self
            .chars
            .peek()
            .map_or(self.source.len(), |(idx, _)| *idx);
        Position::new(self.line, self.column, offset)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.position();
        let Some(ch) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", start));
        };

        if is_identifier_start(ch) {
            return Ok(self.identifier(start));
        }
        if ch == '"' {
            return self.string(start);
        }

        let kind = match ch {
            '=' => TokenKind::Equals,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            _ => {
                return Err(LexError::InvalidCharacter {
                    ch,
                    position: start,
                });
            }
        };
        self.bump();
        Ok(Token::new(kind, ch.to_string(), start))
    }

    fn identifier(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.peek().filter(|c| is_identifier_continue(*c)) {
            text.push(ch);
            self.bump();
        }
        Token::new(TokenKind::Identifier, text, start)
    }

    fn string(&mut self, start: Position) -> Result<Token, LexError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString { position: start }),
                Some('"') => return Ok(Token::new(TokenKind::String, value, start)),
                Some('\\') => match self.bump() {
                    None => return Err(LexError::UnterminatedString { position: start }),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                },
                Some(other) => value.push(other),
            }
        }
    }
}

/// Tokenise `source` in one call.
///
/// # Errors
///
/// Returns [`LexError`] when the input contains an invalid character or an
/// unterminated string.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn summary(source: &str) -> Vec<(TokenKind, String, usize, usize)> {
        tokenize(source)
            .expect("lex")
            .into_iter()
            .map(|t| (t.kind, t.text, t.position.line, t.position.column))
            .collect()
    }

    #[test]
    fn rule_call_with_string_and_list_arguments() {
        let source = "cc_library(\n  name = \"core\",\n  sources = [\"a.cc\", \"b.cc\"]\n)";
        let expected = vec![
            (TokenKind::Identifier, "cc_library".to_owned(), 1, 1),
            (TokenKind::LParen, "(".to_owned(), 1, 11),
            (TokenKind::Identifier, "name".to_owned(), 2, 3),
            (TokenKind::Equals, "=".to_owned(), 2, 8),
            (TokenKind::String, "core".to_owned(), 2, 10),
            (TokenKind::Comma, ",".to_owned(), 2, 16),
            (TokenKind::Identifier, "sources".to_owned(), 3, 3),
            (TokenKind::Equals, "=".to_owned(), 3, 11),
            (TokenKind::LBracket, "[".to_owned(), 3, 13),
            (TokenKind::String, "a.cc".to_owned(), 3, 14),
            (TokenKind::Comma, ",".to_owned(), 3, 20),
            (TokenKind::String, "b.cc".to_owned(), 3, 22),
            (TokenKind::RBracket, "]".to_owned(), 3, 28),
            (TokenKind::RParen, ")".to_owned(), 4, 1),
            (TokenKind::Eof, String::new(), 4, 2),
        ];
        assert_eq!(summary(source), expected);
    }

    #[rstest]
    #[case("@//lib:core", "@//lib:core")]
    #[case("_private", "_private")]
    #[case("/abs/path.cc", "/abs/path.cc")]
    #[case("name-with-dash.v2", "name-with-dash.v2")]
    fn identifiers_accept_path_characters(#[case] source: &str, #[case] expected: &str) {
        let tokens = tokenize(source).expect("lex");
        let first = tokens.first().expect("token");
        assert_eq!(first.kind, TokenKind::Identifier);
        assert_eq!(first.text, expected);
    }

    #[rstest]
    #[case(r#""a\nb""#, "a\nb")]
    #[case(r#""a\tb""#, "a\tb")]
    #[case(r#""say \"hi\"""#, "say \"hi\"")]
    #[case(r#""back\\slash""#, "back\\slash")]
    #[case(r#""\q""#, "q")]
    fn string_escapes(#[case] source: &str, #[case] expected: &str) {
        let tokens = tokenize(source).expect("lex");
        let first = tokens.first().expect("token");
        assert_eq!(first.kind, TokenKind::String);
        assert_eq!(first.text, expected);
    }

    #[test]
    fn empty_input_yields_only_eof() {
        let tokens = tokenize("  \n\t ").expect("lex");
        assert_eq!(tokens.len(), 1);
        let eof = tokens.first().expect("eof");
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.position, Position::new(2, 3, 5));
    }

    #[test]
    fn invalid_character_reports_position() {
        let err = tokenize("glob(\n  pattern = *.cc)").expect_err("should fail");
        assert_eq!(
            err,
            LexError::InvalidCharacter {
                ch: '*',
                position: Position::new(2, 13, 18),
            }
        );
        assert_eq!(err.to_string(), "invalid character '*' at line 2, column 13");
    }

    #[test]
    fn digits_cannot_start_a_token() {
        let err = tokenize("x = 1").expect_err("should fail");
        assert!(matches!(err, LexError::InvalidCharacter { ch: '1', .. }));
    }

    #[test]
    fn unterminated_string_cites_opening_quote() {
        let err = tokenize("name = \"oops").expect_err("should fail");
        assert_eq!(
            err,
            LexError::UnterminatedString {
                position: Position::new(1, 8, 7),
            }
        );
    }
}
