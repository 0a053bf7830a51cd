//! Source-aware reports for declaration-file failures.
//!
//! A [`DeclarationError`] carries the file path and its text so `miette`
//! can print the offending line with a label under the failing token.

use camino::{Utf8Path, Utf8PathBuf};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::eval::EvalError;
use crate::parser::SyntaxError;

/// Why a declaration file could not be loaded.
#[derive(Debug, Error, Diagnostic)]
pub enum DeclarationFailure {
    /// The file could not be read.
    #[error("cannot read declaration file")]
    #[diagnostic(code(kiln::declaration::read))]
    Read(#[from] std::io::Error),
    /// The file is not valid DSL.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),
    /// Evaluating the file failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

/// A failure inside one `BUILD` file.
#[derive(Debug, Error, Diagnostic)]
#[error("error in {path}")]
#[diagnostic(code(kiln::declaration))]
pub struct DeclarationError {
    /// Path of the declaration file.
    pub path: Utf8PathBuf,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: Option<SourceSpan>,
    /// Underlying failure.
    #[source]
    #[diagnostic_source]
    pub source: DeclarationFailure,
}

impl DeclarationError {
    /// Attach `path` and `text` to `source`.
    ///
    /// Syntax errors get a one-character span at their position.
    #[must_use]
    pub fn new(path: &Utf8Path, text: &str, source: DeclarationFailure) -> Self {
        let span = match &source {
            DeclarationFailure::Syntax(err) => Some(point_span(text, err.position().offset)),
            _ => None,
        };
        Self {
            path: path.to_path_buf(),
            src: NamedSource::new(path.as_str(), text.to_owned()),
            span,
            source,
        }
    }

    /// Label span within the source text, if any.
    #[must_use]
    pub const fn span(&self) -> Option<SourceSpan> {
        self.span
    }
}

fn point_span(text: &str, offset: usize) -> SourceSpan {
    let at = offset.min(text.len());
    let len = text
        .get(at..)
        .and_then(|rest| rest.chars().next())
        .map_or(0, char::len_utf8);
    SourceSpan::new(at.into(), len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn syntax_errors_point_at_the_token() {
        let text = "cc_binary(\n  name = 7)";
        let err = parse(text).expect_err("invalid");
        let diag = DeclarationError::new(Utf8Path::new("app/BUILD"), text, err.into());
        let span = diag.span().expect("span");
        assert_eq!(span.offset(), 20);
        assert_eq!(span.len(), 1);
        assert_eq!(diag.to_string(), "error in app/BUILD");
        assert_eq!(
            diag.source.to_string(),
            "invalid character '7' at line 2, column 10"
        );
    }

    #[test]
    fn end_of_input_gets_an_empty_span() {
        let text = "glob(pattern = \"x\"";
        let err = parse(text).expect_err("invalid");
        let diag = DeclarationError::new(Utf8Path::new("BUILD"), text, err.into());
        let span = diag.span().expect("span");
        assert_eq!(span.offset(), text.len());
        assert_eq!(span.len(), 0);
    }

    #[test]
    fn evaluation_errors_have_no_span() {
        let failure = DeclarationFailure::Eval(EvalError::UndefinedRule {
            name: "cc_test".into(),
        });
        let diag = DeclarationError::new(Utf8Path::new("BUILD"), "cc_test()", failure);
        assert!(diag.span().is_none());
    }
}
