//! Placeholder substitution for target command templates.
//!
//! Templates use `@IN@`, `@OBJ@`, `@OUT@` and `@ARGS@`. Values are inserted
//! verbatim; the toolchain flags and paths they carry are already
//! shell-ready.

use thiserror::Error;

/// A rendered command that the shell would not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rendered command is not valid shell: {snippet}")]
pub struct TemplateError {
    /// The full rendered command.
    pub command: String,
    /// First 160 characters, for messages.
    pub snippet: String,
}

fn has_unmatched_backticks(s: &str) -> bool {
    s.chars().filter(|&c| c == '`').count().rem_euclid(2) != 0
}

fn validate(command: String) -> Result<String, TemplateError> {
    if has_unmatched_backticks(&command) || shlex::split(&command).is_none() {
        let snippet = command.chars().take(160).collect();
        return Err(TemplateError { command, snippet });
    }
    Ok(command)
}

/// Render a per-source compile command.
pub(crate) fn compile(
    template: &str,
    input: &str,
    object: &str,
    args: &str,
) -> Result<String, TemplateError> {
    validate(
        template
            .replace("@IN@", input)
            .replace("@OBJ@", object)
            .replace("@ARGS@", args),
    )
}

/// Render a link or archive command.
pub(crate) fn link(
    template: &str,
    objects: &[String],
    output: &str,
    args: &str,
) -> Result<String, TemplateError> {
    validate(
        template
            .replace("@OBJ@", &objects.join(" "))
            .replace("@OUT@", output)
            .replace("@ARGS@", args),
    )
}
