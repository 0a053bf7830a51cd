//! Error types for the builder.

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use super::executor::BuildReport;
use super::template::TemplateError;
use crate::diagnostics::DeclarationError;
use crate::graph::GraphError;

/// A shell command that did not succeed.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The shell could not be started.
    #[error("failed to spawn `{command}`")]
    Spawn {
        /// Command line handed to the shell.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The command ran and reported failure.
    #[error("`{command}` exited with {status}")]
    Status {
        /// Command line handed to the shell.
        command: String,
        /// Exit status description.
        status: String,
    },
}

/// Errors raised while building.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    /// Walking the repository for declaration files failed.
    #[error("failed to scan {root} for BUILD files")]
    #[diagnostic(code(kiln::build::discovery))]
    Discovery {
        /// Repository root.
        root: Utf8PathBuf,
        /// Walk failure.
        #[source]
        source: walkdir::Error,
    },
    /// A declaration file failed to load.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Declaration(#[from] Box<DeclarationError>),
    /// The requested target was never declared.
    #[error("unknown target: {name}")]
    #[diagnostic(
        code(kiln::build::unknown_target),
        help("targets are named @/<directory>/<name>")
    )]
    UnknownTarget {
        /// Requested name.
        name: String,
    },
    /// The dependency graph rejected an edge or could not be ordered.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
    /// An output directory could not be created.
    #[error("failed to create directory {path}")]
    #[diagnostic(code(kiln::build::io))]
    Io {
        /// Directory relative to the repository root.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A target's command template rendered to invalid shell.
    #[error("target {target} has an invalid command")]
    #[diagnostic(code(kiln::build::invalid_command))]
    InvalidCommand {
        /// Target being built.
        target: String,
        /// Rendering failure.
        #[source]
        source: TemplateError,
    },
    /// A command failed and the build stopped.
    #[error("failed to build {target}")]
    #[diagnostic(code(kiln::build::command_failed))]
    CommandFailed {
        /// Target whose command failed.
        target: String,
        /// The failing command.
        #[source]
        source: CommandError,
        /// What was built, failed and skipped.
        report: Box<BuildReport>,
    },
    /// One or more targets failed while continuing past failures.
    #[error("{} target(s) failed: {}", failed.len(), failed.join(", "))]
    #[diagnostic(code(kiln::build::failed))]
    BuildFailed {
        /// Targets that failed.
        failed: Vec<String>,
        /// What was built, failed and skipped.
        report: Box<BuildReport>,
    },
}

impl BuildError {
    /// The execution report for failures that happened mid-build.
    #[must_use]
    pub fn report(&self) -> Option<&BuildReport> {
        match self {
            Self::CommandFailed { report, .. } | Self::BuildFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}

impl From<DeclarationError> for BuildError {
    fn from(err: DeclarationError) -> Self {
        Self::Declaration(Box::new(err))
    }
}
