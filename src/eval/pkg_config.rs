//! System package flag lookup for `system_cc_library`.

use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Compiler and linker flags for a system package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFlags {
    /// Output of `--cflags`, split into words.
    pub cflags: Vec<String>,
    /// Output of `--libs`, split into words.
    pub libs: Vec<String>,
}

/// Failure to resolve a package's flags.
#[derive(Debug, Error)]
pub enum PackageConfigError {
    /// The resolver program could not be started.
    #[error("failed to run {program}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The resolver ran but reported failure.
    #[error("{program} {flag} exited with {status}: {stderr}")]
    Failed {
        /// Program that was invoked.
        program: String,
        /// Query flag, `--cflags` or `--libs`.
        flag: &'static str,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },
    /// The resolver printed something that cannot be split into words.
    #[error("{program} {flag} printed unparseable output: {output}")]
    Unparseable {
        /// Program that was invoked.
        program: String,
        /// Query flag.
        flag: &'static str,
        /// Raw output.
        output: String,
    },
}

/// Source of compiler and linker flags for system packages.
pub trait PackageResolver {
    /// Flags for `package`.
    ///
    /// # Errors
    ///
    /// Returns [`PackageConfigError`] when the package cannot be resolved.
    fn resolve(&self, package: &str) -> Result<PackageFlags, PackageConfigError>;
}

/// Resolver backed by a `pkg-config` compatible program.
#[derive(Debug, Clone)]
pub struct PkgConfig {
    program: String,
}

impl PkgConfig {
    /// Resolve packages with `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn query(&self, flag: &'static str, package: &str) -> Result<Vec<String>, PackageConfigError> {
        debug!(program = %self.program, flag, package, "querying package flags");
        let output = Command::new(&self.program)
            .arg(flag)
            .arg(package)
            .output()
            .map_err(|source| PackageConfigError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(PackageConfigError::Failed {
                program: self.program.clone(),
                flag,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        shlex::split(stdout.trim()).ok_or_else(|| PackageConfigError::Unparseable {
            program: self.program.clone(),
            flag,
            output: stdout.into_owned(),
        })
    }
}

impl PackageResolver for PkgConfig {
    fn resolve(&self, package: &str) -> Result<PackageFlags, PackageConfigError> {
        Ok(PackageFlags {
            cflags: self.query("--cflags", package)?,
            libs: self.query("--libs", package)?,
        })
    }
}
