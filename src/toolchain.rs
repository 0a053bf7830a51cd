//! External toolchain configuration.
//!
//! kiln never compiles anything itself. It renders command lines for a C++
//! compiler driver and an archiver, asks a package-config resolver for
//! system library flags, and hands each command to a shell. This module
//! names those programs and the flags every compile and link starts with.
//!
//! Each program name can be overridden through an environment variable
//! declared in the [`toolchain_env`] crate.

use serde::{Deserialize, Serialize};
use toolchain_env::{AR_ENV, CXX_ENV, PKG_CONFIG_ENV};

/// Default compiler driver.
pub const CXX_PROGRAM: &str = "c++";
/// Default static archiver.
pub const AR_PROGRAM: &str = "ar";
/// Default package-config resolver.
pub const PKG_CONFIG_PROGRAM: &str = "pkg-config";
/// Shell used to run rendered commands.
pub const SHELL_PROGRAM: &str = "sh";

/// Flags that start every `@ARGS@` expansion.
pub const BASELINE_FLAGS: [&str; 5] = [
    "-std=c++20",
    "-Wall",
    "-Wextra",
    "-Wno-unused-command-line-argument",
    "-L./build/lib",
];

/// Programs and flags used to build targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toolchain {
    /// Compiler driver used for compiling and linking binaries.
    pub cxx: String,
    /// Archiver used to create static libraries.
    pub ar: String,
    /// Package-config resolver used by `system_cc_library`.
    pub pkg_config: String,
    /// Shell that runs each rendered command via `-c`.
    pub shell: String,
    /// Flags prepended to every `@ARGS@` expansion.
    pub baseline_flags: Vec<String>,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            cxx: CXX_PROGRAM.to_owned(),
            ar: AR_PROGRAM.to_owned(),
            pkg_config: PKG_CONFIG_PROGRAM.to_owned(),
            shell: SHELL_PROGRAM.to_owned(),
            baseline_flags: BASELINE_FLAGS.iter().map(|f| (*f).to_owned()).collect(),
        }
    }
}

impl Toolchain {
    /// Defaults with overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides supplied by `lookup`.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not
    /// produce an unusable command line.
    ///
    /// ```rust
    /// use kiln::toolchain::Toolchain;
    ///
    /// let toolchain = Toolchain::from_lookup(|key| {
    ///     (key == "KILN_CXX").then(|| "clang++".to_owned())
    /// });
    /// assert_eq!(toolchain.cxx, "clang++");
    /// assert_eq!(toolchain.ar, "ar");
    /// ```
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |key: &str, fallback: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| fallback.to_owned())
        };
        Self {
            cxx: pick(CXX_ENV, CXX_PROGRAM),
            ar: pick(AR_ENV, AR_PROGRAM),
            pkg_config: pick(PKG_CONFIG_ENV, PKG_CONFIG_PROGRAM),
            ..Self::default()
        }
    }
}
