#![forbid(unsafe_code)]

//! Environment variable names shared by the kiln library, its tests, and
//! the test helpers.
//!
//! Each variable overrides the program used for one external tool. The
//! value is taken verbatim as the program name or path.

/// Environment variable override for the C++ compiler driver.
///
/// # Examples
///
/// ```
/// use toolchain_env::CXX_ENV;
/// assert_eq!(CXX_ENV, "KILN_CXX");
/// ```
pub const CXX_ENV: &str = "KILN_CXX";

/// Environment variable override for the static archiver.
pub const AR_ENV: &str = "KILN_AR";

/// Environment variable override for the package-config resolver.
pub const PKG_CONFIG_ENV: &str = "KILN_PKG_CONFIG";
