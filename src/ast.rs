//! Declaration-file abstract syntax tree.
//!
//! Parsing yields [`Node`] values of four kinds: string, list, variable
//! reference, and rule call. The fifth kind, [`Node::Target`], holds a
//! [`ResolvedTarget`] and only appears once evaluation has run a rule.
//!
//! ```rust
//! use indexmap::IndexMap;
//! use kiln::ast::Node;
//!
//! let mut args = IndexMap::new();
//! args.insert("name".to_owned(), Node::string("app"));
//! let call = Node::RuleCall { name: "cc_binary".into(), args };
//! assert!(matches!(call, Node::RuleCall { .. }));
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single expression in a declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A string literal.
    String(String),
    /// An ordered list of expressions.
    List(Vec<Node>),
    /// A reference to a bound variable.
    Variable(String),
    /// An invocation of a named rule with keyword arguments.
    ///
    /// Argument order follows the source text.
    RuleCall {
        /// Rule name.
        name: String,
        /// Keyword arguments keyed by name.
        args: IndexMap<String, Node>,
    },
    /// A target produced by evaluating a rule.
    Target(Box<ResolvedTarget>),
}

impl Node {
    /// Convenience constructor for a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Convenience constructor for a list of string literals.
    #[must_use]
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(Self::string).collect())
    }
}

/// A top-level entry in a declaration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// An expression evaluated for its side effects.
    Expr(Node),
    /// `name = expr`: binds `name` to the unevaluated expression.
    Binding {
        /// Variable name.
        name: String,
        /// Bound expression, evaluated afresh on every reference.
        value: Node,
    },
}

/// Parsed contents of one declaration file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// Items in source order.
    pub items: Vec<Item>,
}

/// Compilation profile selected for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildMode {
    /// Debug symbols, light optimisation, `DEBUG` defined.
    #[default]
    Debug,
    /// Optimised build.
    Release,
}

impl BuildMode {
    /// Compiler flags appended to every compile and link command.
    #[must_use]
    pub const fn flags(self) -> &'static str {
        match self {
            Self::Debug => "-g -O1 -DDEBUG",
            Self::Release => "-O2",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => f.write_str("debug"),
            Self::Release => f.write_str("release"),
        }
    }
}

/// A fully evaluated build target.
///
/// `include_flags` and `link_flags` are not used when building the target
/// itself; they are handed to targets that list this one in `deps`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolvedTarget {
    /// Fully-qualified name, `@/<dir>/<short-name>`.
    pub name: String,
    /// Input files, relative to the repository root.
    pub sources: Vec<String>,
    /// Object files, index-aligned with `sources`.
    pub objects: Vec<String>,
    /// Final artefact path. Empty for virtual targets.
    pub output: String,
    /// Compiler flags contributed to dependents.
    pub include_flags: Vec<String>,
    /// Linker flags contributed to dependents.
    pub link_flags: Vec<String>,
    /// Per-source compile template using `@IN@`, `@OBJ@`, and `@ARGS@`.
    pub build_command: String,
    /// Link template using `@OBJ@`, `@OUT@`, and `@ARGS@`.
    pub link_command: String,
    /// Fully-qualified names of targets this one depends on.
    pub deps: Vec<String>,
}

impl ResolvedTarget {
    /// Whether the target only propagates flags and has nothing to build.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.build_command.is_empty() && self.link_command.is_empty() && self.objects.is_empty()
    }
}

/// Compute the fully-qualified name of `short` declared in `dir`.
///
/// Targets declared at the repository root keep the empty directory
/// segment, giving `@//<short>`.
///
/// ```rust
/// use kiln::ast::qualified_name;
/// assert_eq!(qualified_name("src/net", "http"), "@/src/net/http");
/// assert_eq!(qualified_name("", "app"), "@//app");
/// ```
#[must_use]
pub fn qualified_name(dir: &str, short: &str) -> String {
    format!("@/{}/{short}", dir.trim_matches('/'))
}
