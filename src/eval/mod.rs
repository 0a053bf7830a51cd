//! Rule evaluation.
//!
//! [`Evaluator`] walks parsed nodes against an [`EvaluationContext`], which
//! owns every piece of state an evaluation pass touches: variable bindings,
//! the rule registry, the registry of resolved targets, the directory of the
//! declaration file being evaluated, the build mode, and the toolchain.
//!
//! Evaluating a rule call that yields a target registers it in the context.
//! That registration is how declaration files make targets known to the
//! builder.

mod glob;
mod pkg_config;
mod rules;

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

pub use pkg_config::{PackageConfigError, PackageFlags, PackageResolver, PkgConfig};
pub use rules::{CcBinary, CcLibrary, Glob, Rule, SystemCcLibrary};

use crate::ast::{BuildMode, Item, Node, Program, ResolvedTarget};
use crate::toolchain::Toolchain;

/// Result of evaluating a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A string.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A target produced by a rule.
    Target(Box<ResolvedTarget>),
}

impl Value {
    fn contains_target(&self) -> bool {
        match self {
            Self::String(_) => false,
            Self::List(items) => items.iter().any(Self::contains_target),
            Self::Target(_) => true,
        }
    }
}

/// An evaluated rule argument.
///
/// Lists are always flat: nested lists are spliced in place and targets are
/// replaced by their fully-qualified names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// A single string.
    Scalar(String),
    /// A flat list of strings.
    List(Vec<String>),
}

impl ArgValue {
    fn scalar(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Target(target) => Some(target.name),
            Value::List(_) => None,
        }
    }

    fn flatten_into(items: Vec<Value>, out: &mut Vec<String>) {
        for item in items {
            match item {
                Value::List(nested) => Self::flatten_into(nested, out),
                other => out.extend(Self::scalar(other)),
            }
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::List(items) => {
                let mut flat = Vec::with_capacity(items.len());
                Self::flatten_into(items, &mut flat);
                Self::List(flat)
            }
            Value::String(s) => Self::Scalar(s),
            Value::Target(target) => Self::Scalar(target.name),
        }
    }
}

/// Evaluated keyword arguments handed to a [`Rule`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuleArgs {
    values: IndexMap<String, ArgValue>,
    target_valued: IndexSet<String>,
}

impl RuleArgs {
    /// An empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.contains_target() {
            self.target_valued.insert(key.clone());
        } else {
            self.target_valued.shift_remove(&key);
        }
        self.values.insert(key, value.into());
    }

    /// Raw access to an argument.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    /// A required, non-empty string argument.
    ///
    /// # Errors
    ///
    /// [`EvalError::MissingArgument`] when absent or empty,
    /// [`EvalError::InvalidArgument`] when given a list.
    pub fn required_str(&self, rule: &str, key: &str) -> Result<&str, EvalError> {
        match self.values.get(key) {
            Some(ArgValue::Scalar(value)) if !value.is_empty() => Ok(value),
            Some(ArgValue::List(_)) => Err(EvalError::InvalidArgument {
                rule: rule.to_owned(),
                arg: key.to_owned(),
                expected: "a string",
            }),
            Some(ArgValue::Scalar(_)) | None => Err(EvalError::MissingArgument {
                rule: rule.to_owned(),
                arg: key.to_owned(),
            }),
        }
    }

    /// An optional list argument; absent means empty and a single string
    /// counts as a one-element list.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(ArgValue::List(items)) => items.clone(),
            Some(ArgValue::Scalar(value)) => vec![value.clone()],
            None => Vec::new(),
        }
    }

    /// Like [`RuleArgs::list`], for arguments naming files rather than
    /// targets.
    ///
    /// # Errors
    ///
    /// [`EvalError::InvalidArgument`] when the value held a target.
    pub fn paths(&self, rule: &str, key: &str) -> Result<Vec<String>, EvalError> {
        if self.target_valued.contains(key) {
            return Err(EvalError::InvalidArgument {
                rule: rule.to_owned(),
                arg: key.to_owned(),
                expected: "file paths, not targets",
            });
        }
        Ok(self.list(key))
    }
}

/// What a rule produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutput {
    /// A list of paths, as returned by `glob`.
    Paths(Vec<String>),
    /// A target to register.
    Target(ResolvedTarget),
}

/// Read-only view of the context handed to rules.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Absolute repository root.
    pub repo_root: &'a Utf8Path,
    /// Directory of the declaration file, relative to the root.
    pub current_dir: &'a str,
    /// Build mode of this run.
    pub mode: BuildMode,
    /// Toolchain used to render command templates.
    pub toolchain: &'a Toolchain,
}

/// Errors raised while evaluating declarations.
#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    /// A variable reference with no binding.
    #[error("undefined variable: {name}")]
    #[diagnostic(code(kiln::eval::undefined_variable))]
    UndefinedVariable {
        /// Variable name.
        name: String,
    },
    /// A variable whose binding refers back to itself.
    #[error("variable {name} is defined in terms of itself")]
    #[diagnostic(code(kiln::eval::recursive_variable))]
    RecursiveVariable {
        /// Variable name.
        name: String,
    },
    /// A call to a rule that is not registered.
    #[error("undefined rule: {name}")]
    #[diagnostic(
        code(kiln::eval::undefined_rule),
        help("built-in rules are glob, cc_binary, cc_library and system_cc_library")
    )]
    UndefinedRule {
        /// Rule name.
        name: String,
    },
    /// A required argument is absent or empty.
    #[error("{rule}() requires a {arg}")]
    #[diagnostic(code(kiln::eval::missing_argument))]
    MissingArgument {
        /// Rule being called.
        rule: String,
        /// Missing argument.
        arg: String,
    },
    /// An argument has the wrong shape.
    #[error("{rule}() expects {expected} for {arg}")]
    #[diagnostic(code(kiln::eval::invalid_argument))]
    InvalidArgument {
        /// Rule being called.
        rule: String,
        /// Offending argument.
        arg: String,
        /// Description of the accepted shape.
        expected: &'static str,
    },
    /// A glob pattern that does not compile.
    #[error("invalid glob pattern '{pattern}': {detail}")]
    #[diagnostic(code(kiln::eval::invalid_glob))]
    InvalidGlob {
        /// Pattern as written.
        pattern: String,
        /// Reason reported by the matcher.
        detail: String,
    },
    /// The filesystem failed while expanding a glob.
    #[error("glob failed for '{pattern}': {detail}")]
    #[diagnostic(code(kiln::eval::glob_io))]
    GlobIo {
        /// Pattern as written.
        pattern: String,
        /// Underlying error text.
        detail: String,
    },
    /// The package-config resolver could not supply flags.
    #[error("cannot resolve system package '{package}'")]
    #[diagnostic(code(kiln::eval::package_config))]
    PackageConfig {
        /// Package requested by `system_cc_library`.
        package: String,
        /// Resolver failure.
        #[source]
        source: PackageConfigError,
    },
}

/// Mutable state shared by every evaluation in a run.
pub struct EvaluationContext {
    variables: IndexMap<String, Node>,
    rules: IndexMap<String, Box<dyn Rule>>,
    targets: IndexMap<String, ResolvedTarget>,
    repo_root: Utf8PathBuf,
    current_dir: String,
    mode: BuildMode,
    toolchain: Toolchain,
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("repo_root", &self.repo_root)
            .field("current_dir", &self.current_dir)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl EvaluationContext {
    /// A context with the built-in rules, resolving system packages through
    /// the toolchain's `pkg-config`.
    #[must_use]
    pub fn new(repo_root: impl Into<Utf8PathBuf>, mode: BuildMode, toolchain: Toolchain) -> Self {
        let resolver = PkgConfig::new(toolchain.pkg_config.clone());
        Self::with_package_resolver(repo_root, mode, toolchain, resolver)
    }

    /// A context with the built-in rules and a custom package resolver.
    #[must_use]
    pub fn with_package_resolver(
        repo_root: impl Into<Utf8PathBuf>,
        mode: BuildMode,
        toolchain: Toolchain,
        resolver: impl PackageResolver + 'static,
    ) -> Self {
        let mut ctx = Self::without_rules(repo_root, mode, toolchain);
        ctx.register_rule("glob", Glob);
        ctx.register_rule("cc_binary", CcBinary);
        ctx.register_rule("cc_library", CcLibrary);
        ctx.register_rule("system_cc_library", SystemCcLibrary::new(resolver));
        ctx
    }

    /// A context with an empty rule registry.
    #[must_use]
    pub fn without_rules(
        repo_root: impl Into<Utf8PathBuf>,
        mode: BuildMode,
        toolchain: Toolchain,
    ) -> Self {
        Self {
            variables: IndexMap::new(),
            rules: IndexMap::new(),
            targets: IndexMap::new(),
            repo_root: repo_root.into(),
            current_dir: String::new(),
            mode,
            toolchain,
        }
    }

    /// Register `rule` under `name`, replacing any rule of that name.
    pub fn register_rule(&mut self, name: impl Into<String>, rule: impl Rule + 'static) {
        self.rules.insert(name.into(), Box::new(rule));
    }

    /// Bind `name` to an unevaluated node.
    pub fn define_variable(&mut self, name: impl Into<String>, value: Node) {
        self.variables.insert(name.into(), value);
    }

    /// Record `target` under its fully-qualified name.
    ///
    /// A target with the same name is replaced and returned.
    pub fn register_target(&mut self, target: ResolvedTarget) -> Option<ResolvedTarget> {
        self.targets.insert(target.name.clone(), target)
    }

    /// Every registered target, in registration order.
    #[must_use]
    pub const fn targets(&self) -> &IndexMap<String, ResolvedTarget> {
        &self.targets
    }

    /// Look up a target by fully-qualified name.
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&ResolvedTarget> {
        self.targets.get(name)
    }

    /// Set the directory, relative to the root, of the file being evaluated.
    pub fn set_current_dir(&mut self, dir: impl Into<String>) {
        self.current_dir = dir.into();
    }

    /// Directory of the file being evaluated.
    #[must_use]
    pub fn current_dir(&self) -> &str {
        &self.current_dir
    }

    /// Absolute repository root.
    #[must_use]
    pub fn repo_root(&self) -> &Utf8Path {
        &self.repo_root
    }

    /// Build mode of this run.
    #[must_use]
    pub const fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Toolchain of this run.
    #[must_use]
    pub const fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    fn rule_context(&self) -> RuleContext<'_> {
        RuleContext {
            repo_root: &self.repo_root,
            current_dir: &self.current_dir,
            mode: self.mode,
            toolchain: &self.toolchain,
        }
    }
}

/// Walks nodes against an [`EvaluationContext`].
#[derive(Debug)]
pub struct Evaluator<'ctx> {
    ctx: &'ctx mut EvaluationContext,
    resolving: Vec<String>,
}

impl<'ctx> Evaluator<'ctx> {
    /// Evaluate against `ctx`.
    #[must_use]
    pub const fn new(ctx: &'ctx mut EvaluationContext) -> Self {
        Self {
            ctx,
            resolving: Vec::new(),
        }
    }

    /// Evaluate a single node.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] for undefined names, rule argument problems,
    /// and failures inside rules.
    pub fn evaluate(&mut self, node: &Node) -> Result<Value, EvalError> {
        match node {
            Node::String(value) => Ok(Value::String(value.clone())),
            Node::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Node::Variable(name) => self.evaluate_variable(name),
            Node::RuleCall { name, args } => self.evaluate_rule_call(name, args),
            Node::Target(target) => Ok(Value::Target(target.clone())),
        }
    }

    fn evaluate_variable(&mut self, name: &str) -> Result<Value, EvalError> {
        let bound = self
            .ctx
            .variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable {
                name: name.to_owned(),
            })?;
        if self.resolving.iter().any(|n| n == name) {
            return Err(EvalError::RecursiveVariable {
                name: name.to_owned(),
            });
        }
        self.resolving.push(name.to_owned());
        let result = self.evaluate(&bound);
        self.resolving.pop();
        result
    }

    fn evaluate_rule_call(
        &mut self,
        name: &str,
        args: &IndexMap<String, Node>,
    ) -> Result<Value, EvalError> {
        if !self.ctx.rules.contains_key(name) {
            return Err(EvalError::UndefinedRule {
                name: name.to_owned(),
            });
        }

        let mut evaluated = RuleArgs::new();
        for (key, expr) in args {
            let value = self.evaluate(expr)?;
            evaluated.insert(key.clone(), value);
        }

        let rule = self
            .ctx
            .rules
            .get(name)
            .ok_or_else(|| EvalError::UndefinedRule {
                name: name.to_owned(),
            })?;
        let output = rule.call(&evaluated, &self.ctx.rule_context())?;

        match output {
            RuleOutput::Paths(paths) => Ok(Value::List(
                paths.into_iter().map(Value::String).collect(),
            )),
            RuleOutput::Target(target) => {
                debug!(target = %target.name, rule = name, "registered target");
                self.ctx.register_target(target.clone());
                Ok(Value::Target(Box::new(target)))
            }
        }
    }

    /// Evaluate a top-level item. Bindings produce no value.
    ///
    /// # Errors
    ///
    /// Propagates [`EvalError`] from expression evaluation.
    pub fn evaluate_item(&mut self, item: &Item) -> Result<Option<Value>, EvalError> {
        match item {
            Item::Expr(node) => self.evaluate(node).map(Some),
            Item::Binding { name, value } => {
                self.ctx.define_variable(name.clone(), value.clone());
                Ok(None)
            }
        }
    }

    /// Evaluate every item of `program` in order.
    ///
    /// Returns the targets produced directly by top-level expressions; all
    /// targets, including those produced by nested calls, are registered in
    /// the context either way.
    ///
    /// # Errors
    ///
    /// Stops at the first [`EvalError`].
    pub fn evaluate_program(
        &mut self,
        program: &Program,
    ) -> Result<Vec<ResolvedTarget>, EvalError> {
        let mut produced = Vec::new();
        for item in &program.items {
            if let Some(Value::Target(target)) = self.evaluate_item(item)? {
                produced.push(*target);
            }
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests;
