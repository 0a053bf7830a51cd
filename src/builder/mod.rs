//! Repository-level build orchestration.
//!
//! A [`Builder`] owns one evaluation context for the repository. It finds
//! every `BUILD` file, evaluates them into the context, assembles the
//! dependency graph, and hands an ordered subset of targets to the
//! [`Executor`].
//!
//! ```rust,no_run
//! use kiln::ast::BuildMode;
//! use kiln::builder::Builder;
//! use kiln::toolchain::Toolchain;
//!
//! let mut builder = Builder::new("/path/to/repo", BuildMode::Debug, Toolchain::from_env());
//! let report = builder.build_target("@/app/server")?;
//! assert!(report.is_success());
//! # Ok::<(), kiln::builder::BuildError>(())
//! ```

mod error;
mod executor;
mod template;

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use error::{BuildError, CommandError};
pub use executor::{BuildReport, CommandRunner, Executor, ShellRunner};
pub use template::TemplateError;

use crate::ast::{BuildMode, ResolvedTarget};
use crate::diagnostics::{DeclarationError, DeclarationFailure};
use crate::eval::{EvaluationContext, Evaluator};
use crate::graph::DependencyGraph;
use crate::parser;
use crate::toolchain::Toolchain;

/// Name of declaration files.
pub const DECLARATION_FILE: &str = "BUILD";

/// Output directory, skipped during discovery.
pub const OUTPUT_DIR: &str = "build";

/// Builds targets declared under a repository root.
#[derive(Debug)]
pub struct Builder<R: CommandRunner = ShellRunner> {
    root: Utf8PathBuf,
    ctx: EvaluationContext,
    runner: R,
    keep_going: bool,
    evaluated: bool,
}

impl Builder<ShellRunner> {
    /// Build the repository at `root` with the given mode and toolchain.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, mode: BuildMode, toolchain: Toolchain) -> Self {
        let root = root.into();
        let runner = ShellRunner::new(toolchain.shell.clone(), root.clone());
        let ctx = EvaluationContext::new(root.clone(), mode, toolchain);
        Self::with_parts(root, ctx, runner)
    }
}

impl<R: CommandRunner> Builder<R> {
    /// Assemble a builder from a prepared context and command runner.
    ///
    /// `ctx` should have been created for the same `root`.
    #[must_use]
    pub fn with_parts(root: impl Into<Utf8PathBuf>, ctx: EvaluationContext, runner: R) -> Self {
        Self {
            root: root.into(),
            ctx,
            runner,
            keep_going: false,
            evaluated: false,
        }
    }

    /// Continue with unaffected targets after a command fails.
    #[must_use]
    pub const fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Command runner, for inspecting what ran.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    /// Every `BUILD` file under the root, sorted by path.
    ///
    /// Hidden directories and the `build/` output directory at the root are
    /// not searched.
    ///
    /// # Errors
    ///
    /// [`BuildError::Discovery`] if the walk fails.
    pub fn discover_declaration_files(&self) -> Result<Vec<Utf8PathBuf>, BuildError> {
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !(name.starts_with('.') || (entry.depth() == 1 && name == OUTPUT_DIR))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| BuildError::Discovery {
                root: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() || entry.file_name() != DECLARATION_FILE {
                continue;
            }
            match Utf8PathBuf::try_from(entry.into_path()) {
                Ok(path) => files.push(path),
                Err(err) => warn!(path = %err.as_path().display(), "skipping non-UTF-8 path"),
            }
        }
        files.sort();
        debug!(count = files.len(), "discovered declaration files");
        Ok(files)
    }

    /// Load every declaration file into the evaluation context.
    ///
    /// Runs at most once per builder; later calls return immediately.
    ///
    /// # Errors
    ///
    /// [`BuildError::Declaration`] for the first file that fails to read,
    /// parse or evaluate.
    pub fn evaluate_declarations(&mut self) -> Result<(), BuildError> {
        if self.evaluated {
            return Ok(());
        }
        for path in self.discover_declaration_files()? {
            self.evaluate_file(&path)?;
        }
        self.evaluated = true;
        Ok(())
    }

    fn evaluate_file(&mut self, path: &Utf8Path) -> Result<(), BuildError> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let dir = relative.parent().map_or("", Utf8Path::as_str);
        debug!(file = %relative, dir, "evaluating declarations");

        let text = fs::read_to_string(path).map_err(|err| {
            DeclarationError::new(relative, "", DeclarationFailure::Read(err))
        })?;
        let program = parser::parse(&text)
            .map_err(|err| DeclarationError::new(relative, &text, err.into()))?;

        self.ctx.set_current_dir(dir);
        Evaluator::new(&mut self.ctx)
            .evaluate_program(&program)
            .map_err(|err| DeclarationError::new(relative, &text, err.into()))?;
        Ok(())
    }

    /// Every registered target, in registration order.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`Builder::evaluate_declarations`].
    pub fn targets(&mut self) -> Result<&IndexMap<String, ResolvedTarget>, BuildError> {
        self.evaluate_declarations()?;
        Ok(self.ctx.targets())
    }

    /// Dependency graph over every registered target.
    ///
    /// Dependencies that name no registered target are logged and ignored.
    ///
    /// # Errors
    ///
    /// Evaluation failures, and [`BuildError::Graph`] if the declared
    /// dependencies form a cycle.
    pub fn dependency_graph(&mut self) -> Result<DependencyGraph<ResolvedTarget>, BuildError> {
        self.evaluate_declarations()?;
        let targets = self.ctx.targets();
        let mut graph = DependencyGraph::new();
        for (name, target) in targets {
            graph.add_node(name.clone(), target.clone());
        }
        for (name, target) in targets {
            for dep in &target.deps {
                if !targets.contains_key(dep) {
                    warn!(target = %name, dependency = %dep, "target depends on undefined target");
                    continue;
                }
                graph.add_edge(dep, name)?;
            }
        }
        Ok(graph)
    }

    /// Ordered list of targets needed to build `name`, ending with `name`.
    ///
    /// # Errors
    ///
    /// [`BuildError::UnknownTarget`] if `name` is not declared, plus any
    /// evaluation or graph failure.
    pub fn plan(&mut self, name: &str) -> Result<Vec<String>, BuildError> {
        let graph = self.dependency_graph()?;
        if !graph.contains(name) {
            return Err(BuildError::UnknownTarget {
                name: name.to_owned(),
            });
        }
        let order = graph.topological_sort()?;
        let needed = graph.dependency_closure(name)?;
        let end = order
            .iter()
            .position(|id| id == name)
            .map_or(order.len(), |idx| idx + 1);
        Ok(order
            .into_iter()
            .take(end)
            .filter(|id| needed.contains(id))
            .collect())
    }

    /// Build `name` and everything it depends on.
    ///
    /// # Errors
    ///
    /// Planning failures and execution failures, see [`Executor::execute`].
    pub fn build_target(&mut self, name: &str) -> Result<BuildReport, BuildError> {
        let order = self.plan(name)?;
        info!(target = name, steps = order.len(), "building target");
        self.execute(&order)
    }

    /// Build every registered target.
    ///
    /// # Errors
    ///
    /// Evaluation and graph failures, and execution failures, see
    /// [`Executor::execute`].
    pub fn build_all(&mut self) -> Result<BuildReport, BuildError> {
        let order = self.dependency_graph()?.topological_sort()?;
        info!(steps = order.len(), "building all targets");
        self.execute(&order)
    }

    fn execute(&mut self, order: &[String]) -> Result<BuildReport, BuildError> {
        Executor::new(&self.root, self.ctx.toolchain(), &mut self.runner)
            .keep_going(self.keep_going)
            .execute(order, self.ctx.targets())
    }
}
