//! Runs resolved targets through the shell.
//!
//! The executor is handed an order that already respects dependencies and
//! walks it once, compiling each source and then linking. Flags flow from a
//! dependency to a dependent only once the dependency has been built in
//! this run.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::Dir};
use indexmap::{IndexMap, IndexSet};
use tracing::{info, warn};

use super::error::{BuildError, CommandError};
use super::template;
use crate::ast::ResolvedTarget;
use crate::toolchain::Toolchain;

/// Outcome of executing a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Targets built successfully, in order. Virtual targets count as built.
    pub built: Vec<String>,
    /// Targets whose commands failed.
    pub failed: Vec<String>,
    /// Targets not attempted.
    pub skipped: Vec<String>,
}

impl BuildReport {
    /// Whether nothing failed or was skipped.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Something that can run a shell command line.
pub trait CommandRunner {
    /// Run `command` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if the command cannot start or exits
    /// unsuccessfully.
    fn run(&mut self, command: &str) -> Result<(), CommandError>;
}

/// Runs commands with `<shell> -c` from the repository root.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    dir: Utf8PathBuf,
}

impl ShellRunner {
    /// Run commands with `shell`, from `dir`.
    #[must_use]
    pub fn new(shell: impl Into<String>, dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            dir: dir.into(),
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&mut self, command: &str) -> Result<(), CommandError> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(&self.dir)
            .status()
            .map_err(|source| CommandError::Spawn {
                command: command.to_owned(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Status {
                command: command.to_owned(),
                status: status.to_string(),
            })
        }
    }
}

/// Walks a build order and runs each target's commands.
pub struct Executor<'a, R: CommandRunner> {
    root: &'a Utf8Path,
    toolchain: &'a Toolchain,
    runner: &'a mut R,
    keep_going: bool,
}

impl<'a, R: CommandRunner> Executor<'a, R> {
    /// Build targets under `root` with `toolchain`, running commands
    /// through `runner`.
    #[must_use]
    pub fn new(root: &'a Utf8Path, toolchain: &'a Toolchain, runner: &'a mut R) -> Self {
        Self {
            root,
            toolchain,
            runner,
            keep_going: false,
        }
    }

    /// Continue with unaffected targets after a failure.
    #[must_use]
    pub const fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// Build every target named in `order`, in that order.
    ///
    /// `order` must list dependencies before dependents. Names missing from
    /// `targets` are ignored.
    ///
    /// # Errors
    ///
    /// [`BuildError::CommandFailed`] at the first failing command, or with
    /// [`Executor::keep_going`], [`BuildError::BuildFailed`] once every
    /// unaffected target has run. Directory creation and template problems
    /// abort immediately.
    pub fn execute(
        &mut self,
        order: &[String],
        targets: &IndexMap<String, ResolvedTarget>,
    ) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        let mut built: Vec<&ResolvedTarget> = Vec::new();
        let mut blocked: IndexSet<&str> = IndexSet::new();

        for (idx, name) in order.iter().enumerate() {
            let Some(target) = targets.get(name) else {
                continue;
            };
            if let Some(dep) = target.deps.iter().find(|dep| blocked.contains(dep.as_str())) {
                warn!(target = %name, dependency = %dep, "skipping target with failed dependency");
                report.skipped.push(name.clone());
                blocked.insert(name);
                continue;
            }

            match self.build_one(target, &built) {
                Ok(()) => {
                    report.built.push(name.clone());
                    built.push(target);
                }
                Err(BuildError::CommandFailed { target, source, .. }) if !self.keep_going => {
                    report.failed.push(target.clone());
                    report
                        .skipped
                        .extend(
                            order
                                .iter()
                                .skip(idx + 1)
                                .filter(|n| targets.contains_key(*n))
                                .cloned(),
                        );
                    return Err(BuildError::CommandFailed {
                        target,
                        source,
                        report: Box::new(report),
                    });
                }
                Err(BuildError::CommandFailed { target, source, .. }) => {
                    warn!(target = %target, error = %source, "target failed; continuing");
                    report.failed.push(target);
                    blocked.insert(name);
                }
                Err(other) => return Err(other),
            }
        }

        if report.failed.is_empty() {
            Ok(report)
        } else {
            Err(BuildError::BuildFailed {
                failed: report.failed.clone(),
                report: Box::new(report),
            })
        }
    }

    fn build_one(
        &mut self,
        target: &ResolvedTarget,
        built: &[&ResolvedTarget],
    ) -> Result<(), BuildError> {
        if target.is_virtual() {
            info!(target = %target.name, "nothing to build for virtual target");
            return Ok(());
        }
        info!(target = %target.name, "building");

        self.create_dirs(target)?;
        let args = self.flags_for(target, built).join(" ");

        let invalid = |source| BuildError::InvalidCommand {
            target: target.name.clone(),
            source,
        };
        let mut commands = Vec::with_capacity(target.sources.len() + 1);
        for (input, object) in target.sources.iter().zip(&target.objects) {
            commands.push(
                template::compile(&target.build_command, input, object, &args).map_err(invalid)?,
            );
        }
        if !target.link_command.is_empty() {
            commands.push(
                template::link(&target.link_command, &target.objects, &target.output, &args)
                    .map_err(invalid)?,
            );
        }

        for command in commands {
            info!("executing: {command}");
            self.runner
                .run(&command)
                .map_err(|source| BuildError::CommandFailed {
                    target: target.name.clone(),
                    source,
                    report: Box::default(),
                })?;
        }
        info!(target = %target.name, "done building");
        Ok(())
    }

    fn create_dirs(&self, target: &ResolvedTarget) -> Result<(), BuildError> {
        let root = Dir::open_ambient_dir(self.root, ambient_authority()).map_err(|source| {
            BuildError::Io {
                path: self.root.to_path_buf(),
                source,
            }
        })?;
        let parents = std::iter::once(target.output.as_str())
            .chain(target.objects.iter().map(String::as_str))
            .filter_map(|path| Utf8Path::new(path).parent())
            .filter(|parent| !parent.as_str().is_empty() && parent.as_str() != ".");
        for dir in parents {
            root.create_dir_all(dir).map_err(|source| BuildError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Baseline flags, then include and link flags of each already-built
    /// dependency in build order.
    fn flags_for(&self, target: &ResolvedTarget, built: &[&ResolvedTarget]) -> Vec<String> {
        let mut flags = self.toolchain.baseline_flags.clone();
        for dep in built.iter().filter(|dep| target.deps.contains(&dep.name)) {
            flags.extend(dep.include_flags.iter().cloned());
            flags.extend(dep.link_flags.iter().cloned());
        }
        flags
    }
}

impl<R: CommandRunner> std::fmt::Debug for Executor<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("root", &self.root)
            .field("keep_going", &self.keep_going)
            .finish_non_exhaustive()
    }
}
