//! Built-in rules.

use camino::Utf8Path;
use itertools::Itertools;

use super::glob;
use super::pkg_config::PackageResolver;
use super::{EvalError, RuleArgs, RuleContext, RuleOutput};
use crate::ast::{ResolvedTarget, qualified_name};

/// A callable registered under a name in the evaluation context.
pub trait Rule {
    /// Run the rule with evaluated arguments.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] for missing or malformed arguments and for
    /// failures of the rule's own work.
    fn call(&self, args: &RuleArgs, ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError>;
}

/// `glob(pattern = "...")`: files under the declaring directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct Glob;

impl Rule for Glob {
    fn call(&self, args: &RuleArgs, ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError> {
        let pattern = args.required_str("glob", "pattern")?;
        glob::expand(ctx.repo_root, ctx.current_dir, pattern).map(RuleOutput::Paths)
    }
}

/// `cc_binary(name, sources, includes, deps)`: an executable in `build/bin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CcBinary;

impl Rule for CcBinary {
    fn call(&self, args: &RuleArgs, ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError> {
        let unit = CompileUnit::from_args("cc_binary", args, ctx)?;
        let link_command = join_parts(&[
            ctx.toolchain.cxx.as_str(),
            "@OBJ@ -o @OUT@",
            unit.include_flags.join(" ").as_str(),
            "@ARGS@",
            ctx.mode.flags(),
        ]);
        let output = format!("build/bin/{}", unit.short_name);
        Ok(RuleOutput::Target(unit.into_target(output, link_command, Vec::new())))
    }
}

/// `cc_library(name, sources, includes, deps)`: a static archive in
/// `build/lib` that dependents link with `-l<name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CcLibrary;

impl Rule for CcLibrary {
    fn call(&self, args: &RuleArgs, ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError> {
        let unit = CompileUnit::from_args("cc_library", args, ctx)?;
        let link_command = join_parts(&[ctx.toolchain.ar.as_str(), "rcs @OUT@ @OBJ@"]);
        let output = format!("build/lib/lib{}.a", unit.short_name);
        let link_flags = vec![format!("-l{}", unit.short_name)];
        Ok(RuleOutput::Target(unit.into_target(output, link_command, link_flags)))
    }
}

/// `system_cc_library(name, pkgconfig)`: a virtual target carrying flags
/// for an installed package.
pub struct SystemCcLibrary {
    resolver: Box<dyn PackageResolver>,
}

impl SystemCcLibrary {
    /// Resolve packages through `resolver`.
    #[must_use]
    pub fn new(resolver: impl PackageResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
        }
    }
}

impl std::fmt::Debug for SystemCcLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemCcLibrary").finish_non_exhaustive()
    }
}

impl Rule for SystemCcLibrary {
    fn call(&self, args: &RuleArgs, ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError> {
        let name = args.required_str("system_cc_library", "name")?;
        let package = args.required_str("system_cc_library", "pkgconfig")?;
        let flags = self
            .resolver
            .resolve(package)
            .map_err(|source| EvalError::PackageConfig {
                package: package.to_owned(),
                source,
            })?;
        Ok(RuleOutput::Target(ResolvedTarget {
            name: qualified_name(ctx.current_dir, name),
            include_flags: flags.cflags,
            link_flags: flags.libs,
            ..ResolvedTarget::default()
        }))
    }
}

/// Parts shared by `cc_binary` and `cc_library`.
struct CompileUnit {
    short_name: String,
    name: String,
    sources: Vec<String>,
    objects: Vec<String>,
    include_flags: Vec<String>,
    build_command: String,
    deps: Vec<String>,
}

impl CompileUnit {
    fn from_args(rule: &str, args: &RuleArgs, ctx: &RuleContext<'_>) -> Result<Self, EvalError> {
        let short_name = args.required_str(rule, "name")?.to_owned();
        let dir = ctx.current_dir.trim_matches('/');
        let declared = args.paths(rule, "sources")?;

        let sources = declared.iter().map(|src| under(".", dir, src)).collect();
        let objects = declared
            .iter()
            .map(|src| under("./build/obj", dir, Utf8Path::new(src).with_extension("o").as_str()))
            .collect();
        let include_flags: Vec<String> = args
            .paths(rule, "includes")?
            .iter()
            .map(|inc| format!("-I{}", under(".", dir, inc)))
            .collect();
        let build_command = join_parts(&[
            ctx.toolchain.cxx.as_str(),
            "-c @IN@ -o @OBJ@",
            include_flags.join(" ").as_str(),
            "@ARGS@",
            ctx.mode.flags(),
        ]);

        Ok(Self {
            name: qualified_name(dir, &short_name),
            short_name,
            sources,
            objects,
            include_flags,
            build_command,
            deps: args.list("deps"),
        })
    }

    fn into_target(
        self,
        output: String,
        link_command: String,
        link_flags: Vec<String>,
    ) -> ResolvedTarget {
        ResolvedTarget {
            name: self.name,
            sources: self.sources,
            objects: self.objects,
            output,
            include_flags: self.include_flags,
            link_flags,
            build_command: self.build_command,
            link_command,
            deps: self.deps,
        }
    }
}

fn under(prefix: &str, dir: &str, path: &str) -> String {
    if dir.is_empty() {
        format!("{prefix}/{path}")
    } else {
        format!("{prefix}/{dir}/{path}")
    }
}

fn join_parts(parts: &[&str]) -> String {
    parts.iter().filter(|part| !part.is_empty()).join(" ")
}
