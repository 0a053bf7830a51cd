//! Command line interface definition using clap.
//!
//! This module defines the [`Cli`] structure and its subcommands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// A minimal build orchestrator for C++ projects described by BUILD files.
#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    author,
    version,
    about,
    long_about = None,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Repository root containing the BUILD files.
    #[arg(short = 'C', long, value_name = "DIR", global = true)]
    pub directory: Option<PathBuf>,

    /// Enable verbose logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep building targets unaffected by a failure.
    #[arg(short, long, global = true)]
    pub keep_going: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments accepted by the build commands.
#[derive(Debug, Args, PartialEq, Eq, Clone, Default)]
pub struct BuildArgs {
    /// Fully-qualified target to build, such as `@/app/server`. Builds
    /// every target when omitted.
    pub target: Option<String>,
}

/// Available top-level commands for kiln.
#[derive(Debug, Subcommand, PartialEq, Eq, Clone)]
pub enum Commands {
    /// Build with debug symbols and light optimisation.
    Build(BuildArgs),

    /// Build with optimisation.
    BuildRelease(BuildArgs),

    /// Write the dependency graph in DOT format and render it with Graphviz
    /// when available.
    Graph {
        /// Where to write the DOT file. Defaults to
        /// `build/dependency_graph.dot` under the repository root.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}
