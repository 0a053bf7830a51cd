//! kiln core library.
//!
//! kiln reads `BUILD` files written in a small declarative language,
//! evaluates them into build targets, orders the targets by dependency and
//! compiles and links them with an external C++ toolchain.
//!
//! The pipeline runs leaves first: [`lexer`] and [`parser`] turn text into
//! an [`ast::Program`], [`eval`] runs rules to produce
//! [`ast::ResolvedTarget`] values, [`graph`] orders them, and [`builder`]
//! ties discovery, evaluation and execution together.

pub mod ast;
pub mod builder;
pub mod cli;
pub mod diagnostics;
pub mod eval;
pub mod graph;
pub mod lexer;
pub mod parser;
pub mod runner;
pub mod toolchain;
