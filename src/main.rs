//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use clap::error::ErrorKind;
use kiln::builder::BuildError;
use kiln::{cli::Cli, runner};
use miette::{GraphicalReportHandler, GraphicalTheme};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

fn render_declaration_error(err: &anyhow::Error) -> Option<String> {
    let decl = err.chain().find_map(|cause| match cause.downcast_ref::<BuildError>() {
        Some(BuildError::Declaration(decl)) => Some(decl),
        _ => None,
    })?;
    let mut out = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .render_report(&mut out, decl.as_ref())
        .ok()?;
    Some(out)
}

fn usage_exit(err: &clap::Error) -> ExitCode {
    let printed = err.print().is_ok();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion if printed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return usage_exit(&err),
    };
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(report) = render_declaration_error(&err) {
                tracing::error!("{report}");
            }
            tracing::error!("kiln failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
