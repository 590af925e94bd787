//! Command-line tools for reading, formatting and rewriting HIT
//! configuration files: `find`, `format`, `merge`, `diff`, `common`,
//! `subtract`, `validate`, `braceexpr`.

mod braceexpr;
mod common;
mod diff;
mod find;
mod format;
mod merge;
mod pipeline;
mod subtract;
mod validate;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hit", version, about = "Tools for the HIT configuration language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search parameters by name and optional value glob pattern
    Find {
        /// `param[=value]`, where both halves may contain `*`/`?` globs
        pattern: String,
        files: Vec<String>,
        /// Print matching filenames only, once each
        #[arg(short = 'f')]
        filenames_only: bool,
        #[arg(short = 'i')]
        case_insensitive: bool,
        /// Invert the match
        #[arg(short = 'v')]
        invert: bool,
        /// Additional ancestor-section glob patterns, all of which must match
        #[arg(short = 'p', long = "parent")]
        parent_patterns: Vec<String>,
    },
    /// Reformat files to stdout, or in place
    Format {
        #[arg(short = 'i')]
        in_place: bool,
        #[arg(long = "style")]
        style: Option<String>,
        files: Vec<String>,
    },
    /// Merge files into a single document
    Merge {
        #[arg(long = "output")]
        output: String,
        files: Vec<String>,
    },
    /// Compare the merged parameters of two file sets
    Diff {
        left: Option<String>,
        right: Option<String>,
        #[arg(long = "left", num_args = 1..)]
        left_files: Vec<String>,
        #[arg(long = "right", num_args = 1..)]
        right_files: Vec<String>,
        #[arg(short = 'v')]
        verbose: bool,
        #[arg(long = "common")]
        show_common: bool,
        #[arg(short = 'C', long = "color")]
        color: bool,
    },
    /// Print parameters shared, with identical values, across all files
    Common { files: Vec<String> },
    /// Print `base`'s parameters minus any `remove` also assigns the same value
    Subtract { base: String, remove: String },
    /// Structural check plus duplicate-parameter detection
    Validate { files: Vec<String> },
    /// Expand a brace expression read from stdin
    Braceexpr,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Find { pattern, files, filenames_only, case_insensitive, invert, parent_patterns } => {
            find::run(find::FindArgs {
                pattern: &pattern,
                files: &files,
                filenames_only,
                case_insensitive,
                invert,
                parent_patterns: &parent_patterns,
            })
        }
        Commands::Format { in_place, style, files } => format::run(in_place, style.as_deref(), &files),
        Commands::Merge { output, files } => merge::run(&output, &files).map(|()| true),
        Commands::Diff { left, right, left_files, right_files, verbose, show_common, color } => {
            let left_set = if left_files.is_empty() { left.into_iter().collect() } else { left_files };
            let right_set = if right_files.is_empty() { right.into_iter().collect() } else { right_files };
            diff::run(diff::DiffArgs { left: &left_set, right: &right_set, verbose, show_common, color }).map(|()| true)
        }
        Commands::Common { files } => common::run(&files).map(|()| true),
        Commands::Subtract { base, remove } => subtract::run(&base, &remove).map(|()| true),
        Commands::Validate { files } => validate::run(&files),
        Commands::Braceexpr => braceexpr::run().map(|()| true),
    }
}
