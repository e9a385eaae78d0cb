use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::job::JobPriority;

/// Browse images inside folders and nested zip archives.
#[derive(Clone, Parser)]
#[command(name = "nestbox")]
#[command(about = "List, pick and resolve images inside folders and nested archives.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// List every image under PATH (a folder, an archive, or a path inside an archive).
    List {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the first image under PATH, searching nested archives when needed.
    First {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Find one entry by name (relative to PATH) through nested archives.
    Select {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[arg(value_name = "ENTRY")]
        entry: String,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Resolve a hybrid path such as `books/outer.zip/inner.zip/p001.jpg` to one entry.
    Resolve {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::List { common, .. }
            | Commands::First { common, .. }
            | Commands::Select { common, .. }
            | Commands::Resolve { common, .. } => common,
        }
    }
}

/// Flags shared by every subcommand. Unset flags fall back to `.nestbox.toml`, then defaults.
#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Config file. Default: `.nestbox.toml` in the current directory (optional).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Job worker threads.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Scheduling priority of the submitted job.
    #[arg(long, short = 'p', default_value = "default")]
    pub priority: JobPriority,

    /// Descend into nested archives and subfolders.
    #[arg(long, short = 'r', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub recursive: Option<bool>,

    /// When not recursive, open a lone archive and list its contents instead.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub auto_single_archive: Option<bool>,

    /// Keep every entry, not only images and archives.
    #[arg(long, short = 'a', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub all: Option<bool>,

    /// Max nested archive depth.
    #[arg(long, short = 'd')]
    pub max_depth: Option<usize>,

    /// Max archives tried per level by `first`.
    #[arg(long)]
    pub max_fan_out: Option<usize>,

    /// Read small archives fully into memory.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub pre_extract: Option<bool>,

    /// Exclude patterns matched per path segment (glob syntax). Can specify multiple: -e p1 p2
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Parent directory for extracted sub-archives. Default: system temp dir.
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, short = 'j', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
