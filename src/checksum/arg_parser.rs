use clap::Parser;
use std::path::PathBuf;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Checksum every file under a directory with a parallel walker → hasher → collector pipeline.
#[derive(Clone, Parser)]
#[command(name = "conveyor")]
#[command(about = "Hash every file under DIR in parallel; Ctrl-C aborts and reports abandoned work.")]
pub struct Cli {
    /// Directory to scan. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Number of hasher workers. Default: available threads, capped by the open-file limit.
    #[arg(value_name = "PARALLELISM")]
    pub parallelism: Option<usize>,

    /// Capacity of every node port.
    #[arg(long, short = 'q')]
    pub capacity: Option<usize>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
