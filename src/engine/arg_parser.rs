use clap::Parser;
use std::path::PathBuf;

/// Unix-pipe style text pipelines over files or stdin.
#[derive(Clone, Debug, Parser)]
#[command(name = "pipekit")]
#[command(
    about = "Run a pipeline script over files or stdin, e.g. 'match ERROR | column 3 | freq | first 5'."
)]
pub struct Cli {
    /// Pipeline script: stages separated by `|`. Quote arguments with spaces.
    #[arg(value_name = "SCRIPT")]
    pub script: String,

    /// Input files, read in order. Default: stdin.
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Streaming mode: run every stage concurrently, like a shell pipeline.
    #[arg(long, short = 's', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub stream: Option<bool>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,

    /// Chunks buffered between two streaming stages before the producer blocks.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub channel_cap: Option<usize>,
}
