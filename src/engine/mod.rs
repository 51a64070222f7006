//! Engine module: the stage catalogue built on the pipeline core, plus the CLI

pub mod arg_parser;
pub mod cli;
pub mod exec;
pub mod filters;
pub mod hashing;
pub mod script;
pub mod sinks;
pub mod sources;
pub mod tools;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use hashing::{HashKind, blake3_file, sha256_file, sha256_reader};
pub use script::{Script, Step, Terminal, parse_script};
pub use tools::{basename, dirname, glob_match, render_template, scan_lines, split_fields};
