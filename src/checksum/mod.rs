//! Directory checksum tool built on the pipeline: the binary's whole behaviour lives here.

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod job;
pub mod nodes;

pub use arg_parser::Cli;
pub use cli::{ChecksumOpts, build_pipeline, handle_run, resolve_opts, run_checksum};
pub use hashing::{hash_file, to_hex};
pub use job::{COLLECTOR, FileDigest, HASHER, Job, Summary, WALKER};
