//! Payload carried between the checksum nodes.

use std::path::{Path, PathBuf};

/// Node names of the checksum pipeline.
pub const WALKER: &str = "walker";
pub const HASHER: &str = "hasher";
pub const COLLECTOR: &str = "collector";

/// Digest of one file, tagged with the hasher worker that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileDigest {
    pub path: PathBuf,
    pub hash: [u8; 32],
    pub worker: usize,
}

/// Totals for one scanned tree, emitted by the collector on its output port.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Files handed to the hasher.
    pub files: usize,
    pub hashed: usize,
    /// Walk errors plus hash errors.
    pub failed: usize,
}

#[derive(Debug)]
pub enum Job {
    /// Walk this directory (sent to the walker).
    Scan(PathBuf),
    /// Hash this file, then acknowledge on port `reply`.
    Hash { path: PathBuf, reply: String },
    Digest(FileDigest),
    /// One hash job finished (sent on the walker's private completion port).
    Ack,
    /// The walker issued `files` hash jobs and all were acknowledged.
    Done { files: usize },
    Summary(Summary),
}

impl Job {
    /// Path the job is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Job::Scan(p) | Job::Hash { path: p, .. } => Some(p),
            Job::Digest(d) => Some(&d.path),
            _ => None,
        }
    }
}
