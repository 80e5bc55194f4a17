//! Processing steps of the checksum pipeline: walker → hasher → collector.
//!
//! The walker fans out one hash job per file and fans back in through a private completion
//! port, so it knows when every file it issued has reached the collector.

use colored::Colorize;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::hashing::{hash_file, to_hex};
use super::job::{COLLECTOR, FileDigest, HASHER, Job, Summary};
use crate::engine::Registry;
use crate::pipeline::output_port_name;
use crate::types::{ProcessorFn, WorkItem, processor};

/// One result from a directory walk: a file to hash or an error with the path it concerns.
pub enum WalkOutcome {
    File(PathBuf),
    Err { msg: String, path: PathBuf },
}

fn to_outcome(r: Result<walkdir::DirEntry, walkdir::Error>, root: &Path) -> Option<WalkOutcome> {
    match r {
        Ok(entry) if entry.file_type().is_dir() => None,
        Ok(entry) => Some(WalkOutcome::File(entry.into_path())),
        Err(err) => Some(WalkOutcome::Err {
            msg: err.to_string(),
            path: err.path().unwrap_or(root).to_path_buf(),
        }),
    }
}

/// Walk `root` and return every non-directory entry plus the walk errors met on the way.
pub fn walk_files(root: &Path, follow_links: bool) -> (Vec<PathBuf>, Vec<(PathBuf, String)>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();
    let outcomes = walkdir::WalkDir::new(root)
        .follow_links(follow_links)
        .into_iter()
        .filter_map(|r| to_outcome(r, root));
    for outcome in outcomes {
        match outcome {
            WalkOutcome::File(path) => files.push(path),
            WalkOutcome::Err { msg, path } => errors.push((path, msg)),
        }
    }
    (files, errors)
}

fn send_or_warn(registry: &Registry<Job>, port: &str, item: WorkItem<Job>) {
    if let Err(e) = registry.send_to(port, item) {
        warn!("{}", e);
    }
}

/// Walker step: one `Scan(dir)` in, one `Hash` per file out, `Done` to the collector once every
/// hash job has been acknowledged.
pub fn walker(follow_links: bool) -> ProcessorFn<Job> {
    processor(move |_worker, item: WorkItem<Job>, registry: &Registry<Job>| {
        let (job, status) = item.into_result();
        if let Err(e) = status {
            send_or_warn(registry, COLLECTOR, WorkItem::failed(job, e));
            return;
        }
        let Job::Scan(root) = job else {
            warn!("walker: unexpected job {:?}", job);
            return;
        };

        let (files, errors) = walk_files(&root, follow_links);
        for (path, msg) in errors {
            send_or_warn(
                registry,
                COLLECTOR,
                WorkItem::failed(Job::Scan(path), anyhow::anyhow!("walk: {}", msg)),
            );
        }

        // Sized to the file count so hashers never block on acks while we are still sending.
        let done = registry.private_port("walker.done", files.len());
        let mut issued = 0_usize;
        for path in files {
            let job = Job::Hash {
                path,
                reply: done.name().to_string(),
            };
            if registry.send_to(HASHER, WorkItem::new(job)).is_err() {
                warn!("walker: hasher port missing, stopping fan-out");
                break;
            }
            issued += 1;
        }
        debug!("walker: {} hash job(s) issued for {}", issued, root.display());

        let mut acked = 0_usize;
        while acked < issued && done.recv().is_ok() {
            acked += 1;
        }
        registry.remove(done.name());
        send_or_warn(
            registry,
            COLLECTOR,
            WorkItem::new(Job::Done { files: issued }),
        );
    })
}

/// Hasher step: hash one file, report to the collector, acknowledge on the job's reply port.
pub fn hasher() -> ProcessorFn<Job> {
    processor(|worker, item: WorkItem<Job>, registry: &Registry<Job>| {
        let (job, status) = item.into_result();
        let Job::Hash { path, reply } = job else {
            let item = match status {
                Err(e) => WorkItem::failed(job, e),
                Ok(()) => WorkItem::failed(job, anyhow::anyhow!("hasher: unexpected job")),
            };
            send_or_warn(registry, COLLECTOR, item);
            return;
        };
        let out = match status.and_then(|_| hash_file(&path)) {
            Ok(hash) => WorkItem::new(Job::Digest(FileDigest { path, hash, worker })),
            Err(e) => WorkItem::failed(
                Job::Hash {
                    path,
                    reply: reply.clone(),
                },
                e,
            ),
        };
        send_or_warn(registry, COLLECTOR, out);
        send_or_warn(registry, &reply, WorkItem::new(Job::Ack));
    })
}

/// Collector step: print digests and failures, tally them, and emit a [`Summary`] on
/// `collector.out` when the walker's `Done` arrives. Run it with parallelism 1.
pub fn collector(print: bool) -> ProcessorFn<Job> {
    let tally = Mutex::new(Summary::default());
    processor(move |_worker, item: WorkItem<Job>, registry: &Registry<Job>| {
        let mut tally = tally.lock().unwrap_or_else(PoisonError::into_inner);
        let (job, status) = item.into_result();
        if let Err(e) = status {
            tally.failed += 1;
            if print {
                let path = job.path().map(|p| p.display().to_string());
                eprintln!(
                    "{} {}: {:#}",
                    "error".red(),
                    path.as_deref().unwrap_or("<unknown>"),
                    e
                );
            }
            return;
        }
        match job {
            Job::Digest(d) => {
                tally.hashed += 1;
                if print {
                    println!("{}|{}  {}", d.worker, to_hex(&d.hash), d.path.display());
                }
            }
            Job::Done { files } => {
                tally.files = files;
                let summary = std::mem::take(&mut *tally);
                send_or_warn(
                    registry,
                    &output_port_name(COLLECTOR),
                    WorkItem::new(Job::Summary(summary)),
                );
            }
            other => warn!("collector: unexpected job {:?}", other),
        }
    })
}
