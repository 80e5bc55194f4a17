//! CLI handler: build the checksum pipeline, feed it the root, wait for the summary or Ctrl-C.

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, bounded, never, select};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

use super::arg_parser::Cli;
use super::job::{COLLECTOR, HASHER, Job, Summary, WALKER};
use super::nodes::{collector, hasher, walker};
use crate::error::EngineError;
use crate::pipeline::Pipeline;
use crate::utils::config::{EngineConsts, WorkerLimits};
use crate::utils::conveyor_toml::{ConveyorToml, load_conveyor_toml};
use crate::utils::setup_logging;

/// Settings for one checksum run, after the settings file and the CLI are merged.
#[derive(Clone, Debug)]
pub struct ChecksumOpts {
    /// Hasher workers; `None` derives it from [`WorkerLimits`].
    pub parallelism: Option<usize>,
    pub port_capacity: usize,
    pub follow_links: bool,
    pub verbose: bool,
    /// Print one line per file (CLI). Off for library callers that only want the summary.
    pub print: bool,
}

impl Default for ChecksumOpts {
    fn default() -> Self {
        Self {
            parallelism: None,
            port_capacity: EngineConsts::DEFAULT_PORT_CAPACITY,
            follow_links: false,
            verbose: false,
            print: false,
        }
    }
}

/// Overwrite an opts field when the source has it.
macro_rules! apply_opt {
    ($src:expr, $opts:expr, $src_field:ident => $opts_field:ident) => {
        if let Some(v) = $src.$src_field {
            $opts.$opts_field = v;
        }
    };
}

/// Settings file first, then CLI on top.
pub fn resolve_opts(file: Option<&ConveyorToml>, cli: &Cli) -> ChecksumOpts {
    let mut opts = ChecksumOpts {
        print: true,
        ..ChecksumOpts::default()
    };
    if let Some(file) = file {
        let s = &file.settings;
        opts.parallelism = s.parallelism.or(opts.parallelism);
        apply_opt!(s, opts, port_capacity => port_capacity);
        apply_opt!(s, opts, follow_links => follow_links);
        apply_opt!(s, opts, verbose => verbose);
    }
    opts.parallelism = cli.parallelism.or(opts.parallelism);
    apply_opt!(cli, opts, capacity => port_capacity);
    apply_opt!(cli, opts, follow_links => follow_links);
    apply_opt!(cli, opts, verbose => verbose);
    opts
}

/// Walker (1) → hasher (n) → collector (1), not yet running.
pub fn build_pipeline(opts: &ChecksumOpts) -> Result<Pipeline<Job>, EngineError> {
    let hashers = WorkerLimits::current().hasher_parallelism(opts.parallelism);
    let mut pipeline = Pipeline::with_capacity(opts.port_capacity);
    pipeline.add_node(WALKER, walker(opts.follow_links), 1)?;
    pipeline.add_node(HASHER, hasher(), hashers)?;
    pipeline.add_node(COLLECTOR, collector(opts.print), 1)?;
    debug!("checksum pipeline: {} hasher worker(s)", hashers);
    Ok(pipeline)
}

/// Hash every file under `root`. A message (or disconnect) on `interrupt` kills the pipeline and
/// returns the abandoned work as the error.
pub fn run_checksum(
    root: &Path,
    opts: &ChecksumOpts,
    interrupt: Option<Receiver<()>>,
) -> Result<Summary> {
    if !root.is_dir() {
        bail!("not a directory: {}", root.display());
    }
    let mut pipeline = build_pipeline(opts)?;
    pipeline.run()?;
    let results = pipeline.output(COLLECTOR)?;
    pipeline.send(WALKER, Job::Scan(root.to_path_buf()))?;

    let interrupt = interrupt.unwrap_or_else(never);
    let summary = loop {
        select! {
            recv(results.receiver()) -> msg => match msg.map(|item| item.payload) {
                Ok(Job::Summary(summary)) => break summary,
                Ok(other) => warn!("unexpected result {:?}", other),
                Err(_) => bail!("collector output closed"),
            },
            recv(interrupt) -> _ => {
                warn!("Interrupted, killing pipeline");
                return match pipeline.kill() {
                    Ok(()) => Err(anyhow::anyhow!("interrupted")),
                    Err(e) => Err(anyhow::Error::new(e).context("interrupted")),
                };
            },
        }
    };

    pipeline.stop().context("stop pipeline")?;
    Ok(summary)
}

/// CLI entry: merge settings, install the Ctrl-C handler, run, report.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let file = load_conveyor_toml(&cli.dir);
    let opts = resolve_opts(file.as_ref(), cli);
    setup_logging(opts.verbose);

    let (interrupt_tx, interrupt_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    })
    .context("install Ctrl-C handler")?;

    info!("Hashing files in {}...", cli.dir.display());
    let start = Instant::now();
    let summary = run_checksum(&cli.dir, &opts, Some(interrupt_rx))?;
    info!(
        "{} file(s): {} hashed, {} failed in {:?}",
        summary.files,
        summary.hashed,
        summary.failed,
        start.elapsed()
    );
    Ok(())
}
