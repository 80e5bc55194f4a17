//! Conveyor CLI: checksum every file under a directory with the parallel pipeline.

use anyhow::Result;
use clap::Parser;
use conveyor::checksum::{Cli, handle_run};
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
