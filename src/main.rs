//! nestbox CLI: list, pick and resolve images inside folders and nested archives.

use anyhow::Result;
use clap::Parser;
use nestbox::cli::Cli;
use nestbox::cli::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
