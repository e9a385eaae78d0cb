//! Command handlers: build options, submit the traversal as a job, print the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::arg_parser::{Cli, Commands, CommonArgs};
use crate::archive::{ArchiveEntry, ArchiveFileSystem, ArchiveServices, EntryCollection};
use crate::job::{JobEngine, JobPriority};
use crate::utils::nestbox_toml::{apply_file_to_opts, default_config_path, load_nestbox_toml};
use crate::utils::{remove_stale_temp_dirs, setup_logging};
use crate::{EntryRecord, Error, Opts};

/// How often the main thread checks for Ctrl+C and job faults while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Grace period for a fault to arrive after a job dropped its result channel.
const FAULT_GRACE: Duration = Duration::from_secs(1);

/// What one command produced.
#[derive(Debug, Serialize)]
pub struct CommandOutput {
    pub path: PathBuf,
    /// Root the traversal started from, after single-archive expansion.
    pub effective_root: Option<PathBuf>,
    pub entries: Vec<EntryRecord>,
    pub skipped_archive_count: usize,
}

/// Defaults, then the config file, then CLI flags.
pub fn build_opts(common: &CommonArgs) -> Result<Opts> {
    let mut opts = Opts::default();
    let config_path = match &common.config {
        Some(p) => p.clone(),
        None => default_config_path(Path::new(".")),
    };
    match load_nestbox_toml(&config_path)? {
        Some(file) => apply_file_to_opts(&file, &mut opts),
        None if common.config.is_some() => {
            bail!("config file not found: {}", config_path.display())
        }
        None => {}
    }
    apply_cli_to_opts(common, &mut opts);
    Ok(opts)
}

/// Overwrite opts field from CLI when the flag was given.
macro_rules! apply_cli_opt {
    ($common:expr, $opts:expr, $cli_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $common.$cli_field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

fn apply_cli_to_opts(common: &CommonArgs, opts: &mut Opts) {
    apply_cli_opt!(common, opts, workers => workers);
    apply_cli_opt!(common, opts, recursive => collect.recursive);
    apply_cli_opt!(common, opts, auto_single_archive => collect.auto_single_archive);
    apply_cli_opt!(common, opts, all => collect.all_entries);
    apply_cli_opt!(common, opts, max_depth => collect.max_depth);
    apply_cli_opt!(common, opts, max_fan_out => collect.max_fan_out);
    apply_cli_opt!(common, opts, pre_extract => collect.allow_pre_extract);
    apply_cli_opt!(common, opts, json => json);
    apply_cli_opt!(common, opts, verbose => verbose);
    if !common.exclude.is_empty() {
        opts.exclude.extend(common.exclude.iter().cloned());
    }
    if let Some(dir) = &common.temp_dir {
        opts.temp_dir = Some(dir.clone());
    }
}

/// Entry point for the binary.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let common = cli.command.common();
    let opts = build_opts(common)?;
    setup_logging(opts.verbose);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );

    let stale = remove_stale_temp_dirs(opts.temp_dir.as_deref());
    if stale > 0 {
        info!("removed {stale} stale temp item(s)");
    }

    let root_token = CancellationToken::new();
    let handler_token = root_token.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("set Ctrl+C handler")?;

    let output = run_command(&cli.command, &opts, common.priority, &root_token)?;
    print_output(&output, opts.json)
}

/// Run one command on a [`JobEngine`] worker and wait for it on this thread, polling for
/// faults and forwarding cancellation of `root_token` to the job.
pub fn run_command(
    command: &Commands,
    opts: &Opts,
    priority: JobPriority,
    root_token: &CancellationToken,
) -> Result<CommandOutput> {
    let services = ArchiveServices::from_opts(opts).context("set up archive services")?;
    let engine = JobEngine::new(opts.workers).context("start job engine")?;
    let (tx, rx) = crossbeam_channel::bounded::<crate::Result<CommandOutput>>(1);

    let cancel_tx = tx.clone();
    let job_command = command.clone();
    let job_opts = opts.clone();
    let request = engine.add(
        move |token: &CancellationToken| {
            let result = execute(&job_command, &job_opts, services, token);
            send_result(&tx, result);
            Ok(())
        },
        Some(move || send_result(&cancel_tx, Err(Error::Cancelled))),
        priority,
    );
    debug!("submitted job #{} at {:?}", request.serial(), priority);

    let result = loop {
        engine.check_faults()?;
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(result) => break result,
            Err(RecvTimeoutError::Timeout) => {
                if root_token.is_cancelled() && !request.is_cancellation_requested() {
                    warn!("cancelling...");
                    request.cancel();
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Ok(fault) = engine.faults().recv_timeout(FAULT_GRACE) {
                    return Err(Error::from(fault).into());
                }
                bail!("job #{} ended without a result", request.serial());
            }
        }
    };
    engine.shutdown();
    Ok(result?)
}

fn send_result(tx: &Sender<crate::Result<CommandOutput>>, result: crate::Result<CommandOutput>) {
    if tx.send(result).is_err() {
        debug!("result receiver gone");
    }
}

/// The work itself; runs on a job worker.
fn execute(
    command: &Commands,
    opts: &Opts,
    services: ArchiveServices,
    token: &CancellationToken,
) -> crate::Result<CommandOutput> {
    match command {
        Commands::Resolve { path, .. } => {
            let fs = ArchiveFileSystem::new(services, opts.collect.max_depth);
            let resolved = fs.create_archive_entry(path, opts.collect.allow_pre_extract, token)?;
            Ok(CommandOutput {
                path: path.clone(),
                effective_root: None,
                entries: vec![EntryRecord::from(resolved.entry())],
                skipped_archive_count: 0,
            })
        }
        Commands::List { path, .. } => {
            traverse(services, path, opts, token, |c, t| c.collect(t))
        }
        Commands::First { path, .. } => {
            traverse(services, path, opts, token, |c, t| c.first_one(t))
        }
        Commands::Select { path, entry, .. } => {
            traverse(services, path, opts, token, |c, t| c.select(entry, t))
        }
    }
}

fn traverse<F>(
    services: ArchiveServices,
    path: &Path,
    opts: &Opts,
    token: &CancellationToken,
    mode: F,
) -> crate::Result<CommandOutput>
where
    F: FnOnce(&mut EntryCollection, &CancellationToken) -> crate::Result<Vec<ArchiveEntry>>,
{
    let mut collection = EntryCollection::new(services, path, opts.collect);
    let entries = mode(&mut collection, token)?;
    let output = CommandOutput {
        path: path.to_path_buf(),
        effective_root: collection.effective_root().map(Path::to_path_buf),
        entries: entries.iter().map(EntryRecord::from).collect(),
        skipped_archive_count: collection.skipped_archive_count(),
    };
    collection.dispose();
    Ok(output)
}

fn print_output(output: &CommandOutput, json: bool) -> Result<()> {
    if json {
        let s = serde_json::to_string_pretty(output).context("serialize output")?;
        println!("{s}");
        return Ok(());
    }
    if let Some(root) = &output.effective_root
        && root != &output.path
    {
        info!("opened single archive {}", root.display());
    }
    for entry in &output.entries {
        println!("{}", entry.path.display());
    }
    if output.entries.is_empty() {
        info!("no entries found under {}", output.path.display());
    }
    if output.skipped_archive_count > 0 {
        info!(
            "{} nested archive(s) not expanded (use --recursive)",
            output.skipped_archive_count
        );
    }
    Ok(())
}
