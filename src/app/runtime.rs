//! Top-level run flow: input, dispatch, finalize, report.

use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use bulkdl_core::{
    ContentDescriptor, Database, DescriptorBuilder, Dispatcher, FinalizeReport, HttpFetcher,
    RunSummary, SqliteHistory, extract_links, finalize_run,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{config, exit_handler, progress, terminal};
use crate::ProcessExit;
use crate::app_config;
use crate::cli::Args;
use crate::output;

pub(crate) async fn run_bulkdl() -> Result<ProcessExit> {
    let (args, cli_sources) = config::parse_cli_with_sources();
    let loaded = app_config::load_file_config_for(args.config.as_deref())?;
    let file_config = loaded.config.as_ref();
    let args = config::apply_config_defaults(args, &cli_sources, file_config);
    let timeouts = config::resolve_http_timeouts(file_config);

    let force_cli_level = cli_sources.verbose || cli_sources.quiet;
    terminal::init_tracing(
        terminal::default_log_level(&args),
        force_cli_level,
        args.log_target(),
    )?;

    info!(version = env!("CARGO_PKG_VERSION"), "bulkdl starting");
    debug!(?args, config_path = ?loaded.path, "effective arguments");

    if !args.input_file.exists() {
        create_input_file(&args.input_file)?;
        warn!(path = %args.input_file.display(), "input file was missing and has been created");
        println!("{}", output::input_file_created_message(&args.input_file));
        return Ok(ProcessExit::Failure);
    }

    let descriptors = collect_descriptors(&args)?;
    if descriptors.is_empty() {
        info!("no links found");
        output::print_no_links_guidance(&args.input_file);
        return Ok(ProcessExit::Success);
    }
    info!(descriptors = descriptors.len(), "links collected");

    fs::create_dir_all(&args.output_folder).with_context(|| {
        format!(
            "Failed to create output folder '{}'",
            args.output_folder.display()
        )
    })?;

    let db = Database::new(&args.db_file).await.with_context(|| {
        format!(
            "Failed to open download history '{}'",
            args.db_file.display()
        )
    })?;
    let history = SqliteHistory::new(db.clone());
    let fetcher = HttpFetcher::new_with_timeouts(timeouts.connect_secs, timeouts.read_secs)
        .context("Failed to build HTTP client")?
        .with_overwrite(args.overwrite);
    let dispatcher = Dispatcher::new(
        config::dispatch_config(&args),
        Arc::new(history),
        Arc::new(fetcher),
    )?;
    debug!(concurrency = dispatcher.concurrency(), "dispatcher ready");

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping downloads");
            interrupt.cancel();
        }
    });

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        args.json,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(use_spinner, dispatcher.progress());

    let result = dispatcher.run(descriptors, &cancel).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    let outcome = match result {
        Ok(summary) => finalize(&args.output_folder, summary).await,
        Err(dispatch_error) => {
            error!(error = %dispatch_error, "download run aborted");
            match finalize(&args.output_folder, RunSummary::default()).await {
                Ok((_, report)) => {
                    for line in output::aborted_run_lines(&report) {
                        eprintln!("{line}");
                    }
                }
                Err(finalize_error) => {
                    warn!(error = %finalize_error, "cleanup after aborted run failed");
                }
            }
            db.close().await;
            return Err(dispatch_error).context("Download run aborted");
        }
    };
    db.close().await;
    let (summary, report) = outcome?;

    if !args.quiet || args.json {
        output::print_summary(&summary, &report, args.json)?;
    }

    if summary.is_interrupted() {
        warn!(
            succeeded = summary.succeeded(),
            cancelled = summary.cancelled(),
            "Interrupted. Run again to resume."
        );
        return Ok(ProcessExit::Failure);
    }

    Ok(exit_handler::determine_exit_outcome(
        summary.succeeded() + summary.skipped_duplicate(),
        summary.failed(),
    ))
}

fn create_input_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    fs::File::create(path)
        .with_context(|| format!("Failed to create input file '{}'", path.display()))?;
    Ok(())
}

/// Links from the arguments first, then from the input file.
fn collect_descriptors(args: &Args) -> Result<Vec<ContentDescriptor>> {
    let file_text = fs::read_to_string(&args.input_file).with_context(|| {
        format!(
            "Failed to read input file '{}'",
            args.input_file.display()
        )
    })?;
    let text = format!("{}\n{file_text}", args.links.join("\n"));
    let links = extract_links(&text);

    let mut builder = DescriptorBuilder::new(
        &args.output_folder,
        args.include_id,
        config::fingerprint_policy(args),
    );
    let mut descriptors = Vec::with_capacity(links.len());
    for link in links {
        match builder.build(&link, None) {
            Some(descriptor) => descriptors.push(descriptor),
            None => warn!(url = %link, "link does not name a file, skipping"),
        }
    }
    Ok(descriptors)
}

async fn finalize(root: &Path, mut summary: RunSummary) -> Result<(RunSummary, FinalizeReport)> {
    let root = root.to_path_buf();
    let (summary, report) = tokio::task::spawn_blocking(move || {
        let report = finalize_run(&root, &mut summary);
        (summary, report)
    })
    .await
    .context("Finalizer task failed")?;
    let report = report.context("Failed to clean up the output folder")?;
    Ok((summary, report))
}
