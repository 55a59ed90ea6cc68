//! Watch command - run the maintainers over a JSON-lines change log
//!
//! Each input line is one source collection write (see
//! [`Mutation`]). Writes are committed to the in-process source
//! collections while the maintainers consume their feeds. At end of
//! input the feeds are closed and the maintainers drain. Ctrl-C stops
//! reading and shuts the maintainers down after their in-flight event.

use crate::cli::output::{colors, format_duration, print_warning};
use crate::cli::OutputFormat;
use crate::core::error::Result;
use crate::core::feed::Mutation;
use crate::core::indexer::StatsSnapshot;
use crate::core::services::Services;
use crate::core::types::SourceKind;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Arguments for the watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// JSON-lines mutation log (reads stdin when omitted)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,
}

/// Watch response
#[derive(Debug, Serialize)]
pub struct WatchReport {
    pub mutations_applied: u64,
    pub mutations_rejected: u64,
    pub interrupted: bool,
    pub elapsed_secs: f64,
    pub maintainers: BTreeMap<SourceKind, StatsSnapshot>,
}

/// Counts from feeding one input stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyCounts {
    pub applied: u64,
    pub rejected: u64,
}

/// Apply every mutation line from `reader` until end of input or
/// until `stop` is cancelled.
pub async fn apply_mutations<R>(
    services: &Services,
    reader: R,
    stop: &CancellationToken,
) -> Result<ApplyCounts>
where
    R: AsyncBufRead + Unpin,
{
    let mut counts = ApplyCounts::default();
    let mut lines = reader.lines();
    let mut line_number = 0u64;

    loop {
        let line = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        line_number += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match apply_line(services, line).await {
            Ok(sequence) => {
                counts.applied += 1;
                tracing::debug!(line = line_number, sequence, "Committed mutation");
            }
            Err(e) => {
                counts.rejected += 1;
                tracing::warn!(line = line_number, error = %e, "Rejected mutation");
            }
        }
    }

    Ok(counts)
}

async fn apply_line(services: &Services, line: &str) -> Result<u64> {
    let mutation = Mutation::parse(line)?;
    let kind = mutation.kind()?;
    mutation.apply(services.source(kind)?).await
}

/// Execute the watch command
pub async fn execute(
    args: WatchArgs,
    services: &Arc<Services>,
    format: OutputFormat,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let input = match &args.input {
        Some(path) => Some(tokio::fs::File::open(path).await?),
        None => None,
    };

    let started = Instant::now();
    let supervisor = services.start_maintainers().await;
    let shutdown = supervisor.shutdown_token();

    let interrupted = Arc::new(AtomicBool::new(false));
    let ctrl_c = {
        let shutdown = shutdown.clone();
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, shutting down");
                interrupted.store(true, Ordering::SeqCst);
                shutdown.cancel();
            }
        })
    };

    let counts = match input {
        Some(file) => apply_mutations(services, BufReader::new(file), &shutdown).await,
        None => apply_mutations(services, BufReader::new(tokio::io::stdin()), &shutdown).await,
    };

    services.close_sources();
    let maintainers = supervisor.join().await;
    ctrl_c.abort();
    let counts = counts?;

    let report = WatchReport {
        mutations_applied: counts.applied,
        mutations_rejected: counts.rejected,
        interrupted: interrupted.load(Ordering::SeqCst),
        elapsed_secs: started.elapsed().as_secs_f64(),
        maintainers,
    };

    match format {
        OutputFormat::Human => print_human(&report),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    let lagged = report.lagged_events();
    if lagged > 0 {
        return Err(format!("{lagged} change event(s) were dropped before indexing").into());
    }

    Ok(())
}

impl WatchReport {
    /// Events any maintainer's feed dropped before delivery
    pub fn lagged_events(&self) -> u64 {
        self.maintainers.values().map(|s| s.lagged_events).sum()
    }
}

fn print_human(report: &WatchReport) {
    if report.interrupted {
        print_warning("Interrupted, later input was not applied");
    }

    println!(
        "{} {} applied, {} rejected in {}",
        colors::label("Mutations:"),
        colors::number(&report.mutations_applied.to_string()),
        colors::number(&report.mutations_rejected.to_string()),
        format_duration(report.elapsed_secs)
    );

    for (kind, stats) in &report.maintainers {
        println!(
            "  {:<16} events {:>6}  chunks +{} -{}  invalid {}  store failures {}  lagged {}  restarts {}",
            colors::label(kind.as_str()),
            stats.events_applied,
            stats.chunks_written,
            stats.chunks_removed,
            stats.invalid_documents,
            stats.store_failures,
            stats.lagged_events,
            stats.restarts
        );
    }
}
