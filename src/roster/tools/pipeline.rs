use std::path::Path;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use crate::roster::tools::error::{Result, ToolError};
use crate::roster::tools::export::ExportRetriever;
use crate::roster::tools::io::excel_read;
use crate::roster::tools::io::ntfy::NotificationSink;
use crate::roster::tools::io::sheets::Ledger;
use crate::roster::tools::poll::{WaitError, await_stable_size};
use crate::roster::tools::reconcile;

/// Knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Column whose value identifies a member in both ledger and export.
    pub key_column: String,
    /// Reconcile and report, but neither append nor notify.
    pub dry_run: bool,
    /// Interval between artifact size checks.
    pub settle_poll: Duration,
    /// Give up waiting for the artifact size to settle after this long.
    pub settle_timeout: Duration,
}

impl RunOptions {
    pub fn new(key_column: impl Into<String>) -> Self {
        Self {
            key_column: key_column.into(),
            dry_run: false,
            settle_poll: Duration::from_secs(1),
            settle_timeout: Duration::from_secs(10),
        }
    }
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every exported member is already in the ledger.
    UpToDate,
    /// The identity key column is missing on one side; nothing was appended.
    SchemaMismatch(String),
    /// Dry run: this many rows would have been appended.
    DryRun { pending: usize },
    /// Rows were appended. `notified` reports whether the summary was delivered.
    Appended { rows: usize, notified: bool },
}

/// Runs export, reconciliation, append and notification once, in that order.
#[instrument(level = "info", skip_all, fields(key = %options.key_column, dry_run = options.dry_run))]
pub fn run(
    retriever: &mut dyn ExportRetriever,
    ledger: &dyn Ledger,
    sink: &dyn NotificationSink,
    options: &RunOptions,
) -> Result<RunOutcome> {
    let artifact = retriever.retrieve()?;
    settle_artifact(&artifact, options);

    let extract = excel_read::read_first_sheet(&artifact)?;
    info!(
        file = %artifact.display(),
        columns = ?extract.schema().columns(),
        rows = extract.len(),
        "parsed export"
    );

    let current = ledger.read()?;
    info!(
        columns = ?current.schema().columns(),
        rows = current.len(),
        "loaded ledger"
    );

    let new = match reconcile::new_records(&extract, &current, &options.key_column) {
        Ok(new) => new,
        Err(err @ ToolError::SheetSchema { .. }) => {
            error!(error = %err, "reconciliation aborted, nothing appended");
            return Ok(RunOutcome::SchemaMismatch(err.to_string()));
        }
        Err(err) => return Err(err),
    };

    if new.is_empty() {
        info!("no new rows to append");
        return Ok(RunOutcome::UpToDate);
    }

    let message = reconcile::summary_message(&new, &options.key_column)?;
    let payload = reconcile::append_payload(&new, !current.schema().is_empty());

    if options.dry_run {
        info!(rows = new.len(), %message, "dry run, skipping append and notification");
        return Ok(RunOutcome::DryRun { pending: new.len() });
    }

    let written = ledger.append(&payload)?;
    info!(rows = new.len(), written, "appended new rows");

    let notified = match sink.send(&message) {
        Ok(()) => {
            info!("notification sent");
            true
        }
        Err(err) => {
            warn!(error = %err, "notification not delivered");
            false
        }
    };

    Ok(RunOutcome::Appended {
        rows: new.len(),
        notified,
    })
}

/// Waits for the artifact size to stop changing. Failing to settle is only
/// worth a warning; parsing will surface a truncated file anyway.
fn settle_artifact(path: &Path, options: &RunOptions) {
    match await_stable_size(path, options.settle_poll, options.settle_timeout) {
        Ok(size) => info!(file = %path.display(), size, "export size settled"),
        Err(WaitError::TimedOut(waited)) => {
            warn!(file = %path.display(), ?waited, "export size still changing, continuing")
        }
        Err(WaitError::Failed(err)) => {
            warn!(file = %path.display(), error = %err, "could not check export size")
        }
    }
}
