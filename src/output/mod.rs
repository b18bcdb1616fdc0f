//! Output module for lead reports and ledger statistics
//!
//! This module handles:
//! - Writing the markdown lead report of a run
//! - Persisting a finished run to the ledger
//! - Reading back and printing ledger statistics

mod markdown;
pub mod stats;
mod traits;

pub use markdown::{format_lead_report, write_lead_report};
pub use stats::{load_statistics, print_statistics, LeadStatistics};
pub use traits::{OutputError, OutputResult, RunSummary};

use crate::crawler::CrawlResult;
use crate::router::RoutedLead;
use crate::storage::{LeadLedger, RunStatus};

/// Records every result and routed lead of a run, then closes the run
///
/// Individual rows that fail to write are logged and skipped; the run is
/// marked completed either way.
pub fn persist_run(
    ledger: &dyn LeadLedger,
    run_id: i64,
    results: &[CrawlResult],
    leads: &[RoutedLead],
) -> OutputResult<()> {
    let mut failed_rows = 0usize;

    for result in results {
        if let Err(e) = ledger.record_result(run_id, result) {
            failed_rows += 1;
            tracing::warn!(url = %result.url, error = %e, "Failed to record crawl result");
        }
    }

    for lead in leads {
        if let Err(e) = ledger.record_lead(run_id, lead) {
            failed_rows += 1;
            tracing::warn!(website = %lead.lead.website, error = %e, "Failed to record lead");
        }
    }

    ledger.finish_run(run_id, RunStatus::Completed)?;

    tracing::info!(
        run_id,
        results = results.len(),
        leads = leads.len(),
        failed_rows,
        "Run persisted"
    );
    Ok(())
}
