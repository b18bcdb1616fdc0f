//! Markdown lead report
//!
//! Routed leads are grouped by tier (hot, warm, skip) and listed best score
//! first, after a short run overview.

use crate::crawler::CrawlStatus;
use crate::output::traits::{OutputResult, RunSummary};
use crate::router::{LeadTier, RoutedLead};
use std::fs;
use std::path::Path;

/// Writes the lead report for a run
///
/// # Arguments
///
/// * `summary` - Run overview
/// * `leads` - Routed leads, in any order
/// * `output_path` - Path where the markdown file should be written
pub fn write_lead_report(
    summary: &RunSummary,
    leads: &[RoutedLead],
    output_path: &Path,
) -> OutputResult<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, format_lead_report(summary, leads))?;
    Ok(())
}

/// Formats the lead report as markdown
pub fn format_lead_report(summary: &RunSummary, leads: &[RoutedLead]) -> String {
    let mut md = String::new();

    md.push_str("# Lead Report\n\n");

    md.push_str("## Run Information\n\n");
    if let Some(run_id) = summary.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Plan**: {}\n", summary.plan_tier));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        summary.duration_seconds()
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", summary.config_hash));

    md.push_str("## Discovery\n\n");
    md.push_str(&format!("- **Queries**: {}\n", summary.queries));
    md.push_str(&format!(
        "- **Provider Calls**: {} ({} failed)\n",
        summary.provider_calls, summary.provider_failures
    ));
    md.push_str(&format!("- **Seeds**: {}\n", summary.seeds));
    md.push_str(&format!("- **Scheduled**: {}\n\n", summary.scheduled));

    md.push_str("## Crawl Outcomes\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    for status in [CrawlStatus::Ok, CrawlStatus::Skipped, CrawlStatus::Error] {
        md.push_str(&format!("| {} | {} |\n", status, summary.count(status)));
    }
    md.push_str(&format!("\n- **Success Rate**: {:.1}%\n\n", summary.success_rate()));

    let mut sorted: Vec<&RoutedLead> = leads.iter().collect();
    sorted.sort_by(|a, b| b.decision.score.cmp(&a.decision.score));

    for (tier, heading) in [
        (LeadTier::Hot, "Hot Leads"),
        (LeadTier::Warm, "Warm Leads"),
        (LeadTier::Skip, "Skipped Leads"),
    ] {
        let group: Vec<&RoutedLead> = sorted
            .iter()
            .copied()
            .filter(|l| l.decision.tier == tier)
            .collect();

        md.push_str(&format!("## {} ({})\n\n", heading, group.len()));
        if group.is_empty() {
            md.push_str("_None._\n\n");
            continue;
        }

        if tier == LeadTier::Skip {
            for lead in group {
                md.push_str(&format!(
                    "- {} (score {})\n",
                    lead.lead.website, lead.decision.score
                ));
            }
            md.push('\n');
            continue;
        }

        md.push_str("| Score | Company | Website | Match | Channels | Next Actions |\n");
        md.push_str("|-------|---------|---------|-------|----------|--------------|\n");
        for lead in &group {
            md.push_str(&format!(
                "| {} | {} | {} | {:.0}% | {} | {} |\n",
                lead.decision.score,
                cell(lead.lead.company_guess.as_deref().unwrap_or("-")),
                cell(&lead.lead.website),
                lead.decision.match_fraction * 100.0,
                cell(&lead.decision.preferred_channels.join(", ")),
                cell(&lead.decision.next_actions.join("; ")),
            ));
        }
        md.push('\n');

        for lead in &group {
            md.push_str(&format!("### {}\n\n", lead.lead.website));
            for reason in &lead.decision.reasons {
                md.push_str(&format!("- {}\n", reason));
            }
            md.push('\n');
        }
    }

    md
}

/// Escapes a table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
