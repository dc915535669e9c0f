//! Plain-text rendering of jobs, pages and search results

use crate::index::QueryMatch;
use crate::output::stats::JobSummary;
use crate::storage::{CrawlJob, CrawledPage};
use std::fmt::Write;

const URL_WIDTH: usize = 60;

fn shorten(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let kept: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Formats a job summary
pub fn format_job_summary(summary: &JobSummary) -> String {
    let job = &summary.job;
    let mut out = String::new();

    let _ = writeln!(out, "Job {} ({})", job.id, job.status);
    let _ = writeln!(out, "  Root:       {}", job.root_url);
    let _ = writeln!(out, "  Owner:      {} / {}", job.owner.user_id, job.owner.profile_id);
    let _ = writeln!(out, "  Created:    {}", job.created_at);
    if let Some(started) = &job.started_at {
        let _ = writeln!(out, "  Started:    {}", started);
    }
    if let Some(completed) = &job.completed_at {
        let _ = writeln!(out, "  Completed:  {}", completed);
    }
    if let Some(duration) = summary.duration_seconds {
        let _ = writeln!(out, "  Duration:   {}s", duration);
    }
    if let Some(error) = &job.error_message {
        let _ = writeln!(out, "  Error:      {}", error);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Counters:   {} discovered, {} processed, {} analyzed (max {} pages)",
        job.counters.discovered, job.counters.processed, job.counters.analyzed, job.max_pages
    );
    let _ = writeln!(
        out,
        "  Pages:      {} analyzed, {} not analyzed, {} failed ({:.1}% ok)",
        summary.pages_analyzed,
        summary.pages_discovered,
        summary.pages_failed,
        summary.success_rate()
    );

    if !summary.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  Failed pages:");
        for (url, error) in &summary.failures {
            let _ = writeln!(out, "    - {}: {}", url, error);
        }
    }

    out
}

/// Formats one line per job
pub fn format_job_list(jobs: &[CrawlJob]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>6}  {:<10}  {:>5}  {:>5}  {:>5}  {}",
        "ID", "STATUS", "DISC", "PROC", "ANLZ", "ROOT"
    );
    for job in jobs {
        let _ = writeln!(
            out,
            "{:>6}  {:<10}  {:>5}  {:>5}  {:>5}  {}",
            job.id,
            job.status.to_string(),
            job.counters.discovered,
            job.counters.processed,
            job.counters.analyzed,
            job.root_url
        );
    }
    out
}

/// Formats a job's pages as a table
pub fn format_page_table(pages: &[CrawledPage]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>3}  {:<10}  {:<width$}  {}",
        "DEPTH",
        "PRI",
        "STATUS",
        "URL",
        "TITLE / ERROR",
        width = URL_WIDTH
    );
    for page in pages {
        let note = if page.status.is_failed() {
            page.error_message.as_deref().unwrap_or("")
        } else {
            page.title.as_deref().unwrap_or("")
        };
        let _ = writeln!(
            out,
            "{:>5}  {:>3}  {:<10}  {:<width$}  {}",
            page.depth,
            page.priority,
            page.status.to_string(),
            shorten(&page.url, URL_WIDTH),
            note,
            width = URL_WIDTH
        );
    }
    out
}

/// Formats ranked search results
pub fn format_search_results(matches: &[QueryMatch]) -> String {
    if matches.is_empty() {
        return "No matches\n".to_string();
    }

    let mut out = String::new();
    for (rank, m) in matches.iter().enumerate() {
        let metadata = &m.record.metadata;
        let key = metadata
            .get("logical_key")
            .and_then(|v| v.as_str())
            .unwrap_or(&m.record.id);
        let url = metadata.get("url").and_then(|v| v.as_str()).unwrap_or("");
        let _ = writeln!(out, "{:>2}. [{:.2}] {} {}", rank + 1, m.score, key, url);
        let _ = writeln!(out, "    {}", shorten(&m.record.text, 120));
    }
    out
}
