//! Report rendering for cycles, benchmark runs and the store summary.

use colored::Colorize;
use serde::Serialize;

use crate::admin::{CleanReport, StoreSummary};
use crate::bench::BenchReport;
use vectune_core::{Analysis, CycleResult};

/// Output format of every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

const RULE: &str = "═══════════════════════════════════════════════════════════════════";

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn heading(out: &mut String, title: &str) {
    out.push_str(&format!("\n{}\n", RULE.bold()));
    out.push_str(&format!("  {}\n", title.bold().cyan()));
    out.push_str(&format!("{}\n\n", RULE.bold()));
}

fn observation(analysis: &Analysis) -> String {
    if let Some(error) = &analysis.query_error {
        return format!(
            "{:.2} ms (degraded: {})",
            analysis.execution_time_ms, error
        );
    }
    format!(
        "{:.2} ms ({} scan, {} rows, index: {})",
        analysis.execution_time_ms,
        analysis.scan_kind(),
        analysis.rows_scanned(),
        analysis.scan.index_name.as_deref().unwrap_or("none")
    )
}

fn issue_list(analysis: &Analysis) -> String {
    if analysis.issues.is_empty() {
        return "none".to_string();
    }
    analysis
        .issues
        .iter()
        .map(|issue| issue.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

pub fn render_cycle(result: &CycleResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => cycle_text(result),
        OutputFormat::Json => json(result),
        OutputFormat::Markdown => cycle_markdown(result),
    }
}

fn cycle_text(result: &CycleResult) -> String {
    let mut out = String::new();
    heading(&mut out, "Optimization Cycle");

    out.push_str(&format!("  Cycle:       {}\n", result.cycle_id));
    out.push_str(&format!("  Scope:       {}\n", result.scope));
    out.push_str(&format!("  Query:       '{}'\n\n", result.query_text));

    out.push_str(&format!("  Before:      {}\n", observation(&result.analysis_before)));
    out.push_str(&format!(
        "  Issues:      {}\n",
        issue_list(&result.analysis_before)
    ));

    let decision = &result.decision;
    out.push_str(&format!(
        "  Decision:    {} {}\n",
        decision.action.to_string().bold(),
        format!(
            "({}, confidence {})",
            decision.source, decision.confidence
        )
        .dimmed()
    ));
    out.push_str(&format!("  Reasoning:   {}\n", decision.reasoning));
    out.push_str(&format!(
        "  Expected:    {}\n",
        decision.expected_improvement
    ));

    let action = &result.action_result;
    let status = if action.success {
        "✓".green()
    } else {
        "✗".red()
    };
    out.push_str(&format!("  Action:      {} {}", status, action.outcome));
    if let Some(name) = &action.index_name {
        out.push_str(&format!(" {}", name));
    }
    out.push('\n');
    if let Some(error) = &action.error {
        out.push_str(&format!("  Error:       {}\n", error.red()));
    }

    if let Some(after) = &result.analysis_after {
        out.push_str(&format!("  After:       {}\n", observation(after)));
    }
    match result.improvement_percent {
        Some(pct) => out.push_str(&format!(
            "  Improvement: {}\n",
            format!("{:.1}%", pct).green().bold()
        )),
        None => out.push_str(&format!(
            "  Improvement: {}\n",
            "no optimization performed".yellow()
        )),
    }
    out.push_str(&format!(
        "  Duration:    {:.2}s\n",
        result.cycle_duration_seconds
    ));
    out
}

fn cycle_markdown(result: &CycleResult) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Optimization Cycle: {}\n\n", result.scope));
    md.push_str(&format!("Query: `{}`\n\n", result.query_text));
    md.push_str("| Field | Value |\n|-------|-------|\n");
    md.push_str(&format!(
        "| Before | {} |\n",
        observation(&result.analysis_before)
    ));
    md.push_str(&format!(
        "| Issues | {} |\n",
        issue_list(&result.analysis_before)
    ));
    md.push_str(&format!(
        "| Decision | {} ({}, {}) |\n",
        result.decision.action, result.decision.source, result.decision.confidence
    ));
    md.push_str(&format!(
        "| Outcome | {} |\n",
        result.action_result.outcome
    ));
    if let Some(after) = &result.analysis_after {
        md.push_str(&format!("| After | {} |\n", observation(after)));
    }
    if let Some(pct) = result.improvement_percent {
        md.push_str(&format!("| Improvement | {:.1}% |\n", pct));
    }
    md
}

// ---------------------------------------------------------------------------
// Benchmark
// ---------------------------------------------------------------------------

pub fn render_bench(report: &BenchReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => bench_text(report),
        OutputFormat::Json => json(report),
        OutputFormat::Markdown => bench_markdown(report),
    }
}

fn bench_text(report: &BenchReport) -> String {
    let mut out = String::new();
    heading(&mut out, "Benchmark Summary");

    out.push_str(&format!("  Scope:                   {}\n", report.scope));
    out.push_str(&format!(
        "  Total Queries:           {}\n",
        report.total_queries
    ));
    out.push_str(&format!(
        "  Optimizations Performed: {}\n",
        report.statistics.optimizations_performed
    ));
    out.push_str(&format!(
        "  Verified:                {}\n",
        report.statistics.verified_optimizations
    ));
    out.push_str(&format!(
        "  Average Improvement:     {}\n\n",
        format!("{:.1}%", report.average_improvement_percent).green().bold()
    ));

    out.push_str(&format!("  {}\n", "Detailed Results".bold().underline()));
    for (i, result) in report.results.iter().enumerate() {
        let line = match result.improvement_percent {
            Some(pct) => format!("{:.1}% improvement", pct).green().to_string(),
            None => "No optimization needed".yellow().to_string(),
        };
        out.push_str(&format!("    Query {}: {}\n", i + 1, line));
    }
    out
}

fn bench_markdown(report: &BenchReport) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Vectune Benchmark: {}\n\n", report.scope));
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Total Queries | {} |\n", report.total_queries));
    md.push_str(&format!(
        "| Optimizations Performed | {} |\n",
        report.statistics.optimizations_performed
    ));
    md.push_str(&format!(
        "| Verified Optimizations | {} |\n",
        report.statistics.verified_optimizations
    ));
    md.push_str(&format!(
        "| Average Improvement | {:.1}% |\n\n",
        report.average_improvement_percent
    ));

    md.push_str("## Per-Query\n\n");
    md.push_str("| # | Query | Action | Before | After | Improvement |\n");
    md.push_str("|---|-------|--------|--------|-------|-------------|\n");
    for (i, result) in report.results.iter().enumerate() {
        let after = result
            .analysis_after
            .as_ref()
            .map(|a| format!("{:.2} ms", a.execution_time_ms))
            .unwrap_or_else(|| "-".to_string());
        let improvement = result
            .improvement_percent
            .map(|pct| format!("{:.1}%", pct))
            .unwrap_or_else(|| "-".to_string());
        md.push_str(&format!(
            "| {} | {} | {} | {:.2} ms | {} | {} |\n",
            i + 1,
            result.query_text,
            result.decision.action,
            result.analysis_before.execution_time_ms,
            after,
            improvement
        ));
    }
    md
}

// ---------------------------------------------------------------------------
// Store summary
// ---------------------------------------------------------------------------

pub fn render_summary(summary: &StoreSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => summary_text(summary),
        OutputFormat::Json => json(summary),
        OutputFormat::Markdown => summary_markdown(summary),
    }
}

fn summary_text(summary: &StoreSummary) -> String {
    let mut out = String::new();
    heading(&mut out, "Project Summary");

    out.push_str(&format!("  {}\n", "Indexes".yellow().bold()));
    out.push_str(&format!("    Indexes Created: {}\n", summary.indexes.len()));
    for index in &summary.indexes {
        out.push_str(&format!(
            "    {} {} on {} ({})\n",
            "•".cyan(),
            index.index_name,
            index.table_name,
            index.index_type
        ));
    }

    out.push_str(&format!("\n  {}\n", "Controller Performance".yellow().bold()));
    if summary.actions.is_empty() {
        out.push_str("    No optimizations performed yet\n");
    }
    for tally in &summary.actions {
        out.push_str(&format!(
            "    {}: {} total, {:.0}% success\n",
            tally.action_type,
            tally.total,
            tally.success_rate()
        ));
    }

    out.push_str(&format!("\n  {}\n", "Query Performance".yellow().bold()));
    let m = &summary.metrics;
    match (m.avg_execution_ms, m.min_execution_ms, m.max_execution_ms) {
        (Some(avg), Some(min), Some(max)) if m.query_count > 0 => {
            out.push_str(&format!("    Total Queries: {}\n", m.query_count));
            out.push_str(&format!("    Average Time:  {:.2} ms\n", avg));
            out.push_str(&format!("    Fastest Query: {:.2} ms\n", min));
            out.push_str(&format!("    Slowest Query: {:.2} ms\n", max));
        }
        _ => out.push_str("    No query metrics available\n"),
    }
    out
}

fn summary_markdown(summary: &StoreSummary) -> String {
    let mut md = String::from("# Vectune Summary\n\n## Indexes\n\n");
    if summary.indexes.is_empty() {
        md.push_str("None.\n\n");
    } else {
        md.push_str("| Index | Table | Type | Created |\n|-------|-------|------|---------|\n");
        for index in &summary.indexes {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                index.index_name,
                index.table_name,
                index.index_type,
                index.created_at.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        md.push('\n');
    }

    md.push_str("## Actions\n\n| Action | Total | Success |\n|--------|-------|---------|\n");
    for tally in &summary.actions {
        md.push_str(&format!(
            "| {} | {} | {:.0}% |\n",
            tally.action_type,
            tally.total,
            tally.success_rate()
        ));
    }

    let m = &summary.metrics;
    md.push_str(&format!("\n## Queries\n\nObserved: {}\n", m.query_count));
    if let (Some(avg), Some(min), Some(max)) =
        (m.avg_execution_ms, m.min_execution_ms, m.max_execution_ms)
    {
        md.push_str(&format!(
            "\nAverage {:.2} ms, fastest {:.2} ms, slowest {:.2} ms\n",
            avg, min, max
        ));
    }
    md
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

pub fn render_clean(report: &CleanReport, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return json(report);
    }

    let mut out = String::new();
    for name in &report.dropped {
        out.push_str(&format!("{} Dropped: {}\n", "✓".green(), name));
    }
    for name in &report.absent {
        out.push_str(&format!("{} Not present: {}\n", "-".dimmed(), name));
    }
    for (name, error) in &report.failed {
        out.push_str(&format!("{} Could not drop {}: {}\n", "✗".red(), name, error));
    }
    out.push_str(&format!(
        "{} Registry cleaned ({} entries)\n",
        "✓".green(),
        report.registry_entries_removed
    ));
    out
}
