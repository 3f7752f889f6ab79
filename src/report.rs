use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::AggregatedResult;
use crate::config::ComparisonConfig;
use crate::parsers::bytes_to_mb;
use crate::prelude::*;

pub const BENCHMARK_TOOL: &str = "wrk";

const CSV_HEADER: &str = "Environment,Runtime,Framework,Requests/sec,Avg Latency(ms),P50 Latency(ms),P90 Latency(ms),P99 Latency(ms),Throughput(MB/s),Total Requests,Errors,Timeouts,RPS StdDev,Latency StdDev";

/// Stable sort by mean requests/sec, highest first. Ties keep catalog order.
pub fn rank(mut results: Vec<AggregatedResult>) -> Vec<AggregatedResult> {
    results.sort_by(|a, b| b.requests_per_sec.total_cmp(&a.requests_per_sec));
    results
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeComparison {
    pub framework: String,
    pub base_runtime: String,
    pub alternative_runtime: String,
    pub base_rps: f64,
    pub alternative_rps: f64,
    pub base_latency_ms: f64,
    pub alternative_latency_ms: f64,
    /// Positive when the alternative serves more requests.
    pub rps_improvement_pct: f64,
    /// Positive when the alternative answers faster.
    pub latency_improvement_pct: f64,
}

pub fn rps_improvement(base: f64, alt: f64) -> f64 {
    (alt - base) / base * 100.0
}

pub fn latency_improvement(base: f64, alt: f64) -> f64 {
    (base - alt) / base * 100.0
}

/// Compares `comparison.alternative` against `comparison.base` for every
/// framework that has results for both runtimes. Frameworks are reported in
/// name order.
pub fn compare_runtimes(
    results: &[AggregatedResult],
    comparison: &ComparisonConfig,
) -> Vec<RuntimeComparison> {
    let mut groups: BTreeMap<&str, BTreeMap<&str, &AggregatedResult>> = BTreeMap::new();
    for result in results {
        groups
            .entry(result.framework.as_str())
            .or_default()
            .insert(result.runtime.as_str(), result);
    }

    groups
        .into_iter()
        .filter_map(|(framework, runtimes)| {
            let base = runtimes.get(comparison.base.as_str())?;
            let alt = runtimes.get(comparison.alternative.as_str())?;
            Some(RuntimeComparison {
                framework: framework.to_string(),
                base_runtime: comparison.base.clone(),
                alternative_runtime: comparison.alternative.clone(),
                base_rps: base.requests_per_sec,
                alternative_rps: alt.requests_per_sec,
                base_latency_ms: base.avg_latency_ms,
                alternative_latency_ms: alt.avg_latency_ms,
                rps_improvement_pct: rps_improvement(base.requests_per_sec, alt.requests_per_sec),
                latency_improvement_pct: latency_improvement(
                    base.avg_latency_ms,
                    alt.avg_latency_ms,
                ),
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport<'a> {
    pub timestamp: DateTime<Utc>,
    pub benchmark_tool: &'static str,
    pub results: Vec<JsonEntry<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonEntry<'a> {
    pub environment: &'a str,
    pub runtime: &'a str,
    pub framework: &'a str,
    pub requests_per_second: f64,
    pub avg_latency: f64,
    pub p90_latency: f64,
    pub p99_latency: f64,
    pub throughput: f64,
    pub errors: u64,
}

pub fn json_report(results: &[AggregatedResult], timestamp: DateTime<Utc>) -> JsonReport<'_> {
    JsonReport {
        timestamp,
        benchmark_tool: BENCHMARK_TOOL,
        results: results
            .iter()
            .map(|r| JsonEntry {
                environment: &r.environment,
                runtime: &r.runtime,
                framework: &r.framework,
                requests_per_second: r.requests_per_sec,
                avg_latency: r.avg_latency_ms,
                p90_latency: r.p90_latency_ms,
                p99_latency: r.p99_latency_ms,
                throughput: r.throughput,
                errors: r.errors,
            })
            .collect(),
    }
}

pub fn csv_report(results: &[AggregatedResult]) -> String {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for r in results {
        let _ = writeln!(
            out,
            "\"{}\",{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{},{},{},{:.2},{:.2}",
            r.environment.replace('"', "\"\""),
            r.runtime,
            r.framework,
            r.requests_per_sec,
            r.avg_latency_ms,
            r.p50_latency_ms,
            r.p90_latency_ms,
            r.p99_latency_ms,
            bytes_to_mb(r.throughput),
            r.total_requests,
            r.errors,
            r.timeouts,
            r.std_rps,
            r.std_latency_ms,
        );
    }
    out
}

fn write_artifact(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|source| Error::OutputWriteFailure {
        path: path.display().to_string(),
        source,
    })
}

pub fn write_json(path: &Path, results: &[AggregatedResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(&json_report(results, Utc::now()))?;
    write_artifact(path, &json)
}

pub fn write_csv(path: &Path, results: &[AggregatedResult]) -> Result<()> {
    write_artifact(path, &csv_report(results))
}

/// Writes both artifacts. A failure on one does not stop the other; every
/// failure is logged and returned.
pub fn write_artifacts(json_path: &Path, csv_path: &Path, results: &[AggregatedResult]) -> Vec<Error> {
    let mut errors = Vec::new();
    match write_json(json_path, results) {
        Ok(()) => info!("Detailed results saved to {}", json_path.display()),
        Err(e) => {
            error!("{}", e);
            errors.push(e);
        }
    }
    match write_csv(csv_path, results) {
        Ok(()) => info!("CSV results saved to {}", csv_path.display()),
        Err(e) => {
            error!("{}", e);
            errors.push(e);
        }
    }
    errors
}

pub fn log_ranking(ranked: &[AggregatedResult]) {
    info!("=== FINAL RESULTS ===");
    info!("Ranking by Requests/Second:");
    for (i, r) in ranked.iter().enumerate() {
        info!(
            "{}. {}: {:.2} req/sec (±{:.2})",
            i + 1,
            r.environment,
            r.requests_per_sec,
            r.std_rps
        );
    }

    info!("Detailed Comparison:");
    info!(
        "{:<30}{:<12}{:<12}{:<12}{:<12}{:<18}Errors",
        "Environment", "Req/sec", "Avg Lat(ms)", "P90 Lat(ms)", "P99 Lat(ms)", "Throughput(MB/s)"
    );
    info!("{}", "-".repeat(108));
    for r in ranked {
        info!(
            "{:<30}{:<12.2}{:<12.2}{:<12.2}{:<12.2}{:<18.2}{}",
            r.environment,
            r.requests_per_sec,
            r.avg_latency_ms,
            r.p90_latency_ms,
            r.p99_latency_ms,
            bytes_to_mb(r.throughput),
            r.errors
        );
    }
}

pub fn log_comparisons(comparisons: &[RuntimeComparison]) {
    if comparisons.is_empty() {
        return;
    }
    let first = &comparisons[0];
    info!(
        "=== {} vs {} Comparison ===",
        first.base_runtime, first.alternative_runtime
    );
    for c in comparisons {
        info!("{}:", c.framework.to_uppercase());
        info!(
            "  {}: {:.2} req/sec, {:.2}ms avg latency",
            c.base_runtime, c.base_rps, c.base_latency_ms
        );
        info!(
            "  {}: {:.2} req/sec, {:.2}ms avg latency",
            c.alternative_runtime, c.alternative_rps, c.alternative_latency_ms
        );
        info!("  RPS Improvement: {:.1}%", c.rps_improvement_pct);
        info!("  Latency Improvement: {:.1}%", c.latency_improvement_pct);
    }
}
