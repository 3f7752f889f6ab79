use std::sync::LazyLock;

use regex::{Captures, Regex};
use tokio::process::Command;

use crate::config::{BenchmarkConfig, WrkConfig};
use crate::parsers::{latency_to_ms, transfer_to_bytes};
use crate::prelude::*;

/// Metrics extracted from one wrk report. Every field is zero when its line
/// is missing from the report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkResult {
    pub requests_per_sec: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p75_latency_ms: f64,
    pub p90_latency_ms: f64,
    pub p99_latency_ms: f64,
    /// Bytes per second.
    pub throughput: f64,
    pub total_requests: u64,
    /// `socket_errors + timeouts + application_errors`.
    pub errors: u64,
    pub timeouts: u64,
    /// Connect, read and write failures.
    pub socket_errors: u64,
    /// Non-2xx/3xx responses.
    pub application_errors: u64,
    pub raw_output: String,
}

#[async_trait::async_trait]
pub trait LoadGenerator: Send + Sync {
    /// Runs the load generator against `url` and returns its raw report.
    async fn execute(&self, config: &BenchmarkConfig, url: &str) -> Result<String>;

    async fn run(&self, config: &BenchmarkConfig, url: &str) -> Result<BenchmarkResult> {
        let output = self.execute(config, url).await?;
        Ok(parse_wrk_output(&output))
    }
}

#[derive(Debug, Default, Clone)]
pub struct WrkRunner;

#[async_trait::async_trait]
impl LoadGenerator for WrkRunner {
    async fn execute(&self, config: &BenchmarkConfig, url: &str) -> Result<String> {
        let mut cmd = Command::new(&config.wrk.binary);
        cmd.args(wrk_args(&config.wrk, url));
        exec(&mut cmd, Some(config.wrk_deadline())).await
    }
}

pub fn wrk_args(wrk: &WrkConfig, url: &str) -> Vec<String> {
    let mut args = vec![
        "-c".to_string(),
        wrk.connections.to_string(),
        "-t".to_string(),
        wrk.threads.to_string(),
        "-d".to_string(),
        wrk.duration.clone(),
        "--timeout".to_string(),
        wrk.timeout.clone(),
    ];
    if wrk.latency {
        args.push("--latency".to_string());
    }
    args.push(url.to_string());
    args
}

struct LineRule {
    pattern: Regex,
    apply: fn(&Captures<'_>, &mut BenchmarkResult),
}

impl LineRule {
    fn new(pattern: &str, apply: fn(&Captures<'_>, &mut BenchmarkResult)) -> Self {
        LineRule {
            pattern: Regex::new(pattern).expect("line rule pattern must compile"),
            apply,
        }
    }
}

fn cap_f64(cap: &Captures<'_>, i: usize) -> Option<f64> {
    cap.get(i).and_then(|m| m.as_str().parse::<f64>().ok())
}

fn cap_u64(cap: &Captures<'_>, i: usize) -> Option<u64> {
    cap.get(i).and_then(|m| m.as_str().parse::<u64>().ok())
}

fn cap_latency(cap: &Captures<'_>, value: usize, unit: usize) -> Option<f64> {
    let v = cap_f64(cap, value)?;
    let unit = cap.get(unit)?.as_str();
    Some(latency_to_ms(v, unit))
}

static LINE_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    vec![
        LineRule::new(r"Requests/sec:\s+([0-9.]+)", |cap, r| {
            if let Some(v) = cap_f64(cap, 1) {
                r.requests_per_sec = v;
            }
        }),
        LineRule::new(r"Transfer/sec:\s+([0-9.]+)\s*([KMG]?B)\b", |cap, r| {
            if let (Some(v), Some(unit)) = (cap_f64(cap, 1), cap.get(2)) {
                if let Some(bytes) = transfer_to_bytes(v, unit.as_str()) {
                    r.throughput = bytes;
                }
            }
        }),
        LineRule::new(r"(\d+) requests in", |cap, r| {
            if let Some(v) = cap_u64(cap, 1) {
                r.total_requests = v;
            }
        }),
        // avg, stdev (ignored), max
        LineRule::new(
            r"Latency\s+([0-9.]+)(\w+)\s+([0-9.]+)(\w+)\s+([0-9.]+)(\w+)",
            |cap, r| {
                if let Some(avg) = cap_latency(cap, 1, 2) {
                    r.avg_latency_ms = avg;
                }
                if let Some(max) = cap_latency(cap, 5, 6) {
                    r.max_latency_ms = max;
                }
            },
        ),
        LineRule::new(r"^\s+(\d+)%\s+([0-9.]+)(\w+)", |cap, r| {
            let (Some(pct), Some(value)) = (cap_u64(cap, 1), cap_latency(cap, 2, 3)) else {
                return;
            };
            match pct {
                50 => r.p50_latency_ms = value,
                75 => r.p75_latency_ms = value,
                90 => r.p90_latency_ms = value,
                99 => r.p99_latency_ms = value,
                _ => {}
            }
        }),
        LineRule::new(
            r"Socket errors:\s+connect\s+(\d+),\s+read\s+(\d+),\s+write\s+(\d+),\s+timeout\s+(\d+)",
            |cap, r| {
                r.socket_errors = (1..=3).filter_map(|i| cap_u64(cap, i)).sum();
                r.timeouts = cap_u64(cap, 4).unwrap_or(0);
            },
        ),
        LineRule::new(r"Non-2xx or 3xx responses:\s+(\d+)", |cap, r| {
            r.application_errors += cap_u64(cap, 1).unwrap_or(0);
        }),
    ]
});

/// Parses a wrk report. Every rule is tried against every line, so line order
/// does not matter and unrecognized lines are skipped.
pub fn parse_wrk_output(output: &str) -> BenchmarkResult {
    let mut result = BenchmarkResult::default();
    for line in output.lines() {
        for rule in LINE_RULES.iter() {
            if let Some(cap) = rule.pattern.captures(line) {
                (rule.apply)(&cap, &mut result);
            }
        }
    }
    result.errors = result.socket_errors + result.timeouts + result.application_errors;
    result.raw_output = output.to_string();
    result
}
