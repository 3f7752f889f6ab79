use crate::config::Pairing;
use crate::wrk::BenchmarkResult;

/// One pairing's statistics across its successful runs.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub environment: String,
    pub runtime: String,
    pub framework: String,
    pub requests_per_sec: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p90_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub throughput: f64,
    pub total_requests: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub std_rps: f64,
    pub std_latency_ms: f64,
    pub runs: usize,
    pub raw_runs: Vec<BenchmarkResult>,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// Returns `None` when no run succeeded.
pub fn summarize(pairing: &Pairing, results: Vec<BenchmarkResult>) -> Option<AggregatedResult> {
    if results.is_empty() {
        return None;
    }
    let collect = |f: fn(&BenchmarkResult) -> f64| results.iter().map(f).collect::<Vec<_>>();

    let rps = collect(|r| r.requests_per_sec);
    let latency = collect(|r| r.avg_latency_ms);
    let requests_per_sec = mean(&rps);
    let avg_latency_ms = mean(&latency);
    let throughput =
        results.iter().map(|r| r.throughput).sum::<f64>() / results.len() as f64;

    Some(AggregatedResult {
        environment: pairing.name.clone(),
        runtime: pairing.runtime.clone(),
        framework: pairing.framework.clone(),
        requests_per_sec,
        avg_latency_ms,
        p50_latency_ms: mean(&collect(|r| r.p50_latency_ms)),
        p90_latency_ms: mean(&collect(|r| r.p90_latency_ms)),
        p99_latency_ms: mean(&collect(|r| r.p99_latency_ms)),
        throughput,
        total_requests: results.iter().map(|r| r.total_requests).sum(),
        errors: results.iter().map(|r| r.errors).sum(),
        timeouts: results.iter().map(|r| r.timeouts).sum(),
        std_rps: std_dev(&rps, requests_per_sec),
        std_latency_ms: std_dev(&latency, avg_latency_ms),
        runs: results.len(),
        raw_runs: results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairing() -> Pairing {
        Pairing::new("Hono on Bun", 3002, "bun", "hono", "hono_server.js")
    }

    fn result(rps: f64, latency: f64) -> BenchmarkResult {
        BenchmarkResult {
            requests_per_sec: rps,
            avg_latency_ms: latency,
            p50_latency_ms: latency,
            p90_latency_ms: latency * 2.0,
            p99_latency_ms: latency * 4.0,
            throughput: 1_048_576.0,
            total_requests: 1000,
            errors: 3,
            timeouts: 1,
            ..Default::default()
        }
    }

    #[test]
    fn identical_runs_have_zero_deviation() {
        let agg = summarize(&pairing(), vec![result(5000.0, 2.0); 4]).unwrap();
        assert_eq!(agg.requests_per_sec, 5000.0);
        assert_eq!(agg.std_rps, 0.0);
        assert_eq!(agg.std_latency_ms, 0.0);
        assert_eq!(agg.runs, 4);
        assert_eq!(agg.raw_runs.len(), 4);
    }

    #[test]
    fn uses_population_deviation() {
        let agg = summarize(&pairing(), vec![result(100.0, 1.0), result(300.0, 3.0)]).unwrap();
        assert_eq!(agg.requests_per_sec, 200.0);
        assert_eq!(agg.std_rps, 100.0);
        assert_eq!(agg.avg_latency_ms, 2.0);
        assert_eq!(agg.std_latency_ms, 1.0);
        assert_eq!(agg.p90_latency_ms, 4.0);
        assert_eq!(agg.p99_latency_ms, 8.0);
    }

    #[test]
    fn sums_counters_and_averages_throughput() {
        let agg = summarize(&pairing(), vec![result(1.0, 1.0); 3]).unwrap();
        assert_eq!(agg.total_requests, 3000);
        assert_eq!(agg.errors, 9);
        assert_eq!(agg.timeouts, 3);
        assert_eq!(agg.throughput, 1_048_576.0);
        assert_eq!(agg.environment, "Hono on Bun");
        assert_eq!(agg.runtime, "bun");
        assert_eq!(agg.framework, "hono");
    }

    #[test]
    fn no_runs_no_summary() {
        assert!(summarize(&pairing(), Vec::new()).is_none());
    }
}
