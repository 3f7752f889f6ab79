use crate::aggregate::{AggregatedResult, summarize};
use crate::config::{BenchmarkConfig, Pairing};
use crate::http_probe::{READY_ATTEMPTS, READY_INTERVAL};
use crate::parsers::bytes_to_mb;
use crate::prelude::*;
use crate::process::ProcessManager;
use crate::wrk::{BenchmarkResult, LoadGenerator};

/// Runs every pairing of the catalog, one process at a time.
pub struct Orchestrator<P, L> {
    config: BenchmarkConfig,
    processes: P,
    load: L,
}

impl<P: ProcessManager, L: LoadGenerator> Orchestrator<P, L> {
    pub fn new(config: BenchmarkConfig, processes: P, load: L) -> Self {
        Orchestrator {
            config,
            processes,
            load,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Benchmarks the catalog in order. Pairings without a single successful
    /// run are left out.
    pub async fn run_all(&self) -> Vec<AggregatedResult> {
        let mut results = Vec::new();
        for pairing in &self.config.pairings {
            match self.run_pairing(pairing).await {
                Some(aggregated) => results.push(aggregated),
                None => error!(
                    "No successful runs for {}, leaving it out of the report",
                    pairing.name
                ),
            }
        }
        results
    }

    pub async fn run_pairing(&self, pairing: &Pairing) -> Option<AggregatedResult> {
        info!("=== Starting {} ===", pairing.name);

        let mut runs = Vec::new();
        for run in 1..=self.config.runs {
            info!(
                "--- Run {}/{} for {} ---",
                run, self.config.runs, pairing.name
            );
            match self.run_once(pairing).await {
                Ok(result) => {
                    if result.requests_per_sec == 0.0 {
                        warn!("Run {} reported no Requests/sec line", run);
                        debug!("Raw wrk output:\n{}", result.raw_output);
                    }
                    log_run(run, &result);
                    runs.push(result);
                }
                Err(e) => error!("Run {} for {} failed: {}", run, pairing.name, e),
            }
        }

        let aggregated = summarize(pairing, runs)?;
        log_aggregate(&aggregated);
        Some(aggregated)
    }

    /// Spawn, warm up, health-check, benchmark, then stop and cool down.
    /// Once a process exists it is always terminated before returning. The
    /// cooldown only follows a run that reached the load generator.
    async fn run_once(&self, pairing: &Pairing) -> Result<BenchmarkResult> {
        let handle = self.processes.spawn(pairing).await?;

        tokio::time::sleep(self.config.warmup()).await;

        if !self
            .processes
            .wait_until_ready(pairing.port, READY_ATTEMPTS, READY_INTERVAL)
            .await
        {
            self.stop(pairing, handle).await;
            return Err(Error::HealthCheckTimeout {
                port: pairing.port,
                attempts: READY_ATTEMPTS,
            });
        }

        let outcome = self.load.run(&self.config, &pairing.url()).await;

        self.stop(pairing, handle).await;
        tokio::time::sleep(self.config.cooldown()).await;

        outcome
    }

    async fn stop(&self, pairing: &Pairing, handle: P::Handle) {
        if let Err(e) = self.processes.terminate(handle).await {
            warn!("Failed to stop {}: {}", pairing.name, e);
        }
    }
}

fn log_run(run: u32, result: &BenchmarkResult) {
    info!("Run {} Results:", run);
    info!("  Requests/sec: {:.2}", result.requests_per_sec);
    info!("  Avg Latency: {:.2}ms", result.avg_latency_ms);
    info!("  P50 Latency: {:.2}ms", result.p50_latency_ms);
    info!("  P90 Latency: {:.2}ms", result.p90_latency_ms);
    info!("  P99 Latency: {:.2}ms", result.p99_latency_ms);
    info!("  Throughput: {:.2}MB/sec", bytes_to_mb(result.throughput));
    info!("  Total Requests: {}", result.total_requests);
    info!("  Errors: {}", result.errors);
    info!("  Timeouts: {}", result.timeouts);
}

fn log_aggregate(agg: &AggregatedResult) {
    info!("{} - Average Results ({} runs):", agg.environment, agg.runs);
    info!(
        "  Requests/sec: {:.2} (±{:.2})",
        agg.requests_per_sec, agg.std_rps
    );
    info!(
        "  Avg Latency: {:.2}ms (±{:.2})",
        agg.avg_latency_ms, agg.std_latency_ms
    );
    info!("  P50 Latency: {:.2}ms", agg.p50_latency_ms);
    info!("  P90 Latency: {:.2}ms", agg.p90_latency_ms);
    info!("  P99 Latency: {:.2}ms", agg.p99_latency_ms);
    info!("  Throughput: {:.2}MB/sec", bytes_to_mb(agg.throughput));
    info!("  Total Requests: {}", agg.total_requests);
    info!("  Total Errors: {}", agg.errors);
    info!("  Total Timeouts: {}", agg.timeouts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::rank;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeProcesses {
        fail_spawn: HashSet<u32>,
        unhealthy: HashSet<u32>,
        spawned: Mutex<u32>,
        terminated: Mutex<Vec<u32>>,
    }

    #[async_trait::async_trait]
    impl ProcessManager for FakeProcesses {
        type Handle = u32;

        async fn spawn(&self, pairing: &Pairing) -> Result<u32> {
            let mut spawned = self.spawned.lock().unwrap();
            *spawned += 1;
            if self.fail_spawn.contains(&*spawned) {
                return Err(Error::SpawnFailure {
                    name: pairing.name.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no runtime"),
                });
            }
            Ok(*spawned)
        }

        async fn probe_liveness(&self, _port: u16) -> bool {
            let current = *self.spawned.lock().unwrap();
            !self.unhealthy.contains(&current)
        }

        async fn terminate(&self, handle: u32) -> Result<()> {
            self.terminated.lock().unwrap().push(handle);
            Ok(())
        }
    }

    /// Hands out queued reports in order; `None` simulates a launch failure.
    struct ScriptedLoad {
        reports: Mutex<VecDeque<Option<String>>>,
    }

    impl ScriptedLoad {
        fn new(reports: Vec<Option<&str>>) -> Self {
            ScriptedLoad {
                reports: Mutex::new(reports.into_iter().map(|r| r.map(str::to_string)).collect()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LoadGenerator for ScriptedLoad {
        async fn execute(&self, _config: &BenchmarkConfig, url: &str) -> Result<String> {
            match self.reports.lock().unwrap().pop_front().flatten() {
                Some(report) => Ok(report),
                None => Err(Error::ExecutionFailure {
                    cmd: format!("wrk {}", url),
                    reason: "No such file or directory".to_string(),
                }),
            }
        }
    }

    fn report(rps: u32, requests: u32) -> String {
        format!(
            "  {} requests in 30.00s, 1.00MB read\n  Socket errors: connect 0, read 1, write 0, timeout 2\nRequests/sec: {}.00\n",
            requests, rps
        )
    }

    fn config(pairings: Vec<Pairing>, runs: u32) -> BenchmarkConfig {
        BenchmarkConfig {
            warmup_ms: 0,
            cooldown_ms: 0,
            runs,
            pairings,
            ..Default::default()
        }
    }

    fn hono_bun() -> Pairing {
        Pairing::new("Hono on Bun", 3002, "bun", "hono", "hono_server.js")
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_is_excluded_from_aggregate() {
        let r1 = report(100, 1000);
        let r3 = report(300, 3000);
        let orchestrator = Orchestrator::new(
            config(vec![hono_bun()], 3),
            FakeProcesses::default(),
            ScriptedLoad::new(vec![Some(&r1), None, Some(&r3)]),
        );

        let agg = orchestrator.run_pairing(&hono_bun()).await.unwrap();
        assert_eq!(agg.runs, 2);
        assert_eq!(agg.raw_runs.len(), 2);
        assert_eq!(agg.total_requests, 4000);
        assert_eq!(agg.errors, 6);
        assert_eq!(agg.timeouts, 4);
        assert_eq!(agg.requests_per_sec, 200.0);
        assert_eq!(
            *orchestrator.processes.terminated.lock().unwrap(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_skips_run_without_terminate() {
        let r = report(100, 1000);
        let orchestrator = Orchestrator::new(
            config(vec![hono_bun()], 2),
            FakeProcesses {
                fail_spawn: HashSet::from([1]),
                ..Default::default()
            },
            ScriptedLoad::new(vec![Some(&r)]),
        );

        let agg = orchestrator.run_pairing(&hono_bun()).await.unwrap();
        assert_eq!(agg.runs, 1);
        assert_eq!(*orchestrator.processes.terminated.lock().unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn unhealthy_server_is_stopped_and_skipped() {
        let r = report(100, 1000);
        let orchestrator = Orchestrator::new(
            config(vec![hono_bun()], 2),
            FakeProcesses {
                unhealthy: HashSet::from([1]),
                ..Default::default()
            },
            ScriptedLoad::new(vec![Some(&r)]),
        );

        let agg = orchestrator.run_pairing(&hono_bun()).await.unwrap();
        assert_eq!(agg.runs, 1);
        assert_eq!(agg.requests_per_sec, 100.0);
        assert_eq!(
            *orchestrator.processes.terminated.lock().unwrap(),
            vec![1, 2]
        );
    }

    fn timed_config(runs: u32) -> BenchmarkConfig {
        BenchmarkConfig {
            warmup_ms: 3000,
            cooldown_ms: 2000,
            ..config(vec![hono_bun()], runs)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_run_waits_warmup_and_cooldown() {
        let r = report(100, 1000);
        let orchestrator = Orchestrator::new(
            timed_config(2),
            FakeProcesses::default(),
            ScriptedLoad::new(vec![Some(&r), Some(&r)]),
        );

        let started = tokio::time::Instant::now();
        let agg = orchestrator.run_pairing(&hono_bun()).await.unwrap();
        assert_eq!(agg.runs, 2);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_spawn_adds_no_wait() {
        let r = report(100, 1000);
        let orchestrator = Orchestrator::new(
            timed_config(2),
            FakeProcesses {
                fail_spawn: HashSet::from([1]),
                ..Default::default()
            },
            ScriptedLoad::new(vec![Some(&r)]),
        );

        let started = tokio::time::Instant::now();
        orchestrator.run_pairing(&hono_bun()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_health_check_skips_cooldown() {
        let r = report(100, 1000);
        let orchestrator = Orchestrator::new(
            timed_config(2),
            FakeProcesses {
                unhealthy: HashSet::from([1]),
                ..Default::default()
            },
            ScriptedLoad::new(vec![Some(&r)]),
        );

        let started = tokio::time::Instant::now();
        orchestrator.run_pairing(&hono_bun()).await.unwrap();
        let polling = READY_INTERVAL * (READY_ATTEMPTS - 1);
        assert_eq!(
            started.elapsed(),
            Duration::from_secs(3) + polling + Duration::from_secs(5)
        );
        assert_eq!(
            *orchestrator.processes.terminated.lock().unwrap(),
            vec![1, 2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pairing_without_successes_is_omitted() {
        let express_node = Pairing::new("Express on Node.js", 3000, "node", "express", "express_server.js");
        let r1 = report(500, 1000);
        let orchestrator = Orchestrator::new(
            config(vec![express_node, hono_bun()], 1),
            FakeProcesses::default(),
            ScriptedLoad::new(vec![None, Some(&r1)]),
        );

        let ranked = rank(orchestrator.run_all().await);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].environment, "Hono on Bun");
        assert_eq!(
            *orchestrator.processes.terminated.lock().unwrap(),
            vec![1, 2]
        );
    }
}
