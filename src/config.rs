use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::parsers::parse_wrk_duration;
use crate::prelude::*;

/// One runtime/framework combination under test.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pairing {
    pub name: String,
    pub port: u16,
    pub runtime: String,
    pub framework: String,
    pub script: String,
}

impl Pairing {
    pub fn new(name: &str, port: u16, runtime: &str, framework: &str, script: &str) -> Self {
        Pairing {
            name: name.to_string(),
            port,
            runtime: runtime.to_string(),
            framework: framework.to_string(),
            script: script.to_string(),
        }
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WrkConfig {
    pub binary: String,
    pub connections: u32,
    pub threads: u32,
    pub duration: String,
    pub timeout: String,
    pub latency: bool,
}

impl Default for WrkConfig {
    fn default() -> Self {
        WrkConfig {
            binary: "wrk".to_string(),
            connections: 100,
            threads: 12,
            duration: "30s".to_string(),
            timeout: "10s".to_string(),
            latency: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparisonConfig {
    pub base: String,
    pub alternative: String,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            base: "node".to_string(),
            alternative: "bun".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub json: String,
    pub csv: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            json: "benchmark_results_wrk.json".to_string(),
            csv: "benchmark_results_wrk.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchmarkConfig {
    pub wrk: WrkConfig,
    pub warmup_ms: u64,
    pub cooldown_ms: u64,
    pub runs: u32,
    pub production_env: EnvVar,
    pub comparison: ComparisonConfig,
    pub output: OutputConfig,
    pub pairings: Vec<Pairing>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            wrk: WrkConfig::default(),
            warmup_ms: 3000,
            cooldown_ms: 2000,
            runs: 3,
            production_env: EnvVar {
                name: "NODE_ENV".to_string(),
                value: "production".to_string(),
            },
            comparison: ComparisonConfig::default(),
            output: OutputConfig::default(),
            pairings: default_catalog(),
        }
    }
}

pub fn default_catalog() -> Vec<Pairing> {
    vec![
        Pairing::new("Express on Node.js", 3000, "node", "express", "express_server.js"),
        Pairing::new("Express on Bun", 3000, "bun", "express", "express_server.js"),
        Pairing::new("Fastify on Node.js", 3001, "node", "fastify", "fastify_server.js"),
        Pairing::new("Fastify on Bun", 3001, "bun", "fastify", "fastify_server.js"),
        Pairing::new("Hono on Node.js", 3002, "node", "hono", "hono_server.js"),
        Pairing::new("Hono on Bun", 3002, "bun", "hono", "hono_server.js"),
    ]
}

impl BenchmarkConfig {
    /// Loads the configuration file, falling back to the built-in defaults
    /// when the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(
                "No configuration at {}, using built-in defaults",
                path.display()
            );
            let config = BenchmarkConfig::default();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: BenchmarkConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runs < 1 {
            return Err(Error::InvalidConfig("runs must be at least 1".to_string()));
        }
        if self.pairings.is_empty() {
            return Err(Error::InvalidConfig(
                "pairing catalog must not be empty".to_string(),
            ));
        }
        for (key, value) in [("duration", &self.wrk.duration), ("timeout", &self.wrk.timeout)] {
            if parse_wrk_duration(value).is_none() {
                return Err(Error::InvalidConfig(format!(
                    "wrk.{} '{}' is not a valid duration",
                    key, value
                )));
            }
        }
        Ok(())
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Upper bound on how long a single wrk invocation may take before it is
    /// killed.
    pub fn wrk_deadline(&self) -> Duration {
        let duration = parse_wrk_duration(&self.wrk.duration).unwrap_or_default();
        let timeout = parse_wrk_duration(&self.wrk.timeout).unwrap_or_default();
        duration + timeout + Duration::from_secs(WRK_DEADLINE_GRACE_SECS)
    }

    /// Distinct runtimes in catalog order.
    pub fn runtimes(&self) -> Vec<&str> {
        let mut runtimes: Vec<&str> = Vec::new();
        for pairing in &self.pairings {
            if !runtimes.contains(&pairing.runtime.as_str()) {
                runtimes.push(&pairing.runtime);
            }
        }
        runtimes
    }
}

const WRK_DEADLINE_GRACE_SECS: u64 = 10;
