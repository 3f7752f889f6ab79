use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "runtime-bench")]
#[command(about = "Runtime/framework benchmark harness driven by wrk", long_about = None)]
pub struct Cli {
    /// Benchmark configuration; built-in defaults apply when the file is missing
    #[arg(short, long, default_value = "config/benchmark.yaml")]
    pub config: PathBuf,

    /// Do not query runtime and wrk versions before benchmarking
    #[arg(long, default_value_t = false)]
    pub skip_versions: bool,
}
