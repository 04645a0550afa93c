#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::Parser;
use pathhelm_gateway::server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pathhelm-gateway", about = "API gateway with adaptive anomaly-aware request filtering")]
struct Cli {
    /// Path to gateway config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address
    #[arg(short, long, env = "PATHHELM_LISTEN", default_value = "0.0.0.0:8000")]
    listen: String,

    /// Admin API listen address (for health/metrics)
    #[arg(long, env = "PATHHELM_ADMIN_LISTEN", default_value = "0.0.0.0:9000")]
    admin_listen: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let worker_threads = server::runtime::get_container_cpu_limit();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    rt.block_on(server::bootstrap::run(server::bootstrap::BootstrapArgs {
        config_path: cli.config,
        listen: cli.listen,
        admin_listen: cli.admin_listen,
    }))
}
