//! Static test-bench logger - main entry point

use bench::{init_logging, BenchConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Bench Logger v{} ===", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1);
    let config = BenchConfig::load(config_path.as_deref())?;
    bench::run(config).await
}
