use anyhow::{Context, Result};
use tracing::warn;

use redis_replica::server::RedisServer;

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let server =
        RedisServer::new(std::env::args()).context("failed to parse command line arguments")?;

    if let Err(err) = server.run().await {
        warn!("server exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}
