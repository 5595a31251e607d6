use clap::Parser;
use std::time::Duration;

use server::config::Config;
use server::network::Server;

/// Relay server for the two-player obstacle runner.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Interface to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Liveness timeout in milliseconds before a silent player is evicted
    #[clap(long, default_value_t = shared::PLAYER_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Minimum delay between obstacle spawns, in milliseconds
    #[clap(long, default_value_t = shared::SPAWN_INTERVAL_MIN_MS)]
    spawn_min_ms: u64,

    /// Maximum delay between obstacle spawns, in milliseconds
    #[clap(long, default_value_t = shared::SPAWN_INTERVAL_MAX_MS)]
    spawn_max_ms: u64,

    /// Bounded receive wait per loop tick, in milliseconds
    #[clap(long, default_value = "200")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if args.spawn_max_ms < args.spawn_min_ms {
        return Err("spawn-max-ms must be >= spawn-min-ms".into());
    }

    let config = Config {
        host: args.host,
        port: args.port,
        timeout: Duration::from_millis(args.timeout_ms),
        spawn_min: Duration::from_millis(args.spawn_min_ms),
        spawn_max: Duration::from_millis(args.spawn_max_ms),
        tick_period: Duration::from_millis(args.tick_ms),
        ..Default::default()
    };

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    }
}
