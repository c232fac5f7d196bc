use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, ServerResult};
use shared::{TICK_MILLIS, WORLD_HEIGHT, WORLD_WIDTH};
use std::time::Duration;

/// Authoritative dogfight server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "3000")]
    port: u16,
    /// Milliseconds between simulation ticks
    #[clap(short, long, default_value_t = TICK_MILLIS)]
    tick_ms: u64,
    /// Maximum number of remote players
    #[clap(short, long, default_value = "16")]
    max_clients: usize,
    /// Number of bots to add on startup
    #[clap(short, long, default_value = "0")]
    bots: usize,
    /// Arena width
    #[clap(long, default_value_t = WORLD_WIDTH)]
    width: f32,
    /// Arena height
    #[clap(long, default_value_t = WORLD_HEIGHT)]
    height: f32,
    /// Seed for reproducible bonus drops and bot behaviour
    #[clap(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        tick_duration: Duration::from_millis(args.tick_ms.max(1)),
        max_clients: args.max_clients,
        bots: args.bots,
        width: args.width,
        height: args.height,
        seed: args.seed,
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
