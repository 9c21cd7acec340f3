use chess_server::config::ServerConfig;
use chess_server::network::Server;
use chess_shared::{DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};
use clap::Parser;
use log::{error, info};
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Maximum number of simultaneous connections
    #[clap(short, long, default_value = "64")]
    max_clients: usize,
    /// Seconds of silence before a client is dropped
    #[clap(long, default_value = "30")]
    idle_timeout_secs: u64,
    /// Largest accepted frame body in bytes
    #[clap(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,
}

/// Parses command-line arguments and serves games until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_clients: args.max_clients,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        max_frame_len: args.max_frame_len,
    };
    info!(
        "Starting chess server (max {} clients, {}s idle timeout)",
        config.max_clients, args.idle_timeout_secs
    );

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
