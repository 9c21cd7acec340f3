use chess_client::network::Client;
use chess_shared::DEFAULT_PORT;
use clap::Parser;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Name shown to other players
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Seconds between heartbeats; keep below the server's idle timeout
    #[arg(long, default_value = "10")]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client as {}", args.name);
    let mut client = Client::new(
        &args.server,
        &args.name,
        Duration::from_secs(args.heartbeat_secs.max(1)),
    )
    .await?;

    client.run().await?;

    Ok(())
}
