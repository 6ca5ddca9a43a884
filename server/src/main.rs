use clap::Parser;
use log::{error, info};
use server::network::Server;
use server::BoxError;
use shared::{DEFAULT_PORT, DEFAULT_TICK_MS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value_t = DEFAULT_TICK_MS,
          value_parser = clap::value_parser!(u64).range(1..=1000))]
    tick_ms: u64,

    /// Maximum number of players connected at once
    #[arg(short, long, default_value_t = 2)]
    max_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    info!("Starting server on {}", address);
    info!(
        "Tick period {}ms, up to {} players",
        args.tick_ms, args.max_players
    );

    let server = match Server::bind(
        &address,
        Duration::from_millis(args.tick_ms),
        args.max_players,
    )
    .await
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            return Err(e);
        }
    };

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
