use clap::Parser;
use client::game::ClientGameState;
use client::input::{Autopilot, InputManager};
use client::network::Synchronizer;
use client::BoxError;
use log::{info, warn};
use shared::DEFAULT_PORT;
use std::time::Duration;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Milliseconds between autopilot key changes
    #[arg(short = 'a', long, default_value_t = 200,
          value_parser = clap::value_parser!(u64).range(1..))]
    autopilot_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut sync = Synchronizer::connect(&args.server).await?;
    let mut game = ClientGameState::new(sync.player_id());
    let mut input = InputManager::new();
    let mut autopilot = Autopilot::new();

    let mut snapshots = sync.subscribe();
    let mut steer_interval = interval(Duration::from_millis(args.autopilot_ms));

    info!("Autopilot changing keys every {}ms", args.autopilot_ms);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Connection closed by server");
                    break;
                }
                let latest = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = latest {
                    let frame = snapshot.frame;
                    game.update_game_state(snapshot);

                    if frame % 100 == 0 {
                        match game.my_ball() {
                            Some(ball) => info!(
                                "Frame {}: at ({:.0}, {:.0}), speed {:.1}, score {}",
                                frame, ball.x, ball.y, ball.speed, ball.score
                            ),
                            None => warn!("Frame {}: our ball is gone", frame),
                        }
                        info!("Scores: {:?}, missed frames: {}", game.scores(), game.frames_missed());
                    }
                }
            },

            _ = steer_interval.tick() => {
                let (forward, left, right) = autopilot.next_keys();
                for (key, pressed) in input.update(forward, left, right) {
                    sync.send_input(key, pressed).await?;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                let released = input.release_all();
                if sync.is_connected() {
                    info!("Received Ctrl+C, releasing keys");
                    for (key, pressed) in released {
                        sync.send_input(key, pressed).await?;
                    }
                }
                break;
            },
        }
    }

    Ok(())
}
