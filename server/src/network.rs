//! Server network layer: TCP accept loop, per-connection handlers and the
//! fixed-tick broadcast loop

use crate::game::World;
use crate::session::{SessionError, SessionRegistry, OUTBOUND_CAPACITY};
use crate::BoxError;
use log::{debug, error, info, warn};
use shared::{decode_line, encode_line, ClientMessage, LineBuffer, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Longest a single line may take to reach the socket before the peer is
/// considered gone.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Main server coordinating connections and the simulation
pub struct Server {
    listener: TcpListener,
    registry: Arc<Mutex<SessionRegistry>>,
    tick_duration: Duration,
}

impl Server {
    pub async fn bind(
        addr: &str,
        tick_duration: Duration,
        max_players: usize,
    ) -> Result<Self, BoxError> {
        Self::bind_with_world(addr, tick_duration, max_players, World::new()).await
    }

    pub async fn bind_with_world(
        addr: &str,
        tick_duration: Duration,
        max_players: usize,
        world: World,
    ) -> Result<Self, BoxError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: Arc::new(Mutex::new(SessionRegistry::new(world, max_players))),
            tick_duration,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<Mutex<SessionRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop and the broadcast loop until the process ends.
    pub async fn run(self) -> Result<(), BoxError> {
        let Server {
            listener,
            registry,
            tick_duration,
        } = self;

        let accept_handle = tokio::spawn(accept_loop(listener, Arc::clone(&registry)));

        info!(
            "Server started, ticking every {}ms",
            tick_duration.as_millis()
        );

        tokio::select! {
            result = accept_handle => {
                result?;
                Ok(())
            }
            _ = broadcast_loop(registry, tick_duration) => Ok(()),
        }
    }
}

/// Accepts connections forever, one handler task per client.
async fn accept_loop(listener: TcpListener, registry: Arc<Mutex<SessionRegistry>>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    handle_connection(stream, addr, registry).await;
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Registers the client, then reads its input lines until the peer goes away
/// or its writer stops.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Mutex<SessionRegistry>>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Could not disable Nagle for {}: {}", addr, e);
    }

    let (reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

    let player_id = {
        let mut registry = registry.lock().await;
        registry.register(addr, outbound_tx)
    };
    let player_id = match player_id {
        Ok(id) => id,
        Err(SessionError::ServerFull(max)) => {
            warn!("Refusing {}: server already has {} players", addr, max);
            return;
        }
        Err(e) => {
            error!("Failed to register {}: {}", addr, e);
            return;
        }
    };

    let write_task = tokio::spawn(write_loop(player_id, writer, outbound_rx));

    tokio::select! {
        _ = read_loop(player_id, reader, &registry) => {}
        _ = write_task => {
            debug!("Writer for player {} stopped, closing connection", player_id);
        }
    }

    let removed = {
        let mut registry = registry.lock().await;
        registry.deregister(player_id)
    };
    if removed {
        info!("Player {} disconnected", player_id);
    }
}

async fn read_loop(player_id: u32, mut reader: OwnedReadHalf, registry: &Mutex<SessionRegistry>) {
    let mut buffer = [0u8; 1024];
    let mut lines = LineBuffer::new();

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("Player {} closed the connection", player_id);
                return;
            }
            Ok(len) => {
                lines.extend(&buffer[..len]);
                loop {
                    match lines.next_line() {
                        Ok(Some(line)) => handle_line(player_id, &line, registry).await,
                        Ok(None) => break,
                        Err(e) => warn!("Discarding input from player {}: {}", player_id, e),
                    }
                }
            }
            Err(e) => {
                warn!("Connection error with player {}: {}", player_id, e);
                return;
            }
        }
    }
}

async fn handle_line(player_id: u32, line: &str, registry: &Mutex<SessionRegistry>) {
    match decode_line::<ClientMessage>(line) {
        Ok(ClientMessage::Input { key, state }) => {
            let mut registry = registry.lock().await;
            registry.set_control(player_id, &key, state);
        }
        Err(e) => warn!("Invalid message from player {}: {}", player_id, e),
    }
}

/// Drains a session's outbound queue into its socket.
///
/// Ends when the session is dropped from the registry or a write fails or
/// times out; in the latter cases the next broadcast notices the closed queue
/// and removes the session.
async fn write_loop(
    player_id: u32,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Arc<str>>,
) {
    while let Some(line) = outbound.recv().await {
        match timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to send to player {}: {}", player_id, e);
                return;
            }
            Err(_) => {
                warn!(
                    "Player {} accepted nothing for {}s",
                    player_id,
                    WRITE_TIMEOUT.as_secs()
                );
                return;
            }
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of player {} socket failed: {}", player_id, e);
    }
}

/// Ticks the world on a fixed period and fans each snapshot out to every client.
pub async fn broadcast_loop(registry: Arc<Mutex<SessionRegistry>>, tick_duration: Duration) {
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let frame = broadcast_tick(&registry).await;

        if frame % 100 == 0 {
            let sessions = registry.lock().await.len();
            debug!("Frame {}: {} connected players", frame, sessions);
        }
    }
}

/// Runs one tick, delivers the snapshot, then drops sessions whose writer died.
///
/// Returns the frame number that was produced.
pub async fn broadcast_tick(registry: &Mutex<SessionRegistry>) -> u64 {
    let mut registry = registry.lock().await;
    let snapshot = registry.tick();
    let frame = snapshot.frame;

    if registry.is_empty() {
        return frame;
    }

    let line: Arc<str> = match encode_line(&ServerMessage::Frame(snapshot)) {
        Ok(line) => Arc::from(line),
        Err(e) => {
            error!("Failed to encode frame {}: {}", frame, e);
            return frame;
        }
    };

    for player_id in registry.deliver(&line) {
        if registry.deregister(player_id) {
            warn!("Dropped player {} after a failed or stalled send", player_id);
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ControlKey, Snapshot};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::timeout;

    fn test_registry() -> Arc<Mutex<SessionRegistry>> {
        Arc::new(Mutex::new(SessionRegistry::new(World::with_seed(11), 4)))
    }

    #[tokio::test]
    async fn test_broadcast_tick_without_players_still_advances() {
        let registry = test_registry();
        assert_eq!(broadcast_tick(&registry).await, 1);
        assert_eq!(broadcast_tick(&registry).await, 2);
    }

    #[tokio::test]
    async fn test_broadcast_tick_delivers_frames_in_order() {
        let registry = test_registry();
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
        registry
            .lock()
            .await
            .register("127.0.0.1:9000".parse().unwrap(), tx)
            .unwrap();

        for _ in 0..5 {
            broadcast_tick(&registry).await;
        }

        let welcome = rx.recv().await.unwrap();
        assert!(matches!(
            ServerMessage::decode(welcome.trim_end()).unwrap(),
            ServerMessage::Welcome(_)
        ));

        let mut frames = Vec::new();
        while let Ok(line) = rx.try_recv() {
            let snapshot: Snapshot = decode_line(line.trim_end()).unwrap();
            frames.push(snapshot.frame);
        }
        assert_eq!(frames, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_broadcast_tick_removes_failed_sessions() {
        let registry = test_registry();
        let (tx1, _rx1) = mpsc::channel(OUTBOUND_CAPACITY);
        let (tx2, rx2) = mpsc::channel(OUTBOUND_CAPACITY);
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let (id1, id2) = {
            let mut guard = registry.lock().await;
            (
                guard.register(addr, tx1).unwrap(),
                guard.register(addr, tx2).unwrap(),
            )
        };
        drop(rx2);

        broadcast_tick(&registry).await;

        let guard = registry.lock().await;
        assert!(guard.contains(id1));
        assert!(!guard.contains(id2));
        assert!(guard.world().ball(id2).is_none());
    }

    #[tokio::test]
    async fn test_client_that_never_reads_is_dropped() {
        let registry = test_registry();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_registry = Arc::clone(&registry);
        let handler = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, server_registry).await;
        });

        // Keeps the socket open without ever reading from it.
        let _silent = TcpStream::connect(addr).await.unwrap();
        for _ in 0..100 {
            if registry.lock().await.contains(1) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.lock().await.contains(1));

        let mut frames = 0;
        while registry.lock().await.contains(1) && frames < 200_000 {
            broadcast_tick(&registry).await;
            tokio::task::yield_now().await;
            frames += 1;
        }

        let guard = registry.lock().await;
        assert!(!guard.contains(1), "stalled client still registered after {} frames", frames);
        assert!(guard.world().ball(1).is_none());
        drop(guard);

        timeout(WRITE_TIMEOUT + Duration::from_secs(5), handler)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_handle_connection_lifecycle() {
        let registry = test_registry();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_registry = Arc::clone(&registry);
        let handler = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_connection(stream, peer, server_registry).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let welcome = timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(welcome, "{\"player_id\":1}");

        let mut input = encode_line(&ClientMessage::input(ControlKey::Forward, true)).unwrap();
        input.insert_str(0, "garbage\n");
        write_half.write_all(input.as_bytes()).await.unwrap();

        let mut forward = false;
        for _ in 0..100 {
            if let Some(intent) = registry.lock().await.world().control(1) {
                forward = intent.forward;
            }
            if forward {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(forward, "input after a malformed line should still apply");

        drop(write_half);
        drop(lines);
        timeout(Duration::from_secs(2), handler).await.unwrap().unwrap();
        assert!(registry.lock().await.is_empty());
    }
}
