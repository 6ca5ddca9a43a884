use crate::BoxError;
use log::{debug, info, warn};
use shared::{encode_line, ClientMessage, ControlKey, LineBuffer, ServerMessage, Snapshot};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long to wait for the server's welcome after connecting.
const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest frame as published by the receive task.
pub type SnapshotCell = watch::Receiver<Option<Arc<Snapshot>>>;

/// Keeps a local copy of the server's latest frame and forwards key changes.
///
/// A background task reads frames off the socket and publishes each one as a
/// single `Arc` swap, so readers never block on the network and never see a
/// partially decoded frame.
pub struct Synchronizer {
    player_id: u32,
    writer: OwnedWriteHalf,
    snapshots: SnapshotCell,
    receive_task: JoinHandle<()>,
}

impl Synchronizer {
    /// Connects, waits for the welcome and starts the receive task.
    pub async fn connect(addr: &str) -> Result<Self, BoxError> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let (mut reader, writer) = stream.into_split();
        let mut lines = LineBuffer::new();

        let player_id = timeout(WELCOME_TIMEOUT, read_welcome(&mut reader, &mut lines))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no welcome from server"))??;
        info!("Connected as player {}", player_id);

        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let receive_task = tokio::spawn(receive_loop(reader, lines, snapshot_tx));

        Ok(Synchronizer {
            player_id,
            writer,
            snapshots: snapshot_rx,
            receive_task,
        })
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    /// The newest frame received so far.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshots.borrow().clone()
    }

    /// A handle that is notified whenever a new frame lands.
    pub fn subscribe(&self) -> SnapshotCell {
        self.snapshots.clone()
    }

    /// Waits for a frame newer than the last one observed through this handle.
    ///
    /// Returns `None` once the connection is gone.
    pub async fn next_snapshot(&mut self) -> Option<Arc<Snapshot>> {
        self.snapshots.changed().await.ok()?;
        self.snapshots.borrow_and_update().clone()
    }

    pub fn is_connected(&self) -> bool {
        !self.receive_task.is_finished()
    }

    /// Sends one key change to the server.
    pub async fn send_input(&mut self, key: ControlKey, pressed: bool) -> Result<(), BoxError> {
        let line = encode_line(&ClientMessage::input(key, pressed))?;
        self.writer.write_all(line.as_bytes()).await?;
        debug!("Sent {} = {}", key.as_wire(), pressed);
        Ok(())
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.receive_task.abort();
    }
}

async fn read_welcome(reader: &mut OwnedReadHalf, lines: &mut LineBuffer) -> Result<u32, BoxError> {
    let mut buffer = [0u8; 1024];

    loop {
        while let Some(line) = lines.next_line()? {
            match ServerMessage::decode(&line)? {
                ServerMessage::Welcome(welcome) => return Ok(welcome.player_id),
                ServerMessage::Frame(snapshot) => {
                    debug!("Skipping frame {} received before welcome", snapshot.frame);
                }
            }
        }

        let len = reader.read(&mut buffer).await?;
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection before welcoming us",
            )
            .into());
        }
        lines.extend(&buffer[..len]);
    }
}

/// Publishes every decoded frame until the server goes away.
async fn receive_loop(
    mut reader: OwnedReadHalf,
    mut lines: LineBuffer,
    snapshots: watch::Sender<Option<Arc<Snapshot>>>,
) {
    let mut buffer = [0u8; 4096];

    loop {
        loop {
            match lines.next_line() {
                Ok(Some(line)) => match ServerMessage::decode(&line) {
                    Ok(ServerMessage::Frame(snapshot)) => {
                        snapshots.send_replace(Some(Arc::new(snapshot)));
                    }
                    Ok(ServerMessage::Welcome(welcome)) => {
                        warn!("Unexpected second welcome (player {})", welcome.player_id);
                    }
                    Err(e) => warn!("Discarding message from server: {}", e),
                },
                Ok(None) => break,
                Err(e) => warn!("Discarding message from server: {}", e),
            }
        }

        match reader.read(&mut buffer).await {
            Ok(0) => {
                info!("Server closed the connection");
                return;
            }
            Ok(len) => lines.extend(&buffer[..len]),
            Err(e) => {
                warn!("Connection to server lost: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Ball, EventRecord, Food, Welcome};
    use std::collections::BTreeMap;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn frame_line(frame: u64) -> String {
        let mut ball = BTreeMap::new();
        ball.insert(7, Ball::new([0, 0, 255], 100.0, 100.0));
        encode_line(&ServerMessage::Frame(Snapshot {
            frame,
            ball,
            foods: Food::at(200.0, 200.0),
            events: EventRecord::default(),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_connect_and_receive_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let welcome = encode_line(&ServerMessage::Welcome(Welcome { player_id: 7 })).unwrap();
            // Welcome and the first frame arrive in the same segment.
            let batch = format!("{}{}", welcome, frame_line(1));
            stream.write_all(batch.as_bytes()).await.unwrap();

            let partial = frame_line(2);
            let (head, tail) = partial.split_at(10);
            stream.write_all(head.as_bytes()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            stream.write_all(tail.as_bytes()).await.unwrap();

            let mut lines = BufReader::new(stream).lines();
            lines.next_line().await.unwrap().unwrap()
        });

        let mut sync = Synchronizer::connect(&addr).await.unwrap();
        assert_eq!(sync.player_id(), 7);
        assert!(sync.is_connected());

        let mut latest = 0;
        while latest < 2 {
            let snapshot = timeout(Duration::from_secs(2), sync.next_snapshot())
                .await
                .unwrap()
                .unwrap();
            latest = snapshot.frame;
        }
        assert_eq!(sync.current_snapshot().unwrap().frame, 2);
        assert!(sync.current_snapshot().unwrap().ball.contains_key(&7));

        sync.send_input(ControlKey::TurnLeft, true).await.unwrap();
        let received = timeout(Duration::from_secs(2), server).await.unwrap().unwrap();
        assert_eq!(
            shared::decode_line::<ClientMessage>(&received).unwrap(),
            ClientMessage::input(ControlKey::TurnLeft, true)
        );
    }

    #[tokio::test]
    async fn test_connect_fails_without_welcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        assert!(Synchronizer::connect(&addr).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_is_observed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let welcome = encode_line(&ServerMessage::Welcome(Welcome { player_id: 1 })).unwrap();
            stream.write_all(welcome.as_bytes()).await.unwrap();
        });

        let mut sync = Synchronizer::connect(&addr).await.unwrap();
        let next = timeout(Duration::from_secs(2), sync.next_snapshot())
            .await
            .unwrap();
        assert!(next.is_none());
        assert!(sync.current_snapshot().is_none());

        for _ in 0..100 {
            if !sync.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!sync.is_connected());
    }
}
