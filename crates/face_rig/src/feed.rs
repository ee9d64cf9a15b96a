use std::io;
use std::time::Duration;

use face_wire::{FrameDecoder, FrameError, Framing, RawFrame, DEFAULT_MAX_FRAME_LEN};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::FeedError;
use crate::latest::LatestFrame;

/// What the feed publishes: the newest frame, or why it could not be decoded.
pub type FrameResult = Result<RawFrame, FrameError>;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upper bound on bytes taken from the transport per read.
    pub read_chunk: usize,
    /// How long the peer may stay silent before the face is reported stale.
    pub read_timeout: Option<Duration>,
    pub framing: Framing,
    pub max_frame_len: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            read_chunk: 1024,
            read_timeout: Some(Duration::from_secs(5)),
            framing: Framing::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[derive(Debug)]
pub enum FeedExit {
    /// Stopped on request.
    Shutdown,
    /// The peer closed the connection.
    Closed,
    Failed(io::Error),
}

/// Opens the one connection the feed reads from. There is no retry.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, FeedError> {
    let stream = TcpStream::connect((host, port)).await.map_err(|source| FeedError::Connect {
        host: host.to_owned(),
        port,
        source,
    })?;
    info!("connected to {}:{}, waiting for coefficients", host, port);
    Ok(stream)
}

/// Reads coefficient frames off a transport and keeps the newest one in a
/// [`LatestFrame`] for the animation loop.
pub struct CoefficientFeed<S> {
    stream: S,
    peer: String,
    config: FeedConfig,
    frames: LatestFrame<FrameResult>,
}

impl<S: AsyncRead + Unpin> CoefficientFeed<S> {
    pub fn new(stream: S, peer: impl Into<String>, config: FeedConfig, frames: LatestFrame<FrameResult>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            config,
            frames,
        }
    }

    pub fn frames(&self) -> &LatestFrame<FrameResult> {
        &self.frames
    }

    /// Runs until the peer disconnects, the transport fails or `shutdown`
    /// changes. The transport is dropped on return.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> FeedExit {
        let mut decoder = FrameDecoder::with_max_frame_len(self.config.framing, self.config.max_frame_len);
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];
        let mut stale = false;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let read = tokio::select! {
                _ = shutdown.changed() => break,
                read = read_chunk(&mut self.stream, &mut chunk, self.config.read_timeout) => read,
            };

            match read {
                Ok(Some(0)) => {
                    let dropped = decoder.finish();
                    if dropped > 0 {
                        debug!("dropped {} bytes of an unterminated frame from {}", dropped, self.peer);
                    }
                    warn!("lost connection with {}: closed by peer", self.peer);
                    return FeedExit::Closed;
                }
                Ok(Some(len)) => {
                    if stale {
                        info!("coefficients from {} resumed", self.peer);
                        stale = false;
                    }
                    if let Some(frame) = decoder.push(&chunk[..len]) {
                        self.frames.publish(frame);
                    }
                }
                Ok(None) => {
                    if !stale {
                        warn!(
                            "no coefficients from {} for {:?}, face is frozen",
                            self.peer,
                            self.config.read_timeout.unwrap_or_default(),
                        );
                        stale = true;
                    }
                }
                Err(err) => {
                    error!("lost connection with {}: {}", self.peer, err);
                    return FeedExit::Failed(err);
                }
            }
        }

        debug!("feed from {} stopped", self.peer);
        FeedExit::Shutdown
    }
}

impl<S: AsyncRead + Unpin + Send + 'static> CoefficientFeed<S> {
    pub fn spawn(self, runtime: &Handle) -> FeedHandle {
        let (shutdown, signal) = watch::channel(false);
        let task = runtime.spawn(self.run(signal));
        FeedHandle { shutdown, task }
    }
}

/// `Ok(None)` means the read timed out.
async fn read_chunk<S: AsyncRead + Unpin>(
    stream: &mut S,
    chunk: &mut [u8],
    timeout: Option<Duration>,
) -> io::Result<Option<usize>> {
    match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, stream.read(chunk)).await {
            Ok(read) => read.map(Some),
            Err(_) => Ok(None),
        },
        None => stream.read(chunk).await.map(Some),
    }
}

/// Owns a running feed task.
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<FeedExit>,
}

impl FeedHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the feed to end on its own.
    pub async fn join(self) -> FeedExit {
        join_task(self.task).await
    }

    /// Asks the feed to stop, closing the connection, and waits for it.
    pub async fn shutdown(self) -> FeedExit {
        let _ = self.shutdown.send(true);
        join_task(self.task).await
    }
}

async fn join_task(task: JoinHandle<FeedExit>) -> FeedExit {
    match task.await {
        Ok(exit) => exit,
        Err(err) => FeedExit::Failed(io::Error::new(io::ErrorKind::Other, err)),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    use super::*;

    fn start(config: FeedConfig) -> (DuplexStream, LatestFrame<FrameResult>, FeedHandle) {
        let (client, server) = duplex(4096);
        let frames = LatestFrame::new();
        let feed = CoefficientFeed::new(server, "test-peer", config, frames.clone());
        (client, frames, feed.spawn(&Handle::current()))
    }

    async fn wait_for_generation(frames: &LatestFrame<FrameResult>, generation: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while frames.generation() < generation {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
            .await
            .expect("frame was not published");
    }

    fn latest_values(frames: &LatestFrame<FrameResult>) -> Vec<f32> {
        let (_, frame) = frames.snapshot().unwrap();
        (*frame).as_ref().unwrap().values().to_vec()
    }

    #[tokio::test]
    async fn publishes_delimited_frames() {
        let (mut peer, frames, feed) = start(FeedConfig::default());
        peer.write_all(b"1,2,").await.unwrap();
        peer.write_all(b"3\n").await.unwrap();
        wait_for_generation(&frames, 1).await;
        assert_eq!(latest_values(&frames), vec![1.0, 2.0, 3.0]);

        peer.write_all(b"4,5\n").await.unwrap();
        wait_for_generation(&frames, 2).await;
        assert_eq!(latest_values(&frames), vec![4.0, 5.0]);

        assert!(matches!(feed.shutdown().await, FeedExit::Shutdown));
    }

    #[tokio::test]
    async fn malformed_frame_is_published_as_error() {
        let (mut peer, frames, feed) = start(FeedConfig::default());
        peer.write_all(b"1,oops\n").await.unwrap();
        wait_for_generation(&frames, 1).await;

        let (_, frame) = frames.snapshot().unwrap();
        assert!(matches!(*frame, Err(FrameError::InvalidToken { index: 1, .. })));
        feed.shutdown().await;
    }

    #[tokio::test]
    async fn peer_close_keeps_last_frame() {
        let (mut peer, frames, feed) = start(FeedConfig::default());
        peer.write_all(b"7,8\n9").await.unwrap();
        drop(peer);

        assert!(matches!(feed.join().await, FeedExit::Closed));
        // The cut off tail is never published.
        assert_eq!(frames.generation(), 1);
        assert_eq!(latest_values(&frames), vec![7.0, 8.0]);
    }

    #[tokio::test]
    async fn read_timeout_does_not_end_the_feed() {
        let config = FeedConfig {
            read_timeout: Some(Duration::from_millis(10)),
            ..FeedConfig::default()
        };
        let (mut peer, frames, feed) = start(config);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!feed.is_finished());

        peer.write_all(b"6\n").await.unwrap();
        wait_for_generation(&frames, 1).await;
        assert_eq!(latest_values(&frames), vec![6.0]);
        assert!(matches!(feed.shutdown().await, FeedExit::Shutdown));
    }

    #[tokio::test]
    async fn chunked_framing_uses_each_read() {
        let config = FeedConfig {
            framing: Framing::Chunked,
            read_timeout: None,
            ..FeedConfig::default()
        };
        let (mut peer, frames, feed) = start(config);
        peer.write_all(b"0.5,1.5").await.unwrap();
        wait_for_generation(&frames, 1).await;
        assert_eq!(latest_values(&frames), vec![0.5, 1.5]);
        feed.shutdown().await;
    }

    #[tokio::test]
    async fn connect_failure_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect("127.0.0.1", port).await.unwrap_err();
        assert!(matches!(err, FeedError::Connect { port: p, .. } if p == port));
    }

    #[tokio::test]
    async fn connects_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });

        let stream = connect("127.0.0.1", port).await.unwrap();
        let mut server = accept.await.unwrap();
        let frames = LatestFrame::new();
        let feed = CoefficientFeed::new(stream, "127.0.0.1", FeedConfig::default(), frames.clone())
            .spawn(&Handle::current());

        server.write_all(b"3,2,1\n").await.unwrap();
        wait_for_generation(&frames, 1).await;
        assert_eq!(latest_values(&frames), vec![3.0, 2.0, 1.0]);
        assert!(matches!(feed.shutdown().await, FeedExit::Shutdown));
    }
}
