use std::net::SocketAddr;

use async_trait::async_trait;
use flume as chan;
use thiserror::Error;

use hub_types::Frame;

use crate::connection::{ConnectionId, ConnectionWriter};

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection channel disconnected")]
    Disconnected,
}

impl<T> From<chan::SendError<T>> for Error {
    fn from(_: chan::SendError<T>) -> Self {
        Self::Disconnected
    }
}

/// A handle for sending frames to one connected peer, independent of the raw
/// socket. The dispatcher keeps one of these per connected peer rather than
/// the [`crate::connection::Connection`] itself, so routing an outbound
/// frame never contends with that connection's read loop.
#[async_trait]
pub trait PeerHandle: Send + Sync {
    fn id(&self) -> ConnectionId;
    fn peer_addr(&self) -> SocketAddr;
    async fn send(&self, frame: Frame) -> Result<(), Error>;
}

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// The production [`PeerHandle`]: a channel to a writer task that owns the
/// connection's write half. Bounded so a stalled socket write applies
/// backpressure to whatever is calling [`PeerHandle::send`] instead of
/// growing an unbounded in-memory queue.
#[derive(Clone)]
pub struct ChannelPeerHandle {
    id: ConnectionId,
    peer_addr: SocketAddr,
    tx: chan::Sender<Frame>,
}

impl ChannelPeerHandle {
    /// Spawns the writer task and returns a handle to it. The task exits
    /// once the write fails or every clone of the returned handle is
    /// dropped.
    pub fn spawn(mut writer: ConnectionWriter, peer_addr: SocketAddr) -> Self {
        let id = writer.id;
        let (tx, rx) = chan::bounded::<Frame>(WRITER_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Ok(frame) = rx.recv_async().await {
                if let Err(err) = writer.send(&frame).await {
                    tracing::warn!(?id, %err, "peer write failed, closing writer task");
                    break;
                }
            }
        });

        Self { id, peer_addr, tx }
    }
}

#[async_trait]
impl PeerHandle for ChannelPeerHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    async fn send(&self, frame: Frame) -> Result<(), Error> {
        self.tx.send_async(frame).await.map_err(|_| Error::Disconnected)
    }
}

#[cfg(any(test, feature = "mocks"))]
mockall::mock! {
    pub PeerHandle {}

    #[async_trait]
    impl PeerHandle for PeerHandle {
        fn id(&self) -> ConnectionId;
        fn peer_addr(&self) -> SocketAddr;
        async fn send(&self, frame: Frame) -> Result<(), Error>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_compiles() {
        let mut _mock = MockPeerHandle::new();
    }
}
