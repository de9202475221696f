use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;

use crate::connection::{Connection, ConnectionId};
use crate::error::Error;

/// Accepts inbound peer connections on a bound TCP socket, handing each one
/// a fresh [`ConnectionId`].
pub struct Listener {
    inner: TcpListener,
    next_id: AtomicU64,
}

impl Listener {
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let inner = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "p2p listener bound");
        Ok(Self {
            inner,
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn accept(&self) -> Result<Connection, Error> {
        let (stream, peer_addr) = self.inner.accept().await?;
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(?id, %peer_addr, "accepted connection");
        Ok(Connection::new(id, peer_addr, stream))
    }
}
