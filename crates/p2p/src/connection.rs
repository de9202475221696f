use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use hub_types::Frame;

use crate::error::Error;

/// Monotonically increasing identity for an accepted TCP connection, stable
/// for the connection's lifetime regardless of whether the remote peer ever
/// completes the `join` handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// One peer connection: a TCP stream framed with 4-byte length prefixes,
/// carrying [`Frame`]s JSON-encoded on the wire.
///
/// This is the concrete stand-in for the encrypted P2P overlay the real
/// network runs; the dispatcher only ever depends on [`crate::handle::PeerHandle`],
/// so swapping the transport later does not touch dispatch logic.
pub struct Connection {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, peer_addr: SocketAddr, stream: TcpStream) -> Self {
        let framed = Framed::new(
            stream,
            LengthDelimitedCodec::builder()
                .max_frame_length(16 * 1024 * 1024)
                .new_codec(),
        );
        Self { id, peer_addr, framed }
    }

    pub async fn connect(addr: SocketAddr, id: ConnectionId) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(id, addr, stream))
    }

    pub async fn send(&mut self, frame: &Frame) -> Result<(), Error> {
        let bytes = frame
            .encode()
            .map_err(|source| Error::Frame(hub_types::FrameError::InvalidPayload {
                key: "encode",
                source,
            }))?;
        self.framed.send(bytes.into()).await?;
        Ok(())
    }

    /// Reads the next frame. `Ok(None)` means the remote closed the stream.
    pub async fn recv(&mut self) -> Result<Option<Frame>, Error> {
        match self.framed.next().await {
            Some(Ok(bytes)) => Ok(Some(Frame::decode(&bytes)?)),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Splits into an owned read half and write half so the read loop and
    /// the outbound writer task can run independently.
    pub fn split(self) -> (ConnectionReader, ConnectionWriter) {
        let (sink, stream) = self.framed.split();
        (
            ConnectionReader { id: self.id, peer_addr: self.peer_addr, stream },
            ConnectionWriter { id: self.id, sink },
        )
    }
}

pub struct ConnectionReader {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    stream: futures::stream::SplitStream<Framed<TcpStream, LengthDelimitedCodec>>,
}

impl ConnectionReader {
    pub async fn recv(&mut self) -> Result<Option<Frame>, Error> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(Frame::decode(&bytes)?)),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Reads the next length-delimited unit without attempting to decode it
    /// as a [`Frame`]. Lets a caller fall back to raw-byte relay when a
    /// payload isn't JSON, per the wire protocol's raw-bytes-to-a-pending-
    /// responder allowance.
    pub async fn recv_bytes(&mut self) -> Result<Option<bytes::BytesMut>, Error> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }
}

pub struct ConnectionWriter {
    pub id: ConnectionId,
    sink: futures::stream::SplitSink<Framed<TcpStream, LengthDelimitedCodec>, bytes::Bytes>,
}

impl ConnectionWriter {
    pub async fn send(&mut self, frame: &Frame) -> Result<(), Error> {
        let bytes = frame
            .encode()
            .map_err(|source| Error::Frame(hub_types::FrameError::InvalidPayload {
                key: "encode",
                source,
            }))?;
        self.sink.send(bytes.into()).await?;
        Ok(())
    }
}
