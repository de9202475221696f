//! Transport layer for peer connections: a length-delimited, JSON-framed
//! TCP stream standing in for the hub's real encrypted overlay. The
//! dispatcher never touches a raw socket — it only depends on
//! [`handle::PeerHandle`].

pub mod connection;
pub mod error;
pub mod handle;
pub mod listener;

pub use connection::{Connection, ConnectionId, ConnectionReader, ConnectionWriter};
pub use error::Error;
pub use handle::{ChannelPeerHandle, PeerHandle};
pub use listener::Listener;

#[cfg(test)]
mod tests {
    use hub_types::Frame;
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn connection_round_trips_a_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.unwrap();
            let mut conn = Connection::new(ConnectionId(1), peer_addr, stream);
            conn.recv().await.unwrap().unwrap()
        });

        let mut client = Connection::connect(addr, ConnectionId(2)).await.unwrap();
        client.send(&Frame::InferenceEnded).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, Frame::InferenceEnded);
    }

    #[tokio::test]
    async fn split_connection_round_trips_via_channel_handle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.unwrap();
            let mut conn = Connection::new(ConnectionId(1), peer_addr, stream);
            conn.recv().await.unwrap().unwrap()
        });

        let client = Connection::connect(addr, ConnectionId(2)).await.unwrap();
        let (_, writer) = client.split();
        let handle = ChannelPeerHandle::spawn(writer, addr);
        handle.send(Frame::InferenceEnded).await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, Frame::InferenceEnded);
    }
}
