use tokio::sync::mpsc;

/// One unit handed to a pending HTTP responder: a chunk of provider-emitted
/// bytes, or a terminator.
#[derive(Debug, Clone)]
pub enum ResponderEvent {
    Chunk(Vec<u8>),
    End,
    Error(String),
}

const RESPONDER_CHANNEL_CAPACITY: usize = 64;

/// The dispatcher-side handle to a registered HTTP responder. Bounded so a
/// slow HTTP client's backpressure is felt by the peer read loop relaying
/// its provider's bytes, per the spec's peer-to-HTTP backpressure rule.
#[derive(Clone)]
pub struct ResponderSink {
    tx: mpsc::Sender<ResponderEvent>,
}

impl ResponderSink {
    /// Creates a sink/stream pair. The stream end is consumed by the HTTP
    /// layer (e.g. turned into an SSE body); the sink end is stored in the
    /// [`crate::registry::Registry`].
    pub fn channel() -> (Self, mpsc::Receiver<ResponderEvent>) {
        let (tx, rx) = mpsc::channel(RESPONDER_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Forwards a chunk of provider bytes. `false` means the HTTP side is
    /// gone and the caller should stop relaying.
    pub async fn send_chunk(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(ResponderEvent::Chunk(bytes)).await.is_ok()
    }

    pub async fn end(&self) {
        let _ = self.tx.send(ResponderEvent::End).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        let _ = self.tx.send(ResponderEvent::Error(message.into())).await;
    }
}
