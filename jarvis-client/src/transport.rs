use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use crate::error::TransportError;

/// One message on a channel, delivered to listeners verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open, bidirectional connection
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Next data frame, or `None` once the peer has closed
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;

    async fn close(&mut self);
}

/// Opens transports to a fixed endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;

    fn endpoint(&self) -> &str;
}

pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        let (sink, stream) = stream.split();
        Ok(Box::new(WsTransport { sink, stream }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.sink.send(message).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                Ok(Message::Binary(bytes)) => return Some(Ok(Frame::Binary(bytes))),
                Ok(Message::Close(_)) => return None,
                // tungstenite answers pings itself
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.sink.close().await {
            tracing::debug!("Error closing websocket: {}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transports for driving sessions without a network.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};
    use super::*;

    pub struct MemoryTransport {
        outgoing: mpsc::UnboundedSender<Frame>,
        incoming: mpsc::UnboundedReceiver<Frame>,
    }

    /// The server side of a [`MemoryTransport`]. Dropping it closes the connection.
    pub struct Peer {
        pub received: mpsc::UnboundedReceiver<Frame>,
        pub to_client: mpsc::UnboundedSender<Frame>,
    }

    impl Peer {
        pub fn push_text(&self, text: &str) {
            let _ = self.to_client.send(Frame::Text(text.to_string()));
        }
    }

    pub fn memory_pair() -> (MemoryTransport, Peer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (
            MemoryTransport { outgoing: out_tx, incoming: in_rx },
            Peer { received: out_rx, to_client: in_tx },
        )
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
            self.outgoing.send(frame).map_err(|_| TransportError::Closed)
        }

        async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
            self.incoming.recv().await.map(Ok)
        }

        async fn close(&mut self) {
            self.incoming.close();
        }
    }

    pub enum Attempt {
        Accept(MemoryTransport),
        Refuse,
    }

    /// Hands out scripted outcomes in order; refuses once the script runs out.
    #[derive(Clone, Default)]
    pub struct ScriptedConnector {
        script: Arc<Mutex<VecDeque<Attempt>>>,
        attempts: Arc<AtomicUsize>,
    }

    impl ScriptedConnector {
        pub async fn accept(&self) -> Peer {
            let (transport, peer) = memory_pair();
            self.script.lock().await.push_back(Attempt::Accept(transport));
            peer
        }

        pub async fn refuse(&self, times: usize) {
            let mut script = self.script.lock().await;
            for _ in 0..times {
                script.push_back(Attempt::Refuse);
            }
        }

        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().await.pop_front() {
                Some(Attempt::Accept(transport)) => Ok(Box::new(transport)),
                Some(Attempt::Refuse) | None => Err(TransportError::Closed),
            }
        }

        fn endpoint(&self) -> &str {
            "memory://test"
        }
    }
}
