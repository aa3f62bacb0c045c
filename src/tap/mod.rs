pub mod codec;
pub mod event;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::debug;

use self::event::TapEvent;

/// Ordered, cancellable stream of tap events.
///
/// `Ok(None)` signals normal end of stream; an error is a transport
/// failure and ends the observation session.
pub trait TapStream: Send {
    /// Receives the next event, blocking until one arrives, the stream
    /// ends, or the transport fails.
    fn recv(&mut self) -> impl std::future::Future<Output = Result<Option<TapEvent>>> + Send;
}

/// Tap stream over a TCP connection carrying length-prefixed frames.
pub struct SocketTapStream {
    reader: BufReader<TcpStream>,
}

impl SocketTapStream {
    /// Connects to a tap server.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let conn = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .with_context(|| format!("connecting to tap server {addr} timed out"))?
            .with_context(|| format!("connecting to tap server {addr}"))?;

        debug!(%addr, "connected to tap server");

        Ok(Self {
            reader: BufReader::new(conn),
        })
    }
}

impl TapStream for SocketTapStream {
    async fn recv(&mut self) -> Result<Option<TapEvent>> {
        let Some(payload) = codec::read_frame(&mut self.reader).await? else {
            return Ok(None);
        };

        codec::decode_message(&payload).map(Some)
    }
}
