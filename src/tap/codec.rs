use anyhow::{bail, Context, Result};
use bytes::Bytes;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::event::TapEvent;

/// Upper bound on a single frame payload. Anything larger is treated as a
/// corrupt stream rather than an allocation request.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Application-level error payload the server may send in place of an event.
///
/// Strict fields: a payload only matches this shape when it is exactly
/// `{"error": ...}`, so event payloads never misroute here.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApiError {
    error: String,
}

/// Decodes one frame payload into a tap event.
///
/// The payload is first interpreted as an error-shaped message; only when
/// that fails is it decoded as the expected event type. A decode failure
/// against the event type is a hard error, never an empty success.
pub fn decode_message(payload: &[u8]) -> Result<TapEvent> {
    if let Ok(api_err) = serde_json::from_slice::<ApiError>(payload) {
        bail!("tap server error: {}", api_err.error);
    }

    serde_json::from_slice(payload).context("decoding tap event payload")
}

/// Reads one length-prefixed frame: u32 big-endian length, then the payload.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary (end of stream).
/// EOF inside a frame is a transport error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Bytes>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("reading frame length"),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len == 0 {
        bail!("zero-length frame");
    }
    if len > MAX_FRAME_LEN {
        bail!("frame length {len} exceeds maximum {MAX_FRAME_LEN}");
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .context("reading frame payload")?;

    Ok(Some(Bytes::from(payload)))
}

/// Encodes one frame. Used by the test harness and any local tap producer.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
