use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Identifies one request's lifecycle within a proxied connection.
///
/// `base` names the connection, `stream` the request multiplexed onto it.
/// Two concurrent requests never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub base: u32,
    pub stream: u64,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.base, self.stream)
    }
}

/// One lifecycle event captured by the proxy data plane.
///
/// The envelope carries the connection endpoints; `destination_labels`
/// holds workload metadata resolved by the control plane (the `pod` label
/// is preferred over the raw address when displaying the destination).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapEvent {
    /// Source address as `host:port`.
    pub source: String,
    /// Destination address as `host:port`.
    pub destination: String,
    /// Workload metadata attached to the destination.
    #[serde(default)]
    pub destination_labels: HashMap<String, String>,
    /// Lifecycle phase payload.
    pub event: HttpEvent,
}

/// Lifecycle phase of a single HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HttpEvent {
    RequestInit(RequestInit),
    ResponseInit(ResponseInit),
    ResponseEnd(ResponseEnd),
}

impl HttpEvent {
    /// Returns the stream id correlating this event to its request.
    pub fn id(&self) -> StreamId {
        match self {
            Self::RequestInit(e) => e.id,
            Self::ResponseInit(e) => e.id,
            Self::ResponseEnd(e) => e.id,
        }
    }

    /// Returns the phase name for logging.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestInit(_) => "request_init",
            Self::ResponseInit(_) => "response_init",
            Self::ResponseEnd(_) => "response_end",
        }
    }
}

impl fmt::Display for HttpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request headers observed leaving the source proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInit {
    pub id: StreamId,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub authority: String,
}

/// Response headers observed at the destination proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInit {
    pub id: StreamId,
    pub http_status: u16,
}

/// Final frame of the response stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnd {
    pub id: StreamId,
    /// Latency measured from the matching RequestInit.
    pub since_request_init: Duration,
    /// How the response stream ended, when the proxy knows.
    #[serde(default)]
    pub eos: Option<Eos>,
}

/// End-of-stream reason reported by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "end", rename_all = "snake_case")]
pub enum Eos {
    /// Stream ended with a gRPC status trailer.
    GrpcStatusCode { code: u32 },
    /// Stream was reset by the transport.
    ResetErrorCode { code: u32 },
    /// Ended some other way (plain HTTP close).
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_init_event(id: StreamId, path: &str) -> TapEvent {
        TapEvent {
            source: "10.1.1.1:5000".to_string(),
            destination: "10.1.2.2:80".to_string(),
            destination_labels: HashMap::new(),
            event: HttpEvent::RequestInit(RequestInit {
                id,
                method: "GET".to_string(),
                path: path.to_string(),
                scheme: "http".to_string(),
                authority: "web".to_string(),
            }),
        }
    }

    #[test]
    fn test_stream_id_display() {
        let id = StreamId { base: 3, stream: 42 };
        assert_eq!(id.to_string(), "3:42");
    }

    #[test]
    fn test_event_id_matches_variant() {
        let id = StreamId { base: 1, stream: 7 };
        assert_eq!(request_init_event(id, "/a").event.id(), id);

        let rsp = HttpEvent::ResponseInit(ResponseInit {
            id,
            http_status: 200,
        });
        assert_eq!(rsp.id(), id);

        let end = HttpEvent::ResponseEnd(ResponseEnd {
            id,
            since_request_init: Duration::from_millis(5),
            eos: None,
        });
        assert_eq!(end.id(), id);
    }

    #[test]
    fn test_event_json_roundtrip_keeps_variant() {
        let event = request_init_event(StreamId { base: 1, stream: 1 }, "/books");
        let raw = serde_json::to_vec(&event).expect("serialize");
        let back: TapEvent = serde_json::from_slice(&raw).expect("deserialize");
        match back.event {
            HttpEvent::RequestInit(init) => assert_eq!(init.path, "/books"),
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn test_eos_tagged_encoding() {
        let eos = Eos::GrpcStatusCode { code: 0 };
        let raw = serde_json::to_string(&eos).expect("serialize");
        assert!(raw.contains("grpc_status_code"));

        let back: Eos = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, Eos::GrpcStatusCode { code: 0 });
    }

    #[test]
    fn test_missing_labels_default_to_empty() {
        let raw = r#"{
            "source": "10.1.1.1:5000",
            "destination": "10.1.2.2:80",
            "event": {"type": "response_init", "id": {"base": 1, "stream": 2}, "http_status": 200}
        }"#;
        let event: TapEvent = serde_json::from_str(raw).expect("deserialize");
        assert!(event.destination_labels.is_empty());
    }
}
