use std::time::Duration;

use tracing::warn;

use crate::tap::event::{Eos, HttpEvent, RequestInit, ResponseEnd, ResponseInit, StreamId, TapEvent};

use super::table::BoundedTable;

/// A request whose lifecycle is still in flight.
///
/// Created on the first RequestInit for a stream id, dropped the instant
/// its ResponseEnd arrives. Recency is tracked by the owning table.
struct PendingRequest {
    source: String,
    destination: String,
    pod_label: Option<String>,
    req_init: RequestInit,
    rsp_init: Option<ResponseInit>,
}

/// Immutable projection of a request taken at completion time.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRequest {
    /// Raw source address.
    pub source: String,
    /// Destination workload label when present, else the raw address.
    pub destination: String,
    pub path: String,
    pub success: bool,
    pub latency: Duration,
}

/// Matches partial lifecycle events by stream id into complete records.
///
/// Owned by the ingestion worker; all calls are serialized, so no internal
/// locking is needed.
pub struct Correlator {
    pending: BoundedTable<StreamId, PendingRequest>,
}

impl Correlator {
    /// Creates a correlator tracking at most `max_pending` in-flight requests.
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: BoundedTable::new(max_pending),
        }
    }

    /// Number of requests currently awaiting a ResponseEnd.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds one lifecycle event, returning a completed record when the
    /// event closes out a pending request.
    ///
    /// Events referencing an unknown stream id are logged and discarded;
    /// they never halt the pipeline.
    pub fn receive(&mut self, event: TapEvent) -> Option<CompletedRequest> {
        match event.event {
            HttpEvent::RequestInit(init) => {
                // Re-init for an already-pending id overwrites in place, so
                // a stream id can only ever complete once.
                self.pending.insert(
                    init.id,
                    PendingRequest {
                        source: event.source,
                        destination: event.destination,
                        pod_label: event
                            .destination_labels
                            .get("pod")
                            .filter(|l| !l.is_empty())
                            .cloned(),
                        req_init: init,
                        rsp_init: None,
                    },
                );
                None
            }

            HttpEvent::ResponseInit(rsp) => {
                match self.pending.get_mut(&rsp.id) {
                    Some(pending) => pending.rsp_init = Some(rsp),
                    None => warn!(id = %rsp.id, "ResponseInit for unknown stream"),
                }
                None
            }

            HttpEvent::ResponseEnd(end) => {
                let Some(pending) = self.pending.remove(&end.id) else {
                    warn!(id = %end.id, "ResponseEnd for unknown stream");
                    return None;
                };
                Some(complete(pending, &end))
            }
        }
    }
}

/// Projects a pending request into its completed record.
fn complete(pending: PendingRequest, end: &ResponseEnd) -> CompletedRequest {
    // A missing ResponseInit reads as status 0: late or dropped response
    // headers never block completion.
    let http_status = pending.rsp_init.as_ref().map_or(0, |r| r.http_status);

    let mut success = http_status < 500;
    if success {
        match end.eos {
            Some(Eos::GrpcStatusCode { code }) => success = code == 0,
            Some(Eos::ResetErrorCode { .. }) => success = false,
            Some(Eos::Other) | None => {}
        }
    }

    CompletedRequest {
        source: pending.source,
        destination: pending.pod_label.unwrap_or(pending.destination),
        path: pending.req_init.path,
        success,
        latency: end.since_request_init,
    }
}
