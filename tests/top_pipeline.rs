use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use meshtop::config::TopConfig;
use meshtop::display::Screen;
use meshtop::tap::event::{
    HttpEvent, RequestInit, ResponseEnd, ResponseInit, StreamId, TapEvent,
};
use meshtop::tap::TapStream;
use meshtop::top::Session;

/// Tap stream fed by the test. A closed channel is end of stream.
struct ScriptedStream {
    rx: mpsc::Receiver<Result<TapEvent>>,
}

impl ScriptedStream {
    fn new() -> (mpsc::Sender<Result<TapEvent>>, Self) {
        let (tx, rx) = mpsc::channel(32);
        (tx, Self { rx })
    }
}

impl TapStream for ScriptedStream {
    async fn recv(&mut self) -> Result<Option<TapEvent>> {
        match self.rx.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
struct ScreenState {
    cells: Vec<(u16, u16, String)>,
    inits: usize,
    releases: usize,
}

/// Screen that records every draw call for later inspection.
#[derive(Clone, Default)]
struct RecordingScreen(Arc<Mutex<ScreenState>>);

impl RecordingScreen {
    fn state(&self) -> std::sync::MutexGuard<'_, ScreenState> {
        self.0.lock().expect("screen lock")
    }

    fn rendered_texts(&self) -> Vec<String> {
        self.state()
            .cells
            .iter()
            .map(|(_, _, text)| text.trim_end().to_string())
            .collect()
    }
}

impl Screen for RecordingScreen {
    fn init(&mut self) -> Result<()> {
        self.state().inits += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.state().cells.clear();
        Ok(())
    }

    fn print(&mut self, x: u16, y: u16, text: &str, _bold: bool) -> Result<()> {
        self.state().cells.push((x, y, text.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) {
        self.state().releases += 1;
    }
}

fn top_config() -> TopConfig {
    TopConfig {
        tick_interval: Duration::from_millis(10),
        ..TopConfig::default()
    }
}

fn envelope(event: HttpEvent) -> TapEvent {
    TapEvent {
        source: "10.1.1.1:5000".to_string(),
        destination: "10.1.2.2:80".to_string(),
        destination_labels: HashMap::new(),
        event,
    }
}

fn lifecycle(id: StreamId, status: u16, latency: Duration) -> Vec<TapEvent> {
    vec![
        envelope(HttpEvent::RequestInit(RequestInit {
            id,
            method: "GET".to_string(),
            path: "/a".to_string(),
            scheme: "http".to_string(),
            authority: "web".to_string(),
        })),
        envelope(HttpEvent::ResponseInit(ResponseInit {
            id,
            http_status: status,
        })),
        envelope(HttpEvent::ResponseEnd(ResponseEnd {
            id,
            since_request_init: latency,
            eos: None,
        })),
    ]
}

#[tokio::test]
async fn test_session_ends_cleanly_on_end_of_stream() {
    let (tx, stream) = ScriptedStream::new();
    let screen = RecordingScreen::default();
    let cancel = CancellationToken::new();

    for event in lifecycle(StreamId { base: 1, stream: 1 }, 200, Duration::from_millis(5)) {
        tx.send(Ok(event)).await.expect("send");
    }
    drop(tx);

    Session::new(top_config(), cancel)
        .run(stream, screen.clone())
        .await
        .expect("clean end of stream");

    let state = screen.state();
    assert_eq!(state.inits, 1);
    assert_eq!(state.releases, 1);
}

#[tokio::test]
async fn test_session_surfaces_stream_error_after_restoring_screen() {
    let (tx, stream) = ScriptedStream::new();
    let screen = RecordingScreen::default();
    let cancel = CancellationToken::new();

    tx.send(Err(anyhow!("connection reset"))).await.expect("send");

    let err = Session::new(top_config(), cancel)
        .run(stream, screen.clone())
        .await
        .expect_err("stream error must fail the session");
    assert!(format!("{err:#}").contains("tap stream failed"));

    assert_eq!(screen.state().releases, 1);
}

#[tokio::test]
async fn test_pipeline_renders_aggregated_rows() {
    let (tx, stream) = ScriptedStream::new();
    let screen = RecordingScreen::default();
    let cancel = CancellationToken::new();

    let session = tokio::spawn(
        Session::new(top_config(), cancel.clone()).run(stream, screen.clone()),
    );

    for event in lifecycle(StreamId { base: 1, stream: 1 }, 200, Duration::from_millis(5)) {
        tx.send(Ok(event)).await.expect("send");
    }
    for event in lifecycle(StreamId { base: 1, stream: 2 }, 500, Duration::from_millis(10)) {
        tx.send(Ok(event)).await.expect("send");
    }

    // Wait for a repaint showing both requests folded into one row.
    let mut rendered = Vec::new();
    for _ in 0..500 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        rendered = screen.rendered_texts();
        if rendered.iter().any(|t| t == "2") {
            break;
        }
    }

    assert!(rendered.iter().any(|t| t == "(press q to quit)"));
    assert!(rendered.iter().any(|t| t == "10.1.1.1"), "source column: {rendered:?}");
    assert!(rendered.iter().any(|t| t == "10.1.2.2"), "destination column: {rendered:?}");
    assert!(rendered.iter().any(|t| t == "/a"));
    assert!(rendered.iter().any(|t| t == "2"), "count column: {rendered:?}");
    assert!(rendered.iter().any(|t| t == "5ms"), "best column: {rendered:?}");
    assert!(rendered.iter().any(|t| t == "10ms"), "worst column: {rendered:?}");
    assert!(rendered.iter().any(|t| t == "50.00%"), "rate column: {rendered:?}");

    cancel.cancel();
    session
        .await
        .expect("session task")
        .expect("cancelled session ends cleanly");
    assert_eq!(screen.state().releases, 1);
}

#[tokio::test]
async fn test_repeated_cancellation_releases_screen_once() {
    let (tx, stream) = ScriptedStream::new();
    let screen = RecordingScreen::default();
    let cancel = CancellationToken::new();

    let session = tokio::spawn(
        Session::new(top_config(), cancel.clone()).run(stream, screen.clone()),
    );

    cancel.cancel();
    cancel.cancel();

    session
        .await
        .expect("session task")
        .expect("cancelled session ends cleanly");
    drop(tx);

    let state = screen.state();
    assert_eq!(state.inits, 1);
    assert_eq!(state.releases, 1);
}
