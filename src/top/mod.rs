pub mod aggregate;
pub mod correlate;
pub mod table;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::TopConfig;
use crate::display::{self, Screen};
use crate::tap::TapStream;

use self::aggregate::Aggregator;
use self::correlate::{CompletedRequest, Correlator};

/// One observation session: ingestion, aggregation, and rendering run as
/// separate tasks wired by a bounded channel, all stopped through a shared
/// cancellation token.
pub struct Session {
    cfg: TopConfig,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(cfg: TopConfig, cancel: CancellationToken) -> Self {
        Self { cfg, cancel }
    }

    /// Runs the session until the stream ends, the user quits, or a
    /// component fails. The screen is always released before returning.
    pub async fn run<T, S>(self, stream: T, mut screen: S) -> Result<()>
    where
        T: TapStream + 'static,
        S: Screen + 'static,
    {
        // Display setup failures are fatal before any task starts.
        screen.init().context("initializing display")?;

        let (tx, rx) = mpsc::channel(self.cfg.request_queue_capacity);

        let correlator = Correlator::new(self.cfg.max_pending_requests);
        let aggregator = Aggregator::new(self.cfg.max_rows);

        let ingest = tokio::spawn(ingest_loop(
            stream,
            correlator,
            tx,
            self.cancel.clone(),
        ));
        let render = tokio::spawn(render_loop(
            screen,
            aggregator,
            rx,
            self.cfg.tick_interval,
            self.cancel.clone(),
        ));

        // The render task owns the screen and always releases it, so join
        // it first to restore the terminal before reporting any error.
        let render_result = render.await.context("render task panicked")?;
        let ingest_result = ingest.await.context("ingestion task panicked")?;

        ingest_result?;
        render_result?;

        Ok(())
    }
}

/// Pulls events off the tap stream, correlates them, and forwards completed
/// requests. End of stream and transport errors both cancel the session.
async fn ingest_loop<T: TapStream>(
    mut stream: T,
    mut correlator: Correlator,
    tx: mpsc::Sender<CompletedRequest>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = stream.recv() => match next {
                Ok(Some(event)) => {
                    if let Some(record) = correlator.receive(event) {
                        // Backpressure: wait for the render loop rather than
                        // dropping records. A closed channel means the session
                        // is already shutting down.
                        if tx.send(record).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Ok(None) => {
                    info!("tap stream terminated");
                    cancel.cancel();
                    return Ok(());
                }
                Err(e) => {
                    cancel.cancel();
                    return Err(e.context("tap stream failed"));
                }
            },
        }
    }
}

/// Folds completed requests and repaints the table on every tick.
async fn render_loop<S: Screen>(
    mut screen: S,
    mut aggregator: Aggregator,
    mut rx: mpsc::Receiver<CompletedRequest>,
    tick_interval: std::time::Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            record = rx.recv() => {
                let Some(record) = record else { break Ok(()) };
                aggregator.fold(&record);
                // Drain whatever else is queued before the next repaint.
                while let Ok(record) = rx.try_recv() {
                    aggregator.fold(&record);
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = display::render(&mut screen, &aggregator.snapshot()) {
                    cancel.cancel();
                    break Err(e.context("rendering table"));
                }
            }
        }
    };

    debug!(rows = aggregator.len(), "render loop stopped");
    screen.release();

    result
}
