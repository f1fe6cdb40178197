//! Blocking runtime → async stream.
//!
//! A run's event iterator blocks on model and tool I/O, so it is pulled on
//! a blocking worker. Items cross to the async side over an unbounded FIFO
//! channel, followed by exactly one terminal marker. The stream awaits the
//! worker before it ends, so no worker outlives its request.
//!
//! Abandoning the stream cancels the run: the worker stops before its next
//! pull and drops the iterator, which lets the runtime close out the
//! session. Anything the caller wants held for the life of the run (the
//! admission permit, the cancel registration) moves into the worker and is
//! released only when the worker exits.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use ts_domain::error::{Error, Result};
use ts_domain::event::RawEvent;
use ts_domain::runtime::{Runtime, RunInput, RunOptions};
use ts_domain::stream::BoxStream;

enum BridgeItem {
    Event(RawEvent),
    Done,
    Failed(Error),
}

/// One run to bridge.
pub struct BridgeRequest {
    pub runtime: Arc<dyn Runtime>,
    pub session: String,
    pub input: RunInput,
    pub options: RunOptions,
    /// Tripped by an explicit cancel or by dropping the stream.
    pub cancel: CancellationToken,
}

/// Hosts blocking producer loops on a bounded set of workers.
pub struct StreamBridge {
    workers: Arc<Semaphore>,
}

impl StreamBridge {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Start `req` and expose its events in emission order. A producer
    /// failure is the stream's last item.
    ///
    /// `hold` is dropped on the worker thread after the producer exits.
    pub fn open<H>(&self, req: BridgeRequest, hold: H) -> BoxStream<'static, Result<RawEvent>>
    where
        H: Send + 'static,
    {
        let workers = Arc::clone(&self.workers);
        Box::pin(async_stream::stream! {
            let _cancel_on_drop = req.cancel.clone().drop_guard();

            let Ok(worker_slot) = workers.acquire_owned().await else {
                yield Err(Error::Other("stream bridge is shut down".into()));
                return;
            };

            let (tx, mut rx) = mpsc::unbounded_channel();
            let token = req.cancel.clone();
            let session = req.session.clone();
            let worker = tokio::task::spawn_blocking(move || {
                let _held = (worker_slot, hold);
                produce(req, &token, &tx);
            });

            let mut failure = None;
            while let Some(item) = rx.recv().await {
                match item {
                    BridgeItem::Event(event) => {
                        yield Ok(event);
                    }
                    BridgeItem::Done => break,
                    BridgeItem::Failed(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            if let Err(e) = worker.await {
                tracing::error!(session = %session, error = %e, "stream worker panicked");
                failure.get_or_insert_with(|| Error::Other(format!("stream worker failed: {e}")));
            }
            if let Some(e) = failure {
                yield Err(e);
            }
        })
    }

    /// Workers not currently hosting a producer.
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }
}

fn produce(req: BridgeRequest, token: &CancellationToken, tx: &mpsc::UnboundedSender<BridgeItem>) {
    let BridgeRequest {
        runtime,
        session,
        input,
        options,
        ..
    } = req;

    let mut events = match runtime.stream(&session, input, options) {
        Ok(events) => events,
        Err(e) => {
            let _ = tx.send(BridgeItem::Failed(e));
            return;
        }
    };

    let mut forwarded = 0usize;
    loop {
        if token.is_cancelled() {
            tracing::info!(session = %session, forwarded, "run cancelled; abandoning producer");
            break;
        }
        match events.next() {
            Some(Ok(event)) => {
                if tx.send(BridgeItem::Event(event)).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Some(Err(e)) => {
                tracing::warn!(session = %session, error = %e, "producer failed");
                let _ = tx.send(BridgeItem::Failed(e));
                return;
            }
            None => break,
        }
    }
    drop(events);
    tracing::debug!(session = %session, forwarded, "producer finished");
    let _ = tx.send(BridgeItem::Done);
}
