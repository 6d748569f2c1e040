// codecam-decode/src/dispatcher.rs
use crate::{DecodeRequest, DecodeResponse, DecodeResult, Decoder, DispatchError};
use futures_core::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

// worker → consumer; one live response plus one abandoned straggler
const DEPTH: usize = 2;

/// Owner of the single request slot to the decode worker.
pub struct DecodeDispatcher {
    tx: mpsc::Sender<DecodeRequest>,
    in_flight: Arc<AtomicBool>,
}

impl DecodeDispatcher {
    /// Move `decoder` onto its own thread and return the submit side plus
    /// the response stream.
    pub fn spawn<D: Decoder>(decoder: D) -> Result<(Self, DecodeResponses), DispatchError> {
        let (tx, rx) = mpsc::channel::<DecodeRequest>(1);
        let (resp_tx, resp_rx) = mpsc::channel::<DecodeResponse>(DEPTH);
        let in_flight = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&in_flight);
        std::thread::Builder::new()
            .name("decode-worker".into())
            .spawn(move || worker(decoder, rx, resp_tx, flag))
            .map_err(DispatchError::Spawn)?;

        let dispatcher = Self { tx, in_flight };
        Ok((dispatcher, DecodeResponses { inner: ReceiverStream::new(resp_rx) }))
    }

    /// Hand a frame to the worker without waiting.
    ///
    /// Refused with [`DispatchError::Busy`] while an earlier request has
    /// not been answered, so two requests are never outstanding.
    pub fn submit(&self, request: DecodeRequest) -> Result<(), DispatchError> {
        if self.is_closed() {
            return Err(DispatchError::Closed);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DispatchError::Busy(request.seq));
        }

        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) => {
                self.in_flight.store(false, Ordering::Release);
                Err(DispatchError::Busy(request.seq))
            }
            Err(TrySendError::Closed(_)) => {
                self.in_flight.store(false, Ordering::Release);
                Err(DispatchError::Closed)
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// True once the worker thread has exited, e.g. after a decoder panic.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Releases the request slot when dropped, including during a decoder panic.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn worker<D: Decoder>(
    mut decoder: D,
    mut rx: mpsc::Receiver<DecodeRequest>,
    tx: mpsc::Sender<DecodeResponse>,
    in_flight: Arc<AtomicBool>,
) {
    while let Some(DecodeRequest { seq, payload }) = rx.blocking_recv() {
        let slot = SlotGuard(Arc::clone(&in_flight));
        let outcome = decoder
            .decode(&payload)
            .map(|symbols| DecodeResult { symbols });
        if let Err(e) = &outcome {
            log::warn!("decode of frame {seq} failed: {e}");
        }

        // Free the slot before answering so the consumer can resubmit at once.
        drop(slot);
        if tx.blocking_send(DecodeResponse { seq, outcome }).is_err() {
            break; // consumer dropped
        }
    }
    log::debug!("decode worker shutting down");
}

/// Responses from the worker, in submission order.
pub struct DecodeResponses {
    inner: ReceiverStream<DecodeResponse>,
}

impl DecodeResponses {
    /// Next response; `None` once the worker is gone.
    pub async fn recv(&mut self) -> Option<DecodeResponse> {
        self.inner.next().await
    }
}

impl Stream for DecodeResponses {
    type Item = DecodeResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
