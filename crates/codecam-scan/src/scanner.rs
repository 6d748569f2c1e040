use crate::{InactiveStreamPolicy, Result, ScanError, ScanObserver, ScannerConfig};
use codecam_camera::{DeviceSelector, FrameSource, MediaDevices, StreamInfo};
use codecam_decode::{
    DecodeDispatcher, DecodeError, DecodeRequest, DecodeResponses, DecodeResult, Decoder,
    DispatchError,
};
use codecam_sample::{FrameSampler, Viewport};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Starting,
    Scanning,
    AwaitingDecode,
    Stopped,
}

/// Camera → decoder scan loop.
///
/// Cheap to clone; all clones drive the same loop. The loop keeps running
/// until [`Scanner::stop`] is called, even if every clone is dropped.
#[derive(Clone)]
pub struct Scanner {
    shared: Arc<Shared>,
}

struct Shared {
    devices: Arc<dyn MediaDevices>,
    dispatcher: DecodeDispatcher,
    // held by the running loop for its whole session
    responses: tokio::sync::Mutex<DecodeResponses>,
    config: ScannerConfig,
    observer: ScanObserver,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ScanState,
    source: FrameSource,
    viewport: Viewport,
    // bumped by every start/stop; a loop only acts while its session is current
    session: u64,
    // sequence number of the last submitted frame, never reset
    seq: u64,
    task: Option<JoinHandle<()>>,
}

enum Next {
    Reschedule,
    Halt,
}

enum Awaited {
    Decoded(DecodeResult),
    Failed(DecodeError),
    TimedOut,
    WorkerGone,
}

impl Scanner {
    /// Build a scanner and start the decode worker. No camera is touched
    /// until [`Scanner::start`].
    pub fn new<D: Decoder>(
        devices: Arc<dyn MediaDevices>,
        decoder: D,
        config: ScannerConfig,
        observer: ScanObserver,
    ) -> Result<Self> {
        let (dispatcher, responses) = DecodeDispatcher::spawn(decoder).map_err(ScanError::Dispatch)?;
        let viewport = config.viewport;
        Ok(Self {
            shared: Arc::new(Shared {
                devices,
                dispatcher,
                responses: tokio::sync::Mutex::new(responses),
                config,
                observer,
                inner: Mutex::new(Inner {
                    state: ScanState::Idle,
                    source: FrameSource::new(),
                    viewport,
                    session: 0,
                    seq: 0,
                    task: None,
                }),
            }),
        })
    }

    /// Pick a camera, open it and begin scanning.
    ///
    /// Failures are reported through `on_error` and also returned. Must be
    /// called from within a tokio runtime.
    pub async fn start(&self) -> Result<()> {
        let shared = &self.shared;
        let session = {
            let mut inner = shared.lock();
            match inner.state {
                ScanState::Starting | ScanState::Scanning | ScanState::AwaitingDecode => None,
                ScanState::Idle | ScanState::Stopped => {
                    inner.session += 1;
                    inner.state = ScanState::Starting;
                    Some(inner.session)
                }
            }
        };
        let Some(session) = session else {
            return Err(shared.report(ScanError::AlreadyStarted));
        };

        // 1) enumerate + choose
        let selector = DeviceSelector::new(Arc::clone(&shared.devices));
        let constraints = match tokio::task::spawn_blocking(move || selector.resolve()).await {
            Ok(Ok(constraints)) => constraints,
            Ok(Err(e)) => return Err(shared.abort_start(session, ScanError::Enumeration(e))),
            Err(e) => return Err(shared.abort_start(session, ScanError::Task(e))),
        };

        // 2) acquire
        log::info!("opening camera with {constraints:?}");
        let devices = Arc::clone(&shared.devices);
        let stream = match tokio::task::spawn_blocking(move || devices.open(&constraints)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(shared.abort_start(session, ScanError::Acquisition(e))),
            Err(e) => return Err(shared.abort_start(session, ScanError::Task(e))),
        };

        let attached = {
            let mut inner = shared.lock();
            if inner.session != session {
                Err(stream)
            } else {
                inner.state = ScanState::Scanning;
                Ok(inner.source.attach(stream))
            }
        };
        let info = match attached {
            Ok(info) => info,
            Err(mut stream) => {
                // stop() won the race
                log::debug!("start cancelled before the stream was attached");
                stream.stop();
                return Ok(());
            }
        };

        log::info!("camera stream {} started", info.id);
        shared.observer.started(&info);

        let mut inner = shared.lock();
        if inner.session == session {
            let task = tokio::spawn(run(Arc::clone(shared), session));
            inner.task = Some(task);
        }
        Ok(())
    }

    /// Release the camera and schedule no further cycles.
    ///
    /// Safe to call at any time, as often as wanted; `on_stop` fires every
    /// time. A decode already in flight cannot be recalled, its response is
    /// dropped when it arrives.
    pub fn stop(&self) {
        let task = {
            let mut inner = self.shared.lock();
            self.shared.teardown(&mut inner)
        };
        if let Some(task) = task {
            task.abort();
        }
        self.shared.observer.stopped();
    }

    /// True iff a camera stream is currently owned.
    pub fn is_active(&self) -> bool {
        self.shared.lock().source.is_active()
    }

    pub fn state(&self) -> ScanState {
        self.shared.lock().state
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.shared.lock().source.stream_info()
    }

    /// Resize the sampling area, e.g. after the display window changed.
    /// Takes effect on the next cycle.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.shared.lock().viewport = viewport;
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The one error path: log, then tell the observer.
    fn report(&self, err: ScanError) -> ScanError {
        match &err {
            ScanError::Sampling(_) | ScanError::Decode(_) => log::warn!("{err}"),
            _ => log::error!("{err}"),
        }
        self.observer.failed(&err);
        err
    }

    fn abort_start(&self, session: u64, err: ScanError) -> ScanError {
        {
            let mut inner = self.lock();
            if inner.session == session {
                inner.state = ScanState::Stopped;
            }
        }
        self.report(err)
    }

    /// Invalidate the running session and release the camera.
    fn teardown(&self, inner: &mut Inner) -> Option<JoinHandle<()>> {
        inner.session += 1;
        if inner.source.stop() {
            log::info!("camera stream released");
        }
        inner.state = ScanState::Stopped;
        inner.task.take()
    }

    /// Stop from inside the loop; a no-op if `stop()` already ran.
    fn shutdown(&self, session: u64) -> Next {
        let stopped = {
            let mut inner = self.lock();
            if inner.session == session {
                // Dropping our own JoinHandle just detaches it.
                drop(self.teardown(&mut inner));
                true
            } else {
                false
            }
        };
        if stopped {
            self.observer.stopped();
        }
        Next::Halt
    }

    async fn cycle(
        &self,
        session: u64,
        sampler: &mut FrameSampler,
        responses: &mut DecodeResponses,
    ) -> Next {
        // 1) stream + track, looked up fresh every cycle
        let lookup = {
            let inner = self.lock();
            if inner.session != session {
                return Next::Halt;
            }
            if inner.source.is_streaming() {
                Some((inner.source.current_video_track(), inner.viewport))
            } else {
                None
            }
        };
        let Some((track, viewport)) = lookup else {
            return self.stream_inactive(session);
        };
        let Some(track) = track else {
            log::trace!("no video track yet; rescheduling");
            return Next::Reschedule;
        };

        // 2) skip the draw while an abandoned decode still holds the slot
        if self.dispatcher.is_closed() {
            self.report(ScanError::Dispatch(DispatchError::Closed));
            return self.shutdown(session);
        }
        if self.dispatcher.is_busy() {
            log::trace!("decoder still busy; skipping frame");
            return Next::Reschedule;
        }

        // 3) draw + extract
        let payload = match sampler.sample(track.as_ref(), viewport) {
            Ok(payload) => payload,
            Err(e) => {
                self.report(ScanError::Sampling(e));
                return Next::Reschedule;
            }
        };

        // 4) hand off; the session check and the submit share one lock so
        //    nothing is sent after stop()
        let submitted = {
            let mut inner = self.lock();
            if inner.session != session {
                return Next::Halt;
            }
            inner.seq += 1;
            let seq = inner.seq;
            match self.dispatcher.submit(DecodeRequest { seq, payload }) {
                Ok(()) => {
                    inner.state = ScanState::AwaitingDecode;
                    Ok(seq)
                }
                Err(e) => Err(e),
            }
        };
        let seq = match submitted {
            Ok(seq) => seq,
            Err(DispatchError::Busy(seq)) => {
                log::debug!("decoder still busy with an abandoned frame; skipped {seq}");
                return Next::Reschedule;
            }
            Err(e) => {
                self.report(ScanError::Dispatch(e));
                return self.shutdown(session);
            }
        };

        // 5) wait for exactly this frame's answer
        let awaited = self.await_response(seq, responses).await;

        {
            let mut inner = self.lock();
            if inner.session != session {
                log::debug!("dropping response {seq}: scanner was stopped");
                return Next::Halt;
            }
            inner.state = ScanState::Scanning;
        }

        match awaited {
            Awaited::Decoded(result) if result.is_success() => {
                log::debug!("frame {seq}: {} symbol(s)", result.symbols.len());
                self.observer.decoded(&result);
            }
            Awaited::Decoded(_) => {}
            Awaited::Failed(e) => {
                self.report(ScanError::Decode(e));
            }
            Awaited::TimedOut => {
                log::warn!("decode of frame {seq} timed out; treating as empty");
            }
            Awaited::WorkerGone => {
                self.report(ScanError::Dispatch(DispatchError::Closed));
                return self.shutdown(session);
            }
        }
        Next::Reschedule
    }

    async fn await_response(&self, seq: u64, responses: &mut DecodeResponses) -> Awaited {
        let wait = async {
            while let Some(resp) = responses.recv().await {
                if resp.seq == seq {
                    return Some(resp.outcome);
                }
                log::debug!("discarding stale response {} (waiting for {seq})", resp.seq);
            }
            None
        };

        let outcome = match self.config.decode_timeout() {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => return Awaited::TimedOut,
            },
            None => wait.await,
        };

        match outcome {
            Some(Ok(result)) => Awaited::Decoded(result),
            Some(Err(e)) => Awaited::Failed(e),
            None => Awaited::WorkerGone,
        }
    }

    fn stream_inactive(&self, session: u64) -> Next {
        match self.config.on_inactive_stream {
            InactiveStreamPolicy::Halt => {
                log::info!("stream inactive; scan loop paused");
                Next::Halt
            }
            InactiveStreamPolicy::Retry => {
                log::debug!("stream inactive; rescheduling");
                Next::Reschedule
            }
            InactiveStreamPolicy::Stop => {
                let current = self.lock().session == session;
                if !current {
                    return Next::Halt;
                }
                self.report(ScanError::StreamInactive);
                self.shutdown(session)
            }
        }
    }
}

async fn run(shared: Arc<Shared>, session: u64) {
    let mut responses = shared.responses.lock().await;
    let mut sampler = FrameSampler::new();
    log::debug!("scan loop {session} running");

    loop {
        match shared.cycle(session, &mut sampler, &mut responses).await {
            Next::Reschedule => tokio::time::sleep(shared.config.scan_interval()).await,
            Next::Halt => break,
        }
    }
    log::debug!("scan loop {session} finished");
}
