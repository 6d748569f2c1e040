use crate::ScanError;
use codecam_camera::StreamInfo;
use codecam_decode::DecodeResult;

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// The scanner's four notifications, one subscriber each.
///
/// Every slot defaults to a no-op. Callbacks run on the scanner's own
/// task, so they should return quickly; calling back into the scanner
/// (e.g. `stop()` from `on_success`) is allowed.
pub struct ScanObserver {
    on_start: Callback<StreamInfo>,
    on_stop: Box<dyn Fn() + Send + Sync>,
    on_error: Callback<ScanError>,
    on_success: Callback<DecodeResult>,
}

impl Default for ScanObserver {
    fn default() -> Self {
        Self {
            on_start: Box::new(|_| {}),
            on_stop: Box::new(|| {}),
            on_error: Box::new(|_| {}),
            on_success: Box::new(|_| {}),
        }
    }
}

impl ScanObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once per successful `start()`.
    pub fn on_start(mut self, f: impl Fn(&StreamInfo) + Send + Sync + 'static) -> Self {
        self.on_start = Box::new(f);
        self
    }

    /// Fired once per `stop()`, including redundant ones.
    pub fn on_stop(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_stop = Box::new(f);
        self
    }

    /// Fired for every recoverable failure.
    pub fn on_error(mut self, f: impl Fn(&ScanError) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }

    /// Fired once per cycle whose decode found at least one symbol.
    pub fn on_success(mut self, f: impl Fn(&DecodeResult) + Send + Sync + 'static) -> Self {
        self.on_success = Box::new(f);
        self
    }

    pub(crate) fn started(&self, info: &StreamInfo) {
        (self.on_start)(info)
    }

    pub(crate) fn stopped(&self) {
        (self.on_stop)()
    }

    pub(crate) fn failed(&self, err: &ScanError) {
        (self.on_error)(err)
    }

    pub(crate) fn decoded(&self, result: &DecodeResult) {
        (self.on_success)(result)
    }
}
