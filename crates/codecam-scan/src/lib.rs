// codecam-scan/src/lib.rs
// ============================================================
// codecam-scan  –  the capture/decode coordination loop
// ------------------------------------------------------------
// Pipeline: pick camera → open stream → [ sample frame →
//           decode → notify → wait scan interval ] ↺
// ------------------------------------------------------------
// Public API
//   * Scanner::new(devices, decoder, config, observer)
//   * Scanner::start().await / Scanner::stop()
//   * Scanner::is_active() / Scanner::state()
// ============================================================

//! codecam – scan loop
//!
//! [`Scanner`] drives one camera stream into one decoder. Cycles run
//! strictly one after another: a cycle either finishes synchronously
//! (no track yet, sampling failed) or waits for its own decode response
//! before the next one is scheduled, so there is never more than one
//! frame at the decoder. Failures never end the loop; they go through a
//! single path that logs them and hands them to
//! [`ScanObserver`]'s `on_error`. Only [`Scanner::stop`] ends it.

mod config;
mod observer;
mod scanner;

pub use config::{ConfigError, InactiveStreamPolicy, ScannerConfig};
pub use observer::ScanObserver;
pub use scanner::{ScanState, Scanner};

pub use codecam_camera::{MediaDevices, StreamInfo};
pub use codecam_decode::{DecodeResult, Decoder, Symbol};
pub use codecam_sample::Viewport;

use codecam_camera::CameraError;
use codecam_decode::{DecodeError, DispatchError};
use codecam_sample::SampleError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Error getting constraints: {0}")]
    Enumeration(#[source] CameraError),
    #[error("Error starting: {0}")]
    Acquisition(#[source] CameraError),
    #[error("Error scanning: {0}")]
    Sampling(#[source] SampleError),
    #[error("Decoder reported an error: {0}")]
    Decode(#[source] DecodeError),
    #[error("Decode dispatch failed: {0}")]
    Dispatch(#[source] DispatchError),
    #[error("Camera stream became inactive")]
    StreamInactive,
    #[error("Scanner is already running")]
    AlreadyStarted,
    #[error("Blocking platform call failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
