// codecam-camera/src/lib.rs
// ============================================================
// Camera acquisition crate for codecam
// Enumerates video inputs, picks one, and opens a capture
// stream whose newest NV12 frame can be read at any time.
// ------------------------------------------------------------
// Public API:
//   * DeviceSelector::resolve()  – enumerate + pick a camera
//   * MediaDevices::open()       – acquire a MediaStream
//   * FrameSource                – owns the single live stream
//   * GstMediaDevices            – GStreamer-backed platform
// ------------------------------------------------------------
// Build notes
//   * libcamerasrc is used when present, v4l2src otherwise.
// ============================================================

//! codecam – camera acquisition layer
//!
//! The platform is reached through two small blocking traits,
//! [`MediaDevices`] and [`MediaStream`], so the scan loop can run against
//! real hardware ([`GstMediaDevices`]) or an in-memory fake in tests.
//! Frames are delivered as [`VideoFrame`] (NV12 bytes plus metadata) by
//! asking a [`VideoTrack`] for its *current* frame; there is no queue, the
//! newest frame always wins.

use std::time::Duration;
use thiserror::Error;

mod device;
mod pipeline;
mod source;
mod stream;

pub use device::{resolve_constraints, Constraints, DeviceDescriptor, DeviceKind, DeviceSelector, VideoConstraint};
pub use pipeline::GstMediaDevices;
pub use source::{FrameSource, StreamInfo, TrackInfo};
pub use stream::{MediaDevices, MediaStream, TrackKind, VideoTrack};

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("GStreamer init failed: {0}")]
    GstInit(#[source] gst::glib::Error),
    #[error("Failed to parse pipeline: {0}")]
    ParsePipeline(#[source] gst::glib::Error),
    #[error("Pipeline is not a gst::Pipeline")]
    NotPipeline,
    #[error("AppSink element not found")]
    AppSinkNotFound,
    #[error("AppSink element downcast failed")]
    AppSinkDowncastFailed,
    #[error("Failed to set pipeline to Playing: {0}")]
    StateChange(#[source] gst::StateChangeError),
    #[error("Device monitor failed: {0}")]
    DeviceMonitor(#[source] gst::glib::BoolError),
    #[error("No video device matches {0:?}")]
    DeviceNotFound(String),
    #[error("Sample has no buffer")]
    MissingBuffer,
    #[error("Sample has no caps")]
    MissingCaps,
    #[error("Caps missing struct")]
    MissingStructure,
    #[error("Failed to get field value: {0}")]
    FieldError(String),
    #[error("Buffer map failed: {0}")]
    BufferMap(String),
    #[error("No frame available yet on track {0}")]
    FrameNotReady(String),
    #[error("Track {0} has ended")]
    TrackEnded(String),
    #[error("Platform error: {0}")]
    Platform(String),
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// One captured NV12 frame in CPU memory.
///
/// `stride` is the byte length of one luma row; the interleaved chroma
/// plane follows the luma plane with the same stride.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pts: Duration,
}

impl VideoFrame {
    /// Bytes an NV12 frame of this geometry needs.
    pub fn expected_len(&self) -> usize {
        let rows = self.height as usize;
        self.stride as usize * (rows + rows.div_ceil(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_expected_len() {
        let frame = VideoFrame {
            data: Vec::new(),
            width: 640, height: 480, stride: 640, pts: Duration::ZERO,
        };
        assert_eq!(frame.expected_len(), 640 * 480 * 3 / 2);
    }
}
