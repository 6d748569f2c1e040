// codecam-camera/src/stream.rs
use crate::{Constraints, DeviceDescriptor, Result, VideoFrame};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A track inside a live stream.
///
/// Handles are shared (`Arc`) and never own the stream; the platform may
/// end a track at any moment (device unplugged), so callers look the
/// track up again every time they need it.
pub trait VideoTrack: Send + Sync {
    fn id(&self) -> &str;

    /// `false` once the track has ended.
    fn is_live(&self) -> bool;

    /// Newest frame the track has produced.
    ///
    /// Fails with [`crate::CameraError::FrameNotReady`] before the first
    /// frame arrives and [`crate::CameraError::TrackEnded`] afterwards.
    fn current_frame(&self) -> Result<Arc<VideoFrame>>;
}

/// A live capture session (the Stream Handle).
pub trait MediaStream: Send {
    fn id(&self) -> &str;

    /// Platform-side active flag; may flip to `false` without `stop`.
    fn is_active(&self) -> bool;

    /// All tracks in platform order, audio included.
    fn tracks(&self) -> Vec<(TrackKind, String)>;

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>>;

    /// Stop every track and release the device.
    fn stop(&mut self);
}

/// Blocking entry points into the capture platform.
///
/// Both calls may wait on the OS (permission prompts, device negotiation),
/// so async callers run them on a blocking thread.
pub trait MediaDevices: Send + Sync {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>>;

    fn open(&self, constraints: &Constraints) -> Result<Box<dyn MediaStream>>;
}
