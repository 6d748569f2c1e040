// codecam-camera/src/device.rs
use crate::{MediaDevices, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    #[serde(rename = "videoinput")]
    VideoInput,
    #[serde(rename = "audioinput")]
    AudioInput,
    #[serde(rename = "audiooutput")]
    AudioOutput,
}

/// Read-only description of a capture device, as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub kind: DeviceKind,
    pub device_id: String,
    pub label: String,
}

impl DeviceDescriptor {
    pub fn video(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { kind: DeviceKind::VideoInput, device_id: device_id.into(), label: label.into() }
    }
}

/// Which camera to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VideoRepr", into = "VideoRepr")]
pub enum VideoConstraint {
    /// Whatever camera the platform picks.
    Any,
    /// A specific device by identifier.
    Device(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum VideoRepr {
    Flag(bool),
    Device {
        #[serde(rename = "deviceSelector")]
        device_selector: String,
    },
}

impl TryFrom<VideoRepr> for VideoConstraint {
    type Error = &'static str;

    fn try_from(repr: VideoRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            VideoRepr::Flag(true) => Ok(VideoConstraint::Any),
            VideoRepr::Flag(false) => Err("video capture cannot be disabled"),
            VideoRepr::Device { device_selector } => Ok(VideoConstraint::Device(device_selector)),
        }
    }
}

impl From<VideoConstraint> for VideoRepr {
    fn from(video: VideoConstraint) -> Self {
        match video {
            VideoConstraint::Any => VideoRepr::Flag(true),
            VideoConstraint::Device(device_selector) => VideoRepr::Device { device_selector },
        }
    }
}

/// Capture-constraint descriptor handed to [`MediaDevices::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub video: VideoConstraint,
    pub audio: bool,
}

impl Constraints {
    /// Any camera, no microphone.
    pub fn any_video() -> Self {
        Self { video: VideoConstraint::Any, audio: false }
    }

    pub fn device(device_id: impl Into<String>) -> Self {
        Self { video: VideoConstraint::Device(device_id.into()), audio: false }
    }
}

/// Pick a camera from an enumeration.
///
/// With two or more cameras the *second* one is chosen: phones usually list
/// the front camera first, and the rear one is the better scanner. Platforms
/// promise no ordering, so this is only a heuristic.
pub fn resolve_constraints(devices: &[DeviceDescriptor]) -> Constraints {
    let videos: Vec<&DeviceDescriptor> = devices
        .iter()
        .filter(|d| d.kind == DeviceKind::VideoInput)
        .collect();

    let source = match videos.len() {
        0 => None,
        1 => Some(videos[0]),
        _ => Some(videos[1]),
    };

    match source {
        Some(d) if !d.device_id.is_empty() => Constraints::device(d.device_id.clone()),
        _ => Constraints::any_video(),
    }
}

/// Runs the enumeration once and turns it into [`Constraints`].
#[derive(Clone)]
pub struct DeviceSelector {
    devices: Arc<dyn MediaDevices>,
}

impl DeviceSelector {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self { devices }
    }

    /// Blocking; enumeration errors are returned untouched.
    pub fn resolve(&self) -> Result<Constraints> {
        let devices = self.devices.enumerate_devices()?;
        let constraints = resolve_constraints(&devices);
        log::debug!("resolved {:?} from {} device(s)", constraints, devices.len());
        Ok(constraints)
    }
}
