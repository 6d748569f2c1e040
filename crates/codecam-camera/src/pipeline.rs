// codecam-camera/src/pipeline.rs
// ------------------------------------------------------------
// GStreamer platform: DeviceMonitor for enumeration, and a
// `source ! videoconvert ! NV12 ! appsink` pipeline per stream.
// The appsink keeps only the newest sample (max-buffers=1,
// drop=true); a callback copies it into the track's slot.
// ------------------------------------------------------------

use crate::{
    CameraError, Constraints, DeviceDescriptor, MediaDevices, MediaStream, Result, TrackKind,
    VideoConstraint, VideoFrame, VideoTrack,
};
use gst::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

static NEXT_STREAM: AtomicU64 = AtomicU64::new(0);

// Properties providers use to expose a device node, most specific first.
const PATH_PROPERTIES: [&str; 3] = ["device.path", "api.v4l2.path", "api.libcamera.path"];

/// Cameras reached through GStreamer (libcamera or V4L2).
#[derive(Debug, Default)]
pub struct GstMediaDevices {
    _priv: (),
}

impl GstMediaDevices {
    pub fn new() -> Result<Self> {
        gst::init().map_err(CameraError::GstInit)?;
        Ok(Self { _priv: () })
    }

    /// Source element description for the requested camera.
    fn source_for(video: &VideoConstraint) -> String {
        match video {
            VideoConstraint::Device(id) if id.starts_with("/dev/") => {
                format!("v4l2src device=\"{id}\"")
            }
            VideoConstraint::Device(id) => format!("libcamerasrc camera-name=\"{id}\""),
            VideoConstraint::Any if gst::ElementFactory::find("libcamerasrc").is_some() => {
                // Pi (libcamera) stack
                "libcamerasrc".to_string()
            }
            // PC webcam
            VideoConstraint::Any => "v4l2src".to_string(),
        }
    }
}

impl MediaDevices for GstMediaDevices {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let monitor = gst::DeviceMonitor::new();
        monitor.add_filter(Some("Video/Source"), None);
        monitor.start().map_err(CameraError::DeviceMonitor)?;

        let devices = monitor
            .devices()
            .into_iter()
            .map(|device| {
                let label = device.display_name().to_string();
                let id = device
                    .properties()
                    .and_then(|props| {
                        PATH_PROPERTIES
                            .iter()
                            .find_map(|key| props.get::<String>(*key).ok())
                    })
                    .unwrap_or_else(|| label.clone());
                DeviceDescriptor::video(id, label)
            })
            .collect::<Vec<_>>();

        monitor.stop();
        log::debug!("device monitor found {} video source(s)", devices.len());
        Ok(devices)
    }

    fn open(&self, constraints: &Constraints) -> Result<Box<dyn MediaStream>> {
        if constraints.audio {
            log::warn!("audio capture requested but not supported; opening video only");
        }

        let pipe_str = format!(
            "{src} ! videoconvert ! video/x-raw,format=NV12 \
            ! appsink name=sink max-buffers=1 drop=true sync=false",
            src = Self::source_for(&constraints.video),
        );
        log::debug!("launching `{pipe_str}`");

        let pipeline = gst::parse::launch(&pipe_str)
            .map_err(CameraError::ParsePipeline)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| CameraError::NotPipeline)?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or(CameraError::AppSinkNotFound)?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| CameraError::AppSinkDowncastFailed)?;

        let n = NEXT_STREAM.fetch_add(1, Ordering::Relaxed);
        let track = Arc::new(GstTrack {
            id: format!("video-{n}"),
            latest: Mutex::new(None),
            ended: AtomicBool::new(false),
        });

        let slot = Arc::clone(&track);
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    match sample_to_frame(sample) {
                        Ok(frame) => slot.store(frame),
                        Err(e) => log::warn!("dropping unreadable sample: {e}"),
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline
            .set_state(gst::State::Playing)
            .map_err(CameraError::StateChange)?;

        Ok(Box::new(GstStream { id: format!("stream-{n}"), pipeline, track }))
    }
}

struct GstTrack {
    id: String,
    latest: Mutex<Option<Arc<VideoFrame>>>,
    ended: AtomicBool,
}

impl GstTrack {
    fn store(&self, frame: VideoFrame) {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        *latest = Some(Arc::new(frame));
    }

    fn has_frame(&self) -> bool {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

impl VideoTrack for GstTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_live(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }

    fn current_frame(&self) -> Result<Arc<VideoFrame>> {
        if !self.is_live() {
            return Err(CameraError::TrackEnded(self.id.clone()));
        }
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| CameraError::FrameNotReady(self.id.clone()))
    }
}

/// Pipeline handle – owns the pipeline and the single video track.
struct GstStream {
    id: String,
    pipeline: gst::Pipeline,
    track: Arc<GstTrack>,
}

impl GstStream {
    /// Drain error/EOS messages; either one ends the track (unplug, driver fault).
    fn poll_bus(&self) {
        let Some(bus) = self.pipeline.bus() else { return };
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos]) {
            match msg.view() {
                gst::MessageView::Error(err) => {
                    log::error!("{}: pipeline error: {} ({:?})", self.id, err.error(), err.debug());
                }
                _ => log::debug!("{}: end of stream", self.id),
            }
            self.track.ended.store(true, Ordering::Release);
        }
    }
}

impl MediaStream for GstStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.poll_bus();
        self.track.is_live()
    }

    fn tracks(&self) -> Vec<(TrackKind, String)> {
        vec![(TrackKind::Video, self.track.id.clone())]
    }

    fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> {
        self.poll_bus();
        // Caps are still being negotiated until the first sample lands.
        if self.track.is_live() && self.track.has_frame() {
            vec![Arc::clone(&self.track) as Arc<dyn VideoTrack>]
        } else {
            Vec::new()
        }
    }

    fn stop(&mut self) {
        self.track.ended.store(true, Ordering::Release);
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            log::warn!("{}: failed to stop pipeline: {e}", self.id);
        }
    }
}

impl Drop for GstStream {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

/// Convert a `gst::Sample` into our [`VideoFrame`] wrapper.
fn sample_to_frame(sample: gst::Sample) -> Result<VideoFrame> {
    let buffer = sample.buffer().ok_or(CameraError::MissingBuffer)?;
    let caps   = sample.caps().ok_or(CameraError::MissingCaps)?;
    let s      = caps.structure(0).ok_or(CameraError::MissingStructure)?;
    let width  = s.get::<i32>("width").map_err(|e| CameraError::FieldError(e.to_string()))? as u32;
    let height = s.get::<i32>("height").map_err(|e| CameraError::FieldError(e.to_string()))? as u32;

    let pts = buffer
        .pts()
        .map(|t| Duration::from_nanos(t.nseconds()))
        .unwrap_or(Duration::ZERO);

    let map = buffer.map_readable().map_err(|e| CameraError::BufferMap(e.to_string()))?;
    let data = map.as_slice().to_vec();
    drop(map);

    // videoconvert pads rows; recover the luma stride from the total size.
    let rows = height as usize + (height as usize).div_ceil(2);
    let stride = if rows > 0 { (data.len() / rows) as u32 } else { width };

    Ok(VideoFrame { data, width, height, stride: stride.max(width), pts })
}

// ---------------------------------------------------------------------------
// Integration test (cargo test -- --ignored) – skipped on CI without camera
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn device_paths_pick_v4l2() {
        let src = GstMediaDevices::source_for(&VideoConstraint::Device("/dev/video2".into()));
        assert_eq!(src, "v4l2src device=\"/dev/video2\"");
        let src = GstMediaDevices::source_for(&VideoConstraint::Device("/base/imx708".into()));
        assert!(src.starts_with("libcamerasrc"));
    }

    #[test]
    #[ignore]
    #[serial]
    fn enumerate_and_capture_one() {
        let devices = GstMediaDevices::new().expect("gst init");
        let found = devices.enumerate_devices().expect("enumerate");
        println!("found {found:?}");

        let mut stream = devices
            .open(&crate::resolve_constraints(&found))
            .expect("open");
        let track = (0..200)
            .find_map(|_| {
                std::thread::sleep(Duration::from_millis(25));
                stream.video_tracks().into_iter().next()
            })
            .expect("first frame");
        let frame = track.current_frame().expect("frame");
        println!("got {}x{} stride {}", frame.width, frame.height, frame.stride);
        assert!(frame.data.len() >= frame.expected_len());
        stream.stop();
        assert!(!stream.is_active());
    }
}
