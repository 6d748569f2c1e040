// codecam-camera/src/source.rs
use crate::{MediaStream, TrackKind, VideoTrack};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub kind: String,
    pub id: String,
}

/// Snapshot of a stream, handed to observers when capture starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub id: String,
    pub active: bool,
    pub tracks: Vec<TrackInfo>,
}

/// Owner of the (at most one) live stream.
#[derive(Default)]
pub struct FrameSource {
    stream: Option<Box<dyn MediaStream>>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a freshly acquired stream.
    ///
    /// A previously held stream is stopped first so only one is ever owned.
    pub fn attach(&mut self, stream: Box<dyn MediaStream>) -> StreamInfo {
        if self.stop() {
            log::warn!("replaced a live stream; previous tracks stopped");
        }
        let info = describe(stream.as_ref());
        self.stream = Some(stream);
        info
    }

    /// Stop all tracks and drop the stream. Returns whether one was held.
    pub fn stop(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                log::debug!("stopping stream {}", stream.id());
                stream.stop();
                true
            }
            None => false,
        }
    }

    /// True iff a stream is owned, whatever its platform-side flag says.
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// True iff a stream is owned *and* the platform reports it active.
    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_active())
    }

    /// First live video track, looked up fresh each call.
    pub fn current_video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        let stream = self.stream.as_ref()?;
        if !stream.is_active() {
            return None;
        }
        stream.video_tracks().into_iter().find(|t| t.is_live())
    }

    pub fn stream_info(&self) -> Option<StreamInfo> {
        self.stream.as_deref().map(describe)
    }
}

fn describe(stream: &dyn MediaStream) -> StreamInfo {
    StreamInfo {
        id: stream.id().to_string(),
        active: stream.is_active(),
        tracks: stream
            .tracks()
            .into_iter()
            .map(|(kind, id)| TrackInfo {
                kind: match kind {
                    TrackKind::Video => "video".into(),
                    TrackKind::Audio => "audio".into(),
                },
                id,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CameraError, Result, VideoFrame};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Track {
        live: bool,
    }

    impl VideoTrack for Track {
        fn id(&self) -> &str { "t0" }
        fn is_live(&self) -> bool { self.live }
        fn current_frame(&self) -> Result<Arc<VideoFrame>> {
            Err(CameraError::FrameNotReady("t0".into()))
        }
    }

    struct Stream {
        active: Arc<AtomicBool>,
        stops: Arc<AtomicUsize>,
        tracks: Vec<Arc<dyn VideoTrack>>,
    }

    impl MediaStream for Stream {
        fn id(&self) -> &str { "s0" }
        fn is_active(&self) -> bool { self.active.load(Ordering::SeqCst) }
        fn tracks(&self) -> Vec<(TrackKind, String)> {
            vec![(TrackKind::Video, "t0".into()), (TrackKind::Audio, "a0".into())]
        }
        fn video_tracks(&self) -> Vec<Arc<dyn VideoTrack>> { self.tracks.clone() }
        fn stop(&mut self) { self.stops.fetch_add(1, Ordering::SeqCst); }
    }

    fn stream(tracks: Vec<Arc<dyn VideoTrack>>) -> (Box<Stream>, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let active = Arc::new(AtomicBool::new(true));
        let stops = Arc::new(AtomicUsize::new(0));
        let s = Box::new(Stream { active: active.clone(), stops: stops.clone(), tracks });
        (s, active, stops)
    }

    #[test]
    fn stop_without_stream_is_harmless() {
        let mut source = FrameSource::new();
        assert!(!source.stop());
        assert!(!source.stop());
        assert!(!source.is_active());
    }

    #[test]
    fn attach_then_stop_releases_tracks() {
        let (s, _active, stops) = stream(vec![Arc::new(Track { live: true })]);
        let mut source = FrameSource::new();
        let info = source.attach(s);
        assert_eq!(info.tracks.len(), 2);
        assert_eq!(info.tracks[1].kind, "audio");
        assert!(source.is_active());
        assert!(source.stop());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!source.is_active());
    }

    #[test]
    fn attaching_twice_stops_the_first_stream() {
        let (first, _a, first_stops) = stream(Vec::new());
        let (second, _b, second_stops) = stream(Vec::new());
        let mut source = FrameSource::new();
        source.attach(first);
        source.attach(second);
        assert_eq!(first_stops.load(Ordering::SeqCst), 1);
        assert_eq!(second_stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn track_lookup_skips_ended_tracks_and_inactive_streams() {
        let (s, active, _stops) = stream(vec![
            Arc::new(Track { live: false }),
            Arc::new(Track { live: true }),
        ]);
        let mut source = FrameSource::new();
        assert!(source.current_video_track().is_none());
        source.attach(s);
        assert!(source.current_video_track().is_some_and(|t| t.is_live()));

        active.store(false, Ordering::SeqCst);
        assert!(source.current_video_track().is_none());
        // Still owned, so still "active" from the caller's point of view.
        assert!(source.is_active());
        assert!(!source.is_streaming());
    }
}
