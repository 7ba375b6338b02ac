//! The timeline compositor.
//!
//! A single worker thread consumes a FIFO of frame requests. For each
//! request it walks the video tracks of the edit model, forwards per-clip
//! read requests (with the clip's time transform applied) to reader
//! handles it opens on demand, and assembles the returned images into a
//! [`Frame`]. Requests are deduplicated by time: concurrent requests for
//! the same presentation time share one composition.
//!
//! The worker waits on its queue with a bounded timeout so reader
//! lifecycle work keeps making progress when no requests arrive: readers
//! whose effective range no longer intersects the advertised active
//! ranges are stopped, parked on a draining list, and dropped once they
//! report quiescence.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use spool_common::{
    pending, FutureValue, ImageInfo, Options, Promise, RationalTime, TimeRange,
};
use spool_io::{MediaInfo, ReaderHandle, ReaderRegistry, VideoFrame};

use crate::frame::{Frame, FrameLayer};
use crate::model::{Clip, Timeline, TrackItem, TransitionKind};

/// How long the worker sleeps on an empty queue before running lifecycle
/// work anyway.
const REQUEST_TIMEOUT: Duration = Duration::from_millis(5);

/// A clip is identified by its position: (track index, item index).
type ClipKey = (usize, usize);

struct Request {
    time: RationalTime,
    id: u64,
    promise: Promise<Frame>,
}

struct Shared {
    timeline: Arc<Timeline>,
    registry: Arc<ReaderRegistry>,
    requests: Mutex<VecDeque<Request>>,
    request_cond: Condvar,
    /// Single-flight table: one composition per outstanding time.
    in_flight: Mutex<BTreeMap<RationalTime, (u64, FutureValue<Frame>)>>,
    next_request: AtomicU64,
    active_ranges: Mutex<Vec<TimeRange>>,
    cancel_readers: AtomicBool,
    reader_count: AtomicUsize,
    running: AtomicBool,
}

impl Shared {
    fn remove_in_flight(&self, time: RationalTime, id: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&time).is_some_and(|(entry_id, _)| *entry_id == id) {
            in_flight.remove(&time);
        }
    }
}

/// Resolves presentation times into composed frames. Owns its worker
/// thread and every reader; dropping the compositor tears both down.
pub struct Compositor {
    shared: Arc<Shared>,
    image_info: Option<ImageInfo>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Compositor {
    /// Create a compositor over a validated timeline.
    pub fn new(timeline: Arc<Timeline>, registry: Arc<ReaderRegistry>) -> Self {
        let image_info = probe_image_info(&timeline, &registry);
        let shared = Arc::new(Shared {
            timeline,
            registry,
            requests: Mutex::new(VecDeque::new()),
            request_cond: Condvar::new(),
            in_flight: Mutex::new(BTreeMap::new()),
            next_request: AtomicU64::new(0),
            active_ranges: Mutex::new(Vec::new()),
            cancel_readers: AtomicBool::new(false),
            reader_count: AtomicUsize::new(0),
            running: AtomicBool::new(true),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("spool-compositor".into())
            .spawn(move || Worker::new(worker_shared).run())
            .expect("spawn compositor worker");
        Self {
            shared,
            image_info,
            worker: Some(worker),
        }
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.shared.timeline
    }

    /// Image description of the first clip with video, probed at
    /// construction.
    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.image_info.as_ref()
    }

    /// Request the composed frame for a presentation time.
    ///
    /// Concurrent requests for the same time share one composition. The
    /// returned frame always carries the requested time; layers may be
    /// missing when readers fail.
    pub fn request_frame(&self, time: RationalTime) -> FutureValue<Frame> {
        let (id, promise, future) = {
            let mut in_flight = self.shared.in_flight.lock();
            if let Some((_, future)) = in_flight.get(&time) {
                if future.is_pending() {
                    return future.clone();
                }
            }
            let (promise, future) = pending();
            let id = self.shared.next_request.fetch_add(1, Ordering::Relaxed);
            in_flight.insert(time, (id, future.clone()));
            (id, promise, future)
        };
        self.shared
            .requests
            .lock()
            .push_back(Request { time, id, promise });
        self.shared.request_cond.notify_one();
        future
    }

    /// Advise which regions of the timeline the consumer will visit.
    /// Readers for clips outside every range become stop candidates.
    pub fn set_active_ranges(&self, ranges: Vec<TimeRange>) {
        *self.shared.active_ranges.lock() = ranges;
    }

    /// Drop every queued frame request (their futures resolve to
    /// `Cancelled`) and cancel outstanding reader requests. Readers stay
    /// open.
    pub fn cancel_frames(&self) {
        self.shared.requests.lock().clear();
        self.shared.in_flight.lock().clear();
        self.shared.cancel_readers.store(true, Ordering::Release);
        self.shared.request_cond.notify_one();
    }

    /// Number of open (non-draining) readers. Diagnostic.
    pub fn open_reader_count(&self) -> usize {
        self.shared.reader_count.load(Ordering::Acquire)
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.request_cond.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// The first clip that opens with video defines the timeline's image
/// description.
fn probe_image_info(timeline: &Timeline, registry: &ReaderRegistry) -> Option<ImageInfo> {
    let mut options = Options::new();
    options.set_default_speed(timeline.duration.rate);
    for (_, track) in timeline.video_tracks() {
        for item in &track.items {
            let Some(clip) = item.as_clip() else { continue };
            match registry.open(&clip.media.path(), &options) {
                Ok(handle) => {
                    if let Some(info) = handle.info().video.first().copied() {
                        return Some(info);
                    }
                }
                Err(error) => {
                    debug!(clip = %clip.name, %error, "image info probe failed");
                }
            }
        }
    }
    None
}

struct Reader {
    handle: ReaderHandle,
    info: MediaInfo,
}

struct Worker {
    shared: Arc<Shared>,
    readers: HashMap<ClipKey, Reader>,
    draining: Vec<ReaderHandle>,
}

struct LayerData {
    image: FutureValue<VideoFrame>,
    image_b: Option<FutureValue<VideoFrame>>,
    transition: TransitionKind,
    transition_value: f32,
}

impl Worker {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            readers: HashMap::new(),
            draining: Vec::new(),
        }
    }

    fn run(mut self) {
        while self.shared.running.load(Ordering::Acquire) {
            let request = {
                let mut requests = self.shared.requests.lock();
                if requests.is_empty() {
                    let _ = self
                        .shared
                        .request_cond
                        .wait_for(&mut requests, REQUEST_TIMEOUT);
                }
                requests.pop_front()
            };
            if self.shared.cancel_readers.swap(false, Ordering::AcqRel) {
                for reader in self.readers.values() {
                    reader.handle.cancel_all();
                }
            }
            if let Some(request) = request {
                self.serve(request);
            }
            self.stop_readers();
            self.del_readers();
            self.shared
                .reader_count
                .store(self.readers.len(), Ordering::Release);
        }
    }

    /// Assemble the frame for one request. Failures demote individual
    /// layers; the frame is always delivered with the requested time.
    fn serve(&mut self, request: Request) {
        let timeline = Arc::clone(&self.shared.timeline);
        let time = request.time - timeline.global_start;

        let mut layer_data: Vec<LayerData> = Vec::new();
        for (track_index, track) in timeline.video_tracks() {
            let Some(item_index) = track.clip_at(time) else {
                continue;
            };
            let clip = track.items[item_index]
                .as_clip()
                .expect("clip_at returns clip indices");
            let range = track.trimmed_range_in_parent(item_index);
            let Some(image) = self.read_video((track_index, item_index), clip, &range, time)
            else {
                continue;
            };
            let mut data = LayerData {
                image,
                image_b: None,
                transition: TransitionKind::None,
                transition_value: 0.0,
            };

            // Outgoing transition on the right edge of this clip.
            if let Some(transition) =
                track.items.get(item_index + 1).and_then(TrackItem::as_transition)
            {
                if transition.kind != TransitionKind::None {
                    let transition_start = range.end_time_inclusive() - transition.in_offset;
                    if time > transition_start {
                        if let Some(clip_b) =
                            track.items.get(item_index + 2).and_then(TrackItem::as_clip)
                        {
                            let range_b = track.trimmed_range_in_parent(item_index + 2);
                            data.image_b = self.read_video(
                                (track_index, item_index + 2),
                                clip_b,
                                &range_b,
                                time,
                            );
                            data.transition = transition.kind;
                            data.transition_value = (((time - transition_start).value + 1.0)
                                / (transition.in_offset.value
                                    + transition.out_offset.value
                                    + 1.0)) as f32;
                        }
                    }
                }
            }
            // Incoming transition on the left edge. The outgoing one wins
            // when both would contribute.
            if data.image_b.is_none() && item_index >= 2 {
                if let Some(transition) =
                    track.items.get(item_index - 1).and_then(TrackItem::as_transition)
                {
                    if transition.kind != TransitionKind::None {
                        let transition_end = range.start + transition.out_offset;
                        if time < transition_end {
                            if let Some(clip_b) =
                                track.items.get(item_index - 2).and_then(TrackItem::as_clip)
                            {
                                let range_b = track.trimmed_range_in_parent(item_index - 2);
                                data.image_b = self.read_video(
                                    (track_index, item_index - 2),
                                    clip_b,
                                    &range_b,
                                    time,
                                );
                                data.transition = transition.kind;
                                data.transition_value = 1.0
                                    - (((time - range.start + transition.in_offset).value + 1.0)
                                        / (transition.in_offset.value
                                            + transition.out_offset.value
                                            + 1.0))
                                        as f32;
                            }
                        }
                    }
                }
            }
            layer_data.push(data);
        }

        let mut frame = Frame::new(request.time);
        for data in layer_data {
            let image = match data.image.wait() {
                Ok(video) => video.image,
                Err(error) => {
                    if !error.is_cancelled() {
                        warn!(time = %request.time, %error, "layer dropped");
                    }
                    continue;
                }
            };
            let image_b = match data.image_b {
                Some(future) => match future.wait() {
                    Ok(video) => Some(video.image),
                    Err(error) => {
                        if !error.is_cancelled() {
                            warn!(time = %request.time, %error, "transition image dropped");
                        }
                        None
                    }
                },
                None => None,
            };
            let (transition, transition_value) = if image_b.is_some() {
                (data.transition, data.transition_value)
            } else {
                (TransitionKind::None, 0.0)
            };
            frame.layers.push(FrameLayer {
                image,
                image_b,
                transition,
                transition_value,
            });
        }
        request.promise.set(frame);
        self.shared.remove_in_flight(request.time, request.id);
    }

    /// Issue a read for one clip at the given track time, opening the
    /// clip's reader on demand. `None` when the reader cannot be opened;
    /// the clip then contributes no layer.
    fn read_video(
        &mut self,
        key: ClipKey,
        clip: &Clip,
        range: &TimeRange,
        time: RationalTime,
    ) -> Option<FutureValue<VideoFrame>> {
        if !self.readers.contains_key(&key) {
            let path = clip.media.path();
            let mut options = Options::new();
            options.set_default_speed(self.shared.timeline.duration.rate);
            match self.shared.registry.open(&path, &options) {
                Ok(handle) => {
                    info!(path = %path.display(), clip = %clip.name, "reader opened");
                    let info = handle.info().clone();
                    self.readers.insert(key, Reader { handle, info });
                }
                Err(error) => {
                    warn!(path = %path.display(), clip = %clip.name, %error, "cannot open reader");
                    return None;
                }
            }
        }
        let reader = self.readers.get(&key).expect("just inserted");
        let read_time = clip_read_time(clip, range, time, reader.info.video_duration.rate);
        Some(reader.handle.read_video(read_time))
    }

    /// Stop readers whose effective range (clip range widened by adjacent
    /// transition offsets) intersects no active range and which have no
    /// pending work.
    fn stop_readers(&mut self) {
        let active = self.shared.active_ranges.lock().clone();
        let timeline = Arc::clone(&self.shared.timeline);
        let mut stopped: Vec<ClipKey> = Vec::new();
        for (&key, reader) in &self.readers {
            let (track_index, item_index) = key;
            let track = &timeline.tracks[track_index];
            let range = track.trimmed_range_in_parent(item_index);
            let mut start = range.start;
            let mut end = range.end_time_exclusive();
            if item_index >= 1 {
                if let Some(transition) =
                    track.items.get(item_index - 1).and_then(TrackItem::as_transition)
                {
                    start = start - transition.in_offset;
                }
            }
            if let Some(transition) =
                track.items.get(item_index + 1).and_then(TrackItem::as_transition)
            {
                end = end + transition.out_offset;
            }
            let effective = TimeRange::from_start_end_time(
                timeline.global_start + start,
                timeline.global_start + end,
            );
            let wanted = active.iter().any(|range| effective.intersects(range));
            if !wanted && !reader.handle.has_pending() {
                stopped.push(key);
            }
        }
        for key in stopped {
            let reader = self.readers.remove(&key).expect("collected above");
            info!(path = %reader.handle.path().display(), "reader stopped");
            reader.handle.stop();
            self.draining.push(reader.handle);
        }
    }

    /// Drop drained readers once their workers have quiesced.
    fn del_readers(&mut self) {
        self.draining.retain(|handle| {
            if handle.has_stopped() {
                debug!(path = %handle.path().display(), "reader deleted");
                false
            } else {
                true
            }
        });
    }
}

/// Map a track time to the discrete source frame to read: clip-local
/// time, linear warps composed left to right around the clip start, then
/// floored onto the reader's native frame grid.
fn clip_read_time(
    clip: &Clip,
    range: &TimeRange,
    time: RationalTime,
    native_rate: f64,
) -> RationalTime {
    let clip_start = clip.source_range.start;
    let mut clip_time = clip_start + (time - range.start);
    for warp in &clip.time_warps {
        clip_time = clip_start
            + RationalTime::new((clip_time - clip_start).value * warp.scalar, clip_time.rate);
    }
    clip_time.rescaled_to(native_rate).floor()
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gap, LinearWarp, MediaRef, Track, TrackKind, Transition};
    use spool_common::{Image, PixelType, PlaybackError};
    use spool_io::{Decode, Plugin};
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn t24(value: f64) -> RationalTime {
        RationalTime::new(value, 24.0)
    }

    fn generator_clip(name: &str, frames: f64, color: &str) -> TrackItem {
        TrackItem::Clip(Clip {
            name: name.into(),
            source_range: TimeRange::new(t24(0.0), t24(frames)),
            media: MediaRef::Generator {
                url: format!("gen://solid?frames={frames}&color={color}"),
            },
            time_warps: Vec::new(),
        })
    }

    fn timeline_of(tracks: Vec<Track>) -> Arc<Timeline> {
        let duration = tracks
            .iter()
            .map(|track| track.duration().rescaled_to(24.0))
            .max()
            .unwrap_or(t24(0.0));
        Arc::new(Timeline {
            global_start: t24(0.0),
            duration,
            tracks,
        })
    }

    fn compositor_for(tracks: Vec<Track>) -> Compositor {
        Compositor::new(
            timeline_of(tracks),
            Arc::new(ReaderRegistry::with_default_plugins()),
        )
    }

    /// A clip trimmed out of the middle of its media, leaving handle
    /// frames on both sides for transition reads.
    fn trimmed_clip(name: &str, color: &str) -> TrackItem {
        TrackItem::Clip(Clip {
            name: name.into(),
            source_range: TimeRange::new(t24(4.0), t24(24.0)),
            media: MediaRef::Generator {
                url: format!("gen://solid?frames=32&color={color}"),
            },
            time_warps: Vec::new(),
        })
    }

    fn two_clip_dissolve() -> Vec<Track> {
        vec![Track {
            kind: TrackKind::Video,
            items: vec![
                trimmed_clip("a", "ff0000"),
                TrackItem::Transition(Transition {
                    kind: TransitionKind::Dissolve,
                    in_offset: t24(2.0),
                    out_offset: t24(2.0),
                }),
                trimmed_clip("b", "00ff00"),
            ],
        }]
    }

    // ── Frame assembly ───────────────────────────────────────────

    #[test]
    fn single_clip_single_layer() {
        let compositor = compositor_for(vec![Track {
            kind: TrackKind::Video,
            items: vec![generator_clip("a", 24.0, "ff0000")],
        }]);
        let frame = compositor.request_frame(t24(3.0)).wait().unwrap();
        assert_eq!(frame.time, t24(3.0));
        assert_eq!(frame.layers.len(), 1);
        assert!(frame.layers[0].image_b.is_none());
        assert_eq!(&frame.layers[0].image.data()[..3], &[0xff, 0, 0]);
    }

    #[test]
    fn tracks_stack_bottom_first() {
        let compositor = compositor_for(vec![
            Track {
                kind: TrackKind::Video,
                items: vec![generator_clip("bg", 24.0, "ff0000")],
            },
            Track {
                kind: TrackKind::Video,
                items: vec![generator_clip("fg", 24.0, "00ff00")],
            },
        ]);
        let frame = compositor.request_frame(t24(0.0)).wait().unwrap();
        assert_eq!(frame.layers.len(), 2);
        assert_eq!(&frame.layers[0].image.data()[..3], &[0xff, 0, 0]);
        assert_eq!(&frame.layers[1].image.data()[..3], &[0, 0xff, 0]);
    }

    #[test]
    fn gaps_and_audio_contribute_nothing() {
        let compositor = compositor_for(vec![
            Track {
                kind: TrackKind::Video,
                items: vec![
                    TrackItem::Gap(Gap { duration: t24(10.0) }),
                    generator_clip("late", 24.0, "0000ff"),
                ],
            },
            Track {
                kind: TrackKind::Audio,
                items: vec![generator_clip("music", 48.0, "ffffff")],
            },
        ]);
        let in_gap = compositor.request_frame(t24(5.0)).wait().unwrap();
        assert!(in_gap.layers.is_empty());
        assert_eq!(in_gap.time, t24(5.0));

        let in_clip = compositor.request_frame(t24(12.0)).wait().unwrap();
        assert_eq!(in_clip.layers.len(), 1);
    }

    #[test]
    fn missing_media_delivers_empty_frame() {
        let compositor = compositor_for(vec![Track {
            kind: TrackKind::Video,
            items: vec![TrackItem::Clip(Clip {
                name: "broken".into(),
                source_range: TimeRange::new(t24(0.0), t24(24.0)),
                media: MediaRef::SingleFile {
                    url: "/nonexistent/clip.ppm".into(),
                },
                time_warps: Vec::new(),
            })],
        }]);
        let frame = compositor.request_frame(t24(3.0)).wait().unwrap();
        assert_eq!(frame.time, t24(3.0), "frame time identity holds on failure");
        assert!(frame.layers.is_empty());
    }

    // ── Transitions ──────────────────────────────────────────────

    #[test]
    fn dissolve_outgoing_side() {
        let compositor = compositor_for(two_clip_dissolve());
        // One frame before the outgoing clip's last frame.
        let frame = compositor.request_frame(t24(22.0)).wait().unwrap();
        assert_eq!(frame.layers.len(), 1);
        let layer = &frame.layers[0];
        assert_eq!(&layer.image.data()[..3], &[0xff, 0, 0]);
        assert_eq!(
            &layer.image_b.as_ref().unwrap().data()[..3],
            &[0, 0xff, 0]
        );
        assert_eq!(layer.transition, TransitionKind::Dissolve);
        assert!((layer.transition_value - 0.4).abs() < 1e-6);
    }

    #[test]
    fn dissolve_incoming_side() {
        let compositor = compositor_for(two_clip_dissolve());
        let frame = compositor.request_frame(t24(25.0)).wait().unwrap();
        assert_eq!(frame.layers.len(), 1);
        let layer = &frame.layers[0];
        assert_eq!(&layer.image.data()[..3], &[0, 0xff, 0]);
        assert_eq!(
            &layer.image_b.as_ref().unwrap().data()[..3],
            &[0xff, 0, 0]
        );
        assert_eq!(layer.transition, TransitionKind::Dissolve);
        assert!((layer.transition_value - 0.2).abs() < 1e-6);
    }

    #[test]
    fn dissolve_without_handles_degrades() {
        // Clips trimmed at source frame 0: the cross-read before the cut
        // lands outside the incoming clip's media, so the blend image is
        // omitted while the layer itself still arrives.
        let compositor = compositor_for(vec![Track {
            kind: TrackKind::Video,
            items: vec![
                generator_clip("a", 24.0, "ff0000"),
                TrackItem::Transition(Transition {
                    kind: TransitionKind::Dissolve,
                    in_offset: t24(2.0),
                    out_offset: t24(2.0),
                }),
                generator_clip("b", 24.0, "00ff00"),
            ],
        }]);
        let frame = compositor.request_frame(t24(22.0)).wait().unwrap();
        assert_eq!(frame.layers.len(), 1);
        assert!(frame.layers[0].image_b.is_none());
        assert_eq!(frame.layers[0].transition, TransitionKind::None);
    }

    #[test]
    fn no_transition_outside_overlap() {
        let compositor = compositor_for(two_clip_dissolve());
        let frame = compositor.request_frame(t24(10.0)).wait().unwrap();
        assert_eq!(frame.layers.len(), 1);
        assert!(frame.layers[0].image_b.is_none());
        assert_eq!(frame.layers[0].transition, TransitionKind::None);
    }

    // ── Reader lifecycle ─────────────────────────────────────────

    fn wait_for_reader_count(compositor: &Compositor, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while compositor.open_reader_count() != expected {
            assert!(
                Instant::now() < deadline,
                "reader count never reached {expected} (is {})",
                compositor.open_reader_count()
            );
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn readers_stop_outside_active_ranges() {
        let compositor = compositor_for(vec![Track {
            kind: TrackKind::Video,
            items: vec![
                generator_clip("a", 24.0, "ff0000"),
                generator_clip("b", 24.0, "00ff00"),
            ],
        }]);
        compositor.set_active_ranges(vec![TimeRange::new(t24(0.0), t24(10.0))]);
        compositor.request_frame(t24(3.0)).wait().unwrap();
        wait_for_reader_count(&compositor, 1);

        // Nothing active: the reader drains away.
        compositor.set_active_ranges(Vec::new());
        wait_for_reader_count(&compositor, 0);
    }

    #[test]
    fn transition_widens_effective_range() {
        let compositor = compositor_for(two_clip_dissolve());
        // Active just before the cut keeps both clips' readers alive: the
        // incoming clip's range is widened by the transition's in offset.
        compositor.set_active_ranges(vec![TimeRange::new(t24(22.0), t24(1.0))]);
        compositor.request_frame(t24(22.0)).wait().unwrap();
        wait_for_reader_count(&compositor, 2);
    }

    // ── Deduplication ────────────────────────────────────────────

    struct SlowDecoder {
        info: MediaInfo,
        decodes: Arc<AtomicUsize>,
    }

    impl Decode for SlowDecoder {
        fn info(&self) -> &MediaInfo {
            &self.info
        }
        fn decode(&self, _time: RationalTime) -> Result<Image, PlaybackError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(30));
            Ok(Image::new(ImageInfo::new(2, 2, PixelType::RgbU8)))
        }
    }

    struct SlowPlugin {
        decodes: Arc<AtomicUsize>,
    }

    impl Plugin for SlowPlugin {
        fn name(&self) -> &str {
            "slow"
        }
        fn extensions(&self) -> &[&str] {
            &[]
        }
        fn sniff(&self, path: &Path) -> bool {
            path.to_str().is_some_and(|text| text.starts_with("slow://"))
        }
        fn open(
            &self,
            path: &Path,
            options: &Options,
        ) -> Result<ReaderHandle, PlaybackError> {
            let decoder = SlowDecoder {
                info: MediaInfo {
                    video: vec![ImageInfo::new(2, 2, PixelType::RgbU8)],
                    video_duration: RationalTime::new(
                        24.0,
                        options.default_speed().unwrap_or(24.0),
                    ),
                    audio: None,
                },
                decodes: Arc::clone(&self.decodes),
            };
            Ok(ReaderHandle::new(path.to_path_buf(), Arc::new(decoder), 1))
        }
    }

    #[test]
    fn concurrent_requests_share_one_composition() {
        let decodes = Arc::new(AtomicUsize::new(0));
        let mut registry = ReaderRegistry::new();
        registry.register(Arc::new(SlowPlugin {
            decodes: Arc::clone(&decodes),
        }));

        let timeline = timeline_of(vec![Track {
            kind: TrackKind::Video,
            items: vec![TrackItem::Clip(Clip {
                name: "slow".into(),
                source_range: TimeRange::new(t24(0.0), t24(24.0)),
                media: MediaRef::SingleFile {
                    url: "slow://clip".into(),
                },
                time_warps: Vec::new(),
            })],
        }]);
        let compositor = Compositor::new(timeline, Arc::new(registry));

        let first = compositor.request_frame(t24(4.0));
        let second = compositor.request_frame(t24(4.0));
        assert!(first.wait().is_ok());
        assert!(second.wait().is_ok());
        assert_eq!(
            decodes.load(Ordering::SeqCst),
            1,
            "both requests served from a single composition"
        );
    }

    #[test]
    fn cancel_frames_drops_queued_requests() {
        let compositor = compositor_for(two_clip_dissolve());
        // Queue a burst, then cancel. Some may already be served; any
        // cancelled ones must resolve with Cancelled, and none may hang.
        let futures: Vec<_> = (0..20)
            .map(|i| compositor.request_frame(t24(i as f64)))
            .collect();
        compositor.cancel_frames();
        for (i, future) in futures.into_iter().enumerate() {
            match future.wait() {
                Ok(frame) => assert_eq!(frame.time, t24(i as f64)),
                Err(error) => assert!(error.is_cancelled()),
            }
        }
    }

    // ── Time transform ───────────────────────────────────────────

    fn bare_clip(start: f64, duration: f64, warps: Vec<LinearWarp>) -> Clip {
        Clip {
            name: "c".into(),
            source_range: TimeRange::new(t24(start), t24(duration)),
            media: MediaRef::Generator {
                url: "gen://solid".into(),
            },
            time_warps: warps,
        }
    }

    #[test]
    fn read_time_offsets_into_source() {
        let clip = bare_clip(6.0, 24.0, Vec::new());
        let range = TimeRange::new(t24(10.0), t24(24.0));
        // Track time 14 is 4 frames into the clip: source 6 + 4 = 10.
        assert_eq!(clip_read_time(&clip, &range, t24(14.0), 24.0), t24(10.0));
    }

    #[test]
    fn read_time_applies_warps_in_order() {
        let clip = bare_clip(
            0.0,
            24.0,
            vec![LinearWarp { scalar: 2.0 }, LinearWarp { scalar: 0.5 }],
        );
        let range = TimeRange::new(t24(0.0), t24(24.0));
        // 2.0 then 0.5 compose to identity.
        assert_eq!(clip_read_time(&clip, &range, t24(8.0), 24.0), t24(8.0));

        let double = bare_clip(0.0, 24.0, vec![LinearWarp { scalar: 2.0 }]);
        assert_eq!(clip_read_time(&double, &range, t24(5.0), 24.0), t24(10.0));
    }

    #[test]
    fn read_time_floors_to_native_rate() {
        let clip = bare_clip(0.0, 24.0, Vec::new());
        let range = TimeRange::new(t24(0.0), t24(24.0));
        // 9 frames at 24 fps is 4.5 frames at 12 fps; floor picks frame 4.
        assert_eq!(
            clip_read_time(&clip, &range, t24(9.0), 12.0),
            RationalTime::new(4.0, 12.0)
        );
    }
}
