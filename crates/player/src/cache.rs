//! Read-ahead/read-behind frame cache.
//!
//! Each update pass computes the window of frame times playback is about
//! to visit — `read_behind` frames behind the playhead and `read_ahead`
//! in front, "behind" meaning earlier when playing forward and later when
//! playing in reverse. The window wraps inside the in/out range. The pass
//! advertises the window to the compositor as active ranges, evicts
//! everything outside it, requests what is missing, and polls outstanding
//! requests without blocking.

use std::collections::BTreeMap;

use spool_common::{loop_time, to_ranges, FutureValue, RationalTime, TimeRange};
use spool_timeline::{Compositor, Frame};

/// Which side of the playhead counts as "ahead".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheDirection {
    Forward,
    Reverse,
}

/// Bounded ordered map of presentation time to composed frame, plus the
/// outstanding requests that will fill it.
pub struct FrameCache {
    frames: BTreeMap<RationalTime, Frame>,
    pending: BTreeMap<RationalTime, FutureValue<Frame>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn get(&self, time: &RationalTime) -> Option<&Frame> {
        self.frames.get(time)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop outstanding requests (after the compositor cancelled them).
    /// Cached frames stay useful and are kept.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Run one cache policy pass. Returns the cached frame times coalesced
    /// into contiguous ranges, for publication to observers.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        compositor: &Compositor,
        current_time: RationalTime,
        in_out_range: &TimeRange,
        direction: CacheDirection,
        read_ahead: usize,
        read_behind: usize,
        rate: f64,
    ) -> Vec<TimeRange> {
        let step = RationalTime::new(1.0, rate);

        // The window starts `read_behind` frames behind the playhead in
        // the travel direction and advances with wrap, stopping early if
        // it would revisit its first frame.
        let mut time = current_time;
        let behind_steps = match direction {
            CacheDirection::Forward => read_behind,
            CacheDirection::Reverse => read_ahead,
        };
        for _ in 0..behind_steps {
            time = loop_time(time - step, in_out_range);
        }
        let mut window = Vec::with_capacity(read_ahead + read_behind);
        for _ in 0..(read_ahead + read_behind) {
            if !window.is_empty() && time == window[0] {
                break;
            }
            window.push(time);
            time = loop_time(time + step, in_out_range);
        }

        let target = to_ranges(window.clone());
        compositor.set_active_ranges(target.clone());

        // Evict frames that fell out of the window.
        self.frames
            .retain(|time, _| target.iter().any(|range| range.contains(*time)));

        // Request whatever is neither cached nor already in flight.
        for &time in &window {
            if !self.frames.contains_key(&time) && !self.pending.contains_key(&time) {
                self.pending.insert(time, compositor.request_frame(time));
            }
        }

        // Collect completed requests. The stored frame carries the
        // requested time even if the compositor produced an empty frame;
        // failed or cancelled requests are simply dropped.
        let mut completed = Vec::new();
        self.pending.retain(|&time, future| match future.ready() {
            None => true,
            Some(Ok(mut frame)) => {
                frame.time = time;
                completed.push(frame);
                false
            }
            Some(Err(_)) => false,
        });
        for frame in completed {
            self.frames.insert(frame.time, frame);
        }

        to_ranges(self.frames.keys().copied().collect())
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use spool_common::TimeRange;
    use spool_io::ReaderRegistry;
    use spool_timeline::{Clip, MediaRef, Timeline, Track, TrackItem, TrackKind};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn t24(value: f64) -> RationalTime {
        RationalTime::new(value, 24.0)
    }

    fn single_clip_compositor(frames: f64) -> Compositor {
        let timeline = Arc::new(Timeline {
            global_start: t24(0.0),
            duration: t24(frames),
            tracks: vec![Track {
                kind: TrackKind::Video,
                items: vec![TrackItem::Clip(Clip {
                    name: "clip".into(),
                    source_range: TimeRange::new(t24(0.0), t24(frames)),
                    media: MediaRef::Generator {
                        url: format!("gen://solid?frames={frames}"),
                    },
                    time_warps: Vec::new(),
                })],
            }],
        });
        Compositor::new(timeline, Arc::new(ReaderRegistry::with_default_plugins()))
    }

    fn fill(
        cache: &mut FrameCache,
        compositor: &Compositor,
        current: RationalTime,
        range: &TimeRange,
        direction: CacheDirection,
        ahead: usize,
        behind: usize,
    ) -> Vec<TimeRange> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let ranges = cache.update(compositor, current, range, direction, ahead, behind, 24.0);
            if cache.pending.is_empty() && !cache.is_empty() {
                return ranges;
            }
            assert!(Instant::now() < deadline, "cache never reached steady state");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn steady_state_window_around_playhead() {
        let compositor = single_clip_compositor(24.0);
        let range = TimeRange::new(t24(0.0), t24(24.0));
        let mut cache = FrameCache::new();

        let ranges = fill(
            &mut cache,
            &compositor,
            t24(5.0),
            &range,
            CacheDirection::Forward,
            10,
            1,
        );
        // One behind, ten ahead: frames 4 through 14.
        assert_eq!(ranges, vec![TimeRange::new(t24(4.0), t24(11.0))]);
        assert_eq!(cache.len(), 11);
    }

    #[test]
    fn cache_stays_bounded() {
        let compositor = single_clip_compositor(24.0);
        let range = TimeRange::new(t24(0.0), t24(24.0));
        let mut cache = FrameCache::new();

        for playhead in 0..24 {
            fill(
                &mut cache,
                &compositor,
                t24(f64::from(playhead)),
                &range,
                CacheDirection::Forward,
                6,
                2,
            );
            assert!(cache.len() <= 8, "cache exceeded bound at {playhead}");
        }
    }

    #[test]
    fn reverse_direction_reads_behind_later_times() {
        let compositor = single_clip_compositor(24.0);
        let range = TimeRange::new(t24(0.0), t24(24.0));
        let mut cache = FrameCache::new();

        let ranges = fill(
            &mut cache,
            &compositor,
            t24(10.0),
            &range,
            CacheDirection::Reverse,
            4,
            1,
        );
        // Stepping back by read_ahead when reversing: window covers 6..=10.
        assert_eq!(ranges, vec![TimeRange::new(t24(6.0), t24(5.0))]);
    }

    #[test]
    fn window_wraps_into_range() {
        let compositor = single_clip_compositor(24.0);
        let range = TimeRange::new(t24(0.0), t24(24.0));
        let mut cache = FrameCache::new();

        let ranges = fill(
            &mut cache,
            &compositor,
            t24(0.0),
            &range,
            CacheDirection::Forward,
            3,
            2,
        );
        // Two behind frame 0 wraps to 22 and 23.
        assert_eq!(
            ranges,
            vec![
                TimeRange::new(t24(0.0), t24(3.0)),
                TimeRange::new(t24(22.0), t24(2.0)),
            ]
        );
    }

    #[test]
    fn tiny_range_stops_before_revisiting() {
        let compositor = single_clip_compositor(24.0);
        // A 4-frame in/out range with a much larger window: every frame
        // cached once, no duplicates.
        let range = TimeRange::new(t24(0.0), t24(4.0));
        let mut cache = FrameCache::new();

        let ranges = fill(
            &mut cache,
            &compositor,
            t24(1.0),
            &range,
            CacheDirection::Forward,
            10,
            5,
        );
        assert_eq!(ranges, vec![TimeRange::new(t24(0.0), t24(4.0))]);
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn eviction_follows_the_playhead() {
        let compositor = single_clip_compositor(24.0);
        let range = TimeRange::new(t24(0.0), t24(24.0));
        let mut cache = FrameCache::new();

        fill(&mut cache, &compositor, t24(2.0), &range, CacheDirection::Forward, 3, 1);
        assert!(cache.get(&t24(1.0)).is_some());

        fill(&mut cache, &compositor, t24(10.0), &range, CacheDirection::Forward, 3, 1);
        assert!(cache.get(&t24(1.0)).is_none(), "old frames evicted");
        assert!(cache.get(&t24(10.0)).is_some());
    }
}
