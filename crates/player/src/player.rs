//! The timeline player: transport state, presentation clock, and the
//! controller worker that keeps the frame cache synchronized to playback.
//!
//! The player owns two clocks' worth of state. The caller-side
//! presentation clock advances `current_time` from wall time on every
//! [`tick`](TimelinePlayer::tick) and applies the loop policy. The
//! controller worker thread owns the [`FrameCache`] and loops with a
//! short cooperative sleep: it reads the shared transport fields under a
//! mutex, runs one cache pass without holding it, and publishes the frame
//! due at the playhead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use spool_common::{loop_time, Observable, PlaybackResult, RationalTime, TimeRange};
use spool_io::ReaderRegistry;
use spool_timeline::{load_edit_list, Compositor, Frame};

use crate::cache::{CacheDirection, FrameCache};

/// Transport state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Playback {
    #[default]
    Stop,
    Forward,
    Reverse,
}

/// What happens when the playhead leaves the in/out range.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loop {
    /// Wrap to the opposite end.
    #[default]
    Loop,
    /// Clamp to the nearer end and stop.
    Once,
    /// Reflect and reverse direction.
    PingPong,
}

/// Discrete transport jumps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeAction {
    Start,
    End,
    FramePrev,
    FramePrevX10,
    FramePrevX100,
    FrameNext,
    FrameNextX10,
    FrameNextX100,
}

/// Fields shared between the caller and the controller worker. Small;
/// held only long enough to copy in or out.
struct ThreadState {
    current_time: RationalTime,
    in_out_range: TimeRange,
    frame: Option<Frame>,
    cached_ranges: Vec<TimeRange>,
    clear_requests: bool,
    direction: CacheDirection,
    read_ahead: usize,
    read_behind: usize,
}

/// Wall-clock reference for the presentation clock, reset on every
/// play/seek/wrap.
struct Clock {
    start: Instant,
    playback_start_time: RationalTime,
}

/// Plays a timeline: see the module docs.
pub struct TimelinePlayer {
    compositor: Arc<Compositor>,
    playback: Observable<Playback>,
    loop_mode: Observable<Loop>,
    current_time: Observable<RationalTime>,
    in_out_range: Observable<TimeRange>,
    frame: Observable<Option<Frame>>,
    cached_frames: Observable<Vec<TimeRange>>,
    clock: Mutex<Clock>,
    state: Arc<Mutex<ThreadState>>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TimelinePlayer {
    /// Create a player over an existing compositor.
    pub fn new(compositor: Arc<Compositor>) -> Self {
        let timeline = Arc::clone(compositor.timeline());
        let full_range = timeline.global_range();
        let state = Arc::new(Mutex::new(ThreadState {
            current_time: timeline.global_start,
            in_out_range: full_range,
            frame: None,
            cached_ranges: Vec::new(),
            clear_requests: false,
            direction: CacheDirection::Forward,
            read_ahead: 100,
            read_behind: 10,
        }));
        let running = Arc::new(AtomicBool::new(true));
        let worker = {
            let compositor = Arc::clone(&compositor);
            let state = Arc::clone(&state);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("spool-player".into())
                .spawn(move || controller_loop(compositor, state, running))
                .expect("spawn player worker")
        };
        Self {
            playback: Observable::new(Playback::Stop),
            loop_mode: Observable::new(Loop::Loop),
            current_time: Observable::new(timeline.global_start),
            in_out_range: Observable::new(full_range),
            frame: Observable::new(None),
            cached_frames: Observable::new(Vec::new()),
            clock: Mutex::new(Clock {
                start: Instant::now(),
                playback_start_time: timeline.global_start,
            }),
            compositor,
            state,
            running,
            worker: Some(worker),
        }
    }

    /// Load an edit list and build the whole playback stack over it.
    pub fn from_file(
        path: &std::path::Path,
        registry: Arc<ReaderRegistry>,
    ) -> PlaybackResult<Self> {
        let timeline = Arc::new(load_edit_list(path)?);
        Ok(Self::new(Arc::new(Compositor::new(timeline, registry))))
    }

    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    // ── Value accessors ──────────────────────────────────────────

    pub fn playback(&self) -> Playback {
        self.playback.get()
    }

    pub fn loop_mode(&self) -> Loop {
        self.loop_mode.get()
    }

    pub fn current_time(&self) -> RationalTime {
        self.current_time.get()
    }

    pub fn in_out_range(&self) -> TimeRange {
        self.in_out_range.get()
    }

    pub fn frame(&self) -> Option<Frame> {
        self.frame.get()
    }

    pub fn cached_frames(&self) -> Vec<TimeRange> {
        self.cached_frames.get()
    }

    pub fn read_ahead(&self) -> usize {
        self.state.lock().read_ahead
    }

    pub fn read_behind(&self) -> usize {
        self.state.lock().read_behind
    }

    pub fn set_read_ahead(&self, value: usize) {
        self.state.lock().read_ahead = value;
    }

    pub fn set_read_behind(&self, value: usize) {
        self.state.lock().read_behind = value;
    }

    // ── Observables ──────────────────────────────────────────────

    pub fn observe_playback(&self) -> Observable<Playback> {
        self.playback.clone()
    }

    pub fn observe_loop(&self) -> Observable<Loop> {
        self.loop_mode.clone()
    }

    pub fn observe_current_time(&self) -> Observable<RationalTime> {
        self.current_time.clone()
    }

    pub fn observe_in_out_range(&self) -> Observable<TimeRange> {
        self.in_out_range.clone()
    }

    pub fn observe_frame(&self) -> Observable<Option<Frame>> {
        self.frame.clone()
    }

    pub fn observe_cached_frames(&self) -> Observable<Vec<TimeRange>> {
        self.cached_frames.clone()
    }

    // ── Transport ────────────────────────────────────────────────

    /// Change the transport state.
    ///
    /// Starting forward at the very end under `Once` rewinds first;
    /// under `PingPong` it starts reversing instead (both mirrored for
    /// reverse at the start).
    pub fn set_playback(&self, value: Playback) {
        let mut value = value;
        let range = self.in_out_range.get();
        let current = self.current_time.get();
        match self.loop_mode.get() {
            Loop::Once => match value {
                Playback::Forward if current == range.end_time_inclusive() => {
                    self.seek(range.start);
                }
                Playback::Reverse if current == range.start => {
                    self.seek(range.end_time_inclusive());
                }
                _ => {}
            },
            Loop::PingPong => match value {
                Playback::Forward if current == range.end_time_inclusive() => {
                    value = Playback::Reverse;
                }
                Playback::Reverse if current == range.start => {
                    value = Playback::Forward;
                }
                _ => {}
            },
            Loop::Loop => {}
        }
        if self.playback.set_if_changed(value) && value != Playback::Stop {
            debug!(?value, time = %self.current_time.get(), "playback started");
            self.reset_clock(self.current_time.get());
            self.set_direction(match value {
                Playback::Reverse => CacheDirection::Reverse,
                _ => CacheDirection::Forward,
            });
        }
    }

    pub fn set_loop(&self, value: Loop) {
        self.loop_mode.set_if_changed(value);
    }

    /// Move the playhead. The time is wrapped into the full timeline
    /// range; pending compositor requests are dropped but cached frames
    /// are kept.
    pub fn seek(&self, time: RationalTime) {
        let full_range = self.compositor.timeline().global_range();
        let time = loop_time(time, &full_range);
        if self.current_time.set_if_changed(time) {
            if self.playback.get() != Playback::Stop {
                self.reset_clock(time);
            }
            let mut state = self.state.lock();
            state.current_time = time;
            state.clear_requests = true;
        }
    }

    /// Stop and jump by a discrete amount.
    pub fn time_action(&self, action: TimeAction) {
        self.set_playback(Playback::Stop);
        let rate = self.compositor.timeline().duration.rate;
        let current = self.current_time.get();
        let range = self.in_out_range.get();
        let step = |frames: f64| current + RationalTime::new(frames, rate);
        match action {
            TimeAction::Start => self.seek(range.start),
            TimeAction::End => self.seek(range.end_time_inclusive()),
            TimeAction::FramePrev => self.seek(step(-1.0)),
            TimeAction::FramePrevX10 => self.seek(step(-10.0)),
            TimeAction::FramePrevX100 => self.seek(step(-100.0)),
            TimeAction::FrameNext => self.seek(step(1.0)),
            TimeAction::FrameNextX10 => self.seek(step(10.0)),
            TimeAction::FrameNextX100 => self.seek(step(100.0)),
        }
    }

    pub fn start(&self) {
        self.time_action(TimeAction::Start);
    }

    pub fn end(&self) {
        self.time_action(TimeAction::End);
    }

    pub fn frame_prev(&self) {
        self.time_action(TimeAction::FramePrev);
    }

    pub fn frame_next(&self) {
        self.time_action(TimeAction::FrameNext);
    }

    // ── In/out points ────────────────────────────────────────────

    pub fn set_in_out_range(&self, range: TimeRange) {
        if self.in_out_range.set_if_changed(range) {
            self.state.lock().in_out_range = range;
        }
    }

    /// In point at the playhead; the out point stays.
    pub fn set_in_point(&self) {
        let range = self.in_out_range.get();
        self.set_in_out_range(TimeRange::from_start_end_time(
            self.current_time.get(),
            range.end_time_exclusive(),
        ));
    }

    pub fn reset_in_point(&self) {
        let range = self.in_out_range.get();
        self.set_in_out_range(TimeRange::from_start_end_time(
            self.compositor.timeline().global_start,
            range.end_time_exclusive(),
        ));
    }

    /// Out point at the playhead: the frame before it is the last one
    /// played.
    pub fn set_out_point(&self) {
        let range = self.in_out_range.get();
        self.set_in_out_range(TimeRange::from_start_end_time(
            range.start,
            self.current_time.get(),
        ));
    }

    pub fn reset_out_point(&self) {
        let range = self.in_out_range.get();
        self.set_in_out_range(TimeRange::new(
            range.start,
            self.compositor.timeline().duration,
        ));
    }

    // ── Clock ────────────────────────────────────────────────────

    /// Advance the presentation clock and publish worker results.
    ///
    /// Call at least as often as the timeline's frame rate while playing.
    pub fn tick(&self) {
        let playback = self.playback.get();
        if playback != Playback::Stop {
            let rate = self.compositor.timeline().duration.rate;
            let (start, playback_start_time) = {
                let clock = self.clock.lock();
                (clock.start, clock.playback_start_time)
            };
            let sign = if playback == Playback::Forward { 1.0 } else { -1.0 };
            let elapsed = start.elapsed().as_secs_f64();
            let proposed = playback_start_time
                + RationalTime::new((elapsed * rate).floor() * sign, rate);
            let current = self.loop_playback(proposed);
            self.current_time.set_if_changed(current);
        }

        let current = self.current_time.get();
        let (frame, cached_ranges) = {
            let mut state = self.state.lock();
            state.current_time = current;
            (state.frame.clone(), state.cached_ranges.clone())
        };
        self.frame.set_if_changed(frame);
        self.cached_frames.set_if_changed(cached_ranges);
    }

    /// Apply the loop policy to a proposed time.
    fn loop_playback(&self, time: RationalTime) -> RationalTime {
        let range = self.in_out_range.get();
        match self.loop_mode.get() {
            Loop::Loop => {
                let wrapped = loop_time(time, &range);
                if wrapped != time {
                    self.reset_clock(wrapped);
                }
                wrapped
            }
            Loop::Once => {
                if time < range.start {
                    self.playback.set_if_changed(Playback::Stop);
                    range.start
                } else if time > range.end_time_inclusive() {
                    self.playback.set_if_changed(Playback::Stop);
                    range.end_time_inclusive()
                } else {
                    time
                }
            }
            Loop::PingPong => {
                let playback = self.playback.get();
                if time < range.start && playback == Playback::Reverse {
                    self.playback.set_if_changed(Playback::Forward);
                    self.set_direction(CacheDirection::Forward);
                    self.reset_clock(range.start);
                    range.start
                } else if time > range.end_time_inclusive() && playback == Playback::Forward {
                    self.playback.set_if_changed(Playback::Reverse);
                    self.set_direction(CacheDirection::Reverse);
                    self.reset_clock(range.end_time_inclusive());
                    range.end_time_inclusive()
                } else {
                    time
                }
            }
        }
    }

    fn reset_clock(&self, time: RationalTime) {
        let mut clock = self.clock.lock();
        clock.start = Instant::now();
        clock.playback_start_time = time;
    }

    fn set_direction(&self, direction: CacheDirection) {
        self.state.lock().direction = direction;
    }
}

impl Drop for TimelinePlayer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Controller worker: owns the frame cache, never the transport.
fn controller_loop(
    compositor: Arc<Compositor>,
    state: Arc<Mutex<ThreadState>>,
    running: Arc<AtomicBool>,
) {
    let mut cache = FrameCache::new();
    let rate = compositor.timeline().duration.rate;
    while running.load(Ordering::Acquire) {
        let (current_time, in_out_range, clear, direction, read_ahead, read_behind) = {
            let mut shared = state.lock();
            let clear = std::mem::take(&mut shared.clear_requests);
            (
                shared.current_time,
                shared.in_out_range,
                clear,
                shared.direction,
                shared.read_ahead,
                shared.read_behind,
            )
        };
        if clear {
            compositor.cancel_frames();
            cache.clear_pending();
        }
        let cached_ranges = cache.update(
            &compositor,
            current_time,
            &in_out_range,
            direction,
            read_ahead,
            read_behind,
            rate,
        );
        let frame = cache.get(&current_time).cloned();
        {
            let mut shared = state.lock();
            if let Some(frame) = frame {
                shared.frame = Some(frame);
            }
            shared.cached_ranges = cached_ranges;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

// ── Tests ────────────────────────────────────────────────────────────
