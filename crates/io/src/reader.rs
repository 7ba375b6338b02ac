//! Asynchronous per-media frame producer.
//!
//! A [`ReaderHandle`] owns a small pool of decode worker threads fed by a
//! channel. Frame requests are deduplicated by time: while a request for
//! time `t` is outstanding, further requests for `t` share the same
//! future. Cancellation marks outstanding requests so workers skip them;
//! a frame whose decode already started is still delivered.
//!
//! Lifecycle: `Running` until [`ReaderHandle::stop`], then `Stopping`
//! while queued work drains, then `Stopped` once every worker has exited.
//! The compositor polls [`ReaderHandle::has_stopped`] before dropping a
//! drained reader.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use spool_common::{
    pending, FutureValue, Image, Promise, PlaybackError, RationalTime,
};

use crate::plugin::MediaInfo;

/// A decoded frame together with the time it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoFrame {
    pub time: RationalTime,
    pub image: Image,
}

/// Decoder provided by a plugin. Implementations must be safe to call from
/// several worker threads at once; frame-per-file formats are naturally
/// stateless here.
pub trait Decode: Send + Sync {
    /// Header information, probed before the handle is constructed.
    fn info(&self) -> &MediaInfo;

    /// Produce the frame at `time`. `time` is already on the media's
    /// native frame grid.
    fn decode(&self, time: RationalTime) -> Result<Image, PlaybackError>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ReaderState {
    Running,
    Stopping,
    Stopped,
}

struct InFlight {
    id: u64,
    future: FutureValue<VideoFrame>,
    cancelled: Arc<AtomicBool>,
}

struct ReaderShared {
    path: PathBuf,
    info: MediaInfo,
    decoder: Arc<dyn Decode>,
    in_flight: Mutex<BTreeMap<RationalTime, InFlight>>,
    next_id: AtomicUsize,
    state: Mutex<ReaderState>,
    live_workers: AtomicUsize,
}

impl ReaderShared {
    /// Remove the in-flight entry for `time` if it still belongs to the
    /// request identified by `id`. A newer request for the same time after
    /// `cancel_all` must not be clobbered.
    fn remove_in_flight(&self, time: RationalTime, id: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&time).is_some_and(|entry| entry.id == id) {
            in_flight.remove(&time);
        }
    }
}

struct DecodeRequest {
    time: RationalTime,
    id: u64,
    promise: Promise<VideoFrame>,
    cancelled: Arc<AtomicBool>,
}

/// Handle to an open media reader. See the module docs for the contract.
pub struct ReaderHandle {
    shared: Arc<ReaderShared>,
    sender: Mutex<Option<Sender<DecodeRequest>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ReaderHandle {
    /// Spawn `thread_count` decode workers over `decoder`.
    pub fn new(
        path: PathBuf,
        decoder: Arc<dyn Decode>,
        thread_count: u32,
    ) -> Self {
        let thread_count = thread_count.max(1) as usize;
        let shared = Arc::new(ReaderShared {
            info: decoder.info().clone(),
            path,
            decoder,
            in_flight: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(0),
            state: Mutex::new(ReaderState::Running),
            live_workers: AtomicUsize::new(thread_count),
        });
        let (sender, receiver) = channel::unbounded::<DecodeRequest>();
        let mut workers = Vec::with_capacity(thread_count);
        for _ in 0..thread_count {
            let shared = Arc::clone(&shared);
            let receiver: Receiver<DecodeRequest> = receiver.clone();
            workers.push(thread::spawn(move || worker_loop(shared, receiver)));
        }
        Self {
            shared,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Header information. Available in every state.
    pub fn info(&self) -> &MediaInfo {
        &self.shared.info
    }

    /// Request the frame at `time`.
    ///
    /// At most one decode is outstanding per distinct time; duplicate
    /// requests share the first request's future. Requests after
    /// [`stop`](Self::stop) resolve to `Cancelled`; times outside the
    /// video duration resolve to `OutOfRange`.
    pub fn read_video(&self, time: RationalTime) -> FutureValue<VideoFrame> {
        if *self.shared.state.lock() != ReaderState::Running {
            let (promise, future) = pending();
            drop(promise);
            return future;
        }
        let duration = self.shared.info.video_duration;
        if time < RationalTime::new(0.0, duration.rate) || time >= duration {
            let (promise, future) = pending();
            promise.fail(PlaybackError::OutOfRange(time));
            return future;
        }

        let mut in_flight = self.shared.in_flight.lock();
        if let Some(entry) = in_flight.get(&time) {
            return entry.future.clone();
        }
        let (promise, future) = pending();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) as u64;
        let cancelled = Arc::new(AtomicBool::new(false));
        in_flight.insert(
            time,
            InFlight {
                id,
                future: future.clone(),
                cancelled: Arc::clone(&cancelled),
            },
        );
        drop(in_flight);

        let request = DecodeRequest {
            time,
            id,
            promise,
            cancelled,
        };
        if let Some(sender) = self.sender.lock().as_ref() {
            // A failed send drops the promise, resolving the future to
            // Cancelled.
            let _ = sender.send(request);
        }
        future
    }

    /// Mark every outstanding request as cancelled. Decodes already under
    /// way still deliver; queued ones are skipped. New requests start
    /// fresh.
    pub fn cancel_all(&self) {
        let mut in_flight = self.shared.in_flight.lock();
        for entry in in_flight.values() {
            entry.cancelled.store(true, Ordering::Relaxed);
        }
        in_flight.clear();
    }

    /// Stop accepting requests and let queued work drain. Non-blocking;
    /// poll [`has_stopped`](Self::has_stopped) for quiescence.
    pub fn stop(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state == ReaderState::Running {
                *state = ReaderState::Stopping;
            }
        }
        // Disconnect the channel so workers exit once the queue is empty.
        self.sender.lock().take();
    }

    /// Whether every worker has exited after [`stop`](Self::stop).
    pub fn has_stopped(&self) -> bool {
        *self.shared.state.lock() == ReaderState::Stopped
    }

    /// Whether any request has not yet been delivered or cancelled.
    pub fn has_pending(&self) -> bool {
        !self.shared.in_flight.lock().is_empty()
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop();
        for worker in self.workers.lock().drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for ReaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderHandle")
            .field("path", &self.shared.path)
            .field("state", &*self.shared.state.lock())
            .field("in_flight", &self.shared.in_flight.lock().len())
            .finish()
    }
}

fn worker_loop(shared: Arc<ReaderShared>, receiver: Receiver<DecodeRequest>) {
    while let Ok(request) = receiver.recv() {
        if request.cancelled.load(Ordering::Relaxed) {
            // Dropping the promise resolves the future to Cancelled.
            shared.remove_in_flight(request.time, request.id);
            continue;
        }
        match shared.decoder.decode(request.time) {
            Ok(image) => request.promise.set(VideoFrame {
                time: request.time,
                image,
            }),
            Err(error) => {
                debug!(path = %shared.path.display(), time = %request.time, %error, "decode failed");
                request.promise.fail(error);
            }
        }
        shared.remove_in_flight(request.time, request.id);
    }
    if shared.live_workers.fetch_sub(1, Ordering::AcqRel) == 1 {
        *shared.state.lock() = ReaderState::Stopped;
    }
}

// ── Tests ────────────────────────────────────────────────────────────
