//! One-shot promise/future pairs.
//!
//! A [`Promise`] is fulfilled at most once with a value or an error; every
//! clone of the matching [`FutureValue`] observes the same outcome, which
//! is what makes request deduplication work — concurrent requesters for
//! the same frame time share one future. Dropping an unfulfilled promise
//! resolves the future to [`PlaybackError::Cancelled`]; consumers cannot
//! tell "cancelled" apart from "producer went away".

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{PlaybackError, PlaybackResult};

enum State<T> {
    Pending,
    Ready(T),
    Failed(PlaybackError),
    Cancelled,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    cond: Condvar,
}

impl<T> Shared<T> {
    fn complete(&self, new: State<T>) {
        let mut state = self.state.lock();
        if matches!(*state, State::Pending) {
            *state = new;
            self.cond.notify_all();
        }
    }
}

/// The producing half of a one-shot future.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

/// The consuming half of a one-shot future. Cheap to clone; all clones
/// resolve to the same outcome.
pub struct FutureValue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for FutureValue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Create an unfulfilled promise/future pair.
pub fn pending<T>() -> (Promise<T>, FutureValue<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending),
        cond: Condvar::new(),
    });
    (
        Promise {
            shared: Arc::clone(&shared),
        },
        FutureValue { shared },
    )
}

impl<T> Promise<T> {
    /// Fulfil with a value.
    pub fn set(self, value: T) {
        self.shared.complete(State::Ready(value));
    }

    /// Fulfil with an error.
    pub fn fail(self, error: PlaybackError) {
        self.shared.complete(State::Failed(error));
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.shared.complete(State::Cancelled);
    }
}

impl<T: Clone> FutureValue<T> {
    /// Non-blocking poll. `None` while the producer is still working.
    pub fn ready(&self) -> Option<PlaybackResult<T>> {
        match &*self.shared.state.lock() {
            State::Pending => None,
            State::Ready(value) => Some(Ok(value.clone())),
            State::Failed(error) => Some(Err(error.clone())),
            State::Cancelled => Some(Err(PlaybackError::Cancelled)),
        }
    }

    /// Block until the outcome is known.
    pub fn wait(&self) -> PlaybackResult<T> {
        let mut state = self.shared.state.lock();
        while matches!(*state, State::Pending) {
            self.shared.cond.wait(&mut state);
        }
        match &*state {
            State::Pending => unreachable!(),
            State::Ready(value) => Ok(value.clone()),
            State::Failed(error) => Err(error.clone()),
            State::Cancelled => Err(PlaybackError::Cancelled),
        }
    }

    /// Block up to `timeout`. `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<PlaybackResult<T>> {
        let mut state = self.shared.state.lock();
        if matches!(*state, State::Pending)
            && self.shared.cond.wait_for(&mut state, timeout).timed_out()
            && matches!(*state, State::Pending)
        {
            return None;
        }
        match &*state {
            State::Pending => None,
            State::Ready(value) => Some(Ok(value.clone())),
            State::Failed(error) => Some(Err(error.clone())),
            State::Cancelled => Some(Err(PlaybackError::Cancelled)),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Pending)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn set_resolves_all_clones() {
        let (promise, future) = pending::<u32>();
        let other = future.clone();
        assert!(future.is_pending());

        promise.set(9);
        assert_eq!(future.ready().unwrap().unwrap(), 9);
        assert_eq!(other.wait().unwrap(), 9);
    }

    #[test]
    fn fail_resolves_with_error() {
        let (promise, future) = pending::<u32>();
        promise.fail(PlaybackError::Internal("boom".into()));
        let err = future.ready().unwrap().unwrap_err();
        assert!(matches!(err, PlaybackError::Internal(_)));
    }

    #[test]
    fn dropped_promise_cancels() {
        let (promise, future) = pending::<u32>();
        drop(promise);
        let err = future.wait().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn wait_blocks_until_set() {
        let (promise, future) = pending::<u32>();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.set(3);
        });
        assert_eq!(future.wait().unwrap(), 3);
        handle.join().unwrap();
    }

    #[test]
    fn wait_timeout_expires_while_pending() {
        let (_promise, future) = pending::<u32>();
        assert!(future.wait_timeout(Duration::from_millis(5)).is_none());
        assert!(future.is_pending());
    }
}
