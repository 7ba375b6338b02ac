//! `spool-player` — Playback control over a timeline compositor.
//!
//! The [`TimelinePlayer`] drives a monotone presentation clock from wall
//! time, applies loop semantics, and keeps a bounded read-ahead/
//! read-behind cache of composed frames synchronized to the playback
//! direction. All of its state is observable.

pub mod cache;
pub mod player;

pub use cache::{CacheDirection, FrameCache};
pub use player::{Loop, Playback, TimeAction, TimelinePlayer};
