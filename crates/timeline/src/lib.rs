//! `spool-timeline` — Edit model and timeline compositor.
//!
//! The edit model is a read-only projection of a declarative edit list:
//! tracks of clips, transitions, and gaps over external media. The
//! [`Compositor`] resolves presentation times against that model into
//! composed [`Frame`]s, opening per-clip readers on demand and retiring
//! them when playback moves on.

pub mod compositor;
pub mod frame;
pub mod loader;
pub mod model;

pub use compositor::Compositor;
pub use frame::{Frame, FrameLayer};
pub use loader::load_edit_list;
pub use model::{
    Clip, Gap, LinearWarp, MediaRef, Timeline, Track, TrackItem, TrackKind, Transition,
    TransitionKind,
};
