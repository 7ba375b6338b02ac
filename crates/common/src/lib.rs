//! `spool-common` — Shared types for the Spool timeline playback engine.
//!
//! This crate is the foundation that all other engine crates depend on.
//! It defines the core abstractions:
//!
//! - **Time**: `RationalTime`, `TimeRange`, loop/wrap arithmetic, range coalescing
//! - **Image**: `PixelType`, `ImageInfo`, `Image` (shared immutable pixel buffers)
//! - **Options**: enumerated I/O configuration forwarded to reader plugins
//! - **Observable**: mutable cells with equality-suppressed change notification
//! - **Future**: one-shot promise/future pairs with cancellation-on-drop
//! - **Errors**: `PlaybackError` (thiserror-based)

pub mod error;
pub mod future;
pub mod image;
pub mod observable;
pub mod options;
pub mod time;

// Re-export commonly used items at crate root
pub use error::{PlaybackError, PlaybackResult};
pub use future::{pending, FutureValue, Promise};
pub use image::{Endian, Image, ImageInfo, ImageLayout, PixelType};
pub use observable::{Observable, Subscription};
pub use options::{OptionValue, Options};
pub use time::{enumerate_frames, loop_time, to_ranges, RationalTime, TimeRange};
