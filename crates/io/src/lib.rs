//! `spool-io` — Frame I/O for the Spool engine.
//!
//! Media access goes through a plugin registry: a [`Plugin`] knows how to
//! recognise a path and open it as a [`ReaderHandle`], an asynchronous
//! per-media frame producer with cancellable in-flight requests. Two
//! plugins ship built in: binary PPM files/sequences and a `gen://`
//! synthetic frame generator used for generator media references and in
//! tests.

pub mod generator;
pub mod plugin;
pub mod ppm;
pub mod reader;
pub mod registry;

pub use generator::GeneratorPlugin;
pub use plugin::{AudioInfo, FrameWriter, MediaInfo, Plugin, WriteInfo};
pub use ppm::PpmPlugin;
pub use reader::{Decode, ReaderHandle, VideoFrame};
pub use registry::ReaderRegistry;
