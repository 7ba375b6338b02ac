//! The reader plugin seam.
//!
//! The engine core never decodes pixels itself; it asks a registered
//! [`Plugin`] to open a path. Plugins are matched in registration order by
//! [`Plugin::sniff`], which defaults to a case-insensitive extension check.

use std::path::Path;

use spool_common::{Image, ImageInfo, Options, PixelType, PlaybackError, PlaybackResult, RationalTime};

use crate::reader::ReaderHandle;

/// Audio stream description. Carried through from probing; the core never
/// composes audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioInfo {
    pub channels: u32,
    pub sample_rate: u32,
}

/// What a reader learned from the media header.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    /// Video stream descriptions; empty when the media has no video.
    pub video: Vec<ImageInfo>,
    /// Length of the video stream. The rate is the media's native rate and
    /// defines the frame grid read times are floored onto.
    pub video_duration: RationalTime,
    pub audio: Option<AudioInfo>,
}

/// Description handed to [`Plugin::write`] when creating media.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteInfo {
    pub video: Vec<ImageInfo>,
    pub video_duration: RationalTime,
}

/// Sink for frames produced by the writer side of a plugin.
pub trait FrameWriter: Send {
    fn write_video(&mut self, time: RationalTime, image: &Image) -> PlaybackResult<()>;
}

/// A media format handler.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// File extensions (lower case, no dot) this plugin handles.
    fn extensions(&self) -> &[&str];

    /// Whether this plugin can open `path`. The default matches on
    /// extension; plugins for non-file schemes override this.
    fn sniff(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions().iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Open a reader for `path`. Unknown option keys must be ignored, not
    /// rejected.
    fn open(&self, path: &Path, options: &Options) -> PlaybackResult<ReaderHandle>;

    /// Pixel types the writer side accepts. Empty when the plugin is
    /// read-only.
    fn write_pixel_types(&self) -> &[PixelType] {
        &[]
    }

    /// Open a writer for `path`.
    fn write(&self, path: &Path, _info: &WriteInfo) -> PlaybackResult<Box<dyn FrameWriter>> {
        Err(PlaybackError::Internal(format!(
            "{}: writing not supported: {}",
            self.name(),
            path.display()
        )))
    }
}
