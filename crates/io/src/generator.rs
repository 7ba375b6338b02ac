//! Synthetic frame source.
//!
//! `gen://` paths produce frames without touching disk. They back
//! generator media references in edit lists and keep tests independent of
//! image files. The URL carries the parameters:
//!
//! ```text
//! gen://solid?size=16x16&frames=24&color=808080
//! ```
//!
//! Unknown query parameters are ignored. The frame rate comes from the
//! `SequenceIO/DefaultSpeed` option, like any other rateless source.

use std::path::Path;
use std::sync::Arc;

use spool_common::{
    Image, ImageInfo, Options, PixelType, PlaybackError, PlaybackResult, RationalTime,
};

use crate::plugin::{MediaInfo, Plugin};
use crate::reader::{Decode, ReaderHandle};

const SCHEME: &str = "gen://";
const FALLBACK_SPEED: f64 = 24.0;

/// Plugin producing synthetic solid-color frames.
pub struct GeneratorPlugin;

impl Plugin for GeneratorPlugin {
    fn name(&self) -> &str {
        "generator"
    }

    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn sniff(&self, path: &Path) -> bool {
        path.to_str().is_some_and(|text| text.starts_with(SCHEME))
    }

    fn open(&self, path: &Path, options: &Options) -> PlaybackResult<ReaderHandle> {
        let url = path.to_str().ok_or_else(|| PlaybackError::FileOpenFailed {
            path: path.display().to_string(),
        })?;
        let speed = options.default_speed().unwrap_or(FALLBACK_SPEED);
        let decoder = GeneratorDecoder::parse(url, speed)?;
        Ok(ReaderHandle::new(
            path.to_path_buf(),
            Arc::new(decoder),
            options.thread_count().unwrap_or(1),
        ))
    }
}

/// Decoder for one `gen://` URL.
pub struct GeneratorDecoder {
    info: MediaInfo,
    color: [u8; 3],
}

impl GeneratorDecoder {
    pub fn parse(url: &str, speed: f64) -> PlaybackResult<Self> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| PlaybackError::FileOpenFailed { path: url.into() })?;
        let query = rest.split_once('?').map(|(_, q)| q).unwrap_or("");

        let mut width = 16u32;
        let mut height = 16u32;
        let mut frames = 24u32;
        let mut color = [0x80u8; 3];
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "size" => {
                    if let Some((w, h)) = value.split_once('x') {
                        width = w.parse().map_err(|_| bad_url(url))?;
                        height = h.parse().map_err(|_| bad_url(url))?;
                    }
                }
                "frames" => frames = value.parse().map_err(|_| bad_url(url))?,
                "color" => {
                    let rgb = u32::from_str_radix(value, 16).map_err(|_| bad_url(url))?;
                    color = [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8];
                }
                _ => {}
            }
        }
        if width == 0 || height == 0 || frames == 0 {
            return Err(bad_url(url));
        }
        Ok(Self {
            info: MediaInfo {
                video: vec![ImageInfo::new(width, height, PixelType::RgbU8)],
                video_duration: RationalTime::new(f64::from(frames), speed),
                audio: None,
            },
            color,
        })
    }
}

fn bad_url(url: &str) -> PlaybackError {
    PlaybackError::FileOpenFailed { path: url.into() }
}

impl Decode for GeneratorDecoder {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn decode(&self, _time: RationalTime) -> Result<Image, PlaybackError> {
        let info = self.info.video[0];
        let mut data = Vec::with_capacity(info.byte_count());
        for _ in 0..(info.width * info.height) {
            data.extend_from_slice(&self.color);
        }
        Image::from_data(info, data)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sniff_matches_scheme_only() {
        let plugin = GeneratorPlugin;
        assert!(plugin.sniff(&PathBuf::from("gen://solid")));
        assert!(!plugin.sniff(&PathBuf::from("solid.ppm")));
    }

    #[test]
    fn parse_defaults() {
        let decoder = GeneratorDecoder::parse("gen://solid", 24.0).unwrap();
        assert_eq!(decoder.info().video[0].width, 16);
        assert_eq!(
            decoder.info().video_duration,
            RationalTime::new(24.0, 24.0)
        );
    }

    #[test]
    fn parse_query_parameters() {
        let decoder =
            GeneratorDecoder::parse("gen://solid?size=4x2&frames=10&color=ff0080", 30.0).unwrap();
        assert_eq!(decoder.info().video[0].width, 4);
        assert_eq!(decoder.info().video[0].height, 2);
        assert_eq!(
            decoder.info().video_duration,
            RationalTime::new(10.0, 30.0)
        );
        let image = decoder.decode(RationalTime::new(0.0, 30.0)).unwrap();
        assert_eq!(&image.data()[..3], &[0xff, 0x00, 0x80]);
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        assert!(GeneratorDecoder::parse("gen://solid?weird=1", 24.0).is_ok());
    }

    #[test]
    fn invalid_parameters_fail() {
        assert!(GeneratorDecoder::parse("gen://solid?frames=zero", 24.0).is_err());
        assert!(GeneratorDecoder::parse("gen://solid?frames=0", 24.0).is_err());
    }

    #[test]
    fn open_through_plugin() {
        let mut options = Options::new();
        options.set_default_speed(24.0);
        let handle = GeneratorPlugin
            .open(&PathBuf::from("gen://solid?frames=8"), &options)
            .unwrap();
        let frame = handle.read_video(RationalTime::new(2.0, 24.0)).wait().unwrap();
        assert_eq!(frame.image.info().width, 16);
    }
}
