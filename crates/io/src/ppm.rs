//! Binary PPM (P6) files and zero-padded image sequences.
//!
//! A path like `shot.0012.ppm` names a sequence: the trailing digit run in
//! the stem is the frame counter. Probing counts consecutive frames on
//! disk starting at that number; reads substitute the requested frame.
//! A path without a digit run is a single one-frame image.
//!
//! Sequences carry no intrinsic rate, so the `SequenceIO/DefaultSpeed`
//! option decides the rate of the reported duration.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use spool_common::{
    Image, ImageInfo, Options, PixelType, PlaybackError, PlaybackResult, RationalTime,
};

use crate::plugin::{FrameWriter, MediaInfo, Plugin, WriteInfo};
use crate::reader::{Decode, ReaderHandle};

const FALLBACK_SPEED: f64 = 24.0;

/// Reader/writer plugin for `.ppm` files and sequences.
pub struct PpmPlugin;

impl Plugin for PpmPlugin {
    fn name(&self) -> &str {
        "ppm"
    }

    fn extensions(&self) -> &[&str] {
        &["ppm"]
    }

    fn open(&self, path: &Path, options: &Options) -> PlaybackResult<ReaderHandle> {
        let speed = options.default_speed().unwrap_or(FALLBACK_SPEED);
        let decoder = PpmDecoder::open(path, speed)?;
        Ok(ReaderHandle::new(
            path.to_path_buf(),
            Arc::new(decoder),
            options.thread_count().unwrap_or(1),
        ))
    }

    fn write_pixel_types(&self) -> &[PixelType] {
        &[PixelType::RgbU8]
    }

    fn write(&self, path: &Path, _info: &WriteInfo) -> PlaybackResult<Box<dyn FrameWriter>> {
        Ok(Box::new(PpmWriter {
            sequence: SequencePattern::parse(path),
            path: path.to_path_buf(),
        }))
    }
}

/// A sequence file-name pattern: everything before the trailing digit run
/// in the stem, the digit run's width and value, and everything after.
#[derive(Clone, Debug)]
struct SequencePattern {
    prefix: String,
    pad: usize,
    start: i64,
    suffix: String,
}

impl SequencePattern {
    /// Split `dir/shot.0012.ppm` into `("dir/shot.", 4, 12, ".ppm")`.
    fn parse(path: &Path) -> Option<Self> {
        let text = path.to_str()?;
        let dot = text.rfind('.')?;
        let (stem, suffix) = text.split_at(dot);
        let digits_start = stem
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        let digits = &stem[digits_start..];
        if digits.is_empty() {
            return None;
        }
        Some(Self {
            prefix: stem[..digits_start].to_string(),
            pad: digits.len(),
            start: digits.parse().ok()?,
            suffix: suffix.to_string(),
        })
    }

    fn frame_path(&self, index: i64) -> PathBuf {
        PathBuf::from(format!(
            "{}{:0pad$}{}",
            self.prefix,
            self.start + index,
            self.suffix,
            pad = self.pad
        ))
    }
}

/// Decoder over a PPM file or sequence. Stateless per frame, so several
/// reader workers can share it.
#[derive(Debug)]
pub struct PpmDecoder {
    info: MediaInfo,
    sequence: Option<SequencePattern>,
    path: PathBuf,
}

impl PpmDecoder {
    /// Probe the file (or count the sequence) and read the first header.
    pub fn open(path: &Path, speed: f64) -> PlaybackResult<Self> {
        let sequence = SequencePattern::parse(path);
        let frame_count = match &sequence {
            Some(pattern) => {
                let mut count: i64 = 0;
                while pattern.frame_path(count).is_file() {
                    count += 1;
                }
                count
            }
            None => i64::from(path.is_file()),
        };
        if frame_count == 0 {
            return Err(PlaybackError::FileOpenFailed {
                path: path.display().to_string(),
            });
        }
        let first = match &sequence {
            Some(pattern) => pattern.frame_path(0),
            None => path.to_path_buf(),
        };
        let (image_info, _) = read_ppm(&first)?;
        Ok(Self {
            info: MediaInfo {
                video: vec![image_info],
                video_duration: RationalTime::new(frame_count as f64, speed),
                audio: None,
            },
            sequence,
            path: path.to_path_buf(),
        })
    }
}

impl Decode for PpmDecoder {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn decode(&self, time: RationalTime) -> Result<Image, PlaybackError> {
        let frame_path = match &self.sequence {
            Some(pattern) => pattern.frame_path(time.value as i64),
            None => self.path.clone(),
        };
        let (info, data) = read_ppm(&frame_path).map_err(|error| match error {
            PlaybackError::Io(io) => PlaybackError::DecodeFailed {
                path: frame_path.display().to_string(),
                reason: io.to_string(),
            },
            other => other,
        })?;
        Image::from_data(info, data)
    }
}

/// Writer over a PPM file or sequence; the frame time picks the file.
struct PpmWriter {
    sequence: Option<SequencePattern>,
    path: PathBuf,
}

impl FrameWriter for PpmWriter {
    fn write_video(&mut self, time: RationalTime, image: &Image) -> PlaybackResult<()> {
        if image.info().pixel_type != PixelType::RgbU8 {
            return Err(PlaybackError::Internal(format!(
                "ppm: unsupported pixel type {:?}",
                image.info().pixel_type
            )));
        }
        let frame_path = match &self.sequence {
            Some(pattern) => pattern.frame_path(time.value as i64),
            None => self.path.clone(),
        };
        let mut file = fs::File::create(&frame_path)?;
        write!(
            file,
            "P6\n{} {}\n255\n",
            image.info().width,
            image.info().height
        )?;
        file.write_all(image.data())?;
        Ok(())
    }
}

/// Parse a binary P6 file into its description and pixel buffer.
fn read_ppm(path: &Path) -> PlaybackResult<(ImageInfo, Vec<u8>)> {
    let data = fs::read(path)?;
    let mut cursor = 0usize;

    let magic = next_token(&data, &mut cursor);
    if magic != Some(b"P6".as_slice()) {
        return Err(PlaybackError::DecodeFailed {
            path: path.display().to_string(),
            reason: "not a binary PPM (P6)".into(),
        });
    }
    let bad = |reason: &str| PlaybackError::DecodeFailed {
        path: path.display().to_string(),
        reason: reason.into(),
    };
    let width: u32 = parse_int(next_token(&data, &mut cursor)).ok_or_else(|| bad("bad width"))?;
    let height: u32 =
        parse_int(next_token(&data, &mut cursor)).ok_or_else(|| bad("bad height"))?;
    let max_value: u32 =
        parse_int(next_token(&data, &mut cursor)).ok_or_else(|| bad("bad max value"))?;
    if max_value != 255 {
        return Err(bad("only 8-bit PPM supported"));
    }
    // A single whitespace byte separates the header from the raster.
    cursor += 1;

    let info = ImageInfo::new(width, height, PixelType::RgbU8);
    let byte_count = info.byte_count();
    if data.len() < cursor + byte_count {
        return Err(bad("truncated raster"));
    }
    Ok((info, data[cursor..cursor + byte_count].to_vec()))
}

/// Advance past whitespace and `#` comments, returning the next token.
fn next_token<'a>(data: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    loop {
        while *cursor < data.len() && data[*cursor].is_ascii_whitespace() {
            *cursor += 1;
        }
        if *cursor < data.len() && data[*cursor] == b'#' {
            while *cursor < data.len() && data[*cursor] != b'\n' {
                *cursor += 1;
            }
            continue;
        }
        break;
    }
    let start = *cursor;
    while *cursor < data.len() && !data[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
    (*cursor > start).then(|| &data[start..*cursor])
}

fn parse_int(token: Option<&[u8]>) -> Option<u32> {
    std::str::from_utf8(token?).ok()?.parse().ok()
}

// ── Tests ────────────────────────────────────────────────────────────
