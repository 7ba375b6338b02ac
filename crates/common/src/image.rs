//! Image buffers handed from readers to the renderer.
//!
//! Pixel data is immutable after decode and shared by `Arc`, so a frame in
//! the cache and a frame being rendered reference the same allocation.
//! Dropping the last reference frees the buffer.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, PlaybackResult};

/// Pixel storage format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    LumaU8,
    RgbU8,
    RgbaU8,
}

impl PixelType {
    pub fn channels(self) -> u32 {
        match self {
            Self::LumaU8 => 1,
            Self::RgbU8 => 3,
            Self::RgbaU8 => 4,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        // All supported types are 8 bits per channel.
        self.channels()
    }
}

/// Byte order of multi-byte channels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

/// Memory layout of an image buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLayout {
    /// Scanline alignment in bytes.
    pub alignment: u32,
    pub endian: Endian,
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self {
            alignment: 1,
            endian: Endian::native(),
        }
    }
}

/// Description of an image: dimensions, pixel type, layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    pub layout: ImageLayout,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            pixel_type,
            layout: ImageLayout::default(),
        }
    }

    /// Bytes per scanline, padded to the layout alignment.
    pub fn scanline_bytes(&self) -> usize {
        let unpadded = self.width as usize * self.pixel_type.bytes_per_pixel() as usize;
        let alignment = self.layout.alignment.max(1) as usize;
        unpadded.div_ceil(alignment) * alignment
    }

    /// Total byte size of a buffer with this description.
    pub fn byte_count(&self) -> usize {
        self.scanline_bytes() * self.height as usize
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {:?}", self.width, self.height, self.pixel_type)
    }
}

/// An immutable image. Cheap to clone; clones share the pixel buffer.
///
/// Equality is identity of the pixel allocation plus the description, so
/// comparing frames does not walk pixel data.
#[derive(Clone, Debug)]
pub struct Image {
    info: ImageInfo,
    data: Arc<[u8]>,
}

impl Image {
    /// A zero-filled image with the given description.
    pub fn new(info: ImageInfo) -> Self {
        Self {
            data: vec![0u8; info.byte_count()].into(),
            info,
        }
    }

    /// Wrap decoded pixel data. The buffer length must match the
    /// description exactly.
    pub fn from_data(info: ImageInfo, data: Vec<u8>) -> PlaybackResult<Self> {
        if data.len() != info.byte_count() {
            return Err(PlaybackError::Internal(format!(
                "image buffer size mismatch: expected {} bytes, got {}",
                info.byte_count(),
                data.len()
            )));
        }
        Ok(Self {
            info,
            data: data.into(),
        })
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info && Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Image {}
