//! Composed frames: the hand-off from the compositor to the renderer.

use spool_common::{Image, RationalTime};

use crate::model::TransitionKind;

/// One clip's contribution to a frame. During a transition the layer also
/// carries the other clip's image and the blend position.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameLayer {
    pub image: Image,
    pub image_b: Option<Image>,
    pub transition: TransitionKind,
    /// Blend position in `[0, 1]`; meaningful when `transition` is not
    /// `None`.
    pub transition_value: f32,
}

impl FrameLayer {
    pub fn new(image: Image) -> Self {
        Self {
            image,
            image_b: None,
            transition: TransitionKind::None,
            transition_value: 0.0,
        }
    }
}

/// The composed result at one presentation time: an ordered stack of
/// layers, bottom first. A frame may legitimately have zero layers when
/// every contributing reader failed; its time is always the requested
/// time.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub time: RationalTime,
    pub layers: Vec<FrameLayer>,
}

impl Frame {
    pub fn new(time: RationalTime) -> Self {
        Self {
            time,
            layers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_common::{ImageInfo, PixelType};

    #[test]
    fn frame_equality_is_structural() {
        let image = Image::new(ImageInfo::new(2, 2, PixelType::RgbU8));
        let time = RationalTime::new(3.0, 24.0);

        let mut a = Frame::new(time);
        a.layers.push(FrameLayer::new(image.clone()));
        let mut b = Frame::new(time);
        b.layers.push(FrameLayer::new(image.clone()));
        assert_eq!(a, b);

        // A different allocation with identical pixels is a different frame.
        let other = Image::new(ImageInfo::new(2, 2, PixelType::RgbU8));
        let mut c = Frame::new(time);
        c.layers.push(FrameLayer::new(other));
        assert_ne!(a, c);
    }

    #[test]
    fn empty_frames_compare_by_time() {
        assert_eq!(
            Frame::new(RationalTime::new(1.0, 24.0)),
            Frame::new(RationalTime::new(1.0, 24.0))
        );
        assert_ne!(
            Frame::new(RationalTime::new(1.0, 24.0)),
            Frame::new(RationalTime::new(2.0, 24.0))
        );
    }
}
