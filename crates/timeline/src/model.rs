//! Edit model: the immutable tree of tracks, clips, transitions, and time
//! warps the compositor walks.
//!
//! Track children are stored in temporal order and looked up by index;
//! neighbor queries are positional, so the model carries no parent
//! back-pointers. Transitions occupy no time of their own — they describe
//! an overlap between the two clips around them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use spool_common::{RationalTime, TimeRange};

/// What a track holds. Audio tracks are parsed but never composed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// How two adjacent clips blend across a transition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    #[default]
    None,
    Dissolve,
}

/// A linear remapping of playback time to source time within a clip:
/// `t' = clip_start + scalar * (t - clip_start)`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearWarp {
    pub scalar: f64,
}

/// Where a clip's frames come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MediaRef {
    /// A single media file.
    SingleFile { url: String },
    /// A numbered image sequence, materialised as
    /// `base_url · prefix · zero_pad(frame) · suffix`.
    ImageSequence {
        base_url: String,
        prefix: String,
        suffix: String,
        zero_pad: usize,
        start_frame: i64,
        frame_step: i64,
    },
    /// A synthetic source.
    Generator { url: String },
}

impl MediaRef {
    /// The path handed to the reader registry. For sequences this is the
    /// first frame's path; the reader infers the rest from the numbering.
    pub fn path(&self) -> PathBuf {
        match self {
            Self::SingleFile { url } | Self::Generator { url } => PathBuf::from(url),
            Self::ImageSequence {
                base_url,
                prefix,
                suffix,
                zero_pad,
                start_frame,
                ..
            } => PathBuf::from(format!(
                "{base_url}{prefix}{start_frame:0width$}{suffix}",
                width = zero_pad
            )),
        }
    }

    /// Resolve a relative file reference against the edit-list directory.
    /// Generators and absolute paths are untouched.
    pub fn resolve_relative_to(&mut self, directory: &Path) {
        let resolve = |url: &mut String| {
            if !Path::new(url.as_str()).is_absolute() {
                *url = directory.join(url.as_str()).display().to_string();
            }
        };
        match self {
            Self::SingleFile { url } => resolve(url),
            Self::ImageSequence { base_url, .. } => resolve(base_url),
            Self::Generator { .. } => {}
        }
    }
}

/// A bounded window over one media source, placed on a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    /// Which part of the source this clip plays.
    pub source_range: TimeRange,
    pub media: MediaRef,
    /// Applied in order, composed left to right.
    pub time_warps: Vec<LinearWarp>,
}

/// A blended overlap between the two clips adjacent to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub kind: TransitionKind,
    /// How far the overlap reaches back into the outgoing clip.
    pub in_offset: RationalTime,
    /// How far it reaches into the incoming clip.
    pub out_offset: RationalTime,
}

/// Empty track time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub duration: RationalTime,
}

/// One child of a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TrackItem {
    Clip(Clip),
    Transition(Transition),
    Gap(Gap),
}

impl TrackItem {
    /// Extent of this item in its parent track. Transitions overlap their
    /// neighbors and take no time of their own.
    pub fn duration(&self) -> RationalTime {
        match self {
            Self::Clip(clip) => clip.source_range.duration,
            Self::Gap(gap) => gap.duration,
            Self::Transition(_) => RationalTime::new(0.0, 1.0),
        }
    }

    pub fn as_clip(&self) -> Option<&Clip> {
        match self {
            Self::Clip(clip) => Some(clip),
            _ => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            Self::Transition(transition) => Some(transition),
            _ => None,
        }
    }
}

/// An ordered run of items. Declaration order of tracks defines layer
/// stacking, bottom first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub kind: TrackKind,
    pub items: Vec<TrackItem>,
}

impl Track {
    /// The range the item at `index` occupies in track time.
    pub fn trimmed_range_in_parent(&self, index: usize) -> TimeRange {
        let duration = self.items[index].duration();
        let mut start = RationalTime::new(0.0, duration.rate.max(1.0));
        for item in &self.items[..index] {
            start = start + item.duration();
        }
        TimeRange::new(start, duration)
    }

    /// Index of the clip containing `time`, if any.
    pub fn clip_at(&self, time: RationalTime) -> Option<usize> {
        self.items.iter().enumerate().find_map(|(index, item)| {
            (item.as_clip().is_some() && self.trimmed_range_in_parent(index).contains(time))
                .then_some(index)
        })
    }

    /// Total extent of the track, at the rate of its first timed item.
    pub fn duration(&self) -> RationalTime {
        let mut total: Option<RationalTime> = None;
        for item in &self.items {
            let duration = item.duration();
            if duration.value <= 0.0 {
                continue;
            }
            total = Some(match total {
                Some(sum) => sum + duration,
                None => duration,
            });
        }
        total.unwrap_or(RationalTime::new(0.0, 1.0))
    }
}

/// The whole edit: shared-immutable once constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub global_start: RationalTime,
    pub duration: RationalTime,
    pub tracks: Vec<Track>,
}

impl Timeline {
    /// The presentation range in global time.
    pub fn global_range(&self) -> TimeRange {
        TimeRange::new(self.global_start, self.duration)
    }

    /// Video tracks in stacking order.
    pub fn video_tracks(&self) -> impl Iterator<Item = (usize, &Track)> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.kind == TrackKind::Video)
    }

    /// Check the structural invariants the compositor relies on.
    pub fn validate(&self) -> Result<(), String> {
        for (track_index, track) in self.tracks.iter().enumerate() {
            for (index, item) in track.items.iter().enumerate() {
                match item {
                    TrackItem::Clip(clip) => {
                        if clip.source_range.duration.value <= 0.0 {
                            return Err(format!(
                                "track {track_index}: clip '{}' has empty source range",
                                clip.name
                            ));
                        }
                    }
                    TrackItem::Transition(_) => {
                        let left_is_clip = index > 0
                            && track.items[index - 1].as_clip().is_some();
                        let right_is_clip = track
                            .items
                            .get(index + 1)
                            .and_then(TrackItem::as_clip)
                            .is_some();
                        if !left_is_clip || !right_is_clip {
                            return Err(format!(
                                "track {track_index}: transition at {index} is not between two clips"
                            ));
                        }
                    }
                    TrackItem::Gap(_) => {}
                }
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
