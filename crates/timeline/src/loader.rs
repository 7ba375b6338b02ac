//! Edit-list loading: a JSON document describing the timeline tree.
//!
//! Times in the document are frame counts at the document's `rate`.
//! Relative media references resolve against the directory of the
//! edit-list file. Transition kinds other than `"Dissolve"` degrade to
//! `None` rather than failing the load; structural violations are fatal.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use spool_common::{PlaybackError, PlaybackResult, RationalTime, TimeRange};

use crate::model::{
    Clip, Gap, LinearWarp, MediaRef, Timeline, Track, TrackItem, TrackKind, Transition,
    TransitionKind,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditListDoc {
    rate: f64,
    #[serde(default)]
    global_start: f64,
    tracks: Vec<TrackDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackDoc {
    kind: TrackKindDoc,
    #[serde(default)]
    items: Vec<ItemDoc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
enum TrackKindDoc {
    Video,
    Audio,
}

#[derive(Deserialize)]
struct RangeDoc {
    start: f64,
    duration: f64,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ItemDoc {
    #[serde(rename_all = "camelCase")]
    Clip {
        #[serde(default)]
        name: String,
        source_range: RangeDoc,
        media: MediaDoc,
        #[serde(default)]
        time_warps: Vec<WarpDoc>,
    },
    #[serde(rename_all = "camelCase")]
    Transition {
        #[serde(default)]
        kind: String,
        in_offset: f64,
        out_offset: f64,
    },
    Gap {
        duration: f64,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum MediaDoc {
    File {
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    Sequence {
        base_url: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
        #[serde(default)]
        zero_pad: usize,
        #[serde(default)]
        start_frame: i64,
        #[serde(default = "default_frame_step")]
        frame_step: i64,
    },
    Generator {
        url: String,
    },
}

fn default_frame_step() -> i64 {
    1
}

#[derive(Deserialize)]
struct WarpDoc {
    scalar: f64,
}

/// Load and validate an edit list from a file.
pub fn load_edit_list(path: &Path) -> PlaybackResult<Timeline> {
    let json = fs::read_to_string(path).map_err(|_| PlaybackError::FileOpenFailed {
        path: path.display().to_string(),
    })?;
    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    let timeline = from_json_str(&json, directory)?;
    info!(
        path = %path.display(),
        tracks = timeline.tracks.len(),
        duration = %timeline.duration,
        "edit list loaded"
    );
    Ok(timeline)
}

/// Parse an edit-list document, resolving relative media references
/// against `directory`.
pub fn from_json_str(json: &str, directory: &Path) -> PlaybackResult<Timeline> {
    let doc: EditListDoc =
        serde_json::from_str(json).map_err(|error| PlaybackError::InvalidEditList {
            reason: error.to_string(),
        })?;
    if doc.rate <= 0.0 {
        return Err(PlaybackError::InvalidEditList {
            reason: format!("invalid rate: {}", doc.rate),
        });
    }
    let rate = doc.rate;
    let frames = |value: f64| RationalTime::new(value, rate);

    let mut tracks = Vec::with_capacity(doc.tracks.len());
    for track_doc in doc.tracks {
        let mut items = Vec::with_capacity(track_doc.items.len());
        for item in track_doc.items {
            items.push(match item {
                ItemDoc::Clip {
                    name,
                    source_range,
                    media,
                    time_warps,
                } => {
                    let mut media = build_media(media);
                    media.resolve_relative_to(directory);
                    TrackItem::Clip(Clip {
                        name,
                        source_range: build_range(&source_range, rate)?,
                        media,
                        time_warps: time_warps
                            .into_iter()
                            .map(|warp| LinearWarp { scalar: warp.scalar })
                            .collect(),
                    })
                }
                ItemDoc::Transition {
                    kind,
                    in_offset,
                    out_offset,
                } => TrackItem::Transition(Transition {
                    kind: build_transition_kind(&kind),
                    in_offset: frames(in_offset),
                    out_offset: frames(out_offset),
                }),
                ItemDoc::Gap { duration } => {
                    if duration < 0.0 {
                        return Err(PlaybackError::InvalidEditList {
                            reason: format!("negative gap duration: {duration}"),
                        });
                    }
                    TrackItem::Gap(Gap {
                        duration: frames(duration),
                    })
                }
            });
        }
        tracks.push(Track {
            kind: match track_doc.kind {
                TrackKindDoc::Video => TrackKind::Video,
                TrackKindDoc::Audio => TrackKind::Audio,
            },
            items,
        });
    }

    let duration = tracks
        .iter()
        .map(|track| track.duration().rescaled_to(rate))
        .max()
        .unwrap_or_else(|| frames(0.0));

    let timeline = Timeline {
        global_start: frames(doc.global_start),
        duration,
        tracks,
    };
    timeline
        .validate()
        .map_err(|reason| PlaybackError::InvalidEditList { reason })?;
    Ok(timeline)
}

fn build_range(range: &RangeDoc, rate: f64) -> PlaybackResult<TimeRange> {
    if range.duration < 0.0 {
        return Err(PlaybackError::InvalidEditList {
            reason: format!("negative duration: {}", range.duration),
        });
    }
    Ok(TimeRange::new(
        RationalTime::new(range.start, rate),
        RationalTime::new(range.duration, rate),
    ))
}

fn build_media(media: MediaDoc) -> MediaRef {
    match media {
        MediaDoc::File { url } => MediaRef::SingleFile { url },
        MediaDoc::Sequence {
            base_url,
            prefix,
            suffix,
            zero_pad,
            start_frame,
            frame_step,
        } => MediaRef::ImageSequence {
            base_url,
            prefix,
            suffix,
            zero_pad,
            start_frame,
            frame_step,
        },
        MediaDoc::Generator { url } => MediaRef::Generator { url },
    }
}

fn build_transition_kind(kind: &str) -> TransitionKind {
    match kind {
        "Dissolve" => TransitionKind::Dissolve,
        other => {
            if !other.is_empty() {
                debug!(kind = other, "unrecognised transition kind, using None");
            }
            TransitionKind::None
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
