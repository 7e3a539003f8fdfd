use serde::Deserialize;
use vizij_pose_graph_core::{BodyMask, BodyPart, ClipRef, MaskTransform};

use crate::descriptor::MotionDescriptor;
use crate::error::LoadError;
use crate::event::EventSpec;

/// Public API: parse StoredMotion-style JSON (see fixtures/motions/*.json)
/// into a [`MotionDescriptor`] with its hash refreshed.
///
/// Notes:
/// - Clip slots may be `null`; they are kept as absent slots and skipped by playback.
/// - Clip lengths and transition durations are in seconds.
/// - Event windows default to normalized time; `"normalized": false` switches to seconds.
pub fn parse_stored_motion_json(s: &str) -> Result<MotionDescriptor, LoadError> {
    let sm: StoredMotion = serde_json::from_str(s)?;

    let clips = sm
        .clips
        .into_iter()
        .map(|slot| {
            slot.map(|c| {
                ClipRef::new(c.id, c.length).with_root_velocity(c.root_velocity.unwrap_or_default())
            })
        })
        .collect();

    let events = sm
        .events
        .into_iter()
        .map(|e| EventSpec {
            kind: e.kind,
            start: e.start,
            end: e.end,
            normalized: e.normalized.unwrap_or(true),
            one_time: e.one_time,
            one_frame: e.one_frame,
        })
        .collect();

    let mut descriptor = MotionDescriptor {
        name: sm.name,
        clips,
        transition_duration: sm.transition_duration.unwrap_or(0.0),
        priority: sm.priority,
        events,
        hash: Default::default(),
    };
    validate_motion(&descriptor)?;
    descriptor.recompute_hash();
    Ok(descriptor)
}

/// Parse a body mask asset. `activeParts` lists the enabled regions; when it
/// is omitted every region is active.
pub fn parse_stored_mask_json(s: &str) -> Result<BodyMask, LoadError> {
    let sm: StoredMask = serde_json::from_str(s)?;
    if sm.name.is_empty() {
        return Err(invalid("mask name is empty".to_string()));
    }
    if sm.transforms.iter().any(|t| t.path.is_empty()) {
        return Err(invalid(format!("mask '{}' has an empty transform path", sm.name)));
    }
    let mut mask = match sm.active_parts {
        Some(parts) => parts
            .into_iter()
            .fold(BodyMask::empty(sm.name), |m, p| m.with_part(p, true)),
        None => BodyMask::full(sm.name),
    };
    mask.transforms = sm.transforms;
    Ok(mask)
}

fn validate_motion(d: &MotionDescriptor) -> Result<(), LoadError> {
    if d.name.is_empty() {
        return Err(invalid("motion name is empty".to_string()));
    }
    for clip in d.present_clips() {
        if !(clip.length.is_finite() && clip.length >= 0.0) {
            return Err(invalid(format!("clip '{}' has invalid length {}", clip.id, clip.length)));
        }
    }
    if !d.transition_duration.is_finite() {
        return Err(invalid(format!("motion '{}' has a non-finite transition", d.name)));
    }
    for ev in &d.events {
        if !(ev.start <= ev.end) {
            return Err(invalid(format!(
                "event '{}' window [{}, {}) is inverted",
                ev.kind, ev.start, ev.end
            )));
        }
        if ev.normalized && (ev.start < 0.0 || ev.end > 1.0) {
            return Err(invalid(format!(
                "event '{}' normalized window [{}, {}) leaves [0, 1]",
                ev.kind, ev.start, ev.end
            )));
        }
    }
    Ok(())
}

fn invalid(reason: String) -> LoadError {
    LoadError::Invalid { reason }
}

#[derive(Deserialize)]
struct StoredMotion {
    name: String,
    #[serde(default)]
    clips: Vec<Option<StoredClip>>,
    #[serde(default, rename = "transitionDuration")]
    transition_duration: Option<f32>,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    events: Vec<StoredEvent>,
}

#[derive(Deserialize)]
struct StoredClip {
    id: String,
    length: f32,
    #[serde(default, rename = "rootVelocity")]
    root_velocity: Option<[f32; 3]>,
}

#[derive(Deserialize)]
struct StoredMask {
    name: String,
    #[serde(default)]
    transforms: Vec<MaskTransform>,
    #[serde(default, rename = "activeParts")]
    active_parts: Option<Vec<BodyPart>>,
}

#[derive(Deserialize)]
struct StoredEvent {
    #[serde(rename = "type")]
    kind: String,
    start: f32,
    end: f32,
    #[serde(default)]
    normalized: Option<bool>,
    #[serde(default, rename = "oneTime")]
    one_time: bool,
    #[serde(default, rename = "oneFrame")]
    one_frame: bool,
}
