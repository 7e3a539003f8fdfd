//! MotionDescriptor: authored motion data and its content identity.

use serde::{Deserialize, Serialize};
use vizij_pose_graph_core::{ClipRef, Hash128, Hash128Builder};

use crate::event::EventSpec;

/// A named motion: clips to blend, transition and priority, timed events.
///
/// `hash` is derived from the identity fields but is NOT kept in sync
/// automatically; call [`MotionDescriptor::recompute_hash`] after editing
/// before comparing descriptors by hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionDescriptor {
    pub name: String,
    /// Ordered clip slots; `None` entries are skipped.
    #[serde(default)]
    pub clips: Vec<Option<ClipRef>>,
    /// Seconds; <= 0 means "use the machine default".
    #[serde(default, rename = "transitionDuration")]
    pub transition_duration: f32,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub events: Vec<EventSpec>,
    #[serde(skip)]
    pub hash: Hash128,
}

impl MotionDescriptor {
    /// Build a descriptor with its hash already computed.
    pub fn new(name: impl Into<String>, clips: Vec<Option<ClipRef>>, priority: i32) -> Self {
        let mut d = Self {
            name: name.into(),
            clips,
            transition_duration: 0.0,
            priority,
            events: Vec::new(),
            hash: Hash128::ZERO,
        };
        d.recompute_hash();
        d
    }

    pub fn with_transition(mut self, seconds: f32) -> Self {
        self.transition_duration = seconds;
        self
    }

    pub fn with_event(mut self, event: EventSpec) -> Self {
        self.events.push(event);
        self.recompute_hash();
        self
    }

    /// Content hash over name, present clip ids, priority and event kind/start/end.
    /// Transition duration and event flags do not participate.
    pub fn compute_hash(&self) -> Hash128 {
        let mut h = Hash128Builder::new();
        h.append_str(&self.name);
        for clip in self.clips.iter().flatten() {
            h.append_str(&clip.id);
        }
        h.append_i32(self.priority);
        for ev in &self.events {
            h.append_str(&ev.kind);
            h.append_f32(ev.start);
            h.append_f32(ev.end);
        }
        h.finish()
    }

    pub fn recompute_hash(&mut self) -> Hash128 {
        self.hash = self.compute_hash();
        self.hash
    }

    /// Present clips, in slot order.
    pub fn present_clips(&self) -> impl Iterator<Item = &ClipRef> {
        self.clips.iter().flatten()
    }

    /// Longest present clip in seconds.
    pub fn max_clip_length(&self) -> f32 {
        self.present_clips()
            .map(|c| c.length)
            .fold(0.0f32, f32::max)
    }

    /// The descriptor's own transition if positive, else `default`.
    #[inline]
    pub fn effective_transition(&self, default: f32) -> f32 {
        if self.transition_duration > 0.0 {
            self.transition_duration
        } else {
            default
        }
    }
}
