//! Clip references as consumed by clip-sampling nodes.

use serde::{Deserialize, Serialize};

/// Reference to an authored clip.
///
/// `id` is the stable identity used for content hashing. `length` is the clip
/// duration in seconds. `root_velocity` is the clip's average root displacement
/// per second (x, y, z) and drives root-motion accumulation in the arena.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipRef {
    pub id: String,
    pub length: f32,
    #[serde(default, rename = "rootVelocity")]
    pub root_velocity: [f32; 3],
}

impl ClipRef {
    pub fn new(id: impl Into<String>, length: f32) -> Self {
        Self {
            id: id.into(),
            length,
            root_velocity: [0.0; 3],
        }
    }

    pub fn with_root_velocity(mut self, v: [f32; 3]) -> Self {
        self.root_velocity = v;
        self
    }
}
