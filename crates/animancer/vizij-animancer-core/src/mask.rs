//! Content identity of body masks.
//!
//! Two masks that affect the same regions through the same transforms hash
//! identically no matter which asset they came from, so they share one
//! masked layer.

use vizij_pose_graph_core::{BodyMask, BodyPart, Hash128, Hash128Builder};

pub trait MaskIdentity {
    fn content_hash(&self) -> Hash128;
}

impl MaskIdentity for BodyMask {
    fn content_hash(&self) -> Hash128 {
        let mut h = Hash128Builder::new();
        h.append_str(&self.name);
        for t in &self.transforms {
            h.append_str(&t.path);
            h.append_bool(t.active);
        }
        for part in BodyPart::ALL {
            h.append_bool(self.is_active(part));
        }
        h.finish()
    }
}
