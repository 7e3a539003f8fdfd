//! MotionRequest: a live instantiation of a MotionDescriptor in the pose graph.
//!
//! A request owns the pose nodes it created (one clip node per present clip
//! plus a per-motion blend mixer) until [`MotionRequest::reset`] releases them.
//! Requests compare equal by content hash only.

use std::fmt;
use std::rc::Rc;

use vizij_pose_graph_core::{BodyMask, Hash128, NodeId, PoseGraph};

use crate::blend::{clip_weights, BlendSample};
use crate::descriptor::MotionDescriptor;
use crate::event::EventWindow;
use crate::mask::MaskIdentity;

/// Zero-argument gating predicate supplied by gameplay code.
pub type Condition = Box<dyn Fn() -> bool>;

/// Source of the two-component blend parameter.
pub type BlendSampler = Box<dyn Fn() -> BlendSample>;

/// Pose nodes built for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoseHandle {
    /// Per-motion blend mixer: clips in slots `0..clips.len()`, rest pose in the last slot.
    pub mixer: NodeId,
    pub clips: Vec<NodeId>,
}

pub struct MotionRequest {
    hash: Hash128,
    condition: Option<Condition>,
    blend_sampler: Option<BlendSampler>,
    descriptor: Option<Rc<MotionDescriptor>>,
    pose: Option<PoseHandle>,
    mask: Option<Hash128>,
    pub(crate) port: Option<usize>,
    priority: i32,
    duration: f32,
    pub(crate) expiration: f32,
    looping: bool,
    pub(crate) events: Vec<EventWindow>,
}

impl MotionRequest {
    /// The "nothing playing" sentinel.
    pub fn empty() -> Self {
        Self {
            hash: Hash128::ZERO,
            condition: None,
            blend_sampler: None,
            descriptor: None,
            pose: None,
            mask: None,
            port: None,
            priority: 0,
            duration: 0.0,
            expiration: 0.0,
            looping: false,
            events: Vec::new(),
        }
    }

    /// Build pose nodes for `descriptor`. Returns `None` when the graph is not
    /// ready or the descriptor has no present clip; nothing is allocated then.
    pub fn create(
        graph: &mut dyn PoseGraph,
        descriptor: &Rc<MotionDescriptor>,
        condition: Option<Condition>,
        blend_sampler: Option<BlendSampler>,
        mask: Option<&BodyMask>,
    ) -> Option<Self> {
        if !graph.is_ready() {
            return None;
        }
        let clip_count = descriptor.present_clips().count();
        if clip_count == 0 {
            return None;
        }

        let mixer = graph.create_mixer_node(clip_count + 1);
        let mut clips = Vec::with_capacity(clip_count);
        for (slot, clip) in descriptor.present_clips().enumerate() {
            let node = graph.create_clip_node(clip);
            graph.connect(mixer, slot, node);
            clips.push(node);
        }
        let rest = graph.rest_pose();
        graph.connect(mixer, clip_count, rest);
        graph.set_input_weight(mixer, 0, 1.0);

        Some(Self {
            hash: descriptor.hash,
            condition,
            blend_sampler,
            descriptor: Some(Rc::clone(descriptor)),
            pose: Some(PoseHandle { mixer, clips }),
            mask: mask.map(|m| m.content_hash()),
            port: None,
            priority: descriptor.priority,
            duration: descriptor.max_clip_length(),
            expiration: 0.0,
            looping: false,
            events: descriptor
                .events
                .iter()
                .cloned()
                .map(EventWindow::new)
                .collect(),
        })
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Seconds a pending request may wait for its condition; <= 0 never expires.
    pub fn with_expiration(mut self, seconds: f32) -> Self {
        self.expiration = seconds;
        self
    }

    #[inline]
    pub fn hash(&self) -> Hash128 {
        self.hash
    }

    #[inline]
    pub fn descriptor(&self) -> Option<&Rc<MotionDescriptor>> {
        self.descriptor.as_ref()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_none()
    }

    #[inline]
    pub fn pose(&self) -> Option<&PoseHandle> {
        self.pose.as_ref()
    }

    #[inline]
    pub fn mask(&self) -> Option<Hash128> {
        self.mask
    }

    #[inline]
    pub fn port(&self) -> Option<usize> {
        self.port
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn expiration(&self) -> f32 {
        self.expiration
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    #[inline]
    pub fn has_blend_sampler(&self) -> bool {
        self.blend_sampler.is_some()
    }

    /// `None` when the request carries no condition.
    pub fn condition_holds(&self) -> Option<bool> {
        self.condition.as_ref().map(|c| c())
    }

    pub fn events(&self) -> &[EventWindow] {
        &self.events
    }

    /// Transition time for adopting this request.
    pub fn effective_transition(&self, default: f32) -> f32 {
        self.descriptor
            .as_ref()
            .map_or(default, |d| d.effective_transition(default))
    }

    /// True while the pose mixer exists in `graph`.
    pub fn is_valid(&self, graph: &dyn PoseGraph) -> bool {
        self.pose.as_ref().is_some_and(|p| graph.is_valid(p.mixer))
    }

    /// Playback time in seconds (0 for the empty sentinel).
    pub fn time(&self, graph: &dyn PoseGraph) -> f32 {
        self.pose.as_ref().map_or(0.0, |p| graph.time(p.mixer))
    }

    /// Rewind to time 0 and re-arm every event window.
    pub fn restart(&mut self, graph: &mut dyn PoseGraph) {
        if let Some(pose) = &self.pose {
            graph.set_time(pose.mixer, 0.0);
            for clip in &pose.clips {
                graph.set_time(*clip, 0.0);
            }
        }
        for ev in &mut self.events {
            ev.clear();
        }
    }

    /// Pull the blend sample and spread it across the clip slots of the pose mixer.
    pub fn apply_blend(&self, graph: &mut dyn PoseGraph) {
        let (Some(sampler), Some(pose)) = (&self.blend_sampler, &self.pose) else {
            return;
        };
        let sample = sampler();
        let weights = clip_weights(sample, graph.input_count(pose.mixer));
        for (slot, w) in weights.into_iter().enumerate() {
            graph.set_input_weight(pose.mixer, slot, w);
        }
    }

    /// Release every pose node this request created. Idempotent; the request
    /// keeps its hash and descriptor but is no longer connected or valid.
    pub fn reset(&mut self, graph: &mut dyn PoseGraph) {
        if let Some(pose) = self.pose.take() {
            for clip in pose.clips {
                graph.destroy(clip);
            }
            graph.destroy(pose.mixer);
        }
        self.port = None;
        for ev in &mut self.events {
            ev.clear();
        }
    }
}

impl Default for MotionRequest {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for MotionRequest {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for MotionRequest {}

impl fmt::Debug for MotionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionRequest")
            .field("hash", &self.hash)
            .field("name", &self.descriptor.as_ref().map(|d| d.name.as_str()))
            .field("pose", &self.pose)
            .field("mask", &self.mask)
            .field("port", &self.port)
            .field("priority", &self.priority)
            .field("duration", &self.duration)
            .field("expiration", &self.expiration)
            .field("looping", &self.looping)
            .field("condition", &self.condition.is_some())
            .field("blend_sampler", &self.blend_sampler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizij_pose_graph_core::{ClipRef, PoseGraphArena};

    fn graph() -> PoseGraphArena {
        let mut g = PoseGraphArena::new();
        let out = g.create_layer_mixer_node(0);
        g.set_output(out);
        g
    }

    fn blend3() -> Rc<MotionDescriptor> {
        Rc::new(MotionDescriptor::new(
            "locomotion",
            vec![
                Some(ClipRef::new("idle", 2.0)),
                None,
                Some(ClipRef::new("walk", 1.0)),
                Some(ClipRef::new("run", 0.8)),
            ],
            1,
        ))
    }

    #[test]
    fn create_builds_mixer_with_rest_slot() {
        let mut g = graph();
        let d = blend3();
        let req = MotionRequest::create(&mut g, &d, None, None, None).expect("request");
        let pose = req.pose().expect("pose").clone();
        assert_eq!(pose.clips.len(), 3);
        assert_eq!(g.input_count(pose.mixer), 4);
        assert_eq!(g.input(pose.mixer, 3), Some(g.rest_pose()));
        assert_eq!(g.input_weight(pose.mixer, 0), 1.0);
        assert_eq!(req.duration(), 2.0);
        assert_eq!(req.priority(), 1);
        assert_eq!(req.hash(), d.hash);
        assert!(!req.is_connected());
    }

    #[test]
    fn create_fails_without_clips_or_graph() {
        let mut g = graph();
        let none = Rc::new(MotionDescriptor::new("none", vec![None], 0));
        assert!(MotionRequest::create(&mut g, &none, None, None, None).is_none());

        let mut unready = PoseGraphArena::new();
        assert!(MotionRequest::create(&mut unready, &blend3(), None, None, None).is_none());
        assert_eq!(unready.live_node_count(), 1);
    }

    #[test]
    fn reset_releases_nodes_and_is_idempotent() {
        let mut g = graph();
        let before = g.live_node_count();
        let mut req = MotionRequest::create(&mut g, &blend3(), None, None, None).expect("request");
        assert_eq!(g.live_node_count(), before + 4);
        req.reset(&mut g);
        assert_eq!(g.live_node_count(), before);
        req.reset(&mut g);
        assert!(!req.is_valid(&g));
        assert!(g.is_valid(g.rest_pose()));
    }

    #[test]
    fn equality_is_by_hash() {
        let mut g = graph();
        let d = blend3();
        let a = MotionRequest::create(&mut g, &d, None, None, None).expect("a");
        let b = MotionRequest::create(&mut g, &Rc::new((*d).clone()), None, None, None)
            .expect("b")
            .looping(true);
        assert_eq!(a, b);
        assert_ne!(a, MotionRequest::empty());
    }

    #[test]
    fn blend_sampler_drives_clip_weights() {
        let mut g = graph();
        let req = MotionRequest::create(
            &mut g,
            &blend3(),
            None,
            Some(Box::new(|| BlendSample { x: 1.5, y: 0.0 })),
            None,
        )
        .expect("request");
        req.apply_blend(&mut g);
        let mixer = req.pose().expect("pose").mixer;
        assert_eq!(g.input_weight(mixer, 0), 0.0);
        assert!((g.input_weight(mixer, 1) - 0.5).abs() < 1e-5);
        assert!((g.input_weight(mixer, 2) - 0.5).abs() < 1e-5);
        assert_eq!(g.input_weight(mixer, 3), 0.0);
    }
}
