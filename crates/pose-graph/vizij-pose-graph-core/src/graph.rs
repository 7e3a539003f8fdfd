//! The PoseGraph trait: the node/port/weight surface consumed by the animancer layer.
//!
//! Handles are plain [`NodeId`]s. Parents own indexed input slots ("ports");
//! a child is referenced from a parent slot, never the other way round.
//! All operations are total: calls against destroyed or unknown nodes are
//! no-ops and queries return neutral values (0, `None`, `false`).

use crate::clip::ClipRef;
use crate::ids::NodeId;
use crate::mask::BodyMask;

/// What a node does when the graph is evaluated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Samples one clip.
    Clip,
    /// Weighted sum of its inputs.
    Mixer,
    /// Inputs override each other in slot order, scaled by weight; slots may carry a mask.
    LayerMixer,
    /// Neutral pose supplied by the graph itself.
    RestPose,
}

pub trait PoseGraph {
    /// True once the graph has a valid rest pose and output node.
    fn is_ready(&self) -> bool;

    fn create_clip_node(&mut self, clip: &ClipRef) -> NodeId;

    /// Blend mixer with `input_count` empty slots.
    fn create_mixer_node(&mut self, input_count: usize) -> NodeId;

    /// Override-style mixer with `input_count` empty slots.
    fn create_layer_mixer_node(&mut self, input_count: usize) -> NodeId;

    /// Shared neutral pose node.
    fn rest_pose(&self) -> NodeId;

    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Connect `child` into an existing slot of `parent`. Returns false when either
    /// node is invalid, the slot is out of range, or the slot is occupied.
    fn connect(&mut self, parent: NodeId, input: usize, child: NodeId) -> bool;

    /// Append a new slot holding `child` at `weight`; returns the slot index.
    fn add_input(&mut self, parent: NodeId, child: NodeId, weight: f32) -> Option<usize>;

    /// Empty a slot. The slot itself stays and can be reconnected.
    fn disconnect(&mut self, parent: NodeId, input: usize);

    /// Child connected at a slot, if any.
    fn input(&self, node: NodeId, index: usize) -> Option<NodeId>;

    fn input_count(&self, node: NodeId) -> usize;

    /// Weights are stored clamped to [0, 1].
    fn set_input_weight(&mut self, node: NodeId, index: usize, weight: f32);

    fn input_weight(&self, node: NodeId, index: usize) -> f32;

    /// Restrict a layer-mixer slot to the regions of `mask`.
    fn set_input_mask(&mut self, node: NodeId, index: usize, mask: &BodyMask);

    fn set_time(&mut self, node: NodeId, time: f32);

    fn time(&self, node: NodeId) -> f32;

    fn is_valid(&self, node: NodeId) -> bool;

    /// Mark a node as retired. A done node and its inputs stop advancing on `evaluate`.
    fn set_done(&mut self, node: NodeId, done: bool);

    fn is_done(&self, node: NodeId) -> bool;

    /// Release a node. Slots that referenced it are emptied.
    fn destroy(&mut self, node: NodeId);

    /// Designate the node whose subtree is evaluated.
    fn set_output(&mut self, node: NodeId);

    fn output(&self) -> Option<NodeId>;

    /// Advance the clock of everything reachable from the output by `dt` seconds.
    fn evaluate(&mut self, dt: f32);

    /// Root displacement accumulated by the most recent [`PoseGraph::evaluate`].
    fn root_motion_delta(&self) -> [f32; 3];
}
