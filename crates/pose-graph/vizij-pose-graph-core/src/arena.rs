//! PoseGraphArena: in-memory PoseGraph backed by a dense node arena.
//!
//! Tracks connectivity, slot weights/masks, node clocks and root motion. It never
//! samples pose data; clips contribute their authored `root_velocity` only.

use hashbrown::HashSet;
use tracing::trace;

use crate::clip::ClipRef;
use crate::graph::{NodeKind, PoseGraph};
use crate::ids::{NodeId, NodeIdAllocator};
use crate::mask::{BodyMask, BodyPart};

/// Guards root-motion recursion against malformed (cyclic) wiring.
const MAX_DEPTH: usize = 64;

#[derive(Clone, Debug, Default)]
struct Slot {
    child: Option<NodeId>,
    weight: f32,
    mask: Option<BodyMask>,
}

#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    time: f32,
    done: bool,
    clip: Option<ClipRef>,
    inputs: Vec<Slot>,
}

impl Node {
    fn new(kind: NodeKind, input_count: usize) -> Self {
        Self {
            kind,
            time: 0.0,
            done: false,
            clip: None,
            inputs: vec![Slot::default(); input_count],
        }
    }
}

#[derive(Debug)]
pub struct PoseGraphArena {
    ids: NodeIdAllocator,
    nodes: Vec<Option<Node>>,
    rest: NodeId,
    output: Option<NodeId>,
    root_delta: [f32; 3],
}

impl Default for PoseGraphArena {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseGraphArena {
    /// Create an arena holding only the rest pose. Hosts call
    /// [`PoseGraph::set_output`] before the graph reports ready.
    pub fn new() -> Self {
        let mut arena = Self {
            ids: NodeIdAllocator::new(),
            nodes: Vec::new(),
            rest: NodeId(0),
            output: None,
            root_delta: [0.0; 3],
        };
        arena.rest = arena.insert(Node::new(NodeKind::RestPose, 0));
        arena
    }

    /// Number of live (not destroyed) nodes, rest pose included.
    pub fn live_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Clip referenced by a clip node.
    pub fn clip(&self, node: NodeId) -> Option<&ClipRef> {
        self.node(node).and_then(|n| n.clip.as_ref())
    }

    /// Mask applied at a slot.
    pub fn input_mask(&self, node: NodeId, index: usize) -> Option<&BodyMask> {
        self.node(node)
            .and_then(|n| n.inputs.get(index))
            .and_then(|s| s.mask.as_ref())
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = self.ids.alloc();
        debug_assert_eq!(id.index(), self.nodes.len());
        self.nodes.push(Some(node));
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(|n| n.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(|n| n.as_mut())
    }

    fn slot_mut(&mut self, id: NodeId, index: usize) -> Option<&mut Slot> {
        self.node_mut(id).and_then(|n| n.inputs.get_mut(index))
    }

    fn sample_root(&self, id: NodeId, dt: f32, depth: usize) -> [f32; 3] {
        let Some(node) = self.node(id) else {
            return [0.0; 3];
        };
        if depth > MAX_DEPTH {
            return [0.0; 3];
        }
        match node.kind {
            NodeKind::RestPose => [0.0; 3],
            NodeKind::Clip => {
                let v = node.clip.as_ref().map_or([0.0; 3], |c| c.root_velocity);
                [v[0] * dt, v[1] * dt, v[2] * dt]
            }
            NodeKind::Mixer => {
                let mut acc = [0.0f32; 3];
                for slot in &node.inputs {
                    let Some(child) = slot.child else { continue };
                    if slot.weight <= 0.0 {
                        continue;
                    }
                    let c = self.sample_root(child, dt, depth + 1);
                    acc[0] += c[0] * slot.weight;
                    acc[1] += c[1] * slot.weight;
                    acc[2] += c[2] * slot.weight;
                }
                acc
            }
            NodeKind::LayerMixer => {
                let mut acc = [0.0f32; 3];
                for slot in &node.inputs {
                    let Some(child) = slot.child else { continue };
                    if slot.weight <= 0.0 {
                        continue;
                    }
                    if let Some(mask) = &slot.mask {
                        if !mask.is_active(BodyPart::Root) {
                            continue;
                        }
                    }
                    let c = self.sample_root(child, dt, depth + 1);
                    let w = slot.weight;
                    acc[0] += (c[0] - acc[0]) * w;
                    acc[1] += (c[1] - acc[1]) * w;
                    acc[2] += (c[2] - acc[2]) * w;
                }
                acc
            }
        }
    }
}

impl PoseGraph for PoseGraphArena {
    fn is_ready(&self) -> bool {
        self.is_valid(self.rest) && self.output.is_some_and(|o| self.is_valid(o))
    }

    fn create_clip_node(&mut self, clip: &ClipRef) -> NodeId {
        let mut node = Node::new(NodeKind::Clip, 0);
        node.clip = Some(clip.clone());
        self.insert(node)
    }

    fn create_mixer_node(&mut self, input_count: usize) -> NodeId {
        self.insert(Node::new(NodeKind::Mixer, input_count))
    }

    fn create_layer_mixer_node(&mut self, input_count: usize) -> NodeId {
        self.insert(Node::new(NodeKind::LayerMixer, input_count))
    }

    fn rest_pose(&self) -> NodeId {
        self.rest
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.node(node).map(|n| n.kind)
    }

    fn connect(&mut self, parent: NodeId, input: usize, child: NodeId) -> bool {
        if parent == child || !self.is_valid(child) {
            return false;
        }
        match self.slot_mut(parent, input) {
            Some(slot) if slot.child.is_none() => {
                slot.child = Some(child);
                true
            }
            _ => false,
        }
    }

    fn add_input(&mut self, parent: NodeId, child: NodeId, weight: f32) -> Option<usize> {
        if parent == child || !self.is_valid(child) {
            return None;
        }
        let node = self.node_mut(parent)?;
        node.inputs.push(Slot {
            child: Some(child),
            weight: weight.clamp(0.0, 1.0),
            mask: None,
        });
        Some(node.inputs.len() - 1)
    }

    fn disconnect(&mut self, parent: NodeId, input: usize) {
        if let Some(slot) = self.slot_mut(parent, input) {
            slot.child = None;
            slot.weight = 0.0;
            slot.mask = None;
        }
    }

    fn input(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.node(node)
            .and_then(|n| n.inputs.get(index))
            .and_then(|s| s.child)
    }

    fn input_count(&self, node: NodeId) -> usize {
        self.node(node).map_or(0, |n| n.inputs.len())
    }

    fn set_input_weight(&mut self, node: NodeId, index: usize, weight: f32) {
        if let Some(slot) = self.slot_mut(node, index) {
            slot.weight = weight.clamp(0.0, 1.0);
        }
    }

    fn input_weight(&self, node: NodeId, index: usize) -> f32 {
        self.node(node)
            .and_then(|n| n.inputs.get(index))
            .map_or(0.0, |s| s.weight)
    }

    fn set_input_mask(&mut self, node: NodeId, index: usize, mask: &BodyMask) {
        if let Some(slot) = self.slot_mut(node, index) {
            slot.mask = Some(mask.clone());
        }
    }

    fn set_time(&mut self, node: NodeId, time: f32) {
        if let Some(n) = self.node_mut(node) {
            n.time = time;
        }
    }

    fn time(&self, node: NodeId) -> f32 {
        self.node(node).map_or(0.0, |n| n.time)
    }

    fn is_valid(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn set_done(&mut self, node: NodeId, done: bool) {
        if let Some(n) = self.node_mut(node) {
            n.done = done;
        }
    }

    fn is_done(&self, node: NodeId) -> bool {
        self.node(node).is_some_and(|n| n.done)
    }

    fn destroy(&mut self, node: NodeId) {
        if node == self.rest {
            return;
        }
        let Some(entry) = self.nodes.get_mut(node.index()) else {
            return;
        };
        if entry.take().is_none() {
            return;
        }
        trace!(node = node.0, "pose node destroyed");
        for slot in self
            .nodes
            .iter_mut()
            .flatten()
            .flat_map(|n| n.inputs.iter_mut())
        {
            if slot.child == Some(node) {
                slot.child = None;
                slot.weight = 0.0;
            }
        }
        if self.output == Some(node) {
            self.output = None;
        }
    }

    fn set_output(&mut self, node: NodeId) {
        if self.is_valid(node) {
            self.output = Some(node);
        }
    }

    fn output(&self) -> Option<NodeId> {
        self.output
    }

    fn evaluate(&mut self, dt: f32) {
        self.root_delta = [0.0; 3];
        let Some(out) = self.output.filter(|o| self.is_valid(*o)) else {
            return;
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![out];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) || self.is_done(id) {
                continue;
            }
            if let Some(node) = self.node_mut(id) {
                node.time += dt;
                stack.extend(node.inputs.iter().filter_map(|s| s.child));
            }
        }

        self.root_delta = self.sample_root(out, dt, 0);
    }

    fn root_motion_delta(&self) -> [f32; 3] {
        self.root_delta
    }
}
