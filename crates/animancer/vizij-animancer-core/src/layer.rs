//! PlaybackLayer: one layer mixer with a current/last pair, two request queues
//! and the transition state machine that cross-fades between them.
//!
//! Per tick the owner calls [`PlaybackLayer::update`] (queues, blend sampling,
//! events) and then [`PlaybackLayer::evaluate`] (weight integration, reclaim)
//! after the pose graph clock has advanced.
//!
//! Port order matters: the layer mixer lets a higher slot override lower ones
//! by its weight. A request landing on a lower slot than the one it replaces
//! is cut in at full weight while the outgoing slot fades on top of it.

use std::mem;
use std::rc::Rc;

use tracing::{debug, trace, warn};
use vizij_pose_graph_core::{BodyMask, Hash128, NodeId, PoseGraph};

use crate::config::Config;
use crate::descriptor::MotionDescriptor;
use crate::error::{PlayError, RejectReason};
use crate::event::FiredEvent;
use crate::mask::MaskIdentity;
use crate::request::MotionRequest;

/// Extension point invoked when an incoming request and the current one both
/// have gating conditions that hold. It observes only; the play decision is
/// made by priority and hash regardless.
pub trait ConflictHook {
    fn on_conditions_agree(&self, _current: &MotionRequest, _incoming: &MotionRequest) {}
}

/// Default hook.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl ConflictHook for NoopHook {}

pub struct PlaybackLayer {
    mixer: Option<NodeId>,
    /// Parent composition node and the slot this layer occupies on it.
    parent: Option<(NodeId, usize)>,
    mask: Option<Hash128>,
    current: MotionRequest,
    last: MotionRequest,
    in_transition: bool,
    transition_speed: f32,
    loop_queue: Vec<MotionRequest>,
    pending_queue: Vec<MotionRequest>,
    default_transition: f32,
    max_ports: usize,
    hook: Rc<dyn ConflictHook>,
}

impl PlaybackLayer {
    /// Create the layer mixer and wire it into the first free slot of `parent`
    /// (appending one if none is free) at full weight, restricted to `mask`
    /// when given. `None` if the graph is not ready.
    pub fn new(
        graph: &mut dyn PoseGraph,
        parent: NodeId,
        mask: Option<&BodyMask>,
        cfg: &Config,
    ) -> Option<Self> {
        if !graph.is_ready() || !graph.is_valid(parent) {
            return None;
        }
        let mixer = graph.create_layer_mixer_node(0);
        let free = (0..graph.input_count(parent)).find(|i| graph.input(parent, *i).is_none());
        let port = match free {
            Some(port) if graph.connect(parent, port, mixer) => {
                graph.set_input_weight(parent, port, 1.0);
                Some(port)
            }
            _ => graph.add_input(parent, mixer, 1.0),
        };
        let Some(port) = port else {
            graph.destroy(mixer);
            return None;
        };
        if let Some(mask) = mask {
            graph.set_input_mask(parent, port, mask);
        }
        let mask = mask.map(|m| m.content_hash());
        debug!(mixer = mixer.0, port, masked = mask.is_some(), "playback layer created");
        Some(Self {
            mixer: Some(mixer),
            parent: Some((parent, port)),
            mask,
            current: MotionRequest::empty(),
            last: MotionRequest::empty(),
            in_transition: false,
            transition_speed: 0.0,
            loop_queue: Vec::new(),
            pending_queue: Vec::new(),
            default_transition: cfg.default_transition,
            max_ports: cfg.max_layer_ports.max(1),
            hook: Rc::new(NoopHook),
        })
    }

    pub fn with_hook(mut self, hook: Rc<dyn ConflictHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn set_hook(&mut self, hook: Rc<dyn ConflictHook>) {
        self.hook = hook;
    }

    /// Mixer exists and is still wired into its parent slot.
    pub fn is_ready(&self, graph: &dyn PoseGraph) -> bool {
        match (self.mixer, self.parent) {
            (Some(mixer), Some((parent, port))) => {
                graph.is_ready() && graph.is_valid(mixer) && graph.input(parent, port) == Some(mixer)
            }
            _ => false,
        }
    }

    #[inline]
    pub fn mixer(&self) -> Option<NodeId> {
        self.mixer
    }

    #[inline]
    pub fn parent_port(&self) -> Option<usize> {
        self.parent.map(|(_, port)| port)
    }

    #[inline]
    pub fn mask(&self) -> Option<Hash128> {
        self.mask
    }

    #[inline]
    pub fn current(&self) -> &MotionRequest {
        &self.current
    }

    #[inline]
    pub fn last(&self) -> &MotionRequest {
        &self.last
    }

    #[inline]
    pub fn in_transition(&self) -> bool {
        self.in_transition
    }

    #[inline]
    pub fn transition_speed(&self) -> f32 {
        self.transition_speed
    }

    #[inline]
    pub fn current_hash(&self) -> Hash128 {
        self.current.hash()
    }

    pub fn is_playing(&self, descriptor: &MotionDescriptor) -> bool {
        !self.current.is_empty() && self.current.hash() == descriptor.hash
    }

    pub fn pending_len(&self) -> usize {
        self.pending_queue.len()
    }

    pub fn loop_len(&self) -> usize {
        self.loop_queue.len()
    }

    /// Weight of the current request's slot; 0 when unconnected.
    pub fn current_weight(&self, graph: &dyn PoseGraph) -> f32 {
        self.port_weight(graph, self.current.port())
    }

    pub fn last_weight(&self, graph: &dyn PoseGraph) -> f32 {
        self.port_weight(graph, self.last.port())
    }

    fn port_weight(&self, graph: &dyn PoseGraph, port: Option<usize>) -> f32 {
        match (self.mixer, port) {
            (Some(mixer), Some(port)) => graph.input_weight(mixer, port),
            _ => 0.0,
        }
    }

    /// Current is empty, looping, or within its transition window of the end,
    /// and no cross-fade is running.
    pub fn current_can_transition(&self, graph: &dyn PoseGraph) -> bool {
        if self.in_transition {
            return false;
        }
        if self.current.is_empty() || self.current.is_looping() {
            return true;
        }
        let eff = self.current.effective_transition(self.default_transition);
        self.current.time(graph) >= self.current.duration() - eff
    }

    pub fn current_finished(&self, graph: &dyn PoseGraph) -> bool {
        if self.current.is_empty() {
            return true;
        }
        !self.current.is_looping() && self.current.time(graph) >= self.current.duration()
    }

    /// Resolve `request` against the current state and adopt it on success.
    /// The layer takes ownership either way; a rejected request's pose nodes
    /// are released before returning.
    pub fn try_play(
        &mut self,
        graph: &mut dyn PoseGraph,
        mut request: MotionRequest,
        bypass_transition: bool,
    ) -> Result<(), PlayError> {
        if let Err(err) = self.check(graph, &request, bypass_transition) {
            if err.is_policy() {
                trace!(motion = %request.hash(), error = %err, "play rejected");
            } else {
                warn!(motion = %request.hash(), error = %err, "play failed");
            }
            request.reset(graph);
            return Err(err);
        }
        self.adopt(graph, request)
    }

    fn check(
        &self,
        graph: &dyn PoseGraph,
        request: &MotionRequest,
        bypass_transition: bool,
    ) -> Result<(), PlayError> {
        if !self.is_ready(graph) {
            return Err(PlayError::InvalidState {
                reason: "layer is not ready",
            });
        }
        if request.is_empty() || !request.is_valid(graph) {
            return Err(PlayError::InvalidState {
                reason: "request has no pose nodes",
            });
        }

        match request.condition_holds() {
            Some(false) => return Err(PlayError::rejected(RejectReason::ConditionFalse)),
            Some(true) if self.current.condition_holds() == Some(true) => {
                self.hook.on_conditions_agree(&self.current, request);
            }
            _ => {}
        }

        if !self.current.is_empty() {
            let eff = request.effective_transition(self.default_transition);
            let near_end = !self.current.is_looping()
                && self.current.time(graph) >= self.current.duration() - eff;
            let outranked = if self.current.priority() > request.priority() {
                !near_end
            } else if self.current.priority() == request.priority() {
                !(self.current.is_looping() || near_end)
            } else {
                false
            };
            if outranked {
                return Err(PlayError::rejected(RejectReason::Outranked));
            }
            if self.current.hash() == request.hash() {
                return Err(PlayError::rejected(RejectReason::SameMotion));
            }
        }

        if self.in_transition && !bypass_transition {
            return Err(PlayError::rejected(RejectReason::InTransition));
        }
        Ok(())
    }

    fn adopt(
        &mut self,
        graph: &mut dyn PoseGraph,
        mut request: MotionRequest,
    ) -> Result<(), PlayError> {
        let (Some(mixer), Some(pose)) = (self.mixer, request.pose().map(|p| p.mixer)) else {
            request.reset(graph);
            return Err(PlayError::InvalidState {
                reason: "layer is not ready",
            });
        };

        let count = graph.input_count(mixer);
        let has_room = self.last.is_connected()
            || count < self.max_ports
            || (0..count).any(|i| graph.input(mixer, i).is_none());
        if !has_room {
            warn!(mixer = mixer.0, ports = count, "no free layer port");
            request.reset(graph);
            return Err(PlayError::InvalidState {
                reason: "no free layer port",
            });
        }

        self.release_last(graph);

        let port = match (0..count).find(|i| graph.input(mixer, *i).is_none()) {
            Some(port) if graph.connect(mixer, port, pose) => Some(port),
            _ => graph.add_input(mixer, pose, 0.0),
        };
        let Some(port) = port else {
            request.reset(graph);
            return Err(PlayError::InvalidState {
                reason: "could not connect request",
            });
        };
        graph.set_input_weight(mixer, port, 0.0);
        request.port = Some(port);
        request.restart(graph);

        let eff = request.effective_transition(self.default_transition);
        self.transition_speed = if eff > 0.0 { 1.0 / eff } else { f32::MAX };
        self.in_transition = true;

        debug!(
            motion = %request.hash(),
            name = request.descriptor().map_or("", |d| d.name.as_str()),
            port,
            speed = self.transition_speed,
            "request adopted"
        );
        self.last = mem::replace(&mut self.current, request);
        Ok(())
    }

    /// Mark the outgoing request done, free its slot and release its nodes.
    fn release_last(&mut self, graph: &mut dyn PoseGraph) {
        if let (Some(mixer), Some(port)) = (self.mixer, self.last.port()) {
            if let Some(pose) = self.last.pose() {
                graph.set_done(pose.mixer, true);
            }
            graph.disconnect(mixer, port);
        }
        if !self.last.is_empty() {
            trace!(motion = %self.last.hash(), "last released");
        }
        self.last.reset(graph);
        self.last = MotionRequest::empty();
    }

    /// Move current to last (fading it out) and leave an empty current.
    fn retire_current(&mut self, graph: &mut dyn PoseGraph) {
        debug!(motion = %self.current.hash(), "current retired");
        self.release_last(graph);
        self.last = mem::take(&mut self.current);
    }

    /// Queue a request gated by its condition and bounded by its expiration.
    /// A request whose hash is already pending is dropped.
    pub fn enqueue_pending(
        &mut self,
        graph: &mut dyn PoseGraph,
        request: MotionRequest,
    ) -> Result<(), PlayError> {
        Self::enqueue(&mut self.pending_queue, graph, request)
    }

    pub fn enqueue_loop(
        &mut self,
        graph: &mut dyn PoseGraph,
        request: MotionRequest,
    ) -> Result<(), PlayError> {
        Self::enqueue(&mut self.loop_queue, graph, request)
    }

    fn enqueue(
        queue: &mut Vec<MotionRequest>,
        graph: &mut dyn PoseGraph,
        mut request: MotionRequest,
    ) -> Result<(), PlayError> {
        if !request.has_condition() {
            request.reset(graph);
            return Err(PlayError::MalformedRequest {
                reason: "queued request has no condition",
            });
        }
        if queue.iter().any(|r| *r == request) {
            trace!(motion = %request.hash(), "already queued");
            request.reset(graph);
            return Err(PlayError::rejected(RejectReason::SameMotion));
        }
        queue.push(request);
        Ok(())
    }

    /// Scan pending requests tail to head; at most one play attempt per call.
    pub fn process_pending_queue(&mut self, graph: &mut dyn PoseGraph, dt: f32) {
        let mut i = self.pending_queue.len();
        while i > 0 {
            i -= 1;
            match self.pending_queue[i].condition_holds() {
                None => {
                    let mut dropped = self.pending_queue.remove(i);
                    warn!(motion = %dropped.hash(), "pending request without condition discarded");
                    dropped.reset(graph);
                }
                Some(false) => {
                    let entry = &mut self.pending_queue[i];
                    if entry.expiration > 0.0 {
                        entry.expiration -= dt;
                        if entry.expiration <= 0.0 {
                            let mut expired = self.pending_queue.remove(i);
                            debug!(motion = %expired.hash(), "pending request expired");
                            expired.reset(graph);
                        }
                    }
                }
                Some(true) => {
                    // waits for the current motion to change
                    if self.pending_queue[i] == self.current {
                        continue;
                    }
                    let request = self.pending_queue.remove(i);
                    let _ = self.try_play(graph, request, false);
                    break;
                }
            }
        }
    }

    /// Like the pending scan, but false entries simply wait.
    pub fn process_loop_queue(&mut self, graph: &mut dyn PoseGraph) {
        let mut i = self.loop_queue.len();
        while i > 0 {
            i -= 1;
            match self.loop_queue[i].condition_holds() {
                None => {
                    let mut dropped = self.loop_queue.remove(i);
                    warn!(motion = %dropped.hash(), "loop request without condition discarded");
                    dropped.reset(graph);
                }
                Some(false) => {}
                Some(true) => {
                    let request = self.loop_queue.remove(i);
                    let _ = self.try_play(graph, request, false);
                    break;
                }
            }
        }
    }

    pub fn apply_blend_parameters(&self, graph: &mut dyn PoseGraph) {
        self.current.apply_blend(graph);
    }

    /// Evaluate the current request's event windows and append what fired.
    pub fn dispatch_events(&mut self, graph: &dyn PoseGraph, dt: f32, out: &mut Vec<FiredEvent>) {
        if self.current.is_empty() || self.current.events.is_empty() {
            return;
        }
        let time = self.current.time(graph);
        let duration = self.current.duration();
        let motion = self.current.hash();
        let name = self
            .current
            .descriptor()
            .map(|d| d.name.clone())
            .unwrap_or_default();
        for window in &mut self.current.events {
            if let Some(hit) = window.evaluate(dt, time, duration) {
                out.push(FiredEvent {
                    kind: window.spec().kind.clone(),
                    motion,
                    motion_name: name.clone(),
                    layer: self.mask,
                    dt,
                    time: hit.time,
                    normalized_time: hit.normalized_time,
                });
            }
        }
    }

    /// Integrate the cross-fade between last and current. Returns whether any
    /// slot is still moving.
    pub fn transition_to_current(&mut self, graph: &mut dyn PoseGraph, dt: f32) -> bool {
        let Some(mixer) = self.mixer else {
            return false;
        };
        let step = dt * self.transition_speed;
        let mut moving = false;

        if let Some(last_port) = self.last.port() {
            let above = self.current.port().map_or(true, |cur| last_port >= cur);
            let w = graph.input_weight(mixer, last_port);
            if above && w > 0.0 {
                graph.set_input_weight(mixer, last_port, (w - step).clamp(0.0, 1.0));
                moving = true;
            }
        }

        if let Some(cur_port) = self.current.port() {
            let w = graph.input_weight(mixer, cur_port);
            if w < 1.0 {
                let cut = self.last.port().is_some_and(|last| cur_port < last);
                let next = if cut { 1.0 } else { (w + step).clamp(0.0, 1.0) };
                graph.set_input_weight(mixer, cur_port, next);
                moving = true;
            }
        }

        moving
    }

    /// Reclaim finished requests. Skipped while a cross-fade is running.
    pub fn evaluate_finished_state(&mut self, graph: &mut dyn PoseGraph) {
        if self.in_transition {
            return;
        }
        if self.last.is_connected()
            && self.last.is_valid(graph)
            && self.last.time(graph) > self.last.duration()
        {
            self.release_last(graph);
        }
        if self.current.is_empty() {
            return;
        }
        let retire = if self.current.is_looping() {
            self.current.condition_holds() == Some(false)
        } else {
            self.current.time(graph) > self.current.duration()
        };
        if retire {
            self.retire_current(graph);
        }
    }

    pub fn update(&mut self, graph: &mut dyn PoseGraph, dt: f32, events: &mut Vec<FiredEvent>) {
        if !self.is_ready(graph) {
            return;
        }
        self.process_pending_queue(graph, dt);
        self.process_loop_queue(graph);
        self.apply_blend_parameters(graph);
        self.dispatch_events(graph, dt, events);
    }

    /// Run after the graph clock advanced by `dt`.
    pub fn evaluate(&mut self, graph: &mut dyn PoseGraph, dt: f32) {
        if !self.is_ready(graph) {
            return;
        }
        self.in_transition = self.transition_to_current(graph, dt);
        self.evaluate_finished_state(graph);
    }

    /// Release every request and unhook the mixer from its parent.
    /// Safe to call more than once.
    pub fn dispose(&mut self, graph: &mut dyn PoseGraph) {
        for mut r in self.pending_queue.drain(..).chain(self.loop_queue.drain(..)) {
            r.reset(graph);
        }
        self.current.reset(graph);
        self.current = MotionRequest::empty();
        self.last.reset(graph);
        self.last = MotionRequest::empty();
        self.in_transition = false;

        let Some(mixer) = self.mixer.take() else {
            return;
        };
        graph.set_done(mixer, true);
        if let Some((parent, port)) = self.parent.take() {
            if graph.input(parent, port) == Some(mixer) {
                graph.disconnect(parent, port);
            }
        }
        graph.destroy(mixer);
        debug!(mixer = mixer.0, "playback layer disposed");
    }
}

impl std::fmt::Debug for PlaybackLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackLayer")
            .field("mixer", &self.mixer)
            .field("parent", &self.parent)
            .field("mask", &self.mask)
            .field("current", &self.current)
            .field("last", &self.last)
            .field("in_transition", &self.in_transition)
            .field("transition_speed", &self.transition_speed)
            .field("pending", &self.pending_queue.len())
            .field("loop", &self.loop_queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Condition;
    use std::cell::Cell;
    use vizij_pose_graph_core::{ClipRef, PoseGraphArena};

    const DT: f32 = 0.125;

    fn setup() -> (PoseGraphArena, PlaybackLayer) {
        let mut g = PoseGraphArena::new();
        let master = g.create_layer_mixer_node(0);
        g.set_output(master);
        let layer = PlaybackLayer::new(&mut g, master, None, &Config::default()).expect("layer");
        (g, layer)
    }

    fn motion(name: &str, length: f32, priority: i32) -> Rc<MotionDescriptor> {
        Rc::new(MotionDescriptor::new(
            name,
            vec![Some(ClipRef::new(format!("{name}_clip"), length))],
            priority,
        ))
    }

    fn request(g: &mut PoseGraphArena, d: &Rc<MotionDescriptor>) -> MotionRequest {
        MotionRequest::create(g, d, None, None, None).expect("request")
    }

    fn tick(g: &mut PoseGraphArena, layer: &mut PlaybackLayer) {
        let mut events = Vec::new();
        layer.update(g, DT, &mut events);
        g.evaluate(DT);
        layer.evaluate(g, DT);
    }

    #[test]
    fn first_play_ramps_in() {
        let (mut g, mut layer) = setup();
        let d = motion("idle", 1.0, 0);
        let r = request(&mut g, &d);
        layer.try_play(&mut g, r, false).expect("adopted");
        assert!(layer.in_transition());
        assert_eq!(layer.current().port(), Some(0));
        assert_eq!(layer.current_weight(&g), 0.0);

        tick(&mut g, &mut layer);
        let w = layer.current_weight(&g);
        assert!(w > 0.0 && w < 1.0);
        tick(&mut g, &mut layer);
        assert_eq!(layer.current_weight(&g), 1.0);
        tick(&mut g, &mut layer);
        assert!(!layer.in_transition());
    }

    #[test]
    fn mid_transition_requires_bypass() {
        let (mut g, mut layer) = setup();
        let a = motion("a", 1.0, 0);
        let b = motion("b", 1.0, 1);
        let ra = request(&mut g, &a);
        layer.try_play(&mut g, ra, false).expect("a");
        let rb = request(&mut g, &b);
        let err = layer.try_play(&mut g, rb, false).expect_err("in transition");
        assert_eq!(err.reject_reason(), Some(RejectReason::InTransition));
        let rb = request(&mut g, &b);
        layer.try_play(&mut g, rb, true).expect("bypass");
        assert!(layer.is_playing(&b));
    }

    #[test]
    fn rejected_request_releases_nodes() {
        let (mut g, mut layer) = setup();
        let a = motion("a", 1.0, 0);
        let ra = request(&mut g, &a);
        layer.try_play(&mut g, ra, false).expect("a");
        let before = g.live_node_count();
        let again = request(&mut g, &a);
        assert!(layer.try_play(&mut g, again, true).is_err());
        assert_eq!(g.live_node_count(), before);
    }

    #[test]
    fn false_condition_is_rejected() {
        let (mut g, mut layer) = setup();
        let a = motion("a", 1.0, 0);
        let r = MotionRequest::create(&mut g, &a, Some(Box::new(|| false)), None, None)
            .expect("request");
        let err = layer.try_play(&mut g, r, false).expect_err("condition");
        assert_eq!(err.reject_reason(), Some(RejectReason::ConditionFalse));
        assert!(layer.current().is_empty());
    }

    #[test]
    fn enqueue_rejects_missing_condition_and_duplicates() {
        let (mut g, mut layer) = setup();
        let a = motion("a", 1.0, 0);
        let bare = request(&mut g, &a);
        let err = layer.enqueue_pending(&mut g, bare).expect_err("malformed");
        assert_eq!(err.category(), "request");

        let gated = || Some(Box::new(|| false) as Condition);
        let first = MotionRequest::create(&mut g, &a, gated(), None, None).expect("r");
        let second = MotionRequest::create(&mut g, &a, gated(), None, None).expect("r");
        layer.enqueue_pending(&mut g, first).expect("queued");
        assert!(layer.enqueue_pending(&mut g, second).is_err());
        assert_eq!(layer.pending_len(), 1);
    }

    #[test]
    fn hook_sees_agreeing_conditions() {
        struct Counting(Rc<Cell<u32>>);
        impl ConflictHook for Counting {
            fn on_conditions_agree(&self, _c: &MotionRequest, _i: &MotionRequest) {
                self.0.set(self.0.get() + 1);
            }
        }

        let (mut g, layer) = setup();
        let calls = Rc::new(Cell::new(0));
        let mut layer = layer.with_hook(Rc::new(Counting(calls.clone())));
        let a = motion("a", 1.0, 0);
        let b = motion("b", 1.0, 5);
        let ra = MotionRequest::create(&mut g, &a, Some(Box::new(|| true)), None, None)
            .expect("a")
            .looping(true);
        layer.try_play(&mut g, ra, false).expect("a");
        let rb = MotionRequest::create(&mut g, &b, Some(Box::new(|| true)), None, None)
            .expect("b");
        layer.try_play(&mut g, rb, true).expect("b");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let (mut g, mut layer) = setup();
        let baseline = g.live_node_count() - 1;
        let a = motion("a", 1.0, 0);
        let ra = request(&mut g, &a);
        layer.try_play(&mut g, ra, false).expect("a");
        layer.dispose(&mut g);
        assert!(!layer.is_ready(&g));
        assert_eq!(g.live_node_count(), baseline);
        layer.dispose(&mut g);
        assert_eq!(g.live_node_count(), baseline);
        let rb = request(&mut g, &a);
        let err = layer.try_play(&mut g, rb, false).expect_err("disposed");
        assert_eq!(err.category(), "state");
    }
}
