//! Machine: public play/query surface over a pose graph.
//!
//! Owns the graph, a master layer mixer set as the graph output, the
//! full-body layer at master slot 0 and the masked-layer registry. Hosts call
//! [`Machine::tick`] once per frame, or `update` and `evaluate` separately.

use std::rc::Rc;

use tracing::{debug, warn};
use vizij_pose_graph_core::{BodyMask, Hash128, NodeId, PoseGraph};

use crate::blend::BlendSample;
use crate::config::Config;
use crate::descriptor::MotionDescriptor;
use crate::error::PlayError;
use crate::event::FiredEvent;
use crate::layer::{ConflictHook, NoopHook, PlaybackLayer};
use crate::mask::MaskIdentity;
use crate::registry::MaskedLayerRegistry;
use crate::request::{BlendSampler, Condition, MotionRequest};

const NOT_READY: PlayError = PlayError::InvalidState {
    reason: "machine is not ready",
};
const NO_POSE: PlayError = PlayError::InvalidState {
    reason: "pose nodes could not be built",
};

pub struct Machine<G: PoseGraph> {
    graph: G,
    cfg: Config,
    master: Option<NodeId>,
    full_body: Option<PlaybackLayer>,
    masked: MaskedLayerRegistry,
    hook: Rc<dyn ConflictHook>,
    events: Vec<FiredEvent>,
    velocity: [f32; 3],
}

impl<G: PoseGraph> Machine<G> {
    pub fn new(mut graph: G, cfg: Config) -> Self {
        let master = graph.create_layer_mixer_node(0);
        graph.set_output(master);
        let full_body = PlaybackLayer::new(&mut graph, master, None, &cfg);
        if full_body.is_none() {
            warn!("pose graph not ready; full-body layer unavailable");
        }
        Self {
            graph,
            cfg,
            master: Some(master),
            full_body,
            masked: MaskedLayerRegistry::new(),
            hook: Rc::new(NoopHook),
            events: Vec::new(),
            velocity: [0.0; 3],
        }
    }

    #[inline]
    pub fn graph(&self) -> &G {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn master(&self) -> Option<NodeId> {
        self.master
    }

    pub fn is_ready(&self) -> bool {
        self.full_body
            .as_ref()
            .is_some_and(|l| l.is_ready(&self.graph))
    }

    /// Applies to the full-body layer and to every masked layer, existing or future.
    pub fn set_conflict_hook(&mut self, hook: Rc<dyn ConflictHook>) {
        if let Some(layer) = self.full_body.as_mut() {
            layer.set_hook(Rc::clone(&hook));
        }
        for (_, layer) in self.masked.iter_mut() {
            layer.set_hook(Rc::clone(&hook));
        }
        self.hook = hook;
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.cfg.time_scale = scale.max(0.0);
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.cfg.time_scale
    }

    /// Loop `descriptor` while `condition` holds. Queued; adopted on the next update.
    pub fn play_while(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        condition: impl Fn() -> bool + 'static,
    ) -> Result<(), PlayError> {
        self.play_while_inner(descriptor, Box::new(condition), None, None)
    }

    /// As [`Machine::play_while`], with clip weights driven by `sampler` each tick.
    pub fn play_while_blended(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        condition: impl Fn() -> bool + 'static,
        sampler: impl Fn() -> BlendSample + 'static,
    ) -> Result<(), PlayError> {
        self.play_while_inner(descriptor, Box::new(condition), Some(Box::new(sampler)), None)
    }

    /// Play once when `condition` first holds; give up after `expiration`
    /// seconds (<= 0 waits forever).
    pub fn play_once_when(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        condition: impl Fn() -> bool + 'static,
        expiration: f32,
    ) -> Result<(), PlayError> {
        self.play_once_when_inner(descriptor, Box::new(condition), expiration, None)
    }

    /// Try to play immediately.
    pub fn play_once(&mut self, descriptor: &Rc<MotionDescriptor>) -> Result<(), PlayError> {
        self.play_once_with(descriptor, false)
    }

    /// Try to play immediately, optionally cutting into a running cross-fade.
    pub fn play_once_with(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        bypass_transition: bool,
    ) -> Result<(), PlayError> {
        self.play_once_inner(descriptor, bypass_transition, None)
    }

    pub fn mask_play_while(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        mask: &BodyMask,
        condition: impl Fn() -> bool + 'static,
    ) -> Result<(), PlayError> {
        self.play_while_inner(descriptor, Box::new(condition), None, Some(mask))
    }

    pub fn mask_play_once_when(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        mask: &BodyMask,
        condition: impl Fn() -> bool + 'static,
        expiration: f32,
    ) -> Result<(), PlayError> {
        self.play_once_when_inner(descriptor, Box::new(condition), expiration, Some(mask))
    }

    pub fn mask_play_once(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        mask: &BodyMask,
    ) -> Result<(), PlayError> {
        self.play_once_inner(descriptor, false, Some(mask))
    }

    fn play_while_inner(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        condition: Condition,
        sampler: Option<BlendSampler>,
        mask: Option<&BodyMask>,
    ) -> Result<(), PlayError> {
        let layer = Self::route(
            &mut self.full_body,
            &mut self.masked,
            &mut self.graph,
            self.master,
            mask,
            &self.cfg,
            &self.hook,
        )?;
        let request =
            MotionRequest::create(&mut self.graph, descriptor, Some(condition), sampler, mask)
                .ok_or(NO_POSE)?
                .looping(true);
        layer.enqueue_loop(&mut self.graph, request)
    }

    fn play_once_when_inner(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        condition: Condition,
        expiration: f32,
        mask: Option<&BodyMask>,
    ) -> Result<(), PlayError> {
        let layer = Self::route(
            &mut self.full_body,
            &mut self.masked,
            &mut self.graph,
            self.master,
            mask,
            &self.cfg,
            &self.hook,
        )?;
        let request =
            MotionRequest::create(&mut self.graph, descriptor, Some(condition), None, mask)
                .ok_or(NO_POSE)?
                .with_expiration(expiration);
        layer.enqueue_pending(&mut self.graph, request)
    }

    fn play_once_inner(
        &mut self,
        descriptor: &Rc<MotionDescriptor>,
        bypass_transition: bool,
        mask: Option<&BodyMask>,
    ) -> Result<(), PlayError> {
        let layer = Self::route(
            &mut self.full_body,
            &mut self.masked,
            &mut self.graph,
            self.master,
            mask,
            &self.cfg,
            &self.hook,
        )?;
        let request = MotionRequest::create(&mut self.graph, descriptor, None, None, mask)
            .ok_or(NO_POSE)?;
        layer.try_play(&mut self.graph, request, bypass_transition)
    }

    /// Layer a request for `mask` plays on; masked layers are created on demand.
    /// Borrows fields rather than `self` so the graph stays usable alongside.
    fn route<'a>(
        full_body: &'a mut Option<PlaybackLayer>,
        masked: &'a mut MaskedLayerRegistry,
        graph: &mut G,
        master: Option<NodeId>,
        mask: Option<&BodyMask>,
        cfg: &Config,
        hook: &Rc<dyn ConflictHook>,
    ) -> Result<&'a mut PlaybackLayer, PlayError> {
        match mask {
            None => full_body.as_mut().ok_or(NOT_READY),
            Some(mask) => {
                let master = master.ok_or(NOT_READY)?;
                masked.get_or_create(graph, master, mask, cfg, hook)
            }
        }
    }

    /// Hash of the full-body current motion; zero when nothing plays.
    pub fn current_motion_hash(&self) -> Hash128 {
        self.full_body
            .as_ref()
            .map_or(Hash128::ZERO, |l| l.current_hash())
    }

    pub fn current_motion_can_transition(&self) -> bool {
        self.full_body
            .as_ref()
            .is_some_and(|l| l.current_can_transition(&self.graph))
    }

    pub fn current_motion_finished(&self) -> bool {
        self.full_body
            .as_ref()
            .map_or(true, |l| l.current_finished(&self.graph))
    }

    pub fn is_playing_full_body(&self, descriptor: &MotionDescriptor) -> bool {
        self.full_body
            .as_ref()
            .is_some_and(|l| l.is_playing(descriptor))
    }

    pub fn is_playing_part_body(&self, descriptor: &MotionDescriptor, mask: &BodyMask) -> bool {
        self.get_mask(mask).is_some_and(|l| l.is_playing(descriptor))
    }

    /// The ready masked layer for `mask`, if one was created.
    pub fn get_mask(&self, mask: &BodyMask) -> Option<&PlaybackLayer> {
        self.masked
            .get(mask.content_hash())
            .filter(|l| l.is_ready(&self.graph))
    }

    #[inline]
    pub fn full_body(&self) -> Option<&PlaybackLayer> {
        self.full_body.as_ref()
    }

    /// Registry entries, including disposed layers not yet evicted.
    pub fn masked_layer_count(&self) -> usize {
        self.masked.len()
    }

    /// Root displacement per second from the last evaluate.
    #[inline]
    pub fn velocity(&self) -> [f32; 3] {
        self.velocity
    }

    /// Events fired during the last update.
    #[inline]
    pub fn events(&self) -> &[FiredEvent] {
        &self.events
    }

    /// Queues, blend sampling and events for every layer, full body first.
    pub fn update(&mut self, dt: f32) {
        let dt = dt * self.cfg.time_scale;
        self.events.clear();
        if let Some(layer) = self.full_body.as_mut() {
            layer.update(&mut self.graph, dt, &mut self.events);
        }
        self.masked.prune(&mut self.graph);
        for (_, layer) in self.masked.iter_mut() {
            layer.update(&mut self.graph, dt, &mut self.events);
        }
        let cap = self.cfg.max_events_per_tick;
        if self.events.len() > cap {
            warn!(dropped = self.events.len() - cap, "event cap reached");
            self.events.truncate(cap);
        }
    }

    /// Advance the graph clock, then integrate transitions and reclaim.
    pub fn evaluate(&mut self, dt: f32) {
        let scaled = dt * self.cfg.time_scale;
        self.graph.evaluate(scaled);
        if let Some(layer) = self.full_body.as_mut() {
            layer.evaluate(&mut self.graph, scaled);
        }
        self.masked.prune(&mut self.graph);
        for (_, layer) in self.masked.iter_mut() {
            layer.evaluate(&mut self.graph, scaled);
        }
        self.velocity = if dt > 0.0 {
            self.graph.root_motion_delta().map(|d| d / dt)
        } else {
            [0.0; 3]
        };
    }

    pub fn tick(&mut self, dt: f32) {
        self.update(dt);
        self.evaluate(dt);
    }

    /// Tear down the masked layer for `mask`. The registry forgets it lazily.
    pub fn dispose_mask_layer(&mut self, mask: &BodyMask) -> bool {
        self.masked.dispose_layer(&mut self.graph, mask.content_hash())
    }

    /// Release every layer and the master node. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.masked.dispose_all(&mut self.graph);
        if let Some(layer) = self.full_body.as_mut() {
            layer.dispose(&mut self.graph);
        }
        self.events.clear();
        self.velocity = [0.0; 3];
        if let Some(master) = self.master.take() {
            self.graph.set_done(master, true);
            self.graph.destroy(master);
            debug!(master = master.0, "machine disposed");
        }
    }
}

impl<G: PoseGraph + std::fmt::Debug> std::fmt::Debug for Machine<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("graph", &self.graph)
            .field("cfg", &self.cfg)
            .field("master", &self.master)
            .field("full_body", &self.full_body)
            .field("masked", &self.masked)
            .field("events", &self.events.len())
            .field("velocity", &self.velocity)
            .finish()
    }
}
