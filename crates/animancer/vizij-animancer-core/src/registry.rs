//! Masked layers keyed by mask content hash, in creation order.

use std::rc::Rc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;
use vizij_pose_graph_core::{BodyMask, Hash128, NodeId, PoseGraph};

use crate::config::Config;
use crate::error::PlayError;
use crate::layer::{ConflictHook, PlaybackLayer};
use crate::mask::MaskIdentity;

#[derive(Debug, Default)]
pub struct MaskedLayerRegistry {
    layers: IndexMap<Hash128, PlaybackLayer>,
}

impl MaskedLayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer for `mask`, creating and wiring it under `parent` on first use.
    /// An existing entry that is no longer ready is evicted and replaced.
    pub fn get_or_create(
        &mut self,
        graph: &mut dyn PoseGraph,
        parent: NodeId,
        mask: &BodyMask,
        cfg: &Config,
        hook: &Rc<dyn ConflictHook>,
    ) -> Result<&mut PlaybackLayer, PlayError> {
        let key = mask.content_hash();
        if self.layers.get(&key).is_some_and(|l| !l.is_ready(graph)) {
            if let Some(mut stale) = self.layers.shift_remove(&key) {
                debug!(mask = %key, "evicting stale masked layer");
                stale.dispose(graph);
            }
        }
        match self.layers.entry(key) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                let layer = PlaybackLayer::new(graph, parent, Some(mask), cfg)
                    .ok_or(PlayError::InvalidState {
                        reason: "masked layer could not be created",
                    })?
                    .with_hook(Rc::clone(hook));
                debug!(mask = %key, name = %mask.name, "masked layer registered");
                Ok(v.insert(layer))
            }
        }
    }

    pub fn get(&self, mask: Hash128) -> Option<&PlaybackLayer> {
        self.layers.get(&mask)
    }

    /// Drop every entry whose layer is no longer ready, keeping order.
    pub fn prune(&mut self, graph: &mut dyn PoseGraph) {
        self.layers.retain(|key, layer| {
            if layer.is_ready(graph) {
                return true;
            }
            debug!(mask = %key, "masked layer evicted");
            layer.dispose(graph);
            false
        });
    }

    /// Tear down one layer; the entry itself goes on the next [`Self::prune`].
    pub fn dispose_layer(&mut self, graph: &mut dyn PoseGraph, mask: Hash128) -> bool {
        match self.layers.get_mut(&mask) {
            Some(layer) => {
                layer.dispose(graph);
                true
            }
            None => false,
        }
    }

    pub fn dispose_all(&mut self, graph: &mut dyn PoseGraph) {
        for (_, mut layer) in self.layers.drain(..) {
            layer.dispose(graph);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash128, &PlaybackLayer)> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Hash128, &mut PlaybackLayer)> {
        self.layers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
