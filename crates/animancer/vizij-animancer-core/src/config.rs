//! Core configuration for vizij-animancer-core.

use serde::{Deserialize, Serialize};

/// Machine-wide knobs shared by every layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transition time in seconds used when a descriptor's own duration is <= 0.
    pub default_transition: f32,
    /// Multiplier applied to every tick's delta before it reaches the layers and the graph clock.
    pub time_scale: f32,
    /// Upper bound on input ports of a layer's mixer.
    pub max_layer_ports: usize,
    /// Fired-event records retained per tick; extra records are dropped.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_transition: 0.15,
            time_scale: 1.0,
            max_layer_ports: 8,
            max_events_per_tick: 256,
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(s: &str) -> Result<Self, crate::error::LoadError> {
        Ok(serde_json::from_str(s)?)
    }
}
