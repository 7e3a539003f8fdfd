//! Time-windowed events bound to a motion.
//!
//! [`EventSpec`] is the authored window. Each live request owns one
//! [`EventWindow`] per authored window holding the per-playback state, evaluated every
//! tick against the request's playback time. Firing produces a [`FiredEvent`]
//! that the machine collects for the tick.

use serde::{Deserialize, Serialize};
use vizij_pose_graph_core::Hash128;

/// Authored time window on a motion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event type; hosts dispatch on it.
    pub kind: String,
    pub start: f32,
    pub end: f32,
    /// Window bounds are in normalized [0, 1] time rather than seconds.
    #[serde(default = "default_true")]
    pub normalized: bool,
    /// Fire at most once for the lifetime of the window.
    #[serde(default, rename = "oneTime")]
    pub one_time: bool,
    /// Fire on the first tick inside the window only, until it is re-entered.
    #[serde(default, rename = "oneFrame")]
    pub one_frame: bool,
}

fn default_true() -> bool {
    true
}

impl EventSpec {
    pub fn new(kind: impl Into<String>, start: f32, end: f32) -> Self {
        Self {
            kind: kind.into(),
            start,
            end,
            normalized: true,
            one_time: false,
            one_frame: false,
        }
    }

    pub fn in_seconds(mut self) -> Self {
        self.normalized = false;
        self
    }

    pub fn one_time(mut self) -> Self {
        self.one_time = true;
        self
    }

    pub fn one_frame(mut self) -> Self {
        self.one_frame = true;
        self
    }
}

/// One firing of an event window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiredEvent {
    pub kind: String,
    pub motion: Hash128,
    pub motion_name: String,
    /// Mask hash of the layer the motion plays on; `None` for the full body.
    pub layer: Option<Hash128>,
    pub dt: f32,
    /// Raw playback time in seconds.
    pub time: f32,
    /// Playback time wrapped and normalized into [0, 1].
    pub normalized_time: f32,
}

/// What a window reports after evaluation; the caller attaches motion context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowHit {
    pub time: f32,
    pub normalized_time: f32,
}

/// Runtime state of one [`EventSpec`] for one playing request.
#[derive(Clone, Debug)]
pub struct EventWindow {
    spec: EventSpec,
    is_executing: bool,
    had_executed_once: bool,
    execution_count: u32,
}

impl EventWindow {
    pub fn new(spec: EventSpec) -> Self {
        Self {
            spec,
            is_executing: false,
            had_executed_once: false,
            execution_count: 0,
        }
    }

    #[inline]
    pub fn spec(&self) -> &EventSpec {
        &self.spec
    }

    #[inline]
    pub fn is_executing(&self) -> bool {
        self.is_executing
    }

    #[inline]
    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }

    /// Reset when the owning motion restarts from time 0.
    pub fn clear(&mut self) {
        self.execution_count = 0;
        self.is_executing = false;
        self.had_executed_once = false;
    }

    /// Evaluate against the owning motion's playback `time` and total `duration`.
    /// Returns a hit when the window's behavior should run this tick.
    pub fn evaluate(&mut self, _dt: f32, time: f32, duration: f32) -> Option<WindowHit> {
        let n_time = normalized_time(time, duration);
        let value = if self.spec.normalized { n_time } else { time };

        if value >= self.spec.start && value < self.spec.end {
            self.is_executing = true;
            let suppressed = (self.spec.one_frame && self.had_executed_once)
                || (self.spec.one_time && (self.had_executed_once || self.execution_count > 0));
            self.had_executed_once = true;
            if suppressed {
                None
            } else {
                Some(WindowHit {
                    time,
                    normalized_time: n_time,
                })
            }
        } else {
            if self.is_executing && value >= self.spec.end {
                self.execution_count = self.execution_count.saturating_add(1);
            }
            self.is_executing = false;
            self.had_executed_once = false;
            None
        }
    }
}

/// `time mod duration`, inverse-lerped over [0, duration]. Zero for non-positive durations.
pub fn normalized_time(time: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 0.0;
    }
    let m = time.rem_euclid(duration);
    (m / duration).clamp(0.0, 1.0)
}
