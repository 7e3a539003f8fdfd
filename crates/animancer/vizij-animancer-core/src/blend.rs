//! Blend-parameter distribution across a motion's clips.
//!
//! One scalar control axis drives N clips: each clip owns a triangular
//! "peak" centred on its position along the axis, so neighbouring clips
//! cross-fade and the weights always sum to 1 inside the domain.

use serde::{Deserialize, Serialize};

/// Two-component control value pulled from a request's sampler each tick.
/// Only `x` drives the distribution; `y` is carried for hosts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendSample {
    pub x: f32,
    pub y: f32,
}

impl From<[f32; 2]> for BlendSample {
    fn from(v: [f32; 2]) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Triangular curve on [0, 1]: 1 at `peak`, falling linearly to 0 at `peak ± half_width`.
pub fn peak_curve(t: f32, peak: f32, half_width: f32) -> f32 {
    if half_width <= 0.0 {
        return if t == peak { 1.0 } else { 0.0 };
    }
    (1.0 - (t - peak).abs() / half_width).clamp(0.0, 1.0)
}

/// Weights for the clip ports of a per-motion mixer with `input_count` inputs
/// (clips plus the trailing rest slot). The rest slot gets no entry.
pub fn clip_weights(sample: BlendSample, input_count: usize) -> Vec<f32> {
    let clips = input_count.saturating_sub(1);
    match clips {
        0 => Vec::new(),
        // single clip plus rest: no blend
        1 => vec![1.0],
        _ => {
            let span = (clips - 1) as f32;
            let x = sample.x.clamp(0.0, span);
            let t = x / span;
            let half = 1.0 / span;
            (0..clips)
                .map(|i| peak_curve(t, i as f32 / span, half))
                .collect()
        }
    }
}
