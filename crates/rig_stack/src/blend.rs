//! Blend evaluators and the per-entry blend state machine
//!
//! Each entry owns at most one blend evaluator, boxed on the entry
//! rather than in its arena: frozen entries keep blending out after
//! their arena is gone.

use serde::{Deserialize, Serialize};

/// Where an entry sits in its blend lifecycle.
///
/// `None -> BlendingIn` happens at admission when a blend-in is
/// configured; `BlendingIn -> None` when the blend reports full and
/// finished; `BlendingOut` is entered only by the stack's owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendStatus {
    #[default]
    None,
    BlendingIn,
    BlendingOut,
}

/// Weight-over-time evaluator for one entry's contribution.
pub trait BlendEvaluator {
    /// Advance by one frame. Frozen blends hold their factor.
    fn advance(&mut self, delta_time: f32);

    /// Current contribution weight in `[0, 1]`
    fn blend_factor(&self) -> f32;

    /// Whether the factor has reached full contribution
    fn is_full(&self) -> bool;

    /// Whether time has run out
    fn is_finished(&self) -> bool;

    /// Stop advancing and hold the current factor
    fn freeze(&mut self);

    /// Run toward zero instead of one (blend-out direction)
    fn set_reversed(&mut self, reversed: bool);

    /// Take over from an interrupted blend at `factor`, so the handoff
    /// is continuous. Returns false if this evaluator cannot.
    fn initialize_from_interruption(&mut self, _factor: f32) -> bool {
        false
    }
}

/// Easing curve applied over a blend's normalized time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendCurve {
    #[default]
    Linear,
    SmoothStep,
}

impl BlendCurve {
    fn apply(self, t: f32) -> f32 {
        match self {
            BlendCurve::Linear => t,
            BlendCurve::SmoothStep => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Configuration for a timed blend
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendConfig {
    /// Blend duration in seconds
    pub duration: f32,
    /// Easing curve
    pub curve: BlendCurve,
}

impl BlendConfig {
    pub fn linear(duration: f32) -> Self {
        Self {
            duration,
            curve: BlendCurve::Linear,
        }
    }

    pub fn smooth(duration: f32) -> Self {
        Self {
            duration,
            curve: BlendCurve::SmoothStep,
        }
    }

    /// Build the evaluator this configuration describes
    pub fn build(self) -> Box<dyn BlendEvaluator> {
        Box::new(SimpleBlend::new(self))
    }
}

/// Timed blend over a fixed duration with an easing curve.
///
/// When reversed, the factor ramps from `start_factor` down to zero;
/// `start_factor` is 1 unless the blend took over from an interrupted
/// blend-in, in which case it is the snapshot of that blend's factor.
pub struct SimpleBlend {
    duration: f32,
    curve: BlendCurve,
    elapsed: f32,
    start_factor: f32,
    reversed: bool,
    frozen: bool,
}

impl SimpleBlend {
    pub fn new(config: BlendConfig) -> Self {
        Self {
            duration: config.duration.max(0.0),
            curve: config.curve,
            elapsed: 0.0,
            start_factor: 1.0,
            reversed: false,
            frozen: false,
        }
    }

    fn normalized_time(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }
}

impl BlendEvaluator for SimpleBlend {
    fn advance(&mut self, delta_time: f32) {
        if self.frozen {
            return;
        }
        self.elapsed = (self.elapsed + delta_time).min(self.duration);
    }

    fn blend_factor(&self) -> f32 {
        let raw = self.curve.apply(self.normalized_time());
        if self.reversed {
            self.start_factor * (1.0 - raw)
        } else {
            raw
        }
    }

    fn is_full(&self) -> bool {
        self.blend_factor() >= 1.0
    }

    fn is_finished(&self) -> bool {
        self.duration <= 0.0 || self.elapsed >= self.duration
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
        self.elapsed = 0.0;
    }

    fn initialize_from_interruption(&mut self, factor: f32) -> bool {
        self.start_factor = factor.clamp(0.0, 1.0);
        self.elapsed = 0.0;
        true
    }
}

/// Hard cut: immediately full and finished. Used when a hot reload
/// invalidates an in-progress blend.
#[derive(Default)]
pub struct PopBlend {
    reversed: bool,
}

impl BlendEvaluator for PopBlend {
    fn advance(&mut self, _delta_time: f32) {}

    fn blend_factor(&self) -> f32 {
        if self.reversed {
            0.0
        } else {
            1.0
        }
    }

    fn is_full(&self) -> bool {
        !self.reversed
    }

    fn is_finished(&self) -> bool {
        true
    }

    fn freeze(&mut self) {}

    fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }
}
