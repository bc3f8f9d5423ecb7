//! # Gesture Navigation
//!
//! Turns a stream of one-dimensional scroll/swipe samples into discrete
//! history steps, with momentum after release.
//!
//! ```text
//!            sample                 end, |v| > floor
//!   Idle ───────────▶ Tracking ─────────────────────▶ Settling
//!    ▲                 │  ▲ │ sample (smoothed v)       │  tick: v *= friction
//!    │  end, |v|<=floor│  └─┘                           │
//!    ├─────────────────┘                                │
//!    ├──────────────────── |v| < floor (v = 0) ─────────┘
//!    └──────────────────── cancel (from any state)
//! ```
//!
//! ## Trigger policy
//!
//! A step fires at most once per gesture, the instant |velocity| first
//! exceeds [`GestureConfig::trigger_threshold`] while tracking. Positive
//! velocity ("down") steps to the next node, negative ("up") to the previous.
//! Slow drags never cross the threshold and never navigate. If the step lands
//! on a boundary ([`StepOutcome::AtRoot`] / [`StepOutcome::AtLeaf`]) the
//! trigger re-arms immediately so the user can reverse without lifting.
//! A sample that arrives while `Settling` starts a new gesture: momentum is
//! abandoned and the trigger re-arms without passing through `Idle`.
//!
//! ## Invariants
//!
//! 1. Velocity in `Settling` decays monotonically and becomes exactly `0.0`
//!    within [`GestureNavigator::max_settle_ticks`] ticks.
//! 2. Every tick carries a [`MomentumToken`]; cancelling, starting a new
//!    gesture, or settling invalidates all outstanding tokens.
//! 3. After [`GestureNavigator::on_gesture_cancel`] velocity is `0.0` and the
//!    direction is [`GestureDirection::Idle`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cursor::{NavigationIntent, NavigationTarget, StepOutcome};
use crate::HistoryResult;

/// Samples closer together than this are treated as this far apart.
const MIN_SAMPLE_DT_MS: f32 = 1.0;

/// Lower bound for the momentum floor so decay always terminates.
const MIN_MOMENTUM_FLOOR: f32 = 1e-4;

/// Friction bounds; 1.0 would never settle.
const MIN_FRICTION: f32 = 0.01;
const MAX_FRICTION: f32 = 0.99;

/// Tunable constants for gesture navigation. Velocities are in logical
/// pixels per millisecond.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Velocity that counts as a deliberate flick (default: 1.2).
    pub trigger_threshold: f32,
    /// Velocity below which momentum stops (default: 0.05).
    pub momentum_floor: f32,
    /// Weight of the newest sample in exponential smoothing (default: 0.6).
    pub smoothing: f32,
    /// Velocity multiplier per settling tick (default: 0.92).
    pub friction: f32,
    /// Fixed settling tick interval (default: 16ms).
    pub tick_interval: Duration,
    /// Velocity clamp for outlier samples (default: 20.0).
    pub max_velocity: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            trigger_threshold: 1.2,
            momentum_floor: 0.05,
            smoothing: 0.6,
            friction: 0.92,
            tick_interval: Duration::from_millis(16),
            max_velocity: 20.0,
        }
    }
}

impl GestureConfig {
    /// Clamp every constant into the range where settling is guaranteed to
    /// terminate.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.momentum_floor = if self.momentum_floor.is_finite() {
            self.momentum_floor.max(MIN_MOMENTUM_FLOOR)
        } else {
            Self::default().momentum_floor
        };
        self.friction = if self.friction.is_finite() {
            self.friction.clamp(MIN_FRICTION, MAX_FRICTION)
        } else {
            Self::default().friction
        };
        self.smoothing = if self.smoothing.is_finite() {
            self.smoothing.clamp(0.01, 1.0)
        } else {
            Self::default().smoothing
        };
        if !self.trigger_threshold.is_finite() || self.trigger_threshold < self.momentum_floor {
            self.trigger_threshold = self.momentum_floor;
        }
        if !self.max_velocity.is_finite() || self.max_velocity < self.trigger_threshold {
            self.max_velocity = self.trigger_threshold;
        }
        if self.tick_interval.is_zero() {
            self.tick_interval = Duration::from_millis(1);
        }
        self
    }
}

/// Phase of the gesture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GesturePhase {
    /// No gesture in progress.
    Idle,
    /// Pointer down or wheel events arriving.
    Tracking,
    /// Released; residual velocity is decaying.
    Settling,
}

/// Direction of the current motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureDirection {
    /// Not moving.
    Idle,
    /// Upward motion, toward earlier history.
    Previous,
    /// Downward motion, toward later history.
    Next,
}

/// A navigation step fired by a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTrigger {
    /// The step requested.
    pub intent: NavigationIntent,
    /// What the target did with it.
    pub outcome: StepOutcome,
}

/// State after processing one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureUpdate {
    /// Phase after the sample.
    pub phase: GesturePhase,
    /// Smoothed velocity after the sample.
    pub velocity: f32,
    /// The step fired by this sample, if any.
    pub trigger: Option<GestureTrigger>,
}

/// Authorizes settling ticks for one momentum run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumToken {
    generation: u64,
}

/// Result of a settling tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Still settling with this velocity.
    Continue {
        /// Velocity after friction.
        velocity: f32,
    },
    /// Velocity dropped below the floor; now idle.
    Settled,
    /// The token was invalidated; nothing changed.
    Stale,
}

/// Gesture state machine driving a [`NavigationTarget`].
#[derive(Debug, Clone)]
pub struct GestureNavigator {
    config: GestureConfig,
    phase: GesturePhase,
    velocity: f32,
    direction: GestureDirection,
    triggered: bool,
    generation: u64,
    pending: Duration,
}

impl GestureNavigator {
    /// Create a navigator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GestureConfig::default())
    }

    /// Create with custom configuration (sanitized).
    #[must_use]
    pub fn with_config(config: GestureConfig) -> Self {
        Self {
            config: config.sanitized(),
            phase: GesturePhase::Idle,
            velocity: 0.0,
            direction: GestureDirection::Idle,
            triggered: false,
            generation: 0,
            pending: Duration::ZERO,
        }
    }

    /// Get the current configuration.
    #[must_use]
    pub const fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> GesturePhase {
        self.phase
    }

    /// Current signed velocity.
    #[must_use]
    pub const fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Current direction.
    #[must_use]
    pub const fn direction(&self) -> GestureDirection {
        self.direction
    }

    /// Whether the current gesture has already fired its step.
    #[must_use]
    pub const fn has_triggered(&self) -> bool {
        self.triggered
    }

    /// Upper bound on settling ticks from the fastest allowed velocity.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_lossless
    )]
    pub fn max_settle_ticks(&self) -> u32 {
        let ratio = f64::from(self.config.momentum_floor) / f64::from(self.config.max_velocity);
        if ratio >= 1.0 {
            return 1;
        }
        let ticks = ratio.ln() / f64::from(self.config.friction).ln();
        ticks.ceil() as u32 + 1
    }

    /// Feed one gesture sample: `delta` logical pixels over `dt`.
    ///
    /// Starts a new gesture from `Idle` or `Settling`. May fire one step on
    /// `target`.
    ///
    /// # Errors
    ///
    /// Structural errors from the target. A
    /// [`HistoryError::NodeNotFound`](crate::HistoryError::NodeNotFound) is
    /// treated as "stay put" and not returned.
    pub fn on_gesture_sample<T>(
        &mut self,
        target: &mut T,
        delta: f32,
        dt: Duration,
    ) -> HistoryResult<GestureUpdate>
    where
        T: NavigationTarget + ?Sized,
    {
        if !delta.is_finite() {
            tracing::warn!(delta, "Ignoring non-finite gesture sample");
            return Ok(self.update(None));
        }

        let dt_ms = (dt.as_secs_f32() * 1000.0).max(MIN_SAMPLE_DT_MS);
        let instantaneous =
            (delta / dt_ms).clamp(-self.config.max_velocity, self.config.max_velocity);

        if self.phase == GesturePhase::Tracking {
            let alpha = self.config.smoothing;
            self.velocity = alpha * instantaneous + (1.0 - alpha) * self.velocity;
        } else {
            // New gesture; any momentum still running is abandoned.
            self.generation = self.generation.wrapping_add(1);
            self.phase = GesturePhase::Tracking;
            self.velocity = instantaneous;
            self.triggered = false;
            self.pending = Duration::ZERO;
        }
        self.direction = direction_of(self.velocity);

        let mut trigger = None;
        if !self.triggered && self.velocity.abs() > self.config.trigger_threshold {
            let intent = if self.velocity > 0.0 {
                NavigationIntent::Next
            } else {
                NavigationIntent::Previous
            };
            self.triggered = true;
            match target.navigate(intent) {
                Ok(outcome) => {
                    if outcome.is_boundary() {
                        self.triggered = false;
                    }
                    trigger = Some(GestureTrigger { intent, outcome });
                }
                Err(e) if e.is_stale_target() => {
                    tracing::warn!(error = %e, "Gesture target no longer exists, staying put");
                    self.triggered = false;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.update(trigger))
    }

    /// End the gesture (pointer up / wheel stream quiescent).
    ///
    /// Returns a token authorizing settling ticks if enough velocity remains.
    pub fn on_gesture_end(&mut self) -> Option<MomentumToken> {
        if self.phase != GesturePhase::Tracking {
            return None;
        }
        if self.velocity.abs() > self.config.momentum_floor {
            self.generation = self.generation.wrapping_add(1);
            self.phase = GesturePhase::Settling;
            self.pending = Duration::ZERO;
            tracing::debug!(velocity = self.velocity, "Gesture released with momentum");
            Some(MomentumToken {
                generation: self.generation,
            })
        } else {
            self.settle();
            None
        }
    }

    /// Abort the gesture immediately. Outstanding tokens become stale.
    pub fn on_gesture_cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.settle();
    }

    /// Apply one fixed settling tick.
    pub fn tick(&mut self, token: MomentumToken) -> TickOutcome {
        if token.generation != self.generation || self.phase != GesturePhase::Settling {
            return TickOutcome::Stale;
        }
        self.velocity *= self.config.friction;
        if self.velocity.abs() < self.config.momentum_floor {
            self.settle();
            TickOutcome::Settled
        } else {
            TickOutcome::Continue {
                velocity: self.velocity,
            }
        }
    }

    /// Accumulate elapsed time and apply as many whole ticks as fit.
    pub fn advance(&mut self, token: MomentumToken, elapsed: Duration) -> TickOutcome {
        if token.generation != self.generation || self.phase != GesturePhase::Settling {
            return TickOutcome::Stale;
        }
        self.pending += elapsed;
        let mut outcome = TickOutcome::Continue {
            velocity: self.velocity,
        };
        while self.pending >= self.config.tick_interval {
            self.pending -= self.config.tick_interval;
            outcome = self.tick(token);
            if !matches!(outcome, TickOutcome::Continue { .. }) {
                break;
            }
        }
        outcome
    }

    fn settle(&mut self) {
        self.phase = GesturePhase::Idle;
        self.velocity = 0.0;
        self.direction = GestureDirection::Idle;
        self.triggered = false;
        self.pending = Duration::ZERO;
    }

    const fn update(&self, trigger: Option<GestureTrigger>) -> GestureUpdate {
        GestureUpdate {
            phase: self.phase,
            velocity: self.velocity,
            trigger,
        }
    }
}

impl Default for GestureNavigator {
    fn default() -> Self {
        Self::new()
    }
}

fn direction_of(velocity: f32) -> GestureDirection {
    if velocity > 0.0 {
        GestureDirection::Next
    } else if velocity < 0.0 {
        GestureDirection::Previous
    } else {
        GestureDirection::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HistoryError;
    use crate::NodeId;

    const FRAME: Duration = Duration::from_millis(16);

    /// Records every intent and answers with a fixed outcome.
    struct Recorder {
        calls: Vec<NavigationIntent>,
        outcome: StepOutcome,
    }

    impl Recorder {
        fn moving() -> Self {
            Self {
                calls: Vec::new(),
                outcome: StepOutcome::Moved(NodeId::new()),
            }
        }

        fn stuck(outcome: StepOutcome) -> Self {
            Self {
                calls: Vec::new(),
                outcome,
            }
        }
    }

    impl NavigationTarget for Recorder {
        fn navigate(&mut self, intent: NavigationIntent) -> HistoryResult<StepOutcome> {
            self.calls.push(intent);
            Ok(self.outcome)
        }
    }

    struct Vanished;

    impl NavigationTarget for Vanished {
        fn navigate(&mut self, _intent: NavigationIntent) -> HistoryResult<StepOutcome> {
            Err(HistoryError::NodeNotFound(NodeId::new()))
        }
    }

    fn flick(nav: &mut GestureNavigator, target: &mut Recorder, delta: f32) {
        nav.on_gesture_sample(target, delta, FRAME).expect("sample");
    }

    #[test]
    fn test_new_is_idle() {
        let nav = GestureNavigator::new();
        assert_eq!(nav.phase(), GesturePhase::Idle);
        assert_eq!(nav.direction(), GestureDirection::Idle);
        assert!(nav.velocity().abs() < f32::EPSILON);
    }

    #[test]
    fn test_first_sample_records_start_velocity() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        let update = nav
            .on_gesture_sample(&mut target, 8.0, FRAME)
            .expect("sample");
        assert_eq!(update.phase, GesturePhase::Tracking);
        assert!((update.velocity - 0.5).abs() < 1e-6);
        assert_eq!(nav.direction(), GestureDirection::Next);
    }

    #[test]
    fn test_smoothing_blends_samples() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 8.0);
        flick(&mut nav, &mut target, 16.0);
        // 0.6 * 1.0 + 0.4 * 0.5
        assert!((nav.velocity() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_trigger_fires_once_on_crossing() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        let deltas = [8.0, 16.0, 40.0, 48.0, 56.0];
        let mut fired_on = Vec::new();
        for (i, delta) in deltas.iter().enumerate() {
            let update = nav
                .on_gesture_sample(&mut target, *delta, FRAME)
                .expect("sample");
            if update.trigger.is_some() {
                fired_on.push(i + 1);
            }
        }
        assert_eq!(fired_on, vec![3]);
        assert_eq!(target.calls, vec![NavigationIntent::Next]);
        assert!(nav.has_triggered());
    }

    #[test]
    fn test_upward_flick_steps_previous() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, -40.0);
        assert_eq!(target.calls, vec![NavigationIntent::Previous]);
        assert_eq!(nav.direction(), GestureDirection::Previous);
    }

    #[test]
    fn test_slow_drag_never_triggers() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        for _ in 0..20 {
            flick(&mut nav, &mut target, 6.0);
        }
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_slow_sample_then_end_goes_idle() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        assert_eq!(nav.phase(), GesturePhase::Idle);
        flick(&mut nav, &mut target, 0.5);
        assert_eq!(nav.phase(), GesturePhase::Tracking);
        assert!(nav.on_gesture_end().is_none());
        assert_eq!(nav.phase(), GesturePhase::Idle);
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_end_with_momentum_settles() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 40.0);
        let token = nav.on_gesture_end().expect("momentum");
        assert_eq!(nav.phase(), GesturePhase::Settling);

        let before = nav.velocity();
        assert!(matches!(nav.tick(token), TickOutcome::Continue { .. }));
        assert!(nav.velocity() < before);
    }

    #[test]
    fn test_settling_terminates_at_exact_zero() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 10_000.0);
        assert!((nav.velocity() - nav.config().max_velocity).abs() < f32::EPSILON);
        let token = nav.on_gesture_end().expect("momentum");

        let bound = nav.max_settle_ticks();
        let mut ticks = 0;
        let mut last = nav.velocity();
        loop {
            ticks += 1;
            assert!(ticks <= bound, "settling exceeded {bound} ticks");
            match nav.tick(token) {
                TickOutcome::Continue { velocity } => {
                    assert!(velocity.abs() < last.abs());
                    last = velocity;
                }
                TickOutcome::Settled => break,
                TickOutcome::Stale => panic!("token went stale while settling"),
            }
        }
        assert_eq!(nav.phase(), GesturePhase::Idle);
        assert_eq!(nav.velocity().to_bits(), 0.0_f32.to_bits());
        assert_eq!(nav.direction(), GestureDirection::Idle);
        assert_eq!(nav.tick(token), TickOutcome::Stale);
    }

    #[test]
    fn test_cancel_mid_tracking_resets_immediately() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 40.0);
        assert_eq!(nav.phase(), GesturePhase::Tracking);

        nav.on_gesture_cancel();
        assert_eq!(nav.phase(), GesturePhase::Idle);
        assert_eq!(nav.velocity().to_bits(), 0.0_f32.to_bits());
        assert_eq!(nav.direction(), GestureDirection::Idle);
        assert!(nav.on_gesture_end().is_none());
    }

    #[test]
    fn test_cancel_invalidates_scheduled_ticks() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 40.0);
        let token = nav.on_gesture_end().expect("momentum");

        nav.on_gesture_cancel();
        assert_eq!(nav.tick(token), TickOutcome::Stale);
        assert_eq!(nav.advance(token, Duration::from_secs(1)), TickOutcome::Stale);
        assert_eq!(nav.velocity().to_bits(), 0.0_f32.to_bits());
    }

    #[test]
    fn test_new_gesture_invalidates_old_momentum() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 40.0);
        let old = nav.on_gesture_end().expect("momentum");

        flick(&mut nav, &mut target, 4.0);
        assert_eq!(nav.phase(), GesturePhase::Tracking);
        assert!(!nav.has_triggered());
        let velocity = nav.velocity();
        assert_eq!(nav.tick(old), TickOutcome::Stale);
        assert!((nav.velocity() - velocity).abs() < f32::EPSILON);
    }

    #[test]
    fn test_flick_during_settling_steps_again() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 40.0);
        nav.on_gesture_end().expect("momentum");
        assert_eq!(nav.phase(), GesturePhase::Settling);

        flick(&mut nav, &mut target, 40.0);
        assert_eq!(
            target.calls,
            vec![NavigationIntent::Next, NavigationIntent::Next]
        );
    }

    #[test]
    fn test_boundary_rearms_trigger() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::stuck(StepOutcome::AtLeaf);
        flick(&mut nav, &mut target, 40.0);
        assert!(!nav.has_triggered());
        // reversing within the same gesture fires straight away
        flick(&mut nav, &mut target, -200.0);
        assert_eq!(
            target.calls,
            vec![NavigationIntent::Next, NavigationIntent::Previous]
        );
    }

    #[test]
    fn test_stale_target_stays_put() {
        let mut nav = GestureNavigator::new();
        let update = nav
            .on_gesture_sample(&mut Vanished, 40.0, FRAME)
            .expect("stale target is not an error");
        assert!(update.trigger.is_none());
        assert!(!nav.has_triggered());
    }

    #[test]
    fn test_advance_applies_whole_ticks() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        flick(&mut nav, &mut target, 40.0);
        let token = nav.on_gesture_end().expect("momentum");
        let start = nav.velocity();

        // less than one tick: nothing happens
        nav.advance(token, Duration::from_millis(10));
        assert!((nav.velocity() - start).abs() < f32::EPSILON);

        // 10 + 22 = 32ms = two ticks
        nav.advance(token, Duration::from_millis(22));
        let expected = start * 0.92 * 0.92;
        assert!((nav.velocity() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_non_finite_sample_ignored() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        let update = nav
            .on_gesture_sample(&mut target, f32::NAN, FRAME)
            .expect("sample");
        assert_eq!(update.phase, GesturePhase::Idle);
        assert!(target.calls.is_empty());
    }

    #[test]
    fn test_zero_dt_does_not_divide_by_zero() {
        let mut nav = GestureNavigator::new();
        let mut target = Recorder::moving();
        nav.on_gesture_sample(&mut target, 0.5, Duration::ZERO)
            .expect("sample");
        assert!(nav.velocity().is_finite());
    }

    #[test]
    fn test_config_sanitized() {
        let config = GestureConfig {
            trigger_threshold: 1.0,
            momentum_floor: 0.0,
            smoothing: 3.0,
            friction: 1.5,
            tick_interval: Duration::ZERO,
            max_velocity: 0.5,
        }
        .sanitized();
        assert!(config.momentum_floor > 0.0);
        assert!(config.friction < 1.0);
        assert!(config.smoothing <= 1.0);
        assert!(!config.tick_interval.is_zero());
        assert!(config.max_velocity >= config.trigger_threshold);
    }
}
