use std::time::{Duration, Instant};

use crate::config::TransitionSettings;
use crate::error::CarouselError;
use crate::events::Direction;

use super::params::{ShaderParams, TextureSlot};
use super::tween::{Easing, Tween, TweenStep};

/// `(index - direction) mod len` with a non-negative result.
pub fn step_index(index: usize, direction: Direction, len: usize) -> usize {
    debug_assert!(len > 0);
    let len = len as i64;
    (index as i64 - i64::from(direction.sign())).rem_euclid(len) as usize
}

/// Target of an in-flight advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub direction: Direction,
    pub next: usize,
    pub next_next: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Revealing,
    Advancing(Advance),
}

/// What one frame sample of the controller observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// Nothing in flight.
    Idle,
    /// Ramp still running; `progress` was updated.
    Running,
    /// Ramp reached its end on this sample; `progress` is exactly `1.0` and
    /// the caller must draw and then [`TransitionController::commit`].
    Settled,
}

/// Owns the active index and gates every transition.
///
/// At most one transition is in flight. `Advancing` is only entered from
/// `Idle`, and only once the one-shot reveal (when required) has finished.
#[derive(Debug)]
pub struct TransitionController {
    len: usize,
    active: usize,
    state: TransitionState,
    ramp: Option<Tween>,
    duration: Duration,
    easing: Easing,
    reveal_required: bool,
    reveal_done: bool,
}

impl TransitionController {
    pub fn new(
        len: usize,
        settings: &TransitionSettings,
        reveal_required: bool,
    ) -> Result<Self, CarouselError> {
        if len < 2 {
            return Err(CarouselError::TooFewImages { count: len });
        }
        Ok(Self {
            len,
            active: 0,
            state: TransitionState::Idle,
            ramp: None,
            duration: settings.duration,
            easing: settings.easing,
            reveal_required,
            reveal_done: false,
        })
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TransitionState::Idle
    }

    pub fn reveal_done(&self) -> bool {
        self.reveal_done
    }

    /// Starts an advance when idle and the reveal gate is open.
    ///
    /// Returns `None` (and leaves everything untouched) otherwise.
    pub fn request_advance(
        &mut self,
        direction: Direction,
        now: Instant,
        params: &mut ShaderParams,
    ) -> Option<Advance> {
        if !self.is_idle() {
            tracing::debug!(?direction, state = ?self.state, "advance_rejected_busy");
            return None;
        }
        if self.reveal_required && !self.reveal_done {
            tracing::debug!(?direction, "advance_rejected_before_reveal");
            return None;
        }
        let next = step_index(self.active, direction, self.len);
        let advance = Advance {
            direction,
            next,
            next_next: step_index(next, direction, self.len),
        };
        params.bind(TextureSlot::Image(self.active), TextureSlot::Image(next));
        params.direction = direction.as_f32();
        params.reset_progress(0.0);
        self.ramp = Some(Tween::new(0.0, 1.0, self.duration, self.easing, now));
        self.state = TransitionState::Advancing(advance);
        tracing::info!(
            from = self.active,
            to = next,
            direction = direction.sign(),
            "transition_start"
        );
        Some(advance)
    }

    /// Copies the ramp's current value into `params.progress`.
    pub fn sample(&mut self, now: Instant, params: &mut ShaderParams) -> Sample {
        let TransitionState::Advancing(_) = self.state else {
            return Sample::Idle;
        };
        let Some(ramp) = self.ramp.as_mut() else {
            return Sample::Idle;
        };
        match ramp.poll(now) {
            TweenStep::Running(value) => {
                params.raise_progress(value);
                Sample::Running
            }
            TweenStep::Settled(value) | TweenStep::Finished(value) => {
                params.raise_progress(value);
                Sample::Settled
            }
        }
    }

    /// Finalizes a settled advance: moves the active index and rebinds slots.
    pub fn commit(&mut self, params: &mut ShaderParams) -> Option<Advance> {
        let TransitionState::Advancing(advance) = self.state else {
            return None;
        };
        self.active = advance.next;
        params.bind(
            TextureSlot::Image(advance.next),
            TextureSlot::Image(advance.next_next),
        );
        params.reset_progress(0.0);
        self.ramp = None;
        self.state = TransitionState::Idle;
        tracing::info!(active = self.active, "transition_commit");
        Some(advance)
    }

    /// Enters the one-shot reveal; refused once it has run or while busy.
    pub fn enter_reveal(&mut self) -> bool {
        if self.reveal_done || !self.is_idle() {
            return false;
        }
        self.state = TransitionState::Revealing;
        true
    }

    /// Marks the reveal finished for the rest of the session.
    pub fn complete_reveal(&mut self) {
        if self.state == TransitionState::Revealing {
            self.state = TransitionState::Idle;
        }
        self.reveal_done = true;
    }

    /// Opens the gate without running a reveal (reveal disabled).
    pub fn skip_reveal(&mut self) {
        self.reveal_done = true;
    }
}
