//! Gesture normalization: wheel bursts and horizontal drags become at most
//! one `Direction` per physical gesture.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::{DragSettings, InputSettings, WheelSettings};
use crate::events::{Direction, DragIntent, PointerKind, WheelSample};

/// Separates deliberate wheel impulses from trackpad/momentum tails.
///
/// Keeps the last `2 * stability` deltas per sign plus the timestamps of the
/// last `2 * stability` events. A sample counts as a fresh impulse while the
/// per-sign history is still filling, or once the newer half of that history
/// is clearly stronger than the older half.
#[derive(Debug)]
pub struct InertiaFilter {
    stability: usize,
    sensitivity: f32,
    tolerance: f32,
    delay: std::time::Duration,
    up: VecDeque<Option<f32>>,
    down: VecDeque<Option<f32>>,
    stamps: VecDeque<Option<Instant>>,
}

impl InertiaFilter {
    pub fn new(settings: &WheelSettings) -> Self {
        let stability = settings.stability.max(1);
        let window = stability * 2;
        Self {
            stability,
            sensitivity: 1.0 + settings.sensitivity.abs(),
            tolerance: 1.0 + settings.tolerance.abs(),
            delay: settings.delay,
            up: VecDeque::from(vec![None; window]),
            down: VecDeque::from(vec![None; window]),
            stamps: VecDeque::from(vec![None; window]),
        }
    }

    /// Classifies one raw sample; zero deltas carry no direction.
    pub fn check(&mut self, sample: WheelSample, now: Instant) -> Option<Direction> {
        let direction = Direction::from_sign(sample.delta)?;
        push_ring(&mut self.stamps, Some(now));
        let ring = match direction {
            Direction::Positive => &mut self.up,
            Direction::Negative => &mut self.down,
        };
        push_ring(ring, Some(sample.delta));
        self.is_impulse(direction, now).then_some(direction)
    }

    fn is_impulse(&self, direction: Direction, now: Instant) -> bool {
        let deltas = match direction {
            Direction::Positive => &self.up,
            Direction::Negative => &self.down,
        };
        let window = self.stability * 2;
        let Some(oldest) = deltas[0] else {
            return true;
        };
        let newest = deltas[window - 1];
        if let Some(previous) = self.stamps[window - 2]
            && previous + self.delay > now
            && Some(oldest) == newest
        {
            return false;
        }
        let average = |range: std::ops::Range<usize>| {
            let len = range.len() as f32;
            range.filter_map(|i| deltas[i]).sum::<f32>() / len
        };
        let old = average(0..self.stability);
        let new = average(self.stability..window);
        old.abs() < (new * self.tolerance).abs() && self.sensitivity < new.abs()
    }
}

fn push_ring<T>(ring: &mut VecDeque<T>, value: T) {
    ring.pop_front();
    ring.push_back(value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Undecided,
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    origin: (f32, f32),
    axis: Axis,
}

/// Pointer-down/move/up tracker reporting horizontal drag intent.
#[derive(Debug)]
pub struct DragRecognizer {
    threshold: f32,
    gesture: Option<Gesture>,
}

impl DragRecognizer {
    pub fn new(settings: &DragSettings) -> Self {
        Self {
            threshold: settings.threshold_px.max(0.0),
            gesture: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn press(&mut self, x: f32, y: f32) {
        self.gesture = Some(Gesture {
            origin: (x, y),
            axis: Axis::Undecided,
        });
    }

    /// Reports intent for a motion sample while the pointer is down.
    pub fn motion(&mut self, x: f32, y: f32) -> Option<DragIntent> {
        let threshold = self.threshold;
        let gesture = self.gesture.as_mut()?;
        let dx = x - gesture.origin.0;
        let dy = y - gesture.origin.1;
        let intentional = dx.hypot(dy) >= threshold && (dx != 0.0 || dy != 0.0);
        if gesture.axis == Axis::Undecided && intentional {
            gesture.axis = if dx.abs() >= dy.abs() {
                Axis::Horizontal
            } else {
                Axis::Vertical
            };
        }
        let direction = match gesture.axis {
            Axis::Horizontal => Direction::from_sign(dx),
            Axis::Vertical | Axis::Undecided => None,
        };
        Some(DragIntent {
            direction,
            intentional: intentional && gesture.axis == Axis::Horizontal,
            dragging: true,
        })
    }

    pub fn release(&mut self) -> DragIntent {
        self.gesture = None;
        DragIntent {
            direction: None,
            intentional: false,
            dragging: false,
        }
    }
}

/// Folds wheel and drag sources into `advance(direction)` intents.
///
/// Only the source matching the configured pointer kind is live. Drags fire
/// at most once per gesture; release never fires.
#[derive(Debug)]
pub struct InputAdapter {
    pointer: PointerKind,
    wheel: InertiaFilter,
    drag: DragRecognizer,
    drag_fired: bool,
}

impl InputAdapter {
    pub fn new(settings: &InputSettings) -> Self {
        Self {
            pointer: settings.pointer,
            wheel: InertiaFilter::new(&settings.wheel),
            drag: DragRecognizer::new(&settings.drag),
            drag_fired: false,
        }
    }

    pub fn on_wheel(&mut self, sample: WheelSample, now: Instant) -> Option<Direction> {
        if self.pointer != PointerKind::Fine {
            return None;
        }
        let direction = self.wheel.check(sample, now);
        if let Some(direction) = direction {
            tracing::debug!(delta = sample.delta, ?direction, "wheel_impulse");
        }
        direction
    }

    pub fn on_press(&mut self, x: f32, y: f32) {
        if self.pointer != PointerKind::Coarse {
            return;
        }
        self.drag.press(x, y);
        self.drag_fired = false;
    }

    pub fn on_motion(&mut self, x: f32, y: f32) -> Option<Direction> {
        if self.pointer != PointerKind::Coarse || self.drag_fired {
            return None;
        }
        let intent = self.drag.motion(x, y)?;
        if !(intent.intentional && intent.dragging) {
            return None;
        }
        let direction = intent.direction?;
        self.drag_fired = true;
        tracing::debug!(?direction, "drag_intent");
        Some(direction)
    }

    pub fn on_release(&mut self) {
        if self.drag.is_dragging() {
            self.drag.release();
        }
        self.drag_fired = false;
    }
}
