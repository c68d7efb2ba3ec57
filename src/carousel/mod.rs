//! Transition engine: one owned [`Carousel`] ties the controller, the reveal,
//! the frame loop and the shader parameters together.
//!
//! Everything here runs on the event-loop thread. The host drives it through
//! [`FrameScheduler`] (per-frame callbacks) and [`DrawTarget`] (one draw per
//! call).

pub mod frame_loop;
pub mod input;
pub mod labels;
pub mod params;
pub mod reveal;
pub mod transition;
pub mod tween;
pub mod viewport;

use std::time::Instant;

use palette::{LinSrgba, Mix};

use crate::config::{Configuration, RevealSettings, parse_color};
use crate::error::CarouselError;
use crate::events::{DebugCommand, Direction};

pub use frame_loop::{FrameHandle, FrameOrigin, FrameScheduler, RenderLoop};
pub use labels::{LabelSet, LabelState};
pub use params::{CarouselUniforms, ShaderParams, SurfaceGeometry, TextureSlot};
pub use transition::{Advance, Sample, TransitionController, TransitionState};
pub use viewport::ViewportState;

use reveal::{Reveal, RevealStep};
use tween::Stagger;

/// Debug-panel scrub granularity.
pub const SCRUB_STEP: f32 = 0.01;

/// Everything a draw needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub params: &'a ShaderParams,
    pub labels: &'a LabelSet,
}

/// Host-side renderer: submits exactly one draw per call.
pub trait DrawTarget {
    fn draw(&mut self, frame: &Frame<'_>);
}

/// The transition engine.
#[derive(Debug)]
pub struct Carousel {
    controller: TransitionController,
    frames: RenderLoop,
    params: ShaderParams,
    viewport: ViewportState,
    labels: LabelSet,
    reveal: Option<Reveal>,
    /// First caption words still rising after the reveal committed.
    label_rise: Option<Stagger>,
    reveal_settings: RevealSettings,
    backgrounds: Vec<LinSrgba>,
    default_background: LinSrgba,
    image_aspects: Vec<f32>,
    session_start: Instant,
    loaded: bool,
}

impl Carousel {
    /// Builds the engine for `image_aspects.len()` images.
    ///
    /// Fails on fewer than two images or when labels/backgrounds do not line
    /// up with the image list.
    pub fn new(
        cfg: &Configuration,
        image_aspects: Vec<f32>,
        session_start: Instant,
    ) -> Result<Self, CarouselError> {
        let images = image_aspects.len();
        if images != cfg.images.len() {
            return Err(CarouselError::ImageCountMismatch {
                expected: cfg.images.len(),
                received: images,
            });
        }
        if !cfg.labels.is_empty() && cfg.labels.len() != images {
            return Err(CarouselError::LabelCountMismatch {
                labels: cfg.labels.len(),
                images,
            });
        }
        if !cfg.backgrounds.is_empty() && cfg.backgrounds.len() != images {
            return Err(CarouselError::BackgroundCountMismatch {
                backgrounds: cfg.backgrounds.len(),
                images,
            });
        }
        let controller = TransitionController::new(images, &cfg.transition, cfg.reveal.enabled)?;
        let default_background = parse_color(&cfg.default_background)?;
        let backgrounds = cfg.background_colors()?;
        let params = ShaderParams {
            background: default_background,
            ..ShaderParams::default()
        };
        Ok(Self {
            controller,
            frames: RenderLoop::new(),
            params,
            viewport: ViewportState::new(cfg.camera_distance, cfg.surface),
            labels: LabelSet::new(&cfg.labels),
            reveal: None,
            label_rise: None,
            reveal_settings: cfg.reveal,
            backgrounds,
            default_background,
            image_aspects,
            session_start,
            loaded: false,
        })
    }

    pub fn params(&self) -> &ShaderParams {
        &self.params
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn active(&self) -> usize {
        self.controller.active()
    }

    pub fn state(&self) -> TransitionState {
        self.controller.state()
    }

    pub fn reveal_done(&self) -> bool {
        self.controller.reveal_done()
    }

    pub fn is_frame_loop_running(&self) -> bool {
        self.frames.is_running()
    }

    /// Load-complete signal; only the first one has any effect.
    pub fn on_all_loaded(
        &mut self,
        now: Instant,
        scheduler: &mut dyn FrameScheduler,
        target: &mut dyn DrawTarget,
    ) {
        if self.loaded {
            tracing::debug!("load_complete_ignored");
            return;
        }
        self.loaded = true;
        if self.reveal_settings.enabled && self.controller.enter_reveal() {
            self.reveal = Some(Reveal::begin(
                &self.reveal_settings,
                &mut self.labels,
                &mut self.params,
                now,
            ));
            self.params.background = self.default_background;
            self.refresh_geometry();
            self.frames.start(scheduler);
        } else {
            self.controller.skip_reveal();
            Reveal::finish(&mut self.labels, &mut self.params);
            self.params.background = self.background_for(0);
            self.refresh_geometry();
            self.draw(target);
        }
    }

    /// Entry point for every input source; `true` when a transition started.
    pub fn request_advance(
        &mut self,
        direction: Direction,
        now: Instant,
        scheduler: &mut dyn FrameScheduler,
    ) -> bool {
        if self
            .controller
            .request_advance(direction, now, &mut self.params)
            .is_none()
        {
            return false;
        }
        self.label_rise = None;
        self.refresh_geometry();
        self.frames.start(scheduler);
        true
    }

    /// Frame callback. `handle` is the token the scheduler delivered, if any.
    ///
    /// The tracked callback samples, draws once, commits a settled ramp and
    /// then reschedules while anything is still animating; any other redraw
    /// only draws.
    pub fn on_frame(
        &mut self,
        handle: Option<FrameHandle>,
        now: Instant,
        scheduler: &mut dyn FrameScheduler,
        target: &mut dyn DrawTarget,
    ) {
        if self.frames.origin(handle) == FrameOrigin::External {
            self.draw(target);
            return;
        }
        self.params.elapsed = now.saturating_duration_since(self.session_start).as_secs_f32();
        let settled = self.sample(now);
        self.draw(target);
        if settled {
            self.commit();
        }
        if self.is_animating() {
            self.frames.reschedule(scheduler);
        } else {
            self.frames.cancel(scheduler);
        }
    }

    /// Window resized to `width` x `height` device-independent pixels.
    pub fn on_resize(&mut self, width: f32, height: f32, target: &mut dyn DrawTarget) {
        self.viewport.resize(width, height);
        self.refresh_geometry();
        tracing::debug!(
            width,
            height,
            fov = self.viewport.fov_degrees(),
            "viewport_resize"
        );
        self.draw(target);
    }

    /// Applies a debug-panel command; returns `true` when an advance started.
    pub fn debug(
        &mut self,
        command: DebugCommand,
        now: Instant,
        scheduler: &mut dyn FrameScheduler,
        target: &mut dyn DrawTarget,
    ) -> bool {
        match command {
            DebugCommand::Scrub(delta) => {
                self.scrub_progress(delta, target);
                false
            }
            DebugCommand::Advance(direction) => self.request_advance(direction, now, scheduler),
        }
    }

    /// Debug-panel override of `progress`, quantized to [`SCRUB_STEP`].
    ///
    /// Only applies while idle; an in-flight ramp owns `progress`.
    pub fn scrub_progress(&mut self, delta: f32, target: &mut dyn DrawTarget) {
        if !self.controller.is_idle() || self.reveal.is_some() {
            tracing::debug!(state = ?self.controller.state(), "progress_scrub_ignored");
            return;
        }
        let value = ((self.params.progress + delta) / SCRUB_STEP).round() * SCRUB_STEP;
        self.params.reset_progress(value);
        tracing::debug!(progress = self.params.progress, "progress_scrub");
        self.draw(target);
    }

    /// Samples whichever timeline is in flight; `true` once its ramp has
    /// settled and needs a commit.
    fn sample(&mut self, now: Instant) -> bool {
        if let Some(rise) = self.label_rise.as_mut() {
            let (offsets, done) = rise.poll(now);
            self.labels.set_offsets(self.controller.active(), &offsets);
            if done {
                self.label_rise = None;
            }
        }
        if let Some(reveal) = self.reveal.as_mut() {
            let step = reveal.sample(now, &mut self.labels, &mut self.params);
            self.params.background = self
                .default_background
                .mix(self.background_for(0), self.params.progress);
            return step == RevealStep::Settled;
        }
        let sample = self.controller.sample(now, &mut self.params);
        if let TransitionState::Advancing(advance) = self.controller.state() {
            let from = self.controller.active();
            self.labels.swap(from, advance.next, self.params.progress);
            self.params.background = self
                .background_for(from)
                .mix(self.background_for(advance.next), self.params.progress);
        }
        sample == Sample::Settled
    }

    fn commit(&mut self) {
        if let Some(reveal) = self.reveal.take() {
            self.label_rise = reveal.complete(&mut self.labels, &mut self.params);
            self.controller.complete_reveal();
            self.params.background = self.background_for(0);
        } else if self.controller.commit(&mut self.params).is_some() {
            let active = self.controller.active();
            self.labels.show_only(active);
            self.params.background = self.background_for(active);
        }
        self.refresh_geometry();
    }

    fn is_animating(&self) -> bool {
        self.reveal.is_some() || !self.controller.is_idle() || self.label_rise.is_some()
    }

    fn background_for(&self, index: usize) -> LinSrgba {
        self.backgrounds
            .get(index)
            .copied()
            .unwrap_or(self.default_background)
    }

    fn refresh_geometry(&mut self) {
        self.viewport.apply(&mut self.params, &self.image_aspects);
    }

    fn draw(&self, target: &mut dyn DrawTarget) {
        target.draw(&Frame {
            params: &self.params,
            labels: &self.labels,
        });
    }
}
