use std::time::{Duration, Instant};

use rust_photo_carousel::carousel::transition::step_index;
use rust_photo_carousel::carousel::tween::Easing;
use rust_photo_carousel::carousel::{
    Carousel, DrawTarget, Frame, FrameHandle, FrameScheduler, ShaderParams, TextureSlot,
    TransitionState,
};
use rust_photo_carousel::config::Configuration;
use rust_photo_carousel::events::Direction;

/// Records scheduler traffic and every draw, like a browser tab would.
#[derive(Default)]
struct FakeHost {
    next: u64,
    pending: Option<FrameHandle>,
    requested: usize,
    cancelled: Vec<FrameHandle>,
    draws: Vec<ShaderParams>,
}

impl FrameScheduler for FakeHost {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        self.requested += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.cancelled.push(handle);
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

#[derive(Default)]
struct Recorder(Vec<ShaderParams>);

impl DrawTarget for Recorder {
    fn draw(&mut self, frame: &Frame<'_>) {
        self.0.push(frame.params.clone());
    }
}

struct Rig {
    carousel: Carousel,
    host: FakeHost,
    draws: Recorder,
    start: Instant,
}

impl Rig {
    fn new(images: usize, reveal: bool) -> Self {
        let mut cfg = Configuration {
            images: (0..images).map(|i| format!("img{i}.png").into()).collect(),
            labels: (0..images).map(|i| format!("Frame number {i}")).collect(),
            ..Configuration::default()
        };
        cfg.transition.duration = Duration::from_millis(1500);
        cfg.transition.easing = Easing::ExpoInOut;
        cfg.reveal.enabled = reveal;
        let start = Instant::now();
        let carousel = Carousel::new(&cfg, vec![1.5; images], start).unwrap();
        let mut rig = Self {
            carousel,
            host: FakeHost::default(),
            draws: Recorder::default(),
            start,
        };
        rig.carousel
            .on_all_loaded(start, &mut rig.host, &mut rig.draws);
        rig
    }

    fn at(&self, ms: u64) -> Instant {
        self.start + Duration::from_millis(ms)
    }

    fn advance(&mut self, direction: Direction, ms: u64) -> bool {
        let now = self.at(ms);
        self.carousel.request_advance(direction, now, &mut self.host)
    }

    /// Delivers the pending frame callback, if any.
    fn frame(&mut self, ms: u64) {
        let handle = self.host.pending.take();
        let now = self.at(ms);
        self.carousel
            .on_frame(handle, now, &mut self.host, &mut self.draws);
    }

    /// Runs frames every 16ms until the reveal has committed.
    fn run_until_revealed(&mut self) -> u64 {
        let mut ms = 0;
        while !self.carousel.reveal_done() {
            ms += 16;
            self.frame(ms);
            assert!(ms < 60_000, "reveal never committed");
        }
        ms
    }

    /// Runs frames every 16ms until the loop stops.
    fn run_until_idle(&mut self, from_ms: u64) -> u64 {
        let mut ms = from_ms;
        while self.host.pending.is_some() {
            ms += 16;
            self.frame(ms);
            assert!(ms < from_ms + 60_000, "frame loop never stopped");
        }
        ms
    }
}

#[test]
fn index_wrap_covers_every_size_and_direction() {
    for len in 2..=16 {
        for active in 0..len {
            let up = step_index(active, Direction::Positive, len);
            let down = step_index(active, Direction::Negative, len);
            assert!(up < len && down < len);
            assert_eq!(up, (active + len - 1) % len);
            assert_eq!(down, (active + 1) % len);
        }
    }
}

#[test]
fn scenario_two_images_positive() {
    let mut rig = Rig::new(2, false);
    assert!(rig.advance(Direction::Positive, 0));
    assert!(matches!(
        rig.carousel.state(),
        TransitionState::Advancing(a) if a.next == 1 && a.next_next == 0
    ));
    rig.run_until_idle(0);

    assert_eq!(rig.carousel.active(), 1);
    let params = rig.carousel.params();
    assert_eq!(params.texture_a, TextureSlot::Image(1));
    assert_eq!(params.texture_b, TextureSlot::Image(0));
    assert_eq!(params.progress, 0.0);
    assert_eq!(rig.carousel.state(), TransitionState::Idle);

    let shown: Vec<usize> = rig.carousel.labels().visible().map(|(i, _)| i).collect();
    assert_eq!(shown, vec![1]);
    let offsets = &rig.carousel.labels().get(1).unwrap().offsets;
    assert!(offsets.iter().all(|&o| o == 0.0));
}

#[test]
fn scenario_three_images_negative() {
    let mut rig = Rig::new(3, false);
    assert!(rig.advance(Direction::Negative, 0));
    assert!(matches!(
        rig.carousel.state(),
        TransitionState::Advancing(a) if a.next == 2 && a.next_next == 1
    ));
    rig.run_until_idle(0);
    assert_eq!(rig.carousel.active(), 2);
}

#[test]
fn scenario_rapid_second_request_has_no_effect() {
    let mut rig = Rig::new(5, false);
    assert!(rig.advance(Direction::Positive, 0));
    assert!(!rig.advance(Direction::Positive, 1));
    assert!(!rig.advance(Direction::Negative, 2));
    assert_eq!(rig.host.requested, 1);
    rig.run_until_idle(2);
    assert_eq!(rig.carousel.active(), 4);
}

#[test]
fn scenario_resize_mid_transition() {
    let mut rig = Rig::new(3, false);
    rig.carousel.on_resize(800.0, 600.0, &mut rig.draws);
    rig.advance(Direction::Positive, 0);
    rig.frame(700);
    let before = rig.carousel.params().clone();
    let draws_before = rig.draws.0.len();
    let requested_before = rig.host.requested;

    rig.carousel.on_resize(1200.0, 900.0, &mut rig.draws);

    let after = rig.carousel.params();
    assert_eq!(rig.draws.0.len(), draws_before + 1);
    assert_eq!(rig.host.requested, requested_before);
    assert_eq!(after.progress, before.progress);
    assert_eq!(rig.carousel.active(), 0);
    assert_ne!(after.geometry, before.geometry);
    assert!(rig.carousel.is_frame_loop_running());
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let mut rig = Rig::new(4, false);
    let draws_before = rig.draws.0.len();
    rig.advance(Direction::Negative, 0);
    rig.run_until_idle(0);

    let frames = &rig.draws.0[draws_before..];
    assert!(frames.len() > 10);
    for pair in frames.windows(2) {
        assert!(pair[1].progress >= pair[0].progress);
    }
    assert_eq!(frames.last().map(|p| p.progress), Some(1.0));
    assert!(frames.iter().all(|p| p.direction == -1.0));
}

#[test]
fn each_accepted_advance_moves_exactly_one_step() {
    let mut rig = Rig::new(3, false);
    let mut ms = 0;
    for expected in [2, 1, 0, 2] {
        assert!(rig.advance(Direction::Positive, ms));
        ms = rig.run_until_idle(ms);
        assert_eq!(rig.carousel.active(), expected);
    }
}

#[test]
fn frame_loop_cancels_exactly_once_per_commit() {
    let mut rig = Rig::new(2, false);
    rig.advance(Direction::Positive, 0);
    rig.run_until_idle(0);
    assert_eq!(rig.host.cancelled.len(), 1);
    assert!(!rig.carousel.is_frame_loop_running());

    // OS repaint after the loop stopped draws once and schedules nothing.
    let requested = rig.host.requested;
    let draws = rig.draws.0.len();
    rig.frame(5_000);
    assert_eq!(rig.draws.0.len(), draws + 1);
    assert_eq!(rig.host.requested, requested);
    assert_eq!(rig.host.cancelled.len(), 1);
}

#[test]
fn reveal_gates_advances_and_runs_once() {
    let mut rig = Rig::new(3, true);
    assert_eq!(rig.carousel.state(), TransitionState::Revealing);
    assert_eq!(rig.carousel.params().texture_a, TextureSlot::Blank);
    assert_eq!(rig.carousel.params().texture_b, TextureSlot::Image(0));
    assert!(!rig.advance(Direction::Positive, 10));

    // 200ms delay plus the 2s progress ramp
    let revealed = rig.run_until_revealed();
    assert!((2_200..2_216).contains(&revealed));
    assert_eq!(rig.carousel.state(), TransitionState::Idle);
    assert!(!rig.carousel.params().reveal_active);
    assert_eq!(rig.carousel.params().texture_a, TextureSlot::Image(0));
    assert_eq!(rig.carousel.params().texture_b, TextureSlot::Image(0));
    assert_eq!(rig.carousel.params().progress, 0.0);

    // The caption keeps rising until its last word lands.
    assert!(rig.carousel.is_frame_loop_running());
    let end = rig.run_until_idle(revealed);
    assert!(end >= 3_040);
    let offsets = &rig.carousel.labels().get(0).unwrap().offsets;
    assert!(offsets.iter().all(|&o| o == 0.0));
    assert_eq!(rig.host.cancelled.len(), 1);

    let requested = rig.host.requested;
    let start = rig.at(end);
    rig.carousel
        .on_all_loaded(start, &mut rig.host, &mut rig.draws);
    assert_eq!(rig.host.requested, requested);
    assert!(rig.carousel.reveal_done());
    assert_eq!(rig.carousel.state(), TransitionState::Idle);

    assert!(rig.advance(Direction::Positive, end + 10));
}

#[test]
fn gestures_unlock_when_the_reveal_ramp_lands() {
    let mut rig = Rig::new(3, true);
    let revealed = rig.run_until_revealed();
    let requested = rig.host.requested;

    assert!(rig.advance(Direction::Positive, revealed));
    assert_eq!(rig.host.requested, requested);
    let end = rig.run_until_idle(revealed);

    assert!(end < revealed + 1_600);
    assert_eq!(rig.carousel.active(), 2);
    let shown: Vec<usize> = rig.carousel.labels().visible().map(|(i, _)| i).collect();
    assert_eq!(shown, vec![2]);
    assert_eq!(rig.host.cancelled.len(), 1);
}
