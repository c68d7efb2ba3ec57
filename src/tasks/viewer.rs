mod gpu;
mod labels;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::{
    carousel::{Carousel, FrameHandle, FrameScheduler, input::InputAdapter},
    config::Configuration,
    events::{DebugCommand, Direction, PreparedImageCpu, WheelSample},
};

use gpu::GpuState;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

/// One wheel notch in `wheelDelta` units.
const LINE_DELTA: f32 = 120.0;
/// Pixel deltas are scaled to roughly match browser `wheelDelta` magnitudes.
const PIXEL_DELTA_SCALE: f32 = 3.0;

fn wheel_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y * LINE_DELTA,
        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * PIXEL_DELTA_SCALE,
    }
}

fn debug_command(key: &Key) -> Option<DebugCommand> {
    match key {
        Key::Character(c) if c.as_str() == "]" => {
            Some(DebugCommand::Scrub(crate::carousel::SCRUB_STEP))
        }
        Key::Character(c) if c.as_str() == "[" => {
            Some(DebugCommand::Scrub(-crate::carousel::SCRUB_STEP))
        }
        Key::Named(NamedKey::ArrowRight) => Some(DebugCommand::Advance(Direction::Positive)),
        Key::Named(NamedKey::ArrowLeft) => Some(DebugCommand::Advance(Direction::Negative)),
        _ => None,
    }
}

/// `requestAnimationFrame` on top of `Window::request_redraw`.
///
/// Redraw requests coalesce in winit, so only the most recent handle is kept;
/// cancelling it turns the next redraw into a plain repaint.
#[derive(Default)]
struct WindowScheduler {
    window: Option<Arc<Window>>,
    next: u64,
    pending: Option<FrameHandle>,
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending = Some(handle);
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    images: Vec<PreparedImageCpu>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    carousel: Carousel,
    input: InputAdapter,
    scheduler: WindowScheduler,
    cursor: (f32, f32),
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        images: Vec<PreparedImageCpu>,
    ) -> Result<Self> {
        let aspects = images.iter().map(PreparedImageCpu::aspect).collect();
        let carousel = Carousel::new(&cfg, aspects, Instant::now())
            .context("failed to set up carousel")?;
        let input = InputAdapter::new(&cfg.input);
        Ok(Self {
            cfg,
            cancel,
            images,
            window: None,
            gpu: None,
            carousel,
            input,
            scheduler: WindowScheduler::default(),
            cursor: (0.0, 0.0),
        })
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title(self.cfg.window.title.clone());
        if self.cfg.window.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                self.scheduler.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let gpu = GpuState::new(
            window.clone(),
            &self.cfg,
            &self.images,
            self.carousel.labels(),
        )?;
        let gpu = self.gpu.insert(gpu);
        // Pixels now live on the GPU.
        self.images = Vec::new();

        let logical = window.inner_size().to_logical::<f32>(window.scale_factor());
        self.carousel.on_resize(logical.width, logical.height, gpu);
        self.carousel
            .on_all_loaded(Instant::now(), &mut self.scheduler, gpu);
        Ok(())
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let (Some(window), Some(gpu)) = (self.window.as_ref(), self.gpu.as_mut()) else {
            return;
        };
        let scale_factor = window.scale_factor();
        gpu.resize(new_size, scale_factor, self.carousel.labels());
        let logical = new_size.to_logical::<f32>(scale_factor);
        self.carousel.on_resize(logical.width, logical.height, gpu);
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        let handle = self.scheduler.pending.take();
        self.carousel
            .on_frame(handle, Instant::now(), &mut self.scheduler, gpu);
        if gpu.is_fatal() {
            event_loop.exit();
            return;
        }
        if gpu.take_lost() {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn advance(&mut self, direction: Direction) {
        if self
            .carousel
            .request_advance(direction, Instant::now(), &mut self.scheduler)
        {
            debug!(direction = direction.sign(), active = self.carousel.active(), "advance_accepted");
        }
    }

    fn debug_key(&mut self, key: &Key) {
        let (Some(command), Some(gpu)) = (debug_command(key), self.gpu.as_mut()) else {
            return;
        };
        self.carousel
            .debug(command, Instant::now(), &mut self.scheduler, gpu);
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gpu.is_none() {
            if let Err(err) = self.init_gpu(window.clone()) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }
        let scale_factor = window.scale_factor();

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let sample = WheelSample {
                    delta: wheel_delta(delta),
                };
                if let Some(direction) = self.input.on_wheel(sample, Instant::now()) {
                    self.advance(direction);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(scale_factor);
                self.cursor = (logical.x, logical.y);
                if let Some(direction) = self.input.on_motion(logical.x, logical.y) {
                    self.advance(direction);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.input.on_press(self.cursor.0, self.cursor.1),
                ElementState::Released => self.input.on_release(),
            },
            WindowEvent::Touch(touch) => {
                let logical = touch.location.to_logical::<f32>(scale_factor);
                match touch.phase {
                    TouchPhase::Started => self.input.on_press(logical.x, logical.y),
                    TouchPhase::Moved => {
                        if let Some(direction) = self.input.on_motion(logical.x, logical.y) {
                            self.advance(direction);
                        }
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => self.input.on_release(),
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if self.cfg.debug_panel && event.state == ElementState::Pressed =>
            {
                self.debug_key(&event.logical_key);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Opens the window and runs the carousel until it closes or `cancel` fires.
pub fn run_windowed(
    cfg: Configuration,
    images: Vec<PreparedImageCpu>,
    cancel: CancellationToken,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, images)?;
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("viewer event loop failed")
}
