/// Opaque token for one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host per-frame primitive (`requestAnimationFrame` equivalent).
pub trait FrameScheduler {
    /// Schedules one callback on the next frame.
    fn request_frame(&mut self) -> FrameHandle;
    /// Drops a previously scheduled callback.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// How a frame callback relates to the loop's tracked handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    /// The callback the loop scheduled itself.
    Scheduled,
    /// Any other redraw: expose events, stale handles after cancel.
    External,
}

/// Single conditionally scheduled frame callback.
///
/// At most one handle is tracked at any time; `start` is idempotent and
/// `cancel` releases the tracked handle exactly once.
#[derive(Debug, Default)]
pub struct RenderLoop {
    pending: Option<FrameHandle>,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedules the first frame unless one is already tracked.
    pub fn start(&mut self, scheduler: &mut dyn FrameScheduler) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let handle = scheduler.request_frame();
        tracing::trace!(handle = handle.0, "frame_loop_start");
        self.pending = Some(handle);
        true
    }

    /// Classifies an incoming callback against the tracked handle.
    pub fn origin(&self, handle: Option<FrameHandle>) -> FrameOrigin {
        match (handle, self.pending) {
            (Some(h), Some(p)) if h == p => FrameOrigin::Scheduled,
            _ => FrameOrigin::External,
        }
    }

    /// Replaces the tracked handle with a freshly scheduled one.
    pub fn reschedule(&mut self, scheduler: &mut dyn FrameScheduler) {
        self.pending = Some(scheduler.request_frame());
    }

    /// Cancels the tracked handle; a no-op when nothing is scheduled.
    pub fn cancel(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
            tracing::trace!(handle = handle.0, "frame_loop_cancel");
        }
    }
}
