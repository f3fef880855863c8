//! Ports to the hosting platform: the mount element the canvas lives in and
//! the per-frame callback scheduler. Headless implementations live here too;
//! they back the `--headless` CLI mode and the unit tests.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identity of a renderer's drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasId(pub u64);

/// Registration returned by [`FrameScheduler::request_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle(pub u64);

/// Registration returned by [`RenderTarget::add_resize_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Runs `frame` against `app` unless `app` is already borrowed, which happens
/// when a frame callback fires while an event handler holds it. Returns
/// whether `run` was called; on `false` the host re-arms the same frame.
pub fn deliver_frame<A>(
    app: &RefCell<A>,
    frame: FrameHandle,
    run: impl FnOnce(&mut A, FrameHandle),
) -> bool {
    match app.try_borrow_mut() {
        Ok(mut app) => {
            run(&mut app, frame);
            true
        }
        Err(_) => false,
    }
}

/// Display surface the renderer's canvas is attached to.
pub trait RenderTarget {
    /// Whether the mount element exists yet.
    fn is_available(&self) -> bool {
        true
    }

    /// Current size in CSS/logical pixels. May be zero while the host tears down.
    fn bounding_size(&self) -> (f32, f32);

    fn append_canvas(&mut self, canvas: CanvasId);

    fn remove_canvas(&mut self, canvas: CanvasId);

    fn contains_canvas(&self, canvas: CanvasId) -> bool;

    fn add_resize_listener(&mut self) -> ListenerId;

    fn remove_resize_listener(&mut self, listener: ListenerId);
}

/// "Run before next repaint" scheduling primitive.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;

    /// Withdraws a registration. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Host interaction recorded by the headless collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    CreateRenderer(CanvasId),
    DisposeRenderer(CanvasId),
    AppendCanvas(CanvasId),
    RemoveCanvas(CanvasId),
    AddResizeListener(ListenerId),
    RemoveResizeListener(ListenerId),
    RequestFrame(FrameHandle),
    CancelFrame(FrameHandle),
}

/// Ordered log of [`HostCall`]s. Clones append to the same log, so one log
/// handed to a target, a scheduler and a backend shows how their calls
/// interleave.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<HostCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<HostCall> {
        std::mem::take(&mut *self.calls.lock())
    }
}

#[derive(Debug, Default)]
struct TargetState {
    size: (f32, f32),
    available: bool,
    canvases: Vec<CanvasId>,
    listeners: Vec<ListenerId>,
    next_listener: u64,
}

/// In-memory mount element. Clones share state so tests can inspect and
/// resize the target after handing it to a scene manager.
#[derive(Debug, Clone)]
pub struct HeadlessTarget {
    state: Arc<Mutex<TargetState>>,
    calls: CallLog,
}

impl HeadlessTarget {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            state: Arc::new(Mutex::new(TargetState {
                size: (width, height),
                available: true,
                ..TargetState::default()
            })),
            calls: CallLog::new(),
        }
    }

    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    /// A target whose mount element has not been created yet.
    pub fn detached(width: f32, height: f32) -> Self {
        let target = Self::new(width, height);
        target.state.lock().available = false;
        target
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    pub fn set_size(&self, width: f32, height: f32) {
        self.state.lock().size = (width, height);
    }

    pub fn canvases(&self) -> Vec<CanvasId> {
        self.state.lock().canvases.clone()
    }

    pub fn resize_listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

impl RenderTarget for HeadlessTarget {
    fn is_available(&self) -> bool {
        self.state.lock().available
    }

    fn bounding_size(&self) -> (f32, f32) {
        self.state.lock().size
    }

    fn append_canvas(&mut self, canvas: CanvasId) {
        self.calls.record(HostCall::AppendCanvas(canvas));
        let mut state = self.state.lock();
        if !state.canvases.contains(&canvas) {
            state.canvases.push(canvas);
        }
    }

    fn remove_canvas(&mut self, canvas: CanvasId) {
        self.calls.record(HostCall::RemoveCanvas(canvas));
        self.state.lock().canvases.retain(|attached| *attached != canvas);
    }

    fn contains_canvas(&self, canvas: CanvasId) -> bool {
        self.state.lock().canvases.contains(&canvas)
    }

    fn add_resize_listener(&mut self) -> ListenerId {
        let mut state = self.state.lock();
        state.next_listener += 1;
        let listener = ListenerId(state.next_listener);
        state.listeners.push(listener);
        self.calls.record(HostCall::AddResizeListener(listener));
        listener
    }

    fn remove_resize_listener(&mut self, listener: ListenerId) {
        self.calls.record(HostCall::RemoveResizeListener(listener));
        self.state.lock().listeners.retain(|id| *id != listener);
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    next: u64,
    pending: Option<FrameHandle>,
    canceled: u64,
}

/// Scheduler driven explicitly by the caller through [`ManualScheduler::fire`].
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<SchedulerState>>,
    calls: CallLog,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    /// Takes the pending registration, as the host does right before running it.
    /// Returns `None` once the loop has been canceled.
    pub fn fire(&self) -> Option<FrameHandle> {
        self.state.lock().pending.take()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.state.lock().pending
    }

    pub fn canceled(&self) -> u64 {
        self.state.lock().canceled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let mut state = self.state.lock();
        state.next += 1;
        let handle = FrameHandle(state.next);
        state.pending = Some(handle);
        self.calls.record(HostCall::RequestFrame(handle));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.calls.record(HostCall::CancelFrame(handle));
        let mut state = self.state.lock();
        if state.pending == Some(handle) {
            state.pending = None;
            state.canceled += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canceled_frame_never_fires() {
        let mut scheduler = ManualScheduler::new();
        let handle = scheduler.request_frame();
        scheduler.cancel_frame(handle);
        assert_eq!(scheduler.fire(), None);
        assert_eq!(scheduler.canceled(), 1);
    }

    #[test]
    fn stale_cancel_is_ignored() {
        let mut scheduler = ManualScheduler::new();
        let first = scheduler.request_frame();
        let second = scheduler.request_frame();
        scheduler.cancel_frame(first);
        assert_eq!(scheduler.fire(), Some(second));
    }

    #[test]
    fn target_tracks_canvases_and_listeners() {
        let mut target = HeadlessTarget::new(640.0, 480.0);
        let view = target.clone();
        target.append_canvas(CanvasId(1));
        target.append_canvas(CanvasId(1));
        assert_eq!(view.canvases(), vec![CanvasId(1)]);
        assert!(target.contains_canvas(CanvasId(1)));
        target.remove_canvas(CanvasId(1));
        assert!(!target.contains_canvas(CanvasId(1)));

        let listener = target.add_resize_listener();
        assert_eq!(view.resize_listener_count(), 1);
        target.remove_resize_listener(listener);
        assert_eq!(view.resize_listener_count(), 0);
    }

    #[test]
    fn shared_call_log_interleaves_target_and_scheduler() {
        let calls = CallLog::new();
        let mut target = HeadlessTarget::new(1.0, 1.0).with_call_log(calls.clone());
        let mut scheduler = ManualScheduler::new().with_call_log(calls.clone());
        let listener = target.add_resize_listener();
        let frame = scheduler.request_frame();
        scheduler.cancel_frame(frame);
        target.remove_resize_listener(listener);
        assert_eq!(
            calls.take(),
            vec![
                HostCall::AddResizeListener(listener),
                HostCall::RequestFrame(frame),
                HostCall::CancelFrame(frame),
                HostCall::RemoveResizeListener(listener),
            ]
        );
        assert!(calls.calls().is_empty());
    }

    #[test]
    fn busy_app_does_not_take_the_frame() {
        let app = RefCell::new(Vec::new());
        {
            let _busy = app.borrow();
            assert!(!deliver_frame(&app, FrameHandle(3), |frames, frame| frames.push(frame)));
        }
        assert!(deliver_frame(&app, FrameHandle(3), |frames, frame| frames.push(frame)));
        assert_eq!(app.into_inner(), vec![FrameHandle(3)]);
    }
}
