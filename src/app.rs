//! Native host ports backed by a winit window.

use std::sync::Arc;

use parking_lot::Mutex;
use winit::event::MouseButton as WinitMouseButton;
use winit::keyboard::KeyCode as WinitKey;
use winit::window::Window;

use crate::host::{CanvasId, FrameHandle, FrameScheduler, ListenerId, RenderTarget};
use crate::input::{KeyCode, MouseButton, NamedKey};

#[derive(Debug, Default)]
struct Attachments {
    canvases: Vec<CanvasId>,
    listeners: Vec<ListenerId>,
    next_listener: u64,
}

/// The window acts as the mount element. Its surface is the only canvas, so
/// attachment is bookkeeping; resize notifications arrive as winit events.
#[derive(Debug, Clone)]
pub struct WindowTarget {
    window: Arc<Window>,
    attachments: Arc<Mutex<Attachments>>,
}

impl WindowTarget {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            attachments: Arc::default(),
        }
    }
}

impl RenderTarget for WindowTarget {
    fn bounding_size(&self) -> (f32, f32) {
        let size = self.window.inner_size();
        (size.width as f32, size.height as f32)
    }

    fn append_canvas(&mut self, canvas: CanvasId) {
        let mut attachments = self.attachments.lock();
        if !attachments.canvases.contains(&canvas) {
            attachments.canvases.push(canvas);
        }
    }

    fn remove_canvas(&mut self, canvas: CanvasId) {
        self.attachments
            .lock()
            .canvases
            .retain(|attached| *attached != canvas);
    }

    fn contains_canvas(&self, canvas: CanvasId) -> bool {
        self.attachments.lock().canvases.contains(&canvas)
    }

    fn add_resize_listener(&mut self) -> ListenerId {
        let mut attachments = self.attachments.lock();
        attachments.next_listener += 1;
        let listener = ListenerId(attachments.next_listener);
        attachments.listeners.push(listener);
        listener
    }

    fn remove_resize_listener(&mut self, listener: ListenerId) {
        self.attachments
            .lock()
            .listeners
            .retain(|id| *id != listener);
    }
}

#[derive(Debug, Default)]
struct RedrawState {
    next: u64,
    pending: Option<FrameHandle>,
}

/// Maps frame requests onto `Window::request_redraw`. The event loop calls
/// [`RedrawScheduler::fire`] on `RedrawRequested` to obtain the handle to run.
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    window: Arc<Window>,
    state: Arc<Mutex<RedrawState>>,
}

impl RedrawScheduler {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            state: Arc::default(),
        }
    }

    pub fn fire(&self) -> Option<FrameHandle> {
        self.state.lock().pending.take()
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = {
            let mut state = self.state.lock();
            state.next += 1;
            let handle = FrameHandle(state.next);
            state.pending = Some(handle);
            handle
        };
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut state = self.state.lock();
        if state.pending == Some(handle) {
            state.pending = None;
        }
    }
}

pub fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    Some(match code {
        WinitKey::Space => KeyCode::Named(NamedKey::Space),
        WinitKey::Enter => KeyCode::Named(NamedKey::Enter),
        WinitKey::Tab => KeyCode::Named(NamedKey::Tab),
        WinitKey::ArrowLeft => KeyCode::Named(NamedKey::Left),
        WinitKey::ArrowRight => KeyCode::Named(NamedKey::Right),
        WinitKey::ArrowUp => KeyCode::Named(NamedKey::Up),
        WinitKey::ArrowDown => KeyCode::Named(NamedKey::Down),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKey::Digit0 | WinitKey::Numpad0 => KeyCode::Digit(0),
        WinitKey::Digit1 | WinitKey::Numpad1 => KeyCode::Digit(1),
        WinitKey::Digit2 | WinitKey::Numpad2 => KeyCode::Digit(2),
        WinitKey::Digit3 | WinitKey::Numpad3 => KeyCode::Digit(3),
        WinitKey::Digit4 | WinitKey::Numpad4 => KeyCode::Digit(4),
        WinitKey::Digit5 | WinitKey::Numpad5 => KeyCode::Digit(5),
        WinitKey::Digit6 | WinitKey::Numpad6 => KeyCode::Digit(6),
        WinitKey::Digit7 | WinitKey::Numpad7 => KeyCode::Digit(7),
        WinitKey::Digit8 | WinitKey::Numpad8 => KeyCode::Digit(8),
        WinitKey::Digit9 | WinitKey::Numpad9 => KeyCode::Digit(9),
        WinitKey::KeyR => KeyCode::Character('R'),
        WinitKey::KeyW => KeyCode::Character('W'),
        _ => return None,
    })
}

pub fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    let index = match button {
        WinitMouseButton::Left => 0,
        WinitMouseButton::Right => 1,
        WinitMouseButton::Middle => 2,
        WinitMouseButton::Back => 3,
        WinitMouseButton::Forward => 4,
        WinitMouseButton::Other(value) => value.min(u8::MAX as u16) as u8,
    };
    MouseButton::new(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::viewer_command_for_key;
    use crate::viewer::ViewerCommand;

    #[test]
    fn digit_row_and_numpad_map_alike() {
        assert_eq!(map_keycode(WinitKey::Digit4), Some(KeyCode::Digit(4)));
        assert_eq!(map_keycode(WinitKey::Numpad4), Some(KeyCode::Digit(4)));
        assert_eq!(map_keycode(WinitKey::F1), None);
    }

    #[test]
    fn winit_keys_reach_viewer_commands() {
        let command = map_keycode(WinitKey::KeyW).and_then(viewer_command_for_key);
        assert_eq!(command, Some(ViewerCommand::ToggleWireframe));
        let command = map_keycode(WinitKey::ArrowLeft).and_then(viewer_command_for_key);
        assert_eq!(command, Some(ViewerCommand::PreviousShape));
    }

    #[test]
    fn mouse_buttons_are_indexed_from_left() {
        assert_eq!(map_mouse_button(WinitMouseButton::Left), MouseButton::LEFT);
        assert_eq!(map_mouse_button(WinitMouseButton::Middle).index(), 2);
    }
}
