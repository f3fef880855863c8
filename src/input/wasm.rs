use std::sync::Arc;

use anyhow::{anyhow, Result};
use glam::Vec2;
use gloo_events::{EventListener, EventListenerOptions};
use wasm_bindgen::JsCast;
use web_sys::{window, HtmlElement, KeyboardEvent, MouseEvent, WheelEvent};

use super::{InputState, KeyCode, MouseButton};

/// Handles DOM input events and updates the shared [`InputState`]. Listeners
/// are removed when the handler is dropped.
pub struct WasmInputHandler {
    listeners: Vec<EventListener>,
}

impl WasmInputHandler {
    /// Keys are captured on the whole document; pointer events on `element`.
    /// `on_key` runs for every key press.
    pub fn attach(
        element: &HtmlElement,
        input: Arc<InputState>,
        on_key: impl Fn(KeyCode) + 'static,
    ) -> Result<Self> {
        let document = window()
            .and_then(|window| window.document())
            .ok_or_else(|| anyhow!("document not available"))?;

        let mut listeners = Vec::new();

        listeners.push(EventListener::new(&document, "keydown", move |event| {
            let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
                return;
            };
            if event.repeat() {
                return;
            }
            if let Some(code) = KeyCode::from_name(&event.key()) {
                on_key(code);
            }
        }));

        {
            let input_state = Arc::clone(&input);
            listeners.push(EventListener::new(element, "mousedown", move |event| {
                if let Some(event) = event.dyn_ref::<MouseEvent>() {
                    input_state.set_mouse_position(offset(event));
                    input_state.set_mouse_button_down(MouseButton::new(event.button() as u8));
                }
            }));
        }

        {
            let input_state = Arc::clone(&input);
            listeners.push(EventListener::new(&document, "mouseup", move |event| {
                if let Some(event) = event.dyn_ref::<MouseEvent>() {
                    input_state.set_mouse_button_up(MouseButton::new(event.button() as u8));
                }
            }));
        }

        {
            let input_state = Arc::clone(&input);
            listeners.push(EventListener::new(element, "mousemove", move |event| {
                if let Some(event) = event.dyn_ref::<MouseEvent>() {
                    input_state.set_mouse_position(offset(event));
                }
            }));
        }

        {
            let input_state = Arc::clone(&input);
            listeners.push(EventListener::new_with_options(
                element,
                "wheel",
                EventListenerOptions::enable_prevent_default(),
                move |event| {
                    if let Some(event) = event.dyn_ref::<WheelEvent>() {
                        event.prevent_default();
                        input_state.add_wheel(event.delta_y() as f32);
                    }
                },
            ));
        }

        Ok(Self { listeners })
    }
}

impl Drop for WasmInputHandler {
    fn drop(&mut self) {
        self.listeners.clear();
    }
}

fn offset(event: &MouseEvent) -> Vec2 {
    Vec2::new(event.offset_x() as f32, event.offset_y() as f32)
}
