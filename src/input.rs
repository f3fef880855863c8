use std::collections::HashSet;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::CATALOG;
use crate::viewer::ViewerCommand;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) if ch.is_ascii_alphabetic() => {
                Some(Self::Character(ch.to_ascii_uppercase()))
            }
            (Some(ch), None) if ch.is_ascii_digit() => Some(Self::Digit(ch as u8 - b'0')),
            _ => None,
        }
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" | " " => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" | "ArrowLeft" => Left,
        "Right" | "ArrowRight" => Right,
        "Up" | "ArrowUp" => Up,
        "Down" | "ArrowDown" => Down,
        "Escape" | "Esc" => Escape,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Viewer shortcut bound to `key`, if any.
///
/// Digits select catalog entries in order, arrows cycle through them, `W`
/// toggles wireframe and `R` or Space toggles rotation.
pub fn viewer_command_for_key(key: KeyCode) -> Option<ViewerCommand> {
    match key {
        KeyCode::Digit(digit @ 1..=9) => CATALOG
            .get(digit as usize - 1)
            .map(|descriptor| ViewerCommand::SelectShape(descriptor.key.to_string())),
        KeyCode::Named(NamedKey::Left) => Some(ViewerCommand::PreviousShape),
        KeyCode::Named(NamedKey::Right) => Some(ViewerCommand::NextShape),
        KeyCode::Character('W') => Some(ViewerCommand::ToggleWireframe),
        KeyCode::Character('R') | KeyCode::Named(NamedKey::Space) => {
            Some(ViewerCommand::ToggleAutoRotate)
        }
        _ => None,
    }
}

/// Pointer and keyboard snapshot shared between event handlers and the frame
/// loop. Drag and wheel motion accumulate until taken.
#[derive(Debug, Default)]
pub struct InputState {
    mouse_buttons: RwLock<HashSet<MouseButton>>,
    mouse_position: RwLock<Option<Vec2>>,
    drag: RwLock<Vec2>,
    wheel: RwLock<f32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mouse_button_down(&self, button: MouseButton) {
        self.mouse_buttons.write().insert(button);
    }

    pub fn set_mouse_button_up(&self, button: MouseButton) {
        self.mouse_buttons.write().remove(&button);
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.read().contains(&button)
    }

    /// Records the pointer position; movement while the left button is held
    /// counts as a drag.
    pub fn set_mouse_position(&self, position: Vec2) {
        let previous = self.mouse_position.write().replace(position);
        if let Some(previous) = previous {
            if self.is_mouse_button_down(MouseButton::LEFT) {
                *self.drag.write() += position - previous;
            }
        }
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        *self.mouse_position.read()
    }

    pub fn add_wheel(&self, delta_y: f32) {
        *self.wheel.write() += delta_y;
    }

    pub fn take_drag(&self) -> Vec2 {
        std::mem::take(&mut *self.drag.write())
    }

    pub fn take_wheel(&self) -> f32 {
        std::mem::take(&mut *self.wheel.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_and_character_keys() {
        assert_eq!(
            KeyCode::from_name("Space"),
            Some(KeyCode::Named(NamedKey::Space))
        );
        assert_eq!(
            KeyCode::from_name("ArrowLeft"),
            Some(KeyCode::Named(NamedKey::Left))
        );
        assert_eq!(KeyCode::from_name("w"), Some(KeyCode::Character('W')));
        assert_eq!(KeyCode::from_name("3"), Some(KeyCode::Digit(3)));
        assert_eq!(KeyCode::from_name("F12"), None);
    }

    #[test]
    fn digits_select_catalog_entries() {
        assert_eq!(
            viewer_command_for_key(KeyCode::Digit(1)),
            Some(ViewerCommand::SelectShape("box".into()))
        );
        assert_eq!(
            viewer_command_for_key(KeyCode::Digit(8)),
            Some(ViewerCommand::SelectShape("dodecahedron".into()))
        );
        assert_eq!(viewer_command_for_key(KeyCode::Digit(9)), None);
        assert_eq!(viewer_command_for_key(KeyCode::Digit(0)), None);
    }

    #[test]
    fn toggles_are_bound() {
        assert_eq!(
            viewer_command_for_key(KeyCode::Character('W')),
            Some(ViewerCommand::ToggleWireframe)
        );
        assert_eq!(
            viewer_command_for_key(KeyCode::Named(NamedKey::Space)),
            Some(ViewerCommand::ToggleAutoRotate)
        );
        assert_eq!(
            viewer_command_for_key(KeyCode::Named(NamedKey::Right)),
            Some(ViewerCommand::NextShape)
        );
    }

    #[test]
    fn drag_accumulates_only_while_pressed() {
        let state = InputState::new();
        state.set_mouse_position(Vec2::new(10.0, 10.0));
        state.set_mouse_position(Vec2::new(20.0, 10.0));
        assert_eq!(state.take_drag(), Vec2::ZERO);

        state.set_mouse_button_down(MouseButton::LEFT);
        state.set_mouse_position(Vec2::new(25.0, 14.0));
        state.set_mouse_position(Vec2::new(30.0, 18.0));
        assert_eq!(state.take_drag(), Vec2::new(10.0, 8.0));
        assert_eq!(state.take_drag(), Vec2::ZERO);
    }

    #[test]
    fn wheel_accumulates_until_taken() {
        let state = InputState::new();
        state.add_wheel(-3.0);
        state.add_wheel(-2.0);
        assert_eq!(state.take_wheel(), -5.0);
        assert_eq!(state.take_wheel(), 0.0);
    }
}
