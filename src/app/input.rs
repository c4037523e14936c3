use crate::render::MoveIntent;
use winit::keyboard::{KeyCode, PhysicalKey};

/// One-shot actions triggered by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Jump,
}

/// Movement keys held in Preview mode. WASD and the arrow keys are aliases.
#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub move_forward: bool,
    pub move_backward: bool,
    pub move_left: bool,
    pub move_right: bool,
}

impl InputState {
    pub fn handle_key(&mut self, key: PhysicalKey, pressed: bool) -> Option<InputAction> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        match code {
            KeyCode::KeyW | KeyCode::ArrowUp => self.move_forward = pressed,
            KeyCode::KeyS | KeyCode::ArrowDown => self.move_backward = pressed,
            KeyCode::KeyA | KeyCode::ArrowLeft => self.move_left = pressed,
            KeyCode::KeyD | KeyCode::ArrowRight => self.move_right = pressed,
            KeyCode::Space if pressed => return Some(InputAction::Jump),
            _ => {}
        }
        None
    }

    pub fn intent(&self) -> MoveIntent {
        MoveIntent {
            forward: self.move_forward,
            backward: self.move_backward,
            left: self.move_left,
            right: self.move_right,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
