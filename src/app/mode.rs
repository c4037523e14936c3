//! Edit/Preview mode and the input handlers each mode owns.

use crate::app::input::{InputAction, InputState};
use crate::render::{CameraPose, FlyCamera, OrbitCamera};
use winit::keyboard::PhysicalKey;

/// Pointer travel, in pixels, below which a press and release counts as a click.
const CLICK_SLOP_PX: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum EditorMode {
    #[default]
    Edit,
    Preview,
}

#[derive(Debug, thiserror::Error)]
pub enum ModeError {
    #[error("preview mode needs at least one object in the scene")]
    EmptyScene,
}

#[derive(Debug, Clone, Copy, Default)]
struct PointerDrag {
    last: (f64, f64),
    travelled: f64,
    panning: bool,
}

/// Owns both cameras and routes input to the one the active mode uses.
#[derive(Debug)]
pub struct ModeController {
    mode: EditorMode,
    orbit: OrbitCamera,
    fly: FlyCamera,
    input: InputState,
    drag: Option<PointerDrag>,
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeController {
    pub fn new() -> Self {
        let mut controller = Self {
            mode: EditorMode::Edit,
            orbit: OrbitCamera::default(),
            fly: FlyCamera::default(),
            input: InputState::default(),
            drag: None,
        };
        controller.orbit.reset_for_edit();
        controller
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn orbit(&self) -> &OrbitCamera {
        &self.orbit
    }

    pub fn fly(&self) -> &FlyCamera {
        &self.fly
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Switches mode and puts the mode's camera at its canonical pose.
    /// Re-entering the current mode resets as well.
    pub fn set_mode(&mut self, mode: EditorMode, scene_is_empty: bool) -> Result<(), ModeError> {
        if mode == EditorMode::Preview && scene_is_empty {
            return Err(ModeError::EmptyScene);
        }
        self.mode = mode;
        self.input.clear();
        self.drag = None;
        match mode {
            EditorMode::Edit => self.orbit.reset_for_edit(),
            EditorMode::Preview => self.fly.reset(),
        }
        log::info!("Switched to {:?} mode", mode);
        Ok(())
    }

    pub fn pose(&self) -> CameraPose {
        match self.mode {
            EditorMode::Edit => self.orbit.pose(),
            EditorMode::Preview => self.fly.pose(),
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64, shift: bool) {
        self.drag = Some(PointerDrag {
            last: (x, y),
            travelled: 0.0,
            panning: shift && self.mode == EditorMode::Edit,
        });
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        let dx = x - drag.last.0;
        let dy = y - drag.last.1;
        drag.last = (x, y);
        drag.travelled += dx.abs() + dy.abs();
        match self.mode {
            EditorMode::Edit if drag.panning => self.orbit.pan(dx, dy),
            EditorMode::Edit => self.orbit.orbit(dx, dy),
            EditorMode::Preview => self.fly.look(dx, dy),
        }
    }

    /// Ends a drag. Returns the release point when it was a click in Edit mode.
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let drag = self.drag.take()?;
        let is_click = drag.travelled < CLICK_SLOP_PX;
        (is_click && self.mode == EditorMode::Edit).then_some((x, y))
    }

    /// Wheel zoom, Edit mode only.
    pub fn wheel(&mut self, delta_y: f64) {
        if self.mode == EditorMode::Edit {
            self.orbit.zoom(delta_y);
        }
    }

    /// Movement keys, Preview mode only.
    pub fn key(&mut self, key: PhysicalKey, pressed: bool) {
        if self.mode != EditorMode::Preview {
            return;
        }
        if let Some(InputAction::Jump) = self.input.handle_key(key, pressed) {
            self.fly.jump();
        }
    }

    pub fn step(&mut self, dt: f64) {
        if self.mode == EditorMode::Preview {
            let intent = self.input.intent();
            self.fly.integrate(&intent, dt);
        }
    }
}
