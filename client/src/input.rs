//! Key sampling with edge detection for the pause toggle

use macroquad::prelude::*;

/// The key state relevant to one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    pub up: bool,
    pub down: bool,
    /// True on the frame the pause key was pressed (edge, not level).
    pub pause_toggled: bool,
}

/// Samples movement keys each frame and turns the pause key into a press
/// event rather than a held state.
pub struct InputManager {
    prev_key_p: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self { prev_key_p: false }
    }

    pub fn update(&mut self) -> FrameInput {
        // Support both WASD and arrow keys
        let up = is_key_down(KeyCode::W) || is_key_down(KeyCode::Up);
        let down = is_key_down(KeyCode::S) || is_key_down(KeyCode::Down);

        let key_p = is_key_down(KeyCode::P);
        let pause_toggled = key_p && !self.prev_key_p;
        self.prev_key_p = key_p;

        FrameInput {
            up,
            down,
            pause_toggled,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
