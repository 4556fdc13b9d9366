//! Per-frame pointer input
//!
//! The application loop owns one [`InputState`], feeds it platform events
//! and calls [`InputState::end_frame`] after the frame has consumed the
//! delta.

use glam::Vec2;

/// Cursor and button state.
///
/// Cursor positions are stored with the y axis pointing up, measured from
/// the bottom of the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputState {
    cursor: Vec2,
    previous_cursor: Vec2,
    button_held: bool,
    viewport_height: f32,
}

impl InputState {
    pub fn new(viewport_height: u32) -> Self {
        Self {
            viewport_height: viewport_height as f32,
            ..Default::default()
        }
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height as f32;
    }

    /// Cursor moved to window coordinates `(x, y)`, y pointing down.
    pub fn on_cursor_moved(&mut self, x: f32, y: f32) {
        self.cursor = Vec2::new(x, self.viewport_height - y);
    }

    pub fn on_mouse_button(&mut self, pressed: bool) {
        self.button_held = pressed;
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    pub fn is_button_held(&self) -> bool {
        self.button_held
    }

    /// Cursor movement since the last [`InputState::end_frame`].
    pub fn delta(&self) -> Vec2 {
        self.cursor - self.previous_cursor
    }

    /// Movement while the button is held, or zero.
    pub fn drag_delta(&self) -> Vec2 {
        if self.button_held {
            self.delta()
        } else {
            Vec2::ZERO
        }
    }

    pub fn end_frame(&mut self) {
        self.previous_cursor = self.cursor;
    }
}
