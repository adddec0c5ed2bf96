//! Window input translated for the render loop.
//!
//! [`PointerInput`] folds mouse and touch events into a single pointer: a
//! press starts a gesture, moves while pressed become
//! [`PointerEvent::Moved`], and releasing ends it. Moves with no button held
//! are tracked but not forwarded, so scenes only see drags.
//!
//! Keys are mapped to [`InputAction`]s by [`key_action`]:
//!
//! | Key | Action |
//! |-----|--------|
//! | `1` / `2` / `3` | select Parallax / PixelLighting / CellularSand |
//! | `R` | reload shaders |
//! | `Escape` | quit |

use glam::Vec2;
use winit::event::{ElementState, MouseButton, Touch, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::render_loop::PointerEvent;
use crate::scene::SceneId;

/// Something the host should do in response to input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    Pointer(PointerEvent),
    SelectScene(SceneId),
    ReloadShaders,
    Quit,
}

/// Host key bindings.
pub fn key_action(key: KeyCode) -> Option<InputAction> {
    match key {
        KeyCode::Digit1 | KeyCode::Numpad1 => Some(InputAction::SelectScene(SceneId::Parallax)),
        KeyCode::Digit2 | KeyCode::Numpad2 => Some(InputAction::SelectScene(SceneId::PixelLighting)),
        KeyCode::Digit3 | KeyCode::Numpad3 => Some(InputAction::SelectScene(SceneId::CellularSand)),
        KeyCode::KeyR => Some(InputAction::ReloadShaders),
        KeyCode::Escape => Some(InputAction::Quit),
        _ => None,
    }
}

/// Single-pointer state shared by mouse and touch.
#[derive(Debug, Default)]
pub struct PointerInput {
    held: bool,
    position: Vec2,
    /// Finger driving the gesture. Other fingers are ignored.
    touch: Option<u64>,
}

impl PointerInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate a winit event. Returns `None` for events with no effect.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<InputAction> {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return None;
                }
                match event.physical_key {
                    PhysicalKey::Code(code) => key_action(code),
                    PhysicalKey::Unidentified(_) => None,
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.press(),
                ElementState::Released => self.release(),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.move_to(Vec2::new(position.x as f32, position.y as f32))
            }
            WindowEvent::CursorLeft { .. } => self.release(),
            WindowEvent::Touch(touch) => self.touch(touch),
            _ => None,
        }
    }

    fn touch(&mut self, touch: &Touch) -> Option<InputAction> {
        let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
        match touch.phase {
            TouchPhase::Started if self.touch.is_none() => {
                self.touch = Some(touch.id);
                self.position = position;
                self.press()
            }
            TouchPhase::Moved if self.touch == Some(touch.id) => self.move_to(position),
            TouchPhase::Ended | TouchPhase::Cancelled if self.touch == Some(touch.id) => {
                self.touch = None;
                self.release()
            }
            _ => None,
        }
    }

    /// Begin a gesture at the current position.
    pub fn press(&mut self) -> Option<InputAction> {
        self.held = true;
        Some(InputAction::Pointer(PointerEvent::Moved(self.position)))
    }

    pub fn move_to(&mut self, position: Vec2) -> Option<InputAction> {
        self.position = position;
        self.held
            .then_some(InputAction::Pointer(PointerEvent::Moved(position)))
    }

    /// End the gesture. Releasing with nothing held is ignored.
    pub fn release(&mut self) -> Option<InputAction> {
        if !self.held {
            return None;
        }
        self.held = false;
        Some(InputAction::Pointer(PointerEvent::Released))
    }
}
