// src/input.rs

use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

#[derive(Default, Clone, Copy)]
pub struct KeyState {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub fast: bool,
}

impl KeyState {
    fn set(&mut self, code: KeyCode, down: bool) {
        match code {
            KeyCode::KeyW => self.forward = down,
            KeyCode::KeyS => self.back = down,
            KeyCode::KeyA => self.left = down,
            KeyCode::KeyD => self.right = down,
            KeyCode::Space => self.up = down,
            KeyCode::KeyC => self.down = down,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => self.fast = down,
            _ => {}
        }
    }
}

/// Aggregated winit input: key state plus raw mouse deltas. The cursor is
/// grabbed on click and released with Escape.
#[derive(Default)]
pub struct InputState {
    pub keys: KeyState,
    pub grabbed: bool,
    mouse_dx: f32,
    mouse_dy: f32,
}

impl InputState {
    pub fn on_device_event(&mut self, event: &DeviceEvent) {
        if !self.grabbed {
            return;
        }
        if let DeviceEvent::MouseMotion { delta } = event {
            self.mouse_dx += delta.0 as f32;
            self.mouse_dy += delta.1 as f32;
        }
    }

    pub fn on_window_event(&mut self, event: &WindowEvent, window: &Window) {
        match event {
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.grab(window, true);
            }

            WindowEvent::Focused(false) => {
                self.grab(window, false);
                self.keys = KeyState::default();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    ..
                } = event
                {
                    let down = *state == ElementState::Pressed;
                    if down && *code == KeyCode::Escape {
                        self.grab(window, false);
                    } else {
                        self.keys.set(*code, down);
                    }
                }
            }

            _ => {}
        }
    }

    fn grab(&mut self, window: &Window, on: bool) {
        self.grabbed = on;
        if on {
            let _ = window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
        }
        window.set_cursor_visible(!on);
    }

    pub fn take_mouse_delta(&mut self) -> (f32, f32) {
        let d = (self.mouse_dx, self.mouse_dy);
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        d
    }
}
