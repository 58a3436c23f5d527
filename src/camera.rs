// src/camera.rs

use glam::{DMat3, DVec3};

use crate::config;
use crate::input::InputState;
use crate::render::ViewPane;

/// Free-fly camera in scene units. Orientation is derived from yaw/pitch; the
/// renderer wants a row matrix mapping world vectors onto (right, down,
/// forward), so screen y grows downward.
pub struct Camera {
    pos: DVec3,
    yaw: f64,
    pitch: f64,
    speed: f64,
    mouse_sens: f64,
}

impl Camera {
    pub fn new(pos: DVec3) -> Self {
        Self {
            pos,
            yaw: 0.0,
            pitch: -0.2,
            speed: config::MOVE_SPEED,
            mouse_sens: config::MOUSE_SENS,
        }
    }

    pub fn position(&self) -> DVec3 {
        self.pos
    }

    fn basis(&self) -> (DVec3, DVec3, DVec3) {
        let forward = DVec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        )
        .normalize();
        let right = DVec3::Y.cross(forward).normalize();
        let down = right.cross(forward).normalize();
        (right, down, forward)
    }

    /// World-to-camera rotation: rows are (right, down, forward).
    pub fn orientation(&self) -> DMat3 {
        let (right, down, forward) = self.basis();
        DMat3::from_cols(right, down, forward).transpose()
    }

    /// Near-plane rectangle at z = 1 for the given output size.
    pub fn view_pane(&self, width: u32, height: u32) -> ViewPane {
        let half_y = (config::FOV_Y_DEG.to_radians() * 0.5).tan();
        let half_x = half_y * width as f64 / height as f64;
        ViewPane {
            left: -half_x,
            right: half_x,
            top: -half_y,
            bottom: half_y,
        }
    }

    pub fn integrate_input(&mut self, input: &mut InputState) {
        let (dx, dy) = input.take_mouse_delta();
        if input.grabbed {
            self.yaw += dx as f64 * self.mouse_sens;
            self.pitch = (self.pitch - dy as f64 * self.mouse_sens).clamp(-1.55, 1.55);
        }

        let (right, down, forward) = self.basis();
        let keys = input.keys;
        let mut vel = DVec3::ZERO;
        if keys.forward {
            vel += forward;
        }
        if keys.back {
            vel -= forward;
        }
        if keys.right {
            vel += right;
        }
        if keys.left {
            vel -= right;
        }
        if keys.up {
            vel -= down;
        }
        if keys.down {
            vel += down;
        }

        if vel.length_squared() > 0.0 {
            let boost = if keys.fast { 8.0 } else { 1.0 };
            self.pos += vel.normalize() * self.speed * boost;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_rows_are_orthonormal() {
        let mut cam = Camera::new(DVec3::ZERO);
        cam.yaw = 0.7;
        cam.pitch = 0.3;
        let m = cam.orientation();
        let t = m * m.transpose();
        for r in 0..3 {
            for c in 0..3 {
                let expect = if r == c { 1.0 } else { 0.0 };
                assert!((t.col(c)[r] - expect).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn default_yaw_looks_down_positive_z() {
        let mut cam = Camera::new(DVec3::ZERO);
        cam.pitch = 0.0;
        // Row 2 of the orientation is the forward axis; at zero yaw/pitch the
        // camera faces +z.
        let fwd = cam.orientation().transpose() * DVec3::Z;
        assert!((fwd - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn view_pane_is_centered_and_matches_aspect() {
        let cam = Camera::new(DVec3::ZERO);
        let v = cam.view_pane(200, 100);
        assert!(v.right > 0.0 && (v.left + v.right).abs() < 1e-12);
        assert!(v.bottom > 0.0 && (v.top + v.bottom).abs() < 1e-12);
        assert!((v.right / v.bottom - 2.0).abs() < 1e-12);
    }
}
