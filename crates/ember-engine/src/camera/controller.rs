use super::view::Camera;

/// Movement keys held during a frame.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct MovementInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// First-person fly controller.
///
/// Holds no camera reference; the caller passes the camera it drives.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FpsCameraController {
    /// World units per second.
    pub movement_speed: f32,
    /// Degrees per pixel of mouse motion.
    pub mouse_sensitivity: f32,
}

impl Default for FpsCameraController {
    fn default() -> Self {
        Self {
            movement_speed: 5.0,
            mouse_sensitivity: 0.1,
        }
    }
}

impl FpsCameraController {
    pub fn new(movement_speed: f32, mouse_sensitivity: f32) -> Self {
        Self {
            movement_speed,
            mouse_sensitivity,
        }
    }

    /// Moves `camera` for `dt` seconds of held keys.
    ///
    /// Up and down follow the world axis, the rest follow the view.
    pub fn process_keyboard(&self, camera: &mut Camera, input: MovementInput, dt: f32) {
        let step = self.movement_speed * dt;
        if input.forward {
            camera.move_forward(step);
        }
        if input.backward {
            camera.move_forward(-step);
        }
        if input.right {
            camera.move_right(step);
        }
        if input.left {
            camera.move_right(-step);
        }
        if input.up {
            camera.move_up(step);
        }
        if input.down {
            camera.move_up(-step);
        }
    }

    pub fn process_mouse_movement(&self, camera: &mut Camera, dx: f32, dy: f32) {
        camera.process_mouse_movement(dx, dy, self.mouse_sensitivity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn opposite_keys_cancel() {
        let mut cam = Camera::new();
        let start = cam.position();
        let input = MovementInput {
            forward: true,
            backward: true,
            left: true,
            right: true,
            ..Default::default()
        };
        FpsCameraController::default().process_keyboard(&mut cam, input, 0.5);
        assert!((cam.position() - start).length() < 1e-5);
    }

    #[test]
    fn forward_speed_scales_with_dt() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::ZERO);
        let input = MovementInput { forward: true, ..Default::default() };
        FpsCameraController::default().process_keyboard(&mut cam, input, 0.2);
        // 5 units/s for 0.2 s along +Z
        assert!((cam.position() - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn mouse_up_pitches_up() {
        let mut cam = Camera::new();
        FpsCameraController::default().process_mouse_movement(&mut cam, 0.0, 100.0);
        // positive dy is upward motion; looking up is negative pitch
        assert!((cam.pitch() + 10.0).abs() < 1e-5);
    }
}
