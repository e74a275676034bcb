use std::cell::Cell;

use glam::{Mat4, Vec2, Vec3, Vec4};

/// Pitch is clamped to `±PITCH_LIMIT` degrees so the basis stays defined
/// when looking straight up or down.
pub const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ProjectionMode {
    Perspective,
    Orthographic,
}

/// Orthographic view volume bounds.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrthoBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

/// Free camera described by a position and Euler angles in degrees.
///
/// Rotation is `(pitch, yaw, roll)`. Yaw 0 looks down +Z, positive yaw turns
/// toward +X, positive pitch looks down. Roll is stored but does not enter
/// the view matrix.
///
/// View and projection matrices are derived lazily: setters only mark them
/// dirty, reads recompute at most once per change. The cache uses `Cell`, so
/// reads take `&self`; the camera is not `Sync`.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    rotation: Vec3,

    mode: ProjectionMode,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    ortho: OrthoBounds,

    view: Cell<Mat4>,
    projection: Cell<Mat4>,
    view_dirty: Cell<bool>,
    projection_dirty: Cell<bool>,
    view_derivations: Cell<u64>,
    projection_derivations: Cell<u64>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// Perspective camera at `(0, 0, 5)`, 45° vertical field of view, 16:9,
    /// clip planes 0.1 to 1000.
    pub fn new() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Vec3::ZERO,
            mode: ProjectionMode::Perspective,
            fov_y: 45.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
            ortho: OrthoBounds {
                left: -1.0,
                right: 1.0,
                bottom: -1.0,
                top: 1.0,
            },
            view: Cell::new(Mat4::IDENTITY),
            projection: Cell::new(Mat4::IDENTITY),
            view_dirty: Cell::new(true),
            projection_dirty: Cell::new(true),
            view_derivations: Cell::new(0),
            projection_derivations: Cell::new(0),
        }
    }

    // ── pose ──────────────────────────────────────────────────────────────

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// `(pitch, yaw, roll)` in degrees.
    #[inline]
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.rotation.x
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.rotation.y
    }

    /// Non-finite positions are ignored.
    pub fn set_position(&mut self, position: Vec3) {
        if !position.is_finite() {
            return;
        }
        self.position = position;
        self.view_dirty.set(true);
    }

    /// Sets `(pitch, yaw, roll)`; pitch is clamped, yaw and roll wrap.
    pub fn set_rotation(&mut self, rotation: Vec3) {
        if !rotation.is_finite() {
            return;
        }
        self.rotation = rotation;
        self.normalize_rotation();
        self.view_dirty.set(true);
    }

    pub fn rotate(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.set_rotation(self.rotation + Vec3::new(pitch, yaw, roll));
    }

    pub fn rotate_pitch(&mut self, degrees: f32) {
        self.rotate(degrees, 0.0, 0.0);
    }

    pub fn rotate_yaw(&mut self, degrees: f32) {
        self.rotate(0.0, degrees, 0.0);
    }

    /// Mouse-look. `dy` is positive for upward motion, `dx` for rightward.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.rotate_pitch(-dy * sensitivity);
        self.rotate_yaw(dx * sensitivity);
    }

    /// Points the camera at `target`.
    ///
    /// Yaw and pitch are solved from the direction; roll is reset to zero, so
    /// `up` only matters for rejecting a direction parallel to it. A target
    /// equal to the position is ignored.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO || !forward.is_finite() {
            return;
        }
        if forward.cross(up.normalize_or_zero()).length_squared() < 1e-12 {
            log::debug!("look_at: direction parallel to up; pitch will be clamped");
        }

        let yaw = forward.x.atan2(forward.z).to_degrees();
        let pitch = (-forward.y).clamp(-1.0, 1.0).asin().to_degrees();
        self.set_rotation(Vec3::new(pitch, yaw, 0.0));
    }

    // ── basis ─────────────────────────────────────────────────────────────

    /// Unit view direction from the current angles.
    pub fn forward(&self) -> Vec3 {
        let (sp, cp) = self.rotation.x.to_radians().sin_cos();
        let (sy, cy) = self.rotation.y.to_radians().sin_cos();
        Vec3::new(sy * cp, -sp, cy * cp).normalize()
    }

    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.forward()).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.forward().cross(self.right()).normalize()
    }

    // ── movement ──────────────────────────────────────────────────────────

    /// Along the current view direction.
    pub fn move_forward(&mut self, distance: f32) {
        self.set_position(self.position + self.forward() * distance);
    }

    /// Along the current right vector.
    pub fn move_right(&mut self, distance: f32) {
        self.set_position(self.position + self.right() * distance);
    }

    /// Along world +Y, independent of orientation.
    pub fn move_up(&mut self, distance: f32) {
        self.set_position(self.position + Vec3::Y * distance);
    }

    // ── projection ────────────────────────────────────────────────────────

    #[inline]
    pub fn projection_mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Vertical field of view in degrees.
    #[inline]
    pub fn fov(&self) -> f32 {
        self.fov_y
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    #[inline]
    pub fn near_plane(&self) -> f32 {
        self.near
    }

    #[inline]
    pub fn far_plane(&self) -> f32 {
        self.far
    }

    #[inline]
    pub fn ortho_bounds(&self) -> OrthoBounds {
        self.ortho
    }

    /// Switches to perspective. Degenerate parameters are rejected with a
    /// warning and leave the camera unchanged.
    pub fn set_perspective(&mut self, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) {
        let valid = fov_y_degrees > 0.0
            && fov_y_degrees < 180.0
            && aspect > 0.0
            && near > 0.0
            && far > near
            && aspect.is_finite()
            && far.is_finite();
        if !valid {
            log::warn!(
                "ignoring perspective fov={fov_y_degrees} aspect={aspect} near={near} far={far}"
            );
            return;
        }
        self.mode = ProjectionMode::Perspective;
        self.fov_y = fov_y_degrees;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self.projection_dirty.set(true);
    }

    /// Switches to orthographic. Empty volumes are rejected with a warning.
    pub fn set_orthographic(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) {
        let valid = right != left && top != bottom && far != near;
        let finite = [left, right, bottom, top, near, far].iter().all(|v| v.is_finite());
        if !valid || !finite {
            log::warn!("ignoring empty orthographic volume");
            return;
        }
        self.mode = ProjectionMode::Orthographic;
        self.ortho = OrthoBounds { left, right, bottom, top };
        self.near = near;
        self.far = far;
        self.projection_dirty.set(true);
    }

    /// Updates the aspect ratio after a resize.
    ///
    /// Stored in either mode; only perspective projection uses it.
    pub fn update_aspect(&mut self, aspect: f32) {
        if !(aspect > 0.0 && aspect.is_finite()) {
            return;
        }
        self.aspect = aspect;
        if self.mode == ProjectionMode::Perspective {
            self.projection_dirty.set(true);
        }
    }

    // ── matrices ──────────────────────────────────────────────────────────

    /// Left-handed world-to-view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        if self.view_dirty.get() {
            let eye = self.position;
            self.view.set(Mat4::look_at_lh(eye, eye + self.forward(), Vec3::Y));
            self.view_dirty.set(false);
            self.view_derivations.set(self.view_derivations.get() + 1);
        }
        self.view.get()
    }

    /// Left-handed projection with depth mapped to `[0, 1]`.
    pub fn projection_matrix(&self) -> Mat4 {
        if self.projection_dirty.get() {
            let proj = match self.mode {
                ProjectionMode::Perspective => Mat4::perspective_lh(
                    self.fov_y.to_radians(),
                    self.aspect,
                    self.near,
                    self.far,
                ),
                ProjectionMode::Orthographic => Mat4::orthographic_lh(
                    self.ortho.left,
                    self.ortho.right,
                    self.ortho.bottom,
                    self.ortho.top,
                    self.near,
                    self.far,
                ),
            };
            self.projection.set(proj);
            self.projection_dirty.set(false);
            self.projection_derivations
                .set(self.projection_derivations.get() + 1);
        }
        self.projection.get()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// View matrix with the translation removed, for geometry at infinity.
    pub fn view_rotation_matrix(&self) -> Mat4 {
        let mut view = self.view_matrix();
        view.w_axis = Vec4::W;
        view
    }

    /// Times the view matrix has been recomputed.
    pub fn view_derivations(&self) -> u64 {
        self.view_derivations.get()
    }

    /// Times the projection matrix has been recomputed.
    pub fn projection_derivations(&self) -> u64 {
        self.projection_derivations.get()
    }

    /// Unprojects a pixel to world space.
    ///
    /// `screen` is in pixels with the origin at the top-left of a viewport of
    /// `viewport` pixels; `depth` is the normalized device depth (0 at the
    /// near plane, 1 at the far plane). Returns `None` for an empty viewport
    /// or a singular view-projection.
    pub fn screen_to_world_point(&self, screen: Vec2, depth: f32, viewport: Vec2) -> Option<Vec3> {
        if viewport.x <= 0.0 || viewport.y <= 0.0 {
            return None;
        }
        let ndc = Vec4::new(
            2.0 * screen.x / viewport.x - 1.0,
            1.0 - 2.0 * screen.y / viewport.y,
            depth,
            1.0,
        );
        let inverse = self.view_projection_matrix().inverse();
        if !inverse.is_finite() {
            return None;
        }
        let world = inverse * ndc;
        if world.w.abs() < f32::EPSILON {
            return None;
        }
        Some(world.truncate() / world.w)
    }

    fn normalize_rotation(&mut self) {
        self.rotation.x = self.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.rotation.y = wrap_degrees(self.rotation.y);
        self.rotation.z = wrap_degrees(self.rotation.z);
    }
}

/// Wraps an angle into `(-180, 180]`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn approx(a: Vec3, b: Vec3, eps: f32) -> bool {
        (a - b).abs().max_element() <= eps
    }

    /// Deterministic pseudo-random stream for mutation sequences.
    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self, range: f32) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (self.0 >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * range
        }
    }

    // ── angle invariants ──────────────────────────────────────────────────

    #[test]
    fn wrap_degrees_range() {
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(720.0), 0.0);
    }

    #[test]
    fn angles_stay_in_range_under_random_mutation() {
        let mut rng = Lcg(7);
        let mut cam = Camera::new();
        for step in 0..5000 {
            match step % 6 {
                0 => cam.rotate_pitch(rng.next_f32(400.0)),
                1 => cam.rotate_yaw(rng.next_f32(1000.0)),
                2 => cam.rotate(rng.next_f32(90.0), rng.next_f32(90.0), rng.next_f32(90.0)),
                3 => cam.set_rotation(Vec3::new(
                    rng.next_f32(10_000.0),
                    rng.next_f32(10_000.0),
                    0.0,
                )),
                4 => cam.process_mouse_movement(rng.next_f32(500.0), rng.next_f32(500.0), 0.1),
                _ => cam.look_at(
                    Vec3::new(rng.next_f32(50.0), rng.next_f32(50.0), rng.next_f32(50.0)),
                    Vec3::Y,
                ),
            }
            let r = cam.rotation();
            assert!((-PITCH_LIMIT..=PITCH_LIMIT).contains(&r.x), "pitch {} at step {step}", r.x);
            assert!(r.y > -180.0 && r.y <= 180.0, "yaw {} at step {step}", r.y);
        }
    }

    #[test]
    fn pitch_clamps_at_limit() {
        let mut cam = Camera::new();
        cam.rotate_pitch(120.0);
        assert_eq!(cam.pitch(), PITCH_LIMIT);
        cam.rotate_pitch(-500.0);
        assert_eq!(cam.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn non_finite_input_ignored() {
        let mut cam = Camera::new();
        cam.set_rotation(Vec3::new(f32::NAN, 0.0, 0.0));
        cam.set_position(Vec3::new(f32::INFINITY, 0.0, 0.0));
        assert_eq!(cam.rotation(), Vec3::ZERO);
        assert_eq!(cam.position(), Vec3::new(0.0, 0.0, 5.0));
    }

    // ── lazy derivation ───────────────────────────────────────────────────

    #[test]
    fn view_read_is_idempotent() {
        let cam = Camera::new();
        let a = cam.view_matrix();
        let b = cam.view_matrix();
        assert_eq!(a.to_cols_array(), b.to_cols_array());
        assert_eq!(cam.view_derivations(), 1);
    }

    #[test]
    fn mutation_triggers_one_rederivation() {
        let mut cam = Camera::new();
        cam.view_matrix();
        cam.move_forward(1.0);
        cam.move_right(1.0);
        cam.view_matrix();
        cam.view_matrix();
        assert_eq!(cam.view_derivations(), 2);
    }

    #[test]
    fn projection_and_view_dirty_independently() {
        let mut cam = Camera::new();
        cam.view_projection_matrix();
        cam.update_aspect(1.0);
        cam.view_projection_matrix();
        assert_eq!(cam.view_derivations(), 1);
        assert_eq!(cam.projection_derivations(), 2);
    }

    // ── basis & look_at ───────────────────────────────────────────────────

    #[test]
    fn identity_basis() {
        let cam = Camera::new();
        assert!(approx(cam.forward(), Vec3::Z, EPS));
        assert!(approx(cam.right(), Vec3::X, EPS));
        assert!(approx(cam.up(), Vec3::Y, EPS));
    }

    #[test]
    fn look_at_forward_matches_direction() {
        let mut cam = Camera::new();
        let p = Vec3::new(1.0, 2.0, 3.0);
        let target = Vec3::new(-4.0, 0.5, 7.0);
        cam.set_position(p);
        cam.look_at(target, Vec3::new(1.0, 0.0, 0.0));
        assert!(approx(cam.forward(), (target - p).normalize(), EPS));
        assert!((cam.forward().length() - 1.0).abs() < EPS);
        assert_eq!(cam.rotation().z, 0.0);
    }

    #[test]
    fn look_at_same_point_is_ignored() {
        let mut cam = Camera::new();
        cam.set_rotation(Vec3::new(10.0, 20.0, 0.0));
        cam.look_at(cam.position(), Vec3::Y);
        assert_eq!(cam.rotation(), Vec3::new(10.0, 20.0, 0.0));
    }

    #[test]
    fn view_maps_forward_to_positive_z() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::new(3.0, 1.0, -2.0));
        cam.set_rotation(Vec3::new(20.0, -35.0, 0.0));
        let v = cam.view_matrix();
        assert!(approx(v.transform_point3(cam.position()), Vec3::ZERO, 1e-4));
        let ahead = v.transform_point3(cam.position() + cam.forward());
        assert!(approx(ahead, Vec3::Z, 1e-4));
    }

    // ── movement ──────────────────────────────────────────────────────────

    #[test]
    fn move_up_uses_world_up_even_when_pitched() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::ZERO);
        cam.set_rotation(Vec3::new(45.0, 30.0, 0.0));
        cam.move_up(2.0);
        assert!(approx(cam.position(), Vec3::new(0.0, 2.0, 0.0), EPS));
    }

    #[test]
    fn move_forward_follows_view_direction() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::ZERO);
        cam.set_rotation(Vec3::new(0.0, 90.0, 0.0));
        cam.move_forward(1.0);
        assert!(approx(cam.position(), Vec3::X, EPS));
        cam.move_right(1.0);
        assert!(approx(cam.position(), Vec3::new(1.0, 0.0, -1.0), EPS));
    }

    // ── projection ────────────────────────────────────────────────────────

    #[test]
    fn degenerate_perspective_rejected() {
        let mut cam = Camera::new();
        cam.set_perspective(60.0, 1.0, 10.0, 1.0);
        assert_eq!(cam.fov(), 45.0);
        assert_eq!(cam.far_plane(), 1000.0);
    }

    #[test]
    fn orthographic_switch() {
        let mut cam = Camera::new();
        cam.set_orthographic(-2.0, 2.0, -1.0, 1.0, 0.1, 10.0);
        assert_eq!(cam.projection_mode(), ProjectionMode::Orthographic);
        let p = cam.projection_matrix();
        assert!(approx(p.transform_point3(Vec3::new(2.0, 1.0, 0.1)), Vec3::new(1.0, 1.0, 0.0), EPS));
    }

    #[test]
    fn unproject_inverts_project() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::new(0.0, 1.0, -6.0));
        cam.look_at(Vec3::ZERO, Vec3::Y);
        let viewport = Vec2::new(800.0, 600.0);
        let world = Vec3::new(0.3, -0.2, 0.5);

        let clip = cam.view_projection_matrix() * world.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        let screen = Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.x,
            (1.0 - ndc.y) * 0.5 * viewport.y,
        );

        let back = cam.screen_to_world_point(screen, ndc.z, viewport).unwrap();
        assert!(approx(back, world, 1e-3));
    }

    #[test]
    fn view_rotation_has_no_translation() {
        let mut cam = Camera::new();
        cam.set_position(Vec3::new(10.0, -4.0, 3.0));
        let v = cam.view_rotation_matrix();
        assert_eq!(v.w_axis, Vec4::W);
    }
}
