use crate::physics::{nonzero, Vec2};

/// Half-width of the camera plane for a facing vector of unit length,
/// giving roughly a 66 degree field of view.
pub const PLANE_LEN: f64 = 0.66;

/// Player eye: position plus the direction / camera-plane basis.
/// `dir` and `plane` stay orthogonal because they are only ever rotated
/// together.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub pos: Vec2,
    pub dir: Vec2,
    pub plane: Vec2,
}

impl Camera {
    /// Camera at `pos` looking along the unit vector `dir`.
    pub fn new(pos: Vec2, dir: Vec2) -> Self {
        // plane points to the screen's right edge: dir rotated +90 degrees
        let plane = Vec2::new(-dir.y, dir.x).scale(PLANE_LEN);
        Self { pos, dir, plane }
    }

    pub fn rotate(&mut self, angle: f64) {
        self.dir = self.dir.rotate(angle);
        self.plane = self.plane.rotate(angle);
    }

    /// Ray direction through screen column `col` of `width`.
    #[inline(always)]
    pub fn ray_dir(&self, col: u32, width: u32) -> Vec2 {
        let camera_x = 2.0 * col as f64 / width as f64 - 1.0;
        self.dir.add(&self.plane.scale(camera_x))
    }

    /// World position to camera space `(lateral, depth)` through the inverse
    /// of the `[plane dir]` matrix. Positive depth is in front of the eye.
    #[inline(always)]
    pub fn to_camera_space(&self, world: Vec2) -> (f64, f64) {
        let rel = world.sub(&self.pos);
        let inv_det = 1.0 / nonzero(self.plane.x * self.dir.y - self.dir.x * self.plane.y);
        let transform_x = inv_det * (self.dir.y * rel.x - self.dir.x * rel.y);
        let transform_y = inv_det * (-self.plane.y * rel.x + self.plane.x * rel.y);
        (transform_x, transform_y)
    }

    /// Unit vector toward the screen's left edge, used for strafing.
    #[inline(always)]
    pub fn left(&self) -> Vec2 {
        Vec2::new(self.dir.y, -self.dir.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_new_facing_east() {
        let cam = Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0));
        assert!(cam.plane.approx_eq(&Vec2::new(0.0, 0.66), TOL));
        // right-most column leans toward +plane
        let right = cam.ray_dir(480, 480);
        assert!(right.approx_eq(&Vec2::new(1.0, 0.66), TOL));
        let left = cam.ray_dir(0, 480);
        assert!(left.approx_eq(&Vec2::new(1.0, -0.66), TOL));
    }

    #[test]
    fn test_rotation_is_invertible() {
        let original = Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0));
        for &theta in &[0.01, 0.5, 1.0, 2.7, -3.9, 12.3] {
            let mut cam = original;
            cam.rotate(theta);
            cam.rotate(-theta);
            assert!(cam.dir.approx_eq(&original.dir, 1e-9), "theta {}", theta);
            assert!(cam.plane.approx_eq(&original.plane, 1e-9), "theta {}", theta);
        }
    }

    #[test]
    fn test_rotation_keeps_basis_orthogonal() {
        let mut cam = Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0));
        for _ in 0..1000 {
            cam.rotate(0.037);
        }
        let dot = cam.dir.x * cam.plane.x + cam.dir.y * cam.plane.y;
        assert!(dot.abs() < 1e-9);
        assert!((cam.dir.length() - 1.0).abs() < 1e-9);
        assert!((cam.plane.length() - PLANE_LEN).abs() < 1e-9);
    }

    #[test]
    fn test_camera_space_depth() {
        let cam = Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0));
        let (tx, ty) = cam.to_camera_space(Vec2::new(6.5, 3.5));
        assert!(tx.abs() < TOL);
        assert!((ty - 3.0).abs() < TOL);

        let (_, behind) = cam.to_camera_space(Vec2::new(1.5, 3.5));
        assert!(behind < 0.0);

        // a point to the screen's right has positive lateral offset
        let (tx, _) = cam.to_camera_space(Vec2::new(6.5, 4.5));
        assert!(tx > 0.0);
    }
}
