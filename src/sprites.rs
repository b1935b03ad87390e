//! Billboard projection: world points to screen rectangles, depth tested
//! per column against the frame's Z-buffer.

use crate::camera::Camera;
use crate::physics::Vec2;
use crate::raycast::ZBuffer;

/// Screen-space footprint of one billboard.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    /// Camera-space depth, always positive.
    pub depth: f64,
    pub screen_x: i64,
    /// Projected size before clipping to the viewport.
    pub width: i64,
    pub height: i64,
    /// Unclipped left edge column.
    pub left: i64,
    /// Unclipped top edge row.
    pub top: f64,
    /// Clipped vertical range `[start_y, end_y)`.
    pub start_y: u32,
    pub end_y: u32,
    /// Clipped horizontal range `[start_x, end_x]`, empty when off screen.
    pub start_x: i64,
    pub end_x: i64,
}

impl Projection {
    fn build(depth: f64, screen_x: i64, width: i64, height: i64, left: i64, screen_w: u32, screen_h: u32) -> Self {
        let h = screen_h as f64;
        let top = h / 2.0 - height as f64 / 2.0;
        let start_y = top.max(0.0);
        let end_y = (h / 2.0 + height as f64 / 2.0).min(h - 1.0).max(0.0);
        Self {
            depth,
            screen_x,
            width,
            height,
            left,
            top,
            start_y: start_y as u32,
            end_y: end_y as u32,
            start_x: left.max(0),
            end_x: left.saturating_add(width - 1).min(screen_w as i64 - 1),
        }
    }

    /// Columns where this billboard is at least as near as the wall
    /// (plus `tolerance`).
    pub fn visible_columns<'a>(
        &'a self,
        zbuffer: &'a ZBuffer,
        tolerance: f64,
    ) -> impl Iterator<Item = u32> + 'a {
        (self.start_x..=self.end_x).filter_map(move |col| {
            let wall = zbuffer.get(col as usize)?;
            if self.depth <= wall + tolerance {
                Some(col as u32)
            } else {
                None
            }
        })
    }

    /// Source texture column for screen column `col`, proportional across
    /// the unclipped width.
    pub fn tex_column(&self, col: u32, tex_width: u32) -> u32 {
        let offset = (col as i64 - self.left).max(0);
        let tx = offset.saturating_mul(tex_width as i64) / self.width.max(1);
        tx.clamp(0, tex_width.saturating_sub(1) as i64) as u32
    }

    /// Source texture row for screen row `y`.
    pub fn tex_row(&self, y: u32, tex_height: u32) -> u32 {
        let rel = (y as f64 - self.top) / self.height.max(1) as f64;
        let ty = (rel * tex_height as f64).floor() as i64;
        ty.clamp(0, tex_height.saturating_sub(1) as i64) as u32
    }
}

/// Textured billboard whose height follows `screen_h / depth * scale`,
/// capped at `screen_h * max_height_factor`, and whose width keeps the
/// texture's aspect ratio.
pub fn project_billboard(
    camera: &Camera,
    world: Vec2,
    screen_w: u32,
    screen_h: u32,
    scale: f64,
    max_height_factor: f64,
    aspect: f64,
) -> Option<Projection> {
    let (transform_x, depth) = camera.to_camera_space(world);
    if depth <= 0.0 || !depth.is_finite() {
        return None;
    }
    let screen_x = ((screen_w as f64 / 2.0) * (1.0 + transform_x / depth)).floor() as i64;
    let raw_height = ((screen_h as f64 / depth) * scale).floor().abs();
    let height = raw_height.min(screen_h as f64 * max_height_factor) as i64;
    let width = ((height as f64 * aspect).floor().abs() as i64).max(1);
    let left = (screen_x as f64 - width as f64 / 2.0).floor() as i64;
    Some(Projection::build(depth, screen_x, width, height, left, screen_w, screen_h))
}

/// Untextured square billboard (projectiles): `max(2, floor(h/depth * factor))`.
pub fn project_square(
    camera: &Camera,
    world: Vec2,
    screen_w: u32,
    screen_h: u32,
    size_factor: f64,
) -> Option<Projection> {
    let (transform_x, depth) = camera.to_camera_space(world);
    if depth <= 0.0 || !depth.is_finite() {
        return None;
    }
    let screen_x = ((screen_w as f64 / 2.0) * (1.0 + transform_x / depth)).floor() as i64;
    let size = (((screen_h as f64 / depth) * size_factor).floor() as i64).max(2);
    let left = screen_x - size / 2;
    Some(Projection::build(depth, screen_x, size + 1, size, left, screen_w, screen_h))
}

/// Indices of `positions` ordered far to near by squared distance from
/// the camera, so nearer billboards overdraw farther ones.
pub fn back_to_front(camera: &Camera, positions: &[Vec2]) -> Vec<usize> {
    let mut order: Vec<(f64, usize)> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| (p.distance_squared_to(&camera.pos), i))
        .collect();
    order.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    order.into_iter().map(|(_, i)| i).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cam() -> Camera {
        Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0))
    }

    fn flat_z(width: u32, depth: f64) -> ZBuffer {
        let mut z = ZBuffer::new(width);
        for col in 0..width as usize {
            z.set(col, depth);
        }
        z
    }

    #[test]
    fn test_behind_camera_is_discarded() {
        assert!(project_billboard(&cam(), Vec2::new(1.5, 3.5), 480, 300, 2.0, 1.5, 1.0).is_none());
        assert!(project_square(&cam(), Vec2::new(3.5, 3.5), 480, 300, 0.4).is_none());
    }

    #[test]
    fn test_centered_billboard() {
        let p = project_billboard(&cam(), Vec2::new(6.5, 3.5), 480, 300, 2.0, 1.5, 1.0).unwrap();
        assert!((p.depth - 3.0).abs() < 1e-9);
        assert_eq!(p.screen_x, 240);
        assert_eq!(p.height, 200);
        assert_eq!(p.width, 200);
        assert_eq!(p.left, 140);
        assert_eq!((p.start_x, p.end_x), (140, 339));
        assert_eq!((p.start_y, p.end_y), (50, 250));
    }

    #[test]
    fn test_height_is_clamped_up_close() {
        let p = project_billboard(&cam(), Vec2::new(3.6, 3.5), 480, 300, 2.0, 1.5, 0.5).unwrap();
        assert_eq!(p.height, 450);
        assert_eq!(p.width, 225);
        assert_eq!((p.start_y, p.end_y), (0, 299));
    }

    #[test]
    fn test_occluded_columns_are_skipped() {
        let p = project_billboard(&cam(), Vec2::new(6.5, 3.5), 480, 300, 2.0, 1.5, 1.0).unwrap();
        // wall nearer than the sprite everywhere
        let z = flat_z(480, 2.0);
        assert_eq!(p.visible_columns(&z, 0.01).count(), 0);
        // tie within tolerance still draws
        let z = flat_z(480, 2.995);
        assert_eq!(p.visible_columns(&z, 0.01).count(), 200);
        // partial occlusion
        let mut z = flat_z(480, 10.0);
        for col in 140..200 {
            z.set(col, 1.0);
        }
        let cols: Vec<u32> = p.visible_columns(&z, 0.01).collect();
        assert_eq!(cols.len(), 140);
        assert_eq!(cols[0], 200);
    }

    #[test]
    fn test_sprite_never_drawn_behind_wall() {
        // property: every visible column satisfies depth <= wall + tolerance
        let c = cam();
        let mut z = ZBuffer::new(480);
        for col in 0..480 {
            z.set(col, 1.0 + (col % 7) as f64);
        }
        for k in 0..40 {
            let pos = Vec2::new(4.0 + k as f64 * 0.25, 2.0 + (k % 5) as f64 * 0.4);
            if let Some(p) = project_billboard(&c, pos, 480, 300, 2.0, 1.5, 1.0) {
                for col in p.visible_columns(&z, 0.01) {
                    assert!(p.depth <= z.get(col as usize).unwrap() + 0.01);
                }
            }
        }
    }

    #[test]
    fn test_tex_mapping_spans_texture() {
        let p = project_billboard(&cam(), Vec2::new(6.5, 3.5), 480, 300, 2.0, 1.5, 1.0).unwrap();
        assert_eq!(p.tex_column(140, 64), 0);
        assert_eq!(p.tex_column(240, 64), 32);
        assert_eq!(p.tex_column(339, 64), 63);
        assert_eq!(p.tex_row(50, 64), 0);
        assert_eq!(p.tex_row(249, 64), 63);
    }

    #[test]
    fn test_projectile_square() {
        let p = project_square(&cam(), Vec2::new(6.5, 3.5), 480, 300, 0.4).unwrap();
        assert_eq!(p.height, 40);
        assert_eq!((p.start_x, p.end_x), (220, 260));
        let far = project_square(&cam(), Vec2::new(1000.0, 3.5), 480, 300, 0.4).unwrap();
        assert_eq!(far.height, 2);
    }

    #[test]
    fn test_back_to_front_order() {
        let order = back_to_front(
            &cam(),
            &[Vec2::new(4.5, 3.5), Vec2::new(10.5, 3.5), Vec2::new(6.5, 3.5)],
        );
        assert_eq!(order, vec![1, 2, 0]);
    }
}
