//! Per-column DDA ray casting against the occupancy grid.

use crate::camera::Camera;
use crate::physics::{nonzero, Vec2};
use crate::world::GridMap;

/// Which family of grid lines the ray crossed last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// Crossed a vertical grid line (stepped along x).
    X,
    /// Crossed a horizontal grid line (stepped along y).
    Y,
}

/// Result of casting one screen column.
#[derive(Clone, Copy, Debug)]
pub struct ColumnHit {
    /// False only if the step cap ran out, which an enclosed grid never does.
    pub hit: bool,
    /// Fisheye-corrected distance to the wall plane.
    pub perp_dist: f64,
    pub side: Side,
    pub map_x: i32,
    pub map_y: i32,
    /// Fractional hit offset along the wall face, in `[0, 1)`.
    pub wall_x: f64,
    pub ray_dir: Vec2,
}

impl ColumnHit {
    /// Source column in a texture `tex_width` pixels wide. Flipped on the
    /// faces that would otherwise show the image mirrored.
    pub fn tex_x(&self, tex_width: u32) -> u32 {
        if tex_width == 0 {
            return 0;
        }
        let mut tex_x = (self.wall_x * tex_width as f64).floor() as i64;
        tex_x = tex_x.clamp(0, tex_width as i64 - 1);
        let flip = match self.side {
            Side::X => self.ray_dir.x > 0.0,
            Side::Y => self.ray_dir.y < 0.0,
        };
        if flip {
            tex_x = tex_width as i64 - tex_x - 1;
        }
        tex_x as u32
    }

    /// Index into a set of `count` wall textures, stable per cell.
    pub fn texture_index(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        (self.map_x as i64 + self.map_y as i64).rem_euclid(count as i64) as usize
    }

    /// Black overlay opacity for textured walls: farther and Y-facing walls
    /// are darker.
    pub fn darkness(&self) -> f64 {
        let side_bias = if self.side == Side::Y { 0.12 } else { 0.0 };
        (self.perp_dist * 0.12 + side_bias).clamp(0.0, 0.65)
    }

    /// Flat colour used while wall textures are still loading.
    pub fn fallback_rgb(&self) -> (u8, u8, u8) {
        let hue = if self.side == Side::Y { 180.0 } else { 210.0 };
        let shade = (1.2 - self.perp_dist * 0.15).clamp(0.0, 1.0);
        let lightness = (20.0 + 50.0 * shade).floor() / 100.0;
        hsl_to_rgb(hue, 0.6, lightness)
    }
}

/// Vertical extent of a wall slice on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallSlice {
    /// Unclipped projected height.
    pub line_height: i64,
    /// First row drawn (inclusive).
    pub start: u32,
    /// Last row bound (exclusive), at most `screen_height - 1`.
    pub end: u32,
}

impl WallSlice {
    pub fn new(perp_dist: f64, screen_height: u32) -> Self {
        let h = screen_height as f64;
        let line_height = (h / nonzero(perp_dist)).floor().min(i64::MAX as f64) as i64;
        let half = line_height as f64 / 2.0;
        let start = (h / 2.0 - half).max(0.0);
        let end = (h / 2.0 + half).min(h - 1.0).max(0.0);
        Self {
            line_height,
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn rows(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// One depth per screen column, nearest wall surface for the current frame.
#[derive(Clone, Debug)]
pub struct ZBuffer {
    depths: Vec<f64>,
}

impl ZBuffer {
    pub fn new(width: u32) -> Self {
        Self {
            depths: vec![f64::MAX; width as usize],
        }
    }

    pub fn width(&self) -> usize {
        self.depths.len()
    }

    pub fn resize(&mut self, width: u32) {
        self.depths.resize(width as usize, f64::MAX);
    }

    #[inline(always)]
    pub fn get(&self, col: usize) -> Option<f64> {
        self.depths.get(col).copied()
    }

    #[inline(always)]
    pub fn set(&mut self, col: usize, depth: f64) {
        if let Some(slot) = self.depths.get_mut(col) {
            *slot = depth;
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.depths
    }
}

/// Casts the ray for screen column `col`.
pub fn cast_column(
    map: &GridMap,
    camera: &Camera,
    col: u32,
    width: u32,
    max_distance: f64,
) -> ColumnHit {
    let ray_dir = camera.ray_dir(col, width);
    let pos = camera.pos;

    let mut map_x = pos.x.floor() as i32;
    let mut map_y = pos.y.floor() as i32;

    let delta_dist_x = (1.0 / nonzero(ray_dir.x)).abs();
    let delta_dist_y = (1.0 / nonzero(ray_dir.y)).abs();

    let (step_x, mut side_dist_x) = if ray_dir.x < 0.0 {
        (-1, (pos.x - map_x as f64) * delta_dist_x)
    } else {
        (1, (map_x as f64 + 1.0 - pos.x) * delta_dist_x)
    };
    let (step_y, mut side_dist_y) = if ray_dir.y < 0.0 {
        (-1, (pos.y - map_y as f64) * delta_dist_y)
    } else {
        (1, (map_y as f64 + 1.0 - pos.y) * delta_dist_y)
    };

    // Enough steps to leave any grid; out-of-grid cells count as walls.
    let max_steps = map.width() + map.height() + 2;
    let mut side = Side::X;
    let mut hit = false;

    for _ in 0..max_steps {
        if side_dist_x < side_dist_y {
            side_dist_x += delta_dist_x;
            map_x += step_x;
            side = Side::X;
        } else {
            side_dist_y += delta_dist_y;
            map_y += step_y;
            side = Side::Y;
        }
        if map.is_solid(map_x, map_y) {
            hit = true;
            break;
        }
    }

    if !hit {
        return ColumnHit {
            hit: false,
            perp_dist: max_distance,
            side,
            map_x,
            map_y,
            wall_x: 0.0,
            ray_dir,
        };
    }

    let perp_dist = match side {
        Side::X => {
            ((map_x as f64 - pos.x + (1 - step_x) as f64 / 2.0) / nonzero(ray_dir.x)).abs()
        }
        Side::Y => {
            ((map_y as f64 - pos.y + (1 - step_y) as f64 / 2.0) / nonzero(ray_dir.y)).abs()
        }
    };

    let wall_x = match side {
        Side::X => pos.y + perp_dist * ray_dir.y,
        Side::Y => pos.x + perp_dist * ray_dir.x,
    };

    ColumnHit {
        hit: true,
        perp_dist,
        side,
        map_x,
        map_y,
        wall_x: wall_x - wall_x.floor(),
        ray_dir,
    }
}

/// Casts every column and rewrites the Z-buffer for this frame.
pub fn cast_frame(
    map: &GridMap,
    camera: &Camera,
    width: u32,
    max_distance: f64,
    zbuffer: &mut ZBuffer,
) -> Vec<ColumnHit> {
    if zbuffer.width() != width as usize {
        zbuffer.resize(width);
    }
    (0..width)
        .map(|col| {
            let hit = cast_column(map, camera, col, width, max_distance);
            zbuffer.set(col as usize, hit.perp_dist);
            hit
        })
        .collect()
}

/// `hsl(h, s, l)` to RGB with `h` in degrees and `s`, `l` in `[0, 1]`.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r1), to_u8(g1), to_u8(b1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn east_camera() -> Camera {
        Camera::new(Vec2::new(3.5, 3.5), Vec2::new(1.0, 0.0))
    }

    #[test]
    fn test_center_column_hits_block() {
        let map = GridMap::arena();
        let cam = Camera::new(Vec2::new(2.5, 7.5), Vec2::new(1.0, 0.0));
        let hit = cast_column(&map, &cam, 240, 480, 64.0);
        assert!(hit.hit);
        assert_eq!(hit.side, Side::X);
        assert_eq!((hit.map_x, hit.map_y), (5, 7));
        assert!((hit.perp_dist - 2.5).abs() < 1e-9);
        assert!((hit.wall_x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_axis_aligned_ray_uses_epsilon() {
        // center column of an east-facing camera has ray_dir.y == 0
        let map = GridMap::arena();
        let hit = cast_column(&map, &east_camera(), 240, 480, 64.0);
        assert!(hit.ray_dir.y == 0.0);
        assert!(hit.hit);
        assert!(hit.perp_dist.is_finite());
        assert!((hit.perp_dist - 11.5).abs() < 1e-9);
    }

    #[test]
    fn test_wall_precedes_every_solid_cell() {
        let map = GridMap::arena();
        let positions = [
            Vec2::new(3.5, 3.5),
            Vec2::new(7.5, 7.5),
            Vec2::new(12.2, 10.7),
            Vec2::new(1.1, 14.9),
        ];
        for pos in positions {
            for k in 0..24 {
                let angle = k as f64 * std::f64::consts::TAU / 24.0;
                let cam = Camera::new(pos, Vec2::new(angle.cos(), angle.sin()));
                for col in (0..480).step_by(37) {
                    let hit = cast_column(&map, &cam, col, 480, 64.0);
                    assert!(hit.hit);
                    // march the ray up to just before the hit: all open floor
                    let samples = 400;
                    for i in 0..samples {
                        let t = (hit.perp_dist - 1e-6) * i as f64 / samples as f64;
                        let p = pos.add(&hit.ray_dir.scale(t));
                        assert!(map.is_walkable(p.x, p.y), "ray crossed wall at {:?}", p);
                    }
                    // and the reported cell is solid
                    assert!(map.is_solid(hit.map_x, hit.map_y));
                }
            }
        }
    }

    #[test]
    fn test_leaky_grid_hits_boundary() {
        let map = GridMap::from_rows(&[vec![0, 0, 0], vec![0, 0, 0]]).unwrap();
        let cam = Camera::new(Vec2::new(0.5, 0.5), Vec2::new(1.0, 0.0));
        let hit = cast_column(&map, &cam, 50, 100, 64.0);
        assert!(hit.hit);
        assert_eq!(hit.map_x, 3);
        assert!((hit.perp_dist - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_cast_frame_fills_zbuffer() {
        let map = GridMap::arena();
        let mut z = ZBuffer::new(10);
        let hits = cast_frame(&map, &east_camera(), 64, 64.0, &mut z);
        assert_eq!(hits.len(), 64);
        assert_eq!(z.width(), 64);
        for (col, hit) in hits.iter().enumerate() {
            assert_eq!(z.get(col), Some(hit.perp_dist));
            assert!(hit.perp_dist < f64::MAX);
        }
    }

    #[test]
    fn test_wall_slice_clamps() {
        let near = WallSlice::new(0.25, 300);
        assert_eq!(near.line_height, 1200);
        assert_eq!((near.start, near.end), (0, 299));

        let far = WallSlice::new(10.0, 300);
        assert_eq!(far.line_height, 30);
        assert_eq!((far.start, far.end), (135, 165));
        assert_eq!(far.rows(), 30);
    }

    #[test]
    fn test_tex_x_flips_on_mirrored_faces() {
        let mut hit = ColumnHit {
            hit: true,
            perp_dist: 1.0,
            side: Side::X,
            map_x: 5,
            map_y: 7,
            wall_x: 0.25,
            ray_dir: Vec2::new(1.0, 0.0),
        };
        assert_eq!(hit.tex_x(64), 64 - 16 - 1);
        hit.ray_dir = Vec2::new(-1.0, 0.0);
        assert_eq!(hit.tex_x(64), 16);
        hit.side = Side::Y;
        hit.ray_dir = Vec2::new(0.0, -1.0);
        assert_eq!(hit.tex_x(64), 64 - 16 - 1);
        hit.ray_dir = Vec2::new(0.0, 1.0);
        assert_eq!(hit.tex_x(64), 16);
    }

    #[test]
    fn test_texture_index_and_shading() {
        let hit = ColumnHit {
            hit: true,
            perp_dist: 2.0,
            side: Side::Y,
            map_x: 5,
            map_y: 9,
            wall_x: 0.0,
            ray_dir: Vec2::new(0.0, 1.0),
        };
        assert_eq!(hit.texture_index(6), 2);
        assert_eq!(hit.texture_index(0), 0);
        assert!((hit.darkness() - 0.36).abs() < 1e-9);

        let far = ColumnHit { perp_dist: 40.0, ..hit };
        assert_eq!(far.darkness(), 0.65);
    }

    #[test]
    fn test_hsl_to_rgb() {
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), (255, 0, 0));
        assert_eq!(hsl_to_rgb(120.0, 1.0, 0.5), (0, 255, 0));
        assert_eq!(hsl_to_rgb(210.0, 0.0, 0.5), (128, 128, 128));
    }
}
