//! Draws one frame of the scene into a [`FrameBuffer`].
//!
//! Order: sky and floor gradients, wall columns (which also fill the
//! Z-buffer), enemies far to near, then projectiles far to near.

use crate::config::RenderConfig;
use crate::graphics::{Color, FrameBuffer};
use crate::physics::Vec2;
use crate::raycast::{cast_frame, ColumnHit, WallSlice, ZBuffer};
use crate::sim::Simulation;
use crate::sprites::{back_to_front, project_billboard, project_square};
use crate::textures::{Texture, TextureHandle, TextureStore};

/// Below this the shading overlay is skipped.
const MIN_DARKNESS: f64 = 0.01;

pub struct Renderer {
    zbuffer: ZBuffer,
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            zbuffer: ZBuffer::new(config.width),
            config: config.clone(),
        }
    }

    pub fn zbuffer(&self) -> &ZBuffer {
        &self.zbuffer
    }

    pub fn draw(
        &mut self,
        frame: &mut FrameBuffer,
        sim: &Simulation,
        textures: &TextureStore,
        walls: &[TextureHandle],
    ) {
        let (w, h) = (frame.width, frame.height);
        if w == 0 || h == 0 {
            return;
        }
        let horizon = h / 2;
        frame.fill_vgradient(0, horizon, &Color::SKY_TOP, &Color::SKY_HORIZON);
        frame.fill_vgradient(horizon, h, &Color::FLOOR_HORIZON, &Color::FLOOR_BOTTOM);

        let hits = cast_frame(
            sim.map(),
            &sim.camera,
            w,
            self.config.max_ray_distance,
            &mut self.zbuffer,
        );
        let wall_set = textures.all_loaded(walls).then_some(walls);
        for (col, hit) in hits.iter().enumerate() {
            draw_wall(frame, col as u32, hit, textures, wall_set);
        }

        self.draw_enemies(frame, sim, textures);
        self.draw_projectiles(frame, sim);
    }

    fn draw_enemies(&self, frame: &mut FrameBuffer, sim: &Simulation, textures: &TextureStore) {
        let visible: Vec<_> = sim
            .enemies
            .iter()
            .filter_map(|enemy| {
                let skin = enemy.skin?;
                let base = textures.get(skin.base)?;
                let tex = if enemy.is_flashing() {
                    textures.get(skin.hit).unwrap_or(base)
                } else {
                    base
                };
                Some((enemy.pos, base.aspect(), tex))
            })
            .collect();
        let positions: Vec<Vec2> = visible.iter().map(|(pos, _, _)| *pos).collect();

        let cfg = &self.config;
        for idx in back_to_front(&sim.camera, &positions) {
            let (pos, aspect, tex) = visible[idx];
            let Some(proj) = project_billboard(
                &sim.camera,
                pos,
                frame.width,
                frame.height,
                cfg.sprite_scale,
                cfg.max_sprite_height_factor,
                aspect,
            ) else {
                continue;
            };
            for col in proj.visible_columns(&self.zbuffer, cfg.depth_tolerance) {
                let tx = proj.tex_column(col, tex.width());
                for y in proj.start_y..proj.end_y {
                    if let Some(px) = tex.pixel(tx, proj.tex_row(y, tex.height())) {
                        frame.blend_pixel(col, y, px);
                    }
                }
            }
        }
    }

    fn draw_projectiles(&self, frame: &mut FrameBuffer, sim: &Simulation) {
        let positions: Vec<Vec2> = sim.projectiles.iter().map(|p| p.pos).collect();
        for idx in back_to_front(&sim.camera, &positions) {
            let Some(proj) = project_square(
                &sim.camera,
                positions[idx],
                frame.width,
                frame.height,
                self.config.projectile_size_factor,
            ) else {
                continue;
            };
            for col in proj.visible_columns(&self.zbuffer, self.config.depth_tolerance) {
                frame.draw_vline(col, proj.start_y, proj.end_y, &Color::PROJECTILE);
            }
        }
    }
}

fn draw_wall(
    frame: &mut FrameBuffer,
    col: u32,
    hit: &ColumnHit,
    textures: &TextureStore,
    wall_set: Option<&[TextureHandle]>,
) {
    let slice = WallSlice::new(hit.perp_dist, frame.height);
    if slice.rows() == 0 {
        return;
    }
    let Some(walls) = wall_set else {
        let (r, g, b) = hit.fallback_rgb();
        frame.draw_vline(col, slice.start, slice.end, &Color::rgb(r, g, b));
        return;
    };

    match textures.get(walls[hit.texture_index(walls.len())]) {
        Some(tex) => draw_textured_column(frame, col, hit, &slice, tex),
        None => frame.draw_vline(col, slice.start, slice.end, &Color::WALL_FALLBACK),
    }
    let darkness = hit.darkness();
    if darkness > MIN_DARKNESS {
        frame.shade_vline(col, slice.start, slice.end, darkness as f32);
    }
}

/// Samples texture column `tex_x` across the unclipped wall height, so a
/// wall filling the screen shows the middle of the image rather than a
/// squashed copy of all of it.
fn draw_textured_column(
    frame: &mut FrameBuffer,
    col: u32,
    hit: &ColumnHit,
    slice: &WallSlice,
    tex: &Texture,
) {
    let tx = hit.tex_x(tex.width());
    let line = slice.line_height.max(1) as f64;
    let top = frame.height as f64 / 2.0 - line / 2.0;
    for y in slice.start..slice.end {
        let ty = (((y as f64 - top) / line) * tex.height() as f64).floor().max(0.0) as u32;
        match tex.pixel(tx, ty.min(tex.height() - 1)) {
            Some(px) => frame.blend_pixel(col, y, px),
            None => frame.set_pixel(col, y, &Color::WALL_FALLBACK),
        }
    }
}
