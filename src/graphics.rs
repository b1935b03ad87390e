use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[inline(always)]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// From a `0xRRGGBB` literal.
    pub const fn hex(value: u32) -> Self {
        Color::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Linear mix toward `other` by `t` in `[0, 1]`.
    #[inline(always)]
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::rgb(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Same colour under a black overlay of opacity `amount`.
    #[inline(always)]
    pub fn darken(&self, amount: f32) -> Color {
        self.lerp(&Color::BLACK, amount)
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const SKY_TOP: Color = Color::hex(0x1f2937);
    pub const SKY_HORIZON: Color = Color::hex(0x0f172a);
    pub const FLOOR_HORIZON: Color = Color::hex(0x111827);
    pub const FLOOR_BOTTOM: Color = Color::hex(0x0b1220);
    pub const WALL_FALLBACK: Color = Color::hex(0x444444);
    pub const PROJECTILE: Color = Color::hex(0xffb020);
}

/// CPU-side RGBA frame, uploaded to the canvas once per frame.
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub stride: usize,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize * 4;
        FrameBuffer {
            width,
            height,
            pixels: vec![0; size],
            stride: width as usize * 4,
        }
    }

    #[inline]
    pub fn clear(&mut self, color: &Color) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    #[inline(always)]
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.stride + x as usize * 4)
        } else {
            None
        }
    }

    #[inline(always)]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: &Color) {
        if let Some(idx) = self.index(x, y) {
            self.pixels[idx..idx + 4].copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.index(x, y)
            .map(|idx| Color::rgb(self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]))
    }

    /// Source-over composite of a straight-alpha RGBA sample.
    #[inline(always)]
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let Some(idx) = self.index(x, y) else {
            return;
        };
        match rgba[3] {
            0 => {}
            255 => self.pixels[idx..idx + 3].copy_from_slice(&rgba[..3]),
            a => {
                let alpha = a as f32 / 255.0;
                for c in 0..3 {
                    let dst = self.pixels[idx + c] as f32;
                    self.pixels[idx + c] = (dst + (rgba[c] as f32 - dst) * alpha).round() as u8;
                }
            }
        }
    }

    /// Fills rows `[y_start, y_end)` of column `x`.
    #[inline]
    pub fn draw_vline(&mut self, x: u32, y_start: u32, y_end: u32, color: &Color) {
        if x >= self.width {
            return;
        }
        for y in y_start..y_end.min(self.height) {
            self.set_pixel(x, y, color);
        }
    }

    /// Lays a black overlay of opacity `amount` over rows `[y_start, y_end)`
    /// of column `x`.
    pub fn shade_vline(&mut self, x: u32, y_start: u32, y_end: u32, amount: f32) {
        for y in y_start..y_end.min(self.height) {
            if let Some(color) = self.pixel(x, y) {
                self.set_pixel(x, y, &color.darken(amount));
            }
        }
    }

    /// Fills rows `[y_start, y_end)` with a vertical gradient that runs from
    /// `top` at `y_start` to `bottom` at `y_end`.
    pub fn fill_vgradient(&mut self, y_start: u32, y_end: u32, top: &Color, bottom: &Color) {
        let y_end = y_end.min(self.height);
        if y_start >= y_end {
            return;
        }
        let span = (y_end - y_start) as f32;
        for y in y_start..y_end {
            let color = top.lerp(bottom, (y - y_start) as f32 / span);
            let row = y as usize * self.stride;
            for px in self.pixels[row..row + self.stride].chunks_exact_mut(4) {
                px.copy_from_slice(&[color.r, color.g, color.b, 255]);
            }
        }
    }
}

/// A 2d canvas plus the frame buffer that gets blitted onto it.
pub struct Graphics {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    pub buffer: FrameBuffer,
}

impl Graphics {
    pub fn new(canvas_id: &str, width: u32, height: u32) -> Result<Graphics> {
        let document = web_sys::window()
            .ok_or_else(|| Error::Dom("no window".into()))?
            .document()
            .ok_or_else(|| Error::Dom("no document".into()))?;

        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| Error::Dom(format!("canvas #{} not found", canvas_id)))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| Error::Dom(format!("#{} is not a canvas", canvas_id)))?;

        canvas.set_width(width);
        canvas.set_height(height);

        let context = canvas
            .get_context("2d")?
            .ok_or_else(|| Error::Dom("2d context unavailable".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| Error::Dom("2d context has the wrong type".into()))?;

        Ok(Graphics {
            canvas,
            context,
            buffer: FrameBuffer::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    pub fn present(&self) -> Result<()> {
        let expected = self.buffer.width as usize * self.buffer.height as usize * 4;
        if self.buffer.pixels.len() != expected {
            return Err(Error::Dom(format!(
                "frame buffer is {} bytes, expected {} for {}x{}",
                self.buffer.pixels.len(),
                expected,
                self.buffer.width,
                self.buffer.height
            )));
        }
        let image_data = ImageData::new_with_u8_clamped_array_and_sh(
            wasm_bindgen::Clamped(&self.buffer.pixels),
            self.buffer.width,
            self.buffer.height,
        )?;
        self.context.put_image_data(&image_data, 0.0, 0.0)?;
        Ok(())
    }

    /// Blanks the visible canvas, used on teardown.
    pub fn clear_canvas(&self) {
        self.context
            .clear_rect(0.0, 0.0, self.canvas.width() as f64, self.canvas.height() as f64);
    }
}
