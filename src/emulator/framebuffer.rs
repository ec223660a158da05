//! The 135×240 RGB565 display raster.
//!
//! All drawing primitives take signed coordinates and clip against the screen, so a
//! shape that is partially or completely off-screen is drawn partially or not at all.
//! Work done is proportional to the number of screen pixels or rows touched, never to
//! the size of the requested shape.

use std::io::{self, Write};

use super::color::{self, BLACK};
use super::font::{self, CELL_HEIGHT, CELL_WIDTH, GLYPH_HEIGHT, GLYPH_WIDTH};

pub const WIDTH: usize = 135;
pub const HEIGHT: usize = 240;

/// Largest accepted text scale.
pub const MAX_TEXT_SIZE: u8 = 8;

/// A host drawing surface the framebuffer can be rendered onto.
pub trait Surface {
    fn put_pixel(&mut self, x: usize, y: usize, rgb: (u8, u8, u8));
}

#[derive(Clone, Debug, PartialEq)]
pub struct Framebuffer {
    pixels: Vec<u16>,
}

impl Default for Framebuffer {
    fn default() -> Framebuffer {
        Framebuffer::new()
    }
}

impl Framebuffer {
    /// Creates a black framebuffer.
    pub fn new() -> Framebuffer {
        Framebuffer {
            pixels: vec![BLACK; WIDTH * HEIGHT],
        }
    }

    pub fn width(&self) -> usize {
        WIDTH
    }

    pub fn height(&self) -> usize {
        HEIGHT
    }

    /// Row-major RGB565 pixels.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels[..]
    }

    pub fn pixel(&self, x: i64, y: i64) -> Option<u16> {
        if in_bounds(x, y) {
            Some(self.pixels[y as usize * WIDTH + x as usize])
        } else {
            None
        }
    }

    /// Sets a single pixel. Out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: u16) {
        if in_bounds(x, y) {
            self.pixels[y as usize * WIDTH + x as usize] = color;
        }
    }

    pub fn fill(&mut self, color: u16) {
        for pixel in self.pixels.iter_mut() {
            *pixel = color;
        }
    }

    /// Fills the horizontal span `x0..=x1` of row `y`.
    fn span(&mut self, x0: i64, x1: i64, y: i64, color: u16) {
        if y < 0 || y >= HEIGHT as i64 {
            return;
        }

        let x0 = x0.max(0);
        let x1 = x1.min(WIDTH as i64 - 1);

        if x0 > x1 {
            return;
        }

        let row = y as usize * WIDTH;

        for pixel in &mut self.pixels[row + x0 as usize..=row + x1 as usize] {
            *pixel = color;
        }
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: u16) {
        if w <= 0 || h <= 0 {
            return;
        }

        let y0 = y.max(0);
        let y1 = y.saturating_add(h - 1).min(HEIGHT as i64 - 1);

        for row in y0..=y1 {
            self.span(x, x.saturating_add(w - 1), row, color);
        }
    }

    pub fn draw_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: u16) {
        if w <= 0 || h <= 0 {
            return;
        }

        let right = x.saturating_add(w - 1);
        let bottom = y.saturating_add(h - 1);

        self.span(x, right, y, color);
        self.span(x, right, bottom, color);

        for row in y.max(0)..=bottom.min(HEIGHT as i64 - 1) {
            self.set_pixel(x, row, color);
            self.set_pixel(right, row, color);
        }
    }

    pub fn fill_circle(&mut self, cx: i64, cy: i64, r: i64, color: u16) {
        if r < 0 {
            return;
        }

        let y0 = cy.saturating_sub(r).max(0);
        let y1 = cy.saturating_add(r).min(HEIGHT as i64 - 1);

        for y in y0..=y1 {
            let dx = half_chord(r, y.saturating_sub(cy));
            self.span(cx.saturating_sub(dx), cx.saturating_add(dx), y, color);
        }
    }

    /// Draws a circle outline by plotting both intersections with every screen row
    /// and every screen column it crosses.
    pub fn draw_circle(&mut self, cx: i64, cy: i64, r: i64, color: u16) {
        if r < 0 {
            return;
        }

        for y in cy.saturating_sub(r).max(0)..=cy.saturating_add(r).min(HEIGHT as i64 - 1) {
            let dx = half_chord(r, y.saturating_sub(cy));
            self.set_pixel(cx.saturating_sub(dx), y, color);
            self.set_pixel(cx.saturating_add(dx), y, color);
        }

        for x in cx.saturating_sub(r).max(0)..=cx.saturating_add(r).min(WIDTH as i64 - 1) {
            let dy = half_chord(r, x.saturating_sub(cx));
            self.set_pixel(x, cy.saturating_sub(dy), color);
            self.set_pixel(x, cy.saturating_add(dy), color);
        }
    }

    pub fn draw_line(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, color: u16) {
        let (x1, y1, x2, y2) = match clip_line(x1, y1, x2, y2) {
            Some(line) => line,
            None => return,
        };

        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };

        let (mut x, mut y) = (x1, y1);
        let mut err = dx + dy;

        loop {
            self.set_pixel(x, y, color);

            if x == x2 && y == y2 {
                break;
            }

            let e2 = 2 * err;

            if e2 >= dy {
                err += dy;
                x += sx;
            }

            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws `text` with its top left corner at `(x, y)`, each font pixel scaled to a
    /// `size`×`size` block. A `\n` starts a new line below the first one.
    pub fn draw_text(&mut self, text: &str, x: i64, y: i64, color: u16, size: u8) {
        let size = size.max(1).min(MAX_TEXT_SIZE) as i64;

        let mut cursor_x = x;
        let mut cursor_y = y;

        for c in text.chars() {
            if c == '\n' {
                cursor_x = x;
                cursor_y = cursor_y.saturating_add(CELL_HEIGHT as i64 * size);
                continue;
            }

            if cursor_x < WIDTH as i64 && cursor_y < HEIGHT as i64 {
                self.draw_glyph(c, cursor_x, cursor_y, color, size);
            }

            cursor_x = cursor_x.saturating_add(CELL_WIDTH as i64 * size);
        }
    }

    fn draw_glyph(&mut self, c: char, x: i64, y: i64, color: u16, size: i64) {
        let glyph = font::glyph(c);

        for column in 0..GLYPH_WIDTH {
            let bits = glyph[column];

            for row in 0..GLYPH_HEIGHT {
                if bits & (1 << row) == 0 {
                    continue;
                }

                let px = x.saturating_add(column as i64 * size);
                let py = y.saturating_add(row as i64 * size);

                if size == 1 {
                    self.set_pixel(px, py, color);
                } else {
                    self.fill_rect(px, py, size, size, color);
                }
            }
        }
    }

    /// Pushes every pixel onto `surface` as 24-bit RGB.
    pub fn render<S: Surface>(&self, surface: &mut S) {
        for (i, pixel) in self.pixels.iter().enumerate() {
            surface.put_pixel(i % WIDTH, i / WIDTH, color::to_rgb888(*pixel));
        }
    }

    /// Row-major packed RGB888 bytes.
    pub fn to_rgb888(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WIDTH * HEIGHT * 3);

        for pixel in &self.pixels {
            let (r, g, b) = color::to_rgb888(*pixel);
            out.extend_from_slice(&[r, g, b]);
        }

        out
    }

    /// Writes the framebuffer as a binary PPM image.
    pub fn write_ppm<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "P6\n{} {}\n255\n", WIDTH, HEIGHT)?;
        writer.write_all(&self.to_rgb888())?;
        writer.flush()
    }
}

fn in_bounds(x: i64, y: i64) -> bool {
    x >= 0 && y >= 0 && x < WIDTH as i64 && y < HEIGHT as i64
}

/// Half the width of a circle of radius `r` at vertical distance `d` from its centre.
fn half_chord(r: i64, d: i64) -> i64 {
    let r = r as f64;
    let d = d as f64;

    (r * r - d * d).max(0.0).sqrt().round() as i64
}

/// Clips a line to the screen rectangle (Liang-Barsky), returning the visible part.
fn clip_line(x1: i64, y1: i64, x2: i64, y2: i64) -> Option<(i64, i64, i64, i64)> {
    let (x1f, y1f) = (x1 as f64, y1 as f64);
    let dx = x2 as f64 - x1f;
    let dy = y2 as f64 - y1f;

    let max_x = (WIDTH - 1) as f64;
    let max_y = (HEIGHT - 1) as f64;

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    let edges = [
        (-dx, x1f),
        (dx, max_x - x1f),
        (-dy, y1f),
        (dy, max_y - y1f),
    ];

    for &(p, q) in edges.iter() {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let t = q / p;

            if p < 0.0 {
                if t > t1 {
                    return None;
                }
                t0 = t0.max(t);
            } else {
                if t < t0 {
                    return None;
                }
                t1 = t1.min(t);
            }
        }
    }

    Some((
        (x1f + t0 * dx).round() as i64,
        (y1f + t0 * dy).round() as i64,
        (x1f + t1 * dx).round() as i64,
        (y1f + t1 * dy).round() as i64,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(fb: &Framebuffer, color: u16) -> usize {
        fb.pixels().iter().filter(|&&p| p == color).count()
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut fb = Framebuffer::new();

        fb.fill_rect(-10, -10, 20, 20, 0xF800);
        assert_eq!(count(&fb, 0xF800), 100);

        fb.fill_rect(1000, 1000, 5, 5, 0x001F);
        fb.fill_rect(0, 0, -5, 5, 0x001F);
        assert_eq!(count(&fb, 0x001F), 0);
    }

    #[test]
    fn test_huge_shapes_are_bounded() {
        let mut fb = Framebuffer::new();

        fb.fill_circle(60, 100, i64::MAX / 4, 0x07E0);
        assert_eq!(count(&fb, 0x07E0), WIDTH * HEIGHT);

        fb.draw_line(-1_000_000_000, 5, 1_000_000_000, 5, 0xF800);
        assert_eq!(count(&fb, 0xF800), WIDTH);

        fb.draw_circle(0, 0, 1_000_000_000, 0x001F);
        fb.fill_rect(i64::MAX - 1, 0, i64::MAX, 10, 0x001F);
        assert_eq!(count(&fb, 0x001F), 0);
    }

    #[test]
    fn test_draw_line_endpoints() {
        let mut fb = Framebuffer::new();

        fb.draw_line(0, 0, 10, 5, color::WHITE);
        assert_eq!(fb.pixel(0, 0), Some(color::WHITE));
        assert_eq!(fb.pixel(10, 5), Some(color::WHITE));
        assert_eq!(count(&fb, color::WHITE), 11);
    }

    #[test]
    fn test_draw_text() {
        let mut fb = Framebuffer::new();

        fb.draw_text("Hi", 0, 0, 0xFFFF, 1);
        let small = count(&fb, 0xFFFF);
        assert!(small > 0);

        let mut big = Framebuffer::new();
        big.draw_text("Hi", 0, 0, 0xFFFF, 2);
        assert_eq!(count(&big, 0xFFFF), small * 4);

        fb.draw_text("off screen", 500, 500, 0x07E0, 1);
        assert_eq!(count(&fb, 0x07E0), 0);
    }

    #[derive(Default)]
    struct Recorder {
        pixels: Vec<(usize, usize, (u8, u8, u8))>,
    }

    impl Surface for Recorder {
        fn put_pixel(&mut self, x: usize, y: usize, rgb: (u8, u8, u8)) {
            self.pixels.push((x, y, rgb));
        }
    }

    #[test]
    fn test_render_to_surface() {
        let mut fb = Framebuffer::new();
        fb.fill(0xF800);
        fb.set_pixel(134, 0, 0x001F);
        fb.set_pixel(0, 1, 0x07E0);
        fb.set_pixel(134, 239, 0xFFFF);

        let mut recorder = Recorder::default();
        fb.render(&mut recorder);

        assert_eq!(recorder.pixels.len(), WIDTH * HEIGHT);
        assert_eq!(recorder.pixels[0], (0, 0, (255, 0, 0)));
        assert_eq!(recorder.pixels[134], (134, 0, (0, 0, 255)));
        assert_eq!(recorder.pixels[135], (0, 1, (0, 255, 0)));
        assert_eq!(recorder.pixels[WIDTH * HEIGHT - 1], (134, 239, (255, 255, 255)));

        let rgb = fb.to_rgb888();
        for (x, y, (r, g, b)) in &recorder.pixels {
            let i = (y * WIDTH + x) * 3;
            assert_eq!(&rgb[i..i + 3], &[*r, *g, *b]);
        }
    }

    #[test]
    fn test_ppm_header() {
        let fb = Framebuffer::new();
        let mut out = Vec::new();

        fb.write_ppm(&mut out).unwrap();

        assert!(out.starts_with(b"P6\n135 240\n255\n"));
        assert_eq!(out.len(), "P6\n135 240\n255\n".len() + WIDTH * HEIGHT * 3);
    }
}
