//! Per-render drawing surface.
//!
//! A `Canvas` owns its pixel buffer outright. Each render creates one and
//! either consumes it into PNG bytes or drops it; nothing is shared between
//! calls.
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder, Rgb, RgbImage};

use crate::error::{PipelineError, PipelineResult};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

const GLYPH: i64 = 8;

pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    /// Blank white surface.
    pub fn new(width: u32, height: u32) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::Render(format!(
                "canvas size {width}x{height} is empty"
            )));
        }
        Ok(Self {
            image: RgbImage::from_pixel(width, height, WHITE),
        })
    }

    pub fn width(&self) -> i64 {
        self.image.width() as i64
    }

    pub fn height(&self) -> i64 {
        self.image.height() as i64
    }

    /// Set one pixel; anything off the surface is clipped.
    pub fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, color);
    }

    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.put(xx, yy, color);
            }
        }
    }

    pub fn hline(&mut self, x0: i64, x1: i64, y: i64, color: Rgb<u8>) {
        for x in x0.min(x1)..=x0.max(x1) {
            self.put(x, y, color);
        }
    }

    pub fn vline(&mut self, x: i64, y0: i64, y1: i64, color: Rgb<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            self.put(x, y, color);
        }
    }

    /// 1px outline with inclusive corners.
    pub fn stroke_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        self.hline(x0, x1, y0, color);
        self.hline(x0, x1, y1, color);
        self.vline(x0, y0, y1, color);
        self.vline(x1, y0, y1, color);
    }

    /// Horizontal text with its top-left corner at `(x, y)`.
    pub fn text(&mut self, x: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
        for (i, ch) in text.chars().enumerate() {
            let Some(rows) = BASIC_FONTS.get(ch) else {
                continue;
            };
            let origin = x + i as i64 * GLYPH * scale;
            for (gy, row) in rows.iter().enumerate() {
                for gx in 0..GLYPH {
                    if row & (1u8 << gx) != 0 {
                        self.fill_rect(origin + gx * scale, y + gy as i64 * scale, scale, scale, color);
                    }
                }
            }
        }
    }

    /// Text rotated a quarter turn counter-clockwise, reading bottom to top.
    /// `(x, y)` is the bottom-left pixel of the rotated run.
    pub fn text_vertical(&mut self, x: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
        for (i, ch) in text.chars().enumerate() {
            let Some(rows) = BASIC_FONTS.get(ch) else {
                continue;
            };
            let origin = y - i as i64 * GLYPH * scale;
            for (gy, row) in rows.iter().enumerate() {
                for gx in 0..GLYPH {
                    if row & (1u8 << gx) != 0 {
                        self.fill_rect(
                            x + gy as i64 * scale,
                            origin - (gx + 1) * scale + 1,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
        }
    }

    /// Encode as PNG, releasing the surface.
    pub fn into_png(self) -> PipelineResult<Vec<u8>> {
        let (width, height) = self.image.dimensions();
        let mut png: Vec<u8> = Vec::new();
        PngEncoder::new(&mut png).write_image(self.image.as_raw(), width, height, ColorType::Rgb8)?;
        Ok(png)
    }
}

/// Width in pixels of `text` drawn at `scale`.
pub fn text_width(text: &str, scale: i64) -> i64 {
    text.chars().count() as i64 * GLYPH * scale
}

/// Height in pixels of one line of text at `scale`.
pub fn text_height(scale: i64) -> i64 {
    GLYPH * scale
}
