//! Toolbar icon rasterizer: flag on top, compact time underneath.

use super::chrome::Rgb;
use image::imageops::{self, FilterType};
use image::RgbaImage;

pub const BACKGROUND: Rgb = Rgb::new(0x1f, 0x29, 0x37);
pub const FOREGROUND: Rgb = Rgb::new(0xff, 0xff, 0xff);

/// Sizes handed to the chrome on every render.
pub const ICON_SIZES: [u32; 2] = [16, 32];

const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;

// 3x5 digits, one row per byte, most significant of the low three bits is
// the leftmost pixel.
static DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Draw one `size`×`size` icon. `time` is the compact `HHMM` form; anything
/// that is not a digit is skipped. Without a flag the upper part stays
/// background.
pub fn draw_clock_icon(size: u32, time: &str, flag: Option<&RgbaImage>) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(size, size, BACKGROUND.rgba());

    if let Some(flag) = flag {
        let flag_w = scaled(size, 0.7).max(1);
        let flag_h = scaled(size, 0.34).max(1);
        let flag_x = (size - flag_w.min(size)) / 2;
        let flag_y = scaled(size, 0.06);
        let resized = imageops::resize(flag, flag_w, flag_h, FilterType::CatmullRom);
        imageops::overlay(&mut canvas, &resized, flag_x as i64, flag_y as i64);
    }

    draw_digits(&mut canvas, time, scaled(size, 0.72));
    canvas
}

fn scaled(size: u32, fraction: f64) -> u32 {
    (size as f64 * fraction).round() as u32
}

/// Digits centered horizontally, vertically centered on `center_y`.
fn draw_digits(canvas: &mut RgbaImage, text: &str, center_y: u32) {
    let size = canvas.width();
    let scale = (size / 16).max(1);
    let glyphs: Vec<&[u8; 5]> = text
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| &DIGITS[d as usize])
        .collect();
    if glyphs.is_empty() {
        return;
    }

    let advance = (GLYPH_W + 1) * scale;
    let text_w = advance * glyphs.len() as u32 - scale;
    let text_h = GLYPH_H * scale;
    let left = size.saturating_sub(text_w) / 2;
    let top = center_y.saturating_sub(text_h / 2).min(size.saturating_sub(text_h));
    let color = FOREGROUND.rgba();

    for (i, rows) in glyphs.iter().enumerate() {
        let glyph_x = left + i as u32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let x0 = glyph_x + col * scale;
                let y0 = top + row as u32 * scale;
                for dy in 0..scale {
                    for dx in 0..scale {
                        let (x, y) = (x0 + dx, y0 + dy);
                        if x < size && y < canvas.height() {
                            canvas.put_pixel(x, y, color);
                        }
                    }
                }
            }
        }
    }
}
