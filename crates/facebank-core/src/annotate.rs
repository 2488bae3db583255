//! Drawing per-face results onto a frame: colored box plus `label (score)` text.
//!
//! Text uses a built-in 5×7 bitmap font, so no font files are needed at
//! runtime. Lowercase letters render as uppercase.

use crate::live::{FaceAnnotation, FaceVerdict};
use image::{Rgb, RgbImage};

pub const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 165, 0]);
pub const LOW_CONFIDENCE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const BOX_THICKNESS: u32 = 2;
const TEXT_SCALE: u32 = 2;
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const TEXT_OFFSET: u32 = 10;

/// Rows of a 5×7 glyph, most significant of the low five bits = leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        ' ' => [0; 7],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04], // '?'
    }
}

fn put(frame: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < frame.width() && y < frame.height() {
        frame.put_pixel(x, y, color);
    }
}

fn fill_rect(frame: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = x.saturating_add(w).min(frame.width());
    let y_end = y.saturating_add(h).min(frame.height());
    for py in y..y_end {
        for px in x..x_end {
            frame.put_pixel(px, py, color);
        }
    }
}

/// Hollow rectangle `(x, y, w, h)`, clipped to the frame.
pub fn draw_box(frame: &mut RgbImage, (x, y, w, h): (u32, u32, u32, u32), color: Rgb<u8>) {
    let t = BOX_THICKNESS.min(w).min(h);
    fill_rect(frame, x, y, w, t, color);
    fill_rect(frame, x, (y + h).saturating_sub(t), w, t, color);
    fill_rect(frame, x, y, t, h, color);
    fill_rect(frame, (x + w).saturating_sub(t), y, t, h, color);
}

/// Render `text` with its top-left corner at `(x, y)`. Clipped to the frame.
pub fn draw_text(frame: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    let advance = (GLYPH_W + 1) * TEXT_SCALE;
    for (i, c) in text.chars().enumerate() {
        let gx = x + i as u32 * advance;
        if gx >= frame.width() {
            break;
        }
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for sy in 0..TEXT_SCALE {
                    for sx in 0..TEXT_SCALE {
                        put(
                            frame,
                            gx + col * TEXT_SCALE + sx,
                            y + row as u32 * TEXT_SCALE + sy,
                            color,
                        );
                    }
                }
            }
        }
    }
}

pub fn verdict_color(verdict: &FaceVerdict) -> Rgb<u8> {
    match verdict {
        FaceVerdict::Classified(c) if c.identity.is_known() => MATCH_COLOR,
        FaceVerdict::Classified(_) => UNKNOWN_COLOR,
        FaceVerdict::LowConfidence | FaceVerdict::Failed => LOW_CONFIDENCE_COLOR,
    }
}

/// Caption drawn above the box.
pub fn verdict_text(verdict: &FaceVerdict) -> String {
    match verdict {
        FaceVerdict::Classified(c) => format!("{} ({:.2})", c.identity, c.similarity),
        FaceVerdict::LowConfidence => "No face (0.00)".to_string(),
        FaceVerdict::Failed => "Error".to_string(),
    }
}

/// Draw one face's box and caption.
pub fn annotate(frame: &mut RgbImage, face: &FaceAnnotation) {
    let Some(rect) = face.bbox.clip_to(frame.width(), frame.height()) else {
        return;
    };
    let color = verdict_color(&face.verdict);
    draw_box(frame, rect, color);

    // Text bottom sits TEXT_OFFSET above the box, pinned to the frame top.
    let text_y = rect.1.saturating_sub(TEXT_OFFSET + GLYPH_H * TEXT_SCALE);
    draw_text(frame, rect.0, text_y, &verdict_text(&face.verdict), color);
}
