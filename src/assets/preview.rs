//! Inspector thumbnail and the placeholder texture used by the exporter.

use crate::assets::TextureAsset;
use crate::scene::Color;
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

pub const THUMBNAIL_SIZE: u32 = 80;
pub const PLACEHOLDER_SIZE: u32 = 256;
const CHECKER_CELL: u32 = 10;
const GRID_SPACING: u32 = 32;
const GRID_WIDTH: u32 = 2;
const GLYPH_SCALE: u32 = 2;

/// What the texture panel shows for the current selection.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub image: RgbaImage,
    /// Overlay text when there is no texture to show.
    pub label: Option<&'static str>,
    pub source_key: Option<String>,
}

impl Thumbnail {
    pub fn of_texture(texture: &TextureAsset) -> Self {
        let image = image::imageops::resize(
            &*texture.pixels,
            THUMBNAIL_SIZE,
            THUMBNAIL_SIZE,
            FilterType::Triangle,
        );
        Self {
            image,
            label: None,
            source_key: Some(texture.key.clone()),
        }
    }

    pub fn empty() -> Self {
        let dark = Rgba([0x33, 0x33, 0x33, 255]);
        let light = Rgba([0x66, 0x66, 0x66, 255]);
        let image = RgbaImage::from_fn(THUMBNAIL_SIZE, THUMBNAIL_SIZE, |x, y| {
            if ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0 {
                dark
            } else {
                light
            }
        });
        Self {
            image,
            label: Some("No Texture"),
            source_key: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.label.is_some()
    }
}

/// Solid texture in `color` with a white grid and a two line label, marking
/// a texture whose source bytes were lost.
pub fn placeholder_texture(color: Color) -> RgbaImage {
    let [r, g, b] = color.rgb8();
    let white = Rgba([255, 255, 255, 255]);
    let mut image = RgbaImage::from_pixel(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, Rgba([r, g, b, 255]));

    for line in (0..=PLACEHOLDER_SIZE).step_by(GRID_SPACING as usize) {
        let start = line.saturating_sub(GRID_WIDTH / 2);
        let end = (line + GRID_WIDTH / 2).min(PLACEHOLDER_SIZE);
        for offset in start..end {
            for along in 0..PLACEHOLDER_SIZE {
                image.put_pixel(offset, along, white);
                image.put_pixel(along, offset, white);
            }
        }
    }

    draw_label(&mut image, "TEXTURE", PLACEHOLDER_SIZE / 2, 100, white);
    draw_label(&mut image, "PLACEHOLDER", PLACEHOLDER_SIZE / 2, 130, white);
    image
}

/// Draws `text` centred on `center_x` with its baseline at `baseline`.
fn draw_label(image: &mut RgbaImage, text: &str, center_x: u32, baseline: u32, color: Rgba<u8>) {
    let advance = (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    let text_width = advance * text.chars().count() as u32 - GLYPH_SCALE;
    let left = center_x.saturating_sub(text_width / 2);
    let top = baseline.saturating_sub(GLYPH_HEIGHT * GLYPH_SCALE);

    for (index, ch) in text.chars().enumerate() {
        let Some(rows) = glyph(ch) else {
            continue;
        };
        let origin_x = left + index as u32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let x = origin_x + col * GLYPH_SCALE + dx;
                        let y = top + row as u32 * GLYPH_SCALE + dy;
                        if x < image.width() && y < image.height() {
                            image.put_pixel(x, y, color);
                        }
                    }
                }
            }
        }
    }
}

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

// 5x7 bitmaps, one byte per row, high bit on the left.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0x0e, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'C' => [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e],
        'D' => [0x1e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1e],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'H' => [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'X' => [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_thumbnail_is_checkerboard() {
        let thumb = Thumbnail::empty();
        assert!(thumb.is_placeholder());
        assert_eq!(thumb.label, Some("No Texture"));
        assert_eq!(thumb.image.dimensions(), (80, 80));
        assert_ne!(thumb.image.get_pixel(0, 0), thumb.image.get_pixel(10, 0));
        assert_eq!(thumb.image.get_pixel(0, 0), thumb.image.get_pixel(10, 10));
    }

    #[test]
    fn test_texture_thumbnail_is_downscaled() {
        let texture = TextureAsset {
            key: "big.png".to_string(),
            pixels: Arc::new(RgbaImage::from_pixel(300, 200, Rgba([9, 8, 7, 255]))),
            wrap: crate::assets::WrapMode::Repeat,
        };
        let thumb = Thumbnail::of_texture(&texture);
        assert!(!thumb.is_placeholder());
        assert_eq!(thumb.image.dimensions(), (80, 80));
        assert_eq!(thumb.source_key.as_deref(), Some("big.png"));
        let centre = thumb.image.get_pixel(40, 40).0;
        for (got, want) in centre.iter().zip([9u8, 8, 7, 255]) {
            assert!(got.abs_diff(want) <= 1);
        }
    }

    #[test]
    fn test_placeholder_has_grid_and_label() {
        let image = placeholder_texture(Color(0x804020));
        assert_eq!(image.dimensions(), (256, 256));
        let white = &Rgba([255, 255, 255, 255]);
        // Grid line at x = 32 covers columns 31 and 32.
        assert_eq!(image.get_pixel(32, 5), white);
        assert_eq!(image.get_pixel(31, 5), white);
        assert_eq!(image.get_pixel(40, 40), &Rgba([0x80, 0x40, 0x20, 255]));

        // Label pixels land between the grid lines around the centre.
        let label_pixels = (86..100u32)
            .flat_map(|y| (40..220u32).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                let off_grid = (2..31).contains(&(x % 32)) && (2..31).contains(&(y % 32));
                off_grid && image.get_pixel(x, y) == white
            })
            .count();
        assert!(label_pixels > 50, "only {label_pixels} label pixels");
    }
}
