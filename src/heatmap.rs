//! Heatmap rendering of confusion labels.
//!
//! The label matrix is drawn transposed: the block at image column `x`, image
//! row `y` shows `labels[x][y]`. A legend with one swatch per outcome sits to
//! the right of the heatmap.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::debug;

use crate::error::open_error;
use crate::metrics::{ConfusionMatrix, Outcome};
use crate::Result;

pub const DEFAULT_DPI: u32 = 300;

/// Longer side of the heatmap area in pixels, before rounding to whole cells.
const TARGET_SIDE: u32 = 600;
const MARGIN: u32 = 16;
const LEGEND_GAP: u32 = 24;
const SWATCH: u32 = 24;
const SWATCH_SPACING: u32 = 12;
const TEXT_GAP: u32 = 10;
const TEXT_SCALE: u32 = 3;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);
const OUTLINE: Rgb<u8> = Rgb([64, 64, 64]);

/// Cool-to-warm diverging scale sampled at label values 1, 2, 3 and 4.
const PALETTE: [Rgb<u8>; 4] = [
    Rgb([59, 76, 192]),
    Rgb([170, 199, 253]),
    Rgb([247, 184, 156]),
    Rgb([180, 4, 38]),
];

pub fn color(outcome: Outcome) -> Rgb<u8> {
    PALETTE[usize::from(outcome.code() - 1)]
}

/// Pixel geometry of a rendered heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Side of one matrix cell in pixels.
    pub cell: u32,
    pub heatmap_width: u32,
    pub heatmap_height: u32,
    pub legend_x: u32,
    pub width: u32,
    pub height: u32,
}

impl Layout {
    /// Layout for a label matrix of `rows` x `cols` cells.
    pub fn new(rows: usize, cols: usize) -> Self {
        let longest = rows.max(cols).max(1) as u32;
        let cell = (TARGET_SIDE / longest).max(1);
        // transposed: matrix rows run along the x axis
        let heatmap_width = rows as u32 * cell;
        let heatmap_height = cols as u32 * cell;

        let legend_x = MARGIN + heatmap_width + LEGEND_GAP;
        let width = legend_x + legend_width() + MARGIN;
        let height = MARGIN + heatmap_height.max(legend_height()) + MARGIN;

        Self {
            cell,
            heatmap_width,
            heatmap_height,
            legend_x,
            width,
            height,
        }
    }

    /// Top left corner of legend entry `index`.
    fn swatch_origin(&self, index: u32) -> (u32, u32) {
        (self.legend_x, MARGIN + index * (SWATCH + SWATCH_SPACING))
    }
}

fn legend_name(outcome: Outcome) -> String {
    outcome.name().to_uppercase()
}

fn legend_width() -> u32 {
    let longest = Outcome::ALL
        .iter()
        .map(|&o| legend_name(o).len() as u32)
        .max()
        .unwrap_or(0);
    SWATCH + TEXT_GAP + longest * glyph_advance()
}

fn legend_height() -> u32 {
    let n = Outcome::ALL.len() as u32;
    n * SWATCH + (n - 1) * SWATCH_SPACING
}

/// Draws the heatmap and its legend.
pub fn render(cm: &ConfusionMatrix) -> RgbImage {
    let labels = cm.labels();
    let (rows, cols) = labels.dim();
    let layout = Layout::new(rows, cols);
    debug!(?layout, rows, cols, "rendering heatmap");

    let mut img = RgbImage::from_pixel(layout.width, layout.height, BACKGROUND);

    for ((row, col), &code) in labels.indexed_iter() {
        let Some(outcome) = Outcome::from_code(code) else {
            continue;
        };
        let x = MARGIN + row as u32 * layout.cell;
        let y = MARGIN + col as u32 * layout.cell;
        fill_rect(&mut img, x, y, layout.cell, layout.cell, color(outcome));
    }

    for (index, &outcome) in Outcome::ALL.iter().enumerate() {
        let (x, y) = layout.swatch_origin(index as u32);
        fill_rect(&mut img, x, y, SWATCH, SWATCH, OUTLINE);
        fill_rect(&mut img, x + 1, y + 1, SWATCH - 2, SWATCH - 2, color(outcome));

        let text_y = y + (SWATCH - GLYPH_HEIGHT * TEXT_SCALE) / 2;
        draw_text(&mut img, x + SWATCH + TEXT_GAP, text_y, &legend_name(outcome), INK);
    }

    img
}

/// Writes `img` as PNG, recording `dpi` as its physical resolution.
pub fn save_png(img: &RgbImage, path: &Path, dpi: u32) -> Result<()> {
    let file = File::create(path).map_err(|err| open_error(path, err))?;

    let mut encoder = png::Encoder::new(BufWriter::new(file), img.width(), img.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let per_metre = (f64::from(dpi) / 0.0254).round() as u32;
    encoder.set_pixel_dims(Some(png::PixelDimensions {
        xppu: per_metre,
        yppu: per_metre,
        unit: png::Unit::Meter,
    }));

    let mut writer = encoder.write_header()?;
    writer.write_image_data(img.as_raw())?;
    writer.finish()?;

    debug!(path = %path.display(), width = img.width(), height = img.height(), dpi, "wrote png");
    Ok(())
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn glyph_advance() -> u32 {
    (GLYPH_WIDTH + 1) * TEXT_SCALE
}

/// 5x7 bitmaps, one byte per row, most significant of the low five bits on the left.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        'A' => [0x0e, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
        'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
        'F' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10],
        'G' => [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0f],
        'I' => [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
        'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
        'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
        'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04],
        _ => return None,
    };
    Some(rows)
}

fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        let origin_x = x + i as u32 * glyph_advance();
        for (gy, bits) in rows.iter().enumerate() {
            for gx in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - gx)) != 0 {
                    fill_rect(
                        img,
                        origin_x + gx * TEXT_SCALE,
                        y + gy as u32 * TEXT_SCALE,
                        TEXT_SCALE,
                        TEXT_SCALE,
                        color,
                    );
                }
            }
        }
    }
}
