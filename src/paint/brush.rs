// Pencil and color-replace tools, sharing the same brush geometry.
use serde::{Deserialize, Serialize};

use crate::{
    common::{is_valid_color, ColorIdx, PixelCoord},
    grid::{PixelPoint, TileGridProvider},
    tileset::TileSet,
};

use super::{read_pixel, PixelEdits, Stroke, MAX_BRUSH_SIZE};

#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PatternOrigin {
    // Pattern cell (0, 0) sits under the pointer at stroke start.
    #[default]
    Pointer,
    // Pattern cell (0, 0) sits at grid pixel (0, 0).
    Fixed,
}

/// A tiling ink mask: 0 = skip, 1 = primary color, 2 = secondary color.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    width: usize,
    height: usize,
    cells: Vec<u8>,
    pub origin: PatternOrigin,
}

impl Pattern {
    pub fn new(rows: &[Vec<u8>], origin: PatternOrigin) -> Option<Self> {
        let height = rows.len();
        let width = rows.first()?.len();
        if width == 0 || rows.iter().any(|r| r.len() != width || r.iter().any(|&v| v > 2)) {
            return None;
        }
        Some(Pattern {
            width,
            height,
            cells: rows.concat(),
            origin,
        })
    }

    fn uses_secondary(&self) -> bool {
        self.cells.contains(&2)
    }

    fn value_at(&self, p: PixelPoint, stroke_origin: PixelPoint) -> u8 {
        let (ox, oy) = match self.origin {
            PatternOrigin::Pointer => (stroke_origin.x, stroke_origin.y),
            PatternOrigin::Fixed => (0, 0),
        };
        let x = (p.x as i64 - ox as i64).rem_euclid(self.width as i64) as usize;
        let y = (p.y as i64 - oy as i64).rem_euclid(self.height as i64) as usize;
        self.cells[y * self.width + x]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrushOptions {
    pub size: u32,
    pub color: ColorIdx,
    pub secondary_color: ColorIdx,
    pub clamp_to_tile: bool,
    pub pattern: Option<Pattern>,
}

impl Default for BrushOptions {
    fn default() -> Self {
        BrushOptions {
            size: 1,
            color: 1,
            secondary_color: 0,
            clamp_to_tile: false,
            pattern: None,
        }
    }
}

impl BrushOptions {
    fn colors_valid(&self) -> bool {
        let secondary_needed = self.pattern.as_ref().is_some_and(|p| p.uses_secondary());
        is_valid_color(self.color) && (!secondary_needed || is_valid_color(self.secondary_color))
    }

    // Ink for grid pixel `p`, or `None` if the pattern masks it out.
    fn ink_at(&self, p: PixelPoint, stroke: &Stroke) -> Option<ColorIdx> {
        match &self.pattern {
            None => Some(self.color),
            Some(pattern) => match pattern.value_at(p, stroke.origin) {
                1 => Some(self.color),
                2 => Some(self.secondary_color),
                _ => None,
            },
        }
    }
}

/// Grid pixels covered by a brush of `size` centered on `at`. Brushes of size 4
/// and up have rounded corners.
pub fn brush_footprint(at: PixelPoint, size: u32) -> Vec<PixelPoint> {
    let size = size.clamp(1, MAX_BRUSH_SIZE) as i64;
    let x0 = at.x as i64 - size / 2;
    let y0 = at.y as i64 - size / 2;
    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 / 2.0;
    let mut points = Vec::with_capacity((size * size) as usize);
    for dy in 0..size {
        for dx in 0..size {
            if size >= 4 {
                let fx = dx as f32 - center;
                let fy = dy as f32 - center;
                if fx * fx + fy * fy > radius * radius {
                    continue;
                }
            }
            // Pixels past the coordinate range cannot be on the grid.
            let (Ok(x), Ok(y)) = (PixelCoord::try_from(x0 + dx), PixelCoord::try_from(y0 + dy)) else {
                continue;
            };
            points.push(PixelPoint::new(x, y));
        }
    }
    points
}

fn paint_footprint<G: TileGridProvider + ?Sized>(
    grid: &G,
    tileset: &TileSet,
    stroke: &Stroke,
    at: PixelPoint,
    opts: &BrushOptions,
    only_color: Option<ColorIdx>,
) -> PixelEdits {
    let mut edits = PixelEdits::default();
    if !opts.colors_valid() {
        return edits;
    }
    if opts.clamp_to_tile && stroke.tile_index.is_none() {
        return edits;
    }
    for p in brush_footprint(at, opts.size) {
        let Some(sample) = read_pixel(grid, tileset, p) else {
            continue;
        };
        if opts.clamp_to_tile && Some(sample.info.index) != stroke.tile_index {
            continue;
        }
        if only_color.is_some_and(|c| c != sample.color) {
            continue;
        }
        if let Some(ink) = opts.ink_at(p, stroke) {
            edits.push(&sample.info, sample.tile_xy, ink);
        }
    }
    edits
}

/// Pencil: paints the brush footprint centered on `at`.
pub fn brush<G: TileGridProvider + ?Sized>(
    grid: &G,
    tileset: &TileSet,
    stroke: &Stroke,
    at: PixelPoint,
    opts: &BrushOptions,
) -> PixelEdits {
    paint_footprint(grid, tileset, stroke, at, opts, None)
}

/// Brush-shaped recolor: only pixels whose current color equals the color
/// sampled at stroke start are repainted.
pub fn color_replace<G: TileGridProvider + ?Sized>(
    grid: &G,
    tileset: &TileSet,
    stroke: &Stroke,
    at: PixelPoint,
    opts: &BrushOptions,
) -> PixelEdits {
    match stroke.start_color {
        Some(start) if start != opts.color || opts.pattern.is_some() => {
            paint_footprint(grid, tileset, stroke, at, opts, Some(start))
        }
        _ => PixelEdits::default(),
    }
}
