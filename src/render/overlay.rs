// Compositing of the cached base bitmap with the reference image and the
// editor overlays. Nothing here writes to the cache.
use crate::{
    common::{ColorRGB, ColorRGBA, TILE_SIZE},
    grid::{PixelPoint, TileGridProvider},
    helpers::{alpha_blend, checker_color},
    paint::brush_footprint,
    tilemap::{TileBlock, TileRegion},
};

use super::{Bitmap, ReferenceOrder, RenderCache, RenderPalette, RenderState};

const HIGHLIGHT_COLOR: ColorRGB = [255, 255, 255];
const HIGHLIGHT_ALPHA: f32 = 0.35;
const STAMP_PREVIEW_ALPHA: f32 = 0.75;
const WHITE: ColorRGBA = [255, 255, 255, 255];
const BLACK: ColorRGBA = [0, 0, 0, 255];
const DASH: i64 = 4;
// Below this zoom the pixel grid would cover most of the image.
pub const PIXEL_GRID_MIN_SCALE: usize = 4;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HighlightMode {
    #[default]
    None,
    Pixel,
    Tile,
    TileBlock,
    Row,
    Column,
    RowBlock,
    ColumnBlock,
    // The four boundary modes mark the insertion line nearest the cursor.
    RowBoundary,
    ColumnBoundary,
    RowBlockBoundary,
    ColumnBlockBoundary,
}

/// A pending tile stamp, previewed with its top-left cell under `at`.
#[derive(Clone, Debug, PartialEq)]
pub struct StampPreview {
    pub block: TileBlock,
    pub at: PixelPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Overlays {
    pub show_tile_grid: bool,
    // Only drawn at scale `PIXEL_GRID_MIN_SCALE` and above.
    pub show_pixel_grid: bool,
    pub grid_color: ColorRGB,
    pub grid_opacity: f32,
    pub highlight: HighlightMode,
    pub tiles_per_block: usize,
    pub cursor: Option<PixelPoint>,
    // Brush outline drawn around the cursor; 0 hides it.
    pub brush_size: u32,
    pub selected_tile: Option<usize>,
    pub selection: Option<TileRegion>,
    pub reference: Option<super::ReferenceImage>,
    pub stamp_preview: Option<StampPreview>,
}

impl Default for Overlays {
    fn default() -> Self {
        Overlays {
            show_tile_grid: false,
            show_pixel_grid: false,
            grid_color: [255, 255, 255],
            grid_opacity: 0.5,
            highlight: HighlightMode::None,
            tiles_per_block: 2,
            cursor: None,
            brush_size: 0,
            selected_tile: None,
            selection: None,
            reference: None,
            stamp_preview: None,
        }
    }
}

// Source-over of `src` (with extra `opacity`) onto `dst`.
fn over(dst: ColorRGBA, src: ColorRGBA, opacity: f32) -> ColorRGBA {
    let alpha = src[3] as f32 / 255.0 * opacity;
    if alpha <= 0.0 {
        return dst;
    }
    if dst[3] == 0 {
        return [src[0], src[1], src[2], (alpha * 255.0).round() as u8];
    }
    let [r, g, b] = alpha_blend([dst[0], dst[1], dst[2]], [src[0], src[1], src[2]], alpha);
    [r, g, b, dst[3].max((alpha * 255.0).round() as u8)]
}

fn compose_layers(cache: &RenderCache, state: &RenderState, checkerboard: bool) -> Bitmap {
    let base = cache.base();
    let scale = cache.scale();
    let reference = state.overlays.reference.as_ref();
    let mut out = Bitmap::new(base.width(), base.height());
    for y in 0..base.height() {
        for x in 0..base.width() {
            let background = if checkerboard {
                let [r, g, b] = checker_color(x, y, scale * TILE_SIZE / 2);
                [r, g, b, 255]
            } else {
                [0, 0, 0, 0]
            };
            let sample = reference.and_then(|r| {
                let gx = (x as f32 + 0.5) / scale as f32;
                let gy = (y as f32 + 0.5) / scale as f32;
                r.sample(gx, gy).map(|c| (c, r.opacity, r.order))
            });
            let mut px = background;
            if let Some((c, opacity, ReferenceOrder::Under)) = sample {
                px = over(px, c, opacity);
            }
            if let Some(b) = base.get(x, y).filter(|b| b[3] != 0) {
                px = b;
            }
            match sample {
                Some((c, opacity, ReferenceOrder::Substitute(idx)))
                    if cache.index_at(x / scale, y / scale) == Some(idx) =>
                {
                    px = over(background, c, opacity);
                }
                Some((c, opacity, ReferenceOrder::Over)) => px = over(px, c, opacity),
                _ => {}
            }
            out.set(x, y, px);
        }
    }
    out
}

/// The grid as exported: base image plus the reference image, without the
/// checkerboard or editor overlays. Transparent pixels keep alpha 0.
pub fn flatten(cache: &RenderCache, state: &RenderState) -> Bitmap {
    compose_layers(cache, state, false)
}

/// The full editor view of the grid.
pub fn compose(cache: &mut RenderCache, state: &RenderState) -> Bitmap {
    let mut out = compose_layers(cache, state, true);
    let scale = cache.scale() as i64;
    let overlays = &state.overlays;
    let grid = state.grid();

    if overlays.show_pixel_grid && scale >= PIXEL_GRID_MIN_SCALE as i64 {
        draw_grid_lines(&mut out, scale, overlays.grid_color, overlays.grid_opacity * 0.5);
    }
    if overlays.show_tile_grid {
        draw_grid_lines(
            &mut out,
            scale * TILE_SIZE as i64,
            overlays.grid_color,
            overlays.grid_opacity,
        );
    }
    if let Some(preview) = &overlays.stamp_preview {
        let palettes = cache.render_palettes(state).to_vec();
        draw_stamp_preview(&mut out, state, &palettes, preview, scale);
    }
    if let Some(cursor) = overlays.cursor {
        draw_highlight(&mut out, grid, overlays, cursor, scale);
        if overlays.brush_size > 0 && grid.is_in_bounds(cursor) {
            draw_brush_outline(&mut out, cursor, overlays.brush_size, scale);
        }
    }
    if let Some(index) = overlays.selected_tile {
        if let Ok(p) = grid.pixel_of(index) {
            let t = TILE_SIZE as i64;
            draw_dashed_rect(&mut out, p.x as i64 * scale, p.y as i64 * scale, t * scale, t * scale);
        }
    }
    if let Some(region) = overlays.selection {
        let t = TILE_SIZE as i64 * scale;
        draw_dashed_rect(
            &mut out,
            region.column as i64 * t,
            region.row as i64 * t,
            region.columns as i64 * t,
            region.rows as i64 * t,
        );
    }
    out
}

fn draw_grid_lines(out: &mut Bitmap, step: i64, color: ColorRGB, opacity: f32) {
    let (w, h) = (out.width() as i64, out.height() as i64);
    for y in 0..h {
        for x in 0..w {
            if x % step == 0 || y % step == 0 {
                out.blend(x, y, color, opacity);
            }
        }
    }
}

fn fill_rect_blend(out: &mut Bitmap, x: i64, y: i64, w: i64, h: i64, color: ColorRGB, alpha: f32) {
    for yy in y.max(0)..(y + h).min(out.height() as i64) {
        for xx in x.max(0)..(x + w).min(out.width() as i64) {
            out.blend(xx, yy, color, alpha);
        }
    }
}

// Alternating white and black dashes along the rectangle's inner border,
// walked clockwise from the top-left corner.
fn draw_dashed_rect(out: &mut Bitmap, x: i64, y: i64, w: i64, h: i64) {
    if w <= 0 || h <= 0 {
        return;
    }
    let top = (0..w).map(|i| (x + i, y));
    let right = (1..h).map(|i| (x + w - 1, y + i));
    let bottom = (1..w).map(|i| (x + w - 1 - i, y + h - 1));
    let left = (1..h - 1).map(|i| (x, y + h - 1 - i));
    for (pos, (px, py)) in top.chain(right).chain(bottom).chain(left).enumerate() {
        let c = if (pos as i64 / DASH) % 2 == 0 { WHITE } else { BLACK };
        out.set_clipped(px, py, c);
    }
}

fn draw_brush_outline(out: &mut Bitmap, cursor: PixelPoint, size: u32, scale: i64) {
    let points = brush_footprint(cursor, size);
    let (Some(x0), Some(x1), Some(y0), Some(y1)) = (
        points.iter().map(|p| p.x).min(),
        points.iter().map(|p| p.x).max(),
        points.iter().map(|p| p.y).min(),
        points.iter().map(|p| p.y).max(),
    ) else {
        return;
    };
    draw_dashed_rect(
        out,
        x0 as i64 * scale,
        y0 as i64 * scale,
        (x1 - x0 + 1) as i64 * scale,
        (y1 - y0 + 1) as i64 * scale,
    );
}

fn draw_highlight(out: &mut Bitmap, grid: &dyn TileGridProvider, overlays: &Overlays, cursor: PixelPoint, scale: i64) {
    let info = grid.row_column_info(cursor, overlays.tiles_per_block);
    let t = TILE_SIZE as i64;
    let b = t * overlays.tiles_per_block.max(1) as i64;
    let w = grid.pixel_width() as i64;
    let h = grid.pixel_height() as i64;
    // Rectangle in grid pixels, or a boundary line.
    let rect = match overlays.highlight {
        HighlightMode::None => None,
        _ if !info.is_in_bounds
            && !matches!(
                overlays.highlight,
                HighlightMode::RowBoundary
                    | HighlightMode::ColumnBoundary
                    | HighlightMode::RowBlockBoundary
                    | HighlightMode::ColumnBlockBoundary
            ) =>
        {
            None
        }
        HighlightMode::Pixel => Some((cursor.x as i64, cursor.y as i64, 1, 1)),
        HighlightMode::Tile => Some((info.clamped_column as i64 * t, info.clamped_row as i64 * t, t, t)),
        HighlightMode::TileBlock => Some((
            info.clamped_block_column as i64 * b,
            info.clamped_block_row as i64 * b,
            b,
            b,
        )),
        HighlightMode::Row => Some((0, info.clamped_row as i64 * t, w, t)),
        HighlightMode::Column => Some((info.clamped_column as i64 * t, 0, t, h)),
        HighlightMode::RowBlock => Some((0, info.clamped_block_row as i64 * b, w, b)),
        HighlightMode::ColumnBlock => Some((info.clamped_block_column as i64 * b, 0, b, h)),
        HighlightMode::RowBoundary => {
            draw_boundary(out, None, Some((info.nearest_row as i64 * t).min(h)), w, h, scale);
            None
        }
        HighlightMode::ColumnBoundary => {
            draw_boundary(out, Some((info.nearest_column as i64 * t).min(w)), None, w, h, scale);
            None
        }
        HighlightMode::RowBlockBoundary => {
            draw_boundary(out, None, Some((info.nearest_block_row as i64 * b).min(h)), w, h, scale);
            None
        }
        HighlightMode::ColumnBlockBoundary => {
            draw_boundary(out, Some((info.nearest_block_column as i64 * b).min(w)), None, w, h, scale);
            None
        }
    };
    if let Some((x, y, rw, rh)) = rect {
        // Clip to the grid: blocks at the right or bottom edge may be partial.
        let x1 = (x + rw).min(w);
        let y1 = (y + rh).min(h);
        fill_rect_blend(
            out,
            x * scale,
            y * scale,
            (x1 - x) * scale,
            (y1 - y) * scale,
            HIGHLIGHT_COLOR,
            HIGHLIGHT_ALPHA,
        );
    }
}

// A two-pixel line on the boundary at grid x (vertical) or grid y (horizontal).
fn draw_boundary(out: &mut Bitmap, x: Option<i64>, y: Option<i64>, w: i64, h: i64, scale: i64) {
    if let Some(x) = x {
        fill_rect_blend(out, x * scale - 1, 0, 2, h * scale, HIGHLIGHT_COLOR, 1.0);
    }
    if let Some(y) = y {
        fill_rect_blend(out, 0, y * scale - 1, w * scale, 2, HIGHLIGHT_COLOR, 1.0);
    }
}

fn draw_stamp_preview(
    out: &mut Bitmap,
    state: &RenderState,
    palettes: &[RenderPalette],
    preview: &StampPreview,
    scale: i64,
) {
    let grid = state.grid();
    let anchor = grid.row_column_info(preview.at, 1);
    let rows = grid.row_count() as i64;
    let columns = grid.column_count() as i64;
    let t = TILE_SIZE as i64;
    for r in 0..preview.block.rows {
        for c in 0..preview.block.columns {
            let row = anchor.row as i64 + r as i64;
            let column = anchor.column as i64 + c as i64;
            if row < 0 || column < 0 || row >= rows || column >= columns {
                continue;
            }
            let Some(cell) = preview.block.get(r, c) else {
                continue;
            };
            let Some(tile) = state.tileset.by_id(cell.tile_id) else {
                continue;
            };
            // Color resolution as if the cell were already placed.
            let mut info = match grid.tile_index_by_coordinate(row as usize, column as usize) {
                Ok(Some(index)) => match grid.tile_info_by_index(index) {
                    Ok(info) => info,
                    Err(_) => continue,
                },
                _ => continue,
            };
            info.tile_id = cell.tile_id;
            info.flip = cell.flip;
            info.palette_slot = cell.palette_slot;
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    let (tx, ty) = cell.flip.map_pixel(x, y);
                    let Some(color) = state.color_of(palettes, &info, tile.pixels()[ty][tx]) else {
                        continue;
                    };
                    let gx = column * t + x as i64;
                    let gy = row * t + y as i64;
                    fill_rect_blend(out, gx * scale, gy * scale, scale, scale, color, STAMP_PREVIEW_ALPHA);
                }
            }
        }
    }
}
