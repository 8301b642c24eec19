mod bitmap;
mod cache;
mod overlay;
mod reference;

pub use bitmap::Bitmap;
pub use cache::{CacheState, Redraw, RenderCache};
pub use overlay::{compose, flatten, HighlightMode, Overlays, StampPreview, PIXEL_GRID_MIN_SCALE};
pub use reference::{ReferenceImage, ReferenceOrder};

use crate::{
    common::{ColorIdx, ColorRGB, PALETTE_SIZE},
    grid::{TileGridProvider, TileInfo},
    palette::Palette,
    tilemap::TileMap,
    tileset::TileSet,
};

pub type RenderPalette = [ColorRGB; PALETTE_SIZE];

// Shown for color indices when no palette is available at all.
const GRAY_RAMP: RenderPalette = {
    let mut ramp = [[0; 3]; PALETTE_SIZE];
    let mut i = 0;
    while i < PALETTE_SIZE {
        let v = (i * 17) as u8;
        ramp[i] = [v, v, v];
        i += 1;
    }
    ramp
};

/// The grid being displayed: the tile set laid out by its own width, or a tile map.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderGrid {
    TileSet,
    TileMap(TileMap),
}

/// Everything the renderer draws from.
#[derive(Clone, Debug)]
pub struct RenderState {
    pub tileset: TileSet,
    pub grid: RenderGrid,
    pub palettes: Vec<Palette>,
    // Palette used when the tile set itself is displayed.
    pub tileset_palette: usize,
    pub scale: usize,
    pub offset: (i32, i32),
    pub locked_slot: Option<ColorIdx>,
    pub native_colors: bool,
    pub transparency_index: Option<ColorIdx>,
    pub overlays: Overlays,
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            tileset: TileSet::default(),
            grid: RenderGrid::TileSet,
            palettes: vec![],
            tileset_palette: 0,
            scale: 2,
            offset: (0, 0),
            locked_slot: None,
            native_colors: false,
            transparency_index: Some(0),
            overlays: Overlays::default(),
        }
    }
}

impl RenderState {
    pub fn grid(&self) -> &dyn TileGridProvider {
        match &self.grid {
            RenderGrid::TileSet => &self.tileset,
            RenderGrid::TileMap(map) => map,
        }
    }

    pub fn scale(&self) -> usize {
        self.scale.max(1)
    }

    /// Position in `palettes` of the palette used to draw the cell `info`.
    pub fn palette_index(&self, info: &TileInfo) -> Option<usize> {
        let index = match &self.grid {
            RenderGrid::TileSet => self.tileset_palette,
            RenderGrid::TileMap(map) => match map.palette_for_slot(info.palette_slot) {
                Some(id) => self.palettes.iter().position(|p| p.id == id)?,
                None => info.palette_slot as usize,
            },
        };
        (index < self.palettes.len()).then_some(index)
    }

    /// Displayed color of index `c` in the cell `info`, or `None` if it is
    /// the transparent index.
    pub(crate) fn color_of(&self, palettes: &[RenderPalette], info: &TileInfo, c: ColorIdx) -> Option<ColorRGB> {
        if self.transparency_index == Some(c) {
            return None;
        }
        let palette = self
            .palette_index(info)
            .and_then(|i| palettes.get(i))
            .unwrap_or(&GRAY_RAMP);
        palette.get(c as usize).copied()
    }
}

/// Derives the palettes used for display. A locked slot takes its color from
/// palette 0.
pub fn derive_render_palettes(palettes: &[Palette], locked_slot: Option<ColorIdx>, native: bool) -> Vec<RenderPalette> {
    let locked = locked_slot
        .filter(|&s| (s as usize) < PALETTE_SIZE)
        .zip(palettes.first())
        .map(|(s, first)| (s as usize, first.colors[s as usize]));
    palettes
        .iter()
        .map(|p| {
            let mut colors = p.colors;
            if let Some((slot, color)) = locked {
                colors[slot] = color;
            }
            if native {
                colors = colors.map(|c| p.system.round(c));
            }
            colors
        })
        .collect()
}
