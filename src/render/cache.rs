// Incrementally maintained base bitmap of the displayed grid.
use itertools::Itertools;
use log::debug;

use crate::{
    common::{ColorIdx, ColorRGB, TILE_SIZE},
    grid::TileGridProvider,
    helpers::{alpha_blend, checker_color},
    message::ChangeNotification,
};

use super::{derive_render_palettes, Bitmap, RenderPalette, RenderState};

// Marks grid pixels with no tile behind them in the index plane.
pub const UNPOPULATED: ColorIdx = u8::MAX;

const PLACEHOLDER_TINT: ColorRGB = [255, 0, 0];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheState {
    Clean,
    #[default]
    DirtyFull,
    // Sorted, deduplicated cell indices awaiting a re-blit.
    DirtyPartial(Vec<usize>),
}

/// What a redraw pass did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Redraw {
    None,
    Full,
    Partial(Vec<usize>),
}

#[derive(Clone, Debug, Default)]
pub struct RenderCache {
    state: CacheState,
    scale: usize,
    base: Bitmap,
    // Color index of every grid pixel, unscaled.
    index_plane: Vec<ColorIdx>,
    plane_width: usize,
    plane_height: usize,
    palettes: Option<Vec<RenderPalette>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    pub fn is_clean(&self) -> bool {
        self.state == CacheState::Clean
    }

    pub fn scale(&self) -> usize {
        self.scale.max(1)
    }

    pub fn base(&self) -> &Bitmap {
        &self.base
    }

    /// Color index at grid pixel (`x`, `y`), or `None` where no tile is drawn.
    pub fn index_at(&self, x: usize, y: usize) -> Option<ColorIdx> {
        if x >= self.plane_width || y >= self.plane_height {
            return None;
        }
        let c = self.index_plane[y * self.plane_width + x];
        (c != UNPOPULATED).then_some(c)
    }

    /// Display palettes, derived on demand and kept until palettes change.
    pub fn render_palettes(&mut self, state: &RenderState) -> &[RenderPalette] {
        self.palettes.get_or_insert_with(|| {
            derive_render_palettes(&state.palettes, state.locked_slot, state.native_colors)
        })
    }

    pub fn invalidate_full(&mut self) {
        self.state = CacheState::DirtyFull;
    }

    pub fn invalidate_palettes(&mut self) {
        self.palettes = None;
        self.invalidate_full();
    }

    pub fn invalidate_tiles(&mut self, indices: impl IntoIterator<Item = usize>) {
        let queued = match &mut self.state {
            CacheState::DirtyFull => return,
            CacheState::Clean => vec![],
            CacheState::DirtyPartial(queued) => std::mem::take(queued),
        };
        let queued: Vec<usize> = queued.into_iter().chain(indices).sorted().dedup().collect();
        self.state = if queued.is_empty() {
            CacheState::Clean
        } else {
            CacheState::DirtyPartial(queued)
        };
    }

    // Indexes outside the grid are ignored.
    pub fn notify(&mut self, change: &ChangeNotification, grid: &dyn TileGridProvider) {
        if change.redraw_full {
            self.invalidate_full();
            return;
        }
        let count = grid.tile_count();
        let mut indices: Vec<usize> = change
            .updated_tile_indexes
            .iter()
            .flatten()
            .copied()
            .filter(|&i| i < count)
            .collect();
        for &id in change.updated_tile_ids.iter().flatten() {
            indices.extend(grid.tile_id_indexes(id));
        }
        self.invalidate_tiles(indices);
    }

    /// Brings the base bitmap up to date with `state`.
    pub fn redraw(&mut self, state: &RenderState) -> Redraw {
        let grid = state.grid();
        let plane_width = grid.pixel_width();
        let plane_height = grid.pixel_height();
        if self.scale != state.scale()
            || self.plane_width != plane_width
            || self.plane_height != plane_height
        {
            self.state = CacheState::DirtyFull;
        }
        let palettes = self.render_palettes(state).to_vec();
        match std::mem::replace(&mut self.state, CacheState::Clean) {
            CacheState::Clean => Redraw::None,
            CacheState::DirtyFull => {
                self.scale = state.scale();
                self.plane_width = plane_width;
                self.plane_height = plane_height;
                self.base = Bitmap::new(plane_width * self.scale, plane_height * self.scale);
                self.index_plane = vec![UNPOPULATED; plane_width * plane_height];
                for index in 0..grid.tile_count() {
                    self.blit(state, &palettes, index);
                }
                debug!(
                    "Full redraw: {} cells at {}x{} (scale {})",
                    grid.tile_count(),
                    plane_width,
                    plane_height,
                    self.scale
                );
                Redraw::Full
            }
            CacheState::DirtyPartial(indices) => {
                for &index in &indices {
                    self.blit(state, &palettes, index);
                }
                debug!("Partial redraw of {} cells", indices.len());
                Redraw::Partial(indices)
            }
        }
    }

    fn put(&mut self, gx: usize, gy: usize, index: ColorIdx, color: [u8; 4]) {
        if gx >= self.plane_width || gy >= self.plane_height {
            return;
        }
        self.index_plane[gy * self.plane_width + gx] = index;
        let s = self.scale;
        self.base.fill_rect(gx * s, gy * s, s, s, color);
    }

    fn blit(&mut self, state: &RenderState, palettes: &[RenderPalette], index: usize) {
        let Ok(info) = state.grid().tile_info_by_index(index) else {
            return;
        };
        let x0 = info.column * TILE_SIZE;
        let y0 = info.row * TILE_SIZE;
        let Some(tile) = state.tileset.by_id(info.tile_id) else {
            // Dangling reference: a tinted checkerboard.
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    let [r, g, b] = alpha_blend(checker_color(x, y, 2), PLACEHOLDER_TINT, 0.5);
                    self.put(x0 + x, y0 + y, UNPOPULATED, [r, g, b, 255]);
                }
            }
            return;
        };
        let pixels = *tile.pixels();
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let (tx, ty) = info.flip.map_pixel(x, y);
                let c = pixels[ty][tx];
                let color = match state.color_of(palettes, &info, c) {
                    Some([r, g, b]) => [r, g, b, 255],
                    None => [0, 0, 0, 0],
                };
                self.put(x0 + x, y0 + y, c, color);
            }
        }
    }
}
