use std::path::PathBuf;

use anyhow::{bail, ensure, Context, Result};
use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    common::{ColorIdx, PaletteSlot, MAX_GRID_DIMENSION, MAX_PALETTE_SLOTS},
    config::{get_config_path, EditorConfig},
    grid::{TileGridProvider, TileInfo},
    message::ChangeNotification,
    paint::{BrushOptions, Stroke},
    palette::{Palette, PaletteId, PaletteSystem},
    persist,
    render::{Overlays, RenderGrid, RenderState},
    tile::{Flip, TileId},
    tilemap::{TileBlock, TileMap},
    tileset::TileSet,
    undo::UndoSnapshot,
    worker::RenderUpdate,
};

/// All persistent data of a project.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Project {
    pub palettes: Vec<Palette>,
    pub tileset: TileSet,
    pub tilemaps: Vec<TileMap>,
}

impl Project {
    /// A fresh project: one palette and one row of blank tiles.
    pub fn new_default() -> Result<Self> {
        Ok(Project {
            palettes: vec![Palette::new(PaletteId(0), "Default", PaletteSystem::default())],
            tileset: TileSet::with_blank_tiles(16, 16)?,
            tilemaps: vec![],
        })
    }

    /// Checks the structural invariants that serde alone cannot enforce.
    pub fn validate(&self) -> Result<()> {
        for (i, tile) in self.tileset.tiles().iter().enumerate() {
            ensure!(tile.is_valid(), "tile {} has a color index out of range", i);
        }
        let mut ids: Vec<TileId> = self.tileset.tiles().iter().map(|t| t.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        ensure!(ids.len() == self.tileset.len(), "duplicate tile ids in tile set");
        ensure!(
            (1..=MAX_GRID_DIMENSION).contains(&self.tileset.tile_width()),
            "tile set width {} out of range (1..={})",
            self.tileset.tile_width(),
            MAX_GRID_DIMENSION
        );
        for map in &self.tilemaps {
            ensure!(
                map.is_consistent(),
                "tile map {} is inconsistent ({}x{}, {} cells, {} palette slots)",
                map.name,
                map.rows(),
                map.columns(),
                map.cells().len(),
                map.palette_slots().len()
            );
            if let Some(cell) = map
                .cells()
                .iter()
                .find(|c| c.palette_slot as usize >= MAX_PALETTE_SLOTS)
            {
                bail!(
                    "tile map {} uses palette slot {} out of range",
                    map.name,
                    cell.palette_slot
                );
            }
        }
        Ok(())
    }

    // Rebuilds derived indexes after deserialization.
    pub(crate) fn rebuild_index(&mut self) {
        self.tileset.rebuild_index();
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ActiveGrid {
    #[default]
    TileSet,
    TileMap(usize),
}

pub struct EditorState {
    pub config_path: PathBuf,
    pub config: EditorConfig,

    // Project data:
    pub project: Project,
    pub palettes_id_idx_map: HashMap<PaletteId, usize>,

    // Temporary editor state:
    pub active: ActiveGrid,
    pub stroke: Option<Stroke>,
    pub brush: BrushOptions,
    pub stamp: Option<TileBlock>,
    pub stamp_flip: Flip,
    pub palette_slot: PaletteSlot,
    pub tileset_palette: usize,
    pub locked_slot: Option<ColorIdx>,
    pub picked_tile: Option<TileInfo>,
    pub undo_stack: Vec<UndoSnapshot>,
    // Changes not yet forwarded to the renderer.
    pub changes: ChangeNotification,
}

impl EditorState {
    pub fn new(project: Project, config: EditorConfig, config_path: PathBuf) -> Self {
        let mut state = EditorState {
            config_path,
            config,
            project,
            palettes_id_idx_map: HashMap::new(),
            active: ActiveGrid::TileSet,
            stroke: None,
            brush: BrushOptions::default(),
            stamp: None,
            stamp_flip: Flip::None,
            palette_slot: 0,
            tileset_palette: 0,
            locked_slot: None,
            picked_tile: None,
            undo_stack: vec![],
            changes: ChangeNotification::full(),
        };
        state.update_palette_order();
        state
    }

    pub fn update_palette_order(&mut self) {
        self.palettes_id_idx_map.clear();
        for (i, p) in self.project.palettes.iter().enumerate() {
            self.palettes_id_idx_map.insert(p.id, i);
        }
    }

    pub fn active_tilemap(&self) -> Option<usize> {
        match self.active {
            ActiveGrid::TileSet => None,
            ActiveGrid::TileMap(i) => Some(i),
        }
    }

    pub fn grid(&self) -> &dyn TileGridProvider {
        match self.active {
            ActiveGrid::TileMap(i) if i < self.project.tilemaps.len() => &self.project.tilemaps[i],
            _ => &self.project.tileset,
        }
    }

    /// Switches the edited grid. Activating a tile map repoints cells that
    /// reference missing tiles to the first tile of the tile set.
    pub fn activate(&mut self, grid: ActiveGrid) -> Result<()> {
        if let ActiveGrid::TileMap(idx) = grid {
            ensure!(
                idx < self.project.tilemaps.len(),
                "tile map {} does not exist",
                idx
            );
            if self.project.tileset.is_empty() {
                self.project.tileset.create_tile([[0; 8]; 8]);
            }
            let fallback = self.project.tileset.get(0)?.id();
            let repaired =
                self.project.tilemaps[idx].repair_dangling(&self.project.tileset, fallback);
            if !repaired.is_empty() {
                // The repair cannot be undone; older snapshots may refer to
                // the cells it rewrote.
                self.undo_stack.clear();
            }
        }
        self.active = grid;
        self.stroke = None;
        self.notify(ChangeNotification::full());
        Ok(())
    }

    pub fn notify(&mut self, changes: ChangeNotification) {
        let pending = std::mem::take(&mut self.changes);
        self.changes = pending.merge(changes);
    }

    fn render_grid(&self) -> RenderGrid {
        match self.active {
            ActiveGrid::TileMap(i) => self
                .project
                .tilemaps
                .get(i)
                .map_or(RenderGrid::TileSet, |m| RenderGrid::TileMap(m.clone())),
            ActiveGrid::TileSet => RenderGrid::TileSet,
        }
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            tileset: self.project.tileset.clone(),
            grid: self.render_grid(),
            palettes: self.project.palettes.clone(),
            tileset_palette: self.tileset_palette,
            scale: self.config.scale,
            offset: (0, 0),
            locked_slot: self.locked_slot,
            native_colors: self.config.native_colors,
            transparency_index: self.config.transparency_index,
            overlays: Overlays {
                show_tile_grid: self.config.show_tile_grid,
                show_pixel_grid: self.config.show_pixel_grid,
                grid_color: self.config.grid_color,
                grid_opacity: self.config.grid_opacity,
                tiles_per_block: self.config.tiles_per_block,
                brush_size: self.brush.size,
                ..Default::default()
            },
        }
    }

    /// Drains pending changes into an update for the render thread.
    pub fn take_render_update(&mut self) -> Option<RenderUpdate> {
        if self.changes.is_empty() {
            return None;
        }
        let changes = std::mem::take(&mut self.changes);
        let mut update = RenderUpdate {
            tileset: Some(self.project.tileset.clone()),
            grid: Some(self.render_grid()),
            tiles_per_block: Some(self.config.tiles_per_block),
            brush_size: Some(self.brush.size),
            ..Default::default()
        };
        // Replacing palettes drops the renderer's derived palettes, so they
        // only travel with full redraws.
        if changes.redraw_full {
            update.palettes = Some(self.project.palettes.clone());
            update.tileset_palette = Some(self.tileset_palette);
            update.locked_slot = Some(self.locked_slot);
        }
        update.changes = Some(changes);
        Some(update)
    }
}

pub fn get_initial_state() -> Result<EditorState> {
    let config_path = get_config_path()?;
    let config = persist::load_config(&config_path)?;
    let project = match &config.project_path {
        Some(path) => persist::load_project(path)
            .with_context(|| format!("loading project {}", path.display()))?,
        None => {
            info!("No project configured, starting with an empty project");
            Project::new_default()?
        }
    };
    Ok(EditorState::new(project, config, config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::TileMapTile;

    fn state_with_map() -> EditorState {
        let mut project = Project::new_default().unwrap();
        let id = project.tileset.get(0).unwrap().id();
        project.tilemaps.push(TileMap::new("m", 2, 2, id).unwrap());
        EditorState::new(project, EditorConfig::default(), PathBuf::new())
    }

    #[test]
    fn test_validate_rejects_bad_slot() {
        let mut state = state_with_map();
        let id = state.project.tileset.get(0).unwrap().id();
        let mut cell = TileMapTile::new(id);
        cell.palette_slot = 16;
        state.project.tilemaps[0].set_cell(0, cell).unwrap();
        assert!(state.project.validate().is_err());
    }

    #[test]
    fn test_activate_repairs_dangling() {
        let mut state = state_with_map();
        let first = state.project.tileset.get(0).unwrap().id();
        state.project.tilemaps[0]
            .set_cell(3, TileMapTile::new(TileId(999)))
            .unwrap();
        state.activate(ActiveGrid::TileMap(0)).unwrap();
        assert_eq!(state.project.tilemaps[0].cell(3).unwrap().tile_id, first);
        assert_eq!(state.active_tilemap(), Some(0));
        assert_eq!(state.grid().tile_count(), 4);
    }

    #[test]
    fn test_activate_missing_map() {
        let mut state = state_with_map();
        assert!(state.activate(ActiveGrid::TileMap(5)).is_err());
        assert_eq!(state.active, ActiveGrid::TileSet);
    }

    #[test]
    fn test_render_update_drains_changes() {
        let mut state = state_with_map();
        let update = state.take_render_update().unwrap();
        assert_eq!(update.changes, Some(ChangeNotification::full()));
        assert!(state.take_render_update().is_none());
    }
}
