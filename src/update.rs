use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::{
    common::is_valid_color,
    grid::PixelPoint,
    link_break::break_links,
    message::{ChangeNotification, Message},
    paint::{self, PaintResult, PixelEdits, Stroke, MAX_BRUSH_SIZE},
    persist,
    state::{ActiveGrid, EditorState},
    tile::Flip,
    tilemap::{TileBlock, TileMap},
    undo::{get_undo_action, UndoAction},
};

/// Applies one editing message. Failures are logged and leave the session
/// unchanged; the returned notification lists what must be redrawn.
pub fn update(state: &mut EditorState, message: Message) -> ChangeNotification {
    match try_update(state, message) {
        Ok(changes) => {
            state.notify(changes.clone());
            changes
        }
        Err(e) => {
            error!("Error processing message: {}\n{}", e, e.backtrace());
            ChangeNotification::default()
        }
    }
}

fn try_update(state: &mut EditorState, message: Message) -> Result<ChangeNotification> {
    let changes = match message {
        Message::Nothing => ChangeNotification::default(),
        Message::SaveProject => {
            let path = state
                .config
                .project_path
                .clone()
                .context("Project path not set.")?;
            persist::save_project(&path, &state.project)?;
            persist::save_config(&state.config_path, &mut state.config)?;
            ChangeNotification::default()
        }
        Message::OpenProject(path) => {
            info!("Opening project at {}", path.display());
            let project = persist::load_project(&path)?;
            state.project = project;
            state.update_palette_order();
            state.undo_stack.clear();
            state.stamp = None;
            state.picked_tile = None;
            state.config.project_path = Some(path);
            state.config.modified = true;
            if let Err(e) = persist::save_config(&state.config_path, &mut state.config) {
                error!("Error saving config: {}\n{}", e, e.backtrace());
            }
            state.activate(ActiveGrid::TileSet)?;
            ChangeNotification::full()
        }
        Message::ActivateTileSet => {
            state.activate(ActiveGrid::TileSet)?;
            ChangeNotification::full()
        }
        Message::ActivateTileMap(idx) => {
            state.activate(ActiveGrid::TileMap(idx))?;
            ChangeNotification::full()
        }
        Message::AddTileMap {
            name,
            rows,
            columns,
        } => {
            if state.project.tilemaps.iter().any(|m| m.name == name) {
                warn!("Tile map {} already exists.", name);
                return Ok(ChangeNotification::default());
            }
            if state.project.tileset.is_empty() {
                state.project.tileset.create_tile([[0; 8]; 8]);
            }
            let fill = state.project.tileset.get(0)?.id();
            let map = TileMap::new(&name, rows, columns, fill)?;
            state.project.tilemaps.push(map);
            ChangeNotification::default()
        }
        Message::SetPaletteSlot {
            slot,
            palette_index,
        } => {
            let palette = state
                .project
                .palettes
                .get(palette_index)
                .with_context(|| format!("palette {} does not exist", palette_index))?;
            let id = palette.id;
            match state.active_tilemap() {
                Some(idx) => {
                    let map = state
                        .project
                        .tilemaps
                        .get_mut(idx)
                        .context("active tile map missing")?;
                    map.set_palette_slot(slot, id)?;
                    state.palette_slot = slot;
                }
                None => state.tileset_palette = palette_index,
            }
            ChangeNotification::full()
        }
        Message::SetLockedSlot(slot) => {
            if slot.is_some_and(|s| !is_valid_color(s)) {
                warn!("Locked slot {:?} out of range.", slot);
                return Ok(ChangeNotification::default());
            }
            state.locked_slot = slot;
            ChangeNotification::full()
        }
        Message::SelectColor(c) => {
            if !is_valid_color(c) {
                warn!("Color index {} out of range.", c);
            } else {
                state.brush.color = c;
            }
            ChangeNotification::default()
        }
        Message::SelectSecondaryColor(c) => {
            if !is_valid_color(c) {
                warn!("Color index {} out of range.", c);
            } else {
                state.brush.secondary_color = c;
            }
            ChangeNotification::default()
        }
        Message::SetBrushSize(size) => {
            state.brush.size = size.clamp(1, MAX_BRUSH_SIZE);
            ChangeNotification::default()
        }
        Message::SetClampToTile(clamp) => {
            state.brush.clamp_to_tile = clamp;
            ChangeNotification::default()
        }
        Message::SetPattern(pattern) => {
            state.brush.pattern = pattern;
            ChangeNotification::default()
        }
        Message::SetBreakLinks(enabled) => {
            state.config.break_links = enabled;
            state.config.modified = true;
            ChangeNotification::default()
        }
        Message::SetTilesPerBlock(n) => {
            state.config.tiles_per_block = n.max(1);
            state.config.modified = true;
            ChangeNotification::default()
        }
        Message::BeginStroke(p) => {
            state.stroke = Some(Stroke::begin(state.grid(), &state.project.tileset, p));
            ChangeNotification::default()
        }
        Message::Brush(p) => {
            let stroke = current_stroke(state, p);
            let edits = paint::brush(state.grid(), &state.project.tileset, &stroke, p, &state.brush);
            apply_pixel_edits(state, edits)
        }
        Message::ColorReplace(p) => {
            let stroke = current_stroke(state, p);
            let edits =
                paint::color_replace(state.grid(), &state.project.tileset, &stroke, p, &state.brush);
            apply_pixel_edits(state, edits)
        }
        Message::Fill(p) => {
            let edits = paint::bucket_fill(
                state.grid(),
                &state.project.tileset,
                p,
                state.brush.color,
                state.brush.clamp_to_tile,
            );
            apply_pixel_edits(state, edits)
        }
        Message::EndStroke => {
            state.stroke = None;
            ChangeNotification::default()
        }
        Message::CaptureStamp(region) => {
            let idx = state.active_tilemap().context("no tile map is active")?;
            let map = state.project.tilemaps.get(idx).context("active tile map missing")?;
            state.stamp = Some(TileBlock::capture(map, region)?);
            ChangeNotification::default()
        }
        Message::SetStampFlip(flip) => {
            state.stamp_flip = flip;
            ChangeNotification::default()
        }
        Message::Stamp(p) => {
            let Some(idx) = state.active_tilemap() else {
                warn!("Stamping requires an active tile map.");
                return Ok(ChangeNotification::default());
            };
            let Some(block) = &state.stamp else {
                warn!("No stamp selected.");
                return Ok(ChangeNotification::default());
            };
            let block = block.flipped(state.stamp_flip);
            let map = state
                .project
                .tilemaps
                .get_mut(idx)
                .context("active tile map missing")?;
            let result = paint::stamp(map, &block, p);
            record(state, result)
        }
        Message::PaletteBlock(p) => {
            let Some(idx) = state.active_tilemap() else {
                warn!("Palette painting requires an active tile map.");
                return Ok(ChangeNotification::default());
            };
            let tiles_per_block = state.config.tiles_per_block;
            let slot = state.palette_slot;
            let map = state
                .project
                .tilemaps
                .get_mut(idx)
                .context("active tile map missing")?;
            let result = paint::paint_palette_block(map, p, slot, tiles_per_block);
            record(state, result)
        }
        Message::PickColor(p) => {
            if let Some(c) = paint::pick_color(state.grid(), &state.project.tileset, p) {
                state.brush.color = c;
            }
            ChangeNotification::default()
        }
        Message::PickTile(p) => {
            state.picked_tile = paint::pick_tile(state.grid(), p);
            if let (Some(info), Some(idx)) = (state.picked_tile, state.active_tilemap()) {
                let map = state.project.tilemaps.get(idx).context("active tile map missing")?;
                let cell = *map.cell(info.index)?;
                state.stamp = Some(TileBlock {
                    rows: 1,
                    columns: 1,
                    cells: vec![cell],
                });
                state.stamp_flip = Flip::None;
            }
            ChangeNotification::default()
        }
        Message::Undo => match state.undo_stack.pop() {
            Some(snapshot) => {
                snapshot.restore(&mut state.project.tileset, &mut state.project.tilemaps)?;
                state.stroke = None;
                ChangeNotification::full()
            }
            None => {
                info!("Nothing to undo.");
                ChangeNotification::default()
            }
        },
    };
    Ok(changes)
}

// The stroke in progress, or a new one starting at `p`.
fn current_stroke(state: &mut EditorState, p: PixelPoint) -> Stroke {
    match state.stroke {
        Some(stroke) => stroke,
        None => {
            let stroke = Stroke::begin(state.grid(), &state.project.tileset, p);
            state.stroke = Some(stroke);
            stroke
        }
    }
}

fn apply_pixel_edits(state: &mut EditorState, edits: PixelEdits) -> ChangeNotification {
    let mut result = edits.apply(&mut state.project.tileset);
    if result.is_empty() {
        return ChangeNotification::default();
    }
    if let Some(idx) = state.active_tilemap() {
        if state.config.break_links {
            let links = break_links(
                &mut state.project.tileset,
                &mut state.project.tilemaps,
                idx,
                &result,
            );
            links.extend_paint_result(&mut result);
        }
    }
    record(state, result)
}

// Pushes an undo snapshot for `result` and returns its notification.
fn record(state: &mut EditorState, result: PaintResult) -> ChangeNotification {
    let changes = result.notification();
    if let UndoAction::Ok(snapshot) = get_undo_action(&result, state.active_tilemap()) {
        state.undo_stack.push(snapshot);
    }
    changes
}
