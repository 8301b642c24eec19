// Background rendering: a render thread fed with coalesced `RenderUpdate`s.

use std::{
    collections::VecDeque,
    sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use log::{debug, error, info};

use crate::{
    common::{ColorIdx, ColorRGB},
    grid::PixelPoint,
    message::ChangeNotification,
    palette::Palette,
    render::{
        compose, flatten, Bitmap, HighlightMode, Redraw, ReferenceImage, RenderCache, RenderGrid, RenderState,
        StampPreview,
    },
    tilemap::TileRegion,
    tileset::TileSet,
};

/// A partial update of the render state. Absent fields leave the current
/// value unchanged; for nullable settings the inner `None` clears them.
#[derive(Clone, Debug, Default)]
pub struct RenderUpdate {
    pub scale: Option<usize>,
    pub offset: Option<(i32, i32)>,
    pub pan_delta: Option<(i32, i32)>,
    pub show_tile_grid: Option<bool>,
    pub show_pixel_grid: Option<bool>,
    pub grid_color: Option<ColorRGB>,
    pub grid_opacity: Option<f32>,
    pub palettes: Option<Vec<Palette>>,
    pub tileset_palette: Option<usize>,
    pub locked_slot: Option<Option<ColorIdx>>,
    pub native_colors: Option<bool>,
    pub transparency_index: Option<Option<ColorIdx>>,
    pub tileset: Option<TileSet>,
    pub grid: Option<RenderGrid>,
    pub changes: Option<ChangeNotification>,
    pub highlight: Option<HighlightMode>,
    pub tiles_per_block: Option<usize>,
    pub cursor: Option<Option<PixelPoint>>,
    pub brush_size: Option<u32>,
    pub selected_tile: Option<Option<usize>>,
    pub selection: Option<Option<TileRegion>>,
    pub reference: Option<Option<ReferenceImage>>,
    pub stamp_preview: Option<Option<StampPreview>>,
    pub request_snapshot: bool,
}

fn later<T>(current: &mut Option<T>, next: Option<T>) {
    if next.is_some() {
        *current = next;
    }
}

impl RenderUpdate {
    // Replacing the model without saying what changed invalidates everything.
    fn effective_changes(&self) -> Option<ChangeNotification> {
        match &self.changes {
            Some(c) => Some(c.clone()),
            None if self.tileset.is_some() || self.grid.is_some() => Some(ChangeNotification::full()),
            None => None,
        }
    }

    /// Folds a later update into this one; pan deltas add up.
    pub fn merge(&mut self, next: RenderUpdate) {
        self.changes = match (self.effective_changes(), next.effective_changes()) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => a.or(b),
        };
        self.pan_delta = match (self.pan_delta, next.pan_delta) {
            (Some((x0, y0)), Some((x1, y1))) => Some((x0 + x1, y0 + y1)),
            (a, b) => a.or(b),
        };
        self.request_snapshot |= next.request_snapshot;
        later(&mut self.scale, next.scale);
        later(&mut self.offset, next.offset);
        later(&mut self.show_tile_grid, next.show_tile_grid);
        later(&mut self.show_pixel_grid, next.show_pixel_grid);
        later(&mut self.grid_color, next.grid_color);
        later(&mut self.grid_opacity, next.grid_opacity);
        later(&mut self.palettes, next.palettes);
        later(&mut self.tileset_palette, next.tileset_palette);
        later(&mut self.locked_slot, next.locked_slot);
        later(&mut self.native_colors, next.native_colors);
        later(&mut self.transparency_index, next.transparency_index);
        later(&mut self.tileset, next.tileset);
        later(&mut self.grid, next.grid);
        later(&mut self.highlight, next.highlight);
        later(&mut self.tiles_per_block, next.tiles_per_block);
        later(&mut self.cursor, next.cursor);
        later(&mut self.brush_size, next.brush_size);
        later(&mut self.selected_tile, next.selected_tile);
        later(&mut self.selection, next.selection);
        later(&mut self.reference, next.reference);
        later(&mut self.stamp_preview, next.stamp_preview);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    // The base image was redrawn.
    ImageReady,
    // Only overlays changed; the cached base image was reused.
    PartialRedraw,
    // Flattened export image, sent on request.
    Snapshot,
}

#[derive(Clone, Debug)]
pub struct RenderResponse {
    pub kind: ResponseKind,
    pub rows: usize,
    pub columns: usize,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub offset: (i32, i32),
    pub scale: usize,
    pub image: Bitmap,
}

/// Render-side state and per-frame logic.
#[derive(Debug, Default)]
pub struct RenderLoop {
    state: RenderState,
    cache: RenderCache,
    pending: Option<RenderUpdate>,
}

impl RenderLoop {
    pub fn new(state: RenderState) -> Self {
        RenderLoop {
            state,
            cache: RenderCache::new(),
            pending: None,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn push(&mut self, update: RenderUpdate) {
        match &mut self.pending {
            Some(pending) => pending.merge(update),
            None => self.pending = Some(update),
        }
    }

    // Applies a merged update. Returns whether any overlay state changed.
    fn apply(&mut self, update: RenderUpdate) -> bool {
        let changes = update.effective_changes();
        let state = &mut self.state;
        let mut palettes_changed = false;
        if let Some(palettes) = update.palettes {
            state.palettes = palettes;
            palettes_changed = true;
        }
        if let Some(locked) = update.locked_slot {
            palettes_changed |= state.locked_slot != locked;
            state.locked_slot = locked;
        }
        if let Some(native) = update.native_colors {
            palettes_changed |= state.native_colors != native;
            state.native_colors = native;
        }
        if palettes_changed {
            self.cache.invalidate_palettes();
        }
        let mut full = false;
        if let Some(t) = update.transparency_index {
            full |= state.transparency_index != t;
            state.transparency_index = t;
        }
        if let Some(p) = update.tileset_palette {
            full |= state.tileset_palette != p;
            state.tileset_palette = p;
        }
        if let Some(scale) = update.scale {
            state.scale = scale.max(1);
        }
        if let Some(tileset) = update.tileset {
            state.tileset = tileset;
        }
        if let Some(grid) = update.grid {
            state.grid = grid;
        }
        if full {
            self.cache.invalidate_full();
        }
        if let Some(changes) = &changes {
            self.cache.notify(changes, state.grid());
        }

        if let Some(offset) = update.offset {
            state.offset = offset;
        }
        if let Some((dx, dy)) = update.pan_delta {
            state.offset = (state.offset.0 + dx, state.offset.1 + dy);
        }

        let before = state.overlays.clone();
        let overlays = &mut state.overlays;
        if let Some(v) = update.show_tile_grid {
            overlays.show_tile_grid = v;
        }
        if let Some(v) = update.show_pixel_grid {
            overlays.show_pixel_grid = v;
        }
        if let Some(v) = update.grid_color {
            overlays.grid_color = v;
        }
        if let Some(v) = update.grid_opacity {
            overlays.grid_opacity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = update.highlight {
            overlays.highlight = v;
        }
        if let Some(v) = update.tiles_per_block {
            overlays.tiles_per_block = v.max(1);
        }
        if let Some(v) = update.cursor {
            overlays.cursor = v;
        }
        if let Some(v) = update.brush_size {
            overlays.brush_size = v;
        }
        if let Some(v) = update.selected_tile {
            overlays.selected_tile = v;
        }
        if let Some(v) = update.selection {
            overlays.selection = v;
        }
        if let Some(v) = update.reference {
            overlays.reference = v;
        }
        if let Some(v) = update.stamp_preview {
            overlays.stamp_preview = v;
        }
        *overlays != before
    }

    fn response(&self, kind: ResponseKind, image: Bitmap) -> RenderResponse {
        let grid = self.state.grid();
        RenderResponse {
            kind,
            rows: grid.row_count(),
            columns: grid.column_count(),
            pixel_width: grid.pixel_width(),
            pixel_height: grid.pixel_height(),
            offset: self.state.offset,
            scale: self.state.scale(),
            image,
        }
    }

    /// Runs one frame: applies everything queued, redraws at most once.
    pub fn tick(&mut self) -> Vec<RenderResponse> {
        let update = self.pending.take();
        let mut snapshot = false;
        let mut overlays_changed = false;
        if let Some(update) = update {
            snapshot = update.request_snapshot;
            overlays_changed = self.apply(update);
        }
        let mut responses = vec![];
        match self.cache.redraw(&self.state) {
            Redraw::Full | Redraw::Partial(_) => {
                let image = compose(&mut self.cache, &self.state);
                responses.push(self.response(ResponseKind::ImageReady, image));
            }
            Redraw::None if overlays_changed => {
                let image = compose(&mut self.cache, &self.state);
                responses.push(self.response(ResponseKind::PartialRedraw, image));
            }
            Redraw::None => {}
        }
        if snapshot {
            let image = flatten(&self.cache, &self.state);
            responses.push(self.response(ResponseKind::Snapshot, image));
        }
        responses
    }
}

// Frames the consumer has not picked up yet, beyond those held back below.
const RESPONSE_CAPACITY: usize = 2;
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// Producer side of a render thread.
pub struct RenderHandle {
    tx: Option<SyncSender<RenderUpdate>>,
    // Update that did not fit in the queue, merged with later ones until it does.
    pending: Option<RenderUpdate>,
    responses: Receiver<RenderResponse>,
    thread: Option<JoinHandle<()>>,
}

impl RenderHandle {
    /// Starts the render thread. The interval is raised to at least 1 ms.
    pub fn spawn(state: RenderState, capacity: usize, frame_interval: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel::<RenderUpdate>(capacity.max(1));
        let (resp_tx, responses) = mpsc::sync_channel(RESPONSE_CAPACITY);
        let frame_interval = frame_interval.max(MIN_FRAME_INTERVAL);
        let thread = thread::Builder::new()
            .name("render".to_string())
            .spawn(move || run(RenderLoop::new(state), rx, resp_tx, frame_interval))
            .context("unable to start render thread")?;
        info!("Render thread started (queue capacity {})", capacity.max(1));
        Ok(RenderHandle {
            tx: Some(tx),
            pending: None,
            responses,
            thread: Some(thread),
        })
    }

    /// Hands an update to the render thread without blocking.
    pub fn send(&mut self, update: RenderUpdate) -> Result<()> {
        match &mut self.pending {
            Some(pending) => pending.merge(update),
            None => self.pending = Some(update),
        }
        self.flush()
    }

    /// Retries sending a held-back update.
    pub fn flush(&mut self) -> Result<()> {
        let Some(update) = self.pending.take() else {
            return Ok(());
        };
        let Some(tx) = &self.tx else {
            bail!("render thread has been shut down");
        };
        match tx.try_send(update) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(update)) => {
                debug!("Render queue full, coalescing update");
                self.pending = Some(update);
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => bail!("render thread has exited"),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn try_recv(&self) -> Option<RenderResponse> {
        self.responses.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderResponse> {
        self.responses.recv_timeout(timeout).ok()
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        // Closing the queue ends the render loop.
        self.tx = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Render thread panicked");
            }
        }
    }
}

// Responses waiting for room in the response channel. Only the newest frame
// is kept; snapshots are always delivered.
struct Outbox {
    tx: SyncSender<RenderResponse>,
    held: VecDeque<RenderResponse>,
}

impl Outbox {
    fn push(&mut self, mut response: RenderResponse) {
        if response.kind != ResponseKind::Snapshot {
            let mut base_redrawn = false;
            self.held.retain(|r| {
                base_redrawn |= r.kind == ResponseKind::ImageReady;
                r.kind == ResponseKind::Snapshot
            });
            if base_redrawn {
                response.kind = ResponseKind::ImageReady;
            }
        }
        self.held.push_back(response);
    }

    // Returns false once the receiving side is gone.
    fn flush(&mut self) -> bool {
        while let Some(response) = self.held.pop_front() {
            match self.tx.try_send(response) {
                Ok(()) => {}
                Err(TrySendError::Full(response)) => {
                    self.held.push_front(response);
                    return true;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }
}

fn run(
    mut render_loop: RenderLoop,
    rx: Receiver<RenderUpdate>,
    responses: SyncSender<RenderResponse>,
    frame_interval: Duration,
) {
    let mut outbox = Outbox {
        tx: responses,
        held: VecDeque::new(),
    };
    let mut next_tick = Instant::now() + frame_interval;
    loop {
        let now = Instant::now();
        if now < next_tick {
            match rx.recv_timeout(next_tick - now) {
                Ok(update) => {
                    render_loop.push(update);
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        loop {
            match rx.try_recv() {
                Ok(update) => render_loop.push(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Render queue closed");
                    return;
                }
            }
        }
        next_tick = Instant::now() + frame_interval;
        for response in render_loop.tick() {
            outbox.push(response);
        }
        if !outbox.flush() {
            return;
        }
    }
    debug!("Render queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        palette::{PaletteId, PaletteSystem},
        render::CacheState,
        tile::TileId,
        tilemap::TileMap,
    };

    fn state() -> RenderState {
        let mut pal = Palette::new(PaletteId(0), "p", PaletteSystem::Rgb24);
        pal.set_color(1, [255, 0, 0]).unwrap();
        RenderState {
            tileset: TileSet::with_blank_tiles(4, 2).unwrap(),
            palettes: vec![pal],
            scale: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_rules() {
        let mut a = RenderUpdate {
            scale: Some(2),
            pan_delta: Some((1, 2)),
            cursor: Some(Some(PixelPoint::new(1, 1))),
            changes: Some(ChangeNotification {
                updated_tile_indexes: Some(vec![1]),
                ..Default::default()
            }),
            ..Default::default()
        };
        a.merge(RenderUpdate {
            scale: Some(3),
            pan_delta: Some((10, 20)),
            cursor: Some(None),
            request_snapshot: true,
            changes: Some(ChangeNotification {
                updated_tile_indexes: Some(vec![0]),
                ..Default::default()
            }),
            ..Default::default()
        });
        a.merge(RenderUpdate::default());
        assert_eq!(a.scale, Some(3));
        assert_eq!(a.pan_delta, Some((11, 22)));
        assert_eq!(a.cursor, Some(None));
        assert!(a.request_snapshot);
        assert_eq!(a.changes.unwrap().updated_tile_indexes, Some(vec![0, 1]));
    }

    #[test]
    fn test_model_replacement_without_changes_is_full() {
        let mut a = RenderUpdate {
            tileset: Some(TileSet::default()),
            ..Default::default()
        };
        a.merge(RenderUpdate {
            changes: Some(ChangeNotification {
                updated_tile_indexes: Some(vec![0]),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(a.changes.unwrap().redraw_full);
    }

    #[test]
    fn test_first_tick_renders() {
        let mut lp = RenderLoop::new(state());
        let responses = lp.tick();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::ImageReady);
        assert_eq!((responses[0].rows, responses[0].columns), (2, 2));
        assert_eq!((responses[0].pixel_width, responses[0].pixel_height), (16, 16));
        assert!(lp.tick().is_empty());
    }

    #[test]
    fn test_overlay_only_update_is_partial_redraw() {
        let mut lp = RenderLoop::new(state());
        lp.tick();
        lp.push(RenderUpdate {
            cursor: Some(Some(PixelPoint::new(3, 3))),
            highlight: Some(HighlightMode::Tile),
            ..Default::default()
        });
        let responses = lp.tick();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::PartialRedraw);
        assert!(lp.cache().is_clean());
    }

    #[test]
    fn test_queued_updates_coalesce_into_one_redraw() {
        let mut lp = RenderLoop::new(state());
        lp.tick();
        let mut tileset = lp.state().tileset.clone();
        tileset.get_mut(2).unwrap().set_pixel(0, 0, 1).unwrap();
        lp.push(RenderUpdate {
            tileset: Some(tileset.clone()),
            changes: Some(ChangeNotification {
                updated_tile_indexes: Some(vec![2]),
                ..Default::default()
            }),
            ..Default::default()
        });
        lp.push(RenderUpdate {
            pan_delta: Some((5, 0)),
            ..Default::default()
        });
        lp.push(RenderUpdate {
            pan_delta: Some((-2, 1)),
            request_snapshot: true,
            ..Default::default()
        });
        let responses = lp.tick();
        let kinds: Vec<ResponseKind> = responses.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ResponseKind::ImageReady, ResponseKind::Snapshot]);
        assert_eq!(responses[0].offset, (3, 1));
        assert_eq!(responses[1].image.get(0, 8), Some([255, 0, 0, 255]));
    }

    #[test]
    fn test_grid_swap_without_changes_redraws_full() {
        let mut lp = RenderLoop::new(state());
        lp.tick();
        let map = TileMap::new("m", 3, 3, TileId(0)).unwrap();
        lp.push(RenderUpdate {
            grid: Some(RenderGrid::TileMap(map)),
            ..Default::default()
        });
        assert_eq!(lp.cache().state(), &CacheState::Clean);
        let responses = lp.tick();
        assert_eq!(responses[0].kind, ResponseKind::ImageReady);
        assert_eq!(responses[0].image.width(), 24);
    }

    #[test]
    fn test_locked_slot_change_redraws() {
        let mut lp = RenderLoop::new(state());
        lp.tick();
        lp.push(RenderUpdate {
            locked_slot: Some(Some(1)),
            ..Default::default()
        });
        assert_eq!(lp.tick()[0].kind, ResponseKind::ImageReady);
        // Setting the same value again changes nothing.
        lp.push(RenderUpdate {
            locked_slot: Some(Some(1)),
            ..Default::default()
        });
        assert!(lp.tick().is_empty());
    }

    #[test]
    fn test_unread_frames_are_replaced_not_queued() {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut outbox = Outbox {
            tx,
            held: VecDeque::new(),
        };
        let lp = RenderLoop::new(state());
        let frame = |kind, x| {
            let mut r = lp.response(kind, Bitmap::new(1, 1));
            r.offset = (x, 0);
            r
        };
        outbox.push(frame(ResponseKind::PartialRedraw, 1));
        assert!(outbox.flush());
        for (i, kind) in [ResponseKind::ImageReady, ResponseKind::Snapshot, ResponseKind::PartialRedraw]
            .into_iter()
            .enumerate()
        {
            outbox.push(frame(kind, i as i32 + 2));
            assert!(outbox.flush());
        }
        // The first frame fills the channel; the stale ImageReady was dropped
        // but its kind carried over to the frame that replaced it.
        assert_eq!(outbox.held.len(), 2);
        let kinds: Vec<(ResponseKind, i32)> = std::iter::from_fn(|| {
            let r = rx.try_recv().ok();
            outbox.flush();
            r
        })
        .map(|r| (r.kind, r.offset.0))
        .collect();
        assert_eq!(
            kinds,
            vec![
                (ResponseKind::PartialRedraw, 1),
                (ResponseKind::Snapshot, 3),
                (ResponseKind::ImageReady, 4),
            ]
        );
        drop(rx);
        outbox.push(frame(ResponseKind::PartialRedraw, 5));
        assert!(!outbox.flush());
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let handle = RenderHandle::spawn(state(), 4, Duration::ZERO).unwrap();
        let first = handle.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first.kind, ResponseKind::ImageReady);
        // Nothing changed since, so no further frames arrive.
        assert!(handle.recv_timeout(Duration::from_millis(50)).is_none());
    }
}
