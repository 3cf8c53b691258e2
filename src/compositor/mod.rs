//! Frame composition and diffing.
//!
//! The compositor keeps two desktop-sized buffers: `scratch`, the desktop as
//! it should look, and `previous`, what the terminal is known to show. Each
//! frame it re-renders dirty windows into their cached buffers, turns their
//! dirty regions and any exposed rectangles into a damage mask,
//! recomposites only damaged cells from the window caches, and emits the
//! damaged cells that differ from `previous`.
//!
//! `previous` only advances once the driver has accepted a frame, so an
//! abandoned frame is simply recomputed on the next attempt.

mod metrics;

pub use metrics::FrameMetrics;

use std::collections::BTreeSet;
use std::io;
use std::time::{Duration, Instant};

use ratatui::layout::{Rect, Size};

use crate::buffer::CellBuffer;
use crate::cell::Cell;
use crate::config::DeskConfig;
use crate::dirty::DirtyRegion;
use crate::drivers::OutputDriver;
use crate::layout::rect_contains;
use crate::window::{WindowId, WindowManager};

/// One cell the driver must paint. Coordinates are desktop-absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub row: u16,
    pub col: u16,
    pub cell: Cell,
}

/// The cell writes of one composed frame, before it is handed to a driver.
#[derive(Debug, Clone, Default)]
pub struct FrameDiff {
    pub writes: Vec<CellWrite>,
    pub windows_rendered: usize,
    pub windows_skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub writes: usize,
    pub windows_rendered: usize,
    pub windows_skipped: usize,
    /// The terminal was cleared before the writes.
    pub cleared: bool,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Compositor {
    previous: CellBuffer,
    scratch: CellBuffer,
    damage: Vec<bool>,
    needs_clear: bool,
    background: Cell,
    metrics: Option<FrameMetrics>,
}

impl Compositor {
    pub fn new(desktop: Size, config: &DeskConfig) -> Self {
        let mut compositor = Self {
            previous: CellBuffer::new(0, 0),
            scratch: CellBuffer::new(0, 0),
            damage: Vec::new(),
            needs_clear: true,
            background: Cell::blank(),
            metrics: config
                .metrics_enabled
                .then(|| FrameMetrics::new(config.metrics_hold)),
        };
        compositor.reset(desktop);
        compositor
    }

    /// Forget what the terminal shows: the next frame clears it and repaints
    /// everything.
    fn reset(&mut self, desktop: Size) {
        self.previous = CellBuffer::new(desktop.width, desktop.height);
        self.scratch = CellBuffer::filled(desktop.width, desktop.height, self.background.clone());
        self.damage = vec![true; self.scratch.cells().len()];
        self.needs_clear = true;
    }

    /// The cell shown wherever no window covers the desktop.
    pub fn set_background(&mut self, cell: Cell) {
        self.background = cell;
        self.damage.fill(true);
    }

    pub fn background(&self) -> &Cell {
        &self.background
    }

    /// What the terminal is known to display.
    pub fn previous_frame(&self) -> &CellBuffer {
        &self.previous
    }

    pub fn metrics(&self) -> Option<&FrameMetrics> {
        self.metrics.as_ref()
    }

    /// Cells waiting to be recomposited, e.g. after an abandoned frame.
    pub fn pending_damage(&self) -> usize {
        self.damage.iter().filter(|damaged| **damaged).count()
    }

    /// Compose the next frame and hand it to `driver`. On error nothing is
    /// committed: the damage stays queued and the same cells are produced
    /// again next time.
    pub fn render_frame<D>(
        &mut self,
        wm: &mut WindowManager,
        driver: &mut D,
        now: Instant,
    ) -> io::Result<FrameReport>
    where
        D: OutputDriver + ?Sized,
    {
        let started = Instant::now();
        let frame = self.compute_frame(wm);
        let cleared = self.needs_clear;
        if let Err(err) = self.present(driver, &frame.writes) {
            tracing::debug!(error = %err, writes = frame.writes.len(), "frame abandoned");
            return Err(err);
        }
        self.previous.clone_from(&self.scratch);
        self.damage.fill(false);
        self.needs_clear = false;

        let elapsed = started.elapsed();
        if let Some(metrics) = &mut self.metrics {
            metrics.record(now, elapsed, frame.writes.len());
        }
        Ok(FrameReport {
            writes: frame.writes.len(),
            windows_rendered: frame.windows_rendered,
            windows_skipped: frame.windows_skipped,
            cleared,
            elapsed,
        })
    }

    fn present<D>(&self, driver: &mut D, writes: &[CellWrite]) -> io::Result<()>
    where
        D: OutputDriver + ?Sized,
    {
        if self.needs_clear {
            driver.clear()?;
        }
        if !writes.is_empty() {
            driver.write_cells(writes)?;
        }
        driver.flush()
    }

    /// Bring `scratch` up to date and return the cells that differ from the
    /// previous frame. Consumes the window manager's dirty state.
    pub fn compute_frame(&mut self, wm: &mut WindowManager) -> FrameDiff {
        wm.poll_control_redraws();
        let desktop = wm.desktop_size();
        if desktop != self.previous.size() {
            tracing::debug!(
                width = desktop.width,
                height = desktop.height,
                "compositor reset for new desktop size"
            );
            self.reset(desktop);
        }

        let order: Vec<WindowId> = wm.z_order().to_vec();
        let mut frame = FrameDiff::default();
        for id in &order {
            let Some(window) = wm.window(*id) else {
                continue;
            };
            if window.is_minimized() {
                continue;
            }
            let rect = window.rect();
            let cache_valid = window.has_valid_cache();
            let region = wm.take_dirty(*id);
            if region.is_none() && cache_valid {
                frame.windows_skipped += 1;
                continue;
            }
            for (control, err) in wm.compose_window(*id) {
                tracing::warn!(window_id = %id, control = %control, error = %err, "control render failed");
            }
            frame.windows_rendered += 1;
            let region = if cache_valid { region } else { DirtyRegion::Full };
            self.damage_region(rect, &region);
        }
        for rect in wm.take_exposed() {
            self.damage_rect(rect);
        }

        self.recomposite(wm, &order);
        self.repair_wide_pairs();
        frame.writes = self.diff();
        frame
    }

    fn damage_region(&mut self, rect: Rect, region: &DirtyRegion) {
        match region {
            DirtyRegion::None => {}
            DirtyRegion::Full => self.damage_rect(rect),
            DirtyRegion::Lines(rows) => {
                for row in rows.iter().filter(|row| **row < rect.height) {
                    self.damage_rect(Rect::new(rect.x, rect.y.saturating_add(*row), rect.width, 1));
                }
            }
            DirtyRegion::Cells(cells) => {
                for (col, row) in cells {
                    if *col < rect.width && *row < rect.height {
                        self.damage_rect(Rect::new(
                            rect.x.saturating_add(*col),
                            rect.y.saturating_add(*row),
                            1,
                            1,
                        ));
                    }
                }
            }
        }
    }

    /// Mark `rect` damaged, widened by one column on each side so a wide
    /// glyph cut by the edge is recomposited whole.
    fn damage_rect(&mut self, rect: Rect) {
        let width = self.scratch.width();
        let height = self.scratch.height();
        let left = rect.left().saturating_sub(1);
        let right = rect.right().saturating_add(1).min(width);
        let bottom = rect.bottom().min(height);
        for y in rect.top()..bottom {
            let row = y as usize * width as usize;
            for x in left..right {
                self.damage[row + x as usize] = true;
            }
        }
    }

    fn recomposite(&mut self, wm: &WindowManager, order: &[WindowId]) {
        // Topmost first: the first opaque cell found wins.
        let layers: Vec<(Rect, &CellBuffer)> = order
            .iter()
            .rev()
            .filter_map(|id| {
                let window = wm.window(*id)?;
                if window.is_minimized() {
                    return None;
                }
                Some((window.rect(), window.cached_buffer()?))
            })
            .collect();
        let width = self.scratch.width() as usize;
        if width == 0 {
            return;
        }
        for (idx, damaged) in self.damage.iter().enumerate() {
            if !damaged {
                continue;
            }
            let x = (idx % width) as u16;
            let y = (idx / width) as u16;
            let cell = layers
                .iter()
                .find_map(|(rect, buffer)| {
                    if !rect_contains(*rect, x, y) {
                        return None;
                    }
                    buffer
                        .get(x - rect.x, y - rect.y)
                        .filter(|cell| !cell.is_skip())
                })
                .unwrap_or(&self.background);
            self.scratch.set_raw(x, y, cell.clone());
        }
    }

    /// Occlusion can separate a wide glyph from its continuation. Blank out
    /// either half left on its own, in every row that took damage.
    fn repair_wide_pairs(&mut self) {
        let width = self.scratch.width();
        if width == 0 {
            return;
        }
        let rows: BTreeSet<u16> = self
            .damage
            .iter()
            .enumerate()
            .filter(|(_, damaged)| **damaged)
            .map(|(idx, _)| (idx / width as usize) as u16)
            .collect();
        for y in rows {
            for x in 0..width {
                let Some(cell) = self.scratch.get(x, y) else {
                    continue;
                };
                let orphan = if cell.is_wide() {
                    !self
                        .scratch
                        .get(x + 1, y)
                        .is_some_and(Cell::is_continuation)
                } else if cell.is_continuation() {
                    x == 0 || !self.scratch.get(x - 1, y).is_some_and(Cell::is_wide)
                } else {
                    false
                };
                if orphan {
                    let blank = cell.restyled_blank();
                    self.scratch.set_raw(x, y, blank);
                    self.damage[y as usize * width as usize + x as usize] = true;
                }
            }
        }
    }

    /// Damaged cells that changed, row-major. A wide glyph and its
    /// continuation are always emitted together.
    fn diff(&self) -> Vec<CellWrite> {
        let width = self.scratch.width() as usize;
        if width == 0 {
            return Vec::new();
        }
        let scratch = self.scratch.cells();
        let previous = self.previous.cells();
        let mut emit = BTreeSet::new();
        for (idx, damaged) in self.damage.iter().enumerate() {
            if !damaged || scratch[idx] == previous[idx] {
                continue;
            }
            emit.insert(idx);
            let col = idx % width;
            if scratch[idx].is_wide() && col + 1 < width {
                emit.insert(idx + 1);
            } else if scratch[idx].is_continuation() && col > 0 {
                emit.insert(idx - 1);
            }
        }
        emit.into_iter()
            .map(|idx| CellWrite {
                row: (idx / width) as u16,
                col: (idx % width) as u16,
                cell: scratch[idx].clone(),
            })
            .collect()
    }
}
