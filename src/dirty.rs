//! Per-window damage bookkeeping.
//!
//! Regions are window-relative. The tracker also collects desktop-absolute
//! "exposed" rectangles: areas a window used to cover before it moved,
//! shrank, closed or was minimized, which must be recomposited from
//! whatever is underneath.

use std::collections::{BTreeSet, HashMap};

use ratatui::layout::Rect;

use crate::window::WindowId;

/// The finest damage unit the session tracks. Fixed for a session's life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirtyGranularity {
    Full,
    #[default]
    Line,
    Cell,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DirtyRegion {
    #[default]
    None,
    Full,
    Lines(BTreeSet<u16>),
    Cells(BTreeSet<(u16, u16)>),
}

impl DirtyRegion {
    pub fn is_none(&self) -> bool {
        matches!(self, DirtyRegion::None)
    }

    pub fn is_full(&self) -> bool {
        matches!(self, DirtyRegion::Full)
    }

    /// Union of two regions. Mixing lines with cells widens the cells to
    /// their lines.
    fn merge(self, other: DirtyRegion) -> DirtyRegion {
        use DirtyRegion::*;
        match (self, other) {
            (None, other) | (other, None) => other,
            (Full, _) | (_, Full) => Full,
            (Lines(mut a), Lines(b)) => {
                a.extend(b);
                Lines(a)
            }
            (Cells(mut a), Cells(b)) => {
                a.extend(b);
                Cells(a)
            }
            (Lines(mut lines), Cells(cells)) | (Cells(cells), Lines(mut lines)) => {
                lines.extend(cells.into_iter().map(|(_, row)| row));
                Lines(lines)
            }
        }
    }
}

/// What a caller says changed. Coordinates are window-relative; cells are
/// `(col, row)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidate {
    Window,
    Lines(Vec<u16>),
    Cells(Vec<(u16, u16)>),
    Rect(Rect),
}

impl Invalidate {
    /// Widen to `granularity`. Coarser requests stay coarse.
    fn normalize(self, granularity: DirtyGranularity) -> DirtyRegion {
        if granularity == DirtyGranularity::Full {
            return DirtyRegion::Full;
        }
        match self {
            Invalidate::Window => DirtyRegion::Full,
            Invalidate::Lines(lines) => DirtyRegion::Lines(lines.into_iter().collect()),
            Invalidate::Cells(cells) => match granularity {
                DirtyGranularity::Cell => DirtyRegion::Cells(cells.into_iter().collect()),
                _ => DirtyRegion::Lines(cells.into_iter().map(|(_, row)| row).collect()),
            },
            Invalidate::Rect(rect) if rect.is_empty() => DirtyRegion::None,
            Invalidate::Rect(rect) => match granularity {
                DirtyGranularity::Cell => DirtyRegion::Cells(
                    rect.rows()
                        .flat_map(|row| rect.columns().map(move |col| (col.x, row.y)))
                        .collect(),
                ),
                _ => DirtyRegion::Lines((rect.top()..rect.bottom()).collect()),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    granularity: DirtyGranularity,
    regions: HashMap<WindowId, DirtyRegion>,
    exposed: Vec<Rect>,
}

impl DirtyTracker {
    pub fn new(granularity: DirtyGranularity) -> Self {
        Self {
            granularity,
            regions: HashMap::new(),
            exposed: Vec::new(),
        }
    }

    pub fn granularity(&self) -> DirtyGranularity {
        self.granularity
    }

    /// Start tracking a window. New windows are fully dirty.
    pub fn register(&mut self, id: WindowId) {
        self.regions.insert(id, DirtyRegion::Full);
    }

    pub fn unregister(&mut self, id: WindowId) {
        self.regions.remove(&id);
    }

    pub fn is_registered(&self, id: WindowId) -> bool {
        self.regions.contains_key(&id)
    }

    pub fn mark_dirty(&mut self, id: WindowId, what: Invalidate) {
        let granularity = self.granularity;
        let Some(region) = self.regions.get_mut(&id) else {
            debug_assert!(false, "dirty mark for untracked window {id}");
            return;
        };
        let incoming = what.normalize(granularity);
        *region = std::mem::take(region).merge(incoming);
    }

    pub fn mark_all_full(&mut self) {
        for region in self.regions.values_mut() {
            *region = DirtyRegion::Full;
        }
    }

    /// Return the accumulated region and reset it to `None`.
    pub fn take_dirty(&mut self, id: WindowId) -> DirtyRegion {
        self.regions
            .get_mut(&id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub fn peek(&self, id: WindowId) -> Option<&DirtyRegion> {
        self.regions.get(&id)
    }

    pub fn is_dirty(&self, id: WindowId) -> bool {
        self.regions.get(&id).is_some_and(|region| !region.is_none())
    }

    pub fn clear(&mut self, id: WindowId) {
        if let Some(region) = self.regions.get_mut(&id) {
            *region = DirtyRegion::None;
        }
    }

    /// Record a desktop-absolute rectangle that must be recomposited.
    pub fn expose(&mut self, rect: Rect) {
        if !rect.is_empty() {
            self.exposed.push(rect);
        }
    }

    pub fn take_exposed(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.exposed)
    }

    pub fn has_exposed(&self) -> bool {
        !self.exposed.is_empty()
    }
}
