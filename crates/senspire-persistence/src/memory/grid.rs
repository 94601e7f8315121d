//! Uniform grid index over plot bounding boxes.
//!
//! Each plot is registered in every grid cell its bounding box overlaps.
//! A region scan visits only the occupied cells overlapping the region,
//! merges their ID-ordered lists (deduplicating plots that span several
//! cells) and applies the bbox prefilter. Results come back in plot-ID
//! order, so callers can page with a keyset cursor.
//!
//! Plots whose box spans more than [`MAX_CELLS_PER_PLOT`] cells live in a
//! single overflow list that every scan consults.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use senspire_common::PlotId;
use senspire_geometry::BBox;

/// Default cell edge in degrees, about 11 km of latitude
pub const DEFAULT_CELL_DEGREES: f64 = 0.1;

/// Plots spanning more cells than this go to the overflow list
pub const MAX_CELLS_PER_PLOT: u64 = 256;

/// Cell coordinates: (latitude row, longitude column)
pub type CellKey = (i64, i64);

struct Entry {
    bbox: BBox,
    /// Empty for plots in the overflow list
    cells: Vec<CellKey>,
}

/// Inclusive row and column ranges covered by a box
#[derive(Debug, Clone, Copy)]
struct CellSpan {
    rows: (i64, i64),
    cols: (i64, i64),
}

impl CellSpan {
    fn cell_count(&self) -> u64 {
        let rows = self.rows.1.saturating_sub(self.rows.0).saturating_add(1) as u64;
        let cols = self.cols.1.saturating_sub(self.cols.0).saturating_add(1) as u64;
        rows.saturating_mul(cols)
    }

    fn contains(&self, (row, col): CellKey) -> bool {
        (self.rows.0..=self.rows.1).contains(&row) && (self.cols.0..=self.cols.1).contains(&col)
    }

    fn cells(&self) -> impl Iterator<Item = CellKey> {
        let cols = self.cols;
        (self.rows.0..=self.rows.1).flat_map(move |row| (cols.0..=cols.1).map(move |col| (row, col)))
    }
}

pub struct GridIndex {
    cell_size: f64,
    cells: HashMap<CellKey, BTreeSet<PlotId>>,
    overflow: BTreeSet<PlotId>,
    entries: HashMap<PlotId, Entry>,
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_DEGREES)
    }
}

impl GridIndex {
    /// Grid with square cells of `cell_size` degrees; invalid sizes fall back
    /// to [`DEFAULT_CELL_DEGREES`].
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_DEGREES
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            overflow: BTreeSet::new(),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of occupied cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn coord(&self, degrees: f64) -> i64 {
        // Float to int casts saturate
        (degrees / self.cell_size).floor() as i64
    }

    fn span(&self, bbox: &BBox) -> CellSpan {
        CellSpan {
            rows: (self.coord(bbox.min_lat), self.coord(bbox.max_lat)),
            cols: (self.coord(bbox.min_lng), self.coord(bbox.max_lng)),
        }
    }

    /// Register or move a plot
    pub fn insert(&mut self, plot_id: PlotId, bbox: BBox) {
        self.remove(plot_id);

        let span = self.span(&bbox);
        let cells: Vec<CellKey> = if span.cell_count() > MAX_CELLS_PER_PLOT {
            self.overflow.insert(plot_id);
            Vec::new()
        } else {
            span.cells().collect()
        };
        for cell in &cells {
            self.cells.entry(*cell).or_default().insert(plot_id);
        }
        self.entries.insert(plot_id, Entry { bbox, cells });
    }

    pub fn remove(&mut self, plot_id: PlotId) -> bool {
        let Some(entry) = self.entries.remove(&plot_id) else {
            return false;
        };
        if entry.cells.is_empty() {
            self.overflow.remove(&plot_id);
        }
        for cell in entry.cells {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.remove(&plot_id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Occupied cells overlapping `bbox`
    pub fn cells_covering(&self, bbox: &BBox) -> Vec<CellKey> {
        let span = self.span(bbox);
        if span.cell_count() <= self.cells.len() as u64 {
            span.cells().filter(|c| self.cells.contains_key(c)).collect()
        } else {
            // Region wider than the occupied grid
            self.cells.keys().copied().filter(|c| span.contains(*c)).collect()
        }
    }

    /// Up to `limit` plot IDs greater than `after`, in ID order, whose
    /// bounding box intersects `bbox`.
    pub fn scan(&self, bbox: &BBox, after: Option<PlotId>, limit: usize) -> Vec<PlotId> {
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let lists = self
            .cells_covering(bbox)
            .into_iter()
            .filter_map(|cell| self.cells.get(&cell))
            .chain(std::iter::once(&self.overflow));

        let mut hits = BTreeSet::new();
        for ids in lists {
            // Every list is ID-ordered, so its first `limit` hits hold its share of the page
            hits.extend(
                ids.range((lower, Bound::Unbounded))
                    .filter(|id| {
                        self.entries
                            .get(id)
                            .is_some_and(|e| e.bbox.intersects(bbox))
                    })
                    .take(limit)
                    .copied(),
            );
        }
        hits.into_iter().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ids(n: usize) -> Vec<PlotId> {
        let mut ids: Vec<PlotId> = (0..n).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_scan_skips_disjoint_cells() {
        let mut grid = GridIndex::new(1.0);
        let plots = ids(3);
        let (near, neighbour, far) = (plots[0], plots[1], plots[2]);
        grid.insert(near, BBox::new(0.2, 0.4, 0.2, 0.4));
        grid.insert(neighbour, BBox::new(0.7, 0.9, 0.7, 0.9));
        grid.insert(far, BBox::new(50.2, 50.4, 50.2, 50.4));

        let region = BBox::new(0.0, 0.5, 0.0, 0.5);
        // Only the occupied cell under the region is visited
        assert_eq!(grid.cells_covering(&region), vec![(0, 0)]);
        // Same cell, disjoint box: dropped by the prefilter
        assert_eq!(grid.scan(&region, None, 10), vec![near]);

        let wide = BBox::new(-10.0, 10.0, -10.0, 10.0);
        assert_eq!(grid.cells_covering(&wide), vec![(0, 0)]);
        assert_eq!(grid.scan(&wide, None, 10), vec![near, neighbour]);
    }

    #[test]
    fn test_plot_spanning_cells_is_reported_once() {
        let mut grid = GridIndex::new(1.0);
        let id = Uuid::new_v4();
        grid.insert(id, BBox::new(0.5, 2.5, 0.5, 2.5));
        assert_eq!(grid.cell_count(), 9);

        let region = BBox::new(0.0, 3.0, 0.0, 3.0);
        assert_eq!(grid.scan(&region, None, 10), vec![id]);
    }

    #[test]
    fn test_scan_pages_in_id_order() {
        let mut grid = GridIndex::new(1.0);
        let plots = ids(7);
        for (i, id) in plots.iter().enumerate() {
            // Spread over distinct cells so pages merge several lists
            let offset = (i % 3) as f64 * 2.0;
            grid.insert(*id, BBox::new(offset, offset + 0.5, 0.0, 0.5));
        }

        let region = BBox::new(-1.0, 10.0, -1.0, 10.0);
        let first = grid.scan(&region, None, 3);
        let second = grid.scan(&region, first.last().copied(), 3);
        let third = grid.scan(&region, second.last().copied(), 3);
        let all: Vec<PlotId> = first.into_iter().chain(second).chain(third).collect();
        assert_eq!(all, plots);
    }

    #[test]
    fn test_oversized_plot_uses_overflow_list() {
        let mut grid = GridIndex::new(0.1);
        let huge = Uuid::new_v4();
        grid.insert(huge, BBox::new(0.0, 30.0, 0.0, 30.0));
        assert_eq!(grid.cell_count(), 0);

        assert_eq!(grid.scan(&BBox::new(15.0, 15.0, 15.0, 15.0), None, 10), vec![huge]);
        assert!(grid.scan(&BBox::new(40.0, 41.0, 40.0, 41.0), None, 10).is_empty());
    }

    #[test]
    fn test_move_and_remove() {
        let mut grid = GridIndex::new(1.0);
        let id = Uuid::new_v4();
        grid.insert(id, BBox::new(0.2, 0.4, 0.2, 0.4));
        grid.insert(id, BBox::new(5.2, 5.4, 5.2, 5.4));
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.cell_count(), 1);
        assert!(grid.scan(&BBox::new(0.0, 1.0, 0.0, 1.0), None, 10).is_empty());

        assert!(grid.remove(id));
        assert!(!grid.remove(id));
        assert!(grid.is_empty());
        assert_eq!(grid.cell_count(), 0);
    }
}
