// Lazy paged scan of plots by region

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use senspire_common::{CropType, GeometryError, PlotId, Result, SenspireError};
use senspire_geometry::{BBox, GeometryStore, Point, Polygon};
use senspire_persistence::{HierarchyPersistence, PersistenceService, Plot};

/// Exact test applied to candidates from the bounding-box index
#[derive(Debug, Clone)]
pub enum RegionPredicate {
    /// Plot perimeter lies entirely inside the region
    Within(Polygon<f64>),
    /// Plot perimeter shares at least one point with the region
    Intersecting(Polygon<f64>),
    /// Plot perimeter contains the point, boundary included
    Covering(Point<f64>),
}

impl RegionPredicate {
    fn bbox(&self) -> Option<BBox> {
        match self {
            RegionPredicate::Within(region) | RegionPredicate::Intersecting(region) => {
                BBox::from_polygon(region)
            }
            RegionPredicate::Covering(point) => Some(BBox::from_point(point)),
        }
    }

    fn matches(&self, geometry: &GeometryStore, plot: &Plot) -> bool {
        match self {
            RegionPredicate::Within(region) => geometry.polygon_within(&plot.perimeter, region),
            RegionPredicate::Intersecting(region) => {
                geometry.polygons_intersect(&plot.perimeter, region)
            }
            RegionPredicate::Covering(point) => geometry.point_in_polygon(point, &plot.perimeter),
        }
    }
}

struct ScanState {
    store: Arc<dyn PersistenceService>,
    geometry: GeometryStore,
    predicate: RegionPredicate,
    crop_type: Option<CropType>,
    bbox: BBox,
    batch_size: u64,
    after: Option<PlotId>,
    buffer: VecDeque<Plot>,
    exhausted: bool,
    scanned: u64,
}

impl ScanState {
    fn accepts(&self, plot: &Plot) -> bool {
        self.crop_type.is_none_or(|c| c == plot.crop_type)
            && self.predicate.matches(&self.geometry, plot)
    }

    /// Fetch pages until a match is buffered or the index is exhausted
    async fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let page = self
                .store
                .plot_scan_in_bbox(&self.bbox, self.after, self.batch_size)
                .await?;
            // Ends on the index cursor, never on a short page of rows
            self.exhausted = page.next.is_none();
            self.after = page.next;
            self.scanned += page.plots.len() as u64;
            for plot in page.plots {
                if self.accepts(&plot) {
                    self.buffer.push_back(plot);
                }
            }
        }
        Ok(())
    }
}

/// Stream the plots matching `predicate`, one index page at a time
pub(crate) fn scan_plots(
    store: Arc<dyn PersistenceService>,
    geometry: GeometryStore,
    predicate: RegionPredicate,
    crop_type: Option<CropType>,
    batch_size: u64,
) -> Result<BoxStream<'static, Result<Plot>>> {
    let bbox = predicate.bbox().ok_or_else(|| {
        SenspireError::Geometry(GeometryError::Degenerate("region has no extent".to_string()))
    })?;

    let state = ScanState {
        store,
        geometry,
        predicate,
        crop_type,
        bbox,
        batch_size: batch_size.max(1),
        after: None,
        buffer: VecDeque::new(),
        exhausted: false,
        scanned: 0,
    };

    Ok(stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        if let Err(e) = state.fill().await {
            // Terminate after surfacing the error
            return Some((Err(e), None));
        }
        match state.buffer.pop_front() {
            Some(plot) => Some((Ok(plot), Some(state))),
            None => {
                debug!(scanned = state.scanned, "Region scan finished");
                None
            }
        }
    })
    .boxed())
}
