use geo::Rect;
use rstar::{RTreeObject, AABB};

/// A bounding box in an R-tree, associated with a feature or container by index.
#[derive(Debug, Clone)]
pub(crate) struct IndexedBounds {
    idx: usize,
    bbox: Rect<f64>,
}

impl IndexedBounds {
    pub(crate) fn new(idx: usize, bbox: Rect<f64>) -> Self {
        Self { idx, bbox }
    }

    /// Index of the corresponding feature in its owning collection.
    pub(crate) fn idx(&self) -> usize {
        self.idx
    }
}

impl RTreeObject for IndexedBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}
