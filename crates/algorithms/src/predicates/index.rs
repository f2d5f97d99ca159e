//! R-tree over geometry envelopes, used to generate candidate pairs

use geocomp_core::vector::{BoundingBox, Geometry};
use rstar::{RTree, RTreeObject, AABB};

#[derive(Debug, Clone)]
struct IndexedEnvelope {
    index: usize,
    bbox: BoundingBox,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

/// Envelope index over a geometry sequence.
///
/// Geometries without an envelope (empty multis) are kept aside and
/// returned by every query, so callers see them as always-possible
/// candidates.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: RTree<IndexedEnvelope>,
    unindexed: Vec<usize>,
    len: usize,
}

impl SpatialIndex {
    pub fn new<'a>(geometries: impl IntoIterator<Item = &'a Geometry>) -> Self {
        let mut entries = Vec::new();
        let mut unindexed = Vec::new();
        let mut len = 0;
        for (index, g) in geometries.into_iter().enumerate() {
            len += 1;
            match g.bounding_box() {
                Some(bbox) => entries.push(IndexedEnvelope { index, bbox }),
                None => unindexed.push(index),
            }
        }
        Self {
            tree: RTree::bulk_load(entries),
            unindexed,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indices whose envelope comes within `reach` of `bbox`, ascending
    pub fn candidates(&self, bbox: &BoundingBox, reach: f64) -> Vec<usize> {
        let b = bbox.expand(reach);
        let query = AABB::from_corners([b.min_x, b.min_y], [b.max_x, b.max_y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .filter(|e| e.bbox.distance(bbox) <= reach)
            .map(|e| e.index)
            .chain(self.unindexed.iter().copied())
            .collect();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates() {
        let geoms = vec![
            Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap(),
            Geometry::rect(5.0, 5.0, 6.0, 6.0).unwrap(),
            Geometry::point(1.5, 0.5).unwrap(),
        ];
        let index = SpatialIndex::new(&geoms);
        assert_eq!(index.len(), 3);

        let probe = BoundingBox::new(0.5, 0.5, 1.0, 1.0);
        assert_eq!(index.candidates(&probe, 0.0), vec![0]);
        assert_eq!(index.candidates(&probe, 0.5), vec![0, 2]);
        assert_eq!(index.candidates(&probe, 10.0), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_geometry_always_candidate() {
        let geoms = vec![
            Geometry::MultiPoint(geo::MultiPoint::new(vec![])),
            Geometry::point(100.0, 100.0).unwrap(),
        ];
        let index = SpatialIndex::new(&geoms);
        assert_eq!(index.candidates(&BoundingBox::new(0.0, 0.0, 1.0, 1.0), 0.0), vec![0]);
    }
}
