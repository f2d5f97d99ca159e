//! Batched predicate and distance evaluation
//!
//! Every batch mode is a repetition of the pairwise evaluation. Work is
//! partitioned by row (first-collection geometry); each row reads shared
//! geometry data and writes only its own output slots.

use geocomp_core::crs::{ensure_same_crs, CRS};
use geocomp_core::vector::{FeatureCollection, Geometry};
use geocomp_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::distance::prepared_distance;
use super::index::SpatialIndex;
use super::relation::{Predicate, Prepared};
use crate::maybe_rayon::*;

/// Options for matrix evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixOptions {
    /// Skip pairs whose envelopes rule the relation out. Results are
    /// identical either way.
    pub bbox_prefilter: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            bbox_prefilter: true,
        }
    }
}

/// N x M boolean table; entry (i, j) relates geometry i of the first
/// collection to geometry j of the second.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateMatrix {
    data: Array2<bool>,
}

impl PredicateMatrix {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<bool> {
        self.data.get((i, j)).copied()
    }

    pub fn row(&self, i: usize) -> Vec<bool> {
        self.data.row(i).to_vec()
    }

    pub fn column(&self, j: usize) -> Vec<bool> {
        self.data.column(j).to_vec()
    }

    /// Whether each row has at least one match
    pub fn any_per_row(&self) -> Vec<bool> {
        self.data.rows().into_iter().map(|r| r.iter().any(|&v| v)).collect()
    }

    /// All `(i, j)` with a true entry, row-major
    pub fn matches(&self) -> Vec<(usize, usize)> {
        self.data
            .indexed_iter()
            .filter(|(_, v)| **v)
            .map(|(ij, _)| ij)
            .collect()
    }

    pub fn as_array(&self) -> &Array2<bool> {
        &self.data
    }

    pub fn into_array(self) -> Array2<bool> {
        self.data
    }
}

/// Evaluate `predicate(g, target)` for every `g`, in input order
pub fn many_to_one(geometries: &[Geometry], target: &Geometry, predicate: Predicate) -> Result<Vec<bool>> {
    predicate.validate()?;
    let target = Prepared::new(target);
    Ok(geometries
        .par_iter()
        .map(|g| Prepared::new(g).evaluate(&target, predicate))
        .collect())
}

/// Distance from every geometry to `target`, in input order
pub fn distances_to(geometries: &[Geometry], target: &Geometry) -> Vec<f64> {
    let target = Prepared::new(target);
    geometries
        .par_iter()
        .map(|g| prepared_distance(&Prepared::new(g), &target))
        .collect()
}

fn check_lengths(a: &[Geometry], b: &[Geometry]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Evaluate index-aligned pairs `predicate(a[i], b[i])`
pub fn pairwise(a: &[Geometry], b: &[Geometry], predicate: Predicate) -> Result<Vec<bool>> {
    predicate.validate()?;
    check_lengths(a, b)?;
    Ok((0..a.len())
        .into_par_iter()
        .map(|i| Prepared::new(&a[i]).evaluate(&Prepared::new(&b[i]), predicate))
        .collect())
}

/// Distances between index-aligned pairs
pub fn pairwise_distance(a: &[Geometry], b: &[Geometry]) -> Result<Vec<f64>> {
    check_lengths(a, b)?;
    Ok((0..a.len())
        .into_par_iter()
        .map(|i| prepared_distance(&Prepared::new(&a[i]), &Prepared::new(&b[i])))
        .collect())
}

/// Evaluate `predicate(a[i], b[j])` for every pair
pub fn matrix(
    a: &[Geometry],
    b: &[Geometry],
    predicate: Predicate,
    options: &MatrixOptions,
) -> Result<PredicateMatrix> {
    predicate.validate()?;
    let (n, m) = (a.len(), b.len());
    debug!(rows = n, cols = m, ?predicate, prefilter = options.bbox_prefilter, "predicate matrix");

    let columns = Prepared::prepare_all(b);
    let index = options.bbox_prefilter.then(|| SpatialIndex::new(b));

    let cells: Vec<bool> = (0..n)
        .into_par_iter()
        .flat_map(|i| {
            let row = Prepared::new(&a[i]);
            match (&index, row.bbox, predicate.reach()) {
                (Some(index), Some(bbox), Some(reach)) => {
                    let mut out = vec![false; m];
                    for j in index.candidates(&bbox, reach) {
                        out[j] = row.evaluate(&columns[j], predicate);
                    }
                    out
                }
                (Some(_), _, _) => columns
                    .iter()
                    .map(|col| {
                        row.envelope_verdict(col, predicate)
                            .unwrap_or_else(|| row.evaluate(col, predicate))
                    })
                    .collect(),
                (None, _, _) => columns.iter().map(|col| row.evaluate(col, predicate)).collect(),
            }
        })
        .collect();

    let data = Array2::from_shape_vec((n, m), cells).map_err(|e| Error::Other(e.to_string()))?;
    Ok(PredicateMatrix { data })
}

/// N x M table of distances
pub fn distance_matrix(a: &[Geometry], b: &[Geometry]) -> Result<Array2<f64>> {
    let columns = Prepared::prepare_all(b);
    let cells: Vec<f64> = (0..a.len())
        .into_par_iter()
        .flat_map(|i| {
            let row = Prepared::new(&a[i]);
            columns
                .iter()
                .map(|col| prepared_distance(&row, col))
                .collect::<Vec<_>>()
        })
        .collect();
    Array2::from_shape_vec((a.len(), b.len()), cells).map_err(|e| Error::Other(e.to_string()))
}

fn collect_geometries(fc: &FeatureCollection) -> Vec<Geometry> {
    fc.geometries().cloned().collect()
}

/// Matrix over two feature collections, which must share a CRS
pub fn collection_matrix(
    a: &FeatureCollection,
    b: &FeatureCollection,
    predicate: Predicate,
    options: &MatrixOptions,
) -> Result<PredicateMatrix> {
    ensure_same_crs(a.crs(), b.crs())?;
    matrix(&collect_geometries(a), &collect_geometries(b), predicate, options)
}

/// Features of `fc` satisfying `predicate(feature, target)`.
///
/// `target_crs` is the CRS the target geometry is expressed in.
pub fn filter_by(
    fc: &FeatureCollection,
    predicate: Predicate,
    target: &Geometry,
    target_crs: Option<&CRS>,
) -> Result<FeatureCollection> {
    ensure_same_crs(fc.crs(), target_crs)?;
    let mask = many_to_one(&collect_geometries(fc), target, predicate)?;
    let keep: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, m)| **m)
        .map(|(i, _)| i)
        .collect();
    debug!(kept = keep.len(), total = fc.len(), "filter_by");
    fc.select(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Geometry> {
        [(0.2, 0.1), (0.7, 0.2), (0.4, 0.8)]
            .iter()
            .map(|&(x, y)| Geometry::point(x, y).unwrap())
            .collect()
    }

    fn polygon() -> Geometry {
        Geometry::polygon(
            &[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.5), (0.0, 0.0)],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn test_many_to_one_scenario() {
        let pts = points();
        let poly = polygon();
        assert_eq!(
            many_to_one(&pts, &poly, Predicate::Intersects).unwrap(),
            vec![true, false, true]
        );
        assert_eq!(
            many_to_one(&pts, &poly, Predicate::Within).unwrap(),
            vec![false, false, true]
        );
        assert_eq!(
            many_to_one(&pts, &poly, Predicate::Touches).unwrap(),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_matrix_prefilter_does_not_change_results() {
        let pts = points();
        let targets = vec![polygon(), Geometry::rect(0.6, 0.1, 0.8, 0.3).unwrap()];
        for pred in [
            Predicate::Intersects,
            Predicate::Disjoint,
            Predicate::Within,
            Predicate::Touches,
            Predicate::WithinDistance(0.1),
        ] {
            let with = matrix(&pts, &targets, pred, &MatrixOptions::default()).unwrap();
            let without = matrix(&pts, &targets, pred, &MatrixOptions { bbox_prefilter: false }).unwrap();
            assert_eq!(with, without, "{pred:?}");
        }
        let m = matrix(&pts, &targets, Predicate::Intersects, &MatrixOptions::default()).unwrap();
        assert_eq!(m.shape(), (3, 2));
        assert_eq!(m.column(0), vec![true, false, true]);
        assert_eq!(m.row(1), vec![false, true]);
        assert_eq!(m.any_per_row(), vec![true, true, true]);
        assert_eq!(m.matches(), vec![(0, 0), (1, 1), (2, 0)]);
    }

    #[test]
    fn test_pairwise_length_mismatch() {
        let pts = points();
        let err = pairwise(&pts, &pts[..2], Predicate::Intersects).unwrap_err();
        assert_eq!(err, Error::LengthMismatch { left: 3, right: 2 });
        assert_eq!(pairwise(&pts, &pts, Predicate::Equals).unwrap(), vec![true; 3]);
        assert!(pairwise_distance(&pts, &pts[..1]).is_err());
    }

    #[test]
    fn test_distance_matrix() {
        let pts = points();
        let d = distance_matrix(&pts, &[polygon()]).unwrap();
        assert_eq!(d.dim(), (3, 1));
        assert_eq!(d[(0, 0)], 0.0);
        assert!(d[(1, 0)] > 0.0);
        assert_eq!(distances_to(&pts, &polygon())[2], 0.0);
    }

    #[test]
    fn test_filter_by_checks_crs() {
        let fc = FeatureCollection::from_geometries(points(), Some(CRS::from_epsg(32630))).unwrap();
        let inside = filter_by(&fc, Predicate::Within, &polygon(), Some(&CRS::from_epsg(32630))).unwrap();
        assert_eq!(inside.len(), 1);
        assert!(matches!(
            filter_by(&fc, Predicate::Within, &polygon(), Some(&CRS::from_epsg(4326))),
            Err(Error::CrsMismatch(..))
        ));
    }
}
