//! Area-weighted interpolation between incongruent polygon layers

use geocomp_core::crs::ensure_same_crs;
use geocomp_core::vector::{AttributeValue, FeatureCollection, FieldType, Geometry};
use geocomp_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::intersection::fragments;

/// How a source attribute is spread over target polygons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variable {
    /// Count-like: split proportionally to the overlapping area share
    Extensive,
    /// Density-like: area-weighted mean of the overlapping sources
    Intensive,
}

/// Fields to transfer and how each one is interpolated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolateParams {
    pub fields: Vec<(String, Variable)>,
}

impl InterpolateParams {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn extensive(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Variable::Extensive));
        self
    }

    pub fn intensive(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), Variable::Intensive));
        self
    }
}

impl Default for InterpolateParams {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    weighted: f64,
    weight: f64,
    hits: usize,
}

fn require_polygonal(fc: &FeatureCollection, role: &str) -> Result<()> {
    match fc.geometry_kind() {
        Some(kind) if kind.dimension() != 2 => Err(Error::InvalidGeometry(format!(
            "{role} features must be polygons, got {kind}"
        ))),
        _ => Ok(()),
    }
}

/// Transfer attributes from `source` polygons onto `target` polygons.
///
/// Every source feature is intersected with every target feature. An
/// extensive value contributes `value * fragment_area / source_area` to the
/// fragment's target; an intensive value contributes to an area-weighted
/// mean. Targets without any overlapping fragment receive null, never zero.
/// Sources with zero area or a null value contribute nothing.
///
/// The result is the target collection with one float column appended per
/// interpolated field.
pub fn area_weighted_interpolate(
    source: &FeatureCollection,
    target: &FeatureCollection,
    params: &InterpolateParams,
) -> Result<FeatureCollection> {
    ensure_same_crs(source.crs(), target.crs())?;
    require_polygonal(source, "source")?;
    require_polygonal(target, "target")?;

    let columns = params
        .fields
        .iter()
        .map(|(name, variable)| Ok((name.as_str(), *variable, source.schema().require(name)?)))
        .collect::<Result<Vec<_>>>()?;

    let src_geoms: Vec<Geometry> = source.geometries().cloned().collect();
    let tgt_geoms: Vec<Geometry> = target.geometries().cloned().collect();
    let source_area: Vec<f64> = src_geoms.iter().map(Geometry::area).collect();
    let frags = fragments(&src_geoms, &tgt_geoms)?;
    debug!(
        sources = source.len(),
        targets = target.len(),
        fragments = frags.len(),
        "area-weighted interpolation"
    );

    let mut acc = vec![vec![Accumulator::default(); target.len()]; columns.len()];
    for frag in &frags {
        let src_area = source_area[frag.a];
        if src_area <= 0.0 {
            continue;
        }
        let frag_area = frag.geometry.area();
        let share = frag_area / src_area;
        trace!(source = frag.a, target = frag.b, share, "fragment");

        for (k, &(_, variable, col)) in columns.iter().enumerate() {
            let Some(value) = source.features()[frag.a].properties[col].as_f64() else {
                continue;
            };
            let slot = &mut acc[k][frag.b];
            match variable {
                Variable::Extensive => slot.weighted += value * share,
                Variable::Intensive => {
                    slot.weighted += value * frag_area;
                    slot.weight += frag_area;
                }
            }
            slot.hits += 1;
        }
    }

    let mut out = target.clone();
    for (k, &(name, variable, _)) in columns.iter().enumerate() {
        let values = acc[k]
            .iter()
            .map(|a| match variable {
                _ if a.hits == 0 => AttributeValue::Null,
                Variable::Extensive => AttributeValue::Float(a.weighted),
                Variable::Intensive if a.weight > 0.0 => AttributeValue::Float(a.weighted / a.weight),
                Variable::Intensive => AttributeValue::Null,
            })
            .collect();
        out = out.with_column(name, FieldType::Float, values)?;
    }
    Ok(out)
}

/// Area-weighted interpolation as an [`Algorithm`]; input is
/// `(source, target)`.
#[derive(Debug, Clone, Default)]
pub struct AreaWeightedInterpolation;

impl Algorithm for AreaWeightedInterpolation {
    type Input = (FeatureCollection, FeatureCollection);
    type Output = FeatureCollection;
    type Params = InterpolateParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "AreaWeightedInterpolation"
    }

    fn description(&self) -> &'static str {
        "Transfer extensive or intensive attributes between incongruent polygon layers"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        area_weighted_interpolate(&input.0, &input.1, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sources() -> FeatureCollection {
        FeatureCollection::from_geometries(
            vec![
                Geometry::rect(0.0, 0.0, 2.0, 1.0).unwrap(),
                Geometry::rect(2.0, 0.0, 3.0, 1.0).unwrap(),
            ],
            None,
        )
        .unwrap()
        .with_column("pop", FieldType::Float, vec![100.0.into(), 50.0.into()])
        .unwrap()
        .with_column("density", FieldType::Float, vec![10.0.into(), 40.0.into()])
        .unwrap()
    }

    fn targets(cells: &[(f64, f64, f64, f64)]) -> FeatureCollection {
        FeatureCollection::from_geometries(
            cells
                .iter()
                .map(|&(a, b, c, d)| Geometry::rect(a, b, c, d).unwrap())
                .collect(),
            None,
        )
        .unwrap()
    }

    fn floats(fc: &FeatureCollection, name: &str) -> Vec<Option<f64>> {
        fc.column(name).unwrap().iter().map(|v| v.as_f64()).collect()
    }

    #[test]
    fn test_extensive_is_split_by_area() {
        let t = targets(&[(0.0, 0.0, 1.0, 1.0), (1.0, 0.0, 2.5, 1.0), (2.5, 0.0, 3.0, 1.0)]);
        let out = area_weighted_interpolate(&sources(), &t, &InterpolateParams::new().extensive("pop")).unwrap();
        let pop = floats(&out, "pop");
        assert_relative_eq!(pop[0].unwrap(), 50.0, epsilon = 1e-9);
        assert_relative_eq!(pop[1].unwrap(), 75.0, epsilon = 1e-9);
        assert_relative_eq!(pop[2].unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_intensive_is_area_weighted_mean() {
        let t = targets(&[(1.0, 0.0, 3.0, 1.0)]);
        let out = area_weighted_interpolate(&sources(), &t, &InterpolateParams::new().intensive("density")).unwrap();
        assert_relative_eq!(floats(&out, "density")[0].unwrap(), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uncovered_target_is_null_not_zero() {
        let t = targets(&[(0.0, 0.0, 1.0, 1.0), (50.0, 50.0, 51.0, 51.0)]);
        let out = area_weighted_interpolate(&sources(), &t, &InterpolateParams::new().extensive("pop")).unwrap();
        assert!(out.value(1, "pop").unwrap().is_null());
    }

    #[test]
    fn test_rejects_points_and_unknown_fields() {
        let pts = FeatureCollection::from_geometries(vec![Geometry::point(0.5, 0.5).unwrap()], None).unwrap();
        let params = InterpolateParams::new().extensive("pop");
        assert!(area_weighted_interpolate(&sources(), &pts, &params).is_err());
        let t = targets(&[(0.0, 0.0, 1.0, 1.0)]);
        assert!(area_weighted_interpolate(&sources(), &t, &InterpolateParams::new().extensive("nope")).is_err());
    }
}
