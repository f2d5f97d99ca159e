//! Spatial joins: attribute transfer keyed by a topological predicate

use geocomp_core::crs::ensure_same_crs;
use geocomp_core::vector::{AttributeValue, Field, FieldType, FeatureCollection, Geometry, Schema};
use geocomp_core::{Algorithm, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::intersection::{free_name, merge_schemas};
use crate::maybe_rayon::*;
use crate::predicates::{Predicate, Prepared, SpatialIndex};
use crate::vector::{buffer, BufferParams};

/// Row cardinality policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Keep every target feature; unmatched ones get null attributes
    #[default]
    Left,
    /// Keep only target features with at least one match
    Inner,
}

/// Parameters for [`spatial_join`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialJoinParams {
    /// Relation tested as `predicate(target, source)`
    pub predicate: Predicate,
    pub how: JoinKind,
}

/// For every target geometry, the ascending indices of the sources it
/// matches under `predicate(target, source)`
pub(crate) fn match_lists(
    targets: &[Geometry],
    sources: &[Geometry],
    predicate: Predicate,
) -> Result<Vec<Vec<usize>>> {
    predicate.validate()?;
    let index = SpatialIndex::new(sources);
    let prepared = Prepared::prepare_all(sources);
    Ok(targets
        .par_iter()
        .map(|t| {
            let t = Prepared::new(t);
            let candidates = match (predicate.reach(), t.bbox) {
                (Some(reach), Some(bbox)) => index.candidates(&bbox, reach),
                _ => (0..sources.len()).collect(),
            };
            candidates
                .into_iter()
                .filter(|&j| t.evaluate(&prepared[j], predicate))
                .collect()
        })
        .collect())
}

/// Attach the attributes of matching `source` features to each `target`
/// feature.
///
/// One row is emitted per (target, source) match, in target order and then
/// source order; a target matching several sources appears several times.
/// Name collisions get `_left` / `_right` suffixes, and an `index_right`
/// column (`index_right_2`, ... when taken) records which source feature
/// matched (null when none did).
pub fn spatial_join(
    target: &FeatureCollection,
    source: &FeatureCollection,
    params: &SpatialJoinParams,
) -> Result<FeatureCollection> {
    ensure_same_crs(target.crs(), source.crs())?;
    let tg: Vec<Geometry> = target.geometries().cloned().collect();
    let sg: Vec<Geometry> = source.geometries().cloned().collect();
    let matches = match_lists(&tg, &sg, params.predicate)?;

    let mut schema = merge_schemas(target.schema(), source.schema(), ("_left", "_right"))?;
    let index_field = free_name(&schema, "index_right");
    schema.push(Field::new(index_field, FieldType::Integer))?;
    let blank = vec![AttributeValue::Null; source.schema().len()];

    let mut geometries = Vec::new();
    let mut records = Vec::new();
    for (i, found) in matches.iter().enumerate() {
        let left = &target.features()[i];
        if found.is_empty() && params.how == JoinKind::Left {
            let mut record = left.properties.clone();
            record.extend(blank.iter().cloned());
            record.push(AttributeValue::Null);
            geometries.push(left.geometry.clone());
            records.push(record);
        }
        for &j in found {
            let mut record = left.properties.clone();
            record.extend(source.features()[j].properties.iter().cloned());
            record.push(AttributeValue::Int(j as i64));
            geometries.push(left.geometry.clone());
            records.push(record);
        }
    }
    debug!(
        targets = target.len(),
        sources = source.len(),
        rows = records.len(),
        predicate = ?params.predicate,
        how = ?params.how,
        "spatial join"
    );
    FeatureCollection::new(geometries, records, schema, target.crs().cloned())
}

/// Aggregation applied to duplicate matches of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Mean,
    Sum,
    First,
    Min,
    Max,
}

impl Reducer {
    fn output_type(&self, source: FieldType) -> FieldType {
        match self {
            Reducer::First => source,
            _ => FieldType::Float,
        }
    }

    fn reduce<'a>(&self, mut values: impl Iterator<Item = &'a AttributeValue>) -> AttributeValue {
        match self {
            Reducer::First => values.find(|v| !v.is_null()).cloned().unwrap_or(AttributeValue::Null),
            numeric => {
                let nums: Vec<f64> = values.filter_map(AttributeValue::as_f64).collect();
                if nums.is_empty() {
                    AttributeValue::Null
                } else {
                    AttributeValue::Float(numeric.apply(&nums))
                }
            }
        }
    }

    fn apply(&self, nums: &[f64]) -> f64 {
        match self {
            Reducer::Sum => nums.iter().sum(),
            Reducer::Mean => nums.iter().sum::<f64>() / nums.len() as f64,
            Reducer::Min => nums.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::First => nums[0],
        }
    }
}

/// Parameters for [`buffered_join`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferedJoinParams {
    /// Distance the targets are grown by before matching
    pub distance: f64,
    pub reducer: Reducer,
    /// Source fields to aggregate; empty means all of them
    pub fields: Vec<String>,
    /// Keep targets without any match (with null aggregates)
    pub keep_unmatched: bool,
}

impl BufferedJoinParams {
    pub fn new(distance: f64, reducer: Reducer) -> Self {
        Self {
            distance,
            reducer,
            fields: Vec::new(),
            keep_unmatched: true,
        }
    }

    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn keep_unmatched(mut self, keep: bool) -> Self {
        self.keep_unmatched = keep;
        self
    }
}

/// Join features that are near but do not overlap.
///
/// Targets are buffered by `distance`, matched against the sources with
/// `intersects`, and the matches of each target are collapsed with the
/// reducer. The output has one row per target, located at the target's
/// centroid, with the target attributes, one aggregate per source field
/// and a `match_count` column (suffixed like `index_right` when taken).
pub fn buffered_join(
    target: &FeatureCollection,
    source: &FeatureCollection,
    params: &BufferedJoinParams,
) -> Result<FeatureCollection> {
    ensure_same_crs(target.crs(), source.crs())?;
    if !(params.distance.is_finite() && params.distance >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "distance",
            value: params.distance.to_string(),
            reason: "join distance must be finite and non-negative".into(),
        });
    }

    let names: Vec<String> = if params.fields.is_empty() {
        source.schema().names().map(str::to_string).collect()
    } else {
        params.fields.clone()
    };
    let mut reduced = Schema::default();
    let mut columns = Vec::with_capacity(names.len());
    for name in &names {
        let col = source.schema().require(name)?;
        let field_type = source.schema().fields()[col].field_type;
        reduced.push(Field::new(name.clone(), params.reducer.output_type(field_type)))?;
        columns.push(col);
    }

    let buffer_params = BufferParams::new(params.distance);
    let grown = target
        .geometries()
        .map(|g| buffer(g, &buffer_params))
        .collect::<Result<Vec<_>>>()?;
    let sg: Vec<Geometry> = source.geometries().cloned().collect();
    let matches = match_lists(&grown, &sg, Predicate::Intersects)?;

    let mut schema = merge_schemas(target.schema(), &reduced, ("_left", "_right"))?;
    let count_field = free_name(&schema, "match_count");
    schema.push(Field::new(count_field, FieldType::Integer))?;

    let mut geometries = Vec::new();
    let mut records = Vec::new();
    for (feature, found) in target.iter().zip(&matches) {
        if found.is_empty() && !params.keep_unmatched {
            continue;
        }
        let mut record = feature.properties.clone();
        for &col in &columns {
            let values = found.iter().map(|&j| &source.features()[j].properties[col]);
            record.push(params.reducer.reduce(values));
        }
        record.push(AttributeValue::Int(found.len() as i64));
        let geometry = match feature.geometry.centroid() {
            Some(c) => Geometry::Point(c),
            None => Geometry::MultiPoint(geo::MultiPoint::new(vec![])),
        };
        geometries.push(geometry);
        records.push(record);
    }
    debug!(
        targets = target.len(),
        sources = source.len(),
        distance = params.distance,
        reducer = ?params.reducer,
        "buffered join"
    );
    FeatureCollection::new(geometries, records, schema, target.crs().cloned())
}

/// [`spatial_join`] as an [`Algorithm`]; input is `(target, source)`
#[derive(Debug, Clone, Default)]
pub struct SpatialJoin;

impl Algorithm for SpatialJoin {
    type Input = (FeatureCollection, FeatureCollection);
    type Output = FeatureCollection;
    type Params = SpatialJoinParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "SpatialJoin"
    }

    fn description(&self) -> &'static str {
        "Attach attributes of source features matching each target feature"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        spatial_join(&input.0, &input.1, &params)
    }
}
