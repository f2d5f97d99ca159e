//! Vector data model: geometries and attributed feature collections

mod feature;
mod geometry;

pub use feature::{AttributeValue, Feature, FeatureCollection, Field, FieldType, Schema};
pub use geometry::{BoundingBox, Geometry, GeometryKind};
