//! Attributed feature collections

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{BoundingBox, Geometry, GeometryKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric view of integer and float values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Type of a non-null value
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(_) => Some(FieldType::Boolean),
            AttributeValue::Int(_) => Some(FieldType::Integer),
            AttributeValue::Float(_) => Some(FieldType::Float),
            AttributeValue::Text(_) => Some(FieldType::Text),
        }
    }

    /// Key usable for grouping; floats compare by bit pattern
    pub fn group_key(&self) -> String {
        match self {
            AttributeValue::Null => "\0null".to_string(),
            AttributeValue::Bool(b) => format!("b:{b}"),
            AttributeValue::Int(v) => format!("i:{v}"),
            AttributeValue::Float(v) => format!("f:{:x}", v.to_bits()),
            AttributeValue::Text(s) => format!("t:{s}"),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("null"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttributeValue::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Ordered attribute schema with unique field names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut schema = Schema::default();
        for field in fields {
            schema.push(field)?;
        }
        Ok(schema)
    }

    pub fn push(&mut self, field: Field) -> Result<()> {
        if self.index_of(&field.name).is_some() {
            return Err(Error::SchemaMismatch(format!(
                "duplicate field '{}'",
                field.name
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Index of `name` or a [`Error::SchemaMismatch`]
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| Error::SchemaMismatch(format!("no field named '{name}'")))
    }

    /// Check a record against the schema, widening integers stored in
    /// float fields.
    fn conform(&self, record: &mut [AttributeValue]) -> Result<()> {
        if record.len() != self.fields.len() {
            return Err(Error::SchemaMismatch(format!(
                "record has {} values, schema has {} fields",
                record.len(),
                self.fields.len()
            )));
        }
        record
            .iter_mut()
            .zip(&self.fields)
            .try_for_each(|(value, field)| field.conform(value))
    }
}

impl Field {
    fn conform(&self, value: &mut AttributeValue) -> Result<()> {
        match (value.field_type(), self.field_type) {
            (None, _) => Ok(()),
            (Some(FieldType::Integer), FieldType::Float) => {
                if let AttributeValue::Int(v) = *value {
                    *value = AttributeValue::Float(v as f64);
                }
                Ok(())
            }
            (Some(t), expected) if t == expected => Ok(()),
            (Some(t), expected) => Err(Error::SchemaMismatch(format!(
                "field '{}' expects {expected:?}, got {t:?}",
                self.name
            ))),
        }
    }
}

/// A geometry with its attribute record, ordered like the collection schema
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Vec<AttributeValue>,
}

/// Ordered features sharing one schema, one CRS and one geometry
/// dimension (a kind and its Multi-equivalent may be mixed).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    features: Vec<Feature>,
    schema: Schema,
    crs: Option<CRS>,
    kind: Option<GeometryKind>,
}

impl FeatureCollection {
    /// Build a collection from decoded geometries and records
    pub fn new(
        geometries: Vec<Geometry>,
        mut records: Vec<Vec<AttributeValue>>,
        schema: Schema,
        crs: Option<CRS>,
    ) -> Result<Self> {
        if geometries.len() != records.len() {
            return Err(Error::LengthMismatch {
                left: geometries.len(),
                right: records.len(),
            });
        }
        for record in records.iter_mut() {
            schema.conform(record)?;
        }
        let kind = collection_kind(&geometries)?;

        let features = geometries
            .into_iter()
            .zip(records)
            .map(|(geometry, properties)| Feature {
                geometry,
                properties,
            })
            .collect();
        Ok(Self {
            features,
            schema,
            crs,
            kind,
        })
    }

    /// Collection with an empty schema
    pub fn from_geometries(geometries: Vec<Geometry>, crs: Option<CRS>) -> Result<Self> {
        let records = vec![Vec::new(); geometries.len()];
        Self::new(geometries, records, Schema::default(), crs)
    }

    /// Append a column of values, one per feature
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        mut values: Vec<AttributeValue>,
    ) -> Result<Self> {
        if values.len() != self.features.len() {
            return Err(Error::LengthMismatch {
                left: self.features.len(),
                right: values.len(),
            });
        }
        let field = Field::new(name, field_type);
        values.iter_mut().try_for_each(|v| field.conform(v))?;
        self.schema.push(field)?;
        for (feature, value) in self.features.iter_mut().zip(values) {
            feature.properties.push(value);
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Geometry kind of the collection; the Multi form when any feature
    /// is multi-part. `None` when empty.
    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        self.kind
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.features.iter().map(|f| &f.geometry)
    }

    /// Attribute `name` of feature `index`
    pub fn value(&self, index: usize, name: &str) -> Option<&AttributeValue> {
        let col = self.schema.index_of(name)?;
        self.features.get(index).map(|f| &f.properties[col])
    }

    /// Every value of one column, in feature order
    pub fn column(&self, name: &str) -> Result<Vec<&AttributeValue>> {
        let col = self.schema.require(name)?;
        Ok(self.features.iter().map(|f| &f.properties[col]).collect())
    }

    /// Union of all feature bounding boxes
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.geometries()
            .filter_map(Geometry::bounding_box)
            .reduce(|a, b| a.union(&b))
    }

    /// Features at `indices`, in that order, sharing schema and CRS
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let features = indices
            .iter()
            .map(|&i| {
                self.features.get(i).cloned().ok_or(Error::LengthMismatch {
                    left: self.features.len(),
                    right: i + 1,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let kind = collection_kind(features.iter().map(|f| &f.geometry))?;
        Ok(Self {
            features,
            schema: self.schema.clone(),
            crs: self.crs.clone(),
            kind,
        })
    }

    /// Split into geometries, records, schema and CRS for an external writer
    pub fn into_parts(self) -> (Vec<Geometry>, Vec<Vec<AttributeValue>>, Schema, Option<CRS>) {
        let (geometries, records) = self
            .features
            .into_iter()
            .map(|f| (f.geometry, f.properties))
            .unzip();
        (geometries, records, self.schema, self.crs)
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

fn collection_kind<'a>(
    geometries: impl IntoIterator<Item = &'a Geometry>,
) -> Result<Option<GeometryKind>> {
    let mut kind: Option<GeometryKind> = None;
    for g in geometries {
        g.validate()?;
        let k = g.kind();
        kind = match kind {
            None => Some(k),
            Some(prev) if prev.dimension() != k.dimension() => {
                return Err(Error::SchemaMismatch(format!(
                    "collection mixes {prev} and {k} geometries"
                )));
            }
            Some(prev) if prev != k => Some(prev.multi()),
            same => same,
        };
    }
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squares() -> Vec<Geometry> {
        vec![
            Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap(),
            Geometry::rect(1.0, 0.0, 2.0, 1.0).unwrap(),
        ]
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("name", FieldType::Text),
            Field::new("pop", FieldType::Float),
        ])
        .unwrap()
    }

    #[test]
    fn test_collection_ingest() {
        let fc = FeatureCollection::new(
            squares(),
            vec![
                vec!["a".into(), AttributeValue::Int(100)],
                vec!["b".into(), AttributeValue::Null],
            ],
            schema(),
            Some(CRS::from_epsg(3857)),
        )
        .unwrap();
        assert_eq!(fc.len(), 2);
        assert_eq!(fc.geometry_kind(), Some(GeometryKind::Polygon));
        assert_eq!(fc.value(0, "pop"), Some(&AttributeValue::Float(100.0)));
        assert!(fc.value(1, "pop").unwrap().is_null());
        assert_eq!(fc.bounding_box().unwrap().as_tuple(), (0.0, 0.0, 2.0, 1.0));
    }

    #[test]
    fn test_collection_rejects_bad_input() {
        let short = FeatureCollection::new(squares(), vec![vec![]], Schema::default(), None);
        assert!(matches!(short, Err(Error::LengthMismatch { left: 2, right: 1 })));

        let wrong_type = FeatureCollection::new(
            squares(),
            vec![
                vec![AttributeValue::Int(1), AttributeValue::Float(1.0)],
                vec!["b".into(), AttributeValue::Float(1.0)],
            ],
            schema(),
            None,
        );
        assert!(matches!(wrong_type, Err(Error::SchemaMismatch(_))));

        let mixed = FeatureCollection::from_geometries(
            vec![
                Geometry::point(0.0, 0.0).unwrap(),
                Geometry::rect(0.0, 0.0, 1.0, 1.0).unwrap(),
            ],
            None,
        );
        assert!(matches!(mixed, Err(Error::SchemaMismatch(_))));

        assert!(Schema::new(vec![
            Field::new("a", FieldType::Text),
            Field::new("a", FieldType::Float),
        ])
        .is_err());
    }

    #[test]
    fn test_multi_equivalent_accepted() {
        let mut geoms = squares();
        geoms.push(Geometry::MultiPolygon(geoms[0].to_multi_polygon().unwrap()));
        let fc = FeatureCollection::from_geometries(geoms, None).unwrap();
        assert_eq!(fc.geometry_kind(), Some(GeometryKind::MultiPolygon));
    }

    #[test]
    fn test_with_column_and_select() {
        let fc = FeatureCollection::from_geometries(squares(), None)
            .unwrap()
            .with_column("id", FieldType::Integer, vec![7i64.into(), 9i64.into()])
            .unwrap();
        let sub = fc.select(&[1]).unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.value(0, "id"), Some(&AttributeValue::Int(9)));
        assert!(fc.select(&[5]).is_err());

        let (geoms, records, schema, crs) = fc.into_parts();
        assert_eq!(geoms.len(), 2);
        assert_eq!(records[0], vec![AttributeValue::Int(7)]);
        assert_eq!(schema.len(), 1);
        assert!(crs.is_none());
    }
}
