mod bbox;
mod load;
mod write;

use anyhow::Result;
use geo::{BoundingRect, Coord, InteriorPoint, MultiLineString, MultiPolygon, Point, Rect};
use rstar::RTree;

pub(crate) use bbox::IndexedBounds;
pub use load::load;

use crate::schema::{AttrValue, Field, Schema};

/// Geometry of a single feature. Collections may mix kinds in memory, but a
/// persisted shapefile must be homogeneous.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point<f64>),
    Lines(MultiLineString<f64>),
    Polygons(MultiPolygon<f64>),
}

impl Geometry {
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Geometry::Point(p) => Some(Rect::new(p.0, p.0)),
            Geometry::Lines(ls) => ls.bounding_rect(),
            Geometry::Polygons(mp) => mp.bounding_rect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::Lines(ls) => ls.0.iter().all(|l| l.0.len() < 2),
            Geometry::Polygons(mp) => mp.0.is_empty(),
        }
    }

    /// Guaranteed on-the-geometry point, used for containment assignment.
    /// `None` for degenerate geometries.
    pub fn interior_point(&self) -> Option<Point<f64>> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Lines(ls) => ls.interior_point(),
            Geometry::Polygons(mp) => mp.interior_point(),
        }
    }

    /// Transform every coordinate, propagating the first failure.
    pub fn try_map_coords<E>(
        &self,
        f: impl Fn(Coord<f64>) -> std::result::Result<Coord<f64>, E> + Copy,
    ) -> std::result::Result<Geometry, E> {
        use geo::MapCoords;
        Ok(match self {
            Geometry::Point(p) => Geometry::Point(p.try_map_coords(f)?),
            Geometry::Lines(ls) => Geometry::Lines(ls.try_map_coords(f)?),
            Geometry::Polygons(mp) => Geometry::Polygons(mp.try_map_coords(f)?),
        })
    }
}

/// One record: a geometry plus one attribute value per schema column.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub attrs: Vec<AttrValue>,
}

/// An ordered collection of features sharing a schema and a coordinate
/// reference system tag. Transforms produce new stores; nothing is mutated
/// in place.
#[derive(Debug, Clone)]
pub struct FeatureStore {
    schema: Schema,
    epsg: Option<u32>,
    features: Vec<Feature>,
}

impl FeatureStore {
    pub fn new(schema: Schema, epsg: Option<u32>) -> Self {
        Self { schema, epsg, features: Vec::new() }
    }

    /// Append a record, validating it against the schema.
    pub fn push(&mut self, feature: Feature) -> Result<()> {
        self.schema.validate(&feature.attrs)?;
        self.features.push(feature);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Value of column `name` for feature `idx`, if both exist.
    pub fn attr(&self, idx: usize, name: &str) -> Option<&AttrValue> {
        let col = self.schema.index(name)?;
        self.features.get(idx)?.attrs.get(col)
    }

    /// Subsequence of records satisfying `predicate`. No side effects.
    pub fn filter(&self, predicate: impl Fn(&Schema, &Feature) -> bool) -> FeatureStore {
        FeatureStore {
            schema: self.schema.clone(),
            epsg: self.epsg,
            features: self
                .features
                .iter()
                .filter(|f| predicate(&self.schema, f))
                .cloned()
                .collect(),
        }
    }

    /// New store with a constant-valued column appended to every record.
    pub fn with_const_column(&self, field: Field, value: AttrValue) -> Result<FeatureStore> {
        let schema = self.schema.with_field(field)?;
        let features = self
            .features
            .iter()
            .map(|f| {
                let mut attrs = f.attrs.clone();
                attrs.push(value.clone());
                Feature { geometry: f.geometry.clone(), attrs }
            })
            .collect();
        Ok(FeatureStore { schema, epsg: self.epsg, features })
    }

    /// New store with column `old` renamed to `new`. Values are untouched;
    /// this is how source-specific DBF names (HUC8, HUC_8, ...) become the
    /// pipeline's canonical tag columns.
    pub fn rename_column(&self, old: &str, new: &str) -> Result<FeatureStore> {
        use crate::error::PrepError;

        let col = self
            .schema
            .index(old)
            .ok_or_else(|| PrepError::Format(format!("no column {old:?} to rename")))?;
        let mut fields = self.schema.fields().to_vec();
        fields[col].name = new.to_string();
        Ok(FeatureStore {
            schema: Schema::new(fields)?,
            epsg: self.epsg,
            features: self.features.clone(),
        })
    }

    /// Concatenate stores with identical schemas and CRS tags into one.
    pub fn concat(stores: &[FeatureStore]) -> Result<FeatureStore> {
        use crate::error::PrepError;

        let first = stores
            .first()
            .ok_or_else(|| PrepError::Format("cannot concatenate zero stores".into()))?;
        let mut out = FeatureStore::new(first.schema.clone(), first.epsg);
        for store in stores {
            if store.schema != first.schema {
                return Err(PrepError::Format("schema mismatch between stores".into()).into());
            }
            if store.epsg != first.epsg {
                return Err(PrepError::Projection(format!(
                    "cannot concatenate stores with different CRS tags ({:?} vs {:?})",
                    first.epsg, store.epsg
                ))
                .into());
            }
            out.features.extend(store.features.iter().cloned());
        }
        Ok(out)
    }

    /// Bulk-load an R-tree of feature bounding boxes for bbox prefiltering.
    /// Degenerate features (no bounding rect) are left out of the index.
    pub(crate) fn bbox_tree(&self) -> RTree<IndexedBounds> {
        RTree::bulk_load(
            self.features
                .iter()
                .enumerate()
                .filter_map(|(i, f)| f.geometry.bounding_rect().map(|r| IndexedBounds::new(i, r)))
                .collect(),
        )
    }

    pub(crate) fn from_parts(schema: Schema, epsg: Option<u32>, features: Vec<Feature>) -> Self {
        Self { schema, epsg, features }
    }
}
