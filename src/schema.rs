use anyhow::Result;

use crate::error::PrepError;

/// Declared type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Str,
}

/// A named, typed attribute column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self { name: name.to_string(), kind }
    }
}

/// A single attribute value. `Null` stands for a missing DBF value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Null,
}

impl AttrValue {
    pub fn matches(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (AttrValue::Int(_), FieldKind::Int)
                | (AttrValue::Float(_), FieldKind::Float)
                | (AttrValue::Str(_), FieldKind::Str)
                | (AttrValue::Null, _)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Ordered set of attribute columns for a feature collection.
/// Column names are unique; records are validated against the schema
/// when they enter a store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut seen = ahash::AHashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(PrepError::Format(format!("duplicate column: {}", field.name)).into());
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Positional index of a column, if present.
    pub fn index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns a new schema with `field` appended. Errors on a name collision,
    /// so a tag column can never silently shadow a source column.
    pub fn with_field(&self, field: Field) -> Result<Schema> {
        let mut fields = self.fields.clone();
        fields.push(field);
        Schema::new(fields)
    }

    /// Check a record's values against the declared column kinds.
    pub fn validate(&self, attrs: &[AttrValue]) -> Result<()> {
        if attrs.len() != self.fields.len() {
            return Err(PrepError::Format(format!(
                "record has {} values, schema has {} columns",
                attrs.len(),
                self.fields.len()
            ))
            .into());
        }
        for (value, field) in attrs.iter().zip(&self.fields) {
            if !value.matches(field.kind) {
                return Err(PrepError::Format(format!(
                    "column {:?} expects {:?}, got {:?}",
                    field.name, field.kind, value
                ))
                .into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_columns() {
        let result = Schema::new(vec![
            Field::new("comid", FieldKind::Int),
            Field::new("comid", FieldKind::Str),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn validates_kinds() {
        let schema = Schema::new(vec![
            Field::new("comid", FieldKind::Int),
            Field::new("ftype", FieldKind::Str),
        ])
        .unwrap();

        assert!(schema
            .validate(&[AttrValue::Int(13293262), AttrValue::Str("LakePond".into())])
            .is_ok());
        assert!(schema
            .validate(&[AttrValue::Str("13293262".into()), AttrValue::Str("LakePond".into())])
            .is_err());
        assert!(schema.validate(&[AttrValue::Int(1)]).is_err());
    }

    #[test]
    fn null_matches_any_kind() {
        let schema = Schema::new(vec![Field::new("area", FieldKind::Float)]).unwrap();
        assert!(schema.validate(&[AttrValue::Null]).is_ok());
    }

    #[test]
    fn with_field_rejects_collision() {
        let schema = Schema::new(vec![Field::new("huc8", FieldKind::Str)]).unwrap();
        assert!(schema.with_field(Field::new("huc8", FieldKind::Str)).is_err());
        let grown = schema.with_field(Field::new("huc10", FieldKind::Str)).unwrap();
        assert_eq!(grown.len(), 2);
        assert_eq!(grown.index("huc10"), Some(1));
    }
}
