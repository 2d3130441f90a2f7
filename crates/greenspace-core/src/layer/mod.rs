//! In-memory vector layers: polygon features sharing an attribute schema and a CRS.

mod edit;
mod schema;
mod value;

pub use edit::EditSession;
pub use schema::{FieldDef, FieldIndex, Schema};
pub use value::{FieldKind, Value, ValueKey};

use crate::crs::Crs;
use crate::{Error, Result};
use geo::{Area, MultiPolygon};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub fid: u64,
    pub geometry: MultiPolygon<f64>,
    values: Vec<Value>,
}

impl Feature {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, field: FieldIndex) -> &Value {
        &self.values[field.index]
    }

    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    crs: Crs,
    schema: Schema,
    features: Vec<Feature>,
    next_fid: u64,
    pub source: Option<PathBuf>,
}

impl Layer {
    pub fn new(name: impl Into<String>, crs: Crs, schema: Schema) -> Self {
        Self {
            name: name.into(),
            crs,
            schema,
            features: Vec::new(),
            next_fid: 0,
            source: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub(crate) fn set_crs(&mut self, crs: Crs) {
        self.crs = crs;
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub(crate) fn features_mut(&mut self) -> &mut [Feature] {
        &mut self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature(&self, fid: u64) -> Option<&Feature> {
        self.features.iter().find(|f| f.fid == fid)
    }

    /// Appends a feature, assigning the next feature id.
    ///
    /// `values` must follow the schema order and fit each field's kind.
    pub fn push(&mut self, geometry: MultiPolygon<f64>, values: Vec<Value>) -> Result<u64> {
        let fid = self.next_fid;
        self.push_with_fid(fid, geometry, values)?;
        Ok(fid)
    }

    pub(crate) fn push_with_fid(
        &mut self,
        fid: u64,
        geometry: MultiPolygon<f64>,
        values: Vec<Value>,
    ) -> Result<()> {
        if values.len() != self.schema.len() {
            return Err(Error::InvalidConfig {
                message: format!(
                    "feature {fid} of {} has {} values for {} fields",
                    self.name,
                    values.len(),
                    self.schema.len()
                ),
            });
        }
        for (idx, value) in values.iter().enumerate() {
            let Some(field) = self.schema.field(idx) else {
                continue;
            };
            if !value.fits(field.kind) {
                return Err(Error::FieldTypeMismatch {
                    layer: self.name.clone(),
                    field: field.name,
                    expected: field.kind.to_string(),
                    found: format!("{value:?}"),
                });
            }
        }
        self.features.push(Feature {
            fid,
            geometry,
            values,
        });
        self.next_fid = self.next_fid.max(fid + 1);
        Ok(())
    }

    /// Looks up a value by field name; `None` when the field does not exist.
    pub fn value_of<'a>(&self, feature: &'a Feature, name: &str) -> Option<&'a Value> {
        self.schema.lookup(name).map(|field| feature.value(field))
    }

    pub fn total_area(&self) -> f64 {
        self.features.iter().map(Feature::area).sum()
    }

    /// Runs `f` against a guarded edit session.
    ///
    /// Schema additions and value writes become visible only when `f` returns `Ok`; on error
    /// the layer is left exactly as it was.
    pub fn edit<T>(&mut self, f: impl FnOnce(&mut EditSession<'_>) -> Result<T>) -> Result<T> {
        let mut session = EditSession::begin(&self.name, &self.schema, &self.features);
        match f(&mut session) {
            Ok(out) => {
                let (schema, values) = session.into_parts();
                self.schema = schema;
                for (feature, values) in self.features.iter_mut().zip(values) {
                    feature.values = values;
                }
                Ok(out)
            }
            Err(err) => {
                tracing::debug!(layer = %self.name, "edit session rolled back: {err}");
                Err(err)
            }
        }
    }
}
