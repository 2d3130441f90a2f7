use super::{Feature, FieldDef, FieldIndex, FieldKind, Schema, Value};
use crate::{Error, Result};

/// Pending schema and attribute changes of a [`super::Layer`].
///
/// Geometry is read-only inside a session; only attribute values and the schema are staged.
pub struct EditSession<'a> {
    layer: &'a str,
    schema: Schema,
    features: &'a [Feature],
    values: Vec<Vec<Value>>,
}

impl<'a> EditSession<'a> {
    pub(super) fn begin(layer: &'a str, schema: &Schema, features: &'a [Feature]) -> Self {
        Self {
            layer,
            schema: schema.clone(),
            features,
            values: features.iter().map(|f| f.values.clone()).collect(),
        }
    }

    pub(super) fn into_parts(self) -> (Schema, Vec<Vec<Value>>) {
        (self.schema, self.values)
    }

    pub fn layer_name(&self) -> &str {
        self.layer
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The committed feature at `pos` (geometry and pre-session values).
    pub fn feature(&self, pos: usize) -> &'a Feature {
        &self.features[pos]
    }

    /// The staged value at `pos`.
    pub fn value(&self, pos: usize, field: FieldIndex) -> &Value {
        &self.values[pos][field.index]
    }

    /// Adds a field filled with nulls for every feature.
    pub fn add_field(&mut self, name: &str, kind: FieldKind) -> Result<FieldIndex> {
        let field = self.schema.push(self.layer, FieldDef::new(name, kind))?;
        for values in &mut self.values {
            values.push(Value::Null);
        }
        Ok(field)
    }

    pub fn set_value(&mut self, pos: usize, field: FieldIndex, value: Value) -> Result<()> {
        if !value.fits(field.kind) {
            let name = self
                .schema
                .field(field.index)
                .map(|f| f.name)
                .unwrap_or_default();
            return Err(Error::FieldTypeMismatch {
                layer: self.layer.to_string(),
                field: name,
                expected: field.kind.to_string(),
                found: format!("{value:?}"),
            });
        }
        self.values[pos][field.index] = value;
        Ok(())
    }
}
