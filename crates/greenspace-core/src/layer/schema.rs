use super::value::FieldKind;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Position of a validated field inside a [`Schema`].
///
/// Obtained once through [`Schema::require`] or [`Schema::require_numeric`], then used for
/// every per-feature read so evaluation never does name lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndex {
    pub(crate) index: usize,
    pub(crate) kind: FieldKind,
}

impl FieldIndex {
    pub fn index(self) -> usize {
        self.index
    }

    pub fn kind(self) -> FieldKind {
        self.kind
    }
}

/// Ordered attribute schema of a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: IndexMap<String, FieldKind>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(layer: &str, fields: impl IntoIterator<Item = FieldDef>) -> Result<Self> {
        let mut schema = Self::new();
        for field in fields {
            schema.push(layer, field)?;
        }
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = FieldDef> + '_ {
        self.fields
            .iter()
            .map(|(name, kind)| FieldDef::new(name.clone(), *kind))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, index: usize) -> Option<FieldDef> {
        self.fields
            .get_index(index)
            .map(|(name, kind)| FieldDef::new(name.clone(), *kind))
    }

    pub fn lookup(&self, name: &str) -> Option<FieldIndex> {
        self.fields
            .get_full(name)
            .map(|(index, _, kind)| FieldIndex { index, kind: *kind })
    }

    pub(crate) fn push(&mut self, layer: &str, field: FieldDef) -> Result<FieldIndex> {
        if self.fields.contains_key(&field.name) {
            return Err(Error::DuplicateField {
                layer: layer.to_string(),
                field: field.name,
            });
        }
        let (index, _) = self.fields.insert_full(field.name, field.kind);
        Ok(FieldIndex {
            index,
            kind: field.kind,
        })
    }

    /// Resolves `name` and checks it has exactly `kind`.
    pub fn require(&self, layer: &str, name: &str, kind: FieldKind) -> Result<FieldIndex> {
        let found = self.require_any(layer, name)?;
        if found.kind != kind {
            return Err(Error::FieldTypeMismatch {
                layer: layer.to_string(),
                field: name.to_string(),
                expected: kind.to_string(),
                found: found.kind.to_string(),
            });
        }
        Ok(found)
    }

    /// Resolves `name` and checks it is integer or real.
    pub fn require_numeric(&self, layer: &str, name: &str) -> Result<FieldIndex> {
        let found = self.require_any(layer, name)?;
        if !found.kind.is_numeric() {
            return Err(Error::FieldTypeMismatch {
                layer: layer.to_string(),
                field: name.to_string(),
                expected: "numeric".to_string(),
                found: found.kind.to_string(),
            });
        }
        Ok(found)
    }

    pub fn require_any(&self, layer: &str, name: &str) -> Result<FieldIndex> {
        self.lookup(name).ok_or_else(|| Error::MissingField {
            layer: layer.to_string(),
            field: name.to_string(),
        })
    }

    /// Returns `name`, or `name_1`, `name_2`, ... whichever is not taken yet.
    pub fn unique_name(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_string();
        }
        (1usize..)
            .map(|n| format!("{name}_{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}
