//! Attribute join of a base layer against a second layer by equal key values.

use crate::layer::{FieldDef, FieldKind, Layer, Schema, Value, ValueKey};
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMethod {
    /// One output feature per base feature, taking the first matching join feature.
    #[default]
    FirstMatch,
    /// One output feature per matching pair.
    OneToMany,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub method: JoinMethod,
    pub prefix: String,
    pub discard_nonmatching: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            method: JoinMethod::FirstMatch,
            prefix: "JJ_".to_string(),
            discard_nonmatching: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinSummary {
    pub base_features: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub duplicate_keys: usize,
    pub features: usize,
    pub joined_fields: Vec<String>,
}

fn key_family(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Integer | FieldKind::Real => "numeric",
        FieldKind::Text => "text",
        FieldKind::Boolean => "boolean",
    }
}

/// Joins `join` onto `base` where `base.base_field == join.join_field`.
///
/// The output has all base fields followed by every join field renamed `<prefix><name>`.
/// Null keys never match. Unmatched base features keep null joined values unless
/// `discard_nonmatching` is set.
pub fn join_attributes(
    base: &Layer,
    base_field: &str,
    join: &Layer,
    join_field: &str,
    options: &JoinOptions,
) -> Result<(Layer, JoinSummary)> {
    let _span = tracing::info_span!(
        "join",
        base = %base.name(),
        join = %join.name(),
        base_field,
        join_field
    )
    .entered();
    let base_key = base.schema().require_any(base.name(), base_field)?;
    let join_key = join.schema().require_any(join.name(), join_field)?;
    if key_family(base_key.kind()) != key_family(join_key.kind()) {
        return Err(Error::JoinKeyMismatch {
            base_layer: base.name().to_string(),
            base_field: base_field.to_string(),
            base_kind: base_key.kind().to_string(),
            join_layer: join.name().to_string(),
            join_field: join_field.to_string(),
            join_kind: join_key.kind().to_string(),
        });
    }

    let name = format!("{}_joined", base.name());
    let mut schema = Schema::from_fields(&name, base.schema().fields())?;
    let mut joined_fields = Vec::with_capacity(join.schema().len());
    for field in join.schema().fields() {
        let prefixed = schema.unique_name(&format!("{}{}", options.prefix, field.name));
        schema.push(&name, FieldDef::new(prefixed.clone(), field.kind))?;
        joined_fields.push(prefixed);
    }

    let mut index: FxHashMap<ValueKey, Vec<usize>> = FxHashMap::default();
    let mut duplicate_keys = 0usize;
    for (pos, feature) in join.features().iter().enumerate() {
        let Some(key) = feature.value(join_key).key() else {
            continue;
        };
        let slot = index.entry(key).or_default();
        if !slot.is_empty() {
            duplicate_keys += 1;
            tracing::warn!(
                layer = %join.name(),
                field = join_field,
                key = %feature.value(join_key),
                fid = feature.fid,
                "duplicate join key"
            );
        }
        slot.push(pos);
    }

    let nulls = vec![Value::Null; join.schema().len()];
    let mut out = Layer::new(name, base.crs().clone(), schema);
    out.source = base.source.clone();
    let mut matched = 0usize;
    let mut unmatched = 0usize;
    for feature in base.features() {
        let hits: &[usize] = feature
            .value(base_key)
            .key()
            .and_then(|key| index.get(&key))
            .map(Vec::as_slice)
            .unwrap_or_default();
        if hits.is_empty() {
            unmatched += 1;
            if options.discard_nonmatching {
                continue;
            }
            let values = feature.values().iter().chain(&nulls).cloned().collect();
            out.push_with_fid(feature.fid, feature.geometry.clone(), values)?;
            continue;
        }
        matched += 1;
        let take = match options.method {
            JoinMethod::FirstMatch => 1,
            JoinMethod::OneToMany => hits.len(),
        };
        for &pos in &hits[..take] {
            let values = feature
                .values()
                .iter()
                .chain(join.features()[pos].values())
                .cloned()
                .collect();
            match options.method {
                JoinMethod::FirstMatch => {
                    out.push_with_fid(feature.fid, feature.geometry.clone(), values)?
                }
                JoinMethod::OneToMany => {
                    out.push(feature.geometry.clone(), values)?;
                }
            }
        }
    }

    let summary = JoinSummary {
        base_features: base.len(),
        matched,
        unmatched,
        duplicate_keys,
        features: out.len(),
        joined_fields,
    };
    tracing::info!(
        matched,
        unmatched,
        duplicate_keys,
        features = summary.features,
        "attributes joined"
    );
    Ok((out, summary))
}
