use super::union_all;
use crate::Result;
use crate::layer::{Feature, Layer, ValueKey};
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DissolveSummary {
    pub field: String,
    pub features_in: usize,
    pub groups: usize,
}

/// Merges features sharing the value of `field` into one multipart feature per group.
///
/// Groups appear in first-appearance order and keep the attributes of their first feature.
/// All null keys form a single group.
pub fn dissolve(layer: &Layer, field: &str) -> Result<(Layer, DissolveSummary)> {
    let _span = tracing::info_span!("dissolve", layer = %layer.name(), field).entered();
    let key_field = layer.schema().require_any(layer.name(), field)?;

    let mut groups: IndexMap<Option<ValueKey>, Vec<&Feature>> = IndexMap::new();
    for feature in layer.features() {
        groups
            .entry(feature.value(key_field).key())
            .or_default()
            .push(feature);
    }

    let mut out = Layer::new(
        format!("{}_dissolved", layer.name()),
        layer.crs().clone(),
        layer.schema().clone(),
    );
    for members in groups.values() {
        let Some(first) = members.first() else {
            continue;
        };
        let geometry = union_all(members.iter().map(|f| &f.geometry));
        tracing::debug!(
            key = %first.value(key_field),
            members = members.len(),
            "group dissolved"
        );
        out.push(geometry, first.values().to_vec())?;
    }

    let summary = DissolveSummary {
        field: field.to_string(),
        features_in: layer.len(),
        groups: out.len(),
    };
    tracing::info!(features_in = summary.features_in, groups = summary.groups, "layer dissolved");
    Ok((out, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::crs::Crs;
    use crate::layer::test_support::rect_mp;
    use crate::layer::{FieldDef, FieldKind, Schema, Value};

    fn layer() -> Layer {
        let schema = Schema::from_fields(
            "gs",
            [
                FieldDef::new("KEY", FieldKind::Text),
                FieldDef::new("ID", FieldKind::Integer),
            ],
        )
        .unwrap();
        let mut layer = Layer::new("gs", Crs::utm_wgs84(17, true), schema);
        let rows = [
            (0.0, "B", 1),
            (10.0, "A", 2),
            (20.0, "B", 3),
            (30.0, "", 4),
            (40.0, "A", 5),
        ];
        for (x, key, id) in rows {
            let key = if key.is_empty() { Value::Null } else { Value::from(key) };
            layer
                .push(rect_mp(x, 0.0, x + 5.0, 5.0), vec![key, Value::Integer(id)])
                .unwrap();
        }
        layer
            .push(rect_mp(50.0, 0.0, 55.0, 5.0), vec![Value::Null, Value::Integer(6)])
            .unwrap();
        layer
    }

    #[test]
    fn groups_in_first_appearance_order_with_first_attributes() {
        let layer = layer();
        let (out, summary) = dissolve(&layer, "KEY").unwrap();
        assert_eq!(summary.groups, 3);
        let rows: Vec<_> = out
            .features()
            .iter()
            .map(|f| (f.values()[0].clone(), f.values()[1].clone(), f.geometry.0.len()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (Value::from("B"), Value::Integer(1), 2),
                (Value::from("A"), Value::Integer(2), 2),
                (Value::Null, Value::Integer(4), 2),
            ]
        );
        assert!((out.total_area() - layer.total_area()).abs() < 1e-6);
    }

    #[test]
    fn adjacent_members_merge_into_one_polygon() {
        let schema = Schema::from_fields("gs", [FieldDef::new("KEY", FieldKind::Integer)]).unwrap();
        let mut layer = Layer::new("gs", Crs::utm_wgs84(17, true), schema);
        layer.push(rect_mp(0.0, 0.0, 5.0, 5.0), vec![Value::Integer(1)]).unwrap();
        layer.push(rect_mp(5.0, 0.0, 10.0, 5.0), vec![Value::Integer(1)]).unwrap();
        let (out, _) = dissolve(&layer, "KEY").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.features()[0].geometry.0.len(), 1);
        assert!((out.total_area() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn missing_field_is_reported() {
        assert!(matches!(
            dissolve(&layer(), "NOPE"),
            Err(Error::MissingField { .. })
        ));
    }
}
