use crate::layer::{FieldKind, Layer, Value};
use crate::{Error, Result};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaSummary {
    pub layer: String,
    pub field: String,
    pub features: usize,
    pub total_area: f64,
}

/// Writes the planar area of every feature (CRS units squared) into the `Real` field `field`.
///
/// The field is added when missing and overwritten when it already exists as `Real`. The layer
/// must use a projected CRS.
pub fn calculate_area(layer: &mut Layer, field: &str) -> Result<AreaSummary> {
    let _span = tracing::info_span!("area", layer = %layer.name(), field).entered();
    if layer.crs().is_geographic() {
        return Err(Error::NonMetricCrs {
            layer: layer.name().to_string(),
            crs: layer.crs().to_string(),
        });
    }
    let total_area = layer.edit(|session| {
        let index = match session.schema().lookup(field) {
            Some(_) => session
                .schema()
                .require(session.layer_name(), field, FieldKind::Real)?,
            None => session.add_field(field, FieldKind::Real)?,
        };
        let mut total = 0.0;
        for pos in 0..session.len() {
            let area = session.feature(pos).area();
            total += area;
            session.set_value(pos, index, Value::Real(area))?;
        }
        Ok(total)
    })?;
    let summary = AreaSummary {
        layer: layer.name().to_string(),
        field: field.to_string(),
        features: layer.len(),
        total_area,
    };
    tracing::info!(features = summary.features, total_area, "area calculated");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::layer::test_support::rect_mp;
    use crate::layer::{FieldDef, Schema};

    fn layer(crs: Crs) -> Layer {
        let schema = Schema::from_fields("nb", [FieldDef::new("NAME", FieldKind::Text)]).unwrap();
        let mut layer = Layer::new("nb", crs, schema);
        layer
            .push(rect_mp(0.0, 0.0, 100.0, 50.0), vec![Value::from("a")])
            .unwrap();
        layer
            .push(rect_mp(0.0, 0.0, 10.0, 10.0), vec![Value::from("b")])
            .unwrap();
        layer
    }

    #[test]
    fn writes_planar_area_per_feature() {
        let mut layer = layer(Crs::utm_wgs84(17, true));
        let summary = calculate_area(&mut layer, "Area_NB").unwrap();
        assert_eq!(summary.features, 2);
        assert_eq!(summary.total_area, 5100.0);
        let areas: Vec<_> = layer
            .features()
            .iter()
            .map(|f| layer.value_of(f, "Area_NB").and_then(Value::as_f64))
            .collect();
        assert_eq!(areas, vec![Some(5000.0), Some(100.0)]);
    }

    #[test]
    fn rerun_overwrites_existing_real_field() {
        let mut layer = layer(Crs::utm_wgs84(17, true));
        calculate_area(&mut layer, "Area_NB").unwrap();
        calculate_area(&mut layer, "Area_NB").unwrap();
        assert_eq!(layer.schema().len(), 2);
    }

    #[test]
    fn geographic_layer_is_rejected_untouched() {
        let mut layer = layer(Crs::wgs84());
        let err = calculate_area(&mut layer, "Area_NB").unwrap_err();
        assert!(matches!(err, Error::NonMetricCrs { .. }));
        assert!(!layer.schema().contains("Area_NB"));
    }

    #[test]
    fn mistyped_existing_field_is_rejected() {
        let mut layer = layer(Crs::utm_wgs84(17, true));
        let err = calculate_area(&mut layer, "NAME").unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch { .. }));
    }
}
