use crate::layer::{FieldKind, Layer, Value};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// What to write when the denominator is zero, null or not finite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivisionPolicy {
    /// Abort the edit session with [`Error::DivisionByZeroOrNull`].
    #[default]
    Fail,
    Null,
    Zero,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentageSpec {
    pub part_field: String,
    pub total_field: String,
    pub output_field: String,
    pub null_part_as_zero: bool,
    pub on_invalid_total: DivisionPolicy,
}

impl Default for PercentageSpec {
    fn default() -> Self {
        Self {
            part_field: "JJ_Area_GS".to_string(),
            total_field: "Area_NB".to_string(),
            output_field: "PCT_GS".to_string(),
            null_part_as_zero: true,
            on_invalid_total: DivisionPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentageSummary {
    pub field: String,
    pub features: usize,
    pub null_parts: usize,
    pub invalid_totals: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Writes `part / total * 100` into the `Real` field `spec.output_field` for every feature.
pub fn derive_percentage(layer: &mut Layer, spec: &PercentageSpec) -> Result<PercentageSummary> {
    let _span = tracing::info_span!(
        "percentage",
        layer = %layer.name(),
        field = %spec.output_field
    )
    .entered();
    let part = layer.schema().require_numeric(layer.name(), &spec.part_field)?;
    let total = layer.schema().require_numeric(layer.name(), &spec.total_field)?;

    let summary = layer.edit(|session| {
        let output = match session.schema().lookup(&spec.output_field) {
            Some(_) => session.schema().require(
                session.layer_name(),
                &spec.output_field,
                FieldKind::Real,
            )?,
            None => session.add_field(&spec.output_field, FieldKind::Real)?,
        };
        let mut summary = PercentageSummary {
            field: spec.output_field.clone(),
            features: session.len(),
            ..PercentageSummary::default()
        };
        for pos in 0..session.len() {
            let part_value = match session.value(pos, part).as_f64().filter(|v| v.is_finite()) {
                Some(v) => Some(v),
                None => {
                    summary.null_parts += 1;
                    spec.null_part_as_zero.then_some(0.0)
                }
            };
            let total_value = session
                .value(pos, total)
                .as_f64()
                .filter(|v| v.is_finite() && *v != 0.0);
            let pct = match (part_value, total_value) {
                (_, None) => {
                    summary.invalid_totals += 1;
                    match spec.on_invalid_total {
                        DivisionPolicy::Fail => {
                            return Err(Error::DivisionByZeroOrNull {
                                layer: session.layer_name().to_string(),
                                field: spec.total_field.clone(),
                                fid: session.feature(pos).fid,
                            });
                        }
                        DivisionPolicy::Null => None,
                        DivisionPolicy::Zero => Some(0.0),
                    }
                }
                (None, Some(_)) => None,
                (Some(p), Some(t)) => Some(p / t * 100.0),
            };
            let value = match pct {
                Some(v) if v.is_finite() => {
                    summary.min = Some(summary.min.map_or(v, |m| m.min(v)));
                    summary.max = Some(summary.max.map_or(v, |m| m.max(v)));
                    Value::Real(v)
                }
                _ => Value::Null,
            };
            session.set_value(pos, output, value)?;
        }
        Ok(summary)
    })?;

    tracing::info!(
        features = summary.features,
        null_parts = summary.null_parts,
        invalid_totals = summary.invalid_totals,
        "percentage derived"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::layer::test_support::rect_mp;
    use crate::layer::{FieldDef, Schema};

    fn layer(rows: &[(Value, Value)]) -> Layer {
        let schema = Schema::from_fields(
            "nb",
            [
                FieldDef::new("Area_NB", FieldKind::Real),
                FieldDef::new("JJ_Area_GS", FieldKind::Real),
            ],
        )
        .unwrap();
        let mut layer = Layer::new("nb", Crs::utm_wgs84(17, true), schema);
        for (total, part) in rows {
            layer
                .push(rect_mp(0.0, 0.0, 1.0, 1.0), vec![total.clone(), part.clone()])
                .unwrap();
        }
        layer
    }

    fn pct(layer: &Layer) -> Vec<Option<f64>> {
        layer
            .features()
            .iter()
            .map(|f| layer.value_of(f, "PCT_GS").and_then(Value::as_f64))
            .collect()
    }

    #[test]
    fn quarter_is_twenty_five_percent() {
        let mut layer = layer(&[(Value::Real(100.0), Value::Real(25.0))]);
        let summary = derive_percentage(&mut layer, &PercentageSpec::default()).unwrap();
        assert_eq!(pct(&layer), vec![Some(25.0)]);
        assert_eq!(summary.max, Some(25.0));
    }

    #[test]
    fn null_part_counts_as_zero_by_default() {
        let mut layer = layer(&[(Value::Real(100.0), Value::Null)]);
        let summary = derive_percentage(&mut layer, &PercentageSpec::default()).unwrap();
        assert_eq!(pct(&layer), vec![Some(0.0)]);
        assert_eq!(summary.null_parts, 1);

        let spec = PercentageSpec {
            null_part_as_zero: false,
            ..PercentageSpec::default()
        };
        let mut layer = self::layer(&[(Value::Real(100.0), Value::Null)]);
        derive_percentage(&mut layer, &spec).unwrap();
        assert_eq!(pct(&layer), vec![None]);
    }

    #[test]
    fn zero_total_fails_and_discards_session() {
        let mut layer = layer(&[
            (Value::Real(100.0), Value::Real(10.0)),
            (Value::Real(0.0), Value::Real(5.0)),
        ]);
        let err = derive_percentage(&mut layer, &PercentageSpec::default()).unwrap_err();
        assert!(
            matches!(&err, Error::DivisionByZeroOrNull { fid: 1, field, .. } if field == "Area_NB"),
            "{err}"
        );
        assert!(!layer.schema().contains("PCT_GS"));
    }

    #[test]
    fn invalid_totals_follow_policy() {
        let rows = [
            (Value::Null, Value::Real(5.0)),
            (Value::Real(0.0), Value::Real(5.0)),
        ];
        for (policy, expected) in [
            (DivisionPolicy::Null, vec![None, None]),
            (DivisionPolicy::Zero, vec![Some(0.0), Some(0.0)]),
        ] {
            let mut layer = layer(&rows);
            let spec = PercentageSpec {
                on_invalid_total: policy,
                ..PercentageSpec::default()
            };
            let summary = derive_percentage(&mut layer, &spec).unwrap();
            assert_eq!(pct(&layer), expected, "{policy:?}");
            assert_eq!(summary.invalid_totals, 2);
        }
    }

    #[test]
    fn text_operand_is_rejected() {
        let schema = Schema::from_fields(
            "nb",
            [
                FieldDef::new("Area_NB", FieldKind::Text),
                FieldDef::new("JJ_Area_GS", FieldKind::Real),
            ],
        )
        .unwrap();
        let mut layer = Layer::new("nb", Crs::utm_wgs84(17, true), schema);
        let err = derive_percentage(&mut layer, &PercentageSpec::default()).unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch { .. }));
    }
}
