//! Graduated symbology over one numeric field.

use crate::svg::util::fmt;
use crate::{Error, Result};
use greenspace_core::Layer;
use greenspace_core::report::{ClassCount, Classification};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRange {
    pub lower: f64,
    pub upper: f64,
    pub label: String,
    pub color: String,
    pub opacity: f64,
}

impl ClassRange {
    /// Half-open: `lower <= value < upper`.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value < self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraduatedRenderer {
    pub field: String,
    pub ranges: Vec<ClassRange>,
}

pub fn range_label(lower: f64, upper: f64) -> String {
    format!("{}:{}%", fmt(lower), fmt(upper))
}

impl GraduatedRenderer {
    pub fn from_classification(classification: &Classification) -> Result<Self> {
        let breaks = &classification.breaks;
        if breaks.len() < 2 {
            return Err(Error::InvalidClassification {
                message: "at least two breaks are required".to_string(),
            });
        }
        if breaks.iter().any(|b| !b.is_finite()) || breaks.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidClassification {
                message: format!("breaks must be finite and strictly ascending: {breaks:?}"),
            });
        }
        if classification.colors.len() < breaks.len() - 1 {
            return Err(Error::InvalidClassification {
                message: format!(
                    "{} ranges but only {} colors",
                    breaks.len() - 1,
                    classification.colors.len()
                ),
            });
        }

        let ranges = breaks
            .windows(2)
            .zip(&classification.colors)
            .map(|(w, color)| ClassRange {
                lower: w[0],
                upper: w[1],
                label: range_label(w[0], w[1]),
                color: color.clone(),
                opacity: classification.opacity,
            })
            .collect();
        Ok(Self {
            field: classification.field.clone(),
            ranges,
        })
    }

    pub fn classify(&self, value: Option<f64>) -> Option<usize> {
        let value = value.filter(|v| v.is_finite())?;
        self.ranges.iter().position(|r| r.contains(value))
    }

    /// Range index per feature, in layer order; `None` is unclassified.
    pub fn symbolize(&self, layer: &Layer) -> Result<Vec<Option<usize>>> {
        let field = layer.schema().require_numeric(layer.name(), &self.field)?;
        Ok(layer
            .features()
            .iter()
            .map(|f| self.classify(f.value(field).as_f64()))
            .collect())
    }

    pub fn class_counts(&self, classes: &[Option<usize>]) -> (Vec<ClassCount>, usize) {
        let mut counts = vec![0usize; self.ranges.len()];
        let mut unclassified = 0;
        for class in classes {
            match class {
                Some(i) => counts[*i] += 1,
                None => unclassified += 1,
            }
        }
        let counts = self
            .ranges
            .iter()
            .zip(counts)
            .map(|(range, features)| ClassCount {
                label: range.label.clone(),
                features,
            })
            .collect();
        (counts, unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};
    use greenspace_core::{Crs, FieldDef, FieldKind, Schema, Value};

    fn unit_square() -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    fn renderer() -> GraduatedRenderer {
        GraduatedRenderer::from_classification(&Classification::default()).unwrap()
    }

    #[test]
    fn default_breaks_build_eight_labelled_ranges() {
        let r = renderer();
        assert_eq!(r.ranges.len(), 8);
        assert_eq!(r.ranges[0].label, "0:5%");
        assert_eq!(r.ranges[7].label, "60:70%");
        assert_eq!(r.ranges[2].color, "#009d00");
        assert!(r.ranges.iter().all(|range| range.opacity == 0.6));
    }

    #[test]
    fn ranges_are_half_open() {
        let r = renderer();
        assert_eq!(r.classify(Some(12.0)), Some(2));
        assert_eq!(r.ranges[2].label, "10:20%");
        assert_eq!(r.classify(Some(0.0)), Some(0));
        assert_eq!(r.classify(Some(5.0)), Some(1));
        assert_eq!(r.classify(Some(70.0)), None);
        assert_eq!(r.classify(Some(-1.0)), None);
        assert_eq!(r.classify(None), None);
        assert_eq!(r.classify(Some(f64::NAN)), None);
    }

    #[test]
    fn fractional_breaks_keep_their_decimals() {
        assert_eq!(range_label(2.5, 7.0), "2.5:7%");
    }

    #[test]
    fn rejects_descending_breaks() {
        let classification = Classification {
            breaks: vec![0.0, 10.0, 10.0],
            ..Default::default()
        };
        assert!(matches!(
            GraduatedRenderer::from_classification(&classification),
            Err(Error::InvalidClassification { .. })
        ));
    }

    #[test]
    fn counts_features_per_range() {
        let schema = Schema::from_fields("nb", [FieldDef::new("PCT_GS", FieldKind::Real)]).unwrap();
        let mut layer = Layer::new("nb", Crs::utm_wgs84(17, true), schema);
        for v in [Value::Real(1.0), Value::Real(3.0), Value::Real(45.0), Value::Null] {
            layer.push(unit_square(), vec![v]).unwrap();
        }
        let r = renderer();
        let classes = r.symbolize(&layer).unwrap();
        assert_eq!(classes, vec![Some(0), Some(0), Some(5), None]);
        let (counts, unclassified) = r.class_counts(&classes);
        assert_eq!(counts[0].features, 2);
        assert_eq!(counts[5].label, "40:50%");
        assert_eq!(counts[5].features, 1);
        assert_eq!(unclassified, 1);
    }

    #[test]
    fn text_field_cannot_be_classified() {
        let schema = Schema::from_fields("nb", [FieldDef::new("PCT_GS", FieldKind::Text)]).unwrap();
        let layer = Layer::new("nb", Crs::utm_wgs84(17, true), schema);
        assert!(matches!(renderer().symbolize(&layer), Err(Error::Core(_))));
    }
}
