use super::ensure_same_crs;
use crate::layer::{FieldDef, Layer, Schema, Value};
use crate::Result;
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectSummary {
    pub candidate_pairs: usize,
    pub features: usize,
    pub renamed_fields: Vec<(String, String)>,
    pub total_area: f64,
}

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn envelope(geometry: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    geometry
        .bounding_rect()
        .map(|r| AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]))
}

/// Intersects two polygon layers.
///
/// Every non-empty pairwise intersection becomes a feature carrying `a`'s values followed by
/// `b`'s. `b` fields whose names are already taken are renamed with a `_1`, `_2`, ... suffix.
/// With `split` each polygon of a multipart result is emitted as its own feature.
pub fn intersect(a: &Layer, b: &Layer, split: bool) -> Result<(Layer, IntersectSummary)> {
    let _span = tracing::info_span!("intersect", a = %a.name(), b = %b.name()).entered();
    ensure_same_crs(a, b)?;

    let name = format!("{}_x_{}", a.name(), b.name());
    let mut schema = Schema::from_fields(&name, a.schema().fields())?;
    let mut renamed_fields = Vec::new();
    for field in b.schema().fields() {
        let unique = schema.unique_name(&field.name);
        if unique != field.name {
            tracing::debug!(from = %field.name, to = %unique, "renamed colliding field");
            renamed_fields.push((field.name.clone(), unique.clone()));
        }
        schema.push(&name, FieldDef::new(unique, field.kind))?;
    }
    let mut out = Layer::new(name, a.crs().clone(), schema);

    let tree: RTree<Envelope> = RTree::bulk_load(
        b.features()
            .iter()
            .enumerate()
            .filter_map(|(pos, f)| {
                envelope(&f.geometry).map(|e| {
                    GeomWithData::new(Rectangle::from_corners(e.lower(), e.upper()), pos)
                })
            })
            .collect(),
    );

    let mut candidate_pairs = 0usize;
    let mut total_area = 0.0;
    for fa in a.features() {
        let Some(env) = envelope(&fa.geometry) else {
            continue;
        };
        let mut hits: Vec<usize> = tree
            .locate_in_envelope_intersecting(&env)
            .map(|hit| hit.data)
            .collect();
        hits.sort_unstable();
        for pos in hits {
            candidate_pairs += 1;
            let fb = &b.features()[pos];
            let shared = fa.geometry.intersection(&fb.geometry);
            let parts: Vec<MultiPolygon<f64>> = if split {
                shared
                    .0
                    .into_iter()
                    .filter(|p| p.unsigned_area() > 0.0)
                    .map(|p| MultiPolygon::new(vec![p]))
                    .collect()
            } else {
                let kept: Vec<_> = shared
                    .0
                    .into_iter()
                    .filter(|p| p.unsigned_area() > 0.0)
                    .collect();
                if kept.is_empty() {
                    Vec::new()
                } else {
                    vec![MultiPolygon::new(kept)]
                }
            };
            for part in parts {
                total_area += part.unsigned_area();
                let values: Vec<Value> = fa
                    .values()
                    .iter()
                    .chain(fb.values())
                    .cloned()
                    .collect();
                out.push(part, values)?;
            }
        }
    }

    let summary = IntersectSummary {
        candidate_pairs,
        features: out.len(),
        renamed_fields,
        total_area,
    };
    tracing::info!(
        candidates = candidate_pairs,
        features = summary.features,
        total_area,
        "layers intersected"
    );
    Ok((out, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::crs::Crs;
    use crate::layer::FieldKind;
    use crate::layer::test_support::{rect, rect_mp};

    fn utm() -> Crs {
        Crs::utm_wgs84(17, true)
    }

    fn keyed(name: &str, rects: &[(f64, f64, f64, f64, &str)]) -> Layer {
        let schema = Schema::from_fields(
            name,
            [
                FieldDef::new("AREA_SHORT", FieldKind::Text),
                FieldDef::new(format!("{name}_ID"), FieldKind::Integer),
            ],
        )
        .unwrap();
        let mut layer = Layer::new(name, utm(), schema);
        for (i, (x0, y0, x1, y1, key)) in rects.iter().enumerate() {
            layer
                .push(
                    rect_mp(*x0, *y0, *x1, *y1),
                    vec![Value::from(*key), Value::Integer(i as i64)],
                )
                .unwrap();
        }
        layer
    }

    #[test]
    fn overlapping_features_carry_both_attribute_sets() {
        let nb = keyed("nb", &[(0.0, 0.0, 10.0, 10.0, "A"), (10.0, 0.0, 20.0, 10.0, "B")]);
        let gs = keyed("gs", &[(5.0, 2.0, 15.0, 4.0, "park")]);
        let (out, summary) = intersect(&gs, &nb, true).unwrap();
        assert_eq!(
            out.schema().names().collect::<Vec<_>>(),
            vec!["AREA_SHORT", "gs_ID", "AREA_SHORT_1", "nb_ID"]
        );
        assert_eq!(
            summary.renamed_fields,
            vec![("AREA_SHORT".to_string(), "AREA_SHORT_1".to_string())]
        );
        assert_eq!(out.len(), 2);
        let keys: Vec<_> = out
            .features()
            .iter()
            .map(|f| out.value_of(f, "AREA_SHORT_1").cloned())
            .collect();
        assert_eq!(keys, vec![Some(Value::from("A")), Some(Value::from("B"))]);
        assert!((summary.total_area - 20.0).abs() < 1e-6);
    }

    #[test]
    fn touching_envelopes_without_overlap_produce_nothing() {
        let a = keyed("a", &[(0.0, 0.0, 10.0, 10.0, "A")]);
        let b = keyed("b", &[(10.0, 0.0, 20.0, 10.0, "B")]);
        let (out, summary) = intersect(&a, &b, true).unwrap();
        assert!(out.is_empty());
        assert_eq!(summary.candidate_pairs, 1);
    }

    #[test]
    fn split_separates_multipart_results() {
        let a = keyed("a", &[(0.0, 0.0, 30.0, 10.0, "A")]);
        let mut b = keyed("b", &[]);
        b.push(
            MultiPolygon::new(vec![rect(0.0, 0.0, 5.0, 5.0), rect(20.0, 0.0, 25.0, 5.0)]),
            vec![Value::from("B"), Value::Integer(0)],
        )
        .unwrap();
        let (split, _) = intersect(&a, &b, true).unwrap();
        let (whole, _) = intersect(&a, &b, false).unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(whole.len(), 1);
        assert!((split.total_area() - whole.total_area()).abs() < 1e-6);
    }

    #[test]
    fn different_crs_is_rejected() {
        let a = keyed("a", &[(0.0, 0.0, 1.0, 1.0, "A")]);
        let mut b = keyed("b", &[(0.0, 0.0, 1.0, 1.0, "A")]);
        b.set_crs(Crs::wgs84());
        assert!(matches!(
            intersect(&a, &b, true),
            Err(Error::CrsMismatch { .. })
        ));
    }
}
