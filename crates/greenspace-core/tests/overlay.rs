use geo::{MultiPolygon, polygon};
use greenspace_core::overlay::{dissolve, intersect, repair};
use greenspace_core::{Crs, FieldDef, FieldKind, JoinOptions, Layer, Schema, Value, join_attributes};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x0, y: y0),
        (x: x1, y: y0),
        (x: x1, y: y1),
        (x: x0, y: y1),
        (x: x0, y: y0),
    ]])
}

fn keyed(name: &str, key: &str, rows: Vec<(MultiPolygon<f64>, &str)>) -> Layer {
    let schema = Schema::from_fields(name, [FieldDef::new(key, FieldKind::Text)]).unwrap();
    let mut layer = Layer::new(name, Crs::utm_wgs84(17, true), schema);
    for (geometry, value) in rows {
        layer.push(geometry, vec![Value::from(value)]).unwrap();
    }
    layer
}

/// A 3 x 1 grid of neighbourhoods and green spaces straddling their borders.
fn fixtures() -> (Layer, Layer) {
    let nb = keyed(
        "nb",
        "AREA_SHORT",
        vec![
            (rect(0.0, 0.0, 100.0, 100.0), "A"),
            (rect(100.0, 0.0, 200.0, 100.0), "B"),
            (rect(200.0, 0.0, 300.0, 100.0), "C"),
        ],
    );
    let gs = keyed(
        "gs",
        "PARK",
        vec![
            (rect(50.0, 10.0, 150.0, 30.0), "long"),
            (rect(10.0, 60.0, 40.0, 90.0), "small"),
            (rect(120.0, 50.0, 180.0, 70.0), "middle"),
            (rect(400.0, 0.0, 450.0, 50.0), "outside"),
        ],
    );
    (nb, gs)
}

fn areas_by_key(layer: &Layer, field: &str) -> Vec<(String, f64)> {
    let mut rows: Vec<(String, f64)> = layer
        .features()
        .iter()
        .map(|f| {
            let key = layer.value_of(f, field).map(|v| v.to_string()).unwrap_or_default();
            (key, f.area())
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

#[test]
fn dissolved_area_equals_intersected_area() {
    let (nb, gs) = fixtures();
    let (intersected, summary) = intersect(&gs, &nb, true).unwrap();
    assert_eq!(summary.features, 4);
    let (repaired, _) = repair(&intersected, 0.0).unwrap();
    let (dissolved, _) = dissolve(&repaired, "AREA_SHORT").unwrap();
    assert_eq!(dissolved.len(), 2);
    assert!((dissolved.total_area() - intersected.total_area()).abs() < 1e-6);
    assert!((intersected.total_area() - (2000.0 + 900.0 + 1200.0)).abs() < 1e-6);

    let by_key = areas_by_key(&dissolved, "AREA_SHORT");
    assert_eq!(by_key[0].0, "A");
    assert!((by_key[0].1 - (1000.0 + 900.0)).abs() < 1e-6);
    assert_eq!(by_key[1].0, "B");
    assert!((by_key[1].1 - (1000.0 + 1200.0)).abs() < 1e-6);
}

#[test]
fn overlay_chain_is_idempotent_on_dissolved_input() {
    let (nb, gs) = fixtures();
    let (intersected, _) = intersect(&gs, &nb, true).unwrap();
    let (repaired, _) = repair(&intersected, 0.0).unwrap();
    let (once, _) = dissolve(&repaired, "AREA_SHORT").unwrap();

    let (again, _) = intersect(&once, &nb, true).unwrap();
    let (again, _) = repair(&again, 0.0).unwrap();
    let (twice, _) = dissolve(&again, "AREA_SHORT").unwrap();

    assert_eq!(twice.len(), once.len());
    let before = areas_by_key(&once, "AREA_SHORT");
    let after = areas_by_key(&twice, "AREA_SHORT");
    for ((k0, a0), (k1, a1)) in before.iter().zip(&after) {
        assert_eq!(k0, k1);
        assert!((a0 - a1).abs() < 1e-6, "{k0}: {a0} vs {a1}");
    }
}

#[test]
fn join_keeps_every_base_feature_exactly_once() {
    let (nb, gs) = fixtures();
    let (intersected, _) = intersect(&gs, &nb, true).unwrap();
    let (dissolved, _) = dissolve(&intersected, "AREA_SHORT").unwrap();
    let (joined, summary) =
        join_attributes(&nb, "AREA_SHORT", &dissolved, "AREA_SHORT", &JoinOptions::default())
            .unwrap();

    assert_eq!(joined.len(), nb.len());
    let base_fids: Vec<u64> = nb.features().iter().map(|f| f.fid).collect();
    let joined_fids: Vec<u64> = joined.features().iter().map(|f| f.fid).collect();
    assert_eq!(joined_fids, base_fids);
    assert_eq!(summary.matched, 2);
    for feature in joined.features() {
        let own = joined.value_of(feature, "AREA_SHORT").unwrap();
        let other = joined.value_of(feature, "JJ_AREA_SHORT").unwrap();
        assert!(other.is_null() || other == own, "{own} vs {other}");
    }
}
