use crate::Result;
use crate::layer::Layer;
use crate::Error;
use geo::{Area, BooleanOps, CoordsIter, LineString, MultiPolygon, Polygon, RemoveRepeatedPoints};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairSummary {
    pub features_in: usize,
    pub features_out: usize,
    pub dropped_empty: usize,
    pub dropped_slivers: usize,
}

fn ring_is_usable(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
}

fn clean_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let polygon = polygon.remove_repeated_points();
    if !ring_is_usable(polygon.exterior()) {
        return None;
    }
    let (exterior, interiors) = polygon.into_inner();
    let interiors = interiors.into_iter().filter(ring_is_usable).collect();
    Some(Polygon::new(exterior, interiors))
}

/// Normalises every geometry of `layer`, returning the repaired layer.
///
/// Repeated vertices and degenerate rings are dropped, self-intersections are resolved by a
/// self-union, and polygons with area `<= sliver_area` are discarded. Features left without
/// geometry are dropped; surviving features keep their fid and values.
pub fn repair(layer: &Layer, sliver_area: f64) -> Result<(Layer, RepairSummary)> {
    let _span = tracing::info_span!("repair", layer = %layer.name()).entered();
    let mut out = Layer::new(layer.name(), layer.crs().clone(), layer.schema().clone());
    out.source = layer.source.clone();
    let mut summary = RepairSummary {
        features_in: layer.len(),
        ..RepairSummary::default()
    };

    for feature in layer.features() {
        if let Some(bad) = feature
            .geometry
            .coords_iter()
            .find(|c| !(c.x.is_finite() && c.y.is_finite()))
        {
            return Err(Error::InvalidGeometryUnrepairable {
                layer: layer.name().to_string(),
                fid: feature.fid,
                reason: format!("non-finite coordinate ({}, {})", bad.x, bad.y),
            });
        }

        let cleaned = MultiPolygon::new(
            feature
                .geometry
                .0
                .iter()
                .filter_map(clean_polygon)
                .collect(),
        );
        let normalised = cleaned.union(&MultiPolygon::new(Vec::new()));
        let before = normalised.0.len();
        let kept: Vec<Polygon<f64>> = normalised
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > sliver_area)
            .collect();
        let slivers = before - kept.len();
        if slivers > 0 {
            tracing::warn!(fid = feature.fid, slivers, "dropped sliver polygons");
            summary.dropped_slivers += slivers;
        }
        if kept.is_empty() {
            tracing::debug!(fid = feature.fid, "feature repaired to empty geometry, dropped");
            summary.dropped_empty += 1;
            continue;
        }
        out.push_with_fid(feature.fid, MultiPolygon::new(kept), feature.values().to_vec())?;
    }

    summary.features_out = out.len();
    tracing::info!(
        features_in = summary.features_in,
        features_out = summary.features_out,
        dropped_empty = summary.dropped_empty,
        dropped_slivers = summary.dropped_slivers,
        "geometries repaired"
    );
    Ok((out, summary))
}
