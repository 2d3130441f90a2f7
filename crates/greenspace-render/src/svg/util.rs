use crate::geom::{MapToPage, map_point};
use geo::{LineString, MultiPolygon};
use std::fmt::Write as _;

/// Formats an SVG number: integers without a fraction, no `-0`, float noise rounded away.
pub fn fmt(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let mut v = if v.abs() < 1e-9 { 0.0 } else { v };
    let nearest = v.round();
    if (v - nearest).abs() < 1e-6 {
        v = nearest;
    }
    let s = v.to_string();
    if s == "-0" { "0".to_string() } else { s }
}

/// Page coordinates keep three decimals (a micrometre).
pub fn fmt_coord(v: f64) -> String {
    fmt((v * 1000.0).round() / 1000.0)
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn push_ring(out: &mut String, ring: &LineString<f64>, transform: &MapToPage) {
    let mut coords = ring.coords();
    let Some(first) = coords.next() else {
        return;
    };
    let p = transform.transform_point(map_point(first.x, first.y));
    let _ = write!(out, "M{},{}", fmt_coord(p.x), fmt_coord(p.y));
    for c in coords {
        let p = transform.transform_point(map_point(c.x, c.y));
        let _ = write!(out, "L{},{}", fmt_coord(p.x), fmt_coord(p.y));
    }
    out.push('Z');
}

/// Path data for every ring of `geometry`, meant for `fill-rule="evenodd"`.
pub fn multipolygon_path(geometry: &MultiPolygon<f64>, transform: &MapToPage) -> String {
    let mut out = String::new();
    for polygon in geometry.iter() {
        push_ring(&mut out, polygon.exterior(), transform);
        for interior in polygon.interiors() {
            push_ring(&mut out, interior, transform);
        }
    }
    out
}
