//! SVG serialization of a [`PrintLayout`].
//!
//! Serialization cannot fail: unreadable pictures become placeholders.

pub mod util;

use crate::geom::PageRect;
use crate::layout::{PictureLayout, PrintLayout, TextLabel};
use crate::style::GraduatedRenderer;
use base64::Engine as _;
use greenspace_core::Layer;
use std::fmt::Write as _;
use std::path::Path;
use util::{escape_xml, fmt, fmt_coord, multipolygon_path};

const OUTLINE_COLOR: &str = "#232323";
const OUTLINE_WIDTH: f64 = 0.26;
const SCALE_BAR_STROKE: f64 = 0.2;

pub fn render_report_svg(
    layout: &PrintLayout,
    layer: &Layer,
    classes: &[Option<usize>],
    renderer: &GraduatedRenderer,
) -> String {
    let mut out = String::new();
    let (w, h) = (layout.page.width, layout.page.height);
    let _ = write!(
        &mut out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}mm" height="{h}mm" viewBox="0 0 {w} {h}">"#,
        w = fmt(w),
        h = fmt(h),
    );
    let _ = write!(
        &mut out,
        r##"<rect width="{}" height="{}" fill="#ffffff"/>"##,
        fmt(w),
        fmt(h)
    );

    render_map(&mut out, layout, layer, classes, renderer);
    render_label(&mut out, &layout.title, "title");
    render_legend(&mut out, layout);
    render_scale_bar(&mut out, layout);
    for picture in &layout.pictures {
        render_picture(&mut out, picture);
    }

    out.push_str("</svg>");
    out
}

fn rect_attrs(rect: &PageRect) -> String {
    format!(
        r#"x="{}" y="{}" width="{}" height="{}""#,
        fmt_coord(rect.origin.x),
        fmt_coord(rect.origin.y),
        fmt_coord(rect.size.width),
        fmt_coord(rect.size.height)
    )
}

fn render_map(
    out: &mut String,
    layout: &PrintLayout,
    layer: &Layer,
    classes: &[Option<usize>],
    renderer: &GraduatedRenderer,
) {
    let map = &layout.map;
    let frame = rect_attrs(&map.rect);
    let _ = write!(
        out,
        r#"<defs><clipPath id="map-clip"><rect {frame}/></clipPath></defs>"#
    );
    let _ = write!(
        out,
        r#"<g class="map" data-layer="{}" clip-path="url(#map-clip)"><rect {frame} fill="{}"/>"#,
        escape_xml(layer.name()),
        escape_xml(&map.background)
    );
    for (feature, class) in layer.features().iter().zip(classes) {
        let d = multipolygon_path(&feature.geometry, &map.transform);
        if d.is_empty() {
            continue;
        }
        let fill = match class.and_then(|i| renderer.ranges.get(i)) {
            Some(range) => format!(
                r#"fill="{}" fill-opacity="{}""#,
                escape_xml(&range.color),
                fmt(range.opacity)
            ),
            None => r#"fill="none""#.to_string(),
        };
        let _ = write!(
            out,
            r#"<path data-fid="{}" d="{d}" fill-rule="evenodd" {fill} stroke="{OUTLINE_COLOR}" stroke-width="{}" stroke-linejoin="bevel"/>"#,
            feature.fid,
            fmt(OUTLINE_WIDTH)
        );
    }
    out.push_str("</g>");
}

fn render_label(out: &mut String, label: &TextLabel, class: &str) {
    let style = &label.style;
    let family = style
        .font_family
        .as_deref()
        .map(|f| format!(r#" font-family="{}""#, escape_xml(f)))
        .unwrap_or_default();
    let weight = if style.bold { r#" font-weight="bold""# } else { "" };
    let _ = write!(
        out,
        r##"<text class="{class}" x="{}" y="{}" text-anchor="{}"{family} font-size="{}"{weight} fill="#000000">{}</text>"##,
        fmt_coord(label.baseline.x),
        fmt_coord(label.baseline.y),
        label.anchor.as_svg(),
        fmt_coord(style.font_size),
        escape_xml(&label.text)
    );
}

fn render_legend(out: &mut String, layout: &PrintLayout) {
    let legend = &layout.legend;
    let _ = write!(
        out,
        r##"<g class="legend"><rect {} fill="#ffffff"/>"##,
        rect_attrs(&legend.bounds)
    );
    render_label(out, &legend.title, "legend-title");
    if let Some(heading) = &legend.layer_heading {
        render_label(out, heading, "legend-layer");
    }
    for entry in &legend.entries {
        let _ = write!(
            out,
            r#"<rect {} fill="{}" fill-opacity="{}" stroke="{OUTLINE_COLOR}" stroke-width="{}"/>"#,
            rect_attrs(&entry.patch),
            escape_xml(&entry.color),
            fmt(entry.opacity),
            fmt(OUTLINE_WIDTH)
        );
        render_label(out, &entry.label, "legend-item");
    }
    out.push_str("</g>");
}

fn render_scale_bar(out: &mut String, layout: &PrintLayout) {
    let bar = &layout.scale_bar;
    out.push_str(r#"<g class="scale-bar">"#);
    for b in &bar.boxes {
        let fill = if b.filled { "#000000" } else { "#ffffff" };
        let _ = write!(
            out,
            r##"<rect {} fill="{fill}" stroke="#000000" stroke-width="{}"/>"##,
            rect_attrs(&b.rect),
            fmt(SCALE_BAR_STROKE)
        );
    }
    for label in &bar.labels {
        render_label(out, label, "scale-bar-label");
    }
    out.push_str("</g>");
}

fn render_picture(out: &mut String, picture: &PictureLayout) {
    let rect = rect_attrs(&picture.rect);
    match std::fs::read(&picture.path) {
        Ok(bytes) => match image_mime(&picture.path, &bytes) {
            Some(mime) => {
                let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
                let _ = write!(
                    out,
                    r#"<image {rect} preserveAspectRatio="xMidYMid meet" href="data:{mime};base64,{data}"/>"#
                );
                return;
            }
            None => tracing::warn!(
                path = %picture.path.display(),
                "unsupported picture format; drawing a placeholder"
            ),
        },
        Err(err) => tracing::warn!(
            path = %picture.path.display(),
            error = %err,
            "picture not readable; drawing a placeholder"
        ),
    }
    let _ = write!(
        out,
        r##"<rect class="picture-placeholder" {rect} fill="none" stroke="#999999" stroke-width="0.3" stroke-dasharray="2,1"/>"##
    );
}

/// Raster pictures are recognised by content; SVG by extension.
fn image_mime(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    if path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
    {
        return Some("image/svg+xml");
    }
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        _ => None,
    }
}
