use geo::{MultiPolygon, polygon};
use greenspace_core::{Crs, FieldDef, FieldKind, Layer, ReportRequest, ReportSettings, Schema, Value};
use greenspace_render::{RenderOptions, render_report};
use std::path::Path;

fn square(x: f64, y: f64, side: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x, y: y),
        (x: x + side, y: y),
        (x: x + side, y: y + side),
        (x: x, y: y + side),
        (x: x, y: y),
    ]])
}

fn neighbourhoods() -> Layer {
    let schema = Schema::from_fields(
        "Neighbourhoods_GreenSpaces_UTM17",
        [
            FieldDef::new("AREA_SHORT", FieldKind::Text),
            FieldDef::new("PCT_GS", FieldKind::Real),
        ],
    )
    .unwrap();
    let mut layer = Layer::new("Neighbourhoods_GreenSpaces_UTM17", Crs::utm_wgs84(17, true), schema);
    layer
        .push(
            square(620_000.0, 4_830_000.0, 10_000.0),
            vec![Value::from("Annex"), Value::Real(12.0)],
        )
        .unwrap();
    layer
        .push(
            square(630_000.0, 4_830_000.0, 10_000.0),
            vec![Value::from("Beaches"), Value::Real(85.0)],
        )
        .unwrap();
    layer
}

fn render(layer: &Layer, settings: &ReportSettings, dir: &Path) -> (String, usize) {
    let request = ReportRequest {
        layer,
        settings,
        base_dir: dir,
    };
    let report = render_report(&request, &RenderOptions::default()).unwrap();
    (report.svg, report.unclassified)
}

fn elements<'a>(doc: &'a roxmltree::Document<'a>, tag: &str) -> Vec<roxmltree::Node<'a, 'a>> {
    doc.descendants().filter(|n| n.has_tag_name(tag)).collect()
}

#[test]
fn page_is_a4_landscape_in_millimetres() {
    let dir = tempfile::tempdir().unwrap();
    let (svg, _) = render(&neighbourhoods(), &ReportSettings::default(), dir.path());
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let root = doc.root_element();
    assert_eq!(root.attribute("width"), Some("297mm"));
    assert_eq!(root.attribute("height"), Some("210mm"));
    assert_eq!(root.attribute("viewBox"), Some("0 0 297 210"));
}

#[test]
fn features_are_filled_by_range_or_outlined() {
    let dir = tempfile::tempdir().unwrap();
    let (svg, unclassified) = render(&neighbourhoods(), &ReportSettings::default(), dir.path());
    assert_eq!(unclassified, 1);
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let paths = elements(&doc, "path");
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].attribute("fill"), Some("#009d00"));
    assert_eq!(paths[0].attribute("fill-opacity"), Some("0.6"));
    assert_eq!(paths[1].attribute("fill"), Some("none"));
    assert!(paths.iter().all(|p| p.attribute("fill-rule") == Some("evenodd")));
}

#[test]
fn legend_title_and_scale_bar_text_are_present() {
    let dir = tempfile::tempdir().unwrap();
    let (svg, _) = render(&neighbourhoods(), &ReportSettings::default(), dir.path());
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let texts: Vec<&str> = elements(&doc, "text")
        .iter()
        .filter_map(|n| n.text())
        .collect();
    assert!(texts.contains(&"Toronto Percent Green Spaces Per Neighbourhood"));
    assert!(texts.contains(&"Percentage Ranges"));
    assert!(texts.contains(&"10:20%"));
    assert!(texts.contains(&"60:70%"));
    assert!(texts.contains(&"km"));
    assert!(texts.contains(&"20"));

    let title = elements(&doc, "text")
        .into_iter()
        .find(|n| n.attribute("class") == Some("title"))
        .unwrap();
    assert_eq!(title.attribute("font-family"), Some("Georgia"));
    assert_eq!(title.attribute("font-weight"), Some("bold"));
}

#[test]
fn pictures_are_embedded_or_replaced_by_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("img")).unwrap();
    image::RgbImage::from_pixel(4, 4, image::Rgb([0, 128, 0]))
        .save(dir.path().join("img/North-Arrow.png"))
        .unwrap();

    let (svg, _) = render(&neighbourhoods(), &ReportSettings::default(), dir.path());
    let doc = roxmltree::Document::parse(&svg).unwrap();
    let images = elements(&doc, "image");
    assert_eq!(images.len(), 1);
    let href = images[0].attribute("href").unwrap();
    assert!(href.starts_with("data:image/png;base64,"), "{href}");
    assert_eq!(images[0].attribute("width"), Some("38.1"));

    let placeholders: Vec<_> = elements(&doc, "rect")
        .into_iter()
        .filter(|n| n.attribute("class") == Some("picture-placeholder"))
        .collect();
    assert_eq!(placeholders.len(), 1);
    assert_eq!(placeholders[0].attribute("x"), Some("175"));
}

#[test]
fn missing_classification_field_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ReportSettings {
        classification: greenspace_core::report::Classification {
            field: "PCT_TREES".to_string(),
            ..Default::default()
        },
        ..ReportSettings::default()
    };
    let layer = neighbourhoods();
    let request = ReportRequest {
        layer: &layer,
        settings: &settings,
        base_dir: dir.path(),
    };
    assert!(render_report(&request, &RenderOptions::default()).is_err());
}
