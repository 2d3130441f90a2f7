#![cfg(feature = "raster")]

use geo::{MultiPolygon, polygon};
use greenspace::export::PdfReportGenerator;
use greenspace::{
    Crs, Error, FieldDef, FieldKind, Layer, ReportGenerator, ReportRequest, ReportSettings,
    Schema, Value,
};

fn layer() -> Layer {
    let schema = Schema::from_fields("nb", [FieldDef::new("PCT_GS", FieldKind::Real)]).unwrap();
    let mut layer = Layer::new("nb", Crs::utm_wgs84(17, true), schema);
    layer
        .push(
            MultiPolygon::new(vec![polygon![
                (x: 620_000.0, y: 4_830_000.0),
                (x: 630_000.0, y: 4_830_000.0),
                (x: 630_000.0, y: 4_840_000.0),
                (x: 620_000.0, y: 4_830_000.0),
            ]]),
            vec![Value::Real(22.0)],
        )
        .unwrap();
    layer
}

#[test]
fn writes_pdf_and_preview_next_to_the_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let layer = layer();
    let settings = ReportSettings::default();
    let request = ReportRequest {
        layer: &layer,
        settings: &settings,
        base_dir: dir.path(),
    };
    let generator = PdfReportGenerator::new().with_preview_png("preview/map.png");
    let outcome = generator.generate(&request).unwrap();

    assert_eq!(outcome.pdf, dir.path().join("GreenSpace_by_Neighbourhood.pdf"));
    let pdf = std::fs::read(&outcome.pdf).unwrap();
    assert!(pdf.starts_with(b"%PDF-"));
    let png = std::fs::read(outcome.preview_png.unwrap()).unwrap();
    assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));

    let class = outcome.classes.iter().find(|c| c.label == "20:30%").unwrap();
    assert_eq!(class.features, 1);
    assert_eq!(outcome.unclassified, 0);
}

#[test]
fn render_failures_surface_as_export_errors() {
    let dir = tempfile::tempdir().unwrap();
    let layer = layer();
    let mut settings = ReportSettings::default();
    settings.classification.field = "MISSING".to_string();
    let request = ReportRequest {
        layer: &layer,
        settings: &settings,
        base_dir: dir.path(),
    };
    let err = PdfReportGenerator::new().generate(&request).unwrap_err();
    assert!(matches!(err, Error::ExportFailed { .. }), "{err}");
    assert!(!dir.path().join("GreenSpace_by_Neighbourhood.pdf").exists());
}
