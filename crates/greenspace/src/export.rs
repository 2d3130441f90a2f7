//! SVG to PDF/PNG conversion and the file-writing report generator.

use crate::render::{RenderOptions, render_report};
use greenspace_core::{ReportGenerator, ReportOutcome, ReportRequest};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] greenspace_render::Error),
    #[error("failed to parse SVG: {0}")]
    SvgParse(String),
    #[error("failed to allocate pixmap for raster rendering")]
    PixmapAlloc,
    #[error("failed to encode PNG")]
    PngEncode,
    #[error("failed to convert SVG to PDF: {0}")]
    PdfConvert(String),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Pixels per CSS pixel; 1.0 renders the page at 96 dpi.
    pub scale: f32,
    pub background: Option<String>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background: Some("white".to_string()),
        }
    }
}

pub fn svg_to_pdf(svg: &str) -> Result<Vec<u8>> {
    let mut opt = svg2pdf::usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt.font_family = "Georgia".to_string();

    let tree = svg2pdf::usvg::Tree::from_str(svg, &opt)
        .map_err(|err| ExportError::SvgParse(err.to_string()))?;
    svg2pdf::to_pdf(
        &tree,
        svg2pdf::ConversionOptions::default(),
        svg2pdf::PageOptions::default(),
    )
    .map_err(|err| ExportError::PdfConvert(err.to_string()))
}

pub fn svg_to_png(svg: &str, options: &RasterOptions) -> Result<Vec<u8>> {
    let pixmap = svg_to_pixmap(svg, options)?;
    pixmap.encode_png().map_err(|_| ExportError::PngEncode)
}

fn svg_to_pixmap(svg: &str, options: &RasterOptions) -> Result<tiny_skia::Pixmap> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt.font_family = "Georgia".to_string();

    let tree =
        usvg::Tree::from_str(svg, &opt).map_err(|err| ExportError::SvgParse(err.to_string()))?;
    let size = tree.size();
    let scale = if options.scale.is_finite() && options.scale > 0.0 {
        options.scale
    } else {
        1.0
    };
    let width_px = (size.width() * scale).ceil().max(1.0) as u32;
    let height_px = (size.height() * scale).ceil().max(1.0) as u32;

    let mut pixmap =
        tiny_skia::Pixmap::new(width_px, height_px).ok_or(ExportError::PixmapAlloc)?;
    if let Some(color) = options.background.as_deref().and_then(parse_color) {
        pixmap.fill(color);
    }
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );
    Ok(pixmap)
}

fn parse_color(text: &str) -> Option<tiny_skia::Color> {
    let s = text.trim().to_ascii_lowercase();
    match s.as_str() {
        "transparent" => return Some(tiny_skia::Color::TRANSPARENT),
        "white" => return Some(tiny_skia::Color::WHITE),
        "black" => return Some(tiny_skia::Color::BLACK),
        _ => {}
    }
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(tiny_skia::Color::from_rgba8(
        channel(0)?,
        channel(2)?,
        channel(4)?,
        255,
    ))
}

/// Renders the print layout and writes it as PDF, plus an optional PNG preview.
#[derive(Clone, Default)]
pub struct PdfReportGenerator {
    pub render: RenderOptions,
    pub raster: RasterOptions,
    /// Overrides the preview path from the report settings.
    pub preview_png: Option<PathBuf>,
}

impl PdfReportGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preview_png(mut self, path: impl Into<PathBuf>) -> Self {
        self.preview_png = Some(path.into());
        self
    }

    /// Produces every output in memory so nothing is written when a conversion fails.
    fn export(
        &self,
        request: &ReportRequest<'_>,
    ) -> Result<(ReportOutcome, Vec<(PathBuf, Vec<u8>)>)> {
        let rendered = render_report(request, &self.render)?;
        let pdf_path = request.resolve(&request.settings.pdf);
        let mut files = vec![(pdf_path.clone(), svg_to_pdf(&rendered.svg)?)];

        let preview = self
            .preview_png
            .as_ref()
            .or(request.settings.preview_png.as_ref())
            .map(|p| request.resolve(p));
        if let Some(path) = &preview {
            files.push((path.clone(), svg_to_png(&rendered.svg, &self.raster)?));
        }

        let outcome = ReportOutcome {
            pdf: pdf_path,
            preview_png: preview,
            classes: rendered.classes,
            unclassified: rendered.unclassified,
        };
        Ok((outcome, files))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> greenspace_core::Result<()> {
    let failed = |err: std::io::Error| greenspace_core::Error::ExportFailed {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(failed)?;
    }
    std::fs::write(path, bytes).map_err(failed)
}

impl ReportGenerator for PdfReportGenerator {
    fn generate(&self, request: &ReportRequest<'_>) -> greenspace_core::Result<ReportOutcome> {
        let (outcome, files) = self
            .export(request)
            .map_err(|err| greenspace_core::Error::ExportFailed {
                path: request.resolve(&request.settings.pdf),
                message: err.to_string(),
            })?;
        for (path, bytes) in &files {
            write_file(path, bytes)?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "report file written");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10mm" height="10mm" viewBox="0 0 10 10"><rect width="10" height="10" fill="black"/></svg>"#;

    #[test]
    fn svg_to_png_produces_png_signature() {
        let bytes = svg_to_png(SQUARE, &RasterOptions::default()).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn svg_to_pdf_produces_pdf_signature() {
        let bytes = svg_to_pdf(SQUARE).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn malformed_svg_is_a_parse_error() {
        assert!(matches!(svg_to_pdf("<svg"), Err(ExportError::SvgParse(_))));
    }

    #[test]
    fn hex_backgrounds_are_parsed() {
        let c = parse_color("#00eb00").unwrap();
        assert_eq!(c.to_color_u8().green(), 0xeb);
        assert!(parse_color("#12").is_none());
    }
}
