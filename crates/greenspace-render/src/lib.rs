#![forbid(unsafe_code)]

//! Print-layout composition for green-space coverage maps.
//!
//! [`render_report`] classifies a layer with a [`style::GraduatedRenderer`], lays out the page
//! with [`layout::layout_report`] and serializes it to SVG in millimetre page units.

pub mod geom;
pub mod layout;
pub mod style;
pub mod svg;
pub mod text;

use crate::layout::PrintLayout;
use crate::style::GraduatedRenderer;
use crate::text::{DeterministicTextMeasurer, TextMeasurer};
use greenspace_core::ReportRequest;
use greenspace_core::report::ClassCount;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid classification: {message}")]
    InvalidClassification { message: String },
    #[error("invalid layout: {message}")]
    InvalidLayout { message: String },
    #[error(transparent)]
    Core(#[from] greenspace_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct RenderOptions {
    pub text_measurer: Arc<dyn TextMeasurer + Send + Sync>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            text_measurer: Arc::new(DeterministicTextMeasurer::default()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub svg: String,
    pub layout: PrintLayout,
    pub classes: Vec<ClassCount>,
    pub unclassified: usize,
}

/// Symbolizes `request.layer` and composes the full page as SVG.
pub fn render_report(request: &ReportRequest<'_>, options: &RenderOptions) -> Result<RenderedReport> {
    let settings = request.settings;
    let renderer = GraduatedRenderer::from_classification(&settings.classification)?;
    let classes = renderer.symbolize(request.layer)?;
    let (counts, unclassified) = renderer.class_counts(&classes);
    if unclassified > 0 {
        tracing::debug!(
            layer = %request.layer.name(),
            unclassified,
            "features outside every range are drawn as outlines"
        );
    }

    let layout = layout::layout_report(
        settings,
        request.layer.name(),
        &renderer,
        request.base_dir,
        options.text_measurer.as_ref(),
    )?;
    let svg = svg::render_report_svg(&layout, request.layer, &classes, &renderer);
    Ok(RenderedReport {
        svg,
        layout,
        classes: counts,
        unclassified,
    })
}
