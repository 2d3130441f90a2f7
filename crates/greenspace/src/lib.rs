#![forbid(unsafe_code)]

//! `greenspace` computes the share of each neighbourhood covered by green space and exports a
//! classified print map.
//!
//! # Features
//!
//! - `render`: graduated symbology and print layout as SVG (`greenspace::render`)
//! - `raster`: PDF and PNG export plus [`export::PdfReportGenerator`]

pub use greenspace_core::*;

#[cfg(feature = "render")]
pub mod render {
    pub use greenspace_render::geom;
    pub use greenspace_render::layout::{PrintLayout, layout_report};
    pub use greenspace_render::style::{ClassRange, GraduatedRenderer, range_label};
    pub use greenspace_render::svg::render_report_svg;
    pub use greenspace_render::text::{DeterministicTextMeasurer, TextMeasurer, TextStyle};
    pub use greenspace_render::{Error, RenderOptions, RenderedReport, Result, render_report};
}

#[cfg(feature = "raster")]
pub mod export;
