#![forbid(unsafe_code)]

//! Green-space coverage pipeline: reprojection, overlay, join and percentage stages over
//! polygon shapefiles.
//!
//! Stages take and return [`layer::Layer`] values; [`pipeline::run`] chains them through a
//! [`context::PipelineContext`] and hands the result to a [`report::ReportGenerator`].

pub mod area;
pub mod basemap;
pub mod config;
pub mod context;
pub mod crs;
pub mod error;
pub mod join;
pub mod layer;
pub mod manifest;
pub mod overlay;
pub mod percentage;
pub mod pipeline;
pub mod report;
pub mod reproject;
pub mod shp;

pub use area::{AreaSummary, calculate_area};
pub use basemap::BasemapSource;
pub use config::PipelineConfig;
pub use context::{LayerHandle, PipelineContext};
pub use crs::Crs;
pub use error::{Error, Result};
pub use join::{JoinMethod, JoinOptions, JoinSummary, join_attributes};
pub use layer::{EditSession, Feature, FieldDef, FieldIndex, FieldKind, Layer, Schema, Value};
pub use percentage::{DivisionPolicy, PercentageSpec, PercentageSummary, derive_percentage};
pub use pipeline::{PipelineOutcome, run};
pub use report::{Extent, ReportGenerator, ReportOutcome, ReportRequest, ReportSettings};
pub use reproject::{ReprojectedFile, reproject_directory, reproject_layer};
