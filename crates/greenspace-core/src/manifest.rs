//! JSON record of one pipeline run.

use crate::area::AreaSummary;
use crate::crs::Crs;
use crate::join::JoinSummary;
use crate::overlay::{DissolveSummary, IntersectSummary, RepairSummary};
use crate::percentage::PercentageSummary;
use crate::report::ReportOutcome;
use crate::reproject::ReprojectedFile;
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize)]
pub struct StageSummaries {
    pub neighbourhood_area: Option<AreaSummary>,
    pub intersect: Option<IntersectSummary>,
    pub repair: Option<RepairSummary>,
    pub dissolve: Option<DissolveSummary>,
    pub green_space_area: Option<AreaSummary>,
    pub join: Option<JoinSummary>,
    pub percentage: Option<PercentageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputShapefile {
    pub path: PathBuf,
    pub features: usize,
    /// Field names as stored in the dBase table.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    pub input_dir: PathBuf,
    pub source_crs: Crs,
    pub target_crs: Crs,
    pub basemap: String,
    pub reprojected: Vec<ReprojectedFile>,
    pub stages: StageSummaries,
    pub shapefile: Option<OutputShapefile>,
    pub report: Option<ReportOutcome>,
}

impl RunManifest {
    pub fn new(input_dir: &Path, source_crs: &Crs, target_crs: &Crs, basemap: String) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            input_dir: input_dir.to_path_buf(),
            source_crs: source_crs.clone(),
            target_crs: target_crs.clone(),
            basemap,
            reprojected: Vec::new(),
            stages: StageSummaries::default(),
            shapefile: None,
            report: None,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| Error::ExportFailed {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        std::fs::write(path, json).map_err(|err| Error::io(path, err))?;
        tracing::debug!(path = %path.display(), "run manifest written");
        Ok(())
    }
}
