//! Vertex-wise reprojection of layers and of whole shapefile directories.

use crate::context::PipelineContext;
use crate::crs::Crs;
use crate::layer::Layer;
use crate::{Error, Result, shp};
use geo::{Coord, MapCoords};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A configured `from -> to` coordinate transform.
pub struct Transformer {
    from: Crs,
    to: Crs,
    src: proj4rs::Proj,
    dst: proj4rs::Proj,
}

impl Transformer {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self> {
        Ok(Self {
            from: from.clone(),
            to: to.clone(),
            src: from.to_proj()?,
            dst: to.to_proj()?,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transforms one coordinate. Geographic coordinates are in degrees on both sides.
    pub fn transform(&self, coord: Coord<f64>) -> std::result::Result<Coord<f64>, String> {
        if self.is_identity() {
            return Ok(coord);
        }
        if !(coord.x.is_finite() && coord.y.is_finite()) {
            return Err(format!("non-finite coordinate ({}, {})", coord.x, coord.y));
        }
        let mut point = if self.from.is_geographic() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        proj4rs::transform::transform(&self.src, &self.dst, &mut point)
            .map_err(|err| format!("({}, {}): {err}", coord.x, coord.y))?;
        let (x, y) = if self.to.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !(x.is_finite() && y.is_finite()) {
            return Err(format!(
                "({}, {}) has no finite image in {}",
                coord.x, coord.y, self.to
            ));
        }
        Ok(Coord { x, y })
    }
}

/// Returns a copy of `layer` with every vertex transformed into `target`.
pub fn reproject_layer(layer: &Layer, target: &Crs) -> Result<Layer> {
    let transformer = Transformer::new(layer.crs(), target)?;
    let mut out = layer.clone();
    out.set_crs(target.clone());
    if transformer.is_identity() {
        return Ok(out);
    }
    let transformer = &transformer;
    for feature in out.features_mut() {
        feature.geometry = feature
            .geometry
            .try_map_coords(|c| transformer.transform(c))
            .map_err(|reason| Error::ReprojectionFailed {
                layer: layer.name().to_string(),
                fid: feature.fid,
                reason,
            })?;
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReprojectedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub source_crs: Crs,
    pub features: usize,
}

/// `dir/name.shp` -> `dir/name<suffix>.shp`.
pub fn reprojected_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}{suffix}.shp"))
}

/// Reprojects every `.shp` in the context's working directory into its target CRS.
///
/// Files are processed in name order and written beside their source; files whose stem already
/// ends with `suffix` are outputs of an earlier run and are skipped. Each input layer is
/// released from the context once its output is written. The first failure aborts the loop,
/// leaving already-written outputs in place.
pub fn reproject_directory(ctx: &mut PipelineContext, suffix: &str) -> Result<Vec<ReprojectedFile>> {
    if suffix.trim().is_empty() {
        return Err(Error::config(
            "reprojection suffix must not be empty; outputs would overwrite their sources",
        ));
    }
    let _span = tracing::info_span!("reproject", dir = %ctx.working_dir().display()).entered();
    let dir = ctx.working_dir().to_path_buf();
    let entries = std::fs::read_dir(&dir).map_err(|err| Error::io(&dir, err))?;
    let mut sources: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| Error::io(&dir, err))?.path();
        let is_shp = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"));
        let already_done = path
            .file_stem()
            .is_some_and(|stem| stem.to_string_lossy().ends_with(suffix));
        if is_shp && !already_done && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();

    let target = ctx.target_crs().clone();
    let fallback = ctx.source_crs().clone();
    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        let handle = ctx.load(&source, &fallback)?;
        let layer = ctx.layer(handle)?;
        let source_crs = layer.crs().clone();
        let reprojected = reproject_layer(layer, &target)?;
        let output = reprojected_path(&source, suffix);
        shp::write_layer(&reprojected, &output)?;
        ctx.release(handle);
        tracing::info!(
            source = %source.display(),
            output = %output.display(),
            from = %source_crs,
            to = %target,
            "layer reprojected"
        );
        out.push(ReprojectedFile {
            source,
            output,
            source_crs,
            features: reprojected.len(),
        });
    }
    Ok(out)
}
