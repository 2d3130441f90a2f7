//! The end-to-end green-space coverage run.

use crate::area::calculate_area;
use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::join::join_attributes;
use crate::layer::Layer;
use crate::manifest::{OutputShapefile, RunManifest};
use crate::overlay::{dissolve, intersect, repair};
use crate::percentage::derive_percentage;
use crate::report::{ReportGenerator, ReportOutcome, ReportRequest};
use crate::reproject::reproject_directory;
use crate::{Error, Result, shp};
use std::path::{Path, PathBuf};

const SHAPEFILE_PARTS: [&str; 4] = ["shp", "shx", "dbf", "prj"];

#[derive(Debug)]
pub struct PipelineOutcome {
    pub manifest: RunManifest,
    pub manifest_path: PathBuf,
    /// The joined neighbourhood layer with area and percentage fields.
    pub layer: Layer,
}

/// Runs every stage with `config`, handing the final layer to `report` when given.
///
/// The context is torn down on return, including on the first failing stage.
pub fn run(config: &PipelineConfig, report: Option<&dyn ReportGenerator>) -> Result<PipelineOutcome> {
    let input_dir = config.input_dir.clone();
    if !input_dir.is_dir() {
        return Err(Error::InputNotFound { path: input_dir });
    }
    let _span = tracing::info_span!("pipeline", dir = %input_dir.display()).entered();
    let suffix = config.suffix();
    let target = config.target_crs.clone();
    let mut ctx = PipelineContext::new(&input_dir, config.source_crs.clone(), target.clone())
        .with_cleanup(config.cleanup_temp);
    let mut manifest = RunManifest::new(
        &input_dir,
        &config.source_crs,
        &target,
        config.basemap.uri(),
    );
    tracing::debug!(basemap = %manifest.basemap, "basemap source");

    manifest.reprojected = reproject_directory(&mut ctx, &suffix)?;
    for file in &manifest.reprojected {
        for ext in SHAPEFILE_PARTS {
            ctx.track_temp_file(file.output.with_extension(ext));
        }
    }

    let nb = ctx.load(
        &reprojected_input(&config.layers.neighbourhoods, &suffix),
        &target,
    )?;
    let gs = ctx.load(
        &reprojected_input(&config.layers.green_spaces, &suffix),
        &target,
    )?;

    manifest.stages.neighbourhood_area = Some(calculate_area(
        ctx.layer_mut(nb)?,
        &config.fields.neighbourhood_area,
    )?);

    let (intersected, summary) = intersect(ctx.layer(gs)?, ctx.layer(nb)?, config.overlay.split)?;
    manifest.stages.intersect = Some(summary);
    ctx.release(gs);
    let intersected = ctx.register(intersected);

    let (repaired, summary) = repair(ctx.layer(intersected)?, config.overlay.sliver_area)?;
    manifest.stages.repair = Some(summary);
    ctx.release(intersected);
    let repaired = ctx.register(repaired);

    let (dissolved, summary) = dissolve(ctx.layer(repaired)?, &config.fields.intersect_key)?;
    manifest.stages.dissolve = Some(summary);
    ctx.release(repaired);
    let dissolved = ctx.register(dissolved);

    manifest.stages.green_space_area = Some(calculate_area(
        ctx.layer_mut(dissolved)?,
        &config.fields.green_space_area,
    )?);

    let (joined, summary) = join_attributes(
        ctx.layer(nb)?,
        &config.fields.base_key,
        ctx.layer(dissolved)?,
        &config.fields.intersect_key,
        &config.join,
    )?;
    manifest.stages.join = Some(summary);
    ctx.release(dissolved);
    ctx.release(nb);
    let joined = ctx.register(joined);

    manifest.stages.percentage = Some(derive_percentage(
        ctx.layer_mut(joined)?,
        &config.percentage,
    )?);

    let mut layer = ctx.take(joined)?;
    let shapefile = config.resolve(&config.output.shapefile);
    if let Some(stem) = shapefile.file_stem() {
        layer.set_name(stem.to_string_lossy());
    }
    let fields = shp::write_layer(&layer, &shapefile)?;
    tracing::info!(path = %shapefile.display(), features = layer.len(), "joined layer written");
    manifest.shapefile = Some(OutputShapefile {
        path: shapefile,
        features: layer.len(),
        fields,
    });

    if let Some(generator) = report {
        manifest.report = Some(generate_report(generator, &layer, config)?);
    }

    let manifest_path = config.resolve(&config.output.manifest);
    manifest.write(&manifest_path)?;
    ctx.teardown();
    tracing::info!(manifest = %manifest_path.display(), "processing complete");
    Ok(PipelineOutcome {
        manifest,
        manifest_path,
        layer,
    })
}

/// Renders the report for an existing layer file, e.g. the output of an earlier run.
pub fn report_from_file(
    config: &PipelineConfig,
    layer_path: &Path,
    generator: &dyn ReportGenerator,
) -> Result<ReportOutcome> {
    let path = config.resolve(layer_path);
    let layer = shp::read_layer(&path, &config.target_crs)?;
    generate_report(generator, &layer, config)
}

fn generate_report(
    generator: &dyn ReportGenerator,
    layer: &Layer,
    config: &PipelineConfig,
) -> Result<ReportOutcome> {
    let _span = tracing::info_span!("report", layer = %layer.name()).entered();
    let request = ReportRequest {
        layer,
        settings: &config.report,
        base_dir: &config.input_dir,
    };
    let outcome = generator.generate(&request)?;
    tracing::info!(pdf = %outcome.pdf.display(), "report exported");
    Ok(outcome)
}

fn reprojected_input(stem: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{stem}{suffix}.shp"))
}
