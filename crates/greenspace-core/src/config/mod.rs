//! Pipeline configuration.
//!
//! A user document (YAML or JSON) is deep-merged over the serialized defaults before it is
//! deserialized, so partial files only need to name what they change.

use crate::basemap::BasemapSource;
use crate::crs::Crs;
use crate::join::JoinOptions;
use crate::percentage::PercentageSpec;
use crate::report::ReportSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNames {
    pub green_spaces: String,
    pub neighbourhoods: String,
}

impl Default for LayerNames {
    fn default() -> Self {
        Self {
            green_spaces: "Green_Spaces".to_string(),
            neighbourhoods: "Neighbourhoods".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub neighbourhood_area: String,
    pub green_space_area: String,
    /// Neighbourhood key on the base layer.
    pub base_key: String,
    /// The same key as it appears in the intersection output.
    pub intersect_key: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            neighbourhood_area: "Area_NB".to_string(),
            green_space_area: "Area_GS".to_string(),
            base_key: "AREA_SHORT".to_string(),
            intersect_key: "AREA_SHORT_1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub split: bool,
    pub sliver_area: f64,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            split: true,
            sliver_area: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub shapefile: PathBuf,
    pub manifest: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            shapefile: PathBuf::from("output/Neighbourhoods_GreenSpaces_UTM17.shp"),
            manifest: PathBuf::from("GreenSpace_by_Neighbourhood.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub source_crs: Crs,
    pub target_crs: Crs,
    /// Reprojected file suffix; derived from the target CRS when unset.
    pub suffix: Option<String>,
    pub layers: LayerNames,
    pub fields: FieldNames,
    pub overlay: OverlaySettings,
    pub join: JoinOptions,
    pub percentage: PercentageSpec,
    pub output: OutputSettings,
    pub report: ReportSettings,
    pub basemap: BasemapSource,
    pub cleanup_temp: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            source_crs: Crs::wgs84(),
            target_crs: Crs::utm_wgs84(17, true),
            suffix: None,
            layers: LayerNames::default(),
            fields: FieldNames::default(),
            overlay: OverlaySettings::default(),
            join: JoinOptions::default(),
            percentage: PercentageSpec::default(),
            output: OutputSettings::default(),
            report: ReportSettings::default(),
            basemap: BasemapSource::default(),
            cleanup_temp: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_str_with_format(&text, ConfigFormat::from_path(path))
            .map_err(|err| match err {
                Error::InvalidConfig { message } => {
                    Error::config(format!("{}: {message}", path.display()))
                }
                other => other,
            })
    }

    pub fn from_str_with_format(text: &str, format: ConfigFormat) -> Result<Self> {
        let user: Value = match format {
            ConfigFormat::Json => serde_json::from_str(text).map_err(|e| Error::config(e.to_string()))?,
            ConfigFormat::Yaml => {
                let yaml: serde_yaml::Value =
                    serde_yaml::from_str(text).map_err(|e| Error::config(e.to_string()))?;
                serde_json::to_value(yaml).map_err(|e| Error::config(e.to_string()))?
            }
        };
        Self::from_overrides(&user)
    }

    /// Deep-merges `overrides` over the defaults and validates the result.
    pub fn from_overrides(overrides: &Value) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default()).map_err(|e| Error::config(e.to_string()))?;
        if !overrides.is_null() {
            deep_merge(&mut merged, overrides);
        }
        let config: Self = serde_json::from_value(merged).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::config(e.to_string()))
    }

    pub fn suffix(&self) -> String {
        self.suffix
            .clone()
            .unwrap_or_else(|| self.target_crs.file_suffix())
    }

    /// Resolves `path` against the input directory unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.input_dir.join(path)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let class = &self.report.classification;
        if class.breaks.len() < 2 {
            return Err(Error::config("classification needs at least two breaks"));
        }
        if class.breaks.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(Error::config(format!(
                "classification breaks must be strictly ascending: {:?}",
                class.breaks
            )));
        }
        if class.colors.len() < class.breaks.len() - 1 {
            return Err(Error::config(format!(
                "{} ranges need as many colors, found {}",
                class.breaks.len() - 1,
                class.colors.len()
            )));
        }
        if !(0.0..=1.0).contains(&class.opacity) {
            return Err(Error::config(format!("opacity {} is outside 0..=1", class.opacity)));
        }
        let names = [
            ("layers.green_spaces", &self.layers.green_spaces),
            ("layers.neighbourhoods", &self.layers.neighbourhoods),
            ("fields.neighbourhood_area", &self.fields.neighbourhood_area),
            ("fields.green_space_area", &self.fields.green_space_area),
            ("fields.base_key", &self.fields.base_key),
            ("fields.intersect_key", &self.fields.intersect_key),
            ("join.prefix", &self.join.prefix),
            ("percentage.part_field", &self.percentage.part_field),
            ("percentage.total_field", &self.percentage.total_field),
            ("percentage.output_field", &self.percentage.output_field),
            ("report.classification.field", &class.field),
        ];
        if let Some((key, _)) = names.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::config(format!("{key} must not be empty")));
        }
        if self.suffix.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::config("suffix must not be empty"));
        }
        if self.overlay.sliver_area < 0.0 || !self.overlay.sliver_area.is_finite() {
            return Err(Error::config("overlay.sliver_area must be a non-negative number"));
        }
        if self.target_crs.is_geographic() {
            return Err(Error::NonMetricCrs {
                layer: "target_crs".to_string(),
                crs: self.target_crs.to_string(),
            });
        }
        Ok(())
    }
}

/// Recursively merges `incoming` into `base`; non-object values replace.
pub fn deep_merge(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}
