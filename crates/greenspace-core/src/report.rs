//! Report settings and the seam between the computational pipeline and map rendering.

use crate::Result;
use crate::layer::Layer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Axis-aligned map extent in layer CRS units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Grows the shorter side around the centre so `width / height == aspect`.
    pub fn expand_to_aspect(&self, aspect: f64) -> Self {
        if !(aspect.is_finite() && aspect > 0.0) || self.height() <= 0.0 {
            return *self;
        }
        let (cx, cy) = self.center();
        let (mut w, mut h) = (self.width(), self.height());
        if w / h < aspect {
            w = h * aspect;
        } else {
            h = w / aspect;
        }
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Classification {
    pub field: String,
    pub breaks: Vec<f64>,
    pub colors: Vec<String>,
    pub opacity: f64,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            field: "PCT_GS".to_string(),
            breaks: vec![0.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0],
            colors: [
                "#00eb00", "#00b100", "#009d00", "#008900", "#007600", "#006200", "#004e00",
                "#003b00", "#002700",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            opacity: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapFrameSettings {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub extent: Extent,
    pub background: String,
}

impl Default for MapFrameSettings {
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 20.0,
            width: 150.0,
            height: 150.0,
            extent: Extent::new(609_000.0, 4_825_000.0, 652_000.0, 4_857_449.0),
            background: "#ffffff".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleSettings {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_family: String,
    pub font_size_pt: f64,
    pub bold: bool,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            text: "Toronto Percent Green Spaces Per Neighbourhood".to_string(),
            x: 55.0,
            y: 7.0,
            font_family: "Georgia".to_string(),
            font_size_pt: 20.0,
            bold: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendSettings {
    pub x: f64,
    pub y: f64,
    pub title: String,
    pub font_family: String,
    pub font_size_pt: f64,
}

impl Default for LegendSettings {
    fn default() -> Self {
        Self {
            x: 170.0,
            y: 20.0,
            title: "Percentage Ranges".to_string(),
            font_family: "Georgia".to_string(),
            font_size_pt: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleBarSettings {
    pub x: f64,
    pub y: f64,
    pub segments: u32,
    pub segments_left: u32,
    pub units_per_segment: f64,
    /// Map units in one scale-bar unit (metres per kilometre).
    pub map_units_per_unit: f64,
    pub unit_label: String,
    pub font_family: String,
    pub font_size_pt: f64,
    pub height: f64,
}

impl Default for ScaleBarSettings {
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 180.0,
            segments: 4,
            segments_left: 0,
            units_per_segment: 5.0,
            map_units_per_unit: 1000.0,
            unit_label: "km".to_string(),
            font_family: "Georgia".to_string(),
            font_size_pt: 8.0,
            height: 3.0,
        }
    }
}

/// A picture placed on the page, sized in layout pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureSettings {
    pub path: PathBuf,
    pub x: f64,
    pub y: f64,
    pub width_px: f64,
    pub height_px: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub pdf: PathBuf,
    pub preview_png: Option<PathBuf>,
    pub page_width: f64,
    pub page_height: f64,
    pub dpi: f64,
    pub classification: Classification,
    pub map: MapFrameSettings,
    pub title: TitleSettings,
    pub legend: LegendSettings,
    pub scale_bar: ScaleBarSettings,
    pub pictures: Vec<PictureSettings>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            pdf: PathBuf::from("GreenSpace_by_Neighbourhood.pdf"),
            preview_png: None,
            page_width: 297.0,
            page_height: 210.0,
            dpi: 300.0,
            classification: Classification::default(),
            map: MapFrameSettings::default(),
            title: TitleSettings::default(),
            legend: LegendSettings::default(),
            scale_bar: ScaleBarSettings::default(),
            pictures: vec![
                PictureSettings {
                    path: PathBuf::from("img/Toronto-Park.jpg"),
                    x: 175.0,
                    y: 104.0,
                    width_px: 1200.0,
                    height_px: 950.0,
                },
                PictureSettings {
                    path: PathBuf::from("img/North-Arrow.png"),
                    x: 120.0,
                    y: 130.0,
                    width_px: 450.0,
                    height_px: 450.0,
                },
            ],
        }
    }
}

/// Everything a generator needs to compose one report.
pub struct ReportRequest<'a> {
    pub layer: &'a Layer,
    pub settings: &'a ReportSettings,
    /// Directory relative asset and output paths resolve against.
    pub base_dir: &'a Path,
}

impl ReportRequest<'_> {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub pdf: PathBuf,
    pub preview_png: Option<PathBuf>,
    pub classes: Vec<ClassCount>,
    pub unclassified: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub label: String,
    pub features: usize,
}

/// Renders a finished layer to a print document.
pub trait ReportGenerator {
    fn generate(&self, request: &ReportRequest<'_>) -> Result<ReportOutcome>;
}
