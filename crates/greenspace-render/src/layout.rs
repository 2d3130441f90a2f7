//! Print layout: every page item positioned in millimetres.

use crate::geom::{
    MapToPage, PagePoint, PageRect, PageSize, map_to_page, page_point, page_rect, pixels_to_mm,
    points_to_mm,
};
use crate::style::GraduatedRenderer;
use crate::svg::util::fmt;
use crate::text::{TextMeasurer, TextStyle};
use crate::{Error, Result};
use greenspace_core::{Extent, ReportSettings};
use std::path::{Path, PathBuf};

/// Fraction of the font size between the top of a text box and its baseline.
const ASCENT: f64 = 0.8;
const LEGEND_PADDING: f64 = 2.0;
const LEGEND_SPACING: f64 = 1.5;
const PATCH_WIDTH: f64 = 7.0;
const PATCH_HEIGHT: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
}

impl TextAnchor {
    pub fn as_svg(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextLabel {
    pub text: String,
    pub baseline: PagePoint,
    pub anchor: TextAnchor,
    pub style: TextStyle,
    pub bounds: PageRect,
}

#[derive(Debug, Clone)]
pub struct MapFrameLayout {
    pub rect: PageRect,
    /// Requested extent grown to the frame aspect ratio.
    pub extent: Extent,
    pub background: String,
    pub transform: MapToPage,
}

impl MapFrameLayout {
    /// Page millimetres per map unit.
    pub fn scale(&self) -> f64 {
        self.rect.size.width / self.extent.width()
    }
}

#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub patch: PageRect,
    pub color: String,
    pub opacity: f64,
    pub label: TextLabel,
}

#[derive(Debug, Clone)]
pub struct LegendLayout {
    pub bounds: PageRect,
    pub title: TextLabel,
    pub layer_heading: Option<TextLabel>,
    pub entries: Vec<LegendEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScaleBox {
    pub rect: PageRect,
    pub filled: bool,
}

#[derive(Debug, Clone)]
pub struct ScaleBarLayout {
    pub bounds: PageRect,
    pub segment_width: f64,
    pub boxes: Vec<ScaleBox>,
    /// Segment boundary labels followed by the unit label.
    pub labels: Vec<TextLabel>,
}

#[derive(Debug, Clone)]
pub struct PictureLayout {
    pub path: PathBuf,
    pub rect: PageRect,
}

#[derive(Debug, Clone)]
pub struct PrintLayout {
    pub page: PageSize,
    pub map: MapFrameLayout,
    pub title: TextLabel,
    pub legend: LegendLayout,
    pub scale_bar: ScaleBarLayout,
    pub pictures: Vec<PictureLayout>,
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidLayout {
        message: message.into(),
    }
}

fn text_style(font_family: &str, font_size_pt: f64, bold: bool) -> TextStyle {
    TextStyle {
        font_family: Some(font_family.to_string()).filter(|f| !f.is_empty()),
        font_size: points_to_mm(font_size_pt),
        bold,
    }
}

/// Measures `text` and places its box with the top edge at `top`.
fn place_label(
    text: &str,
    x: f64,
    top: f64,
    anchor: TextAnchor,
    style: TextStyle,
    measurer: &dyn TextMeasurer,
) -> TextLabel {
    let metrics = measurer.measure(text, &style);
    let left = match anchor {
        TextAnchor::Start => x,
        TextAnchor::Middle => x - metrics.width / 2.0,
    };
    TextLabel {
        text: text.to_string(),
        baseline: page_point(x, top + style.font_size * ASCENT),
        anchor,
        bounds: page_rect(left, top, metrics.width, metrics.height),
        style,
    }
}

pub fn layout_report(
    settings: &ReportSettings,
    layer_name: &str,
    renderer: &GraduatedRenderer,
    base_dir: &Path,
    measurer: &dyn TextMeasurer,
) -> Result<PrintLayout> {
    if !(settings.page_width > 0.0 && settings.page_height > 0.0) {
        return Err(invalid(format!(
            "page size {}x{} mm",
            settings.page_width, settings.page_height
        )));
    }
    if !(settings.dpi.is_finite() && settings.dpi > 0.0) {
        return Err(invalid(format!("dpi {}", settings.dpi)));
    }

    let map = layout_map(settings)?;
    let title = place_label(
        &settings.title.text,
        settings.title.x,
        settings.title.y,
        TextAnchor::Start,
        text_style(
            &settings.title.font_family,
            settings.title.font_size_pt,
            settings.title.bold,
        ),
        measurer,
    );
    let legend = layout_legend(settings, layer_name, renderer, measurer);
    let scale_bar = layout_scale_bar(settings, &map, measurer)?;
    let pictures = settings
        .pictures
        .iter()
        .map(|p| PictureLayout {
            path: if p.path.is_absolute() {
                p.path.clone()
            } else {
                base_dir.join(&p.path)
            },
            rect: page_rect(
                p.x,
                p.y,
                pixels_to_mm(p.width_px, settings.dpi),
                pixels_to_mm(p.height_px, settings.dpi),
            ),
        })
        .collect();

    Ok(PrintLayout {
        page: PageSize::new(settings.page_width, settings.page_height),
        map,
        title,
        legend,
        scale_bar,
        pictures,
    })
}

fn layout_map(settings: &ReportSettings) -> Result<MapFrameLayout> {
    let frame = &settings.map;
    if !(frame.width > 0.0 && frame.height > 0.0) {
        return Err(invalid(format!(
            "map frame {}x{} mm",
            frame.width, frame.height
        )));
    }
    let requested = frame.extent;
    if !(requested.width() > 0.0 && requested.height() > 0.0) {
        return Err(invalid(format!("empty map extent {requested:?}")));
    }
    let rect = page_rect(frame.x, frame.y, frame.width, frame.height);
    let extent = requested.expand_to_aspect(frame.width / frame.height);
    Ok(MapFrameLayout {
        rect,
        extent,
        background: frame.background.clone(),
        transform: map_to_page(&extent, &rect),
    })
}

fn layout_legend(
    settings: &ReportSettings,
    layer_name: &str,
    renderer: &GraduatedRenderer,
    measurer: &dyn TextMeasurer,
) -> LegendLayout {
    let legend = &settings.legend;
    let x = legend.x + LEGEND_PADDING;
    let mut y = legend.y + LEGEND_PADDING;

    let title = place_label(
        &legend.title,
        x,
        y,
        TextAnchor::Start,
        text_style(&legend.font_family, legend.font_size_pt * 1.4, true),
        measurer,
    );
    y += title.bounds.size.height + LEGEND_SPACING;
    let mut right = title.bounds.max_x();

    let layer_heading = (!layer_name.is_empty()).then(|| {
        let heading = place_label(
            layer_name,
            x,
            y,
            TextAnchor::Start,
            text_style(&legend.font_family, legend.font_size_pt, true),
            measurer,
        );
        y += heading.bounds.size.height + LEGEND_SPACING;
        heading
    });
    if let Some(heading) = &layer_heading {
        right = right.max(heading.bounds.max_x());
    }

    let item_style = text_style(&legend.font_family, legend.font_size_pt, false);
    let mut entries = Vec::with_capacity(renderer.ranges.len());
    for range in &renderer.ranges {
        let patch = page_rect(x, y, PATCH_WIDTH, PATCH_HEIGHT);
        let text_height = measurer.measure(&range.label, &item_style).height;
        let label = place_label(
            &range.label,
            x + PATCH_WIDTH + LEGEND_SPACING,
            y + (PATCH_HEIGHT - text_height) / 2.0,
            TextAnchor::Start,
            item_style.clone(),
            measurer,
        );
        right = right.max(label.bounds.max_x());
        entries.push(LegendEntry {
            patch,
            color: range.color.clone(),
            opacity: range.opacity,
            label,
        });
        y += PATCH_HEIGHT + LEGEND_SPACING;
    }

    let bottom = y - LEGEND_SPACING + LEGEND_PADDING;
    LegendLayout {
        bounds: page_rect(
            legend.x,
            legend.y,
            right + LEGEND_PADDING - legend.x,
            bottom - legend.y,
        ),
        title,
        layer_heading,
        entries,
    }
}

/// Double-box bar: two rows of alternating boxes, labels on segment boundaries above.
fn layout_scale_bar(
    settings: &ReportSettings,
    map: &MapFrameLayout,
    measurer: &dyn TextMeasurer,
) -> Result<ScaleBarLayout> {
    let bar = &settings.scale_bar;
    let total = bar.segments + bar.segments_left;
    if total == 0 {
        return Err(invalid("scale bar needs at least one segment"));
    }
    let segment_map_units = bar.units_per_segment * bar.map_units_per_unit;
    if !(segment_map_units.is_finite() && segment_map_units > 0.0) {
        return Err(invalid(format!(
            "scale bar segment of {} x {} map units",
            bar.units_per_segment, bar.map_units_per_unit
        )));
    }
    let segment_width = segment_map_units * map.scale();
    let style = text_style(&bar.font_family, bar.font_size_pt, false);
    let label_height = measurer.measure("0", &style).height;
    let bar_top = bar.y + label_height + 0.5;
    let row = bar.height / 2.0;

    let mut boxes = Vec::with_capacity(total as usize * 2);
    for i in 0..total {
        let x = bar.x + f64::from(i) * segment_width;
        boxes.push(ScaleBox {
            rect: page_rect(x, bar_top, segment_width, row),
            filled: i % 2 == 0,
        });
        boxes.push(ScaleBox {
            rect: page_rect(x, bar_top + row, segment_width, row),
            filled: i % 2 == 1,
        });
    }

    let mut labels: Vec<TextLabel> = (0..=total)
        .map(|i| {
            let units = (f64::from(i) - f64::from(bar.segments_left)).abs() * bar.units_per_segment;
            place_label(
                &fmt(units),
                bar.x + f64::from(i) * segment_width,
                bar.y,
                TextAnchor::Middle,
                style.clone(),
                measurer,
            )
        })
        .collect();
    let mut right = bar.x + f64::from(total) * segment_width;
    if !bar.unit_label.is_empty() {
        let last_right = labels.last().map_or(right, |l| l.bounds.max_x());
        let unit = place_label(
            &bar.unit_label,
            last_right + 1.0,
            bar.y,
            TextAnchor::Start,
            style,
            measurer,
        );
        right = right.max(unit.bounds.max_x());
        labels.push(unit);
    }

    let left = labels
        .first()
        .map_or(bar.x, |l| l.bounds.min_x().min(bar.x));
    Ok(ScaleBarLayout {
        bounds: page_rect(left, bar.y, right - left, bar_top + bar.height - bar.y),
        segment_width,
        boxes,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::DeterministicTextMeasurer;
    use greenspace_core::report::Classification;

    fn default_layout() -> PrintLayout {
        let settings = ReportSettings::default();
        let renderer = GraduatedRenderer::from_classification(&Classification::default()).unwrap();
        layout_report(
            &settings,
            "Neighbourhoods_GreenSpaces_UTM17",
            &renderer,
            Path::new("/data"),
            &DeterministicTextMeasurer::default(),
        )
        .unwrap()
    }

    #[test]
    fn map_frame_shows_the_extent_grown_to_a_square() {
        let layout = default_layout();
        assert_eq!(layout.page, PageSize::new(297.0, 210.0));
        assert_eq!(layout.map.rect, page_rect(10.0, 20.0, 150.0, 150.0));
        assert!((layout.map.extent.height() - 43_000.0).abs() < 1e-6);
        assert!((layout.map.scale() - 150.0 / 43_000.0).abs() < 1e-12);
    }

    #[test]
    fn scale_bar_has_four_five_km_segments() {
        let bar = default_layout().scale_bar;
        assert!((bar.segment_width - 5_000.0 * 150.0 / 43_000.0).abs() < 1e-9);
        assert_eq!(bar.boxes.len(), 8);
        assert!(bar.boxes[0].filled && !bar.boxes[1].filled);
        assert!(!bar.boxes[2].filled && bar.boxes[3].filled);
        let texts: Vec<&str> = bar.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["0", "5", "10", "15", "20", "km"]);
        assert!((bar.labels[0].baseline.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn segments_left_of_zero_count_outwards() {
        let mut settings = ReportSettings::default();
        settings.scale_bar.segments = 2;
        settings.scale_bar.segments_left = 1;
        settings.scale_bar.unit_label.clear();
        let renderer = GraduatedRenderer::from_classification(&settings.classification).unwrap();
        let layout = layout_report(
            &settings,
            "nb",
            &renderer,
            Path::new("."),
            &DeterministicTextMeasurer::default(),
        )
        .unwrap();
        let texts: Vec<&str> = layout
            .scale_bar
            .labels
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, ["5", "0", "5", "10"]);
    }

    #[test]
    fn legend_lists_one_entry_per_range_below_its_heading() {
        let legend = default_layout().legend;
        assert_eq!(legend.title.text, "Percentage Ranges");
        let heading = legend.layer_heading.as_ref().unwrap();
        assert_eq!(heading.text, "Neighbourhoods_GreenSpaces_UTM17");
        assert_eq!(legend.entries.len(), 8);
        assert_eq!(legend.entries[2].label.text, "10:20%");
        assert!(legend.entries[0].patch.min_y() > heading.bounds.max_y());
        assert!(legend
            .entries
            .windows(2)
            .all(|w| w[0].patch.max_y() < w[1].patch.min_y()));
        assert_eq!(legend.bounds.origin, page_point(170.0, 20.0));
        assert!(legend.bounds.contains_rect(&legend.entries[7].label.bounds));
    }

    #[test]
    fn pictures_are_sized_at_print_resolution() {
        let pictures = default_layout().pictures;
        assert_eq!(pictures[0].path, PathBuf::from("/data/img/Toronto-Park.jpg"));
        assert!((pictures[0].rect.size.width - 101.6).abs() < 1e-9);
        assert!((pictures[0].rect.size.height - 950.0 * 25.4 / 300.0).abs() < 1e-9);
        assert_eq!(pictures[1].rect.origin, page_point(120.0, 130.0));
        assert!((pictures[1].rect.size.width - 38.1).abs() < 1e-9);
    }

    #[test]
    fn title_box_is_sized_to_its_text() {
        let title = default_layout().title;
        assert_eq!(title.bounds.origin, page_point(55.0, 7.0));
        assert!(title.bounds.size.width > 100.0);
        assert!(title.style.bold);
        assert!((title.style.font_size - points_to_mm(20.0)).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_dpi() {
        let settings = ReportSettings {
            dpi: 0.0,
            ..ReportSettings::default()
        };
        let renderer = GraduatedRenderer::from_classification(&settings.classification).unwrap();
        let err = layout_report(
            &settings,
            "nb",
            &renderer,
            Path::new("."),
            &DeterministicTextMeasurer::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidLayout { .. }));
    }
}
