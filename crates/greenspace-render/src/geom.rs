//! Page and map coordinate spaces.
//!
//! Page space is millimetres from the top-left corner with y growing downwards. Map space is
//! the layer CRS with y growing northwards.

use greenspace_core::Extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapUnits;

pub type PagePoint = euclid::Point2D<f64, Mm>;
pub type PageSize = euclid::Size2D<f64, Mm>;
pub type PageRect = euclid::Rect<f64, Mm>;
pub type MapPoint = euclid::Point2D<f64, MapUnits>;
pub type MapToPage = euclid::Transform2D<f64, MapUnits, Mm>;

pub const MM_PER_INCH: f64 = 25.4;
pub const MM_PER_POINT: f64 = MM_PER_INCH / 72.0;

pub fn page_point(x: f64, y: f64) -> PagePoint {
    euclid::point2(x, y)
}

pub fn page_rect(x: f64, y: f64, width: f64, height: f64) -> PageRect {
    euclid::rect(x, y, width, height)
}

pub fn map_point(x: f64, y: f64) -> MapPoint {
    euclid::point2(x, y)
}

pub fn points_to_mm(pt: f64) -> f64 {
    pt * MM_PER_POINT
}

pub fn pixels_to_mm(px: f64, dpi: f64) -> f64 {
    px * MM_PER_INCH / dpi
}

/// Maps `extent` onto `frame`, flipping y so north is up.
pub fn map_to_page(extent: &Extent, frame: &PageRect) -> MapToPage {
    let sx = frame.size.width / extent.width();
    let sy = frame.size.height / extent.height();
    MapToPage::scale(sx, -sy).then_translate(euclid::vec2(
        frame.origin.x - extent.min_x * sx,
        frame.origin.y + extent.max_y * sy,
    ))
}
