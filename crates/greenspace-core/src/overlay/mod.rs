//! Polygon overlay: intersection of two layers, geometry repair and dissolve.

mod dissolve;
mod intersect;
mod repair;

pub use dissolve::{DissolveSummary, dissolve};
pub use intersect::{IntersectSummary, intersect};
pub use repair::{RepairSummary, repair};

use crate::layer::Layer;
use crate::{Error, Result};
use geo::{BooleanOps, MultiPolygon};

fn ensure_same_crs(left: &Layer, right: &Layer) -> Result<()> {
    if left.crs() != right.crs() {
        return Err(Error::CrsMismatch {
            left: left.name().to_string(),
            left_crs: left.crs().to_string(),
            right: right.name().to_string(),
            right_crs: right.crs().to_string(),
        });
    }
    Ok(())
}

/// Unions a sequence of geometries with a pairwise fold.
pub(crate) fn union_all<'a>(geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut iter = geometries.into_iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(Vec::new());
    };
    iter.fold(first.clone(), |acc, next| acc.union(next))
}
