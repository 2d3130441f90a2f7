//! ESRI shapefile reading and writing (`.shp` + `.shx` + `.dbf` + `.prj`).

use crate::crs::Crs;
use crate::layer::{FieldDef, FieldKind, Layer, Schema, Value};
use crate::{Error, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::dbase::{self, FieldValue, TableWriterBuilder};
use shapefile::{PolygonRing, Shape};
use std::path::{Path, PathBuf};

/// Longest field name a dBase table accepts.
pub const DBF_FIELD_NAME_LIMIT: usize = 10;

const TEXT_FIELD_LENGTH: u8 = 254;
const REAL_FIELD_LENGTH: u8 = 24;
const REAL_FIELD_DECIMALS: u8 = 8;
const INTEGER_FIELD_LENGTH: u8 = 18;

pub fn prj_path(shp: &Path) -> PathBuf {
    shp.with_extension("prj")
}

/// Reads the CRS from the `.prj` beside `shp`, if there is one and it is recognisable.
pub fn read_prj(shp: &Path) -> Option<Crs> {
    let path = prj_path(shp);
    let wkt = std::fs::read_to_string(&path).ok()?;
    let crs = Crs::from_wkt(&wkt);
    if crs.is_none() {
        tracing::warn!(prj = %path.display(), "unrecognised projection definition");
    }
    crs
}

/// Loads a polygon shapefile.
///
/// The CRS comes from the `.prj` when recognisable, else `fallback_crs`.
pub fn read_layer(path: &Path, fallback_crs: &Crs) -> Result<Layer> {
    if !path.is_file() {
        return Err(Error::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let crs = read_prj(path).unwrap_or_else(|| {
        tracing::debug!(layer = %name, crs = %fallback_crs, "no usable .prj, assuming fallback CRS");
        fallback_crs.clone()
    });

    let dbf_path = path.with_extension("dbf");
    let table = dbase::Reader::from_path(&dbf_path)
        .map_err(|err| Error::shapefile(&dbf_path, shapefile::Error::DbaseError(err)))?;
    let fields: Vec<FieldDef> = table
        .fields()
        .iter()
        .map(|info| FieldDef::new(info.name(), field_kind(info.field_type())))
        .collect();
    drop(table);
    let schema = Schema::from_fields(&name, fields.iter().cloned())?;

    let mut layer = Layer::new(name, crs, schema);
    layer.source = Some(path.to_path_buf());

    let mut reader =
        shapefile::Reader::from_path(path).map_err(|err| Error::shapefile(path, err))?;
    for (fid, item) in reader.iter_shapes_and_records().enumerate() {
        let fid = fid as u64;
        let (shape, record) = item.map_err(|err| Error::shapefile(path, err))?;
        let geometry = shape_to_geometry(path, fid, shape)?;
        let values = fields
            .iter()
            .map(|field| record.get(&field.name).map(from_dbf_value).unwrap_or_default())
            .collect();
        layer.push_with_fid(fid, geometry, values)?;
    }
    tracing::debug!(
        layer = %layer.name(),
        features = layer.len(),
        crs = %layer.crs(),
        "loaded shapefile"
    );
    Ok(layer)
}

/// Writes `layer` as a polygon shapefile with a `.prj`, creating parent directories.
///
/// Returns the dBase field names actually written (laundered to the 10-character limit).
pub fn write_layer(layer: &Layer, path: &Path) -> Result<Vec<String>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
    }

    let fields: Vec<FieldDef> = layer.schema().fields().collect();
    let names = launder_field_names(fields.iter().map(|f| f.name.as_str()));

    let mut builder = TableWriterBuilder::new();
    for (field, name) in fields.iter().zip(&names) {
        let field_name = dbase::FieldName::try_from(name.as_str()).map_err(|msg| {
            Error::config(format!("invalid dBase field name {name:?}: {msg:?}"))
        })?;
        builder = match field.kind {
            FieldKind::Text => builder.add_character_field(field_name, TEXT_FIELD_LENGTH),
            FieldKind::Real => {
                builder.add_numeric_field(field_name, REAL_FIELD_LENGTH, REAL_FIELD_DECIMALS)
            }
            FieldKind::Integer => builder.add_numeric_field(field_name, INTEGER_FIELD_LENGTH, 0),
            FieldKind::Boolean => builder.add_logical_field(field_name),
        };
    }

    let mut writer =
        shapefile::Writer::from_path(path, builder).map_err(|err| Error::shapefile(path, err))?;
    let mut skipped = 0usize;
    for feature in layer.features() {
        let Some(polygon) = geometry_to_shape(&feature.geometry) else {
            skipped += 1;
            continue;
        };
        let mut record = dbase::Record::default();
        for ((field, name), value) in fields.iter().zip(&names).zip(feature.values()) {
            record.insert(name.clone(), to_dbf_value(field.kind, value));
        }
        writer
            .write_shape_and_record(&polygon, &record)
            .map_err(|err| Error::shapefile(path, err))?;
    }
    drop(writer);
    if skipped > 0 {
        tracing::warn!(layer = %layer.name(), skipped, "features with empty geometry were not written");
    }

    match layer.crs().esri_wkt() {
        Some(wkt) => {
            let prj = prj_path(path);
            std::fs::write(&prj, wkt).map_err(|err| Error::io(&prj, err))?;
        }
        None => {
            tracing::warn!(layer = %layer.name(), crs = %layer.crs(), "no WKT for CRS, .prj not written")
        }
    }
    tracing::debug!(layer = %layer.name(), path = %path.display(), "wrote shapefile");
    Ok(names)
}

/// Truncates names to the dBase limit, replacing the tail with a counter on collision.
pub fn launder_field_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let truncated: String = name.chars().take(DBF_FIELD_NAME_LIMIT).collect();
        let taken = |candidate: &str, out: &[String]| {
            out.iter().any(|n| n.eq_ignore_ascii_case(candidate))
        };
        if !taken(&truncated, &out) {
            out.push(truncated);
            continue;
        }
        let mut n = 1usize;
        let laundered = loop {
            let digits = n.to_string();
            let keep = DBF_FIELD_NAME_LIMIT.saturating_sub(digits.len());
            let candidate: String = truncated.chars().take(keep).chain(digits.chars()).collect();
            if !taken(&candidate, &out) {
                break candidate;
            }
            n += 1;
        };
        tracing::debug!(field = name, written = %laundered, "dBase field name laundered");
        out.push(laundered);
    }
    out
}

fn field_kind(ty: dbase::FieldType) -> FieldKind {
    match ty {
        dbase::FieldType::Character | dbase::FieldType::Memo => FieldKind::Text,
        dbase::FieldType::Date | dbase::FieldType::DateTime => FieldKind::Text,
        dbase::FieldType::Integer => FieldKind::Integer,
        dbase::FieldType::Logical => FieldKind::Boolean,
        _ => FieldKind::Real,
    }
}

fn from_dbf_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => Value::Text(s.clone()),
        FieldValue::Numeric(Some(v)) | FieldValue::Double(v) | FieldValue::Currency(v) => {
            Value::Real(*v)
        }
        FieldValue::Float(Some(v)) => Value::Real(f64::from(*v)),
        FieldValue::Integer(v) => Value::Integer(i64::from(*v)),
        FieldValue::Logical(Some(b)) => Value::Boolean(*b),
        FieldValue::Date(Some(d)) => Value::Text(format!(
            "{:04}-{:02}-{:02}",
            d.year(),
            d.month(),
            d.day()
        )),
        _ => Value::Null,
    }
}

fn to_dbf_value(kind: FieldKind, value: &Value) -> FieldValue {
    match kind {
        FieldKind::Text => FieldValue::Character(match value {
            Value::Null => None,
            other => Some(other.to_string()),
        }),
        FieldKind::Real | FieldKind::Integer => {
            FieldValue::Numeric(value.as_f64().filter(|v| v.is_finite()))
        }
        FieldKind::Boolean => FieldValue::Logical(match value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }),
    }
}

fn shape_to_geometry(path: &Path, fid: u64, shape: Shape) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(p) => Ok(rings_to_geometry(p.rings(), |pt| (pt.x, pt.y))),
        Shape::PolygonM(p) => Ok(rings_to_geometry(p.rings(), |pt| (pt.x, pt.y))),
        Shape::PolygonZ(p) => Ok(rings_to_geometry(p.rings(), |pt| (pt.x, pt.y))),
        Shape::NullShape => Ok(MultiPolygon::new(Vec::new())),
        other => Err(Error::UnsupportedGeometry {
            path: path.to_path_buf(),
            fid,
            shape_type: format!("{:?}", other.shapetype()),
        }),
    }
}

/// Groups shapefile rings into polygons: every outer ring starts a polygon, inner rings attach
/// to the most recent outer ring. An inner ring with no preceding outer ring is kept as a shell.
fn rings_to_geometry<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> MultiPolygon<f64> {
    let to_line = |points: &[P]| -> LineString<f64> {
        points
            .iter()
            .map(|p| {
                let (x, y) = xy(p);
                Coord { x, y }
            })
            .collect()
    };

    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push((to_line(points), Vec::new())),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some((_, holes)) => holes.push(to_line(points)),
                None => polygons.push((to_line(points), Vec::new())),
            },
        }
    }
    MultiPolygon::new(
        polygons
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}

fn geometry_to_shape(geometry: &MultiPolygon<f64>) -> Option<shapefile::Polygon> {
    let to_points = |line: &LineString<f64>| -> Vec<shapefile::Point> {
        line.coords()
            .map(|c| shapefile::Point::new(c.x, c.y))
            .collect()
    };
    let mut rings = Vec::new();
    for polygon in geometry {
        if polygon.exterior().0.len() < 4 {
            continue;
        }
        rings.push(PolygonRing::Outer(to_points(polygon.exterior())));
        for hole in polygon.interiors() {
            rings.push(PolygonRing::Inner(to_points(hole)));
        }
    }
    if rings.is_empty() {
        return None;
    }
    Some(shapefile::Polygon::with_rings(rings))
}
