use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("reprojection of {layer} failed at feature {fid}: {reason}")]
    ReprojectionFailed {
        layer: String,
        fid: u64,
        reason: String,
    },

    #[error("feature {fid} of {layer} has unrepairable geometry: {reason}")]
    InvalidGeometryUnrepairable {
        layer: String,
        fid: u64,
        reason: String,
    },

    #[error(
        "cannot join {base_layer}.{base_field} ({base_kind}) with {join_layer}.{join_field} ({join_kind})"
    )]
    JoinKeyMismatch {
        base_layer: String,
        base_field: String,
        base_kind: String,
        join_layer: String,
        join_field: String,
        join_kind: String,
    },

    #[error("division by zero or null in {layer}.{field} at feature {fid}")]
    DivisionByZeroOrNull {
        layer: String,
        field: String,
        fid: u64,
    },

    #[error("export to {} failed: {message}", path.display())]
    ExportFailed { path: PathBuf, message: String },

    #[error("unknown coordinate reference system: {id}")]
    UnknownCrs { id: String },

    #[error("layers {left} ({left_crs}) and {right} ({right_crs}) use different CRSs")]
    CrsMismatch {
        left: String,
        left_crs: String,
        right: String,
        right_crs: String,
    },

    #[error("layer {layer} uses geographic CRS {crs}; planar area needs a projected CRS")]
    NonMetricCrs { layer: String, crs: String },

    #[error("layer {layer} has no field named {field}")]
    MissingField { layer: String, field: String },

    #[error("field {layer}.{field} is {found}, expected {expected}")]
    FieldTypeMismatch {
        layer: String,
        field: String,
        expected: String,
        found: String,
    },

    #[error("layer {layer} already has a field named {field}")]
    DuplicateField { layer: String, field: String },

    #[error("feature {fid} of {} is a {shape_type}, only polygons are supported", path.display())]
    UnsupportedGeometry {
        path: PathBuf,
        fid: u64,
        shape_type: String,
    },

    #[error("layer handle {handle} is not registered in the pipeline context")]
    UnknownLayer { handle: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("shapefile error in {}: {source}", path.display())]
    Shapefile {
        path: PathBuf,
        #[source]
        source: shapefile::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::InputNotFound { path };
        }
        Self::Io { path, source }
    }

    pub(crate) fn shapefile(path: impl Into<PathBuf>, source: shapefile::Error) -> Self {
        let path = path.into();
        match source {
            shapefile::Error::IoError(io) => Self::io(path, io),
            source => Self::Shapefile { path, source },
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
