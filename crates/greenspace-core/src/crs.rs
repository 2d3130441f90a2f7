//! Coordinate reference systems understood by the pipeline.
//!
//! A [`Crs`] is parsed from an authority identifier (`EPSG:32617`) or a raw `+proj=` string and
//! knows how to describe itself to `proj4rs` and how to round-trip through ESRI `.prj` WKT.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datum {
    Wgs84,
    Nad83,
}

impl Datum {
    fn proj_params(self) -> &'static str {
        match self {
            Self::Wgs84 => "+datum=WGS84",
            Self::Nad83 => "+ellps=GRS80 +towgs84=0,0,0,0,0,0,0",
        }
    }

    fn esri_geogcs(self) -> &'static str {
        match self {
            Self::Wgs84 => {
                r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#
            }
            Self::Nad83 => {
                r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#
            }
        }
    }

    fn esri_prefix(self) -> &'static str {
        match self {
            Self::Wgs84 => "WGS_1984",
            Self::Nad83 => "NAD_1983",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CrsKind {
    Geographic { datum: Datum },
    WebMercator,
    Utm { zone: u8, north: bool, datum: Datum },
    Custom { definition: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    id: String,
    kind: CrsKind,
}

impl Crs {
    pub fn wgs84() -> Self {
        Self {
            id: "EPSG:4326".to_string(),
            kind: CrsKind::Geographic {
                datum: Datum::Wgs84,
            },
        }
    }

    pub fn nad83() -> Self {
        Self {
            id: "EPSG:4269".to_string(),
            kind: CrsKind::Geographic {
                datum: Datum::Nad83,
            },
        }
    }

    pub fn web_mercator() -> Self {
        Self {
            id: "EPSG:3857".to_string(),
            kind: CrsKind::WebMercator,
        }
    }

    pub fn utm_wgs84(zone: u8, north: bool) -> Self {
        let base = if north { 32600 } else { 32700 };
        Self {
            id: format!("EPSG:{}", base + u32::from(zone)),
            kind: CrsKind::Utm {
                zone,
                north,
                datum: Datum::Wgs84,
            },
        }
    }

    pub fn utm_nad83(zone: u8) -> Self {
        Self {
            id: format!("EPSG:{}", 26900 + u32::from(zone)),
            kind: CrsKind::Utm {
                zone,
                north: true,
                datum: Datum::Nad83,
            },
        }
    }

    pub fn from_epsg(code: u32) -> Result<Self> {
        let unknown = || Error::UnknownCrs {
            id: format!("EPSG:{code}"),
        };
        let crs = match code {
            4326 => Self::wgs84(),
            4269 => Self::nad83(),
            3857 | 900913 => Self::web_mercator(),
            32601..=32660 => Self::utm_wgs84((code - 32600) as u8, true),
            32701..=32760 => Self::utm_wgs84((code - 32700) as u8, false),
            26901..=26923 => Self::utm_nad83((code - 26900) as u8),
            _ => return Err(unknown()),
        };
        Ok(crs)
    }

    /// Wraps a raw proj definition (`+proj=...`).
    pub fn custom(definition: &str) -> Result<Self> {
        let definition = definition.trim();
        if !definition.starts_with("+proj=") {
            return Err(Error::UnknownCrs {
                id: definition.to_string(),
            });
        }
        Ok(Self {
            id: definition.to_string(),
            kind: CrsKind::Custom {
                definition: definition.to_string(),
            },
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &CrsKind {
        &self.kind
    }

    pub fn epsg(&self) -> Option<u32> {
        self.id.strip_prefix("EPSG:")?.parse().ok()
    }

    /// Whether coordinates are angular (degrees), i.e. planar area is meaningless.
    pub fn is_geographic(&self) -> bool {
        match &self.kind {
            CrsKind::Geographic { .. } => true,
            CrsKind::WebMercator | CrsKind::Utm { .. } => false,
            CrsKind::Custom { definition } => ["longlat", "latlong", "lonlat", "latlon"]
                .iter()
                .any(|p| definition.contains(&format!("+proj={p}"))),
        }
    }

    pub fn proj_definition(&self) -> String {
        match &self.kind {
            CrsKind::Geographic { datum } => format!("+proj=longlat {} +no_defs", datum.proj_params()),
            CrsKind::WebMercator => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs".to_string(),
            CrsKind::Utm { zone, north, datum } => format!(
                "+proj=utm +zone={zone}{} {} +units=m +no_defs",
                if *north { "" } else { " +south" },
                datum.proj_params()
            ),
            CrsKind::Custom { definition } => definition.clone(),
        }
    }

    pub fn to_proj(&self) -> Result<proj4rs::Proj> {
        proj4rs::Proj::from_proj_string(&self.proj_definition()).map_err(|err| {
            Error::UnknownCrs {
                id: format!("{} ({err})", self.id),
            }
        })
    }

    /// Filename suffix for layers reprojected into this CRS, e.g. `_UTM17`.
    pub fn file_suffix(&self) -> String {
        match (&self.kind, self.epsg()) {
            (CrsKind::Utm { zone, north, .. }, _) => {
                format!("_UTM{zone}{}", if *north { "" } else { "S" })
            }
            (_, Some(code)) => format!("_EPSG{code}"),
            (_, None) => "_reprojected".to_string(),
        }
    }

    /// ESRI flavoured WKT written to `.prj` files. `None` for custom definitions.
    pub fn esri_wkt(&self) -> Option<String> {
        match &self.kind {
            CrsKind::Geographic { datum } => Some(datum.esri_geogcs().to_string()),
            CrsKind::WebMercator => Some(format!(
                r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",{},PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#,
                Datum::Wgs84.esri_geogcs()
            )),
            CrsKind::Utm { zone, north, datum } => Some(format!(
                r#"PROJCS["{prefix}_UTM_Zone_{zone}{hemi}",{geogcs},PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",{northing}.0],PARAMETER["Central_Meridian",{cm}.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
                prefix = datum.esri_prefix(),
                hemi = if *north { "N" } else { "S" },
                geogcs = datum.esri_geogcs(),
                northing = if *north { 0 } else { 10_000_000 },
                cm = -183 + 6 * i32::from(*zone),
            )),
            CrsKind::Custom { .. } => None,
        }
    }

    /// Recognises the CRS described by `.prj` WKT, by trailing EPSG authority or well-known name.
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        let wkt = wkt.trim();
        // The outermost AUTHORITY closes the WKT, so the last match names the whole CRS.
        if let Some(code) = authority_regex()
            .captures_iter(wkt)
            .last()
            .and_then(|c| c[1].parse::<u32>().ok())
        {
            if let Ok(crs) = Self::from_epsg(code) {
                return Some(crs);
            }
        }

        if let Some(caps) = esri_utm_regex().captures(wkt) {
            let zone = caps[2].parse::<u8>().ok()?;
            let north = &caps[3] == "N";
            return match &caps[1] {
                "NAD_1983" | "NAD83" if north => Some(Self::utm_nad83(zone)),
                "WGS_1984" | "WGS 84" => Some(Self::utm_wgs84(zone, north)),
                _ => None,
            };
        }
        if wkt.starts_with("PROJCS") {
            if wkt.contains("Web_Mercator") || wkt.contains("Pseudo-Mercator") {
                return Some(Self::web_mercator());
            }
            return None;
        }
        if wkt.starts_with("GEOGCS") {
            if wkt.contains("GCS_WGS_1984") || wkt.contains(r#"GEOGCS["WGS 84""#) {
                return Some(Self::wgs84());
            }
            if wkt.contains("GCS_North_American_1983") || wkt.contains(r#"GEOGCS["NAD83""#) {
                return Some(Self::nad83());
            }
        }
        None
    }
}

fn authority_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid regex")
    })
}

fn esri_utm_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*PROJCS\[\s*"(WGS_1984|NAD_1983|WGS 84|NAD83)[ _/]+UTM[ _][Zz]one[ _](\d{1,2})([NS])""#,
        )
        .expect("valid regex")
    })
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with("+proj=") {
            return Self::custom(s);
        }
        let upper = s.to_ascii_uppercase();
        let Some(code) = upper.strip_prefix("EPSG:") else {
            return Err(Error::UnknownCrs { id: s.to_string() });
        };
        let code = code
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::UnknownCrs { id: s.to_string() })?;
        Self::from_epsg(code)
    }
}

impl TryFrom<String> for Crs {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.id
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
