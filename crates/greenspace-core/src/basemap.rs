use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters left unescaped in the tile template: unreserved characters plus `/`.
const TEMPLATE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// An XYZ tile service used as the display basemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasemapSource {
    pub name: String,
    pub template: String,
    pub zmin: u8,
    pub zmax: u8,
}

impl Default for BasemapSource {
    fn default() -> Self {
        Self {
            name: "Google Road Maps".to_string(),
            template: "mt1.google.com/vt/lyrs=m&x={x}&y={y}&z={z}".to_string(),
            zmin: 0,
            zmax: 21,
        }
    }
}

impl BasemapSource {
    /// Data-source string understood by XYZ raster providers.
    pub fn uri(&self) -> String {
        format!(
            "type=xyz&zmin={}&zmax={}&url=https://{}",
            self.zmin,
            self.zmax,
            utf8_percent_encode(&self.template, TEMPLATE)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uri_escapes_query_but_keeps_slashes() {
        assert_eq!(
            BasemapSource::default().uri(),
            "type=xyz&zmin=0&zmax=21&url=https://mt1.google.com/vt/lyrs%3Dm%26x%3D%7Bx%7D%26y%3D%7By%7D%26z%3D%7Bz%7D"
        );
    }
}
