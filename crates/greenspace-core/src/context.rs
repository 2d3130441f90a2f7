use crate::crs::Crs;
use crate::layer::Layer;
use crate::{Error, Result, shp};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque reference to a layer registered in a [`PipelineContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(u32);

impl fmt::Display for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Explicit state shared by the pipeline stages.
///
/// Holds the working directory, the CRS pair and a registry of intermediate layers. Layers
/// live until released or until [`PipelineContext::teardown`], which also runs on drop.
pub struct PipelineContext {
    working_dir: PathBuf,
    source_crs: Crs,
    target_crs: Crs,
    layers: IndexMap<LayerHandle, Layer>,
    next_handle: u32,
    temp_files: Vec<PathBuf>,
    cleanup_temp: bool,
    torn_down: bool,
}

impl PipelineContext {
    pub fn new(working_dir: impl Into<PathBuf>, source_crs: Crs, target_crs: Crs) -> Self {
        let working_dir = working_dir.into();
        tracing::debug!(dir = %working_dir.display(), from = %source_crs, to = %target_crs, "pipeline context created");
        Self {
            working_dir,
            source_crs,
            target_crs,
            layers: IndexMap::new(),
            next_handle: 0,
            temp_files: Vec::new(),
            cleanup_temp: false,
            torn_down: false,
        }
    }

    pub fn with_cleanup(mut self, cleanup_temp: bool) -> Self {
        self.cleanup_temp = cleanup_temp;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn source_crs(&self) -> &Crs {
        &self.source_crs
    }

    pub fn target_crs(&self) -> &Crs {
        &self.target_crs
    }

    /// Resolves `path` against the working directory unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    pub fn register(&mut self, layer: Layer) -> LayerHandle {
        let handle = LayerHandle(self.next_handle);
        self.next_handle += 1;
        tracing::debug!(%handle, layer = %layer.name(), features = layer.len(), "layer registered");
        self.layers.insert(handle, layer);
        handle
    }

    /// Loads a shapefile (resolved against the working directory) and registers it.
    pub fn load(&mut self, path: &Path, fallback_crs: &Crs) -> Result<LayerHandle> {
        let path = self.resolve(path);
        let layer = shp::read_layer(&path, fallback_crs)?;
        Ok(self.register(layer))
    }

    pub fn layer(&self, handle: LayerHandle) -> Result<&Layer> {
        self.layers.get(&handle).ok_or_else(|| Error::UnknownLayer {
            handle: handle.to_string(),
        })
    }

    pub fn layer_mut(&mut self, handle: LayerHandle) -> Result<&mut Layer> {
        self.layers.get_mut(&handle).ok_or_else(|| Error::UnknownLayer {
            handle: handle.to_string(),
        })
    }

    /// Removes a layer from the registry, handing ownership to the caller.
    pub fn take(&mut self, handle: LayerHandle) -> Result<Layer> {
        self.layers
            .shift_remove(&handle)
            .ok_or_else(|| Error::UnknownLayer {
                handle: handle.to_string(),
            })
    }

    /// Drops a layer. Returns whether it was registered.
    pub fn release(&mut self, handle: LayerHandle) -> bool {
        match self.layers.shift_remove(&handle) {
            Some(layer) => {
                tracing::debug!(%handle, layer = %layer.name(), "layer released");
                true
            }
            None => false,
        }
    }

    pub fn live_layers(&self) -> impl Iterator<Item = (LayerHandle, &str)> {
        self.layers.iter().map(|(h, l)| (*h, l.name()))
    }

    /// Registers a file to delete at teardown when cleanup is enabled.
    pub fn track_temp_file(&mut self, path: impl Into<PathBuf>) {
        self.temp_files.push(path.into());
    }

    /// Releases every layer and, when enabled, deletes tracked temporary files. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        let released = self.layers.len();
        self.layers.clear();
        let mut removed = 0usize;
        if self.cleanup_temp {
            for path in self.temp_files.drain(..) {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => {
                        tracing::warn!(path = %path.display(), "failed to remove temporary file: {err}")
                    }
                }
            }
        }
        tracing::debug!(released, removed, "pipeline context torn down");
    }
}

impl Drop for PipelineContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
