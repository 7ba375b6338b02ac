//! Reader plugin registry.
//!
//! Plugins are tried in registration order; the first whose sniff accepts
//! the path wins. Registration happens once at startup, so lookups take no
//! lock.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use spool_common::{Options, PlaybackError, PlaybackResult};

use crate::generator::GeneratorPlugin;
use crate::plugin::{FrameWriter, Plugin, WriteInfo};
use crate::ppm::PpmPlugin;
use crate::reader::ReaderHandle;

/// Maps media paths to the plugins that can read or write them.
pub struct ReaderRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl ReaderRegistry {
    /// An empty registry. Most callers want
    /// [`with_default_plugins`](Self::with_default_plugins).
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// A registry with the built-in PPM and generator plugins.
    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PpmPlugin));
        registry.register(Arc::new(GeneratorPlugin));
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// Open a reader for `path` via the first matching plugin.
    pub fn open(&self, path: &Path, options: &Options) -> PlaybackResult<ReaderHandle> {
        for plugin in &self.plugins {
            if plugin.sniff(path) {
                debug!(plugin = plugin.name(), path = %path.display(), "opening reader");
                return plugin.open(path, options);
            }
        }
        Err(PlaybackError::NoPluginMatches {
            path: path.display().to_string(),
        })
    }

    /// Open a writer for `path` via the first matching plugin.
    pub fn write(&self, path: &Path, info: &WriteInfo) -> PlaybackResult<Box<dyn FrameWriter>> {
        for plugin in &self.plugins {
            if plugin.sniff(path) {
                return plugin.write(path, info);
            }
        }
        Err(PlaybackError::NoPluginMatches {
            path: path.display().to_string(),
        })
    }

    /// Union of every registered plugin's extensions.
    pub fn extensions(&self) -> BTreeSet<String> {
        self.plugins
            .iter()
            .flat_map(|plugin| plugin.extensions().iter().map(|ext| ext.to_string()))
            .collect()
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_default_plugins()
    }
}
