//! Vulkan loader context.

use crate::error::{BootError, Result};

/// Owns the Vulkan entry points resolved from the loader library.
///
/// Loading happens once, in [`VulkanLoader::load`]. The loader is then passed
/// by reference to every builder; no entry points are cached globally.
#[derive(Clone)]
pub struct VulkanLoader {
    entry: ash::Entry,
}

impl VulkanLoader {
    /// Open the system Vulkan loader and resolve the global entry points.
    pub fn load() -> Result<Self> {
        // SAFETY: loading the system loader runs its initialisers; nothing
        // else in the process is assumed to have loaded it.
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| BootError::Loading(e.to_string()))?;
        Ok(Self { entry })
    }

    /// Wrap an entry loaded elsewhere, e.g. with a custom library path.
    pub fn from_entry(entry: ash::Entry) -> Self {
        Self { entry }
    }

    /// The raw entry-point table.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }
}
