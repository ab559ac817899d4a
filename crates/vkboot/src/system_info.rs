//! Instance-level driver capabilities.

use crate::error::{Result, VkResultExt};
use crate::loader::VulkanLoader;
use ash::vk;

/// Name of the Khronos validation layer.
pub const VALIDATION_LAYER_NAME: &str = "VK_LAYER_KHRONOS_validation";

/// Layers, extensions and API version reported by the loader.
///
/// Queried once and read-only afterwards. The instance builder consults it to
/// reject unavailable requests before the driver sees them.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub available_layers: Vec<String>,
    pub available_extensions: Vec<String>,
    pub instance_api_version: u32,
    pub validation_layers_available: bool,
    pub debug_utils_available: bool,
}

impl SystemInfo {
    /// Query the loader.
    pub fn query(loader: &VulkanLoader) -> Result<Self> {
        let entry = loader.entry();

        // SAFETY: the entry is loaded; these global queries have no other preconditions.
        let layers = unsafe { entry.enumerate_instance_layer_properties() }
            .call("vkEnumerateInstanceLayerProperties")?;
        let extensions = unsafe { entry.enumerate_instance_extension_properties(None) }
            .call("vkEnumerateInstanceExtensionProperties")?;
        let version = unsafe { entry.try_enumerate_instance_version() }
            .call("vkEnumerateInstanceVersion")?
            .unwrap_or(vk::API_VERSION_1_0);

        let available_layers: Vec<String> = layers
            .iter()
            .filter_map(|layer| layer.layer_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        // Layer-provided extensions count as available.
        let mut available_extensions: Vec<String> = extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        for layer in &layers {
            let Ok(layer_name) = layer.layer_name_as_c_str() else {
                continue;
            };
            // SAFETY: layer_name is a nul-terminated name reported by the loader.
            match unsafe { entry.enumerate_instance_extension_properties(Some(layer_name)) } {
                Ok(layer_extensions) => available_extensions.extend(
                    layer_extensions
                        .iter()
                        .filter_map(|ext| ext.extension_name_as_c_str().ok())
                        .map(|name| name.to_string_lossy().into_owned()),
                ),
                Err(e) => tracing::debug!(
                    layer = %layer_name.to_string_lossy(),
                    "failed to enumerate layer extensions: {e}"
                ),
            }
        }

        Ok(Self::from_parts(
            available_layers,
            available_extensions,
            version,
        ))
    }

    /// Assemble from already-known values.
    pub fn from_parts(
        mut available_layers: Vec<String>,
        mut available_extensions: Vec<String>,
        instance_api_version: u32,
    ) -> Self {
        available_layers.sort();
        available_layers.dedup();
        available_extensions.sort();
        available_extensions.dedup();

        let validation_layers_available = available_layers
            .binary_search_by(|l| l.as_str().cmp(VALIDATION_LAYER_NAME))
            .is_ok();
        let debug_utils_available = available_extensions
            .binary_search_by(|e| e.as_str().cmp(debug_utils_name()))
            .is_ok();

        Self {
            available_layers,
            available_extensions,
            instance_api_version,
            validation_layers_available,
            debug_utils_available,
        }
    }

    /// Whether the loader reports layer `name`.
    pub fn is_layer_available(&self, name: &str) -> bool {
        self.available_layers
            .binary_search_by(|l| l.as_str().cmp(name))
            .is_ok()
    }

    /// Whether `name` is available, from the loader or an available layer.
    pub fn is_extension_available(&self, name: &str) -> bool {
        self.available_extensions
            .binary_search_by(|e| e.as_str().cmp(name))
            .is_ok()
    }
}

fn debug_utils_name() -> &'static str {
    ash::ext::debug_utils::NAME.to_str().unwrap_or("VK_EXT_debug_utils")
}
