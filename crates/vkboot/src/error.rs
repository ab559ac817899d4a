//! Negotiation error types.

use crate::queue::QueueType;
use crate::selector::Rejection;
use ash::vk;
use thiserror::Error;
use vkboot_chain::ChainError;

/// Errors produced while building instances, devices and swapchains.
///
/// Environment, selection and negotiation failures are detected before the
/// driver is called and each has its own variant. Driver failures keep the
/// raw result together with the entry point that produced it.
#[derive(Error, Debug)]
pub enum BootError {
    /// The Vulkan loader library could not be opened.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// The loader does not provide the requested API version.
    #[error("Vulkan {} required, loader provides {}", version_string(*.required), version_string(*.available))]
    ApiVersionUnavailable { required: u32, available: u32 },

    /// A requested instance layer is not installed.
    #[error("Instance layer not present: {0}")]
    LayerNotPresent(String),

    /// A requested instance extension is not available.
    #[error("Instance extension not present: {0}")]
    ExtensionNotPresent(String),

    /// Validation layers were required but are not installed.
    #[error("Validation layers required but not present")]
    ValidationLayersNotPresent,

    /// No surface extension is available for a windowed instance.
    #[error("Windowing extensions not present: {0:?}")]
    WindowingExtensionsNotPresent(Vec<String>),

    /// The display handle could not be obtained from the window.
    #[error("Invalid display or window handle: {0}")]
    InvalidWindowHandle(String),

    /// Presentation was required but no surface was given to the selector.
    #[error("Presentation required but no surface was provided")]
    NoSurfaceProvided,

    /// The instance reports no physical devices at all.
    #[error("No physical devices found")]
    NoPhysicalDevicesFound,

    /// Every candidate was rejected.
    #[error("No suitable GPU found ({} candidates rejected)", .rejections.len())]
    NoSuitableDevice { rejections: Vec<(String, Rejection)> },

    /// A raw `VkPhysicalDeviceFeatures2` was chained while extension features
    /// were also negotiated.
    #[error("VkPhysicalDeviceFeatures2 in the pNext chain conflicts with negotiated extension features")]
    FeatureChainConflict,

    /// The requested queue kind does not exist on the device.
    #[error("No {0:?} queue available")]
    QueueUnavailable(QueueType),

    /// A custom queue description names a family the device does not have.
    #[error("Queue family index {index} out of range ({count} families)")]
    InvalidQueueFamilyIndex { index: u32, count: usize },

    /// A custom queue description asks for no queues.
    #[error("Queue family {0} requested with no queue priorities")]
    EmptyQueuePriorities(u32),

    /// Two custom queue descriptions name the same family.
    #[error("Queue family {0} described more than once")]
    DuplicateQueueFamily(u32),

    /// The surface reports no formats.
    #[error("Surface reports no formats")]
    NoSurfaceFormats,

    /// The required minimum image count is below the surface minimum.
    #[error("Required min image count {requested} is below surface minimum {minimum}")]
    RequiredMinImageCountTooLow { requested: u32, minimum: u32 },

    /// The requested image usage is not supported for the chosen present mode.
    #[error("Image usage {requested:?} not supported, surface allows {supported:?}")]
    RequiredUsageNotSupported {
        requested: vk::ImageUsageFlags,
        supported: vk::ImageUsageFlags,
    },

    /// A capability chain could not be assembled.
    #[error("Capability chain error: {0}")]
    Chain(#[from] ChainError),

    /// A string handed to the driver contained an interior nul byte.
    #[error("Invalid name {0:?}")]
    InvalidName(String),

    /// The driver rejected a call.
    #[error("{call} failed: {result}")]
    Vulkan {
        call: &'static str,
        result: vk::Result,
    },
}

impl BootError {
    /// The raw driver result, if this error came from the driver.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            Self::Vulkan { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, BootError>;

/// Attach the failing entry point to a raw driver result.
pub trait VkResultExt<T> {
    fn call(self, name: &'static str) -> Result<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, vk::Result> {
    fn call(self, name: &'static str) -> Result<T> {
        self.map_err(|result| BootError::Vulkan { call: name, result })
    }
}

/// Format a packed API version as `major.minor.patch`.
pub fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_name_the_failing_call() {
        let err = Err::<(), _>(vk::Result::ERROR_DEVICE_LOST)
            .call("vkCreateDevice")
            .unwrap_err();
        assert_eq!(err.vk_result(), Some(vk::Result::ERROR_DEVICE_LOST));
        assert!(err.to_string().starts_with("vkCreateDevice failed"));
    }

    #[test]
    fn version_errors_are_readable() {
        let err = BootError::ApiVersionUnavailable {
            required: vk::API_VERSION_1_3,
            available: vk::API_VERSION_1_1,
        };
        assert_eq!(err.to_string(), "Vulkan 1.3.0 required, loader provides 1.1.0");
        assert_eq!(err.vk_result(), None);
    }
}
