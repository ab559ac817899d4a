//! Vulkan bootstrap and capability negotiation.
//!
//! This crate provides:
//! - Loader and instance-level capability queries
//! - Instance creation with validation and debug messenger setup
//! - Physical device scoring and selection
//! - Logical device creation with negotiated feature chains
//! - Swapchain negotiation against surface capabilities

pub mod command;
pub mod device;
pub mod error;
pub mod instance;
pub mod loader;
pub mod physical_device;
pub mod queue;
pub mod selector;
pub mod surface;
pub mod swapchain;
pub mod system_info;

pub use command::{
    begin_single_time_commands, end_single_time_commands, execute_single_time_commands,
    CommandPool,
};
pub use device::{CustomQueueDescription, Device, DeviceBuilder};
pub use error::{version_string, BootError, Result, VkResultExt};
pub use instance::{DebugCallback, Instance, InstanceBuilder, InstancePlan};
pub use loader::VulkanLoader;
pub use physical_device::{DeviceProperties, MemoryHeap, PhysicalDevice};
pub use queue::{QueueFamily, QueueTable, QueueType};
pub use selector::{
    PhysicalDeviceSelector, PreferredDeviceType, Ranking, Rejection, SelectionCriteria,
    Suitability,
};
pub use surface::{Surface, SurfaceSupport};
pub use swapchain::{Swapchain, SwapchainBuilder, SwapchainOptions, SwapchainPlan};
pub use system_info::{SystemInfo, VALIDATION_LAYER_NAME};

pub use ash;
pub use vkboot_chain::{CapabilityChain, CapabilityStruct};
