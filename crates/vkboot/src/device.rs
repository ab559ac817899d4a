//! Logical device creation.

use crate::error::{BootError, Result, VkResultExt};
use crate::instance::Instance;
use crate::physical_device::PhysicalDevice;
use crate::queue::{QueueFamily, QueueTable, QueueType};
use ash::vk;
use std::ffi::{c_char, CString};
use vkboot_chain::{CapabilityChain, CapabilityStruct};

const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Queues to create from one family.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomQueueDescription {
    pub index: u32,
    pub priorities: Vec<f32>,
}

impl CustomQueueDescription {
    /// One queue per entry in `priorities`.
    pub fn new(index: u32, priorities: Vec<f32>) -> Self {
        Self { index, priorities }
    }
}

/// Builder for a logical [`Device`] on a selected [`PhysicalDevice`].
pub struct DeviceBuilder {
    physical_device: PhysicalDevice,
    queue_descriptions: Vec<CustomQueueDescription>,
    p_next: CapabilityChain,
}

impl DeviceBuilder {
    /// Start with one queue per family and no extra `pNext` structures.
    pub fn new(physical_device: PhysicalDevice) -> Self {
        Self {
            physical_device,
            queue_descriptions: Vec::new(),
            p_next: CapabilityChain::unrooted(),
        }
    }

    /// Replace the default of one queue per family.
    pub fn custom_queue_setup(mut self, descriptions: Vec<CustomQueueDescription>) -> Self {
        self.queue_descriptions = descriptions;
        self
    }

    /// Chain an extra structure into `VkDeviceCreateInfo`.
    pub fn add_p_next<T: CapabilityStruct>(mut self, structure: T) -> Result<Self> {
        self.p_next.add(structure)?;
        Ok(self)
    }

    /// Every custom family must exist, appear once and request at least one queue.
    fn queue_plan(&self) -> Result<Vec<CustomQueueDescription>> {
        let families = &self.physical_device.queue_families;
        if self.queue_descriptions.is_empty() {
            return Ok(families
                .iter()
                .map(|f| CustomQueueDescription::new(f.index, vec![1.0]))
                .collect());
        }

        for (i, desc) in self.queue_descriptions.iter().enumerate() {
            if desc.index as usize >= families.len() {
                return Err(BootError::InvalidQueueFamilyIndex {
                    index: desc.index,
                    count: families.len(),
                });
            }
            if desc.priorities.is_empty() {
                return Err(BootError::EmptyQueuePriorities(desc.index));
            }
            // vkCreateDevice forbids two create infos for one family.
            if self.queue_descriptions[..i]
                .iter()
                .any(|earlier| earlier.index == desc.index)
            {
                return Err(BootError::DuplicateQueueFamily(desc.index));
            }
        }
        Ok(self.queue_descriptions.clone())
    }

    fn extension_plan(&self) -> Vec<String> {
        let mut extensions = self.physical_device.extensions_to_enable.clone();
        let wants_swapchain = self.physical_device.surface.is_some()
            || self.physical_device.defer_surface_initialization;
        if wants_swapchain && !extensions.iter().any(|e| e == SWAPCHAIN_EXTENSION) {
            extensions.push(SWAPCHAIN_EXTENSION.to_string());
        }
        extensions
    }

    fn check_feature_chain(&self) -> Result<()> {
        if self.p_next.contains(vk::StructureType::PHYSICAL_DEVICE_FEATURES_2)
            && !self.physical_device.enabled_extension_features.is_empty()
        {
            return Err(BootError::FeatureChainConflict);
        }
        Ok(())
    }

    /// Create the device.
    pub fn build(self, instance: &Instance) -> Result<Device> {
        self.check_feature_chain()?;
        let queues = self.queue_plan()?;
        let extensions = self.extension_plan();

        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queues
            .iter()
            .map(|desc| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(desc.index)
                    .queue_priorities(&desc.priorities)
            })
            .collect();

        let extension_names = extensions
            .iter()
            .map(|e| CString::new(e.as_str()).map_err(|_| BootError::InvalidName(e.clone())))
            .collect::<Result<Vec<_>>>()?;
        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();

        let pd = &self.physical_device;
        let raw_features2 = self.p_next.contains(vk::StructureType::PHYSICAL_DEVICE_FEATURES_2);
        let use_features2 = !raw_features2
            && (!pd.enabled_extension_features.is_empty()
                || instance.api_version() >= vk::API_VERSION_1_1);

        let mut combined = CapabilityChain::unrooted();
        combined.merge(&pd.enabled_extension_features)?;
        combined.merge(&self.p_next)?;

        let core_features = pd.enabled_features;
        let mut features2 = vk::PhysicalDeviceFeatures2::default().features(core_features);

        let linked = if combined.is_empty() {
            None
        } else {
            Some(combined.link()?)
        };

        let mut create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs);

        if use_features2 {
            if let Some(linked) = &linked {
                linked.attach(&mut features2);
            }
            create_info = create_info.push_next(&mut features2);
        } else {
            if let Some(linked) = &linked {
                create_info.p_next = linked.head().cast_const();
            }
            if !raw_features2 {
                create_info = create_info.enabled_features(&core_features);
            }
        }

        // SAFETY: every pointer reachable from create_info lives until the call returns.
        let device = unsafe { instance.raw().create_device(pd.handle, &create_info, None) }
            .call("vkCreateDevice")?;
        drop(linked);

        // Only families that received queues can be looked up.
        let created: Vec<QueueFamily> = pd
            .queue_families
            .iter()
            .filter(|f| queues.iter().any(|q| q.index == f.index))
            .copied()
            .collect();
        let queue_table = QueueTable::resolve(&created);
        tracing::info!(
            device = %pd.name,
            extensions = ?extensions,
            queues = queues.len(),
            "Created logical device"
        );

        Ok(Device {
            device,
            surface: pd.surface,
            queue_families: pd.queue_families.clone(),
            queue_table,
            instance_version: instance.api_version(),
            enabled_extensions: extensions,
            physical_device: self.physical_device,
        })
    }
}

/// A logical device and the queue layout it was created with.
pub struct Device {
    device: ash::Device,
    physical_device: PhysicalDevice,
    surface: Option<vk::SurfaceKHR>,
    queue_families: Vec<QueueFamily>,
    queue_table: QueueTable,
    instance_version: u32,
    enabled_extensions: Vec<String>,
}

impl Device {
    /// The device-level function table.
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    /// Get the raw device handle.
    pub fn handle(&self) -> vk::Device {
        self.device.handle()
    }

    /// Physical device the device was created on.
    pub fn physical_device(&self) -> &PhysicalDevice {
        &self.physical_device
    }

    /// Surface the device was selected for.
    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    /// Every family of the physical device.
    pub fn queue_families(&self) -> &[QueueFamily] {
        &self.queue_families
    }

    /// Resolved family indices over the families that received queues.
    pub fn queue_table(&self) -> &QueueTable {
        &self.queue_table
    }

    /// API version of the owning instance.
    pub fn instance_version(&self) -> u32 {
        self.instance_version
    }

    /// Device extensions that were enabled.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// Family index for `kind`.
    pub fn get_queue_index(&self, kind: QueueType) -> Result<u32> {
        self.queue_table
            .index(kind)
            .ok_or(BootError::QueueUnavailable(kind))
    }

    /// Index of a family used only for `kind`. Only compute and transfer have one.
    pub fn get_dedicated_queue_index(&self, kind: QueueType) -> Result<u32> {
        self.queue_table
            .dedicated_index(kind)
            .ok_or(BootError::QueueUnavailable(kind))
    }

    /// First queue of the family for `kind`.
    pub fn get_queue(&self, kind: QueueType) -> Result<vk::Queue> {
        let index = self.get_queue_index(kind)?;
        // SAFETY: every family gets at least one queue at creation.
        Ok(unsafe { self.device.get_device_queue(index, 0) })
    }

    /// First queue of the dedicated family for `kind`.
    pub fn get_dedicated_queue(&self, kind: QueueType) -> Result<vk::Queue> {
        let index = self.get_dedicated_queue_index(kind)?;
        // SAFETY: as in get_queue.
        Ok(unsafe { self.device.get_device_queue(index, 0) })
    }

    /// Wait for the device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        // SAFETY: the device is alive.
        unsafe { self.device.device_wait_idle() }.call("vkDeviceWaitIdle")
    }

    /// Destroy the device.
    ///
    /// # Safety
    /// Every object created from this device must already be destroyed.
    pub unsafe fn destroy(&self) {
        self.device.destroy_device(None);
    }
}
