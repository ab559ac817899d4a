//! Physical device discovery.

use crate::error::{Result, VkResultExt};
use crate::instance::Instance;
use crate::queue::{self, QueueFamily, QueueType};
use crate::selector::Suitability;
use ash::vk;
use vkboot_chain::{CapabilityChain, CapabilityStruct};

/// Properties the selector reads from a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProperties {
    pub api_version: u32,
    pub driver_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
}

/// A memory heap reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHeap {
    pub size: vk::DeviceSize,
    pub device_local: bool,
}

/// A physical device with everything the selector needs to score it.
///
/// Holds no native resources. After selection it also carries what the
/// device builder should enable.
#[derive(Debug, Clone)]
pub struct PhysicalDevice {
    pub(crate) name: String,
    pub(crate) handle: vk::PhysicalDevice,
    pub(crate) properties: DeviceProperties,
    pub(crate) features: vk::PhysicalDeviceFeatures,
    pub(crate) queue_families: Vec<QueueFamily>,
    pub(crate) memory_heaps: Vec<MemoryHeap>,
    pub(crate) available_extensions: Vec<String>,
    pub(crate) extensions_to_enable: Vec<String>,
    pub(crate) available_extension_features: CapabilityChain,
    pub(crate) enabled_features: vk::PhysicalDeviceFeatures,
    pub(crate) enabled_extension_features: CapabilityChain,
    pub(crate) surface: Option<vk::SurfaceKHR>,
    pub(crate) defer_surface_initialization: bool,
    pub(crate) surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub(crate) present_modes: Vec<vk::PresentModeKHR>,
    pub(crate) suitability: Suitability,
}

impl PhysicalDevice {
    /// Query everything about `handle` the selector scores.
    ///
    /// Extension features are only queried for the kinds in `feature_template`,
    /// and only when the instance can call `vkGetPhysicalDeviceFeatures2`.
    pub(crate) fn populate(
        instance: &Instance,
        handle: vk::PhysicalDevice,
        surface: Option<vk::SurfaceKHR>,
        feature_template: &CapabilityChain,
    ) -> Result<Self> {
        let raw = instance.raw();

        // SAFETY: handle was enumerated from this instance.
        let properties = unsafe { raw.get_physical_device_properties(handle) };
        let features = unsafe { raw.get_physical_device_features(handle) };
        let memory = unsafe { raw.get_physical_device_memory_properties(handle) };
        let family_properties =
            unsafe { raw.get_physical_device_queue_family_properties(handle) };
        let extensions = unsafe { raw.enumerate_device_extension_properties(handle) }
            .call("vkEnumerateDeviceExtensionProperties")?;

        let name = properties
            .device_name_as_c_str()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let surface_loader = instance.surface_loader();
        let queue_families = family_properties
            .iter()
            .enumerate()
            .map(|(index, family)| {
                let index = index as u32;
                let supports_present = match (surface, surface_loader) {
                    (Some(surface), Some(loader)) => {
                        // SAFETY: surface and device belong to this instance.
                        unsafe {
                            loader.get_physical_device_surface_support(handle, index, surface)
                        }
                        .unwrap_or_else(|e| {
                            tracing::debug!(device = %name, index, "surface support query failed: {e}");
                            false
                        })
                    }
                    _ => false,
                };
                QueueFamily {
                    index,
                    flags: family.queue_flags,
                    queue_count: family.queue_count,
                    supports_present,
                }
            })
            .collect();

        let memory_heaps = memory.memory_heaps[..memory.memory_heap_count as usize]
            .iter()
            .map(|heap| MemoryHeap {
                size: heap.size,
                device_local: heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL),
            })
            .collect();

        let mut available_extensions: Vec<String> = extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        available_extensions.sort();
        available_extensions.dedup();

        let (surface_formats, present_modes) = match (surface, surface_loader) {
            (Some(surface), Some(loader)) => {
                // SAFETY: surface and device belong to this instance.
                let formats = unsafe { loader.get_physical_device_surface_formats(handle, surface) }
                    .unwrap_or_else(|e| {
                        tracing::debug!(device = %name, "surface format query failed: {e}");
                        Vec::new()
                    });
                let modes =
                    unsafe { loader.get_physical_device_surface_present_modes(handle, surface) }
                        .unwrap_or_else(|e| {
                            tracing::debug!(device = %name, "present mode query failed: {e}");
                            Vec::new()
                        });
                (formats, modes)
            }
            _ => (Vec::new(), Vec::new()),
        };

        let available_extension_features = if feature_template.is_empty() {
            CapabilityChain::new()
        } else {
            query_extension_features(instance, handle, feature_template)?
        };

        Ok(Self {
            name,
            handle,
            properties: DeviceProperties {
                api_version: properties.api_version,
                driver_version: properties.driver_version,
                vendor_id: properties.vendor_id,
                device_id: properties.device_id,
                device_type: properties.device_type,
            },
            features,
            queue_families,
            memory_heaps,
            available_extensions,
            extensions_to_enable: Vec::new(),
            available_extension_features,
            enabled_features: vk::PhysicalDeviceFeatures::default(),
            enabled_extension_features: CapabilityChain::new(),
            surface,
            defer_surface_initialization: false,
            surface_formats,
            present_modes,
            suitability: Suitability::No,
        })
    }

    /// Device name as reported by the driver.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the raw physical device handle.
    pub fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    /// Properties captured at enumeration.
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Core 1.0 features the device supports.
    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    /// Core 1.0 features the device builder will enable.
    pub fn enabled_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.enabled_features
    }

    /// Extension features the device builder will enable.
    pub fn enabled_extension_features(&self) -> &CapabilityChain {
        &self.enabled_extension_features
    }

    /// Queue families, with present support when a surface was given.
    pub fn queue_families(&self) -> &[QueueFamily] {
        &self.queue_families
    }

    /// Memory heaps.
    pub fn memory_heaps(&self) -> &[MemoryHeap] {
        &self.memory_heaps
    }

    /// Every extension the device reports, sorted.
    pub fn available_extensions(&self) -> &[String] {
        &self.available_extensions
    }

    /// Extensions the device builder will enable, sorted.
    pub fn extensions_to_enable(&self) -> &[String] {
        &self.extensions_to_enable
    }

    /// Surface the device was scored against.
    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    /// Whether presentation checks were skipped.
    pub fn defer_surface_initialization(&self) -> bool {
        self.defer_surface_initialization
    }

    /// Formats the surface supports on this device.
    pub fn surface_formats(&self) -> &[vk::SurfaceFormatKHR] {
        &self.surface_formats
    }

    /// Present modes the surface supports on this device.
    pub fn present_modes(&self) -> &[vk::PresentModeKHR] {
        &self.present_modes
    }

    /// Verdict from the last scoring pass.
    pub fn suitability(&self) -> Suitability {
        self.suitability
    }

    /// Whether the device reports extension `name`.
    pub fn is_extension_present(&self, name: &str) -> bool {
        self.available_extensions
            .binary_search_by(|e| e.as_str().cmp(name))
            .is_ok()
    }

    /// Enable `name` if the device supports it.
    pub fn enable_extension_if_present(&mut self, name: &str) -> bool {
        if !self.is_extension_present(name) {
            return false;
        }
        self.mark_for_enable(name);
        true
    }

    /// Enable every name in `names`, or none of them if any is missing.
    pub fn enable_extensions_if_present<S: AsRef<str>>(&mut self, names: &[S]) -> bool {
        if !names.iter().all(|n| self.is_extension_present(n.as_ref())) {
            return false;
        }
        for name in names {
            self.mark_for_enable(name.as_ref());
        }
        true
    }

    /// Enable the set bits of `features` if the device supports all of them.
    pub fn enable_extension_features_if_present<T: CapabilityStruct>(
        &mut self,
        instance: &Instance,
        features: T,
    ) -> bool {
        let mut requested = CapabilityChain::new();
        if let Err(e) = requested.add(features) {
            tracing::warn!("cannot request extension features: {e}");
            return false;
        }
        if !instance.supports_features2() {
            return false;
        }
        let available = match query_extension_features(instance, self.handle, &requested) {
            Ok(available) => available,
            Err(e) => {
                tracing::debug!(device = %self.name, "extension feature query failed: {e}");
                return false;
            }
        };

        let mut missing = Vec::new();
        available.match_all(&requested, &mut missing);
        if !missing.is_empty() {
            tracing::debug!(device = %self.name, ?missing, "extension features not present");
            return false;
        }

        self.available_extension_features.merge(&available).is_ok()
            && self.enabled_extension_features.merge(&requested).is_ok()
    }

    /// Whether a compute family without graphics or transfer exists.
    pub fn has_dedicated_compute_queue(&self) -> bool {
        queue::dedicated_index(&self.queue_families, QueueType::Compute).is_some()
    }

    /// Whether a transfer family without graphics or compute exists.
    pub fn has_dedicated_transfer_queue(&self) -> bool {
        queue::dedicated_index(&self.queue_families, QueueType::Transfer).is_some()
    }

    /// Whether a compute family without graphics exists.
    pub fn has_separate_compute_queue(&self) -> bool {
        queue::queue_index(&self.queue_families, QueueType::Compute).is_some()
    }

    /// Whether a transfer family without graphics exists.
    pub fn has_separate_transfer_queue(&self) -> bool {
        queue::queue_index(&self.queue_families, QueueType::Transfer).is_some()
    }

    /// Whether any family can present.
    pub fn has_present_queue(&self) -> bool {
        queue::present_queue_index(&self.queue_families).is_some()
    }

    /// Largest device-local heap, or 0 if none.
    pub fn largest_device_local_heap(&self) -> vk::DeviceSize {
        self.memory_heaps
            .iter()
            .filter(|h| h.device_local)
            .map(|h| h.size)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn mark_for_enable(&mut self, name: &str) {
        if let Err(pos) = self
            .extensions_to_enable
            .binary_search_by(|e| e.as_str().cmp(name))
        {
            self.extensions_to_enable.insert(pos, name.to_string());
        }
    }
}

/// Ask the driver which bits of the kinds in `template` the device supports.
pub(crate) fn query_extension_features(
    instance: &Instance,
    handle: vk::PhysicalDevice,
    template: &CapabilityChain,
) -> Result<CapabilityChain> {
    if !instance.supports_features2() {
        return Ok(CapabilityChain::new());
    }

    let mut chain = template.zeroed_like();
    let mut features2 = vk::PhysicalDeviceFeatures2::default();
    {
        let linked = chain.link()?;
        linked.attach(&mut features2);
        tracing::trace!(nodes = linked.len(), "querying extension features");

        // SAFETY: features2 heads a chain of zeroed, correctly tagged output
        // structures that stays borrowed until `linked` is dropped.
        unsafe {
            if instance.api_version() >= vk::API_VERSION_1_1 {
                instance
                    .raw()
                    .get_physical_device_features2(handle, &mut features2);
            } else {
                ash::khr::get_physical_device_properties2::Instance::new(
                    instance.loader().entry(),
                    instance.raw(),
                )
                .get_physical_device_features2(handle, &mut features2);
            }
        }
    }
    Ok(chain)
}

#[cfg(test)]
pub(crate) fn test_device(name: &str) -> PhysicalDevice {
    use crate::queue::family;

    PhysicalDevice {
        name: name.to_string(),
        handle: vk::PhysicalDevice::null(),
        properties: DeviceProperties {
            api_version: vk::API_VERSION_1_3,
            driver_version: 1,
            vendor_id: 0x10de,
            device_id: 1,
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
        },
        features: vk::PhysicalDeviceFeatures::default(),
        queue_families: vec![family(
            0,
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            true,
        )],
        memory_heaps: vec![MemoryHeap {
            size: 8 << 30,
            device_local: true,
        }],
        available_extensions: vec!["VK_KHR_swapchain".to_string()],
        extensions_to_enable: Vec::new(),
        available_extension_features: CapabilityChain::new(),
        enabled_features: vk::PhysicalDeviceFeatures::default(),
        enabled_extension_features: CapabilityChain::new(),
        surface: None,
        defer_surface_initialization: false,
        surface_formats: vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }],
        present_modes: vec![vk::PresentModeKHR::FIFO],
        suitability: Suitability::No,
    }
}
