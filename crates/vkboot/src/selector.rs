//! Physical device selection.
//!
//! Every enumerated device is populated, scored against a
//! [`SelectionCriteria`] in a single ordered pass, and either rejected with one
//! [`Rejection`] or kept as a fully or partially suitable candidate.

use crate::error::{BootError, Result, VkResultExt};
use crate::instance::Instance;
use crate::physical_device::PhysicalDevice;
use crate::queue;
use ash::vk;
use std::fmt;
use vkboot_chain::{missing_core_features, CapabilityChain, CapabilityStruct};

const PORTABILITY_SUBSET: &str = "VK_KHR_portability_subset";

/// How well a device meets the criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suitability {
    Yes,
    /// Meets every requirement but is not the preferred device type.
    Partial,
    No,
}

/// Device type the caller would rather have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreferredDeviceType {
    Other,
    Integrated,
    #[default]
    Discrete,
    VirtualGpu,
    Cpu,
}

impl PreferredDeviceType {
    /// Whether `device_type` is this preference.
    pub fn matches(self, device_type: vk::PhysicalDeviceType) -> bool {
        let wanted = match self {
            Self::Other => vk::PhysicalDeviceType::OTHER,
            Self::Integrated => vk::PhysicalDeviceType::INTEGRATED_GPU,
            Self::Discrete => vk::PhysicalDeviceType::DISCRETE_GPU,
            Self::VirtualGpu => vk::PhysicalDeviceType::VIRTUAL_GPU,
            Self::Cpu => vk::PhysicalDeviceType::CPU,
        };
        wanted == device_type
    }
}

/// Why a device was rejected. Only the first failing check is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NameMismatch { wanted: String },
    ApiVersionTooLow { required: u32, available: u32 },
    NoDedicatedComputeQueue,
    NoDedicatedTransferQueue,
    NoSeparateComputeQueue,
    NoSeparateTransferQueue,
    NoPresentQueue,
    MissingExtensions(Vec<String>),
    NoSurfaceFormatsOrPresentModes,
    MissingFeatures(Vec<String>),
    InsufficientMemory {
        required: vk::DeviceSize,
        largest: vk::DeviceSize,
    },
    DeviceType {
        preferred: PreferredDeviceType,
        actual: vk::PhysicalDeviceType,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::error::version_string;

        match self {
            Self::NameMismatch { wanted } => write!(f, "name does not match {wanted:?}"),
            Self::ApiVersionTooLow {
                required,
                available,
            } => write!(
                f,
                "supports Vulkan {}, {} required",
                version_string(*available),
                version_string(*required)
            ),
            Self::NoDedicatedComputeQueue => f.write_str("no dedicated compute queue"),
            Self::NoDedicatedTransferQueue => f.write_str("no dedicated transfer queue"),
            Self::NoSeparateComputeQueue => f.write_str("no separate compute queue"),
            Self::NoSeparateTransferQueue => f.write_str("no separate transfer queue"),
            Self::NoPresentQueue => f.write_str("no queue family can present to the surface"),
            Self::MissingExtensions(names) => write!(f, "missing extensions: {}", names.join(", ")),
            Self::NoSurfaceFormatsOrPresentModes => {
                f.write_str("surface reports no formats or present modes")
            }
            Self::MissingFeatures(messages) => {
                write!(f, "missing features: {}", messages.join("; "))
            }
            Self::InsufficientMemory { required, largest } => write!(
                f,
                "largest device-local heap is {} MB, {} MB required",
                largest / (1024 * 1024),
                required / (1024 * 1024)
            ),
            Self::DeviceType { preferred, actual } => {
                write!(f, "device type {actual:?} is not {preferred:?}")
            }
        }
    }
}

/// Requirements a device is scored against.
#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    name: Option<String>,
    preferred_type: PreferredDeviceType,
    allow_any_type: bool,
    require_present: bool,
    defer_surface_initialization: bool,
    require_dedicated_compute_queue: bool,
    require_dedicated_transfer_queue: bool,
    require_separate_compute_queue: bool,
    require_separate_transfer_queue: bool,
    required_mem_size: vk::DeviceSize,
    required_extensions: Vec<String>,
    desired_extensions: Vec<String>,
    required_version: u32,
    required_features: vk::PhysicalDeviceFeatures,
    extension_features: CapabilityChain,
    enable_portability_subset: bool,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            name: None,
            preferred_type: PreferredDeviceType::Discrete,
            allow_any_type: true,
            require_present: true,
            defer_surface_initialization: false,
            require_dedicated_compute_queue: false,
            require_dedicated_transfer_queue: false,
            require_separate_compute_queue: false,
            require_separate_transfer_queue: false,
            required_mem_size: 0,
            required_extensions: Vec::new(),
            desired_extensions: Vec::new(),
            required_version: vk::API_VERSION_1_0,
            required_features: vk::PhysicalDeviceFeatures::default(),
            extension_features: CapabilityChain::new(),
            enable_portability_subset: true,
        }
    }
}

impl SelectionCriteria {
    /// Criteria with the defaults: discrete GPU preferred, presentation required.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept a device with exactly this name.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Device type that counts as fully suitable.
    pub fn prefer_device_type(mut self, device_type: PreferredDeviceType) -> Self {
        self.preferred_type = device_type;
        self
    }

    /// Whether a device of another type is acceptable as a partial match.
    pub fn allow_any_device_type(mut self, allow: bool) -> Self {
        self.allow_any_type = allow;
        self
    }

    /// Reject devices that cannot present to the surface.
    pub fn require_present(mut self, require: bool) -> Self {
        self.require_present = require;
        self
    }

    /// Skip presentation checks; the surface is bound after device creation.
    pub fn defer_surface_initialization(mut self) -> Self {
        self.defer_surface_initialization = true;
        self
    }

    /// Require a compute family without graphics or transfer.
    pub fn require_dedicated_compute_queue(mut self) -> Self {
        self.require_dedicated_compute_queue = true;
        self
    }

    /// Require a transfer family without graphics or compute.
    pub fn require_dedicated_transfer_queue(mut self) -> Self {
        self.require_dedicated_transfer_queue = true;
        self
    }

    /// Require a compute family without graphics.
    pub fn require_separate_compute_queue(mut self) -> Self {
        self.require_separate_compute_queue = true;
        self
    }

    /// Require a transfer family without graphics.
    pub fn require_separate_transfer_queue(mut self) -> Self {
        self.require_separate_transfer_queue = true;
        self
    }

    /// Require a device-local heap of at least `size` bytes.
    pub fn required_device_memory_size(mut self, size: vk::DeviceSize) -> Self {
        self.required_mem_size = size;
        self
    }

    /// Reject devices without this extension.
    pub fn add_required_extension(mut self, name: impl Into<String>) -> Self {
        self.required_extensions.push(name.into());
        self
    }

    /// Reject devices without any of these extensions.
    pub fn add_required_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_extensions
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Enable this extension when the chosen device has it.
    pub fn add_desired_extension(mut self, name: impl Into<String>) -> Self {
        self.desired_extensions.push(name.into());
        self
    }

    /// Enable these extensions when the chosen device has them.
    pub fn add_desired_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.desired_extensions
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Lowest device API version accepted.
    pub fn set_minimum_version(mut self, major: u32, minor: u32) -> Self {
        self.required_version = vk::make_api_version(0, major, minor, 0);
        self
    }

    /// Core 1.0 features the device must support.
    pub fn set_required_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.required_features = features;
        self
    }

    /// Extension features the device must support. Repeated kinds are merged.
    pub fn add_required_extension_features<T: CapabilityStruct>(mut self, features: T) -> Result<Self> {
        self.extension_features.add(features)?;
        Ok(self)
    }

    /// Enable `VK_KHR_portability_subset` on devices that expose it.
    pub fn enable_portability_subset(mut self, enable: bool) -> Self {
        self.enable_portability_subset = enable;
        self
    }

    /// Required extension features collected so far.
    pub fn extension_features(&self) -> &CapabilityChain {
        &self.extension_features
    }

    fn checks_presentation(&self) -> bool {
        self.require_present && !self.defer_surface_initialization
    }
}

/// Score one populated device.
///
/// Checks run in a fixed order and stop at the first failure, so a rejected
/// device carries exactly one reason.
pub fn evaluate(criteria: &SelectionCriteria, device: &PhysicalDevice) -> std::result::Result<Suitability, Rejection> {
    if let Some(wanted) = &criteria.name {
        if device.name != *wanted {
            return Err(Rejection::NameMismatch {
                wanted: wanted.clone(),
            });
        }
    }

    if device.properties.api_version < criteria.required_version {
        return Err(Rejection::ApiVersionTooLow {
            required: criteria.required_version,
            available: device.properties.api_version,
        });
    }

    if criteria.require_dedicated_compute_queue && !device.has_dedicated_compute_queue() {
        return Err(Rejection::NoDedicatedComputeQueue);
    }
    if criteria.require_dedicated_transfer_queue && !device.has_dedicated_transfer_queue() {
        return Err(Rejection::NoDedicatedTransferQueue);
    }
    if criteria.require_separate_compute_queue && !device.has_separate_compute_queue() {
        return Err(Rejection::NoSeparateComputeQueue);
    }
    if criteria.require_separate_transfer_queue && !device.has_separate_transfer_queue() {
        return Err(Rejection::NoSeparateTransferQueue);
    }

    if criteria.checks_presentation() && queue::present_queue_index(&device.queue_families).is_none() {
        return Err(Rejection::NoPresentQueue);
    }

    let missing: Vec<String> = criteria
        .required_extensions
        .iter()
        .filter(|ext| !device.is_extension_present(ext))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::MissingExtensions(missing));
    }

    if criteria.checks_presentation()
        && (device.surface_formats.is_empty() || device.present_modes.is_empty())
    {
        return Err(Rejection::NoSurfaceFormatsOrPresentModes);
    }

    let mut missing_features: Vec<String> =
        missing_core_features(&device.features, &criteria.required_features)
            .into_iter()
            .map(|field| format!("PhysicalDeviceFeatures.{field} is not supported"))
            .collect();
    if !criteria.extension_features.is_empty() {
        device
            .available_extension_features
            .match_all(&criteria.extension_features, &mut missing_features);
    }
    if !missing_features.is_empty() {
        return Err(Rejection::MissingFeatures(missing_features));
    }

    if criteria.required_mem_size > 0 {
        let largest = device.largest_device_local_heap();
        if largest < criteria.required_mem_size {
            return Err(Rejection::InsufficientMemory {
                required: criteria.required_mem_size,
                largest,
            });
        }
    }

    if criteria.preferred_type.matches(device.properties.device_type) {
        Ok(Suitability::Yes)
    } else if criteria.allow_any_type {
        Ok(Suitability::Partial)
    } else {
        Err(Rejection::DeviceType {
            preferred: criteria.preferred_type,
            actual: device.properties.device_type,
        })
    }
}

/// Record what the device builder should enable on a kept device.
fn apply_selection(criteria: &SelectionCriteria, device: &mut PhysicalDevice, suitability: Suitability) {
    device.suitability = suitability;
    device.defer_surface_initialization = criteria.defer_surface_initialization;
    for ext in &criteria.required_extensions {
        device.mark_for_enable(ext);
    }
    for ext in &criteria.desired_extensions {
        device.enable_extension_if_present(ext);
    }
    if criteria.enable_portability_subset {
        device.enable_extension_if_present(PORTABILITY_SUBSET);
    }
    device.enabled_features = criteria.required_features;
    device.enabled_extension_features = criteria.extension_features.clone();
}

/// Outcome of scoring a set of devices.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Fully suitable devices, then partially suitable ones, each in enumeration order.
    pub suitable: Vec<PhysicalDevice>,
    /// One entry per rejected device, in enumeration order.
    pub rejections: Vec<(String, Rejection)>,
}

/// Score every device and stably partition the survivors.
pub fn rank(criteria: &SelectionCriteria, devices: Vec<PhysicalDevice>) -> Ranking {
    let mut full = Vec::new();
    let mut partial = Vec::new();
    let mut rejections = Vec::new();

    for mut device in devices {
        match evaluate(criteria, &device) {
            Ok(suitability) => {
                tracing::debug!(device = %device.name, ?suitability, "device scored");
                apply_selection(criteria, &mut device, suitability);
                if suitability == Suitability::Yes {
                    full.push(device);
                } else {
                    partial.push(device);
                }
            }
            Err(rejection) => {
                tracing::debug!(device = %device.name, reason = %rejection, "device rejected");
                device.suitability = Suitability::No;
                rejections.push((device.name, rejection));
            }
        }
    }

    full.extend(partial);
    Ranking {
        suitable: full,
        rejections,
    }
}

/// Enumerates, populates and ranks the physical devices of an instance.
pub struct PhysicalDeviceSelector<'a> {
    instance: &'a Instance,
    surface: Option<vk::SurfaceKHR>,
    criteria: SelectionCriteria,
    unconditional: bool,
}

/// Default criteria for an instance; headless instances do not require presentation.
fn default_criteria(headless: bool) -> SelectionCriteria {
    SelectionCriteria::default().require_present(!headless)
}

impl<'a> PhysicalDeviceSelector<'a> {
    /// Create a selector with default criteria for `instance`.
    pub fn new(instance: &'a Instance) -> Self {
        Self {
            instance,
            surface: None,
            criteria: default_criteria(instance.is_headless()),
            unconditional: false,
        }
    }

    /// Surface presentation support is checked against.
    pub fn set_surface(mut self, surface: vk::SurfaceKHR) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Replace all criteria at once.
    pub fn criteria(mut self, criteria: SelectionCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    fn with(mut self, f: impl FnOnce(SelectionCriteria) -> SelectionCriteria) -> Self {
        self.criteria = f(self.criteria);
        self
    }

    /// See [`SelectionCriteria::set_name`].
    pub fn set_name(self, name: impl Into<String>) -> Self {
        self.with(|c| c.set_name(name))
    }

    /// See [`SelectionCriteria::prefer_device_type`].
    pub fn prefer_device_type(self, device_type: PreferredDeviceType) -> Self {
        self.with(|c| c.prefer_device_type(device_type))
    }

    /// See [`SelectionCriteria::allow_any_device_type`].
    pub fn allow_any_device_type(self, allow: bool) -> Self {
        self.with(|c| c.allow_any_device_type(allow))
    }

    /// See [`SelectionCriteria::require_present`].
    pub fn require_present(self, require: bool) -> Self {
        self.with(|c| c.require_present(require))
    }

    /// See [`SelectionCriteria::defer_surface_initialization`].
    pub fn defer_surface_initialization(self) -> Self {
        self.with(SelectionCriteria::defer_surface_initialization)
    }

    /// See [`SelectionCriteria::require_dedicated_compute_queue`].
    pub fn require_dedicated_compute_queue(self) -> Self {
        self.with(SelectionCriteria::require_dedicated_compute_queue)
    }

    /// See [`SelectionCriteria::require_dedicated_transfer_queue`].
    pub fn require_dedicated_transfer_queue(self) -> Self {
        self.with(SelectionCriteria::require_dedicated_transfer_queue)
    }

    /// See [`SelectionCriteria::require_separate_compute_queue`].
    pub fn require_separate_compute_queue(self) -> Self {
        self.with(SelectionCriteria::require_separate_compute_queue)
    }

    /// See [`SelectionCriteria::require_separate_transfer_queue`].
    pub fn require_separate_transfer_queue(self) -> Self {
        self.with(SelectionCriteria::require_separate_transfer_queue)
    }

    /// See [`SelectionCriteria::required_device_memory_size`].
    pub fn required_device_memory_size(self, size: vk::DeviceSize) -> Self {
        self.with(|c| c.required_device_memory_size(size))
    }

    /// See [`SelectionCriteria::add_required_extension`].
    pub fn add_required_extension(self, name: impl Into<String>) -> Self {
        self.with(|c| c.add_required_extension(name))
    }

    /// See [`SelectionCriteria::add_desired_extension`].
    pub fn add_desired_extension(self, name: impl Into<String>) -> Self {
        self.with(|c| c.add_desired_extension(name))
    }

    /// See [`SelectionCriteria::set_minimum_version`].
    pub fn set_minimum_version(self, major: u32, minor: u32) -> Self {
        self.with(|c| c.set_minimum_version(major, minor))
    }

    /// See [`SelectionCriteria::set_required_features`].
    pub fn set_required_features(self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.with(|c| c.set_required_features(features))
    }

    /// See [`SelectionCriteria::add_required_extension_features`].
    pub fn add_required_extension_features<T: CapabilityStruct>(mut self, features: T) -> Result<Self> {
        self.criteria = self.criteria.add_required_extension_features(features)?;
        Ok(self)
    }

    /// Return the first enumerated device without scoring it.
    pub fn select_first_device_unconditionally(mut self, enable: bool) -> Self {
        self.unconditional = enable;
        self
    }

    /// Every acceptable device, fully suitable ones first.
    pub fn select_devices(&self) -> Result<Vec<PhysicalDevice>> {
        let ranking = self.rank_devices()?;
        if ranking.suitable.is_empty() {
            return Err(BootError::NoSuitableDevice {
                rejections: ranking.rejections,
            });
        }
        Ok(ranking.suitable)
    }

    /// The best acceptable device.
    pub fn select(&self) -> Result<PhysicalDevice> {
        let mut devices = self.select_devices()?;
        let device = devices.remove(0);
        tracing::info!(
            device = %device.name,
            device_type = ?device.properties.device_type,
            suitability = ?device.suitability,
            "Selected GPU"
        );
        Ok(device)
    }

    /// Names of every acceptable device, in selection order.
    pub fn select_device_names(&self) -> Result<Vec<String>> {
        Ok(self
            .select_devices()?
            .into_iter()
            .map(|d| d.name)
            .collect())
    }

    /// Score every device and keep both the survivors and the rejections.
    pub fn rank_devices(&self) -> Result<Ranking> {
        if self.criteria.checks_presentation() && self.surface.is_none() {
            return Err(BootError::NoSurfaceProvided);
        }

        // SAFETY: the instance is alive for the selector's lifetime.
        let handles = unsafe { self.instance.raw().enumerate_physical_devices() }
            .call("vkEnumeratePhysicalDevices")?;
        if handles.is_empty() {
            return Err(BootError::NoPhysicalDevicesFound);
        }

        if self.unconditional {
            let mut device = PhysicalDevice::populate(
                self.instance,
                handles[0],
                self.surface,
                &self.criteria.extension_features,
            )?;
            apply_selection(&self.criteria, &mut device, Suitability::Yes);
            return Ok(Ranking {
                suitable: vec![device],
                rejections: Vec::new(),
            });
        }

        let devices = handles
            .iter()
            .map(|&handle| {
                PhysicalDevice::populate(
                    self.instance,
                    handle,
                    self.surface,
                    &self.criteria.extension_features,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rank(&self.criteria, devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical_device::{test_device, MemoryHeap};

    fn typed(name: &str, device_type: vk::PhysicalDeviceType) -> PhysicalDevice {
        let mut device = test_device(name);
        device.properties.device_type = device_type;
        device
    }

    fn headless() -> SelectionCriteria {
        SelectionCriteria::new().require_present(false)
    }

    fn names(devices: &[PhysicalDevice]) -> Vec<&str> {
        devices.iter().map(PhysicalDevice::name).collect()
    }

    #[test]
    fn partition_is_stable_and_full_matches_first() {
        let devices = vec![
            typed("integrated-a", vk::PhysicalDeviceType::INTEGRATED_GPU),
            typed("discrete-a", vk::PhysicalDeviceType::DISCRETE_GPU),
            typed("integrated-b", vk::PhysicalDeviceType::INTEGRATED_GPU),
            typed("discrete-b", vk::PhysicalDeviceType::DISCRETE_GPU),
        ];
        let ranking = rank(&headless(), devices);
        assert_eq!(
            names(&ranking.suitable),
            ["discrete-a", "discrete-b", "integrated-a", "integrated-b"]
        );
        assert_eq!(ranking.suitable[0].suitability(), Suitability::Yes);
        assert_eq!(ranking.suitable[2].suitability(), Suitability::Partial);
        assert!(ranking.rejections.is_empty());
    }

    #[test]
    fn ranking_is_idempotent() {
        let devices = vec![
            typed("cpu", vk::PhysicalDeviceType::CPU),
            typed("gpu", vk::PhysicalDeviceType::DISCRETE_GPU),
        ];
        let criteria = headless();
        let first = rank(&criteria, devices.clone());
        let second = rank(&criteria, devices);
        assert_eq!(names(&first.suitable), names(&second.suitable));
    }

    #[test]
    fn wrong_type_is_rejected_when_any_type_is_disallowed() {
        let criteria = headless().allow_any_device_type(false);
        let ranking = rank(
            &criteria,
            vec![typed("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU)],
        );
        assert!(ranking.suitable.is_empty());
        assert!(matches!(
            ranking.rejections.as_slice(),
            [(_, Rejection::DeviceType { .. })]
        ));
    }

    #[test]
    fn each_rejected_device_has_one_reason() {
        let mut old = test_device("old");
        old.properties.api_version = vk::API_VERSION_1_0;
        old.memory_heaps.clear();
        let small = {
            let mut d = test_device("small");
            d.memory_heaps = vec![MemoryHeap {
                size: 1 << 30,
                device_local: true,
            }];
            d
        };

        let criteria = headless()
            .set_minimum_version(1, 2)
            .required_device_memory_size(4 << 30);
        let ranking = rank(&criteria, vec![old, small, test_device("big")]);

        assert_eq!(names(&ranking.suitable), ["big"]);
        assert_eq!(ranking.rejections.len(), 2);
        assert!(matches!(
            ranking.rejections[0],
            (ref name, Rejection::ApiVersionTooLow { .. }) if name == "old"
        ));
        assert!(matches!(
            ranking.rejections[1],
            (ref name, Rejection::InsufficientMemory { largest, .. }) if name == "small" && largest == 1 << 30
        ));
    }

    #[test]
    fn missing_extensions_are_listed() {
        let criteria = headless()
            .add_required_extension("VK_KHR_swapchain")
            .add_required_extension("VK_EXT_mesh_shader")
            .add_required_extension("VK_KHR_ray_query");
        let verdict = evaluate(&criteria, &test_device("gpu"));
        assert_eq!(
            verdict,
            Err(Rejection::MissingExtensions(vec![
                "VK_EXT_mesh_shader".to_string(),
                "VK_KHR_ray_query".to_string()
            ]))
        );
    }

    #[test]
    fn presentation_checks_respect_deferral() {
        let mut device = test_device("gpu");
        device.queue_families[0].supports_present = false;

        let criteria = SelectionCriteria::new();
        assert_eq!(evaluate(&criteria, &device), Err(Rejection::NoPresentQueue));

        let deferred = SelectionCriteria::new().defer_surface_initialization();
        assert_eq!(evaluate(&deferred, &device), Ok(Suitability::Yes));

        device.queue_families[0].supports_present = true;
        device.present_modes.clear();
        assert_eq!(
            evaluate(&criteria, &device),
            Err(Rejection::NoSurfaceFormatsOrPresentModes)
        );
    }

    #[test]
    fn queue_requirements_reject_in_order() {
        let criteria = headless()
            .require_dedicated_compute_queue()
            .require_separate_transfer_queue();
        assert_eq!(
            evaluate(&criteria, &test_device("gpu")),
            Err(Rejection::NoDedicatedComputeQueue)
        );
    }

    #[test]
    fn core_features_are_checked() {
        let criteria = headless().set_required_features(
            vk::PhysicalDeviceFeatures::default().geometry_shader(true),
        );
        let mut device = test_device("gpu");
        assert_eq!(
            evaluate(&criteria, &device),
            Err(Rejection::MissingFeatures(vec![
                "PhysicalDeviceFeatures.geometry_shader is not supported".to_string()
            ]))
        );

        device.features.geometry_shader = vk::TRUE;
        assert_eq!(evaluate(&criteria, &device), Ok(Suitability::Yes));
    }

    #[test]
    fn extension_features_must_be_available() {
        let criteria = headless()
            .add_required_extension_features(
                vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true),
            )
            .unwrap();

        let mut device = test_device("gpu");
        let verdict = evaluate(&criteria, &device);
        assert!(matches!(verdict, Err(Rejection::MissingFeatures(_))));

        device
            .available_extension_features
            .add(
                vk::PhysicalDeviceVulkan13Features::default()
                    .dynamic_rendering(true)
                    .synchronization2(true),
            )
            .unwrap();
        assert_eq!(evaluate(&criteria, &device), Ok(Suitability::Yes));
    }

    #[test]
    fn kept_devices_carry_what_to_enable() {
        let mut device = test_device("gpu");
        device.available_extensions = vec![
            "VK_EXT_memory_budget".to_string(),
            PORTABILITY_SUBSET.to_string(),
            "VK_KHR_swapchain".to_string(),
        ];
        let criteria = headless()
            .add_required_extension("VK_KHR_swapchain")
            .add_desired_extension("VK_EXT_memory_budget")
            .add_desired_extension("VK_EXT_not_there");

        let ranking = rank(&criteria, vec![device]);
        assert_eq!(
            ranking.suitable[0].extensions_to_enable(),
            [
                "VK_EXT_memory_budget".to_string(),
                PORTABILITY_SUBSET.to_string(),
                "VK_KHR_swapchain".to_string()
            ]
        );
    }

    #[test]
    fn headless_defaults_skip_presentation() {
        let mut device = test_device("gpu");
        device.queue_families[0].supports_present = false;
        device.surface_formats.clear();

        let criteria = default_criteria(true);
        assert!(!criteria.checks_presentation());
        assert_eq!(evaluate(&criteria, &device), Ok(Suitability::Yes));

        let windowed = default_criteria(false);
        assert!(windowed.checks_presentation());
        assert_eq!(evaluate(&windowed, &device), Err(Rejection::NoPresentQueue));
    }

    #[test]
    fn ranking_keeps_rejections_next_to_survivors() {
        let mut old = test_device("old");
        old.properties.api_version = vk::API_VERSION_1_0;
        let criteria = headless().set_minimum_version(1, 1);

        let ranking = rank(
            &criteria,
            vec![
                old,
                typed("igpu", vk::PhysicalDeviceType::INTEGRATED_GPU),
                test_device("dgpu"),
            ],
        );
        assert_eq!(names(&ranking.suitable), ["dgpu", "igpu"]);
        assert_eq!(ranking.rejections.len(), 1);
        assert_eq!(ranking.rejections[0].0, "old");
        assert!(ranking.rejections[0]
            .1
            .to_string()
            .starts_with("supports Vulkan 1.0.0"));
    }

    #[test]
    fn rejections_are_readable() {
        let rejection = Rejection::MissingExtensions(vec!["VK_KHR_a".into(), "VK_KHR_b".into()]);
        assert_eq!(rejection.to_string(), "missing extensions: VK_KHR_a, VK_KHR_b");
    }
}
