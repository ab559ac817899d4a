//! Vulkan instance creation.

use crate::error::{BootError, Result, VkResultExt};
use crate::loader::VulkanLoader;
use crate::system_info::{SystemInfo, VALIDATION_LAYER_NAME};
use ash::vk;
use raw_window_handle::HasDisplayHandle;
use std::ffi::{c_char, c_void, CStr, CString};

/// Debug messenger callback signature.
pub type DebugCallback = vk::PFN_vkDebugUtilsMessengerCallbackEXT;

/// Surface extensions for every windowing system this platform may use.
fn platform_surface_extensions() -> Vec<&'static CStr> {
    vec![
        #[cfg(target_os = "windows")]
        ash::khr::win32_surface::NAME,
        #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
        ash::khr::xlib_surface::NAME,
        #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
        ash::khr::xcb_surface::NAME,
        #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
        ash::khr::wayland_surface::NAME,
        #[cfg(target_os = "android")]
        ash::khr::android_surface::NAME,
        #[cfg(any(target_os = "macos", target_os = "ios"))]
        ash::ext::metal_surface::NAME,
    ]
}

fn name_of(ext: &CStr) -> String {
    ext.to_string_lossy().into_owned()
}

/// Forwards validation messages to `tracing`.
unsafe extern "system" fn default_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || unsafe { (*p_callback_data).p_message.is_null() } {
        return vk::FALSE;
    }
    // SAFETY: the driver passes valid callback data for the duration of the call.
    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) }.to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!(target: "vkboot::validation", "[{:?}] {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!(target: "vkboot::validation", "[{:?}] {}", message_type, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!(target: "vkboot::validation", "[{:?}] {}", message_type, message);
        }
        _ => {
            tracing::trace!(target: "vkboot::validation", "[{:?}] {}", message_type, message);
        }
    }

    vk::FALSE
}

/// What an instance will be created with, resolved against [`SystemInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstancePlan {
    pub api_version: u32,
    pub layers: Vec<String>,
    pub extensions: Vec<String>,
    pub debug_messenger: bool,
    pub portability_enumeration: bool,
    pub properties2_ext_enabled: bool,
}

/// Builder for a Vulkan [`Instance`].
#[derive(Clone)]
pub struct InstanceBuilder {
    app_name: String,
    engine_name: String,
    app_version: u32,
    engine_version: u32,
    required_api_version: u32,
    desired_api_version: u32,
    layers: Vec<String>,
    extensions: Vec<String>,
    request_validation: bool,
    require_validation: bool,
    use_debug_messenger: bool,
    debug_callback: DebugCallback,
    debug_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    debug_types: vk::DebugUtilsMessageTypeFlagsEXT,
    headless: bool,
    display_extensions: Option<Vec<String>>,
    portability_enumeration: bool,
}

impl Default for InstanceBuilder {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            engine_name: String::new(),
            app_version: 0,
            engine_version: 0,
            required_api_version: vk::API_VERSION_1_0,
            desired_api_version: vk::API_VERSION_1_0,
            layers: Vec::new(),
            extensions: Vec::new(),
            request_validation: false,
            require_validation: false,
            use_debug_messenger: false,
            debug_callback: Some(default_debug_callback),
            debug_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            debug_types: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            headless: false,
            display_extensions: None,
            portability_enumeration: true,
        }
    }
}

impl InstanceBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Application name reported to the driver.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Engine name reported to the driver.
    pub fn engine_name(mut self, name: impl Into<String>) -> Self {
        self.engine_name = name.into();
        self
    }

    /// Application version reported to the driver.
    pub fn app_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.app_version = vk::make_api_version(0, major, minor, patch);
        self
    }

    /// Engine version reported to the driver.
    pub fn engine_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.engine_version = vk::make_api_version(0, major, minor, patch);
        self
    }

    /// Fail if the loader cannot provide at least this version.
    pub fn require_api_version(mut self, version: u32) -> Self {
        self.required_api_version = version;
        self.desired_api_version = self.desired_api_version.max(version);
        self
    }

    /// Use this version when the loader supports it, otherwise the highest available.
    pub fn desired_api_version(mut self, version: u32) -> Self {
        self.desired_api_version = version;
        self
    }

    /// Enable a layer; it must be available.
    pub fn enable_layer(mut self, name: impl Into<String>) -> Self {
        self.layers.push(name.into());
        self
    }

    /// Enable an extension; it must be available.
    pub fn enable_extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.push(name.into());
        self
    }

    /// Enable several extensions; each must be available.
    pub fn enable_extensions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions.extend(names.into_iter().map(Into::into));
        self
    }

    /// Enable the validation layer if it is installed.
    pub fn request_validation_layers(mut self, enable: bool) -> Self {
        self.request_validation = enable;
        self
    }

    /// Enable the validation layer and fail if it is missing.
    pub fn require_validation_layers(mut self, require: bool) -> Self {
        self.require_validation = require;
        self
    }

    /// Install the built-in messenger that logs through `tracing`.
    pub fn use_default_debug_messenger(mut self) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = Some(default_debug_callback);
        self
    }

    /// Install a debug messenger with a custom callback.
    pub fn set_debug_callback(mut self, callback: DebugCallback) -> Self {
        self.use_debug_messenger = true;
        self.debug_callback = callback;
        self
    }

    /// Severities the messenger reports.
    pub fn debug_messenger_severity(mut self, severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        self.debug_severity = severity;
        self
    }

    /// Message types the messenger reports.
    pub fn debug_messenger_type(mut self, types: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        self.debug_types = types;
        self
    }

    /// Skip the windowing extensions; the instance cannot present.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Use exactly the surface extensions this display needs.
    pub fn require_display_extensions(mut self, display: &impl HasDisplayHandle) -> Result<Self> {
        let handle = display
            .display_handle()
            .map_err(|e| BootError::InvalidWindowHandle(e.to_string()))?;
        let names = ash_window::enumerate_required_extensions(handle.as_raw())
            .call("enumerate_required_extensions")?;
        self.display_extensions = Some(
            names
                .iter()
                // SAFETY: ash-window returns static nul-terminated extension names.
                .map(|&ptr| name_of(unsafe { CStr::from_ptr(ptr) }))
                .collect(),
        );
        Ok(self)
    }

    /// Enumerate portability (e.g. MoltenVK) devices when the loader supports it.
    pub fn enable_portability_enumeration(mut self, enable: bool) -> Self {
        self.portability_enumeration = enable;
        self
    }

    /// Resolve the request against what the loader reports.
    pub fn plan(&self, info: &SystemInfo) -> Result<InstancePlan> {
        if info.instance_api_version < self.required_api_version {
            return Err(BootError::ApiVersionUnavailable {
                required: self.required_api_version,
                available: info.instance_api_version,
            });
        }
        let api_version = self
            .desired_api_version
            .min(info.instance_api_version)
            .max(self.required_api_version);

        let mut layers = Vec::new();
        for layer in &self.layers {
            if !info.is_layer_available(layer) {
                return Err(BootError::LayerNotPresent(layer.clone()));
            }
            push_unique(&mut layers, layer);
        }
        if self.require_validation && !info.validation_layers_available {
            return Err(BootError::ValidationLayersNotPresent);
        }
        if self.require_validation || self.request_validation {
            if info.validation_layers_available {
                push_unique(&mut layers, VALIDATION_LAYER_NAME);
            } else {
                tracing::warn!("Validation layer {} not available", VALIDATION_LAYER_NAME);
            }
        }

        let mut extensions = Vec::new();
        for ext in &self.extensions {
            if !info.is_extension_available(ext) {
                return Err(BootError::ExtensionNotPresent(ext.clone()));
            }
            push_unique(&mut extensions, ext);
        }

        let debug_messenger = self.use_debug_messenger && info.debug_utils_available;
        if debug_messenger {
            push_unique(&mut extensions, &name_of(ash::ext::debug_utils::NAME));
        } else if self.use_debug_messenger {
            tracing::warn!("VK_EXT_debug_utils not available, continuing without a debug messenger");
        }

        if !self.headless {
            for ext in self.windowing_extensions(info)? {
                push_unique(&mut extensions, &ext);
            }
        }

        let portability_name = name_of(ash::khr::portability_enumeration::NAME);
        let portability_enumeration =
            self.portability_enumeration && info.is_extension_available(&portability_name);
        if portability_enumeration {
            push_unique(&mut extensions, &portability_name);
        }

        let properties2_name = name_of(ash::khr::get_physical_device_properties2::NAME);
        let properties2_ext_enabled =
            api_version < vk::API_VERSION_1_1 && info.is_extension_available(&properties2_name);
        if properties2_ext_enabled {
            push_unique(&mut extensions, &properties2_name);
        }

        Ok(InstancePlan {
            api_version,
            layers,
            extensions,
            debug_messenger,
            portability_enumeration,
            properties2_ext_enabled,
        })
    }

    fn windowing_extensions(&self, info: &SystemInfo) -> Result<Vec<String>> {
        if let Some(required) = &self.display_extensions {
            let missing: Vec<String> = required
                .iter()
                .filter(|ext| !info.is_extension_available(ext))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BootError::WindowingExtensionsNotPresent(missing));
            }
            return Ok(required.clone());
        }

        let surface = name_of(ash::khr::surface::NAME);
        let platform: Vec<String> = platform_surface_extensions()
            .into_iter()
            .map(name_of)
            .collect();
        let available_platform: Vec<String> = platform
            .iter()
            .filter(|ext| info.is_extension_available(ext))
            .cloned()
            .collect();

        if !info.is_extension_available(&surface) || available_platform.is_empty() {
            let mut missing = vec![surface.clone()];
            missing.extend(platform);
            missing.retain(|ext| !info.is_extension_available(ext));
            return Err(BootError::WindowingExtensionsNotPresent(missing));
        }

        let mut extensions = vec![surface];
        extensions.extend(available_platform);
        Ok(extensions)
    }

    /// Build the instance.
    pub fn build(self, loader: &VulkanLoader) -> Result<Instance> {
        let info = SystemInfo::query(loader)?;
        let plan = self.plan(&info)?;
        let entry = loader.entry();

        let app_name = to_cstring(&self.app_name)?;
        let engine_name = to_cstring(&self.engine_name)?;
        let layer_names = plan
            .layers
            .iter()
            .map(|l| to_cstring(l))
            .collect::<Result<Vec<_>>>()?;
        let extension_names = plan
            .extensions
            .iter()
            .map(|e| to_cstring(e))
            .collect::<Result<Vec<_>>>()?;
        let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|l| l.as_ptr()).collect();
        let extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|e| e.as_ptr()).collect();

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(self.app_version)
            .engine_name(&engine_name)
            .engine_version(self.engine_version)
            .api_version(plan.api_version);

        let create_flags = if plan.portability_enumeration {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        let mut messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(self.debug_severity)
            .message_type(self.debug_types)
            .pfn_user_callback(self.debug_callback);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs)
            .flags(create_flags);
        if plan.debug_messenger {
            // Also covers messages from vkCreateInstance / vkDestroyInstance.
            create_info = create_info.push_next(&mut messenger_info);
        }

        // SAFETY: every pointer in create_info outlives this call.
        let instance = unsafe { entry.create_instance(&create_info, None) }.call("vkCreateInstance")?;

        let debug_messenger = if plan.debug_messenger {
            messenger_info.p_next = std::ptr::null();
            let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
            // SAFETY: the instance was created with VK_EXT_debug_utils enabled.
            match unsafe { debug_utils.create_debug_utils_messenger(&messenger_info, None) } {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(result) => {
                    // SAFETY: nothing else has been created from this instance.
                    unsafe { instance.destroy_instance(None) };
                    return Err(BootError::Vulkan {
                        call: "vkCreateDebugUtilsMessengerEXT",
                        result,
                    });
                }
            }
        } else {
            None
        };

        let surface_loader =
            (!self.headless).then(|| ash::khr::surface::Instance::new(entry, &instance));

        tracing::info!(
            api_version = %crate::error::version_string(plan.api_version),
            layers = ?plan.layers,
            extensions = plan.extensions.len(),
            "Created Vulkan instance"
        );

        Ok(Instance {
            loader: loader.clone(),
            instance,
            api_version: plan.api_version,
            debug_messenger,
            surface_loader,
            headless: self.headless,
            properties2_ext_enabled: plan.properties2_ext_enabled,
            portability_enumeration: plan.portability_enumeration,
            enabled_extensions: plan.extensions,
        })
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn to_cstring(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| BootError::InvalidName(name.to_string()))
}

/// A created Vulkan instance and the handles it owns.
pub struct Instance {
    loader: VulkanLoader,
    instance: ash::Instance,
    api_version: u32,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    surface_loader: Option<ash::khr::surface::Instance>,
    headless: bool,
    properties2_ext_enabled: bool,
    portability_enumeration: bool,
    enabled_extensions: Vec<String>,
}

impl Instance {
    /// The instance-level function table.
    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the raw instance handle.
    pub fn handle(&self) -> vk::Instance {
        self.instance.handle()
    }

    /// Loader the instance was created from.
    pub fn loader(&self) -> &VulkanLoader {
        &self.loader
    }

    /// API version the instance was created with.
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Debug messenger, if one was created.
    pub fn debug_messenger(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.debug_messenger.as_ref().map(|(_, messenger)| *messenger)
    }

    /// Surface loader, absent for headless instances.
    pub fn surface_loader(&self) -> Option<&ash::khr::surface::Instance> {
        self.surface_loader.as_ref()
    }

    /// Whether the windowing extensions were skipped.
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Whether `VK_KHR_get_physical_device_properties2` is enabled on a 1.0 instance.
    pub fn properties2_ext_enabled(&self) -> bool {
        self.properties2_ext_enabled
    }

    /// Whether portability enumeration is enabled.
    pub fn portability_enumeration(&self) -> bool {
        self.portability_enumeration
    }

    /// Instance extensions that were enabled.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// Whether `vkGetPhysicalDeviceFeatures2` can be called on this instance.
    pub fn supports_features2(&self) -> bool {
        self.api_version >= vk::API_VERSION_1_1 || self.properties2_ext_enabled
    }

    /// Destroy the debug messenger and the instance.
    ///
    /// # Safety
    /// Every object created from this instance must already be destroyed.
    pub unsafe fn destroy(&self) {
        if let Some((debug_utils, messenger)) = &self.debug_messenger {
            debug_utils.destroy_debug_utils_messenger(*messenger, None);
        }
        self.instance.destroy_instance(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed_system(version: u32) -> SystemInfo {
        let mut extensions = vec![name_of(ash::khr::surface::NAME)];
        extensions.extend(platform_surface_extensions().into_iter().map(name_of));
        extensions.push(name_of(ash::ext::debug_utils::NAME));
        extensions.push(name_of(ash::khr::get_physical_device_properties2::NAME));
        SystemInfo::from_parts(vec![VALIDATION_LAYER_NAME.to_string()], extensions, version)
    }

    #[test]
    fn api_version_is_capped_by_the_loader() {
        let plan = InstanceBuilder::new()
            .headless(true)
            .desired_api_version(vk::API_VERSION_1_3)
            .plan(&windowed_system(vk::API_VERSION_1_2))
            .unwrap();
        assert_eq!(plan.api_version, vk::API_VERSION_1_2);
        assert!(!plan.properties2_ext_enabled);
    }

    #[test]
    fn required_version_above_loader_fails_early() {
        let err = InstanceBuilder::new()
            .require_api_version(vk::API_VERSION_1_3)
            .plan(&windowed_system(vk::API_VERSION_1_1))
            .unwrap_err();
        assert!(matches!(err, BootError::ApiVersionUnavailable { .. }));
    }

    #[test]
    fn missing_layer_and_extension_are_named() {
        let info = windowed_system(vk::API_VERSION_1_3);
        let err = InstanceBuilder::new()
            .enable_layer("VK_LAYER_missing")
            .plan(&info)
            .unwrap_err();
        assert!(matches!(err, BootError::LayerNotPresent(name) if name == "VK_LAYER_missing"));

        let err = InstanceBuilder::new()
            .enable_extension("VK_EXT_missing")
            .plan(&info)
            .unwrap_err();
        assert!(matches!(err, BootError::ExtensionNotPresent(name) if name == "VK_EXT_missing"));
    }

    #[test]
    fn validation_and_debug_messenger_are_added_when_available() {
        let plan = InstanceBuilder::new()
            .request_validation_layers(true)
            .use_default_debug_messenger()
            .plan(&windowed_system(vk::API_VERSION_1_3))
            .unwrap();
        assert_eq!(plan.layers, vec![VALIDATION_LAYER_NAME.to_string()]);
        assert!(plan.debug_messenger);
        assert!(plan.extensions.contains(&name_of(ash::ext::debug_utils::NAME)));
        assert!(plan.extensions.contains(&name_of(ash::khr::surface::NAME)));
    }

    #[test]
    fn required_validation_fails_without_the_layer() {
        let info = SystemInfo::from_parts(Vec::new(), Vec::new(), vk::API_VERSION_1_3);
        let err = InstanceBuilder::new()
            .headless(true)
            .require_validation_layers(true)
            .plan(&info)
            .unwrap_err();
        assert!(matches!(err, BootError::ValidationLayersNotPresent));

        let plan = InstanceBuilder::new()
            .headless(true)
            .request_validation_layers(true)
            .plan(&info)
            .unwrap();
        assert!(plan.layers.is_empty());
    }

    #[test]
    fn windowed_instance_needs_surface_extensions() {
        let info = SystemInfo::from_parts(Vec::new(), Vec::new(), vk::API_VERSION_1_3);
        let err = InstanceBuilder::new().plan(&info).unwrap_err();
        assert!(matches!(err, BootError::WindowingExtensionsNotPresent(_)));

        let plan = InstanceBuilder::new().headless(true).plan(&info).unwrap();
        assert!(plan.extensions.is_empty());
    }

    #[test]
    fn vulkan_1_0_instances_enable_properties2() {
        let plan = InstanceBuilder::new()
            .headless(true)
            .plan(&windowed_system(vk::API_VERSION_1_0))
            .unwrap();
        assert!(plan.properties2_ext_enabled);
        assert_eq!(
            plan.extensions,
            vec![name_of(ash::khr::get_physical_device_properties2::NAME)]
        );
    }
}
