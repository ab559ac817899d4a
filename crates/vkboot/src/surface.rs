//! Surface creation and capability queries.

use crate::error::{BootError, Result, VkResultExt};
use crate::instance::Instance;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// A `VkSurfaceKHR` created for a window.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Create a surface for `window`.
    ///
    /// # Safety
    /// The window must outlive the surface.
    pub unsafe fn from_window<W>(instance: &Instance, window: &W) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let loader = surface_loader(instance)?.clone();

        let display = window
            .display_handle()
            .map_err(|e| BootError::InvalidWindowHandle(format!("display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| BootError::InvalidWindowHandle(format!("window handle: {e}")))?;

        let handle = ash_window::create_surface(
            instance.loader().entry(),
            instance.raw(),
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
        .call("vkCreateSurfaceKHR")?;

        Ok(Self { handle, loader })
    }

    /// Wrap a surface created elsewhere. Ownership passes to the returned value.
    pub fn from_raw(instance: &Instance, handle: vk::SurfaceKHR) -> Result<Self> {
        Ok(Self {
            handle,
            loader: surface_loader(instance)?.clone(),
        })
    }

    /// Get the raw surface handle.
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// What `physical_device` supports for this surface.
    pub fn support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        SurfaceSupport::query(&self.loader, physical_device, self.handle)
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// No swapchain created for this surface may still exist.
    pub unsafe fn destroy(&self) {
        self.loader.destroy_surface(self.handle, None);
    }
}

pub(crate) fn surface_loader(instance: &Instance) -> Result<&ash::khr::surface::Instance> {
    instance.surface_loader().ok_or_else(|| {
        BootError::WindowingExtensionsNotPresent(vec![ash::khr::surface::NAME
            .to_string_lossy()
            .into_owned()])
    })
}

/// Surface capabilities, formats and present modes for one device.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query capabilities, formats and present modes.
    pub fn query(
        loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        // SAFETY: surface and device belong to the instance the loader was made from.
        unsafe {
            let capabilities = loader
                .get_physical_device_surface_capabilities(physical_device, surface)
                .call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
            let formats = loader
                .get_physical_device_surface_formats(physical_device, surface)
                .call("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
            let present_modes = loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .call("vkGetPhysicalDeviceSurfacePresentModesKHR")?;

            Ok(Self {
                capabilities,
                formats,
                present_modes,
            })
        }
    }
}
