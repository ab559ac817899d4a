//! Swapchain negotiation and creation.

use crate::device::Device;
use crate::error::{BootError, Result, VkResultExt};
use crate::instance::Instance;
use crate::queue::QueueType;
use crate::surface::{surface_loader, SurfaceSupport};
use ash::vk;

const DEFAULT_FORMATS: [vk::SurfaceFormatKHR; 2] = [
    vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
    vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    },
];

const DEFAULT_PRESENT_MODES: [vk::PresentModeKHR; 2] =
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];

/// Requested swapchain configuration. Unset lists fall back to the defaults.
#[derive(Debug, Clone)]
pub struct SwapchainOptions {
    pub desired_formats: Vec<vk::SurfaceFormatKHR>,
    pub desired_present_modes: Vec<vk::PresentModeKHR>,
    pub desired_extent: vk::Extent2D,
    pub desired_min_image_count: u32,
    pub required_min_image_count: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub format_feature_flags: vk::FormatFeatureFlags,
    pub array_layer_count: u32,
    pub pre_transform: Option<vk::SurfaceTransformFlagsKHR>,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub clipped: bool,
    pub create_flags: vk::SwapchainCreateFlagsKHR,
    pub old_swapchain: vk::SwapchainKHR,
}

impl Default for SwapchainOptions {
    fn default() -> Self {
        Self {
            desired_formats: Vec::new(),
            desired_present_modes: Vec::new(),
            desired_extent: vk::Extent2D {
                width: 256,
                height: 256,
            },
            desired_min_image_count: 0,
            required_min_image_count: 0,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            format_feature_flags: vk::FormatFeatureFlags::SAMPLED_IMAGE,
            array_layer_count: 1,
            pre_transform: None,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            clipped: true,
            create_flags: vk::SwapchainCreateFlagsKHR::empty(),
            old_swapchain: vk::SwapchainKHR::null(),
        }
    }
}

/// The configuration a swapchain will be created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub image_count: u32,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub image_usage: vk::ImageUsageFlags,
    pub array_layers: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Pick the first desired format the surface offers, else its first format.
pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    desired: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR> {
    let desired = if desired.is_empty() {
        &DEFAULT_FORMATS[..]
    } else {
        desired
    };
    desired
        .iter()
        .find(|d| {
            available
                .iter()
                .any(|a| a.format == d.format && a.color_space == d.color_space)
        })
        .or_else(|| available.first())
        .copied()
        .ok_or(BootError::NoSurfaceFormats)
}

/// Pick the first desired present mode the surface offers, else FIFO.
pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    desired: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    let desired = if desired.is_empty() {
        &DEFAULT_PRESENT_MODES[..]
    } else {
        desired
    };
    desired
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        // FIFO is always supported
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// The surface's extent, or `desired` clamped when the surface leaves it open.
///
/// Each dimension is clamped on its own. A surface reporting a minimum above
/// its maximum gets the minimum.
pub fn calculate_extent(capabilities: &vk::SurfaceCapabilitiesKHR, desired: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
        vk::Extent2D {
            width: desired.width.min(max.width).max(min.width),
            height: desired.height.min(max.height).max(min.height),
        }
    }
}

/// Number of images to request. A `max_image_count` of 0 means no upper bound.
pub fn calculate_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_min: u32,
    required_min: u32,
) -> Result<u32> {
    let mut image_count = if required_min > 0 {
        if required_min < capabilities.min_image_count {
            return Err(BootError::RequiredMinImageCountTooLow {
                requested: required_min,
                minimum: capabilities.min_image_count,
            });
        }
        required_min
    } else if desired_min > 0 {
        desired_min.max(capabilities.min_image_count)
    } else {
        capabilities.min_image_count + 1
    };

    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        image_count = capabilities.max_image_count;
    }
    Ok(image_count)
}

fn is_shared_present_mode(mode: vk::PresentModeKHR) -> bool {
    mode == vk::PresentModeKHR::SHARED_DEMAND_REFRESH
        || mode == vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH
}

/// Resolve `options` against what the surface supports.
pub fn negotiate(
    support: &SurfaceSupport,
    options: &SwapchainOptions,
    graphics_family: u32,
    present_family: u32,
) -> Result<SwapchainPlan> {
    let caps = &support.capabilities;

    let image_count = calculate_image_count(
        caps,
        options.desired_min_image_count,
        options.required_min_image_count,
    )?;
    let surface_format = select_surface_format(&support.formats, &options.desired_formats)?;
    let present_mode = select_present_mode(&support.present_modes, &options.desired_present_modes);
    let extent = calculate_extent(caps, options.desired_extent);

    let (sharing_mode, queue_family_indices) = if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![graphics_family, present_family],
        )
    };

    // Shared present modes report their usage elsewhere.
    if !is_shared_present_mode(present_mode)
        && !caps.supported_usage_flags.contains(options.image_usage)
    {
        return Err(BootError::RequiredUsageNotSupported {
            requested: options.image_usage,
            supported: caps.supported_usage_flags,
        });
    }

    let array_layers = options
        .array_layer_count
        .clamp(1, caps.max_image_array_layers.max(1));

    Ok(SwapchainPlan {
        image_count,
        surface_format,
        present_mode,
        extent,
        sharing_mode,
        queue_family_indices,
        image_usage: options.image_usage,
        array_layers,
        pre_transform: options.pre_transform.unwrap_or(caps.current_transform),
    })
}

/// Builder for a [`Swapchain`].
pub struct SwapchainBuilder<'a> {
    instance: &'a Instance,
    device: &'a Device,
    surface: vk::SurfaceKHR,
    options: SwapchainOptions,
}

impl<'a> SwapchainBuilder<'a> {
    /// Start from the default options for `surface`.
    pub fn new(instance: &'a Instance, device: &'a Device, surface: vk::SurfaceKHR) -> Self {
        Self {
            instance,
            device,
            surface,
            options: SwapchainOptions::default(),
        }
    }

    /// Use the surface the device was selected with.
    pub fn for_device(instance: &'a Instance, device: &'a Device) -> Result<Self> {
        let surface = device.surface().ok_or(BootError::NoSurfaceProvided)?;
        Ok(Self::new(instance, device, surface))
    }

    /// Put `format` ahead of the other desired formats.
    pub fn set_desired_format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.options.desired_formats.insert(0, format);
        self
    }

    /// Replace the desired formats, most preferred first.
    pub fn set_desired_formats(mut self, formats: Vec<vk::SurfaceFormatKHR>) -> Self {
        self.options.desired_formats = formats;
        self
    }

    /// Append a format after the desired ones.
    pub fn add_fallback_format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.options.desired_formats.push(format);
        self
    }

    /// Reset to the default sRGB BGRA/RGBA formats.
    pub fn use_default_format_selection(mut self) -> Self {
        self.options.desired_formats = DEFAULT_FORMATS.to_vec();
        self
    }

    /// Put `mode` ahead of the other desired present modes.
    pub fn set_desired_present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.options.desired_present_modes.insert(0, mode);
        self
    }

    /// Replace the desired present modes, most preferred first.
    pub fn set_desired_present_modes(mut self, modes: Vec<vk::PresentModeKHR>) -> Self {
        self.options.desired_present_modes = modes;
        self
    }

    /// Reset to the default mailbox then FIFO order.
    pub fn use_default_present_mode_selection(mut self) -> Self {
        self.options.desired_present_modes = DEFAULT_PRESENT_MODES.to_vec();
        self
    }

    /// Extent used when the surface leaves it to the application.
    pub fn set_desired_extent(mut self, width: u32, height: u32) -> Self {
        self.options.desired_extent = vk::Extent2D { width, height };
        self
    }

    /// Preferred image count, clamped to the surface limits.
    pub fn set_desired_min_image_count(mut self, count: u32) -> Self {
        self.options.desired_min_image_count = count;
        self
    }

    /// Fail unless the surface accepts at least `count` images.
    pub fn set_required_min_image_count(mut self, count: u32) -> Self {
        self.options.required_min_image_count = count;
        self
    }

    /// Replace the image usage flags.
    pub fn set_image_usage_flags(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.options.image_usage = usage;
        self
    }

    /// Add to the image usage flags.
    pub fn add_image_usage_flags(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.options.image_usage |= usage;
        self
    }

    /// Only consider formats whose optimal tiling supports `flags`.
    pub fn set_format_feature_flags(mut self, flags: vk::FormatFeatureFlags) -> Self {
        self.options.format_feature_flags = flags;
        self
    }

    /// Layers per image, clamped to the surface maximum.
    pub fn set_image_array_layer_count(mut self, count: u32) -> Self {
        self.options.array_layer_count = count;
        self
    }

    /// Override the surface's current transform.
    pub fn set_pre_transform_flags(mut self, transform: vk::SurfaceTransformFlagsKHR) -> Self {
        self.options.pre_transform = Some(transform);
        self
    }

    /// Composite alpha mode.
    pub fn set_composite_alpha_flags(mut self, alpha: vk::CompositeAlphaFlagsKHR) -> Self {
        self.options.composite_alpha = alpha;
        self
    }

    /// Let the presentation engine skip obscured pixels.
    pub fn set_clipped(mut self, clipped: bool) -> Self {
        self.options.clipped = clipped;
        self
    }

    /// Extra `VkSwapchainCreateFlagsKHR`.
    pub fn set_create_flags(mut self, flags: vk::SwapchainCreateFlagsKHR) -> Self {
        self.options.create_flags = flags;
        self
    }

    /// Swapchain being replaced. The builder never destroys it.
    pub fn set_old_swapchain(mut self, old: vk::SwapchainKHR) -> Self {
        self.options.old_swapchain = old;
        self
    }

    /// Options collected so far.
    pub fn options(&self) -> &SwapchainOptions {
        &self.options
    }

    /// Create the swapchain.
    pub fn build(self) -> Result<Swapchain> {
        let physical_device = self.device.physical_device().handle();
        let mut support =
            SurfaceSupport::query(surface_loader(self.instance)?, physical_device, self.surface)?;

        if !self.options.format_feature_flags.is_empty() {
            let raw = self.instance.raw();
            support.formats.retain(|f| {
                // SAFETY: the physical device belongs to this instance.
                let props = unsafe { raw.get_physical_device_format_properties(physical_device, f.format) };
                props
                    .optimal_tiling_features
                    .contains(self.options.format_feature_flags)
            });
        }

        let graphics = self.device.get_queue_index(QueueType::Graphics)?;
        let present = self.device.get_queue_index(QueueType::Present)?;
        let plan = negotiate(&support, &self.options, graphics, present)?;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .flags(self.options.create_flags)
            .surface(self.surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(plan.array_layers)
            .image_usage(plan.image_usage)
            .image_sharing_mode(plan.sharing_mode)
            .queue_family_indices(&plan.queue_family_indices)
            .pre_transform(plan.pre_transform)
            .composite_alpha(self.options.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(self.options.clipped)
            .old_swapchain(self.options.old_swapchain);

        let loader = ash::khr::swapchain::Device::new(self.instance.raw(), self.device.raw());
        // SAFETY: create_info only references locals that outlive the call.
        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .call("vkCreateSwapchainKHR")?;

        let image_count = match unsafe { loader.get_swapchain_images(handle) } {
            Ok(images) => images.len() as u32,
            Err(result) => {
                // SAFETY: the swapchain was just created and is unused.
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(BootError::Vulkan {
                    call: "vkGetSwapchainImagesKHR",
                    result,
                });
            }
        };

        tracing::info!(
            format = ?plan.surface_format.format,
            present_mode = ?plan.present_mode,
            width = plan.extent.width,
            height = plan.extent.height,
            image_count,
            "Created swapchain"
        );

        Ok(Swapchain {
            handle,
            loader,
            device: self.device.raw().clone(),
            image_format: plan.surface_format.format,
            color_space: plan.surface_format.color_space,
            extent: plan.extent,
            present_mode: plan.present_mode,
            image_count,
            requested_min_image_count: plan.image_count,
            image_usage: plan.image_usage,
            array_layers: plan.array_layers,
        })
    }
}

/// A created swapchain.
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    loader: ash::khr::swapchain::Device,
    device: ash::Device,
    pub image_format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub image_count: u32,
    pub requested_min_image_count: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub array_layers: u32,
}

impl Swapchain {
    /// Get the raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Swapchain extension function table.
    pub fn loader(&self) -> &ash::khr::swapchain::Device {
        &self.loader
    }

    /// Device the swapchain was created on.
    pub fn device(&self) -> vk::Device {
        self.device.handle()
    }

    /// Images owned by the swapchain.
    pub fn get_images(&self) -> Result<Vec<vk::Image>> {
        // SAFETY: the swapchain is alive.
        unsafe { self.loader.get_swapchain_images(self.handle) }.call("vkGetSwapchainImagesKHR")
    }

    /// One color view per image. The caller owns the views.
    pub fn get_image_views(&self) -> Result<Vec<vk::ImageView>> {
        let images = self.get_images()?;
        let mut views = Vec::with_capacity(images.len());
        for image in images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.image_format)
                .components(vk::ComponentMapping::default())
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            // SAFETY: image belongs to this swapchain's device.
            match unsafe { self.device.create_image_view(&view_info, None) } {
                Ok(view) => views.push(view),
                Err(result) => {
                    // SAFETY: the views were created above and are unused.
                    unsafe { self.destroy_image_views(&views) };
                    return Err(BootError::Vulkan {
                        call: "vkCreateImageView",
                        result,
                    });
                }
            }
        }
        Ok(views)
    }

    /// Destroy views returned by [`get_image_views`](Self::get_image_views).
    ///
    /// # Safety
    /// The views must not be in use.
    pub unsafe fn destroy_image_views(&self, views: &[vk::ImageView]) {
        for &view in views {
            self.device.destroy_image_view(view, None);
        }
    }

    /// Destroy the swapchain.
    ///
    /// # Safety
    /// The swapchain must not be in use and its image views must already be destroyed.
    pub unsafe fn destroy(&self) {
        self.loader.destroy_swapchain(self.handle, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn srgb(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            max_image_array_layers: 1,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            ..Default::default()
        }
    }

    fn support() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: caps(),
            formats: vec![
                srgb(vk::Format::R8G8B8A8_UNORM),
                srgb(vk::Format::B8G8R8A8_SRGB),
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    #[test]
    fn desired_format_wins_in_order() {
        let available = [srgb(vk::Format::R8G8B8A8_UNORM), srgb(vk::Format::B8G8R8A8_SRGB)];
        let chosen = select_surface_format(
            &available,
            &[srgb(vk::Format::A2B10G10R10_UNORM_PACK32), srgb(vk::Format::B8G8R8A8_SRGB)],
        )
        .unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);

        let fallback = select_surface_format(&available, &[srgb(vk::Format::R16G16B16A16_SFLOAT)]).unwrap();
        assert_eq!(fallback.format, vk::Format::R8G8B8A8_UNORM);

        assert!(matches!(
            select_surface_format(&[], &[]),
            Err(BootError::NoSurfaceFormats)
        ));
    }

    #[test]
    fn color_space_must_match_too() {
        let available = [vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        }];
        let chosen = select_surface_format(&available, &[srgb(vk::Format::B8G8R8A8_SRGB)]).unwrap();
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(select_present_mode(&available, &[]), vk::PresentModeKHR::FIFO);
        assert_eq!(
            select_present_mode(
                &available,
                &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
            ),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::MAILBOX], &[]),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn image_count_defaults_to_one_above_minimum() {
        assert_eq!(calculate_image_count(&caps(), 0, 0).unwrap(), 3);

        let mut bounded = caps();
        bounded.max_image_count = 2;
        assert_eq!(calculate_image_count(&bounded, 0, 0).unwrap(), 2);
        assert_eq!(calculate_image_count(&bounded, 8, 0).unwrap(), 2);
        assert_eq!(calculate_image_count(&caps(), 1, 0).unwrap(), 2);
        assert_eq!(calculate_image_count(&caps(), 5, 0).unwrap(), 5);
    }

    #[test]
    fn required_image_count_below_minimum_fails() {
        assert!(matches!(
            calculate_image_count(&caps(), 0, 1),
            Err(BootError::RequiredMinImageCountTooLow {
                requested: 1,
                minimum: 2
            })
        ));
        assert_eq!(calculate_image_count(&caps(), 0, 4).unwrap(), 4);
    }

    #[test]
    fn extent_is_clamped_only_when_surface_leaves_it_open() {
        let extent = calculate_extent(
            &caps(),
            vk::Extent2D {
                width: 100,
                height: 10_000,
            },
        );
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 100,
                height: 4096
            }
        );

        let mut fixed = caps();
        fixed.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(
            calculate_extent(&fixed, vk::Extent2D { width: 1, height: 1 }),
            fixed.current_extent
        );
    }

    #[test]
    fn extent_dimensions_clamp_independently() {
        let mut open = caps();
        open.min_image_extent = vk::Extent2D {
            width: 100,
            height: 100,
        };
        let extent = calculate_extent(
            &open,
            vk::Extent2D {
                width: 50,
                height: 5000,
            },
        );
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 100,
                height: 4096
            }
        );
    }

    #[test]
    fn inverted_extent_range_does_not_panic() {
        let mut inverted = caps();
        inverted.min_image_extent = vk::Extent2D {
            width: 200,
            height: 200,
        };
        inverted.max_image_extent = vk::Extent2D {
            width: 100,
            height: 100,
        };
        let extent = calculate_extent(
            &inverted,
            vk::Extent2D {
                width: 150,
                height: 50,
            },
        );
        assert_eq!(
            extent,
            vk::Extent2D {
                width: 200,
                height: 200
            }
        );
    }

    #[test]
    fn sharing_mode_follows_queue_families() {
        let options = SwapchainOptions::default();
        let same = negotiate(&support(), &options, 0, 0).unwrap();
        assert_eq!(same.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert!(same.queue_family_indices.is_empty());

        let split = negotiate(&support(), &options, 0, 2).unwrap();
        assert_eq!(split.sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(split.queue_family_indices, vec![0, 2]);
    }

    #[test]
    fn unsupported_usage_is_rejected_except_for_shared_modes() {
        let options = SwapchainOptions {
            image_usage: vk::ImageUsageFlags::STORAGE,
            ..SwapchainOptions::default()
        };
        assert!(matches!(
            negotiate(&support(), &options, 0, 0),
            Err(BootError::RequiredUsageNotSupported { .. })
        ));

        let mut shared = support();
        shared.present_modes = vec![vk::PresentModeKHR::SHARED_DEMAND_REFRESH];
        let options = SwapchainOptions {
            desired_present_modes: vec![vk::PresentModeKHR::SHARED_DEMAND_REFRESH],
            ..options
        };
        let plan = negotiate(&shared, &options, 0, 0).unwrap();
        assert_eq!(plan.present_mode, vk::PresentModeKHR::SHARED_DEMAND_REFRESH);
    }

    #[test]
    fn plan_uses_defaults() {
        let plan = negotiate(&support(), &SwapchainOptions::default(), 0, 0).unwrap();
        assert_eq!(plan.image_count, 3);
        assert_eq!(plan.surface_format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(plan.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(
            plan.extent,
            vk::Extent2D {
                width: 256,
                height: 256
            }
        );
        assert_eq!(plan.array_layers, 1);
        assert_eq!(plan.pre_transform, vk::SurfaceTransformFlagsKHR::IDENTITY);
    }
}
