//! Registry of capability kinds the negotiation logic understands.
//!
//! Every registered kind is a feature structure: a `sType`/`pNext` header
//! followed by `VkBool32` fields. Comparison is a superset test over those
//! fields and merging is a field-wise OR. Kinds that are not registered are
//! stored and linked like any other record but always compare as a match.

use crate::layout::HEADER_SIZE;
use ash::vk;

/// A Vulkan structure that can be stored in a [`CapabilityChain`](crate::CapabilityChain).
///
/// # Safety
/// Implementors must be `#[repr(C)]` Vulkan structures whose first two fields
/// are `s_type` and `p_next`, and whose `Default` value carries
/// `STRUCTURE_TYPE` in `s_type`.
pub unsafe trait CapabilityStruct: Copy + Default + 'static {
    /// Discriminator written into `s_type`.
    const STRUCTURE_TYPE: vk::StructureType;
}

/// Returns the names of fields requested but absent in the stored record.
pub type CompareFn = fn(&CapabilityKind, &[u8], &[u8]) -> Vec<&'static str>;

/// Folds an incoming payload into a stored record.
pub type MergeFn = fn(&CapabilityKind, &mut [u8], &[u8]);

/// Shape and semantics of one registered capability structure.
#[derive(Clone, Copy)]
pub struct CapabilityKind {
    pub tag: vk::StructureType,
    pub name: &'static str,
    pub size: usize,
    /// `VkBool32` fields in declaration order, starting after the header.
    pub fields: &'static [&'static str],
    pub compare: CompareFn,
    pub merge: MergeFn,
}

impl CapabilityKind {
    /// Fields set in `requested` but not in `stored`.
    pub fn missing(&self, stored: &[u8], requested: &[u8]) -> Vec<&'static str> {
        (self.compare)(self, stored, requested)
    }

    /// OR `incoming` into `stored`.
    pub fn merge_into(&self, stored: &mut [u8], incoming: &[u8]) {
        (self.merge)(self, stored, incoming);
    }
}

impl std::fmt::Debug for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityKind")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

/// Look up a registered kind.
pub fn lookup_kind(tag: vk::StructureType) -> Option<&'static CapabilityKind> {
    KINDS.iter().find(|kind| kind.tag == tag)
}

/// Iterate every registered kind.
pub fn registered_kinds() -> impl Iterator<Item = &'static CapabilityKind> {
    KINDS.iter()
}

fn bool32_at(bytes: &[u8], base: usize, index: usize) -> vk::Bool32 {
    let start = base + index * 4;
    bytes
        .get(start..start + 4)
        .map_or(vk::FALSE, bytemuck::pod_read_unaligned::<u32>)
}

fn set_bool32(bytes: &mut [u8], base: usize, index: usize) {
    let start = base + index * 4;
    if let Some(slot) = bytes.get_mut(start..start + 4) {
        slot.copy_from_slice(&vk::TRUE.to_ne_bytes());
    }
}

fn missing_fields(
    fields: &'static [&'static str],
    base: usize,
    stored: &[u8],
    requested: &[u8],
) -> Vec<&'static str> {
    fields
        .iter()
        .enumerate()
        .filter(|&(i, _)| {
            bool32_at(requested, base, i) != vk::FALSE && bool32_at(stored, base, i) == vk::FALSE
        })
        .map(|(_, name)| *name)
        .collect()
}

fn compare_bool_fields(kind: &CapabilityKind, stored: &[u8], requested: &[u8]) -> Vec<&'static str> {
    missing_fields(kind.fields, HEADER_SIZE, stored, requested)
}

fn merge_bool_fields(kind: &CapabilityKind, stored: &mut [u8], incoming: &[u8]) {
    for i in 0..kind.fields.len() {
        if bool32_at(incoming, HEADER_SIZE, i) != vk::FALSE {
            set_bool32(stored, HEADER_SIZE, i);
        }
    }
}

fn core_bytes(features: &vk::PhysicalDeviceFeatures) -> &[u8] {
    // SAFETY: PhysicalDeviceFeatures is a repr(C) block of VkBool32 with no padding.
    unsafe {
        std::slice::from_raw_parts(
            std::ptr::from_ref(features).cast::<u8>(),
            std::mem::size_of::<vk::PhysicalDeviceFeatures>(),
        )
    }
}

/// Names of the core 1.0 features requested but not available.
pub fn missing_core_features(
    available: &vk::PhysicalDeviceFeatures,
    requested: &vk::PhysicalDeviceFeatures,
) -> Vec<&'static str> {
    missing_fields(CORE_FEATURES, 0, core_bytes(available), core_bytes(requested))
}

const CORE_FEATURES: &[&str] = &[
    "robust_buffer_access",
    "full_draw_index_uint32",
    "image_cube_array",
    "independent_blend",
    "geometry_shader",
    "tessellation_shader",
    "sample_rate_shading",
    "dual_src_blend",
    "logic_op",
    "multi_draw_indirect",
    "draw_indirect_first_instance",
    "depth_clamp",
    "depth_bias_clamp",
    "fill_mode_non_solid",
    "depth_bounds",
    "wide_lines",
    "large_points",
    "alpha_to_one",
    "multi_viewport",
    "sampler_anisotropy",
    "texture_compression_etc2",
    "texture_compression_astc_ldr",
    "texture_compression_bc",
    "occlusion_query_precise",
    "pipeline_statistics_query",
    "vertex_pipeline_stores_and_atomics",
    "fragment_stores_and_atomics",
    "shader_tessellation_and_geometry_point_size",
    "shader_image_gather_extended",
    "shader_storage_image_extended_formats",
    "shader_storage_image_multisample",
    "shader_storage_image_read_without_format",
    "shader_storage_image_write_without_format",
    "shader_uniform_buffer_array_dynamic_indexing",
    "shader_sampled_image_array_dynamic_indexing",
    "shader_storage_buffer_array_dynamic_indexing",
    "shader_storage_image_array_dynamic_indexing",
    "shader_clip_distance",
    "shader_cull_distance",
    "shader_float64",
    "shader_int64",
    "shader_int16",
    "shader_resource_residency",
    "shader_resource_min_lod",
    "sparse_binding",
    "sparse_residency_buffer",
    "sparse_residency_image2_d",
    "sparse_residency_image3_d",
    "sparse_residency2_samples",
    "sparse_residency4_samples",
    "sparse_residency8_samples",
    "sparse_residency16_samples",
    "sparse_residency_aliased",
    "variable_multisample_rate",
    "inherited_queries",
];

const VULKAN_11_FEATURES: &[&str] = &[
    "storage_buffer16_bit_access",
    "uniform_and_storage_buffer16_bit_access",
    "storage_push_constant16",
    "storage_input_output16",
    "multiview",
    "multiview_geometry_shader",
    "multiview_tessellation_shader",
    "variable_pointers_storage_buffer",
    "variable_pointers",
    "protected_memory",
    "sampler_ycbcr_conversion",
    "shader_draw_parameters",
];

const VULKAN_12_FEATURES: &[&str] = &[
    "sampler_mirror_clamp_to_edge",
    "draw_indirect_count",
    "storage_buffer8_bit_access",
    "uniform_and_storage_buffer8_bit_access",
    "storage_push_constant8",
    "shader_buffer_int64_atomics",
    "shader_shared_int64_atomics",
    "shader_float16",
    "shader_int8",
    "descriptor_indexing",
    "shader_input_attachment_array_dynamic_indexing",
    "shader_uniform_texel_buffer_array_dynamic_indexing",
    "shader_storage_texel_buffer_array_dynamic_indexing",
    "shader_uniform_buffer_array_non_uniform_indexing",
    "shader_sampled_image_array_non_uniform_indexing",
    "shader_storage_buffer_array_non_uniform_indexing",
    "shader_storage_image_array_non_uniform_indexing",
    "shader_input_attachment_array_non_uniform_indexing",
    "shader_uniform_texel_buffer_array_non_uniform_indexing",
    "shader_storage_texel_buffer_array_non_uniform_indexing",
    "descriptor_binding_uniform_buffer_update_after_bind",
    "descriptor_binding_sampled_image_update_after_bind",
    "descriptor_binding_storage_image_update_after_bind",
    "descriptor_binding_storage_buffer_update_after_bind",
    "descriptor_binding_uniform_texel_buffer_update_after_bind",
    "descriptor_binding_storage_texel_buffer_update_after_bind",
    "descriptor_binding_update_unused_while_pending",
    "descriptor_binding_partially_bound",
    "descriptor_binding_variable_descriptor_count",
    "runtime_descriptor_array",
    "sampler_filter_minmax",
    "scalar_block_layout",
    "imageless_framebuffer",
    "uniform_buffer_standard_layout",
    "shader_subgroup_extended_types",
    "separate_depth_stencil_layouts",
    "host_query_reset",
    "timeline_semaphore",
    "buffer_device_address",
    "buffer_device_address_capture_replay",
    "buffer_device_address_multi_device",
    "vulkan_memory_model",
    "vulkan_memory_model_device_scope",
    "vulkan_memory_model_availability_visibility_chains",
    "shader_output_viewport_index",
    "shader_output_layer",
    "subgroup_broadcast_dynamic_id",
];

const VULKAN_13_FEATURES: &[&str] = &[
    "robust_image_access",
    "inline_uniform_block",
    "descriptor_binding_inline_uniform_block_update_after_bind",
    "pipeline_creation_cache_control",
    "private_data",
    "shader_demote_to_helper_invocation",
    "shader_terminate_invocation",
    "subgroup_size_control",
    "compute_full_subgroups",
    "synchronization2",
    "texture_compression_astc_hdr",
    "shader_zero_initialize_workgroup_memory",
    "dynamic_rendering",
    "shader_integer_dot_product",
    "maintenance4",
];

macro_rules! feature_kinds {
    ($($ty:ident => $sty:ident, $fields:expr;)*) => {
        $(
            // SAFETY: generated Vulkan structure with an sType/pNext header.
            unsafe impl CapabilityStruct for vk::$ty<'static> {
                const STRUCTURE_TYPE: vk::StructureType = vk::StructureType::$sty;
            }
        )*

        static KINDS: &[CapabilityKind] = &[
            $(
                CapabilityKind {
                    tag: vk::StructureType::$sty,
                    name: stringify!($ty),
                    size: std::mem::size_of::<vk::$ty<'static>>(),
                    fields: $fields,
                    compare: compare_bool_fields,
                    merge: merge_bool_fields,
                },
            )*
        ];
    };
}

feature_kinds! {
    PhysicalDeviceFeatures2 => PHYSICAL_DEVICE_FEATURES_2, CORE_FEATURES;
    PhysicalDeviceVulkan11Features => PHYSICAL_DEVICE_VULKAN_1_1_FEATURES, VULKAN_11_FEATURES;
    PhysicalDeviceVulkan12Features => PHYSICAL_DEVICE_VULKAN_1_2_FEATURES, VULKAN_12_FEATURES;
    PhysicalDeviceVulkan13Features => PHYSICAL_DEVICE_VULKAN_1_3_FEATURES, VULKAN_13_FEATURES;
    PhysicalDeviceDynamicRenderingFeatures => PHYSICAL_DEVICE_DYNAMIC_RENDERING_FEATURES, &["dynamic_rendering"];
    PhysicalDeviceSynchronization2Features => PHYSICAL_DEVICE_SYNCHRONIZATION_2_FEATURES, &["synchronization2"];
    PhysicalDeviceBufferDeviceAddressFeatures => PHYSICAL_DEVICE_BUFFER_DEVICE_ADDRESS_FEATURES, &[
        "buffer_device_address",
        "buffer_device_address_capture_replay",
        "buffer_device_address_multi_device",
    ];
    PhysicalDeviceTimelineSemaphoreFeatures => PHYSICAL_DEVICE_TIMELINE_SEMAPHORE_FEATURES, &["timeline_semaphore"];
    PhysicalDeviceScalarBlockLayoutFeatures => PHYSICAL_DEVICE_SCALAR_BLOCK_LAYOUT_FEATURES, &["scalar_block_layout"];
    PhysicalDeviceMaintenance4Features => PHYSICAL_DEVICE_MAINTENANCE_4_FEATURES, &["maintenance4"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_names_all_of_its_fields() {
        for kind in registered_kinds() {
            let words = (kind.size - HEADER_SIZE) / 4;
            // Odd field counts are followed by one padding word.
            assert_eq!(
                kind.fields.len().div_ceil(2) * 2,
                words,
                "{} lists {} fields",
                kind.name,
                kind.fields.len()
            );
        }
    }

    #[test]
    fn core_feature_names_cover_the_struct() {
        assert_eq!(
            CORE_FEATURES.len() * 4,
            std::mem::size_of::<vk::PhysicalDeviceFeatures>()
        );
    }

    #[test]
    fn missing_core_features_reports_absent_bits() {
        let available = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
        let requested = vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .geometry_shader(true);

        assert_eq!(
            missing_core_features(&available, &requested),
            vec!["geometry_shader"]
        );
        assert!(missing_core_features(&requested, &available).is_empty());
    }

    #[test]
    fn lookup_finds_registered_kinds_only() {
        let kind = lookup_kind(vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES)
            .expect("vulkan 1.3 features are registered");
        assert_eq!(kind.name, "PhysicalDeviceVulkan13Features");
        assert!(lookup_kind(vk::StructureType::PHYSICAL_DEVICE_PROPERTIES_2).is_none());
    }
}
