//! Type-erased storage for Vulkan capability structures.
//!
//! This crate provides:
//! - [`CapabilityChain`], an append-only arena of opaque `pNext` structures
//!   keyed by their `VkStructureType`
//! - A small registry of the capability kinds the negotiation logic knows how
//!   to compare and merge
//! - Explicit `pNext` linkage for handing a chain to the driver

pub mod chain;
pub mod error;
pub mod kind;

pub use chain::{CapabilityChain, CapabilityRecord, LinkedChain};
pub use error::{ChainError, Result};
pub use kind::{
    lookup_kind, missing_core_features, registered_kinds, CapabilityKind, CapabilityStruct,
};

/// Layout constants shared by every extensible Vulkan structure.
pub mod layout {
    use ash::vk;

    /// Size of the `sType` + `pNext` header.
    pub const HEADER_SIZE: usize = std::mem::size_of::<vk::BaseOutStructure<'static>>();
    /// Byte offset of the `pNext` field.
    pub const NEXT_OFFSET: usize = std::mem::offset_of!(vk::BaseOutStructure<'static>, p_next);
    /// Alignment of every record in the arena.
    pub const RECORD_ALIGN: usize = std::mem::align_of::<u64>();
}
