//! Chain error types.

use ash::vk;
use thiserror::Error;

/// Errors raised while building or linking a capability chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The tag is the chain's root, which the linker manages itself.
    #[error("{0:?} is the chain root and cannot be added as a record")]
    ReservedTag(vk::StructureType),

    /// The payload cannot hold the `sType`/`pNext` header.
    #[error("payload for {tag:?} is {size} bytes, smaller than the structure header")]
    PayloadTooSmall { tag: vk::StructureType, size: usize },

    /// The payload's `sType` field disagrees with the tag it was added under.
    #[error("payload declares {found:?} but was added as {tag:?}")]
    TagMismatch {
        tag: vk::StructureType,
        found: vk::StructureType,
    },

    /// The payload size differs from the registered kind or the existing record.
    #[error("payload for {tag:?} is {actual} bytes, expected {expected} bytes")]
    SizeMismatch {
        tag: vk::StructureType,
        expected: usize,
        actual: usize,
    },

    /// Linking requires at least one record.
    #[error("cannot link an empty capability chain")]
    Empty,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, ChainError>;
