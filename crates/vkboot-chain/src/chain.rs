//! Capability chain storage and linkage.

use crate::error::{ChainError, Result};
use crate::kind::{lookup_kind, CapabilityStruct};
use crate::layout::{HEADER_SIZE, NEXT_OFFSET, RECORD_ALIGN};
use ash::vk;
use std::ffi::c_void;
use std::fmt;

/// Location of one structure inside the chain's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRecord {
    pub tag: vk::StructureType,
    pub offset: usize,
    pub size: usize,
}

impl CapabilityRecord {
    fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.size
    }

    fn padded_size(&self) -> usize {
        self.size.next_multiple_of(RECORD_ALIGN)
    }
}

/// An ordered set of opaque `pNext` structures, at most one per tag.
///
/// Payloads live back to back in a single word-aligned arena. The stored
/// copies always have a null `pNext`; linkage only exists while a
/// [`LinkedChain`] guard is alive.
#[derive(Clone)]
pub struct CapabilityChain {
    root: Option<vk::StructureType>,
    records: Vec<CapabilityRecord>,
    arena: Vec<u64>,
}

impl CapabilityChain {
    /// A feature chain rooted at `VkPhysicalDeviceFeatures2`.
    pub fn new() -> Self {
        Self {
            root: Some(vk::StructureType::PHYSICAL_DEVICE_FEATURES_2),
            records: Vec::new(),
            arena: Vec::new(),
        }
    }

    /// A chain with no reserved root, for auxiliary `pNext` structures.
    pub fn unrooted() -> Self {
        Self {
            root: None,
            ..Self::new()
        }
    }

    /// The tag reserved for the root structure, if any.
    pub fn root(&self) -> Option<vk::StructureType> {
        self.root
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored records, in insertion order.
    pub fn records(&self) -> &[CapabilityRecord] {
        &self.records
    }

    /// Whether a record with `tag` is stored.
    pub fn contains(&self, tag: vk::StructureType) -> bool {
        self.position(tag).is_some()
    }

    /// Whether a structure of type `T` is stored.
    pub fn contains_kind<T: CapabilityStruct>(&self) -> bool {
        self.contains(T::STRUCTURE_TYPE)
    }

    /// Raw bytes of the record stored under `tag`.
    pub fn payload(&self, tag: vk::StructureType) -> Option<&[u8]> {
        self.position(tag)
            .map(|index| &self.bytes()[self.records[index].range()])
    }

    /// Copy of the stored structure of type `T`.
    pub fn get<T: CapabilityStruct>(&self) -> Option<T> {
        let bytes = self.payload(T::STRUCTURE_TYPE)?;
        if bytes.len() != std::mem::size_of::<T>() {
            return None;
        }
        // SAFETY: the record was written from a `T` of the same size.
        Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<T>()) })
    }

    /// Add a typed structure. See [`add_structure`](Self::add_structure).
    pub fn add<T: CapabilityStruct>(&mut self, value: T) -> Result<()> {
        // SAFETY: T is a plain repr(C) Vulkan struct, read as bytes for the copy.
        let bytes = unsafe {
            std::slice::from_raw_parts(
                std::ptr::from_ref(&value).cast::<u8>(),
                std::mem::size_of::<T>(),
            )
        };
        self.add_structure(T::STRUCTURE_TYPE, bytes)
    }

    /// Append `payload` under `tag`, or merge it into the existing record.
    ///
    /// The payload must start with the `sType`/`pNext` header and, for a
    /// registered kind, be exactly that kind's size. Merging goes
    /// through the kind registry; an unregistered kind keeps its first payload.
    pub fn add_structure(&mut self, tag: vk::StructureType, payload: &[u8]) -> Result<()> {
        if self.root == Some(tag) {
            return Err(ChainError::ReservedTag(tag));
        }
        if payload.len() < HEADER_SIZE {
            return Err(ChainError::PayloadTooSmall {
                tag,
                size: payload.len(),
            });
        }
        let found = vk::StructureType::from_raw(bytemuck::pod_read_unaligned::<i32>(&payload[..4]));
        if found != tag {
            return Err(ChainError::TagMismatch { tag, found });
        }
        if let Some(kind) = lookup_kind(tag) {
            if payload.len() != kind.size {
                return Err(ChainError::SizeMismatch {
                    tag,
                    expected: kind.size,
                    actual: payload.len(),
                });
            }
        }

        if let Some(index) = self.position(tag) {
            let record = self.records[index];
            if record.size != payload.len() {
                return Err(ChainError::SizeMismatch {
                    tag,
                    expected: record.size,
                    actual: payload.len(),
                });
            }
            match lookup_kind(tag) {
                Some(kind) => kind.merge_into(&mut self.bytes_mut()[record.range()], payload),
                None => tracing::warn!(?tag, "no merge rule for capability kind, keeping the first record"),
            }
            return Ok(());
        }

        let offset = self.used_bytes();
        let record = CapabilityRecord {
            tag,
            offset,
            size: payload.len(),
        };
        self.arena
            .resize((offset + record.padded_size()) / RECORD_ALIGN, 0);
        let bytes = &mut self.bytes_mut()[record.range()];
        bytes.copy_from_slice(payload);
        bytes[NEXT_OFFSET..HEADER_SIZE].fill(0);
        self.records.push(record);
        Ok(())
    }

    /// Remove the record stored under `tag`, if any.
    ///
    /// The bytes of every later record move down and their offsets are
    /// rewritten in the same call, so the arena stays densely packed.
    pub fn remove_structure(&mut self, tag: vk::StructureType) {
        let Some(index) = self.position(tag) else {
            return;
        };
        let removed = self.records.remove(index);
        let start = removed.offset / RECORD_ALIGN;
        let words = removed.padded_size() / RECORD_ALIGN;
        self.arena.drain(start..start + words);
        for record in &mut self.records[index..] {
            record.offset -= removed.padded_size();
        }
    }

    /// Fold every record of `other` into this chain.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        for record in &other.records {
            self.add_structure(record.tag, &other.bytes()[record.range()])?;
        }
        Ok(())
    }

    /// The same kinds with every capability bit cleared.
    ///
    /// Used as the output template when querying a device for the kinds a
    /// caller requires.
    pub fn zeroed_like(&self) -> Self {
        let mut zeroed = self.clone();
        for record in &self.records {
            zeroed.bytes_mut()[record.offset + HEADER_SIZE..record.offset + record.size].fill(0);
        }
        zeroed
    }

    /// Whether the record under `tag` provides every bit set in `candidate`.
    ///
    /// Unregistered kinds always match.
    pub fn matches(&self, tag: vk::StructureType, candidate: &[u8]) -> bool {
        let Some(stored) = self.payload(tag) else {
            return false;
        };
        match lookup_kind(tag) {
            Some(kind) => kind.missing(stored, candidate).is_empty(),
            None => {
                tracing::warn!(?tag, "unknown capability kind, treating as supported");
                true
            }
        }
    }

    /// Compare this (available) chain against `requested`, record by record.
    ///
    /// Appends one message per requested field that is not available. Chains
    /// with different record counts are reported as a single mismatch.
    pub fn match_all(&self, requested: &Self, errors: &mut Vec<String>) {
        if self.len() != requested.len() {
            errors.push(format!(
                "capability chain has {} structures, {} were requested",
                self.len(),
                requested.len()
            ));
            return;
        }

        for (available, wanted) in self.records.iter().zip(&requested.records) {
            if available.tag != wanted.tag {
                errors.push(format!(
                    "expected {:?} but found {:?} at the same position",
                    wanted.tag, available.tag
                ));
                continue;
            }
            let Some(kind) = lookup_kind(wanted.tag) else {
                tracing::warn!(tag = ?wanted.tag, "unknown capability kind, treating as supported");
                continue;
            };
            let missing = kind.missing(
                &self.bytes()[available.range()],
                &requested.bytes()[wanted.range()],
            );
            errors.extend(
                missing
                    .into_iter()
                    .map(|field| format!("{}.{field} is not supported", kind.name)),
            );
        }
    }

    /// Link every record into a `pNext` list.
    ///
    /// The returned guard borrows the chain mutably so the arena cannot move
    /// while the driver may read the list; dropping it clears the links again.
    pub fn link(&mut self) -> Result<LinkedChain<'_>> {
        if self.records.is_empty() {
            return Err(ChainError::Empty);
        }

        let base = self.arena.as_mut_ptr().cast::<u8>();
        let offsets: Vec<usize> = self.records.iter().map(|r| r.offset).collect();
        for (i, &offset) in offsets.iter().enumerate() {
            let next = offsets
                .get(i + 1)
                // SAFETY: every offset lies inside the arena.
                .map_or(std::ptr::null_mut(), |&o| unsafe { base.add(o) }.cast::<c_void>());
            // SAFETY: each record holds a full header, so pNext is in bounds.
            unsafe {
                base.add(offset + NEXT_OFFSET)
                    .cast::<*mut c_void>()
                    .write_unaligned(next);
            }
        }
        tracing::trace!(records = offsets.len(), "linked capability chain");

        // SAFETY: offsets[0] exists and lies inside the arena.
        let head = unsafe { base.add(offsets[0]) }.cast::<c_void>();
        Ok(LinkedChain { chain: self, head })
    }

    fn clear_links(&mut self) {
        let offsets: Vec<usize> = self.records.iter().map(|r| r.offset).collect();
        let bytes = self.bytes_mut();
        for offset in offsets {
            bytes[offset + NEXT_OFFSET..offset + HEADER_SIZE].fill(0);
        }
    }

    fn position(&self, tag: vk::StructureType) -> Option<usize> {
        self.records.iter().position(|r| r.tag == tag)
    }

    fn used_bytes(&self) -> usize {
        self.arena.len() * RECORD_ALIGN
    }

    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.arena)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.arena)
    }
}

impl Default for CapabilityChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityChain")
            .field("root", &self.root)
            .field(
                "kinds",
                &self.records.iter().map(|r| r.tag).collect::<Vec<_>>(),
            )
            .field("bytes", &self.used_bytes())
            .finish()
    }
}

/// A chain whose records are currently linked through `pNext`.
pub struct LinkedChain<'a> {
    chain: &'a mut CapabilityChain,
    head: *mut c_void,
}

impl LinkedChain<'_> {
    /// Address of the first record.
    pub fn head(&self) -> *mut c_void {
        self.head
    }

    /// Number of linked records.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether nothing was linked.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Point `root.pNext` at the first record.
    ///
    /// The root must not be used after this guard is dropped.
    pub fn attach(&self, root: &mut vk::PhysicalDeviceFeatures2<'_>) {
        root.p_next = self.head;
    }
}

impl Drop for LinkedChain<'_> {
    fn drop(&mut self) {
        self.chain.clear_links();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_nodes(head: *mut c_void) -> usize {
        let mut count = 0;
        let mut node = head.cast::<vk::BaseOutStructure<'static>>();
        while !node.is_null() {
            count += 1;
            // SAFETY: the chain is linked and alive for the duration of the walk.
            node = unsafe { (*node).p_next };
        }
        count
    }

    fn unknown_payload(raw: i32) -> Vec<u8> {
        let mut bytes = vec![0u8; 24];
        bytes[..4].copy_from_slice(&raw.to_ne_bytes());
        bytes[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&1u32.to_ne_bytes());
        bytes
    }

    #[test]
    fn added_structure_matches_itself() {
        let requested = vk::PhysicalDeviceVulkan12Features::default()
            .buffer_device_address(true)
            .descriptor_indexing(true);
        let mut chain = CapabilityChain::new();
        chain.add(requested).unwrap();

        let bytes = chain
            .payload(vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES)
            .unwrap()
            .to_vec();
        assert!(chain.matches(vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES, &bytes));
    }

    #[test]
    fn match_is_a_superset_test() {
        let mut available = CapabilityChain::new();
        available
            .add(
                vk::PhysicalDeviceVulkan13Features::default()
                    .dynamic_rendering(true)
                    .synchronization2(true),
            )
            .unwrap();

        let mut wanted = CapabilityChain::new();
        wanted
            .add(vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true))
            .unwrap();
        let tag = vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES;
        assert!(available.matches(tag, wanted.payload(tag).unwrap()));
        assert!(!wanted.matches(tag, available.payload(tag).unwrap()));
    }

    #[test]
    fn duplicate_tag_merges_instead_of_growing() {
        let mut chain = CapabilityChain::new();
        chain
            .add(vk::PhysicalDeviceVulkan12Features::default().buffer_device_address(true))
            .unwrap();
        chain
            .add(vk::PhysicalDeviceVulkan12Features::default().timeline_semaphore(true))
            .unwrap();

        assert_eq!(chain.len(), 1);
        let merged = chain.get::<vk::PhysicalDeviceVulkan12Features>().unwrap();
        assert_eq!(merged.buffer_device_address, vk::TRUE);
        assert_eq!(merged.timeline_semaphore, vk::TRUE);
        assert_eq!(merged.descriptor_indexing, vk::FALSE);
    }

    #[test]
    fn root_tag_is_reserved() {
        let mut chain = CapabilityChain::new();
        let err = chain.add(vk::PhysicalDeviceFeatures2::default()).unwrap_err();
        assert_eq!(
            err,
            ChainError::ReservedTag(vk::StructureType::PHYSICAL_DEVICE_FEATURES_2)
        );

        let mut aux = CapabilityChain::unrooted();
        assert!(aux.add(vk::PhysicalDeviceFeatures2::default()).is_ok());
    }

    #[test]
    fn payload_must_carry_its_own_tag() {
        let mut chain = CapabilityChain::new();
        let bytes = unknown_payload(1_000_999_000);
        let err = chain
            .add_structure(vk::StructureType::from_raw(1_000_999_001), &bytes)
            .unwrap_err();
        assert!(matches!(err, ChainError::TagMismatch { .. }));
        assert!(matches!(
            chain.add_structure(vk::StructureType::from_raw(7), &[0u8; 4]),
            Err(ChainError::PayloadTooSmall { size: 4, .. })
        ));
    }

    #[test]
    fn registered_kinds_need_their_full_size() {
        let tag = vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES;
        let mut short = vec![0u8; 24];
        short[..4].copy_from_slice(&tag.as_raw().to_ne_bytes());

        let mut chain = CapabilityChain::new();
        let err = chain.add_structure(tag, &short).unwrap_err();
        assert_eq!(
            err,
            ChainError::SizeMismatch {
                tag,
                expected: std::mem::size_of::<vk::PhysicalDeviceVulkan12Features<'static>>(),
                actual: 24,
            }
        );
        assert!(chain.is_empty());
        assert_eq!(chain.link().err(), Some(ChainError::Empty));
    }

    #[test]
    fn linking_produces_one_node_per_record() {
        let mut chain = CapabilityChain::new();
        chain
            .add(vk::PhysicalDeviceVulkan11Features::default().multiview(true))
            .unwrap();
        chain
            .add(vk::PhysicalDeviceVulkan12Features::default().host_query_reset(true))
            .unwrap();
        chain
            .add(vk::PhysicalDeviceVulkan13Features::default().maintenance4(true))
            .unwrap();

        {
            let linked = chain.link().unwrap();
            assert_eq!(count_nodes(linked.head()), 3);

            let mut root = vk::PhysicalDeviceFeatures2::default();
            linked.attach(&mut root);
            assert_eq!(root.p_next, linked.head());
        }

        let stored = chain.get::<vk::PhysicalDeviceVulkan11Features>().unwrap();
        assert!(stored.p_next.is_null());
    }

    #[test]
    fn linking_an_empty_chain_fails() {
        let mut chain = CapabilityChain::new();
        assert_eq!(chain.link().err(), Some(ChainError::Empty));
    }

    #[test]
    fn removal_repacks_later_records() {
        let mut chain = CapabilityChain::new();
        chain
            .add(vk::PhysicalDeviceVulkan11Features::default().multiview(true))
            .unwrap();
        chain
            .add(vk::PhysicalDeviceVulkan12Features::default().scalar_block_layout(true))
            .unwrap();
        chain
            .add(vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true))
            .unwrap();

        chain.remove_structure(vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES);
        chain.remove_structure(vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_2_FEATURES);

        assert_eq!(chain.len(), 2);
        let records = chain.records();
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[1].offset, records[0].size.next_multiple_of(RECORD_ALIGN));
        let v13 = chain.get::<vk::PhysicalDeviceVulkan13Features>().unwrap();
        assert_eq!(v13.dynamic_rendering, vk::TRUE);

        let linked = chain.link().unwrap();
        assert_eq!(count_nodes(linked.head()), 2);
    }

    #[test]
    fn unknown_kinds_pass_through() {
        let tag = vk::StructureType::from_raw(1_000_999_000);
        let bytes = unknown_payload(1_000_999_000);
        let mut chain = CapabilityChain::new();
        chain.add_structure(tag, &bytes).unwrap();

        let mut stricter = bytes.clone();
        stricter[HEADER_SIZE + 4..HEADER_SIZE + 8].copy_from_slice(&1u32.to_ne_bytes());
        assert!(chain.matches(tag, &stricter));

        let mut errors = Vec::new();
        let mut requested = CapabilityChain::new();
        requested.add_structure(tag, &stricter).unwrap();
        chain.match_all(&requested, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn match_all_lists_missing_fields() {
        let mut available = CapabilityChain::new();
        available
            .add(vk::PhysicalDeviceVulkan12Features::default().buffer_device_address(true))
            .unwrap();
        let mut requested = CapabilityChain::new();
        requested
            .add(
                vk::PhysicalDeviceVulkan12Features::default()
                    .buffer_device_address(true)
                    .runtime_descriptor_array(true),
            )
            .unwrap();

        let mut errors = Vec::new();
        available.match_all(&requested, &mut errors);
        assert_eq!(
            errors,
            vec!["PhysicalDeviceVulkan12Features.runtime_descriptor_array is not supported"]
        );
    }

    #[test]
    fn match_all_reports_count_mismatch() {
        let available = CapabilityChain::new();
        let mut requested = CapabilityChain::new();
        requested
            .add(vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true))
            .unwrap();

        let mut errors = Vec::new();
        available.match_all(&requested, &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn zeroed_template_keeps_kinds_and_clears_bits() {
        let mut chain = CapabilityChain::new();
        chain
            .add(vk::PhysicalDeviceVulkan13Features::default().dynamic_rendering(true))
            .unwrap();
        let template = chain.zeroed_like();

        assert_eq!(template.len(), 1);
        let zeroed = template.get::<vk::PhysicalDeviceVulkan13Features>().unwrap();
        assert_eq!(zeroed.s_type, vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES);
        assert_eq!(zeroed.dynamic_rendering, vk::FALSE);
    }

    #[test]
    fn merge_folds_other_chain() {
        let mut a = CapabilityChain::new();
        a.add(vk::PhysicalDeviceVulkan12Features::default().shader_int8(true))
            .unwrap();
        let mut b = CapabilityChain::new();
        b.add(vk::PhysicalDeviceVulkan12Features::default().shader_float16(true))
            .unwrap();
        b.add(vk::PhysicalDeviceMaintenance4Features::default().maintenance4(true))
            .unwrap();

        a.merge(&b).unwrap();
        assert_eq!(a.len(), 2);
        let v12 = a.get::<vk::PhysicalDeviceVulkan12Features>().unwrap();
        assert_eq!(v12.shader_int8, vk::TRUE);
        assert_eq!(v12.shader_float16, vk::TRUE);
    }
}
