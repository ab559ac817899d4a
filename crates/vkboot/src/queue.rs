//! Queue family discovery and lookup rules.

use ash::vk;

/// Kind of queue a caller asks a device for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueType {
    Present,
    Graphics,
    Compute,
    Transfer,
}

/// A queue family reported by a physical device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamily {
    pub index: u32,
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    pub supports_present: bool,
}

impl QueueFamily {
    fn has(&self, flags: vk::QueueFlags) -> bool {
        self.queue_count > 0 && self.flags.contains(flags)
    }
}

/// First family that supports graphics.
pub fn graphics_queue_index(families: &[QueueFamily]) -> Option<u32> {
    families
        .iter()
        .find(|f| f.has(vk::QueueFlags::GRAPHICS))
        .map(|f| f.index)
}

/// First family that can present to the bound surface.
pub fn present_queue_index(families: &[QueueFamily]) -> Option<u32> {
    families
        .iter()
        .find(|f| f.queue_count > 0 && f.supports_present)
        .map(|f| f.index)
}

/// A non-graphics family with `wanted`, preferring one without `avoid`.
pub fn separate_queue_index(
    families: &[QueueFamily],
    wanted: vk::QueueFlags,
    avoid: vk::QueueFlags,
) -> Option<u32> {
    let mut fallback = None;
    for family in families {
        if !family.has(wanted) || family.flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        if !family.flags.contains(avoid) {
            return Some(family.index);
        }
        fallback.get_or_insert(family.index);
    }
    fallback
}

/// A family with `wanted` and neither graphics nor `avoid`.
pub fn dedicated_queue_index(
    families: &[QueueFamily],
    wanted: vk::QueueFlags,
    avoid: vk::QueueFlags,
) -> Option<u32> {
    families
        .iter()
        .find(|f| {
            f.has(wanted) && !f.flags.contains(vk::QueueFlags::GRAPHICS) && !f.flags.contains(avoid)
        })
        .map(|f| f.index)
}

/// Family index for `kind`, by the separate-queue rule for compute and transfer.
pub fn queue_index(families: &[QueueFamily], kind: QueueType) -> Option<u32> {
    match kind {
        QueueType::Present => present_queue_index(families),
        QueueType::Graphics => graphics_queue_index(families),
        QueueType::Compute => {
            separate_queue_index(families, vk::QueueFlags::COMPUTE, vk::QueueFlags::TRANSFER)
        }
        QueueType::Transfer => {
            separate_queue_index(families, vk::QueueFlags::TRANSFER, vk::QueueFlags::COMPUTE)
        }
    }
}

/// Family index for a dedicated `kind`. Only compute and transfer have one.
pub fn dedicated_index(families: &[QueueFamily], kind: QueueType) -> Option<u32> {
    match kind {
        QueueType::Compute => {
            dedicated_queue_index(families, vk::QueueFlags::COMPUTE, vk::QueueFlags::TRANSFER)
        }
        QueueType::Transfer => {
            dedicated_queue_index(families, vk::QueueFlags::TRANSFER, vk::QueueFlags::COMPUTE)
        }
        QueueType::Present | QueueType::Graphics => None,
    }
}

/// Queue family indices resolved once when a device is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueTable {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
    pub dedicated_compute: Option<u32>,
    pub dedicated_transfer: Option<u32>,
}

impl QueueTable {
    /// Apply the index rules to `families`.
    pub fn resolve(families: &[QueueFamily]) -> Self {
        Self {
            graphics: queue_index(families, QueueType::Graphics),
            present: queue_index(families, QueueType::Present),
            compute: queue_index(families, QueueType::Compute),
            transfer: queue_index(families, QueueType::Transfer),
            dedicated_compute: dedicated_index(families, QueueType::Compute),
            dedicated_transfer: dedicated_index(families, QueueType::Transfer),
        }
    }

    /// Family index for `kind`, if any.
    pub fn index(&self, kind: QueueType) -> Option<u32> {
        match kind {
            QueueType::Present => self.present,
            QueueType::Graphics => self.graphics,
            QueueType::Compute => self.compute,
            QueueType::Transfer => self.transfer,
        }
    }

    /// Dedicated family index. Graphics and present never have one.
    pub fn dedicated_index(&self, kind: QueueType) -> Option<u32> {
        match kind {
            QueueType::Compute => self.dedicated_compute,
            QueueType::Transfer => self.dedicated_transfer,
            QueueType::Present | QueueType::Graphics => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn family(index: u32, flags: vk::QueueFlags, supports_present: bool) -> QueueFamily {
    QueueFamily {
        index,
        flags,
        queue_count: 1,
        supports_present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GCT: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::GRAPHICS.as_raw()
            | vk::QueueFlags::COMPUTE.as_raw()
            | vk::QueueFlags::TRANSFER.as_raw(),
    );
    const CT: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::COMPUTE.as_raw() | vk::QueueFlags::TRANSFER.as_raw(),
    );

    #[test]
    fn single_universal_family() {
        let families = [family(0, GCT, true)];
        let table = QueueTable::resolve(&families);
        assert_eq!(table.graphics, Some(0));
        assert_eq!(table.present, Some(0));
        assert_eq!(table.compute, None);
        assert_eq!(table.transfer, None);
        assert_eq!(table.dedicated_compute, None);
    }

    #[test]
    fn separate_prefers_family_without_the_other_capability() {
        let families = [
            family(0, GCT, true),
            family(1, CT, false),
            family(2, vk::QueueFlags::TRANSFER, false),
        ];
        assert_eq!(queue_index(&families, QueueType::Transfer), Some(2));
        assert_eq!(queue_index(&families, QueueType::Compute), Some(1));
        assert_eq!(dedicated_index(&families, QueueType::Transfer), Some(2));
        assert_eq!(dedicated_index(&families, QueueType::Compute), None);
    }

    #[test]
    fn separate_falls_back_to_mixed_family() {
        let families = [family(0, GCT, true), family(1, CT, false)];
        assert_eq!(queue_index(&families, QueueType::Transfer), Some(1));
        assert_eq!(dedicated_index(&families, QueueType::Transfer), None);
    }

    #[test]
    fn present_is_first_presenting_family() {
        let families = [
            family(0, vk::QueueFlags::GRAPHICS, false),
            family(1, vk::QueueFlags::COMPUTE, true),
        ];
        assert_eq!(graphics_queue_index(&families), Some(0));
        assert_eq!(present_queue_index(&families), Some(1));
        assert_eq!(dedicated_index(&families, QueueType::Graphics), None);
    }

    #[test]
    fn empty_families_are_skipped() {
        let mut empty = family(0, GCT, true);
        empty.queue_count = 0;
        let families = [empty, family(1, GCT, true)];
        assert_eq!(graphics_queue_index(&families), Some(1));
        assert_eq!(present_queue_index(&families), Some(1));
    }
}
