//! 临时资源的生命周期分析与内存别名
//!
//! 每个被使用的临时资源在合并调度序列上有一个闭区间生命周期 `[first, last]`。
//! 兼容（同一分类）且生命周期不相交的资源按首次使用顺序贪心地放进同一个内存槽。

use std::collections::HashMap;

use ash::vk;

use super::error::RgError;
use super::queue::RgQueueType;
use super::resource_handle::RgResourceId;

/// 资源在合并调度序列上的生命周期（闭区间）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgLiveRange {
    pub first: usize,
    pub last: usize,
}

impl RgLiveRange {
    #[inline]
    pub fn new(position: usize) -> Self {
        Self {
            first: position,
            last: position,
        }
    }

    #[inline]
    pub fn extend(&mut self, position: usize) {
        self.first = self.first.min(position);
        self.last = self.last.max(position);
    }

    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        !(self.last < other.first || self.first > other.last)
    }
}

/// 别名兼容分类：只有分类相同的资源可以共享内存
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RgAliasClass {
    Image {
        format: vk::Format,
        samples: vk::SampleCountFlags,
        extent: [u32; 3],
        mip_levels: u32,
        array_layers: u32,
        image_type: vk::ImageType,
        usage: vk::ImageUsageFlags,
        queue: RgQueueType,
    },
    Buffer {
        /// 向上取整到 2 的幂
        size_class: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        queue: RgQueueType,
    },
    /// 在多个队列上使用的资源不参与别名
    Exclusive,
}

/// 参与别名分析的临时资源
#[derive(Clone, Debug)]
pub struct RgAliasCandidate {
    pub resource: RgResourceId,
    pub class: RgAliasClass,
    pub range: RgLiveRange,
}

/// 一块物理内存及其先后租户
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RgMemorySlot {
    /// 按首次使用排序
    pub tenants: Vec<(RgResourceId, RgLiveRange)>,
}

/// 别名方案
#[derive(Clone, Debug, Default)]
pub struct RgAliasingPlan {
    slots: Vec<RgMemorySlot>,
    slot_of: HashMap<RgResourceId, usize>,
}

// new & init
impl RgAliasingPlan {
    /// 贪心分配内存槽；`enable_aliasing` 为 false 时每个资源独占一个槽
    pub fn build(mut candidates: Vec<RgAliasCandidate>, enable_aliasing: bool) -> Self {
        candidates.sort_by_key(|c| (c.range.first, c.resource));

        let mut plan = Self::default();
        let mut class_slots: HashMap<RgAliasClass, Vec<usize>> = HashMap::new();

        for candidate in candidates {
            let reusable = enable_aliasing && candidate.class != RgAliasClass::Exclusive;
            let existing = if reusable {
                class_slots.get(&candidate.class).and_then(|slots| {
                    slots.iter().copied().find(|&slot| {
                        plan.slots[slot].tenants.last().is_some_and(|(_, range)| range.last < candidate.range.first)
                    })
                })
            } else {
                None
            };

            let slot = match existing {
                Some(slot) => slot,
                None => {
                    plan.slots.push(RgMemorySlot::default());
                    let slot = plan.slots.len() - 1;
                    if reusable {
                        class_slots.entry(candidate.class.clone()).or_default().push(slot);
                    }
                    slot
                }
            };

            plan.slots[slot].tenants.push((candidate.resource, candidate.range));
            plan.slot_of.insert(candidate.resource, slot);
        }

        plan
    }

    /// 直接由内存槽构造（用于检查外部给出的方案）
    pub fn from_slots(slots: Vec<RgMemorySlot>) -> Self {
        let slot_of = slots
            .iter()
            .enumerate()
            .flat_map(|(slot, s)| s.tenants.iter().map(move |(resource, _)| (*resource, slot)))
            .collect();
        Self { slots, slot_of }
    }
}

// getters
impl RgAliasingPlan {
    #[inline]
    pub fn slots(&self) -> &[RgMemorySlot] {
        &self.slots
    }

    #[inline]
    pub fn slot_of(&self, resource: RgResourceId) -> Option<usize> {
        self.slot_of.get(&resource).copied()
    }

    /// 同一内存槽中紧挨在 `resource` 之前的租户
    pub fn predecessor(&self, resource: RgResourceId) -> Option<RgResourceId> {
        let tenants = &self.slots[self.slot_of(resource)?].tenants;
        let index = tenants.iter().position(|(r, _)| *r == resource)?;
        index.checked_sub(1).map(|prev| tenants[prev].0)
    }

    /// 被多个资源共享的内存槽数量
    pub fn aliased_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| s.tenants.len() > 1).count()
    }

    /// 检查同一槽中的租户两两生命周期不相交
    pub fn validate(&self, name_of: impl Fn(RgResourceId) -> String) -> Result<(), RgError> {
        for (slot, memory_slot) in self.slots.iter().enumerate() {
            for (i, (first, first_range)) in memory_slot.tenants.iter().enumerate() {
                for (second, second_range) in &memory_slot.tenants[i + 1..] {
                    if first_range.overlaps(second_range) {
                        return Err(RgError::AliasOverlap {
                            slot,
                            first: name_of(*first),
                            second: name_of(*second),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::resource_handle::RgBufferHandle;
    use slotmap::SlotMap;

    fn buffers(count: usize) -> Vec<RgResourceId> {
        let mut map: SlotMap<RgBufferHandle, ()> = SlotMap::with_key();
        (0..count).map(|_| RgResourceId::Buffer(map.insert(()))).collect()
    }

    fn class(size: vk::DeviceSize) -> RgAliasClass {
        RgAliasClass::Buffer {
            size_class: size.next_power_of_two(),
            usage: vk::BufferUsageFlags::STORAGE_BUFFER,
            queue: RgQueueType::Compute,
        }
    }

    fn candidate(resource: RgResourceId, size: vk::DeviceSize, first: usize, last: usize) -> RgAliasCandidate {
        RgAliasCandidate {
            resource,
            class: class(size),
            range: RgLiveRange { first, last },
        }
    }

    #[test]
    fn test_disjoint_ranges_share_a_slot() {
        let r = buffers(3);
        let plan = RgAliasingPlan::build(
            vec![candidate(r[0], 1000, 0, 1), candidate(r[1], 1024, 2, 3), candidate(r[2], 1000, 1, 2)],
            true,
        );

        assert_eq!(plan.slot_of(r[0]), plan.slot_of(r[1]));
        assert_ne!(plan.slot_of(r[0]), plan.slot_of(r[2]));
        assert_eq!(plan.predecessor(r[1]), Some(r[0]));
        assert_eq!(plan.predecessor(r[0]), None);
        assert!(plan.validate(|r| format!("{r:?}")).is_ok());

        for slot in plan.slots() {
            for (i, (_, a)) in slot.tenants.iter().enumerate() {
                for (_, b) in &slot.tenants[i + 1..] {
                    assert!(!a.overlaps(b));
                }
            }
        }
    }

    #[test]
    fn test_incompatible_classes_never_alias() {
        let r = buffers(2);
        let plan = RgAliasingPlan::build(vec![candidate(r[0], 256, 0, 0), candidate(r[1], 4096, 1, 1)], true);
        assert_ne!(plan.slot_of(r[0]), plan.slot_of(r[1]));
    }

    #[test]
    fn test_disabled_aliasing_gives_unique_slots() {
        let r = buffers(2);
        let plan = RgAliasingPlan::build(vec![candidate(r[0], 256, 0, 0), candidate(r[1], 256, 1, 1)], false);
        assert_eq!(plan.slots().len(), 2);
        assert_eq!(plan.aliased_slot_count(), 0);
    }

    #[test]
    fn test_overlapping_tenants_are_rejected() {
        let r = buffers(2);
        let plan = RgAliasingPlan::from_slots(vec![RgMemorySlot {
            tenants: vec![(r[0], RgLiveRange { first: 0, last: 2 }), (r[1], RgLiveRange { first: 2, last: 4 })],
        }]);

        let err = plan.validate(|_| "buffer".to_string()).unwrap_err();
        assert!(matches!(err, RgError::AliasOverlap { slot: 0, .. }));
    }
}
