//! Barrier 描述
//!
//! 编译期以虚拟句柄描述 barrier，执行期再解析为物理句柄和队列族索引。

use ash::vk;

use super::device::{RgBufferBarrier, RgImageBarrier};
use super::image_resource::RgImageSubresourceRange;
use super::queue::RgQueueType;
use super::resource_handle::{RgBufferHandle, RgImageHandle, RgImageViewHandle};
use super::resource_state::{RgBufferState, RgImageState, RgSyncState, needs_barrier};

/// 队列所有权转移：release 记录在 src 队列，acquire 记录在 dst 队列
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgQueueTransfer {
    pub src: RgQueueType,
    pub dst: RgQueueType,
}

/// 图像 Barrier 描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgImageBarrierDesc {
    pub image: RgImageHandle,
    /// 源状态
    pub src_state: RgImageState,
    /// 目标状态
    pub dst_state: RgImageState,
    /// 子资源范围（aspect 已确定）
    pub range: RgImageSubresourceRange,
    pub queue_transfer: Option<RgQueueTransfer>,
    /// 别名资源接管内存：旧内容作废
    pub discard: bool,
}

impl RgImageBarrierDesc {
    /// 创建覆盖整个图像的 barrier 描述
    pub fn new(image: RgImageHandle, src_state: RgImageState, dst_state: RgImageState) -> Self {
        Self {
            image,
            src_state,
            dst_state,
            range: RgImageSubresourceRange {
                aspect: vk::ImageAspectFlags::COLOR,
                ..RgImageSubresourceRange::ALL
            },
            queue_transfer: None,
            discard: false,
        }
    }

    /// 设置 aspect
    #[inline]
    pub fn with_aspect(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.range.aspect = aspect;
        self
    }

    /// 设置 mip 范围，layer 覆盖 `layer_count` 层
    #[inline]
    pub fn with_mips(mut self, base_mip_level: u32, level_count: u32, layer_count: u32) -> Self {
        self.range.base_mip_level = base_mip_level;
        self.range.level_count = level_count;
        self.range.base_array_layer = 0;
        self.range.layer_count = layer_count;
        self
    }

    #[inline]
    pub fn with_queue_transfer(mut self, src: RgQueueType, dst: RgQueueType) -> Self {
        self.queue_transfer = Some(RgQueueTransfer { src, dst });
        self
    }

    #[inline]
    pub fn with_discard(mut self) -> Self {
        self.discard = true;
        self
    }

    /// 检查是否需要 barrier
    ///
    /// 所有权转移与内存接管总是需要；否则 layout 改变或任一侧写入时需要。
    pub fn needs_barrier(&self) -> bool {
        self.queue_transfer.is_some() || self.discard || needs_barrier(&self.src_state, &self.dst_state)
    }

    /// 除 mip 范围外完全相同，可以合并为一个 barrier
    pub(crate) fn mergeable_with(&self, next: &Self) -> bool {
        self.image == next.image
            && self.src_state == next.src_state
            && self.dst_state == next.dst_state
            && self.queue_transfer == next.queue_transfer
            && self.discard == next.discard
            && self.range.aspect == next.range.aspect
            && self.range.base_array_layer == next.range.base_array_layer
            && self.range.layer_count == next.range.layer_count
            && self.range.base_mip_level + self.range.level_count == next.range.base_mip_level
    }

    /// 转换为物理 barrier
    pub fn to_native<I>(&self, image: I, src_queue_family: u32, dst_queue_family: u32) -> RgImageBarrier<I> {
        RgImageBarrier {
            image,
            src_stage: self.src_state.stage,
            src_access: self.src_state.src_access(),
            dst_stage: self.dst_state.stage,
            dst_access: self.dst_state.access,
            old_layout: if self.discard { vk::ImageLayout::UNDEFINED } else { self.src_state.layout },
            new_layout: self.dst_state.layout,
            src_queue_family,
            dst_queue_family,
            range: self.range,
        }
    }
}

/// 缓冲区 Barrier 描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBufferBarrierDesc {
    pub buffer: RgBufferHandle,
    /// 源状态
    pub src_state: RgBufferState,
    /// 目标状态
    pub dst_state: RgBufferState,
    pub queue_transfer: Option<RgQueueTransfer>,
    pub discard: bool,
}

impl RgBufferBarrierDesc {
    /// 创建新的缓冲区 barrier 描述
    pub fn new(buffer: RgBufferHandle, src_state: RgBufferState, dst_state: RgBufferState) -> Self {
        Self {
            buffer,
            src_state,
            dst_state,
            queue_transfer: None,
            discard: false,
        }
    }

    #[inline]
    pub fn with_queue_transfer(mut self, src: RgQueueType, dst: RgQueueType) -> Self {
        self.queue_transfer = Some(RgQueueTransfer { src, dst });
        self
    }

    #[inline]
    pub fn with_discard(mut self) -> Self {
        self.discard = true;
        self
    }

    /// 检查是否需要 barrier
    pub fn needs_barrier(&self) -> bool {
        self.queue_transfer.is_some() || self.discard || needs_barrier(&self.src_state, &self.dst_state)
    }

    /// 转换为物理 barrier，范围覆盖整个缓冲区
    pub fn to_native<B>(&self, buffer: B, src_queue_family: u32, dst_queue_family: u32) -> RgBufferBarrier<B> {
        RgBufferBarrier {
            buffer,
            src_stage: self.src_state.stage,
            src_access: self.src_state.src_access(),
            dst_stage: self.dst_state.stage,
            dst_access: self.dst_state.access,
            src_queue_family,
            dst_queue_family,
            offset: 0,
            size: vk::WHOLE_SIZE,
        }
    }
}

/// Pass 内部的 barrier：回调在选定时机把视图切换到第二个状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgIntraPassBarrier {
    pub view: RgImageViewHandle,
    pub barrier: RgImageBarrierDesc,
}

/// 同一时机录制的一组 barrier，执行时合并为一次 pipeline barrier 调用
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RgPassBarriers {
    /// 图像 barriers
    pub image_barriers: Vec<RgImageBarrierDesc>,
    /// 缓冲区 barriers
    pub buffer_barriers: Vec<RgBufferBarrierDesc>,
}

impl RgPassBarriers {
    /// 创建空的 barrier 集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加图像 barrier，不需要的会被丢弃
    pub fn add_image_barrier(&mut self, barrier: RgImageBarrierDesc) {
        if barrier.needs_barrier() {
            self.push_image_barrier(barrier);
        }
    }

    /// 添加缓冲区 barrier，不需要的会被丢弃
    pub fn add_buffer_barrier(&mut self, barrier: RgBufferBarrierDesc) {
        if barrier.needs_barrier() {
            self.buffer_barriers.push(barrier);
        }
    }

    /// 添加图像 barrier；与上一个 barrier 只差相邻 mip 时合并
    pub fn push_image_barrier(&mut self, barrier: RgImageBarrierDesc) {
        if let Some(last) = self.image_barriers.last_mut()
            && last.mergeable_with(&barrier)
        {
            last.range.level_count += barrier.range.level_count;
            return;
        }
        self.image_barriers.push(barrier);
    }

    /// 检查是否有 barrier
    pub fn has_barriers(&self) -> bool {
        !self.image_barriers.is_empty() || !self.buffer_barriers.is_empty()
    }

    /// 获取图像 barrier 数量
    pub fn image_barrier_count(&self) -> usize {
        self.image_barriers.len()
    }

    /// 获取缓冲区 barrier 数量
    pub fn buffer_barrier_count(&self) -> usize {
        self.buffer_barriers.len()
    }

    pub fn extend(&mut self, other: &RgPassBarriers) {
        for barrier in &other.image_barriers {
            self.push_image_barrier(*barrier);
        }
        self.buffer_barriers.extend_from_slice(&other.buffer_barriers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> RgImageHandle {
        RgImageHandle::default()
    }

    #[test]
    fn test_image_barrier_layout_change() {
        let barrier = RgImageBarrierDesc::new(image(), RgImageState::UNDEFINED, RgImageState::COLOR_ATTACHMENT_WRITE);

        assert!(barrier.needs_barrier());
    }

    #[test]
    fn test_image_barrier_read_to_read() {
        let barrier =
            RgImageBarrierDesc::new(image(), RgImageState::SHADER_READ_FRAGMENT, RgImageState::SHADER_READ_COMPUTE);

        // 同为 SHADER_READ_ONLY_OPTIMAL 的只读到只读可以跳过
        assert!(!barrier.needs_barrier());
        assert!(barrier.with_queue_transfer(RgQueueType::Graphics, RgQueueType::Compute).needs_barrier());
    }

    #[test]
    fn test_image_barrier_write_to_read() {
        let barrier =
            RgImageBarrierDesc::new(image(), RgImageState::STORAGE_WRITE_COMPUTE, RgImageState::SHADER_READ_FRAGMENT);

        assert!(barrier.needs_barrier());
        let native = barrier.to_native(7u64, vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED);
        assert_eq!(native.src_access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(native.old_layout, vk::ImageLayout::GENERAL);
        assert_eq!(native.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn test_adjacent_mips_are_merged() {
        let mut barriers = RgPassBarriers::new();
        let base = RgImageBarrierDesc::new(image(), RgImageState::UNDEFINED, RgImageState::STORAGE_WRITE_COMPUTE);
        barriers.add_image_barrier(base.with_mips(0, 1, 1));
        barriers.add_image_barrier(base.with_mips(1, 1, 1));
        barriers.add_image_barrier(base.with_mips(3, 1, 1));

        assert_eq!(barriers.image_barrier_count(), 2);
        assert_eq!(barriers.image_barriers[0].range.level_count, 2);
        assert_eq!(barriers.image_barriers[1].range.base_mip_level, 3);
    }

    #[test]
    fn test_buffer_discard_always_needs_barrier() {
        let barrier =
            RgBufferBarrierDesc::new(RgBufferHandle::default(), RgBufferState::UNIFORM_COMPUTE, RgBufferState::INDIRECT_BUFFER);
        assert!(!barrier.needs_barrier());
        assert!(barrier.with_discard().needs_barrier());
    }
}
