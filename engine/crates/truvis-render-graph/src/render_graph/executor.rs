//! 编译后的渲染图与执行器
//!
//! `RgCompiledGraph` 保存调度顺序与同步方案。执行时依次：
//! 分配物理资源（别名资源共享内存）、按队列录制并提交命令、
//! 最后把导入资源的最终状态写回外部记录，并把临时对象交给
//! `RgFrameResources` 延迟销毁。

use std::collections::HashMap;

use ash::vk;
use itertools::Itertools;
use slotmap::SecondaryMap;

use super::aliasing::{RgAliasingPlan, RgLiveRange};
use super::barrier::{RgBufferBarrierDesc, RgImageBarrierDesc, RgPassBarriers};
use super::buffer_resource::{RgBufferDesc, RgBufferSource, RgBufferViewInfo};
use super::device::{RgBufferBarrier, RgDevice, RgImageBarrier, RgRenderingAttachment, RgRenderingInfo};
use super::frame_resources::{RgDeferredRelease, RgFrameResources};
use super::graph::{RgDependencyGraph, RgSchedule};
use super::image_resource::{RgImageDesc, RgImageSource};
use super::pass::{RgPassContext, RgPassNode};
use super::queue::RgQueueType;
use super::resource_handle::{RgBufferHandle, RgBufferViewHandle, RgImageHandle, RgImageViewHandle, RgResourceId};
use super::resource_registry::RgResourceRegistry;
use super::resource_state::RgSyncState;
use super::semaphore_info::{RgQueueEdge, RgSemaphoreInfo};
use super::state_tracker::{RgClearOp, RgPassRequirements, RgPassSync, RgSyncPlan};

/// 执行期解析出的缓冲区视图
#[derive(Clone, Copy, Debug)]
pub(crate) struct RgPhysicalBufferView<B> {
    pub buffer_handle: RgBufferHandle,
    pub info: RgBufferViewInfo<B>,
}

/// 虚拟句柄到物理对象的映射
pub struct RgPhysicalResources<D: RgDevice> {
    pub(crate) images: SecondaryMap<RgImageHandle, (D::Image, RgImageDesc)>,
    pub(crate) buffers: SecondaryMap<RgBufferHandle, (D::Buffer, RgBufferDesc)>,
    pub(crate) image_views: SecondaryMap<RgImageViewHandle, D::ImageView>,
    pub(crate) image_view_targets: SecondaryMap<RgImageViewHandle, RgImageHandle>,
    pub(crate) default_image_views: SecondaryMap<RgImageHandle, RgImageViewHandle>,
    pub(crate) buffer_views: SecondaryMap<RgBufferViewHandle, RgPhysicalBufferView<D::Buffer>>,

    /// 由 graph 创建、帧结束后需要销毁的对象
    transient_images: Vec<D::Image>,
    transient_buffers: Vec<D::Buffer>,
    memories: Vec<D::Memory>,
}

impl<D: RgDevice> RgPhysicalResources<D> {
    fn new() -> Self {
        Self {
            images: SecondaryMap::new(),
            buffers: SecondaryMap::new(),
            image_views: SecondaryMap::new(),
            image_view_targets: SecondaryMap::new(),
            default_image_views: SecondaryMap::new(),
            buffer_views: SecondaryMap::new(),
            transient_images: Vec::new(),
            transient_buffers: Vec::new(),
            memories: Vec::new(),
        }
    }
}

/// 单个队列上正在累积的提交
struct RgQueueBatch<D: RgDevice> {
    cmd: Option<D::CommandList>,
    waits: Vec<RgSemaphoreInfo<D::Semaphore>>,
    signals: Vec<RgSemaphoreInfo<D::Semaphore>>,
    submission_count: usize,
}

impl<D: RgDevice> RgQueueBatch<D> {
    fn new(external_waits: Vec<RgSemaphoreInfo<D::Semaphore>>) -> Self {
        Self {
            cmd: None,
            waits: external_waits,
            signals: Vec::new(),
            submission_count: 0,
        }
    }
}

/// 编译后的渲染图
///
/// 包含调度顺序、预计算的 barrier 与跨队列依赖，执行一次后消耗。
///
/// # 生命周期
///
/// `'a` 是 Pass 借用的外部资源的生命周期。
/// RgCompiledGraph 的生命周期不能超过这些外部资源。
pub struct RgCompiledGraph<'a, D: RgDevice> {
    pub(crate) resources: RgResourceRegistry<'a, D>,
    /// Pass 节点列表（按声明顺序）
    pub(crate) passes: Vec<RgPassNode<'a, D>>,
    /// 依赖图（用于剔除和调试）
    pub(crate) dep_graph: RgDependencyGraph,
    pub(crate) schedule: RgSchedule,
    /// 按调度位置索引
    pub(crate) requirements: Vec<RgPassRequirements>,
    pub(crate) live_ranges: HashMap<RgResourceId, RgLiveRange>,
    pub(crate) aliasing: RgAliasingPlan,
    pub(crate) sync: RgSyncPlan,
    pub(crate) external_waits: [Vec<RgSemaphoreInfo<D::Semaphore>>; RgQueueType::COUNT],
    pub(crate) external_signals: [Vec<RgSemaphoreInfo<D::Semaphore>>; RgQueueType::COUNT],
}

// getters
impl<'a, D: RgDevice> RgCompiledGraph<'a, D> {
    /// 存活 Pass 的执行顺序（pass 索引）
    #[inline]
    pub fn execution_order(&self) -> &[usize] {
        &self.schedule.order
    }

    /// 获取 Pass 数量（含被剔除的）
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// 获取 Pass 名称
    #[inline]
    pub fn pass_name(&self, index: usize) -> &str {
        &self.passes[index].name
    }

    /// 按名称查找 pass 索引
    pub fn find_pass(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|p| p.name == name)
    }

    #[inline]
    pub fn culled_passes(&self) -> &[usize] {
        &self.schedule.culled
    }

    #[inline]
    pub fn is_culled(&self, index: usize) -> bool {
        self.schedule.positions.get(index).is_some_and(|p| p.is_none())
    }

    /// 存活 Pass 的同步方案
    pub fn pass_sync(&self, index: usize) -> Option<&RgPassSync> {
        let position = (*self.schedule.positions.get(index)?)?;
        self.sync.passes.get(position)
    }

    #[inline]
    pub fn queue_edges(&self) -> &[RgQueueEdge] {
        &self.sync.edges
    }

    #[inline]
    pub fn prologue_releases(&self, queue: RgQueueType) -> &RgPassBarriers {
        &self.sync.prologue_releases[queue.index()]
    }

    #[inline]
    pub fn sync_plan(&self) -> &RgSyncPlan {
        &self.sync
    }

    #[inline]
    pub fn schedule(&self) -> &RgSchedule {
        &self.schedule
    }

    #[inline]
    pub fn dependency_graph(&self) -> &RgDependencyGraph {
        &self.dep_graph
    }

    #[inline]
    pub fn aliasing_plan(&self) -> &RgAliasingPlan {
        &self.aliasing
    }

    #[inline]
    pub fn live_range(&self, resource: impl Into<RgResourceId>) -> Option<RgLiveRange> {
        self.live_ranges.get(&resource.into()).copied()
    }

    #[inline]
    pub fn resources(&self) -> &RgResourceRegistry<'a, D> {
        &self.resources
    }

    /// 所有存活 Pass 进入回调前的 barrier 总数
    pub fn barrier_count(&self) -> usize {
        self.sync.passes.iter().map(|s| s.pre_pass_barrier_count()).sum()
    }
}

// 执行
impl<D: RgDevice> RgCompiledGraph<'_, D> {
    /// 执行渲染图
    ///
    /// # 参数
    /// - `device`: 设备接口，用于创建资源、录制和提交命令
    /// - `frames`: 跨帧资源池，本帧创建的对象在该帧槽位回收时销毁
    ///
    /// 调用前需要先 `frames.begin_frame(...)`。
    pub fn execute(mut self, device: &mut D, frames: &mut RgFrameResources<D>) {
        let physical = self.allocate_physical(device);
        let semaphores = self.sync.edges.iter().map(|_| frames.acquire_semaphore(device)).collect_vec();

        let mut batches: [RgQueueBatch<D>; RgQueueType::COUNT] =
            std::array::from_fn(|i| RgQueueBatch::new(std::mem::take(&mut self.external_waits[i])));

        self.record_prologue(device, frames, &physical, &semaphores, &mut batches);

        for (position, &pass_idx) in self.schedule.order.iter().enumerate() {
            let pass = &self.passes[pass_idx];
            let sync = &self.sync.passes[position];
            let batch = &mut batches[pass.queue.index()];

            // 需要等待的 Pass 开启新的提交
            if !sync.waits.is_empty() && batch.cmd.is_some() {
                Self::flush(device, frames, pass.queue, batch);
            }
            batch.waits.extend(
                sync.waits.iter().map(|&edge| RgSemaphoreInfo::binary(semaphores[edge], RgQueueEdge::WAIT_STAGE)),
            );

            let mut cmd = match batch.cmd.take() {
                Some(cmd) => cmd,
                None => device.begin_command_list(pass.queue, &format!("rg-{}-{}", pass.queue.name(), pass.name)),
            };
            self.record_pass(device, &mut cmd, &physical, position, pass_idx);
            batch.cmd = Some(cmd);

            // 发出信号的 Pass 立即提交，consumer 才能等待
            if !sync.signals.is_empty() {
                batch.signals.extend(
                    sync.signals.iter().map(|&edge| RgSemaphoreInfo::binary(semaphores[edge], RgQueueEdge::WAIT_STAGE)),
                );
                Self::flush(device, frames, pass.queue, batch);
            }
        }

        for queue in RgQueueType::ALL {
            let batch = &mut batches[queue.index()];
            let external_signals = std::mem::take(&mut self.external_signals[queue.index()]);
            let pending_waits = !batch.waits.is_empty();
            if batch.cmd.is_none() && external_signals.is_empty() && !pending_waits {
                continue;
            }
            batch.signals.extend(external_signals);
            if batch.cmd.is_none() {
                batch.cmd = Some(device.begin_command_list(queue, &format!("rg-{}-epilogue", queue.name())));
            }
            Self::flush(device, frames, queue, batch);
        }

        log::debug!(
            "RenderGraph: frame {} submitted {}",
            frames.frame_id(),
            RgQueueType::ALL
                .iter()
                .map(|queue| format!("{}x {}", batches[queue.index()].submission_count, queue.name()))
                .join(", ")
        );

        self.retire(frames, physical);
    }

    /// 结束当前命令列表并提交，命令列表在帧槽位回收时释放
    fn flush(device: &mut D, frames: &mut RgFrameResources<D>, queue: RgQueueType, batch: &mut RgQueueBatch<D>) {
        let Some(mut cmd) = batch.cmd.take() else {
            return;
        };
        device.submit(queue, &mut cmd, &batch.waits, &batch.signals);
        batch.waits.clear();
        batch.signals.clear();
        batch.submission_count += 1;
        frames.defer(RgDeferredRelease::CommandList(cmd));
    }

    /// 导入资源上一帧停留在其他队列时，先在原队列上 release
    fn record_prologue(
        &self,
        device: &mut D,
        frames: &mut RgFrameResources<D>,
        physical: &RgPhysicalResources<D>,
        semaphores: &[D::Semaphore],
        batches: &mut [RgQueueBatch<D>; RgQueueType::COUNT],
    ) {
        for queue in RgQueueType::ALL {
            let releases = &self.sync.prologue_releases[queue.index()];
            let signals = &self.sync.prologue_signals[queue.index()];
            if signals.is_empty() {
                continue;
            }

            let batch = &mut batches[queue.index()];
            let mut cmd = device.begin_command_list(queue, &format!("rg-{}-prologue", queue.name()));
            Self::record_barriers(device, &mut cmd, physical, &[releases], true);
            batch.cmd = Some(cmd);
            batch.signals.extend(
                signals.iter().map(|&edge| RgSemaphoreInfo::binary(semaphores[edge], RgQueueEdge::WAIT_STAGE)),
            );
            Self::flush(device, frames, queue, batch);
        }
    }

    fn record_pass(
        &self,
        device: &mut D,
        cmd: &mut D::CommandList,
        physical: &RgPhysicalResources<D>,
        position: usize,
        pass_idx: usize,
    ) {
        let pass = &self.passes[pass_idx];
        let sync = &self.sync.passes[position];

        device.cmd_begin_label(cmd, &pass.name);

        if sync.clears.is_empty() {
            Self::record_barriers(device, cmd, physical, &[&sync.acquire_barriers, &sync.barriers], false);
        } else {
            Self::record_barriers(device, cmd, physical, &[&sync.acquire_barriers, &sync.clear_barriers], false);
            Self::record_clears(device, cmd, physical, &sync.clears);
            Self::record_barriers(device, cmd, physical, &[&sync.barriers], false);
        }

        let rendering = self.rendering_info(physical, pass_idx, sync);
        if let Some(info) = &rendering {
            device.cmd_begin_rendering(cmd, info);
        }

        {
            let mut ctx = RgPassContext {
                device: &mut *device,
                cmd: &mut *cmd,
                queue: pass.queue,
                pass_name: &pass.name,
                image_usages: &pass.image_usages,
                buffer_usages: &pass.buffer_usages,
                intra_pass_barriers: &sync.intra_pass_barriers,
                physical,
            };
            pass.executor.execute(&mut ctx);
        }

        if rendering.is_some() {
            device.cmd_end_rendering(cmd);
        }

        Self::record_barriers(device, cmd, physical, &[&sync.release_barriers], true);

        device.cmd_end_label(cmd);
    }

    /// 把若干组 barrier 合并为一次 pipeline barrier 调用
    ///
    /// `releasing` 为 true 时这些 barrier 是 release 侧；同一队列族内的 release 不需要录制。
    fn record_barriers(
        device: &mut D,
        cmd: &mut D::CommandList,
        physical: &RgPhysicalResources<D>,
        groups: &[&RgPassBarriers],
        releasing: bool,
    ) {
        let image_barriers = groups
            .iter()
            .flat_map(|g| &g.image_barriers)
            .filter_map(|desc| Self::resolve_image_barrier(device, physical, desc, releasing))
            .collect_vec();
        let buffer_barriers = groups
            .iter()
            .flat_map(|g| &g.buffer_barriers)
            .filter_map(|desc| Self::resolve_buffer_barrier(device, physical, desc, releasing))
            .collect_vec();

        if image_barriers.is_empty() && buffer_barriers.is_empty() {
            return;
        }
        device.cmd_pipeline_barrier(cmd, &image_barriers, &buffer_barriers);
    }

    /// 解析队列族；返回 None 表示这个 barrier 不需要录制
    fn resolve_families(device: &D, transfer: Option<(RgQueueType, RgQueueType)>, releasing: bool) -> Option<(u32, u32)> {
        let Some((src, dst)) = transfer else {
            return Some((vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED));
        };
        let src_family = device.queue_family_index(src);
        let dst_family = device.queue_family_index(dst);
        match (src_family == dst_family, releasing) {
            (true, true) => None,
            (true, false) => Some((vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)),
            (false, _) => Some((src_family, dst_family)),
        }
    }

    fn resolve_image_barrier(
        device: &D,
        physical: &RgPhysicalResources<D>,
        desc: &RgImageBarrierDesc,
        releasing: bool,
    ) -> Option<RgImageBarrier<D::Image>> {
        let (image, _) = physical.images.get(desc.image)?;
        let transfer = desc.queue_transfer.map(|t| (t.src, t.dst));
        let (src_family, dst_family) = Self::resolve_families(device, transfer, releasing)?;
        Some(desc.to_native(*image, src_family, dst_family))
    }

    fn resolve_buffer_barrier(
        device: &D,
        physical: &RgPhysicalResources<D>,
        desc: &RgBufferBarrierDesc,
        releasing: bool,
    ) -> Option<RgBufferBarrier<D::Buffer>> {
        let (buffer, _) = physical.buffers.get(desc.buffer)?;
        let transfer = desc.queue_transfer.map(|t| (t.src, t.dst));
        let (src_family, dst_family) = Self::resolve_families(device, transfer, releasing)?;
        Some(desc.to_native(*buffer, src_family, dst_family))
    }

    fn record_clears(device: &mut D, cmd: &mut D::CommandList, physical: &RgPhysicalResources<D>, clears: &[RgClearOp]) {
        for clear in clears {
            match *clear {
                RgClearOp::Image { image, value, range } => {
                    if let Some((native, _)) = physical.images.get(image) {
                        device.cmd_clear_image(cmd, *native, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &value, &range);
                    }
                }
                RgClearOp::Buffer { buffer, value } => {
                    if let Some((native, _)) = physical.buffers.get(buffer) {
                        device.cmd_fill_buffer(cmd, *native, 0, vk::WHOLE_SIZE, value);
                    }
                }
            }
        }
    }

    /// 由 attachment 使用推导 dynamic rendering 参数；没有 attachment 时返回 None
    fn rendering_info(
        &self,
        physical: &RgPhysicalResources<D>,
        pass_idx: usize,
        sync: &RgPassSync,
    ) -> Option<RgRenderingInfo<D::ImageView>> {
        let pass = &self.passes[pass_idx];
        let mut info = RgRenderingInfo {
            extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            layer_count: 1,
            color_attachments: Vec::new(),
            depth_attachment: None,
        };

        for usage in pass.image_usages.iter().filter(|u| u.state.is_attachment()) {
            let view_handle = usage.view?;
            let view = *physical.image_views.get(view_handle)?;
            let (_, desc) = physical.images.get(usage.image)?;
            let range = self.resources.get_image_view(view_handle)?.range;

            let extent = desc.mip_extent(range.base_mip_level);
            info.extent.width = info.extent.width.min(extent.width);
            info.extent.height = info.extent.height.min(extent.height);
            info.layer_count = range.layer_count;

            let load_op = if sync.attachment_clears.contains(&usage.image) {
                vk::AttachmentLoadOp::CLEAR
            } else if sync.attachment_discards.contains(&usage.image) {
                vk::AttachmentLoadOp::DONT_CARE
            } else {
                vk::AttachmentLoadOp::LOAD
            };
            let attachment = RgRenderingAttachment {
                view,
                layout: usage.state.layout,
                load_op,
                store_op: vk::AttachmentStoreOp::STORE,
                clear_value: desc.clear_value,
            };

            if usage.state.is_depth_attachment() {
                info.depth_attachment = Some(attachment);
            } else {
                info.color_attachments.push(attachment);
            }
        }

        if info.color_attachments.is_empty() && info.depth_attachment.is_none() {
            return None;
        }
        Some(info)
    }
}

// 物理资源
impl<D: RgDevice> RgCompiledGraph<'_, D> {
    /// 创建被存活 Pass 使用的临时资源，并按别名方案分配内存
    fn allocate_physical(&self, device: &mut D) -> RgPhysicalResources<D> {
        let mut physical = RgPhysicalResources::new();

        for (handle, image) in self.resources.iter_images() {
            let native = match &image.source {
                RgImageSource::Imported { image, .. } => *image,
                RgImageSource::Transient => {
                    if !self.live_ranges.contains_key(&RgResourceId::Image(handle)) {
                        continue;
                    }
                    let native = device.create_image(&image.name, &image.desc);
                    physical.transient_images.push(native);
                    native
                }
            };
            physical.images.insert(handle, (native, image.desc.clone()));
        }

        for (handle, buffer) in self.resources.iter_buffers() {
            let native = match &buffer.source {
                RgBufferSource::Imported { buffer, .. } => *buffer,
                RgBufferSource::Transient => {
                    if !self.live_ranges.contains_key(&RgResourceId::Buffer(handle)) {
                        continue;
                    }
                    let native = device.create_buffer(&buffer.name, &buffer.desc);
                    physical.transient_buffers.push(native);
                    native
                }
            };
            physical.buffers.insert(handle, (native, buffer.desc.clone()));
        }

        self.bind_memory(device, &mut physical);

        for (view_handle, view) in self.resources.iter_image_views() {
            let Some((image, desc)) = physical.images.get(view.image) else {
                continue;
            };
            let native = device.create_image_view(*image, desc.format, view.view_type, &view.range);
            physical.image_views.insert(view_handle, native);
            physical.image_view_targets.insert(view_handle, view.image);
        }
        for (image, _) in self.resources.iter_images() {
            if let Some(view) = self.resources.get_default_image_view(image) {
                physical.default_image_views.insert(image, view);
            }
        }

        for (view_handle, view) in self.resources.iter_buffer_views() {
            let Some((buffer, _)) = physical.buffers.get(view.buffer) else {
                continue;
            };
            physical.buffer_views.insert(
                view_handle,
                RgPhysicalBufferView {
                    buffer_handle: view.buffer,
                    info: RgBufferViewInfo {
                        buffer: *buffer,
                        offset: view.offset,
                        size: view.size,
                    },
                },
            );
        }

        physical
    }

    /// 每个内存槽分配一次，容纳槽中所有租户
    fn bind_memory(&self, device: &mut D, physical: &mut RgPhysicalResources<D>) {
        for (slot_idx, slot) in self.aliasing.slots().iter().enumerate() {
            let mut requirements = vk::MemoryRequirements {
                size: 0,
                alignment: 1,
                memory_type_bits: !0,
            };
            for (resource, _) in &slot.tenants {
                let reqs = match *resource {
                    RgResourceId::Image(handle) => physical.images.get(handle).map(|(image, _)| device.image_memory_requirements(*image)),
                    RgResourceId::Buffer(handle) => {
                        physical.buffers.get(handle).map(|(buffer, _)| device.buffer_memory_requirements(*buffer))
                    }
                };
                let Some(reqs) = reqs else {
                    continue;
                };
                requirements.size = requirements.size.max(reqs.size);
                requirements.alignment = requirements.alignment.max(reqs.alignment);
                requirements.memory_type_bits &= reqs.memory_type_bits;
            }
            if requirements.size == 0 {
                continue;
            }

            let mut memory = device.allocate_memory(&format!("rg-memory-slot-{slot_idx}"), &requirements);
            for (resource, _) in &slot.tenants {
                match *resource {
                    RgResourceId::Image(handle) => {
                        if let Some((image, _)) = physical.images.get(handle) {
                            device.bind_image_memory(*image, &mut memory);
                        }
                    }
                    RgResourceId::Buffer(handle) => {
                        if let Some((buffer, _)) = physical.buffers.get(handle) {
                            device.bind_buffer_memory(*buffer, &mut memory);
                        }
                    }
                }
            }
            physical.memories.push(memory);
        }
    }

    /// 写回导入资源的最终状态，并延迟销毁本帧创建的对象
    fn retire(self, frames: &mut RgFrameResources<D>, physical: RgPhysicalResources<D>) {
        let RgCompiledGraph { mut resources, sync, .. } = self;

        for (handle, image) in resources.iter_images_mut() {
            if let RgImageSource::Imported { external, .. } = &mut image.source
                && let Some(states) = sync.final_image_states.get(handle)
            {
                external.mips.clone_from(states);
            }
        }
        for (handle, buffer) in resources.iter_buffers_mut() {
            if let RgBufferSource::Imported { external, .. } = &mut buffer.source
                && let Some(state) = sync.final_buffer_states.get(handle)
            {
                **external = *state;
            }
        }

        let RgPhysicalResources {
            image_views,
            transient_images,
            transient_buffers,
            memories,
            ..
        } = physical;

        for (_, view) in image_views {
            frames.defer(RgDeferredRelease::ImageView(view));
        }
        for image in transient_images {
            frames.defer(RgDeferredRelease::Image(image));
        }
        for buffer in transient_buffers {
            frames.defer(RgDeferredRelease::Buffer(buffer));
        }
        for memory in memories {
            frames.defer(RgDeferredRelease::Memory(memory));
        }
    }
}

// 调试方法
impl<D: RgDevice> RgCompiledGraph<'_, D> {
    /// 打印执行计划（用于调试）
    ///
    /// 输出详细的调试信息，包括：
    /// - 每个存活 Pass 的队列与执行顺序，以及被剔除的 Pass
    /// - 每个 Pass 的 image/buffer 使用（包含资源名称）
    /// - 每个 Pass 的 barrier、跨队列等待与信号
    pub fn print_execution_plan(&self) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║              RenderGraph Execution Plan                          ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Total Passes: {} ({} culled)  |  Execution Order: [{}]",
            self.passes.len(),
            self.schedule.culled.len(),
            self.schedule.order.iter().map(|i| self.passes[*i].name.as_str()).join(" → ")
        );
        log::info!("║ Queue Edges: {}  |  Aliased Memory Slots: {}", self.sync.edges.len(), self.aliasing.aliased_slot_count());
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        for queue in RgQueueType::ALL {
            let releases = &self.sync.prologue_releases[queue.index()];
            if releases.has_barriers() {
                log::info!("");
                log::info!("Prologue on {} queue:", queue.name());
                self.print_barriers(releases);
            }
        }

        for (position, &pass_idx) in self.schedule.order.iter().enumerate() {
            let pass = &self.passes[pass_idx];
            let sync = &self.sync.passes[position];

            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Pass: \"{}\" on {} queue", position + 1, self.schedule.len(), pass.name, pass.queue.name());
            log::info!("├─────────────────────────────────────────────────────────────────┤");

            if !pass.image_usages.is_empty() {
                log::info!("│ Images:");
                for usage in &pass.image_usages {
                    let icon = if usage.state.is_write() { "✏️ " } else { "📖" };
                    log::info!(
                        "│   {} \"{}\" @ {:?} (stage: {}, access: {})",
                        icon,
                        self.resources.image_name(usage.image),
                        usage.state.layout,
                        Self::format_pipeline_stage(usage.state.stage),
                        Self::format_access_flags(usage.state.access)
                    );
                    if let Some(then) = usage.then {
                        log::info!("│       then → {:?} (stage: {})", then.layout, Self::format_pipeline_stage(then.stage));
                    }
                }
            }

            if !pass.buffer_usages.is_empty() {
                log::info!("│ Buffers:");
                for usage in &pass.buffer_usages {
                    let icon = if usage.state.is_write() { "✏️ " } else { "📖" };
                    log::info!(
                        "│   {} \"{}\" (stage: {}, access: {})",
                        icon,
                        self.resources.buffer_name(usage.buffer),
                        Self::format_pipeline_stage(usage.state.stage),
                        Self::format_access_flags(usage.state.access)
                    );
                }
            }

            if !sync.waits.is_empty() {
                let waits = sync.waits.iter().map(|&e| self.edge_label(e)).join(", ");
                log::info!("│ Waits: {}", waits);
            }

            let mut pre_pass = sync.acquire_barriers.clone();
            pre_pass.extend(&sync.clear_barriers);
            pre_pass.extend(&sync.barriers);
            if pre_pass.has_barriers() {
                log::info!("├─────────────────────────────────────────────────────────────────┤");
                log::info!(
                    "│ Barriers: {} image, {} buffer",
                    pre_pass.image_barrier_count(),
                    pre_pass.buffer_barrier_count()
                );
                self.print_barriers(&pre_pass);
            } else {
                log::info!("│ No barriers required");
            }

            if !sync.clears.is_empty() || !sync.attachment_clears.is_empty() {
                log::info!("│ Clears: {} transfer, {} load-op", sync.clears.len(), sync.attachment_clears.len());
            }
            if !sync.intra_pass_barriers.is_empty() {
                log::info!("│ Intra-pass transitions: {}", sync.intra_pass_barriers.len());
            }
            if sync.release_barriers.has_barriers() {
                log::info!("│ Releases:");
                self.print_barriers(&sync.release_barriers);
            }
            if !sync.signals.is_empty() {
                let signals = sync.signals.iter().map(|&e| self.edge_label(e)).join(", ");
                log::info!("│ Signals: {}", signals);
            }

            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        if !self.schedule.culled.is_empty() {
            log::info!("");
            log::info!(
                "Culled: [{}]",
                self.schedule.culled.iter().map(|i| self.passes[*i].name.as_str()).join(", ")
            );
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }

    fn edge_label(&self, edge: usize) -> String {
        let e = &self.sync.edges[edge];
        let producer = match e.producer {
            Some(position) => self.passes[self.schedule.order[position]].name.as_str(),
            None => "prologue",
        };
        let consumer = self.passes[self.schedule.order[e.consumer]].name.as_str();
        format!("#{} {}({}) → {}({})", edge, producer, e.src_queue.name(), consumer, e.dst_queue.name())
    }

    fn print_barriers(&self, barriers: &RgPassBarriers) {
        for barrier in &barriers.image_barriers {
            let layout_change = if barrier.src_state.layout != barrier.dst_state.layout {
                format!("{:?} → {:?}", barrier.src_state.layout, barrier.dst_state.layout)
            } else {
                format!("{:?} (no layout change)", barrier.src_state.layout)
            };
            log::info!(
                "│   🔒 Image \"{}\" mips [{}, +{}):",
                self.resources.image_name(barrier.image),
                barrier.range.base_mip_level,
                barrier.range.level_count
            );
            log::info!("│       Layout: {}", layout_change);
            log::info!(
                "│       Stage:  {} → {}",
                Self::format_pipeline_stage(barrier.src_state.stage),
                Self::format_pipeline_stage(barrier.dst_state.stage)
            );
            log::info!(
                "│       Access: {} → {}",
                Self::format_access_flags(barrier.src_state.src_access()),
                Self::format_access_flags(barrier.dst_state.access)
            );
            if let Some(transfer) = barrier.queue_transfer {
                log::info!("│       Queue:  {} → {}", transfer.src.name(), transfer.dst.name());
            }
            if barrier.discard {
                log::info!("│       Discard previous contents (aliased memory)");
            }
        }

        for barrier in &barriers.buffer_barriers {
            log::info!("│   🔒 Buffer \"{}\":", self.resources.buffer_name(barrier.buffer));
            log::info!(
                "│       Stage:  {} → {}",
                Self::format_pipeline_stage(barrier.src_state.stage),
                Self::format_pipeline_stage(barrier.dst_state.stage)
            );
            log::info!(
                "│       Access: {} → {}",
                Self::format_access_flags(barrier.src_state.src_access()),
                Self::format_access_flags(barrier.dst_state.access)
            );
            if let Some(transfer) = barrier.queue_transfer {
                log::info!("│       Queue:  {} → {}", transfer.src.name(), transfer.dst.name());
            }
        }
    }

    /// 格式化 PipelineStageFlags2 为可读字符串
    fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
        const NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
            (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
            (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
            (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
            (vk::PipelineStageFlags2::VERTEX_INPUT, "VERTEX_INPUT"),
            (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
            (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
            (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
            (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
            (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
            (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
            (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
            (vk::PipelineStageFlags2::HOST, "HOST"),
            (vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR, "RAY_TRACING_SHADER"),
            (vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR, "ACCEL_STRUCT_BUILD"),
            (vk::PipelineStageFlags2::ALL_GRAPHICS, "ALL_GRAPHICS"),
            (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
        ];

        if stage == vk::PipelineStageFlags2::NONE {
            return "NONE".to_string();
        }
        let stages = NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect_vec();
        if stages.is_empty() { format!("{:?}", stage) } else { stages.join(" | ") }
    }

    /// 格式化 AccessFlags2 为可读字符串
    fn format_access_flags(access: vk::AccessFlags2) -> String {
        const NAMES: &[(vk::AccessFlags2, &str)] = &[
            (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
            (vk::AccessFlags2::INDEX_READ, "INDEX_READ"),
            (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
            (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
            (vk::AccessFlags2::SHADER_SAMPLED_READ, "SHADER_SAMPLED_READ"),
            (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
            (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
            (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
            (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
            (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
            (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
            (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
            (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
            (vk::AccessFlags2::HOST_READ, "HOST_READ"),
            (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
            (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
            (vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR, "ACCEL_STRUCT_READ"),
            (vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR, "ACCEL_STRUCT_WRITE"),
        ];

        if access == vk::AccessFlags2::NONE {
            return "NONE".to_string();
        }
        let flags = NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect_vec();
        if flags.is_empty() { format!("{:?}", access) } else { flags.join(" | ") }
    }
}
