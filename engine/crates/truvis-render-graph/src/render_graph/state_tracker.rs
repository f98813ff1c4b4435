//! 状态跟踪与 barrier 合成
//!
//! 按合并调度顺序模拟每个存活 Pass 的执行，跟踪每个图像 mip / 每个缓冲区的
//! 最后状态和所属队列，为每次使用生成 barrier，或在跨队列时生成
//! release / acquire 与 semaphore 依赖边。

use std::collections::HashMap;

use ash::vk;
use slotmap::SecondaryMap;

use super::aliasing::RgAliasingPlan;
use super::barrier::{RgBufferBarrierDesc, RgImageBarrierDesc, RgIntraPassBarrier, RgPassBarriers};
use super::device::RgDevice;
use super::error::RgError;
use super::image_resource::{RgClearValue, RgImageSubresourceRange};
use super::pass::RgPassNode;
use super::queue::RgQueueType;
use super::resource_handle::{RgBufferHandle, RgImageHandle, RgImageViewHandle, RgResourceId};
use super::resource_registry::RgResourceRegistry;
use super::resource_state::{RgBufferState, RgImageState, RgSyncState, RgTrackedState};
use super::semaphore_info::RgQueueEdge;

// ---------------------------------------------------------------------------
// Pass 需求（同一 Pass 内多次使用合并后的结果）
// ---------------------------------------------------------------------------

/// 单个 mip 在一个 Pass 中的需求
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgMipRequirement {
    /// 进入 Pass 时的状态
    pub entry: RgImageState,
    /// 离开 Pass 时的状态；没有 Pass 内切换时等于 entry
    pub exit: RgImageState,
    /// 负责 Pass 内切换的视图
    pub then_view: Option<RgImageViewHandle>,
}

#[derive(Clone, Debug)]
pub struct RgImageRequirement {
    pub image: RgImageHandle,
    /// 按 mip 索引，未使用的 mip 为 None
    pub mips: Vec<Option<RgMipRequirement>>,
    /// 是否作为 attachment 使用
    pub attachment: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct RgBufferRequirement {
    pub buffer: RgBufferHandle,
    pub state: RgBufferState,
}

/// 一个存活 Pass 的合并需求
#[derive(Clone, Debug)]
pub struct RgPassRequirements {
    pub queue: RgQueueType,
    pub images: Vec<RgImageRequirement>,
    pub buffers: Vec<RgBufferRequirement>,
}

impl RgPassRequirements {
    /// 合并 Pass 的使用声明，同时检查队列能力
    pub fn build<D: RgDevice>(pass: &RgPassNode<'_, D>, registry: &RgResourceRegistry<'_, D>) -> Result<Self, RgError> {
        let mut images: Vec<RgImageRequirement> = Vec::new();
        let mut buffers: Vec<RgBufferRequirement> = Vec::new();

        for usage in &pass.image_usages {
            let image = registry.get_image(usage.image).ok_or_else(|| RgError::UnknownResource {
                pass: pass.name.clone(),
            })?;
            let range = match usage.view {
                Some(view) => registry.get_image_view(view).map(|v| v.range),
                None => Some(RgImageSubresourceRange::mips(0, image.desc.mip_levels)),
            }
            .ok_or_else(|| RgError::UnknownResource {
                pass: pass.name.clone(),
            })?;

            for state in std::iter::once(usage.state).chain(usage.then) {
                Self::check_queue(pass, &image.name, &state)?;
            }

            let conflict = || RgError::ConflictingUsage {
                pass: pass.name.clone(),
                resource: image.name.clone(),
            };

            let index = match images.iter().position(|r| r.image == usage.image) {
                Some(index) => index,
                None => {
                    images.push(RgImageRequirement {
                        image: usage.image,
                        mips: vec![None; image.desc.mip_levels as usize],
                        attachment: false,
                    });
                    images.len() - 1
                }
            };
            let requirement = &mut images[index];
            requirement.attachment |= usage.state.is_attachment();

            let exit = usage.exit_state();
            let then_view = usage.then.and(usage.view);
            for mip in range.mip_range() {
                let slot = &mut requirement.mips[mip as usize];
                *slot = Some(match *slot {
                    None => RgMipRequirement {
                        entry: usage.state,
                        exit,
                        then_view,
                    },
                    Some(prev) => {
                        if prev.entry.layout != usage.state.layout {
                            return Err(conflict());
                        }
                        let merged_exit = match (prev.then_view.is_some(), then_view.is_some()) {
                            (false, false) => prev.exit.union(&exit),
                            (true, false) => prev.exit,
                            (false, true) => exit,
                            (true, true) if prev.exit.layout == exit.layout => prev.exit.union(&exit),
                            (true, true) => return Err(conflict()),
                        };
                        RgMipRequirement {
                            entry: prev.entry.union(&usage.state),
                            exit: merged_exit,
                            then_view: prev.then_view.or(then_view),
                        }
                    }
                });
            }
        }

        for usage in &pass.buffer_usages {
            let buffer = registry.get_buffer(usage.buffer).ok_or_else(|| RgError::UnknownResource {
                pass: pass.name.clone(),
            })?;
            if !pass.queue.supports_stages(usage.state.stage) {
                return Err(RgError::UnsupportedQueueUsage {
                    pass: pass.name.clone(),
                    queue: pass.queue,
                    resource: buffer.name.clone(),
                });
            }
            match buffers.iter_mut().find(|r| r.buffer == usage.buffer) {
                Some(requirement) => requirement.state = requirement.state.union(&usage.state),
                None => buffers.push(RgBufferRequirement {
                    buffer: usage.buffer,
                    state: usage.state,
                }),
            }
        }

        Ok(Self {
            queue: pass.queue,
            images,
            buffers,
        })
    }

    fn check_queue<D: RgDevice>(pass: &RgPassNode<'_, D>, resource: &str, state: &RgImageState) -> Result<(), RgError> {
        if state.is_attachment() && pass.queue != RgQueueType::Graphics {
            return Err(RgError::AttachmentOnNonGraphicsQueue {
                pass: pass.name.clone(),
                queue: pass.queue,
                resource: resource.to_string(),
            });
        }
        if !pass.queue.supports_stages(state.stage) {
            return Err(RgError::UnsupportedQueueUsage {
                pass: pass.name.clone(),
                queue: pass.queue,
                resource: resource.to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    fn image_mip(&self, image: RgImageHandle, mip: usize) -> Option<&RgMipRequirement> {
        self.images.iter().find(|r| r.image == image)?.mips.get(mip)?.as_ref()
    }

    #[inline]
    fn buffer(&self, buffer: RgBufferHandle) -> Option<&RgBufferRequirement> {
        self.buffers.iter().find(|r| r.buffer == buffer)
    }
}

// ---------------------------------------------------------------------------
// 输出
// ---------------------------------------------------------------------------

/// 首次使用时的清除操作
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RgClearOp {
    Image {
        image: RgImageHandle,
        value: RgClearValue,
        range: RgImageSubresourceRange,
    },
    Buffer {
        buffer: RgBufferHandle,
        value: u32,
    },
}

/// 一个存活 Pass 的同步方案
#[derive(Clone, Debug, Default)]
pub struct RgPassSync {
    /// 清除之前的 layout 转换
    pub clear_barriers: RgPassBarriers,
    pub clears: Vec<RgClearOp>,
    /// 首次使用为 attachment 且需要清除的图像，render pass 以 CLEAR 加载
    pub attachment_clears: Vec<RgImageHandle>,
    /// 进入 Pass 时内容未定义的 attachment，render pass 不必加载
    pub attachment_discards: Vec<RgImageHandle>,
    /// 跨队列 acquire
    pub acquire_barriers: RgPassBarriers,
    /// 同队列 barrier
    pub barriers: RgPassBarriers,
    /// Pass 内部切换，由回调录制
    pub intra_pass_barriers: Vec<RgIntraPassBarrier>,
    /// 回调之后录制的跨队列 release
    pub release_barriers: RgPassBarriers,
    /// 等待的依赖边
    pub waits: Vec<usize>,
    /// 发出信号的依赖边
    pub signals: Vec<usize>,
}

impl RgPassSync {
    /// 进入回调之前录制的 barrier 数量（含 acquire）
    pub fn pre_pass_barrier_count(&self) -> usize {
        self.barriers.image_barrier_count()
            + self.barriers.buffer_barrier_count()
            + self.acquire_barriers.image_barrier_count()
            + self.acquire_barriers.buffer_barrier_count()
    }
}

/// 整帧的同步方案
#[derive(Clone, Debug, Default)]
pub struct RgSyncPlan {
    /// 按调度位置索引
    pub passes: Vec<RgPassSync>,
    pub edges: Vec<RgQueueEdge>,
    /// 帧开头在各队列上录制的 release（导入资源上一帧停留在该队列）
    pub prologue_releases: [RgPassBarriers; RgQueueType::COUNT],
    pub prologue_signals: [Vec<usize>; RgQueueType::COUNT],
    /// 导入资源的最终状态，retire 时写回
    pub final_image_states: SecondaryMap<RgImageHandle, Vec<RgTrackedState<RgImageState>>>,
    pub final_buffer_states: SecondaryMap<RgBufferHandle, RgTrackedState<RgBufferState>>,
}

// ---------------------------------------------------------------------------
// 跟踪器
// ---------------------------------------------------------------------------

/// 图像在跟踪器中的初始信息
#[derive(Clone, Debug)]
pub struct RgImageTrackInfo {
    pub name: String,
    pub array_layers: u32,
    pub aspect: vk::ImageAspectFlags,
    pub clear: Option<RgClearValue>,
    pub imported: bool,
    /// 每个 mip 的初始状态
    pub initial: Vec<RgTrackedState<RgImageState>>,
}

#[derive(Clone, Debug)]
pub struct RgBufferTrackInfo {
    pub name: String,
    pub clear: Option<u32>,
    pub imported: bool,
    pub initial: RgTrackedState<RgBufferState>,
}

#[derive(Clone, Copy, Debug)]
struct RgStateSlot<S> {
    tracked: RgTrackedState<S>,
    /// 最后一次使用的调度位置；None 表示来自上一帧
    last_pos: Option<usize>,
    /// 别名内存被新租户接管，下一个 barrier 丢弃旧内容
    discard: bool,
}

impl<S: RgSyncState> RgStateSlot<S> {
    fn new(tracked: RgTrackedState<S>) -> Self {
        Self {
            tracked,
            last_pos: None,
            discard: false,
        }
    }
}

struct RgImageTrack {
    info: RgImageTrackInfo,
    mips: Vec<RgStateSlot<RgImageState>>,
    first_use: bool,
}

struct RgBufferTrack {
    info: RgBufferTrackInfo,
    slot: RgStateSlot<RgBufferState>,
    first_use: bool,
}

/// 一次状态转换的结果
enum RgTransition<B> {
    /// 同队列 barrier（可能为空）
    Local(B),
    /// 跨队列所有权转移
    Transfer { release: B, acquire: B, owner: RgQueueType, producer: Option<usize> },
    /// 不需要 barrier
    None,
}

pub struct RgStateTracker<'p> {
    requirements: &'p [RgPassRequirements],
    pass_names: &'p [String],
    images: SecondaryMap<RgImageHandle, RgImageTrack>,
    buffers: SecondaryMap<RgBufferHandle, RgBufferTrack>,
    edge_lookup: HashMap<(Option<usize>, RgQueueType, usize), usize>,
    plan: RgSyncPlan,
}

// new & init
impl<'p> RgStateTracker<'p> {
    /// `requirements` 与 `pass_names` 按调度位置索引
    pub fn new(
        requirements: &'p [RgPassRequirements],
        pass_names: &'p [String],
        images: impl IntoIterator<Item = (RgImageHandle, RgImageTrackInfo)>,
        buffers: impl IntoIterator<Item = (RgBufferHandle, RgBufferTrackInfo)>,
    ) -> Self {
        let images = images
            .into_iter()
            .map(|(handle, info)| {
                let mips = info.initial.iter().map(|t| RgStateSlot::new(Self::normalize(*t))).collect();
                (handle, RgImageTrack { info, mips, first_use: true })
            })
            .collect();
        let buffers = buffers
            .into_iter()
            .map(|(handle, info)| {
                let slot = RgStateSlot::new(Self::normalize(info.initial));
                (handle, RgBufferTrack { info, slot, first_use: true })
            })
            .collect();

        Self {
            requirements,
            pass_names,
            images,
            buffers,
            edge_lookup: HashMap::new(),
            plan: RgSyncPlan {
                passes: vec![RgPassSync::default(); requirements.len()],
                ..Default::default()
            },
        }
    }

    /// 内容未定义的资源不属于任何队列
    fn normalize<S: RgSyncState>(tracked: RgTrackedState<S>) -> RgTrackedState<S> {
        if tracked.state.is_undefined() {
            RgTrackedState::new(tracked.state, None)
        } else {
            tracked
        }
    }
}

// 主流程
impl RgStateTracker<'_> {
    /// 按调度顺序模拟执行，生成整帧同步方案
    pub fn run(mut self, aliasing: &RgAliasingPlan) -> Result<RgSyncPlan, RgError> {
        let all_requirements = self.requirements;
        for (pos, requirements) in all_requirements.iter().enumerate() {
            let queue = requirements.queue;

            for image_req in &requirements.images {
                self.process_image(pos, queue, image_req, aliasing)?;
            }
            for buffer_req in &requirements.buffers {
                self.process_buffer(pos, queue, buffer_req, aliasing);
            }
        }

        for (handle, track) in &self.images {
            if track.info.imported {
                self.plan.final_image_states.insert(handle, track.mips.iter().map(|m| m.tracked).collect());
            }
        }
        for (handle, track) in &self.buffers {
            if track.info.imported {
                self.plan.final_buffer_states.insert(handle, track.slot.tracked);
            }
        }

        Ok(self.plan)
    }

    fn process_image(
        &mut self,
        pos: usize,
        queue: RgQueueType,
        req: &RgImageRequirement,
        aliasing: &RgAliasingPlan,
    ) -> Result<(), RgError> {
        let image = req.image;
        let Some(track) = self.images.get(image) else {
            return Err(RgError::UnknownResource {
                pass: self.pass_names[pos].clone(),
            });
        };
        let (aspect, layers) = (track.info.aspect, track.info.array_layers);

        if track.first_use {
            self.inherit_aliased_image(image, aliasing);

            let track = &self.images[image];
            if let Some(value) = track.info.clear {
                if req.attachment {
                    self.plan.passes[pos].attachment_clears.push(image);
                } else {
                    if queue == RgQueueType::Transfer {
                        return Err(RgError::UnsupportedClear {
                            pass: self.pass_names[pos].clone(),
                            resource: track.info.name.clone(),
                        });
                    }
                    self.clear_image(pos, queue, image, value, aspect, layers);
                }
            }
            self.images[image].first_use = false;
        }

        if req.attachment {
            let track = &self.images[image];
            let undefined = req
                .mips
                .iter()
                .zip(&track.mips)
                .filter(|(mip_req, _)| mip_req.is_some())
                .all(|(_, slot)| slot.tracked.state.layout == vk::ImageLayout::UNDEFINED);
            if undefined {
                self.plan.passes[pos].attachment_discards.push(image);
            }
        }

        for (mip, mip_req) in req.mips.iter().enumerate() {
            let Some(mip_req) = mip_req else {
                continue;
            };

            let entry = if mip_req.then_view.is_none() && mip_req.entry.is_read_only() {
                self.widen_image_read(pos, queue, image, mip, mip_req.entry)
            } else {
                mip_req.entry
            };

            let transition = self.transition_image(pos, queue, image, mip, entry, aspect, layers);
            self.apply_image_transition(pos, queue, transition, |sync| &mut sync.barriers);

            if let Some(view) = mip_req.then_view {
                let exit = if mip_req.exit.is_read_only() {
                    self.widen_image_read(pos, queue, image, mip, mip_req.exit)
                } else {
                    mip_req.exit
                };
                let slot = &mut self.images[image].mips[mip];
                let barrier = RgImageBarrierDesc::new(image, slot.tracked.state, exit)
                    .with_aspect(aspect)
                    .with_mips(mip as u32, 1, layers);
                slot.tracked.state = exit;

                if barrier.needs_barrier() {
                    let intra = &mut self.plan.passes[pos].intra_pass_barriers;
                    match intra.last_mut() {
                        Some(last) if last.view == view && last.barrier.mergeable_with(&barrier) => {
                            last.barrier.range.level_count += barrier.range.level_count;
                        }
                        _ => intra.push(RgIntraPassBarrier { view, barrier }),
                    }
                }
            }
        }

        Ok(())
    }

    fn process_buffer(&mut self, pos: usize, queue: RgQueueType, req: &RgBufferRequirement, aliasing: &RgAliasingPlan) {
        let buffer = req.buffer;
        let Some(track) = self.buffers.get(buffer) else {
            return;
        };

        if track.first_use {
            self.inherit_aliased_buffer(buffer, aliasing);
            if let Some(value) = self.buffers[buffer].info.clear {
                let transition = self.transition_buffer(pos, queue, buffer, RgBufferState::TRANSFER_DST);
                self.apply_buffer_transition(pos, queue, transition, |sync| &mut sync.clear_barriers);
                self.plan.passes[pos].clears.push(RgClearOp::Buffer { buffer, value });
            }
            self.buffers[buffer].first_use = false;
        }

        let state = if req.state.is_read_only() { self.widen_buffer_read(pos, queue, buffer, req.state) } else { req.state };
        let transition = self.transition_buffer(pos, queue, buffer, state);
        self.apply_buffer_transition(pos, queue, transition, |sync| &mut sync.barriers);
    }
}

// 图像状态转换
impl RgStateTracker<'_> {
    /// 清除整个图像：所有 mip 转到 TRANSFER_DST，记录清除操作
    fn clear_image(
        &mut self,
        pos: usize,
        queue: RgQueueType,
        image: RgImageHandle,
        value: RgClearValue,
        aspect: vk::ImageAspectFlags,
        layers: u32,
    ) {
        let mip_count = self.images[image].mips.len();
        for mip in 0..mip_count {
            let transition = self.transition_image(pos, queue, image, mip, RgImageState::TRANSFER_DST, aspect, layers);
            self.apply_image_transition(pos, queue, transition, |sync| &mut sync.clear_barriers);
        }
        self.plan.passes[pos].clears.push(RgClearOp::Image {
            image,
            value,
            range: RgImageSubresourceRange {
                aspect,
                base_mip_level: 0,
                level_count: mip_count as u32,
                base_array_layer: 0,
                layer_count: layers,
            },
        });
    }

    /// 新租户接管别名内存：src 为上一个租户的最终 stage / 写 access
    fn inherit_aliased_image(&mut self, image: RgImageHandle, aliasing: &RgAliasingPlan) {
        let Some(RgResourceId::Image(prev)) = aliasing.predecessor(RgResourceId::Image(image)) else {
            return;
        };
        let Some(prev_track) = self.images.get(prev) else {
            return;
        };

        let mut stage = vk::PipelineStageFlags2::NONE;
        let mut access = vk::AccessFlags2::NONE;
        let mut queue = None;
        let mut last_pos = None;
        for mip in &prev_track.mips {
            stage |= mip.tracked.state.stage;
            access |= mip.tracked.state.src_access();
            if mip.last_pos >= last_pos {
                last_pos = mip.last_pos;
                queue = mip.tracked.queue;
            }
        }

        let inherited = RgImageState::new(stage, access, vk::ImageLayout::UNDEFINED);
        for slot in &mut self.images[image].mips {
            slot.tracked = RgTrackedState::new(inherited, queue);
            slot.last_pos = last_pos;
            slot.discard = true;
        }
    }

    /// 向后查找同队列、同 layout 的连续只读使用，合并它们的 stage / access
    fn widen_image_read(
        &self,
        pos: usize,
        queue: RgQueueType,
        image: RgImageHandle,
        mip: usize,
        state: RgImageState,
    ) -> RgImageState {
        let mut widened = state;
        for next in &self.requirements[pos + 1..] {
            let Some(next_req) = next.image_mip(image, mip) else {
                continue;
            };
            let extends_run = next.queue == queue
                && next_req.then_view.is_none()
                && next_req.entry.is_read_only()
                && next_req.entry.layout == state.layout;
            if !extends_run {
                break;
            }
            widened = widened.union(&next_req.entry);
        }
        widened
    }

    #[allow(clippy::too_many_arguments)]
    fn transition_image(
        &mut self,
        pos: usize,
        queue: RgQueueType,
        image: RgImageHandle,
        mip: usize,
        dst: RgImageState,
        aspect: vk::ImageAspectFlags,
        layers: u32,
    ) -> RgTransition<RgImageBarrierDesc> {
        let slot = &mut self.images[image].mips[mip];
        let src = slot.tracked;
        let base = |src_state: RgImageState, dst_state: RgImageState| {
            RgImageBarrierDesc::new(image, src_state, dst_state).with_aspect(aspect).with_mips(mip as u32, 1, layers)
        };

        let transition = match src.queue {
            Some(owner) if owner != queue && !src.state.is_undefined() => RgTransition::Transfer {
                release: base(src.state, RgImageState::new(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE, dst.layout))
                    .with_queue_transfer(owner, queue),
                acquire: base(
                    RgImageState::new(RgQueueEdge::WAIT_STAGE, vk::AccessFlags2::NONE, src.state.layout),
                    dst,
                )
                .with_queue_transfer(owner, queue),
                owner,
                producer: slot.last_pos,
            },
            _ => {
                let mut barrier = base(src.state, dst);
                if slot.discard {
                    barrier = barrier.with_discard();
                }
                if barrier.needs_barrier() {
                    RgTransition::Local(barrier)
                } else {
                    RgTransition::None
                }
            }
        };

        slot.tracked = match transition {
            RgTransition::None => RgTrackedState::new(src.state.union(&dst), Some(queue)),
            _ => RgTrackedState::new(dst, Some(queue)),
        };
        slot.last_pos = Some(pos);
        slot.discard = false;

        transition
    }

    fn apply_image_transition(
        &mut self,
        pos: usize,
        queue: RgQueueType,
        transition: RgTransition<RgImageBarrierDesc>,
        target: impl FnOnce(&mut RgPassSync) -> &mut RgPassBarriers,
    ) {
        match transition {
            RgTransition::None => {}
            RgTransition::Local(barrier) => target(&mut self.plan.passes[pos]).push_image_barrier(barrier),
            RgTransition::Transfer {
                release,
                acquire,
                owner,
                producer,
            } => {
                self.add_edge(producer, owner, pos, queue);
                self.release_list(producer, owner).push_image_barrier(release);
                self.plan.passes[pos].acquire_barriers.push_image_barrier(acquire);
            }
        }
    }
}

// 缓冲区状态转换
impl RgStateTracker<'_> {
    fn inherit_aliased_buffer(&mut self, buffer: RgBufferHandle, aliasing: &RgAliasingPlan) {
        let Some(RgResourceId::Buffer(prev)) = aliasing.predecessor(RgResourceId::Buffer(buffer)) else {
            return;
        };
        let Some(prev_track) = self.buffers.get(prev) else {
            return;
        };
        let prev_slot = prev_track.slot;

        let inherited = RgBufferState::new(prev_slot.tracked.state.stage, prev_slot.tracked.state.src_access());
        let slot = &mut self.buffers[buffer].slot;
        slot.tracked = RgTrackedState::new(inherited, prev_slot.tracked.queue);
        slot.last_pos = prev_slot.last_pos;
        slot.discard = true;
    }

    fn widen_buffer_read(&self, pos: usize, queue: RgQueueType, buffer: RgBufferHandle, state: RgBufferState) -> RgBufferState {
        let mut widened = state;
        for next in &self.requirements[pos + 1..] {
            let Some(next_req) = next.buffer(buffer) else {
                continue;
            };
            if next.queue != queue || next_req.state.is_write() {
                break;
            }
            widened = widened.union(&next_req.state);
        }
        widened
    }

    fn transition_buffer(
        &mut self,
        pos: usize,
        queue: RgQueueType,
        buffer: RgBufferHandle,
        dst: RgBufferState,
    ) -> RgTransition<RgBufferBarrierDesc> {
        let slot = &mut self.buffers[buffer].slot;
        let src = slot.tracked;

        let transition = match src.queue {
            Some(owner) if owner != queue && !src.state.is_undefined() => RgTransition::Transfer {
                release: RgBufferBarrierDesc::new(buffer, src.state, RgBufferState::new(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE))
                    .with_queue_transfer(owner, queue),
                acquire: RgBufferBarrierDesc::new(buffer, RgBufferState::new(RgQueueEdge::WAIT_STAGE, vk::AccessFlags2::NONE), dst)
                    .with_queue_transfer(owner, queue),
                owner,
                producer: slot.last_pos,
            },
            // 首次使用的缓冲区没有需要等待的内容
            _ if src.state.is_undefined() && !slot.discard => RgTransition::None,
            _ => {
                let mut barrier = RgBufferBarrierDesc::new(buffer, src.state, dst);
                if slot.discard {
                    barrier = barrier.with_discard();
                }
                if barrier.needs_barrier() {
                    RgTransition::Local(barrier)
                } else {
                    RgTransition::None
                }
            }
        };

        slot.tracked = match (&transition, src.state.is_undefined()) {
            (RgTransition::None, false) => RgTrackedState::new(src.state.union(&dst), Some(queue)),
            _ => RgTrackedState::new(dst, Some(queue)),
        };
        slot.last_pos = Some(pos);
        slot.discard = false;

        transition
    }

    fn apply_buffer_transition(
        &mut self,
        pos: usize,
        queue: RgQueueType,
        transition: RgTransition<RgBufferBarrierDesc>,
        target: impl FnOnce(&mut RgPassSync) -> &mut RgPassBarriers,
    ) {
        match transition {
            RgTransition::None => {}
            RgTransition::Local(barrier) => target(&mut self.plan.passes[pos]).buffer_barriers.push(barrier),
            RgTransition::Transfer {
                release,
                acquire,
                owner,
                producer,
            } => {
                self.add_edge(producer, owner, pos, queue);
                self.release_list(producer, owner).buffer_barriers.push(release);
                self.plan.passes[pos].acquire_barriers.buffer_barriers.push(acquire);
            }
        }
    }
}

// 跨队列依赖
impl RgStateTracker<'_> {
    fn release_list(&mut self, producer: Option<usize>, owner: RgQueueType) -> &mut RgPassBarriers {
        match producer {
            Some(producer) => &mut self.plan.passes[producer].release_barriers,
            None => &mut self.plan.prologue_releases[owner.index()],
        }
    }

    fn add_edge(&mut self, producer: Option<usize>, src_queue: RgQueueType, consumer: usize, dst_queue: RgQueueType) {
        let key = (producer, src_queue, consumer);
        if self.edge_lookup.contains_key(&key) {
            return;
        }

        let edge_id = self.plan.edges.len();
        self.plan.edges.push(RgQueueEdge {
            producer,
            src_queue,
            consumer,
            dst_queue,
        });
        self.edge_lookup.insert(key, edge_id);

        match producer {
            Some(producer) => self.plan.passes[producer].signals.push(edge_id),
            None => self.plan.prologue_signals[src_queue.index()].push(edge_id),
        }
        self.plan.passes[consumer].waits.push(edge_id);
    }
}
