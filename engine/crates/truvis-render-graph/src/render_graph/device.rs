//! RenderGraph 与底层图形 API 之间的显式接口
//!
//! graph 不依赖任何全局设备单例，所有物理对象的创建、命令录制与提交
//! 都经由调用方注入的 `RgDevice` 完成。

use std::fmt::Debug;

use ash::vk;

use super::buffer_resource::RgBufferDesc;
use super::image_resource::{RgClearValue, RgImageDesc, RgImageSubresourceRange};
use super::queue::RgQueueType;
use super::semaphore_info::RgSemaphoreInfo;

/// 解析到物理 image 后的 barrier
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgImageBarrier<I> {
    pub image: I,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    /// 不做所有权转移时两者均为 `vk::QUEUE_FAMILY_IGNORED`
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub range: RgImageSubresourceRange,
}

/// 解析到物理 buffer 后的 barrier
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgBufferBarrier<B> {
    pub buffer: B,
    pub src_stage: vk::PipelineStageFlags2,
    pub src_access: vk::AccessFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_queue_family: u32,
    pub dst_queue_family: u32,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

/// dynamic rendering 的附件
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RgRenderingAttachment<V> {
    pub view: V,
    pub layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: RgClearValue,
}

/// 由 Pass 的 attachment 使用推导出的 render pass 描述
#[derive(Clone, Debug, PartialEq)]
pub struct RgRenderingInfo<V> {
    pub extent: vk::Extent2D,
    pub layer_count: u32,
    pub color_attachments: Vec<RgRenderingAttachment<V>>,
    pub depth_attachment: Option<RgRenderingAttachment<V>>,
}

/// 设备、队列与提交接口
///
/// 关联类型是各后端的原生句柄。实现方负责在出错时决定 abort 还是恢复；
/// graph 只按调用顺序驱动它。
pub trait RgDevice {
    type Image: Copy + Debug;
    type Buffer: Copy + Debug;
    type ImageView: Copy + Debug;
    type Memory;
    type Semaphore: Copy + Debug;
    type CommandList;

    fn queue_family_index(&self, queue: RgQueueType) -> u32;

    // ---------- 资源 ----------
    fn create_image(&mut self, name: &str, desc: &RgImageDesc) -> Self::Image;
    fn destroy_image(&mut self, image: Self::Image);
    fn create_buffer(&mut self, name: &str, desc: &RgBufferDesc) -> Self::Buffer;
    fn destroy_buffer(&mut self, buffer: Self::Buffer);
    fn create_image_view(
        &mut self,
        image: Self::Image,
        format: vk::Format,
        view_type: vk::ImageViewType,
        range: &RgImageSubresourceRange,
    ) -> Self::ImageView;
    fn destroy_image_view(&mut self, view: Self::ImageView);

    // ---------- 内存 ----------
    fn image_memory_requirements(&self, image: Self::Image) -> vk::MemoryRequirements;
    fn buffer_memory_requirements(&self, buffer: Self::Buffer) -> vk::MemoryRequirements;
    fn allocate_memory(&mut self, name: &str, requirements: &vk::MemoryRequirements) -> Self::Memory;
    fn bind_image_memory(&mut self, image: Self::Image, memory: &mut Self::Memory);
    fn bind_buffer_memory(&mut self, buffer: Self::Buffer, memory: &mut Self::Memory);
    fn free_memory(&mut self, memory: Self::Memory);

    // ---------- 同步 ----------
    fn create_semaphore(&mut self, name: &str) -> Self::Semaphore;
    fn destroy_semaphore(&mut self, semaphore: Self::Semaphore);

    // ---------- 命令 ----------
    fn begin_command_list(&mut self, queue: RgQueueType, name: &str) -> Self::CommandList;
    /// 结束录制并提交到 `queue`
    fn submit(
        &mut self,
        queue: RgQueueType,
        cmd: &mut Self::CommandList,
        waits: &[RgSemaphoreInfo<Self::Semaphore>],
        signals: &[RgSemaphoreInfo<Self::Semaphore>],
    );
    /// GPU 执行完毕后释放命令列表
    fn free_command_list(&mut self, cmd: Self::CommandList);

    fn cmd_pipeline_barrier(
        &mut self,
        cmd: &mut Self::CommandList,
        image_barriers: &[RgImageBarrier<Self::Image>],
        buffer_barriers: &[RgBufferBarrier<Self::Buffer>],
    );
    fn cmd_clear_image(
        &mut self,
        cmd: &mut Self::CommandList,
        image: Self::Image,
        layout: vk::ImageLayout,
        value: &RgClearValue,
        range: &RgImageSubresourceRange,
    );
    fn cmd_fill_buffer(
        &mut self,
        cmd: &mut Self::CommandList,
        buffer: Self::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        value: u32,
    );
    fn cmd_begin_rendering(&mut self, cmd: &mut Self::CommandList, info: &RgRenderingInfo<Self::ImageView>);
    fn cmd_end_rendering(&mut self, cmd: &mut Self::CommandList);
    fn cmd_begin_label(&mut self, cmd: &mut Self::CommandList, name: &str);
    fn cmd_end_label(&mut self, cmd: &mut Self::CommandList);
}
