//! 基于 ash + vk-mem 的 `RgDevice` 实现
//!
//! 需要 Vulkan 1.3（synchronization2 与 dynamic rendering）。
//! 三个逻辑队列可以映射到相同或不同的队列族；相同时队列所有权转移由执行器省略。

use std::ffi::CString;

use ash::vk;
use itertools::Itertools;
use vk_mem::Alloc;

use super::buffer_resource::RgBufferDesc;
use super::device::{RgBufferBarrier, RgDevice, RgImageBarrier, RgRenderingAttachment, RgRenderingInfo};
use super::image_resource::{RgClearValue, RgImageDesc, RgImageSubresourceRange};
use super::queue::RgQueueType;
use super::semaphore_info::RgSemaphoreInfo;

/// 逻辑队列对应的物理队列
#[derive(Clone, Copy, Debug)]
pub struct RgVulkanQueue {
    pub queue: vk::Queue,
    pub family_index: u32,
}

pub struct RgVulkanCommandList {
    command_buffer: vk::CommandBuffer,
    queue: RgQueueType,
}

impl RgVulkanCommandList {
    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}

/// # destroy
///
/// 命令池由 `RgVulkanDevice` 创建，需要显式调用 `destroy`
pub struct RgVulkanDevice<'a> {
    device: &'a ash::Device,
    allocator: &'a vk_mem::Allocator,
    debug_utils: Option<&'a ash::ext::debug_utils::Device>,

    queues: [RgVulkanQueue; RgQueueType::COUNT],
    command_pools: [vk::CommandPool; RgQueueType::COUNT],
}

// new & init
impl<'a> RgVulkanDevice<'a> {
    /// `queues` 按 `RgQueueType::ALL` 的顺序给出
    pub fn new(
        device: &'a ash::Device,
        allocator: &'a vk_mem::Allocator,
        debug_utils: Option<&'a ash::ext::debug_utils::Device>,
        queues: [RgVulkanQueue; RgQueueType::COUNT],
    ) -> Self {
        let command_pools = queues.map(|q| {
            let info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(q.family_index)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            unsafe { device.create_command_pool(&info, None).unwrap() }
        });

        let rg_device = Self {
            device,
            allocator,
            debug_utils,
            queues,
            command_pools,
        };
        for queue in RgQueueType::ALL {
            rg_device.set_debug_name(rg_device.command_pools[queue.index()], &format!("rg-{}-pool", queue.name()));
        }
        rg_device
    }
}

// destroy
impl RgVulkanDevice<'_> {
    /// 调用前需要保证所有命令列表都已经释放
    pub fn destroy(self) {
        for pool in self.command_pools {
            unsafe { self.device.destroy_command_pool(pool, None) };
        }
    }
}

// tools
impl RgVulkanDevice<'_> {
    fn set_debug_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        let name = CString::new(name).unwrap();
        unsafe {
            debug_utils
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
                )
                .unwrap();
        }
    }

    fn semaphore_infos(infos: &[RgSemaphoreInfo<vk::Semaphore>]) -> Vec<vk::SemaphoreSubmitInfo<'static>> {
        infos
            .iter()
            .map(|info| {
                vk::SemaphoreSubmitInfo::default()
                    .semaphore(info.semaphore)
                    .stage_mask(info.stage)
                    .value(info.value.unwrap_or_default())
            })
            .collect_vec()
    }

    fn attachment_info(attachment: &RgRenderingAttachment<vk::ImageView>) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(attachment.view)
            .image_layout(attachment.layout)
            .load_op(attachment.load_op)
            .store_op(attachment.store_op)
            .clear_value(attachment.clear_value.to_vk())
    }
}

impl RgDevice for RgVulkanDevice<'_> {
    type Image = vk::Image;
    type Buffer = vk::Buffer;
    type ImageView = vk::ImageView;
    type Memory = vk_mem::Allocation;
    type Semaphore = vk::Semaphore;
    type CommandList = RgVulkanCommandList;

    #[inline]
    fn queue_family_index(&self, queue: RgQueueType) -> u32 {
        self.queues[queue.index()].family_index
    }

    fn create_image(&mut self, name: &str, desc: &RgImageDesc) -> vk::Image {
        let info = vk::ImageCreateInfo::default()
            .image_type(desc.image_type)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: desc.depth,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(desc.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.device.create_image(&info, None).unwrap() };
        self.set_debug_name(image, name);
        image
    }

    fn destroy_image(&mut self, image: vk::Image) {
        unsafe { self.device.destroy_image(image, None) };
    }

    fn create_buffer(&mut self, name: &str, desc: &RgBufferDesc) -> vk::Buffer {
        let info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&info, None).unwrap() };
        self.set_debug_name(buffer, name);
        buffer
    }

    fn destroy_buffer(&mut self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) };
    }

    fn create_image_view(
        &mut self,
        image: vk::Image,
        format: vk::Format,
        view_type: vk::ImageViewType,
        range: &RgImageSubresourceRange,
    ) -> vk::ImageView {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(range.to_vk());
        unsafe { self.device.create_image_view(&info, None).unwrap() }
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn allocate_memory(&mut self, name: &str, requirements: &vk::MemoryRequirements) -> vk_mem::Allocation {
        let create_info = vk_mem::AllocationCreateInfo {
            required_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            memory_type_bits: requirements.memory_type_bits,
            ..Default::default()
        };
        let allocation = unsafe { self.allocator.allocate_memory(requirements, &create_info).unwrap() };
        log::trace!("RenderGraph: allocate {} ({} bytes)", name, requirements.size);
        allocation
    }

    fn bind_image_memory(&mut self, image: vk::Image, memory: &mut vk_mem::Allocation) {
        unsafe { self.allocator.bind_image_memory(memory, image).unwrap() };
    }

    fn bind_buffer_memory(&mut self, buffer: vk::Buffer, memory: &mut vk_mem::Allocation) {
        unsafe { self.allocator.bind_buffer_memory(memory, buffer).unwrap() };
    }

    fn free_memory(&mut self, mut memory: vk_mem::Allocation) {
        unsafe { self.allocator.free_memory(&mut memory) };
    }

    fn create_semaphore(&mut self, name: &str) -> vk::Semaphore {
        let semaphore = unsafe { self.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None).unwrap() };
        self.set_debug_name(semaphore, name);
        semaphore
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    fn begin_command_list(&mut self, queue: RgQueueType, name: &str) -> RgVulkanCommandList {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pools[queue.index()])
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { self.device.allocate_command_buffers(&info).unwrap()[0] };
        self.set_debug_name(command_buffer, name);

        unsafe {
            self.device
                .begin_command_buffer(
                    command_buffer,
                    &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
                )
                .unwrap();
        }
        RgVulkanCommandList { command_buffer, queue }
    }

    fn submit(
        &mut self,
        queue: RgQueueType,
        cmd: &mut RgVulkanCommandList,
        waits: &[RgSemaphoreInfo<vk::Semaphore>],
        signals: &[RgSemaphoreInfo<vk::Semaphore>],
    ) {
        debug_assert_eq!(cmd.queue, queue);
        unsafe { self.device.end_command_buffer(cmd.command_buffer).unwrap() };

        // submit_info 引用这些数组的内存
        let command_buffers = [vk::CommandBufferSubmitInfo::default().command_buffer(cmd.command_buffer)];
        let wait_infos = Self::semaphore_infos(waits);
        let signal_infos = Self::semaphore_infos(signals);
        let submit_info = vk::SubmitInfo2::default()
            .command_buffer_infos(&command_buffers)
            .wait_semaphore_infos(&wait_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe {
            self.device
                .queue_submit2(self.queues[queue.index()].queue, std::slice::from_ref(&submit_info), vk::Fence::null())
                .unwrap();
        }
    }

    fn free_command_list(&mut self, cmd: RgVulkanCommandList) {
        unsafe {
            self.device.free_command_buffers(self.command_pools[cmd.queue.index()], &[cmd.command_buffer]);
        }
    }

    fn cmd_pipeline_barrier(
        &mut self,
        cmd: &mut RgVulkanCommandList,
        image_barriers: &[RgImageBarrier<vk::Image>],
        buffer_barriers: &[RgBufferBarrier<vk::Buffer>],
    ) {
        let image_barriers = image_barriers
            .iter()
            .map(|b| {
                vk::ImageMemoryBarrier2::default()
                    .image(b.image)
                    .src_stage_mask(b.src_stage)
                    .src_access_mask(b.src_access)
                    .dst_stage_mask(b.dst_stage)
                    .dst_access_mask(b.dst_access)
                    .old_layout(b.old_layout)
                    .new_layout(b.new_layout)
                    .src_queue_family_index(b.src_queue_family)
                    .dst_queue_family_index(b.dst_queue_family)
                    .subresource_range(b.range.to_vk())
            })
            .collect_vec();
        let buffer_barriers = buffer_barriers
            .iter()
            .map(|b| {
                vk::BufferMemoryBarrier2::default()
                    .buffer(b.buffer)
                    .src_stage_mask(b.src_stage)
                    .src_access_mask(b.src_access)
                    .dst_stage_mask(b.dst_stage)
                    .dst_access_mask(b.dst_access)
                    .src_queue_family_index(b.src_queue_family)
                    .dst_queue_family_index(b.dst_queue_family)
                    .offset(b.offset)
                    .size(b.size)
            })
            .collect_vec();

        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers);
        unsafe { self.device.cmd_pipeline_barrier2(cmd.command_buffer, &dependency_info) };
    }

    fn cmd_clear_image(
        &mut self,
        cmd: &mut RgVulkanCommandList,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: &RgClearValue,
        range: &RgImageSubresourceRange,
    ) {
        let ranges = [range.to_vk()];
        match *value {
            RgClearValue::Color(color) => unsafe {
                self.device.cmd_clear_color_image(
                    cmd.command_buffer,
                    image,
                    layout,
                    &vk::ClearColorValue { float32: color },
                    &ranges,
                );
            },
            RgClearValue::DepthStencil { depth, stencil } => unsafe {
                self.device.cmd_clear_depth_stencil_image(
                    cmd.command_buffer,
                    image,
                    layout,
                    &vk::ClearDepthStencilValue { depth, stencil },
                    &ranges,
                );
            },
        }
    }

    fn cmd_fill_buffer(
        &mut self,
        cmd: &mut RgVulkanCommandList,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        value: u32,
    ) {
        unsafe { self.device.cmd_fill_buffer(cmd.command_buffer, buffer, offset, size, value) };
    }

    fn cmd_begin_rendering(&mut self, cmd: &mut RgVulkanCommandList, info: &RgRenderingInfo<vk::ImageView>) {
        let color_attachments = info.color_attachments.iter().map(Self::attachment_info).collect_vec();
        let depth_attachment = info.depth_attachment.as_ref().map(Self::attachment_info);

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: info.extent,
            })
            .layer_count(info.layer_count)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = &depth_attachment {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        unsafe { self.device.cmd_begin_rendering(cmd.command_buffer, &rendering_info) };
    }

    fn cmd_end_rendering(&mut self, cmd: &mut RgVulkanCommandList) {
        unsafe { self.device.cmd_end_rendering(cmd.command_buffer) };
    }

    fn cmd_begin_label(&mut self, cmd: &mut RgVulkanCommandList, name: &str) {
        let Some(debug_utils) = self.debug_utils else {
            return;
        };
        let name = CString::new(name).unwrap();
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                cmd.command_buffer,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color([1.0, 1.0, 1.0, 1.0]),
            );
        }
    }

    fn cmd_end_label(&mut self, cmd: &mut RgVulkanCommandList) {
        if let Some(debug_utils) = self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(cmd.command_buffer) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_of<D: RgDevice>() -> std::any::TypeId
    where
        D::Memory: 'static,
    {
        std::any::TypeId::of::<D::Memory>()
    }

    #[test]
    fn test_vulkan_device_memory_is_vma_allocation() {
        assert_eq!(memory_of::<RgVulkanDevice<'static>>(), std::any::TypeId::of::<vk_mem::Allocation>());
    }
}
