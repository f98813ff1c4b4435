//! 不访问 GPU 的设备实现
//!
//! 所有句柄都是递增的整数，命令被记录下来供测试检查提交顺序、
//! barrier 与 semaphore。

use std::collections::{HashMap, HashSet};

use ash::vk;

use super::buffer_resource::RgBufferDesc;
use super::device::{RgBufferBarrier, RgDevice, RgImageBarrier, RgRenderingInfo};
use super::image_resource::{RgClearValue, RgImageDesc, RgImageSubresourceRange};
use super::queue::RgQueueType;
use super::semaphore_info::RgSemaphoreInfo;

/// 录制下来的命令
#[derive(Clone, Debug, PartialEq)]
pub enum RgDummyCommand {
    Barrier {
        images: Vec<RgImageBarrier<u64>>,
        buffers: Vec<RgBufferBarrier<u64>>,
    },
    ClearImage {
        image: u64,
        layout: vk::ImageLayout,
        value: RgClearValue,
        range: RgImageSubresourceRange,
    },
    FillBuffer {
        buffer: u64,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        value: u32,
    },
    BeginRendering(RgRenderingInfo<u64>),
    EndRendering,
    BeginLabel(String),
    EndLabel,
    /// Pass 回调自行写入的标记
    Marker(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RgDummyCommandList {
    pub id: u64,
    pub queue: RgQueueType,
    pub name: String,
    pub commands: Vec<RgDummyCommand>,
}

impl RgDummyCommandList {
    /// Pass 回调中写入标记，便于检查录制顺序
    pub fn marker(&mut self, text: impl Into<String>) {
        self.commands.push(RgDummyCommand::Marker(text.into()));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RgDummySubmission {
    pub queue: RgQueueType,
    pub name: String,
    pub commands: Vec<RgDummyCommand>,
    pub waits: Vec<RgSemaphoreInfo<u64>>,
    pub signals: Vec<RgSemaphoreInfo<u64>>,
}

impl RgDummySubmission {
    /// 所有 barrier 命令中的图像 barrier
    pub fn image_barriers(&self) -> impl Iterator<Item = &RgImageBarrier<u64>> {
        self.commands.iter().flat_map(|c| match c {
            RgDummyCommand::Barrier { images, .. } => images.as_slice(),
            _ => [].as_slice(),
        })
    }

    pub fn buffer_barriers(&self) -> impl Iterator<Item = &RgBufferBarrier<u64>> {
        self.commands.iter().flat_map(|c| match c {
            RgDummyCommand::Barrier { buffers, .. } => buffers.as_slice(),
            _ => [].as_slice(),
        })
    }

    /// pipeline barrier 调用次数
    pub fn barrier_call_count(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, RgDummyCommand::Barrier { .. })).count()
    }

    pub fn markers(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RgDummyCommand::Marker(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct RgDummyMemory {
    pub id: u64,
    pub size: vk::DeviceSize,
}

#[derive(Debug)]
pub struct RgDummyDevice {
    next_handle: u64,
    queue_families: [u32; RgQueueType::COUNT],
    live_objects: HashSet<u64>,
    names: HashMap<u64, String>,
    /// 资源 -> 绑定的内存
    bindings: HashMap<u64, u64>,
    pub submissions: Vec<RgDummySubmission>,
    pub freed_command_lists: usize,
}

impl Default for RgDummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl RgDummyDevice {
    /// 三个队列分别属于不同的队列族
    pub fn new() -> Self {
        Self::with_queue_families([0, 1, 2])
    }

    pub fn with_queue_families(queue_families: [u32; RgQueueType::COUNT]) -> Self {
        Self {
            next_handle: 1,
            queue_families,
            live_objects: HashSet::new(),
            names: HashMap::new(),
            bindings: HashMap::new(),
            submissions: Vec::new(),
            freed_command_lists: 0,
        }
    }

    fn alloc_handle(&mut self, name: &str) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.live_objects.insert(handle);
        self.names.insert(handle, name.to_string());
        log::trace!("RgDummyDevice: create {} -> {}", name, handle);
        handle
    }

    fn release_handle(&mut self, handle: u64) {
        assert!(self.live_objects.remove(&handle), "RgDummyDevice: double free of handle {handle}");
    }
}

// getters
impl RgDummyDevice {
    #[inline]
    pub fn live_object_count(&self) -> usize {
        self.live_objects.len()
    }

    #[inline]
    pub fn is_live(&self, handle: u64) -> bool {
        self.live_objects.contains(&handle)
    }

    pub fn name_of(&self, handle: u64) -> Option<&str> {
        self.names.get(&handle).map(String::as_str)
    }

    /// 资源绑定的内存
    pub fn memory_of(&self, resource: u64) -> Option<u64> {
        self.bindings.get(&resource).copied()
    }

    pub fn submissions_on(&self, queue: RgQueueType) -> impl Iterator<Item = &RgDummySubmission> {
        self.submissions.iter().filter(move |s| s.queue == queue)
    }
}

impl RgDevice for RgDummyDevice {
    type Image = u64;
    type Buffer = u64;
    type ImageView = u64;
    type Memory = RgDummyMemory;
    type Semaphore = u64;
    type CommandList = RgDummyCommandList;

    fn queue_family_index(&self, queue: RgQueueType) -> u32 {
        self.queue_families[queue.index()]
    }

    fn create_image(&mut self, name: &str, _desc: &RgImageDesc) -> u64 {
        self.alloc_handle(name)
    }

    fn destroy_image(&mut self, image: u64) {
        self.bindings.remove(&image);
        self.release_handle(image);
    }

    fn create_buffer(&mut self, name: &str, _desc: &RgBufferDesc) -> u64 {
        self.alloc_handle(name)
    }

    fn destroy_buffer(&mut self, buffer: u64) {
        self.bindings.remove(&buffer);
        self.release_handle(buffer);
    }

    fn create_image_view(
        &mut self,
        image: u64,
        _format: vk::Format,
        _view_type: vk::ImageViewType,
        range: &RgImageSubresourceRange,
    ) -> u64 {
        let name = format!("view-{}-mip{}", image, range.base_mip_level);
        self.alloc_handle(&name)
    }

    fn destroy_image_view(&mut self, view: u64) {
        self.release_handle(view);
    }

    fn image_memory_requirements(&self, _image: u64) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 64 * 1024,
            alignment: 256,
            memory_type_bits: 1,
        }
    }

    fn buffer_memory_requirements(&self, _buffer: u64) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 4 * 1024,
            alignment: 256,
            memory_type_bits: 1,
        }
    }

    fn allocate_memory(&mut self, name: &str, requirements: &vk::MemoryRequirements) -> RgDummyMemory {
        RgDummyMemory {
            id: self.alloc_handle(name),
            size: requirements.size,
        }
    }

    fn bind_image_memory(&mut self, image: u64, memory: &mut RgDummyMemory) {
        self.bindings.insert(image, memory.id);
    }

    fn bind_buffer_memory(&mut self, buffer: u64, memory: &mut RgDummyMemory) {
        self.bindings.insert(buffer, memory.id);
    }

    fn free_memory(&mut self, memory: RgDummyMemory) {
        self.release_handle(memory.id);
    }

    fn create_semaphore(&mut self, name: &str) -> u64 {
        self.alloc_handle(name)
    }

    fn destroy_semaphore(&mut self, semaphore: u64) {
        self.release_handle(semaphore);
    }

    fn begin_command_list(&mut self, queue: RgQueueType, name: &str) -> RgDummyCommandList {
        RgDummyCommandList {
            id: self.alloc_handle(name),
            queue,
            name: name.to_string(),
            commands: Vec::new(),
        }
    }

    fn submit(
        &mut self,
        queue: RgQueueType,
        cmd: &mut RgDummyCommandList,
        waits: &[RgSemaphoreInfo<u64>],
        signals: &[RgSemaphoreInfo<u64>],
    ) {
        assert_eq!(cmd.queue, queue, "RgDummyDevice: command list recorded for another queue");
        self.submissions.push(RgDummySubmission {
            queue,
            name: cmd.name.clone(),
            commands: cmd.commands.clone(),
            waits: waits.to_vec(),
            signals: signals.to_vec(),
        });
    }

    fn free_command_list(&mut self, cmd: RgDummyCommandList) {
        self.freed_command_lists += 1;
        self.release_handle(cmd.id);
    }

    fn cmd_pipeline_barrier(
        &mut self,
        cmd: &mut RgDummyCommandList,
        image_barriers: &[RgImageBarrier<u64>],
        buffer_barriers: &[RgBufferBarrier<u64>],
    ) {
        cmd.commands.push(RgDummyCommand::Barrier {
            images: image_barriers.to_vec(),
            buffers: buffer_barriers.to_vec(),
        });
    }

    fn cmd_clear_image(
        &mut self,
        cmd: &mut RgDummyCommandList,
        image: u64,
        layout: vk::ImageLayout,
        value: &RgClearValue,
        range: &RgImageSubresourceRange,
    ) {
        cmd.commands.push(RgDummyCommand::ClearImage {
            image,
            layout,
            value: *value,
            range: *range,
        });
    }

    fn cmd_fill_buffer(
        &mut self,
        cmd: &mut RgDummyCommandList,
        buffer: u64,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        value: u32,
    ) {
        cmd.commands.push(RgDummyCommand::FillBuffer {
            buffer,
            offset,
            size,
            value,
        });
    }

    fn cmd_begin_rendering(&mut self, cmd: &mut RgDummyCommandList, info: &RgRenderingInfo<u64>) {
        cmd.commands.push(RgDummyCommand::BeginRendering(info.clone()));
    }

    fn cmd_end_rendering(&mut self, cmd: &mut RgDummyCommandList) {
        cmd.commands.push(RgDummyCommand::EndRendering);
    }

    fn cmd_begin_label(&mut self, cmd: &mut RgDummyCommandList, name: &str) {
        cmd.commands.push(RgDummyCommand::BeginLabel(name.to_string()));
    }

    fn cmd_end_label(&mut self, cmd: &mut RgDummyCommandList) {
        cmd.commands.push(RgDummyCommand::EndLabel);
    }
}
