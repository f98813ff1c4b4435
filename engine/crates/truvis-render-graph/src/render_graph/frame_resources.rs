//! 跨帧复用的执行资源
//!
//! 每一帧执行结束后，临时资源、命令列表和跨队列 semaphore 不能立即销毁，
//! 必须等到 GPU 完成该帧。这里按 frame in flight 槽位延迟释放：
//! 调用方在 `begin_frame` 之前等待该槽位的 fence，之后即可回收。

use slotmap::{SlotMap, new_key_type};

use super::device::RgDevice;

/// frame in flight 数量
const FIF_COUNT: usize = 3;

new_key_type! {
    /// semaphore 池中的槽位（索引 + 代际）
    pub struct RgSemaphoreKey;
}

/// 等待 GPU 完成后才能释放的对象
pub enum RgDeferredRelease<D: RgDevice> {
    Image(D::Image),
    Buffer(D::Buffer),
    ImageView(D::ImageView),
    Memory(D::Memory),
    CommandList(D::CommandList),
}

struct RgFrameSlot<D: RgDevice> {
    /// 本帧借出的 semaphore，回收后放回池中
    semaphores: Vec<RgSemaphoreKey>,
    releases: Vec<RgDeferredRelease<D>>,
}

impl<D: RgDevice> Default for RgFrameSlot<D> {
    fn default() -> Self {
        Self {
            semaphores: Vec::new(),
            releases: Vec::new(),
        }
    }
}

pub struct RgFrameResources<D: RgDevice> {
    /// 当前的帧序号
    frame_id: u64,
    slots: [RgFrameSlot<D>; FIF_COUNT],
    /// 持有所有创建过的 semaphore
    semaphores: SlotMap<RgSemaphoreKey, D::Semaphore>,
    free_semaphores: Vec<RgSemaphoreKey>,
}

impl<D: RgDevice> Default for RgFrameResources<D> {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl<D: RgDevice> RgFrameResources<D> {
    pub const FIF_COUNT: usize = FIF_COUNT;

    pub fn new() -> Self {
        Self {
            frame_id: 0,
            slots: std::array::from_fn(|_| RgFrameSlot::default()),
            semaphores: SlotMap::with_key(),
            free_semaphores: Vec::new(),
        }
    }
}

// phase methods
impl<D: RgDevice> RgFrameResources<D> {
    /// 进入新的一帧，回收 `frame_id` 对应槽位上一轮留下的资源
    ///
    /// 调用前必须确认该槽位上一次提交的工作已经完成。
    pub fn begin_frame(&mut self, device: &mut D, frame_id: u64) {
        self.frame_id = frame_id;
        let slot = &mut self.slots[Self::slot_index(frame_id)];

        let release_count = slot.releases.len();
        for release in slot.releases.drain(..) {
            Self::release(device, release);
        }
        self.free_semaphores.append(&mut slot.semaphores);

        if release_count > 0 {
            log::debug!("RenderGraph: frame {} recycled {} deferred objects", frame_id, release_count);
        }
    }

    /// 借出一个 binary semaphore，本帧结束后的第 FIF_COUNT 帧归还
    pub fn acquire_semaphore(&mut self, device: &mut D) -> D::Semaphore {
        let key = match self.free_semaphores.pop() {
            Some(key) => key,
            None => {
                let name = format!("rg-queue-edge-{}", self.semaphores.len() + 1);
                self.semaphores.insert(device.create_semaphore(&name))
            }
        };
        self.slots[Self::slot_index(self.frame_id)].semaphores.push(key);
        self.semaphores[key]
    }

    /// 当前帧的 GPU 工作完成后再释放
    pub fn defer(&mut self, release: RgDeferredRelease<D>) {
        self.slots[Self::slot_index(self.frame_id)].releases.push(release);
    }

    /// 立即销毁所有资源；调用前必须等待设备空闲
    pub fn destroy(mut self, device: &mut D) {
        for slot in &mut self.slots {
            for release in slot.releases.drain(..) {
                Self::release(device, release);
            }
            slot.semaphores.clear();
        }
        self.free_semaphores.clear();
        for (_, semaphore) in self.semaphores.drain() {
            device.destroy_semaphore(semaphore);
        }
    }

    fn release(device: &mut D, release: RgDeferredRelease<D>) {
        match release {
            RgDeferredRelease::Image(image) => device.destroy_image(image),
            RgDeferredRelease::Buffer(buffer) => device.destroy_buffer(buffer),
            RgDeferredRelease::ImageView(view) => device.destroy_image_view(view),
            RgDeferredRelease::Memory(memory) => device.free_memory(memory),
            RgDeferredRelease::CommandList(cmd) => device.free_command_list(cmd),
        }
    }
}

// getters
impl<D: RgDevice> RgFrameResources<D> {
    #[inline]
    fn slot_index(frame_id: u64) -> usize {
        (frame_id % Self::FIF_COUNT as u64) as usize
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// 尚未释放的延迟对象数量
    pub fn pending_release_count(&self) -> usize {
        self.slots.iter().map(|s| s.releases.len()).sum()
    }

    #[inline]
    pub fn pooled_semaphore_count(&self) -> usize {
        self.free_semaphores.len()
    }

    /// 池中 semaphore 总数（空闲 + 借出）
    #[inline]
    pub fn semaphore_count(&self) -> usize {
        self.semaphores.len()
    }
}
