//! Pass 对资源的期望状态：(stage, access[, layout])
//!
//! 常用组合以常量给出；`RgTrackedState` 额外记录当前拥有资源的队列。

use std::fmt::Debug;

use ash::vk;

use super::queue::RgQueueType;

/// 需要 flush 的 access
pub(crate) const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::SHADER_WRITE.as_raw()
        | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
        | vk::AccessFlags2::HOST_WRITE.as_raw()
        | vk::AccessFlags2::MEMORY_WRITE.as_raw()
        | vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR.as_raw(),
);

const ATTACHMENT_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
);

const FRAGMENT_TESTS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);

/// 状态跟踪器对 image / buffer 状态的统一抽象
///
/// buffer 没有 layout，`layout()` 恒为 `UNDEFINED`。
pub trait RgSyncState: Copy + PartialEq + Debug {
    fn stage(&self) -> vk::PipelineStageFlags2;
    fn access(&self) -> vk::AccessFlags2;
    fn layout(&self) -> vk::ImageLayout;

    /// 保持 layout，替换 stage 和 access
    fn with_masks(&self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self;

    /// 是否是尚未被使用过的初始状态
    fn is_undefined(&self) -> bool;

    #[inline]
    fn is_write(&self) -> bool {
        self.access().intersects(WRITE_ACCESS)
    }

    #[inline]
    fn is_read_only(&self) -> bool {
        !self.is_write()
    }

    /// 用于 barrier src 的 access：只有写操作需要 flush
    #[inline]
    fn src_access(&self) -> vk::AccessFlags2 {
        self.access() & WRITE_ACCESS
    }

    /// 合并两个同 layout 的状态（stage 与 access 取并集）
    #[inline]
    fn union(&self, other: &Self) -> Self {
        self.with_masks(self.stage() | other.stage(), self.access() | other.access())
    }
}

/// 两个相邻使用之间是否需要 barrier
///
/// layout 不同一定需要；任何一侧有写操作需要（保证可见性 / WAR）；
/// 只读到只读且 layout 相同可以省略。
#[inline]
pub fn needs_barrier<S: RgSyncState>(src: &S, dst: &S) -> bool {
    src.layout() != dst.layout() || src.is_write() || dst.is_write()
}

/// 图像在一次使用中的 stage / access / layout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgImageState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
    pub layout: vk::ImageLayout,
}

impl Default for RgImageState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// 常量
impl RgImageState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// 首次使用前，内容无意义
    pub const UNDEFINED: Self =
        Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 任意用途，最保守的状态
    pub const GENERAL: Self = Self::new(
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::from_raw(vk::AccessFlags2::MEMORY_READ.as_raw() | vk::AccessFlags2::MEMORY_WRITE.as_raw()),
        vk::ImageLayout::GENERAL,
    );

    /// 只写 color attachment，不读取旧内容
    pub const COLOR_ATTACHMENT_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// blend 等需要读取旧内容的 color attachment
    pub const COLOR_ATTACHMENT_READ_WRITE: Self = Self::new(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw() | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// 深度测试并写入
    pub const DEPTH_ATTACHMENT_WRITE: Self = Self::new(
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    pub const DEPTH_ATTACHMENT_READ_WRITE: Self = Self::new(
        FRAGMENT_TESTS,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );

    /// 只做深度测试
    pub const DEPTH_ATTACHMENT_READ: Self = Self::new(
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    );

    /// fragment shader 采样
    pub const SHADER_READ_FRAGMENT: Self = Self::new(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// compute shader 采样
    pub const SHADER_READ_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    pub const SHADER_READ_RAY_TRACING: Self = Self::new(
        vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// storage image，compute
    pub const STORAGE_READ_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_READ,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_READ_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
        vk::ImageLayout::GENERAL,
    );

    /// storage image，ray tracing
    pub const STORAGE_WRITE_RAY_TRACING: Self = Self::new(
        vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    pub const STORAGE_READ_WRITE_RAY_TRACING: Self = Self::new(
        vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
        vk::ImageLayout::GENERAL,
    );

    /// copy / blit 的源与目标
    pub const TRANSFER_SRC: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    pub const TRANSFER_DST: Self = Self::new(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    /// 交给 present
    pub const PRESENT: Self =
        Self::new(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);
}

// 辅助方法
impl RgImageState {
    /// 是否作为 color / depth attachment 使用
    #[inline]
    pub fn is_attachment(&self) -> bool {
        self.is_color_attachment() || self.is_depth_attachment()
    }

    #[inline]
    pub fn is_color_attachment(&self) -> bool {
        self.layout == vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            || self.access.intersects(
                vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            )
    }

    #[inline]
    pub fn is_depth_attachment(&self) -> bool {
        matches!(
            self.layout,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
                | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                | vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL
                | vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL
        ) && self.access.intersects(ATTACHMENT_ACCESS)
    }
}

impl RgSyncState for RgImageState {
    #[inline]
    fn stage(&self) -> vk::PipelineStageFlags2 {
        self.stage
    }

    #[inline]
    fn access(&self) -> vk::AccessFlags2 {
        self.access
    }

    #[inline]
    fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    #[inline]
    fn with_masks(&self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self::new(stage, access, self.layout)
    }

    #[inline]
    fn is_undefined(&self) -> bool {
        self.layout == vk::ImageLayout::UNDEFINED
    }
}

/// 缓冲区在一次使用中的 stage / access，没有 layout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgBufferState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl Default for RgBufferState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// 常量
impl RgBufferState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { stage, access }
    }

    pub const UNDEFINED: Self = Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE);

    /// 顶点 / 索引输入
    pub const VERTEX_BUFFER: Self =
        Self::new(vk::PipelineStageFlags2::VERTEX_INPUT, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ);

    pub const INDEX_BUFFER: Self = Self::new(vk::PipelineStageFlags2::INDEX_INPUT, vk::AccessFlags2::INDEX_READ);

    /// 各 shader stage 的 uniform 读取
    pub const UNIFORM_VERTEX: Self = Self::new(vk::PipelineStageFlags2::VERTEX_SHADER, vk::AccessFlags2::UNIFORM_READ);

    pub const UNIFORM_FRAGMENT: Self =
        Self::new(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::UNIFORM_READ);

    pub const UNIFORM_COMPUTE: Self =
        Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::UNIFORM_READ);

    /// compute shader 中的 storage buffer
    pub const STORAGE_READ_COMPUTE: Self =
        Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ);

    pub const STORAGE_WRITE_COMPUTE: Self =
        Self::new(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE);

    pub const STORAGE_READ_WRITE_COMPUTE: Self = Self::new(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
    );

    /// draw / dispatch indirect 参数
    pub const INDIRECT_BUFFER: Self =
        Self::new(vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::INDIRECT_COMMAND_READ);

    pub const TRANSFER_SRC: Self = Self::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);

    pub const TRANSFER_DST: Self = Self::new(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);

    /// CPU 回读
    pub const HOST_READ: Self = Self::new(vk::PipelineStageFlags2::HOST, vk::AccessFlags2::HOST_READ);

    /// BLAS / TLAS 构建时读取的输入
    pub const ACCELERATION_STRUCTURE_BUILD_INPUT: Self = Self::new(
        vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR,
        vk::AccessFlags2::ACCELERATION_STRUCTURE_READ_KHR,
    );
}

impl RgSyncState for RgBufferState {
    #[inline]
    fn stage(&self) -> vk::PipelineStageFlags2 {
        self.stage
    }

    #[inline]
    fn access(&self) -> vk::AccessFlags2 {
        self.access
    }

    #[inline]
    fn layout(&self) -> vk::ImageLayout {
        vk::ImageLayout::UNDEFINED
    }

    #[inline]
    fn with_masks(&self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self::new(stage, access)
    }

    #[inline]
    fn is_undefined(&self) -> bool {
        *self == Self::UNDEFINED
    }
}

/// 被跟踪的资源状态：最后一次使用的 stage/access/layout 以及所属队列
///
/// `queue == None` 表示资源尚未被任何队列拥有（内容未定义）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RgTrackedState<S> {
    pub state: S,
    pub queue: Option<RgQueueType>,
}

impl<S: RgSyncState> RgTrackedState<S> {
    #[inline]
    pub fn new(state: S, queue: Option<RgQueueType>) -> Self {
        Self { state, queue }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_src_access_drops_reads() {
        let state = RgImageState::STORAGE_READ_WRITE_COMPUTE;
        assert_eq!(state.src_access(), vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(RgImageState::SHADER_READ_COMPUTE.src_access(), vk::AccessFlags2::NONE);
    }

    #[test]
    fn test_attachment_classification() {
        assert!(RgImageState::COLOR_ATTACHMENT_WRITE.is_color_attachment());
        assert!(RgImageState::DEPTH_ATTACHMENT_READ.is_depth_attachment());
        assert!(!RgImageState::STORAGE_WRITE_COMPUTE.is_attachment());
        assert!(!RgImageState::SHADER_READ_FRAGMENT.is_attachment());
    }

    #[test]
    fn test_buffer_read_to_read_needs_no_barrier() {
        assert!(!needs_barrier(&RgBufferState::UNIFORM_COMPUTE, &RgBufferState::INDIRECT_BUFFER));
        assert!(needs_barrier(&RgBufferState::STORAGE_WRITE_COMPUTE, &RgBufferState::INDIRECT_BUFFER));
        assert!(needs_barrier(&RgBufferState::INDIRECT_BUFFER, &RgBufferState::TRANSFER_DST));
    }
}
