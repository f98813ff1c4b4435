//! RenderGraph 资源句柄定义
//!
//! 这些句柄是 graph 内部的虚拟引用，与设备上的物理对象分离。
//! 句柄由 SlotMap 生成（索引 + 代际），只在当前帧的构建周期内有效。

use slotmap::new_key_type;

new_key_type! {
    /// Graph 内部的 Image 句柄
    pub struct RgImageHandle;

    /// Graph 内部的 Buffer 句柄
    pub struct RgBufferHandle;

    /// Image 的某个子资源范围（mip / layer）的视图
    pub struct RgImageViewHandle;

    /// Buffer 的某个字节范围的视图
    pub struct RgBufferViewHandle;
}

/// 不区分类型的资源 id，用于依赖分析和别名分析
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RgResourceId {
    Image(RgImageHandle),
    Buffer(RgBufferHandle),
}

impl From<RgImageHandle> for RgResourceId {
    fn from(handle: RgImageHandle) -> Self {
        Self::Image(handle)
    }
}

impl From<RgBufferHandle> for RgResourceId {
    fn from(handle: RgBufferHandle) -> Self {
        Self::Buffer(handle)
    }
}
