use ash::vk;

use super::device::RgDevice;
use super::error::RgError;
use super::external_state::RgBufferExternalState;
use super::resource_handle::RgBufferHandle;

/// 缓冲区资源描述（用于创建临时资源）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgBufferDesc {
    /// 缓冲区大小（字节）
    pub size: vk::DeviceSize,
    /// 缓冲区用途
    pub usage: vk::BufferUsageFlags,
    /// 首次使用时是否用 `clear_value` 填充
    pub clear: bool,
    pub clear_value: u32,
}

impl Default for RgBufferDesc {
    fn default() -> Self {
        Self {
            size: 0,
            usage: vk::BufferUsageFlags::STORAGE_BUFFER,
            clear: false,
            clear_value: 0,
        }
    }
}

// new & init
impl RgBufferDesc {
    /// 创建新描述
    #[inline]
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self {
            size,
            usage,
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_clear(mut self, value: u32) -> Self {
        self.clear = true;
        self.clear_value = value;
        self
    }

    pub fn validate(&self, name: &str) -> Result<(), RgError> {
        if self.size == 0 {
            return Err(RgError::InvalidBufferDesc {
                name: name.to_string(),
                reason: "size must be non-zero".to_string(),
            });
        }
        if self.usage.is_empty() {
            return Err(RgError::InvalidBufferDesc {
                name: name.to_string(),
                reason: "usage flags are empty".to_string(),
            });
        }
        Ok(())
    }
}

/// 缓冲区资源的来源
pub enum RgBufferSource<'a, D: RgDevice> {
    /// 从外部导入的缓冲区，状态记录在执行结束时写回
    Imported {
        buffer: D::Buffer,
        external: &'a mut RgBufferExternalState,
    },
    /// 由 RenderGraph 创建的临时缓冲区
    Transient,
}

/// 缓冲区资源条目
pub struct RgBufferResource<'a, D: RgDevice> {
    /// 调试名称
    pub name: String,
    pub desc: RgBufferDesc,
    /// 资源来源
    pub source: RgBufferSource<'a, D>,
}

// new & init
impl<'a, D: RgDevice> RgBufferResource<'a, D> {
    /// 创建导入的缓冲区资源
    pub fn imported(
        name: impl Into<String>,
        desc: RgBufferDesc,
        buffer: D::Buffer,
        external: &'a mut RgBufferExternalState,
    ) -> Self {
        Self {
            name: name.into(),
            desc,
            source: RgBufferSource::Imported { buffer, external },
        }
    }

    /// 创建临时缓冲区资源
    pub fn transient(name: impl Into<String>, desc: RgBufferDesc) -> Self {
        Self {
            name: name.into(),
            desc,
            source: RgBufferSource::Transient,
        }
    }
}

// getter
impl<D: RgDevice> RgBufferResource<'_, D> {
    #[inline]
    pub fn is_imported(&self) -> bool {
        matches!(self.source, RgBufferSource::Imported { .. })
    }

    /// 获取物理 buffer（仅对导入资源有效）
    #[inline]
    pub fn imported_buffer(&self) -> Option<D::Buffer> {
        match &self.source {
            RgBufferSource::Imported { buffer, .. } => Some(*buffer),
            RgBufferSource::Transient => None,
        }
    }

    #[inline]
    pub fn external_state(&self) -> Option<&RgBufferExternalState> {
        match &self.source {
            RgBufferSource::Imported { external, .. } => Some(external),
            RgBufferSource::Transient => None,
        }
    }
}

/// 缓冲区视图描述：`[offset, offset + size)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBufferViewDesc {
    pub buffer: RgBufferHandle,
    pub offset: vk::DeviceSize,
    /// `vk::WHOLE_SIZE` 表示到缓冲区末尾
    pub size: vk::DeviceSize,
}

impl RgBufferViewDesc {
    #[inline]
    pub fn whole(buffer: RgBufferHandle) -> Self {
        Self {
            buffer,
            offset: 0,
            size: vk::WHOLE_SIZE,
        }
    }

    #[inline]
    pub fn range(buffer: RgBufferHandle, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self { buffer, offset, size }
    }
}

/// 执行时解析出的缓冲区视图
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBufferViewInfo<B> {
    pub buffer: B,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}
