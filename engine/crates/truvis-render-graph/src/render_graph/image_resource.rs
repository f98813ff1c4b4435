use ash::vk;

use super::device::RgDevice;
use super::error::RgError;
use super::external_state::RgImageExternalState;
use super::resource_handle::RgImageHandle;

/// 资源首次使用时写入的清除值
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RgClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl Default for RgClearValue {
    fn default() -> Self {
        Self::Color([0.0; 4])
    }
}

impl RgClearValue {
    pub fn to_vk(&self) -> vk::ClearValue {
        match *self {
            Self::Color(color) => vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
            Self::DepthStencil { depth, stencil } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
        }
    }
}

/// 图像资源描述（用于创建临时资源）
///
/// 包含创建 `vk::Image` 所需的所有信息，以及首次使用时是否需要清除。
#[derive(Clone, Debug, PartialEq)]
pub struct RgImageDesc {
    /// 图像宽度
    pub width: u32,
    /// 图像高度
    pub height: u32,
    /// 图像深度（3D 纹理）
    pub depth: u32,
    /// Mip 级别数
    pub mip_levels: u32,
    /// 数组层数
    pub array_layers: u32,
    /// 图像格式
    pub format: vk::Format,
    /// 图像用途
    pub usage: vk::ImageUsageFlags,
    /// 采样数
    pub samples: vk::SampleCountFlags,
    /// 图像类型
    pub image_type: vk::ImageType,
    /// 首次使用时是否清除
    pub clear: bool,
    /// 清除值，仅在 `clear` 为 true 时使用
    pub clear_value: RgClearValue,
}

impl Default for RgImageDesc {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE,
            samples: vk::SampleCountFlags::TYPE_1,
            image_type: vk::ImageType::TYPE_2D,
            clear: false,
            clear_value: RgClearValue::default(),
        }
    }
}

// new & init & builder
impl RgImageDesc {
    /// 创建 2D 图像描述
    #[inline]
    pub fn new_2d(width: u32, height: u32, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
        }
    }

    /// 设置用途（链式调用）
    #[inline]
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    #[inline]
    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
    }

    /// 首次使用时清除为 `value`
    #[inline]
    pub fn with_clear(mut self, value: RgClearValue) -> Self {
        self.clear = true;
        self.clear_value = value;
        self
    }
}

// getters
impl RgImageDesc {
    /// 从格式推断 aspect
    pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
        match format {
            vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
                vk::ImageAspectFlags::DEPTH
            }
            vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
            vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            }
            _ => vk::ImageAspectFlags::COLOR,
        }
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        Self::infer_aspect(self.format)
    }

    /// 从图像类型推断视图类型
    pub fn infer_view_type(image_type: vk::ImageType, array_layers: u32) -> vk::ImageViewType {
        match image_type {
            vk::ImageType::TYPE_1D => {
                if array_layers > 1 {
                    vk::ImageViewType::TYPE_1D_ARRAY
                } else {
                    vk::ImageViewType::TYPE_1D
                }
            }
            vk::ImageType::TYPE_3D => vk::ImageViewType::TYPE_3D,
            _ => {
                if array_layers > 1 {
                    vk::ImageViewType::TYPE_2D_ARRAY
                } else {
                    vk::ImageViewType::TYPE_2D
                }
            }
        }
    }

    /// 指定 mip 的尺寸
    #[inline]
    pub fn mip_extent(&self, level: u32) -> vk::Extent3D {
        vk::Extent3D {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }

    /// 完整 mip 链的级数
    #[inline]
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        u32::BITS - largest.leading_zeros()
    }

    pub fn validate(&self, name: &str) -> Result<(), RgError> {
        let invalid = |reason: &str| {
            Err(RgError::InvalidImageDesc {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return invalid("extent must be non-zero");
        }
        if self.mip_levels == 0 || self.array_layers == 0 {
            return invalid("mip levels and array layers must be at least 1");
        }
        if self.mip_levels > self.max_mip_levels() {
            return invalid("mip levels exceed the full mip chain");
        }
        if self.format == vk::Format::UNDEFINED {
            return invalid("format is undefined");
        }
        if self.samples.as_raw().count_ones() != 1 {
            return invalid("sample count must be a single power of two");
        }
        if self.samples != vk::SampleCountFlags::TYPE_1 && self.mip_levels != 1 {
            return invalid("multisampled images cannot have mip levels");
        }
        if self.image_type != vk::ImageType::TYPE_3D && self.depth != 1 {
            return invalid("only 3D images may have depth");
        }
        if self.image_type == vk::ImageType::TYPE_1D && self.height != 1 {
            return invalid("1D images must have height 1");
        }
        Ok(())
    }
}

/// 图像子资源范围
///
/// 计数为 `vk::REMAINING_*` 时，在创建视图时会被归一化为实际数量。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgImageSubresourceRange {
    pub aspect: vk::ImageAspectFlags,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

impl RgImageSubresourceRange {
    /// 所有 mip 和 layer，aspect 由格式推断
    pub const ALL: Self = Self {
        aspect: vk::ImageAspectFlags::empty(),
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    };

    /// 单个 mip 的所有 layer
    #[inline]
    pub fn mip(level: u32) -> Self {
        Self {
            base_mip_level: level,
            level_count: 1,
            ..Self::ALL
        }
    }

    #[inline]
    pub fn mips(base_mip_level: u32, level_count: u32) -> Self {
        Self {
            base_mip_level,
            level_count,
            ..Self::ALL
        }
    }

    #[inline]
    pub fn mip_range(&self) -> std::ops::Range<u32> {
        self.base_mip_level..self.base_mip_level + self.level_count
    }

    #[inline]
    pub fn to_vk(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: self.base_mip_level,
            level_count: self.level_count,
            base_array_layer: self.base_array_layer,
            layer_count: self.layer_count,
        }
    }
}

/// 图像视图描述
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgImageViewDesc {
    pub image: RgImageHandle,
    pub range: RgImageSubresourceRange,
    /// 为 None 时根据图像类型推断
    pub view_type: Option<vk::ImageViewType>,
}

impl RgImageViewDesc {
    /// 覆盖整个图像的视图
    #[inline]
    pub fn full(image: RgImageHandle) -> Self {
        Self {
            image,
            range: RgImageSubresourceRange::ALL,
            view_type: None,
        }
    }

    #[inline]
    pub fn mip(image: RgImageHandle, level: u32) -> Self {
        Self {
            image,
            range: RgImageSubresourceRange::mip(level),
            view_type: None,
        }
    }
}

/// 图像资源的来源
pub enum RgImageSource<'a, D: RgDevice> {
    /// 从外部导入的图像，状态记录在执行结束时写回
    Imported {
        image: D::Image,
        external: &'a mut RgImageExternalState,
    },
    /// 由 RenderGraph 创建的临时图像
    Transient,
}

/// 图像资源条目
pub struct RgImageResource<'a, D: RgDevice> {
    /// 调试名称
    pub name: String,
    pub desc: RgImageDesc,
    /// 资源来源
    pub source: RgImageSource<'a, D>,
}

// new & init
impl<'a, D: RgDevice> RgImageResource<'a, D> {
    /// 创建导入的图像资源
    pub fn imported(
        name: impl Into<String>,
        desc: RgImageDesc,
        image: D::Image,
        external: &'a mut RgImageExternalState,
    ) -> Self {
        Self {
            name: name.into(),
            desc,
            source: RgImageSource::Imported { image, external },
        }
    }

    /// 创建临时图像资源
    pub fn transient(name: impl Into<String>, desc: RgImageDesc) -> Self {
        Self {
            name: name.into(),
            desc,
            source: RgImageSource::Transient,
        }
    }
}

// getters
impl<D: RgDevice> RgImageResource<'_, D> {
    #[inline]
    pub fn is_imported(&self) -> bool {
        matches!(self.source, RgImageSource::Imported { .. })
    }

    /// 获取物理 image（仅对导入资源有效）
    #[inline]
    pub fn imported_image(&self) -> Option<D::Image> {
        match &self.source {
            RgImageSource::Imported { image, .. } => Some(*image),
            RgImageSource::Transient => None,
        }
    }

    #[inline]
    pub fn external_state(&self) -> Option<&RgImageExternalState> {
        match &self.source {
            RgImageSource::Imported { external, .. } => Some(external),
            RgImageSource::Transient => None,
        }
    }
}

/// 已注册的图像视图
#[derive(Clone, Debug)]
pub struct RgImageViewResource {
    pub image: RgImageHandle,
    /// 已归一化的范围（不含 REMAINING 计数，aspect 非空）
    pub range: RgImageSubresourceRange,
    pub view_type: vk::ImageViewType,
}
