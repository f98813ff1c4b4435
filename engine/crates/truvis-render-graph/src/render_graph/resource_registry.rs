use ash::vk;
use slotmap::{SecondaryMap, SlotMap};

use super::buffer_resource::{RgBufferResource, RgBufferSource, RgBufferViewDesc};
use super::device::RgDevice;
use super::error::RgError;
use super::image_resource::{RgImageDesc, RgImageResource, RgImageSource, RgImageViewDesc, RgImageViewResource};
use super::resource_handle::{RgBufferHandle, RgBufferViewHandle, RgImageHandle, RgImageViewHandle};

/// 资源注册表
///
/// 管理 RenderGraph 中所有声明的资源和视图，提供虚拟句柄到资源信息的映射。
/// 使用 SlotMap 存储资源，句柄带代际信息，过期句柄不会解析到新资源。
pub struct RgResourceRegistry<'a, D: RgDevice> {
    /// 图像资源表
    images: SlotMap<RgImageHandle, RgImageResource<'a, D>>,
    /// 缓冲区资源表
    buffers: SlotMap<RgBufferHandle, RgBufferResource<'a, D>>,
    image_views: SlotMap<RgImageViewHandle, RgImageViewResource>,
    /// 已归一化（size 不为 WHOLE_SIZE）的缓冲区视图
    buffer_views: SlotMap<RgBufferViewHandle, RgBufferViewDesc>,
    /// 以图像句柄声明的使用共用一个覆盖整个图像的视图
    default_image_views: SecondaryMap<RgImageHandle, RgImageViewHandle>,
}

impl<D: RgDevice> Default for RgResourceRegistry<'_, D> {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl<D: RgDevice> RgResourceRegistry<'_, D> {
    /// 创建新的资源注册表
    pub fn new() -> Self {
        Self {
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            image_views: SlotMap::with_key(),
            buffer_views: SlotMap::with_key(),
            default_image_views: SecondaryMap::new(),
        }
    }
}

// register
impl<'a, D: RgDevice> RgResourceRegistry<'a, D> {
    /// 注册图像，描述非法时 panic
    pub fn register_image(&mut self, rg_image_resource: RgImageResource<'a, D>) -> RgImageHandle {
        self.try_register_image(rg_image_resource).unwrap_or_else(|e| panic!("RenderGraph: {e}"))
    }

    pub fn try_register_image(&mut self, mut rg_image_resource: RgImageResource<'a, D>) -> Result<RgImageHandle, RgError> {
        rg_image_resource.desc.validate(&rg_image_resource.name)?;
        let mip_levels = rg_image_resource.desc.mip_levels;
        if let RgImageSource::Imported { external, .. } = &mut rg_image_resource.source {
            external.resize(mip_levels);
        }
        Ok(self.images.insert(rg_image_resource))
    }

    /// 注册缓冲区，描述非法时 panic
    pub fn register_buffer(&mut self, rg_buffer_resource: RgBufferResource<'a, D>) -> RgBufferHandle {
        self.try_register_buffer(rg_buffer_resource).unwrap_or_else(|e| panic!("RenderGraph: {e}"))
    }

    pub fn try_register_buffer(&mut self, rg_buffer_resource: RgBufferResource<'a, D>) -> Result<RgBufferHandle, RgError> {
        rg_buffer_resource.desc.validate(&rg_buffer_resource.name)?;
        Ok(self.buffers.insert(rg_buffer_resource))
    }

    /// 注册图像视图，范围越界时 panic
    pub fn register_image_view(&mut self, desc: RgImageViewDesc) -> RgImageViewHandle {
        self.try_register_image_view(desc).unwrap_or_else(|e| panic!("RenderGraph: {e}"))
    }

    pub fn try_register_image_view(&mut self, desc: RgImageViewDesc) -> Result<RgImageViewHandle, RgError> {
        let image = self.images.get(desc.image).ok_or_else(|| RgError::InvalidImageView {
            name: "<unknown>".to_string(),
            reason: "image handle is not registered".to_string(),
        })?;
        let image_desc = &image.desc;
        let invalid = |reason: &str| RgError::InvalidImageView {
            name: image.name.clone(),
            reason: reason.to_string(),
        };

        let mut range = desc.range;
        if range.level_count == vk::REMAINING_MIP_LEVELS {
            range.level_count = image_desc.mip_levels.saturating_sub(range.base_mip_level);
        }
        if range.layer_count == vk::REMAINING_ARRAY_LAYERS {
            range.layer_count = image_desc.array_layers.saturating_sub(range.base_array_layer);
        }
        if range.aspect.is_empty() {
            range.aspect = image_desc.aspect();
        }

        if range.level_count == 0
            || range.base_mip_level.checked_add(range.level_count).is_none_or(|end| end > image_desc.mip_levels)
        {
            return Err(invalid("mip range is out of bounds"));
        }
        if range.layer_count == 0
            || range.base_array_layer.checked_add(range.layer_count).is_none_or(|end| end > image_desc.array_layers)
        {
            return Err(invalid("array layer range is out of bounds"));
        }
        if !image_desc.aspect().contains(range.aspect) {
            return Err(invalid("aspect is not present in the image format"));
        }

        let view_type = desc
            .view_type
            .unwrap_or_else(|| RgImageDesc::infer_view_type(image_desc.image_type, range.layer_count));

        Ok(self.image_views.insert(RgImageViewResource {
            image: desc.image,
            range,
            view_type,
        }))
    }

    /// 覆盖整个图像的默认视图，首次请求时创建
    pub fn default_image_view(&mut self, image: RgImageHandle) -> Result<RgImageViewHandle, RgError> {
        if let Some(&view) = self.default_image_views.get(image) {
            return Ok(view);
        }
        let view = self.try_register_image_view(RgImageViewDesc::full(image))?;
        self.default_image_views.insert(image, view);
        Ok(view)
    }

    /// 注册缓冲区视图，范围越界时 panic
    pub fn register_buffer_view(&mut self, desc: RgBufferViewDesc) -> RgBufferViewHandle {
        self.try_register_buffer_view(desc).unwrap_or_else(|e| panic!("RenderGraph: {e}"))
    }

    pub fn try_register_buffer_view(&mut self, desc: RgBufferViewDesc) -> Result<RgBufferViewHandle, RgError> {
        let buffer = self.buffers.get(desc.buffer).ok_or_else(|| RgError::InvalidBufferView {
            name: "<unknown>".to_string(),
            reason: "buffer handle is not registered".to_string(),
        })?;
        let total = buffer.desc.size;

        let size = if desc.size == vk::WHOLE_SIZE { total.saturating_sub(desc.offset) } else { desc.size };
        if size == 0 || desc.offset.checked_add(size).is_none_or(|end| end > total) {
            return Err(RgError::InvalidBufferView {
                name: buffer.name.clone(),
                reason: format!("range [{}, +{}) exceeds buffer size {}", desc.offset, size, total),
            });
        }

        Ok(self.buffer_views.insert(RgBufferViewDesc { size, ..desc }))
    }
}

// getter & iter
impl<'a, D: RgDevice> RgResourceRegistry<'a, D> {
    /// 获取图像资源
    #[inline]
    pub fn get_image(&self, handle: RgImageHandle) -> Option<&RgImageResource<'a, D>> {
        self.images.get(handle)
    }

    /// 获取可变图像资源
    #[inline]
    pub fn get_image_mut(&mut self, handle: RgImageHandle) -> Option<&mut RgImageResource<'a, D>> {
        self.images.get_mut(handle)
    }

    /// 获取缓冲区资源
    #[inline]
    pub fn get_buffer(&self, handle: RgBufferHandle) -> Option<&RgBufferResource<'a, D>> {
        self.buffers.get(handle)
    }

    /// 获取可变缓冲区资源
    #[inline]
    pub fn get_buffer_mut(&mut self, handle: RgBufferHandle) -> Option<&mut RgBufferResource<'a, D>> {
        self.buffers.get_mut(handle)
    }

    #[inline]
    pub fn get_image_view(&self, handle: RgImageViewHandle) -> Option<&RgImageViewResource> {
        self.image_views.get(handle)
    }

    #[inline]
    pub fn get_buffer_view(&self, handle: RgBufferViewHandle) -> Option<&RgBufferViewDesc> {
        self.buffer_views.get(handle)
    }

    #[inline]
    pub fn get_default_image_view(&self, image: RgImageHandle) -> Option<RgImageViewHandle> {
        self.default_image_views.get(image).copied()
    }

    #[inline]
    pub fn image_name(&self, handle: RgImageHandle) -> &str {
        self.images.get(handle).map(|r| r.name.as_str()).unwrap_or("<unknown>")
    }

    #[inline]
    pub fn buffer_name(&self, handle: RgBufferHandle) -> &str {
        self.buffers.get(handle).map(|r| r.name.as_str()).unwrap_or("<unknown>")
    }

    /// 获取图像数量
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// 获取缓冲区数量
    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// 迭代所有图像资源
    #[inline]
    pub fn iter_images(&self) -> impl Iterator<Item = (RgImageHandle, &RgImageResource<'a, D>)> {
        self.images.iter()
    }

    /// 迭代所有缓冲区资源
    #[inline]
    pub fn iter_buffers(&self) -> impl Iterator<Item = (RgBufferHandle, &RgBufferResource<'a, D>)> {
        self.buffers.iter()
    }

    #[inline]
    pub fn iter_image_views(&self) -> impl Iterator<Item = (RgImageViewHandle, &RgImageViewResource)> {
        self.image_views.iter()
    }

    #[inline]
    pub fn iter_buffer_views(&self) -> impl Iterator<Item = (RgBufferViewHandle, &RgBufferViewDesc)> {
        self.buffer_views.iter()
    }

    pub(crate) fn iter_images_mut(&mut self) -> impl Iterator<Item = (RgImageHandle, &mut RgImageResource<'a, D>)> {
        self.images.iter_mut()
    }

    pub(crate) fn iter_buffers_mut(&mut self) -> impl Iterator<Item = (RgBufferHandle, &mut RgBufferResource<'a, D>)> {
        self.buffers.iter_mut()
    }

    #[inline]
    pub fn is_buffer_imported(&self, handle: RgBufferHandle) -> bool {
        self.buffers.get(handle).is_some_and(|b| matches!(b.source, RgBufferSource::Imported { .. }))
    }
}
