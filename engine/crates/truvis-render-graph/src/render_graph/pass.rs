//! Pass 定义和构建器
//!
//! 提供 `RgPass` trait 用于声明式定义渲染 Pass，
//! `RgPassBuilder` 用于在 setup 阶段声明资源依赖，
//! 以及 `RgPassContext` 用于在执行阶段解析物理资源。

use ash::vk;

use super::barrier::RgIntraPassBarrier;
use super::buffer_resource::{RgBufferDesc, RgBufferResource, RgBufferViewDesc, RgBufferViewInfo};
use super::device::RgDevice;
use super::executor::RgPhysicalResources;
use super::image_resource::{RgImageDesc, RgImageResource, RgImageViewDesc};
use super::queue::RgQueueType;
use super::resource_handle::{RgBufferHandle, RgBufferViewHandle, RgImageHandle, RgImageViewHandle};
use super::resource_registry::RgResourceRegistry;
use super::resource_state::{RgBufferState, RgImageState, RgSyncState};

/// Pass 对图像（的某个视图）的一次使用
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgImageUsage {
    pub image: RgImageHandle,
    /// 以图像句柄声明时为 None，编译时替换为默认视图
    pub view: Option<RgImageViewHandle>,
    /// 进入 Pass 时需要的状态
    pub state: RgImageState,
    /// Pass 内部自行切换到的第二个状态（例如逐级生成 mip）
    pub then: Option<RgImageState>,
}

impl RgImageUsage {
    /// Pass 结束时该使用留下的状态
    #[inline]
    pub fn exit_state(&self) -> RgImageState {
        self.then.unwrap_or(self.state)
    }
}

/// Pass 对缓冲区的一次使用
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgBufferUsage {
    pub buffer: RgBufferHandle,
    pub view: Option<RgBufferViewHandle>,
    pub state: RgBufferState,
}

/// Pass 执行时的上下文
///
/// 提供 Pass 执行所需的设备、命令列表和资源解析。
/// 只有当前 Pass 声明过的资源可以被解析。
pub struct RgPassContext<'c, D: RgDevice> {
    pub device: &'c mut D,
    /// 正在录制的命令列表
    pub cmd: &'c mut D::CommandList,
    pub queue: RgQueueType,

    pub(crate) pass_name: &'c str,
    pub(crate) image_usages: &'c [RgImageUsage],
    pub(crate) buffer_usages: &'c [RgBufferUsage],
    pub(crate) intra_pass_barriers: &'c [RgIntraPassBarrier],
    pub(crate) physical: &'c RgPhysicalResources<D>,
}

impl<D: RgDevice> RgPassContext<'_, D> {
    #[inline]
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    #[inline]
    fn declares_image(&self, handle: RgImageHandle) -> bool {
        self.image_usages.iter().any(|u| u.image == handle)
    }

    #[inline]
    fn declares_buffer(&self, handle: RgBufferHandle) -> bool {
        self.buffer_usages.iter().any(|u| u.buffer == handle)
    }

    /// 获取图像的物理句柄
    #[inline]
    pub fn get_image(&self, handle: RgImageHandle) -> Option<D::Image> {
        if !self.declares_image(handle) {
            return None;
        }
        self.physical.images.get(handle).map(|(image, _)| *image)
    }

    /// 获取图像的描述信息
    #[inline]
    pub fn get_image_info(&self, handle: RgImageHandle) -> Option<&RgImageDesc> {
        if !self.declares_image(handle) {
            return None;
        }
        self.physical.images.get(handle).map(|(_, desc)| desc)
    }

    /// 获取视图的物理句柄
    pub fn get_image_view(&self, handle: RgImageViewHandle) -> Option<D::ImageView> {
        let image = *self.physical.image_view_targets.get(handle)?;
        if !self.declares_image(image) {
            return None;
        }
        self.physical.image_views.get(handle).copied()
    }

    /// 获取以图像句柄声明时使用的默认视图
    pub fn get_image_default_view(&self, handle: RgImageHandle) -> Option<D::ImageView> {
        let view = self.physical.default_image_views.get(handle)?;
        self.get_image_view(*view)
    }

    /// 获取缓冲区的物理句柄
    #[inline]
    pub fn get_buffer(&self, handle: RgBufferHandle) -> Option<D::Buffer> {
        if !self.declares_buffer(handle) {
            return None;
        }
        self.physical.buffers.get(handle).map(|(buffer, _)| *buffer)
    }

    /// 获取缓冲区的描述信息
    #[inline]
    pub fn get_buffer_info(&self, handle: RgBufferHandle) -> Option<&RgBufferDesc> {
        if !self.declares_buffer(handle) {
            return None;
        }
        self.physical.buffers.get(handle).map(|(_, desc)| desc)
    }

    pub fn get_buffer_view(&self, handle: RgBufferViewHandle) -> Option<RgBufferViewInfo<D::Buffer>> {
        let info = self.physical.buffer_views.get(handle)?;
        self.declares_buffer(info.buffer_handle).then_some(info.info)
    }

    /// 把视图从进入状态切换到 `write_image_view_then` 声明的第二个状态
    ///
    /// 屏障在编译期已经算好，这里只负责在回调选定的时机录制它。
    pub fn transition_to_secondary(&mut self, view: RgImageViewHandle) {
        let barriers = self
            .intra_pass_barriers
            .iter()
            .filter(|b| b.view == view)
            .filter_map(|b| {
                let (image, _) = self.physical.images.get(b.barrier.image)?;
                Some(b.barrier.to_native(*image, vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED))
            })
            .collect::<Vec<_>>();

        if barriers.is_empty() {
            log::warn!("RenderGraph: pass '{}' has no secondary state for view {:?}", self.pass_name, view);
            return;
        }
        self.device.cmd_pipeline_barrier(self.cmd, &barriers, &[]);
    }
}

/// Pass 构建器
///
/// 在 `RgPass::setup()` 中使用，声明 Pass 的资源依赖。
pub struct RgPassBuilder<'r, 'a, D: RgDevice> {
    /// Pass 名称
    pub(crate) name: String,
    pub(crate) queue: RgQueueType,

    pub(crate) image_usages: Vec<RgImageUsage>,
    pub(crate) buffer_usages: Vec<RgBufferUsage>,
    pub(crate) force_execution: bool,

    /// 资源注册表引用（用于创建临时资源）
    pub(crate) resources: &'r mut RgResourceRegistry<'a, D>,
}

impl<D: RgDevice> RgPassBuilder<'_, '_, D> {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn queue(&self) -> RgQueueType {
        self.queue
    }

    fn push_image(&mut self, image: RgImageHandle, view: Option<RgImageViewHandle>, state: RgImageState, then: Option<RgImageState>) {
        self.image_usages.push(RgImageUsage {
            image,
            view,
            state,
            then,
        });
    }

    fn push_image_view(&mut self, view: RgImageViewHandle, state: RgImageState, then: Option<RgImageState>) {
        // 未注册的视图留下空句柄，编译时报告 UnknownResource
        let image = self.resources.get_image_view(view).map(|v| v.image).unwrap_or_default();
        self.push_image(image, Some(view), state, then);
    }

    /// 声明读取图像
    ///
    /// # 参数
    /// - `handle`: 要读取的图像句柄
    /// - `state`: 期望的图像状态（用于自动生成 barrier）
    #[inline]
    pub fn read_image(&mut self, handle: RgImageHandle, state: RgImageState) -> RgImageHandle {
        self.push_image(handle, None, state, None);
        handle
    }

    /// 声明写入图像
    pub fn write_image(&mut self, handle: RgImageHandle, state: RgImageState) -> RgImageHandle {
        self.push_image(handle, None, state, None);
        handle
    }

    /// 声明读写图像（同时读取和写入）
    ///
    /// 常用于累积操作（如 RT 累积、后处理）
    pub fn read_write_image(&mut self, handle: RgImageHandle, state: RgImageState) -> RgImageHandle {
        self.push_image(handle, None, state, None);
        handle
    }

    #[inline]
    pub fn read_image_view(&mut self, view: RgImageViewHandle, state: RgImageState) -> RgImageViewHandle {
        self.push_image_view(view, state, None);
        view
    }

    #[inline]
    pub fn write_image_view(&mut self, view: RgImageViewHandle, state: RgImageState) -> RgImageViewHandle {
        self.push_image_view(view, state, None);
        view
    }

    /// 以 `state` 进入 Pass，并在 Pass 内部切换到 `then`
    ///
    /// 回调通过 `RgPassContext::transition_to_secondary` 决定切换时机，
    /// 之后的使用者看到的是 `then`。
    pub fn write_image_view_then(
        &mut self,
        view: RgImageViewHandle,
        state: RgImageState,
        then: RgImageState,
    ) -> RgImageViewHandle {
        self.push_image_view(view, state, Some(then));
        view
    }

    /// 声明读取缓冲区
    #[inline]
    pub fn read_buffer(&mut self, handle: RgBufferHandle, state: RgBufferState) -> RgBufferHandle {
        self.buffer_usages.push(RgBufferUsage {
            buffer: handle,
            view: None,
            state,
        });
        handle
    }

    /// 声明写入缓冲区
    pub fn write_buffer(&mut self, handle: RgBufferHandle, state: RgBufferState) -> RgBufferHandle {
        self.buffer_usages.push(RgBufferUsage {
            buffer: handle,
            view: None,
            state,
        });
        handle
    }

    pub fn read_write_buffer(&mut self, handle: RgBufferHandle, state: RgBufferState) -> RgBufferHandle {
        self.write_buffer(handle, state)
    }

    /// 通过视图声明缓冲区使用；同步仍以整个缓冲区为单位
    pub fn use_buffer_view(&mut self, view: RgBufferViewHandle, state: RgBufferState) -> RgBufferViewHandle {
        let buffer = self.resources.get_buffer_view(view).map(|v| v.buffer).unwrap_or_default();
        self.buffer_usages.push(RgBufferUsage {
            buffer,
            view: Some(view),
            state,
        });
        view
    }

    /// 创建临时图像
    ///
    /// 图像在执行阶段才分配物理内存，帧结束后延迟销毁。
    pub fn create_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.resources.register_image(RgImageResource::transient(name, desc))
    }

    /// 创建临时缓冲区
    pub fn create_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> RgBufferHandle {
        self.resources.register_buffer(RgBufferResource::transient(name, desc))
    }

    pub fn create_image_view(&mut self, desc: RgImageViewDesc) -> RgImageViewHandle {
        self.resources.register_image_view(desc)
    }

    pub fn create_buffer_view(&mut self, desc: RgBufferViewDesc) -> RgBufferViewHandle {
        self.resources.register_buffer_view(desc)
    }

    /// 即使没有输出被消费也保留该 Pass（例如带有副作用的回读）
    #[inline]
    pub fn force_execution(&mut self) {
        self.force_execution = true;
    }
}

/// 类型擦除的 Pass 执行器 trait
pub(crate) trait RgPassExecutor<D: RgDevice> {
    /// 执行 Pass
    fn execute(&self, ctx: &mut RgPassContext<'_, D>);
}

/// 包装用户 Pass 实现的执行器
pub(crate) struct RgPassExecutorWrapper<P> {
    pub pass: P,
}

impl<D: RgDevice, P: RgPass<D>> RgPassExecutor<D> for RgPassExecutorWrapper<P> {
    fn execute(&self, ctx: &mut RgPassContext<'_, D>) {
        self.pass.execute(ctx);
    }
}

/// Pass 节点数据（编译后使用）
pub struct RgPassNode<'a, D: RgDevice> {
    /// Pass 名称
    pub name: String,
    pub queue: RgQueueType,
    pub image_usages: Vec<RgImageUsage>,
    pub buffer_usages: Vec<RgBufferUsage>,
    pub force_execution: bool,

    /// 执行回调（类型擦除的 Pass 实现）
    pub(crate) executor: Box<dyn RgPassExecutor<D> + 'a>,
}

impl<D: RgDevice> RgPassNode<'_, D> {
    /// 是否写入了该图像
    #[inline]
    pub fn writes_image(&self, handle: RgImageHandle) -> bool {
        self.image_usages.iter().any(|u| {
            u.image == handle && (u.state.is_write() || u.then.is_some_and(|t| t.is_write()))
        })
    }

    #[inline]
    pub fn writes_buffer(&self, handle: RgBufferHandle) -> bool {
        self.buffer_usages.iter().any(|u| u.buffer == handle && u.state.is_write())
    }
}

/// RgPass trait
///
/// 定义渲染图中的一个 Pass。用户需要实现此 trait 来创建自定义 Pass。
///
/// # 示例
///
/// ```ignore
/// struct BlurPass {
///     input: RgImageHandle,
///     output: RgImageHandle,
/// }
///
/// impl<D: RgDevice> RgPass<D> for BlurPass {
///     fn setup(&mut self, builder: &mut RgPassBuilder<'_, '_, D>) {
///         builder.read_image(self.input, RgImageState::SHADER_READ_COMPUTE);
///         builder.write_image(self.output, RgImageState::STORAGE_WRITE_COMPUTE);
///     }
///
///     fn execute(&self, ctx: &mut RgPassContext<'_, D>) {
///         let input = ctx.get_image_default_view(self.input);
///         let output = ctx.get_image_default_view(self.output);
///         // 绑定 pipeline, dispatch...
///     }
/// }
/// ```
///
/// # 线程安全
///
/// Pass 不需要是 Send + Sync，RenderGraph 的构建与录制都在单线程中进行。
/// Pass 可以借用外部资源，生命周期由 RenderGraphBuilder 的生命周期参数约束。
pub trait RgPass<D: RgDevice> {
    /// 声明 Pass 的资源依赖
    fn setup(&mut self, builder: &mut RgPassBuilder<'_, '_, D>);

    /// 录制 Pass 的命令
    ///
    /// 进入回调前 barrier 已经录制完毕，attachment 使用对应的 rendering 已经开始。
    fn execute(&self, ctx: &mut RgPassContext<'_, D>);
}

/// 由两个闭包组成的 Pass
pub struct RgLambdaPass<S, E> {
    setup: Option<S>,
    execute: E,
}

impl<S, E> RgLambdaPass<S, E> {
    pub fn new(setup: S, execute: E) -> Self {
        Self {
            setup: Some(setup),
            execute,
        }
    }
}

impl<D, S, E> RgPass<D> for RgLambdaPass<S, E>
where
    D: RgDevice,
    S: FnOnce(&mut RgPassBuilder<'_, '_, D>),
    E: Fn(&mut RgPassContext<'_, D>),
{
    fn setup(&mut self, builder: &mut RgPassBuilder<'_, '_, D>) {
        if let Some(setup) = self.setup.take() {
            setup(builder);
        }
    }

    fn execute(&self, ctx: &mut RgPassContext<'_, D>) {
        (self.execute)(ctx);
    }
}
