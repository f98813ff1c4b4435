//! RenderGraph 构建器
//!
//! 提供 `RenderGraphBuilder` 用于声明资源与 Pass，并把它们编译成
//! 可以执行一次的 `RgCompiledGraph`。

use std::collections::HashMap;

use itertools::Itertools;

use super::aliasing::{RgAliasCandidate, RgAliasClass, RgAliasingPlan, RgLiveRange};
use super::buffer_resource::{RgBufferDesc, RgBufferResource, RgBufferSource, RgBufferViewDesc};
use super::device::RgDevice;
use super::error::RgError;
use super::executor::RgCompiledGraph;
use super::external_state::{RgBufferExternalState, RgImageExternalState};
use super::graph::{RgDependencyGraph, RgPassAccess, RgSchedule};
use super::image_resource::{RgImageDesc, RgImageResource, RgImageSource, RgImageViewDesc};
use super::pass::{RgLambdaPass, RgPass, RgPassBuilder, RgPassContext, RgPassExecutorWrapper, RgPassNode};
use super::queue::RgQueueType;
use super::resource_handle::{RgBufferHandle, RgBufferViewHandle, RgImageHandle, RgImageViewHandle, RgResourceId};
use super::resource_registry::RgResourceRegistry;
use super::resource_state::{RgSyncState, RgTrackedState, WRITE_ACCESS};
use super::semaphore_info::RgSemaphoreInfo;
use super::settings::RgSettings;
use super::state_tracker::{RgBufferTrackInfo, RgImageTrackInfo, RgPassRequirements, RgStateTracker};

/// RenderGraph 构建器
///
/// 用于声明式构建渲染图。
///
/// # 使用流程
///
/// 1. 创建 builder: `RenderGraphBuilder::new()`
/// 2. 导入外部资源: `builder.import_image(...)`
/// 3. 添加 Pass: `builder.add_pass("name", queue, pass)`
/// 4. 编译: `builder.compile()?`
/// 5. 执行: `compiled.execute(device, frame_resources)`
///
/// # 生命周期
///
/// `'a` 是 Pass 可以借用的外部资源的生命周期，导入资源的状态记录同样以 `'a` 借用。
pub struct RenderGraphBuilder<'a, D: RgDevice> {
    /// 资源注册表
    resources: RgResourceRegistry<'a, D>,

    /// Pass 节点列表（按添加顺序）
    passes: Vec<RgPassNode<'a, D>>,

    settings: RgSettings,

    /// 每个队列第一次提交等待的外部 semaphore
    external_waits: [Vec<RgSemaphoreInfo<D::Semaphore>>; RgQueueType::COUNT],
    /// 每个队列最后一次提交发出的外部 semaphore
    external_signals: [Vec<RgSemaphoreInfo<D::Semaphore>>; RgQueueType::COUNT],
}

impl<D: RgDevice> Default for RenderGraphBuilder<'_, D> {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl<D: RgDevice> RenderGraphBuilder<'_, D> {
    /// 创建新的 RenderGraph 构建器
    pub fn new() -> Self {
        Self {
            resources: RgResourceRegistry::new(),
            passes: Vec::new(),
            settings: RgSettings::default(),
            external_waits: std::array::from_fn(|_| Vec::new()),
            external_signals: std::array::from_fn(|_| Vec::new()),
        }
    }

    #[inline]
    pub fn with_settings(mut self, settings: RgSettings) -> Self {
        self.settings = settings;
        self
    }
}

// 资源声明
impl<'a, D: RgDevice> RenderGraphBuilder<'a, D> {
    /// 创建临时图像，描述非法时 panic
    pub fn create_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        self.resources.register_image(RgImageResource::transient(name, desc))
    }

    pub fn try_create_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> Result<RgImageHandle, RgError> {
        self.resources.try_register_image(RgImageResource::transient(name, desc))
    }

    /// 导入外部图像资源
    ///
    /// # 参数
    /// - `name`: 资源调试名称
    /// - `desc`: 图像描述（用于推断 aspect、mip 数量和视图）
    /// - `image`: 物理图像
    /// - `external`: 外部状态记录，编译时读取，执行结束时写回
    ///
    /// # 返回
    /// RenderGraph 内部的图像句柄
    pub fn import_image(
        &mut self,
        name: impl Into<String>,
        desc: RgImageDesc,
        image: D::Image,
        external: &'a mut RgImageExternalState,
    ) -> RgImageHandle {
        self.resources.register_image(RgImageResource::imported(name, desc, image, external))
    }

    /// 创建临时缓冲区，描述非法时 panic
    pub fn create_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> RgBufferHandle {
        self.resources.register_buffer(RgBufferResource::transient(name, desc))
    }

    pub fn try_create_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> Result<RgBufferHandle, RgError> {
        self.resources.try_register_buffer(RgBufferResource::transient(name, desc))
    }

    /// 导入外部缓冲区资源
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        desc: RgBufferDesc,
        buffer: D::Buffer,
        external: &'a mut RgBufferExternalState,
    ) -> RgBufferHandle {
        self.resources.register_buffer(RgBufferResource::imported(name, desc, buffer, external))
    }

    #[inline]
    pub fn create_image_view(&mut self, desc: RgImageViewDesc) -> RgImageViewHandle {
        self.resources.register_image_view(desc)
    }

    #[inline]
    pub fn try_create_image_view(&mut self, desc: RgImageViewDesc) -> Result<RgImageViewHandle, RgError> {
        self.resources.try_register_image_view(desc)
    }

    #[inline]
    pub fn create_buffer_view(&mut self, desc: RgBufferViewDesc) -> RgBufferViewHandle {
        self.resources.register_buffer_view(desc)
    }

    #[inline]
    pub fn try_create_buffer_view(&mut self, desc: RgBufferViewDesc) -> Result<RgBufferViewHandle, RgError> {
        self.resources.try_register_buffer_view(desc)
    }

    /// `queue` 上的第一次提交等待外部 semaphore（例如 swapchain acquire）
    pub fn wait_external(&mut self, queue: RgQueueType, wait: RgSemaphoreInfo<D::Semaphore>) -> &mut Self {
        self.external_waits[queue.index()].push(wait);
        self
    }

    /// `queue` 上的最后一次提交发出外部 semaphore（例如 present）
    pub fn signal_external(&mut self, queue: RgQueueType, signal: RgSemaphoreInfo<D::Semaphore>) -> &mut Self {
        self.external_signals[queue.index()].push(signal);
        self
    }
}

// Pass 声明
impl<'a, D: RgDevice> RenderGraphBuilder<'a, D> {
    /// 添加 Pass
    ///
    /// # 参数
    /// - `name`: Pass 名称（用于调试和性能分析）
    /// - `queue`: Pass 提交到的队列
    /// - `pass`: 实现了 `RgPass` trait 的 Pass 对象
    ///
    /// # 返回
    /// 返回 `&mut Self` 以支持链式调用
    pub fn add_pass<P: RgPass<D> + 'a>(&mut self, name: impl Into<String>, queue: RgQueueType, mut pass: P) -> &mut Self {
        let name = name.into();

        // 创建 PassBuilder 供 Pass 声明依赖
        let mut builder = RgPassBuilder {
            name: name.clone(),
            queue,
            image_usages: Vec::new(),
            buffer_usages: Vec::new(),
            force_execution: false,
            resources: &mut self.resources,
        };

        // 调用 Pass 的 setup 方法
        pass.setup(&mut builder);

        if builder.image_usages.is_empty() && builder.buffer_usages.is_empty() && !builder.force_execution {
            log::warn!("RenderGraph: pass \"{}\" declares no resources and will always be culled", name);
        }

        let node = RgPassNode {
            name,
            queue,
            image_usages: builder.image_usages,
            buffer_usages: builder.buffer_usages,
            force_execution: builder.force_execution,
            executor: Box::new(RgPassExecutorWrapper { pass }),
        };

        self.passes.push(node);
        self
    }

    /// 以两个闭包添加 Pass
    pub fn add_lambda_pass<S, E>(&mut self, name: impl Into<String>, queue: RgQueueType, setup: S, execute: E) -> &mut Self
    where
        S: FnOnce(&mut RgPassBuilder<'_, '_, D>) + 'a,
        E: Fn(&mut RgPassContext<'_, D>) + 'a,
    {
        self.add_pass(name, queue, RgLambdaPass::new(setup, execute))
    }
}

// getters
impl<'a, D: RgDevice> RenderGraphBuilder<'a, D> {
    #[inline]
    pub fn resources(&self) -> &RgResourceRegistry<'a, D> {
        &self.resources
    }

    #[inline]
    pub fn settings(&self) -> &RgSettings {
        &self.settings
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

/// 资源在整帧中的使用情况
#[derive(Default)]
struct RgResourceUsage {
    range: Option<RgLiveRange>,
    queue: Option<RgQueueType>,
    multi_queue: bool,
}

impl RgResourceUsage {
    fn touch(&mut self, position: usize, queue: RgQueueType) {
        match &mut self.range {
            Some(range) => range.extend(position),
            None => self.range = Some(RgLiveRange::new(position)),
        }
        match self.queue {
            Some(q) if q != queue => self.multi_queue = true,
            Some(_) => {}
            None => self.queue = Some(queue),
        }
    }
}

/// 只写的使用不读取旧内容；其余使用（含 layout 转换）都视为读取
#[inline]
fn usage_reads<S: RgSyncState>(state: &S) -> bool {
    !(state.access() & !WRITE_ACCESS).is_empty() || !state.is_write()
}

// compile
impl<'a, D: RgDevice> RenderGraphBuilder<'a, D> {
    /// 编译渲染图
    ///
    /// 执行句柄检查、依赖分析、剔除、调度、别名分析和 barrier 计算。
    pub fn compile(mut self) -> Result<RgCompiledGraph<'a, D>, RgError> {
        self.resolve_default_views()?;

        // 校验并合并每个 Pass 的使用声明（被剔除的 Pass 同样需要合法）
        let all_requirements = self
            .passes
            .iter()
            .map(|pass| RgPassRequirements::build(pass, &self.resources))
            .collect::<Result<Vec<_>, _>>()?;

        // 依赖分析
        let accesses = self.collect_accesses();
        let dep_graph = RgDependencyGraph::analyze(&accesses);

        // 剔除
        let alive = if self.settings.enable_culling {
            let roots = self
                .passes
                .iter()
                .zip_eq(&accesses)
                .map(|(pass, access)| pass.force_execution || access.writes.iter().any(|r| self.is_imported(*r)))
                .collect_vec();
            dep_graph.cull(&roots)
        } else {
            vec![true; self.passes.len()]
        };

        // 调度
        let queues = self.passes.iter().map(|p| p.queue).collect_vec();
        let schedule = RgSchedule::build(&queues, &alive);

        let requirements = schedule.order.iter().map(|&pass_idx| all_requirements[pass_idx].clone()).collect_vec();
        let pass_names = schedule.order.iter().map(|&pass_idx| self.passes[pass_idx].name.clone()).collect_vec();

        // 生命周期与别名
        let usages = Self::collect_usages(&requirements);
        let aliasing = self.plan_aliasing(&usages);
        aliasing.validate(|resource| self.resource_name(resource).to_string())?;

        // barrier 与跨队列同步
        let tracker = RgStateTracker::new(&requirements, &pass_names, self.image_track_infos(), self.buffer_track_infos());
        let sync = tracker.run(&aliasing)?;

        let live_ranges =
            usages.iter().filter_map(|(resource, usage)| usage.range.map(|range| (*resource, range))).collect();

        log::debug!(
            "RenderGraph: compiled {} passes ({} culled), {} queue edges, {} aliased memory slots",
            schedule.len(),
            schedule.culled.len(),
            sync.edges.len(),
            aliasing.aliased_slot_count()
        );

        let compiled = RgCompiledGraph {
            resources: self.resources,
            passes: self.passes,
            dep_graph,
            schedule,
            requirements,
            live_ranges,
            aliasing,
            sync,
            external_waits: self.external_waits,
            external_signals: self.external_signals,
        };

        if self.settings.print_execution_plan {
            compiled.print_execution_plan();
        }

        Ok(compiled)
    }

    /// 以图像句柄声明的使用绑定到默认视图，同时检查句柄合法性
    fn resolve_default_views(&mut self) -> Result<(), RgError> {
        for pass in &mut self.passes {
            let unknown = || RgError::UnknownResource {
                pass: pass.name.clone(),
            };

            for usage in &mut pass.image_usages {
                if self.resources.get_image(usage.image).is_none() {
                    return Err(unknown());
                }
                match usage.view {
                    Some(view) => {
                        if self.resources.get_image_view(view).is_none_or(|v| v.image != usage.image) {
                            return Err(unknown());
                        }
                    }
                    None => usage.view = Some(self.resources.default_image_view(usage.image)?),
                }
            }

            for usage in &pass.buffer_usages {
                if self.resources.get_buffer(usage.buffer).is_none() {
                    return Err(unknown());
                }
                if let Some(view) = usage.view
                    && self.resources.get_buffer_view(view).is_none_or(|v| v.buffer != usage.buffer)
                {
                    return Err(unknown());
                }
            }
        }
        Ok(())
    }

    /// 每个 Pass 在资源粒度上的读写集合
    fn collect_accesses(&self) -> Vec<RgPassAccess> {
        self.passes
            .iter()
            .map(|pass| {
                let mut access = RgPassAccess::default();
                for usage in &pass.image_usages {
                    let resource = RgResourceId::Image(usage.image);
                    let states = std::iter::once(usage.state).chain(usage.then);
                    for state in states {
                        if usage_reads(&state) {
                            access.reads.push(resource);
                        }
                        if state.is_write() {
                            access.writes.push(resource);
                        }
                    }
                }
                for usage in &pass.buffer_usages {
                    let resource = RgResourceId::Buffer(usage.buffer);
                    if usage_reads(&usage.state) {
                        access.reads.push(resource);
                    }
                    if usage.state.is_write() {
                        access.writes.push(resource);
                    }
                }
                access.reads = access.reads.into_iter().unique().collect();
                access.writes = access.writes.into_iter().unique().collect();
                access
            })
            .collect()
    }

    fn collect_usages(requirements: &[RgPassRequirements]) -> HashMap<RgResourceId, RgResourceUsage> {
        let mut usages: HashMap<RgResourceId, RgResourceUsage> = HashMap::new();
        for (position, req) in requirements.iter().enumerate() {
            let resources = req
                .images
                .iter()
                .map(|r| RgResourceId::Image(r.image))
                .chain(req.buffers.iter().map(|r| RgResourceId::Buffer(r.buffer)));
            for resource in resources {
                usages.entry(resource).or_default().touch(position, req.queue);
            }
        }
        usages
    }

    /// 只有被使用的临时资源参与别名分析
    fn plan_aliasing(&self, usages: &HashMap<RgResourceId, RgResourceUsage>) -> RgAliasingPlan {
        let candidates = usages
            .iter()
            .filter(|(resource, _)| !self.is_imported(**resource))
            .filter_map(|(resource, usage)| {
                let range = usage.range?;
                let queue = usage.queue?;
                let class = if usage.multi_queue {
                    RgAliasClass::Exclusive
                } else {
                    match *resource {
                        RgResourceId::Image(handle) => {
                            let desc = &self.resources.get_image(handle)?.desc;
                            RgAliasClass::Image {
                                format: desc.format,
                                samples: desc.samples,
                                extent: [desc.width, desc.height, desc.depth],
                                mip_levels: desc.mip_levels,
                                array_layers: desc.array_layers,
                                image_type: desc.image_type,
                                usage: desc.usage,
                                queue,
                            }
                        }
                        RgResourceId::Buffer(handle) => {
                            let desc = &self.resources.get_buffer(handle)?.desc;
                            RgAliasClass::Buffer {
                                size_class: desc.size.next_power_of_two(),
                                usage: desc.usage,
                                queue,
                            }
                        }
                    }
                };
                Some(RgAliasCandidate {
                    resource: *resource,
                    class,
                    range,
                })
            })
            .collect_vec();

        RgAliasingPlan::build(candidates, self.settings.enable_aliasing)
    }

    fn image_track_infos(&self) -> Vec<(RgImageHandle, RgImageTrackInfo)> {
        self.resources
            .iter_images()
            .map(|(handle, image)| {
                let initial = match &image.source {
                    RgImageSource::Imported { external, .. } => external.mips.clone(),
                    RgImageSource::Transient => vec![RgTrackedState::default(); image.desc.mip_levels as usize],
                };
                let info = RgImageTrackInfo {
                    name: image.name.clone(),
                    array_layers: image.desc.array_layers,
                    aspect: image.desc.aspect(),
                    clear: image.desc.clear.then_some(image.desc.clear_value),
                    imported: image.is_imported(),
                    initial,
                };
                (handle, info)
            })
            .collect()
    }

    fn buffer_track_infos(&self) -> Vec<(RgBufferHandle, RgBufferTrackInfo)> {
        self.resources
            .iter_buffers()
            .map(|(handle, buffer)| {
                let initial = match &buffer.source {
                    RgBufferSource::Imported { external, .. } => **external,
                    RgBufferSource::Transient => RgTrackedState::default(),
                };
                let info = RgBufferTrackInfo {
                    name: buffer.name.clone(),
                    clear: buffer.desc.clear.then_some(buffer.desc.clear_value),
                    imported: buffer.is_imported(),
                    initial,
                };
                (handle, info)
            })
            .collect()
    }

    fn is_imported(&self, resource: RgResourceId) -> bool {
        match resource {
            RgResourceId::Image(handle) => self.resources.get_image(handle).is_some_and(|i| i.is_imported()),
            RgResourceId::Buffer(handle) => self.resources.is_buffer_imported(handle),
        }
    }

    fn resource_name(&self, resource: RgResourceId) -> &str {
        match resource {
            RgResourceId::Image(handle) => self.resources.image_name(handle),
            RgResourceId::Buffer(handle) => self.resources.buffer_name(handle),
        }
    }
}
