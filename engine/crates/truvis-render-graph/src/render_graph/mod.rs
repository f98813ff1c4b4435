//! RenderGraph - 多队列声明式渲染图
//!
//! 每帧重新构建：声明资源与 Pass，编译出调度与同步方案，执行后丢弃。
//!
//! # 核心概念
//!
//! - **RgImageHandle / RgBufferHandle**: 虚拟资源句柄，在 graph 内部标识资源
//! - **RgImageViewHandle / RgBufferViewHandle**: 资源的子范围（mip、layer、字节区间）
//! - **RgImageState / RgBufferState**: 资源状态描述，包含 stage、access、layout
//! - **RgQueueType**: Pass 所在的逻辑队列（Graphics / Compute / Transfer）
//! - **RgPass**: Pass trait，声明资源依赖和执行逻辑
//! - **RenderGraphBuilder**: 构建器，用于注册资源和 Pass
//! - **RgCompiledGraph**: 编译结果，包含执行顺序、barrier、跨队列 semaphore 与内存别名方案
//! - **RgDevice**: 图形后端接口；`RgVulkanDevice` 为 Vulkan 实现，`RgDummyDevice` 只记录命令
//!
//! # 使用示例
//!
//! ```ignore
//! use truvis_render_graph::render_graph::*;
//!
//! let mut builder = RenderGraphBuilder::<RgVulkanDevice>::new();
//!
//! // 导入外部资源，状态在执行结束时写回 `swapchain_state`
//! let backbuffer = builder.import_image("backbuffer", desc, swapchain_image, &mut swapchain_state);
//! let hdr = builder.create_image("hdr", RgImageDesc::new_2d(w, h, vk::Format::R16G16B16A16_SFLOAT, usage));
//!
//! builder.add_lambda_pass(
//!     "lighting",
//!     RgQueueType::Compute,
//!     |b| {
//!         b.write_image(hdr, RgImageState::STORAGE_WRITE_COMPUTE);
//!     },
//!     move |ctx| {
//!         let view = ctx.get_image_default_view(hdr);
//!         // 绑定 pipeline, dispatch...
//!     },
//! );
//! builder.add_lambda_pass(
//!     "tonemap",
//!     RgQueueType::Graphics,
//!     |b| {
//!         b.read_image(hdr, RgImageState::SHADER_READ_FRAGMENT);
//!         b.write_image(backbuffer, RgImageState::COLOR_ATTACHMENT_WRITE);
//!     },
//!     move |ctx| {
//!         // rendering 已经开始，直接 draw
//!     },
//! );
//!
//! let graph = builder.compile()?;
//! frames.begin_frame(&mut device, frame_id);
//! graph.execute(&mut device, &mut frames);
//! ```
//!
//! # 模块结构
//!
//! - `resource_registry`: 资源与视图注册表
//! - `pass`: Pass trait、builder 与执行上下文
//! - `graph`: 依赖图、剔除与调度
//! - `state_tracker` / `barrier`: 状态跟踪与 barrier 合成
//! - `aliasing`: 临时资源的内存别名
//! - `builder` / `executor`: 编译与执行

mod aliasing;
mod barrier;
mod buffer_resource;
mod builder;
mod device;
mod dummy_device;
mod error;
mod executor;
mod external_state;
mod frame_resources;
mod graph;
mod image_resource;
mod pass;
mod queue;
mod resource_handle;
mod resource_registry;
mod resource_state;
mod semaphore_info;
mod settings;
mod state_tracker;
mod vulkan_device;

#[cfg(test)]
mod tests;

// Re-exports
pub use aliasing::{RgAliasCandidate, RgAliasClass, RgAliasingPlan, RgLiveRange, RgMemorySlot};
pub use barrier::{RgBufferBarrierDesc, RgImageBarrierDesc, RgIntraPassBarrier, RgPassBarriers, RgQueueTransfer};
pub use buffer_resource::{RgBufferDesc, RgBufferResource, RgBufferSource, RgBufferViewDesc, RgBufferViewInfo};
pub use builder::RenderGraphBuilder;
pub use device::{RgBufferBarrier, RgDevice, RgImageBarrier, RgRenderingAttachment, RgRenderingInfo};
pub use dummy_device::{RgDummyCommand, RgDummyCommandList, RgDummyDevice, RgDummyMemory, RgDummySubmission};
pub use error::RgError;
pub use executor::{RgCompiledGraph, RgPhysicalResources};
pub use external_state::{RgBufferExternalState, RgImageExternalState};
pub use frame_resources::{RgDeferredRelease, RgFrameResources};
pub use graph::{RgDependencyGraph, RgDependencyKind, RgEdgeData, RgPassAccess, RgSchedule};
pub use image_resource::{
    RgClearValue, RgImageDesc, RgImageResource, RgImageSource, RgImageSubresourceRange, RgImageViewDesc,
    RgImageViewResource,
};
pub use pass::{RgBufferUsage, RgImageUsage, RgLambdaPass, RgPass, RgPassBuilder, RgPassContext, RgPassNode};
pub use queue::RgQueueType;
pub use resource_handle::{RgBufferHandle, RgBufferViewHandle, RgImageHandle, RgImageViewHandle, RgResourceId};
pub use resource_registry::RgResourceRegistry;
pub use resource_state::{RgBufferState, RgImageState, RgSyncState, RgTrackedState, needs_barrier};
pub use semaphore_info::{RgQueueEdge, RgSemaphoreInfo};
pub use settings::RgSettings;
pub use state_tracker::{RgClearOp, RgPassSync, RgSyncPlan};
pub use vulkan_device::{RgVulkanCommandList, RgVulkanDevice, RgVulkanQueue};
