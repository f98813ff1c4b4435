use ash::vk;

use super::queue::RgQueueType;

/// 提交时的 semaphore 等待 / 信号信息
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgSemaphoreInfo<S> {
    /// semaphore 原始句柄
    pub semaphore: S,
    /// 等待或信号的 pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Timeline semaphore 的值（binary semaphore 为 None）
    pub value: Option<u64>,
}

impl<S> RgSemaphoreInfo<S> {
    /// binary semaphore
    #[inline]
    pub fn binary(semaphore: S, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            semaphore,
            stage,
            value: None,
        }
    }

    /// timeline semaphore
    #[inline]
    pub fn timeline(semaphore: S, stage: vk::PipelineStageFlags2, value: u64) -> Self {
        Self {
            semaphore,
            stage,
            value: Some(value),
        }
    }
}

/// 跨队列依赖边：producer 的提交 signal，consumer 的提交 wait
///
/// `producer == None` 表示来源是帧开头的 prologue 提交
/// （导入资源上一帧停留在另一个队列上）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgQueueEdge {
    /// producer 在调度序列中的位置
    pub producer: Option<usize>,
    pub src_queue: RgQueueType,
    /// consumer 在调度序列中的位置
    pub consumer: usize,
    pub dst_queue: RgQueueType,
}

impl RgQueueEdge {
    /// consumer 在哪些 stage 等待；acquire barrier 以同样的 stage 作为 src scope
    pub const WAIT_STAGE: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::ALL_COMMANDS;
}
