use ash::vk;

/// Pass 所在的硬件队列类型
///
/// 同一队列上的 Pass 按声明顺序执行；跨队列依赖通过 semaphore 同步。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RgQueueType {
    Graphics,
    Compute,
    Transfer,
}

impl RgQueueType {
    pub const COUNT: usize = 3;
    pub const ALL: [RgQueueType; Self::COUNT] = [Self::Graphics, Self::Compute, Self::Transfer];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        }
    }

    /// 队列可以执行的 pipeline stage
    pub fn supported_stages(self) -> vk::PipelineStageFlags2 {
        let common = vk::PipelineStageFlags2::NONE
            | vk::PipelineStageFlags2::TOP_OF_PIPE
            | vk::PipelineStageFlags2::BOTTOM_OF_PIPE
            | vk::PipelineStageFlags2::ALL_COMMANDS
            | vk::PipelineStageFlags2::HOST
            | vk::PipelineStageFlags2::TRANSFER
            | vk::PipelineStageFlags2::COPY
            | vk::PipelineStageFlags2::CLEAR;

        match self {
            Self::Graphics => vk::PipelineStageFlags2::from_raw(!0),
            Self::Compute => {
                common
                    | vk::PipelineStageFlags2::DRAW_INDIRECT
                    | vk::PipelineStageFlags2::COMPUTE_SHADER
                    | vk::PipelineStageFlags2::ACCELERATION_STRUCTURE_BUILD_KHR
                    | vk::PipelineStageFlags2::RAY_TRACING_SHADER_KHR
            }
            Self::Transfer => common,
        }
    }

    /// 是否可以把 stage 中的所有阶段提交到该队列
    #[inline]
    pub fn supports_stages(self, stage: vk::PipelineStageFlags2) -> bool {
        (stage & !self.supported_stages()).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_queue_rejects_shader_stages() {
        assert!(RgQueueType::Transfer.supports_stages(vk::PipelineStageFlags2::TRANSFER));
        assert!(!RgQueueType::Transfer.supports_stages(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(RgQueueType::Compute.supports_stages(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(!RgQueueType::Compute.supports_stages(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT));
        assert!(RgQueueType::Graphics.supports_stages(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT));
    }
}
