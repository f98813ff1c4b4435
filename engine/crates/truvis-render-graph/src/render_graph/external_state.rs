//! 导入资源的状态记录
//!
//! 导入资源时 graph 以 `&mut` 借用记录：编译时从中读取初始状态，
//! 执行结束（retire）时把最终状态写回，下一帧再导入同一记录即可继续跟踪。

use super::queue::RgQueueType;
use super::resource_state::{RgBufferState, RgImageState, RgTrackedState};

/// 缓冲区的外部状态记录
pub type RgBufferExternalState = RgTrackedState<RgBufferState>;

/// 图像的外部状态记录，按 mip 保存
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RgImageExternalState {
    pub mips: Vec<RgTrackedState<RgImageState>>,
}

impl RgImageExternalState {
    /// 内容未定义的图像（例如刚创建、或不关心上一帧内容）
    pub fn undefined(mip_levels: u32) -> Self {
        Self::new(mip_levels, RgImageState::UNDEFINED, None)
    }

    /// 所有 mip 处于同一状态
    pub fn new(mip_levels: u32, state: RgImageState, queue: Option<RgQueueType>) -> Self {
        Self {
            mips: vec![RgTrackedState::new(state, queue); mip_levels as usize],
        }
    }

    /// 指定 mip 的状态，记录中缺失的 mip 视为未定义
    #[inline]
    pub fn mip(&self, level: u32) -> RgTrackedState<RgImageState> {
        self.mips.get(level as usize).copied().unwrap_or_default()
    }

    /// 所有 mip 状态一致时返回该状态
    pub fn uniform(&self) -> Option<RgTrackedState<RgImageState>> {
        let first = *self.mips.first()?;
        self.mips.iter().all(|mip| *mip == first).then_some(first)
    }

    /// 按 mip 数量补齐或截断
    pub(crate) fn resize(&mut self, mip_levels: u32) {
        let fill = self.mips.last().copied().unwrap_or_default();
        self.mips.resize(mip_levels as usize, fill);
    }
}
