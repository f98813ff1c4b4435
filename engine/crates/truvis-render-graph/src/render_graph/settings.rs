/// RenderGraph 的编译选项
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgSettings {
    /// 剔除结果不会被任何输出消费的 Pass
    pub enable_culling: bool,
    /// 让生命周期不重叠的临时资源共享同一块内存
    pub enable_aliasing: bool,
    /// 编译完成后通过 `log::info!` 打印执行计划
    pub print_execution_plan: bool,
}

impl Default for RgSettings {
    fn default() -> Self {
        Self {
            enable_culling: true,
            enable_aliasing: true,
            print_execution_plan: false,
        }
    }
}
