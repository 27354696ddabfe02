/// 应用命令枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // ===== 退出 =====
    Quit,

    // ===== 导航 =====
    /// 选择上一个任务
    TaskUp,
    /// 选择下一个任务
    TaskDown,
    /// 切换到上一个视图
    PrevView,
    /// 切换到下一个视图
    NextView,

    // ===== 任务操作 =====
    /// 创建新任务
    NewTask,
    /// 编辑当前任务标题
    EditTask,
    /// 设置到期时间
    SetDue,
    /// 切换完成状态
    ToggleComplete,
    /// 删除当前任务
    DeleteTask,
    /// 用外部编辑器编辑任务
    EditTaskInEditor,
    /// 复制任务到剪贴板
    CopyTask,

    // ===== 筛选 =====
    /// 搜索
    Search,
    /// 按日期筛选
    DateFilter,
    /// 清除筛选
    ClearFilter,

    // ===== 其他 =====
    /// 重新加载任务文件
    Reload,
    /// 显示帮助
    Help,
}
