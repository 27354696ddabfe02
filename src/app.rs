use crate::config::Config;
use crate::fs::{FileTaskStore, TaskStore};
use crate::models::{NewTask, Task, TaskId, TaskPatch};
use crate::reminder::{ChannelSink, ReminderHandle, ReminderScanner, ReminderWorker, SinkEvent};
use crate::ui::dialogs::DialogType;
use crate::views::{self, TaskFilter, View};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use crossbeam_channel::Sender;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 通知显示时长
const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
    /// 到期提醒
    Reminder,
}

/// 通知消息
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Instant,
    /// 提醒去重标签（同一任务的提醒合并显示）
    pub tag: Option<String>,
}

impl Notification {
    fn new(message: String, level: NotificationLevel, tag: Option<String>) -> Self {
        Self {
            message,
            level,
            created_at: Instant::now(),
            tag,
        }
    }

    /// 检查通知是否已过期（3秒后自动消失）
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= NOTIFICATION_TTL
    }
}

/// 应用模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 正常模式 - 导航和查看
    Normal,
    /// 对话框模式
    Dialog,
    /// 帮助模式 - 显示快捷键
    Help,
}

/// 应用状态
pub struct App {
    /// 任务存储（与提醒线程共享）
    pub store: Arc<FileTaskStore>,
    /// 最近一次读取的任务快照
    pub tasks: Vec<Task>,
    /// 当前视图
    pub view: View,
    /// 当前视图中选中的行
    pub selected: usize,
    /// 搜索和日期筛选
    pub filter: TaskFilter,
    /// 当前模式
    pub mode: Mode,
    /// 当前显示的对话框
    pub dialog: Option<DialogType>,
    /// 应用配置
    pub config: Config,
    /// 数据目录
    pub data_dir: PathBuf,
    /// 待打开的编辑器文件路径（用于外部编辑器调用）
    pub pending_editor_file: Option<PathBuf>,
    /// 当前通知
    pub notification: Option<Notification>,
    /// 排队等待显示的通知
    queued_notifications: VecDeque<Notification>,
    /// 后台提醒线程
    reminders: Option<ReminderHandle>,
}

impl App {
    /// 创建新的应用实例
    pub fn new(config: Config, data_dir: &Path) -> Result<Self> {
        let store = FileTaskStore::open(crate::fs::tasks_dir(data_dir))?.with_live_reload();

        let mut app = Self {
            store: Arc::new(store),
            tasks: Vec::new(),
            view: View::default(),
            selected: 0,
            filter: TaskFilter::default(),
            mode: Mode::Normal,
            dialog: None,
            config,
            data_dir: data_dir.to_path_buf(),
            pending_editor_file: None,
            notification: None,
            queued_notifications: VecDeque::new(),
            reminders: None,
        };
        app.refresh();

        // 尝试加载保存的状态
        match crate::state::load_state(&crate::state::state_file_path(data_dir)) {
            Ok(state) => crate::state::apply_state(&mut app, state),
            Err(e) => debug!(error = %e, "ignoring saved ui state"),
        }

        Ok(app)
    }

    /// 启动后台提醒线程，提醒通过 `events` 发回主循环
    pub fn start_reminders(&mut self, events: Sender<SinkEvent>) -> Result<()> {
        let sink = ChannelSink::new(events, self.config.reminder.sound);
        let worker = ReminderWorker::new(
            ReminderScanner::from_config(&self.config.reminder),
            self.store.clone(),
            Arc::new(sink),
        );
        self.reminders = Some(worker.spawn()?);
        Ok(())
    }

    /// 停止提醒线程（同步等待线程退出）
    pub fn stop_reminders(&mut self) {
        if let Some(handle) = self.reminders.take() {
            handle.cancel();
        }
    }

    /// 提醒线程是否在运行（状态栏显示）
    pub fn reminders_running(&self) -> bool {
        self.reminders.as_ref().is_some_and(|h| h.is_running())
    }

    /// 处理键盘输入
    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent) -> bool {
        crate::input::handle_key_input(self, key)
    }

    /// 今天（本地时间）
    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    /// 从存储重新读取快照，并修正选中行
    pub fn refresh(&mut self) {
        match self.store.list_all() {
            Ok(tasks) => self.tasks = tasks,
            Err(e) => {
                warn!(error = %e, "failed to list tasks");
                self.show_notification(format!("读取任务失败: {}", e), NotificationLevel::Error);
            }
        }
        self.clamp_selection();
    }

    /// 重新读取磁盘上的任务文件（外部编辑后）
    pub fn reload_from_disk(&mut self) {
        if let Err(e) = self.store.reload() {
            self.show_notification(format!("重新加载失败: {}", e), NotificationLevel::Error);
            return;
        }
        self.refresh();
        self.nudge_reminders();
    }

    /// 当前视图中可见的任务
    pub fn visible_tasks(&self) -> Vec<&Task> {
        views::filter_tasks(&self.tasks, self.view, &self.filter, self.today())
    }

    /// 每个视图的任务数
    pub fn view_counts(&self) -> [usize; 4] {
        views::view_counts(&self.tasks, &self.filter, self.today())
    }

    /// 获取当前选中的任务
    pub fn selected_task(&self) -> Option<&Task> {
        self.visible_tasks().get(self.selected).copied()
    }

    pub fn selected_task_id(&self) -> Option<TaskId> {
        self.selected_task().map(|t| t.id)
    }

    /// 到期但已超过补发窗口、再也不会提醒的任务
    pub fn is_missed(&self, task: &Task) -> bool {
        crate::reminder::scanner::is_missed(
            task,
            Local::now().naive_local(),
            self.config.reminder.lateness_window(),
        )
    }

    pub fn clamp_selection(&mut self) {
        let count = self.visible_tasks().len();
        self.selected = self.selected.min(count.saturating_sub(1));
    }

    pub fn select_next(&mut self) {
        let count = self.visible_tasks().len();
        if count > 0 {
            self.selected = (self.selected + 1).min(count - 1);
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.selected = 0;
        }
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        self.selected = 0;
    }

    /// 选中指定任务（如果它在当前视图中可见）
    fn select_task(&mut self, id: TaskId) {
        if let Some(idx) = self.visible_tasks().iter().position(|t| t.id == id) {
            self.selected = idx;
        }
    }

    fn nudge_reminders(&self) {
        if let Some(handle) = &self.reminders {
            handle.nudge();
        }
    }

    /// 修改后刷新快照并唤醒提醒线程
    fn after_mutation(&mut self) {
        self.refresh();
        self.nudge_reminders();
    }

    /// 创建新任务
    pub fn create_task(&mut self, title: String) {
        let mut fields = NewTask::titled(title.trim());
        // 在“今天”视图中创建的任务默认今天到期
        if self.view == View::Today {
            fields.due_date = Some(self.today());
        }

        match self.store.create(fields) {
            Ok(task) => {
                debug!(task_id = %task.id, "task created");
                self.after_mutation();
                self.select_task(task.id);
                self.show_notification(format!("已创建任务 #{}", task.id), NotificationLevel::Success);
            }
            Err(e) => self.show_notification(format!("创建任务失败: {}", e), NotificationLevel::Error),
        }
    }

    /// 更新任务，成功后刷新
    pub fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> bool {
        match self.store.update_by_id(id, patch) {
            Ok(_) => {
                self.after_mutation();
                true
            }
            Err(e) => {
                self.show_notification(format!("更新任务失败: {}", e), NotificationLevel::Error);
                false
            }
        }
    }

    /// 切换选中任务的完成状态
    pub fn toggle_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let (id, completed) = (task.id, !task.completed);

        if self.update_task(id, TaskPatch::completed(completed)) {
            let message = if completed { "已完成" } else { "已恢复为未完成" };
            self.show_notification(format!("#{} {}", id, message), NotificationLevel::Success);
        }
    }

    pub fn delete_task(&mut self, id: TaskId) {
        match self.store.delete_by_id(id) {
            Ok(()) => {
                self.after_mutation();
                self.show_notification(format!("已删除任务 #{}", id), NotificationLevel::Success);
            }
            Err(e) => self.show_notification(format!("删除任务失败: {}", e), NotificationLevel::Error),
        }
    }

    /// 用外部编辑器打开选中的任务文件
    pub fn open_selected_in_editor(&mut self) {
        if let Some(id) = self.selected_task_id() {
            self.pending_editor_file = Some(self.store.task_path(id));
        }
    }

    /// 复制选中任务到剪贴板
    pub fn copy_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let text = crate::fs::parser::render_task_file(task).unwrap_or_else(|_| task.title.clone());

        match copy_to_clipboard(&text) {
            Ok(()) => self.show_notification("已复制到剪贴板".to_string(), NotificationLevel::Success),
            Err(e) => self.show_notification(format!("复制失败: {}", e), NotificationLevel::Error),
        }
    }

    /// 处理提醒线程发来的事件；返回 true 表示需要响铃
    pub fn handle_sink_event(&mut self, event: SinkEvent) -> bool {
        match event {
            SinkEvent::Bell => true,
            SinkEvent::Alert { title, body, tag } => {
                self.push_alert(format!("⏰ {} · {}", title, body), tag);
                // reminder_shown 已写入，刷新快照
                self.refresh();
                false
            }
        }
    }

    /// 显示通知消息
    pub fn show_notification(&mut self, message: String, level: NotificationLevel) {
        self.notification = Some(Notification::new(message, level, None));
    }

    /// 提醒通知：同一标签的提醒只显示一条，不会被普通通知覆盖
    pub fn push_alert(&mut self, message: String, tag: String) {
        if let Some(current) = &mut self.notification {
            if current.tag.as_deref() == Some(tag.as_str()) {
                current.message = message;
                current.created_at = Instant::now();
                return;
            }
        }
        if let Some(queued) = self
            .queued_notifications
            .iter_mut()
            .find(|n| n.tag.as_deref() == Some(tag.as_str()))
        {
            queued.message = message;
            return;
        }

        let alert = Notification::new(message, NotificationLevel::Reminder, Some(tag));
        match &self.notification {
            Some(current) if current.level == NotificationLevel::Reminder => {
                self.queued_notifications.push_back(alert);
            }
            _ => self.notification = Some(alert),
        }
    }

    /// 清除已过期的通知，并显示下一条排队的提醒
    pub fn clear_expired_notification(&mut self) {
        if self.notification.as_ref().is_some_and(|n| n.is_expired()) {
            self.notification = self.queued_notifications.pop_front().map(|mut next| {
                next.created_at = Instant::now();
                next
            });
        }
    }

    /// 退出前保存界面状态
    pub fn save_ui_state(&self) {
        let state = crate::state::extract_state(self);
        let path = crate::state::state_file_path(&self.data_dir);
        if let Err(e) = crate::state::save_state(&path, &state) {
            warn!(error = %e, "failed to save ui state");
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.stop_reminders();
    }
}

#[cfg(feature = "clipboard")]
fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_string())?;
    Ok(())
}

#[cfg(not(feature = "clipboard"))]
fn copy_to_clipboard(_text: &str) -> Result<()> {
    anyhow::bail!("未启用剪贴板功能（clipboard feature）")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    fn test_app() -> (TempDir, App) {
        let temp = TempDir::new().unwrap();
        let config = Config {
            editor: "vim".to_string(),
            data_dir: None,
            reminder: Default::default(),
        };
        let app = App::new(config, temp.path()).unwrap();
        (temp, app)
    }

    #[test]
    fn test_create_selects_new_task() {
        let (_temp, mut app) = test_app();

        app.create_task("first".to_string());
        app.create_task("second".to_string());

        assert_eq!(app.tasks.len(), 2);
        assert_eq!(app.selected_task().unwrap().title, "second");
    }

    #[test]
    fn test_create_in_today_view_sets_due_date() {
        let (_temp, mut app) = test_app();
        app.set_view(View::Today);

        app.create_task("today thing".to_string());

        let task = app.selected_task().unwrap();
        assert_eq!(task.due_date, Some(app.today()));
    }

    #[test]
    fn test_toggle_moves_task_out_of_inbox() {
        let (_temp, mut app) = test_app();
        app.create_task("finish me".to_string());

        app.toggle_selected();

        assert!(app.visible_tasks().is_empty());
        app.set_view(View::Completed);
        assert_eq!(app.visible_tasks().len(), 1);
    }

    #[test]
    fn test_selection_clamped_after_delete() {
        let (_temp, mut app) = test_app();
        app.create_task("a".to_string());
        app.create_task("b".to_string());
        app.selected = 1;

        let id = app.selected_task_id().unwrap();
        app.delete_task(id);

        assert_eq!(app.selected, 0);
        assert_eq!(app.tasks.len(), 1);
    }

    #[test]
    fn test_alerts_collapse_by_tag() {
        let (_temp, mut app) = test_app();

        app.push_alert("first".to_string(), "task-1".to_string());
        app.push_alert("again".to_string(), "task-1".to_string());
        app.push_alert("other".to_string(), "task-2".to_string());
        app.push_alert("other again".to_string(), "task-2".to_string());

        assert_eq!(app.notification.as_ref().unwrap().message, "again");
        assert_eq!(app.queued_notifications.len(), 1);
        assert_eq!(app.queued_notifications[0].message, "other again");
    }

    #[test]
    fn test_expired_alert_shows_next_in_queue() {
        let (_temp, mut app) = test_app();
        app.push_alert("one".to_string(), "task-1".to_string());
        app.push_alert("two".to_string(), "task-2".to_string());

        app.notification.as_mut().unwrap().created_at = Instant::now() - NOTIFICATION_TTL;
        app.clear_expired_notification();

        assert_eq!(app.notification.as_ref().unwrap().message, "two");
        assert!(app.queued_notifications.is_empty());
    }

    #[test]
    fn test_alert_event_refreshes_snapshot() {
        let (_temp, mut app) = test_app();
        app.create_task("standup".to_string());
        let id = app.selected_task_id().unwrap();
        app.store
            .update_by_id(id, TaskPatch::acknowledge(None))
            .unwrap();

        let ring = app.handle_sink_event(SinkEvent::Alert {
            title: "standup".to_string(),
            body: "到期".to_string(),
            tag: format!("task-{}", id),
        });

        assert!(!ring);
        assert!(app.tasks[0].reminder_shown);
        assert!(app.handle_sink_event(SinkEvent::Bell));
    }

    #[test]
    fn test_missed_marker_uses_lateness_window() {
        let (_temp, mut app) = test_app();
        app.create_task("old".to_string());
        let id = app.selected_task_id().unwrap();
        let yesterday = app.today().pred_opt().unwrap();
        app.update_task(id, TaskPatch::due(Some(yesterday), NaiveTime::from_hms_opt(9, 0, 0)));

        let task = app.tasks.iter().find(|t| t.id == id).unwrap();
        assert!(app.is_missed(task));
    }
}
