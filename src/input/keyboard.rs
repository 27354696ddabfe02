use crate::app::{App, Mode, NotificationLevel};
use crate::input::Command;
use crate::models::{parse_due_date, parse_due_input, TaskPatch};
use crate::ui::dialogs::{ConfirmAction, DialogType, InputPurpose};
use crate::views::TaskFilter;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// 处理键盘输入
/// 返回 false 表示应该退出应用
pub fn handle_key_input(app: &mut App, key: KeyEvent) -> bool {
    match app.mode {
        Mode::Normal => handle_normal_mode(app, key),
        Mode::Dialog => handle_dialog_mode(app, key),
        Mode::Help => handle_help_mode(app, key),
    }
}

/// 处理正常模式的按键
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> bool {
    match match_key(key) {
        Some(Command::Quit) => false,
        Some(cmd) => {
            execute_command(app, cmd);
            true
        }
        None => true,
    }
}

/// 匹配按键到命令
pub fn match_key(key: KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Command::Quit),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Char('j') | KeyCode::Down => Some(Command::TaskDown),
        KeyCode::Char('k') | KeyCode::Up => Some(Command::TaskUp),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => Some(Command::NextView),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => Some(Command::PrevView),
        KeyCode::Char('a') => Some(Command::NewTask),
        KeyCode::Char('e') => Some(Command::EditTask),
        KeyCode::Char('E') => Some(Command::EditTaskInEditor),
        KeyCode::Char('D') => Some(Command::SetDue),
        KeyCode::Char(' ') | KeyCode::Char('x') => Some(Command::ToggleComplete),
        KeyCode::Char('d') => Some(Command::DeleteTask),
        KeyCode::Char('y') => Some(Command::CopyTask),
        KeyCode::Char('/') => Some(Command::Search),
        KeyCode::Char('t') => Some(Command::DateFilter),
        KeyCode::Esc => Some(Command::ClearFilter),
        KeyCode::Char('r') => Some(Command::Reload),
        KeyCode::Char('?') => Some(Command::Help),
        _ => None,
    }
}

fn open_dialog(app: &mut App, dialog: DialogType) {
    app.dialog = Some(dialog);
    app.mode = Mode::Dialog;
}

/// 执行命令
fn execute_command(app: &mut App, cmd: Command) {
    match cmd {
        Command::Quit => {}
        Command::TaskDown => app.select_next(),
        Command::TaskUp => app.select_prev(),
        Command::NextView => app.set_view(app.view.next()),
        Command::PrevView => app.set_view(app.view.prev()),
        Command::NewTask => {
            open_dialog(
                app,
                DialogType::input("创建任务", "任务标题:", "", InputPurpose::NewTask),
            );
        }
        Command::EditTask => {
            if let Some(task) = app.selected_task() {
                let dialog = DialogType::input(
                    "编辑任务",
                    "任务标题:",
                    task.title.clone(),
                    InputPurpose::EditTitle(task.id),
                );
                open_dialog(app, dialog);
            }
        }
        Command::SetDue => {
            if let Some(task) = app.selected_task() {
                let current = match (task.due_date, task.due_time) {
                    (Some(d), Some(t)) => format!("{} {}", d.format("%Y-%m-%d"), t.format("%H:%M")),
                    (Some(d), None) => d.format("%Y-%m-%d").to_string(),
                    _ => String::new(),
                };
                let dialog = DialogType::input(
                    "设置到期时间",
                    "格式 YYYY-MM-DD HH:MM（留空清除）:",
                    current,
                    InputPurpose::SetDue(task.id),
                );
                open_dialog(app, dialog);
            }
        }
        Command::ToggleComplete => app.toggle_selected(),
        Command::DeleteTask => {
            if let Some(task) = app.selected_task() {
                let dialog = DialogType::Confirm {
                    title: "删除任务".to_string(),
                    message: format!("确定要删除任务 \"{}\" 吗？", task.title),
                    yes_selected: true,
                    action: ConfirmAction::DeleteTask(task.id),
                };
                open_dialog(app, dialog);
            }
        }
        Command::EditTaskInEditor => app.open_selected_in_editor(),
        Command::CopyTask => app.copy_selected(),
        Command::Search => {
            let current = app.filter.query.clone().unwrap_or_default();
            open_dialog(
                app,
                DialogType::input("搜索", "标题或描述包含（留空清除）:", current, InputPurpose::Search),
            );
        }
        Command::DateFilter => {
            let current = app
                .filter
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            open_dialog(
                app,
                DialogType::input(
                    "按日期筛选",
                    "到期日期 YYYY-MM-DD（留空清除）:",
                    current,
                    InputPurpose::DateFilter,
                ),
            );
        }
        Command::ClearFilter => {
            if !app.filter.is_empty() {
                app.set_filter(TaskFilter::default());
            }
        }
        Command::Reload => {
            app.reload_from_disk();
            app.show_notification("已重新加载".to_string(), NotificationLevel::Info);
        }
        Command::Help => app.mode = Mode::Help,
    }
}

fn close_dialog(app: &mut App) -> Option<DialogType> {
    app.mode = Mode::Normal;
    app.dialog.take()
}

/// 处理对话框模式的按键
fn handle_dialog_mode(app: &mut App, key: KeyEvent) -> bool {
    let Some(dialog) = &mut app.dialog else {
        app.mode = Mode::Normal;
        return true;
    };

    match dialog {
        DialogType::Input { field, .. } => match key.code {
            KeyCode::Esc => {
                close_dialog(app);
            }
            KeyCode::Enter => {
                if let Some(DialogType::Input { field, purpose, .. }) = close_dialog(app) {
                    handle_input_submit(app, purpose, field.value.trim().to_string());
                }
            }
            KeyCode::Backspace => field.backspace(),
            KeyCode::Delete => field.delete(),
            KeyCode::Left => field.left(),
            KeyCode::Right => field.right(),
            KeyCode::Home => field.home(),
            KeyCode::End => field.end(),
            KeyCode::Char(c) => field.insert(c),
            _ => {}
        },
        DialogType::Confirm { yes_selected, .. } => match key.code {
            KeyCode::Esc | KeyCode::Char('n') => {
                close_dialog(app);
            }
            KeyCode::Enter => {
                let confirmed = *yes_selected;
                if let Some(DialogType::Confirm { action, .. }) = close_dialog(app) {
                    if confirmed {
                        handle_confirm(app, action);
                    }
                }
            }
            KeyCode::Left | KeyCode::Char('h') => *yes_selected = true,
            KeyCode::Right | KeyCode::Char('l') => *yes_selected = false,
            KeyCode::Char('y') => {
                if let Some(DialogType::Confirm { action, .. }) = close_dialog(app) {
                    handle_confirm(app, action);
                }
            }
            _ => {}
        },
    }
    true
}

/// 处理输入对话框提交
fn handle_input_submit(app: &mut App, purpose: InputPurpose, value: String) {
    match purpose {
        InputPurpose::NewTask => {
            if !value.is_empty() {
                app.create_task(value);
            }
        }
        InputPurpose::EditTitle(id) => {
            if !value.is_empty() {
                let patch = TaskPatch {
                    title: Some(value),
                    ..Default::default()
                };
                app.update_task(id, patch);
            }
        }
        InputPurpose::SetDue(id) => match parse_due_input(&value) {
            Ok(due) => {
                let patch = match due {
                    Some((date, time)) => TaskPatch::due(Some(date), time),
                    None => TaskPatch::due(None, None),
                };
                if app.update_task(id, patch) {
                    let message = if value.is_empty() {
                        format!("已清除 #{} 的到期时间", id)
                    } else {
                        format!("#{} 到期时间: {}", id, value)
                    };
                    app.show_notification(message, NotificationLevel::Success);
                }
            }
            Err(e) => app.show_notification(e, NotificationLevel::Error),
        },
        InputPurpose::Search => {
            let filter = TaskFilter {
                query: (!value.is_empty()).then_some(value),
                date: app.filter.date,
            };
            app.set_filter(filter);
        }
        InputPurpose::DateFilter => {
            if value.is_empty() {
                let filter = TaskFilter {
                    date: None,
                    ..app.filter.clone()
                };
                app.set_filter(filter);
                return;
            }
            match parse_due_date(&value) {
                Ok(date) => {
                    let filter = TaskFilter {
                        date: Some(date),
                        ..app.filter.clone()
                    };
                    app.set_filter(filter);
                }
                Err(e) => app.show_notification(e, NotificationLevel::Error),
            }
        }
    }
}

/// 处理确认对话框
fn handle_confirm(app: &mut App, action: ConfirmAction) {
    match action {
        ConfirmAction::DeleteTask(id) => app.delete_task(id),
    }
}

/// 处理帮助模式的按键
fn handle_help_mode(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
            app.mode = Mode::Normal;
        }
        _ => {}
    }
    true
}
