pub mod dialogs;
pub mod help;
mod statusbar;
mod task_list;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

/// 主渲染函数
pub fn render(f: &mut Frame, app: &App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // 视图标签栏
            Constraint::Min(0),    // 任务列表
            Constraint::Length(1), // 状态栏
        ])
        .split(f.area());

    task_list::render_tabs(f, main_chunks[0], app);
    task_list::render(f, main_chunks[1], app);
    statusbar::render(f, main_chunks[2], app);

    // 渲染对话框（如果有）
    if let Some(dialog) = &app.dialog {
        dialogs::render_dialog(f, dialog);
    }

    // 渲染帮助面板（如果处于帮助模式）
    if app.mode == crate::app::Mode::Help {
        help::render(f, f.area());
    }

    // 渲染通知栏（如果有通知）
    if let Some(ref notification) = app.notification {
        render_notification(f, f.area(), notification);
    }
}

/// 渲染通知栏
fn render_notification(f: &mut Frame, area: ratatui::layout::Rect, notification: &crate::app::Notification) {
    use crate::app::NotificationLevel;
    use ratatui::style::{Color, Modifier, Style};
    use ratatui::text::{Line, Span};
    use ratatui::widgets::{Block, Borders, Clear, Paragraph};

    // 通知栏占据顶部 3 行
    let notification_area = ratatui::layout::Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: area.height.min(3),
    };

    // 根据级别选择颜色
    let (bg_color, fg_color, prefix) = match notification.level {
        NotificationLevel::Info => (Color::Blue, Color::White, "ℹ"),
        NotificationLevel::Success => (Color::Green, Color::White, "✓"),
        NotificationLevel::Warning => (Color::Yellow, Color::Black, "⚠"),
        NotificationLevel::Error => (Color::Red, Color::White, "✗"),
        NotificationLevel::Reminder => (Color::Magenta, Color::White, "提醒"),
    };

    let content = Line::from(vec![
        Span::styled(format!(" {} ", prefix), Style::default().fg(fg_color).bg(bg_color).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::styled(notification.message.as_str(), Style::default().fg(fg_color)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(bg_color))
        .style(Style::default().bg(bg_color));

    let paragraph = Paragraph::new(content).block(block);

    f.render_widget(Clear, notification_area);
    f.render_widget(paragraph, notification_area);
}
