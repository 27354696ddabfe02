use crate::app::{App, Mode};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// 渲染状态栏（Helix 风格）
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let mode_text = match app.mode {
        Mode::Normal => ("NORMAL", Color::Green),
        Mode::Dialog => ("DIALOG", Color::Magenta),
        Mode::Help => ("HELP", Color::Blue),
    };

    let filter_display = app
        .filter
        .describe()
        .map(|d| format!(" | {}", d))
        .unwrap_or_default();

    let position = match app.visible_tasks().len() {
        0 => "0/0".to_string(),
        n => format!("{}/{}", app.selected + 1, n),
    };

    let reminder_badge = if app.reminders_running() {
        Span::styled(" ⏰ ", Style::default().fg(Color::Magenta))
    } else {
        Span::styled(" 提醒未运行 ", Style::default().fg(Color::Red))
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_text.0),
            Style::default()
                .fg(Color::Black)
                .bg(mode_text.1)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {} | {}", app.view.label(), position)),
        Span::styled(filter_display, Style::default().fg(Color::Yellow)),
        Span::styled(
            format!(" | {} 个任务 | ? 帮助 ", app.tasks.len()),
            Style::default().fg(Color::Gray),
        ),
        reminder_badge,
    ]);

    let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));

    f.render_widget(paragraph, area);
}
