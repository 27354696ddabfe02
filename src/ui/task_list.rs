use crate::app::App;
use crate::models::{Priority, Task};
use crate::views::View;
use chrono::NaiveDate;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

/// 渲染视图标签栏
pub fn render_tabs(f: &mut Frame, area: Rect, app: &App) {
    let counts = app.view_counts();
    let mut spans = vec![Span::raw(" ")];

    for (view, count) in View::ALL.iter().zip(counts) {
        let style = if *view == app.view {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ({}) ", view.label(), count), style));
        spans.push(Span::raw(" "));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// 渲染当前视图的任务列表
pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let today = app.today();
    let tasks = app.visible_tasks();

    let items: Vec<ListItem> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let is_selected = i == app.selected;

            // 只有选中的任务高亮，其他使用默认样式
            let style = if is_selected {
                Style::default()
                    .bg(Color::Rgb(41, 98, 218))
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD)
            } else if task.completed {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            let selection_indicator = if is_selected {
                Span::styled("▶ ", Style::default().fg(Color::White))
            } else {
                Span::raw("  ")
            };

            let checkbox = if task.completed { "[x] " } else { "[ ] " };

            let title_style = if task.completed {
                Style::default().add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default()
            };

            let mut spans = vec![
                Span::raw(" "),
                selection_indicator,
                Span::raw(checkbox),
                priority_indicator(task.priority()),
                Span::styled(task.title.clone(), title_style),
            ];
            if let Some(due) = due_span(task, today, app.is_missed(task)) {
                spans.push(Span::raw("  "));
                spans.push(due);
            }

            ListItem::new(Line::from(spans)).style(style)
        })
        .collect();

    let title = format!(" {} ({}) ", app.view.label(), tasks.len());
    let block = Block::default()
        .title(title)
        .title_alignment(ratatui::layout::Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .border_type(ratatui::widgets::BorderType::Rounded);

    if items.is_empty() {
        let hint = if app.filter.is_empty() {
            "没有任务 - 按 a 创建"
        } else {
            "没有匹配的任务 - 按 Esc 清除筛选"
        };
        let paragraph = Paragraph::new(hint)
            .block(block)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(paragraph, area);
        return;
    }

    let mut state = ListState::default();
    state.select(Some(app.selected));
    f.render_stateful_widget(List::new(items).block(block), area, &mut state);
}

/// 优先级指示器
fn priority_indicator(priority: Option<Priority>) -> Span<'static> {
    match priority {
        Some(Priority::High) => Span::styled("● ", Style::default().fg(Color::Red)),
        Some(Priority::Medium) => Span::styled("● ", Style::default().fg(Color::Yellow)),
        Some(Priority::Low) => Span::styled("● ", Style::default().fg(Color::Blue)),
        None => Span::raw("  "),
    }
}

/// 到期时间标签
fn due_span(task: &Task, today: NaiveDate, missed: bool) -> Option<Span<'static>> {
    let date = task.due_date?;
    let label = due_label(date, task.due_time.map(|t| t.format("%H:%M").to_string()), today);

    let style = if task.completed {
        Style::default().fg(Color::DarkGray)
    } else if missed {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else if date < today {
        Style::default().fg(Color::Red)
    } else if date == today {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let text = if missed {
        format!("⚠ {}", label)
    } else if task.reminder_shown {
        format!("🔔 {}", label)
    } else {
        label
    };
    Some(Span::styled(text, style))
}

fn due_label(date: NaiveDate, time: Option<String>, today: NaiveDate) -> String {
    let day = if date == today {
        "今天".to_string()
    } else if today.succ_opt() == Some(date) {
        "明天".to_string()
    } else {
        date.format("%Y-%m-%d").to_string()
    };

    match time {
        Some(time) => format!("{} {}", day, time),
        None => day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_label() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        assert_eq!(due_label(today, Some("09:00".to_string()), today), "今天 09:00");
        assert_eq!(due_label(today.succ_opt().unwrap(), None, today), "明天");
        assert_eq!(
            due_label(NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(), None, today),
            "2024-04-30"
        );
    }
}
