use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::dialogs::centered_rect;

fn heading(text: &str) -> Line<'_> {
    Line::from(Span::styled(
        text,
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

fn key<'a>(keys: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<11}", keys), Style::default().fg(Color::Cyan)),
        Span::raw(desc),
    ])
}

/// 渲染帮助面板
pub fn render(f: &mut Frame, area: Rect) {
    let popup_area = centered_rect(70, 75, area);

    // 清空弹窗区域
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" 键盘快捷键帮助 (按 ESC 或 ? 关闭) ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(Color::Black));

    f.render_widget(block.clone(), popup_area);

    let inner = block.inner(popup_area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    // 左列：导航和筛选
    let navigation_help = vec![
        heading("基础导航"),
        Line::from(""),
        key("j, ↓", "下一个任务"),
        key("k, ↑", "上一个任务"),
        key("l, Tab", "下一个视图"),
        key("h, S-Tab", "上一个视图"),
        key("r", "重新加载任务文件"),
        key("q", "退出程序"),
        Line::from(""),
        heading("筛选"),
        Line::from(""),
        key("/", "搜索标题和描述"),
        key("t", "按到期日期筛选"),
        key("ESC", "清除筛选"),
    ];

    // 右列：任务操作
    let task_help = vec![
        heading("任务操作"),
        Line::from(""),
        key("a", "创建新任务"),
        key("e", "编辑任务标题"),
        key("D", "设置到期时间"),
        key("Space, x", "切换完成状态"),
        key("d", "删除任务"),
        key("E", "用外部编辑器打开"),
        key("y", "复制任务"),
        Line::from(""),
        heading("提醒"),
        Line::from(""),
        Line::from("• 到期时响铃并在顶部显示提醒"),
        Line::from("• 每个任务只提醒一次"),
        Line::from("• 错过补发窗口的任务标记为 ⚠"),
        Line::from("• 修改到期时间会重新提醒"),
    ];

    let nav_widget = Paragraph::new(navigation_help)
        .block(Block::default().borders(Borders::RIGHT))
        .wrap(Wrap { trim: false });

    let task_widget = Paragraph::new(task_help).wrap(Wrap { trim: false });

    f.render_widget(nav_widget, columns[0]);
    f.render_widget(task_widget, columns[1]);
}
