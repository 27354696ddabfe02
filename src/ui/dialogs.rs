use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::models::TaskId;

/// 输入对话框的用途
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    NewTask,
    EditTitle(TaskId),
    SetDue(TaskId),
    Search,
    DateFilter,
}

/// 确认操作类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteTask(TaskId),
}

/// 单行输入框。光标按字符计数，正确处理汉字等多字节字符
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    pub value: String,
    pub cursor_pos: usize,
}

impl InputField {
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor_pos = value.chars().count();
        Self { value, cursor_pos }
    }

    fn byte_index(&self, char_pos: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert(&mut self, c: char) {
        let idx = self.byte_index(self.cursor_pos);
        self.value.insert(idx, c);
        self.cursor_pos += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let idx = self.byte_index(self.cursor_pos);
            self.value.remove(idx);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor_pos < self.value.chars().count() {
            let idx = self.byte_index(self.cursor_pos);
            self.value.remove(idx);
        }
    }

    pub fn left(&mut self) {
        self.cursor_pos = self.cursor_pos.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor_pos = (self.cursor_pos + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn end(&mut self) {
        self.cursor_pos = self.value.chars().count();
    }

    /// 光标前、光标处、光标后三段
    fn split_at_cursor(&self) -> (&str, Option<char>, &str) {
        let idx = self.byte_index(self.cursor_pos);
        let (before, rest) = self.value.split_at(idx);
        let mut chars = rest.chars();
        let at = chars.next();
        (before, at, chars.as_str())
    }
}

/// 对话框类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogType {
    /// 输入对话框（创建任务、改标题、设置到期时间、筛选）
    Input {
        title: String,
        prompt: String,
        field: InputField,
        purpose: InputPurpose,
    },
    /// 确认对话框
    Confirm {
        title: String,
        message: String,
        yes_selected: bool,
        action: ConfirmAction,
    },
}

impl DialogType {
    pub fn input(title: &str, prompt: &str, value: impl Into<String>, purpose: InputPurpose) -> Self {
        DialogType::Input {
            title: title.to_string(),
            prompt: prompt.to_string(),
            field: InputField::with_value(value),
            purpose,
        }
    }
}

/// 渲染居中的对话框
pub fn render_dialog(f: &mut Frame, dialog: &DialogType) {
    let area = match dialog {
        DialogType::Input { .. } => centered_rect_fixed(60, 9, f.area()),
        DialogType::Confirm { .. } => centered_rect_fixed(50, 8, f.area()),
    };

    // 清空对话框区域
    f.render_widget(Clear, area);

    match dialog {
        DialogType::Input {
            title,
            prompt,
            field,
            ..
        } => render_input_dialog(f, area, title, prompt, field),
        DialogType::Confirm {
            title,
            message,
            yes_selected,
            ..
        } => render_confirm_dialog(f, area, title, message, *yes_selected),
    }
}

/// 渲染输入对话框
fn render_input_dialog(f: &mut Frame, area: Rect, title: &str, prompt: &str, field: &InputField) {
    let block = Block::default()
        .title(format!("  {}  ", title))
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Rgb(76, 86, 106)))  // Nord border color
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(Color::Rgb(46, 52, 64)));  // Nord background

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // 提示文本
            Constraint::Length(3), // 输入框
            Constraint::Min(0),    // 帮助
        ])
        .split(inner);

    let prompt_text = Paragraph::new(prompt).style(Style::default().fg(Color::Rgb(129, 161, 193)));  // Nord frost color
    f.render_widget(prompt_text, chunks[0]);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Rgb(136, 192, 208)))  // Nord cyan
        .border_type(ratatui::widgets::BorderType::Rounded);

    // 光标处的字符反色显示
    let (before, at, after) = field.split_at_cursor();
    let cursor_style = Style::default().add_modifier(Modifier::REVERSED);
    let line = Line::from(vec![
        Span::raw(before),
        Span::styled(at.map(String::from).unwrap_or_else(|| " ".to_string()), cursor_style),
        Span::raw(after),
    ]);
    let input = Paragraph::new(line)
        .block(input_block)
        .style(Style::default().fg(Color::Rgb(216, 222, 233)));
    f.render_widget(input, chunks[1]);

    let help = Paragraph::new("Enter 确认  Esc 取消")
        .style(Style::default().fg(Color::Rgb(129, 161, 193)))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[2]);
}

/// 渲染确认对话框
fn render_confirm_dialog(
    f: &mut Frame,
    area: Rect,
    title: &str,
    message: &str,
    yes_selected: bool,
) {
    let block = Block::default()
        .title(format!("  {}  ", title))
        .title_alignment(Alignment::Left)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Rgb(235, 203, 139)))  // Nord yellow for warnings
        .border_type(ratatui::widgets::BorderType::Rounded)
        .style(Style::default().bg(Color::Rgb(46, 52, 64)));  // Nord background

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // 消息
            Constraint::Length(1), // 按钮
        ])
        .split(inner);

    let message_text = Paragraph::new(message)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Rgb(216, 222, 233)));  // Nord snow storm
    f.render_widget(message_text, chunks[0]);

    let button_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ])
        .split(chunks[1]);

    // 否按钮 (n) - 放在左侧
    let no_style = if !yes_selected {
        Style::default()
            .bg(Color::Rgb(191, 97, 106))
            .fg(Color::Rgb(46, 52, 64))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Rgb(191, 97, 106))
            .add_modifier(Modifier::DIM)
    };
    let no_button = Paragraph::new("[ n ] 否")
        .style(no_style)
        .alignment(Alignment::Center);
    f.render_widget(no_button, button_chunks[1]);

    // 是按钮 (y) - 放在右侧
    let yes_style = if yes_selected {
        Style::default()
            .bg(Color::Rgb(163, 190, 140))
            .fg(Color::Rgb(46, 52, 64))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Rgb(163, 190, 140))
            .add_modifier(Modifier::DIM)
    };
    let yes_button = Paragraph::new("[ y ] 是")
        .style(yes_style)
        .alignment(Alignment::Center);
    f.render_widget(yes_button, button_chunks[2]);
}

/// 按百分比宽度、固定高度居中
fn centered_rect_fixed(percent_x: u16, height: u16, r: Rect) -> Rect {
    let height = height.min(r.height);
    let vertical = Rect {
        x: r.x,
        y: r.y + (r.height - height) / 2,
        width: r.width,
        height,
    };

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical)[1]
}

/// 创建一个居中的矩形区域
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
