use anyhow::Result;
use crossbeam_channel::Receiver;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::Path;

mod app;
mod cli;
mod config;
mod error;
mod fs;
mod input;
mod logging;
mod models;
mod reminder;
mod state;
mod ui;
mod views;

use app::{App, NotificationLevel};
use reminder::SinkEvent;

fn main() -> Result<()> {
    // 检查首次运行并加载配置
    let (config, is_first_run) = config::check_first_run()?;
    let data_dir = config.data_dir();

    // 日志写入数据目录；失败时不影响使用
    let _log_guard = match logging::init(&data_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("警告: {}", e);
            None
        }
    };

    // 处理 CLI 命令
    let should_run_tui = cli::handle_cli(&config)?;

    // 如果 CLI 命令已处理，直接退出
    if !should_run_tui {
        return Ok(());
    }

    tracing::info!(data_dir = %data_dir.display(), "starting tui");

    // 创建应用并启动提醒线程
    let mut app = App::new(config, &data_dir)?;
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    if let Err(e) = app.start_reminders(event_tx) {
        tracing::error!(error = %e, "failed to start reminder scanner");
        app.show_notification(format!("提醒线程启动失败: {}", e), NotificationLevel::Error);
    }
    if is_first_run {
        app.show_notification(
            format!("欢迎使用！配置文件: {}", config::get_config_path().display()),
            NotificationLevel::Info,
        );
    }

    // 设置终端
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // 运行应用
    let res = run_app(&mut terminal, &mut app, &event_rx);

    // 先停止提醒线程，再恢复终端
    app.stop_reminders();
    app.save_ui_state();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "tui exited with error");
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

/// 暂停终端（用于调用外部编辑器）
pub fn suspend_terminal<B: ratatui::backend::Backend + std::io::Write>(terminal: &mut Terminal<B>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    Ok(())
}

/// 恢复终端（从外部编辑器返回）
pub fn resume_terminal<B: ratatui::backend::Backend + std::io::Write>(terminal: &mut Terminal<B>) -> Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen)?;
    terminal.clear()?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend + std::io::Write>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &Receiver<SinkEvent>,
) -> Result<()> {
    loop {
        // 处理提醒线程发来的事件
        while let Ok(event) = events.try_recv() {
            if app.handle_sink_event(event) {
                execute!(terminal.backend_mut(), Print("\x07"))?;
            }
        }
        app.clear_expired_notification();

        terminal.draw(|f| ui::render(f, app))?;

        // 检查是否需要打开外部编辑器
        if let Some(file_path) = app.pending_editor_file.take() {
            suspend_terminal(terminal)?;

            // 调用外部编辑器
            if let Err(e) = open_external_editor(&file_path, &app.config.editor) {
                app.show_notification(format!("打开编辑器失败: {}", e), NotificationLevel::Error);
            }

            resume_terminal(terminal)?;

            // 重新加载以获取最新的任务数据
            app.reload_from_disk();
            continue;
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                // Windows 上会同时收到按下和释放事件
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if !app.handle_key(key) {
                    return Ok(()); // 退出应用
                }
            }
        }
    }
}

/// 调用外部编辑器打开文件
fn open_external_editor(file_path: &Path, editor_cmd: &str) -> Result<()> {
    // 解析编辑器命令（可能包含参数）
    let parts: Vec<&str> = editor_cmd.split_whitespace().collect();
    let (editor, args) = if parts.is_empty() {
        ("vim", vec![])
    } else {
        (parts[0], parts[1..].to_vec())
    };

    let mut cmd = std::process::Command::new(editor);
    for arg in args {
        cmd.arg(arg);
    }
    cmd.arg(file_path);

    let status = cmd.status()?;

    if !status.success() {
        anyhow::bail!("编辑器退出异常: {}", status);
    }

    Ok(())
}
