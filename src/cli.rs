use anyhow::Result;
use std::env;
use std::sync::Arc;

use crate::config::Config;
use crate::fs::{FileTaskStore, TaskStore};
use crate::models::{parse_due_date, parse_due_time, NewTask, Priority, Task, TaskId, TaskPatch};
use crate::reminder::{ConsoleSink, ReminderScanner, ReminderWorker};
use crate::views::{filter_tasks, TaskFilter, View};

/// 处理 CLI 命令
/// 返回 true 表示应该继续进入 TUI，false 表示已处理完毕应该退出
pub fn handle_cli(config: &Config) -> Result<bool> {
    let args: Vec<String> = env::args().collect();

    // 如果没有参数，进入 TUI 模式
    if args.len() < 2 {
        return Ok(true);
    }

    let result = match args[1].as_str() {
        "add" => task_add(config, &args[2..]),
        "list" | "ls" => task_list(config, &args[2..]),
        "show" => with_id(&args[2..], "hxt show <id>").and_then(|id| task_show(config, id)),
        "done" => with_id(&args[2..], "hxt done <id>").and_then(|id| task_set_completed(config, id, true)),
        "undone" => with_id(&args[2..], "hxt undone <id>").and_then(|id| task_set_completed(config, id, false)),
        "delete" | "rm" => with_id(&args[2..], "hxt delete <id>").and_then(|id| task_delete(config, id)),
        "edit" => with_id(&args[2..], "hxt edit <id> [--title <t>] [--due <date>] [--at <time>] [--desc <text>] [--clear-due]")
            .and_then(|id| task_edit(config, id, &args[3..])),
        "watch" => {
            cli_watch(config)?;
            return Ok(false);
        }
        "config" => {
            handle_config_command(&args[2..])?;
            return Ok(false);
        }
        "--help" | "-h" | "help" => {
            print_help();
            return Ok(false);
        }
        "--version" | "-V" | "-v" => {
            print_version();
            return Ok(false);
        }
        _ => {
            eprintln!("未知命令: {}", args[1]);
            eprintln!("使用 'hxt --help' 查看帮助");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(false)
}

// ============================================================================
// Task Commands
// ============================================================================

fn open_store(config: &Config) -> Result<FileTaskStore, String> {
    FileTaskStore::open(crate::fs::tasks_dir(&config.data_dir())).map_err(|e| e.to_string())
}

fn with_id(args: &[String], usage: &str) -> Result<TaskId, String> {
    let raw = args
        .first()
        .ok_or_else(|| format!("Missing task ID\nUsage: {}", usage))?;
    raw.parse()
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|s| s == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|s| s == flag)
}

/// 位置参数（跳过 `--flag value` 对）
fn positional(args: &[String], flags_with_value: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if flags_with_value.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            out.push(arg.clone());
        }
    }
    out
}

const ADD_FLAGS: [&str; 4] = ["--due", "--at", "--desc", "--priority"];

/// 从参数构造新任务
fn parse_new_task(args: &[String]) -> Result<NewTask, String> {
    let title = positional(args, &ADD_FLAGS).join(" ");
    if title.trim().is_empty() {
        return Err(
            "Missing task title\nUsage: hxt add <title> [--due YYYY-MM-DD] [--at HH:MM] [--desc <text>] [--priority high|medium|low]"
                .to_string(),
        );
    }

    let due_date = parse_flag(args, "--due").map(|s| parse_due_date(&s)).transpose()?;
    let due_time = parse_flag(args, "--at").map(|s| parse_due_time(&s)).transpose()?;
    if due_time.is_some() && due_date.is_none() {
        return Err("--at requires --due".to_string());
    }

    let priority = match parse_flag(args, "--priority") {
        Some(p) => Some(Priority::parse(&p).ok_or_else(|| format!("Invalid priority: {}", p))?),
        None => None,
    };
    let description = Priority::tag_description(priority, &parse_flag(args, "--desc").unwrap_or_default());

    Ok(NewTask {
        title,
        description,
        due_date,
        due_time,
    })
}

fn task_add(config: &Config, args: &[String]) -> Result<(), String> {
    let fields = parse_new_task(args)?;
    let store = open_store(config)?;
    let task = store.create(fields).map_err(|e| e.to_string())?;

    println!("✓ 已添加任务 #{}: {}", task.id, task.title);
    if let Some(due) = format_due(&task) {
        println!("  到期: {}", due);
    }
    Ok(())
}

/// 从参数构造列表筛选
fn parse_list_args(args: &[String]) -> Result<(View, TaskFilter), String> {
    let view = match positional(args, &["--search", "--date"]).first() {
        Some(name) => View::parse(name).ok_or_else(|| {
            format!("Unknown view: {}\nAvailable: inbox, today, upcoming, completed", name)
        })?,
        None => View::Inbox,
    };
    let filter = TaskFilter {
        query: parse_flag(args, "--search"),
        date: parse_flag(args, "--date").map(|s| parse_due_date(&s)).transpose()?,
    };
    Ok((view, filter))
}

fn task_list(config: &Config, args: &[String]) -> Result<(), String> {
    let (view, filter) = parse_list_args(args)?;
    let store = open_store(config)?;
    let tasks = store.list_all().map_err(|e| e.to_string())?;
    let today = chrono::Local::now().date_naive();

    let visible = filter_tasks(&tasks, view, &filter, today);
    if visible.is_empty() {
        println!("No tasks found in {}.", view.name());
        return Ok(());
    }

    println!("ID    DONE  DUE               PRIORITY  TITLE");
    println!("----  ----  ----------------  --------  -----------------------------------");

    for task in visible {
        let priority = match task.priority() {
            Some(Priority::High) => "high",
            Some(Priority::Medium) => "medium",
            Some(Priority::Low) => "low",
            None => "-",
        };
        println!(
            "{:<4}  {:<4}  {:<16}  {:<8}  {}",
            task.id,
            if task.completed { "[x]" } else { "[ ]" },
            format_due(task).unwrap_or_else(|| "-".to_string()),
            priority,
            truncate(&task.title, 35)
        );
    }

    Ok(())
}

fn task_show(config: &Config, id: TaskId) -> Result<(), String> {
    let store = open_store(config)?;
    let task = store.get(id).map_err(|e| e.to_string())?;

    println!("Task #{}", task.id);
    println!("Title: {}", task.title);
    println!("Completed: {}", if task.completed { "yes" } else { "no" });
    println!("Due: {}", format_due(&task).unwrap_or_else(|| "-".to_string()));
    println!("Reminded: {}", if task.reminder_shown { "yes" } else { "no" });
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M"));
    println!("File: {}", store.task_path(task.id).to_string_lossy());
    if !task.description.is_empty() {
        println!("\nDescription:");
        println!("{}", task.description);
    }

    Ok(())
}

fn task_set_completed(config: &Config, id: TaskId, completed: bool) -> Result<(), String> {
    let store = open_store(config)?;
    let task = store
        .update_by_id(id, TaskPatch::completed(completed))
        .map_err(|e| e.to_string())?;

    if completed {
        println!("✓ 已完成 #{}: {}", task.id, task.title);
    } else {
        println!("已恢复 #{}: {}", task.id, task.title);
    }
    Ok(())
}

fn task_delete(config: &Config, id: TaskId) -> Result<(), String> {
    let store = open_store(config)?;
    store.delete_by_id(id).map_err(|e| e.to_string())?;
    println!("Deleted task #{}", id);
    Ok(())
}

/// 从参数构造部分更新
fn parse_edit_args(args: &[String]) -> Result<TaskPatch, String> {
    let mut patch = TaskPatch {
        title: parse_flag(args, "--title"),
        description: parse_flag(args, "--desc"),
        ..Default::default()
    };

    if has_flag(args, "--clear-due") {
        patch.due_date = Some(None);
        patch.due_time = Some(None);
    } else {
        if let Some(date) = parse_flag(args, "--due") {
            patch.due_date = Some(Some(parse_due_date(&date)?));
        }
        if let Some(time) = parse_flag(args, "--at") {
            patch.due_time = Some(Some(parse_due_time(&time)?));
        }
    }

    Ok(patch)
}

fn task_edit(config: &Config, id: TaskId, args: &[String]) -> Result<(), String> {
    let patch = parse_edit_args(args)?;
    if patch == TaskPatch::default() {
        println!("No changes made to task #{}", id);
        return Ok(());
    }

    let store = open_store(config)?;
    let task = store.update_by_id(id, patch).map_err(|e| e.to_string())?;
    println!("Updated task #{}", task.id);
    if let Some(due) = format_due(&task) {
        println!("  到期: {}", due);
    }
    Ok(())
}

fn format_due(task: &Task) -> Option<String> {
    let date = task.due_date?;
    Some(match task.due_time {
        Some(time) => format!("{} {}", date.format("%Y-%m-%d"), time.format("%H:%M")),
        None => date.format("%Y-%m-%d").to_string(),
    })
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len - 3).collect::<String>())
    }
}

// ============================================================================
// Watch
// ============================================================================

/// 前台运行提醒扫描，直到按下 Enter
fn cli_watch(config: &Config) -> Result<()> {
    let store = FileTaskStore::open(crate::fs::tasks_dir(&config.data_dir()))?.with_live_reload();
    let pending = store
        .list_all()?
        .iter()
        .filter(|t| !t.completed && !t.reminder_shown && t.due_at().is_some())
        .count();
    let dir = store.dir().to_path_buf();

    let worker = ReminderWorker::new(
        ReminderScanner::from_config(&config.reminder),
        Arc::new(store),
        Arc::new(ConsoleSink::stdout(config.reminder.sound)),
    );
    let handle = worker.spawn()?;

    println!("⏰ 正在监视 {}（{} 个待提醒任务），按 Enter 退出", dir.display(), pending);

    // EOF 也视为退出
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    handle.cancel();
    println!("已停止");
    Ok(())
}

// ============================================================================
// Config
// ============================================================================

fn handle_config_command(args: &[String]) -> Result<()> {
    let Some(sub) = args.first() else {
        return crate::config::show_config();
    };

    let value = args.get(1);
    match (sub.as_str(), value) {
        ("show", _) => crate::config::show_config(),
        ("editor", Some(_)) => crate::config::set_editor(args[1..].join(" ")),
        ("interval", Some(secs)) => crate::config::set_poll_interval(parse_secs(secs)?),
        ("lateness", Some(secs)) => crate::config::set_lateness_window(parse_secs(secs)?),
        ("sound", Some(v)) => match v.as_str() {
            "on" | "true" => crate::config::set_sound(true),
            "off" | "false" => crate::config::set_sound(false),
            _ => anyhow::bail!("用法: hxt config sound on|off"),
        },
        ("editor" | "interval" | "lateness" | "sound", None) => {
            anyhow::bail!("用法: hxt config {} <值>", sub)
        }
        _ => {
            eprintln!("未知的配置选项: {}", sub);
            eprintln!("可用选项: show, editor, interval, lateness, sound");
            std::process::exit(1);
        }
    }
}

fn parse_secs(s: &str) -> Result<u64> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("无效的秒数: {}", s))
}

/// 打印帮助信息
fn print_help() {
    println!("Helix Todo (hxt) - 终端待办与到期提醒\n");
    println!("用法:");
    println!("  hxt                     启动 TUI 界面（带后台提醒）");
    println!("  hxt <命令> [参数]         运行 CLI 命令");
    println!("  hxt --help              显示此帮助信息");
    println!("  hxt --version           显示版本信息\n");

    println!("任务命令:");
    println!("  add <标题> [--due YYYY-MM-DD] [--at HH:MM] [--desc <文本>] [--priority high|medium|low]");
    println!("  list [inbox|today|upcoming|completed] [--search <文本>] [--date YYYY-MM-DD]");
    println!("  show <id>               显示任务详情");
    println!("  done <id>               标记为已完成");
    println!("  undone <id>             恢复为未完成");
    println!("  delete <id>             删除任务");
    println!("  edit <id> [--title <t>] [--due <日期>] [--at <时间>] [--desc <文本>] [--clear-due]\n");

    println!("提醒:");
    println!("  watch                   前台运行提醒（按 Enter 退出）\n");

    println!("配置:");
    println!("  config [show]           显示当前配置");
    println!("  config editor <命令>     设置外部编辑器");
    println!("  config interval <秒>     设置扫描间隔");
    println!("  config lateness <秒>     设置补发窗口");
    println!("  config sound on|off     开关提醒声音\n");

    println!("示例:");
    println!("  hxt add 交房租 --due 2025-01-01 --at 09:00 --priority high");
    println!("  hxt list today");
    println!("  hxt done 3\n");

    println!("环境变量:");
    println!("  HXT_DATA_DIR            数据目录（默认 ~/.helix-todo）");
    println!("  HXT_LOG                 日志级别（默认 helix_todo=info）");
}

/// 打印版本信息
fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const NAME: &str = env!("CARGO_PKG_NAME");
    println!("{} {}", NAME, VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_new_task() {
        let fields = parse_new_task(&args(
            "Pay rent --due 2024-01-01 --at 09:00 --priority high --desc landlord",
        ))
        .unwrap();

        assert_eq!(fields.title, "Pay rent");
        assert_eq!(fields.due_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(fields.due_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(fields.description, "[HIGH] landlord");
    }

    #[test]
    fn test_parse_new_task_errors() {
        assert!(parse_new_task(&args("--due 2024-01-01")).is_err());
        assert!(parse_new_task(&args("x --at 09:00")).is_err());
        assert!(parse_new_task(&args("x --due 01/01/2024")).is_err());
        assert!(parse_new_task(&args("x --priority urgent")).is_err());
    }

    #[test]
    fn test_parse_list_args() {
        let (view, filter) = parse_list_args(&args("today --search milk")).unwrap();
        assert_eq!(view, View::Today);
        assert_eq!(filter.query.as_deref(), Some("milk"));

        let (view, filter) = parse_list_args(&args("--date 2024-02-03")).unwrap();
        assert_eq!(view, View::Inbox);
        assert_eq!(filter.date, NaiveDate::from_ymd_opt(2024, 2, 3));

        assert!(parse_list_args(&args("someday")).is_err());
    }

    #[test]
    fn test_parse_edit_args() {
        let patch = parse_edit_args(&args("--title New --at 18:30")).unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert_eq!(patch.due_time, Some(NaiveTime::from_hms_opt(18, 30, 0)));
        assert_eq!(patch.due_date, None);

        let patch = parse_edit_args(&args("--clear-due --due 2024-01-01")).unwrap();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.due_time, Some(None));

        assert_eq!(parse_edit_args(&[]).unwrap(), TaskPatch::default());
    }

    #[test]
    fn test_with_id_accepts_hash_prefix() {
        assert_eq!(with_id(&args("#12"), "usage").unwrap(), TaskId(12));
        assert!(with_id(&[], "usage").unwrap_err().contains("Usage"));
        assert!(with_id(&args("abc"), "usage").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("一二三四五六七八", 6), "一二三...");
    }
}
