use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::{parse_due_date, parse_due_time, Task, TaskId};

/// 任务文件的 TOML frontmatter
///
/// 截止日期和时间以字符串保存，便于手工编辑（`09:00` 和 `09:00:00` 都可以）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFrontmatter {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub reminder_shown: bool,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

/// TOML frontmatter 解析结果
#[derive(Debug)]
pub struct ParsedTaskFile {
    pub frontmatter: TaskFrontmatter,
    pub title: String,
    pub content: String,
}

/// 解析 TOML frontmatter 格式的任务文件
///
/// 格式：
/// ```text
/// +++
/// id = 1
/// due_date = "2024-01-01"
/// due_time = "09:00"
/// completed = false
/// reminder_shown = false
/// created_at = "2024-01-01T08:00:00+08:00"
/// updated_at = "2024-01-01T08:00:00+08:00"
/// +++
///
/// # 任务标题
///
/// 任务描述...
/// ```
pub fn parse_toml_frontmatter(content: &str) -> Result<ParsedTaskFile, String> {
    let trimmed = content.trim_start();

    // 检查是否以 +++ 开头
    if !trimmed.starts_with("+++") {
        return Err("Not a TOML frontmatter format: missing opening +++".to_string());
    }

    // 找到第二个 +++
    let after_first = &trimmed[3..];
    let second_pos = after_first
        .find("\n+++")
        .ok_or("Not a TOML frontmatter format: missing closing +++")?;

    let frontmatter_str = after_first[..second_pos].trim();

    let frontmatter: TaskFrontmatter = toml::from_str(frontmatter_str).map_err(|e| {
        let error_msg = format!("Failed to parse TOML frontmatter: {}", e);
        tracing::debug!(frontmatter = frontmatter_str, "{}", error_msg);
        error_msg
    })?;

    // +4 跳过 "\n+++"
    let after_frontmatter = &after_first[second_pos + 4..];
    let (title, body_content) = extract_title_and_content(after_frontmatter);

    if title.is_empty() {
        return Err("No title found".to_string());
    }

    Ok(ParsedTaskFile {
        frontmatter,
        title,
        content: body_content,
    })
}

/// 从内容中提取标题（第一个 # 开头的行）和剩余内容
fn extract_title_and_content(content: &str) -> (String, String) {
    let mut title = String::new();
    let mut content_lines: Vec<&str> = Vec::new();
    let mut found_title = false;

    for line in content.lines() {
        if !found_title {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("# ") {
                let potential_title = rest.trim();
                // 跳过 "# +++" 这样的无效标题
                if potential_title == "+++" || potential_title.is_empty() {
                    continue;
                }
                title = potential_title.to_string();
                found_title = true;
                continue;
            } else if trimmed.is_empty() || trimmed == "+++" {
                continue;
            }
        }
        if found_title {
            content_lines.push(line);
        }
    }

    if !found_title {
        return (String::new(), content.trim().to_string());
    }

    let body = content_lines.join("\n");
    (title, body.trim().to_string())
}

/// 生成 TOML frontmatter 格式的任务文件内容
pub fn generate_toml_frontmatter(
    frontmatter: &TaskFrontmatter,
    title: &str,
    content: &str,
) -> Result<String, String> {
    let toml_str = toml::to_string_pretty(frontmatter).map_err(|e| e.to_string())?;

    let mut output = String::new();
    output.push_str("+++\n");
    output.push_str(&toml_str);
    if !toml_str.ends_with('\n') {
        output.push('\n');
    }
    output.push_str("+++\n\n");
    output.push_str(&format!("# {}\n", title));

    if !content.is_empty() {
        output.push('\n');
        output.push_str(content);
        if !content.ends_with('\n') {
            output.push('\n');
        }
    }

    Ok(output)
}

/// Render a task into the on-disk file format.
pub fn render_task_file(task: &Task) -> Result<String, String> {
    let frontmatter = TaskFrontmatter {
        id: task.id.0,
        due_date: task.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
        due_time: task.due_time.map(|t| t.format("%H:%M:%S").to_string()),
        completed: task.completed,
        reminder_shown: task.reminder_shown,
        created_at: task.created_at,
        updated_at: task.updated_at,
    };
    generate_toml_frontmatter(&frontmatter, &task.title, &task.description)
}

/// Parse a task file back into a [`Task`].
pub fn parse_task_file(content: &str) -> Result<Task, String> {
    let parsed = parse_toml_frontmatter(content)?;
    let fm = parsed.frontmatter;

    let due_date = fm.due_date.as_deref().map(parse_due_date).transpose()?;
    let due_time = fm.due_time.as_deref().map(parse_due_time).transpose()?;

    Ok(Task {
        id: TaskId(fm.id),
        title: parsed.title,
        description: parsed.content,
        due_date,
        due_time,
        completed: fm.completed,
        reminder_shown: fm.reminder_shown,
        created_at: fm.created_at,
        updated_at: fm.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn test_parse_hand_written_file() {
        let md = r#"+++
id = 7
due_date = "2024-01-01"
due_time = "09:00"
completed = false
reminder_shown = true
created_at = "2024-01-01T08:00:00+00:00"
updated_at = "2024-01-01T08:30:00+00:00"
+++

# Call the bank

[HIGH] ask about the transfer
"#;

        let task = parse_task_file(md).unwrap();
        assert_eq!(task.id, TaskId(7));
        assert_eq!(task.title, "Call the bank");
        assert_eq!(task.description, "[HIGH] ask about the transfer");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(task.due_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert!(task.reminder_shown);
        assert!(!task.completed);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let md = r#"+++
id = 1
created_at = "2024-01-01T08:00:00+00:00"
updated_at = "2024-01-01T08:00:00+00:00"
+++

# Inbox item
"#;

        let task = parse_task_file(md).unwrap();
        assert!(task.due_date.is_none());
        assert!(task.due_time.is_none());
        assert!(!task.completed);
        assert!(!task.reminder_shown);
        assert!(task.description.is_empty());
    }

    #[test]
    fn test_render_then_parse_keeps_fields() {
        let mut task = Task::new(
            TaskId(3),
            NewTask::titled("中文任务标题").due(
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                NaiveTime::from_hms_opt(18, 45, 0),
            ),
        );
        task.description = "## Notes\n\n- [ ] first".to_string();
        task.completed = true;

        let rendered = render_task_file(&task).unwrap();
        assert!(rendered.starts_with("+++\n"));
        assert!(rendered.contains("# 中文任务标题"));

        let parsed = parse_task_file(&rendered).unwrap();
        assert_eq!(parsed.title, task.title);
        assert_eq!(parsed.description, task.description);
        assert_eq!(parsed.due_time, task.due_time);
        assert!(parsed.completed);
        assert_eq!(parsed.created_at.timestamp(), task.created_at.timestamp());
    }

    #[test]
    fn test_missing_opening_marker() {
        let result = parse_toml_frontmatter("# Title\n\nbody");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_title_is_error() {
        let md = "+++\nid = 1\ncreated_at = \"2024-01-01T08:00:00+00:00\"\nupdated_at = \"2024-01-01T08:00:00+00:00\"\n+++\n\nno heading here\n";
        assert!(parse_toml_frontmatter(md).is_err());
    }

    #[test]
    fn test_invalid_due_time_is_error() {
        let md = r#"+++
id = 2
due_date = "2024-01-01"
due_time = "nine"
created_at = "2024-01-01T08:00:00+00:00"
updated_at = "2024-01-01T08:00:00+00:00"
+++

# Broken
"#;
        assert!(parse_task_file(md).is_err());
    }

    #[test]
    fn test_skips_empty_heading_before_title() {
        let (title, body) = extract_title_and_content("\n# +++\n\n# Real title\n\nbody line\n");
        assert_eq!(title, "Real title");
        assert_eq!(body, "body line");
    }
}
