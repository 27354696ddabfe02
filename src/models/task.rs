use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 任务 ID（由存储在创建时分配，不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .trim_start_matches('#')
            .parse::<u32>()
            .map(TaskId)
            .map_err(|_| format!("Invalid task ID (must be a number): {}", s))
    }
}

/// 优先级（写在描述开头的 `[HIGH]` 标记）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Some(Priority::High),
            "medium" | "med" | "m" => Some(Priority::Medium),
            "low" | "l" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Priority::High => "[HIGH]",
            Priority::Medium => "[MEDIUM]",
            Priority::Low => "[LOW]",
        }
    }

    /// Build a description carrying this priority tag in front of `body`.
    pub fn tag_description(priority: Option<Priority>, body: &str) -> String {
        let body = body.trim();
        match priority {
            Some(p) if body.is_empty() => p.tag().to_string(),
            Some(p) => format!("{} {}", p.tag(), body),
            None => body.to_string(),
        }
    }
}

/// Split a description into its leading priority tag (if any) and the rest.
fn split_priority(description: &str) -> (Option<Priority>, &str) {
    let trimmed = description.trim_start();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            if let Some(priority) = Priority::parse(&rest[..end]) {
                return (Some(priority), rest[end + 1..].trim_start());
            }
        }
    }
    (None, description)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub completed: bool,
    pub reminder_shown: bool,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Task {
    pub fn new(id: TaskId, fields: NewTask) -> Self {
        let now = Local::now();
        Self {
            id,
            title: fields.title.trim().to_string(),
            description: fields.description,
            due_date: fields.due_date,
            due_time: fields.due_time,
            completed: false,
            reminder_shown: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Combined local due timestamp; `None` unless both date and time are set.
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        match (self.due_date, self.due_time) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            _ => None,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        split_priority(&self.description).0
    }

    /// Description without the priority tag.
    pub fn body(&self) -> &str {
        split_priority(&self.description).1
    }

    /// 应用部分更新，返回是否有字段发生变化
    ///
    /// 修改截止日期/时间会开启新的提醒周期：除非补丁显式设置了
    /// `reminder_shown`，否则将其重置为 false。
    pub fn apply(&mut self, patch: TaskPatch) -> bool {
        if let Some(expected) = patch.expected_due {
            if self.due_at() != expected {
                return false;
            }
        }

        let mut changed = false;
        let mut due_changed = false;

        if let Some(title) = patch.title {
            let title = title.trim().to_string();
            if title != self.title {
                self.title = title;
                changed = true;
            }
        }
        if let Some(description) = patch.description {
            if description != self.description {
                self.description = description;
                changed = true;
            }
        }
        if let Some(due_date) = patch.due_date {
            if due_date != self.due_date {
                self.due_date = due_date;
                due_changed = true;
            }
        }
        if let Some(due_time) = patch.due_time {
            if due_time != self.due_time {
                self.due_time = due_time;
                due_changed = true;
            }
        }
        if let Some(completed) = patch.completed {
            if completed != self.completed {
                self.completed = completed;
                changed = true;
            }
        }

        match patch.reminder_shown {
            Some(shown) if shown != self.reminder_shown => {
                self.reminder_shown = shown;
                changed = true;
            }
            Some(_) => {}
            None if due_changed && self.reminder_shown => {
                self.reminder_shown = false;
            }
            None => {}
        }

        changed |= due_changed;
        if changed {
            self.updated_at = Local::now();
        }
        changed
    }
}

/// 创建任务时的字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn due(mut self, date: NaiveDate, time: Option<NaiveTime>) -> Self {
        self.due_date = Some(date);
        self.due_time = time;
        self
    }
}

/// 部分更新。外层 `None` 表示不修改该字段；对于可选字段，
/// `Some(None)` 表示清空。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub due_time: Option<Option<NaiveTime>>,
    pub completed: Option<bool>,
    pub reminder_shown: Option<bool>,
    /// 条件更新：仅当任务当前的到期时间等于该值时才应用，否则整个补丁不生效
    pub expected_due: Option<Option<NaiveDateTime>>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    /// 确认某个到期周期的提醒已送达；到期时间已被修改时不生效
    pub fn acknowledge(due: Option<NaiveDateTime>) -> Self {
        Self {
            reminder_shown: Some(true),
            expected_due: Some(due),
            ..Default::default()
        }
    }

    pub fn due(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Self {
        Self {
            due_date: Some(date),
            due_time: Some(time),
            ..Default::default()
        }
    }
}

/// Parse a due date in `YYYY-MM-DD` form.
pub fn parse_due_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", s.trim()))
}

/// Parse a due time in `HH:MM` or `HH:MM:SS` form.
pub fn parse_due_time(s: &str) -> Result<NaiveTime, String> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("Invalid time '{}', expected HH:MM", s))
}

/// Parse `YYYY-MM-DD [HH:MM]` as typed into the due dialog. An empty string
/// clears the due date.
pub fn parse_due_input(s: &str) -> Result<Option<(NaiveDate, Option<NaiveTime>)>, String> {
    let mut parts = s.split_whitespace();
    let Some(date) = parts.next() else {
        return Ok(None);
    };
    let date = parse_due_date(date)?;
    let time = parts.next().map(parse_due_time).transpose()?;
    if parts.next().is_some() {
        return Err(format!("Unexpected input '{}', expected YYYY-MM-DD HH:MM", s.trim()));
    }
    Ok(Some((date, time)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new(
            TaskId(1),
            NewTask::titled("Write report").due(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            ),
        )
    }

    #[test]
    fn test_due_at_requires_both_parts() {
        let mut task = sample();
        assert_eq!(
            task.due_at(),
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
        );

        task.due_time = None;
        assert!(task.due_at().is_none());

        task.due_time = NaiveTime::from_hms_opt(9, 0, 0);
        task.due_date = None;
        assert!(task.due_at().is_none());
    }

    #[test]
    fn test_priority_tag_parsing() {
        let mut task = sample();
        task.description = "[HIGH] call the bank".to_string();
        assert_eq!(task.priority(), Some(Priority::High));
        assert_eq!(task.body(), "call the bank");

        task.description = "[low]".to_string();
        assert_eq!(task.priority(), Some(Priority::Low));
        assert_eq!(task.body(), "");

        task.description = "[note] not a priority".to_string();
        assert_eq!(task.priority(), None);
        assert_eq!(task.body(), "[note] not a priority");
    }

    #[test]
    fn test_tag_description() {
        assert_eq!(
            Priority::tag_description(Some(Priority::Medium), "  body "),
            "[MEDIUM] body"
        );
        assert_eq!(Priority::tag_description(None, "body"), "body");
        assert_eq!(Priority::tag_description(Some(Priority::High), ""), "[HIGH]");
    }

    #[test]
    fn test_changing_due_resets_reminder_shown() {
        let mut task = sample();
        task.reminder_shown = true;

        let changed = task.apply(TaskPatch {
            due_time: Some(NaiveTime::from_hms_opt(10, 0, 0)),
            ..Default::default()
        });

        assert!(changed);
        assert!(!task.reminder_shown);
    }

    #[test]
    fn test_same_due_keeps_reminder_shown() {
        let mut task = sample();
        task.reminder_shown = true;
        let due_date = task.due_date;

        let changed = task.apply(TaskPatch {
            due_date: Some(due_date),
            ..Default::default()
        });

        assert!(!changed);
        assert!(task.reminder_shown);
    }

    #[test]
    fn test_explicit_reminder_shown_wins_over_reset() {
        let mut task = sample();
        task.apply(TaskPatch {
            due_time: Some(NaiveTime::from_hms_opt(11, 30, 0)),
            reminder_shown: Some(true),
            ..Default::default()
        });
        assert!(task.reminder_shown);
    }

    #[test]
    fn test_acknowledge_only_matches_delivered_due() {
        let mut task = sample();
        let delivered_due = task.due_at();

        // 送达后、确认前到期时间被改到 18:00
        task.apply(TaskPatch {
            due_time: Some(NaiveTime::from_hms_opt(18, 0, 0)),
            ..Default::default()
        });

        assert!(!task.apply(TaskPatch::acknowledge(delivered_due)));
        assert!(!task.reminder_shown);

        assert!(task.apply(TaskPatch::acknowledge(task.due_at())));
        assert!(task.reminder_shown);
    }

    #[test]
    fn test_apply_refreshes_updated_at() {
        let mut task = sample();
        let before = task.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(task.apply(TaskPatch::completed(true)));
        assert!(task.updated_at > before);
        assert!(task.completed);
    }

    #[test]
    fn test_parse_due_time_formats() {
        assert_eq!(
            parse_due_time("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            parse_due_time("23:59:30").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 30).unwrap()
        );
        assert!(parse_due_time("9am").is_err());
        assert!(parse_due_date("2024-13-01").is_err());
        assert_eq!(
            "#42".parse::<TaskId>().unwrap(),
            TaskId(42)
        );
    }

    #[test]
    fn test_parse_due_input() {
        assert_eq!(parse_due_input("   ").unwrap(), None);
        assert_eq!(
            parse_due_input("2024-01-01 09:30").unwrap(),
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveTime::from_hms_opt(9, 30, 0)
            ))
        );
        assert_eq!(
            parse_due_input("2024-01-01").unwrap(),
            Some((NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None))
        );
        assert!(parse_due_input("tomorrow").is_err());
        assert!(parse_due_input("2024-01-01 9am").is_err());
        assert!(parse_due_input("2024-01-01 09:00 extra").is_err());
    }
}
