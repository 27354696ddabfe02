//! 任务视图与筛选
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::Task;

/// 四个固定视图
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Inbox,
    Today,
    Upcoming,
    Completed,
}

impl View {
    pub const ALL: [View; 4] = [View::Inbox, View::Today, View::Upcoming, View::Completed];

    pub fn matches(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            View::Inbox => !task.completed,
            View::Today => !task.completed && task.due_date == Some(today),
            View::Upcoming => !task.completed && task.due_date.is_some_and(|d| d > today),
            View::Completed => task.completed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::Inbox => "收件箱",
            View::Today => "今天",
            View::Upcoming => "即将到来",
            View::Completed => "已完成",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            View::Inbox => "inbox",
            View::Today => "today",
            View::Upcoming => "upcoming",
            View::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inbox" | "i" | "all" => Some(View::Inbox),
            "today" | "t" => Some(View::Today),
            "upcoming" | "u" => Some(View::Upcoming),
            "completed" | "done" | "c" => Some(View::Completed),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// 搜索与日期筛选，与视图相互独立
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub query: Option<String>,
    pub date: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.query.is_none() && self.date.is_none()
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(query) = &self.query {
            let query = query.to_lowercase();
            if !task.title.to_lowercase().contains(&query)
                && !task.description.to_lowercase().contains(&query)
            {
                return false;
            }
        }
        if let Some(date) = self.date {
            if task.due_date != Some(date) {
                return false;
            }
        }
        true
    }

    /// 状态栏上的简短描述
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(q) = &self.query {
            parts.push(format!("搜索: {}", q));
        }
        if let Some(d) = self.date {
            parts.push(format!("日期: {}", d));
        }
        (!parts.is_empty()).then(|| parts.join("  "))
    }
}

/// 按视图和筛选条件过滤，保持原有顺序
pub fn filter_tasks<'a>(
    tasks: &'a [Task],
    view: View,
    filter: &TaskFilter,
    today: NaiveDate,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| view.matches(t, today) && filter.matches(t))
        .collect()
}

/// 每个视图的任务数（标签栏使用）
pub fn view_counts(tasks: &[Task], filter: &TaskFilter, today: NaiveDate) -> [usize; 4] {
    View::ALL.map(|view| filter_tasks(tasks, view, filter, today).len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, TaskId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn task(id: u32, title: &str, due: Option<NaiveDate>, completed: bool) -> Task {
        let mut fields = NewTask::titled(title);
        fields.due_date = due;
        let mut task = Task::new(TaskId(id), fields);
        task.completed = completed;
        task
    }

    fn sample() -> Vec<Task> {
        let yesterday = today().pred_opt();
        let tomorrow = today().succ_opt();
        vec![
            task(1, "Buy milk", Some(today()), false),
            task(2, "Write report", tomorrow, false),
            task(3, "Call mom", None, false),
            task(4, "File taxes", yesterday, true),
            task(5, "Overdue thing", yesterday, false),
        ]
    }

    fn ids(tasks: Vec<&Task>) -> Vec<u32> {
        tasks.iter().map(|t| t.id.0).collect()
    }

    #[test]
    fn test_view_membership() {
        let tasks = sample();
        let none = TaskFilter::default();

        assert_eq!(ids(filter_tasks(&tasks, View::Inbox, &none, today())), vec![1, 2, 3, 5]);
        assert_eq!(ids(filter_tasks(&tasks, View::Today, &none, today())), vec![1]);
        assert_eq!(ids(filter_tasks(&tasks, View::Upcoming, &none, today())), vec![2]);
        assert_eq!(ids(filter_tasks(&tasks, View::Completed, &none, today())), vec![4]);
    }

    #[test]
    fn test_search_is_case_insensitive_and_covers_description() {
        let mut tasks = sample();
        tasks[2].description = "about the MILK delivery".to_string();
        let filter = TaskFilter {
            query: Some("milk".to_string()),
            date: None,
        };

        assert_eq!(ids(filter_tasks(&tasks, View::Inbox, &filter, today())), vec![1, 3]);
    }

    #[test]
    fn test_date_filter_applies_across_views() {
        let tasks = sample();
        let filter = TaskFilter {
            query: None,
            date: today().pred_opt(),
        };

        assert_eq!(ids(filter_tasks(&tasks, View::Inbox, &filter, today())), vec![5]);
        assert_eq!(ids(filter_tasks(&tasks, View::Completed, &filter, today())), vec![4]);
        assert_eq!(view_counts(&tasks, &filter, today()), [1, 0, 0, 1]);
    }

    #[test]
    fn test_view_cycle_and_parse() {
        assert_eq!(View::Completed.next(), View::Inbox);
        assert_eq!(View::Inbox.prev(), View::Completed);
        assert_eq!(View::Today.next(), View::Upcoming);
        assert_eq!(View::parse("Upcoming"), Some(View::Upcoming));
        assert_eq!(View::parse("done"), Some(View::Completed));
        assert_eq!(View::parse("someday"), None);
    }

    #[test]
    fn test_filter_describe() {
        assert!(TaskFilter::default().describe().is_none());
        let filter = TaskFilter {
            query: Some("rent".to_string()),
            date: Some(today()),
        };
        assert_eq!(filter.describe().unwrap(), "搜索: rent  日期: 2024-03-10");
    }
}
