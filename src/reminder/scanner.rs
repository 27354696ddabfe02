//! 到期检测：决定哪些任务现在需要提醒

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ReminderConfig;
use crate::models::{Task, TaskId};
use crate::reminder::delivery::{DeliveryLedger, DeliveryOutcome, DeliveryState};

/// 每次扫描选出新到期的任务。持有本进程的去重记录，从不写存储。
#[derive(Debug)]
pub struct ReminderScanner {
    poll_interval: Duration,
    lateness_window: Duration,
    last_scan: Option<NaiveDateTime>,
    ledger: DeliveryLedger,
}

impl ReminderScanner {
    pub fn new(poll_interval: Duration, lateness_window: Duration) -> Self {
        Self {
            poll_interval,
            lateness_window,
            last_scan: None,
            ledger: DeliveryLedger::new(),
        }
    }

    pub fn from_config(config: &ReminderConfig) -> Self {
        Self::new(config.poll_interval(), config.lateness_window())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn lateness_window(&self) -> Duration {
        self.lateness_window
    }

    /// 上一次未被节流的扫描时间
    pub fn last_scan(&self) -> Option<NaiveDateTime> {
        self.last_scan
    }

    pub fn ledger(&self) -> &DeliveryLedger {
        &self.ledger
    }

    pub fn state_of(&self, task: &Task) -> DeliveryState {
        DeliveryState::derive(task, self.ledger.get(task.id))
    }

    /// `task` 在 `now` 时可以提醒则返回其到期时间（不看去重记录）
    fn firing_due(&self, task: &Task, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if task.completed || task.reminder_shown {
            return None;
        }
        let due = task.due_at()?;
        // 负数说明还没到期
        let late = (now - due).to_std().ok()?;
        (late <= self.lateness_window).then_some(due)
    }

    pub fn is_missed(&self, task: &Task, now: NaiveDateTime) -> bool {
        is_missed(task, now, self.lateness_window)
    }

    /// 返回在 `now` 新到期的任务，并标记为 `InFlight`。
    ///
    /// 距上次扫描不足一个间隔的调用不选任何任务。
    pub fn scan(&mut self, tasks: &[Task], now: NaiveDateTime) -> Vec<TaskId> {
        if let Some(last) = self.last_scan {
            // 时钟回拨时 to_std 失败，照常扫描
            if let Ok(elapsed) = (now - last).to_std() {
                if elapsed < self.poll_interval {
                    return Vec::new();
                }
            }
        }
        self.last_scan = Some(now);

        self.prune(tasks);

        let mut due: Vec<(NaiveDateTime, TaskId)> = tasks
            .iter()
            .filter_map(|task| self.firing_due(task, now).map(|d| (d, task.id)))
            .collect();
        due.sort();

        due.into_iter()
            .filter(|(d, id)| self.ledger.begin(*id, *d))
            .map(|(_, id)| id)
            .collect()
    }

    /// 记录选中任务的送达结果
    pub fn record(&mut self, id: TaskId, outcome: &DeliveryOutcome) {
        if outcome.is_settled() {
            self.ledger.acknowledge(id);
        }
        // 未确认的保持 InFlight，本进程内不再重复提醒
    }

    /// 释放已完成、已删除或改了到期时间的任务的标记
    fn prune(&mut self, tasks: &[Task]) {
        let by_id: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

        self.ledger.retain(|id, entry| match by_id.get(&id) {
            Some(task) => !task.completed && task.due_at() == Some(entry.due),
            None => false,
        });
    }
}

/// 已到期、从未提醒且超过补发窗口：这次提醒不会再发出
pub fn is_missed(task: &Task, now: NaiveDateTime, lateness_window: Duration) -> bool {
    if task.completed || task.reminder_shown {
        return false;
    }
    match task.due_at().map(|due| (now - due).to_std()) {
        Some(Ok(late)) => late > lateness_window,
        _ => false,
    }
}
