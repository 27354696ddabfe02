//! 单条提醒的送达与去重
//!
//! 任务状态按 `Pending → InFlight → Delivered` 推进。`InFlight` 只存在于
//! 内存中的 [`DeliveryLedger`]；存储确认 `reminder_shown = true` 之后才算
//! 持久的 `Delivered`。

use chrono::NaiveDateTime;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::fs::TaskStore;
use crate::models::{Task, TaskId, TaskPatch};
use crate::reminder::sink::NotificationSink;

/// 任务在当前到期周期内的提醒状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// 尚未提醒（可能还没到期）
    Pending,
    /// 已被扫描选中，确认尚未写入
    InFlight,
    /// `reminder_shown` 已持久化（或任务已被删除）
    Delivered,
}

impl DeliveryState {
    /// 由持久标志和内存标记推导状态。
    /// 记录在其他到期时间上的标记属于旧周期，忽略。
    pub fn derive(task: &Task, entry: Option<&LedgerEntry>) -> Self {
        if task.reminder_shown {
            return DeliveryState::Delivered;
        }
        match entry {
            Some(entry) if Some(entry.due) == task.due_at() => entry.state,
            _ => DeliveryState::Pending,
        }
    }

    /// 合法的状态转换；任何状态都可以释放回 `Pending`
    pub fn can_transition(self, to: DeliveryState) -> bool {
        matches!(
            (self, to),
            (DeliveryState::Pending, DeliveryState::InFlight)
                | (DeliveryState::InFlight, DeliveryState::Delivered)
                | (_, DeliveryState::Pending)
        )
    }
}

/// 单个任务的内存标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub state: DeliveryState,
    /// 记录标记时任务的到期时间
    pub due: NaiveDateTime,
}

/// 本进程内的“已处理”记录，由扫描器持有
#[derive(Debug, Default)]
pub struct DeliveryLedger {
    entries: HashMap<TaskId, LedgerEntry>,
}

impl DeliveryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TaskId) -> Option<&LedgerEntry> {
        self.entries.get(&id)
    }

    #[cfg(test)]
    pub fn state(&self, id: TaskId) -> DeliveryState {
        self.entries
            .get(&id)
            .map(|e| e.state)
            .unwrap_or(DeliveryState::Pending)
    }

    /// `Pending → InFlight`。同一到期时间已有标记时返回 false。
    pub fn begin(&mut self, id: TaskId, due: NaiveDateTime) -> bool {
        if let Some(entry) = self.entries.get(&id) {
            if entry.due == due {
                return false;
            }
        }
        self.entries.insert(
            id,
            LedgerEntry {
                state: DeliveryState::InFlight,
                due,
            },
        );
        true
    }

    /// `InFlight → Delivered`，其他状态返回 false
    pub fn acknowledge(&mut self, id: TaskId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) if entry.state.can_transition(DeliveryState::Delivered) => {
                entry.state = DeliveryState::Delivered;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn release(&mut self, id: TaskId) -> Option<LedgerEntry> {
        self.entries.remove(&id)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(TaskId, &LedgerEntry) -> bool,
    {
        self.entries.retain(|id, entry| keep(*id, entry));
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 一次送达的结果
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// 已通知，`reminder_shown` 已写入
    Delivered,
    /// 选中之后、确认之前任务被删除
    Vanished,
    /// 已通知，但确认之前到期时间被修改；新周期保持待提醒
    Superseded,
    /// 已通知但写入失败；重启后可能再次提醒
    Unacknowledged(StoreError),
}

impl DeliveryOutcome {
    /// 内存标记能否推进到 `Delivered`
    pub fn is_settled(&self) -> bool {
        !matches!(self, DeliveryOutcome::Unacknowledged(_))
    }
}

/// 通知端用于合并重复提醒的标签，每个到期周期一个
pub fn dedupe_tag(task: &Task) -> String {
    match task.due_at() {
        Some(due) => format!("task-{}-{}", task.id, due.format("%Y%m%dT%H%M%S")),
        None => format!("task-{}", task.id),
    }
}

fn alert_body(task: &Task) -> String {
    let due = task
        .due_at()
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let body = task.body().lines().next().unwrap_or("").trim();

    if body.is_empty() {
        format!("到期: {}", due)
    } else {
        format!("到期: {} · {}", due, body)
    }
}

/// 为 `task` 发出提醒并持久记录
///
/// 声音和弹窗互不影响，失败只记日志；两者都调用之后才写确认。
/// 确认以送达时的到期时间为条件，不会落到之后改过的新周期上。
pub fn deliver<S, N>(task: &Task, sink: &N, store: &S) -> DeliveryOutcome
where
    S: TaskStore + ?Sized,
    N: NotificationSink + ?Sized,
{
    let tag = dedupe_tag(task);
    let due = task.due_at();

    if let Err(e) = sink.play_audible_cue() {
        warn!(task_id = %task.id, error = %e, "audible cue failed");
    }
    if let Err(e) = sink.show_alert(&task.title, &alert_body(task), &tag) {
        warn!(task_id = %task.id, error = %e, "alert failed");
    }

    match store.update_by_id(task.id, TaskPatch::acknowledge(due)) {
        Ok(current) if current.reminder_shown && current.due_at() == due => {
            info!(task_id = %task.id, "reminder delivered");
            DeliveryOutcome::Delivered
        }
        Ok(current) => {
            info!(
                task_id = %task.id,
                due = ?current.due_at(),
                "due changed before acknowledgement, new cycle stays pending"
            );
            DeliveryOutcome::Superseded
        }
        Err(e) if e.is_not_found() => {
            debug!(task_id = %task.id, "task vanished before acknowledgement");
            DeliveryOutcome::Vanished
        }
        Err(e) => {
            warn!(task_id = %task.id, error = %e, "reminder fired but acknowledgement failed");
            DeliveryOutcome::Unacknowledged(e)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::fs::store::MemoryTaskStore;
    use crate::models::NewTask;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Mutex;

    /// 记录每次通知调用，可设置为失败
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub calls: Mutex<Vec<String>>,
        pub fail_sound: bool,
        pub fail_alert: bool,
    }

    impl RecordingSink {
        pub fn alerts(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with("alert:"))
                .cloned()
                .collect()
        }
    }

    impl NotificationSink for RecordingSink {
        fn play_audible_cue(&self) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push("bell".to_string());
            if self.fail_sound {
                return Err(SinkError::Disconnected);
            }
            Ok(())
        }

        fn show_alert(&self, title: &str, _body: &str, dedupe_tag: &str) -> Result<(), SinkError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("alert:{}:{}", dedupe_tag, title));
            if self.fail_alert {
                return Err(SinkError::Disconnected);
            }
            Ok(())
        }
    }

    /// 写入总是失败的存储
    pub(crate) struct BrokenWrites(pub MemoryTaskStore);

    impl TaskStore for BrokenWrites {
        fn create(&self, fields: NewTask) -> Result<Task, StoreError> {
            self.0.create(fields)
        }
        fn list_all(&self) -> Result<Vec<Task>, StoreError> {
            self.0.list_all()
        }
        fn update_by_id(&self, _id: TaskId, _patch: TaskPatch) -> Result<Task, StoreError> {
            Err(StoreError::unavailable("disk full"))
        }
        fn delete_by_id(&self, id: TaskId) -> Result<(), StoreError> {
            self.0.delete_by_id(id)
        }
    }

    /// 在确认写入之前把到期时间改到 18:00，模拟 UI 或其他进程的并发修改
    pub(crate) struct RescheduleBeforeAck(pub MemoryTaskStore);

    impl TaskStore for RescheduleBeforeAck {
        fn create(&self, fields: NewTask) -> Result<Task, StoreError> {
            self.0.create(fields)
        }
        fn list_all(&self) -> Result<Vec<Task>, StoreError> {
            self.0.list_all()
        }
        fn update_by_id(&self, id: TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
            if patch.reminder_shown == Some(true) {
                let evening = TaskPatch::due(
                    NaiveDate::from_ymd_opt(2024, 1, 1),
                    NaiveTime::from_hms_opt(18, 0, 0),
                );
                self.0.update_by_id(id, evening)?;
            }
            self.0.update_by_id(id, patch)
        }
        fn delete_by_id(&self, id: TaskId) -> Result<(), StoreError> {
            self.0.delete_by_id(id)
        }
    }

    fn due_task(store: &dyn TaskStore) -> Task {
        store
            .create(NewTask::titled("standup").due(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0),
            ))
            .unwrap()
    }

    #[test]
    fn test_deliver_happy_path() {
        let store = MemoryTaskStore::new();
        let sink = RecordingSink::default();
        let task = due_task(&store);

        let outcome = deliver(&task, &sink, &store);

        assert!(matches!(outcome, DeliveryOutcome::Delivered));
        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec![
                "bell".to_string(),
                "alert:task-1-20240101T090000:standup".to_string()
            ]
        );
        assert!(store.get(task.id).unwrap().reminder_shown);
    }

    #[test]
    fn test_sink_failures_do_not_block_ack() {
        let store = MemoryTaskStore::new();
        let sink = RecordingSink {
            fail_sound: true,
            fail_alert: true,
            ..Default::default()
        };
        let task = due_task(&store);

        let outcome = deliver(&task, &sink, &store);

        assert!(matches!(outcome, DeliveryOutcome::Delivered));
        // 声音失败后仍然尝试弹窗
        assert_eq!(sink.alerts().len(), 1);
        assert!(store.get(task.id).unwrap().reminder_shown);
    }

    #[test]
    fn test_ack_skipped_when_due_changed_in_between() {
        let store = RescheduleBeforeAck(MemoryTaskStore::new());
        let sink = RecordingSink::default();
        let task = due_task(&store);

        let outcome = deliver(&task, &sink, &store);

        assert!(matches!(outcome, DeliveryOutcome::Superseded));
        assert!(outcome.is_settled());
        let current = store.get(task.id).unwrap();
        assert_eq!(current.due_time, NaiveTime::from_hms_opt(18, 0, 0));
        assert!(!current.reminder_shown);
    }

    #[test]
    fn test_dedupe_tag_changes_with_due() {
        let store = MemoryTaskStore::new();
        let mut task = due_task(&store);
        let nine = dedupe_tag(&task);

        task.due_time = NaiveTime::from_hms_opt(9, 30, 0);
        assert_ne!(dedupe_tag(&task), nine);
        assert!(nine.starts_with("task-1-"));

        task.due_time = None;
        assert_eq!(dedupe_tag(&task), "task-1");
    }

    #[test]
    fn test_vanished_task_is_settled() {
        let store = MemoryTaskStore::new();
        let sink = RecordingSink::default();
        let task = due_task(&store);
        store.delete_by_id(task.id).unwrap();

        let outcome = deliver(&task, &sink, &store);

        assert!(matches!(outcome, DeliveryOutcome::Vanished));
        assert!(outcome.is_settled());
        assert_eq!(sink.alerts().len(), 1);
    }

    #[test]
    fn test_store_failure_is_unacknowledged() {
        let store = BrokenWrites(MemoryTaskStore::new());
        let sink = RecordingSink::default();
        let task = due_task(&store);

        let outcome = deliver(&task, &sink, &store);

        assert!(matches!(outcome, DeliveryOutcome::Unacknowledged(_)));
        assert!(!outcome.is_settled());
        assert!(!store.get(task.id).unwrap().reminder_shown);
    }

    #[test]
    fn test_ledger_transitions() {
        let mut ledger = DeliveryLedger::new();
        let due = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        assert_eq!(ledger.state(TaskId(1)), DeliveryState::Pending);
        assert!(!ledger.acknowledge(TaskId(1)));

        assert!(ledger.begin(TaskId(1), due));
        assert!(!ledger.begin(TaskId(1), due));
        assert_eq!(ledger.state(TaskId(1)), DeliveryState::InFlight);

        assert!(ledger.acknowledge(TaskId(1)));
        assert!(!ledger.acknowledge(TaskId(1)));
        assert_eq!(ledger.state(TaskId(1)), DeliveryState::Delivered);

        assert!(ledger.release(TaskId(1)).is_some());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_derive_state() {
        let store = MemoryTaskStore::new();
        let mut task = due_task(&store);
        let due = task.due_at().unwrap();

        assert_eq!(DeliveryState::derive(&task, None), DeliveryState::Pending);

        let entry = LedgerEntry {
            state: DeliveryState::InFlight,
            due,
        };
        assert_eq!(
            DeliveryState::derive(&task, Some(&entry)),
            DeliveryState::InFlight
        );

        // 旧周期的标记不算数
        let stale = LedgerEntry {
            state: DeliveryState::Delivered,
            due: due - chrono::Duration::hours(1),
        };
        assert_eq!(
            DeliveryState::derive(&task, Some(&stale)),
            DeliveryState::Pending
        );

        task.reminder_shown = true;
        assert_eq!(DeliveryState::derive(&task, None), DeliveryState::Delivered);
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!DeliveryState::Pending.can_transition(DeliveryState::Delivered));
        assert!(!DeliveryState::Delivered.can_transition(DeliveryState::InFlight));
        assert!(DeliveryState::Delivered.can_transition(DeliveryState::Pending));
    }
}
