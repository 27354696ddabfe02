//! 后台轮询：驱动扫描器和送达流程

use chrono::{Local, NaiveDateTime};
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fs::TaskStore;
use crate::reminder::delivery::{deliver, DeliveryOutcome};
use crate::reminder::scanner::ReminderScanner;
use crate::reminder::sink::NotificationSink;

/// 一次扫描做了什么
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub selected: usize,
    pub delivered: usize,
    pub vanished: usize,
    pub superseded: usize,
    pub unacknowledged: usize,
    /// 读取快照失败，本次没有评估任何任务
    pub store_unavailable: bool,
}

pub struct ReminderWorker {
    scanner: ReminderScanner,
    store: Arc<dyn TaskStore>,
    sink: Arc<dyn NotificationSink>,
}

impl ReminderWorker {
    pub fn new(
        scanner: ReminderScanner,
        store: Arc<dyn TaskStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            scanner,
            store,
            sink,
        }
    }

    #[cfg(test)]
    pub fn scanner(&self) -> &ReminderScanner {
        &self.scanner
    }

    /// 读取快照，选出新到期的任务并逐个送达
    ///
    /// 各任务的去重状态互相独立，一个任务确认失败不影响其他任务。
    pub fn tick(&mut self, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();

        let tasks = match self.store.list_all() {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "reminder tick skipped: task store unavailable");
                report.store_unavailable = true;
                return report;
            }
        };

        for id in self.scanner.scan(&tasks, now) {
            let Some(task) = tasks.iter().find(|t| t.id == id) else {
                continue;
            };
            report.selected += 1;

            let outcome = deliver(task, self.sink.as_ref(), self.store.as_ref());
            match &outcome {
                DeliveryOutcome::Delivered => report.delivered += 1,
                DeliveryOutcome::Vanished => report.vanished += 1,
                DeliveryOutcome::Superseded => report.superseded += 1,
                DeliveryOutcome::Unacknowledged(_) => report.unacknowledged += 1,
            }
            self.scanner.record(id, &outcome);
        }

        if report.selected > 0 {
            debug!(?report, "reminder tick");
        }
        report
    }

    /// 距下一次不会被节流的扫描还要等多久
    ///
    /// 间隔内被唤醒的扫描会被节流，只等剩余的时间，不再等满一个间隔。
    fn next_wait(&self, now: NaiveDateTime) -> Duration {
        let interval = self.scanner.poll_interval();
        let Some(last) = self.scanner.last_scan() else {
            return interval;
        };
        match (now - last).to_std() {
            Ok(elapsed) => interval.saturating_sub(elapsed),
            // 时钟回拨
            Err(_) => interval,
        }
    }

    /// 在独立线程上运行，直到句柄被取消
    pub fn spawn(mut self) -> std::io::Result<ReminderHandle> {
        let (signal_tx, signal_rx) = crossbeam_channel::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("reminder-scanner".to_string())
            .spawn(move || {
                info!(
                    interval_ms = self.scanner.poll_interval().as_millis() as u64,
                    lateness_secs = self.scanner.lateness_window().as_secs(),
                    "reminder scanner started"
                );
                loop {
                    self.tick(Local::now().naive_local());

                    let wait = self.next_wait(Local::now().naive_local());
                    match signal_rx.recv_timeout(wait) {
                        Ok(()) | Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("reminder scanner stopped");
            })?;

        Ok(ReminderHandle {
            signal_tx: Some(signal_tx),
            thread: Some(thread),
        })
    }
}

/// 扫描线程的句柄。取消（或 drop）会停止循环并等待线程退出。
pub struct ReminderHandle {
    signal_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReminderHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 任务变化后提前唤醒循环；扫描器的节流仍然生效，
    /// 一个间隔内多次唤醒最多只多扫描一次。
    pub fn nudge(&self) {
        if let Some(tx) = &self.signal_tx {
            // 已有待处理的唤醒时忽略
            let _ = tx.try_send(());
        }
    }

    /// 停止循环并等待线程退出。正在进行的扫描会先完成，已发出的提醒不会撤回。
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // 断开通道即可唤醒 recv_timeout
        drop(self.signal_tx.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("reminder scanner thread panicked");
            }
        }
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
