//! 提醒的输出端

use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::SinkError;

/// 提醒的声音和弹窗输出。两者都尽力而为，调用方只记录错误。
pub trait NotificationSink: Send + Sync {
    fn play_audible_cue(&self) -> Result<(), SinkError>;

    /// 同一个 `dedupe_tag` 的重复提醒可以被合并
    fn show_alert(&self, title: &str, body: &str, dedupe_tag: &str) -> Result<(), SinkError>;
}

/// 发送给 TUI 主循环的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// 响铃
    Bell,
    /// 显示提醒
    Alert {
        title: String,
        body: String,
        tag: String,
    },
}

/// 转发给持有终端的 TUI 主循环
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    sound: bool,
}

impl ChannelSink {
    pub fn new(tx: Sender<SinkEvent>, sound: bool) -> Self {
        Self { tx, sound }
    }
}

impl NotificationSink for ChannelSink {
    fn play_audible_cue(&self) -> Result<(), SinkError> {
        if !self.sound {
            return Ok(());
        }
        self.tx
            .send(SinkEvent::Bell)
            .map_err(|_| SinkError::Disconnected)
    }

    fn show_alert(&self, title: &str, body: &str, dedupe_tag: &str) -> Result<(), SinkError> {
        self.tx
            .send(SinkEvent::Alert {
                title: title.to_string(),
                body: body.to_string(),
                tag: dedupe_tag.to_string(),
            })
            .map_err(|_| SinkError::Disconnected)
    }
}

/// 同一标签在这段时间内只打印一次
pub const ALERT_COLLAPSE_WINDOW: Duration = Duration::from_secs(60);

/// `hxt watch` 的标准输出
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
    sound: bool,
    collapse_window: Duration,
    /// 标签 -> 最近一次打印的时间，只保留窗口内的
    recent: Mutex<HashMap<String, Instant>>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout(sound: bool) -> Self {
        Self::new(std::io::stdout(), sound)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, sound: bool) -> Self {
        Self {
            out: Mutex::new(out),
            sound,
            collapse_window: ALERT_COLLAPSE_WINDOW,
            recent: Mutex::new(HashMap::new()),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), SinkError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Disconnected)?;
        out.write_all(bytes)?;
        out.flush()?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner().unwrap()
    }
}

impl<W: Write + Send> NotificationSink for ConsoleSink<W> {
    fn play_audible_cue(&self) -> Result<(), SinkError> {
        if !self.sound {
            return Ok(());
        }
        self.write(b"\x07")
    }

    fn show_alert(&self, title: &str, body: &str, dedupe_tag: &str) -> Result<(), SinkError> {
        {
            let now = Instant::now();
            let mut recent = self.recent.lock().map_err(|_| SinkError::Disconnected)?;
            recent.retain(|_, shown_at| now.duration_since(*shown_at) < self.collapse_window);
            if recent.contains_key(dedupe_tag) {
                return Ok(());
            }
            recent.insert(dedupe_tag.to_string(), now);
        }

        let line = format!(
            "[{}] ⏰ {}: {}\n",
            chrono::Local::now().format("%H:%M:%S"),
            title,
            body
        );
        self.write(line.as_bytes())
    }
}
