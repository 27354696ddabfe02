//! 提醒引擎：扫描器、送达流程和通知输出

pub mod delivery;
pub mod scanner;
pub mod sink;
pub mod worker;

pub use delivery::{DeliveryOutcome, DeliveryState};
pub use scanner::ReminderScanner;
pub use sink::{ChannelSink, ConsoleSink, NotificationSink, SinkEvent};
pub use worker::{ReminderHandle, ReminderWorker};
