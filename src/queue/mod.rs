//! 队列策略（Queue disciplines）
//!
//! 瓶颈链路上可选的四种排队策略：尾丢弃 FIFO、CoDel、RED 与 FQ-CoDel。
//! 所有容量都以包数计。

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::net::Packet;
use crate::sim::SimTime;

mod codel;
mod config;
mod drop_tail;
mod fq_codel;
mod red;

pub use codel::{CoDelParams, CoDelQueueDisc, CoDelState};
pub use config::QueueDiscConfig;
pub use drop_tail::FifoQueueDisc;
pub use fq_codel::{FqCoDelParams, FqCoDelQueueDisc};
pub use red::{RedParams, RedQueueDisc, RedWeight};

/// 访问链路上默认 FIFO 的容量（包）
pub const ACCESS_QUEUE_PKTS: u32 = 1000;

/// 排队策略抽象
///
/// 被丢弃的包追加到 `drops`，由调用方统一上报。入队时丢弃的不一定是
/// 新到达的包（FQ-CoDel 会从最胖的流头部丢包）。
pub trait QueueDisc: fmt::Debug + Send {
    /// 入队：返回新到达的包是否被接纳
    fn enqueue(&mut self, pkt: Packet, now: SimTime, drops: &mut Vec<Packet>) -> bool;
    /// 出队：按策略返回下一个 packet（期间可能丢包）
    fn dequeue(&mut self, now: SimTime, drops: &mut Vec<Packet>) -> Option<Packet>;

    fn len(&self) -> usize;
    fn bytes(&self) -> u64;
    fn limit_pkts(&self) -> u32;
    fn kind(&self) -> QueueDiscKind;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 排队策略种类（命令行名称）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QueueDiscKind {
    PfifoFast,
    CoDel,
    Red,
    FqCoDel,
}

impl QueueDiscKind {
    pub const ALL: [QueueDiscKind; 4] = [
        QueueDiscKind::PfifoFast,
        QueueDiscKind::CoDel,
        QueueDiscKind::Red,
        QueueDiscKind::FqCoDel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QueueDiscKind::PfifoFast => "PfifoFast",
            QueueDiscKind::CoDel => "CoDel",
            QueueDiscKind::Red => "RED",
            QueueDiscKind::FqCoDel => "FqCoDel",
        }
    }
}

impl fmt::Display for QueueDiscKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueueDiscKind {
    type Err = ConfigError;

    /// 名称区分大小写，与命令行文档一致；`DropTail` 是 `PfifoFast` 的别名。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PfifoFast" | "DropTail" => Ok(QueueDiscKind::PfifoFast),
            "CoDel" => Ok(QueueDiscKind::CoDel),
            "RED" => Ok(QueueDiscKind::Red),
            "FqCoDel" => Ok(QueueDiscKind::FqCoDel),
            other => Err(ConfigError::UnknownQueueDisc(other.to_string())),
        }
    }
}
