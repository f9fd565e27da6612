//! 可订阅的 trace 信号
//!
//! 网络与协议栈在状态变化时向 `TraceHub` 报告；测量模块按 `TraceSource`
//! 订阅回调。没有订阅者的信号只做一次哈希查找。

use std::collections::HashMap;
use std::fmt;

use super::id::{LinkId, NodeId};
use super::packet::Packet;
use crate::sim::SimTime;

/// 信号源：每个源都显式指向一个对象（连接、链路队列、节点设备）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceSource {
    /// 某条 TCP 连接发送端的拥塞窗口（字节）
    CongestionWindow(u64),
    /// 某条链路上排队策略中的包数
    PacketsInQueue(LinkId),
    /// 某条链路上排队策略丢弃的包
    Drop(LinkId),
    /// 节点设备发出的包（开始序列化时）
    NodeTx(NodeId),
    /// 节点设备收到的包
    NodeRx(NodeId),
}

/// 信号携带的值
#[derive(Debug, Clone, Copy)]
pub enum TraceValue<'a> {
    Window { old: u64, new: u64 },
    Count { old: usize, new: usize },
    Packet(&'a Packet),
}

pub type TraceCallback = Box<dyn FnMut(SimTime, &TraceValue<'_>) + Send>;

#[derive(Default)]
pub struct TraceHub {
    subs: HashMap<TraceSource, Vec<TraceCallback>>,
}

impl TraceHub {
    pub fn subscribe(&mut self, source: TraceSource, cb: TraceCallback) {
        self.subs.entry(source).or_default().push(cb);
    }

    pub fn fire(&mut self, source: TraceSource, now: SimTime, value: TraceValue<'_>) {
        if let Some(cbs) = self.subs.get_mut(&source) {
            for cb in cbs.iter_mut() {
                cb(now, &value);
            }
        }
    }
}

impl fmt::Debug for TraceHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceHub")
            .field("sources", &self.subs.keys().collect::<Vec<_>>())
            .finish()
    }
}
