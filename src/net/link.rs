//! 链路类型
//!
//! 单向点到点链路：排队策略（qdisc）在前，按包数限长的设备队列在后，
//! 设备队列有空位时才从 qdisc 取包，与真实网卡的发送队列一致。

use std::collections::VecDeque;
use std::net::Ipv4Addr;

use super::id::{LinkId, NodeId};
use super::packet::Packet;
use crate::queue::{FifoQueueDisc, QueueDisc};
use crate::sim::SimTime;

/// 默认设备队列长度（包）
pub const DEFAULT_DEVICE_QUEUE_PKTS: usize = 100;

/// 网络链路
#[derive(Debug)]
pub struct Link {
    pub id: LinkId,
    pub from: NodeId,
    pub to: NodeId,
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    /// `from` 端设备在其节点上的序号（0 号保留给回环设备）
    pub device_index: u32,
    /// `from` 端设备的地址（未分配时为 None）
    pub addr: Option<Ipv4Addr>,
    pub(crate) qdisc: Box<dyn QueueDisc>,
    pub(crate) device_queue: VecDeque<Packet>,
    pub(crate) device_limit: usize,
    pub(crate) busy: bool,
    pub(crate) tx_pkts: u64,
    pub(crate) tx_bytes: u64,
    pub(crate) drops: u64,
}

impl Link {
    /// 创建新链路
    pub fn new(id: LinkId, from: NodeId, to: NodeId, latency: SimTime, bandwidth_bps: u64) -> Self {
        Self {
            id,
            from,
            to,
            latency,
            bandwidth_bps,
            device_index: 1,
            addr: None,
            qdisc: Box::new(FifoQueueDisc::new(crate::queue::ACCESS_QUEUE_PKTS)),
            device_queue: VecDeque::new(),
            device_limit: DEFAULT_DEVICE_QUEUE_PKTS,
            busy: false,
            tx_pkts: 0,
            tx_bytes: 0,
            drops: 0,
        }
    }

    pub fn qdisc(&self) -> &dyn QueueDisc {
        self.qdisc.as_ref()
    }

    pub fn device_queue_len(&self) -> usize {
        self.device_queue.len()
    }

    pub fn device_limit(&self) -> usize {
        self.device_limit
    }

    pub fn tx_pkts(&self) -> u64 {
        self.tx_pkts
    }

    pub fn tx_bytes(&self) -> u64 {
        self.tx_bytes
    }

    /// 该链路 qdisc 丢弃的包数
    pub fn drops(&self) -> u64 {
        self.drops
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u32) -> SimTime {
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        if self.bandwidth_bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128) + (self.bandwidth_bps as u128 - 1))
            / self.bandwidth_bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }
}
