//! FQ-CoDel（Flow Queue CoDel）
//!
//! 按五元组哈希把包分到 `flows` 个子队列，每个子队列各自运行 CoDel；
//! 子队列之间用 deficit round robin 调度，新出现的流优先于旧流。
//! 总包数超过上限时，从积压字节最多的子队列头部成批丢包。

use std::collections::VecDeque;

use crate::net::Packet;
use crate::net::packet::mix64;
use crate::sim::SimTime;

use super::codel::{CoDelParams, CoDelState, PacketFifo};
use super::{QueueDisc, QueueDiscKind};

#[derive(Debug, Clone)]
pub struct FqCoDelParams {
    pub flows: u32,
    /// 每轮可发送的字节额度
    pub quantum: u32,
    /// 超限时一次最多丢弃的包数
    pub drop_batch_size: u32,
    pub codel: CoDelParams,
    /// 哈希扰动种子
    pub perturbation: u64,
}

impl Default for FqCoDelParams {
    fn default() -> Self {
        Self {
            flows: 1024,
            quantum: 1500,
            drop_batch_size: 64,
            codel: CoDelParams::default(),
            perturbation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowStatus {
    Inactive,
    New,
    Old,
}

#[derive(Debug)]
struct FlowQueue {
    fifo: PacketFifo,
    codel: CoDelState,
    deficit: i64,
    status: FlowStatus,
}

impl FlowQueue {
    fn new() -> Self {
        Self {
            fifo: PacketFifo::default(),
            codel: CoDelState::default(),
            deficit: 0,
            status: FlowStatus::Inactive,
        }
    }
}

#[derive(Debug)]
pub struct FqCoDelQueueDisc {
    limit_pkts: u32,
    params: FqCoDelParams,
    salt: u64,
    flows: Vec<FlowQueue>,
    new_flows: VecDeque<usize>,
    old_flows: VecDeque<usize>,
    total_pkts: usize,
    total_bytes: u64,
    overlimit_drops: u64,
}

impl FqCoDelQueueDisc {
    pub fn new(limit_pkts: u32, params: FqCoDelParams) -> Self {
        let n = params.flows.max(1) as usize;
        let salt = mix64(params.perturbation);
        Self {
            limit_pkts,
            salt,
            flows: (0..n).map(|_| FlowQueue::new()).collect(),
            params,
            new_flows: VecDeque::new(),
            old_flows: VecDeque::new(),
            total_pkts: 0,
            total_bytes: 0,
            overlimit_drops: 0,
        }
    }

    /// 包会被分到的子队列下标
    pub fn classify(&self, pkt: &Packet) -> usize {
        (pkt.flow_hash(self.salt) % self.flows.len() as u64) as usize
    }

    /// 当前有积压的子队列数
    pub fn active_flows(&self) -> usize {
        self.flows.iter().filter(|f| f.fifo.len() > 0).count()
    }

    pub fn overlimit_drops(&self) -> u64 {
        self.overlimit_drops
    }

    /// 从积压字节最多的子队列头部丢包，直到丢掉其一半积压或达到批量上限。
    fn drop_from_fattest(&mut self, drops: &mut Vec<Packet>) {
        let Some((fattest, backlog)) = self
            .flows
            .iter()
            .enumerate()
            .map(|(i, f)| (i, f.fifo.bytes()))
            .max_by_key(|&(i, bytes)| (bytes, std::cmp::Reverse(i)))
        else {
            return;
        };
        let threshold = backlog / 2;
        let mut dropped_bytes = 0u64;
        let mut count = 0u32;
        let flow = &mut self.flows[fattest];
        while let Some(pkt) = flow.fifo.pop() {
            dropped_bytes += pkt.size_bytes as u64;
            self.total_pkts -= 1;
            self.total_bytes = self.total_bytes.saturating_sub(pkt.size_bytes as u64);
            self.overlimit_drops += 1;
            drops.push(pkt);
            count += 1;
            if count >= self.params.drop_batch_size || dropped_bytes >= threshold {
                break;
            }
        }
    }
}

impl QueueDisc for FqCoDelQueueDisc {
    fn enqueue(&mut self, mut pkt: Packet, now: SimTime, drops: &mut Vec<Packet>) -> bool {
        let idx = self.classify(&pkt);
        let pkt_id = pkt.id;
        pkt.enqueued_at = now;
        self.total_pkts += 1;
        self.total_bytes = self.total_bytes.saturating_add(pkt.size_bytes as u64);

        let flow = &mut self.flows[idx];
        flow.fifo.push(pkt);
        if flow.status == FlowStatus::Inactive {
            flow.status = FlowStatus::New;
            flow.deficit = self.params.quantum as i64;
            self.new_flows.push_back(idx);
        }

        if self.total_pkts > self.limit_pkts as usize {
            let before = drops.len();
            self.drop_from_fattest(drops);
            return !drops[before..].iter().any(|p| p.id == pkt_id);
        }
        true
    }

    fn dequeue(&mut self, now: SimTime, drops: &mut Vec<Packet>) -> Option<Packet> {
        loop {
            let (idx, from_new) = if let Some(&i) = self.new_flows.front() {
                (i, true)
            } else if let Some(&i) = self.old_flows.front() {
                (i, false)
            } else {
                return None;
            };

            let quantum = self.params.quantum as i64;
            let flow = &mut self.flows[idx];
            if flow.deficit <= 0 {
                flow.deficit += quantum;
                flow.status = FlowStatus::Old;
                if from_new {
                    self.new_flows.pop_front();
                } else {
                    self.old_flows.pop_front();
                }
                self.old_flows.push_back(idx);
                continue;
            }

            let before = drops.len();
            let pkt = flow
                .codel
                .dequeue(&mut flow.fifo, now, &self.params.codel, drops);
            for p in &drops[before..] {
                self.total_pkts -= 1;
                self.total_bytes = self.total_bytes.saturating_sub(p.size_bytes as u64);
            }

            let Some(pkt) = pkt else {
                // 新流耗尽后先挂到旧流队尾，避免刚排空的流立即以新流身份插队。
                if from_new {
                    self.new_flows.pop_front();
                    if self.old_flows.is_empty() {
                        flow.status = FlowStatus::Inactive;
                    } else {
                        flow.status = FlowStatus::Old;
                        self.old_flows.push_back(idx);
                    }
                } else {
                    self.old_flows.pop_front();
                    flow.status = FlowStatus::Inactive;
                }
                continue;
            };

            flow.deficit -= pkt.size_bytes as i64;
            self.total_pkts -= 1;
            self.total_bytes = self.total_bytes.saturating_sub(pkt.size_bytes as u64);
            return Some(pkt);
        }
    }

    fn len(&self) -> usize {
        self.total_pkts
    }

    fn bytes(&self) -> u64 {
        self.total_bytes
    }

    fn limit_pkts(&self) -> u32 {
        self.limit_pkts
    }

    fn kind(&self) -> QueueDiscKind {
        QueueDiscKind::FqCoDel
    }
}
